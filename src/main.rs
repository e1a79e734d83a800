use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use vocalscope::report::{self, text, Summary};
use vocalscope::{AnalysisError, AnalysisReport, Analyzer, Capabilities};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "vocalscope")]
#[command(author, version, about = "Detect studio effects applied to vocal recordings")]
struct Args {
    /// File or directory to analyze
    path: PathBuf,

    /// Output report file (.json, .txt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "vocalscope-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate a report
    #[arg(long)]
    no_report: bool,

    /// Print the JSON reports to stdout instead of text summaries
    #[arg(long)]
    json: bool,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Analysis sample rate in Hz (0 keeps each file's native rate)
    #[arg(long, default_value = "22050")]
    sample_rate: u32,

    /// Skip the formant extractor (pitch/formant shift detectors degrade)
    #[arg(long)]
    no_formants: bool,

    /// Run the detectors of each file one after another
    #[arg(long)]
    sequential: bool,

    /// Show evidence and parameters for every effect
    #[arg(short, long)]
    verbose: bool,

    /// Only show summary
    #[arg(short, long)]
    quiet: bool,
}

/// Supported audio formats
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "flac", "wav", "wave", "aiff", "aif", "mp3", "m4a", "aac", "ogg", "oga",
];

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn collect_files(path: &Path) -> Vec<PathBuf> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_audio(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    // Set up thread pool
    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok();
    }

    let files = collect_files(&args.path);
    if files.is_empty() {
        eprintln!(
            "No audio files found (supported: {})",
            SUPPORTED_EXTENSIONS.join(", ")
        );
        std::process::exit(1);
    }

    let chatty = !args.quiet && !args.json;
    if chatty {
        eprintln!("\x1b[1mVocalscope - Voice Effect Detector\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} audio file(s)\n", files.len());
    }

    // Set up progress bar
    let pb = if chatty && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    // Create analyzer
    let mut capabilities = Capabilities::detect();
    if args.no_formants {
        capabilities = capabilities.without_formants();
    }
    let analyzer = Analyzer::new()
        .with_capabilities(capabilities)
        .with_parallel(!args.sequential)
        .with_sample_rate(Some(args.sample_rate));

    // Analyze files in parallel
    let outcomes: Vec<(PathBuf, Result<AnalysisReport, AnalysisError>)> = files
        .par_iter()
        .map(|path| {
            let outcome = analyzer.analyze_file(path);
            if let Some(ref pb) = pb {
                pb.inc(1);
                pb.set_message(
                    path.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                );
            }
            (path.clone(), outcome)
        })
        .collect();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut reports = Vec::with_capacity(outcomes.len());
    let mut failures = 0usize;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                failures += 1;
                eprintln!("\x1b[31m[ERROR]\x1b[0m {}: {}", path.display(), e);
            }
        }
    }

    // Print results
    if args.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize reports: {}", e),
        }
    } else if !args.quiet {
        for r in &reports {
            print!("{}", text::format_summary(r, args.verbose));
        }
    }

    // Summary
    let summary = Summary::from_reports(&reports);
    if chatty {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  Analyzed:      {}", summary.total);
        eprintln!("  Voice:         {}", summary.voice_detected);
        eprintln!("  With effects:  {}", summary.with_effects);
        for (kind, count) in &summary.effect_counts {
            eprintln!("    {:<16} {}", kind.label(), count);
        }
        if failures > 0 {
            eprintln!("  \x1b[90mErrors:\x1b[0m        {}", failures);
        }
    }

    // Determine report path
    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report {
        // Auto-generate report
        std::fs::create_dir_all(&args.report_dir).ok();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("vocalscope_report_{}.json", timestamp);
        Some(args.report_dir.join(filename))
    } else {
        None
    };

    // Generate report
    if let Some(ref output_path) = report_path {
        if let Err(e) = report::generate(output_path, &reports) {
            eprintln!("Failed to write report: {}", e);
            std::process::exit(1);
        }
        if chatty {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }
    }

    if chatty {
        eprintln!("\n\x1b[90mAnalysis complete.\x1b[0m");
    }

    // Exit with appropriate code
    if failures > 0 {
        std::process::exit(1);
    }
}
