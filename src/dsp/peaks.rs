//! Peak picking

/// Indices of local maxima with a minimum height and spacing
///
/// A peak is a sample strictly greater than its left neighbour and at least
/// as large as its right neighbour (so a plateau reports its first sample).
/// When two peaks are closer than `min_distance`, the taller one wins. The
/// result is sorted by index.
pub fn find_peaks(values: &[f64], min_height: f64, min_distance: usize) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }

    let mut candidates: Vec<usize> = (1..values.len() - 1)
        .filter(|&i| values[i] > values[i - 1] && values[i] >= values[i + 1])
        .filter(|&i| values[i] >= min_height)
        .collect();

    if min_distance > 1 && candidates.len() > 1 {
        let mut by_height = candidates.clone();
        by_height.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
        let mut kept: Vec<usize> = Vec::with_capacity(by_height.len());
        for idx in by_height {
            if kept.iter().all(|&k| k.abs_diff(idx) >= min_distance) {
                kept.push(idx);
            }
        }
        kept.sort_unstable();
        candidates = kept;
    }

    candidates
}

/// Local maxima above a threshold within `[start, end)`, ignoring spacing
pub fn local_maxima_above(values: &[f64], start: usize, end: usize, threshold: f64) -> Vec<usize> {
    let end = end.min(values.len().saturating_sub(1));
    (start.max(1)..end)
        .filter(|&i| values[i] > values[i - 1] && values[i] > values[i + 1] && values[i] > threshold)
        .collect()
}
