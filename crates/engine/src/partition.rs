//! Worker count resolution and balanced partitioning of files into batches.

/// Resolves how many workers a job asks for.
///
/// An explicit request wins, then the configured value; 0 in the config means
/// one worker per logical core, detected via num_cpus.
pub fn resolve_worker_count(requested: Option<usize>, configured: u32) -> usize {
    match requested {
        Some(n) => n,
        None if configured > 0 => configured as usize,
        None => num_cpus::get(),
    }
}

/// Splits `items` into `min(workers, items.len())` contiguous batches.
///
/// Batch sizes differ by at most one; the first `len % batches` batches carry
/// the extra item. Order is preserved. A worker count of 0 is treated as 1.
/// No batches are produced for an empty input, and none is ever empty.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let batches = workers.clamp(1, total);
    let base = total / batches;
    let extra = total % batches;

    let mut out = Vec::with_capacity(batches);
    let mut iter = items.into_iter();
    for i in 0..batches {
        let size = if i < extra { base + 1 } else { base };
        out.push(iter.by_ref().take(size).collect());
    }
    out
}
