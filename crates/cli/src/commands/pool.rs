use anyhow::{Context, Result};
use rayon::prelude::*;

/// Run `work` over `items` on a pool of `jobs` threads (rayon's default when
/// `None` or 0). Results come back in input order.
pub fn run_pool<I, T, F>(items: &[I], jobs: Option<usize>, work: F) -> Result<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> T + Sync + Send,
{
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = jobs {
        builder = builder.num_threads(n);
    }
    let pool = builder.build().context("Failed to build worker pool")?;
    log::debug!("processing {} files on {} threads", items.len(), pool.current_num_threads());
    Ok(pool.install(|| items.par_iter().map(&work).collect()))
}
