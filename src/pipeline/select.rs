use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::forum::{ForumId, SourceThread};

/// Keeps threads with `min..=max` posts.
pub fn filter_by_post_count(threads: Vec<SourceThread>, min: usize, max: usize) -> Vec<SourceThread> {
    threads
        .into_iter()
        .filter(|t| (min..=max).contains(&t.posts.len()))
        .collect()
}

/// Draws up to `n` threads without replacement, never returning one whose id is
/// already translated. A seed makes the draw reproducible.
pub fn sample_threads(
    pool: Vec<SourceThread>,
    already_translated: &HashSet<ForumId>,
    n: usize,
    seed: Option<u64>,
) -> Vec<SourceThread> {
    let mut candidates: Vec<SourceThread> = pool
        .into_iter()
        .filter(|t| !already_translated.contains(&t.id))
        .collect();
    match seed {
        Some(seed) => candidates.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => candidates.shuffle(&mut rand::rng()),
    }
    candidates.truncate(n);
    candidates
}
