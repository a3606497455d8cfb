//! Bounded uniform sampling of evidence comments.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// RNG for sampling one post's comments.
///
/// With a seed, the stream depends only on `(seed, post_id)`, so results do
/// not change with the order posts are processed in.
#[must_use]
pub fn sampler_rng(seed: Option<u64>, post_id: &str) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ post_id_hash(post_id)),
        None => StdRng::seed_from_u64(rand::random()),
    }
}

fn post_id_hash(post_id: &str) -> u64 {
    Sha256::digest(post_id.as_bytes())
        .iter()
        .take(8)
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

/// Choose `min(cap, comments.len())` comments uniformly without replacement.
#[must_use]
pub fn sample_comments<R: Rng + ?Sized>(
    comments: Vec<String>,
    cap: usize,
    rng: &mut R,
) -> Vec<String> {
    let amount = cap.min(comments.len());
    let indices = rand::seq::index::sample(rng, comments.len(), amount);
    let mut slots: Vec<Option<String>> = comments.into_iter().map(Some).collect();
    indices
        .iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn comments(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("comment-{i}")).collect()
    }

    #[test]
    fn caps_without_replacement() {
        let mut rng = sampler_rng(Some(1), "1001");
        let sampled = sample_comments(comments(1_000), 300, &mut rng);
        assert_eq!(sampled.len(), 300);
        let unique: HashSet<&String> = sampled.iter().collect();
        assert_eq!(unique.len(), 300);
    }

    #[test]
    fn short_list_is_returned_whole() {
        let mut rng = sampler_rng(Some(1), "1001");
        let mut sampled = sample_comments(comments(5), 300, &mut rng);
        sampled.sort();
        assert_eq!(sampled, comments(5));
    }

    #[test]
    fn empty_list_samples_nothing() {
        let mut rng = sampler_rng(None, "1001");
        assert!(sample_comments(Vec::new(), 300, &mut rng).is_empty());
    }

    #[test]
    fn seeded_sampling_is_reproducible_per_post() {
        let a = sample_comments(comments(500), 10, &mut sampler_rng(Some(42), "1001"));
        let b = sample_comments(comments(500), 10, &mut sampler_rng(Some(42), "1001"));
        assert_eq!(a, b);
    }

    #[test]
    fn seed_is_mixed_with_post_id() {
        let a = sample_comments(comments(500), 10, &mut sampler_rng(Some(42), "1001"));
        let b = sample_comments(comments(500), 10, &mut sampler_rng(Some(42), "1002"));
        assert_ne!(a, b);
    }
}
