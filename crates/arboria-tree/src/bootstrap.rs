use rand::Rng;

/// Draw a bootstrap sample (with replacement) of `round(n_samples *
/// max_samples)` row indices from `0..n_samples`, and return the matching
/// out-of-bag mask (`true` where a row was never drawn).
///
/// `max_samples` is not restricted to `(0, 1]`: values greater than 1.0
/// oversample the training set, matching the original implementation's
/// `max_samples` semantics.
pub fn bootstrap_sample(n_samples: u32, max_samples: f32, rng: &mut impl Rng) -> (Vec<u32>, Vec<bool>) {
    let draw_count = ((n_samples as f64) * (max_samples as f64)).round().max(0.0) as u32;
    let mut indices = Vec::with_capacity(draw_count as usize);
    let mut in_bag = vec![false; n_samples as usize];

    for _ in 0..draw_count {
        let idx = rng.gen_range(0..n_samples);
        indices.push(idx);
        in_bag[idx as usize] = true;
    }

    let oob_mask = in_bag.iter().map(|&b| !b).collect();
    (indices, oob_mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_bootstrap_sample_size() {
        let mut rng = StdRng::seed_from_u64(1);
        let (indices, mask) = bootstrap_sample(100, 1.0, &mut rng);
        assert_eq!(indices.len(), 100);
        assert_eq!(mask.len(), 100);
        assert!(indices.iter().all(|&i| i < 100));
    }

    #[test]
    fn test_bootstrap_oversample() {
        let mut rng = StdRng::seed_from_u64(1);
        let (indices, _) = bootstrap_sample(50, 1.5, &mut rng);
        assert_eq!(indices.len(), 75);
    }

    #[test]
    fn test_oob_mask_consistent_with_draws() {
        let mut rng = StdRng::seed_from_u64(7);
        let (indices, mask) = bootstrap_sample(20, 1.0, &mut rng);
        for &idx in &indices {
            assert!(!mask[idx as usize]);
        }
    }
}
