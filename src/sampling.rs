//! Bootstrap sampling with out-of-bag bookkeeping.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A bootstrap draw over `[0, n_samples)`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BootstrapSample {
    /// `n_samples` indices drawn uniformly with replacement, in draw order.
    pub in_bag: Vec<usize>,
    /// Indices never drawn, ascending. Roughly 36.8% of rows for large n.
    pub out_of_bag: Vec<usize>,
}

/// Draw a bootstrap sample of size `n_samples` from a fresh seeded RNG.
///
/// Deterministic: the same `(n_samples, seed)` pair always produces the
/// same draw.
#[must_use]
pub fn bootstrap_sample(n_samples: usize, seed: u64) -> BootstrapSample {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    bootstrap_sample_with(n_samples, &mut rng)
}

/// Draw a bootstrap sample from the caller's RNG stream.
pub(crate) fn bootstrap_sample_with(n_samples: usize, rng: &mut impl Rng) -> BootstrapSample {
    let mut seen = vec![false; n_samples];
    let mut in_bag = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let idx = rng.gen_range(0..n_samples);
        in_bag.push(idx);
        seen[idx] = true;
    }
    let out_of_bag: Vec<usize> = (0..n_samples).filter(|&i| !seen[i]).collect();
    BootstrapSample { in_bag, out_of_bag }
}
