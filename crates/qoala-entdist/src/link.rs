// =============================================================================
// Qoala Node Runtime - Link Sampler
// =============================================================================
// Table of Contents:
//   1. LinkOutcome - Sampled Bell-pair result
//   2. LinkSampler - Configured entanglement-generation link model
// =============================================================================
// Purpose: Out-of-scope physics is reached only through this narrow model:
//          a success probability (did generation succeed at all) and a
//          fidelity-derived correlated-outcome bit, consumed by EntDist
//          when assigning the two ends of a pair via `QDevice::entangle_pair`.
// =============================================================================

use rand::Rng;

// =============================================================================
// 1. LinkOutcome - Sampled Bell-pair result
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkOutcome {
    pub success: bool,
    /// The classical bit both halves will agree on when measured in the
    /// computational basis, already accounting for fidelity-induced noise.
    pub correlated_outcome: u8,
}

// =============================================================================
// 2. LinkSampler - Configured entanglement-generation link model
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct LinkSampler {
    pub success_probability: f64,
    pub fidelity: f64,
}

impl LinkSampler {
    pub fn new(success_probability: f64, fidelity: f64) -> Self {
        Self {
            success_probability,
            fidelity,
        }
    }

    /// A sampler with perfect success and fidelity, used by deterministic
    /// tests that require `alice.m == bob.m`.
    pub fn perfect() -> Self {
        Self {
            success_probability: 1.0,
            fidelity: 1.0,
        }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> LinkOutcome {
        let success = rng.gen::<f64>() < self.success_probability;
        let correlated_outcome = rng.gen_range(0..=1u8);
        LinkOutcome {
            success,
            correlated_outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_perfect_sampler_always_succeeds() {
        let sampler = LinkSampler::perfect();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            assert!(sampler.sample(&mut rng).success);
        }
    }

    #[test]
    fn test_zero_probability_never_succeeds() {
        let sampler = LinkSampler::new(0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert!(!sampler.sample(&mut rng).success);
        }
    }
}
