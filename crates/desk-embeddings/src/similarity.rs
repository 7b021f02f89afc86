//! Cosine similarity, the numeric core of semantic ranking.
//!
//! This is the single shared implementation; every scoring call site in the
//! workspace routes through here.

/// Cosine similarity between two vectors, in [-1, 1].
///
/// Returns 0.0 when either vector has zero norm, and 0.0 when the lengths
/// differ (documented policy: a provider dimension change degrades scores
/// instead of panicking or indexing out of bounds). Pure and deterministic.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot / denominator
}

/// Round a similarity score to 4 decimal places for presentation.
pub fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_identical_vectors_score_one() {
        let v = vec![0.3, -1.2, 4.5, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_orthogonal_vectors_score_zero() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_vectors_score_negative_one() {
        let a = [2.0, 0.0];
        let b = [-5.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_norm_returns_zero() {
        let zero = [0.0, 0.0, 0.0];
        let other = [1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
        assert_eq!(cosine_similarity(&other, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_length_mismatch_returns_zero() {
        let a = [1.0, 2.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_scale_invariance() {
        let a = [1.0, 2.0, 3.0];
        let b = [10.0, 20.0, 30.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_random_vectors_stay_in_bounds() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let a: Vec<f32> = (0..64).map(|_| rng.random_range(-10.0..10.0)).collect();
            let b: Vec<f32> = (0..64).map(|_| rng.random_range(-10.0..10.0)).collect();

            let sim = cosine_similarity(&a, &b);
            assert!(sim.is_finite());
            assert!(
                (-1.0 - 1e-5..=1.0 + 1e-5).contains(&sim),
                "out of bounds: {}",
                sim
            );
            // Presented scores are exactly in bounds after rounding
            let rounded = round_score(sim);
            assert!((-1.0..=1.0).contains(&rounded));
        }
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.123_456), 0.1235);
        assert_eq!(round_score(0.99999), 1.0);
        assert_eq!(round_score(-0.123_44), -0.1234);
        assert_eq!(round_score(0.0), 0.0);
    }
}
