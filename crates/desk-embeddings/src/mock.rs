//! Deterministic mock provider for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::provider::EmbeddingProvider;

/// Mock embedding provider.
///
/// Returns a vector derived deterministically from the input text (same text
/// always embeds the same), or a fixed vector when constructed with
/// [`MockEmbedder::returning`]. Failure can be toggled at any point to
/// exercise soft-failure paths, and every call is counted.
pub struct MockEmbedder {
    dimension: usize,
    fixed: Option<Vec<f32>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    /// Mock that synthesizes a per-text vector of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: None,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Mock that returns the same vector for every input.
    pub fn returning(values: Vec<f32>) -> Self {
        Self {
            dimension: values.len(),
            fixed: Some(values),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Mock that fails every call.
    pub fn failing(dimension: usize) -> Self {
        let mock = Self::new(dimension);
        mock.fail.store(true, Ordering::SeqCst);
        mock
    }

    /// Toggle failure mid-test.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of embed calls made so far (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn synthesize(&self, text: &str) -> Vec<f32> {
        // FNV-style mix of the text bytes; stable across runs
        let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            seed ^= u64::from(byte);
            seed = seed.wrapping_mul(0x0000_0100_0000_01b3);
        }

        (0..self.dimension)
            .map(|i| {
                let mixed = seed.wrapping_mul(2 * i as u64 + 1);
                ((mixed % 2000) as f32 / 1000.0) - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Api("mock provider failure".to_string()));
        }

        match &self.fixed {
            Some(values) => Ok(values.clone()),
            None => Ok(self.synthesize(text)),
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
