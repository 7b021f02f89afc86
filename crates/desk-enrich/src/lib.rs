//! Embedding lifecycle and thesis enrichment.
//!
//! Three pieces keep derived data in step with entity writes:
//! - [`Enricher`]: post-write hooks that re-embed (and re-extract) softly
//! - [`Backfill`]: serial, rate-paced bulk embedding runs
//! - [`ThesisExtractor`]: structured extraction from free-text theses

pub mod backfill;
pub mod error;
pub mod extract;
pub mod hooks;

pub use backfill::{Backfill, BackfillStats};
pub use error::{EnrichError, ExtractionError};
pub use extract::{ExtractorConfig, MockExtractor, OpenAiExtractor, ThesisExtractor};
pub use hooks::{EmbedStatus, Enricher};
