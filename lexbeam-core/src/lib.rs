//! Lexbeam core types, score-matrix view, and error definitions.

pub mod error;
pub mod score;
pub mod types;

pub use error::{LexbeamError, Result};
pub use score::ScoreMatrix;
pub use types::{validate_phrases, RawPhrase, RawPhraseList, PAD_ID};
