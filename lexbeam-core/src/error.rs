use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexbeamError {
    #[error("Empty constraint phrase at index {0}")]
    EmptyPhrase(usize),

    #[error("Reserved token id 0 in constraint phrase at index {0}")]
    ReservedToken(usize),

    #[error("Token id {token} out of vocabulary (size {vocab_size})")]
    OutOfVocabulary { token: u32, vocab_size: usize },

    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LexbeamError>;
