use thiserror::Error;

/// Error taxonomy for the search core.
///
/// `NotIndexed` is deliberately absent: a missing lemma or word is not an
/// error anywhere in this crate, it surfaces as an empty `Option` or empty
/// posting list. `Timeout` is likewise absent — it is the caller's
/// responsibility, enforced outside the core (e.g. by the HTTP layer).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InputError(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("lexicon identifier space exhausted")]
    LexiconFull,
}

pub type Result<T> = std::result::Result<T, EngineError>;
