use thiserror::Error;

/// Caller contract violations. Everything else the engine encounters is
/// resolved into a disabled result with a reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("flag '{flag_key}' uses targeting rules but the context carries no attributes")]
    MissingAttributes { flag_key: String },
}
