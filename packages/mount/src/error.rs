//! Error types for building mount trees from configuration.

/// Errors raised while turning configuration into generators.
///
/// Resolution itself never fails; only the configuration layer returns these.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown generator moniker: {moniker}")]
    UnknownMoniker { moniker: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("factory error: {message}")]
    Factory { message: String },
}
