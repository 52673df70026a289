//! Errors raised while loading dashboard configuration and resolving paths.

use thiserror::Error;

/// Failure to read, parse or validate `~/.dashboard/config.json` or the
/// values derived from it.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A config value is present but unusable, such as an empty Supabase URL.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `supabase_url` or `web_app_url` does not parse.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The config file is not valid JSON for [`Config`](crate::Config).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory to root `~/.dashboard` in.
    #[error("Path error: {0}")]
    Path(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
