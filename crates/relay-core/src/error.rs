//! Error taxonomy for the copy-trade relay (spec §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// REST/stream source unreachable or returned a 5xx. Transient.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Malformed record from the upstream (missing required field). Permanent for that record.
    #[error("upstream returned malformed data: {0}")]
    UpstreamBadData(String),

    /// Exchange declined the order (insufficient balance, market closed, invalid params). Terminal.
    #[error("exchange rejected order: {0}")]
    ExchangeRejected(String),

    /// Exchange call timed out, rate-limited, or hit a 5xx. Transient.
    #[error("exchange call failed transiently: {0}")]
    ExchangeTransient(String),

    /// Store failure, serialization error, or other internal fault. Transient.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error classifies as transient (retry) vs. permanent (terminal).
    ///
    /// Mirrors the taxonomy in spec §7: categories 1, 6, 8 are transient; 2 and 7
    /// are permanent for the affected record/intent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable(_)
                | Error::ExchangeTransient(_)
                | Error::Internal(_)
                | Error::Http(_)
                | Error::WebSocket(_)
                | Error::Database(_)
        )
    }
}
