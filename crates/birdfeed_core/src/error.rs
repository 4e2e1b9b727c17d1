use miette::Diagnostic;
use thiserror::Error;

/// Errors produced by the stream, rewrite, and delivery core.
///
/// Validation and enrichment failures are contained at the post level (the
/// post is skipped or degraded); stream-level failures feed the session
/// manager's reconnect scheduling. Nothing here terminates the process.
#[derive(Error, Diagnostic, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("Post failed validation: {reason}")]
    #[diagnostic(
        code(birdfeed_core::invalid_post),
        help("The record is missing fields required for formatting; the post is skipped")
    )]
    InvalidPost { reason: String },

    #[error("Malformed entity annotation: {reason}")]
    #[diagnostic(
        code(birdfeed_core::invalid_entity),
        help("URL annotations must carry an expanded URL and a two-element index span")
    )]
    InvalidEntity { reason: String },

    #[error("Stream connection failed ({status} {status_text}) at {url}")]
    #[diagnostic(
        code(birdfeed_core::stream_fault),
        help("The session manager reschedules the connection with exponential backoff")
    )]
    StreamFault {
        url: String,
        status: u16,
        status_text: String,
    },

    #[error("Rate limited by the stream source at {url}")]
    #[diagnostic(
        code(birdfeed_core::rate_limited),
        help("Reconnection is scheduled after a fixed cooldown; backoff state is not consumed")
    )]
    RateLimited { url: String },

    #[error("Preview fetch for {url} failed: {cause}")]
    #[diagnostic(
        code(birdfeed_core::enrichment_failed),
        help("Link previews degrade to none; the post is still delivered")
    )]
    Enrichment { url: String, cause: String },

    #[error("Delivery to {destination} failed: {cause}")]
    #[diagnostic(code(birdfeed_core::delivery_failed))]
    Delivery { destination: String, cause: String },

    #[error("Subscription store operation {operation} failed: {cause}")]
    #[diagnostic(code(birdfeed_core::subscription_store))]
    Store { operation: String, cause: String },

    #[error("Stream session already live")]
    #[diagnostic(
        code(birdfeed_core::session_already_live),
        help("Destroy the current session before creating another; at most one connection may exist")
    )]
    SessionAlreadyLive,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
