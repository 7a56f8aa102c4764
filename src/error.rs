use reqwest::StatusCode;

/// The primary error type for the application.
///
/// Store-level variants are local validation failures and are raised before
/// any field is written. Transport failures are passed through untouched and
/// never mutate the store.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A bucket was selected that is not in the known bucket set.
    #[error("Invalid selection: bucket '{0}' is not known")]
    InvalidSelection(String),
    /// A file operation was attempted with no bucket chosen.
    #[error("No bucket selected")]
    NoBucketSelected,
    /// A file was toggled that is not in the current file set.
    #[error("Unknown file: '{0}'")]
    UnknownFile(String),
    /// A file action needs at least one selected file.
    #[error("No files selected")]
    NothingSelected,
    /// A bucket or file name failed validation.
    #[error("Invalid {kind} name: {reason}")]
    InvalidName {
        /// Either "bucket" or "file".
        kind: &'static str,
        reason: String,
    },
    /// Processing was requested without naming an algorithm.
    #[error("No algorithms given")]
    NoAlgorithms,
    /// Some downloads failed. Files listed as saved are on disk.
    #[error("Download incomplete: {saved} of {total} file(s) saved; failed: {failures}")]
    DownloadIncomplete {
        saved: usize,
        total: usize,
        /// `name (reason)` entries, comma separated.
        failures: String,
    },
    /// The backend call failed. The store keeps its last-known-good lists.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
    /// Reading upload sources or writing downloads failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures surfaced by a [`Transport`](crate::transport::Transport).
///
/// The store does not interpret these; they are reported to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    /// Failure reported by a non-HTTP transport.
    #[error("{0}")]
    Other(String),
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that turns a missing bucket selection into
/// [`AppError::NoBucketSelected`].
pub trait OptionExt<T> {
    fn ok_or_no_bucket(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_no_bucket(self) -> AppResult<T> {
        self.ok_or(AppError::NoBucketSelected)
    }
}
