use thiserror::Error;

/// Why a single page could not be retrieved. Every transport problem and
/// every non-2xx answer ends up as one of these; nothing else escapes a fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request timed out")]
    Timeout,

    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("http status {0}")]
    HttpStatus(u16),

    #[error("body too large ({0} bytes)")]
    BodyTooLarge(u64),
}

impl FetchError {
    /// Whether a later attempt at the same target could plausibly succeed.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::InvalidUrl(_) => false,
            Self::BodyTooLarge(_) => false,
            Self::HttpStatus(code) => *code == 429 || (500..600).contains(code),

            Self::Timeout => true,
            Self::Unreachable(_) => true,
        }
    }

    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::HttpStatus(status.as_u16())
        } else if err.is_redirect() {
            Self::Unreachable(format!("redirect loop: {err}"))
        } else {
            // DNS, connect, TLS and mid-body resets
            Self::Unreachable(err.to_string())
        }
    }
}
