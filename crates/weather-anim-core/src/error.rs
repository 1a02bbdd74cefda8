//! Error types shared across the crate.

use core::fmt::Write;

use thiserror_no_std::Error;

/// Maximum length of the human-readable detail carried by an error.
pub const ERROR_DETAIL_LEN: usize = 64;

/// Short, fixed-capacity error detail string.
pub type ErrorDetail = heapless::String<ERROR_DETAIL_LEN>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeatherError {
    #[error("No network connectivity")]
    Connectivity,
    #[error("HTTP request failed with status {0}")]
    Http(u16),
    #[error("HTTP request timed out")]
    Timeout,
    #[error("Could not parse response: {0}")]
    Parse(ErrorDetail),
    #[error("Buffer allocation failed")]
    Allocation,
    #[error("Image decode failed: {0}")]
    Decode(ErrorDetail),
    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },
    #[error("Invalid configuration: {0}")]
    Config(ErrorDetail),
}

impl WeatherError {
    pub fn parse(detail: impl core::fmt::Display) -> Self {
        Self::Parse(detail_from(detail))
    }

    pub fn decode(detail: impl core::fmt::Display) -> Self {
        Self::Decode(detail_from(detail))
    }

    pub fn config(detail: impl core::fmt::Display) -> Self {
        Self::Config(detail_from(detail))
    }
}

/// Render `detail` into an [`ErrorDetail`], silently truncating at capacity.
pub fn detail_from(detail: impl core::fmt::Display) -> ErrorDetail {
    let mut out = Truncating(ErrorDetail::new());
    // Truncating never reports an error.
    let _ = write!(out, "{}", detail);
    out.0
}

struct Truncating(ErrorDetail);

impl Write for Truncating {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_detail_truncates_at_capacity() {
        let long = "x".repeat(200);
        let detail = detail_from(&long);
        assert_eq!(detail.len(), ERROR_DETAIL_LEN);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            WeatherError::Http(404).to_string(),
            "HTTP request failed with status 404"
        );
        assert_eq!(
            WeatherError::parse("missing state").to_string(),
            "Could not parse response: missing state"
        );
    }
}
