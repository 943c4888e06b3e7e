pub mod classification;
pub mod constructors;
pub mod helpers;
pub mod types;

pub use constructors::*;
pub use helpers::{ConnectionClosed, NoCandidates, NotOpen, OperationCanceled, TimedOut};
pub use types::{Error, Inner, Kind, Result};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::io;

    use super::*;

    #[test]
    fn test_display_includes_target() {
        let err = connect(io::Error::from(io::ErrorKind::ConnectionRefused))
            .with_target("example.com", 443);
        assert_eq!(
            err.to_string(),
            "failed to connect to any resolved address (example.com:443)"
        );
        assert!(err.is_connect());
        assert_eq!(err.kind(), Kind::Connect);
    }

    #[test]
    fn test_timeout_found_in_source_chain() {
        assert!(transport(TimedOut).is_timeout());
        assert!(connect(io::Error::from(io::ErrorKind::TimedOut)).is_timeout());
        assert!(!transport(ConnectionClosed).is_timeout());
    }

    #[test]
    fn test_reset_classification() {
        assert!(transport(io::Error::from(io::ErrorKind::ConnectionReset)).is_reset());
        assert!(!transport(io::Error::from(io::ErrorKind::Other)).is_reset());
    }

    #[test]
    fn test_canceled_carries_marker() {
        let err = canceled();
        assert!(err.is_canceled());
        assert!(err.source().is_some_and(|s| s.is::<OperationCanceled>()));
    }
}
