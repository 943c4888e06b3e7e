use super::BoxError;
use super::helpers::{NoCandidates, OperationCanceled};
use super::types::{Error, Kind};

/// Creates an `Error` for invalid configuration.
pub fn config<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Config).with(e.into())
}

/// Creates an `Error` for a resolution failure.
pub fn resolve<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Resolve).with(e.into())
}

/// Creates an `Error` for a resolver that answered with zero addresses.
pub fn no_candidates() -> Error {
    Error::new(Kind::Resolve).with(NoCandidates)
}

/// Creates an `Error` for candidate exhaustion, carrying the last observed error.
pub fn connect<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connect).with(e.into())
}

/// Creates an `Error` for a mid-session read/write failure.
pub fn transport<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Transport).with(e.into())
}

/// Creates an `Error` for a TLS handshake failure.
pub fn handshake<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Handshake).with(e.into())
}

/// Creates an `Error` for an admission denied by the connection ceiling.
pub fn overload(active: usize, max: usize) -> Error {
    Error::new(Kind::Overload).with(format!("{active} of {max} connection slots in use"))
}

/// Creates an `Error` for an operation aborted by `close()`.
pub fn canceled() -> Error {
    Error::new(Kind::Canceled).with(OperationCanceled)
}

/// Creates an `Error` for a caller contract violation.
pub fn programming<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Programming).with(e.into())
}
