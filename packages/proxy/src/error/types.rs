use std::error::Error as StdError;
use std::fmt;

/// A Result alias where the Err case is `marvin_proxy::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors raised by the connection substrate.
pub struct Error {
    pub inner: Box<Inner>,
}

pub struct Inner {
    pub kind: Kind,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    /// `host:port` the failing operation was aimed at, when known.
    pub target: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Invalid configuration supplied before listen/connect
    Config,
    /// No endpoint candidates could be resolved
    Resolve,
    /// Every resolved candidate refused, was unreachable, or timed out
    Connect,
    /// Read/write failure in the middle of a session
    Transport,
    /// TLS handshake failure (encrypted variant only)
    Handshake,
    /// Admission denied by the connection ceiling
    Overload,
    /// Operation aborted by an explicit close
    Canceled,
    /// Contract violation by the caller, fatal for the offending handler only
    Programming,
}

impl Error {
    pub fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                source: None,
                target: None,
            }),
        }
    }

    #[must_use = "Error builder methods return a new Error and should be used"]
    pub fn with<E: Into<Box<dyn StdError + Send + Sync>>>(mut self, source: E) -> Error {
        self.inner.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_target(mut self, host: &str, port: u16) -> Self {
        self.inner.target = Some(format!("{host}:{port}"));
        self
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// Get the `host:port` associated with this error, if any
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.inner.target.as_deref()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("marvin_proxy::Error");

        f.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }

        if let Some(ref target) = self.inner.target {
            f.field("target", target);
        }

        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Config => f.write_str("invalid configuration")?,
            Kind::Resolve => f.write_str("failed to resolve host")?,
            Kind::Connect => f.write_str("failed to connect to any resolved address")?,
            Kind::Transport => f.write_str("transport error")?,
            Kind::Handshake => f.write_str("tls handshake failed")?,
            Kind::Overload => f.write_str("connection rejected, server at capacity")?,
            Kind::Canceled => f.write_str("operation canceled")?,
            Kind::Programming => f.write_str("connection used outside its contract")?,
        }

        if let Some(ref target) = self.inner.target {
            write!(f, " ({target})")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}
