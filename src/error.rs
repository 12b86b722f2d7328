//! Error types and error handling strategy for blocksync.
//!
//! This module defines the error surface shared by every primitive in the
//! crate. Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Blocking operations surface their terminal state directly to the caller
//! - Release paths never fail observably

use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A blocking call was woken by a thread interrupt.
    Interrupted,
    /// A bounded wait elapsed without success.
    Timeout,
    /// Operation requested on a primitive that has been canceled.
    Canceled,
    /// Contract violation, e.g. releasing a checked semaphore past its
    /// maximum count.
    InvalidOperation,
    /// An underlying OS resource could not be obtained.
    Initialization,
    /// Detected reentry that would self-lock a non-recursive primitive.
    Deadlock,
    /// Internal library error (bug).
    Internal,
}

/// The main error type for blocksync operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents a thread interrupt.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self.kind, ErrorKind::Interrupted)
    }

    /// Returns true if this error represents an elapsed timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self.kind, ErrorKind::Canceled)
    }

    /// Adds deterministic context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Shorthand for an [`ErrorKind::Interrupted`] error.
    #[must_use]
    pub const fn interrupted() -> Self {
        Self::new(ErrorKind::Interrupted)
    }

    /// Shorthand for an [`ErrorKind::Timeout`] error.
    #[must_use]
    pub const fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    /// Shorthand for an [`ErrorKind::Canceled`] error.
    #[must_use]
    pub const fn canceled() -> Self {
        Self::new(ErrorKind::Canceled)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context string on error.
    fn context(self, ctx: impl Into<String>) -> Result<T>;
    /// Attach context computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(ctx))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

/// A specialized Result type for blocksync operations.
pub type Result<T> = core::result::Result<T, Error>;
