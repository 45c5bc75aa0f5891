//! The closed error taxonomy shared by every analysis crate.
//!
//! Grounded on `absl::StatusOr`/`absl::Status` as used throughout
//! `nudl/analysis/*.cc`: every fallible operation returns a `Result`, never
//! panics or throws, and failures carry a kind drawn from a closed set plus
//! a stack of context annotations appended by the call chain (mirroring the
//! `_ << "context"` chaining on `RETURN_IF_ERROR`/`ASSIGN_OR_RETURN`).

use std::fmt;

/// The closed set of ways an analysis operation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad shape or arity; failed unification.
    InvalidArgument,
    /// Missing name, type, or field.
    NotFound,
    /// Duplicate declaration.
    AlreadyExists,
    /// A once-only mutation was attempted twice, or the operation would
    /// violate an invariant.
    FailedPrecondition,
    /// The feature is not supported for this variant.
    Unimplemented,
    /// Invariant violation. The only kind that should never occur in
    /// correct code; it is the Rust equivalent of `RET_CHECK`/`CHECK`.
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::NotFound => "not-found",
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::FailedPrecondition => "failed-precondition",
            ErrorKind::Unimplemented => "unimplemented",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced by the analyzer or emitter.
///
/// Carries an annotation stack rather than a single message: each layer of
/// the call chain that wants to add context pushes onto `annotations`
/// instead of discarding the original message. `kBugNotice` from
/// `named_object.h` is reproduced verbatim for the `Internal` kind so a
/// report naturally reads as a bug report.
#[derive(Debug, Clone)]
pub struct NudlError {
    kind: ErrorKind,
    annotations: Vec<String>,
}

const BUG_NOTICE: &str = "; This is a bug, pls. report";

impl NudlError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            annotations: vec![message.into()],
        }
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    #[must_use]
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FailedPrecondition, message)
    }

    #[must_use]
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unimplemented, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Appends a context annotation, returning `self` for chaining at
    /// `?`-propagation sites (`op().context("...")?`).
    #[must_use]
    pub fn context(mut self, message: impl Into<String>) -> Self {
        self.annotations.push(message.into());
        self
    }

    #[must_use]
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }
}

impl fmt::Display for NudlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.annotations[0])?;
        for annotation in &self.annotations[1..] {
            write!(f, "; {annotation}")?;
        }
        if self.kind == ErrorKind::Internal {
            write!(f, "{BUG_NOTICE}")?;
        }
        Ok(())
    }
}

impl std::error::Error for NudlError {}

/// The uniform result type returned by analysis and emission operations.
pub type NudlResult<T> = Result<T, NudlError>;

/// Extension trait giving `Result<T, NudlError>` a `.context(...)`
/// combinator, the Rust counterpart of the source's `_ << "..."` annotation
/// chaining on `RETURN_IF_ERROR`/`ASSIGN_OR_RETURN`.
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> NudlResult<T>;
    fn with_context(self, make_message: impl FnOnce() -> String) -> NudlResult<T>;
}

impl<T> ResultExt<T> for NudlResult<T> {
    fn context(self, message: impl Into<String>) -> NudlResult<T> {
        self.map_err(|e| e.context(message))
    }

    fn with_context(self, make_message: impl FnOnce() -> String) -> NudlResult<T> {
        self.map_err(|e| e.context(make_message()))
    }
}
