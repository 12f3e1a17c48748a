//! Error values produced by the generator. No part of this crate raises
//! exceptions or panics on caller-supplied input; every fallible operation
//! returns a [`Result`].

use std::fmt::{self, Debug, Display, Formatter};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single generation error: a [`Reason`] plus optional hints and a
/// machine-readable code.
#[derive(Debug)]
pub struct Error {
    pub reason: Reason,
    pub hints: Vec<String>,
    pub code: Option<&'static str>,
}

/// Closed set of error kinds the core must distinguish.
#[derive(Debug)]
pub enum Reason {
    /// Empty selection, ambiguous alias group, alias reused across two
    /// tables, or a required join chained behind an optional one.
    InvalidInput(String),
    /// Attempted to append bindable arguments to a sink that forbids them.
    RawArgumentsMode(String),
    /// A construct the renderer deliberately refuses to emit, e.g.
    /// `COUNT(alias.*)` or grouping-based `DELETE`/`UPDATE` on a
    /// non-unique group.
    Unsupported(String),
    /// A referenced table, column, or primary key could not be resolved
    /// against the live schema.
    Schema(String),
    /// Forwarded unchanged from the caller-supplied [`crate::Database`].
    Propagated(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            reason,
            hints: Vec::new(),
            code: None,
        }
    }

    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::new(Reason::InvalidInput(msg.into()))
    }

    pub fn raw_arguments_mode<S: Into<String>>(msg: S) -> Self {
        Error::new(Reason::RawArgumentsMode(msg.into()))
    }

    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::new(Reason::Unsupported(msg.into()))
    }

    pub fn schema<S: Into<String>>(msg: S) -> Self {
        Error::new(Reason::Schema(msg.into()))
    }

    pub fn propagated(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::new(Reason::Propagated(Box::new(source)))
    }
}

/// Fluent attachment of hints and codes.
pub trait WithErrorInfo: Sized {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;
    fn with_code(self, code: &'static str) -> Self;
}

impl WithErrorInfo for Error {
    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }

    fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }
}

impl<T> WithErrorInfo for Result<T> {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }

    fn with_code(self, code: &'static str) -> Self {
        self.map_err(|e| e.with_code(code))
    }
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Reason::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Reason::RawArgumentsMode(msg) => write!(f, "raw arguments mode: {msg}"),
            Reason::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Reason::Schema(msg) => write!(f, "schema error: {msg}"),
            Reason::Propagated(err) => write!(f, "{err}"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let code = self.code.map(|c| format!("[{c}] ")).unwrap_or_default();
        write!(f, "{code}{}", self.reason)?;
        for hint in &self.hints {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.reason {
            Reason::Propagated(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
