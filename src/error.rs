// src/error.rs
//! Error handling for the material core.
//!
//! - Contract violations (slot/layer/sub-material indices past the declared
//!   count) come back as [`Error::OutOfRange`] instead of undefined behaviour.
//! - Missing lookups (unknown surface type, unknown shader) are *not* errors;
//!   those APIs return `Option` and callers check.
//! - Context chaining, `is_*` helpers and a crate-wide [`Result`] alias.

use thiserror::Error;

/// Main error type. Send + Sync + 'static so it can cross loader threads.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An index was outside the range the caller declared earlier
    /// (`set_sub_material_count`, `set_layer_count`, texture slot table).
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A texture slot name that no registry row answers to.
    #[error("unknown texture slot '{0}'")]
    UnknownTextureSlot(String),

    /// The operation is compiled in but switched off by configuration.
    #[error("{0} is disabled by configuration")]
    Unsupported(&'static str),

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization of configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Simple custom message (allocation only when error happens).
    #[error("{0}")]
    Custom(String),

    /// An error annotated with the material it came from.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a custom error message.
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::OutOfRange { what, index, len }
    }

    /// Add context to any error (chainable).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    #[inline]
    pub fn is_out_of_range(&self) -> bool {
        match self {
            Error::OutOfRange { .. } => true,
            Error::WithContext { source, .. } => source.is_out_of_range(),
            _ => false,
        }
    }

    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }

    #[inline]
    pub fn is_config(&self) -> bool {
        matches!(self, Error::InvalidConfig(_) | Error::Json(_))
    }
}

/// Convenient `Result` alias, use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;
