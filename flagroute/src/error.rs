//! Error types
//!
//! Registration errors (signature, tag and default problems) are programming
//! mistakes and are returned from the registration calls. Run-time errors come
//! from the flag engine and carry the usage text of the command they concern.

use thiserror::Error;

/// Boxed error returned by user parse hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while registering callables or running the router.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler parameter is neither a context nor an options struct, or sits
    /// in a position where its kind is not accepted.
    #[error("handler arg must be a context or an options struct, found {found} at position {position}")]
    UnsupportedHandlerShape { found: String, position: usize },

    /// A handler takes more parameters than any supported shape.
    #[error("handler func can only receive 0, 1 or 2 args, found {arity}")]
    InvalidHandlerSignature { arity: usize },

    /// A middleware's parameters do not match any supported shape.
    #[error("invalid middleware signature ({params}): {reason}")]
    InvalidMiddlewareSignature { params: String, reason: &'static str },

    /// A middleware takes more than three parameters.
    #[error("middleware func can only receive no more than 3 args, found {arity}")]
    TooManyMiddlewareArgs { arity: usize },

    /// A short flag annotation is not exactly one character.
    #[error("invalid short tag {tag:?}: length must be 1")]
    InvalidShortTag { tag: String },

    /// A literal could not be parsed as the declared type.
    #[error("cannot parse {literal:?} as {type_name}: {reason}")]
    MalformedDefault {
        literal: String,
        type_name: &'static str,
        reason: String,
    },

    /// A map entry did not split into exactly one key and one value.
    #[error("cannot convert {entry:?} to key value pair")]
    MalformedKeyValue { entry: String },

    /// The declared type has no coercion rule.
    #[error("unsupported type: {type_name}")]
    UnsupportedType { type_name: &'static str },

    /// A user parse hook rejected a literal.
    #[error("cannot parse {literal:?} as {type_name}: {source}")]
    ParseHook {
        literal: String,
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    /// Binding a single options field failed.
    #[error("field `{field}`: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Two bound options share a short or long identifier in one command.
    #[error("duplicate option {flag} in command `{command}`")]
    DuplicateOption { flag: String, command: String },

    /// A scope already has a handler.
    #[error("a handler is already registered for `{command}`")]
    DuplicateHandler { command: String },

    /// The selected command has no handler.
    #[error("no executable handler registered for `{command}`")]
    NoExecFunc { command: String, usage: String },

    /// A required option was not supplied.
    #[error("no input value: {message}")]
    NoInputValue { message: String, usage: String },

    /// Help was requested; `usage` holds the rendered help.
    #[error("flag: help requested")]
    Help { usage: String },

    /// The command line could not be parsed.
    #[error("{message}")]
    Parse { message: String, usage: String },

    /// A supplied value could not be converted to the option's type.
    #[error("invalid value for {flag}: {source}")]
    InvalidValue {
        flag: String,
        usage: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn malformed(
        literal: impl Into<String>,
        type_name: &'static str,
        reason: impl ToString,
    ) -> Self {
        Self::MalformedDefault {
            literal: literal.into(),
            type_name,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn in_field(self, field: &'static str) -> Self {
        Self::Field {
            field,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through `Field` and `InvalidValue` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Field { source, .. } | Self::InvalidValue { source, .. } => source.root(),
            other => other,
        }
    }

    /// Usage text attached to run-time errors.
    pub fn usage(&self) -> Option<&str> {
        match self {
            Self::NoExecFunc { usage, .. }
            | Self::NoInputValue { usage, .. }
            | Self::Help { usage }
            | Self::Parse { usage, .. }
            | Self::InvalidValue { usage, .. } => Some(usage),
            _ => None,
        }
    }

    /// Whether this error was raised while registering a callable.
    pub fn is_registration(&self) -> bool {
        !matches!(
            self,
            Self::NoExecFunc { .. }
                | Self::NoInputValue { .. }
                | Self::Help { .. }
                | Self::Parse { .. }
                | Self::InvalidValue { .. }
        )
    }
}
