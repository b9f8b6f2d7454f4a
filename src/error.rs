use std::fmt;

use serde::{de, ser};

use crate::coerce::ScalarError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The top-level value handed to `marshal`/`unmarshal` was not a struct. `role` is either
    /// "source" or "destination", `actual` names the shape that was seen instead.
    #[error("{role} ({actual}) must be a struct")]
    ShapeMismatch {
        role: &'static str,
        actual: &'static str,
    },
    /// A field failed to decode. Carries the field's logical key.
    #[error("unable to decode key '{key}': {source}")]
    Decode { key: String, source: Box<Error> },
    /// A field failed to encode. Carries the field's logical key.
    #[error("unable to encode key '{key}': {source}")]
    Encode { key: String, source: Box<Error> },
    /// Locates a failure inside a sequence element or dynamic-map entry.
    #[error("{context}: {source}")]
    Context { context: String, source: Box<Error> },
    /// The value's shape has no form representation.
    #[error("unsupported kind {0}")]
    UnsupportedKind(&'static str),
    /// The bracketed-key matcher could not be built for a logical key.
    #[error("invalid key pattern for '{key}': {source}")]
    Pattern { key: String, source: regex::Error },
    #[error(transparent)]
    Scalar(#[from] ScalarError),
    /// Raised through serde by a `Serialize`/`Deserialize` implementation, including failures
    /// reported by a text capability.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub(crate) fn shape(role: &'static str, actual: &'static str) -> Self {
        Error::ShapeMismatch { role, actual }
    }

    pub(crate) fn context(context: impl Into<String>, source: Error) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Attribute this error to a field being decoded. Errors that already name a key are left
    /// alone, so a failure deep inside a nested record keeps its own key.
    pub(crate) fn decoding(self, key: &str) -> Self {
        match self {
            Error::Decode { .. } | Error::Pattern { .. } | Error::ShapeMismatch { .. } => self,
            other => Error::Decode {
                key: key.to_owned(),
                source: Box::new(other),
            },
        }
    }

    /// Attribute this error to a field being encoded.
    pub(crate) fn encoding(self, key: &str) -> Self {
        match self {
            Error::Encode { .. } | Error::ShapeMismatch { .. } => self,
            other => Error::Encode {
                key: key.to_owned(),
                source: Box::new(other),
            },
        }
    }

    /// The logical key this error is attributed to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Error::Decode { key, .. } | Error::Encode { key, .. } | Error::Pattern { key, .. } => {
                Some(key)
            }
            _ => None,
        }
    }

    /// The innermost error, skipping over field attribution and sub-path context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Decode { source, .. }
            | Error::Encode { source, .. }
            | Error::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}
