// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

/// The result for fallible cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error produced by a resolver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error that can occur while building or using an [`LruCache`][crate::LruCache].
///
/// There are three sources of errors:
///
/// * Configuration problems, raised by [`CacheBuilder::build`][crate::CacheBuilder::build]
///   and [`CacheConfig::from_json`][crate::CacheConfig::from_json]. No cache is created.
/// * Resolver failures. The error returned by the resolver is shared by every caller
///   that waited on the same resolution and is available through
///   [`source()`][std::error::Error::source].
/// * Abandoned resolutions, where the task running the resolver was dropped or the
///   resolver panicked before producing an outcome.
///
/// The error is cheap to clone so that a single outcome can be handed to all waiters.
///
/// # Examples
///
/// ```
/// use lruflight::CacheConfig;
///
/// let error = CacheConfig::from_json(r#"{ "max": -1 }"#).unwrap_err();
/// assert!(error.is_config());
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct Error(ErrorKind);

#[derive(Debug, Clone, thiserror::Error)]
enum ErrorKind {
    #[error("invalid cache configuration: {0}")]
    Config(Cow<'static, str>),

    #[error("invalid cache configuration: {0}")]
    ConfigDocument(#[source] Arc<serde_json::Error>),

    #[error("resolver failed: {0}")]
    Resolve(#[source] Arc<dyn std::error::Error + Send + Sync + 'static>),

    #[error("resolution was abandoned before it produced an outcome")]
    Abandoned,
}

impl Error {
    pub(crate) fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self(ErrorKind::Config(message.into()))
    }

    pub(crate) fn config_document(error: serde_json::Error) -> Self {
        Self(ErrorKind::ConfigDocument(Arc::new(error)))
    }

    pub(crate) fn resolve(error: BoxError) -> Self {
        Self(ErrorKind::Resolve(Arc::from(error)))
    }

    pub(crate) const fn abandoned() -> Self {
        Self(ErrorKind::Abandoned)
    }

    /// Returns `true` if the error was caused by invalid cache configuration.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self.0, ErrorKind::Config(_) | ErrorKind::ConfigDocument(_))
    }

    /// Returns `true` if the error was returned by a resolver.
    #[must_use]
    pub fn is_resolve(&self) -> bool {
        matches!(self.0, ErrorKind::Resolve(_))
    }

    /// Returns `true` if the resolution was abandoned before producing an outcome.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        matches!(self.0, ErrorKind::Abandoned)
    }
}
