//! Error types for template resolution
//!
//! The error system follows two principles:
//!
//! 1. **Strongly-typed variants** for precise handling in code: every
//!    failure mode of the pipeline (normalization, load, parse, options
//!    factory) has its own [`ResolveError`] variant.
//! 2. **Memoizable failures**: a failure during a resolution attempt is
//!    stored in the cache next to positive outcomes. Within the freshness
//!    window the same error is replayed to every caller, wrapped as
//!    [`ResolveError::PreviousAttemptFailed`] with the original preserved
//!    as the `source()` of the chain.
//!
//! Error values are not `Clone` (they may carry `std::io::Error`), so the
//! memoized form is [`SharedResolveError`], an `Arc`-backed handle. The
//! first caller to hit a failure receives it as the transparent
//! [`ResolveError::Shared`] variant, which displays and chains exactly like
//! the original error.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A template name rejected by normalization.
///
/// Raised for backslashes, `:` outside a scheme prefix, NUL characters, and
/// `..` steps that would climb above the template root.
#[derive(Debug, Error)]
#[error("malformed template name {name:?}: {reason}")]
pub struct MalformedNameError {
    /// The name as the caller supplied it.
    pub name: String,
    /// Human-readable rule that was violated.
    pub reason: String,
}

impl MalformedNameError {
    pub(crate) fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { name: name.into(), reason: reason.into() }
    }
}

/// The error type of [`TemplateResolver`](crate::resolver::TemplateResolver)
/// operations.
///
/// A *missing* template is never reported through this type; see
/// [`GetTemplateResult`](crate::resolver::GetTemplateResult). `ResolveError`
/// covers normalization failures and everything that went wrong while the
/// backing store or the parser was consulted.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The requested name failed normalization.
    #[error(transparent)]
    MalformedName(#[from] MalformedNameError),

    /// The backing store failed while probing or reading a template.
    #[error("I/O error while loading template {name:?}")]
    Load {
        /// Normalized template name of the failed resolution.
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The parser rejected the template content.
    #[error("failed to parse template {name:?} (from {source_name:?}): {cause:#}")]
    Parse {
        /// Normalized requested name.
        name: String,
        /// Name the lookup actually resolved to (localized/acquired form).
        source_name: String,
        /// Parser-reported failure.
        cause: anyhow::Error,
    },

    /// The per-template options factory failed; treated like a load
    /// failure for memoization purposes.
    #[error("template options factory failed for {source_name:?}: {cause:#}")]
    OptionsFactory {
        /// Name the lookup resolved to.
        source_name: String,
        /// Factory-reported failure.
        cause: anyhow::Error,
    },

    /// A charset label (configured, embedded, or parser-declared) is not a
    /// known encoding.
    #[error("unsupported charset {charset:?} for template {name:?}")]
    UnsupportedCharset {
        /// Normalized template name.
        name: String,
        /// The unrecognized label.
        charset: String,
    },

    /// The backing store violated the loader contract (for example,
    /// reported "not modified" when no prior artifact was offered).
    #[error("template loader contract violation for {name:?}: {detail}")]
    LoaderContract {
        /// Normalized template name.
        name: String,
        /// What the loader did wrong.
        detail: String,
    },

    /// Replay of a failure memoized by an earlier resolution attempt of
    /// the same cache key, within the freshness window.
    #[error("error on an earlier resolution attempt of template {name:?}; see cause")]
    PreviousAttemptFailed {
        /// Normalized template name.
        name: String,
        /// The memoized original failure.
        #[source]
        cause: SharedResolveError,
    },

    /// A just-memoized failure, as seen by the caller whose attempt
    /// produced it. Displays and chains exactly like the wrapped error.
    #[error(transparent)]
    Shared(SharedResolveError),
}

impl ResolveError {
    /// The memoized original behind a replayed or shared error, if any.
    pub fn earlier_cause(&self) -> Option<&ResolveError> {
        match self {
            Self::PreviousAttemptFailed { cause, .. } | Self::Shared(cause) => {
                Some(cause.inner())
            }
            _ => None,
        }
    }
}

/// Cheaply cloneable handle to a memoized [`ResolveError`].
///
/// The cache holds one clone; every caller replaying the failure within the
/// freshness window gets another. Displays as the wrapped error and
/// forwards `source()` so error-chain walkers see the full cause chain.
#[derive(Debug, Clone)]
pub struct SharedResolveError(Arc<ResolveError>);

impl SharedResolveError {
    pub(crate) fn new(error: ResolveError) -> Self {
        Self(Arc::new(error))
    }

    /// The wrapped error.
    pub fn inner(&self) -> &ResolveError {
        &self.0
    }
}

impl fmt::Display for SharedResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SharedResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
