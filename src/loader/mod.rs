//! Backing store seam: where template bytes actually live
//!
//! A [`TemplateLoader`] abstracts over wherever template content is stored:
//! a directory tree ([`file::FileTemplateLoader`]), process memory
//! ([`memory::MemoryTemplateLoader`]), or anything a user plugs in
//! (databases, archives, remote stores).
//!
//! # Load Protocol
//!
//! Every probe passes the source identity and version of the cached entry
//! (when one exists), so the store can short-circuit:
//!
//! - [`TemplateLoadingResult::NotFound`] - no such template at that name.
//! - [`TemplateLoadingResult::NotModified`] - the artifact is the same
//!   source and version as the prior one; the engine reuses the compiled
//!   template without reading or parsing anything.
//! - [`TemplateLoadingResult::Opened`] - a changed (or first-seen)
//!   artifact, with its content stream and an optional embedded
//!   per-template options override.
//!
//! # Sessions
//!
//! A loader may hold per-resolution state (a connection, a transaction) in
//! a [`TemplateLoaderSession`]. The engine opens at most one session per
//! resolution attempt, threads it through every probe of that attempt, and
//! closes it on all exit paths. Sessions are never shared across calls.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use crate::core::Token;
use crate::template::TemplateOptions;

pub mod file;
pub mod memory;

/// Per-resolution-attempt loader state.
///
/// Close failures on an otherwise successful resolution are promoted to
/// the caller; when another error is already propagating they are logged
/// and swallowed.
pub trait TemplateLoaderSession: Send {
    /// Releases whatever the session holds. Must be idempotent-friendly:
    /// the engine checks [`is_closed`](Self::is_closed) first.
    fn close(&mut self) -> io::Result<()>;

    /// Whether [`close`](Self::close) already ran.
    fn is_closed(&self) -> bool;
}

/// The backing store abstraction.
pub trait TemplateLoader: Send + Sync + fmt::Debug {
    /// Opens a per-resolution session, or `None` when this loader is
    /// stateless (the default).
    fn create_session(&self) -> io::Result<Option<Box<dyn TemplateLoaderSession>>> {
        Ok(None)
    }

    /// Probes one concrete, normalized template name.
    ///
    /// `prior_source` / `prior_version` identify the artifact behind the
    /// caller's cached entry; a loader that can tell the artifact is
    /// unchanged answers [`TemplateLoadingResult::NotModified`] without
    /// opening content. Loaders must only do so when a prior artifact was
    /// actually offered.
    ///
    /// The session borrow carries its own trait-object lifetime so the
    /// engine can reborrow one boxed session across many probes.
    fn load(
        &self,
        name: &str,
        prior_source: Option<&Arc<dyn Token>>,
        prior_version: Option<&Arc<dyn Token>>,
        session: Option<&mut (dyn TemplateLoaderSession + '_)>,
    ) -> io::Result<TemplateLoadingResult>;

    /// Drops whatever internal caching state the loader keeps. Invoked by
    /// [`TemplateResolver::clear_cache`](crate::resolver::TemplateResolver::clear_cache)
    /// when the caller asks for a loader reset.
    fn reset_state(&self) {}
}

/// Outcome of a single [`TemplateLoader::load`] probe.
pub enum TemplateLoadingResult {
    /// No template at that name.
    NotFound,
    /// Same source and version as the prior artifact; content not opened.
    NotModified,
    /// A (re)opened artifact with its content.
    Opened(OpenedTemplate),
}

impl TemplateLoadingResult {
    /// `true` unless this is [`NotFound`](Self::NotFound).
    pub fn is_positive(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

impl fmt::Debug for TemplateLoadingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("NotFound"),
            Self::NotModified => f.write_str("NotModified"),
            Self::Opened(opened) => f.debug_tuple("Opened").field(opened).finish(),
        }
    }
}

/// A successfully opened backing-store artifact.
pub struct OpenedTemplate {
    /// Opaque identity of where the content came from; compared against
    /// cached entries to detect moves between storage locations.
    pub source: Arc<dyn Token>,
    /// Opaque version token; differing versions trigger a reparse. `None`
    /// when the store cannot version its artifacts (every load reparses).
    pub version: Option<Arc<dyn Token>>,
    /// The template content.
    pub content: TemplateContent,
    /// Source-level options override embedded in the store, if any.
    pub options: Option<TemplateOptions>,
}

impl fmt::Debug for OpenedTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedTemplate")
            .field("source", &self.source)
            .field("version", &self.version)
            .field("content", &self.content)
            .field("options", &self.options)
            .finish()
    }
}

/// Template content as the store naturally holds it.
///
/// Byte content goes through charset decoding (and can trigger the
/// wrong-charset retry); character content is parsed as-is.
pub enum TemplateContent {
    /// Binary content (files, blobs); decoded with the effective charset.
    Bytes(Box<dyn Read + Send>),
    /// Character content (string columns, in-memory stores).
    Text(String),
}

impl fmt::Debug for TemplateContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(_) => f.write_str("Bytes(..)"),
            Self::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
        }
    }
}
