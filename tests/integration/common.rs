//! Shared helpers for the integration suite

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use stencil::loader::{TemplateLoader, TemplateLoadingResult};
use stencil::resolver::{TemplateResolver, TemplateResolverBuilder};
use stencil::template::{ParseError, ParseRequest, PlainTextParser, Template, TemplateParser};

/// A long window so tests exercise cache hits without sleeping.
pub const LONG_WINDOW: Duration = Duration::from_secs(3600);

/// Builder preset: the given backing store, long freshness window.
///
/// Generic over the loader so call sites can hand over `Arc::clone` of
/// their concrete handle; the unsize to `Arc<dyn TemplateLoader>` happens
/// here, where the element type is already pinned down.
pub fn builder_with<L: TemplateLoader + 'static>(loader: Arc<L>) -> TemplateResolverBuilder {
    TemplateResolver::builder(loader).freshness_window(LONG_WINDOW)
}

/// Plain-text parsing with an invocation counter, for asserting when the
/// parser ran and when a cached compilation was reused.
#[derive(Debug, Default)]
pub struct CountingParser {
    calls: AtomicUsize,
}

impl CountingParser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TemplateParser for CountingParser {
    fn parse(&self, request: ParseRequest<'_>) -> Result<Template, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PlainTextParser.parse(request)
    }
}

/// A backing store that fails every probe, with a call counter.
#[derive(Debug, Default)]
pub struct FailingLoader {
    calls: AtomicUsize,
}

impl FailingLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TemplateLoader for FailingLoader {
    fn load(
        &self,
        _name: &str,
        _prior_source: Option<&Arc<dyn stencil::core::Token>>,
        _prior_version: Option<&Arc<dyn stencil::core::Token>>,
        _session: Option<&mut (dyn stencil::loader::TemplateLoaderSession + '_)>,
    ) -> io::Result<TemplateLoadingResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::other("backing store down"))
    }
}
