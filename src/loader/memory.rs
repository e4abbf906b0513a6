//! In-memory backing store
//!
//! Holds template content in a concurrent map. Useful as a real store for
//! programmatically registered templates, and as the instrumented loader
//! the test suites are built on: every probe is recorded, so tests can
//! assert both *how often* the backing store was consulted (freshness
//! window, negative memoization) and *in which order* candidate names were
//! probed (locale fallback, acquisition climbing).
//!
//! Each entry carries a revision number that bumps on every
//! [`put_template`](MemoryTemplateLoader::put_template), so the loader can
//! answer "not modified" for unchanged entries just like a file store.

use std::io::{self, Cursor};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;

use crate::core::Token;
use crate::loader::{OpenedTemplate, TemplateContent, TemplateLoader, TemplateLoadingResult};
use crate::template::TemplateOptions;

/// Identity of an in-memory template: its store name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemorySource(pub String);

#[derive(Debug, Clone)]
enum StoredContent {
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
struct StoredTemplate {
    content: StoredContent,
    revision: u64,
    options: Option<TemplateOptions>,
}

/// Concurrent in-memory [`TemplateLoader`] with probe instrumentation.
#[derive(Debug, Default)]
pub struct MemoryTemplateLoader {
    templates: DashMap<String, StoredTemplate>,
    next_revision: AtomicU64,
    probe_log: Mutex<Vec<String>>,
    load_calls: AtomicUsize,
    reset_calls: AtomicUsize,
}

impl MemoryTemplateLoader {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) character content under `name`, bumping the
    /// entry's revision.
    pub fn put_template(&self, name: impl Into<String>, content: impl Into<String>) {
        self.put_entry(name.into(), StoredContent::Text(content.into()), None);
    }

    /// Registers byte content, which goes through charset decoding when
    /// loaded (and can trigger the wrong-charset retry).
    pub fn put_template_bytes(&self, name: impl Into<String>, content: Vec<u8>) {
        self.put_entry(name.into(), StoredContent::Bytes(content), None);
    }

    /// Registers character content together with a source-level options
    /// override.
    pub fn put_template_with_options(
        &self,
        name: impl Into<String>,
        content: impl Into<String>,
        options: TemplateOptions,
    ) {
        self.put_entry(name.into(), StoredContent::Text(content.into()), Some(options));
    }

    /// Registers byte content together with a source-level options
    /// override (for example a charset the bytes are encoded in).
    pub fn put_template_bytes_with_options(
        &self,
        name: impl Into<String>,
        content: Vec<u8>,
        options: TemplateOptions,
    ) {
        self.put_entry(name.into(), StoredContent::Bytes(content), Some(options));
    }

    /// Removes the entry, if present.
    pub fn remove_template(&self, name: &str) {
        self.templates.remove(name);
    }

    /// All names probed through [`load`](TemplateLoader::load), oldest
    /// first.
    pub fn probed_names(&self) -> Vec<String> {
        self.probe_log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Clears the probe log and the load-call counter.
    pub fn clear_probe_log(&self) {
        self.probe_log.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.load_calls.store(0, Ordering::SeqCst);
    }

    /// Number of [`load`](TemplateLoader::load) calls since creation or the
    /// last [`clear_probe_log`](Self::clear_probe_log).
    pub fn load_call_count(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Number of [`reset_state`](TemplateLoader::reset_state) calls.
    pub fn reset_call_count(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    fn put_entry(&self, name: String, content: StoredContent, options: Option<TemplateOptions>) {
        let revision = self.next_revision.fetch_add(1, Ordering::SeqCst);
        self.templates.insert(name, StoredTemplate { content, revision, options });
    }
}

impl TemplateLoader for MemoryTemplateLoader {
    fn load(
        &self,
        name: &str,
        prior_source: Option<&Arc<dyn Token>>,
        prior_version: Option<&Arc<dyn Token>>,
        _session: Option<&mut (dyn crate::loader::TemplateLoaderSession + '_)>,
    ) -> io::Result<TemplateLoadingResult> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.probe_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());

        let Some(entry) = self.templates.get(name) else {
            return Ok(TemplateLoadingResult::NotFound);
        };

        let source = MemorySource(name.to_string());
        let source_unchanged =
            prior_source.is_some_and(|prior| prior.token_eq(&source as &dyn Token));
        let version_unchanged =
            prior_version.is_some_and(|prior| prior.token_eq(&entry.revision as &dyn Token));
        if source_unchanged && version_unchanged {
            return Ok(TemplateLoadingResult::NotModified);
        }

        let content = match &entry.content {
            StoredContent::Text(text) => TemplateContent::Text(text.clone()),
            StoredContent::Bytes(bytes) => {
                TemplateContent::Bytes(Box::new(Cursor::new(bytes.clone())))
            }
        };
        Ok(TemplateLoadingResult::Opened(OpenedTemplate {
            source: Arc::new(source),
            version: Some(Arc::new(entry.revision)),
            content,
            options: entry.options.clone(),
        }))
    }

    fn reset_state(&self) {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
    }
}
