//! Stencil - Template resolution and caching engine
//!
//! Stencil turns a requested template name (plus an optional locale and an
//! optional custom lookup condition) into a compiled, ready-to-render
//! [`Template`](template::Template), while avoiding redundant reloads and
//! redundant recompilation under concurrent access. It is a library-level
//! engine: it does not define a template grammar or execution semantics; it
//! resolves, loads, and caches whatever artifact the configured parser
//! produces.
//!
//! # Architecture Overview
//!
//! A resolution request flows through four layers:
//!
//! ```text
//! caller → TemplateResolver::get_template(name, locale, condition)
//!            │
//!            ├── name::normalize_root_based_name   (canonical root-based name)
//!            ├── storage::CacheStorage             (fresh? return memoized outcome)
//!            ├── lookup::TemplateLookupStrategy    (locale fallback, "*" acquisition)
//!            │     └── loader::TemplateLoader      (backing store probe / open)
//!            └── template::TemplateParser          (only when the artifact changed)
//! ```
//!
//! ## Key Features
//!
//! - **Freshness window**: within the configured window a cached outcome is
//!   returned without touching the backing store at all.
//! - **Negative memoization**: "template missing" and "template failed to
//!   load" are cached exactly like positive hits, so a consistently absent
//!   template never hammers the backing store.
//! - **Locale fallback**: `msg.t` with locale `en_US_POSIX` probes
//!   `msg_en_US_POSIX.t`, `msg_en_US.t`, `msg_en.t`, then `msg.t`.
//! - **Acquisition (`*`) climbing**: `app/sub/*/util.t` searches
//!   `app/sub/util.t`, `app/util.t`, `util.t`: innermost directory first,
//!   then each ancestor.
//! - **Pluggable cache storage**: strong (lock-free), weak-value, two-tier
//!   MRU, or disabled; a storage declares whether it is safe for concurrent
//!   access, and a non-concurrent one is wrapped in a per-access lock that
//!   never serializes backing-store I/O.
//! - **Relaxed single-flight**: two threads may race a reload of the same
//!   key; the last write wins. Readers never observe a half-updated entry
//!   because cache values are immutable once published.
//!
//! # Core Modules
//!
//! - [`resolver`] - The resolution engine, cache keys/entries, and results
//! - [`lookup`] - Lookup strategies and pure candidate generation
//! - [`name`] - Template name normalization and validation
//! - [`storage`] - Cache storage contract and the built-in variants
//! - [`loader`] - Backing store seam plus file and in-memory stores
//! - [`template`] - Compiled templates, per-template options, parser seam
//! - [`locale`] - Locale value type used by localized lookup
//! - [`config`] - TOML-loadable engine settings
//! - [`core`] - Error taxonomy and shared opaque-token machinery
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stencil::loader::memory::MemoryTemplateLoader;
//! use stencil::locale::Locale;
//! use stencil::resolver::TemplateResolver;
//!
//! # fn main() -> Result<(), stencil::core::ResolveError> {
//! let loader = Arc::new(MemoryTemplateLoader::new());
//! loader.put_template("greeting_en.t", "Hello!");
//! loader.put_template("greeting.t", "…");
//!
//! let resolver = TemplateResolver::builder(loader).build();
//!
//! let locale: Locale = "en_US".parse().unwrap();
//! let result = resolver.get_template("greeting.t", Some(&locale), None)?;
//! let template = result.template().expect("template exists");
//! assert_eq!(template.source_name(), "greeting_en.t");
//! # Ok(())
//! # }
//! ```

// Resolution pipeline
pub mod lookup;
pub mod name;
pub mod resolver;

// Collaborator seams and built-in implementations
pub mod loader;
pub mod storage;
pub mod template;

// Supporting modules
pub mod config;
pub mod core;
pub mod locale;
