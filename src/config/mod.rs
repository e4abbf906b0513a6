//! TOML-loadable engine settings
//!
//! [`ResolverSettings`] mirrors the knobs of
//! [`TemplateResolverBuilder`](crate::resolver::TemplateResolverBuilder) in
//! a serde-friendly shape, so an application can keep its template engine
//! configuration in the same TOML file as the rest of its settings:
//!
//! ```toml
//! freshness-window-ms = 500
//! localized-lookup = true
//! default-charset = "utf-8"
//!
//! [cache-storage]
//! kind = "mru"
//! max-strong = 128
//! max-weak = 512
//! ```
//!
//! Collaborators that carry code rather than data (loader, parser, lookup
//! strategy, options factory) have no settings representation; they are
//! wired up programmatically on the builder.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::loader::TemplateLoader;
use crate::resolver::{TemplateResolver, TemplateResolverBuilder};
use crate::storage::{
    CacheStorage, MruCacheStorage, NullCacheStorage, StrongCacheStorage, WeakCacheStorage,
};

/// Declarative resolver configuration. All fields are optional in the TOML
/// source; absent fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverSettings {
    /// Freshness window in milliseconds. Zero re-checks on every request.
    pub freshness_window_ms: u64,
    /// Whether locale fallback probing is enabled.
    pub localized_lookup: bool,
    /// Whether malformed names resolve as "missing" instead of failing.
    pub malformed_name_as_missing: bool,
    /// Charset label for decoding byte content without an override.
    pub default_charset: String,
    /// Language tag handed to the parser without an override.
    pub default_language: String,
    /// Which cache storage variant to build.
    pub cache_storage: CacheStorageSettings,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            freshness_window_ms: 5000,
            localized_lookup: true,
            malformed_name_as_missing: false,
            default_charset: "utf-8".to_string(),
            default_language: "plain".to_string(),
            cache_storage: CacheStorageSettings::Strong,
        }
    }
}

impl ResolverSettings {
    /// Parses settings from TOML text.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("failed to parse resolver settings")
    }

    /// Applies these settings onto a builder. Programmatic builder calls
    /// made afterwards still win.
    pub fn apply(&self, builder: TemplateResolverBuilder) -> TemplateResolverBuilder {
        builder
            .freshness_window(Duration::from_millis(self.freshness_window_ms))
            .localized_lookup(self.localized_lookup)
            .malformed_name_as_missing(self.malformed_name_as_missing)
            .default_charset(self.default_charset.clone())
            .default_language(self.default_language.clone())
            .cache_storage(self.cache_storage.build())
    }

    /// Builds a resolver around `loader` with these settings and the
    /// default collaborators for everything else.
    pub fn build_resolver(&self, loader: Arc<dyn TemplateLoader>) -> TemplateResolver {
        self.apply(TemplateResolver::builder(loader)).build()
    }
}

/// Cache storage selection, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CacheStorageSettings {
    /// Unbounded concurrent map (the default).
    Strong,
    /// Caching disabled.
    Null,
    /// Entries live only while externally referenced.
    Weak,
    /// Bounded most-recently-used tier over a weak overflow tier.
    #[serde(rename_all = "kebab-case")]
    Mru { max_strong: usize, max_weak: usize },
}

impl CacheStorageSettings {
    /// Instantiates the selected storage.
    pub fn build(&self) -> Arc<dyn CacheStorage> {
        match self {
            Self::Strong => Arc::new(StrongCacheStorage::new()),
            Self::Null => Arc::new(NullCacheStorage),
            Self::Weak => Arc::new(WeakCacheStorage::new()),
            Self::Mru { max_strong, max_weak } => {
                Arc::new(MruCacheStorage::new(*max_strong, *max_weak))
            }
        }
    }
}
