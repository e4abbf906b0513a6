//! The template resolution engine
//!
//! [`TemplateResolver`] ties the pipeline together: it normalizes the
//! requested name, consults the [`CacheStorage`] under a freshness window,
//! runs the [`TemplateLookupStrategy`](crate::lookup::TemplateLookupStrategy)
//! against the [`TemplateLoader`] when the cached record is stale, and
//! parses (re)loaded content into a [`Template`] that every subsequent
//! caller shares.
//!
//! # Caching Behavior
//!
//! Every resolution outcome is memoized under the
//! (name, locale, condition) key, including "missing" and "failed":
//! within the freshness window the backing store is not touched at all,
//! and a memoized failure is replayed as
//! [`ResolveError::PreviousAttemptFailed`]. After the window expires the
//! next caller re-checks the store, passing the cached source identity and
//! version so the store can answer "not modified", in which case the
//! previously parsed template is reused without invoking the parser.
//!
//! Cache records are immutable once published. A refresh builds a new
//! record and replaces the entry, so concurrent readers are never affected
//! by an in-flight update. Two callers racing the same stale key may both
//! hit the backing store; whichever finishes last owns the cached record.
//! This is deliberate: the cost is a redundant load, never inconsistency.
//!
//! # Missing vs. Failed
//!
//! A template that is not there is a normal outcome, reported as
//! [`GetTemplateResult::Missing`]. Errors are reserved for attempts that
//! went wrong: malformed names, backing-store I/O failures, parser
//! rejections.

use std::io::{self, Read};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::core::{ResolveError, SharedResolveError, Token};
use crate::loader::{
    OpenedTemplate, TemplateContent, TemplateLoader, TemplateLoaderSession, TemplateLoadingResult,
};
use crate::locale::Locale;
use crate::lookup::{
    DefaultLookupStrategy, LookupContext, PositiveLookup, TemplateLookupResult,
    TemplateLookupStrategy,
};
use crate::name;
use crate::storage::{CacheStorage, StrongCacheStorage, SynchronizedCacheStorage};
use crate::template::{
    ParseError, ParseRequest, PlainTextParser, Template, TemplateOptions, TemplateOptionsFactory,
    TemplateParser, decode_content, encoding_for_label,
};

mod entry;

pub use entry::{CacheKey, CachedOutcome, CachedResult};

/// How long a cached outcome is served without re-checking the backing
/// store.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_millis(5000);

/// Outcome of [`TemplateResolver::get_template`]. A missing template is a
/// result, not an error.
#[derive(Debug, Clone)]
pub enum GetTemplateResult {
    /// The resolved, parsed template.
    Found(Arc<Template>),
    /// No backing-store artifact matched any lookup candidate.
    Missing(MissingTemplateInfo),
}

impl GetTemplateResult {
    /// The template, or `None` when missing.
    pub fn template(&self) -> Option<&Arc<Template>> {
        match self {
            Self::Found(template) => Some(template),
            Self::Missing(_) => None,
        }
    }

    /// Consumes the result into the template, or `None` when missing.
    pub fn into_template(self) -> Option<Arc<Template>> {
        match self {
            Self::Found(template) => Some(template),
            Self::Missing(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Details of a missing-template outcome.
#[derive(Debug, Clone)]
pub struct MissingTemplateInfo {
    /// The normalized name that was looked up (or the raw name, when
    /// normalization itself failed and malformed names are treated as
    /// missing).
    pub name: String,
    /// Extra detail when the miss has a cause other than "not there".
    pub reason: Option<String>,
}

/// The resolution and caching engine. Cheap to share; all methods take
/// `&self`.
#[derive(Debug)]
pub struct TemplateResolver {
    loader: Arc<dyn TemplateLoader>,
    storage: Arc<dyn CacheStorage>,
    strategy: Arc<dyn TemplateLookupStrategy>,
    parser: Arc<dyn TemplateParser>,
    options_factory: Option<Arc<dyn TemplateOptionsFactory>>,
    freshness_window: Duration,
    localized_lookup: bool,
    malformed_name_as_missing: bool,
    default_charset: String,
    default_language: String,
    /// Serializes maintenance operations (clear) against each other.
    maintenance: Mutex<()>,
}

impl TemplateResolver {
    /// Starts building a resolver around the given backing store.
    pub fn builder(loader: Arc<dyn TemplateLoader>) -> TemplateResolverBuilder {
        TemplateResolverBuilder::new(loader)
    }

    /// Resolves `name` (with the optional lookup locale and custom lookup
    /// condition) to a template, from cache when fresh.
    ///
    /// The name is normalized first; `locale` drives locale fallback when
    /// localized lookup is enabled and is part of the cache key either way.
    pub fn get_template(
        &self,
        raw_name: &str,
        locale: Option<&Locale>,
        custom_condition: Option<Arc<dyn Token>>,
    ) -> Result<GetTemplateResult, ResolveError> {
        let normalized = match name::normalize_root_based_name(raw_name) {
            Ok(normalized) => normalized,
            Err(error) if self.malformed_name_as_missing => {
                debug!(name = raw_name, %error, "malformed name treated as missing");
                return Ok(GetTemplateResult::Missing(MissingTemplateInfo {
                    name: raw_name.to_string(),
                    reason: Some(error.to_string()),
                }));
            }
            Err(error) => return Err(error.into()),
        };

        self.get_template_internal(&normalized, locale, custom_condition)
    }

    /// Drops the cached outcome for one exact (name, locale, condition)
    /// key. The name goes through the same normalization as
    /// [`get_template`](Self::get_template).
    pub fn remove_from_cache(
        &self,
        raw_name: &str,
        locale: Option<&Locale>,
        custom_condition: Option<Arc<dyn Token>>,
    ) -> Result<(), ResolveError> {
        let normalized = name::normalize_root_based_name(raw_name)?;
        let key = CacheKey::new(normalized.clone(), locale.cloned(), custom_condition);
        self.storage.remove(&key);
        debug!(name = %normalized, "removed from cache");
        Ok(())
    }

    /// Empties the cache. With `reset_loader` the backing store is also
    /// told to drop its own internal state.
    pub fn clear_cache(&self, reset_loader: bool) {
        let _maintenance = self.maintenance.lock().unwrap_or_else(PoisonError::into_inner);
        self.storage.clear();
        if reset_loader {
            self.loader.reset_state();
        }
        debug!(reset_loader, "cache cleared");
    }

    /// The configured freshness window.
    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    /// Whether locale fallback probing is enabled.
    pub fn localized_lookup(&self) -> bool {
        self.localized_lookup
    }

    /// The backing store this resolver reads from.
    pub fn loader(&self) -> &Arc<dyn TemplateLoader> {
        &self.loader
    }

    /// The cache storage behind this resolver. A storage that declared
    /// itself non-concurrent is returned behind its synchronizing wrapper.
    pub fn cache_storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    fn get_template_internal(
        &self,
        normalized: &str,
        locale: Option<&Locale>,
        custom_condition: Option<Arc<dyn Token>>,
    ) -> Result<GetTemplateResult, ResolveError> {
        let key = CacheKey::new(normalized.to_string(), locale.cloned(), custom_condition);
        let old = self.storage.get(&key);
        let now = Instant::now();

        if let Some(old) = &old {
            if now.duration_since(old.last_checked) < self.freshness_window {
                trace!(name = normalized, "cached outcome still fresh");
                return self.replay(normalized, old);
            }
        }

        // Stale (or absent); the backing store must be consulted. The
        // replacement record carries the refreshed check time whatever the
        // outcome is.
        let lookup_locale = if self.localized_lookup { locale } else { None };
        match self.check_and_reload(&key, normalized, lookup_locale, old.as_deref(), now) {
            Ok(result) => Ok(result),
            Err(error) => {
                // Memoize the failure so retries within the window replay
                // it instead of hammering a broken backing store.
                let shared = SharedResolveError::new(error);
                self.storage.put(
                    key,
                    Arc::new(CachedResult {
                        outcome: CachedOutcome::Failed(shared.clone()),
                        source: None,
                        version: None,
                        last_checked: now,
                    }),
                );
                Err(ResolveError::Shared(shared))
            }
        }
    }

    fn replay(
        &self,
        normalized: &str,
        record: &CachedResult,
    ) -> Result<GetTemplateResult, ResolveError> {
        match &record.outcome {
            CachedOutcome::Template(template) => {
                Ok(GetTemplateResult::Found(Arc::clone(template)))
            }
            CachedOutcome::Missing => Ok(GetTemplateResult::Missing(MissingTemplateInfo {
                name: normalized.to_string(),
                reason: None,
            })),
            CachedOutcome::Failed(cause) => Err(ResolveError::PreviousAttemptFailed {
                name: normalized.to_string(),
                cause: cause.clone(),
            }),
        }
    }

    fn check_and_reload(
        &self,
        key: &CacheKey,
        normalized: &str,
        lookup_locale: Option<&Locale>,
        old: Option<&CachedResult>,
        now: Instant,
    ) -> Result<GetTemplateResult, ResolveError> {
        let mut session = self.loader.create_session().map_err(|source| {
            ResolveError::Load { name: normalized.to_string(), source }
        })?;
        if session.is_some() {
            trace!(name = normalized, "loader session created");
        }

        let result =
            self.check_and_reload_in_session(key, normalized, lookup_locale, old, now, &mut session);

        if let Some(session) = &mut session {
            if !session.is_closed() {
                if let Err(close_error) = session.close() {
                    if result.is_err() {
                        warn!(name = normalized, error = %close_error,
                            "failed to close loader session");
                    } else {
                        return Err(ResolveError::Load {
                            name: normalized.to_string(),
                            source: close_error,
                        });
                    }
                }
            }
        }
        result
    }

    fn check_and_reload_in_session(
        &self,
        key: &CacheKey,
        normalized: &str,
        lookup_locale: Option<&Locale>,
        old: Option<&CachedResult>,
        now: Instant,
        session: &mut Option<Box<dyn TemplateLoaderSession>>,
    ) -> Result<GetTemplateResult, ResolveError> {
        let prior_source = old.and_then(|old| old.source.clone());
        let prior_version = old.and_then(|old| old.version.clone());

        let lookup = {
            let mut ctx = ResolverLookupContext {
                loader: self.loader.as_ref(),
                name: normalized,
                locale: lookup_locale,
                condition: key.custom_condition.clone(),
                prior_source: prior_source.as_ref(),
                prior_version: prior_version.as_ref(),
                session,
            };
            self.strategy.lookup(&mut ctx).map_err(|source| ResolveError::Load {
                name: normalized.to_string(),
                source,
            })?
        };

        let PositiveLookup { resolved_name, loading } = match lookup {
            TemplateLookupResult::Positive(positive) => positive,
            TemplateLookupResult::Negative => {
                debug!(name = normalized, "no backing-store source found");
                self.storage.put(
                    key.clone(),
                    Arc::new(CachedResult {
                        outcome: CachedOutcome::Missing,
                        source: None,
                        version: None,
                        last_checked: now,
                    }),
                );
                return Ok(GetTemplateResult::Missing(MissingTemplateInfo {
                    name: normalized.to_string(),
                    reason: None,
                }));
            }
        };

        match loading {
            TemplateLoadingResult::NotModified => {
                let cached_template = old.and_then(|old| match &old.outcome {
                    CachedOutcome::Template(template) => Some(Arc::clone(template)),
                    _ => None,
                });
                let Some(template) = cached_template else {
                    return Err(ResolveError::LoaderContract {
                        name: normalized.to_string(),
                        detail: "reported \"not modified\" but no prior template artifact \
                                 was offered"
                            .to_string(),
                    });
                };
                debug!(name = normalized, source_name = %resolved_name,
                    "unchanged on backing store; reusing cached template");
                self.storage.put(
                    key.clone(),
                    Arc::new(CachedResult {
                        outcome: CachedOutcome::Template(Arc::clone(&template)),
                        source: prior_source,
                        version: prior_version,
                        last_checked: now,
                    }),
                );
                Ok(GetTemplateResult::Found(template))
            }
            TemplateLoadingResult::Opened(opened) => {
                debug!(name = normalized, source_name = %resolved_name,
                    "reading template content");
                let source = Arc::clone(&opened.source);
                let version = opened.version.clone();
                let template = self.load_template(
                    normalized,
                    &resolved_name,
                    lookup_locale,
                    key.custom_condition.clone(),
                    opened,
                )?;
                self.storage.put(
                    key.clone(),
                    Arc::new(CachedResult {
                        outcome: CachedOutcome::Template(Arc::clone(&template)),
                        source: Some(source),
                        version,
                        last_checked: now,
                    }),
                );
                Ok(GetTemplateResult::Found(template))
            }
            TemplateLoadingResult::NotFound => Err(ResolveError::LoaderContract {
                name: normalized.to_string(),
                detail: "lookup strategy returned a positive result carrying NOT_FOUND"
                    .to_string(),
            }),
        }
    }

    /// Parses opened content into a template, applying options overrides
    /// and the charset-redeclaration retry.
    fn load_template(
        &self,
        normalized: &str,
        source_name: &str,
        lookup_locale: Option<&Locale>,
        custom_condition: Option<Arc<dyn Token>>,
        opened: OpenedTemplate,
    ) -> Result<Arc<Template>, ResolveError> {
        let OpenedTemplate { source, version: _, content, options: embedded_options } = opened;

        let factory_options = match &self.options_factory {
            Some(factory) => {
                factory.get(source_name, &source).map_err(|cause| {
                    ResolveError::OptionsFactory { source_name: source_name.to_string(), cause }
                })?
            }
            None => None,
        };
        // The override embedded in the loading result is stronger than the
        // factory-provided one.
        let options = match (embedded_options, factory_options) {
            (Some(embedded), Some(factory)) => Some(embedded.merged_over(&factory)),
            (Some(embedded), None) => Some(embedded),
            (None, factory) => factory,
        };

        let language = options
            .as_ref()
            .and_then(|options| options.language.clone())
            .unwrap_or_else(|| self.default_language.clone());

        let mut template = match content {
            TemplateContent::Text(text) => self
                .parse_text(normalized, source_name, &text, &language, None, options.as_ref())
                .map_err(|error| match error {
                    ParseRetry::Wrong(declared) => ResolveError::Parse {
                        name: normalized.to_string(),
                        source_name: source_name.to_string(),
                        cause: anyhow::anyhow!(
                            "content declares charset {declared:?}, but was supplied as \
                             character data that cannot be re-decoded"
                        ),
                    },
                    ParseRetry::Failed(error) => error,
                })?,
            TemplateContent::Bytes(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes).map_err(|source| ResolveError::Load {
                    name: normalized.to_string(),
                    source,
                })?;
                drop(reader);

                let label = options
                    .as_ref()
                    .and_then(|options| options.charset.as_deref())
                    .unwrap_or(&self.default_charset);
                let encoding = encoding_for_label(label).ok_or_else(|| {
                    ResolveError::UnsupportedCharset {
                        name: normalized.to_string(),
                        charset: label.to_string(),
                    }
                })?;

                let text = decode_content(&bytes, encoding);
                match self.parse_text(
                    normalized,
                    source_name,
                    &text,
                    &language,
                    Some(encoding),
                    options.as_ref(),
                ) {
                    Ok(template) => template,
                    Err(ParseRetry::Failed(error)) => return Err(error),
                    Err(ParseRetry::Wrong(declared)) => {
                        // Re-decode the same bytes with the declared
                        // charset and parse once more.
                        let declared_encoding =
                            encoding_for_label(&declared).ok_or_else(|| {
                                ResolveError::UnsupportedCharset {
                                    name: normalized.to_string(),
                                    charset: declared.clone(),
                                }
                            })?;
                        if declared_encoding == encoding {
                            return Err(ResolveError::Parse {
                                name: normalized.to_string(),
                                source_name: source_name.to_string(),
                                cause: anyhow::anyhow!(
                                    "content declares charset {declared:?}, which it was \
                                     already decoded with"
                                ),
                            });
                        }
                        debug!(name = normalized, charset = %declared,
                            "re-decoding with content-declared charset");
                        let text = decode_content(&bytes, declared_encoding);
                        self.parse_text(
                            normalized,
                            source_name,
                            &text,
                            &language,
                            Some(declared_encoding),
                            options.as_ref(),
                        )
                        .map_err(|error| match error {
                            ParseRetry::Wrong(redeclared) => ResolveError::Parse {
                                name: normalized.to_string(),
                                source_name: source_name.to_string(),
                                cause: anyhow::anyhow!(
                                    "content re-declared charset {redeclared:?} after \
                                     already being re-decoded once"
                                ),
                            },
                            ParseRetry::Failed(error) => error,
                        })?
                    }
                }
            }
        };

        let recorded_locale = options
            .as_ref()
            .and_then(|options| options.locale.clone())
            .or_else(|| lookup_locale.cloned());
        template.set_lookup_locale(recorded_locale);
        template.set_custom_lookup_condition(custom_condition);
        Ok(Arc::new(template))
    }

    fn parse_text(
        &self,
        normalized: &str,
        source_name: &str,
        text: &str,
        language: &str,
        charset: Option<&'static encoding_rs::Encoding>,
        options: Option<&TemplateOptions>,
    ) -> Result<Template, ParseRetry> {
        self.parser
            .parse(ParseRequest {
                name: normalized,
                source_name,
                text,
                language,
                charset,
                options,
            })
            .map_err(|error| match error {
                ParseError::WrongCharset { declared } => ParseRetry::Wrong(declared),
                ParseError::Fatal(cause) => ParseRetry::Failed(ResolveError::Parse {
                    name: normalized.to_string(),
                    source_name: source_name.to_string(),
                    cause,
                }),
            })
    }
}

/// Internal split of a parse failure into "retry with this charset" and
/// "give up".
enum ParseRetry {
    Wrong(String),
    Failed(ResolveError),
}

/// The engine-side [`LookupContext`]: routes strategy probes through the
/// loader with the session and cached prior identity applied.
struct ResolverLookupContext<'a> {
    loader: &'a dyn TemplateLoader,
    name: &'a str,
    locale: Option<&'a Locale>,
    condition: Option<Arc<dyn Token>>,
    prior_source: Option<&'a Arc<dyn Token>>,
    prior_version: Option<&'a Arc<dyn Token>>,
    session: &'a mut Option<Box<dyn TemplateLoaderSession>>,
}

impl LookupContext for ResolverLookupContext<'_> {
    fn template_name(&self) -> &str {
        self.name
    }

    fn locale(&self) -> Option<&Locale> {
        self.locale
    }

    fn custom_condition(&self) -> Option<&Arc<dyn Token>> {
        self.condition.as_ref()
    }

    fn probe(&mut self, candidate: &str) -> io::Result<TemplateLoadingResult> {
        trace!(candidate, "probing backing store");
        self.loader.load(
            candidate,
            self.prior_source,
            self.prior_version,
            self.session.as_deref_mut(),
        )
    }
}

/// Builder for [`TemplateResolver`]. Every setting has a default; only the
/// loader is mandatory.
#[derive(Debug)]
pub struct TemplateResolverBuilder {
    loader: Arc<dyn TemplateLoader>,
    storage: Option<Arc<dyn CacheStorage>>,
    strategy: Option<Arc<dyn TemplateLookupStrategy>>,
    parser: Option<Arc<dyn TemplateParser>>,
    options_factory: Option<Arc<dyn TemplateOptionsFactory>>,
    freshness_window: Duration,
    localized_lookup: bool,
    malformed_name_as_missing: bool,
    default_charset: String,
    default_language: String,
}

impl TemplateResolverBuilder {
    fn new(loader: Arc<dyn TemplateLoader>) -> Self {
        Self {
            loader,
            storage: None,
            strategy: None,
            parser: None,
            options_factory: None,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            localized_lookup: true,
            malformed_name_as_missing: false,
            default_charset: "utf-8".to_string(),
            default_language: "plain".to_string(),
        }
    }

    /// Replaces the default [`StrongCacheStorage`].
    pub fn cache_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replaces the default locale-fallback-with-acquisition strategy.
    pub fn lookup_strategy(mut self, strategy: Arc<dyn TemplateLookupStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Replaces the default [`PlainTextParser`].
    pub fn parser(mut self, parser: Arc<dyn TemplateParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Installs a name-scoped per-template options factory.
    pub fn options_factory(mut self, factory: Arc<dyn TemplateOptionsFactory>) -> Self {
        self.options_factory = Some(factory);
        self
    }

    /// How long cached outcomes are served without a backing-store check.
    /// Zero means every request re-checks.
    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Enables or disables locale fallback probing (enabled by default).
    /// The locale stays part of the cache key either way.
    pub fn localized_lookup(mut self, enabled: bool) -> Self {
        self.localized_lookup = enabled;
        self
    }

    /// When enabled, a name that fails normalization yields a
    /// [`GetTemplateResult::Missing`] (with the failure as the reason)
    /// instead of an error.
    pub fn malformed_name_as_missing(mut self, enabled: bool) -> Self {
        self.malformed_name_as_missing = enabled;
        self
    }

    /// Charset label used to decode byte content when no per-template
    /// override applies. Defaults to `"utf-8"`; validated on first use.
    pub fn default_charset(mut self, label: impl Into<String>) -> Self {
        self.default_charset = label.into();
        self
    }

    /// Language tag handed to the parser when no per-template override
    /// applies.
    pub fn default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn build(self) -> TemplateResolver {
        let storage = self.storage.unwrap_or_else(|| Arc::new(StrongCacheStorage::new()));
        // Each individual access gets the lock, not whole resolutions;
        // backing-store I/O between accesses runs unserialized.
        let storage = if storage.is_concurrent() {
            storage
        } else {
            Arc::new(SynchronizedCacheStorage::new(storage))
        };
        TemplateResolver {
            loader: self.loader,
            strategy: self.strategy.unwrap_or_else(|| Arc::new(DefaultLookupStrategy)),
            parser: self.parser.unwrap_or_else(|| Arc::new(PlainTextParser)),
            options_factory: self.options_factory,
            freshness_window: self.freshness_window,
            localized_lookup: self.localized_lookup,
            malformed_name_as_missing: self.malformed_name_as_missing,
            default_charset: self.default_charset,
            default_language: self.default_language,
            maintenance: Mutex::new(()),
            storage,
        }
    }
}
