//! Cache key and cached record types
//!
//! One cache entry per (normalized name, lookup locale, custom condition)
//! triple. The record memoizes whatever the resolution attempt produced:
//! a parsed template, a confirmed miss, or the failure itself. Records are
//! immutable once published; a refresh builds a new [`CachedResult`] and
//! replaces the entry, so concurrent readers holding the old `Arc` are
//! never mutated under.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use crate::core::{SharedResolveError, Token, token_opt_eq};
use crate::locale::Locale;
use crate::template::Template;

/// Identity of a cached resolution.
///
/// Two keys are equal when the names and locales match and the custom
/// conditions compare equal through [`Token::token_eq`] (both absent also
/// matches).
#[derive(Debug, Clone)]
pub struct CacheKey {
    pub(crate) name: String,
    pub(crate) locale: Option<Locale>,
    pub(crate) custom_condition: Option<Arc<dyn Token>>,
}

impl CacheKey {
    pub(crate) fn new(
        name: String,
        locale: Option<Locale>,
        custom_condition: Option<Arc<dyn Token>>,
    ) -> Self {
        Self { name, locale, custom_condition }
    }

    /// The normalized template name this key caches.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.locale == other.locale
            && token_opt_eq(self.custom_condition.as_ref(), other.custom_condition.as_ref())
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.locale.hash(state);
        match &self.custom_condition {
            Some(condition) => state.write_u64(condition.token_hash()),
            None => state.write_u64(0),
        }
    }
}

/// What a finished resolution attempt produced.
#[derive(Clone)]
pub enum CachedOutcome {
    /// A parsed template, shared with every caller.
    Template(Arc<Template>),
    /// The lookup exhausted all candidates without a match.
    Missing,
    /// The attempt failed; replayed to callers within the freshness window.
    Failed(SharedResolveError),
}

impl fmt::Debug for CachedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(template) => {
                f.debug_tuple("Template").field(&template.name()).finish()
            }
            Self::Missing => write!(f, "Missing"),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// One immutable cache record.
#[derive(Debug, Clone)]
pub struct CachedResult {
    pub(crate) outcome: CachedOutcome,
    /// Backing-store identity of the artifact behind a [`CachedOutcome::Template`].
    pub(crate) source: Option<Arc<dyn Token>>,
    /// Backing-store version of that artifact.
    pub(crate) version: Option<Arc<dyn Token>>,
    /// When the backing store was last consulted for this key.
    pub(crate) last_checked: Instant,
}

impl CachedResult {
    /// The memoized outcome.
    pub fn outcome(&self) -> &CachedOutcome {
        &self.outcome
    }

    /// When the backing store was last consulted.
    pub fn last_checked(&self) -> Instant {
        self.last_checked
    }
}
