//! Lookup strategies
//!
//! A lookup strategy maps one requested template name plus lookup inputs
//! (locale, custom condition) onto a sequence of backing-store probes, and
//! decides which probe outcome wins. The engine hands the strategy a
//! [`LookupContext`]; the strategy never talks to the loader directly, so
//! custom strategies cannot bypass session handling or cache bookkeeping.
//!
//! The built-in [`DefaultLookupStrategy`] implements two orthogonal
//! fallback mechanisms:
//!
//! - **Locale fallback**: for `article.t` with locale `en_US_POSIX` it
//!   probes `article_en_US_POSIX.t`, `article_en_US.t`, `article_en.t`,
//!   and finally the plain `article.t`. The locale suffix goes before the
//!   last `.` of the name (or at the end when there is no dot).
//! - **Acquisition**: a single `*` path step marks where upward climbing
//!   starts. `a/b/*/c.t` probes `a/b/c.t`, `a/c.t`, `c.t`, innermost
//!   directory first. When a name holds several `*` steps only the last
//!   one is kept.
//!
//! Locale fallback is the outer loop: every locale candidate runs a full
//! acquisition climb before the next, less specific locale is tried.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::core::Token;
use crate::loader::TemplateLoadingResult;
use crate::locale::Locale;

/// A matched candidate: the concrete name that hit, and what the backing
/// store answered for it.
pub struct PositiveLookup {
    pub resolved_name: String,
    pub loading: TemplateLoadingResult,
}

/// Outcome of a full strategy run. Transient; never cached.
pub enum TemplateLookupResult {
    Positive(PositiveLookup),
    Negative,
}

impl TemplateLookupResult {
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive(_))
    }
}

impl fmt::Debug for TemplateLookupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive(positive) => f
                .debug_struct("Positive")
                .field("resolved_name", &positive.resolved_name)
                .field("loading", &positive.loading)
                .finish(),
            Self::Negative => write!(f, "Negative"),
        }
    }
}

/// What a strategy sees of one resolution attempt. Implemented by the
/// engine; [`probe`](Self::probe) routes through the loader with the
/// session and the cached prior source/version already applied.
pub trait LookupContext {
    /// The normalized name the caller asked for.
    fn template_name(&self) -> &str;

    /// The lookup locale, already `None` when localized lookup is off.
    fn locale(&self) -> Option<&Locale>;

    /// The caller-supplied custom lookup condition, if any.
    fn custom_condition(&self) -> Option<&Arc<dyn Token>>;

    /// Probes one concrete candidate name against the backing store.
    fn probe(&mut self, candidate: &str) -> io::Result<TemplateLoadingResult>;
}

/// Pluggable candidate-generation policy.
pub trait TemplateLookupStrategy: Send + Sync + fmt::Debug {
    fn lookup(&self, ctx: &mut dyn LookupContext) -> io::Result<TemplateLookupResult>;
}

/// Locale fallback with acquisition climbing, as described in the module
/// docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLookupStrategy;

impl TemplateLookupStrategy for DefaultLookupStrategy {
    fn lookup(&self, ctx: &mut dyn LookupContext) -> io::Result<TemplateLookupResult> {
        let name = ctx.template_name().to_string();
        let Some(locale) = ctx.locale().cloned() else {
            return lookup_with_acquisition(ctx, &name);
        };
        for candidate in locale_candidates(&name, &locale) {
            let result = lookup_with_acquisition(ctx, &candidate)?;
            if result.is_positive() {
                return Ok(result);
            }
        }
        Ok(TemplateLookupResult::Negative)
    }
}

/// Locale-suffixed name variants, most specific first, ending with the
/// plain name.
pub fn locale_candidates(name: &str, locale: &Locale) -> Vec<String> {
    let (prefix, suffix) = match name.rfind('.') {
        Some(dot) => name.split_at(dot),
        None => (name, ""),
    };
    let mut locale_part = format!("_{locale}");
    let mut candidates = Vec::new();
    loop {
        candidates.push(format!("{prefix}{locale_part}{suffix}"));
        match locale_part.rfind('_') {
            Some(idx) => locale_part.truncate(idx),
            None => break,
        }
    }
    candidates
}

/// Concrete names the acquisition mechanism would try for `path`,
/// innermost directory first. A path with no `*` step yields itself as
/// the only candidate. Pure; callers decide how far down the sequence to
/// actually probe.
pub fn acquisition_candidates(path: &str) -> io::Result<Vec<String>> {
    // Only one of the ways a name can be non-normalized, but the easiest
    // mistake to make.
    if path.starts_with('/') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("non-normalized name, starts with \"/\": {path:?}"),
        ));
    }

    if !path.contains('*') {
        return Ok(vec![path.to_string()]);
    }

    // Keep only the last "*" step; earlier ones are redundant.
    let mut last_star = None;
    let mut steps: Vec<&str> = Vec::new();
    for step in path.split('/').filter(|step| !step.is_empty()) {
        if step == "*" {
            if let Some(idx) = last_star {
                steps.remove(idx);
            }
            last_star = Some(steps.len());
        }
        steps.push(step);
    }
    let Some(star) = last_star else {
        // "*" only appeared inside a longer step; no acquisition then.
        return Ok(vec![path.to_string()]);
    };

    let mut base_path = String::new();
    for step in &steps[..star] {
        base_path.push_str(step);
        base_path.push('/');
    }
    let rest_path = steps[star + 1..].join("/");

    let mut candidates = Vec::new();
    let mut base_len = base_path.len();
    loop {
        candidates.push(format!("{}{}", &base_path[..base_len], rest_path));
        if base_len == 0 {
            return Ok(candidates);
        }
        // Drop the innermost directory: back over the trailing slash to
        // the one before it.
        base_len = match base_path[..base_len - 1].rfind('/') {
            Some(idx) => idx + 1,
            None => 0,
        };
    }
}

/// Probes `path`, climbing from its `*` step if it has one. The climb
/// stops at the first positive answer; candidates further out are not
/// probed.
pub fn lookup_with_acquisition(
    ctx: &mut dyn LookupContext,
    path: &str,
) -> io::Result<TemplateLookupResult> {
    for candidate in acquisition_candidates(path)? {
        let loading = ctx.probe(&candidate)?;
        if loading.is_positive() {
            return Ok(TemplateLookupResult::Positive(PositiveLookup {
                resolved_name: candidate,
                loading,
            }));
        }
    }
    Ok(TemplateLookupResult::Negative)
}
