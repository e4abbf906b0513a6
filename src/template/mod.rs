//! Compiled templates, per-template options, and the parser seam
//!
//! The resolution engine does not know any template grammar. It hands the
//! loaded character content to a [`TemplateParser`] and caches whatever
//! [`Template`] comes back. The parser seam also carries the one
//! recoverable signal of the pipeline: [`ParseError::WrongCharset`], raised
//! when byte content declares a different charset than the one it was
//! decoded with. The engine then re-decodes the same bytes with the
//! declared charset and parses again, exactly once.
//!
//! # Per-Template Options
//!
//! Two override sources can contribute [`TemplateOptions`] for a single
//! template:
//!
//! - a name-scoped [`TemplateOptionsFactory`] configured on the resolver,
//! - an override embedded in the backing store's loading result
//!   (source-level).
//!
//! They are merged field by field; the source-level override wins ties.

use std::fmt;
use std::sync::Arc;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::core::Token;
use crate::locale::Locale;

/// A compiled, ready-to-render template.
///
/// Immutable once published into the cache; the engine records the locale
/// and custom lookup condition it was resolved under, so a render layer can
/// resolve relative references consistently.
#[derive(Debug)]
pub struct Template {
    name: String,
    source_name: String,
    body: String,
    language: String,
    lookup_locale: Option<Locale>,
    custom_lookup_condition: Option<Arc<dyn Token>>,
}

impl Template {
    /// Creates a template artifact. Parsers call this; the engine fills in
    /// the lookup locale and condition afterwards.
    pub fn new(
        name: impl Into<String>,
        source_name: impl Into<String>,
        body: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_name: source_name.into(),
            body: body.into(),
            language: language.into(),
            lookup_locale: None,
            custom_lookup_condition: None,
        }
    }

    /// The normalized name the template was requested as.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name the lookup actually found the template under; differs from
    /// [`name`](Self::name) after locale fallback or `*` acquisition.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The parsed template body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The template language tag the parser compiled this template as.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The locale the template was looked up under, if any.
    pub fn lookup_locale(&self) -> Option<&Locale> {
        self.lookup_locale.as_ref()
    }

    /// The custom lookup condition the template was looked up under.
    pub fn custom_lookup_condition(&self) -> Option<&Arc<dyn Token>> {
        self.custom_lookup_condition.as_ref()
    }

    pub(crate) fn set_lookup_locale(&mut self, locale: Option<Locale>) {
        self.lookup_locale = locale;
    }

    pub(crate) fn set_custom_lookup_condition(&mut self, condition: Option<Arc<dyn Token>>) {
        self.custom_lookup_condition = condition;
    }
}

/// Per-template configuration override.
///
/// Every field is optional; unset fields fall back to the next layer
/// (another override, then the resolver defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TemplateOptions {
    /// Forces the lookup locale recorded on the template.
    pub locale: Option<Locale>,
    /// Charset label used to decode byte content (e.g. `"utf-8"`).
    pub charset: Option<String>,
    /// Template language tag passed to the parser.
    pub language: Option<String>,
}

impl TemplateOptions {
    /// Merges `self` over `base`: fields set on `self` win, unset fields
    /// fall through to `base`.
    #[must_use]
    pub fn merged_over(&self, base: &TemplateOptions) -> TemplateOptions {
        TemplateOptions {
            locale: self.locale.clone().or_else(|| base.locale.clone()),
            charset: self.charset.clone().or_else(|| base.charset.clone()),
            language: self.language.clone().or_else(|| base.language.clone()),
        }
    }
}

/// Name-scoped provider of [`TemplateOptions`], consulted once per (re)load
/// with the resolved source name and the backing-store source identity.
pub trait TemplateOptionsFactory: Send + Sync + fmt::Debug {
    /// Returns the override for the given template, or `None` when this
    /// factory has nothing to say about it.
    fn get(
        &self,
        source_name: &str,
        source: &Arc<dyn Token>,
    ) -> Result<Option<TemplateOptions>, anyhow::Error>;
}

/// Everything a parser needs for one compilation attempt.
#[derive(Debug)]
pub struct ParseRequest<'a> {
    /// Normalized requested name.
    pub name: &'a str,
    /// Name the lookup resolved to.
    pub source_name: &'a str,
    /// Decoded template content.
    pub text: &'a str,
    /// Template language tag.
    pub language: &'a str,
    /// The charset `text` was decoded with; `None` when the backing store
    /// provided character content directly (no decode happened, so a
    /// [`ParseError::WrongCharset`] cannot be honored).
    pub charset: Option<&'static Encoding>,
    /// The merged per-template options, if any.
    pub options: Option<&'a TemplateOptions>,
}

/// Outcome of a failed [`TemplateParser::parse`] call.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Recoverable: the content declares a charset different from the one
    /// it was decoded with. The engine re-decodes and retries once.
    #[error("template content declares charset {declared:?}")]
    WrongCharset {
        /// The charset label declared inside the content.
        declared: String,
    },

    /// Terminal compilation failure.
    #[error("{0:#}")]
    Fatal(anyhow::Error),
}

impl ParseError {
    /// Convenience constructor for terminal failures.
    pub fn fatal(error: impl Into<anyhow::Error>) -> Self {
        Self::Fatal(error.into())
    }
}

/// The compiler seam of the engine.
///
/// Invoked only when the backing artifact changed (first load, or source or
/// version differ from the cached entry); never invoked on fresh cache hits
/// or "not modified" short-circuits.
pub trait TemplateParser: Send + Sync + fmt::Debug {
    /// Compiles one template.
    fn parse(&self, request: ParseRequest<'_>) -> Result<Template, ParseError>;
}

/// A parser that performs no compilation: the template body is the content
/// verbatim. The default parser of the resolver; also handy in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl TemplateParser for PlainTextParser {
    fn parse(&self, request: ParseRequest<'_>) -> Result<Template, ParseError> {
        Ok(Template::new(
            request.name,
            request.source_name,
            request.text,
            request.language,
        ))
    }
}

/// Resolves a charset label (`"utf-8"`, `"ISO-8859-1"`, …) to an encoding.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Decodes byte content with the given encoding. Malformed sequences are
/// replaced, matching the lossy decode the original readers performed; the
/// parser is the layer that rejects nonsense content.
pub(crate) fn decode_content(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}
