//! Locale value type used by localized template lookup
//!
//! A [`Locale`] is a `language[_COUNTRY[_VARIANT]]` triple rendered with
//! underscores, e.g. `en`, `en_US`, `en_US_POSIX`. Localized lookup appends
//! the rendered form to the requested template name and right-truncates it
//! one underscore group at a time when probing fallbacks (see
//! [`crate::lookup`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::MalformedNameError;

/// A language/country/variant triple, compared case-sensitively and
/// rendered as `language[_COUNTRY[_VARIANT]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    language: String,
    country: Option<String>,
    variant: Option<String>,
}

impl Locale {
    /// Creates a language-only locale, e.g. `Locale::new("en")`.
    pub fn new(language: impl Into<String>) -> Self {
        Self { language: language.into(), country: None, variant: None }
    }

    /// Adds a country part, e.g. `Locale::new("en").with_country("US")`.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Adds a variant part, e.g. `POSIX`.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// The language part.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The country part, if any.
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// The variant part, if any.
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        if let Some(country) = &self.country {
            write!(f, "_{country}")?;
        }
        if let Some(variant) = &self.variant {
            write!(f, "_{variant}")?;
        }
        Ok(())
    }
}

impl FromStr for Locale {
    type Err = MalformedNameError;

    /// Parses `language[_COUNTRY[_VARIANT]]`. Empty parts are rejected; a
    /// variant may itself contain underscores (`en_US_POSIX_X` keeps
    /// `POSIX_X` as the variant).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '_');
        let language = parts.next().unwrap_or_default();
        if language.is_empty() {
            return Err(MalformedNameError::new(s, "locale must start with a language part"));
        }
        let country = parts.next();
        let variant = parts.next();
        if country.is_some_and(str::is_empty) || variant.is_some_and(str::is_empty) {
            return Err(MalformedNameError::new(s, "locale has an empty part"));
        }
        Ok(Self {
            language: language.to_string(),
            country: country.map(str::to_string),
            variant: variant.map(str::to_string),
        })
    }
}

impl TryFrom<String> for Locale {
    type Error = MalformedNameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.to_string()
    }
}
