//! Site locales and the per-locale value container.
//!
//! The public site is bilingual. English is the primary locale; Arabic is
//! rendered right-to-left by the front end but is otherwise treated the same.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A supported content locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Ar,
}

impl Locale {
    /// The locale every publishable block must carry a value for.
    pub const PRIMARY: Locale = Locale::En;

    /// All locales, in display order.
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Ar];

    pub fn as_str(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ar => "ar",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Locale {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "ar" => Ok(Locale::Ar),
            other => Err(CoreError::Validation(format!(
                "Unknown locale '{other}'. Must be one of: en, ar"
            ))),
        }
    }
}

/// One value per locale. Missing locales are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Localized<T> {
    #[serde(default)]
    pub en: Option<T>,
    #[serde(default)]
    pub ar: Option<T>,
}

// Manual impl so `T` need not be `Default`.
impl<T> Default for Localized<T> {
    fn default() -> Self {
        Self { en: None, ar: None }
    }
}

impl<T> Localized<T> {
    pub fn new(en: Option<T>, ar: Option<T>) -> Self {
        Self { en, ar }
    }

    pub fn get(&self, locale: Locale) -> Option<&T> {
        match locale {
            Locale::En => self.en.as_ref(),
            Locale::Ar => self.ar.as_ref(),
        }
    }

    pub fn set(&mut self, locale: Locale, value: Option<T>) {
        match locale {
            Locale::En => self.en = value,
            Locale::Ar => self.ar = value,
        }
    }

    /// Apply `f` to every present value, keeping absent locales absent.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Localized<U> {
        Localized {
            en: self.en.map(&mut f),
            ar: self.ar.map(&mut f),
        }
    }

    /// Like [`map`](Self::map) but stops at the first error.
    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(T) -> Result<U, E>,
    ) -> Result<Localized<U>, E> {
        Ok(Localized {
            en: self.en.map(&mut f).transpose()?,
            ar: self.ar.map(&mut f).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_locale_is_case_insensitive() {
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!(" ar ".parse::<Locale>().unwrap(), Locale::Ar);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn get_and_set_by_locale() {
        let mut title: Localized<String> = Localized::default();
        title.set(Locale::Ar, Some("من نحن".into()));
        assert_eq!(title.get(Locale::Ar).map(String::as_str), Some("من نحن"));
        assert!(title.get(Locale::En).is_none());
    }

    #[test]
    fn missing_locales_deserialize_as_none() {
        let value: Localized<String> = serde_json::from_str(r#"{"en":"Welcome"}"#).unwrap();
        assert_eq!(value.en.as_deref(), Some("Welcome"));
        assert!(value.ar.is_none());
    }
}
