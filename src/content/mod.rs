//! Localized analysis content.
//!
//! Step titles, findings and narrative comments live in embedded TOML
//! tables, one per locale, so adding content never touches the code.
//! Lookups for a locale without a table fall back to English.

use crate::models::{AnalysisComment, Finding, Locale, MetricPoint, Step};
use serde::Deserialize;
use std::collections::HashMap;

const EN: &str = include_str!("en.toml");
const TR: &str = include_str!("tr.toml");
const SERIES: &str = include_str!("series.toml");

/// Title and description of one analysis step.
#[derive(Debug, Clone, Deserialize)]
pub struct StepText {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// All content for one locale.
#[derive(Debug, Clone, Deserialize)]
pub struct LocaleContent {
    pub steps: Vec<StepText>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub comments: Vec<AnalysisComment>,
}

/// Reference metric series, shared by all locales.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricSeries {
    pub lcp: Vec<MetricPoint>,
    pub fid: Vec<MetricPoint>,
    pub cls: Vec<MetricPoint>,
    pub ttfb: Vec<MetricPoint>,
}

/// Locale-keyed content lookup.
#[derive(Debug, Clone)]
pub struct ContentCatalog {
    english: LocaleContent,
    locales: HashMap<Locale, LocaleContent>,
    series: MetricSeries,
}

impl ContentCatalog {
    /// Parse the embedded tables.
    pub fn builtin() -> Result<Self, toml::de::Error> {
        let english = toml::from_str::<LocaleContent>(EN)?;
        let mut locales = HashMap::new();
        locales.insert(Locale::Tr, toml::from_str::<LocaleContent>(TR)?);
        let series = toml::from_str(SERIES)?;
        Ok(Self {
            english,
            locales,
            series,
        })
    }

    /// Build a catalog from explicit tables. English must be present.
    #[cfg(test)]
    pub fn from_parts(
        mut locales: HashMap<Locale, LocaleContent>,
        series: MetricSeries,
    ) -> Option<Self> {
        let english = locales.remove(&Locale::En)?;
        Some(Self {
            english,
            locales,
            series,
        })
    }

    /// Content for a locale, English when the locale has no table.
    pub fn content(&self, locale: Locale) -> &LocaleContent {
        match locale {
            Locale::En => &self.english,
            other => self.locales.get(&other).unwrap_or(&self.english),
        }
    }

    /// Fresh pending step list for a locale.
    pub fn initial_steps(&self, locale: Locale) -> Vec<Step> {
        self.content(locale)
            .steps
            .iter()
            .map(|s| Step::pending(s.id.clone(), s.name.clone(), s.description.clone()))
            .collect()
    }

    pub fn findings(&self, locale: Locale) -> &[Finding] {
        &self.content(locale).findings
    }

    pub fn comments(&self, locale: Locale) -> &[AnalysisComment] {
        &self.content(locale).comments
    }

    pub fn series(&self) -> &MetricSeries {
        &self.series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommentCategory, StepStatus};

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = ContentCatalog::builtin().unwrap();
        assert_eq!(catalog.content(Locale::En).steps.len(), 6);
        assert_eq!(catalog.content(Locale::Tr).steps.len(), 6);
        assert_eq!(catalog.series().lcp.len(), 5);
    }

    #[test]
    fn test_step_ids_match_across_locales() {
        let catalog = ContentCatalog::builtin().unwrap();
        let en: Vec<_> = catalog.initial_steps(Locale::En).into_iter().map(|s| s.id).collect();
        let tr: Vec<_> = catalog.initial_steps(Locale::Tr).into_iter().map(|s| s.id).collect();
        assert_eq!(en, tr);
        assert_eq!(en, vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn test_initial_steps_are_pending() {
        let catalog = ContentCatalog::builtin().unwrap();
        let steps = catalog.initial_steps(Locale::En);
        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(steps[0].name, "DNS Lookup");
        assert_eq!(steps[5].name, "Final Report");
    }

    #[test]
    fn test_comments_are_localized() {
        let catalog = ContentCatalog::builtin().unwrap();
        let en = catalog.comments(Locale::En);
        let tr = catalog.comments(Locale::Tr);
        assert_eq!(en.len(), 5);
        assert_eq!(tr.len(), 2);
        assert_eq!(en[0].category, CommentCategory::Performance);
        assert_ne!(en[0].message, tr[0].message);
    }

    #[test]
    fn test_missing_locale_falls_back_to_english() {
        let builtin = ContentCatalog::builtin().unwrap();
        let mut locales = HashMap::new();
        locales.insert(Locale::En, builtin.content(Locale::En).clone());
        let catalog = ContentCatalog::from_parts(locales, builtin.series().clone()).unwrap();

        assert_eq!(catalog.initial_steps(Locale::Tr)[0].name, "DNS Lookup");
    }

    #[test]
    fn test_from_parts_requires_english() {
        let builtin = ContentCatalog::builtin().unwrap();
        let mut locales = HashMap::new();
        locales.insert(Locale::Tr, builtin.content(Locale::Tr).clone());
        assert!(ContentCatalog::from_parts(locales, builtin.series().clone()).is_none());
    }
}
