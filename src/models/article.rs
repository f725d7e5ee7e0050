use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{age_label, days_between, timestamp};
use crate::error::ValidationErrors;
use crate::validation::{Rule, Validator};

pub const DEFAULT_AUTHOR: &str = "Redacción El Faro";
pub const DEFAULT_CATEGORY: &str = "General";
const SUMMARY_LENGTH: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "bajada")]
    pub teaser: String,
    #[serde(rename = "contenido")]
    pub body: String,
    #[serde(rename = "fecha", with = "timestamp")]
    pub published_at: NaiveDateTime,
    #[serde(rename = "autor")]
    pub author: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "imagen", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Article data before the repository assigns an id.
///
/// A missing timestamp is filled with the current time on create; an empty author or
/// category falls back to the newsroom defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "bajada")]
    pub teaser: String,
    #[serde(rename = "contenido")]
    pub body: String,
    #[serde(rename = "autor")]
    pub author: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "imagen", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(
        rename = "fecha",
        with = "timestamp::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub published_at: Option<NaiveDateTime>,
}

impl NewArticle {
    #[must_use]
    pub fn new(title: &str, teaser: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            teaser: teaser.to_string(),
            body: body.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            image: None,
            published_at: None,
        }
    }

    #[must_use]
    pub fn by(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    #[must_use]
    pub fn in_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    #[must_use]
    pub fn published(mut self, at: NaiveDateTime) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Apply defaults and trim text fields.
    #[must_use]
    pub fn normalized(mut self, now: NaiveDateTime) -> Self {
        self.title = self.title.trim().to_string();
        self.teaser = self.teaser.trim().to_string();
        self.body = self.body.trim().to_string();
        self.author = non_empty_or(self.author.trim(), DEFAULT_AUTHOR);
        self.category = non_empty_or(self.category.trim(), DEFAULT_CATEGORY);
        self.image = self.image.filter(|i| !i.trim().is_empty());
        self.published_at = Some(self.published_at.unwrap_or(now));
        self
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check_labeled("titulo", "título", &self.title, &[Rule::Required, Rule::Min(5), Rule::Max(200)])
            .check_labeled("bajada", "bajada", &self.teaser, &[Rule::Required, Rule::Min(10), Rule::Max(300)])
            .check_labeled("contenido", "contenido", &self.body, &[Rule::Required, Rule::Min(50)])
            .check_labeled("autor", "autor", &self.author, &[Rule::Required, Rule::Max(100)])
            .check_labeled("categoria", "categoría", &self.category, &[Rule::Required]);
        v.finish()
    }

    /// Build the stored record. Call after [`NewArticle::normalized`].
    #[must_use]
    pub fn into_article(self, id: i64, now: NaiveDateTime) -> Article {
        Article {
            id,
            title: self.title,
            teaser: self.teaser,
            body: self.body,
            published_at: self.published_at.unwrap_or(now),
            author: self.author,
            category: self.category,
            image: self.image,
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

impl Article {
    /// First 150 characters of the body, with an ellipsis when cut.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.body.chars().count() <= SUMMARY_LENGTH {
            return self.body.clone();
        }
        let cut: String = self.body.chars().take(SUMMARY_LENGTH).collect();
        format!("{cut}...")
    }

    #[must_use]
    pub fn age_days(&self, now: NaiveDateTime) -> i64 {
        days_between(self.published_at, now)
    }

    /// Published within the last `days` days (inclusive).
    #[must_use]
    pub fn is_recent(&self, days: i64, now: NaiveDateTime) -> bool {
        self.age_days(now) <= days
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }

    /// Estimated reading time at 200 words per minute, at least one minute.
    #[must_use]
    pub fn reading_minutes(&self) -> usize {
        self.word_count().div_ceil(200).max(1)
    }

    /// Title, teaser and body contain `needle` (already lowercased).
    #[must_use]
    pub fn matches_text(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.body.to_lowercase().contains(needle)
            || self.teaser.to_lowercase().contains(needle)
    }

    #[must_use]
    pub fn public_summary(&self, recent_days: i64, now: NaiveDateTime) -> ArticleSummary {
        ArticleSummary {
            id: self.id,
            title: self.title.clone(),
            teaser: self.teaser.clone(),
            summary: self.summary(),
            published_at: self.published_at,
            published_label: self.published_at.format("%d/%m/%Y").to_string(),
            author: self.author.clone(),
            category: self.category.clone(),
            age: age_label(self.age_days(now)),
            recent: self.is_recent(recent_days, now),
        }
    }
}

/// Public projection used by listings and the JSON endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    pub id: i64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "bajada")]
    pub teaser: String,
    #[serde(rename = "resumen")]
    pub summary: String,
    #[serde(rename = "fecha", with = "timestamp")]
    pub published_at: NaiveDateTime,
    #[serde(rename = "fechaFormateada")]
    pub published_label: String,
    #[serde(rename = "autor")]
    pub author: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "edad")]
    pub age: String,
    #[serde(rename = "esReciente")]
    pub recent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::timestamp;

    fn sample() -> NewArticle {
        NewArticle::new(
            "Ciencia: Nuevo hallazgo",
            "Una bajada suficientemente larga",
            &"Contenido del artículo con suficiente texto. ".repeat(3),
        )
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_each_field() {
        let article = NewArticle::new("Hola", "corta", "breve").by("").in_category("");
        let errors = article.validate().unwrap_err();
        assert!(errors.get("titulo").is_some());
        assert!(errors.get("bajada").is_some());
        assert!(errors.get("contenido").is_some());
        assert!(errors.get("autor").is_some());
        assert!(errors.get("categoria").is_some());
    }

    #[test]
    fn test_normalized_applies_defaults() {
        let now = timestamp::parse("2024-02-01 12:00:00").unwrap();
        let article = sample().by("  ").in_category("").normalized(now);
        assert_eq!(article.author, DEFAULT_AUTHOR);
        assert_eq!(article.category, DEFAULT_CATEGORY);
        assert_eq!(article.published_at, Some(now));
    }

    #[test]
    fn test_summary_truncates_on_characters() {
        let now = timestamp::parse("2024-02-01 12:00:00").unwrap();
        let mut article = sample().normalized(now).into_article(1, now);
        article.body = "ñ".repeat(200);
        let summary = article.summary();
        assert_eq!(summary.chars().count(), 153);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_recent_window_is_inclusive() {
        let published = timestamp::parse("2024-01-08 08:00:00").unwrap();
        let now = timestamp::parse("2024-01-15 09:00:00").unwrap();
        let article = sample().published(published).normalized(now).into_article(1, now);
        assert_eq!(article.age_days(now), 7);
        assert!(article.is_recent(7, now));
        assert!(!article.is_recent(6, now));
    }
}
