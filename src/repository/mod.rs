//! # Repository Module
//!
//! Persistence contract for articles, users and contact messages.
//!
//! ## Overview
//!
//! Each entity has one trait ([`ArticleRepository`], [`UserRepository`],
//! [`ContactRepository`]) and two implementations:
//!
//! - [`memory`] keeps rows in process behind one `parking_lot::Mutex` per table
//! - [`remote`] talks to a PostgREST service over blocking HTTP
//!
//! Controllers only ever hold `Arc<dyn ...Repository>`, so the backend is chosen once at
//! start-up from configuration.
//!
//! ## Shared behaviour
//!
//! Pagination, statistics and the "most common" tie-break live here as default trait
//! methods and free helpers, so both backends answer the same way for the same rows:
//!
//! - [`Page::from_items`] slices an already ordered list
//! - [`Counts`] tallies keys in first-seen order
//! - [`Counts::most_common`] picks the highest count, earliest key on ties
//!
//! ## Absent vs failed
//!
//! Lookups return `Option`; a missing row is not an error. Writes return
//! [`RepositoryError`]. The remote backend logs read failures and degrades to empty
//! results instead of failing the page.

pub mod memory;
pub mod remote;

pub use memory::{MemoryArticleRepository, MemoryContactRepository, MemoryUserRepository};
pub use remote::RemoteBackend;

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::RepositoryError;
use crate::models::{
    self, Article, ContactMessage, NewArticle, NewContactMessage, NewUser, Plan, User,
};

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Window used by `statistics()` when a backend is not configured otherwise.
pub const DEFAULT_RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order {other:?}")),
        }
    }
}

/// Stable sort of `items` by the timestamp `key` returns.
pub fn sort_by_date<T>(items: &mut [T], order: SortOrder, key: impl Fn(&T) -> NaiveDateTime) {
    match order {
        SortOrder::Asc => items.sort_by_key(|item| key(item)),
        SortOrder::Desc => items.sort_by(|a, b| key(b).cmp(&key(a))),
    }
}

/// One page of an ordered listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(rename = "pagina_actual")]
    pub page: usize,
    #[serde(rename = "por_pagina")]
    pub page_size: usize,
    #[serde(rename = "total")]
    pub total_items: usize,
    #[serde(rename = "total_paginas")]
    pub total_pages: usize,
    #[serde(rename = "tiene_anterior")]
    pub has_previous: bool,
    #[serde(rename = "tiene_siguiente")]
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Slice page `page` (1-based) out of `ordered`.
    ///
    /// Page 0 and page size 0 are clamped to 1. A page past the end has no items but
    /// keeps the totals.
    #[must_use]
    pub fn from_items(ordered: Vec<T>, page: usize, page_size: usize) -> Self {
        let total_items = ordered.len();
        let mut page = Self::empty(page, page_size, total_items);
        let offset = (page.page - 1).saturating_mul(page.page_size);
        page.items = ordered
            .into_iter()
            .skip(offset)
            .take(page.page_size)
            .collect();
        page
    }

    /// Page metadata for a listing whose slice is fetched separately.
    #[must_use]
    pub fn empty(page: usize, page_size: usize, total_items: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_pages = total_items.div_ceil(page_size);
        Self {
            items: Vec::new(),
            page,
            page_size,
            total_items,
            total_pages,
            has_previous: page > 1,
            has_next: page < total_pages,
        }
    }

    /// Zero-based offset of the first item on this page.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }
}

/// Key counts in first-seen order. Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counts(Vec<(String, usize)>);

impl Counts {
    pub fn tally<K: AsRef<str>>(keys: impl IntoIterator<Item = K>) -> Self {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<(String, usize)> = Vec::new();
        for key in keys {
            let key = key.as_ref();
            match index.get(key) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    index.insert(key.to_string(), counts.len());
                    counts.push((key.to_string(), 1));
                }
            }
        }
        Self(counts)
    }

    /// Highest count; among equal counts the key seen first.
    #[must_use]
    pub fn most_common(&self) -> Option<String> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.0 {
            match best {
                Some(b) if entry.1 <= b.1 => {}
                _ => best = Some(entry),
            }
        }
        best.map(|(key, _)| key.clone())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> usize {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, n)| *n)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(k, n)| (k.as_str(), *n))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Counts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, count) in &self.0 {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

/// `part / total` as a percentage rounded to two decimals; 0 for an empty total.
#[must_use]
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Lowercased search needle, or `None` when the text is blank.
#[must_use]
pub fn search_needle(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

fn unique_first_seen(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleStats {
    pub total: usize,
    #[serde(rename = "recientes")]
    pub recent: usize,
    #[serde(rename = "categorias")]
    pub by_category: Counts,
    #[serde(rename = "autores")]
    pub by_author: Counts,
    #[serde(rename = "categoria_mas_comun")]
    pub most_common_category: Option<String>,
    #[serde(rename = "autor_mas_prolifico")]
    pub most_prolific_author: Option<String>,
}

impl ArticleStats {
    #[must_use]
    pub fn compute(articles: &[Article], recent_days: i64, now: NaiveDateTime) -> Self {
        let by_category = Counts::tally(articles.iter().map(|a| a.category.as_str()));
        let by_author = Counts::tally(articles.iter().map(|a| a.author.as_str()));
        Self {
            total: articles.len(),
            recent: articles
                .iter()
                .filter(|a| a.is_recent(recent_days, now))
                .count(),
            most_common_category: by_category.most_common(),
            most_prolific_author: by_author.most_common(),
            by_category,
            by_author,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub total: usize,
    #[serde(rename = "recientes")]
    pub recent: usize,
    #[serde(rename = "planes")]
    pub by_plan: Counts,
    pub premium: usize,
    pub free: usize,
    #[serde(rename = "suscritos")]
    pub subscribed: usize,
    #[serde(rename = "no_suscritos")]
    pub unsubscribed: usize,
    #[serde(rename = "porcentaje_premium")]
    pub premium_percentage: f64,
    #[serde(rename = "porcentaje_suscritos")]
    pub subscribed_percentage: f64,
    #[serde(rename = "plan_mas_comun")]
    pub most_common_plan: Option<String>,
}

impl UserStats {
    /// `free` counts every user outside the premium tiers.
    #[must_use]
    pub fn compute(users: &[User], recent_days: i64, now: NaiveDateTime) -> Self {
        let total = users.len();
        let premium = users.iter().filter(|u| u.is_premium()).count();
        let subscribed = users.iter().filter(|u| u.subscribed).count();
        let by_plan = Counts::tally(users.iter().map(|u| u.plan.as_str()));
        Self {
            total,
            recent: users
                .iter()
                .filter(|u| u.days_registered(now) <= recent_days)
                .count(),
            premium,
            free: total - premium,
            subscribed,
            unsubscribed: total - subscribed,
            premium_percentage: percentage(premium, total),
            subscribed_percentage: percentage(subscribed, total),
            most_common_plan: by_plan.most_common(),
            by_plan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactStats {
    pub total: usize,
    #[serde(rename = "recientes")]
    pub recent: usize,
    #[serde(rename = "leidos")]
    pub read: usize,
    #[serde(rename = "no_leidos")]
    pub unread: usize,
    #[serde(rename = "porcentaje_leidos")]
    pub read_percentage: f64,
    #[serde(rename = "remitentes")]
    pub by_sender: Counts,
    #[serde(rename = "remitente_mas_frecuente")]
    pub most_frequent_sender: Option<String>,
}

impl ContactStats {
    #[must_use]
    pub fn compute(messages: &[ContactMessage], recent_days: i64, now: NaiveDateTime) -> Self {
        let total = messages.len();
        let read = messages.iter().filter(|m| m.read).count();
        let by_sender = Counts::tally(messages.iter().map(|m| m.email.to_lowercase()));
        Self {
            total,
            recent: messages
                .iter()
                .filter(|m| m.is_recent(recent_days, now))
                .count(),
            read,
            unread: total - read,
            read_percentage: percentage(read, total),
            most_frequent_sender: by_sender.most_common(),
            by_sender,
        }
    }
}

pub trait ArticleRepository: Send + Sync {
    /// Validate, apply defaults and store. The backend assigns the id.
    fn create(&self, article: NewArticle) -> RepoResult<Article>;

    fn find_by_id(&self, id: i64) -> Option<Article>;

    /// Every article in insertion order.
    fn list_all(&self) -> Vec<Article>;

    /// Exact, case-sensitive category match.
    fn list_by_category(&self, category: &str) -> Vec<Article>;

    fn list_by_author(&self, author: &str) -> Vec<Article>;

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<Article>;

    /// Day window used by [`ArticleRepository::statistics`].
    fn recent_window(&self) -> i64 {
        DEFAULT_RECENT_DAYS
    }

    /// Case-insensitive substring search over title, body and teaser.
    fn search(&self, text: &str) -> Vec<Article> {
        let Some(needle) = search_needle(text) else {
            return Vec::new();
        };
        self.list_all()
            .into_iter()
            .filter(|a| a.matches_text(&needle))
            .collect()
    }

    /// Newest first, published within the last `days` days.
    fn list_recent(&self, days: i64) -> Vec<Article> {
        let now = models::now();
        self.list_ordered_by_date(SortOrder::Desc)
            .into_iter()
            .filter(|a| a.is_recent(days, now))
            .collect()
    }

    fn paginate(&self, page: usize, page_size: usize) -> Page<Article> {
        Page::from_items(self.list_ordered_by_date(SortOrder::Desc), page, page_size)
    }

    fn count(&self) -> usize {
        self.list_all().len()
    }

    fn categories(&self) -> Vec<String> {
        unique_first_seen(self.list_all().into_iter().map(|a| a.category))
    }

    fn authors(&self) -> Vec<String> {
        unique_first_seen(self.list_all().into_iter().map(|a| a.author))
    }

    fn statistics(&self) -> ArticleStats {
        self.statistics_at(models::now())
    }

    fn statistics_at(&self, now: NaiveDateTime) -> ArticleStats {
        ArticleStats::compute(&self.list_all(), self.recent_window(), now)
    }
}

pub trait UserRepository: Send + Sync {
    /// Fails with `DuplicateKey` when the normalized email is already registered.
    fn create(&self, user: NewUser) -> RepoResult<User>;

    fn find_by_id(&self, id: &str) -> Option<User>;

    /// Lookup by email, compared case-insensitively after trimming.
    fn find_by_email(&self, email: &str) -> Option<User>;

    fn list_all(&self) -> Vec<User>;

    fn list_by_plan(&self, plan: Plan) -> Vec<User>;

    fn list_subscribed(&self) -> Vec<User>;

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<User>;

    /// Replace the stored row with `user`. The email must stay unique among other users.
    fn update(&self, user: &User) -> RepoResult<User>;

    /// `Ok(false)` when no row had that id.
    fn delete(&self, id: &str) -> RepoResult<bool>;

    fn clear(&self) -> RepoResult<()>;

    fn recent_window(&self) -> i64 {
        DEFAULT_RECENT_DAYS
    }

    /// Case-insensitive substring search over name and email.
    fn search(&self, text: &str) -> Vec<User> {
        let Some(needle) = search_needle(text) else {
            return Vec::new();
        };
        self.list_all()
            .into_iter()
            .filter(|u| {
                u.name.to_lowercase().contains(&needle) || u.email.to_lowercase().contains(&needle)
            })
            .collect()
    }

    fn exists_by_email(&self, email: &str) -> bool {
        self.find_by_email(email).is_some()
    }

    fn paginate(&self, page: usize, page_size: usize) -> Page<User> {
        Page::from_items(self.list_ordered_by_date(SortOrder::Desc), page, page_size)
    }

    fn count(&self) -> usize {
        self.list_all().len()
    }

    fn statistics(&self) -> UserStats {
        self.statistics_at(models::now())
    }

    fn statistics_at(&self, now: NaiveDateTime) -> UserStats {
        UserStats::compute(&self.list_all(), self.recent_window(), now)
    }
}

pub trait ContactRepository: Send + Sync {
    fn create(&self, message: NewContactMessage) -> RepoResult<ContactMessage>;

    fn find_by_id(&self, id: i64) -> Option<ContactMessage>;

    /// Messages from one sender, compared case-insensitively.
    fn list_by_email(&self, email: &str) -> Vec<ContactMessage>;

    fn list_all(&self) -> Vec<ContactMessage>;

    fn list_read(&self) -> Vec<ContactMessage>;

    fn list_unread(&self) -> Vec<ContactMessage>;

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<ContactMessage>;

    /// Fails with `NotFound` for an unknown id.
    fn mark_as_read(&self, id: i64) -> RepoResult<()>;

    fn delete(&self, id: i64) -> RepoResult<bool>;

    fn recent_window(&self) -> i64 {
        DEFAULT_RECENT_DAYS
    }

    /// Case-insensitive substring search over name, email and message.
    fn search(&self, text: &str) -> Vec<ContactMessage> {
        let Some(needle) = search_needle(text) else {
            return Vec::new();
        };
        self.list_all()
            .into_iter()
            .filter(|m| m.matches_text(&needle))
            .collect()
    }

    fn paginate(&self, page: usize, page_size: usize) -> Page<ContactMessage> {
        Page::from_items(self.list_ordered_by_date(SortOrder::Desc), page, page_size)
    }

    fn count(&self) -> usize {
        self.list_all().len()
    }

    fn count_unread(&self) -> usize {
        self.list_unread().len()
    }

    fn statistics(&self) -> ContactStats {
        self.statistics_at(models::now())
    }

    fn statistics_at(&self, now: NaiveDateTime) -> ContactStats {
        ContactStats::compute(&self.list_all(), self.recent_window(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slices_and_flags() {
        let page = Page::from_items((0..7).collect::<Vec<_>>(), 2, 3);
        assert_eq!(page.items, vec![3, 4, 5]);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_previous);
        assert!(page.has_next);
    }

    #[test]
    fn test_page_past_end_and_clamping() {
        let past = Page::from_items((0..7).collect::<Vec<_>>(), 9, 3);
        assert!(past.items.is_empty());
        assert!(!past.has_next);
        assert_eq!(past.total_items, 7);

        let clamped = Page::from_items(vec!['a', 'b'], 0, 0);
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.page_size, 1);
        assert_eq!(clamped.items, vec!['a']);
        assert_eq!(clamped.total_pages, 2);
    }

    #[test]
    fn test_empty_listing_has_no_pages() {
        let page: Page<u8> = Page::from_items(Vec::new(), 1, 6);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_most_common_prefers_first_seen() {
        let counts = Counts::tally(["Economía", "Deportes", "Deportes", "Economía", "Cultura"]);
        assert_eq!(counts.most_common().as_deref(), Some("Economía"));
        assert_eq!(counts.get("Deportes"), 2);
        assert_eq!(counts.keys(), vec!["Economía", "Deportes", "Cultura"]);
        assert_eq!(Counts::default().most_common(), None);
    }

    #[test]
    fn test_counts_serialize_in_order() {
        let counts = Counts::tally(["b", "a", "b"]);
        assert_eq!(serde_json::to_string(&counts).unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn test_search_needle() {
        assert_eq!(search_needle("  IA "), Some("ia".to_string()));
        assert_eq!(search_needle("   "), None);
    }

    #[test]
    fn test_sort_by_date_is_stable() {
        let t = |s: &str| models::timestamp::parse(s).unwrap();
        let mut rows = vec![
            (1, t("2024-01-01 00:00:00")),
            (2, t("2024-01-02 00:00:00")),
            (3, t("2024-01-01 00:00:00")),
        ];
        sort_by_date(&mut rows, SortOrder::Desc, |r| r.1);
        assert_eq!(rows.iter().map(|r| r.0).collect::<Vec<_>>(), vec![2, 1, 3]);
        sort_by_date(&mut rows, SortOrder::Asc, |r| r.1);
        assert_eq!(rows.iter().map(|r| r.0).collect::<Vec<_>>(), vec![1, 3, 2]);
    }
}
