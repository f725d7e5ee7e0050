//! In-process backend.
//!
//! Each table is a `Vec` of rows plus its auto-increment counter behind one
//! `parking_lot::Mutex`, so validation, the uniqueness check and id assignment happen in
//! one critical section. Rows keep insertion order.

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{
    sort_by_date, ArticleRepository, ContactRepository, RepoResult, SortOrder, UserRepository,
    DEFAULT_RECENT_DAYS,
};
use crate::error::RepositoryError;
use crate::models::user::normalize_email;
use crate::models::{
    self, Article, ContactMessage, NewArticle, NewContactMessage, NewUser, Plan, User,
};

const SEED_ARTICLES: &str = include_str!("../../data/articles.yaml");

struct Table<T> {
    rows: Vec<T>,
    next_id: i64,
}

impl<T> Table<T> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn take_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn filtered(&self, keep: impl Fn(&T) -> bool) -> Vec<T>
    where
        T: Clone,
    {
        self.rows.iter().filter(|row| keep(row)).cloned().collect()
    }
}

/// The newsroom's sample articles, in publication order (newest first).
pub fn seed_articles() -> RepoResult<Vec<NewArticle>> {
    serde_yaml::from_str(SEED_ARTICLES).map_err(|e| RepositoryError::Backend {
        operation: "seed",
        detail: e.to_string(),
    })
}

pub struct MemoryArticleRepository {
    table: Mutex<Table<Article>>,
    recent_days: i64,
}

impl Default for MemoryArticleRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryArticleRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table::new()),
            recent_days: DEFAULT_RECENT_DAYS,
        }
    }

    /// Repository preloaded with [`seed_articles`].
    pub fn seeded() -> RepoResult<Self> {
        let repo = Self::new();
        for article in seed_articles()? {
            repo.create(article)?;
        }
        info!(count = repo.count(), "Seeded in-memory articles");
        Ok(repo)
    }

    #[must_use]
    pub fn with_recent_days(mut self, days: i64) -> Self {
        self.recent_days = days;
        self
    }

    /// Drop every row and restart ids at 1.
    pub fn clear(&self) {
        *self.table.lock() = Table::new();
    }
}

impl ArticleRepository for MemoryArticleRepository {
    fn create(&self, article: NewArticle) -> RepoResult<Article> {
        let now = models::now();
        let article = article.normalized(now);
        article.validate()?;
        let mut table = self.table.lock();
        let id = table.take_id();
        let stored = article.into_article(id, now);
        table.rows.push(stored.clone());
        debug!(table = "articles", id, "Created article");
        Ok(stored)
    }

    fn find_by_id(&self, id: i64) -> Option<Article> {
        self.table.lock().rows.iter().find(|a| a.id == id).cloned()
    }

    fn list_all(&self) -> Vec<Article> {
        self.table.lock().rows.clone()
    }

    fn list_by_category(&self, category: &str) -> Vec<Article> {
        self.table.lock().filtered(|a| a.category == category)
    }

    fn list_by_author(&self, author: &str) -> Vec<Article> {
        self.table.lock().filtered(|a| a.author == author)
    }

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<Article> {
        let mut rows = self.list_all();
        sort_by_date(&mut rows, order, |a| a.published_at);
        rows
    }

    fn recent_window(&self) -> i64 {
        self.recent_days
    }

    fn count(&self) -> usize {
        self.table.lock().rows.len()
    }
}

pub struct MemoryUserRepository {
    table: Mutex<Table<User>>,
    recent_days: i64,
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table::new()),
            recent_days: DEFAULT_RECENT_DAYS,
        }
    }

    #[must_use]
    pub fn with_recent_days(mut self, days: i64) -> Self {
        self.recent_days = days;
        self
    }
}

fn duplicate_email(email: &str) -> RepositoryError {
    RepositoryError::DuplicateKey {
        field: "email",
        value: email.to_string(),
    }
}

impl UserRepository for MemoryUserRepository {
    fn create(&self, user: NewUser) -> RepoResult<User> {
        let now = models::now();
        let user = user.normalized(now);
        user.validate()?;
        let mut table = self.table.lock();
        if table.rows.iter().any(|u| u.email == user.email) {
            return Err(duplicate_email(&user.email));
        }
        let id = table.take_id().to_string();
        let stored = user.into_user(id, now);
        table.rows.push(stored.clone());
        debug!(table = "users", id = %stored.id, "Created user");
        Ok(stored)
    }

    fn find_by_id(&self, id: &str) -> Option<User> {
        self.table.lock().rows.iter().find(|u| u.id == id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        self.table
            .lock()
            .rows
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    fn list_all(&self) -> Vec<User> {
        self.table.lock().rows.clone()
    }

    fn list_by_plan(&self, plan: Plan) -> Vec<User> {
        self.table.lock().filtered(|u| u.plan == plan)
    }

    fn list_subscribed(&self) -> Vec<User> {
        self.table.lock().filtered(|u| u.subscribed)
    }

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<User> {
        let mut rows = self.list_all();
        sort_by_date(&mut rows, order, |u| u.registered_at);
        rows
    }

    fn update(&self, user: &User) -> RepoResult<User> {
        let mut updated = user.clone();
        updated.name = updated.name.trim().to_string();
        updated.email = normalize_email(&updated.email);
        updated.validate()?;

        let mut table = self.table.lock();
        if table
            .rows
            .iter()
            .any(|u| u.id != updated.id && u.email == updated.email)
        {
            return Err(duplicate_email(&updated.email));
        }
        let slot = table
            .rows
            .iter_mut()
            .find(|u| u.id == updated.id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "user",
                id: updated.id.clone(),
            })?;
        *slot = updated.clone();
        debug!(table = "users", id = %updated.id, "Updated user");
        Ok(updated)
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        let mut table = self.table.lock();
        let before = table.rows.len();
        table.rows.retain(|u| u.id != id);
        Ok(table.rows.len() < before)
    }

    fn clear(&self) -> RepoResult<()> {
        *self.table.lock() = Table::new();
        Ok(())
    }

    fn recent_window(&self) -> i64 {
        self.recent_days
    }

    fn count(&self) -> usize {
        self.table.lock().rows.len()
    }
}

pub struct MemoryContactRepository {
    table: Mutex<Table<ContactMessage>>,
    recent_days: i64,
}

impl Default for MemoryContactRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContactRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table::new()),
            recent_days: DEFAULT_RECENT_DAYS,
        }
    }

    #[must_use]
    pub fn with_recent_days(mut self, days: i64) -> Self {
        self.recent_days = days;
        self
    }
}

impl ContactRepository for MemoryContactRepository {
    fn create(&self, message: NewContactMessage) -> RepoResult<ContactMessage> {
        let now = models::now();
        let message = message.normalized(now);
        message.validate()?;
        let mut table = self.table.lock();
        let id = table.take_id();
        let stored = message.into_message(id, now);
        table.rows.push(stored.clone());
        debug!(table = "contacts", id, "Stored contact message");
        Ok(stored)
    }

    fn find_by_id(&self, id: i64) -> Option<ContactMessage> {
        self.table.lock().rows.iter().find(|m| m.id == id).cloned()
    }

    fn list_by_email(&self, email: &str) -> Vec<ContactMessage> {
        let email = normalize_email(email);
        self.table
            .lock()
            .filtered(|m| m.email.to_lowercase() == email)
    }

    fn list_all(&self) -> Vec<ContactMessage> {
        self.table.lock().rows.clone()
    }

    fn list_read(&self) -> Vec<ContactMessage> {
        self.table.lock().filtered(|m| m.read)
    }

    fn list_unread(&self) -> Vec<ContactMessage> {
        self.table.lock().filtered(|m| !m.read)
    }

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<ContactMessage> {
        let mut rows = self.list_all();
        sort_by_date(&mut rows, order, |m| m.received_at);
        rows
    }

    fn mark_as_read(&self, id: i64) -> RepoResult<()> {
        let mut table = self.table.lock();
        let message = table
            .rows
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "contact message",
                id: id.to_string(),
            })?;
        message.read = true;
        Ok(())
    }

    fn delete(&self, id: i64) -> RepoResult<bool> {
        let mut table = self.table.lock();
        let before = table.rows.len();
        table.rows.retain(|m| m.id != id);
        Ok(table.rows.len() < before)
    }

    fn recent_window(&self) -> i64 {
        self.recent_days
    }

    fn count(&self) -> usize {
        self.table.lock().rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_articles_are_valid() {
        let repo = MemoryArticleRepository::seeded().unwrap();
        assert_eq!(repo.count(), 9);
        let first = repo.find_by_id(1).unwrap();
        assert_eq!(first.category, "Tecnología");
        assert_eq!(repo.categories().len(), 8);
    }

    #[test]
    fn test_user_ids_are_sequential_strings() {
        let repo = MemoryUserRepository::new();
        let a = repo.create(NewUser::new("Ana", "ana@elfaro.cl", "h")).unwrap();
        let b = repo.create(NewUser::new("Beto", "beto@elfaro.cl", "h")).unwrap();
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
    }

    #[test]
    fn test_email_uniqueness_ignores_case() {
        let repo = MemoryUserRepository::new();
        repo.create(NewUser::new("Ana", "Ana@ElFaro.cl", "h")).unwrap();
        let err = repo
            .create(NewUser::new("Otra Ana", " ana@elfaro.cl ", "h"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateKey { field: "email", .. }));
        assert_eq!(repo.count(), 1);
        assert!(repo.exists_by_email("ANA@elfaro.cl"));
    }

    #[test]
    fn test_clear_restarts_ids() {
        let repo = MemoryArticleRepository::seeded().unwrap();
        repo.clear();
        assert_eq!(repo.count(), 0);
        let article = repo
            .create(NewArticle::new(
                "Titular nuevo",
                "Una bajada de prueba",
                &"Texto del cuerpo con suficiente largo. ".repeat(2),
            ))
            .unwrap();
        assert_eq!(article.id, 1);
    }
}
