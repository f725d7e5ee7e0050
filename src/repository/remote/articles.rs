use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use super::client::PostgrestClient;
use super::query::Query;
use super::{degrade, write_error};
use crate::models::{self, timestamp, Article, NewArticle};
use crate::repository::{search_needle, ArticleRepository, Page, RepoResult, SortOrder};

const SEARCH_COLUMNS: [&str; 3] = ["titulo", "contenido", "bajada"];

pub struct RemoteArticleRepository {
    client: Arc<PostgrestClient>,
    table: String,
    recent_days: i64,
}

impl RemoteArticleRepository {
    pub(super) fn new(client: Arc<PostgrestClient>, table: String, recent_days: i64) -> Self {
        Self {
            client,
            table,
            recent_days,
        }
    }

    fn fetch(&self, operation: &'static str, query: Query) -> Vec<Article> {
        degrade(
            &self.table,
            operation,
            self.client.select(&self.table, &query),
            Vec::new(),
        )
    }

    fn in_insertion_order(query: Query) -> Query {
        query.order("id", SortOrder::Asc)
    }
}

impl ArticleRepository for RemoteArticleRepository {
    fn create(&self, article: NewArticle) -> RepoResult<Article> {
        let article = article.normalized(models::now());
        article.validate()?;
        let stored: Article = self
            .client
            .insert(&self.table, &article)
            .map_err(|e| write_error(&self.table, "insert", None, e))?;
        debug!(table = %self.table, id = stored.id, "Created article");
        Ok(stored)
    }

    fn find_by_id(&self, id: i64) -> Option<Article> {
        self.fetch("find_by_id", Query::default().eq("id", id).limit(1))
            .into_iter()
            .next()
    }

    fn list_all(&self) -> Vec<Article> {
        self.fetch("list_all", Self::in_insertion_order(Query::default()))
    }

    fn list_by_category(&self, category: &str) -> Vec<Article> {
        let query = Self::in_insertion_order(Query::default().eq("categoria", category));
        self.fetch("list_by_category", query)
    }

    fn list_by_author(&self, author: &str) -> Vec<Article> {
        let query = Self::in_insertion_order(Query::default().eq("autor", author));
        self.fetch("list_by_author", query)
    }

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<Article> {
        self.fetch(
            "list_ordered_by_date",
            Query::default().order("fecha", order),
        )
    }

    fn recent_window(&self) -> i64 {
        self.recent_days
    }

    fn search(&self, text: &str) -> Vec<Article> {
        let Some(needle) = search_needle(text) else {
            return Vec::new();
        };
        let query = Self::in_insertion_order(Query::default().search(&SEARCH_COLUMNS, &needle));
        self.fetch("search", query)
    }

    fn list_recent(&self, days: i64) -> Vec<Article> {
        let since = models::now() - Duration::days(days);
        let query = Query::default()
            .gte("fecha", since.format(timestamp::FORMAT))
            .order("fecha", SortOrder::Desc);
        self.fetch("list_recent", query)
    }

    fn paginate(&self, page: usize, page_size: usize) -> Page<Article> {
        let window = Page::<Article>::empty(page, page_size, 0);
        let query = Query::default().order("fecha", SortOrder::Desc);
        let fetched = self
            .client
            .select_range(&self.table, &query, window.offset(), window.page_size);
        let (items, total) = degrade(&self.table, "paginate", fetched, (Vec::new(), 0));
        let mut result = Page::empty(window.page, window.page_size, total);
        result.items = items;
        result
    }

    fn count(&self) -> usize {
        degrade(
            &self.table,
            "count",
            self.client.count(&self.table, &Query::default()),
            0,
        )
    }
}
