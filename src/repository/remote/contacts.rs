use std::sync::Arc;
use tracing::debug;

use super::client::PostgrestClient;
use super::query::Query;
use super::{degrade, write_error};
use crate::error::RepositoryError;
use crate::models::{self, ContactMessage, NewContactMessage};
use crate::repository::{search_needle, ContactRepository, RepoResult, SortOrder};

const SEARCH_COLUMNS: [&str; 3] = ["nombre", "email", "mensaje"];

pub struct RemoteContactRepository {
    client: Arc<PostgrestClient>,
    table: String,
    recent_days: i64,
}

impl RemoteContactRepository {
    pub(super) fn new(client: Arc<PostgrestClient>, table: String, recent_days: i64) -> Self {
        Self {
            client,
            table,
            recent_days,
        }
    }

    fn fetch(&self, operation: &'static str, query: Query) -> Vec<ContactMessage> {
        degrade(
            &self.table,
            operation,
            self.client.select(&self.table, &query),
            Vec::new(),
        )
    }

    fn count_where(&self, operation: &'static str, query: Query) -> usize {
        degrade(
            &self.table,
            operation,
            self.client.count(&self.table, &query),
            0,
        )
    }
}

impl ContactRepository for RemoteContactRepository {
    fn create(&self, message: NewContactMessage) -> RepoResult<ContactMessage> {
        let message = message.normalized(models::now());
        message.validate()?;
        let stored: ContactMessage = self
            .client
            .insert(&self.table, &message)
            .map_err(|e| write_error(&self.table, "insert", None, e))?;
        debug!(table = %self.table, id = stored.id, "Stored contact message");
        Ok(stored)
    }

    fn find_by_id(&self, id: i64) -> Option<ContactMessage> {
        self.fetch("find_by_id", Query::default().eq("id", id).limit(1))
            .into_iter()
            .next()
    }

    fn list_by_email(&self, email: &str) -> Vec<ContactMessage> {
        let query = Query::default()
            .ilike("email", email.trim())
            .order("id", SortOrder::Asc);
        self.fetch("list_by_email", query)
    }

    fn list_all(&self) -> Vec<ContactMessage> {
        self.fetch("list_all", Query::default().order("id", SortOrder::Asc))
    }

    fn list_read(&self) -> Vec<ContactMessage> {
        let query = Query::default().eq("leido", true).order("id", SortOrder::Asc);
        self.fetch("list_read", query)
    }

    fn list_unread(&self) -> Vec<ContactMessage> {
        let query = Query::default().eq("leido", false).order("id", SortOrder::Asc);
        self.fetch("list_unread", query)
    }

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<ContactMessage> {
        self.fetch(
            "list_ordered_by_date",
            Query::default().order("fecha", order),
        )
    }

    fn mark_as_read(&self, id: i64) -> RepoResult<()> {
        let rows: Vec<ContactMessage> = self
            .client
            .update(
                &self.table,
                &Query::filter().eq("id", id),
                &serde_json::json!({ "leido": true }),
            )
            .map_err(|e| write_error(&self.table, "mark_as_read", None, e))?;
        if rows.is_empty() {
            return Err(RepositoryError::NotFound {
                entity: "contact message",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn delete(&self, id: i64) -> RepoResult<bool> {
        let removed = self
            .client
            .delete(&self.table, &Query::filter().eq("id", id))
            .map_err(|e| write_error(&self.table, "delete", None, e))?;
        Ok(removed > 0)
    }

    fn recent_window(&self) -> i64 {
        self.recent_days
    }

    fn search(&self, text: &str) -> Vec<ContactMessage> {
        let Some(needle) = search_needle(text) else {
            return Vec::new();
        };
        let query = Query::default()
            .search(&SEARCH_COLUMNS, &needle)
            .order("id", SortOrder::Asc);
        self.fetch("search", query)
    }

    fn count(&self) -> usize {
        self.count_where("count", Query::default())
    }

    fn count_unread(&self) -> usize {
        self.count_where("count_unread", Query::default().eq("leido", false))
    }
}
