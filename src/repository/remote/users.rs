use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::client::PostgrestClient;
use super::query::Query;
use super::{degrade, write_error};
use crate::error::RepositoryError;
use crate::models::user::normalize_email;
use crate::models::{self, NewUser, Plan, User};
use crate::repository::{search_needle, RepoResult, SortOrder, UserRepository};

const SEARCH_COLUMNS: [&str; 2] = ["nombre", "email"];

/// Columns a profile edit may change.
#[derive(Serialize)]
struct UserPatch<'a> {
    nombre: &'a str,
    email: &'a str,
    suscrito: bool,
    plan: Plan,
}

pub struct RemoteUserRepository {
    client: Arc<PostgrestClient>,
    table: String,
    recent_days: i64,
}

impl RemoteUserRepository {
    pub(super) fn new(client: Arc<PostgrestClient>, table: String, recent_days: i64) -> Self {
        Self {
            client,
            table,
            recent_days,
        }
    }

    fn fetch(&self, operation: &'static str, query: Query) -> Vec<User> {
        degrade(
            &self.table,
            operation,
            self.client.select(&self.table, &query),
            Vec::new(),
        )
    }
}

impl UserRepository for RemoteUserRepository {
    fn create(&self, user: NewUser) -> RepoResult<User> {
        let user = user.normalized(models::now());
        user.validate()?;
        if self.find_by_email(&user.email).is_some() {
            return Err(RepositoryError::DuplicateKey {
                field: "email",
                value: user.email,
            });
        }
        let stored: User = self
            .client
            .insert(&self.table, &user)
            .map_err(|e| write_error(&self.table, "insert", Some(("email", &user.email)), e))?;
        debug!(table = %self.table, id = %stored.id, "Created user");
        Ok(stored)
    }

    fn find_by_id(&self, id: &str) -> Option<User> {
        self.fetch("find_by_id", Query::default().eq("id", id).limit(1))
            .into_iter()
            .next()
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        let query = Query::default().eq("email", normalize_email(email)).limit(1);
        self.fetch("find_by_email", query).into_iter().next()
    }

    fn list_all(&self) -> Vec<User> {
        self.fetch("list_all", Query::default().order("id", SortOrder::Asc))
    }

    fn list_by_plan(&self, plan: Plan) -> Vec<User> {
        let query = Query::default()
            .eq("plan", plan)
            .order("id", SortOrder::Asc);
        self.fetch("list_by_plan", query)
    }

    fn list_subscribed(&self) -> Vec<User> {
        let query = Query::default()
            .eq("suscrito", true)
            .order("id", SortOrder::Asc);
        self.fetch("list_subscribed", query)
    }

    fn list_ordered_by_date(&self, order: SortOrder) -> Vec<User> {
        self.fetch(
            "list_ordered_by_date",
            Query::default().order("fecha_registro", order),
        )
    }

    fn update(&self, user: &User) -> RepoResult<User> {
        let name = user.name.trim();
        let email = normalize_email(&user.email);
        let mut candidate = user.clone();
        candidate.name = name.to_string();
        candidate.email.clone_from(&email);
        candidate.validate()?;

        if let Some(existing) = self.find_by_email(&email) {
            if existing.id != user.id {
                return Err(RepositoryError::DuplicateKey {
                    field: "email",
                    value: email,
                });
            }
        }
        let patch = UserPatch {
            nombre: name,
            email: &email,
            suscrito: user.subscribed,
            plan: user.plan,
        };
        let rows: Vec<User> = self
            .client
            .update(&self.table, &Query::filter().eq("id", &user.id), &patch)
            .map_err(|e| write_error(&self.table, "update", Some(("email", &email)), e))?;
        let updated = rows.into_iter().next().ok_or_else(|| RepositoryError::NotFound {
            entity: "user",
            id: user.id.clone(),
        })?;
        debug!(table = %self.table, id = %updated.id, "Updated user");
        Ok(updated)
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        let removed = self
            .client
            .delete(&self.table, &Query::filter().eq("id", id))
            .map_err(|e| write_error(&self.table, "delete", None, e))?;
        Ok(removed > 0)
    }

    fn clear(&self) -> RepoResult<()> {
        self.client
            .delete(&self.table, &Query::filter().not_null("id"))
            .map_err(|e| write_error(&self.table, "clear", None, e))?;
        Ok(())
    }

    fn recent_window(&self) -> i64 {
        self.recent_days
    }

    fn search(&self, text: &str) -> Vec<User> {
        let Some(needle) = search_needle(text) else {
            return Vec::new();
        };
        let query = Query::default()
            .search(&SEARCH_COLUMNS, &needle)
            .order("id", SortOrder::Asc);
        self.fetch("search", query)
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
