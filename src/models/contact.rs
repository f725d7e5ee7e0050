use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{days_between, timestamp};
use crate::error::ValidationErrors;
use crate::validation::{Rule, Validator};

/// A message left through the contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "fecha", with = "timestamp")]
    pub received_at: NaiveDateTime,
    #[serde(rename = "leido", default)]
    pub read: bool,
}

impl ContactMessage {
    #[must_use]
    pub fn age_days(&self, now: NaiveDateTime) -> i64 {
        days_between(self.received_at, now)
    }

    #[must_use]
    pub fn is_recent(&self, days: i64, now: NaiveDateTime) -> bool {
        self.age_days(now) <= days
    }

    #[must_use]
    pub fn matches_text(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.email.to_lowercase().contains(needle)
            || self.message.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContactMessage {
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "mensaje")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(
        rename = "fecha",
        with = "timestamp::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub received_at: Option<NaiveDateTime>,
    #[serde(rename = "leido", default)]
    pub read: bool,
}

impl NewContactMessage {
    #[must_use]
    pub fn new(name: &str, email: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
            ip: None,
            received_at: None,
            read: false,
        }
    }

    #[must_use]
    pub fn from_ip(mut self, ip: Option<String>) -> Self {
        self.ip = ip;
        self
    }

    #[must_use]
    pub fn normalized(mut self, now: NaiveDateTime) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        self.message = self.message.trim().to_string();
        self.ip = self.ip.filter(|ip| !ip.trim().is_empty());
        self.received_at = Some(self.received_at.unwrap_or(now));
        self
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check("nombre", &self.name, &[Rule::Required, Rule::Min(2), Rule::Max(100)])
            .check("email", &self.email, &[Rule::Required, Rule::Email])
            .check("mensaje", &self.message, &[Rule::Required, Rule::Min(10), Rule::Max(1000)]);
        v.finish()
    }

    #[must_use]
    pub fn into_message(self, id: i64, now: NaiveDateTime) -> ContactMessage {
        ContactMessage {
            id,
            name: self.name,
            email: self.email,
            message: self.message,
            ip: self.ip,
            received_at: self.received_at.unwrap_or(now),
            read: self.read,
        }
    }
}
