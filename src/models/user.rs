use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{days_between, string_id, timestamp};
use crate::error::ValidationErrors;
use crate::validation::{Rule, Validator};

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Premium,
    Vip,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Basic, Plan::Premium, Plan::Vip];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Premium => "premium",
            Plan::Vip => "vip",
        }
    }

    /// Display name with the monthly price.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Plan::Free => "Gratuito",
            Plan::Basic => "Básico ($5.000)",
            Plan::Premium => "Premium ($10.000)",
            Plan::Vip => "VIP ($15.000)",
        }
    }

    #[must_use]
    pub fn is_premium(self) -> bool {
        matches!(self, Plan::Premium | Plan::Vip)
    }

    /// Map the price selected on the registration form to a tier.
    #[must_use]
    pub fn from_price(price: &str) -> Plan {
        match price.trim() {
            "5000" => Plan::Basic,
            "10000" => Plan::Premium,
            "15000" => Plan::Vip,
            _ => Plan::Free,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plan::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown plan {s:?}"))
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "string_id")]
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(rename = "suscrito")]
    pub subscribed: bool,
    pub plan: Plan,
    #[serde(rename = "fecha_registro", alias = "fechaRegistro", with = "timestamp")]
    pub registered_at: NaiveDateTime,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("subscribed", &self.subscribed)
            .field("plan", &self.plan)
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

impl User {
    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.plan.is_premium()
    }

    #[must_use]
    pub fn days_registered(&self, now: NaiveDateTime) -> i64 {
        days_between(self.registered_at, now)
    }

    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            plan: self.plan,
            plan_label: self.plan.label(),
            subscribed: self.subscribed,
            registered_at: self.registered_at,
        }
    }

    /// Profile fields a visitor may edit, checked with the same rules as registration.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_identity(&self.name, &self.email)
    }
}

fn validate_identity(name: &str, email: &str) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    v.check("nombre", name, &[Rule::Required, Rule::Min(2), Rule::Max(100)])
        .check_labeled("email", "correo electrónico", email, &[Rule::Required, Rule::Email]);
    v.finish()
}

/// What a view or the session may see of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    pub plan: Plan,
    #[serde(rename = "planNombre")]
    pub plan_label: &'static str,
    #[serde(rename = "suscrito")]
    pub subscribed: bool,
    #[serde(rename = "fechaRegistro", with = "timestamp")]
    pub registered_at: NaiveDateTime,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(rename = "suscrito")]
    pub subscribed: bool,
    pub plan: Plan,
    #[serde(
        rename = "fecha_registro",
        with = "timestamp::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub registered_at: Option<NaiveDateTime>,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("subscribed", &self.subscribed)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl NewUser {
    #[must_use]
    pub fn new(name: &str, email: &str, password_hash: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            subscribed: false,
            plan: Plan::Free,
            registered_at: None,
        }
    }

    #[must_use]
    pub fn with_plan(mut self, plan: Plan, subscribed: bool) -> Self {
        self.plan = plan;
        self.subscribed = subscribed;
        self
    }

    /// Trim the name and lowercase the email so uniqueness is case-insensitive.
    #[must_use]
    pub fn normalized(mut self, now: NaiveDateTime) -> Self {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.registered_at = Some(self.registered_at.unwrap_or(now));
        self
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        validate_identity(&self.name, &self.email)
    }

    #[must_use]
    pub fn into_user(self, id: String, now: NaiveDateTime) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            subscribed: self.subscribed,
            plan: self.plan,
            registered_at: self.registered_at.unwrap_or(now),
        }
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
