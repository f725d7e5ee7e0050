//! Domain records stored by the repositories.
//!
//! Field names on the wire (JSON view-models and remote tables) keep the Spanish column
//! names of the published schema (`titulo`, `bajada`, `fecha`, ...); the Rust fields are
//! English.

pub mod article;
pub mod contact;
pub mod user;

pub use article::{Article, ArticleSummary, NewArticle};
pub use contact::{ContactMessage, NewContactMessage};
pub use user::{NewUser, Plan, PublicUser, User};

use chrono::{Local, NaiveDateTime, Timelike};

/// Current local wall-clock time, truncated to whole seconds.
#[must_use]
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Whole days between `then` and `now`, never negative.
#[must_use]
pub fn days_between(then: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - then).num_days().abs()
}

/// `Hoy`, `Ayer`, `Hace 3 días`, `Hace 2 semanas`, ...
#[must_use]
pub fn age_label(days: i64) -> String {
    match days {
        0 => "Hoy".to_string(),
        1 => "Ayer".to_string(),
        2..=6 => format!("Hace {days} días"),
        7..=29 => plural(days / 7, "semana", "semanas"),
        30..=364 => plural(days / 30, "mes", "meses"),
        _ => plural(days / 365, "año", "años"),
    }
}

fn plural(n: i64, one: &str, many: &str) -> String {
    if n == 1 {
        format!("Hace 1 {one}")
    } else {
        format!("Hace {n} {many}")
    }
}

/// Accept either a JSON string or a JSON integer as an identifier.
///
/// Remote tables may use `uuid` or `bigserial` primary keys.
pub(crate) fn string_id<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    use serde::Deserialize;
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id {other}"))),
    }
}

/// Serde adapter for `YYYY-MM-DD HH:MM:SS` timestamps.
///
/// Deserialization also accepts the ISO-8601 forms returned by PostgREST
/// (`2024-01-15T10:30:00`, fractional seconds, or an RFC 3339 offset, which is
/// converted to UTC).
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        [FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }

    /// `Option<NaiveDateTime>` variant, absent when null or missing.
    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            let raw: Option<String> = Option::deserialize(d)?;
            match raw {
                None => Ok(None),
                Some(s) => super::parse(&s).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp {s:?}"))
                }),
            }
        }
    }
}
