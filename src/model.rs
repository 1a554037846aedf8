use std::fmt;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDateTime,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Habit {
    pub id: i64,
    pub name: String,
    pub frequency: Frequency,
    pub last_logged: NaiveDateTime,
}

/// How often a habit is meant to be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Frequency> {
        match s {
            "Daily" => Some(Frequency::Daily),
            "Weekly" => Some(Frequency::Weekly),
            "Monthly" => Some(Frequency::Monthly),
            _ => None,
        }
    }

    /// Next value in display order, wrapping around. Used by the habit form
    /// to cycle through the choices.
    pub fn next(&self) -> Frequency {
        match self {
            Frequency::Daily => Frequency::Weekly,
            Frequency::Weekly => Frequency::Monthly,
            Frequency::Monthly => Frequency::Daily,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| Frequency::parse(s).ok_or(FromSqlError::InvalidType))
    }
}
