use chrono::{DateTime, Duration, Months, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Implements text round-tripping through SQLite for the closed enums below.
macro_rules! sql_text_enum {
    ($ty:ty, $kind:literal) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::parse(raw).ok_or_else(|| {
                    FromSqlError::Other(Box::new(UnknownVariant {
                        kind: $kind,
                        value: raw.to_string(),
                    }))
                })
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

sql_text_enum!(Role, "role");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Available,
    OutOfStock,
    Unavailable,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::OutOfStock => "out_of_stock",
            Self::Unavailable => "unavailable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(Self::Available),
            "out_of_stock" => Some(Self::OutOfStock),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

sql_text_enum!(BookStatus, "book status");

/// A rental tier. Months are added with chrono's calendar arithmetic, which
/// clamps to the last day of the target month (Jan 31 + 1m = Feb 28/29).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalPeriod {
    #[serde(rename = "2w")]
    TwoWeeks,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
}

impl RentalPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoWeeks => "2w",
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "2w" => Some(Self::TwoWeeks),
            "1m" => Some(Self::OneMonth),
            "3m" => Some(Self::ThreeMonths),
            _ => None,
        }
    }

    /// End of a rental of this length starting at `start`. `None` only when
    /// the result falls outside chrono's representable range.
    pub fn end_date(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::TwoWeeks => start.checked_add_signed(Duration::days(14)),
            Self::OneMonth => start.checked_add_months(Months::new(1)),
            Self::ThreeMonths => start.checked_add_months(Months::new(3)),
        }
    }
}

sql_text_enum!(RentalPeriod, "rental period");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalKind {
    Buy,
    Rent,
}

impl RentalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Rent => "rent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "buy" => Some(Self::Buy),
            "rent" => Some(Self::Rent),
            _ => None,
        }
    }
}

sql_text_enum!(RentalKind, "rental type");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Active,
    Completed,
    Expired,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

sql_text_enum!(RentalStatus, "rental status");

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub category: String,
    pub year: Option<i32>,
    pub description: String,
    pub cover_url: String,
    pub price_buy: f64,
    pub price_rent_2w: Option<f64>,
    pub price_rent_1m: Option<f64>,
    pub price_rent_3m: Option<f64>,
    pub status: BookStatus,
}

impl Book {
    pub fn tier_price(&self, period: RentalPeriod) -> Option<f64> {
        match period {
            RentalPeriod::TwoWeeks => self.price_rent_2w,
            RentalPeriod::OneMonth => self.price_rent_1m,
            RentalPeriod::ThreeMonths => self.price_rent_3m,
        }
    }

    /// Price to charge for a purchase, if the book can be bought right now.
    pub fn purchase_price(&self) -> Option<f64> {
        if self.status != BookStatus::Available || self.price_buy <= 0.0 {
            return None;
        }
        Some(self.price_buy)
    }

    /// Price to charge for renting over `period`, if that tier is offered.
    pub fn rent_price(&self, period: RentalPeriod) -> Option<f64> {
        if self.status != BookStatus::Available {
            return None;
        }
        self.tier_price(period).filter(|price| *price > 0.0)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Rental {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    #[serde(rename = "type")]
    pub kind: RentalKind,
    pub period: Option<RentalPeriod>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub price: f64,
    pub status: RentalStatus,
}

#[derive(Debug, Serialize, Clone)]
pub struct UserRental {
    #[serde(flatten)]
    pub rental: Rental,
    pub current_status: RentalStatus,
    /// Whole days until `end_date`, rounded up; 0 once the rental has ended.
    pub days_left: Option<i64>,
    pub title: String,
    pub author: String,
    pub cover_url: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct AdminRental {
    #[serde(flatten)]
    pub rental: Rental,
    pub current_status: RentalStatus,
    pub title: String,
    pub email: String,
}

#[cfg(test)]
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Reminder {
    pub id: i64,
    pub rental_id: i64,
    pub remind_date: DateTime<Utc>,
    pub sent: bool,
}

pub(crate) fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// Reads a millisecond timestamp column back into an instant.
pub(crate) fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}
