//! Purchase and rental records.
//!
//! Rows are append-only. A rent row is written as `active` and is never
//! rewritten when its end date passes; readers call [`derive_status`] to get
//! the state as of now. The stored value is still returned as-is for callers
//! that want it.

use crate::catalog::load_book;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{
    from_millis, to_millis, AdminRental, Rental, RentalKind, RentalPeriod, RentalStatus,
    UserRental,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Row};

/// Reminders fire this long before a rental ends.
pub const REMINDER_LEAD_DAYS: i64 = 3;

const RENTAL_COLUMNS: &str =
    "r.id, r.user_id, r.book_id, r.type, r.period, r.start_date, r.end_date, r.price, r.status";

pub fn derive_status(rental: &Rental, now: DateTime<Utc>) -> RentalStatus {
    match (rental.kind, rental.status, rental.end_date) {
        (RentalKind::Buy, _, _) => RentalStatus::Completed,
        (RentalKind::Rent, RentalStatus::Active, Some(end)) if now > end => RentalStatus::Expired,
        (_, stored, _) => stored,
    }
}

fn days_left(rental: &Rental, now: DateTime<Utc>) -> Option<i64> {
    let end = rental.end_date?;
    let remaining = (end - now).num_milliseconds();
    if remaining <= 0 {
        return Some(0);
    }
    let day = Duration::days(1).num_milliseconds();
    Some((remaining + day - 1) / day)
}

pub fn parse_period(raw: Option<&str>) -> AppResult<RentalPeriod> {
    raw.and_then(RentalPeriod::parse).ok_or(AppError::InvalidPeriod)
}

fn rental_from_row(row: &Row<'_>) -> rusqlite::Result<Rental> {
    let end_date: Option<i64> = row.get(6)?;
    Ok(Rental {
        id: row.get(0)?,
        user_id: row.get(1)?,
        book_id: row.get(2)?,
        kind: row.get(3)?,
        period: row.get(4)?,
        start_date: from_millis(5, row.get(5)?)?,
        end_date: end_date.map(|millis| from_millis(6, millis)).transpose()?,
        price: row.get(7)?,
        status: row.get(8)?,
    })
}

#[derive(Debug, Clone)]
pub struct Ledger {
    store: Store,
}

impl Ledger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Records a purchase at the book's current price. A missing book, a
    /// status other than available and a zero price all fail the same way.
    pub fn purchase(&self, user_id: i64, book_id: i64, now: DateTime<Utc>) -> AppResult<i64> {
        let mut conn = self.store.lock()?;
        let tx = conn.transaction()?;
        let price = load_book(&tx, book_id)?
            .and_then(|book| book.purchase_price())
            .ok_or(AppError::NotPurchasable)?;
        tx.execute(
            "INSERT INTO rentals (user_id, book_id, type, period, start_date, end_date, price, status)
             VALUES (?1, ?2, ?3, NULL, ?4, NULL, ?5, ?6)",
            params![
                user_id,
                book_id,
                RentalKind::Buy,
                to_millis(now),
                price,
                RentalStatus::Completed
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        log::info!("[ledger] user {} bought book {} for {}", user_id, book_id, price);
        Ok(id)
    }

    /// Records a rental and its reminder in one transaction.
    pub fn rent(
        &self,
        user_id: i64,
        book_id: i64,
        period: RentalPeriod,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        let end_date = period
            .end_date(now)
            .ok_or_else(|| AppError::Internal(format!("end date out of range for {now}")))?;
        let remind_date = end_date - Duration::days(REMINDER_LEAD_DAYS);

        let mut conn = self.store.lock()?;
        let tx = conn.transaction()?;
        let price = load_book(&tx, book_id)?
            .and_then(|book| book.rent_price(period))
            .ok_or(AppError::NotRentable)?;
        tx.execute(
            "INSERT INTO rentals (user_id, book_id, type, period, start_date, end_date, price, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                book_id,
                RentalKind::Rent,
                period,
                to_millis(now),
                to_millis(end_date),
                price,
                RentalStatus::Active
            ],
        )?;
        let rental_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO rent_reminders (rental_id, remind_date, sent) VALUES (?1, ?2, 0)",
            params![rental_id, to_millis(remind_date)],
        )?;
        tx.commit()?;
        log::info!(
            "[ledger] user {} rented book {} for {} until {}",
            user_id,
            book_id,
            period.as_str(),
            end_date.to_rfc3339()
        );
        Ok(rental_id)
    }

    /// Newest first. The whole history is returned on every call.
    pub fn list_for_user(&self, user_id: i64, now: DateTime<Utc>) -> AppResult<Vec<UserRental>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RENTAL_COLUMNS}, b.title, b.author, b.cover_url
             FROM rentals r
             JOIN books b ON r.book_id = b.id
             WHERE r.user_id = ?1
             ORDER BY r.start_date DESC, r.id DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], |row| {
            let rental = rental_from_row(row)?;
            Ok(UserRental {
                current_status: derive_status(&rental, now),
                days_left: days_left(&rental, now),
                title: row.get(9)?,
                author: row.get(10)?,
                cover_url: row.get(11)?,
                rental,
            })
        })?;
        let mut rentals = Vec::new();
        for row in rows {
            rentals.push(row?);
        }
        Ok(rentals)
    }

    pub fn list_all(&self, now: DateTime<Utc>) -> AppResult<Vec<AdminRental>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RENTAL_COLUMNS}, b.title, u.email
             FROM rentals r
             JOIN books b ON r.book_id = b.id
             JOIN users u ON r.user_id = u.id
             ORDER BY r.id"
        ))?;
        let rows = stmt.query_map([], |row| {
            let rental = rental_from_row(row)?;
            Ok(AdminRental {
                current_status: derive_status(&rental, now),
                title: row.get(9)?,
                email: row.get(10)?,
                rental,
            })
        })?;
        let mut rentals = Vec::new();
        for row in rows {
            rentals.push(row?);
        }
        Ok(rentals)
    }
}
