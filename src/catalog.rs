use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{Book, BookStatus};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;

const BOOK_COLUMNS: &str = "id, title, author, category, year, description, cover_url, \
     price_buy, price_rent_2w, price_rent_1m, price_rent_3m, status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Category,
    Author,
    Year,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "category" => Some(Self::Category),
            "author" => Some(Self::Author),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    fn order_clause(&self) -> &'static str {
        match self {
            Self::Category => " ORDER BY category, title",
            Self::Author => " ORDER BY author, title",
            Self::Year => " ORDER BY year DESC, title",
        }
    }
}

/// Storefront query. Filters are exact matches; empty values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    pub category: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

/// Admin payload for create and full update. Absent optional fields fall back
/// to the catalog defaults rather than failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookInput {
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub price_buy: Option<f64>,
    pub price_rent_2w: Option<f64>,
    pub price_rent_1m: Option<f64>,
    pub price_rent_3m: Option<f64>,
    pub status: Option<String>,
}

/// A validated `BookInput` with defaults applied.
#[derive(Debug, Clone, PartialEq)]
struct BookRecord {
    title: String,
    author: String,
    category: String,
    year: Option<i32>,
    description: String,
    cover_url: String,
    price_buy: f64,
    price_rent_2w: Option<f64>,
    price_rent_1m: Option<f64>,
    price_rent_3m: Option<f64>,
    status: BookStatus,
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Rejected(format!("{field} is required"))),
    }
}

fn price(value: Option<f64>, field: &str) -> AppResult<Option<f64>> {
    match value {
        Some(value) if !value.is_finite() || value < 0.0 => {
            Err(AppError::Rejected(format!("{field} must be a non-negative number")))
        }
        // an unset or zero tier means the period is not offered
        Some(value) if value == 0.0 => Ok(None),
        other => Ok(other),
    }
}

pub fn parse_status(value: &str) -> AppResult<BookStatus> {
    BookStatus::parse(value).ok_or_else(|| AppError::Rejected(format!("invalid status: {value}")))
}

impl BookInput {
    fn into_record(self) -> AppResult<BookRecord> {
        Ok(BookRecord {
            title: required(self.title, "title")?,
            author: required(self.author, "author")?,
            category: required(self.category, "category")?,
            year: self.year.filter(|year| *year != 0),
            description: self.description.unwrap_or_default(),
            cover_url: self.cover_url.unwrap_or_default(),
            price_buy: price(self.price_buy, "price_buy")?.unwrap_or(0.0),
            price_rent_2w: price(self.price_rent_2w, "price_rent_2w")?,
            price_rent_1m: price(self.price_rent_1m, "price_rent_1m")?,
            price_rent_3m: price(self.price_rent_3m, "price_rent_3m")?,
            status: match self.status.as_deref() {
                None | Some("") => BookStatus::Available,
                Some(value) => parse_status(value)?,
            },
        })
    }
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        category: row.get(3)?,
        year: row.get(4)?,
        description: row.get(5)?,
        cover_url: row.get(6)?,
        price_buy: row.get(7)?,
        price_rent_2w: row.get(8)?,
        price_rent_1m: row.get(9)?,
        price_rent_3m: row.get(10)?,
        status: row.get(11)?,
    })
}

pub(crate) fn load_book(conn: &Connection, id: i64) -> rusqlite::Result<Option<Book>> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
        params![id],
        book_from_row,
    )
    .optional()
}

#[derive(Debug, Clone)]
pub struct CatalogStore {
    store: Store,
}

impl CatalogStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn search(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(category) = filter.category.as_deref().filter(|value| !value.is_empty()) {
            conditions.push("category = ?");
            values.push(Value::Text(category.to_string()));
        }
        if let Some(author) = filter.author.as_deref().filter(|value| !value.is_empty()) {
            conditions.push("author = ?");
            values.push(Value::Text(author.to_string()));
        }
        if let Some(year) = filter.year.as_deref().filter(|value| !value.is_empty()) {
            match year.trim().parse::<i64>() {
                Ok(year) => {
                    conditions.push("year = ?");
                    values.push(Value::Integer(year));
                }
                // no stored year can equal a non-number
                Err(_) => return Ok(Vec::new()),
            }
        }

        let mut query = format!("SELECT {BOOK_COLUMNS} FROM books");
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        match filter.sort_by.as_deref().and_then(SortKey::parse) {
            Some(key) => query.push_str(key.order_clause()),
            None => query.push_str(" ORDER BY id"),
        }

        let conn = self.store.lock()?;
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(values), book_from_row)?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    pub fn get(&self, id: i64) -> AppResult<Book> {
        let conn = self.store.lock()?;
        load_book(&conn, id)?.ok_or(AppError::BookNotFound)
    }

    pub fn list_all(&self) -> AppResult<Vec<Book>> {
        self.search(&BookFilter::default())
    }

    pub fn create(&self, input: BookInput) -> AppResult<i64> {
        let record = input.into_record()?;
        let conn = self.store.lock()?;
        conn.execute(
            "INSERT INTO books
             (title, author, category, year, description, cover_url,
              price_buy, price_rent_2w, price_rent_1m, price_rent_3m, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.title,
                record.author,
                record.category,
                record.year,
                record.description,
                record.cover_url,
                record.price_buy,
                record.price_rent_2w,
                record.price_rent_1m,
                record.price_rent_3m,
                record.status
            ],
        )
        .map_err(|err| AppError::from(err).into_rejection())?;
        let id = conn.last_insert_rowid();
        log::info!("[catalog] created book {} \"{}\"", id, record.title);
        Ok(id)
    }

    /// Replaces every mutable field. Returns the number of rows changed, 0
    /// when no book has this id.
    pub fn update(&self, id: i64, input: BookInput) -> AppResult<usize> {
        let record = input.into_record()?;
        let conn = self.store.lock()?;
        let updated = conn
            .execute(
                "UPDATE books SET
                 title = ?1, author = ?2, category = ?3, year = ?4, description = ?5,
                 cover_url = ?6, price_buy = ?7, price_rent_2w = ?8, price_rent_1m = ?9,
                 price_rent_3m = ?10, status = ?11
                 WHERE id = ?12",
                params![
                    record.title,
                    record.author,
                    record.category,
                    record.year,
                    record.description,
                    record.cover_url,
                    record.price_buy,
                    record.price_rent_2w,
                    record.price_rent_1m,
                    record.price_rent_3m,
                    record.status,
                    id
                ],
            )
            .map_err(|err| AppError::from(err).into_rejection())?;
        log::info!("[catalog] updated book {} ({} row)", id, updated);
        Ok(updated)
    }

    pub fn set_status(&self, id: i64, status: BookStatus) -> AppResult<usize> {
        let conn = self.store.lock()?;
        let updated = conn
            .execute(
                "UPDATE books SET status = ?1 WHERE id = ?2",
                params![status, id],
            )
            .map_err(|err| AppError::from(err).into_rejection())?;
        log::info!("[catalog] book {} status -> {}", id, status.as_str());
        Ok(updated)
    }
}
