//! Persistence for book records.
//!
//! [`SqliteBookStore`] keeps books in the `books` table. The unique index on
//! `isbn` is the authoritative uniqueness guard: any check made before an
//! insert can race with another writer, the index cannot.

use std::sync::Arc;

use async_trait::async_trait;
use bookshelf_db::{call_error, Database, DbError};
use bookshelf_kernel::Migration;
use rusqlite::{params, OptionalExtension, Row};
use thiserror::Error;
use tokio_rusqlite::Connection;

use super::models::{Book, BookFields};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a book with ISBN {isbn} already exists")]
    ConstraintViolation { isbn: String },

    #[error("book {id} does not exist")]
    NotFound { id: i64 },

    #[error("book {id} was deleted after it was read")]
    ConcurrentModification { id: i64 },

    #[error(transparent)]
    Database(#[from] DbError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage contract for book records.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// All records; callers must not rely on the order.
    async fn list(&self) -> StoreResult<Vec<Book>>;

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Book>>;

    async fn find_by_isbn(&self, isbn: &str) -> StoreResult<Option<Book>>;

    async fn exists_with_isbn(&self, isbn: &str) -> StoreResult<bool>;

    /// Insert a record and return it with its assigned id.
    ///
    /// Fails with [`StoreError::ConstraintViolation`] when the ISBN is taken,
    /// even if an earlier `exists_with_isbn` said otherwise.
    async fn insert(&self, book: BookFields) -> StoreResult<Book>;

    /// Overwrite the mutable fields of a previously read record.
    ///
    /// Fails with [`StoreError::NotFound`] for an id that was never assigned,
    /// with [`StoreError::ConcurrentModification`] when the record existed but
    /// is gone now, and with [`StoreError::ConstraintViolation`] when the new
    /// ISBN belongs to another record.
    async fn update(&self, book: &Book) -> StoreResult<()>;

    async fn delete(&self, id: i64) -> StoreResult<()>;
}

pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "V1__create_books",
        up: r#"
            CREATE TABLE books (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                title          TEXT    NOT NULL CHECK (length(title) BETWEEN 1 AND 200),
                author         TEXT    NOT NULL CHECK (length(author) BETWEEN 1 AND 100),
                isbn           TEXT    NOT NULL CHECK (length(isbn) BETWEEN 1 AND 13),
                published_date TEXT    NOT NULL,
                pages          INTEGER NOT NULL CHECK (pages >= 1)
            );
            CREATE UNIQUE INDEX books_isbn_unique ON books (isbn);
            "#,
    }]
}

const SELECT_COLUMNS: &str = "SELECT id, title, author, isbn, published_date, pages FROM books";

/// Result of an UPDATE, resolved inside the connection thread.
enum UpdateOutcome {
    Updated,
    DuplicateIsbn,
    NeverAssigned,
    Vanished,
}

/// SQLite-backed [`BookStore`].
pub struct SqliteBookStore {
    conn: Arc<Connection>,
}

impl SqliteBookStore {
    pub fn new(db: &Database) -> Self {
        Self {
            conn: db.connection(),
        }
    }
}

fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        isbn: row.get(3)?,
        published_date: row.get(4)?,
        pages: row.get(5)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn storage_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> StoreError {
    StoreError::Database(call_error(e))
}

#[async_trait]
impl BookStore for SqliteBookStore {
    async fn list(&self) -> StoreResult<Vec<Book>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
                let books = stmt
                    .query_map([], row_to_book)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(books)
            })
            .await
            .map_err(storage_err)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Book>> {
        self.conn
            .call(move |conn| {
                conn.query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id],
                    row_to_book,
                )
                .optional()
            })
            .await
            .map_err(storage_err)
    }

    async fn find_by_isbn(&self, isbn: &str) -> StoreResult<Option<Book>> {
        let isbn = isbn.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    &format!("{SELECT_COLUMNS} WHERE isbn = ?1"),
                    params![isbn],
                    row_to_book,
                )
                .optional()
            })
            .await
            .map_err(storage_err)
    }

    async fn exists_with_isbn(&self, isbn: &str) -> StoreResult<bool> {
        let isbn = isbn.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = ?1)",
                    params![isbn],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(storage_err)
    }

    async fn insert(&self, book: BookFields) -> StoreResult<Book> {
        let fields = book.clone();
        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO books (title, author, isbn, published_date, pages)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        fields.title,
                        fields.author,
                        fields.isbn,
                        fields.published_date,
                        fields.pages,
                    ],
                );
                match inserted {
                    Ok(_) => Ok(Some(conn.last_insert_rowid())),
                    Err(e) if is_unique_violation(&e) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(storage_err)?;

        match id {
            Some(id) => {
                tracing::debug!(id, isbn = %book.isbn, "book inserted");
                Ok(Book::from_fields(id, book))
            }
            None => Err(StoreError::ConstraintViolation { isbn: book.isbn }),
        }
    }

    async fn update(&self, book: &Book) -> StoreResult<()> {
        let row = book.clone();
        let outcome = self
            .conn
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE books
                     SET title = ?1, author = ?2, isbn = ?3, published_date = ?4, pages = ?5
                     WHERE id = ?6",
                    params![
                        row.title,
                        row.author,
                        row.isbn,
                        row.published_date,
                        row.pages,
                        row.id,
                    ],
                );
                let changed = match updated {
                    Ok(changed) => changed,
                    Err(e) if is_unique_violation(&e) => return Ok(UpdateOutcome::DuplicateIsbn),
                    Err(e) => return Err(e),
                };
                if changed > 0 {
                    return Ok(UpdateOutcome::Updated);
                }

                // AUTOINCREMENT never reuses ids, so an id at or below the
                // high-water mark belonged to a row that has since been deleted.
                let issued: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_sequence WHERE name = 'books' AND seq >= ?1)",
                    params![row.id],
                    |r| r.get(0),
                )?;
                Ok(if issued && row.id > 0 {
                    UpdateOutcome::Vanished
                } else {
                    UpdateOutcome::NeverAssigned
                })
            })
            .await
            .map_err(storage_err)?;

        match outcome {
            UpdateOutcome::Updated => Ok(()),
            UpdateOutcome::DuplicateIsbn => Err(StoreError::ConstraintViolation {
                isbn: book.isbn.clone(),
            }),
            UpdateOutcome::NeverAssigned => Err(StoreError::NotFound { id: book.id }),
            UpdateOutcome::Vanished => Err(StoreError::ConcurrentModification { id: book.id }),
        }
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let deleted = self
            .conn
            .call(move |conn| conn.execute("DELETE FROM books WHERE id = ?1", params![id]))
            .await
            .map_err(storage_err)?;

        if deleted == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }
}
