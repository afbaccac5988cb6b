//! Request handling logic for book records.
//!
//! Each operation maps store outcomes onto [`AppError`]s; no state is kept
//! between calls.

use std::sync::Arc;

use anyhow::anyhow;
use bookshelf_http::error::{AppError, AppResult};

use super::models::{Book, BookFields, BookPayload};
use super::store::{BookStore, StoreError};

pub const BOOK_NOT_FOUND: &str = "Book not found";
pub const ID_MISMATCH: &str = "ID mismatch";
pub const BOOK_DELETED: &str = "Book deleted successfully";
pub const VALIDATION_FAILED: &str = "Validation failed";

pub fn duplicate_isbn_message(isbn: &str) -> String {
    format!("Book with ISBN {isbn} already exists")
}

fn not_found() -> AppError {
    AppError::not_found(BOOK_NOT_FOUND)
}

fn duplicate_isbn(isbn: &str) -> AppError {
    AppError::bad_request(duplicate_isbn_message(isbn)).with_code("duplicate_isbn")
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConstraintViolation { isbn } => duplicate_isbn(&isbn),
            StoreError::NotFound { .. } => not_found(),
            e @ (StoreError::ConcurrentModification { .. } | StoreError::Database(_)) => {
                AppError::Internal(anyhow::Error::new(e))
            }
        }
    }
}

fn validate(payload: BookPayload) -> AppResult<BookFields> {
    payload.validate().map_err(|errors| {
        let details = errors
            .into_iter()
            .map(|e| serde_json::json!({ "field": e.field, "error": e.error }))
            .collect();
        AppError::validation(details, VALIDATION_FAILED)
    })
}

#[derive(Clone)]
pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<Book>> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<Book> {
        self.store.find_by_id(id).await?.ok_or_else(not_found)
    }

    /// Create a record after a duplicate-ISBN pre-check.
    ///
    /// The pre-check only produces the friendlier error early; a concurrent
    /// create can still win the race, in which case the store's unique index
    /// rejects this insert and the same error is returned.
    pub async fn create(&self, payload: BookPayload) -> AppResult<Book> {
        let fields = validate(payload)?;

        if self.store.exists_with_isbn(&fields.isbn).await? {
            return Err(duplicate_isbn(&fields.isbn));
        }

        match self.store.insert(fields).await {
            Ok(book) => {
                tracing::info!(id = book.id, isbn = %book.isbn, "book created");
                Ok(book)
            }
            Err(StoreError::ConstraintViolation { isbn }) => {
                tracing::warn!(isbn = %isbn, "ISBN claimed by a concurrent create");
                Err(duplicate_isbn(&isbn))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the mutable fields of record `id` with those in `payload`.
    ///
    /// A record deleted between the read and the write is reported as not
    /// found; any other conflict is returned as an internal error, never retried.
    pub async fn update(&self, id: i64, payload: BookPayload) -> AppResult<Book> {
        let body_id = payload.id;
        let fields = validate(payload)?;

        if body_id != Some(id) {
            return Err(AppError::bad_request(ID_MISMATCH).with_code("id_mismatch"));
        }

        let mut book = self.store.find_by_id(id).await?.ok_or_else(not_found)?;
        book.apply(fields);

        match self.store.update(&book).await {
            Ok(()) => {
                tracing::info!(id, "book updated");
                Ok(book)
            }
            Err(StoreError::ConcurrentModification { id }) => {
                match self.store.find_by_id(id).await? {
                    None => {
                        tracing::info!(id, "book deleted while being updated");
                        Err(not_found())
                    }
                    Some(_) => Err(AppError::Internal(
                        anyhow!(StoreError::ConcurrentModification { id })
                            .context("update conflicted with a concurrent write"),
                    )),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.store.delete(id).await?;
        tracing::info!(id, "book deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::store::StoreResult;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// In-memory store whose `update` result can be forced, to reproduce races.
    #[derive(Default)]
    struct ScriptedStore {
        books: Mutex<Vec<Book>>,
        exists_answer: Option<bool>,
        update_error: Mutex<Option<StoreError>>,
        delete_on_update: bool,
    }

    impl ScriptedStore {
        fn with_book(book: Book) -> Self {
            Self {
                books: Mutex::new(vec![book]),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BookStore for ScriptedStore {
        async fn list(&self) -> StoreResult<Vec<Book>> {
            Ok(self.books.lock().unwrap().clone())
        }

        async fn find_by_id(&self, id: i64) -> StoreResult<Option<Book>> {
            Ok(self.books.lock().unwrap().iter().find(|b| b.id == id).cloned())
        }

        async fn find_by_isbn(&self, isbn: &str) -> StoreResult<Option<Book>> {
            Ok(self
                .books
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.isbn == isbn)
                .cloned())
        }

        async fn exists_with_isbn(&self, isbn: &str) -> StoreResult<bool> {
            match self.exists_answer {
                Some(answer) => Ok(answer),
                None => Ok(self.find_by_isbn(isbn).await?.is_some()),
            }
        }

        async fn insert(&self, fields: BookFields) -> StoreResult<Book> {
            let mut books = self.books.lock().unwrap();
            if books.iter().any(|b| b.isbn == fields.isbn) {
                return Err(StoreError::ConstraintViolation { isbn: fields.isbn });
            }
            let book = Book::from_fields(books.len() as i64 + 1, fields);
            books.push(book.clone());
            Ok(book)
        }

        async fn update(&self, book: &Book) -> StoreResult<()> {
            if let Some(err) = self.update_error.lock().unwrap().take() {
                if self.delete_on_update {
                    self.books.lock().unwrap().retain(|b| b.id != book.id);
                }
                return Err(err);
            }
            let mut books = self.books.lock().unwrap();
            match books.iter_mut().find(|b| b.id == book.id) {
                Some(existing) => {
                    *existing = book.clone();
                    Ok(())
                }
                None => Err(StoreError::NotFound { id: book.id }),
            }
        }

        async fn delete(&self, id: i64) -> StoreResult<()> {
            let mut books = self.books.lock().unwrap();
            let before = books.len();
            books.retain(|b| b.id != id);
            if books.len() == before {
                return Err(StoreError::NotFound { id });
            }
            Ok(())
        }
    }

    fn payload(id: Option<i64>, isbn: &str) -> BookPayload {
        BookPayload {
            id,
            title: Some("Test Book".to_string()),
            author: Some("Test Author".to_string()),
            isbn: Some(isbn.to_string()),
            published_date: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0),
            pages: Some(100),
        }
    }

    fn stored(id: i64, isbn: &str) -> Book {
        Book::from_fields(id, payload(None, isbn).validate().unwrap())
    }

    fn service(store: ScriptedStore) -> BookService {
        BookService::new(Arc::new(store))
    }

    fn message_of(err: &AppError) -> &str {
        match err {
            AppError::NotFound { message, .. } | AppError::BadRequest { message, .. } => {
                message.as_str()
            }
            AppError::Validation { message, .. } => message.as_str(),
            AppError::Internal(_) => "internal",
        }
    }

    #[tokio::test]
    async fn create_rejects_known_isbn() {
        let svc = service(ScriptedStore::with_book(stored(1, "123")));

        let err = svc.create(payload(None, "123")).await.unwrap_err();
        assert_eq!(message_of(&err), "Book with ISBN 123 already exists");
    }

    #[tokio::test]
    async fn create_maps_late_constraint_violation_to_duplicate() {
        // The pre-check misses the competing insert, the store catches it.
        let store = ScriptedStore {
            exists_answer: Some(false),
            ..ScriptedStore::with_book(stored(1, "123"))
        };
        let svc = service(store);

        let err = svc.create(payload(None, "123")).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(message_of(&err), "Book with ISBN 123 already exists");
    }

    #[tokio::test]
    async fn create_validates_before_touching_store() {
        let svc = service(ScriptedStore::default());
        let mut bad = payload(None, "123");
        bad.pages = Some(0);

        let err = svc.create(bad).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_id_mismatch() {
        let svc = service(ScriptedStore::default());

        let err = svc.update(1, payload(Some(2), "123")).await.unwrap_err();
        assert_eq!(message_of(&err), ID_MISMATCH);

        let err = svc.update(1, payload(None, "123")).await.unwrap_err();
        assert_eq!(message_of(&err), ID_MISMATCH);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let svc = service(ScriptedStore::default());

        let err = svc.update(5, payload(Some(5), "123")).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_keeps_id_and_copies_fields() {
        let svc = service(ScriptedStore::with_book(stored(3, "123")));
        let mut changes = payload(Some(3), "456");
        changes.title = Some("Renamed".to_string());

        let book = svc.update(3, changes).await.unwrap();
        assert_eq!(book.id, 3);
        assert_eq!(book.title, "Renamed");
        assert_eq!(svc.get(3).await.unwrap().isbn, "456");
    }

    #[tokio::test]
    async fn update_conflict_with_deleted_record_is_not_found() {
        let store = ScriptedStore {
            update_error: Mutex::new(Some(StoreError::ConcurrentModification { id: 3 })),
            delete_on_update: true,
            ..ScriptedStore::with_book(stored(3, "123"))
        };
        let svc = service(store);

        let err = svc.update(3, payload(Some(3), "123")).await.unwrap_err();
        assert_eq!(message_of(&err), BOOK_NOT_FOUND);
    }

    #[tokio::test]
    async fn update_conflict_with_live_record_is_internal() {
        let store = ScriptedStore {
            update_error: Mutex::new(Some(StoreError::ConcurrentModification { id: 3 })),
            ..ScriptedStore::with_book(stored(3, "123"))
        };
        let svc = service(store);

        let err = svc.update(3, payload(Some(3), "123")).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(
            err.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let svc = service(ScriptedStore::with_book(stored(1, "123")));

        svc.delete(1).await.unwrap();
        let err = svc.get(1).await.unwrap_err();
        assert_eq!(message_of(&err), BOOK_NOT_FOUND);

        let err = svc.delete(1).await.unwrap_err();
        assert_eq!(message_of(&err), BOOK_NOT_FOUND);
    }
}
