use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    Json,
};
use bookshelf_http::error::AppResult;
use serde_json::{json, Value};

use super::models::{Book, BookPayload};
use super::service::{BookService, BOOK_DELETED};
use super::MODULE_NAME;

type IdPath = Result<Path<i64>, PathRejection>;
type Payload = Result<Json<BookPayload>, JsonRejection>;

/// Path of a single record, used for the `Location` header on create.
pub fn book_location(id: i64) -> String {
    format!("/api/{MODULE_NAME}/{id}")
}

pub async fn list_books(State(service): State<BookService>) -> AppResult<Json<Vec<Book>>> {
    Ok(Json(service.list().await?))
}

pub async fn get_book(State(service): State<BookService>, id: IdPath) -> AppResult<Json<Book>> {
    let Path(id) = id?;
    Ok(Json(service.get(id).await?))
}

pub async fn create_book(
    State(service): State<BookService>,
    payload: Payload,
) -> AppResult<(StatusCode, [(header::HeaderName, String); 1], Json<Book>)> {
    let Json(payload) = payload?;
    let book = service.create(payload).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, book_location(book.id))],
        Json(book),
    ))
}

pub async fn update_book(
    State(service): State<BookService>,
    id: IdPath,
    payload: Payload,
) -> AppResult<Json<Book>> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    Ok(Json(service.update(id, payload).await?))
}

pub async fn delete_book(State(service): State<BookService>, id: IdPath) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    service.delete(id).await?;
    Ok(Json(json!({ "message": BOOK_DELETED })))
}
