use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use bookshelf_app::App;
use bookshelf_kernel::settings::Settings;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> (App, Router) {
    let mut settings = Settings::default();
    settings.database.path = ":memory:".to_string();

    let app = App::bootstrap(settings).await.unwrap();
    let router = app.router();
    (app, router)
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, headers, value)
}

fn new_book(isbn: &str) -> Value {
    json!({
        "title": "Test Book",
        "author": "Test Author",
        "isbn": isbn,
        "publishedDate": "2024-01-01T00:00:00",
        "pages": 100
    })
}

async fn create(router: &Router, isbn: &str) -> Value {
    let (status, _, body) = send(router, Method::POST, "/api/books", Some(new_book(isbn))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn list_is_empty_on_fresh_store() {
    let (_app, router) = test_app().await;

    let (status, _, body) = send(&router, Method::GET, "/api/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn create_returns_record_and_location() {
    let (_app, router) = test_app().await;

    let (status, headers, body) =
        send(&router, Method::POST, "/api/books", Some(new_book("1234567890"))).await;
    assert_eq!(status, StatusCode::CREATED);

    let id = body["id"].as_i64().unwrap();
    assert!(id > 0);
    assert_eq!(
        headers[header::LOCATION].to_str().unwrap(),
        format!("/api/books/{id}")
    );

    let mut expected = new_book("1234567890");
    expected["id"] = json!(id);
    assert_eq!(body, expected);
}

#[tokio::test]
async fn created_record_can_be_fetched() {
    let (_app, router) = test_app().await;
    let created = create(&router, "1234567890").await;

    let uri = format!("/api/books/{}", created["id"]);
    let (status, _, fetched) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (_, _, all) = send(&router, Method::GET, "/api/books", None).await;
    assert_eq!(all, json!([created]));
}

#[tokio::test]
async fn missing_record_is_not_found() {
    let (_app, router) = test_app().await;

    let (status, _, body) = send(&router, Method::GET, "/api/books/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Book not found" }));
}

#[tokio::test]
async fn non_integer_id_is_bad_request() {
    let (_app, router) = test_app().await;

    let (status, _, body) = send(&router, Method::GET, "/api/books/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn duplicate_isbn_is_rejected() {
    let (_app, router) = test_app().await;
    create(&router, "1234567890").await;

    let (status, _, body) =
        send(&router, Method::POST, "/api/books", Some(new_book("1234567890"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "Book with ISBN 1234567890 already exists" })
    );
}

#[tokio::test]
async fn concurrent_creates_with_same_isbn_admit_one() {
    let (_app, router) = test_app().await;

    let (first, second) = tokio::join!(
        send(&router, Method::POST, "/api/books", Some(new_book("555"))),
        send(&router, Method::POST, "/api/books", Some(new_book("555"))),
    );

    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    let rejected = if first.0 == StatusCode::BAD_REQUEST {
        first.2
    } else {
        second.2
    };
    assert_eq!(rejected["error"], "Book with ISBN 555 already exists");

    let (_, _, all) = send(&router, Method::GET, "/api/books", None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_body_reports_fields() {
    let (_app, router) = test_app().await;
    let mut book = new_book("1");
    book["title"] = json!("");
    book["pages"] = json!(0);

    let (status, _, body) = send(&router, Method::POST, "/api/books", Some(book)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    let fields: Vec<_> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["title", "pages"]);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (_app, router) = test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/books")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_replaces_fields_but_not_id() {
    let (_app, router) = test_app().await;
    let created = create(&router, "111").await;
    let id = created["id"].as_i64().unwrap();

    let mut changes = new_book("222");
    changes["id"] = json!(id);
    changes["title"] = json!("Second Edition");
    changes["pages"] = json!(250);

    let uri = format!("/api/books/{id}");
    let (status, _, body) = send(&router, Method::PUT, &uri, Some(changes.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, changes);

    let (_, _, fetched) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(fetched, changes);
}

#[tokio::test]
async fn update_with_mismatched_id_is_bad_request() {
    let (_app, router) = test_app().await;
    let created = create(&router, "111").await;
    let id = created["id"].as_i64().unwrap();

    // Neither, one, or both ids may exist: the answer is the same.
    for (path_id, body_id) in [(id, id + 1), (id + 1, id), (900, 901)] {
        let mut body = new_book("111");
        body["id"] = json!(body_id);
        let (status, _, response) = send(
            &router,
            Method::PUT,
            &format!("/api/books/{path_id}"),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({ "error": "ID mismatch" }));
    }
}

#[tokio::test]
async fn update_of_missing_record_is_not_found() {
    let (_app, router) = test_app().await;
    let mut body = new_book("111");
    body["id"] = json!(42);

    let (status, _, response) = send(&router, Method::PUT, "/api/books/42", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response, json!({ "error": "Book not found" }));
}

#[tokio::test]
async fn update_onto_taken_isbn_is_rejected() {
    let (_app, router) = test_app().await;
    create(&router, "111").await;
    let second = create(&router, "222").await;
    let id = second["id"].as_i64().unwrap();

    let mut body = new_book("111");
    body["id"] = json!(id);
    let (status, _, response) =
        send(&router, Method::PUT, &format!("/api/books/{id}"), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response,
        json!({ "error": "Book with ISBN 111 already exists" })
    );
}

#[tokio::test]
async fn delete_then_fetch_is_not_found() {
    let (_app, router) = test_app().await;
    let created = create(&router, "111").await;
    let uri = format!("/api/books/{}", created["id"]);

    let (status, _, body) = send(&router, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Book deleted successfully" }));

    let (status, _, _) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(&router, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Book not found" }));
}

#[tokio::test]
async fn deleted_isbn_can_be_reused() {
    let (_app, router) = test_app().await;
    let created = create(&router, "111").await;
    send(
        &router,
        Method::DELETE,
        &format!("/api/books/{}", created["id"]),
        None,
    )
    .await;

    let recreated = create(&router, "111").await;
    assert_ne!(recreated["id"], created["id"]);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let (_app, router) = test_app().await;

    let (status, headers, body) = send(&router, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn openapi_document_lists_book_routes() {
    let (_app, router) = test_app().await;

    let (status, _, spec) = send(&router, Method::GET, "/docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"]["/api/books"]["post"].is_object());
    assert!(spec["paths"]["/api/books/{id}"]["put"].is_object());
}

#[tokio::test]
async fn shutdown_closes_cleanly() {
    let (app, router) = test_app().await;
    create(&router, "111").await;
    drop(router);

    app.shutdown().await.unwrap();
}
