mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn catalog_is_public() {
    let app = TestApp::new().await;
    app.seed_book("b1", "Dune", dec!(150)).await;
    app.seed_book("b2", "Emma", dec!(99.5)).await;

    let (status, books) = app.call(Method::GET, "/api/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books.as_array().map(Vec::len), Some(2));

    let (status, book) = app.call(Method::GET, "/api/books/b2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Emma");
    assert_eq!(book["newPrice"].as_f64(), Some(99.5));
}

#[tokio::test]
async fn unknown_book_is_404() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/api/books/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book not found: nope");
}

#[tokio::test]
async fn only_admins_add_books() {
    let app = TestApp::new().await;
    let customer = app.customer_token().await;
    let admin = app.admin_token().await;
    let book = json!({
        "_id": "b9",
        "title": "Middlemarch",
        "category": "classics",
        "trending": true,
        "newPrice": 210.0,
        "oldPrice": 250.0
    });

    let (status, _) = app
        .call(Method::POST, "/api/books", Some(book.clone()), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(Method::POST, "/api/books", Some(book.clone()), Some(&customer))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access Denied. Admins only");

    let (status, body) = app
        .call(Method::POST, "/api/books", Some(book.clone()), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["id"], "b9");
    assert_eq!(body["trending"], true);

    let (status, _) = app
        .call(Method::POST, "/api/books", Some(book), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, fetched) = app.call(Method::GET, "/api/books/b9", None, None).await;
    assert_eq!(fetched["newPrice"].as_f64(), Some(210.0));
}

#[tokio::test]
async fn admin_edits_a_book() {
    let app = TestApp::new().await;
    app.seed_book("b1", "Dune", dec!(150)).await;
    let customer = app.customer_token().await;
    let admin = app.admin_token().await;
    let edit = json!({ "newPrice": 120.5, "trending": true });

    let (status, _) = app
        .call(Method::PUT, "/api/books/b1", Some(edit.clone()), Some(&customer))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::PUT, "/api/books/b1", Some(edit.clone()), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["title"], "Dune");
    assert_eq!(body["trending"], true);
    assert_eq!(body["newPrice"].as_f64(), Some(120.5));

    let (status, _) = app
        .call(Method::PUT, "/api/books/b1", Some(json!({ "newPrice": -1.0 })), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(Method::PUT, "/api/books/nope", Some(edit), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book not found: nope");
}

#[tokio::test]
async fn deleted_book_leaves_past_orders_intact() {
    let app = TestApp::new().await;
    app.seed_book("b1", "Dune", dec!(150)).await;
    let customer = app.customer_token().await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/orders",
            Some(common::order_data("reader@books.io", json!([{ "bookId": "b1" }]))),
            Some(&customer),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::DELETE, "/api/books/b1", None, Some(&customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, deleted) = app.call(Method::DELETE, "/api/books/b1", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK, "{deleted}");
    assert_eq!(deleted["id"], "b1");

    let (status, _) = app.call(Method::GET, "/api/books/b1", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::DELETE, "/api/books/b1", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, orders) = app.call(Method::GET, "/api/orders", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let line = &orders[0]["products"][0];
    assert_eq!(line["title"], "Dune");
    assert_eq!(line["price"].as_f64(), Some(150.0));
    assert!(line["book"].is_null());
}
