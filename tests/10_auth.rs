mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{app, token, Client};

#[tokio::test]
async fn admin_routes_require_a_token() {
    let client = Client::new(app(), None);

    let (status, body) = client.get("/content-pages").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "unexpected body: {}", body);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn malformed_token_is_rejected() {
    let client = Client::new(app(), Some("not-a-jwt".to_string()));

    let (status, _) = client.get("/shift-categories?event_id=1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_privilege_is_forbidden() {
    let client = Client::new(app(), Some(token(&["shifts.manage"])));

    let (status, body) = client.get("/content-pages").await;
    assert_eq!(status, StatusCode::FORBIDDEN, "unexpected body: {}", body);
    assert_eq!(body["success"], false);

    let (status, body) = client.get("/shift-categories?event_id=1").await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn forbidden_create_does_not_write() {
    let app = app();
    let outsider = Client::new(app.clone(), Some(token(&["outbox.view"])));
    let admin = Client::new(app, Some(token(&["content.manage"])));

    let (status, _) = outsider
        .post("/content-pages", json!({ "slug": "faq", "title": "FAQ" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = admin.get("/content-pages").await;
    assert_eq!(body["rowCount"], 0);
}

#[tokio::test]
async fn public_routes_stay_open() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
