//! Data-table endpoints against a live Postgres. Skipped unless
//! `DATABASE_URL` points at a database the tests may write to.

mod common;

use std::sync::atomic::{AtomicI64, Ordering};

use axum::http::StatusCode;
use serde_json::json;
use sqlx::{Executor, PgPool};
use tokio::sync::OnceCell;

use common::{ids, root_token, Client};
use volunteer_admin_api::database::row::{DUPLICATE_ROW, NOT_FOUND};
use volunteer_admin_api::database::{AuditLog, PgTables};

static SCHEMA: OnceCell<()> = OnceCell::const_new();
static SEQUENCE: AtomicI64 = AtomicI64::new(0);

async fn client() -> Option<Client> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres test");
        return None;
    };
    let pool = PgPool::connect(&url).await.expect("connect");
    SCHEMA
        .get_or_init(|| async {
            pool.execute(include_str!("../sql/admin_schema.sql")).await.expect("schema");
        })
        .await;

    let app = volunteer_admin_api::app(&PgTables::new(pool), &AuditLog::Disabled, None);
    Some(Client::new(app, Some(root_token())))
}

/// Distinct per call so runs never see each other's rows.
fn unique() -> i64 {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    (nanos % 1_000_000_000_000) * 100 + SEQUENCE.fetch_add(1, Ordering::SeqCst) % 100
}

async fn shift_categories(client: &Client, event: i64, names: &[&str]) -> Vec<i64> {
    let mut created = vec![];
    for name in names {
        let (status, body) = client
            .post(&format!("/shift-categories?event_id={}", event), json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
        created.push(body["row"]["id"].as_i64().unwrap());
    }
    created
}

#[tokio::test]
async fn reorder_round_trip() {
    let Some(client) = client().await else { return };
    let event = unique();
    let created = shift_categories(&client, event, &["Bar", "Stage", "First aid"]).await;

    let (_, listed) = client.get(&format!("/shift-categories?event_id={}", event)).await;
    assert_eq!(ids(&listed), created);
    assert_eq!(listed["rows"][2]["position"], 2);

    let order = vec![created[2], created[0], created[1]];
    let (status, body) = client
        .put(&format!("/shift-categories?event_id={}", event), json!({ "order": order }))
        .await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(body, json!({ "success": true, "order": order }));

    let (_, listed) = client.get(&format!("/shift-categories?event_id={}", event)).await;
    assert_eq!(ids(&listed), order);
    for (index, row) in listed["rows"].as_array().unwrap().iter().enumerate() {
        assert_eq!(row["position"], index);
    }
}

#[tokio::test]
async fn foreign_id_in_order_rolls_back() {
    let Some(client) = client().await else { return };
    let event = unique();
    let other = unique();
    let created = shift_categories(&client, event, &["A", "B"]).await;
    let foreign = shift_categories(&client, other, &["C"]).await;

    // Count matches the scope but only one id belongs to it
    let (status, body) = client
        .put(
            &format!("/shift-categories?event_id={}", event),
            json!({ "order": [created[1], foreign[0]] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (_, listed) = client.get(&format!("/shift-categories?event_id={}", event)).await;
    assert_eq!(ids(&listed), created);
    assert_eq!(listed["rows"][0]["position"], 0);
    assert_eq!(listed["rows"][1]["position"], 1);
}

#[tokio::test]
async fn partial_order_is_rejected() {
    let Some(client) = client().await else { return };
    let event = unique();
    let created = shift_categories(&client, event, &["A", "B"]).await;

    let (_, body) = client
        .put(&format!("/shift-categories?event_id={}", event), json!({ "order": [created[0]] }))
        .await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains('2'), "unexpected body: {}", body);
}

#[tokio::test]
async fn second_delete_reports_not_found() {
    let Some(client) = client().await else { return };
    let (_, created) = client
        .post("/content-pages", json!({ "slug": format!("faq-{}", unique()), "title": "FAQ" }))
        .await;
    let path = format!("/content-pages/{}", created["row"]["id"]);

    let (_, first) = client.delete(&path).await;
    assert_eq!(first, json!({ "success": true }));

    let (status, second) = client.delete(&path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, json!({ "success": false, "error": NOT_FOUND }));
}

#[tokio::test]
async fn duplicate_slug_maps_to_failure() {
    let Some(client) = client().await else { return };
    let slug = format!("about-{}", unique());
    let (status, _) = client.post("/content-pages", json!({ "slug": slug, "title": "About" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = client.post("/content-pages", json!({ "slug": slug, "title": "Other" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": false, "error": DUPLICATE_ROW }));
}

#[tokio::test]
async fn soft_delete_returns_timestamp() {
    let Some(client) = client().await else { return };
    let event = unique();
    let (_, created) = client
        .post(&format!("/program-locations?event_id={}", event), json!({ "name": "Main stage" }))
        .await;
    let path = format!("/program-locations/{}?event_id={}", created["row"]["id"], event);

    let (_, deleted) = client.delete(&path).await;
    assert_eq!(deleted["success"], true);
    assert!(deleted["replacement"]["deleted_at"].is_string(), "unexpected body: {}", deleted);

    let (_, listed) = client.get(&format!("/program-locations?event_id={}", event)).await;
    assert_eq!(listed["rowCount"], 0);

    let (_, again) = client.delete(&path).await;
    assert_eq!(again["success"], false);
}
