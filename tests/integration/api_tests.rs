//! API integration tests
//!
//! These run against a live server with a seeded webkeeper account:
//! `PHYLACTERY_TEST_USERNAME` / `PHYLACTERY_TEST_PASSWORD` (default "webkeeper").

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn credentials() -> (String, String) {
    let username = std::env::var("PHYLACTERY_TEST_USERNAME").unwrap_or_else(|_| "webkeeper".into());
    let password = std::env::var("PHYLACTERY_TEST_PASSWORD").unwrap_or_else(|_| "webkeeper".into());
    (username, password)
}

/// Helper to get a session token for the seeded account
async fn get_auth_token(client: &Client) -> String {
    let (username, password) = credentials();
    let response = client
        .post(format!("{}/account/login", BASE_URL))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let client = Client::new();
    let (username, password) = credentials();

    let response = client
        .post(format!("{}/account/login", BASE_URL))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["account"]["ranks"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/account/login", BASE_URL))
        .json(&json!({ "username": "webkeeper", "password": "wrong-password" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_signup_answer_does_not_leak_membership() {
    let client = Client::new();

    let response = client
        .post(format!("{}/account/signup", BASE_URL))
        .json(&json!({
            "email": "nobody-at-all@example.com",
            "username": "nobody",
            "password": "long enough password"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
#[ignore]
async fn test_member_list_requires_auth() {
    let client = Client::new();

    let response = client
        .get(format!("{}/members", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_member_search() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/members?name=a&page=1&per_page=5", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert_eq!(body["per_page"], 5);
}

#[tokio::test]
#[ignore]
async fn test_list_items_is_public() {
    let client = Client::new();

    let response = client
        .get(format!("{}/items?per_page=10", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(body["total"].is_number());
    if let Some(first) = body["items"].as_array().and_then(|items| items.first()) {
        assert!(first["availability"]["is_available"].is_boolean());
    }
}

#[tokio::test]
#[ignore]
async fn test_item_crud() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .post(format!("{}/items", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Integration Test Game",
            "item_type": "BG",
            "min_players": 2,
            "max_players": 4,
            "tags": ["Strategy"]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.expect("Failed to parse response");
    let id = created["id"].as_i64().expect("No item id");
    assert!(created["slug"].as_str().unwrap_or_default().starts_with("integration-test-game"));

    let computed: Vec<&str> = created["computed_tags"]
        .as_array()
        .expect("No computed tags")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert!(computed.contains(&"Board Game"));
    assert!(computed.contains(&"3 Players"));
    assert!(computed.contains(&"Strategy"));

    let response = client
        .delete(format!("{}/items/{}", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .get(format!("{}/items/{}", BASE_URL, id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_random_item() {
    let client = Client::new();

    let response = client
        .get(format!("{}/items/random?item_type=CG", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    // An empty pool is a 404, not an error
    assert!(response.status() == StatusCode::OK || response.status() == StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_external_form_validation() {
    let client = Client::new();

    let response = client
        .post(format!("{}/external-forms", BASE_URL))
        .json(&json!({
            "applicant_name": "",
            "event_details": "Games night",
            "contact_phone": "0400000000",
            "contact_email": "not-an-email",
            "requested_borrow_date": "2030-01-01",
            "item_ids": []
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse response");
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("contact_email"));
    assert!(message.contains("item_ids"));
}

#[tokio::test]
#[ignore]
async fn test_blog_list_is_public() {
    let client = Client::new();

    let response = client
        .get(format!("{}/blog", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["per_page"], 10);
}

#[tokio::test]
#[ignore]
async fn test_scheduled_post_hidden_from_public() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .post(format!("{}/blog", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Future AGM notice",
            "short_description": "Coming soon",
            "author": "Secretary",
            "publish_on": "2099-01-01T00:00:00Z",
            "body": "Details to follow."
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.expect("Failed to parse response");
    let id = created["post"]["id"].as_i64().expect("No post id");

    let public = client
        .get(format!("{}/blog/{}", BASE_URL, id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(public.status(), StatusCode::NOT_FOUND);

    let committee = client
        .get(format!("{}/blog/{}", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(committee.status().is_success());

    client
        .delete(format!("{}/blog/{}", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
}

#[tokio::test]
#[ignore]
async fn test_control_panel_operations() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/control-panel", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    let names: Vec<&str> = body
        .as_array()
        .expect("Expected a list")
        .iter()
        .filter_map(|op| op["name"].as_str())
        .collect();
    assert!(names.contains(&"committee_transfer"));
}

#[tokio::test]
#[ignore]
async fn test_committee_transfer_rejects_plain_ranks() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .post(format!("{}/control-panel/committee-transfer", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "positions": { "GATEKEEPER": 1 } }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_openapi_document() {
    let client = Client::new();

    let response = client
        .get("http://localhost:8080/api-docs/openapi.json")
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["paths"]["/reservations"].is_object());
}
