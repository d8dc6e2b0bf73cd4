mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn encrypt_returns_sealed_secret() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/vault/encrypt"))
        .json(&json!({ "plaintext": "s3cret" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    let iv = body["data"]["iv"].as_str().unwrap_or_default();
    assert_eq!(iv.len(), 24, "iv should be 12 hex-encoded bytes: {}", body);
    assert!(body["data"]["content"].as_str().is_some_and(|c| !c.is_empty()));

    Ok(())
}

#[tokio::test]
async fn encrypt_rejects_bad_input() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/vault/encrypt"))
        .json(&json!({ "plaintext": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let res = client
        .post(server.url("/vault/encrypt"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "INVALID_JSON");

    Ok(())
}

#[tokio::test]
async fn password_is_generated_and_sealed() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.post(server.url("/vault/password")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    let password = body["data"]["password"].as_str().unwrap_or_default();
    assert_eq!(password.len(), 20);
    assert!(body["data"]["secret"]["iv"].is_string());

    Ok(())
}
