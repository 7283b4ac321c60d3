mod common;

use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};

use common::{TestServer, FULL_KEY};

#[tokio::test]
async fn binary_serves_sample_resources() -> Result<()> {
    let server = TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(20)).await?;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/health", server.base_url)).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.json::<Value>().await?, json!({"code": "ok"}));

    let resp = client.get(format!("{}/payments", server.base_url)).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("{}/payments", server.base_url))
        .bearer_auth(FULL_KEY)
        .json(&json!({"from": "alice", "amount": 12, "when": "2024-03-01 10:20:30"}))
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let id = resp.json::<Value>().await?["id"].as_str().unwrap_or_default().to_string();

    let resp = client
        .get(format!("{}/payments/{}", server.base_url, id))
        .bearer_auth(FULL_KEY)
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.json::<Value>().await?["amount"], json!(12));
    Ok(())
}
