mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{TestApp, ADMIN_KEY, FULL_KEY};
use docrest::database::FindOptions;
use docrest::dsl::{Resource, Settings, Verb};
use docrest::types::Document;
use docrest::validation::Validator;

fn payment(from: &str, amount: i64) -> Value {
    json!({"from": from, "amount": amount, "when": "2024-03-01 10:20:30"})
}

async fn create(app: &TestApp, body: Value) -> String {
    let (status, created) = app.post("/payments", body).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    created["id"].as_str().expect("hex id").to_string()
}

#[tokio::test]
async fn create_then_read() {
    let app = TestApp::new().await;
    let id = create(&app, payment("alice", 10)).await;
    assert_eq!(id.len(), 24);

    let (status, body) = app.get(&format!("/payments/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"_id": id, "from": "alice", "amount": 10, "when": "2024-03-01T10:20:30"})
    );
}

#[tokio::test]
async fn create_rejects_invalid_bodies() {
    let app = TestApp::new().await;

    let (status, body) = app.post("/payments", payment("alice", 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"code": "format:invalid", "errors": ["amount: gt"]}));

    let (status, body) = app.post("/payments", json!({"from": 5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"code": "format:unexpected"}));

    let (status, body) = app.send(Method::POST, "/payments", Some(FULL_KEY), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"code": "format:unexpected"}));
}

#[tokio::test]
async fn malformed_or_unknown_ids_are_not_found() {
    let app = TestApp::new().await;
    for uri in ["/payments/not-an-id", "/payments/65a1f0c2d3e4f5a6b7c8d9e0"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body, json!({"code": "not-found"}));
    }
    let (status, _) = app.patch("/payments/zzz", json!({"amount": 3})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("/payments/zzz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lists_page_by_index() {
    let app = TestApp::new().await;
    for amount in 1..=5 {
        create(&app, payment("alice", amount)).await;
    }

    let (status, body) = app.get("/payments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);

    let (_, body) = app.get("/payments?limit=2&skip=1").await;
    let amounts: Vec<i64> = body.as_array().unwrap().iter().map(|p| p["amount"].as_i64().unwrap()).collect();
    assert_eq!(amounts, vec![3, 4]);

    let (_, body) = app.get("/payments?limit=2&skip=9").await;
    assert_eq!(body, json!([]));

    let (status, body) = app.get("/payments?skip=first").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"code": "format:unexpected"}));
}

#[tokio::test]
async fn list_limit_is_capped() {
    let settings = Settings::new().resource("notes", Resource::list("db", "notes").list_max_results(3));
    let app = TestApp::with_settings(settings, Validator::default()).await;
    for n in 0..5 {
        let (status, _) = app.send(Method::POST, "/notes", Some(ADMIN_KEY), Some(json!({"n": n}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    for uri in ["/notes", "/notes?limit=100", "/notes?limit=0"] {
        let (_, body) = app.send(Method::GET, uri, Some(ADMIN_KEY), None).await;
        assert_eq!(body.as_array().unwrap().len(), 3, "{}", uri);
    }
}

#[tokio::test]
async fn patch_merges_validated_fields() {
    let app = TestApp::new().await;
    let id = create(&app, payment("alice", 10)).await;
    let uri = format!("/payments/{}", id);

    let (status, body) = app.patch(&uri, json!({"amount": 25, "_id": "65a1f0c2d3e4f5a6b7c8d9e0"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"_id": id, "from": "alice", "amount": 25, "when": "2024-03-01T10:20:30"})
    );

    let (_, body) = app.get(&uri).await;
    assert_eq!(body["amount"], json!(25));
    assert_eq!(body["from"], json!("alice"));
    assert_eq!(body["_id"], json!(id));
}

#[tokio::test]
async fn invalid_patch_leaves_document_untouched() {
    let app = TestApp::new().await;
    let id = create(&app, payment("alice", 10)).await;
    let uri = format!("/payments/{}", id);

    let (status, body) = app.patch(&uri, json!({"amount": -5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"code": "format:invalid", "errors": ["amount: gt"]}));

    let (_, body) = app.get(&uri).await;
    assert_eq!(body["amount"], json!(10));
}

#[tokio::test]
async fn malformed_patch_keys_are_bad_requests() {
    let app = TestApp::new().await;
    let id = create(&app, payment("alice", 10)).await;
    let uri = format!("/payments/{}", id);

    for patch in [
        json!({"$inc": 1}),
        json!({"": 1}),
        json!({"a..b": 1}),
        json!({"amount.x": 1}),
    ] {
        let (status, body) = app.patch(&uri, patch.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", patch);
        assert_eq!(body, json!({"code": "format:unexpected"}), "{}", patch);
    }

    let (_, body) = app.get(&uri).await;
    assert_eq!(body["amount"], json!(10));

    // the server keeps answering patches afterwards
    let (status, _) = app.patch(&uri, json!({"amount": 11})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn put_replaces_the_document() {
    let app = TestApp::new().await;
    let id = create(&app, payment("alice", 10)).await;
    let uri = format!("/payments/{}", id);

    let (status, _) = app.put(&uri, payment("bob", 7)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&uri).await;
    assert_eq!(body["from"], json!("bob"));
    assert_eq!(body["amount"], json!(7));

    let (status, body) = app.put(&uri, json!({"from": "bob", "amount": 7})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"code": "format:invalid", "errors": ["when: required"]}));

    let (status, _) = app.put("/payments/65a1f0c2d3e4f5a6b7c8d9e0", payment("bob", 7)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn soft_delete_hides_documents() {
    let app = TestApp::new().await;
    let id = create(&app, payment("alice", 10)).await;
    let uri = format!("/payments/{}", id);

    let (status, body) = app.delete(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"code": "ok"}));

    assert_eq!(app.get(&uri).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/payments").await.1, json!([]));
    assert_eq!(app.patch(&uri, json!({"amount": 3})).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.put(&uri, payment("bob", 7)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri).await.0, StatusCode::NOT_FOUND);

    let stored = app
        .collection("mydb", "payments")
        .find(&Document::new(), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["_deleted"], json!(true));
}

#[tokio::test]
async fn duplicate_unique_fields_conflict() {
    let settings = Settings::new().resource(
        "accounts",
        Resource::list("bank", "accounts").index("by-email", &["email"], true),
    );
    let app = TestApp::with_settings(settings, Validator::default()).await;

    let account = json!({"email": "a@example.com"});
    let (status, _) = app.send(Method::POST, "/accounts", Some(ADMIN_KEY), Some(account.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send(Method::POST, "/accounts", Some(ADMIN_KEY), Some(account)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"code": "duplicate-key"}));
}

#[tokio::test]
async fn undeclared_verbs_are_not_routed() {
    let settings = Settings::new().resource(
        "ledger",
        Resource::list("bank", "ledger").verbs(&[Verb::List, Verb::Create]),
    );
    let app = TestApp::with_settings(settings, Validator::default()).await;

    let (status, created) = app.send(Method::POST, "/ledger", Some(ADMIN_KEY), Some(json!({"n": 1}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/ledger/{}", created["id"].as_str().unwrap());

    let (status, _) = app.send(Method::DELETE, &uri, Some(ADMIN_KEY), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    // without Read an identity-shaped segment resolves no method
    let (status, _) = app.send(Method::GET, &uri, Some(ADMIN_KEY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
