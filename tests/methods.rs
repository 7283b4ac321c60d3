mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{TestApp, ADMIN_KEY};
use docrest::dsl::{MethodContext, Resource, ResourceMethod, Settings};
use docrest::middleware::{ApiResponse, ApiResult};
use docrest::validation::Validator;

fn payment(from: &str, amount: i64) -> Value {
    json!({"from": from, "amount": amount, "when": "2024-03-01T10:20:30"})
}

async fn seed(app: &TestApp) -> Vec<String> {
    let mut ids = Vec::new();
    for (from, amount) in [("alice", 10), ("bob", 20), ("alice", 30)] {
        let (status, body) = app.post("/payments", payment(from, amount)).await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(body["id"].as_str().unwrap().to_string());
    }
    ids
}

#[tokio::test]
async fn get_from_lists_matching_payments() {
    let app = TestApp::new().await;
    seed(&app).await;

    let (status, body) = app.get("/payments/~get-from?from=alice").await;
    assert_eq!(status, StatusCode::OK);
    let amounts: Vec<i64> = body.as_array().unwrap().iter().map(|p| p["amount"].as_i64().unwrap()).collect();
    assert_eq!(amounts, vec![10, 30]);

    let (_, body) = app.get("/payments/~get-from").await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn clear_from_removes_matching_payments() {
    let app = TestApp::new().await;
    seed(&app).await;

    let (status, body) = app.send(Method::POST, "/payments/~clear-from?from=alice", Some(common::FULL_KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"code": "ok"}));

    let (_, body) = app.get("/payments").await;
    let remaining: Vec<&str> = body.as_array().unwrap().iter().map(|p| p["from"].as_str().unwrap()).collect();
    assert_eq!(remaining, vec!["bob"]);
}

#[tokio::test]
async fn item_methods_act_on_one_payment() {
    let app = TestApp::new().await;
    let ids = seed(&app).await;

    let (status, body) = app.get(&format!("/payments/{}/~get-amount", ids[1])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(20));

    let (status, body) = app.post(&format!("/payments/{}/~put-now", ids[0]), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], json!(ids[0]));
    assert_ne!(body["when"], json!("2024-03-01T10:20:30"));

    let (_, stored) = app.get(&format!("/payments/{}", ids[0])).await;
    assert_eq!(stored["when"], body["when"]);
}

#[tokio::test]
async fn item_methods_need_a_visible_document() {
    let app = TestApp::new().await;
    let ids = seed(&app).await;

    let missing = "65a1f0c2d3e4f5a6b7c8d9e0";
    let (status, _) = app.get(&format!("/payments/{}/~get-amount", missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.delete(&format!("/payments/{}", ids[2])).await;
    let (status, _) = app.get(&format!("/payments/{}/~get-amount", ids[2])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/payments/not-an-id/~get-amount").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unresolvable_methods_are_not_found() {
    let app = TestApp::new().await;
    let ids = seed(&app).await;

    for uri in [
        "/payments/get-from".to_string(),
        "/payments/~missing".to_string(),
        format!("/payments/{}/get-amount", ids[0]),
        format!("/payments/{}/~get-from", ids[0]),
    ] {
        let (status, body) = app.get(&uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body, json!({"code": "not-found"}));
    }

    // views are not operations
    let (status, _) = app.post("/payments/~get-from", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.post(&format!("/payments/{}/~get-amount", ids[0]), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn explode(_ctx: MethodContext) -> ApiResult {
    panic!("reactor breach")
}

async fn echo(ctx: MethodContext) -> ApiResult {
    ApiResponse::success(json!({"resource": ctx.resource, "method": ctx.method, "q": ctx.query("q")}))
}

#[tokio::test]
async fn panicking_methods_answer_internal_error() {
    let settings = Settings::new().resource(
        "reactor",
        Resource::list("plant", "reactor")
            .method("explode", ResourceMethod::operation(explode))
            .method("echo", ResourceMethod::view(echo)),
    );
    let app = TestApp::with_settings(settings, Validator::default()).await;

    let (status, body) = app.send(Method::POST, "/reactor/~explode", Some(ADMIN_KEY), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"code": "internal-error"}));

    // the server keeps serving afterwards
    let (status, body) = app.send(Method::GET, "/reactor/~echo?q=still-up", Some(ADMIN_KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"resource": "reactor", "method": "echo", "q": "still-up"}));
}
