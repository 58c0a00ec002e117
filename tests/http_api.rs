use std::{net::SocketAddr, sync::Arc};

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tap_economy::{
    repositories::memory::MemoryStore,
    services::{self, http},
    settings::Settings,
};

const ADMIN: i64 = 900;

struct TestServer {
    addr: SocketAddr,
    client: Client,
}

impl TestServer {
    async fn start() -> Self {
        let mut settings = Settings::default();
        settings.identity.admins = vec![ADMIN];

        let store = Arc::new(MemoryStore::with_default_config());
        let state = services::start_services(store, &settings).await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, http::router(state)).await.unwrap();
        });

        TestServer {
            addr,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, user: i64, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .header("x-verified-user-id", user.to_string())
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, user: i64, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .header("x-verified-user-id", user.to_string())
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn register(&self, user: i64, referrer: Option<i64>) -> Value {
        let (status, body) = self
            .post(user, "/users/register", json!({ "referrer_id": referrer }))
            .await;
        assert!(status.is_success(), "register failed: {}", body);
        body
    }
}

#[tokio::test]
async fn test_health_and_identity() {
    let server = TestServer::start().await;

    let health = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "OK");

    let anonymous = server.client.get(server.url("/user")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = server.get(5, "/user").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_register_and_earn_with_referrer() {
    let server = TestServer::start().await;

    let referrer = server.register(1, None).await;
    assert_eq!(referrer["created"], true);
    assert_eq!(referrer["user"]["coin_balance"], 1000);

    let referred = server.register(2, Some(1)).await;
    assert_eq!(referred["join_bonus"], 2000);

    let again = server.register(2, Some(1)).await;
    assert_eq!(again["created"], false);

    let (status, tap) = server.post(2, "/tap", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tap["reward"], 10);
    assert_eq!(tap["coin_balance"], 1010);

    let (status, _) = server.post(2, "/tap", json!({})).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (_, profile) = server.get(1, "/user").await;
    assert_eq!(profile["coin_balance"], 3000);
    assert_eq!(profile["referrals"], 1);

    let (_, profile) = server.get(2, "/user").await;
    assert_eq!(profile["daily_tap_count"], 1);

    let (_, referrals) = server.get(1, "/referrals").await;
    assert_eq!(referrals.as_array().unwrap().len(), 1);

    let (_, ledger) = server.get(2, "/ledger").await;
    assert_eq!(ledger[0]["action"], "tap_reward");
}

#[tokio::test]
async fn test_spin_quota() {
    let server = TestServer::start().await;
    server.register(3, None).await;

    for _ in 0..3 {
        let (status, spin) = server.post(3, "/spin", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        let reward = spin["reward"].as_i64().unwrap();
        assert!((100..=1000).contains(&reward));
    }

    let (status, body) = server.post(3, "/spin", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Daily spin limit reached");
}

#[tokio::test]
async fn test_convert_withdraw_and_admin_decisions() {
    let server = TestServer::start().await;
    server.register(4, None).await;
    server.register(ADMIN, None).await;

    let (status, body) = server.post(4, "/convert", json!({ "amount": 100 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, conversion) = server.post(4, "/convert", json!({ "amount": 10 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversion["used_coin"], 1000);
    assert_eq!(conversion["cash_balance"], 10);

    let (status, _) = server
        .post(
            4,
            "/withdraw",
            json!({ "amount": 10, "method": "bkash", "account_number": "017" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post(ADMIN, "/admin/update-config", json!({ "key": "min_withdraw_cash", "value": 5 }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, filed) = server
        .post(
            4,
            "/withdraw",
            json!({ "amount": 10, "method": "bkash", "account_number": "017" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let request_id = filed["request"]["id"].as_str().unwrap().to_string();

    let (status, _) = server
        .post(4, "/admin/withdraw/reject", json!({ "request_id": request_id }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, pending) = server.get(ADMIN, "/admin/withdrawals?status=pending").await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, _) = server
        .post(ADMIN, "/admin/withdraw/reject", json!({ "request_id": request_id }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .post(ADMIN, "/admin/withdraw/approve", json!({ "request_id": request_id }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, profile) = server.get(4, "/user").await;
    assert_eq!(profile["cash_balance"], 10);

    let (status, report) = server.get(ADMIN, "/admin/reconcile/4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["balanced"], true);
}

#[tokio::test]
async fn test_update_config_rejects_unknown_key() {
    let server = TestServer::start().await;

    let (status, body) = server
        .post(ADMIN, "/admin/update-config", json!({ "key": "jackpot", "value": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid config key");

    let (status, _) = server
        .post(ADMIN, "/admin/update-config", json!({ "key": "tap_reward" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_input_is_a_json_bad_request() {
    let server = TestServer::start().await;
    server.register(6, None).await;

    let (status, body) = server.post(6, "/convert", json!({ "amount": 1.5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = server
        .post(
            6,
            "/withdraw",
            json!({ "amount": "10", "method": "bkash", "account_number": "017" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    let (status, body) = server.get(6, "/ledger?limit=many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = server.get(ADMIN, "/admin/reconcile/six").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, profile) = server.get(6, "/user").await;
    assert_eq!(profile["coin_balance"], 1000);
    assert_eq!(profile["cash_balance"], 0);
}
