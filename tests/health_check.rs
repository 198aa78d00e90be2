use std::net::TcpListener;
use std::sync::Arc;

use keygate::auth::TokenCodec;
use keygate::configuration::JwtSettings;
use keygate::startup::run;
use keygate::store::{MemoryStore, SessionStore, UserStore};

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = JwtSettings {
        access_secret: "health-check-access-secret".to_string(),
        refresh_secret: "health-check-refresh-secret".to_string(),
        algorithm: "HS256".to_string(),
        access_ttl_minutes: 30,
        refresh_ttl_minutes: 10080,
    };
    let codec = TokenCodec::from_settings(&settings).expect("Failed to build codec");

    let store = Arc::new(MemoryStore::new());
    let users: Arc<dyn UserStore> = store.clone();
    let sessions: Arc<dyn SessionStore> = store;

    let server = run(listener, codec, users, sessions).expect("Failed to create server");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn health_check_ignores_authorization_header() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .header("Authorization", "Bearer not-a-real-token")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}
