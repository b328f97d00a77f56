#![allow(dead_code)]

use garner::backend::SessionCookies;
use garner::config::Config;
use garner::types::{Session, User};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER_ID: &str = "user-1";
pub const ACCESS_TOKEN: &str = "access-token";

pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

pub fn test_config(server: &MockServer) -> Config {
    let mut cfg = Config::new(Url::parse(&server.uri()).expect("mock uri"), "anon-key");
    cfg.insecure_cookie = true;
    cfg
}

pub fn user() -> User {
    User {
        id: USER_ID.to_string(),
        email: Some("reader@example.com".to_string()),
        extra: HashMap::new(),
    }
}

pub fn session() -> Session {
    Session {
        access_token: ACCESS_TOKEN.to_string(),
        refresh_token: "refresh-token".to_string(),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at: Some(4_000_000_000),
        user: user(),
    }
}

pub fn session_json() -> Value {
    serde_json::to_value(session()).expect("session json")
}

/// `Cookie` request header carrying `session` the way the server writes it.
pub fn session_cookie_header(cfg: &Config, session: &Session) -> String {
    let codec = SessionCookies::new(cfg.storage_key(), false);
    codec
        .encode(session, &[])
        .expect("encode session")
        .into_iter()
        .map(|w| format!("{}={}", w.name, w.value))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn bookmark_json(id: &str, title: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "url": format!("https://example.com/{id}"),
        "created_at": created_at,
        "user_id": USER_ID,
    })
}

pub async fn mount_user(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": USER_ID,
            "email": "reader@example.com",
            "aud": "authenticated",
        })))
        .mount(server)
        .await;
}

/// Wait until the mock server has seen `count` requests to `method path`.
pub async fn wait_for_requests(server: &MockServer, verb: &str, route: &str, count: usize) -> usize {
    let mut seen = 0;
    for _ in 0..100 {
        seen = count_requests(server, verb, route).await;
        if seen >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    seen
}

pub async fn count_requests(server: &MockServer, verb: &str, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == route)
        .count()
}
