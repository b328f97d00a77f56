mod common;

use axum::{
    body::{Body, BodyDataStream, to_bytes},
    http::{Request, StatusCode, header},
};
use common::*;
use eventsource_stream::{Event, EventStream, Eventsource};
use futures::{Stream, StreamExt};
use garner::router::{GarnerState, garner_router};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn next_event<S, E>(events: &mut S) -> Event
where
    S: Stream<Item = Result<Event, E>> + Unpin,
    E: std::fmt::Debug,
{
    tokio::time::timeout(Duration::from_secs(3), events.next())
        .await
        .expect("timed out waiting for an event")
        .expect("stream ended")
        .expect("malformed event")
}

async fn post_json(app: &axum::Router, uri: &str, cookie: &str, form: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn live_view_streams_state_and_accepts_actions() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start().await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookmarks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            bookmark_json("b2", "Second", "2026-03-02T10:00:00Z"),
            bookmark_json("b1", "First", "2026-03-01T10:00:00Z"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/bookmarks"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = test_config(&server);
    let state = GarnerState::new(&cfg).unwrap();
    let app = garner_router(state.clone());
    let cookie = session_cookie_header(&cfg, &session());

    let req = Request::builder()
        .uri("/dashboard/live")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"))
    );

    let mut events = resp.into_body().into_data_stream().eventsource();
    let announced = next_event(&mut events).await;
    assert_eq!(announced.event, "view");
    let view_id = announced.data;
    assert_eq!(state.views.len(), 1);

    let loaded = loop {
        let ev = next_event(&mut events).await;
        assert_eq!(ev.event, "state");
        let snap: Value = serde_json::from_str(&ev.data).unwrap();
        if snap["loading"] == json!(false) && snap["refreshing"] == json!(false) {
            break snap;
        }
    };
    assert_eq!(loaded["bookmarks"][0]["id"], "b2");
    assert_eq!(loaded["bookmarks"][1]["id"], "b1");

    let (status, body) = post_json(
        &app,
        &format!("/dashboard/live/{view_id}/bookmarks"),
        &cookie,
        "title=Example&url=https%3A%2F%2Fexample.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "outcome": "completed" }));

    let (status, body) = post_json(
        &app,
        &format!("/dashboard/live/{view_id}/sign-out"),
        &cookie,
        "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "navigate": "/" }));

    let navigated = loop {
        let ev = next_event(&mut events).await;
        if ev.event == "navigate" {
            break ev;
        }
    };
    assert_eq!(navigated.data, "/");

    drop(events);
    assert!(state.views.is_empty());
    server.verify().await;
}

#[tokio::test]
async fn actions_on_another_users_view_are_not_found() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start().await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookmarks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/bookmarks"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let cfg = test_config(&server);
    let state = GarnerState::new(&cfg).unwrap();
    let app = garner_router(state.clone());

    let req = Request::builder()
        .uri("/dashboard/live")
        .header(header::COOKIE, session_cookie_header(&cfg, &session()))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let mut events = resp.into_body().into_data_stream().eventsource();
    let view_id = next_event(&mut events).await.data;

    let mut intruder = session();
    intruder.user.id = "user-2".to_string();
    let (status, _) = post_json(
        &app,
        &format!("/dashboard/live/{view_id}/bookmarks/b1/delete"),
        &session_cookie_header(&cfg, &intruder),
        "",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    drop(events);
    server.verify().await;
}

#[tokio::test]
async fn live_view_without_session_navigates_home() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start().await;
    let cfg = test_config(&server);
    let state = GarnerState::new(&cfg).unwrap();
    let app = garner_router(state.clone());

    let req = Request::builder()
        .uri("/dashboard/live")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mut events = resp.into_body().into_data_stream().eventsource();
    let ev = next_event(&mut events).await;
    assert_eq!(ev.event, "navigate");
    assert_eq!(ev.data, "/");
    assert!(
        tokio::time::timeout(Duration::from_secs(1), events.next())
            .await
            .unwrap()
            .is_none()
    );
    assert!(state.views.is_empty());
}

/// Open a live view and wait for its first settled state.
async fn open_live(app: &axum::Router, cookie: &str) -> (String, EventStream<BodyDataStream>) {
    let req = Request::builder()
        .uri("/dashboard/live")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let mut events = resp.into_body().into_data_stream().eventsource();
    let view_id = next_event(&mut events).await.data;
    loop {
        let ev = next_event(&mut events).await;
        let snap: Value = serde_json::from_str(&ev.data).unwrap();
        if snap["loading"] == json!(false) && snap["refreshing"] == json!(false) {
            break;
        }
    }
    (view_id, events)
}

#[tokio::test]
async fn actions_use_the_refreshed_session() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start().await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookmarks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut fresh = session();
    fresh.access_token = "fresh-token".to_string();
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&fresh))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/bookmarks"))
        .and(wiremock::matchers::header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = test_config(&server);
    let state = GarnerState::new(&cfg).unwrap();
    let app = garner_router(state.clone());
    let (view_id, events) = open_live(&app, &session_cookie_header(&cfg, &session())).await;

    let mut expired = session();
    expired.expires_at = Some(1);
    let (status, body) = post_json(
        &app,
        &format!("/dashboard/live/{view_id}/bookmarks"),
        &session_cookie_header(&cfg, &expired),
        "title=Example&url=https%3A%2F%2Fexample.com",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "outcome": "completed" }));

    drop(events);
    server.verify().await;
}

#[tokio::test]
async fn sync_endpoint_reloads_mounted_views() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start().await;
    mount_user(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookmarks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let cfg = test_config(&server);
    let state = GarnerState::new(&cfg).unwrap();
    let app = garner_router(state.clone());
    let cookie = session_cookie_header(&cfg, &session());
    let (_view_id, events) = open_live(&app, &cookie).await;
    assert_eq!(count_requests(&server, "GET", "/rest/v1/bookmarks").await, 1);

    let (status, body) = post_json(&app, "/dashboard/sync", &cookie, "").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "delivered": 1 }));
    assert_eq!(
        wait_for_requests(&server, "GET", "/rest/v1/bookmarks", 2).await,
        2
    );

    drop(events);
}

#[tokio::test]
async fn sync_endpoint_is_throttled_per_user() {
    if !can_bind_localhost() {
        return;
    }
    let server = MockServer::start().await;
    let cfg = test_config(&server);
    let app = garner_router(GarnerState::new(&cfg).unwrap());
    let cookie = session_cookie_header(&cfg, &session());

    for _ in 0..10 {
        let (status, _) = post_json(&app, "/dashboard/sync", &cookie, "").await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    let (status, body) = post_json(&app, "/dashboard/sync", &cookie, "").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    let mut other = session();
    other.user.id = "user-2".to_string();
    let (status, _) = post_json(
        &app,
        "/dashboard/sync",
        &session_cookie_header(&cfg, &other),
        "",
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}
