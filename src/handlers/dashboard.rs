use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        Html, IntoResponse, Redirect, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::pages::dashboard_page;
use crate::config::{SYNC_EVENT, SYNC_TOPIC};
use crate::middleware::SessionContext;
use crate::service::dashboard_actor;
use crate::service::{
    ActionOutcome, Banner, DashboardHandle, DashboardSnapshot, MountOutcome, Route, ViewGuard,
};
use crate::types::BookmarkForm;
use crate::{GarnerError, router::GarnerState};

#[derive(Debug, Deserialize)]
pub struct DismissForm {
    pub banner: Banner,
}

/// GET /dashboard -> shell page that opens the live view.
pub async fn dashboard_shell(ctx: SessionContext) -> Result<Response, GarnerError> {
    let SessionContext { session, cookies } = ctx;
    let response = match session {
        Some(session) => (
            cookies.into_jar(),
            Html(dashboard_page(session.user.email.as_deref())?),
        )
            .into_response(),
        None => (cookies.into_jar(), Redirect::to(Route::Landing.path())).into_response(),
    };
    Ok(response)
}

/// GET /dashboard/live -> mounts a view and streams its state as SSE.
///
/// Events: `view` (id for action URLs), `state` (JSON snapshot),
/// `navigate` (path; last event). Closing the stream unmounts the view.
pub async fn dashboard_live(
    State(state): State<GarnerState>,
    ctx: SessionContext,
) -> Result<Response, GarnerError> {
    let SessionContext { session, cookies } = ctx;
    let jar = cookies.into_jar();

    let view = dashboard_actor::spawn(state.backend.clone(), state.hub.clone(), session).await?;
    match view.mount().await {
        Ok(MountOutcome::Ready) => {}
        Ok(MountOutcome::Redirect(route)) => {
            view.unmount().await;
            let events = stream::iter([Ok::<_, Infallible>(navigate_event(route))]);
            return Ok((jar, Sse::new(events)).into_response());
        }
        Err(e) => {
            view.stop();
            return Err(e);
        }
    }

    let owner = view
        .snapshot()
        .user
        .map(|u| u.id)
        .unwrap_or_default();
    let guard = state.views.register(owner, view);
    debug!(view = %guard.id(), live = state.views.len(), "live view opened");

    Ok((
        jar,
        Sse::new(live_events(guard)).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

/// POST /dashboard/live/{view}/bookmarks
pub async fn add_bookmark(
    State(state): State<GarnerState>,
    Path(view_id): Path<Uuid>,
    ctx: SessionContext,
    Form(form): Form<BookmarkForm>,
) -> Result<Response, GarnerError> {
    let view = live_view(&state, view_id, &ctx)?;
    view.edit_form(form);
    let outcome = view.submit().await?;
    if outcome == ActionOutcome::Completed {
        signal_sync(&state, view_id).await;
    }
    Ok((ctx.cookies.into_jar(), Json(json!({ "outcome": outcome }))).into_response())
}

/// POST /dashboard/live/{view}/bookmarks/{id}/delete
pub async fn delete_bookmark(
    State(state): State<GarnerState>,
    Path((view_id, bookmark_id)): Path<(Uuid, String)>,
    ctx: SessionContext,
) -> Result<Response, GarnerError> {
    let view = live_view(&state, view_id, &ctx)?;
    let outcome = view.delete_bookmark(bookmark_id).await?;
    if outcome == ActionOutcome::Completed {
        signal_sync(&state, view_id).await;
    }
    Ok((ctx.cookies.into_jar(), Json(json!({ "outcome": outcome }))).into_response())
}

/// POST /dashboard/live/{view}/dismiss
pub async fn dismiss_banner(
    State(state): State<GarnerState>,
    Path(view_id): Path<Uuid>,
    ctx: SessionContext,
    Form(form): Form<DismissForm>,
) -> Result<Response, GarnerError> {
    let view = state.views.get(view_id, ctx.user_id()?)?;
    view.dismiss(form.banner);
    Ok((ctx.cookies.into_jar(), StatusCode::NO_CONTENT).into_response())
}

/// POST /dashboard/live/{view}/sign-out
pub async fn sign_out(
    State(state): State<GarnerState>,
    Path(view_id): Path<Uuid>,
    mut ctx: SessionContext,
) -> Result<Response, GarnerError> {
    let view = live_view(&state, view_id, &ctx)?;
    view.sign_out().await?;
    ctx.clear(&state);
    Ok((
        ctx.cookies.into_jar(),
        Json(json!({ "navigate": Route::Landing.path() })),
    )
        .into_response())
}

/// POST /dashboard/sync -> asks every open dashboard to reload. Throttled per user.
pub async fn publish_sync(
    State(state): State<GarnerState>,
    ctx: SessionContext,
) -> Result<Response, GarnerError> {
    let user_id = ctx.user_id()?;
    if state.sync_limiter.check_key(&user_id.to_string()).is_err() {
        warn!(user_id, "sync requests throttled");
        return Err(GarnerError::RateLimited);
    }
    let delivered = state.hub.publish(SYNC_TOPIC, SYNC_EVENT, json!({})).await?;
    Ok((
        StatusCode::ACCEPTED,
        ctx.cookies.into_jar(),
        Json(json!({ "delivered": delivered })),
    )
        .into_response())
}

/// The caller's view, carrying the session of the current request so a
/// refreshed token reaches the actor.
fn live_view(
    state: &GarnerState,
    view_id: Uuid,
    ctx: &SessionContext,
) -> Result<DashboardHandle, GarnerError> {
    let view = state.views.get(view_id, ctx.user_id()?)?;
    if let Some(session) = &ctx.session {
        view.update_session(session.clone());
    }
    Ok(view)
}

async fn signal_sync(state: &GarnerState, source: Uuid) {
    let payload = json!({ "source": source.to_string() });
    if let Err(e) = state.hub.publish(SYNC_TOPIC, SYNC_EVENT, payload).await {
        warn!(view = %source, error = %e, "failed to publish sync signal");
    }
}

struct LiveStream {
    guard: ViewGuard,
    rx: watch::Receiver<DashboardSnapshot>,
    announced: bool,
    finished: bool,
}

fn live_events(guard: ViewGuard) -> impl Stream<Item = Result<Event, Infallible>> {
    let mut rx = guard.handle().subscribe();
    rx.mark_changed();
    let init = LiveStream {
        guard,
        rx,
        announced: false,
        finished: false,
    };

    stream::unfold(init, |mut live| async move {
        if live.finished {
            return None;
        }
        if !live.announced {
            live.announced = true;
            let event = Event::default()
                .event("view")
                .data(live.guard.id().to_string());
            return Some((Ok(event), live));
        }

        live.rx.changed().await.ok()?;
        let snapshot = live.rx.borrow_and_update().clone();
        let event = match snapshot.navigate {
            Some(route) => {
                live.finished = true;
                navigate_event(route)
            }
            None => state_event(&snapshot),
        };
        Some((Ok(event), live))
    })
}

fn state_event(snapshot: &DashboardSnapshot) -> Event {
    Event::default()
        .event("state")
        .json_data(snapshot)
        .unwrap_or_else(|e| Event::default().comment(format!("state encoding failed: {e}")))
}

fn navigate_event(route: Route) -> Event {
    Event::default().event("navigate").data(route.path())
}
