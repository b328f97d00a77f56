use crate::backend::{BackendClient, BroadcastHub};
use crate::config::{SYNC_EVENT, SYNC_TOPIC};
use crate::error::GarnerError;
use crate::service::refresh_gate::{Completion, RefreshGate, Ticket};
use crate::types::{Bookmark, BookmarkForm, Session, User};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const MSG_REQUIRED: &str = "Title and URL are required";
pub const MSG_INVALID_URL: &str = "Please enter a valid URL";
pub const MSG_ADDED: &str = "Bookmark added!";
pub const MSG_ADD_FAILED: &str = "Failed to add bookmark";
pub const MSG_DELETED: &str = "Bookmark deleted";
pub const MSG_DELETE_FAILED: &str = "Failed to delete bookmark";
pub const MSG_LOAD_FAILED: &str = "Failed to load bookmarks";

const ADDED_TTL: Duration = Duration::from_secs(3);
const DELETED_TTL: Duration = Duration::from_secs(2);

/// Places a view can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Landing,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Landing => "/",
        }
    }
}

/// Everything a renderer needs to draw the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub user: Option<User>,
    /// Server order: newest first.
    pub bookmarks: Vec<Bookmark>,
    pub form: BookmarkForm,
    pub error: Option<String>,
    pub success: Option<String>,
    pub loading: bool,
    pub refreshing: bool,
    /// Id of the bookmark whose delete is in flight.
    pub deleting: Option<String>,
    pub navigate: Option<Route>,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            user: None,
            bookmarks: Vec::new(),
            form: BookmarkForm::default(),
            error: None,
            success: None,
            loading: true,
            refreshing: false,
            deleting: None,
            navigate: None,
        }
    }
}

impl DashboardSnapshot {
    /// Nothing is loading or being fetched.
    pub fn is_settled(&self) -> bool {
        !self.loading && !self.refreshing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Ready,
    Redirect(Route),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed,
    /// Rejected by validation; no request was made.
    Invalid,
    Failed,
    /// No signed-in user; nothing happened.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    Mount,
    Insert,
    Delete,
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Banner {
    Error,
    Success,
}

/// Messages handled by a dashboard view actor.
#[derive(Debug)]
pub enum DashboardMessage {
    /// Check the session and load bookmarks.
    Mount(RpcReplyPort<MountOutcome>),
    RequestRefresh(RefreshSource),
    /// Replace the form fields as typed.
    EditForm(BookmarkForm),
    /// Validate and insert the current form.
    SubmitForm(RpcReplyPort<ActionOutcome>),
    DeleteBookmark(String, RpcReplyPort<ActionOutcome>),
    Dismiss(Banner),
    /// Use a newer session (e.g. refreshed by a later request) for backend calls.
    UpdateSession(Session),
    SignOut(RpcReplyPort<()>),
    /// Drop the broadcast subscription and stop.
    Unmount(RpcReplyPort<()>),

    // Internal messages (sent by the actor itself)
    FetchComplete {
        ticket: Ticket,
        result: Result<Vec<Bookmark>, GarnerError>,
    },
    /// Clear the success banner if it is still the one armed as `seq`.
    ClearSuccess(u64),
}

/// Handle for interacting with one mounted dashboard view.
#[derive(Clone)]
pub struct DashboardHandle {
    id: Uuid,
    actor: ActorRef<DashboardMessage>,
    state_rx: watch::Receiver<DashboardSnapshot>,
}

impl DashboardHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.state_rx.clone()
    }

    /// Wait until no load or fetch is outstanding.
    pub async fn settled(&self) -> DashboardSnapshot {
        let mut rx = self.state_rx.clone();
        let settled = rx
            .wait_for(DashboardSnapshot::is_settled)
            .await
            .map(|s| s.clone());
        settled.unwrap_or_else(|_| rx.borrow().clone())
    }

    pub async fn mount(&self) -> Result<MountOutcome, GarnerError> {
        ractor::call!(self.actor, DashboardMessage::Mount)
            .map_err(|e| GarnerError::RactorError(format!("Mount RPC failed: {e}")))
    }

    pub fn edit_form(&self, form: BookmarkForm) {
        let _ = ractor::cast!(self.actor, DashboardMessage::EditForm(form));
    }

    pub async fn submit(&self) -> Result<ActionOutcome, GarnerError> {
        ractor::call!(self.actor, DashboardMessage::SubmitForm)
            .map_err(|e| GarnerError::RactorError(format!("SubmitForm RPC failed: {e}")))
    }

    /// Fill the form and submit it.
    pub async fn add_bookmark(
        &self,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<ActionOutcome, GarnerError> {
        self.edit_form(BookmarkForm::new(title, url));
        self.submit().await
    }

    pub async fn delete_bookmark(&self, id: impl Into<String>) -> Result<ActionOutcome, GarnerError> {
        ractor::call!(self.actor, DashboardMessage::DeleteBookmark, id.into())
            .map_err(|e| GarnerError::RactorError(format!("DeleteBookmark RPC failed: {e}")))
    }

    pub fn dismiss(&self, banner: Banner) {
        let _ = ractor::cast!(self.actor, DashboardMessage::Dismiss(banner));
    }

    pub fn update_session(&self, session: Session) {
        let _ = ractor::cast!(self.actor, DashboardMessage::UpdateSession(session));
    }

    pub async fn sign_out(&self) -> Result<(), GarnerError> {
        ractor::call!(self.actor, DashboardMessage::SignOut)
            .map_err(|e| GarnerError::RactorError(format!("SignOut RPC failed: {e}")))
    }

    /// Tear the view down. Once this returns no broadcast reaches it.
    pub async fn unmount(&self) {
        if let Err(e) = ractor::call!(self.actor, DashboardMessage::Unmount) {
            debug!(view = %self.id, "unmount on stopped view: {e}");
        }
    }

    /// Stop without waiting; the subscription is released in `post_stop`.
    pub fn stop(&self) {
        self.actor.stop(Some("view dropped".to_string()));
    }
}

/// Arguments a view is spawned with.
pub struct DashboardArgs {
    pub id: Uuid,
    pub backend: BackendClient,
    pub hub: BroadcastHub,
    pub session: Option<Session>,
    pub publisher: watch::Sender<DashboardSnapshot>,
}

struct DashboardState {
    id: Uuid,
    backend: BackendClient,
    session: Option<Session>,
    view: DashboardSnapshot,
    gate: RefreshGate,
    flash_seq: u64,
    subscription: Option<JoinHandle<()>>,
    publisher: watch::Sender<DashboardSnapshot>,
}

impl DashboardState {
    fn publish(&self) {
        self.publisher.send_replace(self.view.clone());
    }
}

struct DashboardActor;

#[ractor::async_trait]
impl Actor for DashboardActor {
    type Msg = DashboardMessage;
    type State = DashboardState;
    type Arguments = DashboardArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let subscription = forward_sync_signals(&args.hub, args.id, myself);
        Ok(DashboardState {
            id: args.id,
            backend: args.backend,
            session: args.session,
            view: DashboardSnapshot::default(),
            gate: RefreshGate::new(),
            flash_seq: 0,
            subscription: Some(subscription),
            publisher: args.publisher,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        self.teardown(state).await;
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DashboardMessage::Mount(rp) => {
                let outcome = self.handle_mount(state, &myself).await;
                let _ = rp.send(outcome);
            }
            DashboardMessage::RequestRefresh(source) => {
                self.request_refresh(state, &myself, source);
                state.publish();
            }
            DashboardMessage::EditForm(form) => {
                state.view.form = form;
                state.publish();
            }
            DashboardMessage::SubmitForm(rp) => {
                let outcome = self.handle_submit(state, &myself).await;
                let _ = rp.send(outcome);
            }
            DashboardMessage::DeleteBookmark(id, rp) => {
                let outcome = self.handle_delete(state, &myself, id).await;
                let _ = rp.send(outcome);
            }
            DashboardMessage::Dismiss(banner) => {
                match banner {
                    Banner::Error => state.view.error = None,
                    Banner::Success => state.view.success = None,
                }
                state.publish();
            }
            DashboardMessage::UpdateSession(session) => {
                if state.view.navigate.is_none() && state.session.as_ref() != Some(&session) {
                    debug!(view = %state.id, "session updated");
                    state.session = Some(session);
                }
            }
            DashboardMessage::SignOut(rp) => {
                self.handle_sign_out(state).await;
                let _ = rp.send(());
            }
            DashboardMessage::Unmount(rp) => {
                self.teardown(state).await;
                let _ = rp.send(());
                myself.stop(Some("unmounted".to_string()));
            }
            DashboardMessage::FetchComplete { ticket, result } => {
                self.handle_fetch_complete(state, &myself, ticket, result);
            }
            DashboardMessage::ClearSuccess(seq) => {
                if seq == state.flash_seq && state.view.success.is_some() {
                    state.view.success = None;
                    state.publish();
                }
            }
        }
        Ok(())
    }
}

impl DashboardActor {
    async fn handle_mount(
        &self,
        state: &mut DashboardState,
        myself: &ActorRef<DashboardMessage>,
    ) -> MountOutcome {
        let outcome = match state.backend.get_user(state.session.as_ref()).await {
            Ok(Some(user)) => {
                info!(view = %state.id, user_id = %user.id, "dashboard mounted");
                state.view.user = Some(user);
                self.request_refresh(state, myself, RefreshSource::Mount);
                MountOutcome::Ready
            }
            Ok(None) => {
                info!(view = %state.id, "no signed-in user; redirecting to landing");
                MountOutcome::Redirect(Route::Landing)
            }
            Err(e) => {
                warn!(view = %state.id, error = %e, "auth check failed; redirecting to landing");
                MountOutcome::Redirect(Route::Landing)
            }
        };

        if let MountOutcome::Redirect(route) = outcome {
            state.view.navigate = Some(route);
        }
        if !state.gate.is_busy() {
            state.view.loading = false;
        }
        state.publish();
        outcome
    }

    fn request_refresh(
        &self,
        state: &mut DashboardState,
        myself: &ActorRef<DashboardMessage>,
        source: RefreshSource,
    ) {
        if state.view.user.is_none() || state.session.is_none() {
            debug!(view = %state.id, ?source, "refresh ignored without a signed-in user");
            return;
        }
        match state.gate.request() {
            Some(ticket) => {
                debug!(view = %state.id, ?source, ticket, "starting bookmark fetch");
                self.spawn_fetch(state, myself, ticket);
            }
            None => debug!(view = %state.id, ?source, "fetch in flight; refresh coalesced"),
        }
    }

    fn spawn_fetch(
        &self,
        state: &mut DashboardState,
        myself: &ActorRef<DashboardMessage>,
        ticket: Ticket,
    ) {
        let Some(session) = state.session.clone() else {
            state.gate.reset();
            return;
        };
        state.view.refreshing = true;
        let backend = state.backend.clone();
        let me = myself.clone();
        tokio::spawn(async move {
            let result = backend.list_bookmarks(&session).await;
            let _ = ractor::cast!(me, DashboardMessage::FetchComplete { ticket, result });
        });
    }

    fn handle_fetch_complete(
        &self,
        state: &mut DashboardState,
        myself: &ActorRef<DashboardMessage>,
        ticket: Ticket,
        result: Result<Vec<Bookmark>, GarnerError>,
    ) {
        let next = match state.gate.complete(ticket) {
            Completion::Stale => {
                debug!(view = %state.id, ticket, "dropping stale fetch result");
                return;
            }
            Completion::Apply { next } => next,
        };

        match result {
            Ok(rows) => state.view.bookmarks = rows,
            Err(e) => {
                error!(view = %state.id, error = %e, "Failed to fetch bookmarks");
                state.view.error = Some(MSG_LOAD_FAILED.to_string());
            }
        }
        state.view.loading = false;

        match next {
            Some(ticket) => self.spawn_fetch(state, myself, ticket),
            None => state.view.refreshing = false,
        }
        state.publish();
    }

    async fn handle_submit(
        &self,
        state: &mut DashboardState,
        myself: &ActorRef<DashboardMessage>,
    ) -> ActionOutcome {
        let (Some(user_id), Some(session)) = (
            state.view.user.as_ref().map(|u| u.id.clone()),
            state.session.clone(),
        ) else {
            return ActionOutcome::Ignored;
        };

        state.view.error = None;
        state.view.success = None;

        let form = state.view.form.clone();
        if form.is_blank() {
            state.view.error = Some(MSG_REQUIRED.to_string());
            state.publish();
            return ActionOutcome::Invalid;
        }
        if !form.has_web_url() {
            state.view.error = Some(MSG_INVALID_URL.to_string());
            state.publish();
            return ActionOutcome::Invalid;
        }

        let outcome = match state
            .backend
            .insert_bookmark(&session, &form.to_new_bookmark(&user_id))
            .await
        {
            Ok(()) => {
                info!(view = %state.id, "bookmark inserted");
                state.view.form = BookmarkForm::default();
                self.flash_success(state, myself, MSG_ADDED, ADDED_TTL);
                self.request_refresh(state, myself, RefreshSource::Insert);
                ActionOutcome::Completed
            }
            Err(e) => {
                error!(view = %state.id, error = %e, "Insert error");
                state.view.error = Some(MSG_ADD_FAILED.to_string());
                ActionOutcome::Failed
            }
        };
        state.publish();
        outcome
    }

    async fn handle_delete(
        &self,
        state: &mut DashboardState,
        myself: &ActorRef<DashboardMessage>,
        id: String,
    ) -> ActionOutcome {
        let Some(session) = state.session.clone() else {
            return ActionOutcome::Ignored;
        };

        state.view.deleting = Some(id.clone());
        state.publish();

        let outcome = match state.backend.delete_bookmark(&session, &id).await {
            Ok(()) => {
                info!(view = %state.id, bookmark_id = %id, "bookmark deleted");
                self.flash_success(state, myself, MSG_DELETED, DELETED_TTL);
                self.request_refresh(state, myself, RefreshSource::Delete);
                ActionOutcome::Completed
            }
            Err(e) => {
                error!(view = %state.id, bookmark_id = %id, error = %e, "Delete error");
                state.view.error = Some(MSG_DELETE_FAILED.to_string());
                ActionOutcome::Failed
            }
        };

        state.view.deleting = None;
        state.publish();
        outcome
    }

    async fn handle_sign_out(&self, state: &mut DashboardState) {
        if let Some(session) = state.session.take()
            && let Err(e) = state.backend.sign_out(&session).await
        {
            warn!(view = %state.id, error = %e, "sign-out failed; leaving anyway");
        }
        state.gate.reset();
        state.view.refreshing = false;
        state.view.navigate = Some(Route::Landing);
        state.publish();
        info!(view = %state.id, "signed out");
    }

    fn flash_success(
        &self,
        state: &mut DashboardState,
        myself: &ActorRef<DashboardMessage>,
        text: &str,
        ttl: Duration,
    ) {
        state.flash_seq += 1;
        let seq = state.flash_seq;
        state.view.success = Some(text.to_string());

        let me = myself.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = ractor::cast!(me, DashboardMessage::ClearSuccess(seq));
        });
    }

    async fn teardown(&self, state: &mut DashboardState) {
        state.gate.reset();
        if let Some(task) = state.subscription.take() {
            task.abort();
            let _ = task.await;
            debug!(view = %state.id, "broadcast subscription removed");
        }
    }
}

/// Turn `sync` broadcasts from other views into refresh requests for `view`.
fn forward_sync_signals(
    hub: &BroadcastHub,
    view: Uuid,
    myself: ActorRef<DashboardMessage>,
) -> JoinHandle<()> {
    let mut subscription = hub.subscribe(SYNC_TOPIC, SYNC_EVENT);
    let own_source = view.to_string();
    tokio::spawn(async move {
        while let Some(signal) = subscription.next().await {
            if signal.payload.get("source").and_then(|s| s.as_str()) == Some(own_source.as_str()) {
                continue;
            }
            info!(view = %own_source, "Received broadcast sync signal");
            if ractor::cast!(
                myself,
                DashboardMessage::RequestRefresh(RefreshSource::Broadcast)
            )
            .is_err()
            {
                break;
            }
        }
    })
}

/// Spawn a dashboard view. Call [`DashboardHandle::mount`] next.
pub async fn spawn(
    backend: BackendClient,
    hub: BroadcastHub,
    session: Option<Session>,
) -> Result<DashboardHandle, GarnerError> {
    let id = Uuid::new_v4();
    let (publisher, state_rx) = watch::channel(DashboardSnapshot::default());
    let args = DashboardArgs {
        id,
        backend,
        hub,
        session,
        publisher,
    };
    let (actor, _jh) = Actor::spawn(None, DashboardActor, args)
        .await
        .map_err(|e| GarnerError::RactorError(format!("failed to spawn dashboard view: {e}")))?;
    Ok(DashboardHandle {
        id,
        actor,
        state_rx,
    })
}
