//! Staff console handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use super::pages;
use super::server::{AppState, LOGIN_PATH};
use super::session::Session;
use crate::auth::AuthState;
use crate::models::OrderStatus;
use crate::views::staff::{ArchiveFilter, ConsoleView, PageMove};
use crate::views::StaffEvent;

/// Query parameters of GET /staff
#[derive(Debug, Default, Deserialize)]
pub struct ConsoleQuery {
    pub view: Option<String>,
    pub order_id: Option<String>,
    pub requester: Option<String>,
    pub logistician: Option<String>,
    pub page: Option<usize>,
    /// `prev` or `next` relative to the current archive page
    #[serde(rename = "move")]
    pub page_move: Option<String>,
    pub size: Option<usize>,
    /// Order to open in the detail panel
    pub order: Option<String>,
    pub dismiss: Option<String>,
    pub refresh: Option<String>,
}

impl ConsoleQuery {
    /// Console events implied by the query, applied after the order load
    pub fn events(self) -> Vec<StaffEvent> {
        let mut events = Vec::new();
        if let Some(view) = self.view.as_deref() {
            events.push(StaffEvent::SwitchView(ConsoleView::parse(view)));
        }
        if self.order_id.is_some() || self.requester.is_some() || self.logistician.is_some() {
            events.push(StaffEvent::Filter(ArchiveFilter {
                order_id: self.order_id.unwrap_or_default(),
                requester: self.requester.unwrap_or_default(),
                logistician: self.logistician.unwrap_or_default(),
            }));
        }
        if let Some(size) = self.size {
            events.push(StaffEvent::SetPageSize(size));
        }
        if let Some(page) = self.page {
            events.push(StaffEvent::GoToPage(page));
        }
        if let Some(direction) = self.page_move.as_deref().and_then(PageMove::parse) {
            events.push(StaffEvent::ChangePage(direction));
        }
        events.push(match self.order.filter(|id| !id.is_empty()) {
            Some(order_id) => StaffEvent::OpenDetail(order_id),
            None => StaffEvent::CloseDetail,
        });
        if self.dismiss.is_some() {
            events.push(StaffEvent::Dismiss);
        }
        events
    }
}

/// Logistics staff only; everyone else gets the access-denied page
async fn require_staff(state: &AppState, session: &Session) -> Result<AuthState, Response> {
    let auth = state.auth_state(&session.token).await;
    if !auth.is_authenticated() {
        let body = pages::sign_in_body(
            LOGIN_PATH,
            "Sign in with Discord to use the staff console.",
        );
        let page = state.page("Staff Console", &auth, None, &body);
        return Err(session.respond((StatusCode::UNAUTHORIZED, page)));
    }
    if !auth.nav.show_staff_link {
        info!(
            "Denied staff console to {}",
            auth.user.as_ref().map(|u| u.discord_username.as_str()).unwrap_or_default()
        );
        let page = state.page("Access Denied", &auth, None, &pages::access_denied_body());
        return Err(session.respond((StatusCode::FORBIDDEN, page)));
    }
    Ok(auth)
}

/// GET /staff
pub async fn console_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ConsoleQuery>,
) -> Response {
    let auth = match require_staff(&state, &session).await {
        Ok(auth) => auth,
        Err(denied) => return denied,
    };

    let console = state.console(&session.token).await;
    let mut console = console.lock().await;

    let load = if query.refresh.is_some() {
        StaffEvent::Refresh
    } else {
        StaffEvent::Load
    };
    state
        .staff_driver
        .dispatch(&session.token, &mut console, load)
        .await;
    for event in query.events() {
        state
            .staff_driver
            .dispatch(&session.token, &mut console, event)
            .await;
    }

    let toast = console.take_toast();
    let body = pages::staff_body(&console, &Utc::now());
    session.respond(state.page("Staff Console", &auth, toast.as_ref(), &body))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimForm {
    pub from_panel: Option<String>,
}

/// POST /staff/claim/:id
pub async fn claim(
    State(state): State<AppState>,
    session: Session,
    Path(order_id): Path<String>,
    Form(form): Form<ClaimForm>,
) -> Response {
    if let Err(denied) = require_staff(&state, &session).await {
        return denied;
    }
    let console = state.console(&session.token).await;
    let mut console = console.lock().await;
    let event = StaffEvent::Claim {
        order_id,
        from_panel: form.from_panel.is_some(),
    };
    state
        .staff_driver
        .dispatch(&session.token, &mut console, event)
        .await;

    // A pending name prompt renders on the next console load
    let keep_open = console.detail.as_ref().map(|d| d.order.order_id.clone());
    session.respond(console_redirect(keep_open.as_deref()))
}

#[derive(Debug, Default, Deserialize)]
pub struct NameForm {
    #[serde(default)]
    pub name: String,
    pub cancel: Option<String>,
}

/// POST /staff/name - answer the claim name prompt
pub async fn enter_name(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<NameForm>,
) -> Response {
    if let Err(denied) = require_staff(&state, &session).await {
        return denied;
    }
    let console = state.console(&session.token).await;
    let mut console = console.lock().await;
    let event = if form.cancel.is_some() {
        StaffEvent::Dismiss
    } else {
        StaffEvent::NameEntered(form.name)
    };
    state
        .staff_driver
        .dispatch(&session.token, &mut console, event)
        .await;

    let keep_open = console.detail.as_ref().map(|d| d.order.order_id.clone());
    session.respond(console_redirect(keep_open.as_deref()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseForm {
    pub confirm: Option<String>,
}

/// POST /staff/release/:id - first post asks for confirmation
pub async fn release(
    State(state): State<AppState>,
    session: Session,
    Path(order_id): Path<String>,
    Form(form): Form<ReleaseForm>,
) -> Response {
    if let Err(denied) = require_staff(&state, &session).await {
        return denied;
    }
    let console = state.console(&session.token).await;
    let mut console = console.lock().await;
    let event = StaffEvent::Release {
        order_id,
        confirmed: form.confirm.as_deref() == Some("yes"),
    };
    state
        .staff_driver
        .dispatch(&session.token, &mut console, event)
        .await;

    let keep_open = console.detail.as_ref().map(|d| d.order.order_id.clone());
    session.respond(console_redirect(keep_open.as_deref()))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
}

/// POST /staff/status/:id
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    Path(order_id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Response {
    if let Err(denied) = require_staff(&state, &session).await {
        return denied;
    }
    let console = state.console(&session.token).await;
    let mut console = console.lock().await;
    ensure_detail(&state, &session, &mut console, &order_id).await;
    state
        .staff_driver
        .dispatch(
            &session.token,
            &mut console,
            StaffEvent::UpdateStatus(OrderStatus::parse(&form.status)),
        )
        .await;

    let keep_open = console.detail.as_ref().map(|d| d.order.order_id.clone());
    session.respond(console_redirect(keep_open.as_deref()))
}

#[derive(Debug, Default, Deserialize)]
pub struct StaffMessageForm {
    #[serde(default)]
    pub message: String,
}

/// POST /staff/message/:id - post into the order's Discord thread
pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    Path(order_id): Path<String>,
    Form(form): Form<StaffMessageForm>,
) -> Response {
    if let Err(denied) = require_staff(&state, &session).await {
        return denied;
    }
    let console = state.console(&session.token).await;
    let mut console = console.lock().await;
    ensure_detail(&state, &session, &mut console, &order_id).await;
    state
        .staff_driver
        .dispatch(&session.token, &mut console, StaffEvent::SendMessage(form.message))
        .await;

    session.respond(console_redirect(Some(&order_id)))
}

/// Open the panel for `order_id` unless it is already showing
async fn ensure_detail(
    state: &AppState,
    session: &Session,
    console: &mut crate::views::StaffConsoleState,
    order_id: &str,
) {
    if console
        .detail
        .as_ref()
        .is_some_and(|d| d.order.order_id == order_id)
    {
        return;
    }
    debug!("Opening {} before acting on it", order_id);
    if console.find(order_id).is_none() {
        state
            .staff_driver
            .dispatch(&session.token, console, StaffEvent::Load)
            .await;
    }
    state
        .staff_driver
        .dispatch(&session.token, console, StaffEvent::OpenDetail(order_id.to_string()))
        .await;
}

fn console_redirect(open: Option<&str>) -> impl IntoResponse {
    match open {
        Some(order_id) => Redirect::to(&format!("/staff?order={}", urlencoding::encode(order_id))),
        None => Redirect::to("/staff"),
    }
}
