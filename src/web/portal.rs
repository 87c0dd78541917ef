//! Requester-facing handlers: catalog, request submission, My Orders and sign-in

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::pages;
use super::server::{AppState, LOGIN_PATH};
use super::session::Session;
use crate::auth::AuthMessage;
use crate::backend::{PriceTable, SubmitReceipt};
use crate::error::{PortalError, Result};
use crate::models::{OrderType, UserIdentity};
use crate::views::{CatalogView, MyOrdersEvent, RequestForm, Toast};

/// GET / - equipment catalog and request form
pub async fn catalog_page(State(state): State<AppState>, session: Session) -> Response {
    let auth = state.auth_state(&session.token).await;
    let mut toast = state.take_flash(&session.token);

    let (inventory, prices) = tokio::join!(state.sheet.get_inventory(), state.sheet.get_price_table());
    let prices = prices.unwrap_or_else(|e| {
        warn!("Price table unavailable: {}", e);
        PriceTable::new()
    });

    let body = match inventory {
        Ok(inventory) => pages::catalog_body(
            &CatalogView::from_inventory(&inventory),
            &prices,
            auth.is_authenticated(),
        ),
        Err(e) => {
            warn!("Failed to load inventory: {}", e);
            toast.get_or_insert_with(|| Toast::error(format!("Failed to load inventory: {}", e)));
            pages::kit_missing_body("Catalog unavailable", "Please try again in a moment.")
        }
    };

    session.respond(state.page("Catalog", &auth, toast.as_ref(), &body))
}

/// POST /request - submit the catalog form
pub async fn submit_request(
    State(state): State<AppState>,
    session: Session,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let auth = state.auth_state(&session.token).await;
    let toast = match auth.user.as_ref() {
        None => Toast::error("Please sign in with Discord before submitting a request"),
        Some(user) => match place_request(&state, user, &fields).await {
            Ok(submitted) => submitted.toast(),
            Err(e) => {
                if !e.is_precondition() {
                    warn!("Request from {} failed: {}", user.discord_username, e);
                }
                Toast::error(e.to_string())
            }
        },
    };
    state.flash(&session.token, toast);
    session.respond(Redirect::to("/"))
}

/// Outcome reported back to the requester
#[derive(Debug)]
struct Submitted {
    receipt: SubmitReceipt,
    order_type: OrderType,
    /// Missing when the price table could not be read
    estimate: Option<f64>,
}

impl Submitted {
    fn toast(&self) -> Toast {
        let mut message = format!(
            "Request submitted successfully! Order ID: {} ({} order",
            self.receipt.order_id,
            self.order_type.as_str()
        );
        if let Some(estimate) = self.estimate.filter(|e| *e > 0.0) {
            message.push_str(&format!(", est. {:.0} aUEC", estimate));
        }
        message.push(')');
        Toast::success(message)
    }
}

async fn place_request(
    state: &AppState,
    user: &UserIdentity,
    fields: &[(String, String)],
) -> Result<Submitted> {
    let form = RequestForm::from_fields(fields, Some(user))?;
    form.validate()?;

    let (inventory, prices) = tokio::join!(state.sheet.get_inventory(), state.sheet.get_price_table());
    let inventory = inventory?;
    let restricted: Vec<&str> = form
        .cart
        .items()
        .iter()
        .filter(|line| {
            inventory
                .get(&line.name)
                .is_some_and(|item| item.is_academy_restricted)
        })
        .map(|line| line.name.as_str())
        .collect();
    if !restricted.is_empty()
        && !state
            .sheet
            .check_academy_access(&user.discord_username)
            .await?
    {
        return Err(PortalError::precondition(format!(
            "Academy access is required to request: {}",
            restricted.join(", ")
        )));
    }

    let request = form.build_submission(&Utc::now())?;
    let receipt = state.sheet.submit_request(&request).await?;
    info!(
        "Order {} submitted by {} ({} items)",
        receipt.order_id,
        user.discord_username,
        form.cart.total_quantity()
    );

    let estimate = match prices {
        Ok(prices) => Some(form.estimate_cost(&prices)),
        Err(e) => {
            warn!("Price table unavailable for the estimate: {}", e);
            None
        }
    };
    Ok(Submitted {
        receipt,
        order_type: form.order_type(),
        estimate,
    })
}

/// GET /kit/:name - kit contents
pub async fn kit_page(
    State(state): State<AppState>,
    session: Session,
    Path(name): Path<String>,
) -> Response {
    let auth = state.auth_state(&session.token).await;
    let body = match state.sheet.get_kit_info(&name).await {
        Ok(kit) => pages::kit_body(&kit),
        Err(e) => pages::kit_missing_body(&name, &e.to_string()),
    };
    session.respond(state.page(&name, &auth, None, &body))
}

/// GET /orders - the signed-in user's orders
pub async fn my_orders_page(State(state): State<AppState>, session: Session) -> Response {
    render_my_orders(&state, &session, None).await
}

/// GET /orders/:id - My Orders with the detail panel open
pub async fn order_detail_page(
    State(state): State<AppState>,
    session: Session,
    Path(order_id): Path<String>,
) -> Response {
    render_my_orders(&state, &session, Some(order_id)).await
}

async fn render_my_orders(state: &AppState, session: &Session, open: Option<String>) -> Response {
    let auth = state.auth_state(&session.token).await;
    if !auth.is_authenticated() {
        let body = pages::sign_in_body(
            LOGIN_PATH,
            "Sign in with Discord to view your orders.",
        );
        return session.respond(state.page("My Orders", &auth, None, &body));
    }

    let orders = state.my_orders(&session.token, auth.user.as_ref()).await;
    let mut orders = orders.lock().await;
    state
        .orders_driver
        .dispatch(&mut orders, MyOrdersEvent::Load)
        .await;
    let event = match open {
        Some(order_id) => MyOrdersEvent::OpenDetail(order_id),
        None => MyOrdersEvent::CloseDetail,
    };
    state.orders_driver.dispatch(&mut orders, event).await;

    let toast = orders.take_toast();
    let body = pages::my_orders_body(&orders, &Utc::now());
    session.respond(state.page("My Orders", &auth, toast.as_ref(), &body))
}

#[derive(Debug, Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    pub message: String,
}

/// POST /orders/:id/message - message logistics staff about an order
pub async fn send_order_message(
    State(state): State<AppState>,
    session: Session,
    Path(order_id): Path<String>,
    Form(form): Form<MessageForm>,
) -> Response {
    let auth = state.auth_state(&session.token).await;
    if !auth.is_authenticated() {
        return session.respond(Redirect::to("/orders"));
    }

    let orders = state.my_orders(&session.token, auth.user.as_ref()).await;
    let mut orders = orders.lock().await;
    let panel_open = orders
        .detail
        .as_ref()
        .is_some_and(|d| d.order.order_id == order_id);
    if !panel_open {
        state
            .orders_driver
            .dispatch(&mut orders, MyOrdersEvent::Load)
            .await;
        state
            .orders_driver
            .dispatch(&mut orders, MyOrdersEvent::OpenDetail(order_id.clone()))
            .await;
    }
    state
        .orders_driver
        .dispatch(&mut orders, MyOrdersEvent::SendMessage(form.message))
        .await;

    session.respond(Redirect::to(&format!(
        "/orders/{}",
        urlencoding::encode(&order_id)
    )))
}

/// GET /auth/login - start Discord sign-in
pub async fn login(State(state): State<AppState>, session: Session) -> Response {
    session.respond(Redirect::to(&state.auth.begin_login(&session.token)))
}

/// Query Discord appends when it sends the browser back
#[derive(Debug, Default, Deserialize)]
pub struct DiscordCallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Set instead of `code` when the user declined
    #[serde(default)]
    pub error: Option<String>,
}

/// GET /auth/discord/callback - finish the portal's own Discord sign-in
pub async fn discord_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<DiscordCallbackQuery>,
) -> Response {
    let result = match (query.error, query.code) {
        (Some(error), _) => Err(PortalError::backend(format!("Discord returned {}", error))),
        (None, code) => {
            state
                .auth
                .complete_login(
                    &session.token,
                    code.as_deref().unwrap_or_default(),
                    query.state.as_deref().unwrap_or_default(),
                )
                .await
        }
    };
    let toast = match result {
        Ok(auth) => Toast::success(format!(
            "Signed in as {}",
            auth.user.map(|u| u.discord_username).unwrap_or_default()
        )),
        Err(e) => {
            warn!("Discord sign-in failed: {}", e);
            Toast::error(format!("Authentication failed: {}", e))
        }
    };
    state.flash(&session.token, toast);
    session.respond(Redirect::to("/"))
}

/// Callback parameters as the bot redirects them
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub success: Option<String>,
    /// Identity as a JSON document
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl CallbackQuery {
    pub fn into_message(self) -> AuthMessage {
        let success = self
            .success
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("true") || s == "1");
        let user = self
            .user
            .as_deref()
            .and_then(|raw| match serde_json::from_str::<UserIdentity>(raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Ignoring malformed user in auth callback: {}", e);
                    None
                }
            });
        AuthMessage {
            success,
            user,
            message: self.message,
        }
    }
}

/// GET /auth/callback - return from the Discord sign-in redirect
pub async fn auth_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let toast = match state
        .auth
        .handle_callback(&session.token, query.into_message())
        .await
    {
        Ok(auth) => Toast::success(format!(
            "Signed in as {}",
            auth.user.map(|u| u.discord_username).unwrap_or_default()
        )),
        Err(e) => {
            warn!("Sign-in failed: {}", e);
            Toast::error(format!("Authentication failed: {}", e))
        }
    };
    state.flash(&session.token, toast);
    session.respond(Redirect::to("/"))
}

/// POST /auth/callback - identity message posted by the sign-in popup
pub async fn auth_callback_message(
    State(state): State<AppState>,
    session: Session,
    Json(message): Json<AuthMessage>,
) -> Response {
    let response = match state.auth.handle_callback(&session.token, message).await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "success": true }))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "success": false, "message": e.to_string() })),
        ),
    };
    session.respond(response.into_response())
}

/// GET /auth/logout
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    state.auth.logout(&session.token).await;
    state.forget_session(&session.token);
    state.flash(&session.token, Toast::info("Signed out"));
    session.respond(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BotBackend;
    use crate::config::PortalConfig;
    use crate::sheet::{LocalSheet, SheetData};
    use crate::storage::{create_shared_client_storage, ClientStorage};
    use std::sync::Arc;

    fn state_with(data: SheetData) -> (AppState, Arc<LocalSheet>) {
        let sheet = Arc::new(LocalSheet::in_memory(data));
        let state = AppState::new(
            PortalConfig::default(),
            sheet.clone(),
            sheet.clone(),
            create_shared_client_storage(ClientStorage::new()),
        );
        (state, sheet)
    }

    fn alice() -> UserIdentity {
        UserIdentity {
            discord_id: "1001".to_string(),
            discord_username: "Alice".to_string(),
            ..Default::default()
        }
    }

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_place_request_creates_order() {
        let (state, sheet) = state_with(SheetData::sample());
        let submitted = place_request(
            &state,
            &alice(),
            &fields(&[("qty:P4-AR", "2"), ("availability", "Evenings"), ("notes", "")]),
        )
        .await
        .unwrap();
        assert!(submitted.receipt.order_id.starts_with("MRS-"));
        assert_eq!(submitted.order_type, OrderType::Medrunner);
        assert_eq!(submitted.estimate, Some(5800.0));
        let toast = submitted.toast();
        assert!(toast.message.contains(&submitted.receipt.order_id));
        assert!(toast.message.ends_with("(Medrunner order, est. 5800 aUEC)"));

        let orders = sheet.get_user_orders("1001").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].item_count, 2);
    }

    #[tokio::test]
    async fn test_place_request_rejects_empty_cart_locally() {
        let (state, sheet) = state_with(SheetData::sample());
        let err = place_request(&state, &alice(), &fields(&[("availability", "Evenings")]))
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(sheet.get_orders().await.unwrap().is_empty());
    }

    #[test]
    fn test_callback_query_parses_user_json() {
        let query = CallbackQuery {
            success: Some("true".to_string()),
            user: Some(r#"{"discordId":"1001","discordUsername":"Alice"}"#.to_string()),
            message: None,
        };
        let message = query.into_message();
        assert!(message.success);
        assert_eq!(message.user.map(|u| u.discord_id), Some("1001".to_string()));

        let failed = CallbackQuery {
            success: Some("false".to_string()),
            user: Some("not json".to_string()),
            message: Some("denied".to_string()),
        }
        .into_message();
        assert!(!failed.success);
        assert!(failed.user.is_none());
    }
}
