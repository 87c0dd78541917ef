//! A requester's own orders and the per-order message thread

use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::backend::SharedBotBackend;
use crate::models::{Order, OrderStatus, ThreadMessage, UserBucket, UserIdentity};

use super::toast::Toast;

#[derive(Debug, Clone, PartialEq)]
pub enum MyOrdersEvent {
    Load,
    OrdersLoaded(Vec<Order>),
    LoadFailed(String),
    OpenDetail(String),
    CloseDetail,
    ThreadLoaded {
        order_id: String,
        result: Result<Vec<ThreadMessage>, String>,
    },
    SendMessage(String),
    MessageSent { order_id: String },
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MyOrdersEffect {
    FetchOrders { discord_id: String },
    FetchThread { order_id: String },
    SendMessage { order_id: String, message: String },
}

/// Message input state for an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composer {
    pub enabled: bool,
    pub placeholder: String,
    pub label: String,
}

impl Composer {
    pub fn for_status(status: &OrderStatus) -> Self {
        if status.is_terminal() {
            Self {
                enabled: false,
                placeholder: format!("This order is {}. Messaging is disabled.", status),
                label: format!("Order {} - Messaging Disabled", status),
            }
        } else {
            Self {
                enabled: true,
                placeholder: "Type your message here...".to_string(),
                label: "Send a message to logistics staff:".to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailPanel {
    pub order: Order,
    pub messages: Vec<ThreadMessage>,
    pub thread_loading: bool,
    pub thread_error: Option<String>,
}

impl DetailPanel {
    fn new(order: Order) -> Self {
        Self {
            order,
            messages: Vec::new(),
            thread_loading: true,
            thread_error: None,
        }
    }

    pub fn composer(&self) -> Composer {
        Composer::for_status(&self.order.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MyOrdersState {
    pub user: Option<UserIdentity>,
    pub orders: Vec<Order>,
    pub loading: bool,
    pub detail: Option<DetailPanel>,
    pub toast: Option<Toast>,
}

impl MyOrdersState {
    pub fn new(user: Option<UserIdentity>) -> Self {
        Self {
            user,
            ..Default::default()
        }
    }

    pub fn update(&mut self, event: MyOrdersEvent) -> Vec<MyOrdersEffect> {
        match event {
            MyOrdersEvent::Load => {
                let Some(discord_id) = self
                    .user
                    .as_ref()
                    .map(|u| u.discord_id.clone())
                    .filter(|id| !id.is_empty())
                else {
                    self.loading = false;
                    self.orders.clear();
                    self.toast = Some(Toast::error("Sign in with Discord to view your orders"));
                    return Vec::new();
                };
                self.loading = true;
                vec![MyOrdersEffect::FetchOrders { discord_id }]
            }
            MyOrdersEvent::OrdersLoaded(orders) => {
                self.loading = false;
                self.orders = orders;
                if let Some(detail) = self.detail.as_mut() {
                    if let Some(fresh) = self.orders.iter().find(|o| o.order_id == detail.order.order_id) {
                        detail.order = fresh.clone();
                    }
                }
                Vec::new()
            }
            MyOrdersEvent::LoadFailed(message) => {
                self.loading = false;
                self.orders.clear();
                self.toast = Some(Toast::error(format!("Failed to load orders: {}", message)));
                Vec::new()
            }
            MyOrdersEvent::OpenDetail(order_id) => {
                let Some(order) = self.orders.iter().find(|o| o.order_id == order_id).cloned() else {
                    self.detail = None;
                    self.toast = Some(Toast::error(format!("Order {} not found", order_id)));
                    return Vec::new();
                };
                self.detail = Some(DetailPanel::new(order));
                vec![MyOrdersEffect::FetchThread { order_id }]
            }
            MyOrdersEvent::CloseDetail => {
                self.detail = None;
                Vec::new()
            }
            MyOrdersEvent::ThreadLoaded { order_id, result } => {
                let Some(detail) = self.detail.as_mut().filter(|d| d.order.order_id == order_id) else {
                    debug!("Dropping thread for {} (panel moved on)", order_id);
                    return Vec::new();
                };
                detail.thread_loading = false;
                match result {
                    Ok(messages) => {
                        detail.messages = messages;
                        detail.thread_error = None;
                    }
                    Err(message) => detail.thread_error = Some(message),
                }
                Vec::new()
            }
            MyOrdersEvent::SendMessage(message) => {
                let Some(detail) = &self.detail else {
                    self.toast = Some(Toast::error("No order selected"));
                    return Vec::new();
                };
                if detail.order.is_terminal() {
                    self.toast = Some(Toast::error(format!(
                        "Cannot send messages - order is {}",
                        detail.order.status
                    )));
                    return Vec::new();
                }
                let message = message.trim();
                if message.is_empty() {
                    self.toast = Some(Toast::error("Please enter a message"));
                    return Vec::new();
                }
                vec![MyOrdersEffect::SendMessage {
                    order_id: detail.order.order_id.clone(),
                    message: message.to_string(),
                }]
            }
            MyOrdersEvent::MessageSent { order_id } => {
                self.toast = Some(Toast::success("Message sent successfully"));
                vec![MyOrdersEffect::FetchThread { order_id }]
            }
            MyOrdersEvent::SendFailed(message) => {
                self.toast = Some(Toast::error(format!("Failed to send message: {}", message)));
                Vec::new()
            }
        }
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.user_bucket() == UserBucket::Active)
    }

    pub fn completed_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.user_bucket() == UserBucket::Completed)
    }

    pub fn is_empty(&self) -> bool {
        !self.loading && self.orders.is_empty()
    }

    /// Flash semantics: a toast renders once
    pub fn take_toast(&mut self) -> Option<Toast> {
        self.toast.take()
    }
}

/// Runs effects against the bot API and feeds results back into the state
pub struct MyOrdersDriver {
    bot: SharedBotBackend,
}

impl MyOrdersDriver {
    pub fn new(bot: SharedBotBackend) -> Self {
        Self { bot }
    }

    pub async fn dispatch(&self, state: &mut MyOrdersState, event: MyOrdersEvent) {
        let mut queue: VecDeque<MyOrdersEffect> = state.update(event).into();
        while let Some(effect) = queue.pop_front() {
            let follow_up = self.execute(effect).await;
            queue.extend(state.update(follow_up));
        }
    }

    async fn execute(&self, effect: MyOrdersEffect) -> MyOrdersEvent {
        match effect {
            MyOrdersEffect::FetchOrders { discord_id } => {
                match self.bot.get_user_orders(&discord_id).await {
                    Ok(orders) => MyOrdersEvent::OrdersLoaded(orders),
                    Err(e) => {
                        warn!("Failed to load orders for {}: {}", discord_id, e);
                        MyOrdersEvent::LoadFailed(e.to_string())
                    }
                }
            }
            MyOrdersEffect::FetchThread { order_id } => {
                let result = self
                    .bot
                    .get_thread_messages(&order_id)
                    .await
                    .map_err(|e| e.to_string());
                MyOrdersEvent::ThreadLoaded { order_id, result }
            }
            MyOrdersEffect::SendMessage { order_id, message } => {
                match self.bot.send_message(&order_id, &message, false).await {
                    Ok(()) => MyOrdersEvent::MessageSent { order_id },
                    Err(e) => {
                        warn!("Failed to send message on {}: {}", order_id, e);
                        MyOrdersEvent::SendFailed(e.to_string())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BotBackend, SheetBackend, SubmitRequest};
    use crate::models::LineItem;
    use crate::sheet::{LocalSheet, SheetData};
    use std::sync::Arc;

    fn alice() -> UserIdentity {
        UserIdentity {
            discord_id: "1001".to_string(),
            discord_username: "Alice".to_string(),
            ..Default::default()
        }
    }

    fn order(id: &str, status: &str) -> Order {
        Order {
            order_id: id.to_string(),
            status: OrderStatus::parse(status),
            ..Default::default()
        }
    }

    async fn sheet_with_orders() -> (Arc<LocalSheet>, Vec<String>) {
        let sheet = Arc::new(LocalSheet::in_memory(SheetData::sample()));
        let mut ids = Vec::new();
        for (user, id) in [("Alice", "1001"), ("Alice", "1001"), ("Bob", "2002")] {
            let receipt = sheet
                .submit_request(&SubmitRequest {
                    timestamp: String::new(),
                    date: "2025-01-01T00:00:00Z".to_string(),
                    discord_username: user.to_string(),
                    discord_id: Some(id.to_string()),
                    items: vec![LineItem::new("P4-AR", 1)],
                    availability: String::new(),
                    notes: String::new(),
                })
                .await
                .unwrap();
            ids.push(receipt.order_id);
        }
        (sheet, ids)
    }

    #[test]
    fn test_load_requires_identity() {
        let mut state = MyOrdersState::new(None);
        assert!(state.update(MyOrdersEvent::Load).is_empty());
        assert!(state.take_toast().is_some());
        assert!(state.take_toast().is_none());

        let mut state = MyOrdersState::new(Some(alice()));
        assert_eq!(
            state.update(MyOrdersEvent::Load),
            vec![MyOrdersEffect::FetchOrders {
                discord_id: "1001".to_string()
            }]
        );
        assert!(state.loading);
    }

    #[test]
    fn test_partition_active_and_completed() {
        let mut state = MyOrdersState::new(Some(alice()));
        state.update(MyOrdersEvent::OrdersLoaded(vec![
            order("MRS-1", "Received"),
            order("MRS-2", "Pending Collection"),
            order("MRS-3", "Completed"),
            order("MRS-4", "cancelled"),
        ]));
        assert_eq!(state.active_orders().count(), 2);
        assert_eq!(state.completed_orders().count(), 2);
        assert!(!state.is_empty());
    }

    #[test]
    fn test_terminal_order_never_sends() {
        for status in ["Completed", "Cancelled", "COMPLETED"] {
            let mut state = MyOrdersState::new(Some(alice()));
            state.update(MyOrdersEvent::OrdersLoaded(vec![order("MRS-1", status)]));
            state.update(MyOrdersEvent::OpenDetail("MRS-1".to_string()));

            let composer = state.detail.as_ref().unwrap().composer();
            assert!(!composer.enabled);
            assert!(composer.placeholder.contains("Messaging is disabled"));

            assert!(state.update(MyOrdersEvent::SendMessage("hi".to_string())).is_empty());
            assert!(state.take_toast().unwrap().message.starts_with("Cannot send messages"));
        }
    }

    #[test]
    fn test_send_requires_text_and_selection() {
        let mut state = MyOrdersState::new(Some(alice()));
        assert!(state.update(MyOrdersEvent::SendMessage("hi".to_string())).is_empty());
        assert_eq!(state.take_toast().unwrap().message, "No order selected");

        state.update(MyOrdersEvent::OrdersLoaded(vec![order("MRS-1", "Received")]));
        state.update(MyOrdersEvent::OpenDetail("MRS-1".to_string()));
        assert!(state.update(MyOrdersEvent::SendMessage("   ".to_string())).is_empty());
        assert_eq!(state.take_toast().unwrap().message, "Please enter a message");
        assert!(state.detail.as_ref().unwrap().composer().enabled);
    }

    #[test]
    fn test_stale_thread_is_dropped() {
        let mut state = MyOrdersState::new(Some(alice()));
        state.update(MyOrdersEvent::OrdersLoaded(vec![order("MRS-1", "Received")]));
        state.update(MyOrdersEvent::OpenDetail("MRS-1".to_string()));
        state.update(MyOrdersEvent::ThreadLoaded {
            order_id: "MRS-9".to_string(),
            result: Ok(Vec::new()),
        });
        assert!(state.detail.as_ref().unwrap().thread_loading);
    }

    #[tokio::test]
    async fn test_driver_loads_and_messages() {
        let (sheet, ids) = sheet_with_orders().await;
        let driver = MyOrdersDriver::new(sheet.clone());
        let mut state = MyOrdersState::new(Some(alice()));

        driver.dispatch(&mut state, MyOrdersEvent::Load).await;
        assert_eq!(state.orders.len(), 2);
        assert!(!state.loading);

        driver
            .dispatch(&mut state, MyOrdersEvent::OpenDetail(ids[0].clone()))
            .await;
        let before = state.detail.as_ref().unwrap().messages.len();

        driver
            .dispatch(&mut state, MyOrdersEvent::SendMessage("Ready soon?".to_string()))
            .await;
        let detail = state.detail.as_ref().unwrap();
        assert_eq!(detail.messages.len(), before + 1);
        assert_eq!(detail.messages.last().unwrap().content, "Ready soon?");
        assert_eq!(state.take_toast().unwrap().message, "Message sent successfully");

        // Orders of other requesters are not reachable
        driver
            .dispatch(&mut state, MyOrdersEvent::OpenDetail(ids[2].clone()))
            .await;
        assert!(state.detail.is_none());

        sheet.update_status(&ids[1], &OrderStatus::Cancelled).await.unwrap();
        driver.dispatch(&mut state, MyOrdersEvent::Load).await;
        assert_eq!(state.completed_orders().count(), 1);
    }
}
