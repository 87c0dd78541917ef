//! Contracts for the two external collaborators: the spreadsheet-backed
//! function and the bot API. Discord sign-in lives alongside them.

mod discord;
mod envelope;
mod http;

pub use discord::DiscordOAuth;
pub use http::{HttpBotClient, HttpSheetClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Inventory, KitInfo, LineItem, Order, OrderStatus, RoleRefresh, ThreadMessage};

/// Parameters of `submitRequest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub timestamp: String,
    pub date: String,
    pub discord_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_id: Option<String>,
    pub items: Vec<LineItem>,
    pub availability: String,
    pub notes: String,
}

impl SubmitRequest {
    /// Items as the JSON string the sheet function expects
    pub fn items_json(&self) -> String {
        serde_json::to_string(&self.items).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Result of `submitRequest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub order_id: String,
    pub status: OrderStatus,
}

/// Unit market prices keyed by item name
pub type PriceTable = HashMap<String, f64>;

/// Spreadsheet-backed function (inventory, request submission, kit lookup)
#[async_trait]
pub trait SheetBackend: Send + Sync {
    async fn get_inventory(&self) -> Result<Inventory>;

    async fn submit_request(&self, request: &SubmitRequest) -> Result<SubmitReceipt>;

    async fn get_kit_info(&self, kit_name: &str) -> Result<KitInfo>;

    async fn check_academy_access(&self, discord_username: &str) -> Result<bool>;

    async fn get_price_table(&self) -> Result<PriceTable>;
}

/// Bot API (order lifecycle, Discord threads, role refresh)
#[async_trait]
pub trait BotBackend: Send + Sync {
    async fn get_orders(&self) -> Result<Vec<Order>>;

    async fn get_user_orders(&self, discord_user_id: &str) -> Result<Vec<Order>>;

    async fn claim_order(&self, order_id: &str, logistician: &str) -> Result<()>;

    async fn release_order(&self, order_id: &str) -> Result<()>;

    async fn update_status(&self, order_id: &str, status: &OrderStatus) -> Result<()>;

    async fn get_thread_messages(&self, order_id: &str) -> Result<Vec<ThreadMessage>>;

    async fn send_message(&self, order_id: &str, message: &str, is_staff: bool) -> Result<()>;

    async fn refresh_user(&self, discord_id: &str) -> Result<RoleRefresh>;
}

pub type SharedSheetBackend = Arc<dyn SheetBackend>;
pub type SharedBotBackend = Arc<dyn BotBackend>;
