//! reqwest clients for the remote sheet function and bot API

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::envelope::{decode, Envelope};
use super::{BotBackend, PriceTable, SheetBackend, SubmitReceipt, SubmitRequest};
use crate::error::Result;
use crate::models::{Inventory, KitInfo, Order, OrderStatus, RoleRefresh, ThreadMessage};

/// Inventory payload of `getInventory`
#[derive(serde::Deserialize)]
struct InventoryData {
    inventory: Inventory,
}

/// Payload of `checkAcademyAccess`
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessData {
    has_access: bool,
}

/// Client for the Apps Script deployment; the action is a query parameter
#[derive(Clone)]
pub struct HttpSheetClient {
    url: String,
    http_client: reqwest::Client,
}

impl HttpSheetClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_client: reqwest::Client::new(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, action: &str, params: &[(&str, &str)]) -> Result<Envelope<T>> {
        debug!("Sheet request: {}", action);
        let mut query = vec![("action", action)];
        query.extend_from_slice(params);

        let body = self
            .http_client
            .get(&self.url)
            .query(&query)
            .send()
            .await?
            .text()
            .await?;

        decode(action, &body)
    }

    async fn post_form<T: DeserializeOwned>(&self, action: &str, params: &[(&str, &str)]) -> Result<Envelope<T>> {
        debug!("Sheet request: {}", action);
        let body = self
            .http_client
            .post(&self.url)
            .query(&[("action", action)])
            .form(params)
            .send()
            .await?
            .text()
            .await?;

        decode(action, &body)
    }
}

#[async_trait]
impl SheetBackend for HttpSheetClient {
    async fn get_inventory(&self) -> Result<Inventory> {
        let data: InventoryData = self.get("getInventory", &[]).await?.into_data("getInventory")?;
        Ok(data.inventory)
    }

    async fn submit_request(&self, request: &SubmitRequest) -> Result<SubmitReceipt> {
        let items = request.items_json();
        let mut params = vec![
            ("timestamp", request.timestamp.as_str()),
            ("date", request.date.as_str()),
            ("discordUsername", request.discord_username.as_str()),
            ("items", items.as_str()),
            ("availability", request.availability.as_str()),
            ("notes", request.notes.as_str()),
        ];
        if let Some(id) = request.discord_id.as_deref() {
            params.push(("discordId", id));
        }

        self.post_form("submitRequest", &params)
            .await?
            .into_data("submitRequest")
    }

    async fn get_kit_info(&self, kit_name: &str) -> Result<KitInfo> {
        self.get("getKitInfo", &[("kitName", kit_name)])
            .await?
            .into_data("getKitInfo")
    }

    async fn check_academy_access(&self, discord_username: &str) -> Result<bool> {
        let data: AccessData = self
            .get("checkAcademyAccess", &[("discordUsername", discord_username)])
            .await?
            .into_data("checkAcademyAccess")?;
        Ok(data.has_access)
    }

    async fn get_price_table(&self) -> Result<PriceTable> {
        // The deployment exposes prices only through the inventory listing
        let inventory = self.get_inventory().await?;
        Ok(inventory
            .into_values()
            .filter_map(|item| item.market_price.map(|price| (item.name, price)))
            .collect())
    }
}

/// Client for the bot API; every call is a JSON POST to the base URL
#[derive(Clone)]
pub struct HttpBotClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpBotClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, mut body: Value) -> Result<Envelope<T>> {
        debug!("Bot API request: {}", action);
        if let Some(obj) = body.as_object_mut() {
            obj.insert("action".to_string(), Value::String(action.to_string()));
        }

        let response = self
            .http_client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Bot API unreachable for {}: {}", action, e);
                e
            })?;

        let text = response.text().await?;
        decode(action, &text)
    }
}

#[async_trait]
impl BotBackend for HttpBotClient {
    async fn get_orders(&self) -> Result<Vec<Order>> {
        let env: Envelope<Vec<Order>> = self.call("getOrders", json!({})).await?;
        // A successful response without data means there are no orders
        if env.success && env.data.is_none() {
            return Ok(Vec::new());
        }
        env.into_data("getOrders")
    }

    async fn get_user_orders(&self, discord_user_id: &str) -> Result<Vec<Order>> {
        self.call("getUserOrders", json!({ "discordUserId": discord_user_id }))
            .await?
            .into_data("getUserOrders")
    }

    async fn claim_order(&self, order_id: &str, logistician: &str) -> Result<()> {
        self.call::<Value>("claimOrder", json!({ "orderId": order_id, "logistician": logistician }))
            .await?
            .into_unit("claimOrder")
    }

    async fn release_order(&self, order_id: &str) -> Result<()> {
        self.call::<Value>("releaseOrder", json!({ "orderId": order_id }))
            .await?
            .into_unit("releaseOrder")
    }

    async fn update_status(&self, order_id: &str, status: &OrderStatus) -> Result<()> {
        self.call::<Value>("updateStatus", json!({ "orderId": order_id, "status": status.as_str() }))
            .await?
            .into_unit("updateStatus")
    }

    async fn get_thread_messages(&self, order_id: &str) -> Result<Vec<ThreadMessage>> {
        let env: Envelope<Vec<ThreadMessage>> =
            self.call("getThreadMessages", json!({ "orderId": order_id })).await?;
        if env.success && env.data.is_none() {
            return Ok(Vec::new());
        }
        env.into_data("getThreadMessages")
    }

    async fn send_message(&self, order_id: &str, message: &str, is_staff: bool) -> Result<()> {
        self.call::<Value>(
            "sendMessage",
            json!({ "orderId": order_id, "message": message, "isStaff": is_staff }),
        )
        .await?
        .into_unit("sendMessage")
    }

    async fn refresh_user(&self, discord_id: &str) -> Result<RoleRefresh> {
        let url = format!("{}/auth/refresh", self.base_url);
        let text = self
            .http_client
            .get(&url)
            .query(&[("discordId", discord_id)])
            .send()
            .await?
            .text()
            .await?;

        decode::<RoleRefresh>("refreshUser", &text)?.into_data("refreshUser")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_payload_shape() {
        let env: Envelope<InventoryData> = decode(
            "getInventory",
            r#"{"success":true,"message":"Inventory loaded successfully","data":{"inventory":{
                "P4-AR":{"name":"P4-AR","category":"Weapons","stock":4,"restriction":"None","available":true,
                          "image":"p4.png","marketPrice":1200,"requiredMissions":"","isAcademyRestricted":false}}}}"#,
        )
        .unwrap();
        let inventory = env.into_data("getInventory").unwrap().inventory;
        assert_eq!(inventory["P4-AR"].market_price, Some(1200.0));
    }
}
