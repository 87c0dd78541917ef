//! In-process spreadsheet backend.
//!
//! Mirrors the remote sheet function and the bot API over a JSON file so the
//! portal can run without either deployment. Tracking timestamps follow the
//! sheet rules: each milestone is stamped on its first transition only.

mod data;

pub use data::SheetData;
use data::OrderRow;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::backend::{BotBackend, PriceTable, SheetBackend, SubmitReceipt, SubmitRequest};
use crate::error::{PortalError, Result};
use crate::models::pricing::{classify_order_type, item_summary, total_cost, total_quantity};
use crate::models::{
    listed_inventory, Embed, Inventory, KitInfo, Order, OrderStatus, RoleRefresh, ThreadMessage,
};

pub const ORDER_ID_PREFIX: &str = "MRS-";
const BOT_AUTHOR: &str = "Medrunner Logistics";
const STAFF_AUTHOR: &str = "Logistics Staff";

/// Spreadsheet held in memory, optionally persisted to a JSON file
pub struct LocalSheet {
    path: Option<PathBuf>,
    data: RwLock<SheetData>,
    /// Held across snapshot, write and rename so saves never share the temp file
    save_lock: tokio::sync::Mutex<()>,
}

impl LocalSheet {
    /// In-memory sheet that is never written to disk
    pub fn in_memory(data: SheetData) -> Self {
        Self {
            path: None,
            data: RwLock::new(data),
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load from a JSON file; a missing file starts from `seed`
    pub async fn load(path: impl AsRef<Path>, seed: SheetData) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| PortalError::StateParse {
                path: path.display().to_string(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No sheet at {}, starting from seed data", path.display());
                seed
            }
            Err(e) => {
                return Err(PortalError::StateLoad {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
            save_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Read a seed file for `--seed`
    pub async fn read_seed(path: impl AsRef<Path>) -> Result<SheetData> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PortalError::StateLoad {
                path: path.display().to_string(),
                source: e,
            })?;
        serde_json::from_str(&content).map_err(|e| PortalError::StateParse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Save atomically (temp file, then rename)
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.save_lock.lock().await;
        let content = serde_json::to_string_pretty(&*self.data.read())?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| PortalError::StateSave {
                path: path.display().to_string(),
                source: e,
            })?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| PortalError::StateSave {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(())
    }

    /// Snapshot of the current contents
    pub fn snapshot(&self) -> SheetData {
        self.data.read().clone()
    }

    fn append_bot_message(data: &mut SheetData, order_id: &str, title: &str, description: String, now: DateTime<Utc>) {
        data.threads
            .entry(order_id.to_string())
            .or_default()
            .push(ThreadMessage {
                author: BOT_AUTHOR.to_string(),
                author_id: String::new(),
                is_bot: true,
                content: String::new(),
                embeds: vec![Embed {
                    title: Some(title.to_string()),
                    description: Some(description),
                }],
                timestamp: now.to_rfc3339(),
            });
    }
}

/// `MRS-` plus a random nine-digit number not already used by `taken`
fn generate_order_id<F>(taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut rng = rand::rng();
    loop {
        let candidate = format!(
            "{}{}",
            ORDER_ID_PREFIX,
            rng.random_range(100_000_000u32..=999_999_999)
        );
        if !taken(&candidate) {
            return candidate;
        }
        debug!("Order id {} already in use, drawing again", candidate);
    }
}

#[async_trait]
impl SheetBackend for LocalSheet {
    async fn get_inventory(&self) -> Result<Inventory> {
        Ok(listed_inventory(&self.data.read().inventory))
    }

    async fn submit_request(&self, request: &SubmitRequest) -> Result<SubmitReceipt> {
        if request.discord_username.trim().is_empty() || request.items.is_empty() {
            return Err(PortalError::backend("Failed to submit request: Missing required fields"));
        }

        let now = Utc::now();
        let order_id = {
            let mut data = self.data.write();
            let order_id = generate_order_id(|id| data.find_order(id).is_some());

            let cost = total_cost(&request.items, |name| data.price_of(name));
            let row = OrderRow {
                order_id: order_id.clone(),
                timestamp: request.timestamp.clone(),
                date: request.date.clone(),
                requester: request.discord_username.trim().to_string(),
                requester_id: request.discord_id.clone(),
                items: item_summary(&request.items),
                item_count: total_quantity(&request.items),
                order_type: classify_order_type(request.items.iter().map(|i| i.name.as_str())),
                cost,
                logistician: String::new(),
                status: OrderStatus::Received,
                availability: request.availability.clone(),
                notes: request.notes.clone(),
            };
            data.orders.push(row);

            let tracking = data.tracking_row_mut(&order_id);
            tracking.status = OrderStatus::Received.as_str().to_string();
            tracking.placed = Some(now);

            Self::append_bot_message(
                &mut data,
                &order_id,
                "Order Received",
                format!("Order {} has been received by logistics.", order_id),
                now,
            );
            order_id
        };

        info!("Order {} submitted by {}", order_id, request.discord_username);
        self.save().await?;

        Ok(SubmitReceipt {
            order_id,
            status: OrderStatus::Received,
        })
    }

    async fn get_kit_info(&self, kit_name: &str) -> Result<KitInfo> {
        if kit_name.trim().is_empty() {
            return Err(PortalError::backend("Kit name is required"));
        }
        KitInfo::from_lookup_rows(kit_name, &self.data.read().lookup)
            .ok_or_else(|| PortalError::backend("Kit information not found"))
    }

    async fn check_academy_access(&self, _discord_username: &str) -> Result<bool> {
        Ok(true)
    }

    async fn get_price_table(&self) -> Result<PriceTable> {
        Ok(self
            .data
            .read()
            .inventory
            .iter()
            .filter(|row| !row.name.trim().is_empty())
            .map(|row| (row.name.clone(), row.unit_price()))
            .collect())
    }
}

#[async_trait]
impl BotBackend for LocalSheet {
    async fn get_orders(&self) -> Result<Vec<Order>> {
        let data = self.data.read();
        Ok(data.orders.iter().map(|row| data.order_view(row)).collect())
    }

    async fn get_user_orders(&self, discord_user_id: &str) -> Result<Vec<Order>> {
        let data = self.data.read();
        Ok(data
            .orders
            .iter()
            .filter(|row| row.requester_id.as_deref() == Some(discord_user_id))
            .map(|row| data.order_view(row))
            .collect())
    }

    async fn claim_order(&self, order_id: &str, logistician: &str) -> Result<()> {
        let logistician = logistician.trim();
        if logistician.is_empty() {
            return Err(PortalError::backend("Logistician is required"));
        }

        {
            let mut data = self.data.write();
            let row = data.find_order_mut(order_id).ok_or_else(|| PortalError::NotFound {
                what: "Order".to_string(),
                id: order_id.to_string(),
            })?;
            if row.status.is_terminal() {
                return Err(PortalError::backend(format!(
                    "Order {} is {} and cannot be claimed",
                    order_id, row.status
                )));
            }
            row.logistician = logistician.to_string();

            let now = Utc::now();
            let tracking = data.tracking_row_mut(order_id);
            let previously_unassigned = tracking.logistician.is_empty();
            tracking.logistician = logistician.to_string();
            if previously_unassigned && tracking.claimed.is_none() {
                tracking.claimed = Some(now);
            }

            Self::append_bot_message(
                &mut data,
                order_id,
                "Order Claimed",
                format!("{} is now handling this order.", logistician),
                now,
            );
        }

        info!("Order {} claimed by {}", order_id, logistician);
        self.save().await
    }

    async fn release_order(&self, order_id: &str) -> Result<()> {
        {
            let mut data = self.data.write();
            let row = data.find_order_mut(order_id).ok_or_else(|| PortalError::NotFound {
                what: "Order".to_string(),
                id: order_id.to_string(),
            })?;
            row.logistician.clear();
            data.tracking_row_mut(order_id).logistician.clear();
        }

        info!("Order {} released", order_id);
        self.save().await
    }

    async fn update_status(&self, order_id: &str, status: &OrderStatus) -> Result<()> {
        if let OrderStatus::Other(raw) = status {
            return Err(PortalError::backend(format!("Unknown status '{}'", raw)));
        }

        {
            let mut data = self.data.write();
            let row = data.find_order_mut(order_id).ok_or_else(|| PortalError::NotFound {
                what: "Order".to_string(),
                id: order_id.to_string(),
            })?;
            if row.status.is_terminal() && row.status != *status {
                return Err(PortalError::backend(format!(
                    "Order {} is already {}",
                    order_id, row.status
                )));
            }
            row.status = status.clone();

            let now = Utc::now();
            let tracking = data.tracking_row_mut(order_id);
            tracking.status = status.as_str().to_string();
            match status {
                OrderStatus::PendingCollection => {
                    tracking.processing.get_or_insert(now);
                }
                OrderStatus::Completed | OrderStatus::Cancelled => {
                    tracking.completion.get_or_insert(now);
                }
                _ => {}
            }

            Self::append_bot_message(
                &mut data,
                order_id,
                "Status Update",
                format!("Order status changed to {}.", status.display_name()),
                now,
            );
        }

        info!("Order {} status set to {}", order_id, status);
        self.save().await
    }

    async fn get_thread_messages(&self, order_id: &str) -> Result<Vec<ThreadMessage>> {
        Ok(self
            .data
            .read()
            .threads
            .get(order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, order_id: &str, message: &str, is_staff: bool) -> Result<()> {
        if message.trim().is_empty() {
            return Err(PortalError::backend("Message is empty"));
        }

        {
            let mut data = self.data.write();
            let row = data.find_order(order_id).ok_or_else(|| PortalError::NotFound {
                what: "Order".to_string(),
                id: order_id.to_string(),
            })?;
            if row.status.is_terminal() {
                return Err(PortalError::backend(format!(
                    "Order {} is {}. Messaging is disabled.",
                    order_id, row.status
                )));
            }

            let (author, author_id) = if is_staff {
                let name = if row.logistician.is_empty() {
                    STAFF_AUTHOR.to_string()
                } else {
                    row.logistician.clone()
                };
                (name, String::new())
            } else {
                (row.requester.clone(), row.requester_id.clone().unwrap_or_default())
            };

            data.threads
                .entry(order_id.to_string())
                .or_default()
                .push(ThreadMessage {
                    author,
                    author_id,
                    is_bot: false,
                    content: message.trim().to_string(),
                    embeds: Vec::new(),
                    timestamp: Utc::now().to_rfc3339(),
                });
        }

        self.save().await
    }

    async fn refresh_user(&self, discord_id: &str) -> Result<RoleRefresh> {
        self.data
            .read()
            .members
            .get(discord_id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound {
                what: "Member".to_string(),
                id: discord_id.to_string(),
            })
    }
}
