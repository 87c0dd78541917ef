use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::models::pricing::stipend_for;
use crate::models::{
    InventoryRow, LookupRow, Order, OrderStatus, OrderType, RoleRefresh, StockLevel, ThreadMessage,
    Tracking,
};

/// Orders tab row (columns A..M; the stipend column is derived on read)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub order_id: String,
    pub timestamp: String,
    pub date: String,
    pub requester: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,
    pub items: String,
    pub item_count: u32,
    pub order_type: OrderType,
    pub cost: f64,
    #[serde(default)]
    pub logistician: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub notes: String,
}

/// Order Tracking tab row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRow {
    pub order_id: String,
    #[serde(default)]
    pub logistician: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub placed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion: Option<DateTime<Utc>>,
}

impl TrackingRow {
    pub fn to_tracking(&self) -> Tracking {
        Tracking {
            placed_timestamp: self.placed.map(|t| t.to_rfc3339()),
            claimed_timestamp: self.claimed.map(|t| t.to_rfc3339()),
            processing_timestamp: self.processing.map(|t| t.to_rfc3339()),
            completion_timestamp: self.completion.map(|t| t.to_rfc3339()),
        }
    }
}

/// Whole spreadsheet contents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetData {
    /// Schema version for migrations
    pub version: u32,
    #[serde(default)]
    pub inventory: Vec<InventoryRow>,
    /// Lookup tab columns E:F
    #[serde(default)]
    pub lookup: Vec<LookupRow>,
    /// Lookup stipend cell
    #[serde(default)]
    pub stipend_value: f64,
    #[serde(default)]
    pub orders: Vec<OrderRow>,
    #[serde(default)]
    pub tracking: Vec<TrackingRow>,
    #[serde(default)]
    pub threads: HashMap<String, Vec<ThreadMessage>>,
    /// Role data served by `/auth/refresh`, keyed by Discord id
    #[serde(default)]
    pub members: HashMap<String, RoleRefresh>,
}

impl Default for SheetData {
    fn default() -> Self {
        Self {
            version: 1,
            inventory: Vec::new(),
            lookup: Vec::new(),
            stipend_value: 0.0,
            orders: Vec::new(),
            tracking: Vec::new(),
            threads: HashMap::new(),
            members: HashMap::new(),
        }
    }
}

impl SheetData {
    pub fn find_order(&self, order_id: &str) -> Option<&OrderRow> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    pub fn find_order_mut(&mut self, order_id: &str) -> Option<&mut OrderRow> {
        self.orders.iter_mut().find(|o| o.order_id == order_id)
    }

    pub fn find_tracking(&self, order_id: &str) -> Option<&TrackingRow> {
        self.tracking.iter().find(|t| t.order_id == order_id)
    }

    /// Tracking row for an order, appended when missing
    pub fn tracking_row_mut(&mut self, order_id: &str) -> &mut TrackingRow {
        let index = match self.tracking.iter().position(|t| t.order_id == order_id) {
            Some(index) => index,
            None => {
                self.tracking.push(TrackingRow {
                    order_id: order_id.to_string(),
                    ..Default::default()
                });
                self.tracking.len() - 1
            }
        };
        &mut self.tracking[index]
    }

    pub fn price_of(&self, name: &str) -> Option<f64> {
        self.inventory
            .iter()
            .find(|row| row.name == name)
            .map(InventoryRow::unit_price)
    }

    /// Order as the bot API reports it, with the lazily derived stipend
    pub fn order_view(&self, row: &OrderRow) -> Order {
        Order {
            order_id: row.order_id.clone(),
            timestamp: row.timestamp.clone(),
            date: row.date.clone(),
            requester: row.requester.clone(),
            requester_id: row.requester_id.clone(),
            items: row.items.clone(),
            item_count: row.item_count,
            stipend: Some(stipend_for(&row.items, self.stipend_value)),
            cost: Some(row.cost),
            order_type: Some(row.order_type),
            logistician: Some(row.logistician.clone()).filter(|l| !l.is_empty()),
            status: row.status.clone(),
            availability: row.availability.clone(),
            notes: row.notes.clone(),
            tracking: self.find_tracking(&row.order_id).map(TrackingRow::to_tracking),
        }
    }

    /// Demo catalog used when no sheet file exists yet
    pub fn sample() -> Self {
        let listed = |name: &str, category: &str, price: f64| InventoryRow {
            listing: json!(true),
            restriction: "None".to_string(),
            name: name.to_string(),
            category: category.to_string(),
            stock: StockLevel::Text("X".to_string()),
            image: String::new(),
            market_price: Some(price),
            required_missions: None,
        };

        let mut academy_kit = listed("Academy Supply / Lesson 0", "Training Kits", 0.0);
        academy_kit.restriction = "Academy".to_string();

        let inventory = vec![
            listed("Rookie Kit", "Training Kits", 0.0),
            academy_kit,
            listed("ADP Legs White", "Armor Components", 1850.0),
            listed("Balor HCH Helmet White", "Armor Components", 2100.0),
            listed("ADP Arms White", "Armor Components", 1600.0),
            listed("ADP Core Red", "Armor Components", 3400.0),
            listed("MacFlex Backpack White", "Equipment", 1200.0),
            listed("P4-AR", "Weapons", 2900.0),
            listed("S-38 Handgun", "Weapons", 800.0),
            listed("BR-2 Shotgun", "Weapons", 3100.0),
        ];

        let lookup = [
            ("Rookie Kit", ""),
            ("Items", "Qty"),
            ("Armor", ""),
            ("Balor HCH Helmet White", "3"),
            ("ADP Core Red", "3"),
            ("ADP Arms White", "3"),
            ("ADP Legs White", "3"),
            ("Equipment", ""),
            ("MacFlex Backpack White", "3"),
            ("Beacon Undersuit", "3"),
            ("Weapons", ""),
            ("P4-AR Rifle", "3"),
            ("-", ""),
        ]
        .into_iter()
        .map(|(name, quantity)| LookupRow::new(name, quantity))
        .collect();

        Self {
            inventory,
            lookup,
            stipend_value: 15000.0,
            ..Default::default()
        }
    }
}
