//! Catalog browsing and request submission

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use std::collections::BTreeMap;

use crate::backend::{PriceTable, SubmitRequest};
use crate::error::{PortalError, Result};
use crate::models::pricing::{classify_order_type, total_cost, total_quantity};
use crate::models::{Inventory, InventoryItem, LineItem, OrderType, UserIdentity};

/// Form field prefix carrying a per-item quantity, e.g. `qty:P4-AR=2`
pub const QUANTITY_FIELD_PREFIX: &str = "qty:";

/// Items picked for the next request, in the order they were added
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<LineItem>,
}

impl Cart {
    /// Add to an existing line or append a new one
    pub fn add(&mut self, name: &str, quantity: u32) {
        let name = name.trim();
        if name.is_empty() || quantity == 0 {
            return;
        }
        match self.lines.iter_mut().find(|line| line.name == name) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(LineItem::new(name, quantity)),
        }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_quantity(&self) -> u32 {
        total_quantity(&self.lines)
    }
}

/// Listed items grouped by category
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    pub categories: Vec<(String, Vec<InventoryItem>)>,
}

impl CatalogView {
    pub fn from_inventory(inventory: &Inventory) -> Self {
        let mut grouped: BTreeMap<String, Vec<InventoryItem>> = BTreeMap::new();
        for item in inventory.values().filter(|item| item.available) {
            grouped.entry(item.category.clone()).or_default().push(item.clone());
        }
        Self {
            categories: grouped.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|(_, items)| items.len()).sum()
    }
}

/// A request as entered, before anything is sent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestForm {
    pub requester: String,
    pub discord_id: Option<String>,
    pub cart: Cart,
    pub availability: String,
    pub notes: String,
}

impl RequestForm {
    /// Build from posted form fields; the requester comes from the session identity
    pub fn from_fields(fields: &[(String, String)], user: Option<&UserIdentity>) -> Result<Self> {
        let mut form = RequestForm {
            requester: user.map(|u| u.discord_username.clone()).unwrap_or_default(),
            discord_id: user.map(|u| u.discord_id.clone()).filter(|id| !id.is_empty()),
            ..Default::default()
        };

        let mut slot = SlotFields::default();
        for (key, value) in fields {
            if let Some(name) = key.strip_prefix(QUANTITY_FIELD_PREFIX) {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                let quantity: u32 = value.parse().map_err(|_| {
                    PortalError::precondition(format!("Invalid quantity for {}", name))
                })?;
                form.cart.add(name, quantity);
                continue;
            }
            match key.as_str() {
                "availability" => form.availability = value.trim().to_string(),
                "notes" => form.notes = value.trim().to_string(),
                "available_date" => slot.date = value.trim().to_string(),
                "available_from" => slot.from = value.trim().to_string(),
                "available_to" => slot.to = value.trim().to_string(),
                "all_day" => slot.all_day = !value.is_empty(),
                _ => {}
            }
        }

        if form.availability.is_empty() && !slot.date.is_empty() {
            form.availability = slot.to_range(&chrono::Utc)?;
        }
        Ok(form)
    }

    /// Checks that run before any network call
    pub fn validate(&self) -> Result<()> {
        if self.requester.trim().is_empty() {
            return Err(PortalError::precondition(
                "Please sign in with Discord before submitting a request",
            ));
        }
        if self.cart.is_empty() {
            return Err(PortalError::precondition("Please add at least one item to your request"));
        }
        if self.cart.items().iter().any(|item| item.quantity == 0) {
            return Err(PortalError::precondition("Quantities must be at least 1"));
        }
        Ok(())
    }

    pub fn order_type(&self) -> OrderType {
        classify_order_type(self.cart.items().iter().map(|item| item.name.as_str()))
    }

    /// Cost estimate shown on submission; the sheet recomputes the stored figure
    pub fn estimate_cost(&self, prices: &PriceTable) -> f64 {
        total_cost(self.cart.items(), |name| prices.get(name).copied())
    }

    /// Validate and package the request with timestamps taken from `now`
    pub fn build_submission<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<SubmitRequest>
    where
        Tz::Offset: std::fmt::Display,
    {
        self.validate()?;
        Ok(SubmitRequest {
            timestamp: now.format("%m/%d/%Y, %H:%M:%S").to_string(),
            date: now.to_rfc3339(),
            discord_username: self.requester.trim().to_string(),
            discord_id: self.discord_id.clone(),
            items: self.cart.items().to_vec(),
            availability: self.availability.clone(),
            notes: self.notes.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct SlotFields {
    date: String,
    from: String,
    to: String,
    all_day: bool,
}

impl SlotFields {
    /// One `from-to` unix-seconds range from the date and time inputs
    fn to_range<Tz: TimeZone>(&self, tz: &Tz) -> Result<String> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| PortalError::precondition("Invalid availability date"))?;

        let (from, to) = if self.all_day {
            (
                NaiveTime::from_hms_opt(0, 0, 0),
                NaiveTime::from_hms_opt(23, 59, 59),
            )
        } else {
            (
                NaiveTime::parse_from_str(&self.from, "%H:%M").ok(),
                NaiveTime::parse_from_str(&self.to, "%H:%M").ok(),
            )
        };
        let (Some(from), Some(to)) = (from, to) else {
            return Err(PortalError::precondition("Please choose a start and end time"));
        };
        if to <= from {
            return Err(PortalError::precondition("End time must be after start time"));
        }

        let local = |time: NaiveTime| {
            tz.from_local_datetime(&date.and_time(time))
                .earliest()
                .map(|dt| dt.timestamp())
                .ok_or_else(|| PortalError::precondition("Invalid availability time"))
        };
        Ok(format!("{}-{}", local(from)?, local(to)?))
    }
}
