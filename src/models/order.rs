use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::inventory::lenient_f64;

/// Order lifecycle status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Received,
    Processing,
    PendingCollection,
    Completed,
    Cancelled,
    /// Any value the backend sends that is not part of the lifecycle
    Other(String),
}

impl OrderStatus {
    /// Every status a logistician can select in the console
    pub const SELECTABLE: [OrderStatus; 5] = [
        OrderStatus::Received,
        OrderStatus::Processing,
        OrderStatus::PendingCollection,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Case-insensitive parse; legacy "ready" spellings map to Pending Collection
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "received" => OrderStatus::Received,
            "processing" => OrderStatus::Processing,
            "pending collection" | "ready to collect" | "ready for pickup" | "ready" => {
                OrderStatus::PendingCollection
            }
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Other(raw.trim().to_string()),
        }
    }

    /// Wire value stored by the backend
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Received => "Received",
            OrderStatus::Processing => "Processing",
            OrderStatus::PendingCollection => "Pending Collection",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Other(s) => s,
        }
    }

    /// User-facing label
    pub fn display_name(&self) -> &str {
        match self {
            OrderStatus::PendingCollection => "Ready to Collect",
            OrderStatus::Other(s) if s.is_empty() => "Unknown",
            other => other.as_str(),
        }
    }

    /// Completed and Cancelled freeze tracking and disable messaging
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// CSS class for the status badge
    pub fn css_class(&self) -> &'static str {
        match self {
            OrderStatus::Received => "status-received",
            OrderStatus::Processing => "status-processing",
            OrderStatus::PendingCollection => "status-ready",
            OrderStatus::Completed => "status-completed",
            OrderStatus::Cancelled => "status-cancelled",
            OrderStatus::Other(s) if s.eq_ignore_ascii_case("claimed") => "status-claimed",
            OrderStatus::Other(s) if s.to_lowercase().contains("collect") => "status-ready",
            OrderStatus::Other(_) => "status-received",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Received
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(OrderStatus::parse(raw.as_deref().unwrap_or("")))
    }
}

/// Order type derived from the submitted item names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    Medrunner,
    Academy,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Medrunner => "Medrunner",
            OrderType::Academy => "Academy",
        }
    }
}

/// Milestone timestamps attached to an order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<String>,
}

impl Tracking {
    pub fn is_empty(&self) -> bool {
        self.milestones().is_empty()
    }

    /// Set milestones in lifecycle order
    pub fn milestones(&self) -> Vec<(&'static str, &str)> {
        [
            ("Order Placed", &self.placed_timestamp),
            ("Claimed", &self.claimed_timestamp),
            ("Ready to Collect", &self.processing_timestamp),
            ("Closed", &self.completion_timestamp),
        ]
        .into_iter()
        .filter_map(|(label, ts)| {
            ts.as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| (label, s))
        })
        .collect()
    }
}

/// A persisted equipment request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub requester: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,
    /// Item summary; JSON array text or free text for older rows
    #[serde(default)]
    pub items: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub item_count: u32,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub stipend: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logistician: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Tracking>,
}

/// Staff console partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaffBucket {
    /// Non-terminal and unassigned
    Open,
    /// Non-terminal and assigned
    Active,
    /// Terminal
    Archived,
}

/// My Orders partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserBucket {
    Active,
    Completed,
}

impl Order {
    /// Assigned logistician, ignoring blank values
    pub fn assigned_logistician(&self) -> Option<&str> {
        self.logistician
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn staff_bucket(&self) -> StaffBucket {
        if self.is_terminal() {
            StaffBucket::Archived
        } else if self.assigned_logistician().is_some() {
            StaffBucket::Active
        } else {
            StaffBucket::Open
        }
    }

    pub fn user_bucket(&self) -> UserBucket {
        if self.is_terminal() {
            UserBucket::Completed
        } else {
            UserBucket::Active
        }
    }

    /// Date shown on cards, falling back to the raw timestamp
    pub fn display_date(&self) -> &str {
        if !self.date.trim().is_empty() {
            &self.date
        } else if !self.timestamp.trim().is_empty() {
            &self.timestamp
        } else {
            "Unknown"
        }
    }

    pub fn parsed_items(&self) -> ParsedItems {
        parse_items(&self.items)
    }
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }

    /// Recognise the sheet's `"<n>x <name>"` summary form
    pub fn from_summary_token(token: &str) -> Self {
        let token = token.trim();
        if let Some((count, rest)) = token.split_once("x ") {
            if let Ok(quantity) = count.trim().parse::<u32>() {
                if !rest.trim().is_empty() {
                    return LineItem::new(rest.trim(), quantity);
                }
            }
        }
        LineItem::new(token, 1)
    }

    fn from_json(value: &serde_json::Value) -> Self {
        let name = value
            .get("name")
            .or_else(|| value.get("fullName"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown Item")
            .to_string();

        let quantity = match value.get("quantity") {
            Some(serde_json::Value::Number(n)) => n.as_u64().map(|q| q as u32),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|q| *q > 0)
        .unwrap_or(1);

        LineItem { name, quantity }
    }
}

/// Outcome of reading a stored item summary
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedItems {
    /// The summary was a JSON array
    Structured(Vec<LineItem>),
    /// Free text split on commas and newlines, quantity 1 each
    PlainText(Vec<LineItem>),
}

impl ParsedItems {
    /// Items for rendering; plain-text tokens in `"<n>x <name>"` form keep their count
    pub fn display_items(&self) -> Vec<LineItem> {
        match self {
            ParsedItems::Structured(items) => items.clone(),
            ParsedItems::PlainText(items) => items
                .iter()
                .map(|item| LineItem::from_summary_token(&item.name))
                .collect(),
        }
    }
}

/// Parse an item summary: JSON array first, plain-text fallback second
pub fn parse_items(raw: &str) -> ParsedItems {
    if let Ok(serde_json::Value::Array(values)) = serde_json::from_str::<serde_json::Value>(raw) {
        return ParsedItems::Structured(values.iter().map(LineItem::from_json).collect());
    }

    ParsedItems::PlainText(
        raw.split(|c| c == ',' || c == '\n')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| LineItem::new(token, 1))
            .collect(),
    )
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?
        .filter(|n| *n >= 0.0)
        .map(|n| n as u32)
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(status: &str, logistician: Option<&str>) -> Order {
        Order {
            order_id: "MRS-1".to_string(),
            status: OrderStatus::parse(status),
            logistician: logistician.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!(OrderStatus::parse("pending collection"), OrderStatus::PendingCollection);
        assert_eq!(OrderStatus::parse("Ready for Pickup"), OrderStatus::PendingCollection);
        assert_eq!(OrderStatus::PendingCollection.display_name(), "Ready to Collect");
        assert_eq!(OrderStatus::PendingCollection.as_str(), "Pending Collection");
        assert_eq!(OrderStatus::parse("CANCELLED"), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::parse("Claimed").css_class(), "status-claimed");
        assert_eq!(OrderStatus::parse("").display_name(), "Unknown");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::PendingCollection.is_terminal());
        assert!(!OrderStatus::Other("Claimed".into()).is_terminal());
    }

    #[test]
    fn test_buckets_are_exhaustive_and_disjoint() {
        let statuses = ["Received", "Processing", "Pending Collection", "Completed", "Cancelled", "Weird"];
        let assignees = [None, Some(""), Some("   "), Some("Kestrel")];

        for status in statuses {
            for assignee in assignees {
                let o = order(status, assignee);
                let terminal = o.is_terminal();
                let assigned = assignee.map(|a| !a.trim().is_empty()).unwrap_or(false);

                let expected_staff = match (terminal, assigned) {
                    (true, _) => StaffBucket::Archived,
                    (false, true) => StaffBucket::Active,
                    (false, false) => StaffBucket::Open,
                };
                assert_eq!(o.staff_bucket(), expected_staff, "{status} {assignee:?}");

                let expected_user = if terminal { UserBucket::Completed } else { UserBucket::Active };
                assert_eq!(o.user_bucket(), expected_user);
            }
        }
    }

    #[test]
    fn test_parse_items_json_array() {
        let parsed = parse_items(r#"[{"name":"P4-AR","quantity":2},{"fullName":"Medgun","quantity":"3"},{}]"#);
        assert_eq!(
            parsed,
            ParsedItems::Structured(vec![
                LineItem::new("P4-AR", 2),
                LineItem::new("Medgun", 3),
                LineItem::new("Unknown Item", 1),
            ])
        );
    }

    #[test]
    fn test_parse_items_plain_text_fallback() {
        let parsed = parse_items("2x Balor HCH Helmet White, ADP Core Red\n\n Vestal Water ,");
        assert_eq!(
            parsed,
            ParsedItems::PlainText(vec![
                LineItem::new("2x Balor HCH Helmet White", 1),
                LineItem::new("ADP Core Red", 1),
                LineItem::new("Vestal Water", 1),
            ])
        );
        assert_eq!(parsed.display_items()[0], LineItem::new("Balor HCH Helmet White", 2));
    }

    #[test]
    fn test_parse_items_non_array_json_is_plain_text() {
        assert!(matches!(parse_items("42"), ParsedItems::PlainText(_)));
        assert!(parse_items("").display_items().is_empty());
    }

    #[test]
    fn test_summary_token() {
        assert_eq!(LineItem::from_summary_token("3x ADP Legs White"), LineItem::new("ADP Legs White", 3));
        assert_eq!(LineItem::from_summary_token("Box x Crate"), LineItem::new("Box x Crate", 1));
        assert_eq!(LineItem::from_summary_token("x "), LineItem::new("x", 1));
    }

    #[test]
    fn test_order_deserializes_backend_row() {
        let o: Order = serde_json::from_value(json!({
            "orderId": "MRS-123456789",
            "date": "2025-01-02T10:00:00Z",
            "requester": "Alice",
            "items": "1x Rookie Kit",
            "itemCount": "1",
            "cost": 2500,
            "stipend": "",
            "orderType": "Medrunner",
            "logistician": "",
            "status": "Pending Collection",
            "tracking": {"placedTimestamp": "2025-01-02T10:00:00Z", "claimedTimestamp": ""}
        }))
        .unwrap();

        assert_eq!(o.item_count, 1);
        assert_eq!(o.cost, Some(2500.0));
        assert_eq!(o.stipend, None);
        assert_eq!(o.assigned_logistician(), None);
        assert_eq!(o.staff_bucket(), StaffBucket::Open);
        assert_eq!(o.tracking.unwrap().milestones().len(), 1);
    }
}
