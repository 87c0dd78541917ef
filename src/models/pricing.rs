use super::order::{LineItem, OrderType};

/// Item-name substrings that make an order an Academy order
pub const ACADEMY_MARKERS: [&str; 2] = ["Academy", "Lesson 0"];

/// Kit whose presence in the item summary earns the stipend
pub const STIPEND_KIT: &str = "Rookie Kit";

/// Academy if any item name contains an academy marker
pub fn classify_order_type<'a, I>(names: I) -> OrderType
where
    I: IntoIterator<Item = &'a str>,
{
    let academy = names
        .into_iter()
        .any(|name| ACADEMY_MARKERS.iter().any(|marker| name.contains(marker)));
    if academy {
        OrderType::Academy
    } else {
        OrderType::Medrunner
    }
}

/// Sum of unit price times quantity; unknown items cost nothing
pub fn total_cost<F>(items: &[LineItem], price_of: F) -> f64
where
    F: Fn(&str) -> Option<f64>,
{
    items
        .iter()
        .map(|item| price_of(&item.name).unwrap_or(0.0) * f64::from(item.quantity))
        .sum()
}

pub fn total_quantity(items: &[LineItem]) -> u32 {
    items.iter().map(|item| item.quantity).sum()
}

/// Stipend rule: the lookup value when the summary mentions the stipend kit
pub fn stipend_for(item_summary: &str, stipend_value: f64) -> f64 {
    if item_summary.to_lowercase().contains(&STIPEND_KIT.to_lowercase()) {
        stipend_value
    } else {
        0.0
    }
}

/// `"<q>x <name>"` entries joined by `", "`
pub fn item_summary(items: &[LineItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}x {}", item.quantity, item.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_classify_order_type() {
        assert_eq!(classify_order_type(["Rookie Kit", "P4-AR"]), OrderType::Medrunner);
        assert_eq!(
            classify_order_type(["P4-AR", "Academy Supply / Lesson 0"]),
            OrderType::Academy
        );
        assert_eq!(classify_order_type(["Lesson 0 Refill"]), OrderType::Academy);
        // Marker match is case-sensitive
        assert_eq!(classify_order_type(["academy hoodie"]), OrderType::Medrunner);
    }

    #[test]
    fn test_total_cost_ignores_unknown_items() {
        let prices: HashMap<&str, f64> = [("P4-AR", 1200.0), ("Medgun", 450.5)].into_iter().collect();
        let items = vec![
            LineItem::new("P4-AR", 2),
            LineItem::new("Medgun", 2),
            LineItem::new("Mystery Box", 5),
        ];
        let cost = total_cost(&items, |name| prices.get(name).copied());
        assert_eq!(cost, 3301.0);
        assert_eq!(total_quantity(&items), 9);
    }

    #[test]
    fn test_stipend_rule() {
        assert_eq!(stipend_for("1x Rookie Kit, 2x P4-AR", 15000.0), 15000.0);
        assert_eq!(stipend_for("2x P4-AR", 15000.0), 0.0);
    }

    #[test]
    fn test_item_summary() {
        let items = vec![LineItem::new("Rookie Kit", 1), LineItem::new("P4-AR", 3)];
        assert_eq!(item_summary(&items), "1x Rookie Kit, 3x P4-AR");
    }
}
