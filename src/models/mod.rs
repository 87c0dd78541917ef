pub mod inventory;
pub mod kit;
pub mod message;
pub mod order;
pub mod pricing;
pub mod user;

pub use inventory::{listed_inventory, Inventory, InventoryItem, InventoryRow, StockLevel};
pub use kit::{KitInfo, LookupRow};
pub use message::{Embed, ThreadMessage};
pub use order::{LineItem, Order, OrderStatus, OrderType, StaffBucket, Tracking, UserBucket};
pub use user::{RoleRefresh, UserIdentity};
