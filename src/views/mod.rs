//! View state and the reducers that drive it

pub mod catalog;
pub mod my_orders;
pub mod staff;
pub mod toast;

pub use catalog::{CatalogView, RequestForm};
pub use my_orders::{Composer, MyOrdersDriver, MyOrdersEvent, MyOrdersState};
pub use staff::{StaffConsoleState, StaffDriver, StaffEvent};
pub use toast::Toast;
