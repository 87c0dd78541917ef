pub mod portal;
pub mod roles;

pub use portal::{PortalConfig, SheetSource};
pub use roles::LogisticsRoles;
