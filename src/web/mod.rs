//! Portal web server
//!
//! Serves the catalog, My Orders and the staff console as server-rendered
//! pages. Per-session UI state lives in memory keyed by the session cookie;
//! identity and the logistician name persist through client storage.

mod pages;
mod portal;
mod server;
mod session;
mod staff;

pub use server::{start_web_server, AppState};
