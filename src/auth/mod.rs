//! Browser-based Altary login.

pub mod callback;
pub mod pages;

pub use callback::{BrowserLauncher, CallbackFlow, FlowSettings, open_login_page, system_browser};
