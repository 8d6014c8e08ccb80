pub mod analytics;
pub mod analytics_handlers;
pub mod app;
pub mod app_state;
pub mod config;
pub mod metrics;
pub mod page_handlers;
pub mod pages;
pub mod store;
pub mod uploads;
pub mod user_handlers;

pub use app::build_router;
pub use app_state::{AppState, UploadSettings};
pub use config::ServiceConfig;
