pub mod backend;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod types;

pub use backend::BackendClient;
pub use error::GarnerError;
pub use service::dashboard_actor::DashboardHandle;
