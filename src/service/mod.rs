pub mod dashboard_actor;
pub mod refresh_gate;
pub mod view_registry;

pub use dashboard_actor::{
    ActionOutcome, Banner, DashboardHandle, DashboardSnapshot, MountOutcome, Route,
};
pub use view_registry::{ViewGuard, ViewRegistry};
