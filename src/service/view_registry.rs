use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::GarnerError;
use crate::service::dashboard_actor::DashboardHandle;

struct RegisteredView {
    owner: String,
    handle: DashboardHandle,
}

/// Mounted dashboard views addressable by id, each owned by one user.
#[derive(Clone, Default)]
pub struct ViewRegistry {
    views: Arc<RwLock<HashMap<Uuid, RegisteredView>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `owner`. The view lives as long as the guard.
    pub fn register(&self, owner: impl Into<String>, handle: DashboardHandle) -> ViewGuard {
        let id = handle.id();
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                RegisteredView {
                    owner: owner.into(),
                    handle: handle.clone(),
                },
            );
        debug!(view = %id, "view registered");
        ViewGuard {
            id,
            registry: self.clone(),
            handle,
        }
    }

    /// Look up a view owned by `owner`; foreign views are reported as missing.
    pub fn get(&self, id: Uuid, owner: &str) -> Result<DashboardHandle, GarnerError> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .filter(|v| v.owner == owner)
            .map(|v| v.handle.clone())
            .ok_or(GarnerError::ViewNotFound)
    }

    pub fn len(&self) -> usize {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: Uuid) {
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        debug!(view = %id, "view unregistered");
    }
}

/// Keeps a registered view alive; dropping it unregisters and stops the view.
pub struct ViewGuard {
    id: Uuid,
    registry: ViewRegistry,
    handle: DashboardHandle,
}

impl ViewGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn handle(&self) -> &DashboardHandle {
        &self.handle
    }
}

impl Drop for ViewGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
        self.handle.stop();
    }
}
