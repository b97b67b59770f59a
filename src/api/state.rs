//! API shared state

use std::sync::Arc;

use crate::registry::SchedulerRegistry;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<SchedulerRegistry>,
}

impl ApiState {
    pub fn new(registry: Arc<SchedulerRegistry>) -> Self {
        Self { registry }
    }
}
