//! State shared by all API handlers

use std::sync::Arc;

use crate::actors::SweeperHandle;
use crate::fleet::{FleetCoordinator, PolicySwitch};

#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<FleetCoordinator>,

    /// Immediate sweeps and load-balancing changes go through the sweeper
    pub sweeper: SweeperHandle,

    /// Same switch the sweeper reads; handlers read it once per request
    pub policy: PolicySwitch,
}

impl ApiState {
    pub fn new(coordinator: Arc<FleetCoordinator>, sweeper: SweeperHandle, policy: PolicySwitch) -> Self {
        Self {
            coordinator,
            sweeper,
            policy,
        }
    }
}
