use std::time::Duration;

use crate::policy::error::RateLimiter;
use crate::policy::reconciliation::FunctionReconciler;
use crate::service::cluster_svc::{KubeClusterApi, KubeStores};

pub struct ContextData<C = KubeStores, A = KubeClusterApi> {
    /// Reconcile engine reading the watch caches and writing through the cluster api.
    pub reconciler: FunctionReconciler<C, A>,
    /// Per-key retry state, cleared whenever a key reconciles successfully or disappears.
    pub rate_limiter: RateLimiter,
    pub resync_period: Duration,
}
