use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use kube::runtime::controller::{self, Action};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;

use crate::core::error::Error;
use crate::model::context::ContextData;
use crate::model::key::FunctionKey;
use crate::model::spec::Function;

/// Per-key exponential backoff: the n-th consecutive failure of a key waits `base * 2^n`,
/// never more than `max`.
pub struct RateLimiter {
    base: Duration,
    max: Duration,
    failures: DashMap<FunctionKey, u32>,
}

impl RateLimiter {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: DashMap::new(),
        }
    }

    /// Records a failure of `key` and returns how long to wait before retrying it.
    pub fn when(&self, key: &FunctionKey) -> Duration {
        let mut failures = self.failures.entry(key.clone()).or_insert(0);
        let exponent = *failures;
        *failures = failures.saturating_add(1);
        self.base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max)
    }

    pub fn forget(&self, key: &FunctionKey) {
        self.failures.remove(key);
    }

    pub fn retries(&self, key: &FunctionKey) -> u32 {
        self.failures.get(key).map(|n| *n).unwrap_or_default()
    }
}

pub fn retry_action(limiter: &RateLimiter, key: &FunctionKey, error: &Error) -> Action {
    if !error.is_retryable() {
        log::error!("Dropping {key} from the queue: {error}");
        limiter.forget(key);
        return Action::await_change();
    }
    let delay = limiter.when(key);
    log::warn!("Error reconciling {key} ({}), retry #{} in {delay:?}: {error}", error.code(), limiter.retries(key));
    Action::requeue(delay)
}

/// Called by the controller whenever [`reconcile`](crate::policy::reconciliation::reconcile) fails.
pub fn error_policy<C, A>(function: Arc<Function>, error: &Error, ctx: Arc<ContextData<C, A>>) -> Action {
    metrics::counter!("kfn_reconcile_errors_total", "code" => error.code()).increment(1);
    match FunctionKey::from_resource(function.as_ref()) {
        Ok(key) => retry_action(&ctx.rate_limiter, &key, error),
        Err(key_err) => {
            log::error!("Dropping Function without a valid key: {key_err}");
            Action::await_change()
        }
    }
}

pub type ControllerOutcome = Result<(ObjectRef<Function>, Action), controller::Error<Error, watcher::Error>>;

/// Logs what the controller did with a key. A Function missing from the cache has been
/// deleted: its retry state is dropped, as the controller never hands it to the reconciler.
pub fn settle_outcome(outcome: &ControllerOutcome, limiter: &RateLimiter) {
    match outcome {
        Ok((obj, _)) => log::debug!("Reconciled {obj}"),
        Err(controller::Error::ObjectNotFound(obj)) => {
            log::debug!("Function {obj} no longer exists");
            if let Some(namespace) = obj.namespace.as_deref() {
                limiter.forget(&FunctionKey::new(namespace, &obj.name));
            }
        }
        Err(controller::Error::ReconcilerFailed(err, obj)) => log::warn!("Reconciliation of {obj} failed: {err}"),
        Err(err) => log::error!("Controller error: {err}"),
    }
}
