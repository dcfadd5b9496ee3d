use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::client::DashboardClient;
use crate::error::{DashboardError, Result};
use crate::notify::Notifier;
use crate::types::Resource;

pub const EXPLAIN_FALLBACK: &str = "Failed to get explanation. Please try again.";
pub const REMEDIATE_FALLBACK: &str = "Failed to get remediation plan. Please try again.";

/// What the explain dialog shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionState {
    pub target: Option<String>,
    pub result: Option<String>,
    pub is_pending: bool,
}

/// What the remediation dialog shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationState {
    pub target: Option<String>,
    pub plan: Option<String>,
    pub remediation_id: Option<String>,
    pub is_pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyState {
    pub remediation_id: Option<String>,
    pub is_pending: bool,
    pub outcome: Option<ApplyOutcome>,
}

#[derive(Debug, Default)]
struct Slot<S> {
    request: u64,
    state: S,
}

fn lock<S>(slot: &Mutex<Slot<S>>) -> MutexGuard<'_, Slot<S>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn target_of<R: Resource>(row: &R) -> String {
    row.identifier().unwrap_or("resource").to_string()
}

/// One-shot explain / remediate / apply requests, independent of polling.
///
/// Each action keeps its own slot. Opening an action clears the slot right
/// away and only the request that opened it last may write its result.
#[derive(Debug)]
pub struct ActionDispatcher {
    client: DashboardClient,
    notifier: Notifier,
    explain: Mutex<Slot<ActionState>>,
    remediate: Mutex<Slot<RemediationState>>,
    apply: Mutex<Slot<ApplyState>>,
}

impl ActionDispatcher {
    pub fn new(client: DashboardClient, notifier: Notifier) -> Self {
        Self {
            client,
            notifier,
            explain: Mutex::default(),
            remediate: Mutex::default(),
            apply: Mutex::default(),
        }
    }

    pub fn explain_state(&self) -> ActionState {
        lock(&self.explain).state.clone()
    }

    pub fn remediation_state(&self) -> RemediationState {
        lock(&self.remediate).state.clone()
    }

    pub fn apply_state(&self) -> ApplyState {
        lock(&self.apply).state.clone()
    }

    pub async fn explain<R: Resource>(&self, row: &R) -> ActionState {
        let target = target_of(row);
        let request = {
            let mut slot = lock(&self.explain);
            slot.request += 1;
            slot.state = ActionState {
                target: Some(target.clone()),
                result: None,
                is_pending: true,
            };
            slot.request
        };

        let result = self.client.explain(row).await;

        let mut slot = lock(&self.explain);
        if slot.request != request {
            debug!(kind = %R::KIND, resource = %target, "dropping explanation of a replaced request");
            return slot.state.clone();
        }
        slot.state.is_pending = false;
        slot.state.result = Some(match result {
            Ok(explanation) => {
                info!(kind = %R::KIND, resource = %target, "explanation received");
                explanation
            }
            Err(e) => {
                warn!(kind = %R::KIND, resource = %target, error = %e, "explain request failed");
                self.notifier.error("Failed to get explanation");
                EXPLAIN_FALLBACK.to_string()
            }
        });
        slot.state.clone()
    }

    pub async fn remediate<R: Resource>(&self, row: &R) -> RemediationState {
        let target = target_of(row);
        let request = {
            let mut slot = lock(&self.remediate);
            slot.request += 1;
            slot.state = RemediationState {
                target: Some(target.clone()),
                plan: None,
                remediation_id: None,
                is_pending: true,
            };
            slot.request
        };

        let result = self.client.remediate(row).await;

        let mut slot = lock(&self.remediate);
        if slot.request != request {
            debug!(kind = %R::KIND, resource = %target, "dropping remediation plan of a replaced request");
            return slot.state.clone();
        }
        slot.state.is_pending = false;
        match result {
            Ok(plan) => {
                info!(kind = %R::KIND, resource = %target, remediation_id = ?plan.remediation_id, "remediation planned");
                slot.state.plan = Some(plan.remediation);
                slot.state.remediation_id = plan.remediation_id.filter(|id| !id.is_empty());
            }
            Err(e) => {
                warn!(kind = %R::KIND, resource = %target, error = %e, "remediate request failed");
                self.notifier.error("Failed to get remediation plan");
                slot.state.plan = Some(REMEDIATE_FALLBACK.to_string());
            }
        }
        slot.state.clone()
    }

    /// Applies the currently planned remediation.
    ///
    /// Fails with [`DashboardError::NoRemediationPlanned`] until a planning call
    /// has returned an identifier.
    pub async fn apply_remediation(&self) -> Result<()> {
        let remediation_id = {
            let slot = lock(&self.remediate);
            match (&slot.state.remediation_id, slot.state.is_pending) {
                (Some(id), false) => id.clone(),
                _ => return Err(DashboardError::NoRemediationPlanned),
            }
        };
        let request = {
            let mut slot = lock(&self.apply);
            slot.request += 1;
            slot.state = ApplyState {
                remediation_id: Some(remediation_id.clone()),
                is_pending: true,
                outcome: None,
            };
            slot.request
        };

        let result = self.client.apply_remediation(&remediation_id).await;

        let mut slot = lock(&self.apply);
        let current = slot.request == request;
        if current {
            slot.state.is_pending = false;
        }
        match &result {
            Ok(()) => {
                info!(remediation_id = %remediation_id, "remediation applied");
                if current {
                    slot.state.outcome = Some(ApplyOutcome::Applied);
                }
                self.notifier
                    .success(format!("Successfully applied remediation {}", remediation_id));
            }
            Err(e) => {
                warn!(remediation_id = %remediation_id, error = %e, "apply remediation failed");
                if current {
                    slot.state.outcome = Some(ApplyOutcome::Failed);
                }
                self.notifier
                    .error(format!("Failed to apply remediation {}", remediation_id));
            }
        }
        result
    }
}
