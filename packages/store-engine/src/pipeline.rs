use anyhow::Result;

use crate::{ActiveKey, FormStatus, HasStatus, Keyed, SliceCell, SliceState, Step, StepError};

/// Whether a pipeline's action step is gated on a prior approval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepGate {
    RequiresApproval,
    None,
}

/// What happens to the slice when the action step lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompleteMode {
    /// One-shot flows: collapse back to defaults (with a completed status)
    /// so the form is ready for a new independent action under a new key.
    ResetSlice,
    /// Keep the current inputs; only the status moves to completed.
    KeepState,
}

/// Result of driving one step of a pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome<T> {
    /// The step result was committed for the still-current key.
    Committed(T),
    /// The step failed; the failure is recorded on the slice's status.
    Failed(String),
    /// The result arrived for a key that is no longer current; discarded.
    Stale,
}

impl<T> StepOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, StepOutcome::Committed(_))
    }
}

/// Currency predicate for keyed slices: the result still belongs to the
/// slice's current active key. Unkeyed slices pass `|_| true`.
pub fn is_current<S: Keyed>(key: &ActiveKey) -> impl Fn(&S) -> bool + '_ {
    move |state| state.active_key() == key
}

/// Drives a slice's approve-then-act transaction pipeline over its cell.
///
/// The runner owns only the status transitions and the key-checked commit
/// of step results; issuing the underlying transaction stays with the
/// slice, which hands the outcome in as a `Result`.
pub struct StepRunner<'a, S> {
    cell: &'a SliceCell<S>,
}

impl<'a, S: SliceState> StepRunner<'a, S> {
    pub fn new(cell: &'a SliceCell<S>) -> Self {
        StepRunner { cell }
    }

    /// Mark a step as in flight. Refuses the action step of an
    /// approval-gated pipeline while unapproved, and any step while
    /// another is in progress; both checks happen under the state lock.
    pub async fn begin<A>(&self, step: Step<A>, gate: StepGate) -> Result<(), StepError>
    where
        S: HasStatus<A>,
        A: Copy + PartialEq,
    {
        self.cell
            .update(|state| {
                let status = state.status();
                if status.is_in_progress {
                    return Err(StepError::StepInProgress);
                }
                if step.is_action() && gate == StepGate::RequiresApproval && !status.is_approved {
                    return Err(StepError::NotApproved);
                }
                let is_approved = status.is_approved;
                *state.status_mut() = FormStatus::begin(step, is_approved);
                Ok(())
            })
            .await
    }

    /// Commit an approval result. On success the caller re-issues the gas
    /// estimate for the current key (dependent refetch rule); on failure
    /// the step is preserved so the UI can offer a scoped retry.
    pub async fn finish_approval<A, T>(
        &self,
        still_current: impl FnOnce(&S) -> bool,
        result: Result<T>,
    ) -> StepOutcome<T>
    where
        S: HasStatus<A>,
        A: Copy + PartialEq,
    {
        match result {
            Ok(value) => {
                let stale = self
                    .cell
                    .update(|state| {
                        if !still_current(state) {
                            return true;
                        }
                        let status = state.status_mut();
                        status.step = None;
                        status.is_in_progress = false;
                        status.is_approved = true;
                        status.error = None;
                        false
                    })
                    .await;
                if stale {
                    tracing::debug!("approval result discarded; inputs changed mid-flight");
                    StepOutcome::Stale
                } else {
                    StepOutcome::Committed(value)
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                let stale = self
                    .cell
                    .update(|state| {
                        if !still_current(state) {
                            return true;
                        }
                        let status = state.status_mut();
                        // step preserved for a scoped retry
                        status.is_in_progress = false;
                        status.is_approved = false;
                        status.error = Some(message.clone());
                        false
                    })
                    .await;
                if stale {
                    StepOutcome::Stale
                } else {
                    StepOutcome::Failed(message)
                }
            }
        }
    }

    /// Commit an action result. Success commits the completed status (and,
    /// for one-shot flows, the slice reset) before any dependent refetch
    /// runs; failure preserves the step and any approval already granted.
    pub async fn finish_action<A, T>(
        &self,
        still_current: impl FnOnce(&S) -> bool,
        result: Result<T>,
        mode: CompleteMode,
    ) -> StepOutcome<T>
    where
        S: HasStatus<A>,
        A: Copy + PartialEq,
    {
        match result {
            Ok(value) => {
                let stale = self
                    .cell
                    .update(|state| {
                        if !still_current(state) {
                            return true;
                        }
                        if mode == CompleteMode::ResetSlice {
                            *state = S::default();
                        }
                        *state.status_mut() = FormStatus::completed();
                        false
                    })
                    .await;
                if stale {
                    tracing::debug!("action result discarded; inputs changed mid-flight");
                    StepOutcome::Stale
                } else {
                    StepOutcome::Committed(value)
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                let stale = self
                    .cell
                    .update(|state| {
                        if !still_current(state) {
                            return true;
                        }
                        let status = state.status_mut();
                        status.is_in_progress = false;
                        status.error = Some(message.clone());
                        false
                    })
                    .await;
                if stale {
                    StepOutcome::Stale
                } else {
                    StepOutcome::Failed(message)
                }
            }
        }
    }
}
