use serde::Serialize;

/// Identifier of a pipeline step. `A` is the slice's own action id; the
/// approval step is shared by every approval-gated pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step<A> {
    Approval,
    Action(A),
}

impl<A> Step<A> {
    pub fn is_action(&self) -> bool {
        matches!(self, Step::Action(_))
    }
}

/// Per-slice transaction state machine.
///
/// `is_complete` and `is_in_progress` are never simultaneously true, and
/// `step` is `None` only while no transaction is in flight or one just
/// completed. The `Approved` state is derived, never stored: approval
/// granted and no step in flight.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FormStatus<A> {
    pub step: Option<Step<A>>,
    pub is_in_progress: bool,
    pub is_complete: bool,
    pub is_approved: bool,
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl<A> Default for FormStatus<A> {
    fn default() -> Self {
        FormStatus {
            step: None,
            is_in_progress: false,
            is_complete: false,
            is_approved: false,
            error: None,
            warning: None,
        }
    }
}

impl<A: Copy> FormStatus<A> {
    /// Default status that keeps an approval already granted for the
    /// current inputs. Applied on every input change.
    pub fn reset_transient(&self) -> Self {
        FormStatus {
            is_approved: self.is_approved,
            ..Default::default()
        }
    }

    /// Approval granted and nothing in flight: the action step is the one
    /// currently actionable.
    pub fn is_approved_idle(&self) -> bool {
        self.is_approved && self.step.is_none()
    }

    /// Enter a step, clearing any previous error or completion.
    pub(crate) fn begin(step: Step<A>, is_approved: bool) -> Self {
        FormStatus {
            step: Some(step),
            is_in_progress: true,
            is_approved,
            ..Default::default()
        }
    }

    /// Terminal status after the action step landed.
    pub(crate) fn completed() -> Self {
        FormStatus {
            is_approved: true,
            is_complete: true,
            ..Default::default()
        }
    }
}
