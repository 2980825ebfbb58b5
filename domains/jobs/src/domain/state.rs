//! State machine for the Job entity (spec §4.5 state diagram)
//!
//! Four states, no user-initiated cancellation: `queued` -> `processing` ->
//! (`succeeded` | `failed`), plus a `processing` -> `processing` self-loop
//! for lease reclaim (an expired lease whose retry budget isn't yet spent).
//! Both terminal states are final — any further transition attempt is
//! rejected.

use thiserror::Error;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid transition: cannot apply {event} from {from}")]
    InvalidTransition { from: String, event: String },

    #[error("Terminal state: {0} is a terminal state and cannot transition")]
    TerminalState(String),
}

/// Job status states (spec §3: four-state enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl JobState {
    /// Check if this is a terminal state (spec I5: terminal finality)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [JobState] {
        match self {
            Self::Queued => &[Self::Processing],
            Self::Processing => &[Self::Processing, Self::Succeeded, Self::Failed],
            Self::Succeeded => &[],
            Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Events that drive job state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A worker claims a queued job, or reclaims one whose lease expired
    /// within the retry budget (spec §4.3 `claim_next`).
    Claim,
    /// The provider call succeeded and the output was persisted.
    Success,
    /// The provider call failed permanently, or the retry budget was spent
    /// (spec I6).
    Failure,
}

impl std::fmt::Display for JobEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claim => write!(f, "claim"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Job state machine
pub struct JobStateMachine;

impl JobStateMachine {
    /// Attempt a state transition
    pub fn transition(current: JobState, event: JobEvent) -> Result<JobState, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        let next = match (&current, &event) {
            (JobState::Queued, JobEvent::Claim) => JobState::Processing,
            (JobState::Processing, JobEvent::Claim) => JobState::Processing,
            (JobState::Processing, JobEvent::Success) => JobState::Succeeded,
            (JobState::Processing, JobEvent::Failure) => JobState::Failed,
            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    event: event.to_string(),
                });
            }
        };

        Ok(next)
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition(current: JobState, event: &JobEvent) -> bool {
        Self::transition(current, event.clone()).is_ok()
    }
}
