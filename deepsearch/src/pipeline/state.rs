//! Run lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage a pipeline run is in.
///
/// `Done` and `Error` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Waiting for the search provider.
    Searching,
    /// Asking the model which results to use.
    Selecting,
    /// Retrieving the selected pages.
    Fetching,
    /// Streaming the answer.
    Generating,
    /// Finished normally.
    Done,
    /// Finished with an error event.
    Error,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Searching
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searching => write!(f, "searching"),
            Self::Selecting => write!(f, "selecting"),
            Self::Fetching => write!(f, "fetching"),
            Self::Generating => write!(f, "generating"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl PipelineState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Deep search off skips `Selecting` and `Fetching`. Context-only runs
    /// finish without `Generating`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use PipelineState::{Done, Error, Fetching, Generating, Searching, Selecting};
        match (self, next) {
            (Searching, Selecting | Generating | Done)
            | (Selecting, Fetching)
            | (Fetching, Generating | Done)
            | (Generating, Done) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            PipelineState::Searching,
            PipelineState::Selecting,
            PipelineState::Fetching,
            PipelineState::Generating,
            PipelineState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_error_reachable_from_active_states_only() {
        assert!(PipelineState::Searching.can_transition_to(PipelineState::Error));
        assert!(PipelineState::Generating.can_transition_to(PipelineState::Error));
        assert!(!PipelineState::Done.can_transition_to(PipelineState::Error));
        assert!(!PipelineState::Error.can_transition_to(PipelineState::Error));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!PipelineState::Searching.can_transition_to(PipelineState::Fetching));
        assert!(!PipelineState::Generating.can_transition_to(PipelineState::Fetching));
        assert!(!PipelineState::Done.can_transition_to(PipelineState::Searching));
    }

    #[test]
    fn test_display_and_default() {
        assert_eq!(PipelineState::default(), PipelineState::Searching);
        assert_eq!(PipelineState::Generating.to_string(), "generating");
        assert!(PipelineState::Done.is_terminal());
    }
}
