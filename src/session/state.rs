use serde::Serialize;

/// Lifecycle of one streaming request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Completed,
    Errored,
    Aborted,
}

impl SessionState {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Errored | SessionState::Aborted
        )
    }
}
