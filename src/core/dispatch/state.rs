use std::fmt;

/// Lifecycle of one dispatch call. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Validating,
    RateChecking,
    ResolvingModel,
    Delegating,
    Succeeded,
    Failed,
}

impl DispatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchState::Validating => "validating",
            DispatchState::RateChecking => "rate_checking",
            DispatchState::ResolvingModel => "resolving_model",
            DispatchState::Delegating => "delegating",
            DispatchState::Succeeded => "succeeded",
            DispatchState::Failed => "failed",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
