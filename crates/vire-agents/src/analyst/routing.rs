//! The loop's only branch point

use super::state::AnalystLoopState;

/// Branch taken after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Dispatch the pending requests
    Continue,
    /// Move on to the rationale
    Synthesize,
}

impl Route {
    pub const CONTINUE: &'static str = "continue";
    pub const SYNTHESIZE: &'static str = "rationale";

    /// Edge label used by the compiled graph
    pub fn label(&self) -> &'static str {
        match self {
            Route::Continue => Self::CONTINUE,
            Route::Synthesize => Self::SYNTHESIZE,
        }
    }
}

/// Decide whether to dispatch tools or synthesize
///
/// Once `ceiling` rounds have run, synthesis is forced even if the model
/// keeps requesting tools.
pub fn should_continue(state: &AnalystLoopState, ceiling: usize) -> Route {
    if state.tool_calls >= ceiling {
        Route::Synthesize
    } else if !state.pending.is_empty() {
        Route::Continue
    } else {
        Route::Synthesize
    }
}
