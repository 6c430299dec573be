//! State abstraction for the graph runtime
//!
//! Nodes never mutate the running state directly. They return a partial
//! update that the runtime merges into the state after the node completes.
//! Each state type owns its merge contract through [`GraphState::apply_update`].

/// Partial update produced by a node
pub trait StateUpdate: Clone + Send + Sync + 'static {
    /// An update that leaves the state untouched
    fn empty() -> Self;

    /// Whether applying this update would be a no-op
    fn is_empty(&self) -> bool;
}

/// Trait for state carried through a graph invocation
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Default)]
/// struct CounterState {
///     count: i32,
/// }
///
/// impl GraphState for CounterState {
///     type Update = CounterUpdate;
///
///     fn apply_update(&self, update: Self::Update) -> Self {
///         CounterState { count: self.count + update.delta }
///     }
/// }
/// ```
pub trait GraphState: Clone + Send + Sync + 'static {
    /// The update type produced by nodes
    type Update: StateUpdate;

    /// Apply an update to produce a new state
    ///
    /// Must be pure. Fields the update does not touch are carried forward.
    fn apply_update(&self, update: Self::Update) -> Self;

    /// Apply a sequence of updates in order
    fn apply_updates(&self, updates: Vec<Self::Update>) -> Self {
        updates
            .into_iter()
            .fold(self.clone(), |state, update| state.apply_update(update))
    }
}
