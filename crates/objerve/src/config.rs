/// Options for an [`Observer`](crate::Observer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Id handed to the first transaction. Default is 1.
    pub first_transaction_id: u64,
    /// Notify listeners when a write stores a value equal to the current
    /// one (same primitive, same node). Default is `true`.
    pub notify_unchanged_writes: bool,
    /// Reclaim nodes that became unreachable at the end of every
    /// transaction. When `false` they stay readable until
    /// [`Observer::reclaim`](crate::Observer::reclaim) or
    /// [`Observer::dispose`](crate::Observer::dispose) runs. Default is `true`.
    pub reclaim_detached: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            first_transaction_id: 1,
            notify_unchanged_writes: true,
            reclaim_detached: true,
        }
    }
}
