/// Whether the document store is worth attempting a best-effort write against.
pub trait Connectivity: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Connectivity that never reports an outage.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_reachable(&self) -> bool {
        true
    }
}
