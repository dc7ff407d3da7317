// src/aggregate/selector.rs
use crate::registry::{Source, SourceRegistry};

/// Picks which sources take part in a request. Stateless: every call reads
/// the registry afresh.
#[derive(Clone, Copy)]
pub struct SourceSelector<'a> {
    registry: &'a dyn SourceRegistry,
}

impl<'a> SourceSelector<'a> {
    pub fn new(registry: &'a dyn SourceRegistry) -> Self {
        Self { registry }
    }

    /// Every enabled source, registry order.
    pub fn all_enabled(&self) -> Vec<Source> {
        self.registry.list_enabled_sources()
    }

    /// The first `n` enabled sources, registry order.
    pub fn first_n(&self, n: usize) -> Vec<Source> {
        let mut sources = self.registry.list_enabled_sources();
        sources.truncate(n);
        sources
    }

    /// Enabled sources for `keys`, in the order of `keys` (which encodes preference).
    pub fn by_keys(&self, keys: &[String]) -> Vec<Source> {
        self.registry.find_sources_by_keys(keys)
    }
}
