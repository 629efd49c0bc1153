use std::collections::HashMap;
use svidwatch_core::{Error, Result, SelectorSet, SubscriptionId};

/// Map from subscription id to the selectors that subscription watches.
///
/// The registry is a client-side record of intent. It does not mirror what
/// the agent has confirmed: an entry is kept even if the matching `Add` never
/// reached the agent.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<SubscriptionId, SelectorSet>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `selectors` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if `id` is already registered. The
    /// existing entry is left untouched.
    pub fn insert(&mut self, id: SubscriptionId, selectors: SelectorSet) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        self.entries.insert(id, selectors);
        Ok(())
    }

    /// Removes and returns the entry for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not registered.
    pub fn remove(&mut self, id: SubscriptionId) -> Result<SelectorSet> {
        self.entries.remove(&id).ok_or(Error::NotFound(id))
    }

    /// Returns the selectors registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not registered.
    pub fn lookup(&self, id: SubscriptionId) -> Result<&SelectorSet> {
        self.entries.get(&id).ok_or(Error::NotFound(id))
    }

    /// All entries, sorted by id.
    pub fn snapshot(&self) -> Vec<(SubscriptionId, SelectorSet)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(id, selectors)| (*id, selectors.clone()))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries
    }

    /// Drops every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svidwatch_core::Selector;

    fn selectors(text: &str) -> SelectorSet {
        text.parse::<Selector>().unwrap().into()
    }

    #[test]
    fn insert_then_lookup() {
        let mut registry = Registry::new();
        registry.insert(42, selectors("unix:uid:1000")).unwrap();
        assert_eq!(registry.lookup(42).unwrap(), &selectors("unix:uid:1000"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_insert_is_rejected_without_overwrite() {
        let mut registry = Registry::new();
        registry.insert(7, selectors("unix:uid:1000")).unwrap();
        assert_eq!(
            registry.insert(7, selectors("unix:uid:0")),
            Err(Error::DuplicateId(7))
        );
        assert_eq!(registry.lookup(7).unwrap(), &selectors("unix:uid:1000"));
    }

    #[test]
    fn remove_returns_prior_entry() {
        let mut registry = Registry::new();
        registry.insert(3, selectors("k8s:ns:payments")).unwrap();
        assert_eq!(registry.remove(3).unwrap(), selectors("k8s:ns:payments"));
        assert!(registry.is_empty());
        assert_eq!(registry.remove(3), Err(Error::NotFound(3)));
    }

    #[test]
    fn lookup_of_unknown_id_is_not_found() {
        let registry = Registry::new();
        assert_eq!(registry.lookup(99), Err(Error::NotFound(99)));
    }

    #[test]
    fn snapshot_is_sorted_and_clear_empties() {
        let mut registry = Registry::new();
        registry.insert(30, selectors("unix:uid:3")).unwrap();
        registry.insert(10, selectors("unix:uid:1")).unwrap();
        registry.insert(20, selectors("unix:uid:2")).unwrap();

        let ids: Vec<_> = registry.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![10, 20, 30]);

        assert_eq!(registry.clear(), 3);
        assert!(registry.is_empty());
    }
}
