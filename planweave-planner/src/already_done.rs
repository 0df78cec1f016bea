use std::collections::{BTreeMap, BTreeSet};

use planweave_core::{ActionId, Fact, FullEventId};

/// Per-recursion trie over the action/event ids already expanded along the
/// current path. A node that was visited and grew no children is an
/// exhausted leaf: asking for it again answers `None` and the caller skips
/// the branch.
#[derive(Debug, Default)]
pub struct TreeOfAlreadyDonePaths {
    action_id_to_tree: BTreeMap<ActionId, TreeOfAlreadyDonePaths>,
    event_id_to_tree: BTreeMap<FullEventId, TreeOfAlreadyDonePaths>,
}

impl TreeOfAlreadyDonePaths {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_leaf(&self) -> bool {
        self.action_id_to_tree.is_empty() && self.event_id_to_tree.is_empty()
    }

    pub fn get_next_action_tree_if_not_an_existing_leaf(
        &mut self,
        action_id: &str,
    ) -> Option<&mut TreeOfAlreadyDonePaths> {
        if let Some(existing) = self.action_id_to_tree.get(action_id) {
            if existing.is_leaf() {
                return None;
            }
        }
        Some(
            self.action_id_to_tree
                .entry(action_id.to_string())
                .or_default(),
        )
    }

    pub fn get_next_event_tree_if_not_an_existing_leaf(
        &mut self,
        full_event_id: &str,
    ) -> Option<&mut TreeOfAlreadyDonePaths> {
        if let Some(existing) = self.event_id_to_tree.get(full_event_id) {
            if existing.is_leaf() {
                return None;
            }
        }
        Some(
            self.event_id_to_tree
                .entry(full_event_id.to_string())
                .or_default(),
        )
    }
}

/// Polarity-split guard against infinite predecessor walks: a fact already
/// pending as an addition (or removal) along the current chain is not
/// expanded again.
#[derive(Debug, Clone, Default)]
pub struct FactsAlreadyChecked {
    pub facts_to_add: BTreeSet<Fact>,
    pub facts_to_remove: BTreeSet<Fact>,
}

impl FactsAlreadyChecked {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn swap(&mut self, other: &mut FactsAlreadyChecked) {
        std::mem::swap(self, other);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_leaf_is_refused() {
        let mut tree = TreeOfAlreadyDonePaths::new();
        assert!(tree.get_next_action_tree_if_not_an_existing_leaf("a").is_some());
        // "a" was explored and gained no children: refused now.
        assert!(tree.get_next_action_tree_if_not_an_existing_leaf("a").is_none());
    }

    #[test]
    fn test_deepened_branch_stays_open() {
        let mut tree = TreeOfAlreadyDonePaths::new();
        {
            let sub = tree
                .get_next_action_tree_if_not_an_existing_leaf("a")
                .unwrap();
            sub.get_next_action_tree_if_not_an_existing_leaf("b");
        }
        assert!(tree.get_next_action_tree_if_not_an_existing_leaf("a").is_some());
    }
}
