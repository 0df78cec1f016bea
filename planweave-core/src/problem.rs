use std::collections::BTreeMap;

use crate::effect::ActionId;
use crate::entity::SetOfEntities;
use crate::goal_stack::GoalStack;
use crate::world_state::WorldState;

/// How many times each action was committed. Participates in tie-breaks;
/// grows monotonically unless the caller clears it between sessions.
#[derive(Debug, Clone, Default)]
pub struct Historical {
    counts: BTreeMap<ActionId, u64>,
}

impl Historical {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_action_done(&mut self, action_id: &str) {
        *self.counts.entry(action_id.to_string()).or_insert(0) += 1;
    }

    pub fn get_nb_of_time_an_action_has_already_been_done(&self, action_id: &str) -> u64 {
        self.counts.get(action_id).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// The mutable side of planning: a world state, a goal stack, the
/// problem-local objects and the invocation history. References a Domain, is
/// never owned by one; cloning is cheap enough for lookahead costing.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    pub world_state: WorldState,
    pub goal_stack: GoalStack,
    pub objects: SetOfEntities,
    pub historical: Historical,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A problem seeded with the domain's timeless facts.
    pub fn from_domain(domain: &crate::domain::Domain) -> Self {
        Problem {
            world_state: WorldState::from_facts(domain.timeless_facts().set_of_facts()),
            ..Problem::default()
        }
    }
}
