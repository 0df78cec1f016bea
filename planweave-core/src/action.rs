use std::collections::{BTreeMap, BTreeSet};

use crate::condition::{Condition, SetOfDerivedPredicates};
use crate::effect::{
    ActionId, ContainerId, FullEventId, SetOfEventsId, Successions, WorldStateModification,
};
use crate::entity::Parameter;
use crate::fact::{Fact, FactOptional};
use crate::fact_index::FactOptionalsToId;
use crate::goal::Goal;
use crate::number::Number;

/// The effect bundle of an action: world modifications at start, at end
/// (committed), at end but undoable by cost comparison, and the goals the
/// action pushes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemModification {
    pub world_state_modification_at_start: Option<WorldStateModification>,
    pub world_state_modification: Option<WorldStateModification>,
    pub potential_world_state_modification: Option<WorldStateModification>,
    pub goals_to_add: BTreeMap<i32, Vec<Goal>>,
    pub goals_to_add_in_current_priority: Vec<Goal>,
}

impl ProblemModification {
    pub fn new(world_state_modification: Option<WorldStateModification>) -> Self {
        ProblemModification {
            world_state_modification,
            ..Default::default()
        }
    }

    pub fn with_potential(
        world_state_modification: Option<WorldStateModification>,
        potential_world_state_modification: Option<WorldStateModification>,
    ) -> Self {
        ProblemModification {
            world_state_modification,
            potential_world_state_modification,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.world_state_modification_at_start.is_none()
            && self.world_state_modification.is_none()
            && self.potential_world_state_modification.is_none()
            && self.goals_to_add.is_empty()
            && self.goals_to_add_in_current_priority.is_empty()
    }

    pub fn has_fact(&self, fact: &Fact) -> bool {
        if self
            .world_state_modification
            .as_ref()
            .is_some_and(|m| m.has_fact(fact))
            || self
                .potential_world_state_modification
                .as_ref()
                .is_some_and(|m| m.has_fact(fact))
        {
            return true;
        }
        self.goals_to_add
            .values()
            .flatten()
            .chain(self.goals_to_add_in_current_priority.iter())
            .any(|goal| goal.objective().has_fact(fact))
    }

    /// The optional facts the committed and potential effects can modify.
    pub fn get_all_opt_facts_that_can_be_modified(&self) -> BTreeSet<FactOptional> {
        let mut res = BTreeSet::new();
        if let Some(modification) = &self.world_state_modification {
            res.extend(modification.get_all_opt_facts_that_can_be_modified());
        }
        if let Some(modification) = &self.potential_world_state_modification {
            res.extend(modification.get_all_opt_facts_that_can_be_modified());
        }
        res
    }
}

/// A parameterized operator: preconditions, effect bundle, duration and the
/// per-action caches rebuilt by the Domain.
#[derive(Debug, Clone)]
pub struct Action {
    pub parameters: Vec<Parameter>,
    pub precondition: Option<Condition>,
    /// Must hold throughout a durative execution window, distinct from the
    /// at-start precondition.
    pub over_all_condition: Option<Condition>,
    /// Facts that make the action preferable, used by tie-breaking only.
    pub prefer_in_context: Option<Condition>,
    pub effect: ProblemModification,
    pub duration: Number,
    pub can_be_used_by_planner: bool,
    pub high_importance_of_not_repeating_it: bool,

    /// Actions this one cannot usefully precede.
    pub actions_successions_without_interest_cache: BTreeSet<ActionId>,
    /// Closure of actions whose effects can enable this one.
    pub actions_predecessors_cache: BTreeSet<ActionId>,
    /// Closure of events whose effects can enable this one.
    pub events_predecessors_cache: BTreeSet<FullEventId>,
}

impl Action {
    pub fn new(precondition: Option<Condition>, effect: Option<WorldStateModification>) -> Self {
        Action {
            parameters: Vec::new(),
            precondition,
            over_all_condition: None,
            prefer_in_context: None,
            effect: ProblemModification::new(effect),
            duration: Number::Int(1),
            can_be_used_by_planner: true,
            high_importance_of_not_repeating_it: false,
            actions_successions_without_interest_cache: BTreeSet::new(),
            actions_predecessors_cache: BTreeSet::new(),
            events_predecessors_cache: BTreeSet::new(),
        }
    }

    pub fn with_potential(
        precondition: Option<Condition>,
        effect: Option<WorldStateModification>,
        potential_effect: Option<WorldStateModification>,
    ) -> Self {
        let mut res = Action::new(precondition, effect);
        res.effect.potential_world_state_modification = potential_effect;
        res
    }

    /// Clone for registration into a Domain, inlining derived predicates in
    /// the conditions.
    pub fn clone_with_derived(&self, derived_predicates: &SetOfDerivedPredicates) -> Action {
        let mut res = self.clone();
        if !derived_predicates.is_empty() {
            res.precondition = self
                .precondition
                .as_ref()
                .map(|c| c.clone_with(None, false, Some(derived_predicates)));
            res.over_all_condition = self
                .over_all_condition
                .as_ref()
                .map(|c| c.clone_with(None, false, Some(derived_predicates)));
            res.prefer_in_context = self
                .prefer_in_context
                .as_ref()
                .map(|c| c.clone_with(None, false, Some(derived_predicates)));
        }
        res
    }

    pub fn update_succession_cache(
        &mut self,
        conditions_to_actions: &FactOptionalsToId,
        event_condition_links: &BTreeMap<SetOfEventsId, FactOptionalsToId>,
        action_id: &str,
        facts_from_condition: &BTreeSet<FactOptional>,
    ) {
        let container = ContainerId::Action(action_id.to_string());
        if let Some(modification) = &mut self.effect.world_state_modification {
            modification.update_successions(
                conditions_to_actions,
                event_condition_links,
                &container,
                facts_from_condition,
            );
        }
        if let Some(modification) = &mut self.effect.potential_world_state_modification {
            modification.update_successions(
                conditions_to_actions,
                event_condition_links,
                &container,
                facts_from_condition,
            );
        }
    }

    pub fn remove_possible_succession_cache(&mut self, action_id: &str) {
        if let Some(modification) = &mut self.effect.world_state_modification {
            modification.remove_possible_succession(action_id);
        }
        if let Some(modification) = &mut self.effect.potential_world_state_modification {
            modification.remove_possible_succession(action_id);
        }
    }

    pub fn get_successions(&self) -> Successions {
        let mut res = Successions::default();
        if let Some(modification) = &self.effect.world_state_modification {
            modification.get_successions(&mut res);
        }
        if let Some(modification) = &self.effect.potential_world_state_modification {
            modification.get_successions(&mut res);
        }
        res
    }
}
