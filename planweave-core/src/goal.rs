use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use uuid::Uuid;

use crate::condition::Condition;
use crate::domain::Domain;
use crate::effect::{generate_full_event_id, ActionId, FullEventId};
use crate::fact::FactOptional;

/// A prioritized objective. Carries the predecessor sets precomputed against
/// a Domain revision, so the planner starts its backward walk from a bounded
/// candidate pool.
#[derive(Debug, Clone)]
pub struct Goal {
    objective: Condition,
    is_persistent_if_skipped: bool,
    one_step_towards: bool,
    /// Seconds a goal may stay inactive before being dropped; negative means
    /// forever.
    max_time_to_keep_inactive: i32,
    inactive_since: Option<Instant>,
    group_id: String,
    /// When set, only this deduction id may satisfy the goal.
    allowed_deduction_id: Option<String>,

    actions_predecessors: BTreeSet<ActionId>,
    events_predecessors: BTreeSet<FullEventId>,
    cache_uuid: Option<Uuid>,
}

impl Goal {
    pub fn new(objective: Condition) -> Self {
        Goal {
            objective,
            is_persistent_if_skipped: false,
            one_step_towards: false,
            max_time_to_keep_inactive: -1,
            inactive_since: None,
            group_id: String::new(),
            allowed_deduction_id: None,
            actions_predecessors: BTreeSet::new(),
            events_predecessors: BTreeSet::new(),
            cache_uuid: None,
        }
    }

    pub fn with_persistence(mut self, is_persistent_if_skipped: bool) -> Self {
        self.is_persistent_if_skipped = is_persistent_if_skipped;
        self
    }

    pub fn with_one_step_towards(mut self, one_step_towards: bool) -> Self {
        self.one_step_towards = one_step_towards;
        self
    }

    pub fn with_max_time_to_keep_inactive(mut self, seconds: i32) -> Self {
        self.max_time_to_keep_inactive = seconds;
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn objective(&self) -> &Condition {
        &self.objective
    }

    pub fn is_persistent_if_skipped(&self) -> bool {
        self.is_persistent_if_skipped
    }

    pub fn is_one_step_towards(&self) -> bool {
        self.one_step_towards
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn set_allowed_deduction_id(&mut self, deduction_id: Option<String>) {
        self.allowed_deduction_id = deduction_id;
    }

    pub fn can_deduction_satisfy(&self, deduction_id: &str) -> bool {
        match &self.allowed_deduction_id {
            Some(allowed) => allowed == deduction_id,
            None => true,
        }
    }

    pub fn is_a_simple_fact_objective(&self) -> bool {
        matches!(self.objective, Condition::Fact(_))
    }

    /// The goal was worked on: reset the inactivity clock.
    pub fn notify_activity(&mut self, now: Option<Instant>) {
        self.inactive_since = now;
    }

    pub fn set_inactive_since_if_needed(&mut self, now: Option<Instant>) {
        if self.inactive_since.is_none() {
            self.inactive_since = now;
        }
    }

    pub fn is_inactive_for_too_long(&self, now: Option<Instant>) -> bool {
        if self.max_time_to_keep_inactive < 0 {
            return false;
        }
        match (self.inactive_since, now) {
            (Some(since), Some(now)) => {
                now.duration_since(since).as_secs() > self.max_time_to_keep_inactive as u64
            }
            _ => false,
        }
    }

    pub fn actions_predecessors(&self) -> &BTreeSet<ActionId> {
        &self.actions_predecessors
    }

    pub fn events_predecessors(&self) -> &BTreeSet<FullEventId> {
        &self.events_predecessors
    }

    /// Recompute the predecessor sets when the Domain revision moved. Direct
    /// satisfiers are matched coarsely by predicate shape; the precise work
    /// happens during the backward search, so over-matching only costs time.
    pub fn refresh_caches_if_needed(&mut self, domain: &Domain) {
        if self.cache_uuid == Some(domain.uuid()) {
            return;
        }
        self.actions_predecessors.clear();
        self.events_predecessors.clear();
        let goal_facts = self.objective.get_all_opt_facts();

        for (action_id, action) in domain.actions() {
            if !action.can_be_used_by_planner {
                continue;
            }
            let mut effect_facts = BTreeSet::new();
            if let Some(modification) = &action.effect.world_state_modification {
                effect_facts.extend(modification.get_all_opt_facts_that_can_be_modified());
            }
            if let Some(modification) = &action.effect.potential_world_state_modification {
                effect_facts.extend(modification.get_all_opt_facts_that_can_be_modified());
            }
            if can_help(&effect_facts, &goal_facts) {
                self.actions_predecessors.insert(action_id.clone());
                self.actions_predecessors
                    .extend(action.actions_predecessors_cache.iter().cloned());
                self.events_predecessors
                    .extend(action.events_predecessors_cache.iter().cloned());
            }
        }

        for (set_of_events_id, set_of_events) in domain.set_of_events() {
            for (event_id, event) in set_of_events.events() {
                let Some(facts_to_modify) = &event.facts_to_modify else {
                    continue;
                };
                let effect_facts = facts_to_modify.get_all_opt_facts_that_can_be_modified();
                if can_help(&effect_facts, &goal_facts) {
                    self.events_predecessors
                        .insert(generate_full_event_id(set_of_events_id, event_id));
                    self.actions_predecessors
                        .extend(event.actions_predecessors_cache.iter().cloned());
                    self.events_predecessors
                        .extend(event.events_predecessors_cache.iter().cloned());
                }
            }
        }
        self.cache_uuid = Some(domain.uuid());
    }
}

/// Shape-level match between what an effect can produce and what a goal
/// needs: same predicate and arity, with polarity only constrained for
/// relations (a fluent write can both establish and displace values).
fn can_help(effect_facts: &BTreeSet<FactOptional>, goal_facts: &BTreeSet<FactOptional>) -> bool {
    effect_facts.iter().any(|effect_fact| {
        goal_facts.iter().any(|goal_fact| {
            effect_fact.fact.name() == goal_fact.fact.name()
                && effect_fact.fact.arguments().len() == goal_fact.fact.arguments().len()
                && (effect_fact.fact.value().is_some()
                    || goal_fact.fact.value().is_some()
                    || effect_fact.is_fact_negated == goal_fact.is_fact_negated)
        })
    })
}

impl PartialEq for Goal {
    fn eq(&self, other: &Self) -> bool {
        self.objective == other.objective
            && self.is_persistent_if_skipped == other.is_persistent_if_skipped
            && self.one_step_towards == other.one_step_towards
            && self.group_id == other.group_id
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_persistent_if_skipped {
            write!(f, "persist(")?;
        }
        if self.one_step_towards {
            write!(f, "oneStepTowards(")?;
        }
        write!(f, "{}", self.objective)?;
        if self.one_step_towards {
            write!(f, ")")?;
        }
        if self.is_persistent_if_skipped {
            write!(f, ")")?;
        }
        Ok(())
    }
}
