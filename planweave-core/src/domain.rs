use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use uuid::Uuid;

use crate::action::Action;
use crate::effect::{
    generate_full_event_id, ActionId, ContainerId, FullEventId, SetOfEventsId,
};
use crate::error::{PlanError, Result};
use crate::event::SetOfEvents;
use crate::fact_index::FactOptionalsToId;
use crate::ontology::Ontology;
use crate::set_of_facts::SetOfConstFacts;

const REQUIREMENTS_MANAGED: &[&str] = &[
    ":strips",
    ":typing",
    ":negative-preconditions",
    ":equality",
    ":existential-preconditions",
    ":universal-preconditions",
    ":quantified-preconditions",
    ":conditional-effects",
    ":fluents",
    ":numeric-fluents",
    ":object-fluents",
    ":adl",
    ":durative-actions",
    ":derived-predicates",
    ":domain-axioms",
    ":ordered-goals",
];

#[derive(Debug, Clone, Default)]
struct PredecessorTmpData {
    invert_successions_from_actions: BTreeSet<ActionId>,
    invert_successions_from_events: BTreeSet<FullEventId>,
}

/// The immutable planning vocabulary: ontology, actions, event sets and
/// timeless facts, plus the derived succession and predecessor caches. Every
/// mutation regenerates the revision id so problem-side caches can
/// invalidate without back references.
#[derive(Debug, Clone)]
pub struct Domain {
    uuid: Uuid,
    name: String,
    ontology: Ontology,
    timeless_facts: SetOfConstFacts,
    actions: BTreeMap<ActionId, Action>,
    conditions_to_actions: FactOptionalsToId,
    set_of_events: BTreeMap<SetOfEventsId, SetOfEvents>,
    requirements: BTreeSet<String>,
}

impl Default for Domain {
    fn default() -> Self {
        Domain {
            uuid: Uuid::new_v4(),
            name: String::new(),
            ontology: Ontology::default(),
            timeless_facts: SetOfConstFacts::default(),
            actions: BTreeMap::new(),
            conditions_to_actions: FactOptionalsToId::new(),
            set_of_events: BTreeMap::new(),
            requirements: BTreeSet::new(),
        }
    }
}

impl Domain {
    pub const SET_OF_EVENTS_ID_FROM_CONSTRUCTOR: &'static str = "soe_from_constructor";

    pub fn new(actions: BTreeMap<ActionId, Action>, ontology: Ontology) -> Result<Domain> {
        Domain::with_events(actions, ontology, SetOfEvents::new())
    }

    pub fn with_events(
        actions: BTreeMap<ActionId, Action>,
        ontology: Ontology,
        set_of_events: SetOfEvents,
    ) -> Result<Domain> {
        Domain::full(
            actions,
            ontology,
            set_of_events,
            BTreeMap::new(),
            SetOfConstFacts::default(),
            String::new(),
        )
    }

    pub fn full(
        actions: BTreeMap<ActionId, Action>,
        ontology: Ontology,
        set_of_events: SetOfEvents,
        id_to_set_of_events: BTreeMap<SetOfEventsId, SetOfEvents>,
        timeless_facts: SetOfConstFacts,
        name: String,
    ) -> Result<Domain> {
        let mut res = Domain {
            uuid: Uuid::new_v4(),
            name,
            ontology,
            timeless_facts,
            actions: BTreeMap::new(),
            conditions_to_actions: FactOptionalsToId::new(),
            set_of_events: id_to_set_of_events,
            requirements: BTreeSet::new(),
        };
        for (action_id, action) in actions {
            res.add_action_without_rebuild(action_id, action);
        }
        if !set_of_events.is_empty() {
            res.set_of_events.insert(
                Domain::SET_OF_EVENTS_ID_FROM_CONSTRUCTOR.to_string(),
                set_of_events,
            );
        }
        res.update_successions()?;
        Ok(res)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn timeless_facts(&self) -> &SetOfConstFacts {
        &self.timeless_facts
    }

    pub fn actions(&self) -> &BTreeMap<ActionId, Action> {
        &self.actions
    }

    pub fn get_action(&self, action_id: &str) -> Option<&Action> {
        self.actions.get(action_id)
    }

    pub fn set_of_events(&self) -> &BTreeMap<SetOfEventsId, SetOfEvents> {
        &self.set_of_events
    }

    pub fn conditions_to_actions(&self) -> &FactOptionalsToId {
        &self.conditions_to_actions
    }

    pub fn requirements(&self) -> &BTreeSet<String> {
        &self.requirements
    }

    pub fn add_requirement(&mut self, requirement: &str) -> Result<()> {
        if !REQUIREMENTS_MANAGED.contains(&requirement) {
            return Err(PlanError::UnknownRequirement(requirement.to_string()));
        }
        self.requirements.insert(requirement.to_string());
        Ok(())
    }

    pub fn add_action(&mut self, action_id: impl Into<ActionId>, action: Action) -> Result<()> {
        self.add_action_without_rebuild(action_id.into(), action);
        self.update_successions()
    }

    fn add_action_without_rebuild(&mut self, action_id: ActionId, action: Action) {
        if self.actions.contains_key(&action_id) || action.effect.is_empty() {
            return;
        }
        let mut action = action.clone_with_derived(&self.ontology.derived_predicates);

        if action.can_be_used_by_planner {
            let const_facts = self.timeless_facts.set_of_facts();
            if action.effect.world_state_modification.is_none()
                && action.effect.potential_world_state_modification.is_none()
            {
                action.can_be_used_by_planner = false;
            } else if !const_facts.is_empty() {
                // A precondition negating a timeless fact can never hold.
                if let Some(precondition) = &action.precondition {
                    let possible = precondition.until_false(
                        &mut |fact_optional| {
                            !(fact_optional.is_fact_negated
                                && !const_facts.find(&fact_optional.fact, false).is_empty())
                        },
                        const_facts,
                    );
                    if !possible {
                        action.can_be_used_by_planner = false;
                    }
                }
            }
        }

        let usable = action.can_be_used_by_planner;
        self.actions.insert(action_id, action);
        if usable {
            self.uuid = Uuid::new_v4();
        }
    }

    pub fn remove_action(&mut self, action_id: &str) -> Result<()> {
        if self.actions.remove(action_id).is_none() {
            return Ok(());
        }
        self.uuid = Uuid::new_v4();
        self.update_successions()
    }

    pub fn add_set_of_events(
        &mut self,
        set_of_events: SetOfEvents,
        suggested_id: impl Into<SetOfEventsId>,
    ) -> Result<SetOfEventsId> {
        self.uuid = Uuid::new_v4();
        let suggested_id = suggested_id.into();
        let mut id = suggested_id.clone();
        let mut version = 2usize;
        while self.set_of_events.contains_key(&id) {
            id = format!("{suggested_id}_{version}");
            version += 1;
        }
        self.set_of_events.insert(id.clone(), set_of_events);
        self.update_successions()?;
        Ok(id)
    }

    pub fn remove_set_of_events(&mut self, set_of_events_id: &str) -> Result<()> {
        if self.set_of_events.remove(set_of_events_id).is_none() {
            return Ok(());
        }
        self.uuid = Uuid::new_v4();
        self.update_successions()
    }

    pub fn clear_events(&mut self) -> Result<()> {
        if self.set_of_events.is_empty() {
            return Ok(());
        }
        self.uuid = Uuid::new_v4();
        self.set_of_events.clear();
        self.update_successions()
    }

    /// Single-pass rebuild of every derived cache: the condition-to-action
    /// index, the per-effect successions, the without-interest sets and the
    /// predecessor closures.
    fn update_successions(&mut self) -> Result<()> {
        debug!(domain = %self.name, "rebuilding succession caches");

        // Condition-to-action index.
        let mut conditions_to_actions = FactOptionalsToId::new();
        for (action_id, action) in &self.actions {
            if !action.can_be_used_by_planner {
                continue;
            }
            if let Some(precondition) = &action.precondition {
                conditions_to_actions.add_condition(precondition, action_id);
            }
        }
        self.conditions_to_actions = conditions_to_actions;
        let condition_index = self.conditions_to_actions.clone();

        let mut event_links: BTreeMap<SetOfEventsId, FactOptionalsToId> = BTreeMap::new();
        for (set_of_events_id, set_of_events) in self.set_of_events.iter_mut() {
            set_of_events.rebuild_reachable_links();
            event_links.insert(
                set_of_events_id.clone(),
                set_of_events.reachable_event_links().clone(),
            );
        }

        // Succession caches and the fact sets the interest filter needs.
        let mut facts_from_condition_of: BTreeMap<ActionId, BTreeSet<crate::fact::FactOptional>> =
            BTreeMap::new();
        let mut facts_from_effect_of: BTreeMap<ActionId, BTreeSet<crate::fact::FactOptional>> =
            BTreeMap::new();
        for (action_id, action) in self.actions.iter_mut() {
            if !action.can_be_used_by_planner {
                continue;
            }
            let facts_from_condition = action
                .precondition
                .as_ref()
                .map(|c| c.get_all_opt_facts())
                .unwrap_or_default();
            let facts_from_effect = action.effect.get_all_opt_facts_that_can_be_modified();
            action.update_succession_cache(
                &condition_index,
                &event_links,
                action_id,
                &facts_from_condition,
            );
            facts_from_condition_of.insert(action_id.clone(), facts_from_condition);
            facts_from_effect_of.insert(action_id.clone(), facts_from_effect);
        }
        for (set_of_events_id, set_of_events) in self.set_of_events.iter_mut() {
            let ids: Vec<_> = set_of_events.events().keys().cloned().collect();
            for event_id in ids {
                let container = ContainerId::Event {
                    set_of_events_id: set_of_events_id.clone(),
                    event_id: event_id.clone(),
                };
                if let Some(event) = set_of_events.events_mut().get_mut(&event_id) {
                    if let Some(facts_to_modify) = &mut event.facts_to_modify {
                        facts_to_modify.update_successions(
                            &condition_index,
                            &event_links,
                            &container,
                            &BTreeSet::new(),
                        );
                    }
                }
            }
        }

        // Successions without interest.
        let action_ids: Vec<ActionId> = facts_from_condition_of.keys().cloned().collect();
        for action_id in &action_ids {
            let effect_facts = &facts_from_effect_of[action_id];
            let mut without_interest = BTreeSet::new();
            for other_id in &action_ids {
                let other_condition_facts = &facts_from_condition_of[other_id];
                let other_effect_facts = &facts_from_effect_of[other_id];
                if is_impossible_succession(effect_facts, other_condition_facts)
                    || !does_succession_have_an_interest(
                        effect_facts,
                        other_condition_facts,
                        other_effect_facts,
                    )
                {
                    without_interest.insert(other_id.clone());
                }
            }
            if let Some(action) = self.actions.get_mut(action_id) {
                for other_id in &without_interest {
                    action.remove_possible_succession_cache(other_id);
                }
                action.actions_successions_without_interest_cache = without_interest;
            }
        }

        // Invert successions.
        let mut action_tmp: BTreeMap<ActionId, PredecessorTmpData> = action_ids
            .iter()
            .map(|id| (id.clone(), PredecessorTmpData::default()))
            .collect();
        let mut event_tmp: BTreeMap<FullEventId, PredecessorTmpData> = BTreeMap::new();
        for (set_of_events_id, set_of_events) in &self.set_of_events {
            for event_id in set_of_events.events().keys() {
                event_tmp.insert(
                    generate_full_event_id(set_of_events_id, event_id),
                    PredecessorTmpData::default(),
                );
            }
        }

        for action_id in &action_ids {
            let successions = self.actions[action_id].get_successions();
            for following_action_id in &successions.actions {
                let tmp = action_tmp.get_mut(following_action_id).ok_or_else(|| {
                    PlanError::MissingSuccessor(following_action_id.clone())
                })?;
                tmp.invert_successions_from_actions.insert(action_id.clone());
            }
            for (set_of_events_id, event_ids) in &successions.events {
                for following_event_id in event_ids {
                    let full_event_id =
                        generate_full_event_id(set_of_events_id, following_event_id);
                    let tmp = event_tmp
                        .get_mut(&full_event_id)
                        .ok_or_else(|| PlanError::MissingSuccessor(full_event_id.clone()))?;
                    tmp.invert_successions_from_actions.insert(action_id.clone());
                }
            }
        }
        for (set_of_events_id, set_of_events) in &self.set_of_events {
            for (event_id, event) in set_of_events.events() {
                let Some(facts_to_modify) = &event.facts_to_modify else {
                    continue;
                };
                let mut successions = crate::effect::Successions::default();
                facts_to_modify.get_successions(&mut successions);
                let this_full_id = generate_full_event_id(set_of_events_id, event_id);
                for following_action_id in &successions.actions {
                    let tmp = action_tmp.get_mut(following_action_id).ok_or_else(|| {
                        PlanError::MissingSuccessor(following_action_id.clone())
                    })?;
                    tmp.invert_successions_from_events.insert(this_full_id.clone());
                }
                for (following_soe_id, event_ids) in &successions.events {
                    for following_event_id in event_ids {
                        let full_event_id =
                            generate_full_event_id(following_soe_id, following_event_id);
                        let tmp = event_tmp
                            .get_mut(&full_event_id)
                            .ok_or_else(|| PlanError::MissingSuccessor(full_event_id.clone()))?;
                        tmp.invert_successions_from_events.insert(this_full_id.clone());
                    }
                }
            }
        }

        // Predecessor closures.
        for action_id in &action_ids {
            let mut actions_out = BTreeSet::new();
            let mut events_out = BTreeSet::new();
            let tmp = &action_tmp[action_id];
            update_predecessors(
                &mut actions_out,
                &mut events_out,
                &tmp.invert_successions_from_actions,
                &tmp.invert_successions_from_events,
                &action_tmp,
                &event_tmp,
            )?;
            if let Some(action) = self.actions.get_mut(action_id) {
                action.actions_predecessors_cache = actions_out;
                action.events_predecessors_cache = events_out;
            }
        }
        for (set_of_events_id, set_of_events) in self.set_of_events.iter_mut() {
            let ids: Vec<_> = set_of_events.events().keys().cloned().collect();
            for event_id in ids {
                let full_event_id = generate_full_event_id(set_of_events_id, &event_id);
                let Some(tmp) = event_tmp.get(&full_event_id) else {
                    continue;
                };
                let mut actions_out = BTreeSet::new();
                let mut events_out = BTreeSet::new();
                update_predecessors(
                    &mut actions_out,
                    &mut events_out,
                    &tmp.invert_successions_from_actions,
                    &tmp.invert_successions_from_events,
                    &action_tmp,
                    &event_tmp,
                )?;
                if let Some(event) = set_of_events.events_mut().get_mut(&event_id) {
                    event.actions_predecessors_cache = actions_out;
                    event.events_predecessors_cache = events_out;
                }
            }
        }
        Ok(())
    }
}

/// A succession is impossible when a ground effect fact contradicts one of
/// the other action's precondition facts.
fn is_impossible_succession(
    effect_facts: &BTreeSet<crate::fact::FactOptional>,
    other_condition_facts: &BTreeSet<crate::fact::FactOptional>,
) -> bool {
    effect_facts.iter().any(|effect_fact| {
        !effect_fact.fact.has_a_parameter(false)
            && other_condition_facts.iter().any(|condition_fact| {
                effect_fact.is_fact_negated != condition_fact.is_fact_negated
                    && effect_fact.fact == condition_fact.fact
            })
    })
}

/// Whether chaining the other action after this effect can ever help.
/// Ambiguous parameter matches answer yes: the edge is explored rather than
/// silently pruned.
fn does_succession_have_an_interest(
    effect_facts: &BTreeSet<crate::fact::FactOptional>,
    other_condition_facts: &BTreeSet<crate::fact::FactOptional>,
    other_effect_facts: &BTreeSet<crate::fact::FactOptional>,
) -> bool {
    for effect_fact in effect_facts {
        if effect_fact.fact.has_a_parameter(true) {
            return true;
        }

        if effect_fact.fact.value().is_some_and(|v| v.is_any_entity()) {
            for condition_fact in other_condition_facts {
                if effect_fact.is_fact_negated == condition_fact.is_fact_negated
                    && effect_fact
                        .fact
                        .equal_except_any_entities_and_value(&condition_fact.fact, None, None)
                {
                    return true;
                }
            }
        }

        if effect_fact
            .fact
            .value()
            .is_none_or(|v| !v.is_a_parameter_to_fill())
        {
            let cancelled = other_condition_facts.iter().any(|condition_fact| {
                effect_fact.is_fact_negated != condition_fact.is_fact_negated
                    && effect_fact.fact == condition_fact.fact
            });
            if cancelled {
                return false;
            }
        }

        if !other_effect_facts.is_empty()
            && other_effect_facts.iter().all(|other_effect_fact| {
                effect_fact
                    .fact
                    .gives_interest_for_successor(&other_effect_fact.fact)
            })
        {
            return true;
        }
    }
    false
}

fn update_predecessors(
    actions_out: &mut BTreeSet<ActionId>,
    events_out: &mut BTreeSet<FullEventId>,
    invert_successions_from_actions: &BTreeSet<ActionId>,
    invert_successions_from_events: &BTreeSet<FullEventId>,
    action_tmp: &BTreeMap<ActionId, PredecessorTmpData>,
    event_tmp: &BTreeMap<FullEventId, PredecessorTmpData>,
) -> Result<()> {
    for action_id in invert_successions_from_actions {
        if !actions_out.insert(action_id.clone()) {
            continue;
        }
        let tmp = action_tmp
            .get(action_id)
            .ok_or_else(|| PlanError::MissingSuccessor(action_id.clone()))?;
        update_predecessors(
            actions_out,
            events_out,
            &tmp.invert_successions_from_actions,
            &tmp.invert_successions_from_events,
            action_tmp,
            event_tmp,
        )?;
    }
    for full_event_id in invert_successions_from_events {
        if !events_out.insert(full_event_id.clone()) {
            continue;
        }
        let tmp = event_tmp
            .get(full_event_id)
            .ok_or_else(|| PlanError::MissingSuccessor(full_event_id.clone()))?;
        update_predecessors(
            actions_out,
            events_out,
            &tmp.invert_successions_from_actions,
            &tmp.invert_successions_from_events,
            action_tmp,
            event_tmp,
        )?;
    }
    Ok(())
}
