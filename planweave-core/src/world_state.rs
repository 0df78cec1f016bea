use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use tracing::trace;

use crate::bindings::ParamValues;
use crate::callbacks::{CallbackId, SetOfCallbacks, Signal};
use crate::effect::{EventId, SetOfEventsId, WorldStateModification};
use crate::entity::{Entity, Parameter, SetOfEntities};
use crate::error::{PlanError, Result};
use crate::event::{Event, SetOfEvents};
use crate::fact::{Fact, FactOptional};
use crate::goal::Goal;
use crate::goal_stack::GoalStack;
use crate::ontology::Ontology;
use crate::set_of_facts::SetOfFacts;

/// Everything a world-state mutation needs from its surroundings: the
/// domain's events and ontology, the registered callbacks, the problem
/// objects and the caller-supplied clock.
#[derive(Clone, Copy)]
pub struct ModificationParams<'a> {
    pub set_of_events: &'a BTreeMap<SetOfEventsId, SetOfEvents>,
    pub callbacks: &'a SetOfCallbacks,
    pub ontology: &'a Ontology,
    pub objects: &'a SetOfEntities,
    pub now: Option<Instant>,
}

/// Change record of one mutation: the basis for goal cleanup, the event
/// cascade, callback invocation and the observer signals.
#[derive(Debug, Clone, Default)]
pub struct WhatChanged {
    pub punctual_facts: BTreeSet<Fact>,
    pub added_facts: BTreeSet<Fact>,
    pub removed_facts: BTreeSet<Fact>,
}

impl WhatChanged {
    pub fn something_changed(&self) -> bool {
        !self.punctual_facts.is_empty()
            || !self.added_facts.is_empty()
            || !self.removed_facts.is_empty()
    }

    pub fn has_facts_to_modify_in_the_world_for_sure(&self) -> bool {
        !self.added_facts.is_empty() || !self.removed_facts.is_empty()
    }
}

/// The mutable fact set of a problem, with its change-notification pipeline:
/// fluent displacement, event cascading to fixed point, condition callbacks
/// and observer signals. Cloning keeps the facts and drops the observers, so
/// lookahead clones never notify.
pub struct WorldState {
    facts_mapping: SetOfFacts,
    pub on_facts_changed: Signal<BTreeMap<Fact, bool>>,
    pub on_punctual_facts: Signal<BTreeSet<Fact>>,
    pub on_facts_added: Signal<BTreeSet<Fact>>,
    pub on_facts_removed: Signal<BTreeSet<Fact>>,
}

impl Default for WorldState {
    fn default() -> Self {
        WorldState::new()
    }
}

impl Clone for WorldState {
    fn clone(&self) -> Self {
        WorldState {
            facts_mapping: self.facts_mapping.clone(),
            on_facts_changed: Signal::new(),
            on_punctual_facts: Signal::new(),
            on_facts_added: Signal::new(),
            on_facts_removed: Signal::new(),
        }
    }
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.facts_mapping.facts().keys()).finish()
    }
}

impl WorldState {
    pub fn new() -> Self {
        WorldState {
            facts_mapping: SetOfFacts::new(),
            on_facts_changed: Signal::new(),
            on_punctual_facts: Signal::new(),
            on_facts_added: Signal::new(),
            on_facts_removed: Signal::new(),
        }
    }

    /// A world state seeded with the domain's timeless facts.
    pub fn from_facts(facts: &SetOfFacts) -> Self {
        WorldState {
            facts_mapping: facts.clone(),
            ..WorldState::new()
        }
    }

    pub fn facts_mapping(&self) -> &SetOfFacts {
        &self.facts_mapping
    }

    pub fn facts(&self) -> &BTreeMap<Fact, bool> {
        self.facts_mapping.facts()
    }

    pub fn has_fact(&self, fact: &Fact) -> bool {
        self.facts_mapping.contains(fact)
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    pub fn add_fact(
        &mut self,
        fact: &Fact,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
        can_facts_be_removed: bool,
    ) -> Result<bool> {
        self.add_facts(
            std::slice::from_ref(fact),
            goal_stack,
            params,
            can_facts_be_removed,
        )
    }

    pub fn add_facts(
        &mut self,
        facts: &[Fact],
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
        can_facts_be_removed: bool,
    ) -> Result<bool> {
        let mut what_changed = WhatChanged::default();
        for fact in facts {
            self.add_a_fact(&mut what_changed, fact, goal_stack, params, can_facts_be_removed)?;
        }
        goal_stack.remove_no_stackable_goals(
            self,
            &params.ontology.constants,
            params.objects,
            params.now,
            None,
        );
        let mut goal_changed = false;
        self.notify_what_changed(&mut what_changed, &mut goal_changed, goal_stack, params)?;
        Ok(what_changed.has_facts_to_modify_in_the_world_for_sure())
    }

    pub fn remove_fact(
        &mut self,
        fact: &Fact,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
    ) -> Result<bool> {
        self.remove_facts(std::slice::from_ref(fact), goal_stack, params)
    }

    pub fn remove_facts(
        &mut self,
        facts: &[Fact],
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
    ) -> Result<bool> {
        let mut what_changed = WhatChanged::default();
        for fact in facts {
            self.remove_a_fact(&mut what_changed, fact)?;
        }
        goal_stack.remove_no_stackable_goals(
            self,
            &params.ontology.constants,
            params.objects,
            params.now,
            None,
        );
        let mut goal_changed = false;
        self.notify_what_changed(&mut what_changed, &mut goal_changed, goal_stack, params)?;
        Ok(what_changed.has_facts_to_modify_in_the_world_for_sure())
    }

    /// Remove every fact holding one of the given entities, e.g. when
    /// objects leave the problem. Fails with `ImmutableFact` before touching
    /// anything when a held fact is timeless.
    pub fn remove_facts_holding_entities(
        &mut self,
        entity_ids: &BTreeSet<String>,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
    ) -> Result<bool> {
        let mut facts_to_remove = Vec::new();
        for (fact, removable) in self.facts_mapping.facts() {
            if entity_ids.iter().any(|id| fact.has_entity(id)) {
                if !removable {
                    return Err(PlanError::ImmutableFact(fact.to_string()));
                }
                facts_to_remove.push(fact.clone());
            }
        }
        self.remove_facts(&facts_to_remove, goal_stack, params)
    }

    /// Resolve an effect into additions and removals and apply them.
    pub fn modify(
        &mut self,
        modification: Option<&WorldStateModification>,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
        can_facts_be_removed: bool,
    ) -> Result<bool> {
        let mut what_changed = WhatChanged::default();
        self.modify_internal(
            &mut what_changed,
            modification,
            goal_stack,
            params,
            can_facts_be_removed,
        )?;
        let mut goal_changed = false;
        self.notify_what_changed(&mut what_changed, &mut goal_changed, goal_stack, params)?;
        Ok(what_changed.has_facts_to_modify_in_the_world_for_sure())
    }

    /// Planner entry point: apply an action effect under a grounding.
    pub fn apply_effect(
        &mut self,
        parameters: &BTreeMap<Parameter, Entity>,
        modification: Option<&WorldStateModification>,
        goal_changed: &mut bool,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
    ) -> Result<()> {
        let mut what_changed = WhatChanged::default();
        if let Some(modification) = modification {
            if parameters.is_empty() {
                self.modify_internal(&mut what_changed, Some(modification), goal_stack, params, true)?;
            } else {
                let grounded = modification.clone_with(Some(parameters));
                self.modify_internal(&mut what_changed, Some(&grounded), goal_stack, params, true)?;
            }
        }
        self.notify_what_changed(&mut what_changed, goal_changed, goal_stack, params)
    }

    /// Bulk load from the parenthesized fact form; `(not ...)` entries are
    /// removals.
    pub fn modify_facts_from_pddl(
        &mut self,
        text: &str,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
        can_facts_be_removed: bool,
    ) -> Result<bool> {
        let parsed = crate::parse::parse_pddl_facts(text, params.ontology, params.objects)?;
        let mut what_changed = WhatChanged::default();
        for (fact, is_negated) in parsed {
            if is_negated {
                self.remove_a_fact(&mut what_changed, &fact)?;
            } else {
                self.add_a_fact(&mut what_changed, &fact, goal_stack, params, can_facts_be_removed)?;
            }
        }
        goal_stack.remove_no_stackable_goals(
            self,
            &params.ontology.constants,
            params.objects,
            params.now,
            None,
        );
        let mut goal_changed = false;
        self.notify_what_changed(&mut what_changed, &mut goal_changed, goal_stack, params)?;
        Ok(what_changed.has_facts_to_modify_in_the_world_for_sure())
    }

    pub fn set_facts(
        &mut self,
        facts: BTreeSet<Fact>,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
    ) -> Result<()> {
        self.facts_mapping.clear();
        for fact in facts {
            self.facts_mapping.add(fact, true);
        }
        goal_stack.remove_no_stackable_goals(
            self,
            &params.ontology.constants,
            params.objects,
            params.now,
            None,
        );
        let mut what_changed = WhatChanged::default();
        let mut goal_changed = false;
        self.notify_what_changed(&mut what_changed, &mut goal_changed, goal_stack, params)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_optional_fact_satisfied(&self, fact_optional: &FactOptional) -> bool {
        let present = self.facts_mapping.contains(&fact_optional.fact);
        if fact_optional.is_fact_negated {
            !present
        } else {
            present
        }
    }

    /// Satisfaction under a specific context of one-shot facts, freshly
    /// removed facts and candidate parameter bindings.
    pub fn is_optional_fact_satisfied_in_context(
        &self,
        fact_optional: &FactOptional,
        punctual_facts: &BTreeSet<Fact>,
        removed_facts: &BTreeSet<Fact>,
        mut parameters: Option<&mut ParamValues>,
        mut parameters_to_modify_in_place: Option<&mut ParamValues>,
    ) -> bool {
        if fact_optional.fact.is_punctual() && !fact_optional.is_fact_negated {
            return punctual_facts.contains(&fact_optional.fact);
        }

        let mut new_parameters = ParamValues::new();
        if fact_optional.is_fact_negated {
            let res = fact_optional.fact.is_in_other_facts(
                removed_facts,
                Some(&mut new_parameters),
                false,
                parameters.as_deref(),
                parameters_to_modify_in_place.as_deref_mut(),
                None,
            );
            if res {
                if let Some(params) = parameters.as_deref_mut() {
                    params.apply_new_params(new_parameters);
                }
                return true;
            }

            if fact_optional
                .fact
                .value()
                .is_some_and(|v| v.is_a_parameter_to_fill())
            {
                let fact_matching = self.facts_mapping.find(&fact_optional.fact, true);
                if !fact_matching.is_empty() {
                    if let Some(params) = parameters.as_deref_mut() {
                        if let Some(present) =
                            is_present_with_another_value(&fact_optional.fact, &fact_matching, params)
                        {
                            return !present;
                        }
                    }

                    let mut new_potential = ParamValues::new();
                    let mut new_potential_in_place = ParamValues::new();
                    let mut none_matched = true;
                    for stored in &fact_matching {
                        if fact_optional.fact.is_in_other_fact(
                            stored,
                            &mut new_potential,
                            parameters.as_deref(),
                            &mut new_potential_in_place,
                            parameters_to_modify_in_place.as_deref(),
                        ) {
                            none_matched = false;
                        }
                    }
                    if none_matched {
                        return true;
                    }
                    let mut committed = ParamValues::new();
                    return !fact_optional.fact.update_parameters(
                        new_potential,
                        new_potential_in_place,
                        Some(&mut committed),
                        true,
                        parameters.as_deref(),
                        parameters_to_modify_in_place,
                        None,
                    );
                }
            }
        }

        let res = fact_optional.fact.is_in_other_facts_map(
            &self.facts_mapping,
            Some(&mut new_parameters),
            false,
            parameters.as_deref(),
            parameters_to_modify_in_place,
            None,
        );
        if let Some(params) = parameters.as_deref_mut() {
            params.apply_new_params(new_parameters);
        }
        if fact_optional.is_fact_negated {
            !res
        } else {
            res
        }
    }

    pub fn is_goal_satisfied(
        &self,
        goal: &Goal,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
    ) -> bool {
        goal.objective().is_true(
            self,
            constants,
            objects,
            &BTreeSet::new(),
            &BTreeSet::new(),
            None,
            false,
        )
    }

    /// Would asserting (or retracting) this fact change the world under the
    /// candidate bindings.
    pub fn can_be_modified_by(
        &self,
        fact_optional: &FactOptional,
        arguments_to_filter: &mut ParamValues,
    ) -> bool {
        if fact_optional.is_fact_negated
            && fact_optional
                .fact
                .value()
                .is_some_and(|v| v.is_a_parameter_to_fill())
        {
            let fact_matching = self.facts_mapping.find(&fact_optional.fact, true);
            if !fact_matching.is_empty() {
                if let Some(present) = is_present_with_another_value(
                    &fact_optional.fact,
                    &fact_matching,
                    arguments_to_filter,
                ) {
                    return present;
                }
            }
        }

        let res = fact_optional
            .fact
            .can_modify_set_of_facts(&self.facts_mapping, arguments_to_filter);
        if fact_optional.is_fact_negated {
            !res
        } else {
            res
        }
    }

    pub fn iterate_on_matching_facts_without_value(
        &self,
        callback: &mut dyn FnMut(&Fact) -> bool,
        fact: &Fact,
        parameters_to_consider_as_any_value: &ParamValues,
        parameters_to_consider_as_any_value2: Option<&ParamValues>,
    ) {
        for stored in self.facts_mapping.find(fact, true) {
            if stored.equal_except_any_entities_and_value(
                fact,
                Some(parameters_to_consider_as_any_value),
                parameters_to_consider_as_any_value2,
            ) && callback(&stored)
            {
                break;
            }
        }
    }

    pub fn iterate_on_matching_facts(
        &self,
        callback: &mut dyn FnMut(&Fact) -> bool,
        fact: &Fact,
        parameters_to_consider_as_any_value: &ParamValues,
        parameters_to_consider_as_any_value2: Option<&ParamValues>,
    ) {
        for stored in self.facts_mapping.find(fact, false) {
            if stored.equal_except_any_entities(
                fact,
                Some(parameters_to_consider_as_any_value),
                parameters_to_consider_as_any_value2,
                None,
            ) && callback(&stored)
            {
                break;
            }
        }
    }

    pub fn has_entity(&self, entity_id: &str) -> bool {
        self.facts_mapping
            .facts()
            .keys()
            .any(|fact| fact.has_entity(entity_id))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// One fact insertion, displacing conflicting fluent values first. This
    /// is the only place where a single add can cascade removals.
    fn add_a_fact(
        &mut self,
        what_changed: &mut WhatChanged,
        fact: &Fact,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
        can_facts_be_removed: bool,
    ) -> Result<()> {
        if fact.is_punctual() {
            what_changed.punctual_facts.insert(fact.clone());
            return Ok(());
        }
        if self.facts_mapping.contains(fact) {
            return Ok(());
        }

        let mut skip_this_fact = false;
        loop {
            let mut a_fact_was_removed = false;
            let matching = self.facts_mapping.find(fact, true);
            for existing in &matching {
                if fact.is_value_negated()
                    && !existing.is_value_negated()
                    && fact.value() != existing.value()
                {
                    skip_this_fact = true;
                }

                if fact.arguments() == existing.arguments()
                    && ((!fact.is_value_negated()
                        && !existing.is_value_negated()
                        && fact.value() != existing.value())
                        || (fact.is_value_negated()
                            && !existing.is_value_negated()
                            && fact.value() == existing.value())
                        || (!fact.is_value_negated() && existing.is_value_negated()))
                {
                    let mut sub_what_changed = WhatChanged::default();
                    self.remove_a_fact(&mut sub_what_changed, existing)?;
                    goal_stack.remove_no_stackable_goals(
                        self,
                        &params.ontology.constants,
                        params.objects,
                        params.now,
                        None,
                    );
                    let mut goal_changed = false;
                    self.notify_what_changed(
                        &mut sub_what_changed,
                        &mut goal_changed,
                        goal_stack,
                        params,
                    )?;
                    a_fact_was_removed = true;
                    break;
                }
                if skip_this_fact {
                    break;
                }
            }
            if !a_fact_was_removed {
                break;
            }
        }

        if !skip_this_fact {
            what_changed.added_facts.insert(fact.clone());
            self.facts_mapping.add(fact.clone(), can_facts_be_removed);
        }
        Ok(())
    }

    fn remove_a_fact(&mut self, what_changed: &mut WhatChanged, fact: &Fact) -> Result<()> {
        if self.facts_mapping.erase(fact)? {
            what_changed.removed_facts.insert(fact.clone());
        }
        Ok(())
    }

    fn modify_internal(
        &mut self,
        what_changed: &mut WhatChanged,
        modification: Option<&WorldStateModification>,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
        can_facts_be_removed: bool,
    ) -> Result<()> {
        let Some(modification) = modification else {
            return Ok(());
        };

        let mut facts_to_add = Vec::new();
        let mut facts_to_remove = Vec::new();
        modification.for_all(
            &mut |fact_optional| {
                if fact_optional.is_fact_negated {
                    facts_to_remove.push(fact_optional.fact.clone());
                } else {
                    facts_to_add.push(fact_optional.fact.clone());
                }
            },
            &self.facts_mapping,
            &params.ontology.constants,
            params.objects,
        );

        for fact in &facts_to_add {
            self.add_a_fact(what_changed, fact, goal_stack, params, can_facts_be_removed)?;
        }
        for fact in &facts_to_remove {
            if fact.value().is_some_and(|v| v.is_any_entity()) {
                // Retracting `f(args)=*` undefines the fluent whatever its
                // stored value.
                let matching = self.facts_mapping.find(fact, true);
                for stored in matching {
                    if stored.arguments() == fact.arguments() {
                        self.remove_a_fact(what_changed, &stored)?;
                    }
                }
            } else {
                self.remove_a_fact(what_changed, fact)?;
            }
        }
        goal_stack.remove_no_stackable_goals(
            self,
            &params.ontology.constants,
            params.objects,
            params.now,
            None,
        );
        Ok(())
    }

    /// The change-notification pass: cascade events to fixed point, invoke
    /// condition callbacks once each, then publish the observer signals.
    fn notify_what_changed(
        &mut self,
        what_changed: &mut WhatChanged,
        goal_changed: &mut bool,
        goal_stack: &mut GoalStack,
        params: &ModificationParams<'_>,
    ) -> Result<()> {
        if !what_changed.something_changed() {
            return Ok(());
        }

        let mut events_already_applied: BTreeMap<SetOfEventsId, BTreeSet<EventId>> =
            BTreeMap::new();
        let mut callbacks_already_called: BTreeSet<CallbackId> = BTreeSet::new();

        let mut need_another_loop = true;
        while need_another_loop {
            need_another_loop = false;

            for (set_of_events_id, set_of_events) in params.set_of_events {
                let links = set_of_events.reachable_event_links();
                let mut candidate_events: Vec<EventId> = Vec::new();
                let punctual = what_changed.punctual_facts.clone();
                let added = what_changed.added_facts.clone();
                let removed = what_changed.removed_facts.clone();
                for fact in punctual.iter().chain(added.iter()) {
                    links.find_fact(
                        &mut |event_id| {
                            candidate_events.push(event_id.to_string());
                            true
                        },
                        fact,
                        false,
                        false,
                        false,
                    );
                }
                for fact in &removed {
                    links.find_fact(
                        &mut |event_id| {
                            candidate_events.push(event_id.to_string());
                            true
                        },
                        fact,
                        true,
                        false,
                        false,
                    );
                }

                let already_applied = events_already_applied
                    .entry(set_of_events_id.clone())
                    .or_default();
                for event_id in candidate_events {
                    if self.try_to_apply_event(
                        already_applied,
                        what_changed,
                        goal_changed,
                        goal_stack,
                        &event_id,
                        set_of_events.events(),
                        params,
                    )? {
                        need_another_loop = true;
                    }
                }
            }

            if !params.callbacks.is_empty() {
                let mut candidate_callbacks: Vec<CallbackId> = Vec::new();
                let links = params.callbacks.conditions_to_ids();
                for fact in what_changed
                    .punctual_facts
                    .iter()
                    .chain(what_changed.added_facts.iter())
                {
                    links.find_fact(
                        &mut |id| {
                            candidate_callbacks.push(id.to_string());
                            true
                        },
                        fact,
                        false,
                        false,
                        false,
                    );
                }
                for fact in &what_changed.removed_facts {
                    links.find_fact(
                        &mut |id| {
                            candidate_callbacks.push(id.to_string());
                            true
                        },
                        fact,
                        true,
                        false,
                        false,
                    );
                }
                for callback_id in candidate_callbacks {
                    if callbacks_already_called.contains(&callback_id) {
                        continue;
                    }
                    let Some(registered) = params.callbacks.callbacks().get(&callback_id) else {
                        continue;
                    };
                    let mut parameters_to_values =
                        ParamValues::from_parameters(&registered.parameters);
                    if registered.condition.is_true(
                        self,
                        &params.ontology.constants,
                        params.objects,
                        &what_changed.punctual_facts,
                        &what_changed.removed_facts,
                        Some(&mut parameters_to_values),
                        false,
                    ) {
                        callbacks_already_called.insert(callback_id);
                        (registered.callback)();
                    }
                }
            }
        }

        if !what_changed.punctual_facts.is_empty() {
            self.on_punctual_facts.emit(&what_changed.punctual_facts);
        }
        if !what_changed.added_facts.is_empty() {
            self.on_facts_added.emit(&what_changed.added_facts);
        }
        if !what_changed.removed_facts.is_empty() {
            self.on_facts_removed.emit(&what_changed.removed_facts);
        }
        if what_changed.has_facts_to_modify_in_the_world_for_sure() {
            self.on_facts_changed.emit(self.facts_mapping.facts());
        }
        Ok(())
    }

    /// Fire one event at most once per cascade: re-evaluate its precondition
    /// on the current world, then apply its effects for every grounding.
    #[allow(clippy::too_many_arguments)]
    fn try_to_apply_event(
        &mut self,
        events_already_applied: &mut BTreeSet<EventId>,
        what_changed: &mut WhatChanged,
        goal_changed: &mut bool,
        goal_stack: &mut GoalStack,
        event_id: &str,
        events: &BTreeMap<EventId, Event>,
        params: &ModificationParams<'_>,
    ) -> Result<bool> {
        if !events_already_applied.insert(event_id.to_string()) {
            return Ok(false);
        }
        let Some(event) = events.get(event_id) else {
            return Ok(false);
        };

        let mut parameters_to_values = ParamValues::from_parameters(&event.parameters);
        let precondition_holds = match &event.precondition {
            None => true,
            Some(condition) => condition.is_true(
                self,
                &params.ontology.constants,
                params.objects,
                &what_changed.punctual_facts,
                &what_changed.removed_facts,
                Some(&mut parameters_to_values),
                false,
            ),
        };
        if !precondition_holds {
            return Ok(false);
        }
        trace!(event_id, "event fired");

        if let Some(facts_to_modify) = &event.facts_to_modify {
            if !parameters_to_values.is_empty() {
                let groundings = parameters_to_values.unfold();
                if !groundings.is_empty() {
                    for grounding in groundings {
                        let grounded = facts_to_modify.clone_with(Some(&grounding));
                        self.modify_internal(what_changed, Some(&grounded), goal_stack, params, true)?;
                    }
                } else if let Some(opt_fact) = facts_to_modify.get_optional_fact() {
                    // No grounding: a negated effect still removes every
                    // matching stored fact.
                    if opt_fact.is_fact_negated {
                        let mut facts_to_remove = Vec::new();
                        self.iterate_on_matching_facts(
                            &mut |stored| {
                                facts_to_remove.push(stored.clone());
                                false
                            },
                            &opt_fact.fact,
                            &parameters_to_values,
                            None,
                        );
                        for stored in facts_to_remove {
                            self.remove_a_fact(what_changed, &stored)?;
                        }
                        goal_stack.remove_no_stackable_goals(
                            self,
                            &params.ontology.constants,
                            params.objects,
                            params.now,
                            None,
                        );
                    }
                }
            } else {
                self.modify_internal(what_changed, Some(facts_to_modify), goal_stack, params, true)?;
            }
        }
        if goal_stack.add_goals(&event.goals_to_add) {
            *goal_changed = true;
        }
        Ok(true)
    }
}

/// For a negated fluent pattern whose value is a parameter: is the fact
/// present with some value, and which one. Candidate bindings are refined to
/// that stored value.
fn is_present_with_another_value(
    fact: &Fact,
    matching: &[Fact],
    arguments_to_filter: &mut ParamValues,
) -> Option<bool> {
    for grounding in arguments_to_filter.unfold() {
        let mut fact_to_compare = fact.clone();
        fact_to_compare.replace_arguments(&grounding);
        if fact_to_compare.value().is_some_and(|v| v.is_any_entity()) {
            for stored in matching {
                if stored.equal_except_any_entities(&fact_to_compare, None, None, None) {
                    if let Some(stored_value) = stored.value() {
                        if Some(stored_value) == fact.value() {
                            return Some(false);
                        }
                        let mut new_parameters = ParamValues::new();
                        if let Some(pattern_value) = fact.value() {
                            new_parameters
                                .insert(pattern_value.to_parameter(), stored_value.clone());
                        }
                        arguments_to_filter.apply_new_params(new_parameters);
                    }
                    return Some(true);
                }
            }
            return Some(false);
        }
    }
    if fact.value().is_some_and(|v| v.is_any_entity()) {
        return Some(true);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, SetOfEvents};
    use crate::ontology::Ontology;
    use crate::parse::{parse_condition, parse_effect};
    use crate::predicate::SetOfPredicates;
    use crate::set_of_facts::SetOfConstFacts;
    use crate::types::SetOfTypes;

    fn ontology() -> Ontology {
        let types = SetOfTypes::from_pddl("entity\nvalue_type");
        let predicates = SetOfPredicates::from_str(
            "pred_a(?e - entity)\n\
             pred_b\n\
             f(?e - entity) - value_type\n\
             counter - number\n\
             limit - number\n\
             reached\n\
             ~punctual~ping",
            &types,
        )
        .unwrap();
        let constants = SetOfEntities::from_pddl(
            "x y - entity\n\
             v w - value_type",
            &types,
        )
        .unwrap();
        Ontology {
            types,
            predicates,
            constants,
            derived_predicates: Default::default(),
        }
    }

    fn fact(onto: &Ontology, s: &str) -> Fact {
        Fact::from_str(s, onto, &SetOfEntities::new(), &[]).unwrap()
    }

    fn params<'a>(
        set_of_events: &'a BTreeMap<SetOfEventsId, SetOfEvents>,
        callbacks: &'a SetOfCallbacks,
        onto: &'a Ontology,
        objects: &'a SetOfEntities,
    ) -> ModificationParams<'a> {
        ModificationParams {
            set_of_events,
            callbacks,
            ontology: onto,
            objects,
            now: None,
        }
    }

    #[test]
    fn test_fluent_displacement() {
        let onto = ontology();
        let no_events = BTreeMap::new();
        let callbacks = SetOfCallbacks::new();
        let objects = SetOfEntities::new();
        let ctx = params(&no_events, &callbacks, &onto, &objects);

        let mut world = WorldState::new();
        let mut goal_stack = GoalStack::new();
        world
            .add_fact(&fact(&onto, "f(x)=w"), &mut goal_stack, &ctx, true)
            .unwrap();
        world
            .add_fact(&fact(&onto, "f(x)=v"), &mut goal_stack, &ctx, true)
            .unwrap();
        assert!(world.has_fact(&fact(&onto, "f(x)=v")));
        assert!(!world.has_fact(&fact(&onto, "f(x)=w")));
        assert_eq!(1, world.facts().len());
    }

    #[test]
    fn test_punctual_fact_is_not_stored() {
        let onto = ontology();
        let no_events = BTreeMap::new();
        let callbacks = SetOfCallbacks::new();
        let objects = SetOfEntities::new();
        let ctx = params(&no_events, &callbacks, &onto, &objects);

        let mut world = WorldState::new();
        let mut goal_stack = GoalStack::new();
        world
            .add_fact(&fact(&onto, "~punctual~ping"), &mut goal_stack, &ctx, true)
            .unwrap();
        assert!(world.facts().is_empty());
    }

    #[test]
    fn test_timeless_fact_cannot_be_removed() {
        let onto = ontology();
        let no_events = BTreeMap::new();
        let callbacks = SetOfCallbacks::new();
        let objects = SetOfEntities::new();
        let ctx = params(&no_events, &callbacks, &onto, &objects);

        let mut timeless = SetOfConstFacts::new();
        timeless.add(fact(&onto, "pred_b"));
        let mut world = WorldState::from_facts(timeless.set_of_facts());
        let mut goal_stack = GoalStack::new();

        let err = world
            .remove_fact(&fact(&onto, "pred_b"), &mut goal_stack, &ctx)
            .unwrap_err();
        assert!(matches!(err, PlanError::ImmutableFact(_)));
        assert!(world.has_fact(&fact(&onto, "pred_b")));
    }

    #[test]
    fn test_event_cascade_until_fixed_point() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        // counter = limit fires "reached"; "reached" fires "pred_b".
        let mut set_of_events = SetOfEvents::new();
        set_of_events.add(Event::new(
            parse_condition("equals(counter, limit)", &onto, &objects, &[]).unwrap(),
            parse_effect("reached", &onto, &objects, &[]).unwrap(),
        ));
        set_of_events.add(Event::new(
            parse_condition("reached", &onto, &objects, &[]).unwrap(),
            parse_effect("pred_b", &onto, &objects, &[]).unwrap(),
        ));
        let mut events_by_id = BTreeMap::new();
        events_by_id.insert("soe".to_string(), set_of_events);
        let callbacks = SetOfCallbacks::new();
        let ctx = params(&events_by_id, &callbacks, &onto, &objects);

        let mut world = WorldState::new();
        let mut goal_stack = GoalStack::new();
        let modification = parse_effect("limit=2 & counter=2", &onto, &objects, &[]).unwrap();
        world
            .modify(Some(&modification), &mut goal_stack, &ctx, true)
            .unwrap();

        assert!(world.has_fact(&fact(&onto, "reached")));
        assert!(world.has_fact(&fact(&onto, "pred_b")));
    }

    #[test]
    fn test_condition_callback_fired_once() {
        use std::cell::Cell;
        use std::rc::Rc;

        let onto = ontology();
        let objects = SetOfEntities::new();
        let no_events = BTreeMap::new();
        let mut callbacks = SetOfCallbacks::new();
        let fired = Rc::new(Cell::new(0));
        let fired_in_callback = Rc::clone(&fired);
        callbacks.add(crate::callbacks::ConditionToCallback {
            parameters: Vec::new(),
            condition: parse_condition("pred_b", &onto, &objects, &[]).unwrap(),
            callback: Box::new(move || fired_in_callback.set(fired_in_callback.get() + 1)),
        });
        let ctx = params(&no_events, &callbacks, &onto, &objects);

        let mut world = WorldState::new();
        let mut goal_stack = GoalStack::new();
        world
            .add_fact(&fact(&onto, "pred_b"), &mut goal_stack, &ctx, true)
            .unwrap();
        assert_eq!(1, fired.get());
        world
            .add_fact(&fact(&onto, "pred_b"), &mut goal_stack, &ctx, true)
            .unwrap();
        assert_eq!(1, fired.get());
    }

    #[test]
    fn test_observer_signals_are_not_cloned() {
        let onto = ontology();
        let mut world = WorldState::new();
        world.on_facts_added.connect(|_| {});
        assert!(!world.on_facts_added.is_empty());
        let cloned = world.clone();
        assert!(cloned.on_facts_added.is_empty());
        drop(onto);
    }

    #[test]
    fn test_remove_facts_holding_entities() {
        let onto = ontology();
        let no_events = BTreeMap::new();
        let callbacks = SetOfCallbacks::new();
        let objects = SetOfEntities::new();
        let ctx = params(&no_events, &callbacks, &onto, &objects);

        let mut world = WorldState::new();
        let mut goal_stack = GoalStack::new();
        world
            .add_fact(&fact(&onto, "pred_a(x)"), &mut goal_stack, &ctx, true)
            .unwrap();
        world
            .add_fact(&fact(&onto, "pred_a(y)"), &mut goal_stack, &ctx, true)
            .unwrap();
        world
            .add_fact(&fact(&onto, "f(x)=v"), &mut goal_stack, &ctx, true)
            .unwrap();

        let mut to_remove = BTreeSet::new();
        to_remove.insert("x".to_string());
        world
            .remove_facts_holding_entities(&to_remove, &mut goal_stack, &ctx)
            .unwrap();
        assert_eq!(1, world.facts().len());
        assert!(world.has_fact(&fact(&onto, "pred_a(y)")));
    }
}
