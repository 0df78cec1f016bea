use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::bindings::ParamValues;
use crate::condition::{minus_entities, multiply_entities, plus_entities};
use crate::entity::{type_to_entities, Entity, Parameter, SetOfEntities};
use crate::fact::{Fact, FactOptional};
use crate::fact_index::FactOptionalsToId;
use crate::number::Number;
use crate::set_of_facts::SetOfFacts;
use crate::world_state::WorldState;

pub type ActionId = String;
pub type EventId = String;
pub type SetOfEventsId = String;
/// `"<setOfEventsId>|<eventId>"`.
pub type FullEventId = String;

pub fn generate_full_event_id(set_of_events_id: &str, event_id: &str) -> FullEventId {
    format!("{set_of_events_id}|{event_id}")
}

/// Identity of the action or event owning an effect, so an effect does not
/// record itself as its own successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerId {
    Action(ActionId),
    Event {
        set_of_events_id: SetOfEventsId,
        event_id: EventId,
    },
}

/// Actions and events whose precondition can be enabled by one producing
/// node of an effect tree. This is what the planner walks backwards from
/// goals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Successions {
    pub actions: BTreeSet<ActionId>,
    pub events: BTreeMap<SetOfEventsId, BTreeSet<EventId>>,
}

impl Successions {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.events.clear();
    }

    pub fn add(&mut self, other: &Successions) {
        self.actions.extend(other.actions.iter().cloned());
        for (set_of_events_id, event_ids) in &other.events {
            self.events
                .entry(set_of_events_id.clone())
                .or_default()
                .extend(event_ids.iter().cloned());
        }
    }

    fn compute_for_opt_fact(
        fact_optional: &FactOptional,
        conditions_to_actions: &FactOptionalsToId,
        event_condition_links: &BTreeMap<SetOfEventsId, FactOptionalsToId>,
        container: &ContainerId,
        opt_facts_to_ignore: &BTreeSet<FactOptional>,
    ) -> Successions {
        let mut res = Successions::default();
        if opt_facts_to_ignore.contains(fact_optional) {
            return res;
        }
        conditions_to_actions.find_fact(
            &mut |id| {
                if *container != ContainerId::Action(id.to_string()) {
                    res.actions.insert(id.to_string());
                }
                true
            },
            &fact_optional.fact,
            fact_optional.is_fact_negated,
            false,
            true,
        );
        for (set_of_events_id, links) in event_condition_links {
            let mut event_ids = BTreeSet::new();
            links.find_fact(
                &mut |id| {
                    let this_event = ContainerId::Event {
                        set_of_events_id: set_of_events_id.clone(),
                        event_id: id.to_string(),
                    };
                    if *container != this_event {
                        event_ids.insert(id.to_string());
                    }
                    true
                },
                &fact_optional.fact,
                fact_optional.is_fact_negated,
                false,
                true,
            );
            if !event_ids.is_empty() {
                res.events.insert(set_of_events_id.clone(), event_ids);
            }
        }
        res
    }
}

/// Objective probe: receives a producible fact, the candidate action
/// parameters, and for unresolved assignments the temporary value parameter
/// to fill.
pub type ObjectiveCallback<'a> =
    dyn FnMut(&FactOptional, &mut ParamValues, Option<&mut ParamValues>) -> bool + 'a;

/// Like [`ObjectiveCallback`] with the successions of the producing node.
pub type SuccessionsCallback<'a> =
    dyn FnMut(&Successions, &FactOptional, &mut ParamValues, Option<&mut ParamValues>) -> bool + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsModOp {
    And,
    Assign,
    ForAll,
    Increase,
    Decrease,
    Multiply,
    Plus,
    Minus,
    When,
}

/// State-modification tree: what an action or event does to the world.
/// Producing nodes (fact leaves, assignments, arithmetic updates) each own
/// the successions their product can enable.
#[derive(Debug, Clone)]
pub enum WorldStateModification {
    Fact {
        fact_optional: FactOptional,
        successions: Successions,
    },
    Number(Number),
    Node {
        op: WsModOp,
        left: Option<Box<WorldStateModification>>,
        right: Option<Box<WorldStateModification>>,
        parameter: Option<Parameter>,
        successions: Successions,
    },
}

impl WorldStateModification {
    pub fn fact(fact_optional: FactOptional) -> Self {
        WorldStateModification::Fact {
            fact_optional,
            successions: Successions::default(),
        }
    }

    pub fn number(nb: Number) -> Self {
        WorldStateModification::Number(nb)
    }

    pub fn node(
        op: WsModOp,
        left: Option<WorldStateModification>,
        right: Option<WorldStateModification>,
        parameter: Option<Parameter>,
    ) -> Self {
        WorldStateModification::Node {
            op,
            left: left.map(Box::new),
            right: right.map(Box::new),
            parameter,
            successions: Successions::default(),
        }
    }

    pub fn and(left: WorldStateModification, right: WorldStateModification) -> Self {
        WorldStateModification::node(WsModOp::And, Some(left), Some(right), None)
    }

    /// The fact leaf when this whole effect is a single optional fact.
    pub fn get_optional_fact(&self) -> Option<&FactOptional> {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => Some(fact_optional),
            _ => None,
        }
    }

    pub fn as_fact_mut(&mut self) -> Option<&mut FactOptional> {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => Some(fact_optional),
            _ => None,
        }
    }

    pub fn has_fact(&self, fact: &Fact) -> bool {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => fact_optional.fact == *fact,
            WorldStateModification::Number(_) => false,
            WorldStateModification::Node { left, right, .. } => {
                left.as_ref().is_some_and(|l| l.has_fact(fact))
                    || right.as_ref().is_some_and(|r| r.has_fact(fact))
            }
        }
    }

    pub fn has_fact_optional(&self, fact_optional: &FactOptional) -> bool {
        match self {
            WorldStateModification::Fact {
                fact_optional: fo, ..
            } => fo == fact_optional,
            WorldStateModification::Number(_) => false,
            WorldStateModification::Node { left, right, .. } => {
                left.as_ref().is_some_and(|l| l.has_fact_optional(fact_optional))
                    || right
                        .as_ref()
                        .is_some_and(|r| r.has_fact_optional(fact_optional))
            }
        }
    }

    pub fn replace_argument(&mut self, old: &Entity, new: &Entity) {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => {
                fact_optional.fact.replace_argument(old, new);
            }
            WorldStateModification::Number(_) => {}
            WorldStateModification::Node { left, right, .. } => {
                if let Some(left) = left {
                    left.replace_argument(old, new);
                }
                if let Some(right) = right {
                    right.replace_argument(old, new);
                }
            }
        }
    }

    /// Enumerate every ground optional fact this effect asserts or retracts,
    /// resolving assignments and arithmetic against the given fact set.
    pub fn for_all(
        &self,
        callback: &mut dyn FnMut(&FactOptional),
        set_of_facts: &SetOfFacts,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
    ) {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => callback(fact_optional),
            WorldStateModification::Number(_) => {}
            WorldStateModification::Node {
                op, left, right, ..
            } => match op {
                WsModOp::And => {
                    if let Some(left) = left {
                        left.for_all(callback, set_of_facts, constants, objects);
                    }
                    if let Some(right) = right {
                        right.for_all(callback, set_of_facts, constants, objects);
                    }
                }
                WsModOp::Assign => {
                    if let (Some(left), Some(right)) = (left, right) {
                        if let Some(left_fact) = left.get_optional_fact() {
                            let mut fact_to_check = left_fact.clone();
                            fact_to_check.fact.set_value(right.get_value(set_of_facts));
                            callback(&fact_to_check);
                        }
                    }
                }
                WsModOp::ForAll => {
                    let mut parameters = ParamValues::new();
                    for grounded in
                        self.for_all_groundings(set_of_facts, &mut parameters, constants, objects)
                    {
                        grounded.for_all(callback, set_of_facts, constants, objects);
                    }
                }
                WsModOp::Increase | WsModOp::Decrease | WsModOp::Multiply => {
                    if let (Some(left), Some(right)) = (left, right) {
                        if let Some(left_fact) = left.get_optional_fact() {
                            let mut fact_to_check = left_fact.clone();
                            let combined = match op {
                                WsModOp::Increase => plus_entities(
                                    left.get_value(set_of_facts),
                                    right.get_value(set_of_facts),
                                ),
                                WsModOp::Decrease => minus_entities(
                                    left.get_value(set_of_facts),
                                    right.get_value(set_of_facts),
                                ),
                                _ => multiply_entities(
                                    left.get_value(set_of_facts),
                                    right.get_value(set_of_facts),
                                ),
                            };
                            fact_to_check.fact.set_value(combined);
                            callback(&fact_to_check);
                        }
                    }
                }
                WsModOp::When => {
                    if let (Some(left), Some(right)) = (left, right) {
                        if let Some(left_fact) = left.get_optional_fact() {
                            let holds = set_of_facts.has_fact(&left_fact.fact);
                            if holds != left_fact.is_fact_negated {
                                right.for_all(callback, set_of_facts, constants, objects);
                            }
                        }
                    }
                }
                WsModOp::Plus | WsModOp::Minus => {}
            },
        }
    }

    /// Visit the optional facts this effect can modify, unresolved. The
    /// callback returns false to stop; returns false when stopped.
    pub fn for_all_that_can_be_modified(
        &self,
        callback: &mut dyn FnMut(&FactOptional) -> bool,
    ) -> bool {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => callback(fact_optional),
            WorldStateModification::Number(_) => true,
            WorldStateModification::Node {
                op, left, right, ..
            } => match op {
                WsModOp::And => {
                    if let Some(left) = left {
                        if !left.for_all_that_can_be_modified(callback) {
                            return false;
                        }
                    }
                    if let Some(right) = right {
                        return right.for_all_that_can_be_modified(callback);
                    }
                    true
                }
                WsModOp::Assign | WsModOp::Increase | WsModOp::Decrease | WsModOp::Multiply => {
                    match left.as_ref().and_then(|l| l.get_optional_fact()) {
                        Some(left_fact) => callback(left_fact),
                        None => true,
                    }
                }
                WsModOp::ForAll | WsModOp::When => match right {
                    Some(right) => right.for_all_that_can_be_modified(callback),
                    None => true,
                },
                WsModOp::Plus | WsModOp::Minus => true,
            },
        }
    }

    pub fn get_all_opt_facts_that_can_be_modified(&self) -> BTreeSet<FactOptional> {
        let mut res = BTreeSet::new();
        self.for_all_that_can_be_modified(&mut |fact_optional| {
            res.insert(fact_optional.clone());
            true
        });
        res
    }

    /// Can some produced fact satisfy the objective probed by the callback.
    /// For an assignment whose value is unresolved, the callback receives a
    /// temporary value parameter to fill; candidates are then validated
    /// against what the right side can actually provide.
    pub fn can_satisfy_objective(
        &self,
        callback: &mut ObjectiveCallback<'_>,
        parameters: &mut ParamValues,
        world: &WorldState,
        from_deduction_id: &str,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
    ) -> bool {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => {
                callback(fact_optional, parameters, None)
            }
            WorldStateModification::Number(_) => false,
            WorldStateModification::Node {
                op, left, right, ..
            } => match op {
                WsModOp::And => {
                    if let Some(left) = left {
                        if left.can_satisfy_objective(
                            callback,
                            parameters,
                            world,
                            from_deduction_id,
                            constants,
                            objects,
                        ) {
                            return true;
                        }
                    }
                    if let Some(right) = right {
                        return right.can_satisfy_objective(
                            callback,
                            parameters,
                            world,
                            from_deduction_id,
                            constants,
                            objects,
                        );
                    }
                    false
                }
                WsModOp::Assign => {
                    if let (Some(left), Some(right)) = (left, right) {
                        if let Some(left_fact) = left.get_optional_fact() {
                            return assign_satisfies(
                                left_fact,
                                right,
                                callback,
                                parameters,
                                world,
                                from_deduction_id,
                            );
                        }
                    }
                    false
                }
                WsModOp::ForAll => {
                    let groundings = self.for_all_groundings(
                        world.facts_mapping(),
                        parameters,
                        constants,
                        objects,
                    );
                    for grounded in groundings {
                        if grounded.can_satisfy_objective(
                            callback,
                            parameters,
                            world,
                            from_deduction_id,
                            constants,
                            objects,
                        ) {
                            return true;
                        }
                    }
                    false
                }
                WsModOp::Increase | WsModOp::Decrease | WsModOp::Multiply => {
                    if let (Some(left), Some(right)) = (left, right) {
                        if let Some(left_fact) = left.get_optional_fact() {
                            let facts = world.facts_mapping();
                            let mut fact_to_check = left_fact.clone();
                            fact_to_check.fact.set_value(arith_value(
                                *op,
                                left.get_value(facts),
                                right.get_value(facts),
                            ));
                            return callback(&fact_to_check, parameters, None);
                        }
                    }
                    false
                }
                WsModOp::When => match right {
                    Some(right) => right.can_satisfy_objective(
                        callback,
                        parameters,
                        world,
                        from_deduction_id,
                        constants,
                        objects,
                    ),
                    None => false,
                },
                WsModOp::Plus | WsModOp::Minus => false,
            },
        }
    }

    /// Like [`Self::can_satisfy_objective`] but also handing the callback the
    /// successions of each producing node, the planner's backward edges.
    /// Producing nodes with no successions are skipped unless the effect can
    /// directly satisfy the current goal.
    #[allow(clippy::too_many_arguments)]
    pub fn iterate_on_successions(
        &self,
        callback: &mut SuccessionsCallback<'_>,
        parameters: &mut ParamValues,
        world: &WorldState,
        can_satisfy_this_goal: bool,
        from_deduction_id: &str,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
    ) -> bool {
        match self {
            WorldStateModification::Fact {
                fact_optional,
                successions,
            } => {
                if can_satisfy_this_goal || !successions.is_empty() {
                    callback(successions, fact_optional, parameters, None)
                } else {
                    false
                }
            }
            WorldStateModification::Number(_) => false,
            WorldStateModification::Node {
                op,
                left,
                right,
                successions,
                ..
            } => match op {
                WsModOp::And => {
                    if let Some(left) = left {
                        if left.iterate_on_successions(
                            callback,
                            parameters,
                            world,
                            can_satisfy_this_goal,
                            from_deduction_id,
                            constants,
                            objects,
                        ) {
                            return true;
                        }
                    }
                    if let Some(right) = right {
                        return right.iterate_on_successions(
                            callback,
                            parameters,
                            world,
                            can_satisfy_this_goal,
                            from_deduction_id,
                            constants,
                            objects,
                        );
                    }
                    false
                }
                WsModOp::Assign => {
                    if !(can_satisfy_this_goal || !successions.is_empty()) {
                        return false;
                    }
                    if let (Some(left), Some(right)) = (left, right) {
                        if let Some(left_fact) = left.get_optional_fact() {
                            let mut bound = |fact: &FactOptional,
                                             parameters: &mut ParamValues,
                                             local: Option<&mut ParamValues>|
                             -> bool {
                                callback(successions, fact, parameters, local)
                            };
                            return assign_satisfies(
                                left_fact,
                                right,
                                &mut bound,
                                parameters,
                                world,
                                from_deduction_id,
                            );
                        }
                    }
                    false
                }
                WsModOp::ForAll => {
                    let groundings = self.for_all_groundings(
                        world.facts_mapping(),
                        parameters,
                        constants,
                        objects,
                    );
                    for grounded in groundings {
                        if grounded.iterate_on_successions(
                            callback,
                            parameters,
                            world,
                            can_satisfy_this_goal,
                            from_deduction_id,
                            constants,
                            objects,
                        ) {
                            return true;
                        }
                    }
                    false
                }
                WsModOp::Increase | WsModOp::Decrease | WsModOp::Multiply => {
                    if !(can_satisfy_this_goal || !successions.is_empty()) {
                        return false;
                    }
                    if let (Some(left), Some(right)) = (left, right) {
                        if let Some(left_fact) = left.get_optional_fact() {
                            let facts = world.facts_mapping();
                            let mut fact_to_check = left_fact.clone();
                            fact_to_check.fact.set_value(arith_value(
                                *op,
                                left.get_value(facts),
                                right.get_value(facts),
                            ));
                            return callback(successions, &fact_to_check, parameters, None);
                        }
                    }
                    false
                }
                WsModOp::When => match right {
                    Some(right) => right.iterate_on_successions(
                        callback,
                        parameters,
                        world,
                        can_satisfy_this_goal,
                        from_deduction_id,
                        constants,
                        objects,
                    ),
                    None => false,
                },
                WsModOp::Plus | WsModOp::Minus => false,
            },
        }
    }

    /// Iterate the groundings of a FOR_ALL node: entities bound by the guard
    /// fact in the stored facts, or the whole type pool when there is no
    /// guard.
    fn for_all_groundings(
        &self,
        set_of_facts: &SetOfFacts,
        parameters: &mut ParamValues,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
    ) -> Vec<WorldStateModification> {
        let WorldStateModification::Node {
            op: WsModOp::ForAll,
            left,
            right,
            parameter: Some(parameter),
            ..
        } = self
        else {
            return Vec::new();
        };
        let Some(right) = right else {
            return Vec::new();
        };

        let mut parameter_values = BTreeSet::new();
        match left.as_ref().and_then(|l| l.get_optional_fact()) {
            Some(guard) => {
                let mut potential_new_parameters = ParamValues::new();
                set_of_facts.extract_potential_arguments_of_a_fact_parameter(
                    &mut parameter_values,
                    &guard.fact,
                    &parameter.name,
                    parameters,
                    Some(&mut potential_new_parameters),
                );
                if !parameter_values.is_empty() {
                    parameters.merge_union(potential_new_parameters);
                }
            }
            None => {
                if let Some(ty) = &parameter.ty {
                    parameter_values = type_to_entities(ty, constants, objects);
                }
            }
        }

        let mut res = Vec::with_capacity(parameter_values.len());
        for value in parameter_values {
            let mut grounded = right.as_ref().clone();
            grounded.replace_argument(&parameter.to_entity(), &value);
            res.push(grounded);
        }
        res
    }

    /// Rebuild the succession caches of every producing node from the
    /// domain-wide precondition indexes.
    pub fn update_successions(
        &mut self,
        conditions_to_actions: &FactOptionalsToId,
        event_condition_links: &BTreeMap<SetOfEventsId, FactOptionalsToId>,
        container: &ContainerId,
        opt_facts_to_ignore: &BTreeSet<FactOptional>,
    ) {
        match self {
            WorldStateModification::Fact {
                fact_optional,
                successions,
            } => {
                *successions = Successions::compute_for_opt_fact(
                    fact_optional,
                    conditions_to_actions,
                    event_condition_links,
                    container,
                    opt_facts_to_ignore,
                );
            }
            WorldStateModification::Number(_) => {}
            WorldStateModification::Node {
                op,
                left,
                right,
                successions,
                ..
            } => {
                successions.clear();
                match op {
                    WsModOp::And => {
                        if let Some(left) = left {
                            left.update_successions(
                                conditions_to_actions,
                                event_condition_links,
                                container,
                                opt_facts_to_ignore,
                            );
                        }
                        if let Some(right) = right {
                            right.update_successions(
                                conditions_to_actions,
                                event_condition_links,
                                container,
                                opt_facts_to_ignore,
                            );
                        }
                    }
                    WsModOp::Assign
                    | WsModOp::Increase
                    | WsModOp::Decrease
                    | WsModOp::Multiply => {
                        if let Some(left_fact) =
                            left.as_ref().and_then(|l| l.get_optional_fact())
                        {
                            *successions = Successions::compute_for_opt_fact(
                                left_fact,
                                conditions_to_actions,
                                event_condition_links,
                                container,
                                opt_facts_to_ignore,
                            );
                        }
                    }
                    WsModOp::ForAll | WsModOp::When => {
                        if let Some(right) = right {
                            right.update_successions(
                                conditions_to_actions,
                                event_condition_links,
                                container,
                                opt_facts_to_ignore,
                            );
                        }
                    }
                    WsModOp::Plus | WsModOp::Minus => {}
                }
            }
        }
    }

    pub fn remove_possible_succession(&mut self, action_id_to_remove: &str) {
        match self {
            WorldStateModification::Fact { successions, .. } => {
                successions.actions.remove(action_id_to_remove);
            }
            WorldStateModification::Number(_) => {}
            WorldStateModification::Node {
                op,
                left,
                right,
                successions,
                ..
            } => {
                successions.actions.remove(action_id_to_remove);
                match op {
                    WsModOp::And => {
                        if let Some(left) = left {
                            left.remove_possible_succession(action_id_to_remove);
                        }
                        if let Some(right) = right {
                            right.remove_possible_succession(action_id_to_remove);
                        }
                    }
                    WsModOp::Assign
                    | WsModOp::Increase
                    | WsModOp::Decrease
                    | WsModOp::Multiply => {
                        if let Some(left) = left {
                            left.remove_possible_succession(action_id_to_remove);
                        }
                    }
                    WsModOp::ForAll | WsModOp::When => {
                        if let Some(right) = right {
                            right.remove_possible_succession(action_id_to_remove);
                        }
                    }
                    WsModOp::Plus | WsModOp::Minus => {}
                }
            }
        }
    }

    pub fn get_successions(&self, out: &mut Successions) {
        match self {
            WorldStateModification::Fact { successions, .. } => out.add(successions),
            WorldStateModification::Number(_) => {}
            WorldStateModification::Node {
                op,
                left,
                right,
                successions,
                ..
            } => match op {
                WsModOp::And => {
                    if let Some(left) = left {
                        left.get_successions(out);
                    }
                    if let Some(right) = right {
                        right.get_successions(out);
                    }
                }
                WsModOp::Assign | WsModOp::Increase | WsModOp::Decrease | WsModOp::Multiply => {
                    out.add(successions);
                }
                WsModOp::ForAll | WsModOp::When => {
                    if let Some(right) = right {
                        right.get_successions(out);
                    }
                }
                WsModOp::Plus | WsModOp::Minus => {}
            },
        }
    }

    pub fn get_value(&self, set_of_facts: &SetOfFacts) -> Option<Entity> {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => {
                set_of_facts.get_fluent_value(&fact_optional.fact)
            }
            WorldStateModification::Number(nb) => Some(Entity::number_entity(nb.to_string())),
            WorldStateModification::Node {
                op, left, right, ..
            } => match (op, left, right) {
                (WsModOp::Plus, Some(left), Some(right)) => {
                    plus_entities(left.get_value(set_of_facts), right.get_value(set_of_facts))
                }
                (WsModOp::Minus, Some(left), Some(right)) => {
                    minus_entities(left.get_value(set_of_facts), right.get_value(set_of_facts))
                }
                _ => None,
            },
        }
    }

    /// Deep clone under parameter substitution, keeping succession caches.
    pub fn clone_with(&self, substitution: Option<&BTreeMap<Parameter, Entity>>) -> Self {
        match self {
            WorldStateModification::Fact {
                fact_optional,
                successions,
            } => {
                let mut fact_optional = fact_optional.clone();
                if let Some(subst) = substitution {
                    fact_optional.fact.replace_arguments(subst);
                }
                WorldStateModification::Fact {
                    fact_optional,
                    successions: successions.clone(),
                }
            }
            WorldStateModification::Number(nb) => WorldStateModification::Number(*nb),
            WorldStateModification::Node {
                op,
                left,
                right,
                parameter,
                successions,
            } => WorldStateModification::Node {
                op: *op,
                left: left.as_ref().map(|l| Box::new(l.clone_with(substitution))),
                right: right.as_ref().map(|r| Box::new(r.clone_with(substitution))),
                parameter: parameter.clone(),
                successions: successions.clone(),
            },
        }
    }

    /// A contradiction between what this effect writes and the given facts.
    pub fn has_a_contradiction_with(
        &self,
        facts_opt: &BTreeSet<FactOptional>,
        parameters: Option<&[Parameter]>,
    ) -> bool {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => {
                fact_optional.has_a_contradiction_with(facts_opt, parameters, false)
            }
            WorldStateModification::Number(_) => false,
            WorldStateModification::Node {
                op,
                left,
                right,
                parameter,
                ..
            } => match op {
                WsModOp::And => {
                    left.as_ref()
                        .is_some_and(|l| l.has_a_contradiction_with(facts_opt, parameters))
                        || right
                            .as_ref()
                            .is_some_and(|r| r.has_a_contradiction_with(facts_opt, parameters))
                }
                WsModOp::Assign | WsModOp::Increase | WsModOp::Decrease | WsModOp::Multiply => {
                    match left.as_ref().and_then(|l| l.get_optional_fact()) {
                        Some(left_fact) => facts_opt
                            .iter()
                            .any(|fo| left_fact.fact.equal_without_value(&fo.fact, None, None)),
                        None => false,
                    }
                }
                WsModOp::ForAll => match right {
                    Some(right) => {
                        let mut context: Vec<Parameter> =
                            parameters.map(<[_]>::to_vec).unwrap_or_default();
                        if let Some(parameter) = parameter {
                            context.push(parameter.clone());
                        }
                        right.has_a_contradiction_with(facts_opt, Some(&context))
                    }
                    None => false,
                },
                WsModOp::When => right
                    .as_ref()
                    .is_some_and(|r| r.has_a_contradiction_with(facts_opt, parameters)),
                WsModOp::Plus | WsModOp::Minus => false,
            },
        }
    }
}

fn arith_value(op: WsModOp, left: Option<Entity>, right: Option<Entity>) -> Option<Entity> {
    match op {
        WsModOp::Increase => plus_entities(left, right),
        WsModOp::Decrease => minus_entities(left, right),
        WsModOp::Multiply => multiply_entities(left, right),
        _ => None,
    }
}

/// Probe the objective callback with an assignment's product. When the
/// assigned value is not resolvable yet, a temporary value parameter is
/// introduced; candidate values accepted by the callback are then checked
/// against what the right side can provide in the current world.
fn assign_satisfies(
    left_fact: &FactOptional,
    right: &WorldStateModification,
    callback: &mut ObjectiveCallback<'_>,
    parameters: &mut ParamValues,
    world: &WorldState,
    from_deduction_id: &str,
) -> bool {
    let facts = world.facts_mapping();
    let mut fact_to_check = left_fact.clone();
    fact_to_check.fact.set_value(right.get_value(facts));

    let mut local = ParamValues::new();
    let mut has_tmp_value = false;
    if fact_to_check.fact.value().is_none() {
        let tmp_name = format!("??tmpValueFromSet_{from_deduction_id}");
        let value_ty = fact_to_check.fact.predicate.value.clone();
        fact_to_check
            .fact
            .set_value(Some(Entity::new(tmp_name.clone(), value_ty.clone())));
        local.declare(Parameter::new(tmp_name, value_ty));
        has_tmp_value = true;
    }

    let res = callback(&fact_to_check, parameters, Some(&mut local));
    if res && has_tmp_value {
        return is_ok_with_local_parameters(&local, right, world, parameters);
    }
    res
}

/// Validate candidate values a goal put on an unresolved assignment: some
/// candidate must be a value the right side actually has in the world.
fn is_ok_with_local_parameters(
    local: &ParamValues,
    right: &WorldStateModification,
    world: &WorldState,
    parameters: &mut ParamValues,
) -> bool {
    let Some((_, candidates)) = local.first() else {
        return true;
    };
    if candidates.is_empty() {
        return true;
    }
    let Some(right_fact) = right.get_optional_fact() else {
        return false;
    };

    let mut res = false;
    let mut new_parameters = ParamValues::new();
    for candidate in candidates.keys() {
        let mut fact_with_value = right_fact.fact.clone();
        fact_with_value.replace_arguments_with_first(local);
        fact_with_value.set_value(Some(candidate.clone()));
        if fact_with_value.is_in_other_facts_map(
            world.facts_mapping(),
            Some(&mut new_parameters),
            false,
            Some(parameters),
            None,
            None,
        ) {
            res = true;
        }
    }
    if res {
        parameters.apply_new_params(new_parameters);
    }
    res
}

impl PartialEq for WorldStateModification {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                WorldStateModification::Fact { fact_optional, .. },
                WorldStateModification::Fact {
                    fact_optional: other_fact,
                    ..
                },
            ) => fact_optional == other_fact,
            (WorldStateModification::Number(a), WorldStateModification::Number(b)) => a == b,
            (
                WorldStateModification::Node {
                    op,
                    left,
                    right,
                    parameter,
                    ..
                },
                WorldStateModification::Node {
                    op: other_op,
                    left: other_left,
                    right: other_right,
                    parameter: other_parameter,
                    ..
                },
            ) => {
                op == other_op
                    && left == other_left
                    && right == other_right
                    && parameter == other_parameter
            }
            _ => false,
        }
    }
}

impl fmt::Display for WorldStateModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldStateModification::Fact { fact_optional, .. } => write!(f, "{fact_optional}"),
            WorldStateModification::Number(nb) => write!(f, "{nb}"),
            WorldStateModification::Node {
                op,
                left,
                right,
                parameter,
                ..
            } => {
                let left_str = left.as_ref().map(|l| l.to_string()).unwrap_or_default();
                let right_str = right.as_ref().map(|r| r.to_string()).unwrap_or_default();
                match op {
                    WsModOp::And => write!(f, "{left_str} & {right_str}"),
                    WsModOp::Assign => write!(f, "assign({left_str}, {right_str})"),
                    WsModOp::ForAll => {
                        let parameter_str = parameter
                            .as_ref()
                            .map(|p| p.to_string())
                            .unwrap_or_default();
                        if left_str.is_empty() {
                            write!(f, "forall({parameter_str}, {right_str})")
                        } else {
                            write!(f, "forall({parameter_str}, when({left_str}, {right_str}))")
                        }
                    }
                    WsModOp::Increase => write!(f, "increase({left_str}, {right_str})"),
                    WsModOp::Decrease => write!(f, "decrease({left_str}, {right_str})"),
                    WsModOp::Multiply => write!(f, "{left_str} * {right_str}"),
                    WsModOp::Plus => write!(f, "{left_str} + {right_str}"),
                    WsModOp::Minus => write!(f, "{left_str} - {right_str}"),
                    WsModOp::When => write!(f, "when({left_str}, {right_str})"),
                }
            }
        }
    }
}
