use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::bindings::ParamValues;
use crate::entity::{type_to_entities, Entity, Parameter, SetOfEntities};
use crate::fact::{Fact, FactOptional};
use crate::number::Number;
use crate::predicate::Predicate;
use crate::set_of_facts::SetOfFacts;
use crate::world_state::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    And,
    Or,
    Imply,
    Equality,
    Plus,
    Minus,
    Superior,
    SuperiorOrEqual,
    Inferior,
    InferiorOrEqual,
}

impl ConditionOp {
    fn is_comparison(self) -> bool {
        matches!(
            self,
            ConditionOp::Superior
                | ConditionOp::SuperiorOrEqual
                | ConditionOp::Inferior
                | ConditionOp::InferiorOrEqual
        )
    }

    fn can_be_superior(self) -> bool {
        matches!(self, ConditionOp::Superior | ConditionOp::SuperiorOrEqual)
    }

    fn can_be_equal(self) -> bool {
        matches!(
            self,
            ConditionOp::SuperiorOrEqual | ConditionOp::InferiorOrEqual
        )
    }
}

/// Logical condition tree over optional facts, numbers and quantifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Fact(FactOptional),
    Number(Number),
    Not(Box<Condition>),
    Node {
        op: ConditionOp,
        left: Box<Condition>,
        right: Box<Condition>,
    },
    Exists {
        parameter: Parameter,
        inner: Box<Condition>,
    },
    Forall {
        parameter: Parameter,
        inner: Box<Condition>,
    },
}

fn comp_number(value_str: &str, nb: &Number, can_be_superior: bool, can_be_equal: bool) -> bool {
    match value_str.parse::<Number>() {
        Ok(value) => {
            if value == *nb {
                return can_be_equal;
            }
            if can_be_superior {
                value > *nb
            } else {
                value < *nb
            }
        }
        Err(_) => false,
    }
}

/// Enumerate the values an arithmetic or fact sub-condition can take,
/// unfolding known parameter candidates, with the world fact a value came
/// from when there is one.
fn for_each_condition_value(
    callback: &mut dyn FnMut(&Entity, Option<&Fact>),
    condition: &Condition,
    world: &WorldState,
    parameters: Option<&ParamValues>,
) {
    let facts = world.facts_mapping();
    match parameters {
        None => {
            if let Some(value) = condition.get_value(facts) {
                callback(&value, None);
            }
            return;
        }
        Some(params) if params.is_empty() => {
            if let Some(value) = condition.get_value(facts) {
                callback(&value, None);
            }
            return;
        }
        Some(params) => {
            for grounding in params.unfold() {
                let substituted = condition.clone_with(Some(&grounding), false, None);
                if let Some(value) = substituted.get_value(facts) {
                    callback(&value, None);
                }
            }
            if let Condition::Fact(fact_condition) = condition {
                if fact_condition
                    .fact
                    .value()
                    .is_some_and(|v| v.is_any_entity())
                {
                    world.iterate_on_matching_facts_without_value(
                        &mut |stored| {
                            if let Some(value) = stored.value() {
                                callback(value, Some(stored));
                            }
                            false
                        },
                        &fact_condition.fact,
                        params,
                        None,
                    );
                }
            }
        }
    }
}

/// Like [`for_each_condition_value`] but stopping as soon as the callback
/// answers `until_value`; returns whether it did.
fn for_each_value_until(
    callback: &mut dyn FnMut(&Entity) -> bool,
    until_value: bool,
    condition: &Condition,
    world: &WorldState,
    parameters: Option<&ParamValues>,
) -> bool {
    let facts = world.facts_mapping();
    if parameters.is_none_or(|p| p.is_empty()) {
        if let Some(value) = condition.get_value(facts) {
            return callback(&value);
        }
    }
    if let Some(params) = parameters {
        for grounding in params.unfold() {
            let substituted = condition.clone_with(Some(&grounding), false, None);
            if let Some(value) = substituted.get_value(facts) {
                if callback(&value) == until_value {
                    return until_value;
                }
            }
        }
        if let Condition::Fact(fact_condition) = condition {
            if fact_condition
                .fact
                .value()
                .is_none_or(|v| v.is_any_entity())
            {
                let mut reached = false;
                world.iterate_on_matching_facts_without_value(
                    &mut |stored| {
                        if let Some(value) = stored.value() {
                            if callback(value) == until_value {
                                reached = true;
                                return true;
                            }
                        }
                        false
                    },
                    &fact_condition.fact,
                    params,
                    None,
                );
                if reached {
                    return until_value;
                }
            }
        }
    }
    !until_value
}

/// Collect, for a quantified parameter, the entities bound by the facts of
/// the inner condition other than the one matching the effect fact.
fn exists_extract_possibilities_rec(
    local_param_to_value: &mut ParamValues,
    condition_parameters: &ParamValues,
    condition: &Condition,
    facts: &SetOfFacts,
    fact_from_effect: &Fact,
    parameter: &Parameter,
    is_negated: bool,
) {
    match condition {
        Condition::Fact(fact_condition) => {
            if fact_condition.is_fact_negated != is_negated
                || !fact_condition
                    .fact
                    .equal_without_an_arg(fact_from_effect, &parameter.name)
            {
                let mut new_parameters = ParamValues::new();
                fact_condition.fact.is_in_other_facts_map(
                    facts,
                    Some(&mut new_parameters),
                    false,
                    Some(condition_parameters),
                    Some(local_param_to_value),
                    None,
                );
            }
        }
        Condition::Node { op, left, right }
            if matches!(op, ConditionOp::And | ConditionOp::Or | ConditionOp::Imply) =>
        {
            exists_extract_possibilities_rec(
                local_param_to_value,
                condition_parameters,
                left,
                facts,
                fact_from_effect,
                parameter,
                is_negated,
            );
            exists_extract_possibilities_rec(
                local_param_to_value,
                condition_parameters,
                right,
                facts,
                fact_from_effect,
                parameter,
                is_negated,
            );
        }
        _ => {}
    }
}

impl Condition {
    pub fn as_fact(&self) -> Option<&FactOptional> {
        match self {
            Condition::Fact(fact_optional) => Some(fact_optional),
            _ => None,
        }
    }

    pub fn as_fact_mut(&mut self) -> Option<&mut FactOptional> {
        match self {
            Condition::Fact(fact_optional) => Some(fact_optional),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Condition::Number(nb) => Some(nb),
            _ => None,
        }
    }

    pub fn and(left: Condition, right: Condition) -> Condition {
        Condition::Node {
            op: ConditionOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Visit every optional fact of the tree. The callback receives the fact
    /// (negation folded in under `Not`) and whether its value position is
    /// unreliable in this context; it returns false to stop. Returns false
    /// when the walk was stopped.
    pub fn for_each_opt_fact(
        &self,
        is_wrapping_expression_negated: bool,
        ignore_value: bool,
        only_mandatory_facts: bool,
        callback: &mut dyn FnMut(&FactOptional, bool) -> bool,
    ) -> bool {
        match self {
            Condition::Fact(fact_optional) => {
                if !is_wrapping_expression_negated {
                    callback(fact_optional, ignore_value)
                } else {
                    let mut flipped = fact_optional.clone();
                    flipped.is_fact_negated = !flipped.is_fact_negated;
                    callback(&flipped, ignore_value)
                }
            }
            Condition::Number(_) => true,
            Condition::Not(inner) => inner.for_each_opt_fact(
                !is_wrapping_expression_negated,
                ignore_value,
                only_mandatory_facts,
                callback,
            ),
            Condition::Node { op, left, right } => {
                if only_mandatory_facts && *op == ConditionOp::Or {
                    return true;
                }
                let ignore_value = ignore_value
                    || !matches!(op, ConditionOp::And | ConditionOp::Or | ConditionOp::Imply);
                if !left.for_each_opt_fact(
                    is_wrapping_expression_negated,
                    ignore_value,
                    only_mandatory_facts,
                    callback,
                ) {
                    return false;
                }
                right.for_each_opt_fact(
                    is_wrapping_expression_negated,
                    ignore_value,
                    only_mandatory_facts,
                    callback,
                )
            }
            Condition::Exists { inner, .. } | Condition::Forall { inner, .. } => inner
                .for_each_opt_fact(
                    is_wrapping_expression_negated,
                    ignore_value,
                    only_mandatory_facts,
                    callback,
                ),
        }
    }

    pub fn get_all_opt_facts(&self) -> BTreeSet<FactOptional> {
        let mut res = BTreeSet::new();
        self.for_each_opt_fact(false, false, false, &mut |fact_optional, _| {
            res.insert(fact_optional.clone());
            true
        });
        res
    }

    pub fn has_fact(&self, fact: &Fact) -> bool {
        match self {
            Condition::Fact(fact_optional) => fact_optional.fact == *fact,
            Condition::Number(_) => false,
            Condition::Not(inner) => inner.has_fact(fact),
            Condition::Node { left, right, .. } => left.has_fact(fact) || right.has_fact(fact),
            Condition::Exists { inner, .. } | Condition::Forall { inner, .. } => {
                inner.has_fact(fact)
            }
        }
    }

    /// Evaluate against a world state, possibly refining the candidate
    /// entities of the condition parameters on the way.
    pub fn is_true(
        &self,
        world: &WorldState,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
        punctual_facts: &BTreeSet<Fact>,
        removed_facts: &BTreeSet<Fact>,
        mut parameters: Option<&mut ParamValues>,
        is_wrapping_expression_negated: bool,
    ) -> bool {
        match self {
            Condition::Fact(fact_optional) => {
                let res = world.is_optional_fact_satisfied_in_context(
                    fact_optional,
                    punctual_facts,
                    removed_facts,
                    parameters,
                    None,
                );
                if is_wrapping_expression_negated {
                    !res
                } else {
                    res
                }
            }
            Condition::Number(_) => !is_wrapping_expression_negated,
            Condition::Not(inner) => inner.is_true(
                world,
                constants,
                objects,
                punctual_facts,
                removed_facts,
                parameters,
                !is_wrapping_expression_negated,
            ),
            Condition::Node { op, left, right } => match op {
                ConditionOp::And => {
                    if !left.is_true(
                        world,
                        constants,
                        objects,
                        punctual_facts,
                        removed_facts,
                        parameters.as_deref_mut(),
                        false,
                    ) {
                        return is_wrapping_expression_negated;
                    }
                    if !right.is_true(
                        world,
                        constants,
                        objects,
                        punctual_facts,
                        removed_facts,
                        parameters,
                        false,
                    ) {
                        return is_wrapping_expression_negated;
                    }
                    !is_wrapping_expression_negated
                }
                ConditionOp::Or => {
                    if left.is_true(
                        world,
                        constants,
                        objects,
                        punctual_facts,
                        removed_facts,
                        parameters.as_deref_mut(),
                        false,
                    ) {
                        return !is_wrapping_expression_negated;
                    }
                    if right.is_true(
                        world,
                        constants,
                        objects,
                        punctual_facts,
                        removed_facts,
                        parameters,
                        false,
                    ) {
                        return !is_wrapping_expression_negated;
                    }
                    is_wrapping_expression_negated
                }
                ConditionOp::Imply => {
                    if left.is_true(
                        world,
                        constants,
                        objects,
                        punctual_facts,
                        removed_facts,
                        parameters.as_deref_mut(),
                        false,
                    ) && !right.is_true(
                        world,
                        constants,
                        objects,
                        punctual_facts,
                        removed_facts,
                        parameters,
                        false,
                    ) {
                        return is_wrapping_expression_negated;
                    }
                    !is_wrapping_expression_negated
                }
                ConditionOp::Equality => {
                    let res = self.equality_is_true(
                        left,
                        right,
                        world,
                        punctual_facts,
                        parameters.as_deref_mut(),
                    );
                    if is_wrapping_expression_negated {
                        !res
                    } else {
                        res
                    }
                }
                op if op.is_comparison() => {
                    if let (Some(left_fact), Some(right_nb)) = (left.as_fact(), right.as_number()) {
                        let facts = world.facts_mapping();
                        for stored in facts.find(&left_fact.fact, false) {
                            if let Some(stored_value) = stored.value() {
                                if left_fact.fact.equal_without_value(&stored, None, None) {
                                    let res = comp_number(
                                        &stored_value.value,
                                        right_nb,
                                        op.can_be_superior(),
                                        op.can_be_equal(),
                                    );
                                    return if is_wrapping_expression_negated {
                                        !res
                                    } else {
                                        res
                                    };
                                }
                            }
                        }
                    }
                    !is_wrapping_expression_negated
                }
                // PLUS / MINUS only appear below an equality or comparison.
                _ => !is_wrapping_expression_negated,
            },
            Condition::Exists { parameter, inner } => {
                let entities = match &parameter.ty {
                    Some(ty) => type_to_entities(ty, constants, objects),
                    None => BTreeSet::new(),
                };
                if entities.is_empty() {
                    return is_wrapping_expression_negated;
                }
                let mut local = ParamValues::new();
                local.declare(parameter.clone());
                let res = is_true_rec(
                    &mut local,
                    parameters,
                    false,
                    inner,
                    world,
                    punctual_facts,
                    removed_facts,
                    &entities,
                );
                res == !is_wrapping_expression_negated
            }
            Condition::Forall { parameter, inner } => {
                let entities = match &parameter.ty {
                    Some(ty) => type_to_entities(ty, constants, objects),
                    None => BTreeSet::new(),
                };
                if entities.is_empty() {
                    return !is_wrapping_expression_negated;
                }
                let mut local = ParamValues::new();
                local.declare(parameter.clone());
                let res = is_true_rec(
                    &mut local,
                    parameters,
                    true,
                    inner,
                    world,
                    punctual_facts,
                    removed_facts,
                    &entities,
                );
                res == !is_wrapping_expression_negated
            }
        }
    }

    fn equality_is_true(
        &self,
        left: &Condition,
        right: &Condition,
        world: &WorldState,
        punctual_facts: &BTreeSet<Fact>,
        mut parameters: Option<&mut ParamValues>,
    ) -> bool {
        let Some(left_fact) = left.as_fact() else {
            return false;
        };
        let mut pairs: Vec<(Entity, Option<Fact>)> = Vec::new();
        for_each_condition_value(
            &mut |value, from_fact| pairs.push((value.clone(), from_fact.cloned())),
            right,
            world,
            parameters.as_deref(),
        );

        let mut res = false;
        let mut new_parameters = ParamValues::new();
        for (value, from_fact) in pairs {
            let mut fact_to_check = left_fact.fact.clone();
            fact_to_check.set_value(Some(value));
            let sub_res = if fact_to_check.is_punctual() {
                punctual_facts.contains(&fact_to_check)
            } else {
                fact_to_check.is_in_other_facts_map(
                    world.facts_mapping(),
                    Some(&mut new_parameters),
                    false,
                    parameters.as_deref(),
                    None,
                    None,
                )
            };

            // Resolve parameters that are still unconstrained from the fact
            // the right-side value came from.
            if sub_res {
                if let (Some(from), Some(params)) = (&from_fact, parameters.as_deref_mut()) {
                    if !params.is_empty() {
                        if let Some(right_fact) = right.as_fact() {
                            let mut resolved: Vec<(Parameter, Entity)> = Vec::new();
                            for (param, candidates) in params.iter() {
                                if candidates.is_empty() {
                                    if let Some(value) = right_fact
                                        .fact
                                        .extract_argument_from_example_ignoring_value(param, from)
                                    {
                                        resolved.push((param.clone(), value));
                                    }
                                }
                            }
                            for (param, value) in resolved {
                                params.insert(param, value);
                            }
                        }
                    }
                }
            }
            res = res || sub_res;
        }
        if let Some(params) = parameters {
            params.apply_new_params(new_parameters);
        }
        res
    }

    /// Walk the condition looking for a fact the effect fact could help
    /// satisfy; the callback receives each candidate condition fact and
    /// answers whether it matches the effect fact.
    #[allow(clippy::too_many_arguments)]
    pub fn find_condition_candidate_from_fact_from_effect(
        &self,
        callback: &mut dyn FnMut(&FactOptional) -> bool,
        world: &WorldState,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
        fact_from_effect: &Fact,
        fact_from_effect_parameters: &ParamValues,
        fact_from_effect_tmp_parameters: Option<&ParamValues>,
        condition_parameters: &ParamValues,
        is_wrapping_expression_negated: bool,
    ) -> bool {
        match self {
            Condition::Fact(fact_optional) => {
                let res = callback(fact_optional);
                if is_wrapping_expression_negated {
                    !res
                } else {
                    res
                }
            }
            Condition::Number(_) => is_wrapping_expression_negated,
            Condition::Not(inner) => inner.find_condition_candidate_from_fact_from_effect(
                callback,
                world,
                constants,
                objects,
                fact_from_effect,
                fact_from_effect_parameters,
                fact_from_effect_tmp_parameters,
                condition_parameters,
                !is_wrapping_expression_negated,
            ),
            Condition::Node { op, left, right } => match op {
                ConditionOp::And | ConditionOp::Or => {
                    left.find_condition_candidate_from_fact_from_effect(
                        callback,
                        world,
                        constants,
                        objects,
                        fact_from_effect,
                        fact_from_effect_parameters,
                        fact_from_effect_tmp_parameters,
                        condition_parameters,
                        is_wrapping_expression_negated,
                    ) || right.find_condition_candidate_from_fact_from_effect(
                        callback,
                        world,
                        constants,
                        objects,
                        fact_from_effect,
                        fact_from_effect_parameters,
                        fact_from_effect_tmp_parameters,
                        condition_parameters,
                        is_wrapping_expression_negated,
                    )
                }
                ConditionOp::Imply => {
                    let mut condition_parameters = condition_parameters.clone();
                    left.is_true(
                        world,
                        constants,
                        objects,
                        &BTreeSet::new(),
                        &BTreeSet::new(),
                        Some(&mut condition_parameters),
                        false,
                    ) && right.find_condition_candidate_from_fact_from_effect(
                        callback,
                        world,
                        constants,
                        objects,
                        fact_from_effect,
                        fact_from_effect_parameters,
                        fact_from_effect_tmp_parameters,
                        &condition_parameters,
                        is_wrapping_expression_negated,
                    )
                }
                ConditionOp::Equality => {
                    if let Some(left_fact) = left.as_fact() {
                        if left_fact.fact.equal_without_value(
                            fact_from_effect,
                            Some(fact_from_effect_parameters),
                            fact_from_effect_tmp_parameters,
                        ) {
                            let left_pattern = left_fact.fact.clone();
                            if for_each_value_until(
                                &mut |value| {
                                    let mut fact_to_check = left_pattern.clone();
                                    fact_to_check.set_value(Some(value.clone()));
                                    callback(&FactOptional::new(fact_to_check))
                                },
                                true,
                                right,
                                world,
                                Some(condition_parameters),
                            ) {
                                return true;
                            }
                        }
                        if let Some(right_fact) = right.as_fact() {
                            if right_fact.fact.equal_without_value(
                                fact_from_effect,
                                Some(fact_from_effect_parameters),
                                fact_from_effect_tmp_parameters,
                            ) {
                                let right_pattern = right_fact.fact.clone();
                                return for_each_value_until(
                                    &mut |value| {
                                        let mut fact_to_check = right_pattern.clone();
                                        fact_to_check.set_value(Some(value.clone()));
                                        callback(&FactOptional::new(fact_to_check))
                                    },
                                    true,
                                    left,
                                    world,
                                    Some(condition_parameters),
                                );
                            }
                        }
                    }
                    false
                }
                op if op.is_comparison() => match left.as_fact() {
                    Some(left_fact) => callback(left_fact),
                    None => false,
                },
                _ => false,
            },
            Condition::Exists { parameter, inner } => {
                let facts = world.facts_mapping();
                let mut local = ParamValues::new();
                local.declare(parameter.clone());
                exists_extract_possibilities_rec(
                    &mut local,
                    condition_parameters,
                    inner,
                    facts,
                    fact_from_effect,
                    parameter,
                    is_wrapping_expression_negated,
                );
                let mut parameters = condition_parameters.clone();
                parameters.declare(parameter.clone());

                inner.find_condition_candidate_from_fact_from_effect(
                    &mut |condition_fact| {
                        let mut fact_to_consider = condition_fact.clone();
                        fact_to_consider.fact.replace_arguments_with_first(&local);
                        callback(&fact_to_consider) == !is_wrapping_expression_negated
                    },
                    world,
                    constants,
                    objects,
                    fact_from_effect,
                    fact_from_effect_parameters,
                    fact_from_effect_tmp_parameters,
                    &parameters,
                    is_wrapping_expression_negated,
                )
            }
            Condition::Forall { parameter, inner } => {
                let facts = world.facts_mapping();
                let mut local = ParamValues::new();
                local.declare(parameter.clone());
                exists_extract_possibilities_rec(
                    &mut local,
                    condition_parameters,
                    inner,
                    facts,
                    fact_from_effect,
                    parameter,
                    is_wrapping_expression_negated,
                );
                let mut parameters = condition_parameters.clone();
                parameters.declare(parameter.clone());

                inner.find_condition_candidate_from_fact_from_effect(
                    &mut |condition_fact| {
                        let mut res = false;
                        let mut values: Vec<Entity> = local
                            .get(parameter)
                            .map(|v| v.keys().cloned().collect())
                            .unwrap_or_default();
                        loop {
                            let mut substitution = ParamValues::new();
                            if let Some(first) = values.first() {
                                substitution.insert(parameter.clone(), first.clone());
                            }
                            let mut fact_to_consider = condition_fact.clone();
                            fact_to_consider
                                .fact
                                .replace_arguments_with_first(&substitution);
                            res = callback(&fact_to_consider) || res;
                            if values.is_empty() {
                                break;
                            }
                            values.remove(0);
                        }
                        res == !is_wrapping_expression_negated
                    },
                    world,
                    constants,
                    objects,
                    fact_from_effect,
                    fact_from_effect_parameters,
                    fact_from_effect_tmp_parameters,
                    &parameters,
                    is_wrapping_expression_negated,
                )
            }
        }
    }

    /// Visit condition facts as long as the callback answers true, resolving
    /// equality and comparison left sides against the given fact set.
    pub fn until_false(
        &self,
        callback: &mut dyn FnMut(&FactOptional) -> bool,
        set_of_facts: &SetOfFacts,
    ) -> bool {
        match self {
            Condition::Fact(fact_optional) => callback(fact_optional),
            Condition::Number(_) => true,
            Condition::Not(inner) => inner.until_false(callback, set_of_facts),
            Condition::Node { op, left, right } => match op {
                ConditionOp::And | ConditionOp::Or | ConditionOp::Imply => {
                    if !left.until_false(callback, set_of_facts) {
                        return false;
                    }
                    right.until_false(callback, set_of_facts)
                }
                ConditionOp::Equality => {
                    if let Some(left_fact) = left.as_fact() {
                        let mut fact_to_check = left_fact.fact.clone();
                        fact_to_check.set_value(right.get_value(set_of_facts));
                        return callback(&FactOptional::new(fact_to_check));
                    }
                    true
                }
                op if op.is_comparison() => match left.as_fact() {
                    Some(left_fact) => callback(left_fact),
                    None => true,
                },
                _ => true,
            },
            Condition::Exists { inner, .. } | Condition::Forall { inner, .. } => {
                inner.until_false(callback, set_of_facts)
            }
        }
    }

    /// The value this sub-condition evaluates to against a fact set.
    pub fn get_value(&self, set_of_facts: &SetOfFacts) -> Option<Entity> {
        match self {
            Condition::Fact(fact_optional) => set_of_facts.get_fluent_value(&fact_optional.fact),
            Condition::Number(nb) => Some(Entity::number_entity(nb.to_string())),
            Condition::Node { op, left, right } => match op {
                ConditionOp::Plus => {
                    plus_entities(left.get_value(set_of_facts), right.get_value(set_of_facts))
                }
                ConditionOp::Minus => {
                    minus_entities(left.get_value(set_of_facts), right.get_value(set_of_facts))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Deep clone under substitution. `invert` produces the De Morgan dual;
    /// derived predicates, when provided, are inlined at fact leaves.
    pub fn clone_with(
        &self,
        substitution: Option<&BTreeMap<Parameter, Entity>>,
        invert: bool,
        derived_predicates: Option<&SetOfDerivedPredicates>,
    ) -> Condition {
        match self {
            Condition::Fact(fact_optional) => {
                if let Some(derived) = derived_predicates {
                    if let Some(mut inlined) = derived.opt_fact_to_condition(fact_optional) {
                        if let Some(subst) = substitution {
                            inlined = inlined.clone_with(Some(subst), false, None);
                        }
                        if invert {
                            inlined = Condition::Not(Box::new(inlined));
                        }
                        return inlined;
                    }
                }
                let mut res = fact_optional.clone();
                if let Some(subst) = substitution {
                    res.fact.replace_arguments(subst);
                }
                if invert {
                    res.is_fact_negated = !res.is_fact_negated;
                }
                Condition::Fact(res)
            }
            Condition::Number(nb) => Condition::Number(*nb),
            Condition::Not(inner) => {
                if invert {
                    inner.clone_with(substitution, false, derived_predicates)
                } else {
                    Condition::Not(Box::new(inner.clone_with(
                        substitution,
                        false,
                        derived_predicates,
                    )))
                }
            }
            Condition::Node { op, left, right } => {
                if !invert {
                    return Condition::Node {
                        op: *op,
                        left: Box::new(left.clone_with(substitution, false, derived_predicates)),
                        right: Box::new(right.clone_with(substitution, false, derived_predicates)),
                    };
                }
                let inverted_op = match op {
                    ConditionOp::And => Some(ConditionOp::Or),
                    ConditionOp::Or => Some(ConditionOp::And),
                    _ => None,
                };
                match inverted_op {
                    Some(op) => Condition::Node {
                        op,
                        left: Box::new(left.clone_with(substitution, true, derived_predicates)),
                        right: Box::new(right.clone_with(substitution, true, derived_predicates)),
                    },
                    None => Condition::Not(Box::new(Condition::Node {
                        op: *op,
                        left: Box::new(left.clone_with(substitution, false, derived_predicates)),
                        right: Box::new(right.clone_with(
                            substitution,
                            false,
                            derived_predicates,
                        )),
                    })),
                }
            }
            Condition::Exists { parameter, inner } => {
                let res = Condition::Exists {
                    parameter: parameter.clone(),
                    inner: Box::new(inner.clone_with(substitution, false, derived_predicates)),
                };
                if invert {
                    Condition::Not(Box::new(res))
                } else {
                    res
                }
            }
            Condition::Forall { parameter, inner } => {
                let res = Condition::Forall {
                    parameter: parameter.clone(),
                    inner: Box::new(inner.clone_with(substitution, false, derived_predicates)),
                };
                if invert {
                    Condition::Not(Box::new(res))
                } else {
                    res
                }
            }
        }
    }

    /// A contradiction between this condition and the given effect facts.
    pub fn has_a_contradiction_with(
        &self,
        facts_opt: &BTreeSet<FactOptional>,
        is_wrapping_expression_negated: bool,
        parameters: Option<&[Parameter]>,
    ) -> bool {
        match self {
            Condition::Fact(fact_optional) => fact_optional.has_a_contradiction_with(
                facts_opt,
                parameters,
                is_wrapping_expression_negated,
            ),
            Condition::Number(_) => false,
            Condition::Not(inner) => inner.has_a_contradiction_with(
                facts_opt,
                !is_wrapping_expression_negated,
                parameters,
            ),
            Condition::Node { op, left, right } => {
                let and_like = matches!(op, ConditionOp::And | ConditionOp::Imply);
                if (and_like && !is_wrapping_expression_negated)
                    || (*op == ConditionOp::Or && is_wrapping_expression_negated)
                {
                    left.has_a_contradiction_with(
                        facts_opt,
                        is_wrapping_expression_negated,
                        parameters,
                    ) || right.has_a_contradiction_with(
                        facts_opt,
                        is_wrapping_expression_negated,
                        parameters,
                    )
                } else if (*op == ConditionOp::Or && !is_wrapping_expression_negated)
                    || (and_like && is_wrapping_expression_negated)
                {
                    left.has_a_contradiction_with(
                        facts_opt,
                        is_wrapping_expression_negated,
                        parameters,
                    ) && right.has_a_contradiction_with(
                        facts_opt,
                        is_wrapping_expression_negated,
                        parameters,
                    )
                } else if let Some(left_fact) = left.as_fact() {
                    facts_opt
                        .iter()
                        .any(|fo| left_fact.fact.equal_without_value(&fo.fact, None, None))
                } else {
                    false
                }
            }
            Condition::Exists { parameter, inner } | Condition::Forall { parameter, inner } => {
                let mut context: Vec<Parameter> = parameters.map(<[_]>::to_vec).unwrap_or_default();
                context.push(parameter.clone());
                inner.has_a_contradiction_with(
                    facts_opt,
                    is_wrapping_expression_negated,
                    Some(&context),
                )
            }
        }
    }
}

/// Shared recursion of `Exists` / `Forall` evaluation. `must_be_true_for_all`
/// requires the local parameter candidates to cover the whole entity pool.
#[allow(clippy::too_many_arguments)]
fn is_true_rec(
    local_param_to_value: &mut ParamValues,
    mut parameters: Option<&mut ParamValues>,
    must_be_true_for_all: bool,
    condition: &Condition,
    world: &WorldState,
    punctual_facts: &BTreeSet<Fact>,
    removed_facts: &BTreeSet<Fact>,
    all_entities_for_param: &BTreeSet<Entity>,
) -> bool {
    match condition {
        Condition::Fact(fact_optional) => {
            let res = world.is_optional_fact_satisfied_in_context(
                fact_optional,
                punctual_facts,
                removed_facts,
                parameters,
                Some(local_param_to_value),
            );
            if must_be_true_for_all && !fact_optional.is_fact_negated && res {
                for (_, candidates) in local_param_to_value.iter() {
                    let keys: BTreeSet<Entity> = candidates.keys().cloned().collect();
                    if keys != *all_entities_for_param {
                        return false;
                    }
                }
            }
            if !must_be_true_for_all && fact_optional.is_fact_negated && !res {
                for (_, candidates) in local_param_to_value.iter() {
                    let keys: BTreeSet<Entity> = candidates.keys().cloned().collect();
                    if keys != *all_entities_for_param {
                        return true;
                    }
                }
            }
            res
        }
        Condition::Node { op, left, right } => match op {
            ConditionOp::And => {
                is_true_rec(
                    local_param_to_value,
                    parameters.as_deref_mut(),
                    must_be_true_for_all,
                    left,
                    world,
                    punctual_facts,
                    removed_facts,
                    all_entities_for_param,
                ) && is_true_rec(
                    local_param_to_value,
                    parameters,
                    must_be_true_for_all,
                    right,
                    world,
                    punctual_facts,
                    removed_facts,
                    all_entities_for_param,
                )
            }
            ConditionOp::Or => {
                is_true_rec(
                    local_param_to_value,
                    parameters.as_deref_mut(),
                    must_be_true_for_all,
                    left,
                    world,
                    punctual_facts,
                    removed_facts,
                    all_entities_for_param,
                ) || is_true_rec(
                    local_param_to_value,
                    parameters,
                    must_be_true_for_all,
                    right,
                    world,
                    punctual_facts,
                    removed_facts,
                    all_entities_for_param,
                )
            }
            ConditionOp::Imply => {
                if is_true_rec(
                    local_param_to_value,
                    parameters.as_deref_mut(),
                    must_be_true_for_all,
                    left,
                    world,
                    punctual_facts,
                    removed_facts,
                    all_entities_for_param,
                ) {
                    return is_true_rec(
                        local_param_to_value,
                        parameters,
                        must_be_true_for_all,
                        right,
                        world,
                        punctual_facts,
                        removed_facts,
                        all_entities_for_param,
                    );
                }
                true
            }
            ConditionOp::Equality => {
                equality_under_quantifier(
                    local_param_to_value,
                    parameters,
                    left,
                    right,
                    world,
                )
            }
            _ => false,
        },
        _ => false,
    }
}

fn equality_under_quantifier(
    local_param_to_value: &mut ParamValues,
    mut parameters: Option<&mut ParamValues>,
    left: &Condition,
    right: &Condition,
    world: &WorldState,
) -> bool {
    let mut left_possible_values_to_params: BTreeMap<Entity, ParamValues> = BTreeMap::new();
    if let Some(left_fact) = left.as_fact() {
        let parameters_shared = parameters.as_deref();
        world.iterate_on_matching_facts_without_value(
            &mut |stored| {
                if let Some(value) = stored.value() {
                    let entry = left_possible_values_to_params
                        .entry(value.clone())
                        .or_default();
                    if let Some(params) = parameters_shared {
                        for (param, _) in params.iter() {
                            if let Some(arg_value) = left_fact
                                .fact
                                .extract_argument_from_example_ignoring_value(param, stored)
                            {
                                entry.insert(param.clone(), arg_value);
                            }
                        }
                    }
                }
                false
            },
            &left_fact.fact,
            local_param_to_value,
            parameters_shared,
        );
    }

    let mut res = false;
    if let Some(right_fact) = right.as_fact() {
        let mut new_parameters = ParamValues::new();
        {
            let parameters_shared = parameters.as_deref();
            world.iterate_on_matching_facts_without_value(
                &mut |stored| {
                    if let Some(value) = stored.value() {
                        if let Some(left_params) = left_possible_values_to_params.get(value) {
                            if let Some(params) = parameters_shared {
                                if !left_params.is_empty() {
                                    new_parameters.merge_union(left_params.clone());
                                } else {
                                    for (param, _) in params.iter() {
                                        if let Some(arg_value) = right_fact
                                            .fact
                                            .extract_argument_from_example_ignoring_value(
                                                param, stored,
                                            )
                                        {
                                            new_parameters.insert(param.clone(), arg_value);
                                        }
                                    }
                                }
                            }
                            res = true;
                        }
                    }
                    res && parameters_shared.is_none()
                },
                &right_fact.fact,
                local_param_to_value,
                parameters_shared,
            );
        }
        if let Some(params) = parameters.as_deref_mut() {
            params.apply_new_params(new_parameters);
        }
    }
    res
}

pub(crate) fn plus_entities(a: Option<Entity>, b: Option<Entity>) -> Option<Entity> {
    arith_entities(a, b, |x, y| x + y, "+")
}

pub(crate) fn minus_entities(a: Option<Entity>, b: Option<Entity>) -> Option<Entity> {
    arith_entities(a, b, |x, y| x - y, "-")
}

pub(crate) fn multiply_entities(a: Option<Entity>, b: Option<Entity>) -> Option<Entity> {
    arith_entities(a, b, |x, y| x * y, "*")
}

fn arith_entities(
    a: Option<Entity>,
    b: Option<Entity>,
    op: fn(Number, Number) -> Number,
    op_str: &str,
) -> Option<Entity> {
    let a = a?;
    let b = b?;
    if a.ty != b.ty {
        return None;
    }
    match (a.value.parse::<Number>(), b.value.parse::<Number>()) {
        (Ok(x), Ok(y)) => Some(Entity::new(op(x, y).to_string(), a.ty.clone())),
        _ => Some(Entity::new(
            format!("{}{}{}", a.value, op_str, b.value),
            a.ty.clone(),
        )),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Fact(fact_optional) => write!(f, "{fact_optional}"),
            Condition::Number(nb) => write!(f, "{nb}"),
            Condition::Not(inner) => {
                if matches!(**inner, Condition::Exists { .. }) {
                    write!(f, "!{inner}")
                } else {
                    write!(f, "!({inner})")
                }
            }
            Condition::Node { op, left, right } => match op {
                ConditionOp::And => write!(f, "{left} & {right}"),
                ConditionOp::Or => write!(f, "{left} | {right}"),
                ConditionOp::Imply => write!(f, "imply({left}, {right})"),
                ConditionOp::Equality => write!(f, "equals({left}, {right})"),
                ConditionOp::Plus => write!(f, "{left} + {right}"),
                ConditionOp::Minus => write!(f, "{left} - {right}"),
                ConditionOp::Superior => write!(f, "{left}>{right}"),
                ConditionOp::SuperiorOrEqual => write!(f, "{left}>={right}"),
                ConditionOp::Inferior => write!(f, "{left}<{right}"),
                ConditionOp::InferiorOrEqual => write!(f, "{left}<={right}"),
            },
            Condition::Exists { parameter, inner } => {
                write!(f, "exists({parameter}, {inner})")
            }
            Condition::Forall { parameter, inner } => {
                write!(f, "forall({parameter}, {inner})")
            }
        }
    }
}

/// Derived predicates: a predicate standing for a defining condition,
/// inlined when conditions are cloned for planning.
#[derive(Debug, Clone, Default)]
pub struct SetOfDerivedPredicates {
    name_to_predicate: BTreeMap<String, Predicate>,
    name_to_condition: BTreeMap<String, Condition>,
}

impl SetOfDerivedPredicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, predicate: Predicate, condition: Condition) {
        self.name_to_condition
            .insert(predicate.name.clone(), condition);
        self.name_to_predicate
            .insert(predicate.name.clone(), predicate);
    }

    pub fn predicate(&self, name: &str) -> Option<&Predicate> {
        self.name_to_predicate.get(name)
    }

    /// The defining condition of a derived fact, with the declaration
    /// parameters substituted by the fact's arguments.
    pub fn opt_fact_to_condition(&self, fact_optional: &FactOptional) -> Option<Condition> {
        let predicate = self.name_to_predicate.get(fact_optional.fact.name())?;
        let condition = self.name_to_condition.get(fact_optional.fact.name())?;
        let mut substitution = BTreeMap::new();
        for (declared, argument) in predicate
            .parameters
            .iter()
            .zip(fact_optional.fact.arguments())
        {
            substitution.insert(declared.clone(), argument.clone());
        }
        Some(condition.clone_with(Some(&substitution), fact_optional.is_fact_negated, None))
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_predicate.is_empty()
    }
}
