use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, trace};

use planweave_core::{
    generate_full_event_id, type_to_entities, Action, ActionId, Condition, Domain, Entity,
    EventId, Fact, FactOptional, Goal, Historical, LookForAnActionOutputInfos,
    ModificationParams, ParamValues, Parameter, Problem, Result, SetOfCallbacks, SetOfEntities,
    SetOfEventsId, Successions, WorldStateModification,
};

use crate::already_done::{FactsAlreadyChecked, TreeOfAlreadyDonePaths};
use crate::cost::PlanCost;
use crate::invocation::{ActionInvocation, ActionInvocationWithGoal};
use crate::notify::{
    update_problem_for_next_potential_planner_result,
    update_problem_for_next_potential_planner_result_with_action,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PossibleEffect {
    Satisfied,
    SatisfiedButDoesNotModifyTheWorld,
    NotSatisfied,
}

fn merge_effects(a: PossibleEffect, b: PossibleEffect) -> PossibleEffect {
    use PossibleEffect::*;
    if a == Satisfied || b == Satisfied {
        return Satisfied;
    }
    if a == SatisfiedButDoesNotModifyTheWorld || b == SatisfiedButDoesNotModifyTheWorld {
        return SatisfiedButDoesNotModifyTheWorld;
    }
    NotSatisfied
}

#[derive(Debug, Default)]
struct DataRelatedToOptimisation {
    try_to_do_more_optimal_solution: bool,
    /// Entities that became candidates through an event deduction: picking
    /// one means the next plan step is the event firing, not an action.
    parameter_to_entities_from_event: ParamValues,
}

/// The previously chosen action while costing the rest of a plan.
pub(crate) struct ActionWithGoalRef<'a> {
    action: &'a Action,
    goal: &'a Goal,
}

struct ResearchContext<'a> {
    goal: &'a Goal,
    problem: &'a Problem,
    domain: &'a Domain,
}

struct ActionInvocationWithRef<'a> {
    invocation: ActionInvocation,
    action: &'a Action,
}

struct PotentialNextActionComparisonCache {
    current_cost: PlanCost,
}

fn get_prefer_in_context_statistics(
    action: &Action,
    facts: &BTreeMap<Fact, bool>,
) -> (usize, usize) {
    let mut nb_satisfied = 0;
    let mut nb_not_satisfied = 0;
    if let Some(prefer_in_context) = &action.prefer_in_context {
        prefer_in_context.for_each_opt_fact(false, false, false, &mut |fact_optional, _| {
            let present = facts.contains_key(&fact_optional.fact);
            if present != fact_optional.is_fact_negated {
                nb_satisfied += 1;
            } else {
                nb_not_satisfied += 1;
            }
            true
        });
    }
    (nb_satisfied, nb_not_satisfied)
}

impl<'a> ActionInvocationWithRef<'a> {
    fn next_step_is_an_event(&self, parameter_to_entities_from_event: &ParamValues) -> bool {
        self.invocation
            .parameters
            .iter()
            .any(|(parameter, entity)| parameter_to_entities_from_event.has_value(parameter, entity))
    }

    /// Tie-break ordering between two viable invocations. Earlier criterion
    /// wins: non-repetition importance, prefer-in-context counts, local then
    /// global history, lexicographic id.
    fn is_more_important_than(
        &self,
        other: &ActionInvocationWithRef<'_>,
        problem: &Problem,
        global_historical: Option<&Historical>,
    ) -> bool {
        let nb_of_times_done = problem
            .historical
            .get_nb_of_time_an_action_has_already_been_done(&self.invocation.action_id);
        let other_nb_of_times_done = problem
            .historical
            .get_nb_of_time_an_action_has_already_been_done(&other.invocation.action_id);

        if self.action.high_importance_of_not_repeating_it {
            if other.action.high_importance_of_not_repeating_it {
                if nb_of_times_done != other_nb_of_times_done {
                    return nb_of_times_done < other_nb_of_times_done;
                }
            } else if nb_of_times_done > 0 {
                return false;
            }
        } else if other.action.high_importance_of_not_repeating_it && other_nb_of_times_done > 0 {
            return true;
        }

        let facts = problem.world_state.facts();
        let (nb_satisfied, nb_not_satisfied) =
            get_prefer_in_context_statistics(self.action, facts);
        let (other_nb_satisfied, other_nb_not_satisfied) =
            get_prefer_in_context_statistics(other.action, facts);
        if nb_satisfied != other_nb_satisfied {
            return nb_satisfied > other_nb_satisfied;
        }
        if nb_not_satisfied != other_nb_not_satisfied {
            return nb_not_satisfied < other_nb_not_satisfied;
        }

        if nb_of_times_done != other_nb_of_times_done {
            return nb_of_times_done < other_nb_of_times_done;
        }

        if let Some(historical) = global_historical {
            let global_nb =
                historical.get_nb_of_time_an_action_has_already_been_done(&self.invocation.action_id);
            let other_global_nb = historical
                .get_nb_of_time_an_action_has_already_been_done(&other.invocation.action_id);
            if global_nb != other_global_nb {
                return global_nb < other_global_nb;
            }
        }
        self.invocation.action_id < other.invocation.action_id
    }
}

/// Ground a candidate's parameter map: unconstrained parameters take the
/// whole pool of their type, any-entity candidates expand to theirs, and the
/// cartesian product yields one invocation per grounding.
fn to_action_invocations<'a>(
    action_id: &str,
    action: &'a Action,
    mut parameters: ParamValues,
    constants: &SetOfEntities,
    objects: &SetOfEntities,
) -> Vec<ActionInvocationWithRef<'a>> {
    if parameters.is_empty() {
        return vec![ActionInvocationWithRef {
            invocation: ActionInvocation::new(action_id, BTreeMap::new()),
            action,
        }];
    }
    let declared: Vec<Parameter> = parameters.parameters().cloned().collect();
    for parameter in declared {
        let values = parameters.entry_values(&parameter);
        if values.is_empty() {
            if let Some(ty) = &parameter.ty {
                for entity in type_to_entities(ty, constants, objects) {
                    values.entry(entity).or_default();
                }
            }
        } else {
            let any_entities: Vec<Entity> =
                values.keys().filter(|e| e.is_any_entity()).cloned().collect();
            for any_entity in any_entities {
                values.remove(&any_entity);
                if let Some(ty) = any_entity.ty.as_ref().or(parameter.ty.as_ref()) {
                    for entity in type_to_entities(ty, constants, objects) {
                        values.entry(entity).or_default();
                    }
                }
            }
        }
    }
    parameters
        .unfold()
        .into_iter()
        .map(|grounding| ActionInvocationWithRef {
            invocation: ActionInvocation::new(action_id, grounding),
            action,
        })
        .collect()
}

/// Resolve one unconstrained parameter of an enabling action/event: extract
/// its possible entities from the condition facts the effect fact can match.
/// Falls back to the whole type pool minus the already satisfied entities.
#[allow(clippy::too_many_arguments)]
fn fill_parameter(
    parameter: &Parameter,
    parameter_values_is_empty: bool,
    new_parent_parameters: &mut ParamValues,
    holding_action_parameters: &ParamValues,
    condition: &Condition,
    fact: &Fact,
    parent_parameters: &ParamValues,
    tmp_parent_parameters: Option<&ParamValues>,
    context: &ResearchContext<'_>,
) -> bool {
    if !(parameter_values_is_empty && fact.has_parameter_or_value(parameter)) {
        return true;
    }
    let ontology = context.domain.ontology();
    let mut new_param_values: BTreeMap<Entity, planweave_core::EntityConstraints> =
        BTreeMap::new();
    let mut parameter_type = parameter.ty.clone();
    let mut found_something_that_matched = false;

    condition.find_condition_candidate_from_fact_from_effect(
        &mut |condition_fact_optional| {
            let Some(parent_param_value) =
                fact.extract_argument_from_example(parameter, &condition_fact_optional.fact)
            else {
                return false;
            };
            found_something_that_matched = true;
            // The extracted entity may itself be a parameter of the holding
            // action: replace it by that parameter's candidates.
            if let Some((_, candidates)) =
                holding_action_parameters.get_entry(&parent_param_value.to_parameter())
            {
                new_param_values = candidates.clone();
            } else if !parent_param_value.is_a_parameter_to_fill()
                || parent_param_value.is_any_entity()
            {
                new_param_values.entry(parent_param_value).or_default();
            } else if let (Some(value_ty), Some(param_ty)) =
                (&parent_param_value.ty, &parameter_type)
            {
                if value_ty.is_a(param_ty) {
                    parameter_type = parent_param_value.ty.clone();
                }
            }
            !new_param_values.is_empty()
        },
        &context.problem.world_state,
        &ontology.constants,
        &context.problem.objects,
        fact,
        parent_parameters,
        tmp_parent_parameters,
        holding_action_parameters,
        false,
    );

    if found_something_that_matched && new_param_values.is_empty() {
        if let Some(ty) = &parameter_type {
            let pool = type_to_entities(ty, &ontology.constants, &context.problem.objects);
            let mut already_satisfied = BTreeSet::new();
            context
                .problem
                .world_state
                .facts_mapping()
                .extract_potential_arguments_of_a_fact_parameter(
                    &mut already_satisfied,
                    fact,
                    &parameter.name,
                    &ParamValues::new(),
                    None,
                );
            for entity in pool {
                if !already_satisfied.contains(&entity) {
                    new_param_values.entry(entity).or_default();
                }
            }
        }
        let is_empty = new_param_values.is_empty();
        new_parent_parameters.set_values(parameter.clone(), new_param_values);
        return !is_empty;
    }
    new_parent_parameters.set_values(parameter.clone(), new_param_values);
    true
}

/// Fill the still-open parent parameters from the enabling condition, then
/// classify the effect: does applying it change the world at all.
fn check_condition_and_fill_parameters(
    condition: &Condition,
    fact_optional: &FactOptional,
    parent_parameters: &mut ParamValues,
    mut tmp_parent_parameters: Option<&mut ParamValues>,
    context: &ResearchContext<'_>,
    holding_action_parameters: &ParamValues,
) -> PossibleEffect {
    let mut new_parent_parameters = ParamValues::new();
    let parent_snapshot = parent_parameters.clone();
    let tmp_snapshot = tmp_parent_parameters.as_deref().cloned();
    for (parameter, values) in parent_snapshot.iter() {
        if !fill_parameter(
            parameter,
            values.is_empty(),
            &mut new_parent_parameters,
            holding_action_parameters,
            condition,
            &fact_optional.fact,
            &parent_snapshot,
            tmp_snapshot.as_ref(),
            context,
        ) {
            return PossibleEffect::NotSatisfied;
        }
    }
    if let Some(tmp) = tmp_parent_parameters.as_deref_mut() {
        let mut new_tmp_parameters = ParamValues::new();
        if let Some(tmp_snapshot) = &tmp_snapshot {
            for (parameter, values) in tmp_snapshot.iter() {
                if !fill_parameter(
                    parameter,
                    values.is_empty(),
                    &mut new_tmp_parameters,
                    holding_action_parameters,
                    condition,
                    &fact_optional.fact,
                    &parent_snapshot,
                    Some(tmp_snapshot),
                    context,
                ) {
                    return PossibleEffect::NotSatisfied;
                }
            }
        }
        tmp.apply_new_params(new_tmp_parameters);
    }
    parent_parameters.apply_new_params(new_parent_parameters);

    if context
        .problem
        .world_state
        .can_be_modified_by(fact_optional, parent_parameters)
    {
        PossibleEffect::Satisfied
    } else {
        PossibleEffect::SatisfiedButDoesNotModifyTheWorld
    }
}

/// One backward step: can this action/event, whose own effect must in turn
/// help, be enabled with some grounding.
#[allow(clippy::too_many_arguments)]
fn look_for_a_possible_deduction(
    tree_of_already_done_paths: &mut TreeOfAlreadyDonePaths,
    parameters: &[Parameter],
    condition: &Condition,
    ws_modification1: Option<&WorldStateModification>,
    ws_modification2: Option<&WorldStateModification>,
    fact_optional: &FactOptional,
    parent_parameters: &mut ParamValues,
    tmp_parent_parameters: Option<&mut ParamValues>,
    context: &ResearchContext<'_>,
    facts_already_checked: &mut FactsAlreadyChecked,
    from_deduction_id: &str,
) -> PossibleEffect {
    let mut parameters_with_data = ParamValues::from_parameters(parameters);
    let mut data = DataRelatedToOptimisation::default();
    if look_for_a_possible_effect(
        &mut parameters_with_data,
        &mut data,
        tree_of_already_done_paths,
        ws_modification1,
        ws_modification2,
        context,
        facts_already_checked,
        from_deduction_id,
    ) {
        return check_condition_and_fill_parameters(
            condition,
            fact_optional,
            parent_parameters,
            tmp_parent_parameters,
            context,
            &parameters_with_data,
        );
    }
    PossibleEffect::NotSatisfied
}

/// Commit a satisfied candidate's refined parameters. Without lookahead the
/// first satisfied candidate wins and its bindings replace the parent's;
/// with lookahead the candidates accumulate so cost comparison can pick.
#[allow(clippy::too_many_arguments)]
fn update_possible_parameters(
    new_possible_parent_parameters: &mut ParamValues,
    new_possible_tmp_parent_parameters: &mut ParamValues,
    parent_parameters: &mut ParamValues,
    cp_parent_parameters: ParamValues,
    tmp_parent_parameters: Option<&mut ParamValues>,
    data_related_to_optimisation: &mut DataRelatedToOptimisation,
    cp_tmp_parameters: ParamValues,
    from_event: bool,
) -> bool {
    if cp_parent_parameters.is_empty() && cp_tmp_parameters.is_empty() {
        return true;
    }
    if !data_related_to_optimisation.try_to_do_more_optimal_solution {
        *parent_parameters = cp_parent_parameters;
        if let Some(tmp) = tmp_parent_parameters {
            *tmp = cp_tmp_parameters;
        }
        return true;
    }
    if from_event {
        for (parameter, values) in cp_parent_parameters.iter() {
            let slot = new_possible_parent_parameters.entry_values(parameter);
            for (entity, constraints) in values {
                if !slot.contains_key(entity) {
                    slot.insert(entity.clone(), constraints.clone());
                    data_related_to_optimisation
                        .parameter_to_entities_from_event
                        .insert(parameter.clone(), entity.clone());
                }
            }
        }
    } else {
        new_possible_parent_parameters.merge_union(cp_parent_parameters);
    }
    if tmp_parent_parameters.is_some() {
        new_possible_tmp_parent_parameters.merge_union(cp_tmp_parameters);
    }
    false
}

/// Try every acceptable successor action and event as the enabler of the
/// needed fact. Returns true when the parent parameters were committed and
/// iteration can stop.
#[allow(clippy::too_many_arguments)]
fn look_for_possible_from_actions_and_events(
    res: &mut PossibleEffect,
    new_possible_parent_parameters: &mut ParamValues,
    new_possible_tmp_parent_parameters: &mut ParamValues,
    action_successions: &BTreeSet<ActionId>,
    event_successions: &BTreeMap<SetOfEventsId, BTreeSet<EventId>>,
    fact_optional: &FactOptional,
    parent_parameters: &mut ParamValues,
    mut tmp_parent_parameters: Option<&mut ParamValues>,
    data_related_to_optimisation: &mut DataRelatedToOptimisation,
    tree_of_already_done_paths: &mut TreeOfAlreadyDonePaths,
    context: &ResearchContext<'_>,
    facts_already_checked: &mut FactsAlreadyChecked,
) -> bool {
    for action_id in action_successions {
        if !context.goal.actions_predecessors().contains(action_id) {
            continue;
        }
        let Some(action) = context.domain.get_action(action_id) else {
            continue;
        };
        let Some(precondition) = &action.precondition else {
            continue;
        };
        let Some(subtree) =
            tree_of_already_done_paths.get_next_action_tree_if_not_an_existing_leaf(action_id)
        else {
            continue;
        };

        let mut cp_parent_parameters = parent_parameters.clone();
        let mut cp_tmp_parameters = tmp_parent_parameters.as_deref().cloned().unwrap_or_default();
        let has_tmp = tmp_parent_parameters.is_some();
        let new_res = look_for_a_possible_deduction(
            subtree,
            &action.parameters,
            precondition,
            action.effect.world_state_modification.as_ref(),
            action.effect.potential_world_state_modification.as_ref(),
            fact_optional,
            &mut cp_parent_parameters,
            if has_tmp {
                Some(&mut cp_tmp_parameters)
            } else {
                None
            },
            context,
            facts_already_checked,
            action_id,
        );
        *res = merge_effects(new_res, *res);

        if new_res == PossibleEffect::Satisfied
            && update_possible_parameters(
                new_possible_parent_parameters,
                new_possible_tmp_parent_parameters,
                parent_parameters,
                cp_parent_parameters,
                tmp_parent_parameters.as_deref_mut(),
                data_related_to_optimisation,
                cp_tmp_parameters,
                false,
            )
        {
            return true;
        }
    }

    for (set_of_events_id, event_ids) in event_successions {
        let Some(set_of_events) = context.domain.set_of_events().get(set_of_events_id) else {
            continue;
        };
        for event_id in event_ids {
            let Some(event) = set_of_events.events().get(event_id) else {
                continue;
            };
            if event.facts_to_modify.is_none() {
                continue;
            }
            let full_event_id = generate_full_event_id(set_of_events_id, event_id);
            if !context.goal.events_predecessors().contains(&full_event_id) {
                continue;
            }
            let Some(precondition) = &event.precondition else {
                continue;
            };
            let Some(subtree) =
                tree_of_already_done_paths.get_next_event_tree_if_not_an_existing_leaf(event_id)
            else {
                continue;
            };

            let mut cp_parent_parameters = parent_parameters.clone();
            let mut cp_tmp_parameters =
                tmp_parent_parameters.as_deref().cloned().unwrap_or_default();
            let has_tmp = tmp_parent_parameters.is_some();
            let new_res = look_for_a_possible_deduction(
                subtree,
                &event.parameters,
                precondition,
                event.facts_to_modify.as_ref(),
                None,
                fact_optional,
                &mut cp_parent_parameters,
                if has_tmp {
                    Some(&mut cp_tmp_parameters)
                } else {
                    None
                },
                context,
                facts_already_checked,
                &full_event_id,
            );
            *res = merge_effects(new_res, *res);

            if new_res == PossibleEffect::Satisfied
                && update_possible_parameters(
                    new_possible_parent_parameters,
                    new_possible_tmp_parent_parameters,
                    parent_parameters,
                    cp_parent_parameters,
                    tmp_parent_parameters.as_deref_mut(),
                    data_related_to_optimisation,
                    cp_tmp_parameters,
                    true,
                )
            {
                return true;
            }
        }
    }
    false
}

/// Does the effect fact match one condition fact of the goal objective,
/// under the known candidate bindings.
fn does_condition_match_an_optional_fact(
    parameters: &ParamValues,
    fact_optional: &FactOptional,
    parameters_to_modify_in_place: Option<&ParamValues>,
    context: &ResearchContext<'_>,
) -> bool {
    let ontology = context.domain.ontology();
    let objective = context.goal.objective();
    objective.find_condition_candidate_from_fact_from_effect(
        &mut |condition_fact_optional| {
            if !condition_fact_optional.fact.has_a_parameter(false)
                && context
                    .problem
                    .world_state
                    .is_optional_fact_satisfied(condition_fact_optional)
            {
                return false;
            }
            let mut matches = condition_fact_optional.fact.equal_except_any_entities(
                &fact_optional.fact,
                Some(parameters),
                parameters_to_modify_in_place,
                None,
            );
            if condition_fact_optional.is_fact_negated != fact_optional.is_fact_negated {
                matches = !matches;
            }
            matches
        },
        &context.problem.world_state,
        &ontology.constants,
        &context.problem.objects,
        &fact_optional.fact,
        parameters,
        parameters_to_modify_in_place,
        &ParamValues::new(),
        false,
    )
}

/// Direct check: can the candidate effects satisfy the goal objective right
/// away, refining parameters.
fn does_satisfy_the_goal(
    parameters: &mut ParamValues,
    ws_modification1: Option<&WorldStateModification>,
    ws_modification2: Option<&WorldStateModification>,
    context: &ResearchContext<'_>,
    from_deduction_id: &str,
) -> bool {
    let mut check_objective_callback =
        |fact_optional: &FactOptional,
         parameters: &mut ParamValues,
         parameters_to_modify_in_place: Option<&mut ParamValues>|
         -> bool {
            if !does_condition_match_an_optional_fact(
                parameters,
                fact_optional,
                parameters_to_modify_in_place.as_deref(),
                context,
            ) {
                return false;
            }
            if parameters.is_empty() && parameters_to_modify_in_place.is_none() {
                return true;
            }
            check_condition_and_fill_parameters(
                context.goal.objective(),
                fact_optional,
                parameters,
                parameters_to_modify_in_place,
                context,
                &ParamValues::new(),
            ) == PossibleEffect::Satisfied
        };

    let constants = &context.domain.ontology().constants;
    let objects = &context.problem.objects;
    let world = &context.problem.world_state;
    if let Some(modification) = ws_modification1 {
        if modification.can_satisfy_objective(
            &mut check_objective_callback,
            parameters,
            world,
            from_deduction_id,
            constants,
            objects,
        ) {
            return true;
        }
    }
    if let Some(modification) = ws_modification2 {
        if modification.can_satisfy_objective(
            &mut check_objective_callback,
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

/// The recursion core: does any effect here, or any effect reachable through
/// the succession edges, produce a fact the goal needs.
#[allow(clippy::too_many_arguments)]
fn look_for_a_possible_effect(
    parameters_with_tmp_data: &mut ParamValues,
    data_related_to_optimisation: &mut DataRelatedToOptimisation,
    tree_of_already_done_paths: &mut TreeOfAlreadyDonePaths,
    ws_modification1: Option<&WorldStateModification>,
    ws_modification2: Option<&WorldStateModification>,
    context: &ResearchContext<'_>,
    facts_already_checked: &mut FactsAlreadyChecked,
    from_deduction_id: &str,
) -> bool {
    let mut can_satisfy_this_goal = context.goal.can_deduction_satisfy(from_deduction_id);
    if can_satisfy_this_goal && context.goal.is_a_simple_fact_objective() {
        if does_satisfy_the_goal(
            parameters_with_tmp_data,
            ws_modification1,
            ws_modification2,
            context,
            from_deduction_id,
        ) {
            return true;
        }
        can_satisfy_this_goal = false;
    }

    let constants = &context.domain.ontology().constants;
    let objects = &context.problem.objects;
    let world = &context.problem.world_state;

    let mut successions_callback =
        |successions: &Successions,
         fact_optional: &FactOptional,
         parameters_with_tmp_data: &mut ParamValues,
         mut parameters_to_modify_in_place: Option<&mut ParamValues>|
         -> bool {
            let mut possible_effect = PossibleEffect::NotSatisfied;
            let mut new_possible_parent_parameters = ParamValues::new();
            let mut new_possible_tmp_parent_parameters = ParamValues::new();
            let mut check_actions_and_events = true;

            if can_satisfy_this_goal
                && does_condition_match_an_optional_fact(
                    parameters_with_tmp_data,
                    fact_optional,
                    parameters_to_modify_in_place.as_deref(),
                    context,
                )
            {
                if parameters_with_tmp_data.is_empty()
                    && parameters_to_modify_in_place.is_none()
                {
                    return true;
                }
                let mut cp_parent_parameters = parameters_with_tmp_data.clone();
                let mut cp_tmp_parameters = parameters_to_modify_in_place
                    .as_deref()
                    .cloned()
                    .unwrap_or_default();
                let has_in_place = parameters_to_modify_in_place.is_some();
                possible_effect = check_condition_and_fill_parameters(
                    context.goal.objective(),
                    fact_optional,
                    &mut cp_parent_parameters,
                    if has_in_place {
                        Some(&mut cp_tmp_parameters)
                    } else {
                        None
                    },
                    context,
                    &ParamValues::new(),
                );
                if possible_effect == PossibleEffect::Satisfied
                    && update_possible_parameters(
                        &mut new_possible_parent_parameters,
                        &mut new_possible_tmp_parent_parameters,
                        parameters_with_tmp_data,
                        cp_parent_parameters,
                        parameters_to_modify_in_place.as_deref_mut(),
                        data_related_to_optimisation,
                        cp_tmp_parameters,
                        false,
                    )
                {
                    check_actions_and_events = false;
                }
            }

            let not_already_checked = if fact_optional.is_fact_negated {
                !facts_already_checked
                    .facts_to_remove
                    .contains(&fact_optional.fact)
            } else {
                !facts_already_checked
                    .facts_to_add
                    .contains(&fact_optional.fact)
            };
            if check_actions_and_events
                && (!successions.actions.is_empty() || !successions.events.is_empty())
                && not_already_checked
            {
                let mut sub_facts_already_checked = facts_already_checked.clone();
                if fact_optional.is_fact_negated {
                    sub_facts_already_checked
                        .facts_to_remove
                        .insert(fact_optional.fact.clone());
                } else {
                    sub_facts_already_checked
                        .facts_to_add
                        .insert(fact_optional.fact.clone());
                }

                look_for_possible_from_actions_and_events(
                    &mut possible_effect,
                    &mut new_possible_parent_parameters,
                    &mut new_possible_tmp_parent_parameters,
                    &successions.actions,
                    &successions.events,
                    fact_optional,
                    parameters_with_tmp_data,
                    parameters_to_modify_in_place.as_deref_mut(),
                    data_related_to_optimisation,
                    tree_of_already_done_paths,
                    context,
                    &mut sub_facts_already_checked,
                );
                if possible_effect != PossibleEffect::SatisfiedButDoesNotModifyTheWorld {
                    facts_already_checked.swap(&mut sub_facts_already_checked);
                }
            }

            if !new_possible_parent_parameters.is_empty() {
                *parameters_with_tmp_data = new_possible_parent_parameters;
                if let Some(in_place) = parameters_to_modify_in_place {
                    *in_place = new_possible_tmp_parent_parameters;
                }
            }
            possible_effect == PossibleEffect::Satisfied
        };

    if let Some(modification) = ws_modification1 {
        if modification.iterate_on_successions(
            &mut successions_callback,
            parameters_with_tmp_data,
            world,
            can_satisfy_this_goal,
            from_deduction_id,
            constants,
            objects,
        ) {
            return true;
        }
    }
    if let Some(modification) = ws_modification2 {
        if modification.iterate_on_successions(
            &mut successions_callback,
            parameters_with_tmp_data,
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

/// Simulate the rest of the plan on a scratch problem and extract its cost.
fn extract_plan_cost(
    problem: &mut Problem,
    domain: &Domain,
    now: Option<Instant>,
    output_infos: &mut LookForAnActionOutputInfos,
    previous_action: Option<&ActionWithGoalRef<'_>>,
) -> Result<PlanCost> {
    let mut res = PlanCost::default();
    if let Some(previous) = previous_action {
        res.cost_for_first_goal += previous.action.duration;
        res.total_cost += previous.action.duration;
    }

    let empty_callbacks = SetOfCallbacks::new();
    let mut action_already_in_plan: BTreeSet<String> = BTreeSet::new();
    let mut should_break = false;
    while !problem.goal_stack.is_empty() {
        if should_break {
            res.success = false;
            break;
        }
        let sub_plan = plan_for_more_important_goal_possible_internal(
            problem,
            domain,
            &empty_callbacks,
            false,
            now,
            None,
            Some(&mut *output_infos),
            previous_action,
        )?;
        if sub_plan.is_empty() {
            break;
        }
        for step in sub_plan {
            if let Some(action) = domain.get_action(&step.action_invocation.action_id) {
                if output_infos.nb_of_not_satisfied_goals() == 0
                    && output_infos.nb_of_satisfied_goals() == 0
                {
                    res.cost_for_first_goal += action.duration;
                }
                res.total_cost += action.duration;
            }
            if !action_already_in_plan.insert(step.action_invocation.to_str()) {
                should_break = true;
            }
            let mut goal_changed = false;
            update_problem_for_next_potential_planner_result(
                problem,
                &mut goal_changed,
                &step,
                domain,
                &empty_callbacks,
                now,
                None,
                Some(&mut *output_infos),
            )?;
            if goal_changed {
                break;
            }
        }
    }

    res.success = output_infos.is_first_goal_in_success();
    res.nb_of_goals_not_satisfied = output_infos.nb_of_not_satisfied_goals();
    res.nb_of_goals_satisfied = output_infos.nb_of_satisfied_goals();
    Ok(res)
}

/// Decide whether the new grounding beats the current best: one-step
/// lookahead costing when enabled and this is the first step of the goal,
/// the tie-break ordering otherwise.
#[allow(clippy::too_many_arguments)]
fn is_more_optimal_next_action(
    comparison_cache: &mut Option<PotentialNextActionComparisonCache>,
    next_in_plan_can_be_an_event: &mut bool,
    new_candidate: &ActionInvocationWithRef<'_>,
    current_best: &Option<ActionInvocationWithRef<'_>>,
    problem: &Problem,
    domain: &Domain,
    data_related_to_optimisation: &DataRelatedToOptimisation,
    length: usize,
    current_goal: &Goal,
    now: Option<Instant>,
    global_historical: Option<&Historical>,
) -> Result<bool> {
    if data_related_to_optimisation.try_to_do_more_optimal_solution && length == 0 {
        if let Some(current) = current_best {
            if new_candidate.action.effect != current.action.effect
                || new_candidate.invocation.parameters != current.invocation.parameters
            {
                let empty_callbacks = SetOfCallbacks::new();
                let next_step_is_an_event = new_candidate.next_step_is_an_event(
                    &data_related_to_optimisation.parameter_to_entities_from_event,
                );
                let new_cost = {
                    let mut local_problem = problem.clone();
                    let mut goal_changed = false;
                    let mut infos = LookForAnActionOutputInfos::new();
                    let one_step = ActionInvocationWithGoal {
                        action_invocation: new_candidate.invocation.clone(),
                        from_goal: None,
                        priority: 0,
                    };
                    update_problem_for_next_potential_planner_result(
                        &mut local_problem,
                        &mut goal_changed,
                        &one_step,
                        domain,
                        &empty_callbacks,
                        now,
                        None,
                        Some(&mut infos),
                    )?;
                    let previous = ActionWithGoalRef {
                        action: new_candidate.action,
                        goal: current_goal,
                    };
                    let previous_ref = if next_step_is_an_event {
                        None
                    } else {
                        Some(&previous)
                    };
                    extract_plan_cost(&mut local_problem, domain, now, &mut infos, previous_ref)?
                };

                if comparison_cache.is_none() {
                    let current_next_step_is_an_event = current.next_step_is_an_event(
                        &data_related_to_optimisation.parameter_to_entities_from_event,
                    );
                    let mut local_problem = problem.clone();
                    let mut goal_changed = false;
                    let mut infos = LookForAnActionOutputInfos::new();
                    let one_step = ActionInvocationWithGoal {
                        action_invocation: current.invocation.clone(),
                        from_goal: None,
                        priority: 0,
                    };
                    update_problem_for_next_potential_planner_result(
                        &mut local_problem,
                        &mut goal_changed,
                        &one_step,
                        domain,
                        &empty_callbacks,
                        now,
                        None,
                        Some(&mut infos),
                    )?;
                    let previous = ActionWithGoalRef {
                        action: current.action,
                        goal: current_goal,
                    };
                    let previous_ref = if current_next_step_is_an_event {
                        None
                    } else {
                        Some(&previous)
                    };
                    let current_cost =
                        extract_plan_cost(&mut local_problem, domain, now, &mut infos, previous_ref)?;
                    *comparison_cache = Some(PotentialNextActionComparisonCache { current_cost });
                }

                let cache = comparison_cache.as_mut().expect("filled above");
                if new_cost.is_better_than(&cache.current_cost) {
                    trace!(candidate = %new_candidate.invocation, "lookahead prefers candidate");
                    cache.current_cost = new_cost;
                    *next_in_plan_can_be_an_event = next_step_is_an_event;
                    return Ok(true);
                }
                if cache.current_cost.is_better_than(&new_cost) {
                    return Ok(false);
                }
            }
        }
    }

    let mut res = true;
    if let Some(current) = current_best {
        res = new_candidate.is_more_important_than(current, problem, global_historical);
    }
    if res {
        *next_in_plan_can_be_an_event = new_candidate
            .next_step_is_an_event(&data_related_to_optimisation.parameter_to_entities_from_event);
        return Ok(true);
    }
    Ok(false)
}

/// Pick the best first action advancing the goal, over the goal's
/// precomputed predecessor pool.
#[allow(clippy::too_many_arguments)]
fn find_first_action_for_a_goal(
    parameters_out: &mut BTreeMap<Parameter, Entity>,
    next_in_plan_can_be_an_event: &mut bool,
    tree_of_already_done_paths: &mut TreeOfAlreadyDonePaths,
    goal: &Goal,
    problem: &Problem,
    domain: &Domain,
    try_to_do_more_optimal_solution: bool,
    length: usize,
    now: Option<Instant>,
    global_historical: Option<&Historical>,
    previous_action: Option<&ActionWithGoalRef<'_>>,
) -> Result<Option<ActionId>> {
    let mut res: Option<ActionInvocationWithRef<'_>> = None;
    let mut action_ids_to_skip: BTreeSet<ActionId> = BTreeSet::new();
    if let Some(previous) = previous_action {
        if previous.goal.objective() == goal.objective() {
            action_ids_to_skip = previous
                .action
                .actions_successions_without_interest_cache
                .clone();
        }
    }
    let mut comparison_cache: Option<PotentialNextActionComparisonCache> = None;
    let context = ResearchContext {
        goal,
        problem,
        domain,
    };
    let ontology = domain.ontology();

    for action_id in goal.actions_predecessors() {
        if action_ids_to_skip.contains(action_id) {
            continue;
        }
        let Some(action) = domain.get_action(action_id) else {
            continue;
        };
        if !action.can_be_used_by_planner {
            continue;
        }
        let Some(subtree) =
            tree_of_already_done_paths.get_next_action_tree_if_not_an_existing_leaf(action_id)
        else {
            continue;
        };

        let mut facts_already_checked = FactsAlreadyChecked::new();
        let mut candidate_parameters = ParamValues::from_parameters(&action.parameters);
        let mut data = DataRelatedToOptimisation {
            try_to_do_more_optimal_solution,
            ..Default::default()
        };
        if !look_for_a_possible_effect(
            &mut candidate_parameters,
            &mut data,
            subtree,
            action.effect.world_state_modification.as_ref(),
            action.effect.potential_world_state_modification.as_ref(),
            &context,
            &mut facts_already_checked,
            action_id,
        ) {
            continue;
        }
        if let Some(precondition) = &action.precondition {
            if !precondition.is_true(
                &problem.world_state,
                &ontology.constants,
                &problem.objects,
                &BTreeSet::new(),
                &BTreeSet::new(),
                Some(&mut candidate_parameters),
                false,
            ) {
                trace!(action_id = %action_id, "candidate rejected by precondition");
                continue;
            }
        }

        let invocations = to_action_invocations(
            action_id,
            action,
            candidate_parameters,
            &ontology.constants,
            &problem.objects,
        );
        for invocation in invocations {
            if is_more_optimal_next_action(
                &mut comparison_cache,
                next_in_plan_can_be_an_event,
                &invocation,
                &res,
                problem,
                domain,
                &data,
                length,
                goal,
                now,
                global_historical,
            )? {
                res = Some(invocation);
            }
        }
    }

    if let Some(found) = res {
        *parameters_out = found.invocation.parameters;
        return Ok(Some(found.invocation.action_id));
    }
    Ok(None)
}

/// Plan one goal to completion on scratch copies of the problem, prepending
/// each chosen action. An action string repeating more than twice along the
/// same goal aborts the branch.
#[allow(clippy::too_many_arguments)]
fn goal_to_plan_rec(
    action_invocations: &mut Vec<ActionInvocationWithGoal>,
    problem: &mut Problem,
    action_already_in_plan: &mut BTreeMap<String, usize>,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    try_to_do_more_optimal_solution: bool,
    now: Option<Instant>,
    global_historical: Option<&Historical>,
    goal: &Goal,
    priority: i32,
    previous_action: Option<&ActionWithGoalRef<'_>>,
) -> Result<bool> {
    let mut tree_of_already_done_paths = TreeOfAlreadyDonePaths::new();
    let mut parameters = BTreeMap::new();
    let mut next_in_plan_can_be_an_event = false;
    let Some(action_id) = find_first_action_for_a_goal(
        &mut parameters,
        &mut next_in_plan_can_be_an_event,
        &mut tree_of_already_done_paths,
        goal,
        problem,
        domain,
        try_to_do_more_optimal_solution,
        0,
        now,
        global_historical,
        previous_action,
    )?
    else {
        return Ok(false);
    };

    let potential_res =
        ActionInvocationWithGoal::new(action_id.clone(), parameters, Some(goal.clone()), priority);
    let step_str = potential_res.action_invocation.to_str();
    let count = action_already_in_plan.entry(step_str).or_insert(0);
    if *count > 1 {
        return Ok(false);
    }
    *count += 1;

    let Some(action) = domain.get_action(&action_id) else {
        return Ok(false);
    };
    let action = action.clone();

    let mut problem_for_plan_cost = problem.clone();
    let mut goal_changed = false;
    update_problem_for_next_potential_planner_result_with_action(
        &mut problem_for_plan_cost,
        &mut goal_changed,
        &potential_res,
        &action,
        domain,
        callbacks,
        now,
        None,
        None,
    )?;

    let previous = ActionWithGoalRef {
        action: &action,
        goal,
    };
    let previous_ref = if next_in_plan_can_be_an_event {
        None
    } else {
        Some(&previous)
    };
    let satisfied = problem_for_plan_cost.world_state.is_goal_satisfied(
        goal,
        &domain.ontology().constants,
        &problem_for_plan_cost.objects,
    );
    if satisfied
        || goal_to_plan_rec(
            action_invocations,
            &mut problem_for_plan_cost,
            action_already_in_plan,
            domain,
            callbacks,
            try_to_do_more_optimal_solution,
            now,
            None,
            goal,
            priority,
            previous_ref,
        )?
    {
        action_invocations.insert(0, potential_res);
        return Ok(true);
    }
    Ok(false)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn plan_for_more_important_goal_possible_internal(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    try_to_do_more_optimal_solution: bool,
    now: Option<Instant>,
    global_historical: Option<&Historical>,
    mut output_infos: Option<&mut LookForAnActionOutputInfos>,
    previous_action: Option<&ActionWithGoalRef<'_>>,
) -> Result<Vec<ActionInvocationWithGoal>> {
    problem.goal_stack.refresh_if_needed(domain);
    let pending = {
        let Problem {
            world_state,
            goal_stack,
            objects,
            ..
        } = problem;
        goal_stack.pending_goals(
            world_state,
            &domain.ontology().constants,
            objects,
            now,
            output_infos.as_deref_mut(),
        )
    };

    for (priority, goal) in pending {
        if let Some(effect_between_goals) = problem.goal_stack.effect_between_goals.clone() {
            let mut goal_changed = false;
            let Problem {
                world_state,
                goal_stack,
                objects,
                ..
            } = problem;
            let params = ModificationParams {
                set_of_events: domain.set_of_events(),
                callbacks,
                ontology: domain.ontology(),
                objects,
                now,
            };
            world_state.apply_effect(
                &BTreeMap::new(),
                Some(&effect_between_goals),
                &mut goal_changed,
                goal_stack,
                &params,
            )?;
        }
        if problem.world_state.is_goal_satisfied(
            &goal,
            &domain.ontology().constants,
            &problem.objects,
        ) {
            continue;
        }

        let mut action_already_in_plan = BTreeMap::new();
        let mut res = Vec::new();
        if goal_to_plan_rec(
            &mut res,
            problem,
            &mut action_already_in_plan,
            domain,
            callbacks,
            try_to_do_more_optimal_solution,
            now,
            global_historical,
            &goal,
            priority,
            previous_action,
        )? {
            problem.goal_stack.notify_goal_activity(&goal, priority, now);
            debug!(goal = %goal, plan_len = res.len(), "plan found for goal");
            return Ok(res);
        }
        problem
            .goal_stack
            .skip_goal(&goal, priority, now, output_infos.as_deref_mut());
    }
    Ok(Vec::new())
}

/// Plan for the most important goal that can be advanced right now. The
/// caller's problem is updated only through its goal stack bookkeeping; the
/// search itself runs on scratch clones.
pub fn plan_for_more_important_goal_possible(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    try_to_do_more_optimal_solution: bool,
    now: Option<Instant>,
    global_historical: Option<&Historical>,
    output_infos: Option<&mut LookForAnActionOutputInfos>,
) -> Result<Vec<ActionInvocationWithGoal>> {
    plan_for_more_important_goal_possible_internal(
        problem,
        domain,
        callbacks,
        try_to_do_more_optimal_solution,
        now,
        global_historical,
        output_infos,
        None,
    )
}

/// Consume the goal stack in priority order, committing each sub-plan into
/// the problem, until no goal can be advanced. Any action string repeating
/// past ten commits stops the loop, bounding degenerate domains.
pub fn plan_for_every_goals(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    now: Option<Instant>,
    mut global_historical: Option<&mut Historical>,
    goals_done: Option<&mut Vec<Goal>>,
) -> Result<Vec<ActionInvocationWithGoal>> {
    let try_to_do_more_optimal_solution = true;
    let mut action_already_in_plan: BTreeMap<String, usize> = BTreeMap::new();
    let mut res = Vec::new();
    let mut infos = LookForAnActionOutputInfos::new();

    'planning: while !problem.goal_stack.is_empty() {
        let sub_plan = plan_for_more_important_goal_possible_internal(
            problem,
            domain,
            callbacks,
            try_to_do_more_optimal_solution,
            now,
            global_historical.as_deref(),
            Some(&mut infos),
            None,
        )?;
        if sub_plan.is_empty() {
            break;
        }
        for step in sub_plan {
            let count = action_already_in_plan
                .entry(step.action_invocation.to_str())
                .or_insert(0);
            if *count > 10 {
                break 'planning;
            }
            *count += 1;
            let mut goal_changed = false;
            update_problem_for_next_potential_planner_result(
                problem,
                &mut goal_changed,
                &step,
                domain,
                callbacks,
                now,
                global_historical.as_deref_mut(),
                Some(&mut infos),
            )?;
            res.push(step);
            if goal_changed {
                break;
            }
        }
    }

    if let Some(goals_done) = goals_done {
        infos.move_goals_done(goals_done);
    }
    Ok(res)
}
