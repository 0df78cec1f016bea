use std::collections::BTreeSet;
use std::time::Instant;

use planweave_core::{
    Domain, FactOptional, Historical, Problem, Result, SetOfCallbacks,
};

use crate::invocation::ActionInvocationWithGoal;
use crate::search::plan_for_every_goals;

/// One rank of a parallelized plan: invocations that can all start now.
#[derive(Debug, Clone, Default)]
pub struct ActionsToDoInParallel {
    pub actions: Vec<ActionInvocationWithGoal>,
}

/// Plan for every goal on a scratch clone, then extract the prefix of the
/// sequential plan that can start immediately: each further action must have
/// its precondition already satisfied in the current world and must neither
/// contradict nor depend on the effects of the actions taken so far.
pub fn actions_to_do_in_parallel_now(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    now: Option<Instant>,
    global_historical: Option<&mut Historical>,
) -> Result<ActionsToDoInParallel> {
    problem.goal_stack.refresh_if_needed(domain);
    let mut problem_for_resolution = problem.clone();
    let mut goals_done = Vec::new();
    let sequential_plan = plan_for_every_goals(
        &mut problem_for_resolution,
        domain,
        callbacks,
        now,
        global_historical,
        Some(&mut goals_done),
    )?;
    Ok(first_parallel_rank(&sequential_plan, problem, domain))
}

fn first_parallel_rank(
    plan: &[ActionInvocationWithGoal],
    problem: &Problem,
    domain: &Domain,
) -> ActionsToDoInParallel {
    let mut res = ActionsToDoInParallel::default();
    let mut committed_effect_facts: BTreeSet<FactOptional> = BTreeSet::new();
    let ontology = domain.ontology();

    for step in plan {
        let Some(action) = domain.get_action(&step.action_invocation.action_id) else {
            continue;
        };
        let substitution = &step.action_invocation.parameters;

        let mut effect_facts = BTreeSet::new();
        if let Some(modification) = &action.effect.world_state_modification {
            effect_facts.extend(
                modification
                    .clone_with(Some(substitution))
                    .get_all_opt_facts_that_can_be_modified(),
            );
        }
        if let Some(modification) = &action.effect.potential_world_state_modification {
            effect_facts.extend(
                modification
                    .clone_with(Some(substitution))
                    .get_all_opt_facts_that_can_be_modified(),
            );
        }

        if res.actions.is_empty() {
            committed_effect_facts.extend(effect_facts);
            res.actions.push(step.clone());
            continue;
        }

        let grounded_precondition = action
            .precondition
            .as_ref()
            .map(|condition| condition.clone_with(Some(substitution), false, None));

        let precondition_holds_now = match &grounded_precondition {
            None => true,
            Some(condition) => condition.is_true(
                &problem.world_state,
                &ontology.constants,
                &problem.objects,
                &BTreeSet::new(),
                &BTreeSet::new(),
                None,
                false,
            ),
        };
        if !precondition_holds_now {
            break;
        }

        let contradicts = effect_facts
            .iter()
            .any(|fo| fo.has_a_contradiction_with(&committed_effect_facts, None, false));
        if contradicts {
            break;
        }

        // An action whose precondition mentions a fact an earlier action
        // writes is ordered after it, not beside it.
        let mut depends_on_committed = false;
        if let Some(condition) = &grounded_precondition {
            condition.for_each_opt_fact(false, false, false, &mut |precondition_fact, _| {
                if committed_effect_facts.iter().any(|effect_fact| {
                    effect_fact
                        .fact
                        .equal_without_value(&precondition_fact.fact, None, None)
                }) {
                    depends_on_committed = true;
                    return false;
                }
                true
            });
        }
        if depends_on_committed {
            break;
        }

        committed_effect_facts.extend(effect_facts);
        res.actions.push(step.clone());
    }
    res
}
