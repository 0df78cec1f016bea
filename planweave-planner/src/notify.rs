use std::time::Instant;

use planweave_core::{
    Action, Domain, Historical, LookForAnActionOutputInfos, ModificationParams, Problem, Result,
    SetOfCallbacks,
};

use crate::invocation::ActionInvocationWithGoal;

fn modification_params<'a>(
    domain: &'a Domain,
    callbacks: &'a SetOfCallbacks,
    problem_objects: &'a planweave_core::SetOfEntities,
    now: Option<Instant>,
) -> ModificationParams<'a> {
    ModificationParams {
        set_of_events: domain.set_of_events(),
        callbacks,
        ontology: domain.ontology(),
        objects: problem_objects,
        now,
    }
}

/// Apply an action's at-start effect when its execution begins.
pub fn notify_action_started(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    invocation: &ActionInvocationWithGoal,
    now: Option<Instant>,
) -> Result<()> {
    let Some(action) = domain.get_action(&invocation.action_invocation.action_id) else {
        return Ok(());
    };
    if let Some(at_start) = &action.effect.world_state_modification_at_start {
        let grounded = at_start.clone_with(Some(&invocation.action_invocation.parameters));
        let Problem {
            world_state,
            goal_stack,
            objects,
            ..
        } = problem;
        let params = modification_params(domain, callbacks, objects, now);
        world_state.modify(Some(&grounded), goal_stack, &params, true)?;
    }
    Ok(())
}

/// Commit an action's at-end effects and goal additions; false when the
/// action id is unknown.
pub fn notify_action_done(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    invocation: &ActionInvocationWithGoal,
    now: Option<Instant>,
    output_infos: Option<&mut LookForAnActionOutputInfos>,
) -> Result<bool> {
    let Some(action) = domain.get_action(&invocation.action_invocation.action_id) else {
        return Ok(false);
    };
    let action = action.clone();
    let mut goal_changed = false;
    notify_action_invocation_done(
        problem,
        &mut goal_changed,
        domain,
        callbacks,
        invocation,
        &action,
        now,
        output_infos,
    )?;
    Ok(true)
}

#[allow(clippy::too_many_arguments)]
fn notify_action_invocation_done(
    problem: &mut Problem,
    goal_changed: &mut bool,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    invocation: &ActionInvocationWithGoal,
    action: &Action,
    now: Option<Instant>,
    output_infos: Option<&mut LookForAnActionOutputInfos>,
) -> Result<()> {
    problem
        .historical
        .notify_action_done(&invocation.action_invocation.action_id);

    {
        let Problem {
            world_state,
            goal_stack,
            objects,
            ..
        } = problem;
        let params = modification_params(domain, callbacks, objects, now);
        world_state.apply_effect(
            &invocation.action_invocation.parameters,
            action.effect.world_state_modification.as_ref(),
            goal_changed,
            goal_stack,
            &params,
        )?;
    }

    let stack_changed = problem.goal_stack.notify_action_done(
        Some(&action.effect.goals_to_add),
        Some(action.effect.goals_to_add_in_current_priority.as_slice()),
        &problem.world_state,
        &domain.ontology().constants,
        &problem.objects,
        now,
        output_infos,
    );
    *goal_changed = stack_changed || *goal_changed;
    Ok(())
}

/// Advance a problem past one planned step, for real commits and for
/// lookahead simulation alike: at-start effect, committed effect, goal
/// bookkeeping, then the potential effect.
pub fn update_problem_for_next_potential_planner_result(
    problem: &mut Problem,
    goal_changed: &mut bool,
    one_step: &ActionInvocationWithGoal,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    now: Option<Instant>,
    global_historical: Option<&mut Historical>,
    output_infos: Option<&mut LookForAnActionOutputInfos>,
) -> Result<()> {
    let Some(action) = domain.get_action(&one_step.action_invocation.action_id) else {
        return Ok(());
    };
    let action = action.clone();
    update_problem_for_next_potential_planner_result_with_action(
        problem,
        goal_changed,
        one_step,
        &action,
        domain,
        callbacks,
        now,
        global_historical,
        output_infos,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn update_problem_for_next_potential_planner_result_with_action(
    problem: &mut Problem,
    goal_changed: &mut bool,
    one_step: &ActionInvocationWithGoal,
    action: &Action,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    now: Option<Instant>,
    global_historical: Option<&mut Historical>,
    output_infos: Option<&mut LookForAnActionOutputInfos>,
) -> Result<()> {
    if let Some(historical) = global_historical {
        historical.notify_action_done(&one_step.action_invocation.action_id);
    }

    if let Some(at_start) = &action.effect.world_state_modification_at_start {
        let grounded = at_start.clone_with(Some(&one_step.action_invocation.parameters));
        let Problem {
            world_state,
            goal_stack,
            objects,
            ..
        } = problem;
        let params = modification_params(domain, callbacks, objects, now);
        world_state.modify(Some(&grounded), goal_stack, &params, true)?;
    }

    notify_action_invocation_done(
        problem,
        goal_changed,
        domain,
        callbacks,
        one_step,
        action,
        now,
        output_infos,
    )?;

    if let Some(potential) = &action.effect.potential_world_state_modification {
        let grounded = potential.clone_with(Some(&one_step.action_invocation.parameters));
        let Problem {
            world_state,
            goal_stack,
            objects,
            ..
        } = problem;
        let params = modification_params(domain, callbacks, objects, now);
        world_state.modify(Some(&grounded), goal_stack, &params, true)?;
    }
    Ok(())
}
