//! Backward-chaining goal-directed search over the planweave core model:
//! goal selection in priority order, parameter resolution against the
//! succession caches, cost-based tie-breaking with one-step lookahead, and
//! the notify surface that commits chosen actions.

pub mod already_done;
pub mod cost;
pub mod invocation;
pub mod notify;
pub mod parallel;
pub mod search;

pub use already_done::{FactsAlreadyChecked, TreeOfAlreadyDonePaths};
pub use cost::PlanCost;
pub use invocation::{plan_to_str, ActionInvocation, ActionInvocationWithGoal};
pub use notify::{
    notify_action_done, notify_action_started, update_problem_for_next_potential_planner_result,
};
pub use parallel::{actions_to_do_in_parallel_now, ActionsToDoInParallel};
pub use search::{plan_for_every_goals, plan_for_more_important_goal_possible};

pub use planweave_core::LookForAnActionOutputInfos;
