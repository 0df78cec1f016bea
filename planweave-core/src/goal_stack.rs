use std::collections::BTreeMap;
use std::time::Instant;

use crate::domain::Domain;
use crate::effect::WorldStateModification;
use crate::entity::SetOfEntities;
use crate::goal::Goal;
use crate::world_state::WorldState;

pub const DEFAULT_PRIORITY: i32 = 10;

/// Counters accumulated while goals are pursued: how many concluded, whether
/// the first one did, and the goals reported done.
#[derive(Debug, Default)]
pub struct LookForAnActionOutputInfos {
    nb_of_satisfied_goals: usize,
    nb_of_not_satisfied_goals: usize,
    first_goal_success: Option<bool>,
    goals_done: Vec<Goal>,
}

impl LookForAnActionOutputInfos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_satisfied_goal(&mut self, goal: &Goal) {
        self.nb_of_satisfied_goals += 1;
        self.first_goal_success.get_or_insert(true);
        self.goals_done.push(goal.clone());
    }

    pub fn notify_not_satisfied_goal(&mut self, _goal: &Goal) {
        self.nb_of_not_satisfied_goals += 1;
        self.first_goal_success.get_or_insert(false);
    }

    pub fn nb_of_satisfied_goals(&self) -> usize {
        self.nb_of_satisfied_goals
    }

    pub fn nb_of_not_satisfied_goals(&self) -> usize {
        self.nb_of_not_satisfied_goals
    }

    pub fn is_first_goal_in_success(&self) -> bool {
        self.first_goal_success.unwrap_or(false)
    }

    pub fn move_goals_done(&mut self, out: &mut Vec<Goal>) {
        out.append(&mut self.goals_done);
    }
}

/// Ordered map priority to goal list; within a priority, insertion order.
/// Consumed strictly from the highest priority down.
#[derive(Debug, Clone, Default)]
pub struct GoalStack {
    goals: BTreeMap<i32, Vec<Goal>>,
    /// Applied whenever a higher-priority goal is dropped before moving on.
    pub effect_between_goals: Option<WorldStateModification>,
}

impl GoalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn goals(&self) -> &BTreeMap<i32, Vec<Goal>> {
        &self.goals
    }

    pub fn is_empty(&self) -> bool {
        self.goals.values().all(|goals| goals.is_empty())
    }

    /// Replace the whole stack with one list of goals at the given priority.
    pub fn set_goals(&mut self, goals: Vec<Goal>, priority: i32) {
        self.goals.clear();
        if !goals.is_empty() {
            self.goals.insert(priority, goals);
        }
    }

    /// Append goals per priority; already present goals are not duplicated.
    pub fn add_goals(&mut self, goals_to_add: &BTreeMap<i32, Vec<Goal>>) -> bool {
        let mut changed = false;
        for (priority, goals) in goals_to_add {
            let slot = self.goals.entry(*priority).or_default();
            for goal in goals {
                if !slot.contains(goal) {
                    slot.push(goal.clone());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Append goals at the priority currently being pursued (the highest
    /// non-empty one), or the default priority on an empty stack.
    pub fn add_goals_in_current_priority(&mut self, goals_to_add: &[Goal]) -> bool {
        if goals_to_add.is_empty() {
            return false;
        }
        let priority = self
            .goals
            .iter()
            .rev()
            .find(|(_, goals)| !goals.is_empty())
            .map(|(priority, _)| *priority)
            .unwrap_or(DEFAULT_PRIORITY);
        let slot = self.goals.entry(priority).or_default();
        let mut changed = false;
        for goal in goals_to_add {
            if !slot.contains(goal) {
                slot.push(goal.clone());
                changed = true;
            }
        }
        changed
    }

    pub fn push_goal(&mut self, goal: Goal, priority: i32) {
        self.goals.entry(priority).or_default().push(goal);
    }

    /// Snapshot the unsatisfied goals, highest priority first, dropping on
    /// the way the satisfied goals that are not persistent (recorded done).
    /// The planner then tries each pending goal in order.
    pub fn pending_goals(
        &mut self,
        world: &WorldState,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
        now: Option<Instant>,
        mut output_infos: Option<&mut LookForAnActionOutputInfos>,
    ) -> Vec<(i32, Goal)> {
        let mut pending = Vec::new();
        for (priority, goals) in self.goals.iter_mut().rev() {
            goals.retain_mut(|goal| {
                if world.is_goal_satisfied(goal, constants, objects) {
                    if let Some(infos) = output_infos.as_deref_mut() {
                        infos.notify_satisfied_goal(goal);
                    }
                    if goal.is_persistent_if_skipped() {
                        goal.notify_activity(now);
                        return true;
                    }
                    return false;
                }
                pending.push((*priority, goal.clone()));
                true
            });
        }
        self.prune_empty_priorities();
        pending
    }

    /// No action advances this goal: record it skipped, and drop it unless
    /// persistent.
    pub fn skip_goal(
        &mut self,
        goal: &Goal,
        priority: i32,
        now: Option<Instant>,
        output_infos: Option<&mut LookForAnActionOutputInfos>,
    ) {
        if let Some(infos) = output_infos {
            infos.notify_not_satisfied_goal(goal);
        }
        if let Some(goals) = self.goals.get_mut(&priority) {
            if let Some(index) = goals.iter().position(|stored| stored == goal) {
                if goals[index].is_persistent_if_skipped() {
                    goals[index].set_inactive_since_if_needed(now);
                } else {
                    goals.remove(index);
                }
            }
        }
        self.prune_empty_priorities();
    }

    /// The goal was advanced by a planned action.
    pub fn notify_goal_activity(&mut self, goal: &Goal, priority: i32, now: Option<Instant>) {
        if let Some(goals) = self.goals.get_mut(&priority) {
            if let Some(stored) = goals.iter_mut().find(|stored| *stored == goal) {
                stored.notify_activity(now);
            }
        }
    }

    /// Drop goals whose objective now holds and which are not persistent,
    /// and goals inactive past their time budget.
    pub fn remove_no_stackable_goals(
        &mut self,
        world: &WorldState,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
        now: Option<Instant>,
        mut output_infos: Option<&mut LookForAnActionOutputInfos>,
    ) -> bool {
        let mut goal_changed = false;
        for goals in self.goals.values_mut() {
            goals.retain_mut(|goal| {
                if goal.is_inactive_for_too_long(now) {
                    goal_changed = true;
                    return false;
                }
                if world.is_goal_satisfied(goal, constants, objects) {
                    if let Some(infos) = output_infos.as_deref_mut() {
                        infos.notify_satisfied_goal(goal);
                    }
                    if goal.is_persistent_if_skipped() {
                        goal.notify_activity(now);
                        return true;
                    }
                    goal_changed = true;
                    return false;
                }
                true
            });
        }
        self.prune_empty_priorities();
        goal_changed
    }

    /// Bookkeeping after an action's effects were applied: add the goals its
    /// effect bundle declares, then drop goals that concluded.
    #[allow(clippy::too_many_arguments)]
    pub fn notify_action_done(
        &mut self,
        goals_to_add: Option<&BTreeMap<i32, Vec<Goal>>>,
        goals_to_add_in_current_priority: Option<&[Goal]>,
        world: &WorldState,
        constants: &SetOfEntities,
        objects: &SetOfEntities,
        now: Option<Instant>,
        output_infos: Option<&mut LookForAnActionOutputInfos>,
    ) -> bool {
        let mut goal_changed = false;
        if let Some(goals_to_add) = goals_to_add {
            goal_changed |= self.add_goals(goals_to_add);
        }
        if let Some(goals) = goals_to_add_in_current_priority {
            goal_changed |= self.add_goals_in_current_priority(goals);
        }
        goal_changed |= self.remove_no_stackable_goals(world, constants, objects, now, output_infos);
        goal_changed
    }

    /// Recompute every goal's predecessor caches when the Domain revision
    /// changed.
    pub fn refresh_if_needed(&mut self, domain: &Domain) {
        for goals in self.goals.values_mut() {
            for goal in goals.iter_mut() {
                goal.refresh_caches_if_needed(domain);
            }
        }
    }

    fn prune_empty_priorities(&mut self) {
        self.goals.retain(|_, goals| !goals.is_empty());
    }
}
