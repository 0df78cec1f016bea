use serde::{Deserialize, Serialize};

use planweave_core::Number;

/// Outcome of a simulated rest-of-plan, used by the one-step lookahead to
/// compare candidate first actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCost {
    pub success: bool,
    pub nb_of_goals_not_satisfied: usize,
    pub nb_of_goals_satisfied: usize,
    pub total_cost: Number,
    pub cost_for_first_goal: Number,
}

impl Default for PlanCost {
    fn default() -> Self {
        PlanCost {
            success: true,
            nb_of_goals_not_satisfied: 0,
            nb_of_goals_satisfied: 0,
            total_cost: Number::ZERO,
            cost_for_first_goal: Number::ZERO,
        }
    }
}

impl PlanCost {
    /// Strict domination order: success first, then fewer unsatisfied goals,
    /// more satisfied goals, cheaper first goal, cheaper total.
    pub fn is_better_than(&self, other: &PlanCost) -> bool {
        if self.success != other.success {
            return self.success;
        }
        if self.nb_of_goals_not_satisfied != other.nb_of_goals_not_satisfied {
            return self.nb_of_goals_not_satisfied > other.nb_of_goals_not_satisfied;
        }
        if self.nb_of_goals_satisfied != other.nb_of_goals_satisfied {
            return self.nb_of_goals_satisfied > other.nb_of_goals_satisfied;
        }
        if self.cost_for_first_goal != other.cost_for_first_goal {
            return self.cost_for_first_goal < other.cost_for_first_goal;
        }
        self.total_cost < other.total_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_dominates() {
        let ok = PlanCost::default();
        let failed = PlanCost {
            success: false,
            ..PlanCost::default()
        };
        assert!(ok.is_better_than(&failed));
        assert!(!failed.is_better_than(&ok));
    }

    #[test]
    fn test_first_goal_cost_breaks_ties() {
        let cheap = PlanCost {
            cost_for_first_goal: Number::Int(1),
            total_cost: Number::Int(5),
            ..PlanCost::default()
        };
        let expensive = PlanCost {
            cost_for_first_goal: Number::Int(3),
            total_cost: Number::Int(4),
            ..PlanCost::default()
        };
        assert!(cheap.is_better_than(&expensive));
    }
}
