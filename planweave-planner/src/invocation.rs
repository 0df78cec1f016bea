use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use planweave_core::{ActionId, Entity, Goal, Parameter};

/// A grounded action pick: the action id plus one entity per parameter.
/// The text form is `actionId(?p1 -> v1, ?p2 -> v2)` with parameters in
/// sorted-by-parameter-name order.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInvocation {
    pub action_id: ActionId,
    pub parameters: BTreeMap<Parameter, Entity>,
}

impl ActionInvocation {
    pub fn new(action_id: impl Into<ActionId>, parameters: BTreeMap<Parameter, Entity>) -> Self {
        ActionInvocation {
            action_id: action_id.into(),
            parameters,
        }
    }

    pub fn to_str(&self) -> String {
        if self.parameters.is_empty() {
            return self.action_id.clone();
        }
        let mut res = format!("{}(", self.action_id);
        for (i, (parameter, entity)) in self.parameters.iter().enumerate() {
            if i > 0 {
                res.push_str(", ");
            }
            res.push_str(&parameter.name);
            res.push_str(" -> ");
            res.push_str(&entity.value);
        }
        res.push(')');
        res
    }

    /// The wire form: parameter names to entity values.
    pub fn parameters_wire(&self) -> BTreeMap<String, String> {
        self.parameters
            .iter()
            .map(|(parameter, entity)| (parameter.name.clone(), entity.value.clone()))
            .collect()
    }
}

impl fmt::Display for ActionInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl Serialize for ActionInvocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("actionId", &self.action_id)?;
        map.serialize_entry("parameters", &self.parameters_wire())?;
        map.end()
    }
}

/// An invocation together with the goal that justified it.
#[derive(Debug, Clone)]
pub struct ActionInvocationWithGoal {
    pub action_invocation: ActionInvocation,
    pub from_goal: Option<Goal>,
    pub priority: i32,
}

impl ActionInvocationWithGoal {
    pub fn new(
        action_id: impl Into<ActionId>,
        parameters: BTreeMap<Parameter, Entity>,
        from_goal: Option<Goal>,
        priority: i32,
    ) -> Self {
        ActionInvocationWithGoal {
            action_invocation: ActionInvocation::new(action_id, parameters),
            from_goal,
            priority,
        }
    }
}

/// Render a sequential plan, one invocation per separator.
pub fn plan_to_str(plan: &[ActionInvocationWithGoal], separator: &str) -> String {
    plan.iter()
        .map(|step| step.action_invocation.to_str())
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_str_sorted_by_parameter_name() {
        let mut parameters = BTreeMap::new();
        parameters.insert(Parameter::new("?b", None), Entity::new("y", None));
        parameters.insert(Parameter::new("?a", None), Entity::new("x", None));
        let invocation = ActionInvocation::new("move", parameters);
        assert_eq!(invocation.to_str(), "move(?a -> x, ?b -> y)");
    }

    #[test]
    fn test_to_str_without_parameters() {
        let invocation = ActionInvocation::new("wave", BTreeMap::new());
        assert_eq!(invocation.to_str(), "wave");
    }
}
