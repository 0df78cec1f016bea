use std::collections::BTreeMap;

use crate::condition::{Condition, ConditionOp};
use crate::effect::{WorldStateModification, WsModOp};
use crate::entity::{Entity, Parameter, SetOfEntities, UNDEFINED_VALUE};
use crate::error::{PlanError, Result};
use crate::expression::Expression;
use crate::fact::{Fact, FactOptional};
use crate::goal::Goal;
use crate::number::Number;
use crate::ontology::Ontology;
use crate::types::SetOfTypes;

// ----------------------------------------------------------------------
// Expression -> Fact
// ----------------------------------------------------------------------

pub(crate) fn expression_to_fact(
    expression: &Expression,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
    is_ok_if_value_is_missing: bool,
    parameter_names_to_entity: Option<&BTreeMap<String, Entity>>,
) -> Result<FactOptional> {
    if expression.name.is_empty() {
        return Err(PlanError::Parse("fact cannot have an empty name".to_string()));
    }

    if let Some(stripped) = expression.name.strip_prefix('!') {
        let argument_strs: Vec<String> =
            expression.arguments.iter().map(|a| a.name.clone()).collect();
        let fact = Fact::with_parts(
            stripped,
            &argument_strs,
            some_value(&expression.value),
            expression.is_value_negated,
            ontology,
            objects,
            parameters,
            is_ok_if_value_is_missing,
            parameter_names_to_entity,
        )?;
        return Ok(FactOptional::negated(fact));
    }

    if expression.name == "=" && expression.arguments.len() == 2 {
        let mut fact_optional = expression_to_fact(
            &expression.arguments[0],
            ontology,
            objects,
            parameters,
            true,
            parameter_names_to_entity,
        )?;
        let value_expression = &expression.arguments[1];
        if value_expression.name == UNDEFINED_VALUE {
            fact_optional.is_fact_negated = !fact_optional.is_fact_negated;
            fact_optional.fact.set_value(Some(Entity::any()));
        } else {
            fact_optional.fact.set_value(Some(Entity::from_usage(
                &value_expression.name,
                ontology,
                objects,
                parameters,
                parameter_names_to_entity,
            )?));
        }
        return Ok(fact_optional);
    }

    if expression.name == "not" && expression.arguments.len() == 1 {
        let mut fact_optional = expression_to_fact(
            &expression.arguments[0],
            ontology,
            objects,
            parameters,
            is_ok_if_value_is_missing,
            parameter_names_to_entity,
        )?;
        fact_optional.is_fact_negated = !fact_optional.is_fact_negated;
        return Ok(fact_optional);
    }

    let argument_strs: Vec<String> =
        expression.arguments.iter().map(|a| a.name.clone()).collect();
    let fact = Fact::with_parts(
        &expression.name,
        &argument_strs,
        some_value(&expression.value),
        expression.is_value_negated,
        ontology,
        objects,
        parameters,
        is_ok_if_value_is_missing,
        parameter_names_to_entity,
    )?;
    Ok(FactOptional::new(fact))
}

fn some_value(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// The `?name - type` declaration inside an `exists`/`forall` head, in
/// either text form.
fn expression_to_parameter(expression: &Expression, types: &SetOfTypes) -> Result<Parameter> {
    if !expression.name.starts_with('?') {
        return Err(PlanError::Parse(format!(
            "\"{}\" is not a parameter declaration",
            expression.name
        )));
    }
    if let Some(following) = &expression.following {
        let ty = types.name_to_type(&following.name)?;
        return Ok(Parameter::new(expression.name.clone(), Some(ty)));
    }
    if expression.arguments.len() == 2 && expression.arguments[0].name == "-" {
        let ty = types.name_to_type(&expression.arguments[1].name)?;
        return Ok(Parameter::new(expression.name.clone(), Some(ty)));
    }
    Ok(Parameter::new(expression.name.clone(), None))
}

// ----------------------------------------------------------------------
// Expression -> Condition
// ----------------------------------------------------------------------

fn expression_to_condition(
    expression: &Expression,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
    is_ok_if_value_is_missing: bool,
    parameter_names_to_entity: Option<&BTreeMap<String, Entity>>,
) -> Result<Condition> {
    let following_op = match expression.separator_to_following {
        '+' => ConditionOp::Plus,
        '-' => ConditionOp::Minus,
        '>' => ConditionOp::Superior,
        '<' => ConditionOp::Inferior,
        '|' => ConditionOp::Or,
        _ => ConditionOp::And,
    };

    let mut res: Option<Condition> = None;
    let name = expression.name.as_str();

    if (name == "equals" || name == "=") && expression.arguments.len() == 2 {
        let left = expression_to_condition(
            &expression.arguments[0],
            ontology,
            objects,
            parameters,
            true,
            parameter_names_to_entity,
        )?;
        let right_expression = &expression.arguments[1];
        match left {
            Condition::Fact(mut left_fact)
                if !left_fact.is_fact_negated
                    && right_expression.arguments.is_empty()
                    && right_expression.following.is_none()
                    && right_expression.value.is_empty() =>
            {
                if right_expression.name == UNDEFINED_VALUE {
                    left_fact.is_fact_negated = true;
                    left_fact.fact.set_value_from_str(crate::entity::ANY_ENTITY_VALUE);
                    res = Some(Condition::Fact(left_fact));
                } else if name == "=" && !right_expression.is_a_function {
                    let value = Entity::from_usage(
                        &right_expression.name,
                        ontology,
                        objects,
                        parameters,
                        parameter_names_to_entity,
                    )?;
                    let expected = left_fact.fact.predicate.value.clone().ok_or_else(|| {
                        PlanError::UnexpectedValue(left_fact.fact.to_string())
                    })?;
                    if let Some(value_ty) = &value.ty {
                        if !value_ty.is_a(&expected) {
                            return Err(PlanError::TypeMismatch {
                                entity: value.value.clone(),
                                expected: expected.name().to_string(),
                            });
                        }
                    }
                    left_fact.fact.set_value(Some(value));
                    res = Some(Condition::Fact(left_fact));
                } else {
                    res = Some(equality_node(
                        Condition::Fact(left_fact),
                        right_expression,
                        ontology,
                        objects,
                        parameters,
                        parameter_names_to_entity,
                    )?);
                }
            }
            other => {
                res = Some(equality_node(
                    other,
                    right_expression,
                    ontology,
                    objects,
                    parameters,
                    parameter_names_to_entity,
                )?);
            }
        }
    } else if name == "exists" || name == "forall" {
        if expression.arguments.len() != 2 {
            return Err(PlanError::Parse(format!(
                "{name} must have exactly 2 arguments"
            )));
        }
        let parameter = expression_to_parameter(&expression.arguments[0], &ontology.types)?;
        let mut inner_parameters = parameters.to_vec();
        inner_parameters.push(parameter.clone());
        let inner = expression_to_condition(
            &expression.arguments[1],
            ontology,
            objects,
            &inner_parameters,
            false,
            parameter_names_to_entity,
        )?;
        res = Some(if name == "exists" {
            Condition::Exists {
                parameter,
                inner: Box::new(inner),
            }
        } else {
            Condition::Forall {
                parameter,
                inner: Box::new(inner),
            }
        });
    } else if name == "not" && expression.arguments.len() == 1 {
        let inner = expression_to_condition(
            &expression.arguments[0],
            ontology,
            objects,
            parameters,
            is_ok_if_value_is_missing,
            parameter_names_to_entity,
        )?;
        res = Some(match inner {
            Condition::Fact(mut fact_optional) => {
                fact_optional.is_fact_negated = !fact_optional.is_fact_negated;
                Condition::Fact(fact_optional)
            }
            inner => Condition::Not(Box::new(inner)),
        });
    } else if let Some(op) = comparison_op(name) {
        if expression.arguments.len() == 2 {
            let left = expression_to_condition(
                &expression.arguments[0],
                ontology,
                objects,
                parameters,
                true,
                parameter_names_to_entity,
            )?;
            let right = expression_to_condition(
                &expression.arguments[1],
                ontology,
                objects,
                parameters,
                true,
                parameter_names_to_entity,
            )?;
            res = Some(Condition::Node {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
    } else if (name == "and" || name == "or" || name == "imply")
        && expression.arguments.len() >= 2
    {
        let op = match name {
            "or" => ConditionOp::Or,
            "imply" => ConditionOp::Imply,
            _ => ConditionOp::And,
        };
        let mut elements = Vec::new();
        for argument in &expression.arguments {
            elements.push(expression_to_condition(
                argument,
                ontology,
                objects,
                parameters,
                false,
                parameter_names_to_entity,
            )?);
        }
        let mut folded = elements.pop().expect("at least two elements");
        while let Some(previous) = elements.pop() {
            folded = Condition::Node {
                op,
                left: Box::new(previous),
                right: Box::new(folded),
            };
        }
        res = Some(folded);
    }

    let mut res = match res {
        Some(res) => res,
        None => {
            if expression.arguments.is_empty() && expression.value.is_empty() {
                if let Ok(nb) = expression.name.parse::<Number>() {
                    Condition::Number(nb)
                } else {
                    let ok_if_value_missing = is_ok_if_value_is_missing
                        || matches!(
                            following_op,
                            ConditionOp::Superior
                                | ConditionOp::SuperiorOrEqual
                                | ConditionOp::Inferior
                                | ConditionOp::InferiorOrEqual
                        );
                    Condition::Fact(expression_to_fact(
                        expression,
                        ontology,
                        objects,
                        parameters,
                        ok_if_value_missing,
                        parameter_names_to_entity,
                    )?)
                }
            } else {
                let ok_if_value_missing = is_ok_if_value_is_missing
                    || matches!(
                        following_op,
                        ConditionOp::Superior
                            | ConditionOp::SuperiorOrEqual
                            | ConditionOp::Inferior
                            | ConditionOp::InferiorOrEqual
                    );
                Condition::Fact(expression_to_fact(
                    expression,
                    ontology,
                    objects,
                    parameters,
                    ok_if_value_missing,
                    parameter_names_to_entity,
                )?)
            }
        }
    };

    if let Some(following) = &expression.following {
        res = Condition::Node {
            op: following_op,
            left: Box::new(res),
            right: Box::new(expression_to_condition(
                following,
                ontology,
                objects,
                parameters,
                false,
                parameter_names_to_entity,
            )?),
        };
    }
    Ok(res)
}

fn comparison_op(name: &str) -> Option<ConditionOp> {
    match name {
        ">" => Some(ConditionOp::Superior),
        ">=" => Some(ConditionOp::SuperiorOrEqual),
        "<" => Some(ConditionOp::Inferior),
        "<=" => Some(ConditionOp::InferiorOrEqual),
        _ => None,
    }
}

fn equality_node(
    left: Condition,
    right_expression: &Expression,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
    parameter_names_to_entity: Option<&BTreeMap<String, Entity>>,
) -> Result<Condition> {
    let right = expression_to_condition(
        right_expression,
        ontology,
        objects,
        parameters,
        true,
        parameter_names_to_entity,
    )?;
    Ok(Condition::Node {
        op: ConditionOp::Equality,
        left: Box::new(left),
        right: Box::new(right),
    })
}

// ----------------------------------------------------------------------
// Expression -> WorldStateModification
// ----------------------------------------------------------------------

fn expression_to_effect(
    expression: &Expression,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
    is_ok_if_value_is_missing: bool,
) -> Result<WorldStateModification> {
    let mut res: Option<WorldStateModification> = None;
    let name = expression.name.as_str();

    if (name == "assign" || name == "set") && expression.arguments.len() == 2 {
        let left = expression_to_effect(
            &expression.arguments[0],
            ontology,
            objects,
            parameters,
            true,
        )?;
        let right_expression = &expression.arguments[1];
        if let WorldStateModification::Fact {
            fact_optional: mut left_fact,
            ..
        } = left.clone()
        {
            if !left_fact.is_fact_negated
                && right_expression.arguments.is_empty()
                && right_expression.following.is_none()
                && right_expression.value.is_empty()
            {
                if right_expression.name == UNDEFINED_VALUE {
                    left_fact.is_fact_negated = true;
                    left_fact.fact.set_value_from_str(crate::entity::ANY_ENTITY_VALUE);
                    res = Some(WorldStateModification::fact(left_fact));
                } else if name == "assign" && !right_expression.is_a_function {
                    let value = Entity::from_usage(
                        &right_expression.name,
                        ontology,
                        objects,
                        parameters,
                        None,
                    )?;
                    let expected = left_fact.fact.predicate.value.clone().ok_or_else(|| {
                        PlanError::UnexpectedValue(left_fact.fact.to_string())
                    })?;
                    if let Some(value_ty) = &value.ty {
                        if !value_ty.is_a(&expected) {
                            return Err(PlanError::TypeMismatch {
                                entity: value.value.clone(),
                                expected: expected.name().to_string(),
                            });
                        }
                    }
                    left_fact.fact.set_value(Some(value));
                    res = Some(WorldStateModification::fact(left_fact));
                }
            }
        }
        if res.is_none() {
            let right = expression_to_effect(right_expression, ontology, objects, parameters, true)?;
            res = Some(WorldStateModification::node(
                WsModOp::Assign,
                Some(left),
                Some(right),
                None,
            ));
        }
    } else if name == "not" && expression.arguments.len() == 1 {
        let inner = expression_to_effect(
            &expression.arguments[0],
            ontology,
            objects,
            parameters,
            true,
        )?;
        match inner {
            WorldStateModification::Fact {
                mut fact_optional, ..
            } => {
                fact_optional.is_fact_negated = !fact_optional.is_fact_negated;
                res = Some(WorldStateModification::fact(fact_optional));
            }
            _ => {
                return Err(PlanError::Parse(format!(
                    "not a valid negated world state modification: \"{}\"",
                    expression.name
                )))
            }
        }
    } else if (name == "forall" || name == "forAll")
        && (expression.arguments.len() == 2 || expression.arguments.len() == 3)
    {
        let parameter = expression_to_parameter(&expression.arguments[0], &ontology.types)?;
        let mut inner_parameters = parameters.to_vec();
        inner_parameters.push(parameter.clone());

        if expression.arguments.len() == 3 {
            let guard = expression_to_fact(
                &expression.arguments[1],
                ontology,
                objects,
                &inner_parameters,
                false,
                None,
            )?;
            let body = expression_to_effect(
                &expression.arguments[2],
                ontology,
                objects,
                &inner_parameters,
                false,
            )?;
            res = Some(WorldStateModification::node(
                WsModOp::ForAll,
                Some(WorldStateModification::fact(guard)),
                Some(body),
                Some(parameter),
            ));
        } else if expression.arguments[1].name == "when"
            && expression.arguments[1].arguments.len() == 2
        {
            let when = &expression.arguments[1];
            let guard = expression_to_fact(
                &when.arguments[0],
                ontology,
                objects,
                &inner_parameters,
                false,
                None,
            )?;
            let body = expression_to_effect(
                &when.arguments[1],
                ontology,
                objects,
                &inner_parameters,
                false,
            )?;
            res = Some(WorldStateModification::node(
                WsModOp::ForAll,
                Some(WorldStateModification::fact(guard)),
                Some(body),
                Some(parameter),
            ));
        } else {
            let body = expression_to_effect(
                &expression.arguments[1],
                ontology,
                objects,
                &inner_parameters,
                false,
            )?;
            res = Some(WorldStateModification::node(
                WsModOp::ForAll,
                None,
                Some(body),
                Some(parameter),
            ));
        }
    } else if name == "and" && expression.arguments.len() >= 2 {
        let mut elements = Vec::new();
        for argument in &expression.arguments {
            elements.push(expression_to_effect(
                argument, ontology, objects, parameters, false,
            )?);
        }
        let mut folded = elements.pop().expect("at least two elements");
        while let Some(previous) = elements.pop() {
            folded = WorldStateModification::and(previous, folded);
        }
        res = Some(folded);
    } else if (name == "increase" || name == "add" || name == "decrease")
        && expression.arguments.len() == 2
    {
        let op = if name == "decrease" {
            WsModOp::Decrease
        } else {
            WsModOp::Increase
        };
        let left = expression_to_effect(
            &expression.arguments[0],
            ontology,
            objects,
            parameters,
            true,
        )?;
        let right_expression = &expression.arguments[1];
        let right = match right_expression.name.parse::<Number>() {
            Ok(nb) if right_expression.arguments.is_empty() => WorldStateModification::number(nb),
            _ => expression_to_effect(right_expression, ontology, objects, parameters, true)?,
        };
        res = Some(WorldStateModification::node(
            op,
            Some(left),
            Some(right),
            None,
        ));
    } else if (name == "multiply" || name == "*") && expression.arguments.len() == 2 {
        let parse_operand = |exp: &Expression| -> Result<(WorldStateModification, bool)> {
            match exp.name.parse::<Number>() {
                Ok(nb) if exp.arguments.is_empty() => Ok((WorldStateModification::number(nb), true)),
                _ => Ok((
                    expression_to_effect(exp, ontology, objects, parameters, true)?,
                    false,
                )),
            }
        };
        let (left, left_is_number) = parse_operand(&expression.arguments[0])?;
        let (right, right_is_number) = parse_operand(&expression.arguments[1])?;
        // Keep the fact on the left so the target of the update is explicit.
        res = Some(if left_is_number && !right_is_number {
            WorldStateModification::node(WsModOp::Multiply, Some(right), Some(left), None)
        } else {
            WorldStateModification::node(WsModOp::Multiply, Some(left), Some(right), None)
        });
    } else if name == "when" && expression.arguments.len() == 2 {
        let guard = expression_to_fact(
            &expression.arguments[0],
            ontology,
            objects,
            parameters,
            false,
            None,
        )?;
        let body = expression_to_effect(
            &expression.arguments[1],
            ontology,
            objects,
            parameters,
            false,
        )?;
        res = Some(WorldStateModification::node(
            WsModOp::When,
            Some(WorldStateModification::fact(guard)),
            Some(body),
            None,
        ));
    }

    let mut res = match res {
        Some(res) => res,
        None => {
            if expression.arguments.is_empty() && expression.value.is_empty() {
                if let Ok(nb) = expression.name.parse::<Number>() {
                    WorldStateModification::number(nb)
                } else {
                    WorldStateModification::fact(expression_to_fact(
                        expression,
                        ontology,
                        objects,
                        parameters,
                        is_ok_if_value_is_missing,
                        None,
                    )?)
                }
            } else {
                WorldStateModification::fact(expression_to_fact(
                    expression,
                    ontology,
                    objects,
                    parameters,
                    is_ok_if_value_is_missing,
                    None,
                )?)
            }
        }
    };

    if let Some(following) = &expression.following {
        let op = match expression.separator_to_following {
            '+' => WsModOp::Plus,
            '-' => WsModOp::Minus,
            _ => WsModOp::And,
        };
        res = WorldStateModification::node(
            op,
            Some(res),
            Some(expression_to_effect(
                following, ontology, objects, parameters, false,
            )?),
            None,
        );
    }
    Ok(res)
}

// ----------------------------------------------------------------------
// Public builders
// ----------------------------------------------------------------------

pub fn parse_condition(
    text: &str,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
) -> Result<Condition> {
    let mut pos = 0;
    let expression = Expression::from_str(text, &mut pos)?;
    expression_to_condition(&expression, ontology, objects, parameters, false, None)
}

pub fn pddl_to_condition(
    text: &str,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
) -> Result<Condition> {
    let mut pos = 0;
    let expression = Expression::from_pddl(text, &mut pos, true)?;
    expression_to_condition(&expression, ontology, objects, parameters, false, None)
}

pub fn parse_effect(
    text: &str,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
) -> Result<WorldStateModification> {
    let mut pos = 0;
    let expression = Expression::from_str(text, &mut pos)?;
    expression_to_effect(&expression, ontology, objects, parameters, false)
}

pub fn pddl_to_effect(
    text: &str,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
) -> Result<WorldStateModification> {
    let mut pos = 0;
    let expression = Expression::from_pddl(text, &mut pos, true)?;
    expression_to_effect(&expression, ontology, objects, parameters, false)
}

/// Parse a goal, honoring the `persist(...)` and `oneStepTowards(...)`
/// wrappers.
pub fn parse_goal(text: &str, ontology: &Ontology, objects: &SetOfEntities) -> Result<Goal> {
    let mut pos = 0;
    let mut expression = Expression::from_str(text, &mut pos)?;
    let mut is_persistent_if_skipped = false;
    let mut one_step_towards = false;
    if expression.name == "persist" && expression.arguments.len() == 1 {
        is_persistent_if_skipped = true;
        expression = expression.arguments.remove(0);
    }
    if expression.name == "oneStepTowards" && expression.arguments.len() == 1 {
        one_step_towards = true;
        expression = expression.arguments.remove(0);
    }
    let objective = expression_to_condition(&expression, ontology, objects, &[], false, None)?;
    Ok(Goal::new(objective)
        .with_persistence(is_persistent_if_skipped)
        .with_one_step_towards(one_step_towards))
}

/// Parse a single fact in the infix form; the boolean is the `!` negation.
pub fn parse_fact(
    text: &str,
    ontology: &Ontology,
    objects: &SetOfEntities,
    parameters: &[Parameter],
) -> Result<(Fact, bool)> {
    let mut pos = 0;
    let expression = Expression::from_str(text, &mut pos)?;
    let fact_optional = expression_to_fact(&expression, ontology, objects, parameters, false, None)?;
    Ok((fact_optional.fact, fact_optional.is_fact_negated))
}

/// Parse a whitespace-separated sequence of parenthesized facts; `(not ...)`
/// entries are flagged negated.
pub fn parse_pddl_facts(
    text: &str,
    ontology: &Ontology,
    objects: &SetOfEntities,
) -> Result<Vec<(Fact, bool)>> {
    let mut res = Vec::new();
    let mut pos = 0;
    loop {
        Expression::skip_spaces(text, &mut pos);
        if pos >= text.len() {
            break;
        }
        let expression = Expression::from_pddl(text, &mut pos, false)?;
        if expression.is_empty() {
            break;
        }
        let fact_optional = expression_to_fact(&expression, ontology, objects, &[], false, None)?;
        res.push((fact_optional.fact, fact_optional.is_fact_negated));
    }
    Ok(res)
}

impl Fact {
    /// Parse the infix str form; the boolean out-flag of the original API is
    /// folded into the result.
    pub fn from_str(
        text: &str,
        ontology: &Ontology,
        objects: &SetOfEntities,
        parameters: &[Parameter],
    ) -> Result<Fact> {
        let (fact, _) = parse_fact(text, ontology, objects, parameters)?;
        Ok(fact)
    }

    /// Parse the parenthesized PDDL form.
    pub fn from_pddl(
        text: &str,
        ontology: &Ontology,
        objects: &SetOfEntities,
        parameters: &[Parameter],
        is_ok_if_value_is_missing: bool,
    ) -> Result<Fact> {
        let mut pos = 0;
        let expression = Expression::from_pddl(text, &mut pos, false)?;
        let fact_optional = expression_to_fact(
            &expression,
            ontology,
            objects,
            parameters,
            is_ok_if_value_is_missing,
            None,
        )?;
        Ok(fact_optional.fact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::SetOfPredicates;
    use crate::types::SetOfTypes;

    fn ontology() -> Ontology {
        let types = SetOfTypes::from_pddl("type1 type2 - entity\nlocation");
        let predicates = SetOfPredicates::from_str(
            "pred_a(?e - entity)\n\
             pred_b\n\
             numberOfQuestion - number\n\
             maxNumberOfQuestions - number\n\
             at(?o - entity) - location\n\
             pred_v(?e - entity) - type2",
            &types,
        )
        .unwrap();
        let constants = SetOfEntities::from_pddl(
            "toto - type1\n\
             titi v1 - type2\n\
             livingroom - location\n\
             pen - entity",
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

    #[test]
    fn test_parse_simple_fact_condition() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let condition = parse_condition("pred_a(toto)", &onto, &objects, &[]).unwrap();
        let fact = condition.as_fact().unwrap();
        assert_eq!(fact.fact.name(), "pred_a");
        assert!(!fact.is_fact_negated);
    }

    #[test]
    fn test_parse_negated_fact() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let (fact, negated) = parse_fact("!pred_b", &onto, &objects, &[]).unwrap();
        assert_eq!(fact.name(), "pred_b");
        assert!(negated);
    }

    #[test]
    fn test_parse_and_condition() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let condition =
            parse_condition("pred_a(toto) & pred_b", &onto, &objects, &[]).unwrap();
        match condition {
            Condition::Node {
                op: ConditionOp::And,
                ..
            } => {}
            other => panic!("expected AND node, got {other}"),
        }
    }

    #[test]
    fn test_parse_equals() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let condition = parse_condition(
            "equals(numberOfQuestion, maxNumberOfQuestions)",
            &onto,
            &objects,
            &[],
        )
        .unwrap();
        match condition {
            Condition::Node {
                op: ConditionOp::Equality,
                ..
            } => {}
            other => panic!("expected EQUALITY node, got {other}"),
        }
    }

    #[test]
    fn test_parse_fluent_value_condition() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let condition =
            parse_condition("numberOfQuestion=0", &onto, &objects, &[]).unwrap();
        let fact = condition.as_fact().unwrap();
        assert_eq!(fact.fact.value().unwrap().value, "0");
    }

    #[test]
    fn test_parse_exists() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let condition = parse_condition(
            "exists(?l - location, at(pen)=?l)",
            &onto,
            &objects,
            &[],
        )
        .unwrap();
        match condition {
            Condition::Exists { parameter, .. } => {
                assert_eq!(parameter.name, "?l");
                assert_eq!(parameter.ty.unwrap().name(), "location");
            }
            other => panic!("expected EXISTS, got {other}"),
        }
    }

    #[test]
    fn test_parse_increment_effect() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let effect = parse_effect(
            "pred_b & add(numberOfQuestion, 1)",
            &onto,
            &objects,
            &[],
        )
        .unwrap();
        let rendered = effect.to_string();
        assert!(rendered.contains("pred_b"));
        assert!(rendered.contains("increase(numberOfQuestion"));
    }

    #[test]
    fn test_parse_assign_undefined() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let effect = parse_effect("assign(at(pen), undefined)", &onto, &objects, &[]).unwrap();
        let fact_optional = effect.get_optional_fact().unwrap();
        assert!(fact_optional.is_fact_negated);
        assert!(fact_optional.fact.value().unwrap().is_any_entity());
    }

    #[test]
    fn test_parse_pddl_facts_with_not() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let parsed = parse_pddl_facts(
            "(pred_a toto)\n(not (pred_b))\n(= (at pen) livingroom)",
            &onto,
            &objects,
        )
        .unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(!parsed[0].1);
        assert!(parsed[1].1);
        assert_eq!(parsed[2].0.value().unwrap().value, "livingroom");
    }

    #[test]
    fn test_parse_goal_wrappers() {
        let onto = ontology();
        let objects = SetOfEntities::new();
        let goal = parse_goal("persist(pred_b)", &onto, &objects).unwrap();
        assert!(goal.is_persistent_if_skipped());
        let goal = parse_goal("oneStepTowards(pred_b)", &onto, &objects).unwrap();
        assert!(goal.is_one_step_towards());
    }
}
