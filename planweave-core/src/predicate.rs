use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PlanError, Result};
use crate::entity::Parameter;
use crate::types::{SetOfTypes, Type};

/// A relation (no value type) or a fluent (value type present). Fluents whose
/// value type is `number` support arithmetic and ordered comparisons.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub value: Option<Type>,
}

impl Predicate {
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>, value: Option<Type>) -> Self {
        Predicate {
            name: name.into(),
            parameters,
            value,
        }
    }

    pub fn is_fluent(&self) -> bool {
        self.value.is_some()
    }

    /// Parse the str declaration form: `name`, `name(?p - type, ...)`,
    /// either optionally followed by ` - valueType`.
    pub fn from_str(s: &str, types: &SetOfTypes) -> Result<Predicate> {
        let s = s.trim();
        let (head, value_ty) = match s.rfind(')') {
            Some(close) => {
                let rest = s[close + 1..].trim();
                let value_ty = match rest.strip_prefix('-') {
                    Some(v) => Some(types.name_to_type(v.trim())?),
                    None if rest.is_empty() => None,
                    None => {
                        return Err(PlanError::Parse(format!(
                            "unexpected trailing text in predicate \"{s}\""
                        )))
                    }
                };
                (&s[..close + 1], value_ty)
            }
            None => match s.split_once('-') {
                Some((name, value)) => (name.trim(), Some(types.name_to_type(value.trim())?)),
                None => (s, None),
            },
        };

        let (name, parameters) = match head.split_once('(') {
            Some((name, args)) => {
                let args = args
                    .strip_suffix(')')
                    .ok_or_else(|| PlanError::Parse(format!("unclosed parenthesis in \"{s}\"")))?;
                let mut parameters = Vec::new();
                for arg in args.split(',') {
                    let arg = arg.trim();
                    if !arg.is_empty() {
                        parameters.push(Parameter::from_str(arg, types)?);
                    }
                }
                (name.trim(), parameters)
            }
            None => (head, Vec::new()),
        };
        if name.is_empty() {
            return Err(PlanError::Parse(format!("empty predicate name in \"{s}\"")));
        }
        Ok(Predicate::new(name, parameters, value_ty))
    }

    /// Parse the parenthesized PDDL form: `(name ?p - type ...)` optionally
    /// followed by ` - valueType`, or a bare `name`.
    pub fn from_pddl(s: &str, types: &SetOfTypes) -> Result<Predicate> {
        let s = s.trim();
        if !s.starts_with('(') {
            return match s.split_once('-') {
                Some((name, value)) => Ok(Predicate::new(
                    name.trim(),
                    Vec::new(),
                    Some(types.name_to_type(value.trim())?),
                )),
                None => Ok(Predicate::new(s, Vec::new(), None)),
            };
        }
        let close = s
            .rfind(')')
            .ok_or_else(|| PlanError::Parse(format!("unclosed parenthesis in \"{s}\"")))?;
        let inner = &s[1..close];
        let rest = s[close + 1..].trim();
        let value = match rest.strip_prefix('-') {
            Some(v) => Some(types.name_to_type(v.trim())?),
            None => None,
        };

        let mut tokens = inner.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| PlanError::Parse(format!("empty predicate in \"{s}\"")))?;
        let mut parameters = Vec::new();
        let mut pending_names: Vec<String> = Vec::new();
        let mut expect_type = false;
        for token in tokens {
            if token == "-" {
                expect_type = true;
            } else if expect_type {
                let ty = types.name_to_type(token)?;
                for pname in pending_names.drain(..) {
                    parameters.push(Parameter::new(pname, Some(ty.clone())));
                }
                expect_type = false;
            } else {
                pending_names.push(token.to_string());
            }
        }
        for pname in pending_names {
            parameters.push(Parameter::new(pname, None));
        }
        Ok(Predicate::new(name, parameters, value))
    }

    pub fn to_pddl(&self) -> String {
        let mut res = format!("({}", self.name);
        for p in &self.parameters {
            res.push(' ');
            res.push_str(&p.name);
            if let Some(ty) = &p.ty {
                res.push_str(" - ");
                res.push_str(ty.name());
            }
        }
        res.push(')');
        if let Some(value) = &self.value {
            res.push_str(" - ");
            res.push_str(value.name());
        }
        res
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.parameters.len() == other.parameters.len()
            && self.value == other.value
    }
}

impl Eq for Predicate {}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.parameters.is_empty() {
            write!(f, "(")?;
            for (i, p) in self.parameters.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, ")")?;
        }
        if let Some(value) = &self.value {
            write!(f, " - {}", value.name())?;
        }
        Ok(())
    }
}

/// Named predicate registry.
#[derive(Debug, Clone, Default)]
pub struct SetOfPredicates {
    name_to_predicate: BTreeMap<String, Predicate>,
}

impl SetOfPredicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// One predicate per non-empty line, str form.
    pub fn from_str(text: &str, types: &SetOfTypes) -> Result<SetOfPredicates> {
        let mut res = SetOfPredicates::new();
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                res.add(Predicate::from_str(line, types)?);
            }
        }
        Ok(res)
    }

    /// One predicate per non-empty line, PDDL form.
    pub fn from_pddl(text: &str, types: &SetOfTypes) -> Result<SetOfPredicates> {
        let mut res = SetOfPredicates::new();
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                res.add(Predicate::from_pddl(line, types)?);
            }
        }
        Ok(res)
    }

    pub fn add(&mut self, predicate: Predicate) {
        self.name_to_predicate
            .insert(predicate.name.clone(), predicate);
    }

    pub fn get(&self, name: &str) -> Option<&Predicate> {
        self.name_to_predicate.get(name)
    }

    pub fn name_to_predicate(&self, name: &str) -> Result<Predicate> {
        self.get(name)
            .cloned()
            .ok_or_else(|| PlanError::UnknownName(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_predicate.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_forms() {
        let types = SetOfTypes::from_pddl("type1 type2 - entity");
        let preds = SetOfPredicates::from_str(
            "pred_a(?e - entity)\n\
             pred_b\n\
             numberOfQuestion - number\n\
             pred_c(?a - type1, ?b - type2) - number",
            &types,
        )
        .unwrap();

        let a = preds.get("pred_a").unwrap();
        assert_eq!(a.parameters.len(), 1);
        assert!(a.value.is_none());

        let b = preds.get("pred_b").unwrap();
        assert!(b.parameters.is_empty());

        let n = preds.get("numberOfQuestion").unwrap();
        assert!(n.parameters.is_empty());
        assert_eq!(n.value.as_ref().unwrap().name(), "number");

        let c = preds.get("pred_c").unwrap();
        assert_eq!(c.parameters.len(), 2);
        assert_eq!(c.value.as_ref().unwrap().name(), "number");
    }

    #[test]
    fn test_pddl_form() {
        let types = SetOfTypes::from_pddl("type1 type2 - entity");
        let preds = SetOfPredicates::from_pddl(
            "(pred_a ?e - entity)\n\
             pred_b\n\
             (pred_d ?t2 - type2) - number",
            &types,
        )
        .unwrap();
        assert_eq!(preds.get("pred_a").unwrap().parameters.len(), 1);
        assert!(preds.get("pred_b").unwrap().parameters.is_empty());
        assert!(preds.get("pred_d").unwrap().is_fluent());
    }
}
