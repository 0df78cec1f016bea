use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

use crate::error::{PlanError, Result};

/// Name of the built-in numeric type. It exists even when the ontology never
/// declares it.
pub const NUMBER_TYPE_NAME: &str = "number";

#[derive(Debug)]
struct TypeData {
    name: String,
    /// Names reachable through parent links, self included, nearest first.
    ancestors: Vec<String>,
    /// Names of this type and every subtype, self first.
    descendants: Vec<String>,
}

/// Immutable handle on a node of the subtype tree. Cloning is cheap; equality
/// and ordering go by name so that handles from the same hierarchy behave as
/// value types.
#[derive(Debug, Clone)]
pub struct Type(Arc<TypeData>);

impl Type {
    fn new(name: String, ancestors: Vec<String>, descendants: Vec<String>) -> Self {
        Type(Arc::new(TypeData {
            name,
            ancestors,
            descendants,
        }))
    }

    /// The built-in `number` type.
    pub fn number() -> Type {
        static NUMBER: OnceLock<Type> = OnceLock::new();
        NUMBER
            .get_or_init(|| {
                Type::new(
                    NUMBER_TYPE_NAME.to_string(),
                    vec![NUMBER_TYPE_NAME.to_string()],
                    vec![NUMBER_TYPE_NAME.to_string()],
                )
            })
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// True when `other` is reachable via parent links, or `self == other`.
    pub fn is_a(&self, other: &Type) -> bool {
        self.0.ancestors.iter().any(|a| a == other.name())
    }

    /// Self plus every ancestor name, nearest first.
    pub fn ancestor_names(&self) -> &[String] {
        &self.0.ancestors
    }

    /// Self plus every subtype name.
    pub fn descendant_names(&self) -> &[String] {
        &self.0.descendants
    }

    /// The more specific of two related types. Used to narrow a declared
    /// parameter type when a fact is built with a narrower argument.
    pub fn smaller_of(a: Option<&Type>, b: Option<&Type>) -> Option<Type> {
        match (a, b) {
            (Some(a), Some(b)) => {
                if a.is_a(b) {
                    Some(a.clone())
                } else {
                    Some(b.clone())
                }
            }
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Type {}

impl PartialOrd for Type {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Type {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name().cmp(other.name())
    }
}

impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The subtype hierarchy of an ontology. Handles are regenerated whenever the
/// hierarchy changes, so `Type` values captured from an earlier state keep the
/// closures they were built with.
#[derive(Debug, Clone, Default)]
pub struct SetOfTypes {
    name_to_type: BTreeMap<String, Type>,
    parent_of: BTreeMap<String, Option<String>>,
}

impl SetOfTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `"child1 child2 - parent"` line form. A parent that was not
    /// declared on its own line is created implicitly, without a parent.
    pub fn from_pddl(text: &str) -> Self {
        let mut res = SetOfTypes::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (names_part, parent) = match line.split_once('-') {
                Some((l, r)) => (l.trim(), Some(r.trim().to_string())),
                None => (line, None),
            };
            if let Some(parent_name) = &parent {
                res.parent_of.entry(parent_name.clone()).or_insert(None);
            }
            for name in names_part.split_whitespace() {
                res.parent_of.insert(name.to_string(), parent.clone());
            }
        }
        res.rebuild();
        res
    }

    pub fn add_type(&mut self, name: &str, parent: Option<&str>) {
        if let Some(parent_name) = parent {
            self.parent_of
                .entry(parent_name.to_string())
                .or_insert(None);
        }
        self.parent_of
            .insert(name.to_string(), parent.map(|p| p.to_string()));
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let mut descendants: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in self.parent_of.keys() {
            // Every type descends from each of its ancestors.
            let mut current = Some(name.clone());
            while let Some(c) = current {
                descendants.entry(c.clone()).or_default().push(name.clone());
                current = self.parent_of.get(&c).cloned().flatten();
            }
        }

        self.name_to_type.clear();
        for name in self.parent_of.keys().cloned().collect::<Vec<_>>() {
            let mut ancestors = Vec::new();
            let mut current = Some(name.clone());
            while let Some(c) = current {
                ancestors.push(c.clone());
                current = self.parent_of.get(&c).cloned().flatten();
            }
            let descendants = descendants.remove(&name).unwrap_or_default();
            self.name_to_type
                .insert(name.clone(), Type::new(name, ancestors, descendants));
        }
    }

    pub fn find(&self, name: &str) -> Option<Type> {
        if let Some(t) = self.name_to_type.get(name) {
            return Some(t.clone());
        }
        if name == NUMBER_TYPE_NAME {
            return Some(Type::number());
        }
        None
    }

    pub fn name_to_type(&self, name: &str) -> Result<Type> {
        self.find(name)
            .ok_or_else(|| PlanError::UnknownName(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_type.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_closure() {
        let types = SetOfTypes::from_pddl("type1 type2 - entity");
        let entity = types.name_to_type("entity").unwrap();
        let type1 = types.name_to_type("type1").unwrap();
        let type2 = types.name_to_type("type2").unwrap();

        assert!(type1.is_a(&entity));
        assert!(type2.is_a(&entity));
        assert!(type1.is_a(&type1));
        assert!(!entity.is_a(&type1));
        assert!(!type1.is_a(&type2));

        let mut descendants = entity.descendant_names().to_vec();
        descendants.sort();
        assert_eq!(descendants, vec!["entity", "type1", "type2"]);
    }

    #[test]
    fn test_deep_hierarchy() {
        let types = SetOfTypes::from_pddl(
            "location physical_object - entity\n\
             user robot - agent\n\
             agent - physical_object",
        );
        let robot = types.name_to_type("robot").unwrap();
        let entity = types.name_to_type("entity").unwrap();
        assert!(robot.is_a(&entity));
        assert!(types.name_to_type("location").unwrap().is_a(&entity));
        assert!(!robot.is_a(&types.name_to_type("location").unwrap()));
    }

    #[test]
    fn test_add_type_rebuilds_closures() {
        let mut types = SetOfTypes::from_pddl("type1 - entity");
        types.add_type("type1b", Some("type1"));
        let entity = types.name_to_type("entity").unwrap();
        let type1b = types.name_to_type("type1b").unwrap();
        assert!(type1b.is_a(&entity));
        assert!(types
            .name_to_type("entity")
            .unwrap()
            .descendant_names()
            .contains(&"type1b".to_string()));
    }

    #[test]
    fn test_number_is_builtin() {
        let types = SetOfTypes::from_pddl("");
        let nb = types.name_to_type("number").unwrap();
        assert_eq!(nb.name(), "number");
        assert!(types.name_to_type("whatever").is_err());
    }

    #[test]
    fn test_smaller_of() {
        let types = SetOfTypes::from_pddl("type1 - entity");
        let entity = types.find("entity");
        let type1 = types.find("type1");
        assert_eq!(
            Type::smaller_of(type1.as_ref(), entity.as_ref()),
            type1.clone()
        );
        assert_eq!(Type::smaller_of(entity.as_ref(), type1.as_ref()), type1);
    }
}
