use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{PlanError, Result};
use crate::number::is_number;
use crate::ontology::Ontology;
use crate::types::{SetOfTypes, Type};

/// Reserved value of the any-entity wildcard.
pub const ANY_ENTITY_VALUE: &str = "*";
/// Reserved value meaning "no value" when assigned to a fluent.
pub const UNDEFINED_VALUE: &str = "undefined";

/// A typed value: a ground entity, a `?parameter` occurrence, or the
/// any-entity wildcard `*`.
#[derive(Debug, Clone)]
pub struct Entity {
    pub value: String,
    pub ty: Option<Type>,
}

impl Entity {
    pub fn new(value: impl Into<String>, ty: Option<Type>) -> Self {
        Entity {
            value: value.into(),
            ty,
        }
    }

    pub fn any() -> Entity {
        Entity::new(ANY_ENTITY_VALUE, None)
    }

    pub fn any_of(ty: Option<Type>) -> Entity {
        Entity::new(ANY_ENTITY_VALUE, ty)
    }

    pub fn number_entity(value: impl Into<String>) -> Entity {
        Entity::new(value, Some(Type::number()))
    }

    pub fn undefined() -> Entity {
        Entity::new(UNDEFINED_VALUE, None)
    }

    pub fn is_any_entity(&self) -> bool {
        self.value == ANY_ENTITY_VALUE
    }

    /// An occurrence that still needs to be resolved to a ground entity: a
    /// `?parameter`, or the any-entity wildcard which unification treats the
    /// same way.
    pub fn is_a_parameter_to_fill(&self) -> bool {
        self.value.starts_with('?') || self.is_any_entity()
    }

    pub fn to_parameter(&self) -> Parameter {
        Parameter {
            name: self.value.clone(),
            ty: self.ty.clone(),
        }
    }

    pub fn matches_parameter(&self, parameter: &Parameter) -> bool {
        self.value == parameter.name
    }

    /// Parse the `"name - type"` declaration form.
    pub fn from_declaration(s: &str, types: &SetOfTypes) -> Result<Entity> {
        let (name, type_name) = s
            .split_once('-')
            .ok_or_else(|| PlanError::Parse(format!("missing type in entity declaration \"{s}\"")))?;
        let ty = types.name_to_type(type_name.trim())?;
        Ok(Entity::new(name.trim(), Some(ty)))
    }

    /// Resolve a token appearing in a fact usage: a declared parameter, the
    /// wildcard, a constant, a problem object, a number literal, or the
    /// `undefined` value.
    pub fn from_usage(
        token: &str,
        ontology: &Ontology,
        objects: &SetOfEntities,
        parameters: &[Parameter],
        parameter_names_to_entity: Option<&BTreeMap<String, Entity>>,
    ) -> Result<Entity> {
        if token.starts_with('?') {
            if let Some(mapping) = parameter_names_to_entity {
                if let Some(entity) = mapping.get(token) {
                    return Ok(entity.clone());
                }
            }
            if let Some(param) = parameters.iter().find(|p| p.name == token) {
                return Ok(Entity::new(token, param.ty.clone()));
            }
            return Err(PlanError::UnknownName(token.to_string()));
        }
        if token == ANY_ENTITY_VALUE {
            return Ok(Entity::any());
        }
        if token == UNDEFINED_VALUE {
            return Ok(Entity::undefined());
        }
        if let Some(entity) = ontology.constants.value_to_entity(token) {
            return Ok(entity.clone());
        }
        if let Some(entity) = objects.value_to_entity(token) {
            return Ok(entity.clone());
        }
        if is_number(token) {
            return Ok(Entity::number_entity(token));
        }
        Err(PlanError::UnknownName(token.to_string()))
    }

    fn ty_name(&self) -> &str {
        self.ty.as_ref().map(|t| t.name()).unwrap_or("")
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.ty_name() == other.ty_name()
    }
}

impl Eq for Entity {}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.ty_name().cmp(other.ty_name()))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A declared `?name - type` slot of a predicate, action, event or
/// quantifier. Identity goes by name: two parameters with the same name in
/// the same scope are the same slot.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: Option<Type>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Option<Type>) -> Self {
        Parameter {
            name: name.into(),
            ty,
        }
    }

    /// Parse the `"?name - type"` form; the type part is optional.
    pub fn from_str(s: &str, types: &SetOfTypes) -> Result<Parameter> {
        match s.split_once('-') {
            Some((name, type_name)) => {
                let ty = types.name_to_type(type_name.trim())?;
                Ok(Parameter::new(name.trim(), Some(ty)))
            }
            None => Ok(Parameter::new(s.trim(), None)),
        }
    }

    pub fn to_entity(&self) -> Entity {
        Entity::new(self.name.clone(), self.ty.clone())
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Parameter {}

impl PartialOrd for Parameter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Parameter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            Some(ty) => write!(f, "{} - {}", self.name, ty.name()),
            None => f.write_str(&self.name),
        }
    }
}

/// Ground entity pool, indexed by value and by type name. Used both for the
/// domain constants and for the problem objects.
#[derive(Debug, Clone, Default)]
pub struct SetOfEntities {
    value_to_entity: BTreeMap<String, Entity>,
    type_name_to_entities: BTreeMap<String, BTreeSet<Entity>>,
}

impl SetOfEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `"a b - type"` line form.
    pub fn from_pddl(text: &str, types: &SetOfTypes) -> Result<SetOfEntities> {
        let mut res = SetOfEntities::new();
        res.add_all_from_pddl(text, types)?;
        Ok(res)
    }

    pub fn add_all_from_pddl(&mut self, text: &str, types: &SetOfTypes) -> Result<()> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (names_part, type_name) = line
                .split_once('-')
                .ok_or_else(|| PlanError::Parse(format!("missing type in \"{line}\"")))?;
            let ty = types.name_to_type(type_name.trim())?;
            for name in names_part.split_whitespace() {
                self.add(Entity::new(name, Some(ty.clone())));
            }
        }
        Ok(())
    }

    pub fn add(&mut self, entity: Entity) {
        if let Some(ty) = &entity.ty {
            self.type_name_to_entities
                .entry(ty.name().to_string())
                .or_default()
                .insert(entity.clone());
        }
        self.value_to_entity.insert(entity.value.clone(), entity);
    }

    pub fn remove(&mut self, entity: &Entity) {
        self.value_to_entity.remove(&entity.value);
        if let Some(ty) = &entity.ty {
            if let Some(set) = self.type_name_to_entities.get_mut(ty.name()) {
                set.remove(entity);
                if set.is_empty() {
                    self.type_name_to_entities.remove(ty.name());
                }
            }
        }
    }

    pub fn value_to_entity(&self, value: &str) -> Option<&Entity> {
        self.value_to_entity.get(value)
    }

    pub fn entities_of_type_name(&self, type_name: &str) -> Option<&BTreeSet<Entity>> {
        self.type_name_to_entities.get(type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.value_to_entity.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.value_to_entity.values()
    }
}

/// A token is usable in a fact: either a `?parameter`, or a declared entity
/// of the constants or the problem objects.
pub fn is_param_or_declared_entity(
    value: &str,
    ontology: &Ontology,
    objects: &SetOfEntities,
) -> bool {
    value.starts_with('?')
        || ontology.constants.value_to_entity(value).is_some()
        || objects.value_to_entity(value).is_some()
}

/// Every ground entity of `ty` or any of its subtypes, over the constants and
/// the problem objects.
pub fn type_to_entities(
    ty: &Type,
    constants: &SetOfEntities,
    objects: &SetOfEntities,
) -> BTreeSet<Entity> {
    let mut res = BTreeSet::new();
    for type_name in ty.descendant_names() {
        if let Some(entities) = constants.entities_of_type_name(type_name) {
            res.extend(entities.iter().cloned());
        }
        if let Some(entities) = objects.entities_of_type_name(type_name) {
            res.extend(entities.iter().cloned());
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_pool_by_type() {
        let types = SetOfTypes::from_pddl("type1 type2 - entity");
        let entities = SetOfEntities::from_pddl(
            "toto - type1\n\
             titi tutu - type2",
            &types,
        )
        .unwrap();

        assert!(entities.value_to_entity("toto").is_some());
        assert_eq!(entities.entities_of_type_name("type2").unwrap().len(), 2);
        assert!(entities.entities_of_type_name("entity").is_none());

        let entity_ty = types.name_to_type("entity").unwrap();
        let closure = type_to_entities(&entity_ty, &entities, &SetOfEntities::new());
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn test_parameter_identity_is_the_name() {
        let types = SetOfTypes::from_pddl("type1 - entity");
        let a = Parameter::from_str("?p - type1", &types).unwrap();
        let b = Parameter::new("?p", None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_entity_from_declaration() {
        let types = SetOfTypes::from_pddl("type1 - entity");
        let entity = Entity::from_declaration("toto - type1", &types).unwrap();
        assert_eq!(entity.value, "toto");
        assert_eq!(entity.ty.unwrap().name(), "type1");
        assert!(Entity::from_declaration("toto", &types).is_err());
    }

    #[test]
    fn test_is_param_or_declared_entity() {
        let types = SetOfTypes::from_pddl("type1 - entity");
        let constants = SetOfEntities::from_pddl("toto - type1", &types).unwrap();
        let ontology = Ontology {
            types,
            constants,
            ..Default::default()
        };
        let objects = SetOfEntities::new();
        assert!(is_param_or_declared_entity("?p", &ontology, &objects));
        assert!(is_param_or_declared_entity("toto", &ontology, &objects));
        assert!(!is_param_or_declared_entity("unknown", &ontology, &objects));
    }

    #[test]
    fn test_wildcard_and_parameter_forms() {
        let any = Entity::any();
        assert!(any.is_any_entity());
        assert!(any.is_a_parameter_to_fill());
        let param = Entity::new("?p", None);
        assert!(param.is_a_parameter_to_fill());
        assert!(!param.is_any_entity());
        assert!(!Entity::new("toto", None).is_a_parameter_to_fill());
    }
}
