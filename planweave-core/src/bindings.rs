use std::collections::{BTreeMap, BTreeSet};

use crate::entity::{Entity, Parameter};

/// Constraints attached to one candidate entity: other parameters restricted
/// by choosing it.
pub type EntityConstraints = BTreeMap<Parameter, BTreeSet<Entity>>;

/// Candidate values per parameter, refined as conditions and effects are
/// matched. A parameter mapped to an empty candidate map is declared but
/// unconstrained ("any value of its type"). Ordered maps keep iteration
/// deterministic so plan output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamValues {
    map: BTreeMap<Parameter, BTreeMap<Entity, EntityConstraints>>,
}

impl ParamValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(parameters: &[Parameter]) -> Self {
        let mut res = ParamValues::new();
        for p in parameters {
            res.declare(p.clone());
        }
        res
    }

    /// Register a parameter with no candidate restriction.
    pub fn declare(&mut self, parameter: Parameter) {
        self.map.entry(parameter).or_default();
    }

    pub fn insert(&mut self, parameter: Parameter, entity: Entity) {
        self.map
            .entry(parameter)
            .or_default()
            .entry(entity)
            .or_default();
    }

    /// Replace the whole candidate set of one parameter.
    pub fn set_values(
        &mut self,
        parameter: Parameter,
        values: BTreeMap<Entity, EntityConstraints>,
    ) {
        self.map.insert(parameter, values);
    }

    pub fn entry_values(
        &mut self,
        parameter: &Parameter,
    ) -> &mut BTreeMap<Entity, EntityConstraints> {
        self.map.entry(parameter.clone()).or_default()
    }

    pub fn get(&self, parameter: &Parameter) -> Option<&BTreeMap<Entity, EntityConstraints>> {
        self.map.get(parameter)
    }

    pub fn get_mut(
        &mut self,
        parameter: &Parameter,
    ) -> Option<&mut BTreeMap<Entity, EntityConstraints>> {
        self.map.get_mut(parameter)
    }

    pub fn contains(&self, parameter: &Parameter) -> bool {
        self.map.contains_key(parameter)
    }

    /// Entry access keeping the declared key, whose type may be narrower than
    /// the probe's (parameter identity goes by name).
    pub fn get_entry(
        &self,
        parameter: &Parameter,
    ) -> Option<(&Parameter, &BTreeMap<Entity, EntityConstraints>)> {
        self.map.get_key_value(parameter)
    }

    /// Declared, but with no candidate yet. Matching treats such a parameter
    /// as the any-entity wildcard.
    pub fn is_unconstrained(&self, parameter: &Parameter) -> bool {
        self.map.get(parameter).is_some_and(|v| v.is_empty())
    }

    pub fn has_value(&self, parameter: &Parameter, entity: &Entity) -> bool {
        self.map
            .get(parameter)
            .is_some_and(|v| v.contains_key(entity))
    }

    pub fn remove(&mut self, parameter: &Parameter) {
        self.map.remove(parameter);
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&Parameter, &BTreeMap<Entity, EntityConstraints>)> {
        self.map.iter()
    }

    pub fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&Parameter, &mut BTreeMap<Entity, EntityConstraints>)> {
        self.map.iter_mut()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.map.keys()
    }

    pub fn first(&self) -> Option<(&Parameter, &BTreeMap<Entity, EntityConstraints>)> {
        self.map.iter().next()
    }

    /// Overwrite each refined parameter with its new candidate set.
    pub fn apply_new_params(&mut self, new_params: ParamValues) {
        for (param, values) in new_params.map {
            self.map.insert(param, values);
        }
    }

    /// Union the candidate sets of `other` into this map.
    pub fn merge_union(&mut self, other: ParamValues) {
        for (param, values) in other.map {
            let slot = self.map.entry(param).or_default();
            for (entity, constraints) in values {
                slot.entry(entity).or_insert(constraints);
            }
        }
    }

    /// Expand to the list of full groundings, the cartesian product over the
    /// candidate sets. Empty when any declared parameter has no candidate.
    pub fn unfold(&self) -> Vec<BTreeMap<Parameter, Entity>> {
        if self.map.is_empty() {
            return Vec::new();
        }
        let mut res: Vec<BTreeMap<Parameter, Entity>> = vec![BTreeMap::new()];
        for (param, values) in &self.map {
            if values.is_empty() {
                return Vec::new();
            }
            let mut next = Vec::with_capacity(res.len() * values.len());
            for partial in &res {
                for entity in values.keys() {
                    let mut grounding = partial.clone();
                    grounding.insert(param.clone(), entity.clone());
                    next.push(grounding);
                }
            }
            res = next;
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str) -> Parameter {
        Parameter::new(name, None)
    }

    fn entity(value: &str) -> Entity {
        Entity::new(value, None)
    }

    #[test]
    fn test_unconstrained_vs_constrained() {
        let mut pv = ParamValues::new();
        pv.declare(param("?a"));
        assert!(pv.is_unconstrained(&param("?a")));
        pv.insert(param("?a"), entity("x"));
        assert!(!pv.is_unconstrained(&param("?a")));
        assert!(pv.has_value(&param("?a"), &entity("x")));
    }

    #[test]
    fn test_unfold_product() {
        let mut pv = ParamValues::new();
        pv.insert(param("?a"), entity("x"));
        pv.insert(param("?a"), entity("y"));
        pv.insert(param("?b"), entity("z"));
        let unfolded = pv.unfold();
        assert_eq!(unfolded.len(), 2);
        assert!(unfolded
            .iter()
            .all(|g| g.get(&param("?b")) == Some(&entity("z"))));
    }

    #[test]
    fn test_unfold_with_empty_slot_is_empty() {
        let mut pv = ParamValues::new();
        pv.insert(param("?a"), entity("x"));
        pv.declare(param("?b"));
        assert!(pv.unfold().is_empty());
    }

    #[test]
    fn test_apply_new_params_overwrites() {
        let mut pv = ParamValues::new();
        pv.insert(param("?a"), entity("x"));
        let mut refined = ParamValues::new();
        refined.insert(param("?a"), entity("y"));
        pv.apply_new_params(refined);
        assert!(pv.has_value(&param("?a"), &entity("y")));
        assert!(!pv.has_value(&param("?a"), &entity("x")));
    }
}
