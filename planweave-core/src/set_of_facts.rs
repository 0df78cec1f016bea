use std::collections::{BTreeMap, BTreeSet};

use crate::bindings::ParamValues;
use crate::entity::Entity;
use crate::error::{PlanError, Result};
use crate::fact::Fact;

fn exact_call(fact: &Fact) -> String {
    let mut res = String::with_capacity(fact.name().len() + 16);
    res.push_str(fact.name());
    res.push('(');
    for (i, argument) in fact.arguments().iter().enumerate() {
        if i > 0 {
            res.push_str(", ");
        }
        res.push_str(&argument.value);
    }
    res.push(')');
    res
}

fn add_value_to_exact_call(res: &mut String, fact: &Fact) {
    if let Some(value) = fact.value() {
        if fact.is_value_negated() {
            res.push_str("!=");
        } else {
            res.push('=');
        }
        res.push_str(&value.value);
    }
}

fn remove_from_list(list: &mut Vec<Fact>, fact: &Fact) {
    if let Some(pos) = list.iter().position(|f| f == fact) {
        list.remove(pos);
    }
}

fn intersect(a: &[Fact], b: &[Fact]) -> Vec<Fact> {
    a.iter().filter(|f| b.contains(f)).cloned().collect()
}

#[derive(Debug, Clone, Default)]
struct ParameterToValues {
    all: Vec<Fact>,
    arg_id_to_arg_value_to_facts: Vec<BTreeMap<String, Vec<Fact>>>,
    fluent_value_to_facts: BTreeMap<String, Vec<Fact>>,
}

impl ParameterToValues {
    fn new(nb_of_args: usize) -> Self {
        ParameterToValues {
            all: Vec::new(),
            arg_id_to_arg_value_to_facts: vec![BTreeMap::new(); nb_of_args],
            fluent_value_to_facts: BTreeMap::new(),
        }
    }
}

/// Added and removed facts between two snapshots.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    pub added_facts: BTreeSet<Fact>,
    pub removed_facts: BTreeSet<Fact>,
}

/// The stored fact set with its three derived lookup maps: exact call,
/// exact call with value, and per-signature argument/value indexes. The
/// signature index is expanded over supertype combinations at insertion so a
/// query typed at a supertype finds subtype facts.
#[derive(Debug, Clone, Default)]
pub struct SetOfFacts {
    facts: BTreeMap<Fact, bool>,
    exact_call_to_facts: BTreeMap<String, Vec<Fact>>,
    exact_call_without_value_to_facts: BTreeMap<String, Vec<Fact>>,
    signature_to_lists: BTreeMap<String, ParameterToValues>,
}

impl SetOfFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored facts; the flag is false for timeless facts.
    pub fn facts(&self) -> &BTreeMap<Fact, bool> {
        &self.facts
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.facts.contains_key(fact)
    }

    /// Insert a fact; false when it was already present. `can_be_removed`
    /// false marks a timeless fact.
    pub fn add(&mut self, fact: Fact, can_be_removed: bool) -> bool {
        if self.facts.contains_key(&fact) {
            return false;
        }
        self.facts.insert(fact.clone(), can_be_removed);

        if !fact.has_a_parameter(false) {
            let mut call = exact_call(&fact);
            self.exact_call_without_value_to_facts
                .entry(call.clone())
                .or_default()
                .push(fact.clone());
            if fact.value().is_some() {
                add_value_to_exact_call(&mut call, &fact);
                self.exact_call_to_facts
                    .entry(call)
                    .or_default()
                    .push(fact.clone());
            }
        }

        let nb_of_args = fact.arguments().len();
        let mut signatures = Vec::new();
        fact.for_each_signature_with_related_types(false, true, &mut |s| {
            signatures.push(s.to_string())
        });
        for signature in signatures {
            let slot = self
                .signature_to_lists
                .entry(signature)
                .or_insert_with(|| ParameterToValues::new(nb_of_args));
            slot.all.push(fact.clone());
            for (i, argument) in fact.arguments().iter().enumerate() {
                let key = if argument.is_a_parameter_to_fill() {
                    String::new()
                } else {
                    argument.value.clone()
                };
                slot.arg_id_to_arg_value_to_facts[i]
                    .entry(key)
                    .or_default()
                    .push(fact.clone());
            }
            if let Some(value) = fact.value() {
                let key = if !value.is_a_parameter_to_fill() && !fact.is_value_negated() {
                    value.value.clone()
                } else {
                    String::new()
                };
                slot.fluent_value_to_facts
                    .entry(key)
                    .or_default()
                    .push(fact.clone());
            }
        }
        true
    }

    /// Remove a fact, or the first stored fact matching it. Removing a
    /// timeless fact fails with `ImmutableFact`.
    pub fn erase(&mut self, fact: &Fact) -> Result<bool> {
        if self.facts.contains_key(fact) {
            return self.erase_exact(&fact.clone());
        }
        let matching = self.find(fact, false);
        if let Some(found) = matching.into_iter().next() {
            return self.erase_exact(&found);
        }
        Ok(false)
    }

    fn erase_exact(&mut self, fact: &Fact) -> Result<bool> {
        match self.facts.get(fact) {
            None => return Ok(false),
            Some(false) => return Err(PlanError::ImmutableFact(fact.to_string())),
            Some(true) => {}
        }
        self.facts.remove(fact);

        if !fact.has_a_parameter(false) {
            let mut call = exact_call(fact);
            if let Some(list) = self.exact_call_without_value_to_facts.get_mut(&call) {
                remove_from_list(list, fact);
                if list.is_empty() {
                    self.exact_call_without_value_to_facts.remove(&call);
                }
            }
            if fact.value().is_some() {
                add_value_to_exact_call(&mut call, fact);
                if let Some(list) = self.exact_call_to_facts.get_mut(&call) {
                    remove_from_list(list, fact);
                    if list.is_empty() {
                        self.exact_call_to_facts.remove(&call);
                    }
                }
            }
        }

        let mut signatures = Vec::new();
        fact.for_each_signature_with_related_types(false, true, &mut |s| {
            signatures.push(s.to_string())
        });
        for signature in signatures {
            let remove_entry = if let Some(slot) = self.signature_to_lists.get_mut(&signature) {
                remove_from_list(&mut slot.all, fact);
                if slot.all.is_empty() {
                    true
                } else {
                    for (i, argument) in fact.arguments().iter().enumerate() {
                        let key = if argument.is_a_parameter_to_fill() {
                            String::new()
                        } else {
                            argument.value.clone()
                        };
                        if let Some(list) = slot.arg_id_to_arg_value_to_facts[i].get_mut(&key) {
                            remove_from_list(list, fact);
                            if list.is_empty() {
                                slot.arg_id_to_arg_value_to_facts[i].remove(&key);
                            }
                        }
                    }
                    if let Some(value) = fact.value() {
                        let key = if !value.is_a_parameter_to_fill() && !fact.is_value_negated() {
                            value.value.clone()
                        } else {
                            String::new()
                        };
                        if let Some(list) = slot.fluent_value_to_facts.get_mut(&key) {
                            remove_from_list(list, fact);
                            if list.is_empty() {
                                slot.fluent_value_to_facts.remove(&key);
                            }
                        }
                    }
                    false
                }
            } else {
                false
            };
            if remove_entry {
                self.signature_to_lists.remove(&signature);
            }
        }
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.facts.clear();
        self.exact_call_to_facts.clear();
        self.exact_call_without_value_to_facts.clear();
        self.signature_to_lists.clear();
    }

    /// Stored facts matching the pattern. Direct map access for fully ground
    /// patterns, otherwise the narrowest argument or value list of the
    /// signature index; never a scan of unrelated facts. May over-approximate
    /// on partially indexed patterns, callers re-verify the match.
    pub fn find(&self, pattern: &Fact, ignore_value: bool) -> Vec<Fact> {
        if !pattern.has_a_parameter(ignore_value) && !pattern.is_value_negated() {
            let mut call = exact_call(pattern);
            if !ignore_value && pattern.value().is_some() {
                add_value_to_exact_call(&mut call, pattern);
                return self
                    .exact_call_to_facts
                    .get(&call)
                    .cloned()
                    .unwrap_or_default();
            }
            return self
                .exact_call_without_value_to_facts
                .get(&call)
                .cloned()
                .unwrap_or_default();
        }

        let Some(slot) = self.signature_to_lists.get(pattern.signature()) else {
            return Vec::new();
        };

        let mut running: Option<&Vec<Fact>> = None;
        let mut has_only_parameters = true;
        for (i, argument) in pattern.arguments().iter().enumerate() {
            if argument.is_a_parameter_to_fill() {
                continue;
            }
            has_only_parameters = false;
            if let Some(list) = slot.arg_id_to_arg_value_to_facts[i].get(&argument.value) {
                match running {
                    Some(prev) => return intersect(prev, list),
                    None => running = Some(list),
                }
            }
        }

        if !ignore_value {
            if let Some(value) = pattern.value() {
                if !value.is_a_parameter_to_fill() && !pattern.is_value_negated() {
                    has_only_parameters = false;
                    if let Some(list) = slot.fluent_value_to_facts.get(&value.value) {
                        match running {
                            Some(prev) => return intersect(prev, list),
                            None => running = Some(list),
                        }
                    }
                }
            }
        }

        if has_only_parameters {
            return slot.all.clone();
        }
        running.cloned().unwrap_or_default()
    }

    /// The stored value of a fluent instance, matching arguments exactly.
    pub fn get_fluent_value(&self, fact: &Fact) -> Option<Entity> {
        for stored in self.find(fact, true) {
            if stored.arguments() == fact.arguments() {
                return stored.value().cloned();
            }
        }
        None
    }

    pub fn has_fact(&self, fact: &Fact) -> bool {
        self.find(fact, false)
            .iter()
            .any(|stored| stored.arguments() == fact.arguments())
    }

    /// Gather, from the stored facts matching `fact`, the entities bound at
    /// the positions where `parameter_name` occurs. Other parameter
    /// occurrences listed in `parameters` are tolerated and reported through
    /// `potential_new_parameters`.
    pub fn extract_potential_arguments_of_a_fact_parameter(
        &self,
        potential_arguments: &mut BTreeSet<Entity>,
        fact: &Fact,
        parameter_name: &str,
        parameters: &ParamValues,
        mut potential_new_parameters: Option<&mut ParamValues>,
    ) {
        for stored in self.find(fact, false) {
            if stored.arguments().len() != fact.arguments().len() {
                continue;
            }
            let mut potential_new_values = BTreeSet::new();
            let mut does_it_match = true;

            let mut on_entity = |pattern: &Entity,
                                 stored_entity: &Entity,
                                 potential_new: &mut Option<&mut ParamValues>|
             -> bool {
                if pattern.value == parameter_name {
                    potential_new_values.insert(stored_entity.clone());
                    return true;
                }
                if pattern == stored_entity {
                    return true;
                }
                for (known_param, _) in parameters.iter() {
                    if pattern.value == known_param.name {
                        if let Some(out) = potential_new {
                            out.insert(known_param.clone(), stored_entity.clone());
                        }
                        return true;
                    }
                }
                false
            };

            for (pattern_arg, stored_arg) in fact.arguments().iter().zip(stored.arguments()) {
                if !on_entity(pattern_arg, stored_arg, &mut potential_new_parameters) {
                    does_it_match = false;
                    break;
                }
            }
            if does_it_match {
                if let (Some(pattern_value), Some(stored_value)) = (fact.value(), stored.value()) {
                    if !on_entity(pattern_value, stored_value, &mut potential_new_parameters) {
                        does_it_match = false;
                    }
                }
            }
            drop(on_entity);

            if does_it_match {
                if potential_arguments.is_empty() {
                    *potential_arguments = potential_new_values;
                } else {
                    potential_arguments.extend(potential_new_values);
                }
            }
        }
    }

    /// Facts present here but not in `old`, and the other way around; a fact
    /// whose value moved is reported as added only.
    pub fn delta_from(&self, old: &SetOfFacts) -> Delta {
        let mut res = Delta::default();
        for fact in self.facts.keys() {
            if !old.facts.contains_key(fact) {
                res.added_facts.insert(fact.clone());
            }
        }
        for fact in old.facts.keys() {
            if !self.facts.contains_key(fact) {
                let displaced = res
                    .added_facts
                    .iter()
                    .any(|added| added.equal_without_value(fact, None, None));
                if !displaced {
                    res.removed_facts.insert(fact.clone());
                }
            }
        }
        res
    }
}

/// Timeless facts of a domain: seeded into every problem's world state as
/// non-removable entries.
#[derive(Debug, Clone, Default)]
pub struct SetOfConstFacts {
    facts: SetOfFacts,
}

impl SetOfConstFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fact: Fact) {
        self.facts.add(fact, false);
    }

    pub fn set_of_facts(&self) -> &SetOfFacts {
        &self.facts
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SetOfEntities;
    use crate::ontology::Ontology;
    use crate::predicate::SetOfPredicates;
    use crate::types::SetOfTypes;

    fn ontology() -> Ontology {
        let types = SetOfTypes::from_pddl("type1 type2 - entity");
        let predicates = SetOfPredicates::from_str(
            "pred_a(?e - entity)\n\
             pred_v(?e - entity) - type2",
            &types,
        )
        .unwrap();
        let constants = SetOfEntities::from_pddl(
            "toto tata - type1\n\
             titi v1 v2 - type2",
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

    fn fact(onto: &Ontology, name: &str, args: &[&str], value: Option<&str>) -> Fact {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Fact::with_parts(
            name,
            &args,
            value,
            false,
            onto,
            &SetOfEntities::new(),
            &[],
            false,
            None,
        )
        .unwrap()
    }

    fn pattern(onto: &Ontology, name: &str, param: &crate::entity::Parameter) -> Fact {
        Fact::with_parts(
            name,
            &[param.name.clone()],
            None,
            false,
            onto,
            &SetOfEntities::new(),
            std::slice::from_ref(param),
            true,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_exact_find() {
        let onto = ontology();
        let mut facts = SetOfFacts::new();
        let f = fact(&onto, "pred_a", &["toto"], None);
        assert!(facts.add(f.clone(), true));
        assert!(!facts.add(f.clone(), true));
        assert_eq!(facts.find(&f, false), vec![f.clone()]);
        assert!(facts.has_fact(&f));
    }

    #[test]
    fn test_supertype_query_finds_subtype_fact() {
        let onto = ontology();
        let mut facts = SetOfFacts::new();
        facts.add(fact(&onto, "pred_a", &["toto"], None), true);
        facts.add(fact(&onto, "pred_a", &["titi"], None), true);

        let param = crate::entity::Parameter::new("?e", onto.types.find("entity"));
        let query = pattern(&onto, "pred_a", &param);
        assert_eq!(facts.find(&query, false).len(), 2);

        let narrow = crate::entity::Parameter::new("?e", onto.types.find("type1"));
        let query = pattern(&onto, "pred_a", &narrow);
        let found = facts.find(&query, false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].arguments()[0].value, "toto");
    }

    #[test]
    fn test_fluent_value_lookup() {
        let onto = ontology();
        let mut facts = SetOfFacts::new();
        facts.add(fact(&onto, "pred_v", &["toto"], Some("v1")), true);
        let probe = fact(&onto, "pred_v", &["toto"], Some("v2"));
        assert_eq!(facts.get_fluent_value(&probe).unwrap().value, "v1");
    }

    #[test]
    fn test_timeless_fact_cannot_be_erased() {
        let onto = ontology();
        let mut facts = SetOfFacts::new();
        let f = fact(&onto, "pred_a", &["toto"], None);
        facts.add(f.clone(), false);
        let err = facts.erase(&f).unwrap_err();
        assert!(matches!(err, PlanError::ImmutableFact(_)));
        assert!(facts.contains(&f));
    }

    #[test]
    fn test_erase_updates_indexes() {
        let onto = ontology();
        let mut facts = SetOfFacts::new();
        let f = fact(&onto, "pred_a", &["toto"], None);
        facts.add(f.clone(), true);
        assert!(facts.erase(&f).unwrap());
        assert!(facts.find(&f, false).is_empty());
        let param = crate::entity::Parameter::new("?e", onto.types.find("entity"));
        assert!(facts.find(&pattern(&onto, "pred_a", &param), false).is_empty());
    }

    #[test]
    fn test_delta() {
        let onto = ontology();
        let mut old = SetOfFacts::new();
        old.add(fact(&onto, "pred_v", &["toto"], Some("v1")), true);
        let mut new = SetOfFacts::new();
        new.add(fact(&onto, "pred_v", &["toto"], Some("v2")), true);
        let delta = new.delta_from(&old);
        assert_eq!(delta.added_facts.len(), 1);
        // The old value was displaced, not removed.
        assert!(delta.removed_facts.is_empty());
    }
}
