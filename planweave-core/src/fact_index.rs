use std::collections::{BTreeMap, BTreeSet};

use crate::condition::Condition;
use crate::fact::{Fact, FactOptional};

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

#[derive(Debug, Clone)]
struct FactWithId {
    fact_optional: FactOptional,
    id: String,
}

#[derive(Debug, Clone, Default)]
struct ParameterToValues {
    all: Vec<FactWithId>,
    arg_id_to_arg_value_to_entries: Vec<BTreeMap<String, Vec<FactWithId>>>,
    fluent_value_to_entries: BTreeMap<String, Vec<FactWithId>>,
}

impl ParameterToValues {
    fn new(nb_of_args: usize) -> Self {
        ParameterToValues {
            all: Vec::new(),
            arg_id_to_arg_value_to_entries: vec![BTreeMap::new(); nb_of_args],
            fluent_value_to_entries: BTreeMap::new(),
        }
    }
}

/// Pattern-to-id index over optional facts of one polarity. Registration
/// expands signatures over sub and super type combinations; lookup merges
/// the wildcard buckets so a parameterized pattern matches ground probes.
#[derive(Debug, Clone, Default)]
struct FactsToId {
    exact_call_to_entries: BTreeMap<String, Vec<FactWithId>>,
    exact_call_without_value_to_entries: BTreeMap<String, Vec<FactWithId>>,
    signature_to_lists: BTreeMap<String, ParameterToValues>,
}

impl FactsToId {
    fn add(&mut self, fact_optional: &FactOptional, id: &str, ignore_value: bool) {
        let entry = FactWithId {
            fact_optional: fact_optional.clone(),
            id: id.to_string(),
        };
        let fact = &fact_optional.fact;

        if !fact.has_a_parameter(false) {
            let mut call = exact_call(fact);
            self.exact_call_without_value_to_entries
                .entry(call.clone())
                .or_default()
                .push(entry.clone());
            if !ignore_value && fact.value().is_some() {
                add_value_to_exact_call(&mut call, fact);
                self.exact_call_to_entries
                    .entry(call)
                    .or_default()
                    .push(entry.clone());
            }
        }

        let nb_of_args = fact.arguments().len();
        let mut signatures = Vec::new();
        fact.for_each_signature_with_related_types(true, true, &mut |s| {
            signatures.push(s.to_string())
        });
        for signature in signatures {
            let slot = self
                .signature_to_lists
                .entry(signature)
                .or_insert_with(|| ParameterToValues::new(nb_of_args));
            slot.all.push(entry.clone());
            for (i, argument) in fact.arguments().iter().enumerate() {
                let key = if argument.is_a_parameter_to_fill() {
                    String::new()
                } else {
                    argument.value.clone()
                };
                slot.arg_id_to_arg_value_to_entries[i]
                    .entry(key)
                    .or_default()
                    .push(entry.clone());
            }
            if ignore_value || fact.value().is_some() {
                let key = match fact.value() {
                    Some(value)
                        if !ignore_value
                            && !value.is_a_parameter_to_fill()
                            && !fact.is_value_negated() =>
                    {
                        value.value.clone()
                    }
                    _ => String::new(),
                };
                slot.fluent_value_to_entries
                    .entry(key)
                    .or_default()
                    .push(entry.clone());
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.signature_to_lists.is_empty()
    }

    /// Registered entries whose pattern can match the probe fact. Each
    /// ground probe argument is matched against both its exact bucket and
    /// the wildcard bucket.
    fn find(&self, probe: &Fact, ignore_value: bool) -> Vec<FactWithId> {
        let mut exact_match: Option<&Vec<FactWithId>> = None;
        if !probe.has_a_parameter(ignore_value) && !probe.is_value_negated() {
            let mut call = exact_call(probe);
            if !ignore_value && probe.value().is_some() {
                add_value_to_exact_call(&mut call, probe);
                exact_match = self.exact_call_to_entries.get(&call);
            } else {
                exact_match = self.exact_call_without_value_to_entries.get(&call);
            }
        }

        let Some(slot) = self.signature_to_lists.get(probe.signature()) else {
            return exact_match.cloned().unwrap_or_default();
        };

        enum Step<'a> {
            Done(Vec<FactWithId>),
            Keep(&'a Vec<FactWithId>),
            Skip,
        }

        fn intersect(a: &[FactWithId], b: &[FactWithId]) -> Vec<FactWithId> {
            a.iter()
                .filter(|e| b.iter().any(|o| o.id == e.id && o.fact_optional == e.fact_optional))
                .cloned()
                .collect()
        }

        fn merge(a: &[FactWithId], b: &[FactWithId]) -> Vec<FactWithId> {
            let mut res: Vec<FactWithId> = a.to_vec();
            res.extend(b.iter().cloned());
            res
        }

        fn match_bucket<'a>(
            bucket: &'a BTreeMap<String, Vec<FactWithId>>,
            key: &str,
            running: Option<&Vec<FactWithId>>,
            exact: Option<&Vec<FactWithId>>,
        ) -> Step<'a> {
            let for_this_value = bucket.get(key);
            let for_any_value = bucket.get("");
            match (for_this_value, for_any_value) {
                (Some(this_list), Some(any_list)) => match exact {
                    Some(exact_list) => Step::Done(merge(exact_list, any_list)),
                    None => Step::Done(merge(this_list, any_list)),
                },
                (Some(this_list), None) => {
                    if exact.is_some() {
                        Step::Skip
                    } else {
                        match running {
                            Some(prev) => Step::Done(intersect(prev, this_list)),
                            None => Step::Keep(this_list),
                        }
                    }
                }
                (None, Some(any_list)) => match running {
                    Some(prev) => Step::Done(intersect(prev, any_list)),
                    None => Step::Keep(any_list),
                },
                (None, None) => Step::Done(Vec::new()),
            }
        }

        let mut running: Option<&Vec<FactWithId>> = None;
        let mut has_only_parameters = true;
        for (i, argument) in probe.arguments().iter().enumerate() {
            if argument.is_a_parameter_to_fill() {
                continue;
            }
            has_only_parameters = false;
            match match_bucket(
                &slot.arg_id_to_arg_value_to_entries[i],
                &argument.value,
                running,
                exact_match,
            ) {
                Step::Done(res) => return res,
                Step::Keep(new_running) => running = Some(new_running),
                Step::Skip => {}
            }
        }

        if !ignore_value {
            if let Some(value) = probe.value() {
                if !value.is_a_parameter_to_fill() && !probe.is_value_negated() {
                    has_only_parameters = false;
                    match match_bucket(
                        &slot.fluent_value_to_entries,
                        &value.value,
                        running,
                        exact_match,
                    ) {
                        Step::Done(res) => return res,
                        Step::Keep(new_running) => running = Some(new_running),
                        Step::Skip => {}
                    }
                }
            }
        }

        if has_only_parameters {
            return slot.all.clone();
        }
        if let Some(res) = running {
            return res.clone();
        }
        exact_match.cloned().unwrap_or_default()
    }
}

/// The polarity-split condition index: maps every optional fact of the
/// registered conditions to the id of the action, event or callback owning
/// it. This is what the event cascade and the domain succession rebuild walk.
#[derive(Debug, Clone, Default)]
pub struct FactOptionalsToId {
    facts_to_id: FactsToId,
    not_facts_to_id: FactsToId,
}

impl FactOptionalsToId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fact_optional: &FactOptional, id: &str) {
        if fact_optional.is_fact_negated {
            self.not_facts_to_id.add(fact_optional, id, false);
        } else {
            self.facts_to_id.add(fact_optional, id, false);
        }
    }

    /// Register every optional fact of a condition. Returns true when at
    /// least one positive fact was registered.
    pub fn add_condition(&mut self, condition: &Condition, id: &str) -> bool {
        let mut has_added_a_fact = false;
        condition.for_each_opt_fact(false, false, false, &mut |fact_optional, ignore_value| {
            if fact_optional.is_fact_negated {
                self.not_facts_to_id.add(fact_optional, id, ignore_value);
            } else {
                self.facts_to_id.add(fact_optional, id, ignore_value);
                has_added_a_fact = true;
            }
            true
        });
        has_added_a_fact
    }

    pub fn is_empty(&self) -> bool {
        self.facts_to_id.is_empty() && self.not_facts_to_id.is_empty()
    }

    pub fn find(
        &self,
        callback: &mut dyn FnMut(&str) -> bool,
        fact_optional: &FactOptional,
        ignore_value: bool,
    ) -> bool {
        self.find_fact(
            callback,
            &fact_optional.fact,
            fact_optional.is_fact_negated,
            ignore_value,
            false,
        )
    }

    /// Invoke the callback for each registered id whose pattern matches the
    /// probe; the callback returns false to stop. With
    /// `include_matching_with_older_value`, a positive fluent probe also
    /// reaches negated-value patterns over a different value, the way a
    /// reassignment enables a `!=` precondition. Returns false when the
    /// callback stopped the walk.
    pub fn find_fact(
        &self,
        callback: &mut dyn FnMut(&str) -> bool,
        fact: &Fact,
        is_fact_negated: bool,
        ignore_value: bool,
        include_matching_with_older_value: bool,
    ) -> bool {
        let mut already_returned_ids = BTreeSet::new();

        let index = if is_fact_negated {
            &self.not_facts_to_id
        } else {
            &self.facts_to_id
        };
        for entry in index.find(fact, ignore_value) {
            if already_returned_ids.insert(entry.id.clone())
                && fact.equal_except_any_parameters(&entry.fact_optional.fact, ignore_value)
                && !callback(&entry.id)
            {
                return false;
            }
        }

        if include_matching_with_older_value && !is_fact_negated && fact.value().is_some() {
            for entry in self.not_facts_to_id.find(fact, true) {
                if !already_returned_ids.insert(entry.id.clone()) {
                    continue;
                }
                if !fact.equal_except_any_parameters(&entry.fact_optional.fact, true) {
                    continue;
                }
                let Some(entry_value) = entry.fact_optional.fact.value() else {
                    continue;
                };
                if entry.fact_optional.is_fact_negated && entry_value.is_any_entity() {
                    continue;
                }
                let Some(probe_value) = fact.value() else {
                    continue;
                };
                if probe_value.is_a_parameter_to_fill()
                    || entry_value.is_a_parameter_to_fill()
                    || probe_value.value != entry_value.value
                {
                    if !callback(&entry.id) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Parameter, SetOfEntities};
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
            "toto - type1\n\
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

    fn ground(onto: &Ontology, name: &str, args: &[&str], value: Option<&str>) -> Fact {
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

    fn collect_ids(index: &FactOptionalsToId, fact: &Fact, negated: bool, older: bool) -> Vec<String> {
        let mut ids = Vec::new();
        index.find_fact(
            &mut |id| {
                ids.push(id.to_string());
                true
            },
            fact,
            negated,
            false,
            older,
        );
        ids
    }

    #[test]
    fn test_parameterized_pattern_matches_ground_probe() {
        let onto = ontology();
        let param = Parameter::new("?e", onto.types.find("entity"));
        let pattern = Fact::with_parts(
            "pred_a",
            &["?e".to_string()],
            None,
            false,
            &onto,
            &SetOfEntities::new(),
            std::slice::from_ref(&param),
            false,
            None,
        )
        .unwrap();
        let mut index = FactOptionalsToId::new();
        index.add(&FactOptional::new(pattern), "action1");

        let probe = ground(&onto, "pred_a", &["toto"], None);
        assert_eq!(collect_ids(&index, &probe, false, false), vec!["action1"]);
        assert!(collect_ids(&index, &probe, true, false).is_empty());
    }

    #[test]
    fn test_polarity_split() {
        let onto = ontology();
        let f = ground(&onto, "pred_a", &["toto"], None);
        let mut index = FactOptionalsToId::new();
        index.add(&FactOptional::negated(f.clone()), "ev_neg");
        assert!(collect_ids(&index, &f, false, false).is_empty());
        assert_eq!(collect_ids(&index, &f, true, false), vec!["ev_neg"]);
    }

    #[test]
    fn test_older_value_matching() {
        let onto = ontology();
        let mut registered = ground(&onto, "pred_v", &["toto"], Some("v1"));
        registered.set_value_negated(true);
        let mut index = FactOptionalsToId::new();
        index.add(&FactOptional::new(registered), "a_not_v1");

        // Assigning v2 enables the `pred_v(toto) != v1` pattern.
        let probe = ground(&onto, "pred_v", &["toto"], Some("v2"));
        assert_eq!(collect_ids(&index, &probe, false, true), vec!["a_not_v1"]);
        // Assigning v1 does not.
        let probe = ground(&onto, "pred_v", &["toto"], Some("v1"));
        assert!(collect_ids(&index, &probe, false, true).is_empty());
    }
}
