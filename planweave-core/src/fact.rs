use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::bindings::ParamValues;
use crate::entity::{Entity, Parameter, SetOfEntities};
use crate::error::{PlanError, Result};
use crate::ontology::Ontology;
use crate::predicate::Predicate;
use crate::set_of_facts::SetOfFacts;
use crate::types::Type;

/// Prefix of punctual facts: delivered as one-shot notifications, never
/// stored in the world.
pub const PUNCTUAL_PREFIX: &str = "~punctual~";

/// A ground or pattern instance of a predicate. Arguments may be ground
/// entities, `?parameters` or the any-entity wildcard; fluents carry a value.
#[derive(Debug, Clone)]
pub struct Fact {
    pub predicate: Predicate,
    arguments: Vec<Entity>,
    value: Option<Entity>,
    is_value_negated: bool,
    signature: String,
}

fn is_inside_parameters(entity: &Entity, parameters: Option<&[Parameter]>) -> bool {
    parameters.is_some_and(|params| params.iter().any(|p| p.name == entity.value))
}

fn is_inside_param_values(entity: &Entity, values: Option<&ParamValues>) -> bool {
    values.is_some_and(|v| v.is_unconstrained(&entity.to_parameter()))
}

impl Fact {
    pub fn with_parts(
        name: &str,
        argument_strs: &[String],
        value_str: Option<&str>,
        is_value_negated: bool,
        ontology: &Ontology,
        objects: &SetOfEntities,
        parameters: &[Parameter],
        is_ok_if_value_is_missing: bool,
        parameter_names_to_entity: Option<&BTreeMap<String, Entity>>,
    ) -> Result<Fact> {
        let predicate = ontology
            .predicate(name)
            .cloned()
            .ok_or_else(|| PlanError::UnknownName(name.to_string()))?;

        let mut arguments = Vec::with_capacity(argument_strs.len());
        for arg in argument_strs {
            if !arg.is_empty() {
                arguments.push(Entity::from_usage(
                    arg,
                    ontology,
                    objects,
                    parameters,
                    parameter_names_to_entity,
                )?);
            }
        }

        let value = match value_str {
            Some(v) if !v.is_empty() => Some(Entity::from_usage(
                v,
                ontology,
                objects,
                parameters,
                parameter_names_to_entity,
            )?),
            _ => {
                if is_ok_if_value_is_missing && predicate.value.is_some() {
                    Some(Entity::any_of(predicate.value.clone()))
                } else {
                    None
                }
            }
        };

        let mut fact = Fact {
            predicate,
            arguments,
            value,
            is_value_negated,
            signature: String::new(),
        };
        fact.finalize_and_validate(is_ok_if_value_is_missing)?;
        fact.reset_signature();
        Ok(fact)
    }

    /// Arity and typing checks; declared parameter types are narrowed by
    /// parameter arguments.
    fn finalize_and_validate(&mut self, is_ok_if_value_is_missing: bool) -> Result<()> {
        if self.predicate.parameters.len() != self.arguments.len() {
            return Err(PlanError::ArityMismatch {
                fact: self.to_string(),
                predicate: self.predicate.to_pddl(),
                got: self.arguments.len(),
                expected: self.predicate.parameters.len(),
            });
        }
        for (argument, declared) in self
            .arguments
            .iter_mut()
            .zip(self.predicate.parameters.iter_mut())
        {
            if argument.is_a_parameter_to_fill() {
                declared.ty = Type::smaller_of(argument.ty.as_ref(), declared.ty.as_ref());
                argument.ty = declared.ty.clone();
                continue;
            }
            if argument.is_any_entity() {
                continue;
            }
            match (&argument.ty, &declared.ty) {
                (Some(arg_ty), Some(declared_ty)) => {
                    if !arg_ty.is_a(declared_ty) {
                        return Err(PlanError::TypeMismatch {
                            entity: argument.value.clone(),
                            expected: declared_ty.name().to_string(),
                        });
                    }
                }
                (None, Some(declared_ty)) => {
                    return Err(PlanError::TypeMismatch {
                        entity: argument.value.clone(),
                        expected: declared_ty.name().to_string(),
                    });
                }
                _ => {}
            }
        }

        match (&mut self.value, &mut self.predicate.value) {
            (Some(value), Some(expected)) => {
                if value.is_a_parameter_to_fill() {
                    if let Some(smaller) = Type::smaller_of(value.ty.as_ref(), Some(expected)) {
                        *expected = smaller.clone();
                        value.ty = Some(smaller);
                    }
                } else if !value.is_any_entity() {
                    if let Some(value_ty) = &value.ty {
                        if !value_ty.is_a(expected) {
                            return Err(PlanError::TypeMismatch {
                                entity: value.value.clone(),
                                expected: expected.name().to_string(),
                            });
                        }
                    }
                }
            }
            (None, Some(_)) => {
                if !is_ok_if_value_is_missing {
                    return Err(PlanError::MissingValue(self.to_string()));
                }
            }
            (Some(_), None) => {
                return Err(PlanError::UnexpectedValue(self.to_string()));
            }
            (None, None) => {}
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.predicate.name
    }

    pub fn arguments(&self) -> &[Entity] {
        &self.arguments
    }

    pub fn value(&self) -> Option<&Entity> {
        self.value.as_ref()
    }

    pub fn is_value_negated(&self) -> bool {
        self.is_value_negated
    }

    pub fn set_value(&mut self, value: Option<Entity>) {
        self.value = value;
        self.reset_signature();
    }

    pub fn set_value_negated(&mut self, negated: bool) {
        self.is_value_negated = negated;
    }

    pub fn set_value_from_str(&mut self, value_str: &str) {
        match &mut self.value {
            Some(value) => value.value = value_str.to_string(),
            None => self.value = Some(Entity::new(value_str, self.predicate.value.clone())),
        }
        self.reset_signature();
    }

    pub fn is_punctual(&self) -> bool {
        self.name().starts_with(PUNCTUAL_PREFIX)
    }

    pub fn has_parameter_or_value(&self, parameter: &Parameter) -> bool {
        if let Some(value) = &self.value {
            if value.matches_parameter(parameter) {
                return true;
            }
        }
        self.arguments
            .iter()
            .any(|a| a.matches_parameter(parameter))
    }

    pub fn has_a_parameter(&self, ignore_value: bool) -> bool {
        if self.arguments.iter().any(|a| a.is_a_parameter_to_fill()) {
            return true;
        }
        !ignore_value
            && self
                .value
                .as_ref()
                .is_some_and(|v| v.is_a_parameter_to_fill())
    }

    pub fn has_entity(&self, entity_id: &str) -> bool {
        self.arguments.iter().any(|a| a.value == entity_id)
            || self.value.as_ref().is_some_and(|v| v.value == entity_id)
    }

    /// This fact's value position is the wildcard and all arguments are
    /// ground: the pattern of a "fluent becomes undefined" effect.
    pub fn is_complete_with_any_entity_value(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.is_any_entity())
            && !self.arguments.iter().any(|a| a.is_a_parameter_to_fill())
    }

    // ------------------------------------------------------------------
    // Equality variants used by the matching machinery
    // ------------------------------------------------------------------

    pub fn equal_without_value(
        &self,
        other: &Fact,
        other_params_as_any: Option<&ParamValues>,
        other_params_as_any2: Option<&ParamValues>,
    ) -> bool {
        if other.name() != self.name() || other.arguments.len() != self.arguments.len() {
            return false;
        }
        self.arguments
            .iter()
            .zip(other.arguments.iter())
            .all(|(a, b)| {
                a == b
                    || a.is_any_entity()
                    || b.is_any_entity()
                    || is_inside_param_values(b, other_params_as_any)
                    || is_inside_param_values(b, other_params_as_any2)
            })
    }

    pub fn equal_without_an_arg(&self, other: &Fact, arg_to_ignore: &str) -> bool {
        if other.name() != self.name()
            || other.arguments.len() != self.arguments.len()
            || other.value != self.value
        {
            return false;
        }
        self.arguments
            .iter()
            .zip(other.arguments.iter())
            .all(|(a, b)| {
                a == b || a.is_any_entity() || b.is_any_entity() || a.value == arg_to_ignore
            })
    }

    pub fn equal_without_args_and_value(
        &self,
        other: &Fact,
        parameters_to_ignore: Option<&[Parameter]>,
    ) -> bool {
        if other.name() != self.name() || other.arguments.len() != self.arguments.len() {
            return false;
        }
        self.arguments
            .iter()
            .zip(other.arguments.iter())
            .all(|(a, b)| {
                a == b
                    || a.is_any_entity()
                    || b.is_any_entity()
                    || is_inside_parameters(a, parameters_to_ignore)
            })
    }

    /// Equality where parameters on either side match anything. With
    /// `ignore_value` false, the value comparison honors both negation flags.
    pub fn equal_except_any_parameters(&self, other: &Fact, ignore_value: bool) -> bool {
        if self.name() != other.name() || self.arguments.len() != other.arguments.len() {
            return false;
        }
        for (a, b) in self.arguments.iter().zip(other.arguments.iter()) {
            if a != b && !a.is_a_parameter_to_fill() && !b.is_a_parameter_to_fill() {
                return false;
            }
        }
        if ignore_value {
            return true;
        }
        match (&self.value, &other.value) {
            (None, None) => self.is_value_negated == other.is_value_negated,
            (Some(v), _) if v.is_a_parameter_to_fill() => {
                self.is_value_negated == other.is_value_negated
            }
            (_, Some(v)) if v.is_a_parameter_to_fill() => {
                self.is_value_negated == other.is_value_negated
            }
            (Some(a), Some(b)) if a == b => self.is_value_negated == other.is_value_negated,
            _ => self.is_value_negated != other.is_value_negated,
        }
    }

    /// Equality where any-entity wildcards and bound-as-any parameters on
    /// either side match anything.
    pub fn equal_except_any_entities(
        &self,
        other: &Fact,
        other_params_as_any: Option<&ParamValues>,
        other_params_as_any2: Option<&ParamValues>,
        this_params_as_any: Option<&[Parameter]>,
    ) -> bool {
        if self.name() != other.name() || self.arguments.len() != other.arguments.len() {
            return false;
        }
        for (a, b) in self.arguments.iter().zip(other.arguments.iter()) {
            if a != b
                && !a.is_any_entity()
                && !b.is_any_entity()
                && !is_inside_parameters(a, this_params_as_any)
                && !is_inside_param_values(b, other_params_as_any)
                && !is_inside_param_values(b, other_params_as_any2)
            {
                return false;
            }
        }
        match (&self.value, &other.value) {
            (None, None) => self.is_value_negated == other.is_value_negated,
            (Some(v), _)
                if v.is_any_entity() || is_inside_parameters(v, this_params_as_any) =>
            {
                self.is_value_negated == other.is_value_negated
            }
            (_, Some(v))
                if v.is_any_entity()
                    || is_inside_param_values(v, other_params_as_any)
                    || is_inside_param_values(v, other_params_as_any2) =>
            {
                self.is_value_negated == other.is_value_negated
            }
            (Some(a), Some(b)) if a == b => self.is_value_negated == other.is_value_negated,
            _ => self.is_value_negated != other.is_value_negated,
        }
    }

    pub fn equal_except_any_entities_and_value(
        &self,
        other: &Fact,
        other_params_as_any: Option<&ParamValues>,
        other_params_as_any2: Option<&ParamValues>,
    ) -> bool {
        if self.name() != other.name() || self.arguments.len() != other.arguments.len() {
            return false;
        }
        for (a, b) in self.arguments.iter().zip(other.arguments.iter()) {
            if a != b
                && !a.is_any_entity()
                && !b.is_any_entity()
                && !is_inside_param_values(b, other_params_as_any)
                && !is_inside_param_values(b, other_params_as_any2)
            {
                return false;
            }
        }
        self.is_value_negated == other.is_value_negated
    }

    /// Whether an effect producing `other` after this effect could still be
    /// worth exploring. Ambiguous parameter-to-parameter matches answer true:
    /// this is an over-approximation, an extra edge only costs search time.
    pub fn gives_interest_for_successor(&self, other: &Fact) -> bool {
        if other.name() != self.name()
            || (other.arguments.len() != self.arguments.len()
                && other.value.is_some() == self.value.is_some())
        {
            return true;
        }
        for (a, b) in self.arguments.iter().zip(other.arguments.iter()) {
            if !(a.is_any_entity() && b.is_any_entity())
                && (a.is_a_parameter_to_fill() || b.is_a_parameter_to_fill() || a != b)
            {
                return true;
            }
        }
        if let (Some(sv), Some(ov)) = (&self.value, &other.value) {
            return ov != sv && !(ov.is_a_parameter_to_fill() && sv.is_a_parameter_to_fill());
        }
        false
    }

    // ------------------------------------------------------------------
    // Argument extraction and substitution
    // ------------------------------------------------------------------

    /// Extract the argument of `example` (another instance of this fact) that
    /// sits at the position where `parameter` occurs in this fact.
    pub fn extract_argument_from_example(
        &self,
        parameter: &Parameter,
        example: &Fact,
    ) -> Option<Entity> {
        if self.name() != example.name()
            || self.is_value_negated != example.is_value_negated
            || self.arguments.len() != example.arguments.len()
        {
            return None;
        }
        let mut res = None;
        if let (Some(value), Some(example_value)) = (&self.value, &example.value) {
            if value.matches_parameter(parameter) {
                res = Some(example_value.clone());
            }
        }
        for (a, b) in self.arguments.iter().zip(example.arguments.iter()) {
            if a.matches_parameter(parameter) {
                res = Some(b.clone());
            }
        }
        res
    }

    /// Like [`Self::extract_argument_from_example`] but ignoring values.
    pub fn extract_argument_from_example_ignoring_value(
        &self,
        parameter: &Parameter,
        example: &Fact,
    ) -> Option<Entity> {
        if self.name() != example.name()
            || self.is_value_negated != example.is_value_negated
            || self.arguments.len() != example.arguments.len()
        {
            return None;
        }
        let mut res = None;
        for (a, b) in self.arguments.iter().zip(example.arguments.iter()) {
            if a.matches_parameter(parameter) {
                res = Some(b.clone());
            }
        }
        res
    }

    pub fn replace_arguments(&mut self, substitution: &BTreeMap<Parameter, Entity>) {
        if let Some(value) = &mut self.value {
            if let Some(new_value) = substitution.get(&value.to_parameter()) {
                *value = new_value.clone();
            }
        }
        for argument in &mut self.arguments {
            if let Some(new_value) = substitution.get(&argument.to_parameter()) {
                *argument = new_value.clone();
            }
        }
        self.reset_signature();
    }

    /// Substitute each parameter occurrence with the first candidate of its
    /// set, when one exists.
    pub fn replace_arguments_with_first(&mut self, substitution: &ParamValues) {
        if let Some(value) = &mut self.value {
            if let Some(candidates) = substitution.get(&value.to_parameter()) {
                if let Some(first) = candidates.keys().next() {
                    *value = first.clone();
                }
            }
        }
        for argument in &mut self.arguments {
            if let Some(candidates) = substitution.get(&argument.to_parameter()) {
                if let Some(first) = candidates.keys().next() {
                    *argument = first.clone();
                }
            }
        }
        self.reset_signature();
    }

    pub fn replace_argument(&mut self, current: &Entity, new: &Entity) {
        for argument in &mut self.arguments {
            if argument == current {
                *argument = new.clone();
            }
        }
        self.reset_signature();
    }

    // ------------------------------------------------------------------
    // Unification against stored facts
    // ------------------------------------------------------------------

    /// Does this fact match `other`, refining parameter candidates on the
    /// way. `parameters` (and the in-place variant) hold the currently known
    /// candidates; matches are accumulated into the `new_*` maps.
    pub fn is_in_other_fact(
        &self,
        other: &Fact,
        new_parameters: &mut ParamValues,
        parameters: Option<&ParamValues>,
        new_parameters_in_place: &mut ParamValues,
        parameters_to_modify_in_place: Option<&ParamValues>,
    ) -> bool {
        if other.name() != self.name() || other.arguments.len() != self.arguments.len() {
            return false;
        }

        let mut new_potential = ParamValues::new();
        let mut new_in_place = ParamValues::new();

        let mut does_it_match = |pattern_entity: &Entity, instance_entity: &Entity| -> bool {
            if pattern_entity == instance_entity || pattern_entity.is_any_entity() {
                return true;
            }
            let as_parameter = pattern_entity.to_parameter();
            if let Some(params) = parameters {
                if let Some((declared, candidates)) = params.get_entry(&as_parameter) {
                    let type_ok = match (&instance_entity.ty, &declared.ty) {
                        (Some(instance_ty), Some(declared_ty)) => instance_ty.is_a(declared_ty),
                        _ => true,
                    };
                    if type_ok {
                        if !candidates.is_empty() && !candidates.contains_key(instance_entity) {
                            return false;
                        }
                        new_potential.insert(as_parameter, instance_entity.clone());
                        return true;
                    }
                }
            }
            if let Some(in_place) = parameters_to_modify_in_place {
                if let Some((declared, candidates)) = in_place.get_entry(&as_parameter) {
                    let type_ok = match (&instance_entity.ty, &declared.ty) {
                        (Some(instance_ty), Some(declared_ty)) => instance_ty.is_a(declared_ty),
                        _ => true,
                    };
                    if type_ok {
                        if !candidates.is_empty() && !candidates.contains_key(instance_entity) {
                            return false;
                        }
                        new_in_place.insert(as_parameter, instance_entity.clone());
                        return true;
                    }
                }
            }
            false
        };

        for (pattern_arg, instance_arg) in self.arguments.iter().zip(other.arguments.iter()) {
            if pattern_arg != instance_arg && !does_it_match(pattern_arg, instance_arg) {
                return false;
            }
        }

        let res = match (&self.value, &other.value) {
            (None, None) => other.is_value_negated == self.is_value_negated,
            (Some(pattern_value), Some(instance_value)) => {
                if does_it_match(pattern_value, instance_value) {
                    other.is_value_negated == self.is_value_negated
                } else {
                    other.is_value_negated != self.is_value_negated
                }
            }
            _ => other.is_value_negated != self.is_value_negated,
        };
        drop(does_it_match);

        if res {
            if !new_potential.is_empty() {
                if new_parameters.is_empty() {
                    *new_parameters = new_potential;
                } else {
                    new_parameters.merge_union(new_potential);
                }
            }
            if !new_in_place.is_empty() {
                if new_parameters_in_place.is_empty() {
                    *new_parameters_in_place = new_in_place;
                } else {
                    new_parameters_in_place.merge_union(new_in_place);
                }
            }
            return true;
        }
        false
    }

    /// Commit accumulated candidate refinements. With
    /// `check_all_possibilities`, the match is only accepted when it covers
    /// exactly the already known candidates.
    pub fn update_parameters(
        &self,
        new_potential_parameters: ParamValues,
        new_potential_parameters_in_place: ParamValues,
        new_parameters: Option<&mut ParamValues>,
        check_all_possibilities: bool,
        parameters: Option<&ParamValues>,
        parameters_to_modify_in_place: Option<&mut ParamValues>,
        tried_to_modify_parameters: Option<&mut bool>,
    ) -> bool {
        if let Some(in_place) = parameters_to_modify_in_place {
            *in_place = new_potential_parameters_in_place;
        }
        if check_all_possibilities {
            if let Some(params) = parameters {
                if new_potential_parameters != *params {
                    return false;
                }
            }
        }
        if !new_potential_parameters.is_empty() {
            match new_parameters {
                Some(out) => {
                    if out.is_empty() {
                        *out = new_potential_parameters;
                    } else {
                        out.merge_union(new_potential_parameters);
                    }
                }
                None => {
                    if let Some(tried) = tried_to_modify_parameters {
                        *tried = true;
                    }
                }
            }
        }
        true
    }

    pub fn is_in_other_facts(
        &self,
        other_facts: &BTreeSet<Fact>,
        new_parameters: Option<&mut ParamValues>,
        check_all_possibilities: bool,
        parameters: Option<&ParamValues>,
        mut parameters_to_modify_in_place: Option<&mut ParamValues>,
        tried_to_modify_parameters: Option<&mut bool>,
    ) -> bool {
        let mut res = false;
        let mut new_potential = ParamValues::new();
        let mut new_in_place = ParamValues::new();
        for other in other_facts {
            if self.is_in_other_fact(
                other,
                &mut new_potential,
                parameters,
                &mut new_in_place,
                parameters_to_modify_in_place.as_deref(),
            ) {
                res = true;
            }
        }
        if !res {
            return false;
        }
        self.update_parameters(
            new_potential,
            new_in_place,
            new_parameters,
            check_all_possibilities,
            parameters,
            parameters_to_modify_in_place,
            tried_to_modify_parameters,
        )
    }

    pub fn is_in_other_facts_map(
        &self,
        other_facts: &SetOfFacts,
        new_parameters: Option<&mut ParamValues>,
        check_all_possibilities: bool,
        parameters: Option<&ParamValues>,
        mut parameters_to_modify_in_place: Option<&mut ParamValues>,
        tried_to_modify_parameters: Option<&mut bool>,
    ) -> bool {
        let mut res = false;
        let mut new_potential = ParamValues::new();
        let mut new_in_place = match parameters_to_modify_in_place.as_deref() {
            Some(in_place) => in_place.clone(),
            None => ParamValues::new(),
        };
        for other in other_facts.find(self, false) {
            if self.is_in_other_fact(
                &other,
                &mut new_potential,
                parameters,
                &mut new_in_place,
                parameters_to_modify_in_place.as_deref(),
            ) {
                res = true;
            }
        }
        if !res {
            return false;
        }
        self.update_parameters(
            new_potential,
            new_in_place,
            new_parameters,
            check_all_possibilities,
            parameters,
            parameters_to_modify_in_place,
            tried_to_modify_parameters,
        )
    }

    /// Would adding (or, for the caller's negated case, removing) this fact
    /// change the set. True when the fact is not already satisfied for every
    /// candidate binding.
    pub fn can_modify_set_of_facts(
        &self,
        facts: &SetOfFacts,
        arguments_to_filter: &mut ParamValues,
    ) -> bool {
        let mut new_parameters = ParamValues::new();
        let satisfied_for_all = self.is_in_other_facts_map(
            facts,
            Some(&mut new_parameters),
            true,
            Some(arguments_to_filter),
            None,
            None,
        );
        !satisfied_for_all
    }

    // ------------------------------------------------------------------
    // Signatures
    // ------------------------------------------------------------------

    fn generate_signature(&self) -> String {
        let mut res = String::with_capacity(self.name().len() + 2 + self.arguments.len() * 8);
        res.push_str(self.name());
        res.push('(');
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                res.push_str(", ");
            }
            if let Some(ty) = &argument.ty {
                res.push_str(ty.name());
            }
        }
        res.push(')');
        res
    }

    fn reset_signature(&mut self) {
        self.signature = self.generate_signature();
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Signatures over every combination of related types of each argument,
    /// so a query typed at a supertype finds subtype facts and vice versa.
    pub fn for_each_signature_with_related_types(
        &self,
        include_sub_types: bool,
        include_parent_types: bool,
        callback: &mut dyn FnMut(&str),
    ) {
        let mut related: Vec<Vec<String>> = Vec::with_capacity(self.arguments.len());
        for argument in &self.arguments {
            let mut names = BTreeSet::new();
            match &argument.ty {
                Some(ty) => {
                    names.insert(ty.name().to_string());
                    if include_sub_types {
                        names.extend(ty.descendant_names().iter().cloned());
                    }
                    if include_parent_types {
                        names.extend(ty.ancestor_names().iter().cloned());
                    }
                }
                None => {
                    names.insert(String::new());
                }
            }
            related.push(names.into_iter().collect());
        }

        let mut combinations: Vec<String> = vec![String::new()];
        for names in &related {
            let mut next = Vec::with_capacity(combinations.len() * names.len());
            for partial in &combinations {
                for type_name in names {
                    let mut combined = partial.clone();
                    if !combined.is_empty() {
                        combined.push_str(", ");
                    }
                    combined.push_str(type_name);
                    next.push(combined);
                }
            }
            combinations = next;
        }
        for arg_list in combinations {
            callback(&format!("{}({})", self.name(), arg_list));
        }
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.arguments == other.arguments
            && self.value == other.value
            && self.is_value_negated == other.is_value_negated
    }
}

impl Eq for Fact {}

impl PartialOrd for Fact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name()
            .cmp(other.name())
            .then_with(|| self.value.cmp(&other.value))
            .then_with(|| self.is_value_negated.cmp(&other.is_value_negated))
            .then_with(|| self.arguments.cmp(&other.arguments))
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if !self.arguments.is_empty() {
            write!(f, "(")?;
            for (i, argument) in self.arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", argument.value)?;
            }
            write!(f, ")")?;
        }
        if let Some(value) = &self.value {
            if self.is_value_negated {
                write!(f, "!={}", value.value)?;
            } else {
                write!(f, "={}", value.value)?;
            }
        }
        Ok(())
    }
}

/// A fact together with its polarity, as it appears in conditions and
/// effects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FactOptional {
    pub is_fact_negated: bool,
    pub fact: Fact,
}

impl FactOptional {
    pub fn new(fact: Fact) -> Self {
        FactOptional {
            is_fact_negated: false,
            fact,
        }
    }

    pub fn negated(fact: Fact) -> Self {
        FactOptional {
            is_fact_negated: true,
            fact,
        }
    }

    /// A contradiction with any of `facts_opt`: the same fact instance
    /// (modulo the listed quantified parameters) with the opposite polarity,
    /// or a fluent reassigned to a different value.
    pub fn has_a_contradiction_with(
        &self,
        facts_opt: &BTreeSet<FactOptional>,
        parameters: Option<&[Parameter]>,
        is_wrapping_expression_negated: bool,
    ) -> bool {
        let negated = self.is_fact_negated != is_wrapping_expression_negated;
        for other in facts_opt {
            if !self
                .fact
                .equal_without_args_and_value(&other.fact, parameters)
            {
                continue;
            }
            if negated != other.is_fact_negated {
                return true;
            }
            if let (Some(a), Some(b)) = (self.fact.value(), other.fact.value()) {
                if a != b {
                    return true;
                }
            }
        }
        false
    }
}

impl fmt::Display for FactOptional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fact_negated {
            write!(f, "!{}", self.fact)
        } else {
            write!(f, "{}", self.fact)
        }
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
             pred_b\n\
             pred_v(?e - entity) - type1\n\
             counter - number",
            &types,
        )
        .unwrap();
        let mut constants = SetOfEntities::from_pddl(
            "toto - type1\n\
             titi - type2\n\
             v1 - type1",
            &types,
        )
        .unwrap();
        constants.add(Entity::new(
            "v2",
            Some(types.name_to_type("type1").unwrap()),
        ));
        Ontology {
            types,
            predicates,
            constants,
            derived_predicates: Default::default(),
        }
    }

    fn fact(ontology: &Ontology, name: &str, args: &[&str], value: Option<&str>) -> Fact {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Fact::with_parts(
            name,
            &args,
            value,
            false,
            ontology,
            &SetOfEntities::new(),
            &[],
            false,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_arity_and_type_checks() {
        let onto = ontology();
        let err = Fact::with_parts(
            "pred_a",
            &[],
            None,
            false,
            &onto,
            &SetOfEntities::new(),
            &[],
            false,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::ArityMismatch { .. }));

        let err = Fact::with_parts(
            "pred_v",
            &["toto".to_string()],
            None,
            false,
            &onto,
            &SetOfEntities::new(),
            &[],
            false,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::MissingValue(_)));

        let err = Fact::with_parts(
            "pred_b",
            &[],
            Some("toto"),
            false,
            &onto,
            &SetOfEntities::new(),
            &[],
            false,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::UnexpectedValue(_)));

        let err = Fact::with_parts(
            "pred_v",
            &["toto".to_string()],
            Some("titi"),
            false,
            &onto,
            &SetOfEntities::new(),
            &[],
            false,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::TypeMismatch { .. }));
    }

    #[test]
    fn test_parameter_narrows_declared_type() {
        let onto = ontology();
        let param = Parameter::new("?p", onto.types.find("type1"));
        let f = Fact::with_parts(
            "pred_a",
            &["?p".to_string()],
            None,
            false,
            &onto,
            &SetOfEntities::new(),
            &[param],
            false,
            None,
        )
        .unwrap();
        assert_eq!(f.predicate.parameters[0].ty.as_ref().unwrap().name(), "type1");
    }

    #[test]
    fn test_match_refines_parameters() {
        let onto = ontology();
        let param = Parameter::new("?p", onto.types.find("entity"));
        let pattern = Fact::with_parts(
            "pred_a",
            &["?p".to_string()],
            None,
            false,
            &onto,
            &SetOfEntities::new(),
            &[param.clone()],
            false,
            None,
        )
        .unwrap();
        let instance = fact(&onto, "pred_a", &["toto"], None);

        let mut known = ParamValues::new();
        known.declare(param.clone());
        let mut new_params = ParamValues::new();
        let mut new_in_place = ParamValues::new();
        assert!(pattern.is_in_other_fact(
            &instance,
            &mut new_params,
            Some(&known),
            &mut new_in_place,
            None,
        ));
        assert!(new_params.has_value(&param, &Entity::new("toto", onto.types.find("type1"))));
    }

    #[test]
    fn test_value_negation_flips_match() {
        let onto = ontology();
        let mut pattern = fact(&onto, "pred_v", &["toto"], Some("v1"));
        let instance = fact(&onto, "pred_v", &["toto"], Some("v2"));
        let mut np = ParamValues::new();
        let mut nip = ParamValues::new();
        assert!(!pattern.is_in_other_fact(&instance, &mut np, None, &mut nip, None));
        pattern.set_value_negated(true);
        assert!(pattern.is_in_other_fact(&instance, &mut np, None, &mut nip, None));
    }

    #[test]
    fn test_signatures_expand_over_related_types() {
        let onto = ontology();
        let f = fact(&onto, "pred_a", &["toto"], None);
        let mut signatures = Vec::new();
        f.for_each_signature_with_related_types(false, true, &mut |s| signatures.push(s.to_string()));
        assert!(signatures.contains(&"pred_a(type1)".to_string()));
        assert!(signatures.contains(&"pred_a(entity)".to_string()));
    }

    #[test]
    fn test_extract_argument_from_example() {
        let onto = ontology();
        let param = Parameter::new("?p", onto.types.find("entity"));
        let pattern = Fact::with_parts(
            "pred_a",
            &["?p".to_string()],
            None,
            false,
            &onto,
            &SetOfEntities::new(),
            &[param.clone()],
            false,
            None,
        )
        .unwrap();
        let example = fact(&onto, "pred_a", &["titi"], None);
        let extracted = pattern.extract_argument_from_example(&param, &example);
        assert_eq!(extracted.unwrap().value, "titi");
    }

    #[test]
    fn test_complete_with_any_entity_value() {
        let onto = ontology();
        let mut f = fact(&onto, "pred_v", &["toto"], Some("v1"));
        assert!(!f.is_complete_with_any_entity_value());
        f.set_value(Some(Entity::any()));
        assert!(f.is_complete_with_any_entity_value());
    }

    #[test]
    fn test_punctual_prefix() {
        let types = SetOfTypes::from_pddl("");
        let predicates =
            SetOfPredicates::from_str("~punctual~ping\npred_b", &types).unwrap();
        let onto = Ontology {
            types,
            predicates,
            constants: SetOfEntities::new(),
            derived_predicates: Default::default(),
        };
        let f = fact(&onto, "~punctual~ping", &[], None);
        assert!(f.is_punctual());
        assert!(!fact(&onto, "pred_b", &[], None).is_punctual());
    }
}
