use std::collections::{BTreeMap, BTreeSet};

use planweave_core::{
    parse_condition, parse_effect, parse_goal, Action, Domain, Event, Fact, ModificationParams,
    Ontology, PlanError, Problem, SetOfCallbacks, SetOfConstFacts, SetOfEntities, SetOfEvents,
    SetOfPredicates, SetOfTypes, DEFAULT_PRIORITY,
};
use planweave_planner::{
    notify_action_done, notify_action_started, plan_for_more_important_goal_possible,
};

fn look_for_an_action_to_do_then_notify(problem: &mut Problem, domain: &Domain) -> String {
    let callbacks = SetOfCallbacks::new();
    let plan =
        plan_for_more_important_goal_possible(problem, domain, &callbacks, true, None, None, None)
            .unwrap();
    match plan.first() {
        Some(step) => {
            notify_action_started(problem, domain, &callbacks, step, None).unwrap();
            notify_action_done(problem, domain, &callbacks, step, None, None).unwrap();
            step.action_invocation.to_str()
        }
        None => String::new(),
    }
}

fn simple_ontology() -> Ontology {
    let types = SetOfTypes::from_pddl("");
    let predicates = SetOfPredicates::from_str(
        "fact_a - number\n\
         fact_b\n\
         fact_c",
        &types,
    )
    .unwrap();
    Ontology {
        types,
        predicates,
        constants: SetOfEntities::new(),
        derived_predicates: Default::default(),
    }
}

#[test]
fn test_requirement_whitelist() {
    let mut domain = Domain::new(BTreeMap::new(), simple_ontology()).unwrap();
    domain.add_requirement(":strips").unwrap();
    domain.add_requirement(":ordered-goals").unwrap();
    domain.add_requirement(":durative-actions").unwrap();
    assert_eq!(3, domain.requirements().len());

    let err = domain.add_requirement(":time-travel").unwrap_err();
    assert!(matches!(err, PlanError::UnknownRequirement(_)));
}

#[test]
fn test_event_set_registration_changes_the_revision() {
    let ontology = simple_ontology();
    let no_objects = SetOfEntities::new();
    let event = Event::new(
        parse_condition("fact_b", &ontology, &no_objects, &[]).unwrap(),
        parse_effect("fact_c", &ontology, &no_objects, &[]).unwrap(),
    );

    let mut domain = Domain::new(BTreeMap::new(), ontology).unwrap();
    let revision_0 = domain.uuid();

    let mut set_of_events = SetOfEvents::new();
    set_of_events.add(event);
    let set_of_events_id = domain.add_set_of_events(set_of_events, "soe").unwrap();
    let revision_1 = domain.uuid();
    assert_ne!(revision_0, revision_1);
    assert!(domain.set_of_events().contains_key(&set_of_events_id));

    domain.remove_set_of_events(&set_of_events_id).unwrap();
    assert_ne!(revision_1, domain.uuid());
    assert!(domain.set_of_events().is_empty());

    // A second registration under the same suggested id gets a fresh id.
    let mut set_of_events = SetOfEvents::new();
    set_of_events.add(Event::new(
        parse_condition("fact_b", domain.ontology(), &no_objects, &[]).unwrap(),
        parse_effect("fact_c", domain.ontology(), &no_objects, &[]).unwrap(),
    ));
    domain.add_set_of_events(set_of_events, "soe").unwrap();
    let mut set_of_events = SetOfEvents::new();
    set_of_events.add(Event::new(
        parse_condition("fact_c", domain.ontology(), &no_objects, &[]).unwrap(),
        parse_effect("fact_b", domain.ontology(), &no_objects, &[]).unwrap(),
    ));
    let second_id = domain.add_set_of_events(set_of_events, "soe").unwrap();
    assert_ne!("soe", second_id);

    domain.clear_events().unwrap();
    assert!(domain.set_of_events().is_empty());
}

#[test]
fn test_remove_action_changes_the_revision() {
    let ontology = simple_ontology();
    let no_objects = SetOfEntities::new();
    let mut actions = BTreeMap::new();
    actions.insert(
        "action_b".to_string(),
        Action::new(
            None,
            Some(parse_effect("fact_b", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    let mut domain = Domain::new(actions, ontology).unwrap();
    let revision_before = domain.uuid();

    domain.remove_action("action_b").unwrap();
    assert_ne!(revision_before, domain.uuid());
    assert!(domain.get_action("action_b").is_none());
}

#[test]
fn test_satisfy_goal_with_superior_operator() {
    let ontology = simple_ontology();
    let no_objects = SetOfEntities::new();

    let mut timeless_facts = SetOfConstFacts::new();
    timeless_facts.add(Fact::from_str("fact_b", &ontology, &no_objects, &[]).unwrap());

    let mut actions = BTreeMap::new();
    actions.insert(
        "action1".to_string(),
        Action::new(
            Some(parse_condition("fact_b", &ontology, &no_objects, &[]).unwrap()),
            Some(parse_effect("fact_a=100", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    let domain = Domain::full(
        actions,
        ontology,
        SetOfEvents::new(),
        BTreeMap::new(),
        timeless_facts,
        "superior_domain".to_string(),
    )
    .unwrap();

    let mut problem = Problem::from_domain(&domain);
    {
        let callbacks = SetOfCallbacks::new();
        let objects_snapshot = problem.objects.clone();
        let fact = Fact::from_str("fact_a=10", domain.ontology(), &objects_snapshot, &[]).unwrap();
        let Problem {
            world_state,
            goal_stack,
            objects,
            ..
        } = &mut problem;
        let params = ModificationParams {
            set_of_events: domain.set_of_events(),
            callbacks: &callbacks,
            ontology: domain.ontology(),
            objects,
            now: None,
        };
        world_state
            .add_fact(&fact, goal_stack, &params, true)
            .unwrap();
    }
    problem.goal_stack.set_goals(
        vec![parse_goal("fact_a>50", domain.ontology(), &problem.objects).unwrap()],
        DEFAULT_PRIORITY,
    );

    assert_eq!(
        "action1",
        look_for_an_action_to_do_then_notify(&mut problem, &domain)
    );
    // The goal holds now: nothing more to do.
    assert_eq!(
        "",
        look_for_an_action_to_do_then_notify(&mut problem, &domain)
    );
}

#[test]
fn test_modify_facts_from_pddl_and_set_facts() {
    let types = SetOfTypes::from_pddl("type1 type2 - entity");
    let predicates = SetOfPredicates::from_str(
        "pred_a(?e - entity)\n\
         pred_b\n\
         pred_d(?t2 - type2) - number",
        &types,
    )
    .unwrap();
    let constants = SetOfEntities::from_pddl("toto - type1\ntiti - type2", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants,
        derived_predicates: Default::default(),
    };
    let domain = Domain::new(BTreeMap::new(), ontology).unwrap();

    let mut problem = Problem::new();
    let callbacks = SetOfCallbacks::new();
    {
        let Problem {
            world_state,
            goal_stack,
            objects,
            ..
        } = &mut problem;
        let params = ModificationParams {
            set_of_events: domain.set_of_events(),
            callbacks: &callbacks,
            ontology: domain.ontology(),
            objects,
            now: None,
        };
        world_state
            .modify_facts_from_pddl(
                "(pred_a toto)\n(pred_b)\n(= (pred_d titi) 4)",
                goal_stack,
                &params,
                true,
            )
            .unwrap();
        assert_eq!(3, world_state.facts().len());

        world_state
            .modify_facts_from_pddl(
                "(not (pred_a toto))\n(= (pred_d titi) undefined)",
                goal_stack,
                &params,
                true,
            )
            .unwrap();
        assert_eq!(1, world_state.facts().len());

        let objects_snapshot = SetOfEntities::new();
        let mut replacement = BTreeSet::new();
        replacement.insert(
            Fact::from_str("pred_a(toto)", domain.ontology(), &objects_snapshot, &[]).unwrap(),
        );
        world_state
            .set_facts(replacement, goal_stack, &params)
            .unwrap();
        assert_eq!(1, world_state.facts().len());
        assert!(world_state.has_fact(
            &Fact::from_str("pred_a(toto)", domain.ontology(), &objects_snapshot, &[]).unwrap()
        ));
    }
}

#[test]
fn test_action_negating_a_timeless_fact_is_unusable() {
    let ontology = simple_ontology();
    let no_objects = SetOfEntities::new();

    let mut timeless_facts = SetOfConstFacts::new();
    timeless_facts.add(Fact::from_str("fact_b", &ontology, &no_objects, &[]).unwrap());

    let mut actions = BTreeMap::new();
    actions.insert(
        "impossible".to_string(),
        Action::new(
            Some(parse_condition("!fact_b", &ontology, &no_objects, &[]).unwrap()),
            Some(parse_effect("fact_c", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    let domain = Domain::full(
        actions,
        ontology,
        SetOfEvents::new(),
        BTreeMap::new(),
        timeless_facts,
        String::new(),
    )
    .unwrap();
    assert!(!domain.get_action("impossible").unwrap().can_be_used_by_planner);
}
