use std::collections::BTreeMap;

use planweave_core::{
    parse_condition, parse_effect, parse_goal, Action, Domain, Event, Fact, Goal,
    ModificationParams, Ontology, Parameter, Problem, ProblemModification, SetOfCallbacks,
    SetOfEntities, SetOfEvents, SetOfPredicates, SetOfTypes, DEFAULT_PRIORITY,
};
use planweave_planner::{plan_for_every_goals, plan_for_more_important_goal_possible, plan_to_str};

fn set_goals_for_a_priority(problem: &mut Problem, goals: Vec<Goal>) {
    problem.goal_stack.set_goals(goals, DEFAULT_PRIORITY);
}

fn add_fact(problem: &mut Problem, domain: &Domain, fact_str: &str) {
    let callbacks = SetOfCallbacks::new();
    let objects_snapshot = problem.objects.clone();
    let fact = Fact::from_str(fact_str, domain.ontology(), &objects_snapshot, &[]).unwrap();
    let Problem {
        world_state,
        goal_stack,
        objects,
        ..
    } = problem;
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

fn apply_modification(problem: &mut Problem, domain: &Domain, modification_str: &str) {
    let callbacks = SetOfCallbacks::new();
    let objects_snapshot = problem.objects.clone();
    let modification =
        parse_effect(modification_str, domain.ontology(), &objects_snapshot, &[]).unwrap();
    let Problem {
        world_state,
        goal_stack,
        objects,
        ..
    } = problem;
    let params = ModificationParams {
        set_of_events: domain.set_of_events(),
        callbacks: &callbacks,
        ontology: domain.ontology(),
        objects,
        now: None,
    };
    world_state
        .modify(Some(&modification), goal_stack, &params, true)
        .unwrap();
}

fn look_for_an_action_to_do(problem: &mut Problem, domain: &Domain) -> String {
    let callbacks = SetOfCallbacks::new();
    let plan =
        plan_for_more_important_goal_possible(problem, domain, &callbacks, true, None, None, None)
            .unwrap();
    plan.first()
        .map(|step| step.action_invocation.to_str())
        .unwrap_or_default()
}

fn goal(domain: &Domain, goal_str: &str) -> Goal {
    parse_goal(goal_str, domain.ontology(), &SetOfEntities::new()).unwrap()
}

// ----------------------------------------------------------------------
// Seed scenarios
// ----------------------------------------------------------------------

#[test]
fn test_simplest_plan_possible() {
    let types = SetOfTypes::from_pddl("type1 type2 - entity");
    let constants = SetOfEntities::from_pddl("toto - type1\ntiti - type2", &types).unwrap();
    let predicates = SetOfPredicates::from_str("pred_a(?e - entity)\npred_b", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants,
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let parameters = vec![Parameter::from_str("?pa - type1", &ontology.types).unwrap()];
    let mut action1 = Action::new(
        Some(parse_condition("pred_a(?pa)", &ontology, &no_objects, &parameters).unwrap()),
        Some(parse_effect("pred_b", &ontology, &no_objects, &parameters).unwrap()),
    );
    action1.parameters = parameters;
    let mut actions = BTreeMap::new();
    actions.insert("action1".to_string(), action1);
    let domain = Domain::new(actions, ontology).unwrap();

    let mut problem = Problem::new();
    set_goals_for_a_priority(&mut problem, vec![goal(&domain, "pred_b")]);
    add_fact(&mut problem, &domain, "pred_a(toto)");

    assert_eq!(
        "action1(?pa -> toto)",
        look_for_an_action_to_do(&mut problem, &domain)
    );
}

#[test]
fn test_wrong_condition_type() {
    let types = SetOfTypes::from_pddl("entity\ntype1 - entity\ntype2 - entity");
    let constants = SetOfEntities::from_pddl("toto - type1\ntiti - type2", &types).unwrap();
    let predicates = SetOfPredicates::from_str("pred_a(?e - entity)\npred_b", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants,
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let parameters = vec![Parameter::from_str("?pa - type1", &ontology.types).unwrap()];
    let mut action1 = Action::new(
        Some(parse_condition("pred_a(?pa)", &ontology, &no_objects, &parameters).unwrap()),
        Some(parse_effect("pred_b", &ontology, &no_objects, &parameters).unwrap()),
    );
    action1.parameters = parameters;
    let mut actions = BTreeMap::new();
    actions.insert("action1".to_string(), action1);
    let domain = Domain::new(actions, ontology).unwrap();

    let mut problem = Problem::new();
    set_goals_for_a_priority(&mut problem, vec![goal(&domain, "pred_b")]);
    // titi is a type2: not acceptable for action1's ?pa - type1 parameter.
    add_fact(&mut problem, &domain, "pred_a(titi)");

    assert_eq!("", look_for_an_action_to_do(&mut problem, &domain));
}

#[test]
fn test_increment_loop_with_event() {
    let types = SetOfTypes::from_pddl("");
    let predicates = SetOfPredicates::from_str(
        "numberOfQuestion - number\n\
         maxNumberOfQuestions - number\n\
         ask_all_the_questions\n\
         finished_to_ask_questions",
        &types,
    )
    .unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants: SetOfEntities::new(),
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let mut question_effect = ProblemModification::new(Some(
        parse_effect("add(numberOfQuestion, 1)", &ontology, &no_objects, &[]).unwrap(),
    ));
    question_effect.potential_world_state_modification =
        Some(parse_effect("ask_all_the_questions", &ontology, &no_objects, &[]).unwrap());

    let mut ask_question_1 = Action::new(None, None);
    ask_question_1.effect = question_effect.clone();
    let mut ask_question_2 = Action::new(None, None);
    ask_question_2.effect = question_effect;
    let say_question_bilan = Action::new(
        Some(parse_condition("ask_all_the_questions", &ontology, &no_objects, &[]).unwrap()),
        Some(parse_effect("finished_to_ask_questions", &ontology, &no_objects, &[]).unwrap()),
    );

    let mut actions = BTreeMap::new();
    actions.insert("ask_question_1".to_string(), ask_question_1);
    actions.insert("ask_question_2".to_string(), ask_question_2);
    actions.insert("say_question_bilan".to_string(), say_question_bilan);

    let mut set_of_events = SetOfEvents::new();
    set_of_events.add(Event::new(
        parse_condition(
            "equals(numberOfQuestion, maxNumberOfQuestions)",
            &ontology,
            &no_objects,
            &[],
        )
        .unwrap(),
        parse_effect("ask_all_the_questions", &ontology, &no_objects, &[]).unwrap(),
    ));
    let domain = Domain::with_events(actions, ontology, set_of_events).unwrap();

    let mut problem = Problem::new();
    set_goals_for_a_priority(
        &mut problem,
        vec![goal(&domain, "finished_to_ask_questions")],
    );
    apply_modification(
        &mut problem,
        &domain,
        "numberOfQuestion=0 & maxNumberOfQuestions=3",
    );

    let mut actions_done = Vec::new();
    for i in 0..3 {
        let action_to_do = look_for_an_action_to_do(&mut problem, &domain);
        if i == 1 {
            assert_eq!("ask_question_2", action_to_do);
        } else {
            assert_eq!("ask_question_1", action_to_do);
        }
        problem.historical.notify_action_done(&action_to_do);
        apply_modification(&mut problem, &domain, "add(numberOfQuestion, 1)");
        actions_done.push(action_to_do);
    }
    // The quantified event fired at numberOfQuestion = maxNumberOfQuestions.
    let objects_snapshot = problem.objects.clone();
    assert!(problem.world_state.has_fact(
        &Fact::from_str(
            "ask_all_the_questions",
            domain.ontology(),
            &objects_snapshot,
            &[]
        )
        .unwrap()
    ));

    let final_action = look_for_an_action_to_do(&mut problem, &domain);
    assert_eq!("say_question_bilan", final_action);
    actions_done.push(final_action);
    assert_eq!(4, actions_done.len());
}

fn build_grab_domain() -> Domain {
    let types = SetOfTypes::from_pddl("location\nobject\nrobot");
    let constants = SetOfEntities::from_pddl(
        "me - robot\n\
         obj1 obj2 - object\n\
         livingRoom kitchen bedroom - location",
        &types,
    )
    .unwrap();
    let predicates = SetOfPredicates::from_str(
        "objectGrabable(?o - object)\n\
         locationOfRobot(?r - robot) - location\n\
         locationOfObject(?o - object) - location\n\
         grab(?r - robot) - object",
        &types,
    )
    .unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants,
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let mut actions = BTreeMap::new();

    let nav_parameters =
        vec![Parameter::from_str("?targetPlace - location", &ontology.types).unwrap()];
    let mut nav_action = Action::new(
        None,
        Some(
            parse_effect(
                "locationOfRobot(me)=?targetPlace",
                &ontology,
                &no_objects,
                &nav_parameters,
            )
            .unwrap(),
        ),
    );
    nav_action.parameters = nav_parameters;
    actions.insert("navigate".to_string(), nav_action);

    let grab_parameters = vec![Parameter::from_str("?object - object", &ontology.types).unwrap()];
    let mut grab_action = Action::new(
        Some(
            parse_condition(
                "equals(locationOfRobot(me), locationOfObject(?object)) & !grab(me)=*",
                &ontology,
                &no_objects,
                &grab_parameters,
            )
            .unwrap(),
        ),
        Some(parse_effect("grab(me)=?object", &ontology, &no_objects, &grab_parameters).unwrap()),
    );
    grab_action.parameters = grab_parameters;
    actions.insert("grab".to_string(), grab_action);

    let ungrab_parameters =
        vec![Parameter::from_str("?object - object", &ontology.types).unwrap()];
    let mut ungrab_action = Action::new(
        None,
        Some(
            parse_effect(
                "!grab(me)=?object",
                &ontology,
                &no_objects,
                &ungrab_parameters,
            )
            .unwrap(),
        ),
    );
    ungrab_action.parameters = ungrab_parameters;
    actions.insert("ungrab".to_string(), ungrab_action);

    let mut set_of_events = SetOfEvents::new();
    let event_parameters = vec![
        Parameter::from_str("?object - object", &ontology.types).unwrap(),
        Parameter::from_str("?location - location", &ontology.types).unwrap(),
    ];
    let mut event = Event::new(
        parse_condition(
            "locationOfRobot(me)=?location & grab(me)=?object & objectGrabable(?object)",
            &ontology,
            &no_objects,
            &event_parameters,
        )
        .unwrap(),
        parse_effect(
            "locationOfObject(?object)=?location",
            &ontology,
            &no_objects,
            &event_parameters,
        )
        .unwrap(),
    );
    event.parameters = event_parameters;
    set_of_events.add(event);

    Domain::with_events(actions, ontology, set_of_events).unwrap()
}

#[test]
fn test_next_action_that_brings_to_the_smaller_cost() {
    let domain = build_grab_domain();

    let mut problem = Problem::new();
    add_fact(&mut problem, &domain, "objectGrabable(obj1)");
    add_fact(&mut problem, &domain, "objectGrabable(obj2)");
    add_fact(&mut problem, &domain, "locationOfRobot(me)=livingRoom");
    add_fact(&mut problem, &domain, "grab(me)=obj2");
    add_fact(&mut problem, &domain, "locationOfObject(obj2)=livingRoom");
    add_fact(&mut problem, &domain, "locationOfObject(obj1)=kitchen");

    // The second goal stays satisfied only if obj2 is dropped before moving:
    // the lookahead makes the ungrab come first.
    set_goals_for_a_priority(
        &mut problem,
        vec![
            goal(
                &domain,
                "locationOfObject(obj1)=bedroom & !grab(me)=obj1",
            ),
            goal(
                &domain,
                "locationOfObject(obj2)=livingRoom & !grab(me)=obj2",
            ),
        ],
    );

    let callbacks = SetOfCallbacks::new();
    let plan =
        plan_for_every_goals(&mut problem, &domain, &callbacks, None, None, None).unwrap();
    assert_eq!(
        "ungrab(?object -> obj2)\n\
         navigate(?targetPlace -> kitchen)\n\
         grab(?object -> obj1)\n\
         navigate(?targetPlace -> bedroom)\n\
         ungrab(?object -> obj1)",
        plan_to_str(&plan, "\n")
    );
}

#[test]
fn test_existential_goal() {
    let types = SetOfTypes::from_pddl("location\nphysical_object");
    let constants = SetOfEntities::from_pddl(
        "self pen - physical_object\n\
         livingroom kitchen - location",
        &types,
    )
    .unwrap();
    let predicates =
        SetOfPredicates::from_str("at(?o - physical_object) - location", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants,
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let goto_parameters = vec![Parameter::from_str("?loc - location", &ontology.types).unwrap()];
    let mut goto_action = Action::new(
        None,
        Some(parse_effect("at(self)=?loc", &ontology, &no_objects, &goto_parameters).unwrap()),
    );
    goto_action.parameters = goto_parameters;
    let mut actions = BTreeMap::new();
    actions.insert("goto".to_string(), goto_action);
    let domain = Domain::new(actions, ontology).unwrap();

    let mut problem = Problem::new();
    add_fact(&mut problem, &domain, "at(pen)=livingroom");
    set_goals_for_a_priority(
        &mut problem,
        vec![goal(
            &domain,
            "exists(?l - location, at(self)=?l & at(pen)=?l)",
        )],
    );

    assert_eq!(
        "goto(?loc -> livingroom)",
        look_for_an_action_to_do(&mut problem, &domain)
    );
}

#[test]
fn test_fluent_undefinition() {
    let types = SetOfTypes::from_pddl("entity\nrtype");
    let constants = SetOfEntities::from_pddl("v - entity\nr1 - rtype", &types).unwrap();
    let predicates = SetOfPredicates::from_str("f(?e - entity) - rtype", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants,
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let forget = Action::new(
        None,
        Some(parse_effect("assign(f(v), undefined)", &ontology, &no_objects, &[]).unwrap()),
    );
    let mut actions = BTreeMap::new();
    actions.insert("forget".to_string(), forget);
    let domain = Domain::new(actions, ontology).unwrap();

    let mut problem = Problem::new();
    add_fact(&mut problem, &domain, "f(v)=r1");
    set_goals_for_a_priority(&mut problem, vec![goal(&domain, "=(f(v), undefined)")]);

    let callbacks = SetOfCallbacks::new();
    let plan =
        plan_for_every_goals(&mut problem, &domain, &callbacks, None, None, None).unwrap();
    assert_eq!("forget", plan_to_str(&plan, ", "));
    assert!(problem
        .world_state
        .facts()
        .keys()
        .all(|fact| fact.name() != "f"));
}

// ----------------------------------------------------------------------
// Testable properties
// ----------------------------------------------------------------------

#[test]
fn test_priority_monotonicity() {
    let types = SetOfTypes::from_pddl("");
    let predicates = SetOfPredicates::from_str("pred_hi\npred_lo", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants: SetOfEntities::new(),
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let mut actions = BTreeMap::new();
    actions.insert(
        "action_hi".to_string(),
        Action::new(
            None,
            Some(parse_effect("pred_hi", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    actions.insert(
        "action_lo".to_string(),
        Action::new(
            None,
            Some(parse_effect("pred_lo", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    let domain = Domain::new(actions, ontology).unwrap();

    let mut problem = Problem::new();
    problem
        .goal_stack
        .push_goal(goal(&domain, "pred_lo"), 10);
    problem
        .goal_stack
        .push_goal(goal(&domain, "pred_hi"), 20);

    let callbacks = SetOfCallbacks::new();
    let plan =
        plan_for_every_goals(&mut problem, &domain, &callbacks, None, None, None).unwrap();
    assert_eq!("action_hi, action_lo", plan_to_str(&plan, ", "));
}

#[test]
fn test_domain_revision_invalidates_goal_caches() {
    let types = SetOfTypes::from_pddl("");
    let predicates = SetOfPredicates::from_str("pred_a\npred_b", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants: SetOfEntities::new(),
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let mut actions = BTreeMap::new();
    actions.insert(
        "action_a".to_string(),
        Action::new(
            None,
            Some(parse_effect("pred_a", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    let effect_b = parse_effect("pred_b", &ontology, &no_objects, &[]).unwrap();
    let mut domain = Domain::new(actions, ontology).unwrap();
    let revision_before = domain.uuid();

    let mut problem = Problem::new();
    set_goals_for_a_priority(&mut problem, vec![goal(&domain, "persist(pred_b)")]);
    assert_eq!("", look_for_an_action_to_do(&mut problem, &domain));

    domain
        .add_action("action_b", Action::new(None, Some(effect_b)))
        .unwrap();
    assert_ne!(revision_before, domain.uuid());
    assert_eq!("action_b", look_for_an_action_to_do(&mut problem, &domain));
}

#[test]
fn test_lookahead_does_not_mutate_the_caller_problem() {
    let domain = build_grab_domain();

    let mut problem = Problem::new();
    add_fact(&mut problem, &domain, "objectGrabable(obj1)");
    add_fact(&mut problem, &domain, "locationOfRobot(me)=livingRoom");
    add_fact(&mut problem, &domain, "locationOfObject(obj1)=kitchen");
    set_goals_for_a_priority(
        &mut problem,
        vec![goal(
            &domain,
            "locationOfObject(obj1)=bedroom & !grab(me)=obj1",
        )],
    );

    let facts_before = problem.world_state.facts().clone();
    let nb_of_goals_before: usize = problem.goal_stack.goals().values().map(Vec::len).sum();

    let first = look_for_an_action_to_do(&mut problem, &domain);
    assert!(!first.is_empty());

    assert_eq!(&facts_before, problem.world_state.facts());
    let nb_of_goals_after: usize = problem.goal_stack.goals().values().map(Vec::len).sum();
    assert_eq!(nb_of_goals_before, nb_of_goals_after);
}

#[test]
fn test_add_fact_is_idempotent_and_events_converge() {
    let types = SetOfTypes::from_pddl("");
    let predicates = SetOfPredicates::from_str(
        "counter - number\nlimit - number\nreached",
        &types,
    )
    .unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants: SetOfEntities::new(),
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let mut actions = BTreeMap::new();
    actions.insert(
        "noop".to_string(),
        Action::new(
            None,
            Some(parse_effect("reached", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    let mut set_of_events = SetOfEvents::new();
    set_of_events.add(Event::new(
        parse_condition("equals(counter, limit)", &ontology, &no_objects, &[]).unwrap(),
        parse_effect("reached", &ontology, &no_objects, &[]).unwrap(),
    ));
    let domain = Domain::with_events(actions, ontology, set_of_events).unwrap();

    let mut problem = Problem::new();
    apply_modification(&mut problem, &domain, "limit=2 & counter=2");

    let objects_snapshot = problem.objects.clone();
    let reached = Fact::from_str("reached", domain.ontology(), &objects_snapshot, &[]).unwrap();
    assert!(problem.world_state.has_fact(&reached));

    let facts_after_cascade = problem.world_state.facts().clone();
    // Re-adding an already stored fact changes nothing.
    add_fact(&mut problem, &domain, "counter=2");
    assert_eq!(&facts_after_cascade, problem.world_state.facts());
    add_fact(&mut problem, &domain, "reached");
    assert_eq!(&facts_after_cascade, problem.world_state.facts());
}

#[test]
fn test_fluent_assignment_displaces_the_old_value() {
    let types = SetOfTypes::from_pddl("entity\nvalue_type");
    let constants =
        SetOfEntities::from_pddl("x - entity\nv w - value_type", &types).unwrap();
    let predicates = SetOfPredicates::from_str("f(?e - entity) - value_type", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants,
        derived_predicates: Default::default(),
    };

    let domain = Domain::new(BTreeMap::new(), ontology).unwrap();
    let mut problem = Problem::new();
    add_fact(&mut problem, &domain, "f(x)=w");
    add_fact(&mut problem, &domain, "f(x)=v");

    let objects_snapshot = problem.objects.clone();
    let new_value = Fact::from_str("f(x)=v", domain.ontology(), &objects_snapshot, &[]).unwrap();
    let old_value = Fact::from_str("f(x)=w", domain.ontology(), &objects_snapshot, &[]).unwrap();
    assert!(problem.world_state.has_fact(&new_value));
    assert!(!problem.world_state.has_fact(&old_value));
    assert_eq!(1, problem.world_state.facts().len());
}

#[test]
fn test_goal_left_in_place_when_persistent_and_unreachable() {
    let types = SetOfTypes::from_pddl("");
    let predicates = SetOfPredicates::from_str("pred_a\npred_b", &types).unwrap();
    let ontology = Ontology {
        types,
        predicates,
        constants: SetOfEntities::new(),
        derived_predicates: Default::default(),
    };
    let no_objects = SetOfEntities::new();

    let mut actions = BTreeMap::new();
    actions.insert(
        "action_a".to_string(),
        Action::new(
            None,
            Some(parse_effect("pred_a", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    let domain = Domain::new(actions, ontology).unwrap();

    let mut problem = Problem::new();
    set_goals_for_a_priority(
        &mut problem,
        vec![
            goal(&domain, "persist(pred_b)"),
            goal(&domain, "pred_a"),
        ],
    );

    let callbacks = SetOfCallbacks::new();
    let plan =
        plan_for_every_goals(&mut problem, &domain, &callbacks, None, None, None).unwrap();
    // The unreachable persistent goal is skipped but kept; the reachable one
    // is planned.
    assert_eq!("action_a", plan_to_str(&plan, ", "));
    let remaining: usize = problem.goal_stack.goals().values().map(Vec::len).sum();
    assert_eq!(1, remaining);
}

#[test]
fn test_plan_is_sound_when_replayed() {
    let domain = build_grab_domain();

    let mut problem = Problem::new();
    add_fact(&mut problem, &domain, "objectGrabable(obj1)");
    add_fact(&mut problem, &domain, "locationOfRobot(me)=livingRoom");
    add_fact(&mut problem, &domain, "locationOfObject(obj1)=kitchen");
    set_goals_for_a_priority(
        &mut problem,
        vec![goal(
            &domain,
            "locationOfObject(obj1)=bedroom & !grab(me)=obj1",
        )],
    );

    let mut replay_problem = problem.clone();
    replay_problem.goal_stack.set_goals(Vec::new(), DEFAULT_PRIORITY);

    let callbacks = SetOfCallbacks::new();
    let mut goals_done = Vec::new();
    let plan = plan_for_every_goals(
        &mut problem,
        &domain,
        &callbacks,
        None,
        None,
        Some(&mut goals_done),
    )
    .unwrap();
    assert!(!plan.is_empty());
    assert_eq!(1, goals_done.len());

    // Replaying the plan step by step on a fresh copy reaches the goal.
    for step in &plan {
        let action = domain
            .get_action(&step.action_invocation.action_id)
            .unwrap()
            .clone();
        let grounded = action
            .effect
            .world_state_modification
            .as_ref()
            .map(|m| m.clone_with(Some(&step.action_invocation.parameters)));
        let Problem {
            world_state,
            goal_stack,
            objects,
            ..
        } = &mut replay_problem;
        let params = ModificationParams {
            set_of_events: domain.set_of_events(),
            callbacks: &callbacks,
            ontology: domain.ontology(),
            objects,
            now: None,
        };
        world_state
            .modify(grounded.as_ref(), goal_stack, &params, true)
            .unwrap();
    }
    let replayed_goal = goal(
        &domain,
        "locationOfObject(obj1)=bedroom & !grab(me)=obj1",
    );
    assert!(replay_problem.world_state.is_goal_satisfied(
        &replayed_goal,
        &domain.ontology().constants,
        &replay_problem.objects
    ));
}
