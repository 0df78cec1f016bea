use std::collections::BTreeMap;

use criterion::{criterion_group, criterion_main, Criterion};

use planweave_core::{
    parse_condition, parse_effect, parse_goal, Action, Domain, Ontology, Parameter, Problem,
    SetOfCallbacks, SetOfEntities, SetOfPredicates, SetOfTypes, DEFAULT_PRIORITY,
};
use planweave_planner::plan_for_every_goals;

fn build_navigation_domain() -> Domain {
    let types = SetOfTypes::from_pddl("location\nrobot");
    let constants = SetOfEntities::from_pddl(
        "me - robot\n\
         loc0 loc1 loc2 loc3 loc4 loc5 loc6 loc7 - location",
        &types,
    )
    .unwrap();
    let predicates = SetOfPredicates::from_str(
        "locationOfRobot(?r - robot) - location\n\
         visited(?l - location)",
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
    let nav_parameters = vec![Parameter::from_str("?target - location", &ontology.types).unwrap()];
    let mut navigate = Action::new(
        None,
        Some(
            parse_effect(
                "locationOfRobot(me)=?target",
                &ontology,
                &no_objects,
                &nav_parameters,
            )
            .unwrap(),
        ),
    );
    navigate.parameters = nav_parameters;
    actions.insert("navigate".to_string(), navigate);

    let visit_parameters = vec![Parameter::from_str("?place - location", &ontology.types).unwrap()];
    let mut visit = Action::new(
        Some(
            parse_condition(
                "locationOfRobot(me)=?place",
                &ontology,
                &no_objects,
                &visit_parameters,
            )
            .unwrap(),
        ),
        Some(parse_effect("visited(?place)", &ontology, &no_objects, &visit_parameters).unwrap()),
    );
    visit.parameters = visit_parameters;
    actions.insert("visit".to_string(), visit);

    Domain::new(actions, ontology).unwrap()
}

fn bench_plan_for_every_goals(c: &mut Criterion) {
    let domain = build_navigation_domain();
    let callbacks = SetOfCallbacks::new();

    c.bench_function("plan_visit_goal", |b| {
        b.iter(|| {
            let mut problem = Problem::new();
            problem.goal_stack.set_goals(
                vec![parse_goal("visited(loc5)", domain.ontology(), &problem.objects).unwrap()],
                DEFAULT_PRIORITY,
            );
            let plan =
                plan_for_every_goals(&mut problem, &domain, &callbacks, None, None, None).unwrap();
            assert!(!plan.is_empty());
            plan
        })
    });
}

criterion_group!(benches, bench_plan_for_every_goals);
criterion_main!(benches);
