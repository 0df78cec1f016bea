//! Core model of the planweave ordered-goals planner: the typed ontology,
//! the indexed fact store, condition and effect trees, and the world-state
//! engine with its event cascade. The backward-chaining search lives in
//! `planweave-planner`.

pub mod action;
pub mod bindings;
pub mod callbacks;
pub mod condition;
pub mod domain;
pub mod effect;
pub mod entity;
pub mod error;
pub mod event;
pub mod expression;
pub mod fact;
pub mod fact_index;
pub mod goal;
pub mod goal_stack;
pub mod number;
pub mod ontology;
pub mod parse;
pub mod predicate;
pub mod problem;
pub mod set_of_facts;
pub mod types;
pub mod world_state;

pub use action::{Action, ProblemModification};
pub use bindings::{EntityConstraints, ParamValues};
pub use callbacks::{CallbackId, ConditionToCallback, SetOfCallbacks, Signal};
pub use condition::{Condition, ConditionOp, SetOfDerivedPredicates};
pub use domain::Domain;
pub use effect::{
    generate_full_event_id, ActionId, ContainerId, EventId, FullEventId, SetOfEventsId,
    Successions, WorldStateModification, WsModOp,
};
pub use entity::{
    type_to_entities, Entity, Parameter, SetOfEntities, ANY_ENTITY_VALUE, UNDEFINED_VALUE,
};
pub use error::{PlanError, Result};
pub use event::{Event, SetOfEvents};
pub use expression::Expression;
pub use fact::{Fact, FactOptional, PUNCTUAL_PREFIX};
pub use fact_index::FactOptionalsToId;
pub use goal::Goal;
pub use goal_stack::{GoalStack, LookForAnActionOutputInfos, DEFAULT_PRIORITY};
pub use number::{is_number, Number};
pub use ontology::Ontology;
pub use parse::{
    parse_condition, parse_effect, parse_fact, parse_goal, parse_pddl_facts, pddl_to_condition,
    pddl_to_effect,
};
pub use predicate::{Predicate, SetOfPredicates};
pub use problem::{Historical, Problem};
pub use set_of_facts::{Delta, SetOfConstFacts, SetOfFacts};
pub use types::{SetOfTypes, Type, NUMBER_TYPE_NAME};
pub use world_state::{ModificationParams, WhatChanged, WorldState};
