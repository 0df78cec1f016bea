use std::collections::{BTreeMap, BTreeSet};

use crate::condition::Condition;
use crate::effect::{ActionId, EventId, FullEventId, WorldStateModification};
use crate::entity::Parameter;
use crate::fact_index::FactOptionalsToId;
use crate::goal::Goal;

/// A reactive rule: fires inside the world-state engine whenever its
/// precondition becomes true. Never scheduled by the planner.
#[derive(Debug, Clone)]
pub struct Event {
    pub parameters: Vec<Parameter>,
    pub precondition: Option<Condition>,
    pub facts_to_modify: Option<WorldStateModification>,
    pub goals_to_add: BTreeMap<i32, Vec<Goal>>,

    pub actions_predecessors_cache: BTreeSet<ActionId>,
    pub events_predecessors_cache: BTreeSet<FullEventId>,
}

impl Event {
    pub fn new(precondition: Condition, facts_to_modify: WorldStateModification) -> Self {
        Event {
            parameters: Vec::new(),
            precondition: Some(precondition),
            facts_to_modify: Some(facts_to_modify),
            goals_to_add: BTreeMap::new(),
            actions_predecessors_cache: BTreeSet::new(),
            events_predecessors_cache: BTreeSet::new(),
        }
    }
}

/// A named group of events, with the precondition index used to wake only
/// the events a changed fact can concern.
#[derive(Debug, Clone, Default)]
pub struct SetOfEvents {
    events: BTreeMap<EventId, Event>,
    reachable_event_links: FactOptionalsToId,
    next_id: usize,
}

impl SetOfEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: Event) -> EventId {
        let id = format!("event_{}", self.next_id);
        self.next_id += 1;
        self.add_with_id(id, event)
    }

    pub fn add_with_id(&mut self, id: EventId, event: Event) -> EventId {
        let mut candidate = id;
        while self.events.contains_key(&candidate) {
            candidate = format!("{}_{}", candidate, self.next_id);
            self.next_id += 1;
        }
        if let Some(precondition) = &event.precondition {
            self.reachable_event_links
                .add_condition(precondition, &candidate);
        }
        self.events.insert(candidate.clone(), event);
        candidate
    }

    pub fn events(&self) -> &BTreeMap<EventId, Event> {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut BTreeMap<EventId, Event> {
        &mut self.events
    }

    pub fn reachable_event_links(&self) -> &FactOptionalsToId {
        &self.reachable_event_links
    }

    pub fn rebuild_reachable_links(&mut self) {
        self.reachable_event_links = FactOptionalsToId::new();
        for (id, event) in &self.events {
            if let Some(precondition) = &event.precondition {
                self.reachable_event_links.add_condition(precondition, id);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
