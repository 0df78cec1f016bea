use std::collections::BTreeMap;
use std::fmt;

use crate::condition::Condition;
use crate::entity::Parameter;
use crate::fact_index::FactOptionalsToId;

pub type CallbackId = String;

/// A list of observers invoked synchronously, in registration order. The
/// documented contract is that a callback must not mutate the world state
/// from within its body.
pub struct Signal<Arg> {
    subscribers: Vec<Box<dyn Fn(&Arg)>>,
}

impl<Arg> Signal<Arg> {
    pub fn new() -> Self {
        Signal {
            subscribers: Vec::new(),
        }
    }

    pub fn connect(&mut self, subscriber: impl Fn(&Arg) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn emit(&self, arg: &Arg) {
        for subscriber in &self.subscribers {
            subscriber(arg);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<Arg> Default for Signal<Arg> {
    fn default() -> Self {
        Signal::new()
    }
}

impl<Arg> fmt::Debug for Signal<Arg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal({} subscribers)", self.subscribers.len())
    }
}

/// A callback guarded by a condition, re-evaluated whenever a fact it
/// depends on changes.
pub struct ConditionToCallback {
    pub parameters: Vec<Parameter>,
    pub condition: Condition,
    pub callback: Box<dyn Fn()>,
}

/// Registered external callbacks, with the condition index used to wake only
/// the ones a changed fact can concern.
#[derive(Default)]
pub struct SetOfCallbacks {
    callbacks: BTreeMap<CallbackId, ConditionToCallback>,
    conditions_to_ids: FactOptionalsToId,
    next_id: usize,
}

impl SetOfCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callback: ConditionToCallback) -> CallbackId {
        let id = format!("callback_{}", self.next_id);
        self.next_id += 1;
        self.conditions_to_ids.add_condition(&callback.condition, &id);
        self.callbacks.insert(id.clone(), callback);
        id
    }

    pub fn remove(&mut self, id: &str) {
        if self.callbacks.remove(id).is_some() {
            self.rebuild_index();
        }
    }

    fn rebuild_index(&mut self) {
        self.conditions_to_ids = FactOptionalsToId::new();
        for (id, callback) in &self.callbacks {
            self.conditions_to_ids.add_condition(&callback.condition, id);
        }
    }

    pub fn callbacks(&self) -> &BTreeMap<CallbackId, ConditionToCallback> {
        &self.callbacks
    }

    pub fn conditions_to_ids(&self) -> &FactOptionalsToId {
        &self.conditions_to_ids
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for SetOfCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.callbacks.keys()).finish()
    }
}
