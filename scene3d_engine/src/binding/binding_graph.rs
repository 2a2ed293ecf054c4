/// BindingGraph: named slot registry used while building the pipeline
///
/// Producers declare outputs, consumers bind inputs by name. An input can
/// only bind to an output that already exists, so the stage order used to
/// build the graph is a topological order and cycles cannot form.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::rc::Rc;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::engine_bail;
use super::slot::{SlotState, SharedSlot};
use super::{InputSlot, OutputSlot};

struct SlotRecord {
    producer: String,
    type_name: &'static str,
    consumers: Vec<String>,
    state: Box<dyn Any>,
}

/// Registry of published slots
#[derive(Default)]
pub struct BindingGraph {
    slots: FxHashMap<String, SlotRecord>,
    /// Declaration order, for stable introspection
    order: Vec<String>,
}

impl BindingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an output named `name` produced by `producer`
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when another producer already declared `name`.
    pub fn output<T: Clone + PartialEq + 'static>(
        &mut self,
        producer: &str,
        name: &str,
        initial: T,
    ) -> Result<OutputSlot<T>> {
        if let Some(existing) = self.slots.get(name) {
            engine_bail!(InvalidConfiguration, "scene3d::BindingGraph",
                "slot '{}' declared by '{}' is already produced by '{}'",
                name, producer, existing.producer);
        }

        let state: SharedSlot<T> = Rc::new(RefCell::new(SlotState::new(name, initial)));
        self.slots.insert(name.to_string(), SlotRecord {
            producer: producer.to_string(),
            type_name: type_name::<T>(),
            consumers: Vec::new(),
            state: Box::new(state.clone()),
        });
        self.order.push(name.to_string());

        Ok(OutputSlot::from_state(state))
    }

    /// Bind `consumer` to the output named `name`
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when no producer declared `name` yet or the
    /// declared type differs from `T`.
    pub fn input<T: Clone + PartialEq + 'static>(
        &mut self,
        consumer: &str,
        name: &str,
    ) -> Result<InputSlot<T>> {
        let record = match self.slots.get_mut(name) {
            Some(record) => record,
            None => engine_bail!(InvalidConfiguration, "scene3d::BindingGraph",
                "input '{}' of '{}' is not bound to any producer", name, consumer),
        };

        let state = match record.state.downcast_ref::<SharedSlot<T>>() {
            Some(state) => state.clone(),
            None => engine_bail!(InvalidConfiguration, "scene3d::BindingGraph",
                "input '{}' of '{}' expects {} but '{}' produces {}",
                name, consumer, type_name::<T>(), record.producer, record.type_name),
        };

        record.consumers.push(consumer.to_string());
        Ok(InputSlot::bind(state))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Name of the stage producing `name`
    pub fn producer(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(|r| r.producer.as_str())
    }

    /// Stages consuming `name`, in binding order
    pub fn consumers(&self, name: &str) -> Vec<&str> {
        self.slots
            .get(name)
            .map(|r| r.consumers.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Declared slot names in declaration order
    pub fn slot_names(&self) -> &[String] {
        &self.order
    }

    /// Outputs nobody consumes (useful to spot wiring mistakes)
    pub fn unconsumed(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|n| self.slots.get(n.as_str()).map_or(false, |r| r.consumers.is_empty()))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
#[path = "binding_graph_tests.rs"]
mod tests;
