/// Output and input slots with per-consumer change tracking
///
/// The producer bumps a version on every effective `set`. Each consumer
/// remembers the last version it read; `changed()` compares the two.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

/// Versions start at 1 so a freshly bound input (seen = 0) reports changed
const INITIAL_VERSION: u64 = 1;

pub(crate) struct SlotState<T> {
    pub(crate) name: String,
    value: T,
    version: u64,
    /// Last version observed by each bound consumer
    observers: Vec<Rc<Cell<u64>>>,
}

impl<T> SlotState<T> {
    pub(crate) fn new(name: &str, value: T) -> Self {
        Self {
            name: name.to_string(),
            value,
            version: INITIAL_VERSION,
            observers: Vec::new(),
        }
    }
}

pub(crate) type SharedSlot<T> = Rc<RefCell<SlotState<T>>>;

// ===== OUTPUT SLOT =====

/// Producer side of a slot (single writer)
pub struct OutputSlot<T> {
    state: SharedSlot<T>,
}

impl<T: Clone + PartialEq> OutputSlot<T> {
    pub(crate) fn from_state(state: SharedSlot<T>) -> Self {
        Self { state }
    }

    /// Publish a value
    ///
    /// Setting a value equal to the current one leaves the change state
    /// untouched.
    pub fn set(&mut self, value: T) {
        let mut state = self.state.borrow_mut();
        if state.value == value {
            return;
        }
        state.value = value;
        state.version += 1;
    }

    /// Current value
    pub fn get(&self) -> T {
        self.state.borrow().value.clone()
    }

    /// True while at least one bound consumer has not read the current value
    ///
    /// Before any consumer binds, true once an effective `set` happened.
    pub fn changed(&self) -> bool {
        let state = self.state.borrow();
        if state.observers.is_empty() {
            return state.version != INITIAL_VERSION;
        }
        state.observers.iter().any(|seen| seen.get() != state.version)
    }

    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    pub fn consumer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }
}

// ===== INPUT SLOT =====

/// Consumer side of a slot (read only), bound once to one producer
pub struct InputSlot<T> {
    state: SharedSlot<T>,
    seen: Rc<Cell<u64>>,
}

impl<T: Clone + PartialEq> InputSlot<T> {
    pub(crate) fn bind(state: SharedSlot<T>) -> Self {
        let seen = Rc::new(Cell::new(0));
        state.borrow_mut().observers.push(seen.clone());
        Self { state, seen }
    }

    /// True when the producer published a value this consumer has not read
    pub fn changed(&self) -> bool {
        self.seen.get() != self.state.borrow().version
    }

    /// Read the value and mark it observed
    pub fn get(&self) -> T {
        let state = self.state.borrow();
        self.seen.set(state.version);
        state.value.clone()
    }

    /// Borrow the value without cloning; also marks it observed
    pub fn borrow(&self) -> Ref<'_, T> {
        let state = self.state.borrow();
        self.seen.set(state.version);
        Ref::map(state, |s| &s.value)
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
