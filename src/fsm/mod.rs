//! Guarded finite-state-machine engine for record lifecycles.
//!
//! Every protocol record advances through a fixed transition table: a plain
//! map from (current state, trigger) to next state, built once per record
//! kind. A trigger outside the table fails and leaves the record untouched.

use crate::core::{Error, Result};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// A record that carries a guarded lifecycle state.
///
/// Protocol code must never assign the state directly; the only mutation
/// path is [`TransitionTable::apply`].
pub trait Stateful {
    /// State type for this record kind.
    type State: Copy + Eq + Hash + Display;
    /// Trigger type for this record kind.
    type Trigger: Copy + Eq + Hash + Display;

    /// Current lifecycle state.
    fn state(&self) -> Self::State;

    /// Overwrite the state. Reserved for the state machine engine.
    #[doc(hidden)]
    fn set_state(&mut self, state: Self::State);
}

/// Immutable transition table mapping (state, trigger) to the next state.
#[derive(Clone, Debug)]
pub struct TransitionTable<S, G> {
    transitions: HashMap<(S, G), S>,
}

impl<S, G> TransitionTable<S, G>
where
    S: Copy + Eq + Hash + Display,
    G: Copy + Eq + Hash + Display,
{
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
        }
    }

    /// Declare a valid transition.
    pub fn allow(mut self, from: S, trigger: G, to: S) -> Self {
        self.transitions.insert((from, trigger), to);
        self
    }

    /// Look up the next state for (from, trigger), if the pair is valid.
    pub fn next(&self, from: S, trigger: G) -> Option<S> {
        self.transitions.get(&(from, trigger)).copied()
    }

    /// Number of declared transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Whether the table declares no transitions.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Apply a trigger to a record.
    ///
    /// Fails with [`Error::InvalidTransition`] if the trigger is not valid
    /// for the record's current state; the record is left unmodified. On
    /// success the record's state is set to the mapped value and returned.
    /// The caller must treat this mutation and the subsequent persist as
    /// one unit (hold the record's store lock across both).
    pub fn apply<R>(&self, record: &mut R, trigger: G) -> Result<S>
    where
        R: Stateful<State = S, Trigger = G>,
    {
        let from = record.state();
        match self.next(from, trigger) {
            Some(to) => {
                record.set_state(to);
                Ok(to)
            }
            None => Err(Error::InvalidTransition {
                state: from.to_string(),
                trigger: trigger.to_string(),
            }),
        }
    }
}

impl<S, G> Default for TransitionTable<S, G>
where
    S: Copy + Eq + Hash + Display,
    G: Copy + Eq + Hash + Display,
{
    fn default() -> Self {
        Self::new()
    }
}
