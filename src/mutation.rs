//! # Mutation Pipeline
//!
//! Ordered value transforms keyed by attribute name. Each attribute may have a
//! chain of mutators applied left to right, every mutator receiving the previous
//! one's output.
//!
//! The pipeline itself has no opinion on *when* it runs. Models consult three
//! independent options ([`ModelOptions`](crate::model::ModelOptions)):
//! `mutate_on_change`, `mutate_before_sync` and `mutate_before_save`, so a value
//! can be normalized for transport without being rewritten on every keystroke.

use crate::value::{Attributes, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A single value transform.
pub type Mutator = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct MutationPipeline {
    chains: HashMap<String, Vec<Mutator>>,
}

impl MutationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `mutator` to the chain for `attribute`.
    pub fn with<F>(mut self, attribute: &str, mutator: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.add(attribute, mutator);
        self
    }

    pub fn add<F>(&mut self, attribute: &str, mutator: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.chains
            .entry(attribute.to_string())
            .or_default()
            .push(Arc::new(mutator));
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.chains.get(attribute).is_some_and(|chain| !chain.is_empty())
    }

    /// Runs the chain for `attribute`. Attributes without a chain pass through.
    pub fn mutate(&self, attribute: &str, value: Value) -> Value {
        match self.chains.get(attribute) {
            Some(chain) => chain.iter().fold(value, |value, mutator| mutator(value)),
            None => value,
        }
    }

    /// Mutates every entry of `attributes` in place.
    pub fn mutate_all(&self, attributes: &mut Attributes) {
        for (name, value) in attributes.iter_mut() {
            if self.has(name) {
                let current = std::mem::replace(value, Value::null());
                *value = self.mutate(name, current);
            }
        }
    }
}

impl fmt::Debug for MutationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.chains.iter().map(|(name, chain)| (name, chain.len())))
            .finish()
    }
}
