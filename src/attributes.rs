//! # Attribute Store
//!
//! Three parallel buffers per entity:
//!
//! - **defaults**: class-level values, restored by `unset` and `clear`.
//! - **reference**: the last synced truth. Only `sync`, `commit` and `clear` move it.
//! - **working**: the live, possibly dirty values.
//!
//! The store is plain data. It reports what changed through return values
//! ([`Change`] records, lists of touched keys) and leaves event emission to the
//! owning [`Model`](crate::model::Model), which can then dispatch without holding
//! its state lock.

use crate::error::ModelError;
use crate::mutation::MutationPipeline;
use crate::value::{Attributes, Selection, Value};
use std::collections::BTreeSet;

/// Names used internally by models for bookkeeping.
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "_uid",
    "_reference",
    "_attributes",
    "_mutations",
    "_errors",
    "_loading",
    "_saving",
    "_deleting",
    "_fatal",
    "_listeners",
    "_collections",
    "_registry",
];

/// A working-buffer modification.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub attribute: String,
    pub previous: Option<Value>,
    /// `None` when the attribute was removed.
    pub value: Option<Value>,
}

pub fn check_reserved(name: &str) -> Result<(), ModelError> {
    if name.is_empty() || RESERVED_ATTRIBUTES.contains(&name) {
        return Err(ModelError::ReservedAttribute(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    defaults: Attributes,
    reference: Attributes,
    working: Attributes,
}

impl AttributeStore {
    /// Creates a store whose working buffer starts from `defaults`. Nothing is synced yet.
    pub fn new(defaults: Attributes) -> Self {
        Self {
            working: defaults.clone(),
            reference: Attributes::new(),
            defaults,
        }
    }

    pub fn defaults(&self) -> &Attributes {
        &self.defaults
    }

    pub fn reference(&self) -> &Attributes {
        &self.reference
    }

    pub fn working(&self) -> &Attributes {
        &self.working
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.working.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.working.contains_key(name)
    }

    /// The last synced value of `name`.
    pub fn saved(&self, name: &str) -> Option<&Value> {
        self.reference.get(name)
    }

    /// Writes one value. Returns `None` when the value is structurally unchanged.
    pub fn set(
        &mut self,
        name: &str,
        value: Value,
        mutations: Option<&MutationPipeline>,
    ) -> Result<Option<Change>, ModelError> {
        check_reserved(name)?;
        let value = match mutations {
            Some(pipeline) => pipeline.mutate(name, value),
            None => value,
        };
        if self.working.get(name) == Some(&value) {
            return Ok(None);
        }
        let previous = self.working.insert(name.to_string(), value.clone());
        Ok(Some(Change {
            attribute: name.to_string(),
            previous,
            value: Some(value),
        }))
    }

    /// Writes several values. No value is written if any name is reserved.
    pub fn set_many(
        &mut self,
        values: Attributes,
        mutations: Option<&MutationPipeline>,
    ) -> Result<Vec<Change>, ModelError> {
        for name in values.keys() {
            check_reserved(name)?;
        }
        let mut changes = Vec::new();
        for (name, value) in values {
            if let Some(change) = self.set(&name, value, mutations)? {
                changes.push(change);
            }
        }
        Ok(changes)
    }

    /// Reverts selected attributes to their defaults, removing those without one.
    pub fn unset(&mut self, selection: &Selection) -> Vec<Change> {
        let names = selection.resolve(|| self.working.keys().cloned().collect());
        let mut changes = Vec::new();

        for name in names {
            match self.defaults.get(&name).cloned() {
                Some(default) => {
                    if self.working.get(&name) != Some(&default) {
                        let previous = self.working.insert(name.clone(), default.clone());
                        changes.push(Change {
                            attribute: name,
                            previous,
                            value: Some(default),
                        });
                    }
                }
                None => {
                    if let Some(previous) = self.working.remove(&name) {
                        changes.push(Change {
                            attribute: name,
                            previous: Some(previous),
                            value: None,
                        });
                    }
                }
            }
        }
        changes
    }

    /// Copies reference values over working values. Returns the selected names.
    ///
    /// Attributes that were never synced are removed from the working buffer.
    pub fn reset(&mut self, selection: &Selection) -> Vec<String> {
        let names = selection.resolve(|| self.all_keys());
        for name in &names {
            match self.reference.get(name) {
                Some(value) => {
                    self.working.insert(name.clone(), value.clone());
                }
                None => {
                    self.working.remove(name);
                }
            }
        }
        names
    }

    /// Copies working values into the reference, optionally mutating them first.
    pub fn sync(&mut self, selection: &Selection, mutations: Option<&MutationPipeline>) -> Vec<String> {
        let names = selection.resolve(|| self.all_keys());
        for name in &names {
            match self.working.remove(name) {
                Some(value) => {
                    let value = match mutations {
                        Some(pipeline) => pipeline.mutate(name, value),
                        None => value,
                    };
                    self.working.insert(name.clone(), value.clone());
                    self.reference.insert(name.clone(), value);
                }
                None => {
                    self.reference.remove(name);
                }
            }
        }
        names
    }

    /// Advances the reference to what a save sent.
    ///
    /// `snapshot` is the working buffer the request was built from and `sent` the
    /// body derived from it. Attributes untouched since the snapshot take the sent
    /// value in both buffers; writes made after the snapshot stay dirty. `removed`
    /// names attributes the save dropped, which leave the reference.
    pub fn commit(
        &mut self,
        snapshot: &Attributes,
        sent: &Attributes,
        removed: &[String],
        mutations: Option<&MutationPipeline>,
    ) -> Vec<String> {
        let mut names = Vec::with_capacity(sent.len() + removed.len());
        for (name, value) in sent {
            if self.working.get(name) == snapshot.get(name) {
                let value = match mutations {
                    Some(pipeline) => pipeline.mutate(name, value.clone()),
                    None => value.clone(),
                };
                self.working.insert(name.clone(), value.clone());
                self.reference.insert(name.clone(), value);
            } else {
                self.reference.insert(name.clone(), value.clone());
            }
            names.push(name.clone());
        }
        for name in removed {
            self.reference.remove(name);
            names.push(name.clone());
        }
        names
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.working.get(name) != self.reference.get(name)
    }

    /// Names whose working value differs from the reference, or `None` if nothing differs.
    pub fn changed(&self) -> Option<Vec<String>> {
        let changed: Vec<String> = self
            .all_keys()
            .into_iter()
            .filter(|name| self.is_changed(name))
            .collect();
        (!changed.is_empty()).then_some(changed)
    }

    /// Restores defaults into both buffers.
    pub fn clear(&mut self) {
        self.working = self.defaults.clone();
        self.reference = self.defaults.clone();
    }

    fn all_keys(&self) -> Vec<String> {
        self.working
            .keys()
            .chain(self.reference.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
