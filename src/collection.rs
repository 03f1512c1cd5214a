//! # Collections
//!
//! A minimal ordered set of models. A collection owns strong handles to its models
//! while each model keeps only a weak back-reference, so a model can fan out
//! creation and deletion to the collections holding it without keeping them alive.

use crate::model::Model;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Default)]
pub(crate) struct CollectionInner {
    models: Mutex<Vec<Model>>,
}

#[derive(Clone, Default)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_models(models: impl IntoIterator<Item = Model>) -> Self {
        let collection = Self::new();
        for model in models {
            collection.add(&model);
        }
        collection
    }

    /// Adds `model` unless it is already present. Returns whether it was added.
    pub fn add(&self, model: &Model) -> bool {
        {
            let mut models = self.inner.models.lock();
            if models.iter().any(|m| m.ptr_eq(model)) {
                return false;
            }
            models.push(model.clone());
        }
        model.register_collection(self);
        true
    }

    /// Removes `model` and its back-reference. Returns whether it was present.
    pub fn remove(&self, model: &Model) -> bool {
        let removed = {
            let mut models = self.inner.models.lock();
            let before = models.len();
            models.retain(|m| !m.ptr_eq(model));
            models.len() != before
        };
        model.forget_collection(self);
        removed
    }

    pub fn has(&self, model: &Model) -> bool {
        self.inner.models.lock().iter().any(|m| m.ptr_eq(model))
    }

    pub fn len(&self) -> usize {
        self.inner.models.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.models.lock().is_empty()
    }

    /// Handles to the models, in insertion order.
    pub fn models(&self) -> Vec<Model> {
        self.inner.models.lock().clone()
    }

    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<CollectionInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<CollectionInner>) -> Option<Collection> {
        weak.upgrade().map(|inner| Collection { inner })
    }

    pub(crate) fn is(&self, weak: &Weak<CollectionInner>) -> bool {
        std::ptr::eq(weak.as_ptr(), Arc::as_ptr(&self.inner))
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").field("models", &self.models()).finish()
    }
}
