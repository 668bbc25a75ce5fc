use std::collections::BTreeMap;
use std::marker::PhantomData;

use burn::prelude::*;
use burn::record::{PrecisionSettings, Record};
use serde::{Deserialize, Serialize};

/// Scalar stored under a checkpoint key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckpointValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CheckpointValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            CheckpointValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            CheckpointValue::Float(v) => Some(*v),
            CheckpointValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CheckpointValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CheckpointValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for CheckpointValue {
    fn from(v: bool) -> Self {
        CheckpointValue::Bool(v)
    }
}

impl From<i64> for CheckpointValue {
    fn from(v: i64) -> Self {
        CheckpointValue::Int(v)
    }
}

impl From<usize> for CheckpointValue {
    fn from(v: usize) -> Self {
        CheckpointValue::Int(v as i64)
    }
}

impl From<f64> for CheckpointValue {
    fn from(v: f64) -> Self {
        CheckpointValue::Float(v)
    }
}

impl From<f32> for CheckpointValue {
    fn from(v: f32) -> Self {
        CheckpointValue::Float(v as f64)
    }
}

impl From<&str> for CheckpointValue {
    fn from(v: &str) -> Self {
        CheckpointValue::Text(v.to_string())
    }
}

impl From<String> for CheckpointValue {
    fn from(v: String) -> Self {
        CheckpointValue::Text(v)
    }
}

/// Training state to persist: named scalars plus an optional model under the
/// distinguished `state_dict` entry.
#[derive(Debug, Clone)]
pub struct Checkpoint<M> {
    entries: BTreeMap<String, CheckpointValue>,
    state_dict: Option<M>,
}

impl<M> Default for Checkpoint<M> {
    fn default() -> Self {
        Checkpoint {
            entries: BTreeMap::new(),
            state_dict: None,
        }
    }
}

impl<M> Checkpoint<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<CheckpointValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_state_dict(mut self, model: M) -> Self {
        self.state_dict = Some(model);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<CheckpointValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&CheckpointValue> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, CheckpointValue> {
        &self.entries
    }

    pub fn state_dict(&self) -> Option<&M> {
        self.state_dict.as_ref()
    }

    pub fn into_state_dict(self) -> Option<M> {
        self.state_dict
    }

    pub(crate) fn from_parts(entries: BTreeMap<String, CheckpointValue>, state_dict: Option<M>) -> Self {
        Checkpoint {
            entries,
            state_dict,
        }
    }
}

impl<M> Checkpoint<M> {
    /// Convert into the serializable record for backend `B`.
    pub(crate) fn to_record<B>(&self) -> CheckpointRecord<B, M::Record>
    where
        B: Backend,
        M: Module<B>,
    {
        CheckpointRecord {
            entries: self.entries.clone(),
            state_dict: self.state_dict.clone().map(|m| m.into_record()),
            _backend: PhantomData,
        }
    }
}

/// On-disk form of a [`Checkpoint`].
pub(crate) struct CheckpointRecord<B: Backend, R> {
    pub entries: BTreeMap<String, CheckpointValue>,
    pub state_dict: Option<R>,
    _backend: PhantomData<B>,
}

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct CheckpointItem<I> {
    entries: BTreeMap<String, CheckpointValue>,
    state_dict: Option<I>,
}

impl<B, R> Record<B> for CheckpointRecord<B, R>
where
    B: Backend,
    R: Record<B>,
{
    type Item<S: PrecisionSettings> = CheckpointItem<R::Item<S>>;

    fn into_item<S: PrecisionSettings>(self) -> Self::Item<S> {
        CheckpointItem {
            entries: self.entries,
            state_dict: self.state_dict.map(|record| record.into_item::<S>()),
        }
    }

    fn from_item<S: PrecisionSettings>(item: Self::Item<S>, device: &B::Device) -> Self {
        CheckpointRecord {
            entries: item.entries,
            state_dict: item.state_dict.map(|item| R::from_item::<S>(item, device)),
            _backend: PhantomData,
        }
    }
}
