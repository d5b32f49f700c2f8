// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Data slots: the named holders that carry payloads between tasks.
//!
//! A slot has at most one producer and any number of consumers. Consumers are
//! stored as [`TaskId`] keys into the graph arena, never as owning references.
//!
//! # Generations
//!
//! Every event starts a new generation. A slot is *ready* only when its
//! producer (or the merge importer) posted into it during the current
//! generation; a payload left over from an earlier event is kept but is not
//! ready. Consumers record that they ran against the current generation with
//! [`DataSlot::mark_consumed`], which is what the eviction sweep checks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::config::consts::{DEFAULT_LOCATOR, LOCATOR_SEPARATOR};
use crate::errors::{MergeError, SlotError};
use crate::graph::TaskId;

/// Stable arena key of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self.0)
    }
}

/// The shape of the objects a slot carries, fixed when the slot is declared.
///
/// The kind decides how payloads from several workers are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// A single object; numeric leaves are summed on merge (counters, histograms).
    Object,
    /// A list of independent entries; concatenated on merge.
    Collection,
    /// A table of rows; rows are appended on merge.
    Tree,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Object => "object",
            PayloadKind::Collection => "collection",
            PayloadKind::Tree => "tree",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "object" => Some(PayloadKind::Object),
            "collection" => Some(PayloadKind::Collection),
            "tree" => Some(PayloadKind::Tree),
            _ => None,
        }
    }
}

/// A slot payload, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Object(Value),
    Collection(Vec<Value>),
    Tree(Vec<Map<String, Value>>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Object(_) => PayloadKind::Object,
            Payload::Collection(_) => PayloadKind::Collection,
            Payload::Tree(_) => PayloadKind::Tree,
        }
    }

    pub fn as_object(&self) -> Option<&Value> {
        match self {
            Payload::Object(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Value]> {
        match self {
            Payload::Collection(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&[Map<String, Value>]> {
        match self {
            Payload::Tree(rows) => Some(rows),
            _ => None,
        }
    }

    /// Fold another worker's payload into this one.
    pub fn merge(&mut self, other: Payload) -> Result<(), MergeError> {
        match (self, other) {
            (Payload::Object(mine), Payload::Object(theirs)) => merge_values("", mine, theirs),
            (Payload::Collection(mine), Payload::Collection(theirs)) => {
                mine.extend(theirs);
                Ok(())
            }
            (Payload::Tree(mine), Payload::Tree(theirs)) => {
                mine.extend(theirs);
                Ok(())
            }
            (mine, theirs) => Err(MergeError::Incompatible {
                path: String::new(),
                reason: format!("cannot merge {:?} into {:?}", theirs.kind(), mine.kind()),
            }),
        }
    }
}

fn merge_values(path: &str, mine: &mut Value, theirs: Value) -> Result<(), MergeError> {
    match (mine, theirs) {
        (Value::Number(a), Value::Number(b)) => {
            *a = add_numbers(a, &b).ok_or_else(|| MergeError::Incompatible {
                path: path.to_string(),
                reason: "sum is not a finite number".to_string(),
            })?;
            Ok(())
        }
        (Value::Object(a), Value::Object(b)) => {
            for (key, value) in b {
                let child = format!("{path}/{key}");
                match a.get_mut(&key) {
                    Some(existing) => merge_values(&child, existing, value)?,
                    None => {
                        a.insert(key, value);
                    }
                }
            }
            Ok(())
        }
        (Value::Array(a), Value::Array(b)) => {
            for (index, value) in b.into_iter().enumerate() {
                if index < a.len() {
                    merge_values(&format!("{path}[{index}]"), &mut a[index], value)?;
                } else {
                    a.push(value);
                }
            }
            Ok(())
        }
        (a, b) if *a == b => Ok(()),
        (a, b) => Err(MergeError::Incompatible {
            path: path.to_string(),
            reason: format!("conflicting values {a} and {b}"),
        }),
    }
}

fn add_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Option<serde_json::Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }
    let x = a.as_f64()?;
    let y = b.as_f64()?;
    serde_json::Number::from_f64(x + y)
}

/// Where a special slot's payload lives on disk: `file#folder`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocator {
    pub file: String,
    pub folder: String,
}

impl FileLocator {
    /// Split a `file#folder` locator. The folder part is optional.
    pub fn parse(locator: &str) -> Self {
        match locator.split_once(LOCATOR_SEPARATOR) {
            Some((file, folder)) => Self {
                file: file.trim().to_string(),
                folder: folder.trim().to_string(),
            },
            None => Self {
                file: locator.trim().to_string(),
                folder: String::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.folder.is_empty() {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}{}{}", self.file, LOCATOR_SEPARATOR, self.folder)
        }
    }
}

/// How a slot's payload is persisted at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStorage {
    /// In memory; written to the common results file by the output handler.
    Memory,
    /// The reserved `default` locator: the external output handler owns the file.
    Handler,
    /// File-resident ("special"): the slot writes its own file.
    File(FileLocator),
}

impl SlotStorage {
    /// Interpret a locator string; `default` is reserved for the output handler.
    pub fn from_locator(locator: &str) -> Self {
        if locator.trim().eq_ignore_ascii_case(DEFAULT_LOCATOR) {
            SlotStorage::Handler
        } else {
            SlotStorage::File(FileLocator::parse(locator))
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, SlotStorage::File(_))
    }

    pub fn file_locator(&self) -> Option<&FileLocator> {
        match self {
            SlotStorage::File(locator) => Some(locator),
            _ => None,
        }
    }
}

/// Declaration of a slot, handed to [`Graph::add_slot`](crate::graph::Graph::add_slot).
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub(crate) name: String,
    pub(crate) kind: PayloadKind,
    pub(crate) input: bool,
    pub(crate) output: bool,
    pub(crate) storage: SlotStorage,
}

impl SlotSpec {
    /// A declared input slot; every event is bound into it.
    pub fn input(name: impl Into<String>, kind: PayloadKind) -> Self {
        Self::new(name, kind, true, false)
    }

    /// A slot exchanged between tasks within an event; evicted once consumed.
    pub fn exchange(name: impl Into<String>, kind: PayloadKind) -> Self {
        Self::new(name, kind, false, false)
    }

    /// A slot kept for merge and written out at the end of the run.
    pub fn output(name: impl Into<String>, kind: PayloadKind) -> Self {
        Self::new(name, kind, false, true)
    }

    /// Make the slot file-resident at `file#folder` (or the reserved `default`).
    pub fn with_locator(mut self, locator: &str) -> Self {
        self.storage = SlotStorage::from_locator(locator);
        self
    }

    fn new(name: impl Into<String>, kind: PayloadKind, input: bool, output: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            input,
            output,
            storage: SlotStorage::Memory,
        }
    }
}

/// A named, typed holder for one data object.
#[derive(Debug)]
pub struct DataSlot {
    pub(crate) id: SlotId,
    pub(crate) name: String,
    pub(crate) kind: PayloadKind,
    pub(crate) input: bool,
    pub(crate) output: bool,
    pub(crate) post_loop: bool,
    pub(crate) owns_data: bool,
    /// Joined the output set during validation rather than at declaration.
    pub(crate) promoted: bool,
    pub(crate) storage: SlotStorage,
    pub(crate) producer: Option<TaskId>,
    pub(crate) consumers: Vec<TaskId>,
    payload: Option<Payload>,
    fresh: bool,
    consumed: HashSet<TaskId>,
}

impl DataSlot {
    pub(crate) fn from_spec(id: SlotId, spec: SlotSpec) -> Self {
        Self {
            id,
            name: spec.name,
            kind: spec.kind,
            input: spec.input,
            output: spec.output,
            post_loop: false,
            owns_data: !spec.output,
            promoted: false,
            storage: spec.storage,
            producer: None,
            consumers: Vec::new(),
            payload: None,
            fresh: false,
            consumed: HashSet::new(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn is_input(&self) -> bool {
        self.input
    }

    /// Member of the kept-for-merge output set.
    pub fn is_output(&self) -> bool {
        self.output
    }

    pub fn is_special(&self) -> bool {
        self.storage.is_special()
    }

    /// Feeds only post-loop tasks.
    pub fn is_post_loop(&self) -> bool {
        self.post_loop
    }

    pub fn owns_data(&self) -> bool {
        self.owns_data
    }

    pub fn storage(&self) -> &SlotStorage {
        &self.storage
    }

    pub fn producer(&self) -> Option<TaskId> {
        self.producer
    }

    pub fn consumers(&self) -> &[TaskId] {
        &self.consumers
    }

    /// Replace the payload and open a fresh generation for every consumer.
    pub fn set_data(&mut self, payload: Payload) -> Result<(), SlotError> {
        if payload.kind() != self.kind {
            return Err(SlotError::KindMismatch {
                slot: self.name.clone(),
                expected: self.kind,
                actual: payload.kind(),
            });
        }
        self.payload = Some(payload);
        self.touch();
        Ok(())
    }

    /// Read the payload; fails if nothing was ever posted.
    pub fn data(&self) -> Result<&Payload, SlotError> {
        self.payload
            .as_ref()
            .ok_or_else(|| SlotError::NotReady(self.name.clone()))
    }

    /// Mutable access to the payload. Modifying in place counts as a post.
    pub fn data_mut(&mut self) -> Result<&mut Payload, SlotError> {
        if self.payload.is_none() {
            return Err(SlotError::NotReady(self.name.clone()));
        }
        self.touch();
        self.payload
            .as_mut()
            .ok_or_else(|| SlotError::NotReady(self.name.clone()))
    }

    pub fn has_data(&self) -> bool {
        self.payload.is_some()
    }

    pub fn mark_consumed(&mut self, consumer: TaskId) {
        self.consumed.insert(consumer);
    }

    pub fn is_ready(&self) -> bool {
        self.fresh && self.payload.is_some()
    }

    pub fn all_consumers_ran(&self) -> bool {
        self.consumers.iter().all(|c| self.consumed.contains(c))
    }

    /// Drop the payload. Only allowed when the slot owns it and every consumer ran.
    pub fn evict(&mut self) -> Result<Payload, SlotError> {
        if !self.owns_data || !self.all_consumers_ran() {
            return Err(SlotError::EvictionRefused(self.name.clone()));
        }
        self.fresh = false;
        self.payload
            .take()
            .ok_or_else(|| SlotError::NotReady(self.name.clone()))
    }

    /// Drop an owned payload whatever its consumers did; used when the event
    /// ended before they could run. Payloads the slot does not own stay.
    pub(crate) fn discard(&mut self) -> Option<Payload> {
        if !self.owns_data {
            return None;
        }
        self.fresh = false;
        self.payload.take()
    }

    /// Start-of-event reset: keep the payload, but it is stale until re-posted.
    pub(crate) fn begin_generation(&mut self) {
        self.fresh = false;
        self.consumed.clear();
    }

    fn touch(&mut self) {
        self.fresh = true;
        self.consumed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(spec: SlotSpec) -> DataSlot {
        DataSlot::from_spec(SlotId(0), spec)
    }

    #[test]
    fn test_get_data_before_post_is_not_ready() {
        let s = slot(SlotSpec::exchange("tracks", PayloadKind::Collection));
        assert_eq!(s.data(), Err(SlotError::NotReady("tracks".to_string())));
        assert!(!s.is_ready());
    }

    #[test]
    fn test_set_data_rejects_wrong_kind() {
        let mut s = slot(SlotSpec::exchange("tracks", PayloadKind::Collection));
        let err = s.set_data(Payload::Object(json!(1))).unwrap_err();
        assert!(matches!(err, SlotError::KindMismatch { .. }));
        assert!(!s.has_data());
    }

    #[test]
    fn test_generation_reset_keeps_payload_but_clears_readiness() {
        let mut s = slot(SlotSpec::output("h", PayloadKind::Object));
        s.set_data(Payload::Object(json!({"n": 1}))).unwrap();
        assert!(s.is_ready());

        s.begin_generation();
        assert!(!s.is_ready());
        assert!(s.has_data());

        s.data_mut().unwrap();
        assert!(s.is_ready());
    }

    #[test]
    fn test_eviction_waits_for_every_consumer() {
        let mut s = slot(SlotSpec::exchange("tracks", PayloadKind::Collection));
        s.consumers = vec![TaskId(1), TaskId(2)];
        s.set_data(Payload::Collection(vec![json!(1)])).unwrap();

        s.mark_consumed(TaskId(1));
        assert!(!s.all_consumers_ran());
        assert_eq!(s.evict(), Err(SlotError::EvictionRefused("tracks".to_string())));

        s.mark_consumed(TaskId(2));
        assert!(s.all_consumers_ran());
        assert!(s.evict().is_ok());
        assert!(!s.has_data());
    }

    #[test]
    fn test_new_post_invalidates_consumption_marks() {
        let mut s = slot(SlotSpec::exchange("tracks", PayloadKind::Collection));
        s.consumers = vec![TaskId(1)];
        s.set_data(Payload::Collection(vec![])).unwrap();
        s.mark_consumed(TaskId(1));
        assert!(s.all_consumers_ran());

        s.set_data(Payload::Collection(vec![json!("again")])).unwrap();
        assert!(!s.all_consumers_ran());
    }

    #[test]
    fn test_output_slots_never_evict() {
        let mut s = slot(SlotSpec::output("h", PayloadKind::Object));
        s.set_data(Payload::Object(json!(0))).unwrap();
        assert!(s.all_consumers_ran());
        assert!(s.evict().is_err());
    }

    #[test]
    fn test_locator_parsing() {
        let loc = FileLocator::parse("tracks.json#cuts/pt");
        assert_eq!(loc.file, "tracks.json");
        assert_eq!(loc.folder, "cuts/pt");
        assert_eq!(loc.to_string(), "tracks.json#cuts/pt");

        assert_eq!(FileLocator::parse("only.json").folder, "");
        assert!(FileLocator::parse("#folder").is_empty());
        assert_eq!(SlotStorage::from_locator("default"), SlotStorage::Handler);
        assert!(SlotStorage::from_locator("a.json#x").is_special());
    }

    #[test]
    fn test_object_merge_sums_numeric_leaves() {
        let mut a = Payload::Object(json!({"entries": 3, "bins": [1, 2], "mean": 0.5, "label": "pt"}));
        let b = Payload::Object(json!({"entries": 4, "bins": [1, 1, 5], "mean": 0.25, "label": "pt"}));
        a.merge(b).unwrap();
        assert_eq!(
            a,
            Payload::Object(json!({"entries": 7, "bins": [2, 3, 5], "mean": 0.75, "label": "pt"}))
        );
    }

    #[test]
    fn test_object_merge_rejects_conflicting_scalars() {
        let mut a = Payload::Object(json!({"label": "pt"}));
        let err = a.merge(Payload::Object(json!({"label": "eta"}))).unwrap_err();
        match err {
            MergeError::Incompatible { path, .. } => assert_eq!(path, "/label"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_collection_and_tree_merge_append() {
        let mut c = Payload::Collection(vec![json!(1)]);
        c.merge(Payload::Collection(vec![json!(2)])).unwrap();
        assert_eq!(c.as_collection().unwrap().len(), 2);

        let row = |v: i64| {
            let mut m = Map::new();
            m.insert("pt".to_string(), json!(v));
            m
        };
        let mut t = Payload::Tree(vec![row(1)]);
        t.merge(Payload::Tree(vec![row(2), row(3)])).unwrap();
        assert_eq!(t.as_tree().unwrap().len(), 3);

        assert!(t.merge(Payload::Collection(vec![])).is_err());
    }
}
