// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Where events come from.

use std::collections::VecDeque;

use crate::graph::Payload;

/// A worker's stream of events.
pub trait EventSource: Send {
    fn next_event(&mut self) -> Option<Payload>;
}

/// An in-memory event stream.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    events: VecDeque<Payload>,
}

impl VecSource {
    pub fn new(events: Vec<Payload>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// The contiguous share of `events` that worker `worker` of `workers`
    /// processes. Shares differ in size by at most one event and together
    /// cover the stream exactly once.
    pub fn partition(events: &[Payload], worker: usize, workers: usize) -> Self {
        let workers = workers.max(1);
        let base = events.len() / workers;
        let extra = events.len() % workers;
        let start = worker * base + worker.min(extra);
        let len = if worker < extra { base + 1 } else { base };
        let end = (start + len).min(events.len());
        let start = start.min(end);
        Self::new(events[start..end].to_vec())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for VecSource {
    fn next_event(&mut self) -> Option<Payload> {
        self.events.pop_front()
    }
}

/// One chain of events sharing a mixing bin.
#[derive(Debug, Clone, PartialEq)]
pub struct MixingBin {
    pub index: usize,
    pub events: Vec<Payload>,
}

/// Hands out event chains, one bin at a time.
pub trait EventPool: Send {
    fn next_bin(&mut self) -> Option<MixingBin>;
}

#[derive(Debug, Clone, Default)]
pub struct VecPool {
    bins: VecDeque<MixingBin>,
}

impl VecPool {
    pub fn new(bins: Vec<MixingBin>) -> Self {
        Self { bins: bins.into() }
    }

    /// Group `events` into bins by `key`, in order of first appearance.
    pub fn binned<F>(events: Vec<Payload>, key: F) -> Self
    where
        F: Fn(&Payload) -> usize,
    {
        let mut bins: Vec<MixingBin> = Vec::new();
        for event in events {
            let index = key(&event);
            match bins.iter_mut().find(|bin| bin.index == index) {
                Some(bin) => bin.events.push(event),
                None => bins.push(MixingBin {
                    index,
                    events: vec![event],
                }),
            }
        }
        Self::new(bins)
    }
}

impl EventPool for VecPool {
    fn next_bin(&mut self) -> Option<MixingBin> {
        self.bins.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream(n: usize) -> Vec<Payload> {
        (0..n).map(|i| Payload::Object(json!({ "id": i }))).collect()
    }

    fn ids(mut source: VecSource) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Some(event) = source.next_event() {
            ids.push(event.as_object().unwrap()["id"].as_u64().unwrap());
        }
        ids
    }

    #[test]
    fn test_partition_covers_stream_once() {
        let events = stream(10);
        let shares: Vec<Vec<u64>> = (0..3).map(|w| ids(VecSource::partition(&events, w, 3))).collect();
        assert_eq!(shares[0], vec![0, 1, 2, 3]);
        assert_eq!(shares[1], vec![4, 5, 6]);
        assert_eq!(shares[2], vec![7, 8, 9]);
    }

    #[test]
    fn test_partition_with_more_workers_than_events() {
        let events = stream(2);
        let sizes: Vec<usize> = (0..4).map(|w| VecSource::partition(&events, w, 4).len()).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_binned_pool_keeps_first_appearance_order() {
        let mut pool = VecPool::binned(stream(6), |e| {
            (e.as_object().unwrap()["id"].as_u64().unwrap() % 3) as usize
        });
        let order: Vec<(usize, usize)> = std::iter::from_fn(|| pool.next_bin())
            .map(|bin| (bin.index, bin.events.len()))
            .collect();
        assert_eq!(order, vec![(0, 2), (1, 2), (2, 2)]);
    }
}
