//! Playlist state: catalog merge, weighted refill and advance
//!
//! [`PlaylistScheduler`] owns the latest [`CatalogSnapshot`], the play queue and
//! the current item. It is a plain synchronous state machine: every call runs to
//! completion and records what happened as [`SchedulerEvent`]s, which the
//! playback controller drains afterwards.
//!
//! The queue is a stack. Newly published items are pushed on top so they play
//! next; when the queue runs dry it is refilled with a random batch that favours
//! the end of the ordered id list (the most recent numeric ids).

use crate::info::InfoLog;
use crate::models::{CatalogSnapshot, Item, ItemId, TimeoutConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Default number of ids drawn per refill
pub const DEFAULT_REFILL_SIZE: usize = 5;

/// Default skew exponent applied to the uniform draw
pub const DEFAULT_REFILL_SKEW: f64 = 0.8;

/// How a refill batch is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefillPolicy {
    /// Ids drawn per refill (at least one)
    pub batch_size: usize,
    /// Exponent applied to `u` in `[0, 1)`; below 1 favours the end of the list
    pub skew: f64,
}

impl Default for RefillPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_REFILL_SIZE,
            skew: DEFAULT_REFILL_SKEW,
        }
    }
}

impl RefillPolicy {
    /// Maps a uniform draw to an index in `0..len`
    ///
    /// `len` must be non-zero.
    pub fn sample_index(&self, u: f64, len: usize) -> usize {
        let idx = (u.powf(self.skew) * len as f64).floor() as usize;
        idx.min(len - 1)
    }
}

/// State changes reported by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// Ids published since the previous snapshot, already queued
    NewItemsDetected(Vec<ItemId>),
    /// The queue was empty and a random batch was drawn
    Refilled(Vec<ItemId>),
    /// The current item is now a different one (or none)
    CurrentItemChanged {
        previous: Option<ItemId>,
        current: Option<ItemId>,
    },
    /// `advance()` selected the item that was already current
    CurrentItemRepeated(ItemId),
    /// The catalog published new timeout settings
    TimeoutConfigChanged(TimeoutConfig),
}

/// Queue, current item and latest snapshot
#[derive(Debug)]
pub struct PlaylistScheduler {
    snapshot: CatalogSnapshot,
    loaded: bool,
    queue: Vec<ItemId>,
    current: Option<ItemId>,
    policy: RefillPolicy,
    rng: StdRng,
    info: InfoLog,
    events: VecDeque<SchedulerEvent>,
}

impl PlaylistScheduler {
    /// Scheduler seeded from the operating system
    pub fn new(policy: RefillPolicy, info: InfoLog) -> Self {
        Self::with_rng(policy, info, StdRng::from_os_rng())
    }

    /// Scheduler drawing refills from `rng`
    pub fn with_rng(policy: RefillPolicy, info: InfoLog, rng: StdRng) -> Self {
        let policy = RefillPolicy {
            batch_size: policy.batch_size.max(1),
            ..policy
        };
        Self {
            snapshot: CatalogSnapshot::empty(),
            loaded: false,
            queue: Vec::new(),
            current: None,
            policy,
            rng,
            info,
            events: VecDeque::new(),
        }
    }

    /// Applies a poll result
    ///
    /// On the initial load nothing is queued and `advance()` runs once. Later
    /// snapshots queue every id they add, and restart playback when nothing
    /// is current.
    pub fn on_snapshot(&mut self, snapshot: CatalogSnapshot, initial: bool) {
        let config_changed = !self.loaded || snapshot.config() != self.snapshot.config();

        if initial {
            self.info.push(format!("Got {} items", snapshot.len()));
        } else {
            let new_ids = snapshot.new_ids_since(&self.snapshot);
            if !new_ids.is_empty() {
                tracing::debug!(count = new_ids.len(), "New items queued");
                for id in &new_ids {
                    self.info.push("!!! NEW CLIP INCOMING !!!");
                    self.queue.push(id.clone());
                }
                self.events
                    .push_back(SchedulerEvent::NewItemsDetected(new_ids));
            }
        }

        self.snapshot = snapshot;
        self.loaded = true;

        if config_changed {
            self.events
                .push_back(SchedulerEvent::TimeoutConfigChanged(self.snapshot.config()));
        }

        if initial || (self.current.is_none() && !self.snapshot.is_empty()) {
            self.advance();
        }
    }

    /// Moves to the next queued item, refilling the queue when empty
    pub fn advance(&mut self) -> Option<&ItemId> {
        let previous = self.current.take();

        if self.snapshot.is_empty() {
            tracing::debug!("No items available for advance");
            self.info.push("Playlist empty.");
            if previous.is_some() {
                self.events.push_back(SchedulerEvent::CurrentItemChanged {
                    previous,
                    current: None,
                });
            }
            return None;
        }

        if self.queue.is_empty() {
            self.refill();
        }

        self.current = self.queue.pop();
        if let Some(id) = &self.current {
            self.info.push(format!("Now playing item #{}", id));
            let event = if previous.as_ref() == Some(id) {
                SchedulerEvent::CurrentItemRepeated(id.clone())
            } else {
                SchedulerEvent::CurrentItemChanged {
                    previous,
                    current: Some(id.clone()),
                }
            };
            self.events.push_back(event);
        }
        self.current.as_ref()
    }

    /// Draws a batch of ids with replacement and queues it
    ///
    /// Does nothing on an empty catalog.
    pub fn refill(&mut self) {
        let ids: Vec<&ItemId> = self.snapshot.ids().collect();
        if ids.is_empty() {
            return;
        }

        self.info.push("Shuffling..");
        let batch: Vec<ItemId> = (0..self.policy.batch_size)
            .map(|_| {
                let u: f64 = self.rng.random();
                ids[self.policy.sample_index(u, ids.len())].clone()
            })
            .collect();

        tracing::debug!(batch = ?batch, "Playlist refilled");
        self.queue.extend(batch.iter().cloned());
        self.events.push_back(SchedulerEvent::Refilled(batch));
    }

    /// URL of `id` in the current snapshot; absent once the item was dropped
    pub fn resolve_url(&self, id: &ItemId) -> Option<&str> {
        self.snapshot.get(id).map(|item| item.url.as_str())
    }

    /// The current item, when it is still published
    pub fn current_item(&self) -> Option<&Item> {
        self.current.as_ref().and_then(|id| self.snapshot.get(id))
    }

    pub fn current(&self) -> Option<&ItemId> {
        self.current.as_ref()
    }

    /// Queued ids, bottom first; the last one plays next
    pub fn queue(&self) -> &[ItemId] {
        &self.queue
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    pub fn policy(&self) -> RefillPolicy {
        self.policy
    }

    /// Takes every event recorded since the last call
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn snapshot(ids: &[&str], config: TimeoutConfig) -> CatalogSnapshot {
        CatalogSnapshot::new(
            ids.iter().map(|id| Item::new(*id, format!("{}.mp4", id))),
            config,
        )
    }

    fn scheduler() -> PlaylistScheduler {
        PlaylistScheduler::with_rng(
            RefillPolicy::default(),
            InfoLog::default(),
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn test_sample_index_bounds_and_skew() {
        let policy = RefillPolicy::default();
        assert_eq!(policy.sample_index(0.0, 10), 0);
        assert_eq!(policy.sample_index(0.999_999, 10), 9);
        assert_eq!(policy.sample_index(0.5, 1), 0);
        // 0.5^0.8 ~ 0.574
        assert_eq!(policy.sample_index(0.5, 10), 5);

        let linear = RefillPolicy { batch_size: 5, skew: 1.0 };
        assert_eq!(linear.sample_index(0.5, 10), 5);
        assert_eq!(linear.sample_index(0.45, 10), 4);
        assert_eq!(policy.sample_index(0.45, 10), 5);
    }

    #[test]
    fn test_initial_load_selects_an_item_without_queueing_the_diff() {
        let mut s = scheduler();
        s.on_snapshot(snapshot(&["1"], TimeoutConfig::disabled()), true);

        assert_eq!(s.current(), Some(&ItemId::from("1")));
        // refill batch minus the popped entry
        assert_eq!(s.queue().len(), DEFAULT_REFILL_SIZE - 1);

        let events = s.drain_events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, SchedulerEvent::NewItemsDetected(_))));
        assert!(events.contains(&SchedulerEvent::TimeoutConfigChanged(TimeoutConfig::disabled())));
        assert!(events.contains(&SchedulerEvent::CurrentItemChanged {
            previous: None,
            current: Some(ItemId::from("1")),
        }));
    }

    #[test]
    fn test_merge_queues_each_new_id_once() {
        let mut s = scheduler();
        let s1 = snapshot(&["1", "2", "3"], TimeoutConfig::disabled());
        let s2 = snapshot(&["1", "2", "3", "4", "5"], TimeoutConfig::disabled());

        s.on_snapshot(s1, true);
        let before = s.queue().to_vec();
        s.on_snapshot(s2, false);

        let after = s.queue();
        assert_eq!(&after[..before.len()], before.as_slice());
        assert_eq!(&after[before.len()..], &[ItemId::from("4"), ItemId::from("5")]);
        for new_id in ["4", "5"] {
            let count = after.iter().filter(|id| id.as_str() == new_id).count();
            assert_eq!(count, 1);
        }
        assert!(s.drain_events().contains(&SchedulerEvent::NewItemsDetected(vec![
            ItemId::from("4"),
            ItemId::from("5")
        ])));
    }

    #[test]
    fn test_identical_snapshot_keeps_queue_length() {
        let mut s = scheduler();
        let snap = snapshot(&["1", "2"], TimeoutConfig::disabled());
        s.on_snapshot(snap.clone(), true);
        let len = s.queue().len();
        s.drain_events();

        s.on_snapshot(snap, false);
        assert_eq!(s.queue().len(), len);
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_refill_draws_batch_from_current_ids() {
        let mut s = scheduler();
        s.on_snapshot(snapshot(&["1", "2", "3", "a"], TimeoutConfig::disabled()), false);
        let ids: HashSet<ItemId> = s.snapshot().ids().cloned().collect();
        let start = s.queue().len();

        s.refill();

        assert_eq!(s.queue().len(), start + DEFAULT_REFILL_SIZE);
        assert!(s.queue()[start..].iter().all(|id| ids.contains(id)));
    }

    #[test]
    fn test_refill_on_empty_catalog_is_a_noop() {
        let mut s = scheduler();
        s.refill();
        assert!(s.queue().is_empty());
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_advance_on_empty_catalog() {
        let mut s = scheduler();
        assert_eq!(s.advance(), None);
        assert_eq!(s.current(), None);

        s.on_snapshot(snapshot(&[], TimeoutConfig::disabled()), true);
        assert_eq!(s.current(), None);
        assert!(s.queue().is_empty());
    }

    #[test]
    fn test_advance_to_none_when_catalog_empties() {
        let mut s = scheduler();
        s.on_snapshot(snapshot(&["1"], TimeoutConfig::disabled()), true);
        s.on_snapshot(snapshot(&[], TimeoutConfig::disabled()), false);
        s.drain_events();

        assert_eq!(s.advance(), None);
        assert_eq!(
            s.drain_events(),
            vec![SchedulerEvent::CurrentItemChanged {
                previous: Some(ItemId::from("1")),
                current: None,
            }]
        );
    }

    #[test]
    fn test_new_items_restart_playback_from_empty_state() {
        let mut s = scheduler();
        s.on_snapshot(snapshot(&[], TimeoutConfig::disabled()), true);
        assert_eq!(s.current(), None);

        s.on_snapshot(snapshot(&["9"], TimeoutConfig::disabled()), false);
        assert_eq!(s.current(), Some(&ItemId::from("9")));
    }

    #[test]
    fn test_stale_current_item_keeps_playing_without_url() {
        let mut s = scheduler();
        s.on_snapshot(snapshot(&["1"], TimeoutConfig::disabled()), true);
        let id = ItemId::from("1");
        assert_eq!(s.resolve_url(&id), Some("1.mp4"));
        assert_eq!(s.resolve_url(&id), s.resolve_url(&id));

        s.on_snapshot(snapshot(&["2"], TimeoutConfig::disabled()), false);
        assert_eq!(s.current(), Some(&id));
        assert_eq!(s.resolve_url(&id), None);
        assert!(s.current_item().is_none());
    }

    #[test]
    fn test_single_item_catalog_repeats() {
        let mut s = scheduler();
        s.on_snapshot(snapshot(&["1"], TimeoutConfig::disabled()), true);
        s.drain_events();

        s.advance();
        assert_eq!(
            s.drain_events(),
            vec![SchedulerEvent::CurrentItemRepeated(ItemId::from("1"))]
        );
    }

    #[test]
    fn test_timeout_config_change_is_reported() {
        let mut s = scheduler();
        s.on_snapshot(snapshot(&["1"], TimeoutConfig::disabled()), true);
        s.drain_events();

        let enabled = TimeoutConfig::after(Duration::from_secs(5));
        s.on_snapshot(snapshot(&["1"], enabled), false);
        assert_eq!(
            s.drain_events(),
            vec![SchedulerEvent::TimeoutConfigChanged(enabled)]
        );
    }

    #[test]
    fn test_info_lines() {
        let info = InfoLog::default();
        let mut s =
            PlaylistScheduler::with_rng(RefillPolicy::default(), info.clone(), StdRng::seed_from_u64(1));
        s.on_snapshot(snapshot(&["1"], TimeoutConfig::disabled()), true);
        s.on_snapshot(snapshot(&["1", "2"], TimeoutConfig::disabled()), false);

        assert_eq!(
            info.recent(10),
            vec![
                "Got 1 items",
                "Shuffling..",
                "Now playing item #1",
                "!!! NEW CLIP INCOMING !!!",
            ]
        );
    }
}
