//! Crawl frontier: the shared work queue, the seen-set and the page quota
//!
//! Workers take items with [`Frontier::next`], which hands out a
//! [`FrontierLease`]. Dropping the lease marks the item accounted for. The
//! crawl is finished when the queue is empty and no lease is outstanding;
//! waiting workers are woken through a [`Notify`] rather than by polling.
//!
//! The page quota works the same way: [`Frontier::claim_quota`] reserves a
//! slot as a [`QuotaClaim`], which only counts once committed. A claim
//! dropped without commit hands its slot back.

use std::collections::{HashSet, VecDeque};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierItem {
    /// Canonical URL
    pub url: String,
    /// BFS distance from the nearest seed
    pub depth: u32,
}

impl FrontierItem {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<FrontierItem>,
    /// URLs dequeued at least once during this run
    seen: HashSet<String>,
    in_flight: usize,
    discarded: u64,
}

/// Shared scheduler state for one crawl run
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
    reserved: AtomicU64,
    fetched: AtomicU64,
    max_pages: u64,
    stopped: AtomicBool,
}

impl Frontier {
    /// Creates an empty frontier with a budget of `max_pages` successful fetches
    pub fn new(max_pages: u64) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            changed: Notify::new(),
            reserved: AtomicU64::new(0),
            fetched: AtomicU64::new(0),
            max_pages,
            stopped: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueues an item unless it was already dequeued or the quota is spent
    ///
    /// Returns true if the item was queued.
    pub fn push(&self, item: FrontierItem) -> bool {
        if self.is_stopped() {
            return false;
        }

        {
            let mut state = self.lock();
            if state.seen.contains(&item.url) {
                return false;
            }
            state.queue.push_back(item);
        }

        self.changed.notify_waiters();
        true
    }

    /// Enqueues seed URLs at depth 0, returning how many were queued
    pub fn seed<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .map(|url| self.push(FrontierItem::new(url, 0)))
            .filter(|queued| *queued)
            .count()
    }

    /// Waits for the next item to process
    ///
    /// Returns `None` once the queue is empty with no lease outstanding, or
    /// when `cancel` fires. After the quota stop flag is set, queued items are
    /// drained and discarded without being handed out.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<FrontierLease<'_>> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                while let Some(item) = state.queue.pop_front() {
                    if self.is_stopped() {
                        state.discarded += 1;
                        continue;
                    }
                    if !state.seen.insert(item.url.clone()) {
                        continue;
                    }
                    state.in_flight += 1;
                    return Some(FrontierLease {
                        frontier: self,
                        item,
                    });
                }

                if state.in_flight == 0 {
                    drop(state);
                    self.changed.notify_waiters();
                    return None;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Reserves one slot of the page quota
    ///
    /// Returns `None` if every slot is reserved or spent. The slot counts
    /// toward the quota only once [`QuotaClaim::commit`] is called.
    pub fn claim_quota(&self) -> Option<QuotaClaim<'_>> {
        let max = self.max_pages;
        match self
            .reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then(|| n + 1))
        {
            Ok(_) => Some(QuotaClaim {
                frontier: self,
                committed: false,
            }),
            Err(_) => {
                if self.fetched() >= max {
                    self.stopped.store(true, Ordering::SeqCst);
                }
                None
            }
        }
    }

    /// Returns true once the quota has been reached
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Number of successful fetches committed so far
    pub fn fetched(&self) -> u64 {
        self.fetched.load(Ordering::SeqCst)
    }

    /// Number of URLs handed out to workers
    pub fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }

    /// Number of queued items dropped after the stop flag was set
    pub fn discarded(&self) -> u64 {
        self.lock().discarded
    }

    /// Number of items waiting in the queue
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self) {
        let done = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.queue.is_empty() && state.in_flight == 0
        };
        if done {
            self.changed.notify_waiters();
        }
    }
}

/// An item checked out to a worker
///
/// The frontier counts the item as in flight until the lease is dropped, so
/// the pool cannot terminate while a worker may still enqueue children.
#[derive(Debug)]
pub struct FrontierLease<'a> {
    frontier: &'a Frontier,
    item: FrontierItem,
}

impl Deref for FrontierLease<'_> {
    type Target = FrontierItem;

    fn deref(&self) -> &FrontierItem {
        &self.item
    }
}

impl Drop for FrontierLease<'_> {
    fn drop(&mut self) {
        self.frontier.release();
    }
}

/// A reserved quota slot
///
/// Committing turns the reservation into a counted fetch. Dropping an
/// uncommitted claim returns the slot to the pool.
#[derive(Debug)]
pub struct QuotaClaim<'a> {
    frontier: &'a Frontier,
    committed: bool,
}

impl QuotaClaim<'_> {
    /// Counts the fetch and returns the new success count
    ///
    /// Committing the last slot sets the stop flag.
    pub fn commit(mut self) -> u64 {
        self.committed = true;
        let frontier = self.frontier;
        let count = frontier.fetched.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= frontier.max_pages {
            frontier.stopped.store(true, Ordering::SeqCst);
        }
        count
    }
}

impl Drop for QuotaClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.frontier.reserved.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
