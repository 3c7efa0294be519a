#![forbid(unsafe_code)]

//! Cancellable timers on a host-driven clock.
//!
//! Nothing here sleeps. The host advances time and drains due timers with
//! [`Timers::pop_due`]; each timer carries a caller-defined payload `K`.
//!
//! Timers are scheduled through a [`TimerScope`]. Dropping the scope cancels
//! every timer it still owns, so work tied to a scope (one tour step, one
//! tour session) can never fire after the scope is gone.
//!
//! # Invariants
//!
//! 1. Timers fire in deadline order; equal deadlines fire in scheduling order.
//! 2. A cancelled timer is never returned by `pop_due`.
//! 3. `pop_due` releases the queue borrow before returning, so handling a
//!    timer may freely schedule or cancel others (including dropping scopes).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Handle to one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Deadline-ordered timer storage.
pub struct TimerQueue<K> {
    next_id: u64,
    pending: BTreeMap<(Duration, u64), K>,
    deadlines: HashMap<u64, Duration>,
}

impl<K> TimerQueue<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, deadline: Duration, kind: K) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert((deadline, id), kind);
        self.deadlines.insert(id, deadline);
        TimerId(id)
    }

    /// Cancel a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id.0) {
            Some(deadline) => self.pending.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id.0)
    }

    /// Remove and return the earliest timer with `deadline <= now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerId, K)> {
        let (&(deadline, id), _) = self.pending.first_key_value()?;
        if deadline > now {
            return None;
        }
        let kind = self.pending.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((TimerId(id), kind))
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.first_key_value().map(|(&(deadline, _), _)| deadline)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for TimerQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.pending.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

/// Shared handle to a [`TimerQueue`]. Clones refer to the same queue.
pub struct Timers<K> {
    queue: Rc<RefCell<TimerQueue<K>>>,
}

impl<K> Timers<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(TimerQueue::new())),
        }
    }

    /// Open a new, empty scope on this queue.
    #[must_use]
    pub fn scope(&self) -> TimerScope<K> {
        TimerScope {
            queue: Rc::downgrade(&self.queue),
            ids: Vec::new(),
        }
    }

    pub fn pop_due(&self, now: Duration) -> Option<(TimerId, K)> {
        self.queue.borrow_mut().pop_due(now)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.borrow().next_deadline()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Clone for Timers<K> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
        }
    }
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for Timers<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.queue.borrow(), f)
    }
}

/// Owner of a group of timers. Dropping the scope cancels them all.
pub struct TimerScope<K> {
    queue: Weak<RefCell<TimerQueue<K>>>,
    ids: Vec<TimerId>,
}

impl<K> TimerScope<K> {
    /// Schedule a timer owned by this scope.
    ///
    /// Returns `None` only if the queue itself has been dropped.
    pub fn schedule(&mut self, deadline: Duration, kind: K) -> Option<TimerId> {
        let queue = self.queue.upgrade()?;
        let mut queue = queue.borrow_mut();
        self.ids.retain(|id| queue.contains(*id));
        let id = queue.schedule(deadline, kind);
        self.ids.push(id);
        Some(id)
    }

    /// Cancel every timer this scope still owns.
    pub fn cancel_all(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        if let Some(queue) = self.queue.upgrade() {
            let mut queue = queue.borrow_mut();
            for id in self.ids.drain(..) {
                queue.cancel(id);
            }
        } else {
            self.ids.clear();
        }
    }

    /// Number of timers from this scope still waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        match self.queue.upgrade() {
            Some(queue) => {
                let queue = queue.borrow();
                self.ids.iter().filter(|id| queue.contains(**id)).count()
            }
            None => 0,
        }
    }
}

impl<K> Drop for TimerScope<K> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl<K> fmt::Debug for TimerScope<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerScope")
            .field("owned", &self.ids.len())
            .finish()
    }
}
