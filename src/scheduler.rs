//! Drift-correcting periodic driver.
//!
//! A [`Scheduler`] owns a list of subscribers and calls each one's tick
//! callback once per interval, in registration order. Every tick aims at
//! `start + k × interval`: a late tick shortens the next wait by however
//! late it was. After a stall longer than a whole interval the schedule is
//! re-anchored at the current time instead of firing a burst of catch-up
//! ticks.
//!
//! When a tick callback fails, the remaining callbacks for that tick are
//! skipped, every subscriber receives the error, the list is emptied and
//! the scheduler halts until something subscribes again.
//!
//! The scheduler never blocks on its own: [`Scheduler::poll`] fires a tick
//! only when its deadline has passed, so a host event loop can wait on
//! input in between. [`Scheduler::run`] is the blocking variant.

use crate::error::{Result, VmError};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Time source for the scheduler.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

type TickFn = Box<dyn FnMut() -> Result<()>>;
type ErrorFn = Box<dyn FnMut(&VmError)>;

struct Subscriber {
    id: u64,
    on_tick: TickFn,
    on_error: ErrorFn,
}

#[derive(Default)]
struct Registry {
    subscribers: Vec<Subscriber>,
    /// Ids unsubscribed while their entry was checked out for a tick.
    removed: Vec<u64>,
    next_id: u64,
}

/// Handle returned by [`Scheduler::subscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    /// Stop receiving ticks. Safe to call from inside a tick callback and
    /// more than once; a call made during a tick takes effect once it ends.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut registry) = registry.try_borrow_mut() else {
            return;
        };

        let before = registry.subscribers.len();
        registry.subscribers.retain(|s| s.id != self.id);
        if registry.subscribers.len() == before && !registry.removed.contains(&self.id) {
            registry.removed.push(self.id);
        }
    }
}

/// Outcome of [`Scheduler::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// No subscribers; the scheduler is halted.
    Idle,
    /// The next tick is due after this long.
    Pending(Duration),
    /// A tick ran and every callback succeeded.
    Ticked,
    /// A tick callback failed; all subscribers were notified and dropped.
    Failed(VmError),
}

/// Periodic driver with drift correction.
pub struct Scheduler<C: Clock = SystemClock> {
    clock: C,
    interval: Duration,
    registry: Rc<RefCell<Registry>>,
    /// Ideal time of the next tick, `None` while halted.
    expected: Option<Instant>,
    ticks: u64,
}

impl Scheduler<SystemClock> {
    /// Create a scheduler ticking every `interval` of wall-clock time.
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    /// Create a scheduler over a custom time source.
    pub fn with_clock(interval: Duration, clock: C) -> Self {
        Self {
            clock,
            interval,
            registry: Rc::new(RefCell::new(Registry::default())),
            expected: None,
            ticks: 0,
        }
    }

    /// Register a listener. The first subscriber starts the schedule.
    pub fn subscribe(
        &mut self,
        on_tick: impl FnMut() -> Result<()> + 'static,
        on_error: impl FnMut(&VmError) + 'static,
    ) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.subscribers.push(Subscriber {
                id,
                on_tick: Box::new(on_tick),
                on_error: Box::new(on_error),
            });
            id
        };

        if self.expected.is_none() {
            self.expected = Some(self.clock.now() + self.interval);
            log::debug!("scheduler started, interval {:?}", self.interval);
        }

        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().subscribers.len()
    }

    /// Whether a tick is scheduled.
    pub fn is_running(&self) -> bool {
        self.expected.is_some()
    }

    /// Ticks fired since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Time left until the next tick, `None` while halted.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.expected
            .map(|expected| expected.saturating_duration_since(self.clock.now()))
    }

    /// Fire a tick if one is due.
    pub fn poll(&mut self) -> Tick {
        let Some(mut expected) = self.expected else {
            return Tick::Idle;
        };

        let now = self.clock.now();
        if now < expected {
            return Tick::Pending(expected - now);
        }

        let mut drift = now - expected;
        if drift > self.interval {
            log::warn!("scheduler stalled for {:?}, resynchronising", drift);
            expected = now;
            drift = Duration::ZERO;
        }

        if self.subscriber_count() == 0 {
            self.halt();
            return Tick::Idle;
        }

        if let Err(err) = self.fire() {
            return Tick::Failed(err);
        }

        self.ticks += 1;
        // The next wait is `interval - drift`, i.e. the next deadline is
        // the ideal one.
        self.expected = Some(now + self.interval.saturating_sub(drift));
        Tick::Ticked
    }

    /// Tick until no subscribers remain, sleeping between deadlines.
    ///
    /// Returns the error that halted the scheduler, if any.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.poll() {
                Tick::Idle => return Ok(()),
                Tick::Pending(wait) => self.clock.sleep(wait),
                Tick::Ticked => {}
                Tick::Failed(err) => return Err(err),
            }
        }
    }

    /// Call every subscriber once; on failure notify all of them and clear.
    fn fire(&mut self) -> Result<()> {
        // Subscribers are checked out so callbacks may subscribe or
        // unsubscribe without re-entering the borrow.
        let mut active = std::mem::take(&mut self.registry.borrow_mut().subscribers);

        let mut failure = None;
        for subscriber in active.iter_mut() {
            if let Err(err) = (subscriber.on_tick)() {
                failure = Some(err);
                break;
            }
        }

        let mut registry = self.registry.borrow_mut();
        active.append(&mut registry.subscribers);
        let removed = std::mem::take(&mut registry.removed);
        active.retain(|s| !removed.contains(&s.id));

        match failure {
            None => {
                registry.subscribers = active;
                Ok(())
            }
            Some(err) => {
                drop(registry);
                log::error!("tick failed: {}; dropping {} subscribers", err, active.len());
                for subscriber in active.iter_mut() {
                    (subscriber.on_error)(&err);
                }
                self.halt();
                Err(err)
            }
        }
    }

    fn halt(&mut self) {
        if self.expected.take().is_some() {
            log::debug!("scheduler stopped after {} ticks", self.ticks);
        }
    }
}

impl<C: Clock> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("subscribers", &self.subscriber_count())
            .field("running", &self.is_running())
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Clock that only moves when told to.
    #[derive(Debug, Clone)]
    pub(crate) struct ManualClock {
        now: Rc<Cell<Instant>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    const INTERVAL: Duration = Duration::from_millis(100);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn scheduler() -> (Scheduler<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (Scheduler::with_clock(INTERVAL, clock.clone()), clock)
    }

    fn counter() -> (Rc<Cell<u32>>, impl FnMut() -> Result<()>) {
        let count = Rc::new(Cell::new(0));
        let inner = count.clone();
        (count, move || {
            inner.set(inner.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn test_idle_without_subscribers() {
        let (mut sched, _) = scheduler();
        assert_eq!(sched.poll(), Tick::Idle);
        assert_eq!(sched.next_deadline(), None);
        assert!(!sched.is_running());
    }

    #[test]
    fn test_first_subscription_starts() {
        let (mut sched, clock) = scheduler();
        let (count, tick) = counter();
        sched.subscribe(tick, |_| {});

        assert_eq!(sched.next_deadline(), Some(INTERVAL));
        assert_eq!(sched.poll(), Tick::Pending(INTERVAL));

        clock.advance(INTERVAL);
        assert_eq!(sched.poll(), Tick::Ticked);
        assert_eq!(count.get(), 1);
        assert_eq!(sched.poll(), Tick::Pending(INTERVAL));
    }

    #[test]
    fn test_drift_shortens_next_wait() {
        let (mut sched, clock) = scheduler();
        let (_, tick) = counter();
        sched.subscribe(tick, |_| {});

        // 30ms late
        clock.advance(ms(130));
        assert_eq!(sched.poll(), Tick::Ticked);
        assert_eq!(sched.next_deadline(), Some(ms(70)));

        clock.advance(ms(70));
        assert_eq!(sched.poll(), Tick::Ticked);
        assert_eq!(sched.next_deadline(), Some(INTERVAL));
    }

    #[test]
    fn test_long_stall_resynchronises() {
        let (mut sched, clock) = scheduler();
        let (count, tick) = counter();
        sched.subscribe(tick, |_| {});

        clock.advance(ms(1000));
        assert_eq!(sched.poll(), Tick::Ticked);
        // No burst of catch-up ticks
        assert_eq!(sched.poll(), Tick::Pending(INTERVAL));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_subscribers_run_in_order() {
        let (mut sched, clock) = scheduler();
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            sched.subscribe(
                move || {
                    order.borrow_mut().push(n);
                    Ok(())
                },
                |_| {},
            );
        }

        clock.advance(INTERVAL);
        sched.poll();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_error_reaches_every_subscriber() {
        let (mut sched, clock) = scheduler();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let (late_count, late_tick) = counter();

        let seen = errors.clone();
        sched.subscribe(
            || Err(VmError::StackUnderflow),
            move |err| seen.borrow_mut().push(("first", err.clone())),
        );
        let seen = errors.clone();
        sched.subscribe(late_tick, move |err| {
            seen.borrow_mut().push(("second", err.clone()))
        });

        clock.advance(INTERVAL);
        assert_eq!(sched.poll(), Tick::Failed(VmError::StackUnderflow));

        assert_eq!(late_count.get(), 0);
        assert_eq!(
            *errors.borrow(),
            vec![
                ("first", VmError::StackUnderflow),
                ("second", VmError::StackUnderflow)
            ]
        );
        assert_eq!(sched.subscriber_count(), 0);
        assert_eq!(sched.poll(), Tick::Idle);
    }

    #[test]
    fn test_resubscribe_after_failure() {
        let (mut sched, clock) = scheduler();
        sched.subscribe(|| Err(VmError::StackOverflow), |_| {});
        clock.advance(INTERVAL);
        sched.poll();

        let (count, tick) = counter();
        sched.subscribe(tick, |_| {});
        assert!(sched.is_running());
        clock.advance(INTERVAL);
        assert_eq!(sched.poll(), Tick::Ticked);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_unsubscribe_halts_before_next_tick() {
        let (mut sched, clock) = scheduler();
        let (count, tick) = counter();
        let sub = sched.subscribe(tick, |_| {});

        clock.advance(INTERVAL);
        sched.poll();
        sub.unsubscribe();
        sub.unsubscribe();

        clock.advance(INTERVAL);
        assert_eq!(sched.poll(), Tick::Idle);
        assert_eq!(count.get(), 1);
        assert!(!sched.is_running());
    }

    #[test]
    fn test_unsubscribe_from_inside_tick() {
        let (mut sched, clock) = scheduler();
        let handle: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));

        let inner_handle = handle.clone();
        let inner_count = count.clone();
        let sub = sched.subscribe(
            move || {
                inner_count.set(inner_count.get() + 1);
                if let Some(sub) = inner_handle.borrow().as_ref() {
                    sub.unsubscribe();
                }
                Ok(())
            },
            |_| {},
        );
        *handle.borrow_mut() = Some(sub);
        let (other_count, other) = counter();
        sched.subscribe(other, |_| {});

        clock.advance(INTERVAL);
        assert_eq!(sched.poll(), Tick::Ticked);
        assert_eq!(sched.subscriber_count(), 1);

        clock.advance(INTERVAL);
        sched.poll();
        assert_eq!(count.get(), 1);
        assert_eq!(other_count.get(), 2);
    }

    #[test]
    fn test_unsubscribed_in_failing_tick_gets_no_error() {
        let (mut sched, clock) = scheduler();
        let handle: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let errors = Rc::new(RefCell::new(Vec::new()));

        let inner_handle = handle.clone();
        let seen = errors.clone();
        let sub = sched.subscribe(
            move || {
                if let Some(sub) = inner_handle.borrow().as_ref() {
                    sub.unsubscribe();
                }
                Ok(())
            },
            move |_| seen.borrow_mut().push("leaver"),
        );
        *handle.borrow_mut() = Some(sub);
        let seen = errors.clone();
        sched.subscribe(
            || Err(VmError::StackUnderflow),
            move |_| seen.borrow_mut().push("failing"),
        );

        clock.advance(INTERVAL);
        assert_eq!(sched.poll(), Tick::Failed(VmError::StackUnderflow));
        assert_eq!(*errors.borrow(), vec!["failing"]);
        assert_eq!(sched.subscriber_count(), 0);
    }

    #[test]
    fn test_run_stops_when_last_subscriber_leaves() {
        let (mut sched, clock) = scheduler();
        let handle: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));

        let inner_handle = handle.clone();
        let inner_count = count.clone();
        let sub = sched.subscribe(
            move || {
                inner_count.set(inner_count.get() + 1);
                if inner_count.get() == 5 {
                    if let Some(sub) = inner_handle.borrow().as_ref() {
                        sub.unsubscribe();
                    }
                }
                Ok(())
            },
            |_| {},
        );
        *handle.borrow_mut() = Some(sub);

        let start = clock.now();
        assert_eq!(sched.run(), Ok(()));
        assert_eq!(count.get(), 5);
        assert_eq!(sched.ticks(), 5);
        assert_eq!(clock.now() - start, INTERVAL * 6);
    }

    #[test]
    fn test_run_returns_tick_error() {
        let (mut sched, _) = scheduler();
        sched.subscribe(|| Err(VmError::InvalidRegister(0x10)), |_| {});
        assert_eq!(sched.run(), Err(VmError::InvalidRegister(0x10)));
        assert!(!sched.is_running());
    }
}
