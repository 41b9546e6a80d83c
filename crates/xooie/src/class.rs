//! Classes, extension chains and construction countdowns.
//!
//! A [`Class`] bundles the property and role declarations of a widget or
//! addon type with an ordered list of constructor layers. [`Class::extend`]
//! produces a derived class whose chain is the base chain followed by one
//! new layer; every layer runs against the same instance, base first.
//!
//! Each instance tracks a countdown that starts at the class's extend count
//! and drops by one after every layer. The instance settles (addons attach,
//! the init event fires) only once the countdown reaches zero. A layer that
//! finishes asynchronously calls `hold()` and keeps the returned
//! [`SettleGuard`] alive until its work is done.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use xooie_core::logging::targets;
use xooie_core::TaskQueue;

use crate::error::{PropertyError, Result};
use crate::property::{Access, PropertyTable};
use crate::role::RoleTable;

/// One constructor layer of an extension chain.
pub type Constructor<H> = Arc<dyn Fn(&H) -> Result<()> + Send + Sync>;

/// A widget or addon type: declarations plus a constructor chain.
pub struct Class<H> {
    name: String,
    properties: PropertyTable<H>,
    roles: RoleTable<H>,
    layers: Vec<Constructor<H>>,
}

impl<H> Class<H> {
    /// A class with no declarations and an empty chain.
    pub(crate) fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: PropertyTable::new(),
            roles: RoleTable::new(),
            layers: Vec::new(),
        }
    }

    /// The class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the class.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of layers added by [`Class::extend`]; zero for a base class.
    pub fn extend_count(&self) -> usize {
        self.layers.len()
    }

    /// The property declarations.
    pub fn properties(&self) -> &PropertyTable<H> {
        &self.properties
    }

    /// The role declarations.
    pub fn roles(&self) -> &RoleTable<H> {
        &self.roles
    }

    pub(crate) fn roles_mut(&mut self) -> &mut RoleTable<H> {
        &mut self.roles
    }

    pub(crate) fn properties_mut(&mut self) -> &mut PropertyTable<H> {
        &mut self.properties
    }

    // =========================================================================
    // Property Declarations
    // =========================================================================

    /// Declare a read-only property with a default.
    pub fn define_read_only(&mut self, name: &str, default: impl Into<Value>) {
        self.properties
            .declare(name, Access::ReadOnly, Some(default.into()));
    }

    /// Declare a write-only property. An existing default is kept.
    pub fn define_write_only(&mut self, name: &str) {
        self.properties.declare(name, Access::WriteOnly, None);
    }

    /// Declare a read-write property with a default.
    pub fn define(&mut self, name: &str, default: impl Into<Value>) {
        self.properties
            .declare(name, Access::ReadWrite, Some(default.into()));
    }

    /// Install a read processor on a declared property.
    pub fn set_processor<F>(&mut self, name: &str, processor: F) -> std::result::Result<(), PropertyError>
    where
        F: Fn(&H, Value) -> Value + Send + Sync + 'static,
    {
        self.properties.set_processor(name, Arc::new(processor))
    }

    /// Install a write validator on a declared property.
    pub fn set_validator<F>(&mut self, name: &str, validator: F) -> std::result::Result<(), PropertyError>
    where
        F: Fn(&H, &Value) -> bool + Send + Sync + 'static,
    {
        self.properties.set_validator(name, Arc::new(validator))
    }

    // =========================================================================
    // Extension
    // =========================================================================

    /// Derive a class whose chain ends with `constructor`.
    ///
    /// The derived class copies this class's declarations; definitions made
    /// on it afterwards do not affect this class.
    pub fn extend<F>(&self, constructor: F) -> Self
    where
        F: Fn(&H) -> Result<()> + Send + Sync + 'static,
    {
        let mut derived = self.clone();
        derived.layers.push(Arc::new(constructor));
        tracing::trace!(
            target: targets::WIDGET,
            class = %self.name,
            extend_count = derived.extend_count(),
            "extended class"
        );
        derived
    }

    /// Freeze the class for instantiation.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Run every layer against `host`, base first.
    ///
    /// The countdown drops after each layer returns. The first failing
    /// layer stops the chain.
    pub(crate) fn run_layers(&self, host: &H, countdown: &Countdown) -> Result<()> {
        for (depth, layer) in self.layers.iter().enumerate() {
            layer(host)?;
            countdown.complete_one();
            tracing::trace!(
                target: targets::WIDGET,
                class = %self.name,
                depth,
                pending = countdown.pending(),
                "constructor layer finished"
            );
        }
        Ok(())
    }
}

impl<H> Clone for Class<H> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            properties: self.properties.clone(),
            roles: self.roles.clone(),
            layers: self.layers.clone(),
        }
    }
}

impl<H> fmt::Debug for Class<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("properties", &self.properties.names().collect::<Vec<_>>())
            .field("roles", &self.roles.names().collect::<Vec<_>>())
            .field("extend_count", &self.extend_count())
            .finish()
    }
}

// =============================================================================
// Settle Countdown
// =============================================================================

/// Where an instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructor layers or holds are outstanding, or settle has not run yet.
    Constructing {
        /// Layers and holds still outstanding.
        pending: usize,
    },
    /// Settled: addons attached and the init event fired.
    Active,
    /// Cleaned up. Terminal.
    CleanedUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Constructing,
    Active,
    CleanedUp,
}

impl Phase {
    pub(crate) fn lifecycle(self, countdown: &Countdown) -> Lifecycle {
        match self {
            Phase::Constructing => Lifecycle::Constructing {
                pending: countdown.pending(),
            },
            Phase::Active => Lifecycle::Active,
            Phase::CleanedUp => Lifecycle::CleanedUp,
        }
    }
}

#[derive(Debug)]
struct CountdownState {
    pending: AtomicUsize,
    cancelled: AtomicBool,
}

/// Outstanding work before an instance may settle.
#[derive(Debug, Clone)]
pub(crate) struct Countdown {
    state: Arc<CountdownState>,
}

impl Countdown {
    pub(crate) fn new(start: usize) -> Self {
        Self {
            state: Arc::new(CountdownState {
                pending: AtomicUsize::new(start),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    pub(crate) fn complete_one(&self) {
        let _ = self
            .state
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub(crate) fn hold(&self) -> SettleGuard {
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        SettleGuard {
            countdown: self.clone(),
        }
    }

    /// Stop any scheduled settle poll.
    pub(crate) fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }
}

/// Keeps an instance from settling while alive.
///
/// Obtained from `Widget::hold` or `Addon::hold` inside a constructor layer
/// whose work completes later. Dropping the guard releases the hold.
#[must_use = "the hold is released as soon as the guard is dropped"]
pub struct SettleGuard {
    countdown: Countdown,
}

impl SettleGuard {
    /// Release the hold now.
    pub fn release(self) {}
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.countdown.complete_one();
    }
}

impl fmt::Debug for SettleGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettleGuard")
            .field("pending", &self.countdown.pending())
            .finish()
    }
}

/// Post a settle poll that runs `settle` once the countdown reaches zero.
///
/// The poll re-posts itself every turn until then. It stops without
/// settling if the countdown is cancelled.
pub(crate) fn schedule_settle<F>(
    tasks: &Arc<TaskQueue>,
    countdown: Countdown,
    poll_limit: Option<u32>,
    label: String,
    settle: F,
) where
    F: FnOnce() + Send + 'static,
{
    let queue = Arc::clone(tasks);
    tasks.post(move || poll_settle(queue, countdown, 0, poll_limit, label, Box::new(settle)));
}

fn poll_settle(
    tasks: Arc<TaskQueue>,
    countdown: Countdown,
    polls: u32,
    poll_limit: Option<u32>,
    label: String,
    settle: Box<dyn FnOnce() + Send>,
) {
    if countdown.is_cancelled() {
        tracing::trace!(target: targets::WIDGET, instance = %label, "settle poll cancelled");
        return;
    }
    if countdown.pending() == 0 {
        tracing::trace!(target: targets::WIDGET, instance = %label, polls, "settling");
        settle();
        return;
    }
    if poll_limit == Some(polls) {
        tracing::warn!(
            target: targets::WIDGET,
            instance = %label,
            polls,
            pending = countdown.pending(),
            "construction has not settled; a constructor may never release its hold"
        );
    }
    let queue = Arc::clone(&tasks);
    tasks.post(move || {
        poll_settle(queue, countdown, polls.saturating_add(1), poll_limit, label, settle)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Probe {
        log: Mutex<Vec<&'static str>>,
    }

    fn probe() -> Probe {
        Probe {
            log: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn extend_appends_layers() {
        let base = Class::<Probe>::bare("base");
        assert_eq!(base.extend_count(), 0);

        let first = base.extend(|p: &Probe| {
            p.log.lock().push("first");
            Ok(())
        });
        let second = first.extend(|p: &Probe| {
            p.log.lock().push("second");
            Ok(())
        });
        assert_eq!(first.extend_count(), 1);
        assert_eq!(second.extend_count(), 2);

        let host = probe();
        let countdown = Countdown::new(second.extend_count());
        second.run_layers(&host, &countdown).unwrap();
        assert_eq!(*host.log.lock(), vec!["first", "second"]);
        assert_eq!(countdown.pending(), 0);
    }

    #[test]
    fn derived_declarations_do_not_leak() {
        let mut base = Class::<Probe>::bare("base");
        base.define("shared", json!(1));
        let mut derived = base.extend(|_: &Probe| Ok(()));
        derived.define("extra", json!(2));

        assert!(derived.properties().contains("shared"));
        assert!(!base.properties().contains("extra"));
    }

    #[test]
    fn failing_layer_stops_chain() {
        let class = Class::<Probe>::bare("base")
            .extend(|_: &Probe| Err(crate::XooieError::constructor("boom")))
            .extend(|p: &Probe| {
                p.log.lock().push("unreached");
                Ok(())
            });
        let host = probe();
        let countdown = Countdown::new(class.extend_count());
        assert!(class.run_layers(&host, &countdown).is_err());
        assert!(host.log.lock().is_empty());
        assert_eq!(countdown.pending(), 2);
    }

    #[test]
    fn guard_holds_countdown() {
        let countdown = Countdown::new(1);
        let guard = countdown.hold();
        countdown.complete_one();
        assert_eq!(countdown.pending(), 1);
        guard.release();
        assert_eq!(countdown.pending(), 0);
        countdown.complete_one();
        assert_eq!(countdown.pending(), 0);
    }

    #[test]
    fn settle_waits_for_countdown() {
        let tasks = Arc::new(TaskQueue::new());
        let countdown = Countdown::new(0);
        let guard = countdown.hold();
        let settled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&settled);
        schedule_settle(&tasks, countdown, None, "test".into(), move || {
            flag.store(true, Ordering::SeqCst)
        });

        tasks.run_turn();
        tasks.run_turn();
        assert!(!settled.load(Ordering::SeqCst));
        drop(guard);
        tasks.run_turn();
        assert!(settled.load(Ordering::SeqCst));
        assert!(!tasks.has_pending());
    }

    #[test]
    fn cancelled_poll_stops() {
        let tasks = Arc::new(TaskQueue::new());
        let countdown = Countdown::new(1);
        schedule_settle(&tasks, countdown.clone(), Some(1), "test".into(), || {
            panic!("must not settle")
        });
        tasks.run_turn();
        tasks.run_turn();
        countdown.cancel();
        tasks.run_turn();
        assert!(!tasks.has_pending());
    }
}
