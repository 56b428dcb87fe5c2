//! Reactive signal source. An [`Invalidator`] fires its subscriptions
//! once per clock tick; subscriptions are either permanent or transient, and
//! transient ones are mass-cancelled every time their subscriber invalidates.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::component::Component;
use crate::host::Host;

/// What a subscription's callback does when the invalidator fires.
pub enum Subscriber<H: Host> {
    /// Fires an arbitrary callback.
    Callback(Rc<RefCell<dyn FnMut()>>),
    /// Calls `component.borrow_mut().invalidate(false)`.
    Component(Weak<RefCell<Component<H>>>),
}

/// One of the four subscription kinds a subscriber may hold.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubscriptionKind {
    CallbackPermanent,
    CallbackTransient,
    ComponentPermanent,
    ComponentTransient,
}

impl SubscriptionKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            SubscriptionKind::CallbackTransient | SubscriptionKind::ComponentTransient
        )
    }
}

/// A single subscription held jointly by an [`Invalidator`]'s list and its
/// subscriber's list. Dropped from both sides when either cancels.
pub struct InvalidatorSubscription<H: Host> {
    pub kind: SubscriptionKind,
    subscriber: Subscriber<H>,
    /// Set once the subscription has been cancelled, so a second explicit
    /// cancel (or a cancel racing a fire) is a no-op rather than a double-free.
    cancelled: bool,
}

impl<H: Host> InvalidatorSubscription<H> {
    /// Marks the subscription inert without touching the owning invalidator's
    /// lists — used by a subscriber that does not keep a handle back to the
    /// invalidator(s) it subscribed to (e.g. a disposed component). The dead
    /// `Rc` is reclaimed the next time the invalidator fires or cancels it.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    fn fire(&self) {
        if self.cancelled {
            return;
        }
        match &self.subscriber {
            Subscriber::Callback(cb) => {
                let cb = cb.clone();
                crate::error::isolate_handler(
                    "invalidator subscription callback",
                    std::panic::AssertUnwindSafe(move || (cb.borrow_mut())()),
                );
            }
            Subscriber::Component(weak) => {
                if let Some(component) = weak.upgrade() {
                    Component::invalidate(&component, false);
                }
            }
        }
    }
}

/// A signal source. `mtime` records the scheduler clock at which this
/// invalidator last fired, so redundant invalidations within the same clock
/// tick are no-ops.
pub struct Invalidator<H: Host> {
    mtime: u64,
    permanent: Vec<Rc<RefCell<InvalidatorSubscription<H>>>>,
    transient: Vec<Rc<RefCell<InvalidatorSubscription<H>>>>,
}

impl<H: Host> Default for Invalidator<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> Invalidator<H> {
    pub fn new() -> Self {
        Invalidator {
            mtime: 0,
            permanent: Vec::new(),
            transient: Vec::new(),
        }
    }

    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    /// Fires every subscription (permanent first, then transient) if this
    /// invalidator hasn't already fired at the current clock. Transient
    /// subscriptions are dropped from this invalidator's own list once fired,
    /// matching the "invalidator likewise drops its transient list" rule —
    /// the subscriber side is dropped independently by whichever `invalidate`
    /// call triggered this fire.
    pub fn invalidate(&mut self, clock: u64) {
        if self.mtime >= clock {
            return;
        }
        self.mtime = clock;

        for sub in self.permanent.iter() {
            sub.borrow().fire();
        }
        // Fire from a snapshot: firing a transient subscription may cause its
        // subscriber to clear its whole transient list (including siblings in
        // this very loop), so take the list up front.
        let fired = std::mem::take(&mut self.transient);
        for sub in fired.iter() {
            sub.borrow().fire();
        }
    }

    pub fn subscribe(
        &mut self,
        subscriber: Subscriber<H>,
    ) -> Rc<RefCell<InvalidatorSubscription<H>>> {
        let sub = Rc::new(RefCell::new(InvalidatorSubscription {
            kind: match &subscriber {
                Subscriber::Callback(_) => SubscriptionKind::CallbackPermanent,
                Subscriber::Component(_) => SubscriptionKind::ComponentPermanent,
            },
            subscriber,
            cancelled: false,
        }));
        self.permanent.push(sub.clone());
        sub
    }

    pub fn transient_subscribe(
        &mut self,
        subscriber: Subscriber<H>,
    ) -> Rc<RefCell<InvalidatorSubscription<H>>> {
        let sub = Rc::new(RefCell::new(InvalidatorSubscription {
            kind: match &subscriber {
                Subscriber::Callback(_) => SubscriptionKind::CallbackTransient,
                Subscriber::Component(_) => SubscriptionKind::ComponentTransient,
            },
            subscriber,
            cancelled: false,
        }));
        self.transient.push(sub.clone());
        sub
    }

    /// Removes `sub` from whichever list it lives in. Cancelling an
    /// already-cancelled subscription is a precondition violation in debug
    /// builds, a no-op in release.
    pub fn cancel(&mut self, sub: &Rc<RefCell<InvalidatorSubscription<H>>>) {
        let already = sub.borrow().cancelled;
        crate::precondition!(!already, "subscription cancelled twice");
        if already {
            return;
        }
        sub.borrow_mut().cancelled = true;
        self.permanent.retain(|s| !Rc::ptr_eq(s, sub));
        self.transient.retain(|s| !Rc::ptr_eq(s, sub));
    }
}
