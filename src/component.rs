//! Component instances and their descriptors. A [`Component`] owns an
//! internal root [`VNode`] (kind `Root`) that mirrors whatever the embedding
//! application's `update` handler last built; `Component::sync` reconciles
//! that root in place exactly the way the top-level tree is reconciled.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::isolate_handler;
use crate::flags::{ComponentFlags, VNodeFlags};
use crate::host::Host;
use crate::invalidator::{Invalidator, InvalidatorSubscription, Subscriber};
use crate::vnode::{Owner, VNode, VNodeRef};

pub type Handler<H> = Box<dyn Fn(&Rc<RefCell<Component<H>>>)>;
pub type PropsChanged = Box<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// Static, shared-by-value description of one component type: its lifecycle
/// handlers and the root element tag/namespace its internal root renders as.
pub struct ComponentDescriptor<H: Host> {
    pub name: &'static str,
    pub root_tag: Rc<str>,
    pub mark_flags: VNodeFlags,
    /// Runs once, right after instantiation, before the first `update`.
    pub init: Option<Handler<H>>,
    /// Builds (or rebuilds) the component's root and calls `component.sync`.
    /// Runs on instantiation and on every subsequent invalidation.
    pub update: Handler<H>,
    /// Runs when `set_props` replaces an existing props value, before `update`.
    pub new_props_received: Option<Handler<H>>,
    pub attached: Option<Handler<H>>,
    pub detached: Option<Handler<H>>,
    pub disposed: Option<Handler<H>>,
    /// Optional fast-path: returns `false` when new props are equal to the
    /// old ones, letting `set_props` skip scheduling an update.
    pub props_changed: Option<PropsChanged>,
    /// `Some(n)` enables the recycled-instance pool (bounded to `n` entries);
    /// `None` disposes components normally.
    pub recycle_pool_capacity: Option<usize>,
    pool: RefCell<Vec<Rc<RefCell<Component<H>>>>>,
}

impl<H: Host> ComponentDescriptor<H> {
    pub fn new(name: &'static str, root_tag: impl Into<Rc<str>>, update: Handler<H>) -> Self {
        ComponentDescriptor {
            name,
            root_tag: root_tag.into(),
            mark_flags: VNodeFlags::empty(),
            init: None,
            update,
            new_props_received: None,
            attached: None,
            detached: None,
            disposed: None,
            props_changed: None,
            recycle_pool_capacity: None,
            pool: RefCell::new(Vec::new()),
        }
    }
}

pub struct Component<H: Host> {
    pub descriptor: Rc<ComponentDescriptor<H>>,
    pub depth: u32,
    pub props: Box<dyn Any>,
    pub state: Box<dyn Any>,
    pub root: Option<VNodeRef<H>>,
    pub flags: ComponentFlags,
    /// Scheduler clock at which this component's update last completed.
    pub mtime: u64,
    pub invalidator: Invalidator<H>,
    owner: Owner<H>,
    self_ref: Weak<RefCell<Component<H>>>,
    subscriptions: Vec<Rc<RefCell<InvalidatorSubscription<H>>>>,
    transient_subscriptions: Vec<Rc<RefCell<InvalidatorSubscription<H>>>>,
}

impl<H: Host> Component<H> {
    pub fn instantiate(
        descriptor: Rc<ComponentDescriptor<H>>,
        owner: Owner<H>,
        depth: u32,
    ) -> Rc<RefCell<Component<H>>> {
        if let Some(recycled) = descriptor.pool.borrow_mut().pop() {
            {
                let mut this = recycled.borrow_mut();
                this.depth = depth;
                this.owner = owner;
                this.flags.remove(ComponentFlags::RECYCLED);
            }
            return recycled;
        }

        let component = Rc::new(RefCell::new(Component {
            descriptor,
            depth,
            props: Box::new(()),
            state: Box::new(()),
            root: None,
            flags: ComponentFlags::empty(),
            mtime: 0,
            invalidator: Invalidator::new(),
            owner,
            self_ref: Weak::new(),
            subscriptions: Vec::new(),
            transient_subscriptions: Vec::new(),
        }));
        component.borrow_mut().self_ref = Rc::downgrade(&component);
        component
    }

    fn weak(this: &Rc<RefCell<Component<H>>>) -> Weak<RefCell<Component<H>>> {
        this.borrow().self_ref.clone()
    }

    pub fn run_init_and_first_update(this: &Rc<RefCell<Component<H>>>) {
        let descriptor = this.borrow().descriptor.clone();
        if let Some(init) = &descriptor.init {
            isolate_handler(
                "component init",
                std::panic::AssertUnwindSafe(|| init(this)),
            );
        }
        Self::run_update(this, &descriptor);
        let root = this.borrow().root.clone();
        if let Some(root) = &root {
            let owner = this.borrow().owner.clone();
            let depth = this.borrow().depth;
            VNode::create(root, &owner, depth + 1);
            VNode::render(root, &owner, depth + 1);
        }
    }

    pub fn mount_and_first_update(this: &Rc<RefCell<Component<H>>>, host_node: H::Element) {
        let descriptor = this.borrow().descriptor.clone();
        if let Some(init) = &descriptor.init {
            isolate_handler(
                "component init",
                std::panic::AssertUnwindSafe(|| init(this)),
            );
        }
        Self::run_update(this, &descriptor);
        let root = this.borrow().root.clone();
        if let Some(root) = &root {
            let owner = this.borrow().owner.clone();
            let depth = this.borrow().depth;
            VNode::mount(root, host_node, &owner, depth + 1);
        }
        this.borrow_mut().flags.insert(ComponentFlags::ATTACHED);
        if let Some(handler) = &descriptor.attached {
            isolate_handler(
                "component attached",
                std::panic::AssertUnwindSafe(|| handler(this)),
            );
        }
    }

    fn run_update(this: &Rc<RefCell<Component<H>>>, descriptor: &Rc<ComponentDescriptor<H>>) {
        isolate_handler(
            "component update",
            std::panic::AssertUnwindSafe(|| (descriptor.update)(this)),
        );
    }

    /// Replaces the props value and, unless `props_changed` says otherwise,
    /// runs `new_props_received` and schedules an update.
    ///
    /// Change detection: a custom `props_changed` predicate wins if the
    /// descriptor defines one; otherwise, a component flagged
    /// `ImmutableProps` is considered changed only when the new props value
    /// is a genuinely different allocation (pointer identity), and any other
    /// component is always considered changed.
    pub fn set_props(this: &Rc<RefCell<Component<H>>>, new_props: Box<dyn Any>) {
        let (descriptor, changed) = {
            let comp = this.borrow();
            let changed = match &comp.descriptor.props_changed {
                Some(f) => f(comp.props.as_ref(), new_props.as_ref()),
                None if comp.flags.contains(ComponentFlags::IMMUTABLE_PROPS) => !std::ptr::eq(
                    comp.props.as_ref() as *const dyn Any as *const (),
                    new_props.as_ref() as *const dyn Any as *const (),
                ),
                None => true,
            };
            (comp.descriptor.clone(), changed)
        };
        this.borrow_mut().props = new_props;
        if !changed {
            return;
        }
        if let Some(handler) = &descriptor.new_props_received {
            isolate_handler(
                "component newPropsReceived",
                std::panic::AssertUnwindSafe(|| handler(this)),
            );
        }
        Self::invalidate(this, false);
    }

    pub fn set_state(this: &Rc<RefCell<Component<H>>>, new_state: Box<dyn Any>) {
        this.borrow_mut().state = new_state;
        Self::invalidate(this, false);
    }

    /// Marks the component dirty and notifies the scheduler, unless it is
    /// already dirty or disposed. `preserve_transient` skips the usual
    /// mass-cancellation of transient subscriptions.
    pub fn invalidate(this: &Rc<RefCell<Component<H>>>, preserve_transient: bool) {
        {
            let mut comp = this.borrow_mut();
            if comp.flags.intersects(ComponentFlags::DIRTY | ComponentFlags::DISPOSED) {
                return;
            }
            comp.flags.insert(ComponentFlags::DIRTY);
        }
        if !preserve_transient {
            Component::clear_transient_subscriptions(this);
        }
        let (scheduler, depth, high_priority) = {
            let comp = this.borrow();
            (
                comp.owner.scheduler.clone(),
                comp.depth,
                comp.flags.contains(ComponentFlags::HIGH_PRIORITY_UPDATE),
            )
        };
        if let Some(scheduler) = scheduler.upgrade() {
            let weak = Self::weak(this);
            scheduler
                .borrow_mut()
                .enqueue_component_update(weak, depth, high_priority);
        }
    }

    /// Sets or clears the deadline-bypass flag: a high-priority component
    /// still runs in depth order, it just isn't deferred when a throttled
    /// frame's deadline has passed.
    pub fn set_high_priority(this: &Rc<RefCell<Component<H>>>, high_priority: bool) {
        let mut comp = this.borrow_mut();
        if high_priority {
            comp.flags.insert(ComponentFlags::HIGH_PRIORITY_UPDATE);
        } else {
            comp.flags.remove(ComponentFlags::HIGH_PRIORITY_UPDATE);
        }
    }

    /// Returns `true` if this component is currently eligible to run under
    /// throttling: not throttled at all, flagged high-priority, or there is
    /// time left in the current throttled frame. A disposed or not-yet/no-
    /// longer-attached component is never eligible.
    pub fn is_update_eligible(this: &Rc<RefCell<Component<H>>>, throttled: bool, time_remaining_ms: f64) -> bool {
        let comp = this.borrow();
        if comp.flags.intersects(ComponentFlags::DISPOSED)
            || !comp.flags.contains(ComponentFlags::ATTACHED)
        {
            return false;
        }
        !throttled || comp.flags.contains(ComponentFlags::HIGH_PRIORITY_UPDATE) || time_remaining_ms > 0.0
    }

    /// Runs the `update` handler, which is expected to build a new root and
    /// call [`Component::sync`].
    pub fn run_scheduled_update(this: &Rc<RefCell<Component<H>>>) {
        let descriptor = this.borrow().descriptor.clone();
        Self::run_update(this, &descriptor);
    }

    /// Scheduler-side bookkeeping once a scheduled update has actually run:
    /// clears Dirty/InUpdateQueue/HighPriorityUpdate and stamps `mtime`.
    pub fn finish_scheduled_update(this: &Rc<RefCell<Component<H>>>, clock: u64) {
        let mut comp = this.borrow_mut();
        comp.flags.remove(
            ComponentFlags::DIRTY | ComponentFlags::IN_UPDATE_QUEUE | ComponentFlags::HIGH_PRIORITY_UPDATE,
        );
        comp.mtime = clock;
    }

    /// Reconciles `new_root` against the current root, via the general
    /// purpose sync used everywhere else in the tree. Per the reconciler's
    /// contract, `new_root` inherits the old root's host element/component
    /// resources and becomes the component's new canonical root; the old
    /// root object is simply dropped.
    pub fn sync(this: &Rc<RefCell<Component<H>>>, new_root: VNodeRef<H>) {
        let (owner, depth, old_root) = {
            let comp = this.borrow();
            (comp.owner.clone(), comp.depth, comp.root.clone())
        };
        match old_root {
            Some(old) => {
                crate::reconciler::sync(&old, &new_root, &owner, depth + 1);
            }
            None => {}
        }
        this.borrow_mut().root = Some(new_root);
    }

    pub fn start_update_each_frame(this: &Rc<RefCell<Component<H>>>) {
        let (scheduler, depth) = {
            let comp = this.borrow();
            (comp.owner.scheduler.clone(), comp.depth)
        };
        this.borrow_mut().flags.insert(ComponentFlags::UPDATE_EACH_FRAME);
        if let Some(scheduler) = scheduler.upgrade() {
            scheduler
                .borrow_mut()
                .register_every_frame(Self::weak(this), depth);
        }
    }

    pub fn stop_update_each_frame(this: &Rc<RefCell<Component<H>>>) {
        let scheduler = this.borrow().owner.scheduler.clone();
        this.borrow_mut().flags.remove(ComponentFlags::UPDATE_EACH_FRAME);
        if let Some(scheduler) = scheduler.upgrade() {
            scheduler.borrow_mut().unregister_every_frame(Self::weak(this));
        }
    }

    pub fn subscribe(
        this: &Rc<RefCell<Component<H>>>,
        invalidator: &mut Invalidator<H>,
    ) -> Rc<RefCell<InvalidatorSubscription<H>>> {
        let sub = invalidator.subscribe(Subscriber::Component(Self::weak(this)));
        this.borrow_mut().subscriptions.push(sub.clone());
        sub
    }

    pub fn transient_subscribe(
        this: &Rc<RefCell<Component<H>>>,
        invalidator: &mut Invalidator<H>,
    ) -> Rc<RefCell<InvalidatorSubscription<H>>> {
        let sub = invalidator.transient_subscribe(Subscriber::Component(Self::weak(this)));
        this.borrow_mut().transient_subscriptions.push(sub.clone());
        sub
    }

    /// Drops every transient subscription this component holds, without
    /// requiring the caller to know which invalidators they belong to. Called
    /// automatically before each scheduled update and on detach.
    pub fn clear_transient_subscriptions(this: &Rc<RefCell<Component<H>>>) {
        let taken = std::mem::take(&mut this.borrow_mut().transient_subscriptions);
        for sub in taken {
            sub.borrow_mut().mark_cancelled();
        }
    }

    pub fn attach(this: &Rc<RefCell<Component<H>>>) {
        {
            let mut comp = this.borrow_mut();
            comp.flags.remove(ComponentFlags::RECYCLED);
            comp.flags.insert(ComponentFlags::ATTACHED);
        }
        let root = this.borrow().root.clone();
        if let Some(root) = &root {
            VNode::attach(root);
        }
        let descriptor = this.borrow().descriptor.clone();
        if let Some(handler) = &descriptor.attached {
            isolate_handler(
                "component attached",
                std::panic::AssertUnwindSafe(|| handler(this)),
            );
        }
    }

    pub fn detach(this: &Rc<RefCell<Component<H>>>) {
        this.borrow_mut().flags.remove(ComponentFlags::ATTACHED);
        let root = this.borrow().root.clone();
        if let Some(root) = &root {
            VNode::detach(root);
        }
        Self::clear_transient_subscriptions(this);
        let descriptor = this.borrow().descriptor.clone();
        if let Some(handler) = &descriptor.detached {
            isolate_handler(
                "component detached",
                std::panic::AssertUnwindSafe(|| handler(this)),
            );
        }
    }

    /// Disposes the component, or — if its descriptor enables recycling and
    /// the pool isn't full — detaches it and parks it for reuse instead.
    pub fn dispose(this: &Rc<RefCell<Component<H>>>) {
        let descriptor = this.borrow().descriptor.clone();
        if let Some(capacity) = descriptor.recycle_pool_capacity {
            if descriptor.pool.borrow().len() < capacity {
                Self::detach(this);
                this.borrow_mut().flags.insert(ComponentFlags::RECYCLED);
                let scheduler = this.borrow().owner.scheduler.clone();
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.borrow_mut().forget_component(&Self::weak(this));
                }
                descriptor.pool.borrow_mut().push(this.clone());
                return;
            }
        }

        this.borrow_mut().flags.insert(ComponentFlags::DISPOSED);
        let root = this.borrow().root.clone();
        if let Some(root) = &root {
            VNode::dispose(root);
        }
        for sub in std::mem::take(&mut this.borrow_mut().subscriptions) {
            sub.borrow_mut().mark_cancelled();
        }
        Self::clear_transient_subscriptions(this);
        if let Some(handler) = &descriptor.disposed {
            isolate_handler(
                "component disposed",
                std::panic::AssertUnwindSafe(|| handler(this)),
            );
        }
        let scheduler = this.borrow().owner.scheduler.clone();
        if let Some(scheduler) = scheduler.upgrade() {
            scheduler.borrow_mut().forget_component(&Self::weak(this));
        }
    }

    pub fn props_ref<T: 'static>(&self) -> Option<&T> {
        self.props.downcast_ref::<T>()
    }

    pub fn state_ref<T: 'static>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }
}
