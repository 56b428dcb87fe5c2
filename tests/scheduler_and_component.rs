//! Scheduler depth ordering, component invalidation guards, transient
//! subscription cancellation, and a reconciler round-trip no-op.

mod support;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use frame_vdom_core::{
    Component, ComponentDescriptor, FrameTickSource, Invalidator, MacrotaskDriver, MicrotaskDriver,
    Owner, Scheduler, SchedulerConfig, Subscriber, VNode, VNodeFlags,
};

use support::{FakeHost, ImmediateDriver, ManualTickSource};

fn scheduler_with_tick() -> (Rc<RefCell<Scheduler<FakeHost>>>, Rc<ManualTickSource>) {
    let host = Rc::new(FakeHost::new());
    let tick = Rc::new(ManualTickSource::new());
    let driver = Rc::new(ImmediateDriver::new());
    let scheduler = Scheduler::new(
        host,
        SchedulerConfig::default(),
        tick.clone() as Rc<dyn FrameTickSource>,
        driver.clone() as Rc<dyn MicrotaskDriver>,
        driver as Rc<dyn MacrotaskDriver>,
    );
    (scheduler, tick)
}

fn logging_descriptor(name: &'static str, log: Rc<RefCell<Vec<&'static str>>>) -> ComponentDescriptor<FakeHost> {
    ComponentDescriptor::new(
        name,
        "div",
        Box::new(move |_this| {
            log.borrow_mut().push(name);
        }),
    )
}

#[test]
fn components_run_in_depth_order_regardless_of_enqueue_order() {
    let (scheduler, tick) = scheduler_with_tick();
    let owner = Scheduler::owner(&scheduler);
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let deep = Component::instantiate(
        Rc::new(logging_descriptor("deep3", log.clone())),
        owner.clone(),
        3,
    );
    let root = Component::instantiate(
        Rc::new(logging_descriptor("root", log.clone())),
        owner.clone(),
        0,
    );
    let mid = Component::instantiate(
        Rc::new(logging_descriptor("mid1", log.clone())),
        owner.clone(),
        1,
    );
    Component::attach(&deep);
    Component::attach(&root);
    Component::attach(&mid);

    scheduler
        .borrow_mut()
        .enqueue_component_update(Rc::downgrade(&deep), 3, false);
    scheduler
        .borrow_mut()
        .enqueue_component_update(Rc::downgrade(&root), 0, false);
    scheduler
        .borrow_mut()
        .enqueue_component_update(Rc::downgrade(&mid), 1, false);

    let clock_before = scheduler.borrow().clock();
    tick.fire(0.0);

    assert_eq!(*log.borrow(), vec!["root", "mid1", "deep3"]);
    assert_eq!(scheduler.borrow().clock(), clock_before + 1);
    assert_eq!(root.borrow().mtime, scheduler.borrow().clock());
    assert_eq!(mid.borrow().mtime, scheduler.borrow().clock());
    assert_eq!(deep.borrow().mtime, scheduler.borrow().clock());
}

#[test]
fn invalidate_is_a_no_op_while_already_dirty() {
    let (scheduler, tick) = scheduler_with_tick();
    let owner = Scheduler::owner(&scheduler);
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let component = Component::instantiate(Rc::new(logging_descriptor("a", log.clone())), owner, 0);
    Component::attach(&component);

    Component::invalidate(&component, false);
    Component::invalidate(&component, false);

    tick.fire(0.0);

    assert_eq!(log.borrow().len(), 1, "double invalidate must not double-schedule");
}

#[test]
fn mark_cancelled_subscription_is_skipped_by_a_later_fire() {
    let fired = Rc::new(RefCell::new(0u32));
    let fired_for_cb = fired.clone();
    let callback: Rc<RefCell<dyn FnMut()>> = Rc::new(RefCell::new(move || {
        *fired_for_cb.borrow_mut() += 1;
    }));

    let mut invalidator: Invalidator<FakeHost> = Invalidator::new();
    let sub = invalidator.transient_subscribe(Subscriber::Callback(callback));

    sub.borrow_mut().mark_cancelled();
    invalidator.invalidate(1);

    assert_eq!(*fired.borrow(), 0, "a cancelled subscription must not fire");
}

#[test]
fn uncancelled_transient_subscription_fires_exactly_once() {
    let fired = Rc::new(RefCell::new(0u32));
    let fired_for_cb = fired.clone();
    let callback: Rc<RefCell<dyn FnMut()>> = Rc::new(RefCell::new(move || {
        *fired_for_cb.borrow_mut() += 1;
    }));

    let mut invalidator: Invalidator<FakeHost> = Invalidator::new();
    invalidator.transient_subscribe(Subscriber::Callback(callback));

    invalidator.invalidate(1);
    invalidator.invalidate(2);

    assert_eq!(*fired.borrow(), 1, "transient subscriptions are dropped after firing once");
}

#[test]
fn identical_resync_produces_no_host_mutations() {
    let host = Rc::new(FakeHost::new());
    let owner = Owner {
        host: host.clone(),
        scheduler: Weak::new(),
    };

    let a = VNode::<FakeHost>::new_element("div", VNodeFlags::empty());
    a.borrow_mut().attrs.insert("id".into(), "x".to_string());
    VNode::create(&a, &owner, 0);
    VNode::render(&a, &owner, 0);
    host.drain_mutations();

    let b = VNode::<FakeHost>::new_element("div", VNodeFlags::empty());
    b.borrow_mut().attrs.insert("id".into(), "x".to_string());

    frame_vdom_core::sync(&a, &b, &owner, 0);

    let mutations = host.drain_mutations();
    assert!(mutations.is_empty(), "no-op resync must not touch the host: {:?}", mutations);
}
