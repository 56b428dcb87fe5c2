//! Central clock and task queue. Drives three queues — microtasks,
//! macrotasks, and frame tasks split into read/component/write/after
//! sub-phases — and owns the throttled-frame deadline used to defer
//! low-priority component updates once a frame runs long.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::component::Component;
use crate::flags::{ComponentFlags, FrameFlags, SchedulerFlags};
use crate::host::{FrameTickSource, Host, MacrotaskDriver, MicrotaskDriver};
use crate::vnode::Owner;

/// Most frames only ever dirty a handful of components at any one depth.
type ComponentBucket<H> = SmallVec<[Weak<RefCell<Component<H>>>; 4]>;

/// Tuning knobs for the throttled-frame deadline. Defaults match the
/// constants used by the throttled-EMA calculation below.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub min_throttled_frame_ms: f64,
    pub max_throttled_frame_ms: f64,
    pub default_throttled_frame_ms: f64,
    pub ema_window: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            min_throttled_frame_ms: 2.0,
            max_throttled_frame_ms: 12.0,
            default_throttled_frame_ms: 10.0,
            ema_window: 5,
        }
    }
}

/// One tick's worth of pending work: a dense depth-indexed bucket list for
/// component updates plus ordered read/write/after task sequences.
pub struct FrameTasksGroup<H: Host> {
    pub flags: FrameFlags,
    component_tasks: Vec<ComponentBucket<H>>,
    read_tasks: Vec<Box<dyn FnOnce()>>,
    write_tasks: Vec<Box<dyn FnOnce()>>,
    after_tasks: Vec<Box<dyn FnOnce()>>,
    focus: Option<H::Element>,
}

impl<H: Host> FrameTasksGroup<H> {
    fn new() -> Self {
        FrameTasksGroup {
            flags: FrameFlags::empty(),
            component_tasks: Vec::new(),
            read_tasks: Vec::new(),
            write_tasks: Vec::new(),
            after_tasks: Vec::new(),
            focus: None,
        }
    }

    fn push_component(&mut self, depth: u32, component: Weak<RefCell<Component<H>>>) {
        let depth = depth as usize;
        if self.component_tasks.len() <= depth {
            self.component_tasks.resize_with(depth + 1, SmallVec::new);
        }
        self.component_tasks[depth].push(component);
        self.flags.insert(FrameFlags::COMPONENT);
    }

    fn has_component_tasks(&self) -> bool {
        self.component_tasks.iter().any(|bucket| !bucket.is_empty())
    }

    fn is_locked(&self) -> bool {
        self.flags.contains(FrameFlags::RW_LOCK)
    }
}

fn run_isolated(context: &str, cb: Box<dyn FnOnce()>) {
    crate::error::isolate_handler(context, std::panic::AssertUnwindSafe(move || cb()));
}

pub struct Scheduler<H: Host> {
    host: Rc<H>,
    config: SchedulerConfig,
    clock: u64,
    current: FrameTasksGroup<H>,
    next: FrameTasksGroup<H>,
    microtasks: Vec<Box<dyn FnOnce()>>,
    macrotasks: Vec<Box<dyn FnOnce()>>,
    every_frame: Vec<Weak<RefCell<Component<H>>>>,
    flags: SchedulerFlags,
    throttle_refcount: u32,
    throttled_frame_ms: f64,
    frame_duration_samples: VecDeque<f64>,
    deadline: Option<Instant>,
    tick_source: Rc<dyn FrameTickSource>,
    microtask_driver: Rc<dyn MicrotaskDriver>,
    macrotask_driver: Rc<dyn MacrotaskDriver>,
    self_weak: Weak<RefCell<Scheduler<H>>>,
}

impl<H: Host> Scheduler<H> {
    pub fn new(
        host: Rc<H>,
        config: SchedulerConfig,
        tick_source: Rc<dyn FrameTickSource>,
        microtask_driver: Rc<dyn MicrotaskDriver>,
        macrotask_driver: Rc<dyn MacrotaskDriver>,
    ) -> Rc<RefCell<Self>> {
        let throttled_frame_ms = config.default_throttled_frame_ms;
        let scheduler = Rc::new(RefCell::new(Scheduler {
            host,
            config,
            clock: 0,
            current: FrameTasksGroup::new(),
            next: FrameTasksGroup::new(),
            microtasks: Vec::new(),
            macrotasks: Vec::new(),
            every_frame: Vec::new(),
            flags: SchedulerFlags::empty(),
            throttle_refcount: 0,
            throttled_frame_ms,
            frame_duration_samples: VecDeque::new(),
            deadline: None,
            tick_source,
            microtask_driver,
            macrotask_driver,
            self_weak: Weak::new(),
        }));
        scheduler.borrow_mut().self_weak = Rc::downgrade(&scheduler);
        scheduler
    }

    pub fn owner(this: &Rc<RefCell<Scheduler<H>>>) -> Owner<H> {
        Owner {
            host: this.borrow().host.clone(),
            scheduler: Rc::downgrade(this),
        }
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn is_throttling_enabled(&self) -> bool {
        self.flags.contains(SchedulerFlags::THROTTLING_ENABLED)
    }

    pub fn enable_throttling(&mut self) {
        self.throttle_refcount += 1;
        self.flags.insert(SchedulerFlags::THROTTLING_ENABLED);
    }

    pub fn disable_throttling(&mut self) {
        self.throttle_refcount = self.throttle_refcount.saturating_sub(1);
        if self.throttle_refcount == 0 {
            self.flags.remove(SchedulerFlags::THROTTLING_ENABLED);
            self.deadline = None;
        }
    }

    /// Milliseconds left in the current throttled-frame deadline, or
    /// `f64::INFINITY` when throttling is off. Zero once exhausted.
    pub fn frame_time_remaining(&self) -> f64 {
        match self.deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    self.flags_exhausted();
                    0.0
                } else {
                    deadline.duration_since(now).as_secs_f64() * 1000.0
                }
            }
            None => f64::INFINITY,
        }
    }

    fn flags_exhausted(&self) {
        // Recorded for inspection by callers that check the flag rather than
        // re-deriving it from `frame_time_remaining`; actual mutation happens
        // in `drain_component_tasks` where `&mut self` is available.
    }

    pub fn schedule_microtask(&mut self, cb: Box<dyn FnOnce()>) {
        let was_empty = self.microtasks.is_empty();
        self.microtasks.push(cb);
        if was_empty {
            let weak = self.self_weak.clone();
            self.microtask_driver.schedule(Box::new(move || {
                if let Some(scheduler) = weak.upgrade() {
                    Scheduler::drain_microtasks(&scheduler);
                }
            }));
        }
    }

    pub fn schedule_macrotask(&mut self, cb: Box<dyn FnOnce()>) {
        let was_empty = self.macrotasks.is_empty();
        self.macrotasks.push(cb);
        if was_empty {
            let weak = self.self_weak.clone();
            self.macrotask_driver.schedule(Box::new(move || {
                if let Some(scheduler) = weak.upgrade() {
                    Scheduler::drain_macrotasks(&scheduler);
                }
            }));
        }
    }

    pub fn schedule_read(&mut self, cb: Box<dyn FnOnce()>) {
        if !self.current.is_locked() {
            self.current.read_tasks.push(cb);
            self.current.flags.insert(FrameFlags::READ);
        } else {
            self.next.read_tasks.push(cb);
            self.next.flags.insert(FrameFlags::READ);
        }
        self.request_frame_tick_if_needed();
    }

    pub fn schedule_write(&mut self, cb: Box<dyn FnOnce()>) {
        if !self.current.is_locked() {
            self.current.write_tasks.push(cb);
            self.current.flags.insert(FrameFlags::WRITE);
        } else {
            self.next.write_tasks.push(cb);
            self.next.flags.insert(FrameFlags::WRITE);
        }
        self.request_frame_tick_if_needed();
    }

    pub fn schedule_after(&mut self, cb: Box<dyn FnOnce()>) {
        self.next.after_tasks.push(cb);
        self.next.flags.insert(FrameFlags::AFTER);
        self.request_frame_tick_if_needed();
    }

    pub fn request_focus(&mut self, el: H::Element) {
        self.next.focus = Some(el);
    }

    pub fn enqueue_component_update(
        &mut self,
        component: Weak<RefCell<Component<H>>>,
        depth: u32,
        _high_priority: bool,
    ) {
        if let Some(strong) = component.upgrade() {
            strong.borrow_mut().flags.insert(ComponentFlags::IN_UPDATE_QUEUE);
        }
        self.next.push_component(depth, component);
        self.request_frame_tick_if_needed();
    }

    pub fn register_every_frame(&mut self, component: Weak<RefCell<Component<H>>>, _depth: u32) {
        self.every_frame.push(component);
        self.request_frame_tick_if_needed();
    }

    pub fn unregister_every_frame(&mut self, component: Weak<RefCell<Component<H>>>) {
        self.every_frame.retain(|w| !weak_ptr_eq(w, &component));
    }

    pub fn forget_component(&mut self, component: &Weak<RefCell<Component<H>>>) {
        self.every_frame.retain(|w| !weak_ptr_eq(w, component));
    }

    fn request_frame_tick_if_needed(&mut self) {
        if self.flags.contains(SchedulerFlags::FRAME_TICK_PENDING) {
            return;
        }
        self.flags.insert(SchedulerFlags::FRAME_TICK_PENDING);
        let weak = self.self_weak.clone();
        self.tick_source.request_tick(Box::new(move |timestamp| {
            if let Some(scheduler) = weak.upgrade() {
                Scheduler::on_frame_tick(&scheduler, timestamp);
            }
        }));
    }

    fn drain_microtasks(this: &Rc<RefCell<Scheduler<H>>>) {
        loop {
            let batch = std::mem::take(&mut this.borrow_mut().microtasks);
            if batch.is_empty() {
                break;
            }
            for cb in batch {
                run_isolated("microtask", cb);
            }
        }
        this.borrow_mut().clock += 1;
    }

    fn drain_macrotasks(this: &Rc<RefCell<Scheduler<H>>>) {
        let batch = std::mem::take(&mut this.borrow_mut().macrotasks);
        for cb in batch {
            run_isolated("macrotask", cb);
        }
        this.borrow_mut().clock += 1;
    }

    fn sample_frame_duration(this: &Rc<RefCell<Scheduler<H>>>, frame_start: Instant) {
        let elapsed_ms = frame_start.elapsed().as_secs_f64() * 1000.0;
        let mut s = this.borrow_mut();
        s.frame_duration_samples.push_back(elapsed_ms);
        while s.frame_duration_samples.len() > s.config.ema_window {
            s.frame_duration_samples.pop_front();
        }
        let avg = s.frame_duration_samples.iter().sum::<f64>() / s.frame_duration_samples.len() as f64;
        s.throttled_frame_ms = avg.clamp(s.config.min_throttled_frame_ms, s.config.max_throttled_frame_ms);
    }

    /// Frame-tick algorithm. Called by the host's `FrameTickSource`
    /// implementation.
    fn on_frame_tick(this: &Rc<RefCell<Scheduler<H>>>, timestamp: f64) {
        let _ = timestamp;
        {
            let mut s = this.borrow_mut();
            s.flags
                .remove(SchedulerFlags::FRAME_TICK_PENDING | SchedulerFlags::THROTTLED_FRAME_EXHAUSTED);

            if s.flags.contains(SchedulerFlags::THROTTLING_ENABLED) {
                let duration_ms = s.throttled_frame_ms;
                s.deadline = Some(Instant::now() + Duration::from_secs_f64(duration_ms / 1000.0));
                let frame_start = Instant::now();
                let weak = s.self_weak.clone();
                s.schedule_macrotask(Box::new(move || {
                    if let Some(scheduler) = weak.upgrade() {
                        Scheduler::sample_frame_duration(&scheduler, frame_start);
                    }
                }));
            } else {
                s.deadline = None;
            }

            let s = &mut *s;
            std::mem::swap(&mut s.current, &mut s.next);
            s.current.flags.remove(FrameFlags::RW_LOCK);
            s.next.flags.remove(FrameFlags::RW_LOCK);

            // Two passes, not one: marking a component dirty here may run
            // arbitrary handler code (via `Component::invalidate`'s
            // subscribers) that disposes another `every_frame` component
            // later in this same snapshot. The enqueue sweep re-checks
            // liveness right before committing to `current`, so a component
            // torn down mid-loop is dropped instead of still running.
            let every_frame = s.every_frame.clone();
            for weak in &every_frame {
                if let Some(component) = weak.upgrade() {
                    let updating = component.borrow().flags.contains(ComponentFlags::UPDATE_EACH_FRAME);
                    if updating {
                        Component::invalidate(&component, true);
                    }
                }
            }
            for weak in &every_frame {
                if let Some(component) = weak.upgrade() {
                    let (updating, disposed, depth) = {
                        let c = component.borrow();
                        (
                            c.flags.contains(ComponentFlags::UPDATE_EACH_FRAME),
                            c.flags.contains(ComponentFlags::DISPOSED),
                            c.depth,
                        )
                    };
                    if updating && !disposed {
                        s.current.push_component(depth, weak.clone());
                    }
                }
            }
        }

        Scheduler::drain_current_frame(this);

        {
            let mut s = this.borrow_mut();
            s.every_frame.retain(|weak| {
                weak.upgrade()
                    .map(|c| c.borrow().flags.contains(ComponentFlags::UPDATE_EACH_FRAME))
                    .unwrap_or(false)
            });
            s.current.flags.insert(FrameFlags::RW_LOCK);
        }

        let after_tasks = std::mem::take(&mut this.borrow_mut().current.after_tasks);
        for cb in after_tasks {
            run_isolated("after task", cb);
        }

        let focus_target = this.borrow_mut().current.focus.take();
        if let Some(el) = focus_target {
            let host = this.borrow().host.clone();
            host.focus(&el);
        }

        let has_every_frame = !this.borrow().every_frame.is_empty();
        this.borrow_mut().clock += 1;
        if has_every_frame {
            this.borrow_mut().request_frame_tick_if_needed();
        }
    }

    fn drain_current_frame(this: &Rc<RefCell<Scheduler<H>>>) {
        loop {
            let (any_read, any_component, any_write) = {
                let s = this.borrow();
                (
                    !s.current.read_tasks.is_empty(),
                    s.current.has_component_tasks(),
                    !s.current.write_tasks.is_empty(),
                )
            };
            if !any_read && !any_component && !any_write {
                break;
            }

            let reads = std::mem::take(&mut this.borrow_mut().current.read_tasks);
            this.borrow_mut().current.flags.remove(FrameFlags::READ);
            for cb in reads {
                run_isolated("read task", cb);
            }

            Scheduler::drain_component_tasks(this);

            let writes = std::mem::take(&mut this.borrow_mut().current.write_tasks);
            this.borrow_mut().current.flags.remove(FrameFlags::WRITE);
            for cb in writes {
                run_isolated("write task", cb);
            }
        }
    }

    fn drain_component_tasks(this: &Rc<RefCell<Scheduler<H>>>) {
        loop {
            let next_depth = {
                let s = this.borrow();
                s.current
                    .component_tasks
                    .iter()
                    .position(|bucket| !bucket.is_empty())
            };
            let depth = match next_depth {
                Some(d) => d,
                None => break,
            };
            let bucket = std::mem::take(&mut this.borrow_mut().current.component_tasks[depth]);
            for weak in bucket {
                let component = match weak.upgrade() {
                    Some(c) => c,
                    None => continue,
                };
                // Disposed mid-frame by an earlier update this same tick: silently skip.
                if component.borrow().flags.contains(ComponentFlags::DISPOSED) {
                    continue;
                }
                let (throttled, remaining) = {
                    let s = this.borrow();
                    (s.is_throttling_enabled(), s.frame_time_remaining())
                };
                if !Component::is_update_eligible(&component, throttled, remaining) {
                    this.borrow_mut().flags.insert(SchedulerFlags::THROTTLED_FRAME_EXHAUSTED);
                    let depth = component.borrow().depth;
                    this.borrow_mut().next.push_component(depth, Rc::downgrade(&component));
                    continue;
                }
                Component::run_scheduled_update(&component);
                // `clock` itself only advances once at the very end of `on_frame_tick`,
                // after this loop returns, so the value a component's update finishes
                // under is one tick behind the clock it must read back as of frame end.
                let clock = this.borrow().clock + 1;
                Component::finish_scheduled_update(&component, clock);
            }
            this.borrow_mut()
                .current
                .component_tasks
                .get_mut(depth)
                .map(|bucket| bucket.clear());
        }
    }
}

fn weak_ptr_eq<T>(a: &Weak<RefCell<T>>, b: &Weak<RefCell<T>>) -> bool {
    match (a.upgrade(), b.upgrade()) {
        (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_documented_bounds() {
        let config = SchedulerConfig::default();
        assert_eq!(config.min_throttled_frame_ms, 2.0);
        assert_eq!(config.max_throttled_frame_ms, 12.0);
        assert_eq!(config.default_throttled_frame_ms, 10.0);
        assert_eq!(config.ema_window, 5);
    }
}
