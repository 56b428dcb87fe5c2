//! Renderer-agnostic core of a frame-driven, retained-mode UI runtime.
//!
//! This crate owns the parts of the runtime that do not depend on *where*
//! things are ultimately drawn: a cooperative, frame-tick-scheduled task
//! queue ([`scheduler`]), a virtual-tree node type with its lifecycle
//! operations ([`vnode`]), a pure diff/patch function over pairs of
//! sync-compatible nodes ([`reconciler`]), component instances with props,
//! state, and a reactive invalidation path ([`component`], [`invalidator`]),
//! and the [`host::Host`] trait a concrete backend implements to receive the
//! resulting mutations.
//!
//! Bring your own backend: implement [`host::Host`], [`host::FrameTickSource`],
//! [`host::MicrotaskDriver`], and [`host::MacrotaskDriver`] for whatever draws
//! your elements (a browser DOM, a terminal grid, a retained GPU scene), then
//! drive everything else from here.

mod component;
mod container_manager;
mod error;
mod flags;
mod host;
mod invalidator;
mod reconciler;
mod scheduler;
mod vnode;

pub use component::{Component, ComponentDescriptor, Handler, PropsChanged};
pub use container_manager::ContainerManagerDescriptor;
pub use error::CoreError;
pub use flags::{ComponentFlags, FrameFlags, SchedulerFlags, VNodeFlags};
pub use host::{
    AttributeNamespace, FrameTickSource, Host, MacrotaskDriver, MicrotaskDriver, PropValue,
    SVG_NAMESPACE, XLINK_NAMESPACE, XML_NAMESPACE,
};
pub use invalidator::{Invalidator, InvalidatorSubscription, Subscriber, SubscriptionKind};
pub use reconciler::sync;
pub use scheduler::{FrameTasksGroup, Scheduler, SchedulerConfig};
pub use vnode::{ChildrenData, Key, Owner, PropsMap, AttrsMap, Tag, VNode, VNodeKind, VNodeRef};

/// Commonly imported together; `use frame_vdom_core::prelude::*;` in a host
/// crate's component-definition modules.
pub mod prelude {
    pub use crate::component::{Component, ComponentDescriptor};
    pub use crate::container_manager::ContainerManagerDescriptor;
    pub use crate::flags::{ComponentFlags, FrameFlags, SchedulerFlags, VNodeFlags};
    pub use crate::host::{Host, PropValue};
    pub use crate::scheduler::{Scheduler, SchedulerConfig};
    pub use crate::vnode::{ChildrenData, Key, Owner, VNode, VNodeKind, VNodeRef};
}
