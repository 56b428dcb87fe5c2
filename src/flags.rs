//! Centralized flag bitsets.
//!
//! Every stateful type in this crate (`VNode`, `Component`, `ComponentDescriptor`,
//! `Scheduler`, `FrameTasksGroup`) carries a small bitset rather than a handful of
//! `bool` fields, so that flags OR'd from one layer onto another (e.g. a
//! descriptor's `mark_flags` onto every instance VNode it produces) stay meaningful.

use bitflags::bitflags;

bitflags! {
    /// Flags carried on a single [`crate::vnode::VNode`].
    pub struct VNodeFlags: u32 {
        const TEXT                        = 1 << 0;
        const ELEMENT                     = 1 << 1;
        const COMPONENT                   = 1 << 2;
        const ROOT                        = 1 << 3;

        const TRACK_BY_KEY_CHILDREN       = 1 << 4;
        const MANAGED_CONTAINER           = 1 << 5;
        const COMMENT_PLACEHOLDER         = 1 << 6;

        const DYNAMIC_SHAPE_ATTRS         = 1 << 7;
        const DYNAMIC_SHAPE_PROPS         = 1 << 8;

        const TEXT_INPUT_ELEMENT          = 1 << 9;
        const CHECKED_INPUT_ELEMENT       = 1 << 10;

        const KEEP_ALIVE                  = 1 << 11;
        const BIND_ONCE                   = 1 << 12;
        const SVG                         = 1 << 13;

        const VMODEL                      = 1 << 14;
        const VMODEL_UPDATE_HANDLER       = 1 << 15;

        /// Suppresses [`crate::error::CoreError::ChildrenShapeWarning`] in the naive
        /// children diff.
        const DISABLE_CHILDREN_SHAPE_WARN = 1 << 16;

        const KIND_MASK = Self::TEXT.bits | Self::ELEMENT.bits | Self::COMPONENT.bits | Self::ROOT.bits;
    }
}

bitflags! {
    /// Flags carried on a [`crate::component::Component`] instance.
    pub struct ComponentFlags: u32 {
        const DISPOSED                    = 1 << 0;
        const ATTACHED                    = 1 << 1;
        const DIRTY                       = 1 << 2;
        const UPDATE_EACH_FRAME           = 1 << 3;
        const IN_UPDATE_QUEUE             = 1 << 4;
        const IN_UPDATE_EACH_FRAME_QUEUE  = 1 << 5;
        const RECYCLED                    = 1 << 6;
        const HIGH_PRIORITY_UPDATE        = 1 << 7;
        const IMMUTABLE_PROPS             = 1 << 8;
    }
}

bitflags! {
    /// Flags carried on a [`crate::scheduler::FrameTasksGroup`].
    pub struct FrameFlags: u8 {
        const COMPONENT = 1 << 0;
        const WRITE     = 1 << 1;
        const READ      = 1 << 2;
        const AFTER     = 1 << 3;
        const RW_LOCK   = 1 << 4;
    }
}

bitflags! {
    /// Scheduler-wide bookkeeping flags, cleared/set once per frame tick.
    pub struct SchedulerFlags: u8 {
        const FRAME_TICK_PENDING      = 1 << 0;
        const THROTTLED_FRAME_EXHAUSTED = 1 << 1;
        const THROTTLING_ENABLED      = 1 << 2;
    }
}
