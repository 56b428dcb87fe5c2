//! Optional hook overriding child insert/replace/move/remove for a
//! `ManagedContainer`-flagged parent VNode — used to animate list reorderings.
//! Undefined hooks fall through to the default host child operations, so a
//! descriptor only needs to implement the subset of hooks it cares about.

use crate::host::Host;
use crate::vnode::VNodeRef;

/// Any subset of these four hooks may be provided; `None` means "use the
/// default host operation" — undefined hooks fall through to the host.
pub struct ContainerManagerDescriptor<H: Host> {
    pub insert_child: Option<Box<dyn Fn(&H, &H::Element, &VNodeRef<H>, Option<&H::Element>)>>,
    pub replace_child: Option<Box<dyn Fn(&H, &H::Element, &VNodeRef<H>, &H::Element)>>,
    pub move_child: Option<Box<dyn Fn(&H, &H::Element, &H::Element, Option<&H::Element>)>>,
    pub remove_child: Option<Box<dyn Fn(&H, &H::Element, &H::Element)>>,
}

impl<H: Host> Default for ContainerManagerDescriptor<H> {
    fn default() -> Self {
        ContainerManagerDescriptor {
            insert_child: None,
            replace_child: None,
            move_child: None,
            remove_child: None,
        }
    }
}

impl<H: Host> ContainerManagerDescriptor<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_insert(
        mut self,
        f: impl Fn(&H, &H::Element, &VNodeRef<H>, Option<&H::Element>) + 'static,
    ) -> Self {
        self.insert_child = Some(Box::new(f));
        self
    }

    pub fn with_replace(
        mut self,
        f: impl Fn(&H, &H::Element, &VNodeRef<H>, &H::Element) + 'static,
    ) -> Self {
        self.replace_child = Some(Box::new(f));
        self
    }

    pub fn with_move(
        mut self,
        f: impl Fn(&H, &H::Element, &H::Element, Option<&H::Element>) + 'static,
    ) -> Self {
        self.move_child = Some(Box::new(f));
        self
    }

    pub fn with_remove(mut self, f: impl Fn(&H, &H::Element, &H::Element) + 'static) -> Self {
        self.remove_child = Some(Box::new(f));
        self
    }
}
