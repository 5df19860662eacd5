//! Host document seam.
//!
//! The magnifier never owns the page it draws into. Everything it needs from
//! the host (looking up a container by selector, mounting a surface into a
//! container and unmounting it again) goes through the [`Document`] trait.
//!
//! [`Page`] is an in-memory implementation: named containers and a mount
//! tree that can be inspected. The CLI renders into one, and so do the tests.

use crate::lens::LensError;
use crate::surface::SurfaceId;
use std::collections::HashMap;
use std::fmt;

/// Handle to a container element in the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u32);

impl ContainerId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container#{}", self.0)
    }
}

/// A container given either directly or as a selector to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRef {
    Element(ContainerId),
    Selector(String),
}

impl From<ContainerId> for ContainerRef {
    fn from(id: ContainerId) -> Self {
        Self::Element(id)
    }
}

impl From<&str> for ContainerRef {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<String> for ContainerRef {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

/// The host page, as far as the magnifier is concerned.
pub trait Document {
    /// First container matching `selector`.
    fn query_selector(&self, selector: &str) -> Option<ContainerId>;

    /// Mount `child` as the last child of `parent`.
    ///
    /// A surface mounted elsewhere is moved; a surface already under
    /// `parent` moves to the end. A surface is never mounted twice.
    fn append_child(&mut self, parent: ContainerId, child: SurfaceId);

    /// Unmount `child` from wherever it is mounted. Unmounted surfaces are
    /// left alone.
    fn remove_child(&mut self, child: SurfaceId);

    /// Resolve a [`ContainerRef`], failing when a selector matches nothing.
    fn resolve(&self, target: &ContainerRef) -> Result<ContainerId, LensError> {
        match target {
            ContainerRef::Element(id) => Ok(*id),
            ContainerRef::Selector(selector) => self
                .query_selector(selector)
                .ok_or_else(|| LensError::ContainerResolution(selector.clone())),
        }
    }
}

#[derive(Debug)]
struct PageContainer {
    selector: String,
    children: Vec<SurfaceId>,
}

/// In-memory [`Document`]: a flat list of selector-named containers.
#[derive(Debug, Default)]
pub struct Page {
    containers: Vec<PageContainer>,
    parents: HashMap<SurfaceId, ContainerId>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty container that `selector` resolves to.
    pub fn add_container(&mut self, selector: impl Into<String>) -> ContainerId {
        let id = ContainerId(self.containers.len() as u32);
        self.containers.push(PageContainer {
            selector: selector.into(),
            children: Vec::new(),
        });
        id
    }

    /// Surfaces mounted in `container`, in document order.
    pub fn children(&self, container: ContainerId) -> &[SurfaceId] {
        self.containers
            .get(container.0 as usize)
            .map(|c| c.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, surface: SurfaceId) -> Option<ContainerId> {
        self.parents.get(&surface).copied()
    }

    pub fn selector(&self, container: ContainerId) -> Option<&str> {
        self.containers
            .get(container.0 as usize)
            .map(|c| c.selector.as_str())
    }
}

impl Document for Page {
    fn query_selector(&self, selector: &str) -> Option<ContainerId> {
        self.containers
            .iter()
            .position(|c| c.selector == selector)
            .map(|index| ContainerId(index as u32))
    }

    fn append_child(&mut self, parent: ContainerId, child: SurfaceId) {
        if parent.0 as usize >= self.containers.len() {
            log::warn!("append_child: {parent} is not part of this page, {child} left unmounted");
            return;
        }

        if let Some(previous) = self.parents.insert(child, parent) {
            self.containers[previous.0 as usize]
                .children
                .retain(|c| *c != child);
        }
        self.containers[parent.0 as usize].children.push(child);
    }

    fn remove_child(&mut self, child: SurfaceId) {
        if let Some(parent) = self.parents.remove(&child) {
            self.containers[parent.0 as usize]
                .children
                .retain(|c| *c != child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RenderSurface;

    #[test]
    fn query_selector_finds_first_match() {
        let mut page = Page::new();
        let first = page.add_container(".container");
        page.add_container(".preview");
        page.add_container(".container");

        assert_eq!(page.query_selector(".container"), Some(first));
        assert_eq!(page.query_selector(".missing"), None);
        assert_eq!(page.selector(first), Some(".container"));
    }

    #[test]
    fn resolve_selector_and_element() {
        let mut page = Page::new();
        let preview = page.add_container(".preview");

        assert_eq!(page.resolve(&".preview".into()).unwrap(), preview);
        assert_eq!(page.resolve(&preview.into()).unwrap(), preview);
    }

    #[test]
    fn resolve_unknown_selector_is_error() {
        let page = Page::new();
        let err = page.resolve(&"#nowhere".into()).unwrap_err();
        assert!(matches!(err, LensError::ContainerResolution(ref s) if s == "#nowhere"));
    }

    #[test]
    fn append_child_is_idempotent_membership() {
        let mut page = Page::new();
        let stage = page.add_container(".stage");
        let a = RenderSurface::new(1, 1).id();
        let b = RenderSurface::new(1, 1).id();

        page.append_child(stage, a);
        page.append_child(stage, b);
        page.append_child(stage, a);
        page.append_child(stage, a);

        assert_eq!(page.children(stage), &[b, a]);
        assert_eq!(page.parent_of(a), Some(stage));
    }

    #[test]
    fn append_child_reparents() {
        let mut page = Page::new();
        let left = page.add_container(".left");
        let right = page.add_container(".right");
        let surface = RenderSurface::new(1, 1).id();

        page.append_child(left, surface);
        page.append_child(right, surface);

        assert!(page.children(left).is_empty());
        assert_eq!(page.children(right), &[surface]);
        assert_eq!(page.parent_of(surface), Some(right));
    }

    #[test]
    fn remove_child_unmounts_only_that_surface() {
        let mut page = Page::new();
        let stage = page.add_container(".stage");
        let a = RenderSurface::new(1, 1).id();
        let b = RenderSurface::new(1, 1).id();
        page.append_child(stage, a);
        page.append_child(stage, b);

        page.remove_child(a);
        page.remove_child(a);

        assert_eq!(page.children(stage), &[b]);
        assert_eq!(page.parent_of(a), None);
        assert_eq!(page.parent_of(b), Some(stage));
    }

    #[test]
    fn append_to_foreign_container_is_ignored() {
        let mut page = Page::new();
        let surface = RenderSurface::new(1, 1).id();
        page.append_child(ContainerId::from_raw(42), surface);
        assert_eq!(page.parent_of(surface), None);
        assert!(page.children(ContainerId::from_raw(42)).is_empty());
    }
}
