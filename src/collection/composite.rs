//! Composite collections.

use std::ops::ControlFlow;

use super::{
    Collection, CollectionState, DEFAULT_NAME, EntryReader, FileCollection, SharedCollection,
};
use crate::entry::FileEntry;
use crate::entry_path::MatchPath;
use crate::{Error, Result};

#[derive(Debug)]
enum Child {
    /// Added by value; nobody else can reach it.
    Owned(Collection),
    /// Added by handle; observed live.
    Shared(SharedCollection),
}

/// An ordered collection of collections.
///
/// Lookups ask each child in insertion order and return the first hit, so
/// earlier children shadow later ones. [`size`](FileCollection::size) is the
/// sum of the child sizes and [`entries`](FileCollection::entries) the
/// concatenation of the child entries.
///
/// Children are added either by value ([`add_collection`](Self::add_collection),
/// a deep copy the composite owns) or by handle ([`add_shared`](Self::add_shared),
/// a [`SharedCollection`] whose later changes are visible here). A shared child
/// that gets closed after being added is skipped by all queries.
///
/// Closing a composite does not close its children.
///
/// # Example
///
/// ```rust
/// use zipcollection::{CollectionCollection, FileCollection, MatchPath, SharedCollection};
///
/// let mut outer = CollectionCollection::new();
/// let inner = SharedCollection::new(CollectionCollection::new());
/// assert!(outer.add_shared(inner.clone()).unwrap());
/// assert_eq!(outer.size().unwrap(), 0);
/// assert!(outer.get_entry("missing.txt", MatchPath::Match).unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct CollectionCollection {
    name: String,
    state: CollectionState,
    children: Vec<Child>,
}

impl Default for CollectionCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CollectionCollection {
    /// Deep-copies every child, shared ones included, into owned children.
    fn clone(&self) -> Self {
        let children = self
            .children
            .iter()
            .map(|child| match child {
                Child::Owned(c) => Child::Owned(c.clone()),
                Child::Shared(h) => match h.snapshot() {
                    Ok(c) => Child::Owned(c),
                    Err(_) => {
                        log::warn!(
                            "shared child of '{}' is borrowed, the copy keeps the handle",
                            self.name
                        );
                        Child::Shared(h.clone())
                    }
                },
            })
            .collect();
        Self {
            name: self.name.clone(),
            state: self.state,
            children,
        }
    }
}

impl CollectionCollection {
    /// Creates an empty composite named `"-"`.
    pub fn new() -> Self {
        Self::with_name(DEFAULT_NAME)
    }

    /// Creates an empty composite with a display name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: CollectionState::Open,
            children: Vec::new(),
        }
    }

    /// Adds a deep copy of `collection`.
    ///
    /// Returns `Ok(false)` without adding anything if `collection` is
    /// closed, or if it is a composite that contains this one through a
    /// shared handle. Later changes to `collection` do not affect this
    /// composite.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if this composite is closed.
    pub fn add_collection<C>(&mut self, collection: &C) -> Result<bool>
    where
        C: FileCollection + Clone + Into<Collection>,
    {
        self.must_be_valid()?;
        if !collection.is_valid() {
            log::debug!("not adding closed collection to '{}'", self.name);
            return Ok(false);
        }
        let child: Collection = collection.clone().into();
        // A shared handle inside the copy that cannot be borrowed leads back
        // to the receiver, which is borrowed mutably for this call.
        if child.as_composite().is_some_and(|cc| cc.reaches_borrowed()) {
            log::debug!("refusing to add a copy containing '{}' to itself", self.name);
            return Ok(false);
        }
        log::debug!(
            "adding {} collection to '{}' by value",
            child.kind(),
            self.name
        );
        self.children.push(Child::Owned(child));
        Ok(true)
    }

    /// Adopts a shared handle.
    ///
    /// The child is observed live: entries it gains later show up here, and
    /// once it is closed it is skipped.
    ///
    /// Returns `Ok(false)` without adding anything if the handle refers to
    /// this composite (directly or through nested composites), or if the
    /// child is closed.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if this composite is closed.
    /// - [`Error::InvalidArgument`] if `handle` is `None`.
    pub fn add_shared(&mut self, handle: impl Into<Option<SharedCollection>>) -> Result<bool> {
        self.must_be_valid()?;
        let Some(handle) = handle.into() else {
            return Err(Error::InvalidArgument(
                "cannot add an empty collection handle".into(),
            ));
        };

        // The receiver of an add through a handle is borrowed mutably right
        // now, so a handle leading back to it cannot be borrowed.
        if handle.reaches_borrowed() {
            log::debug!("refusing to add '{}' to itself", self.name);
            return Ok(false);
        }

        let child = handle.try_borrow()?;
        if !child.is_valid() {
            log::debug!("not adding closed collection to '{}'", self.name);
            return Ok(false);
        }
        log::debug!(
            "adding {} collection to '{}' by handle",
            child.kind(),
            self.name
        );
        drop(child);

        self.children.push(Child::Shared(handle));
        Ok(true)
    }

    /// Number of direct children, including closed shared ones.
    pub fn child_count(&self) -> Result<usize> {
        self.must_be_valid()?;
        Ok(self.children.len())
    }

    /// Names of the direct children that are still open, in order.
    pub fn child_names(&self) -> Result<Vec<String>> {
        self.must_be_valid()?;
        let mut names = Vec::new();
        self.visit::<()>(|c| {
            names.push(c.name()?.to_string());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(names)
    }

    /// Calls `f` with every open child in order until it breaks.
    fn visit<T>(
        &self,
        mut f: impl FnMut(&Collection) -> Result<ControlFlow<T>>,
    ) -> Result<Option<T>> {
        for child in &self.children {
            let flow = match child {
                Child::Owned(c) => {
                    if !c.is_valid() {
                        continue;
                    }
                    f(c)?
                }
                Child::Shared(h) => {
                    let c = h.try_borrow()?;
                    if !c.is_valid() {
                        log::warn!(
                            "skipping closed {} collection in '{}'",
                            c.kind(),
                            self.name
                        );
                        continue;
                    }
                    f(&c)?
                }
            };
            if let ControlFlow::Break(value) = flow {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub(crate) fn reaches_borrowed(&self) -> bool {
        self.children.iter().any(|child| match child {
            Child::Owned(c) => c.as_composite().is_some_and(|cc| cc.reaches_borrowed()),
            Child::Shared(h) => h.reaches_borrowed(),
        })
    }
}

impl FileCollection for CollectionCollection {
    fn is_valid(&self) -> bool {
        self.state.is_open()
    }

    fn close(&mut self) {
        if self.state.is_open() {
            log::debug!("closing composite '{}'", self.name);
        }
        self.state = CollectionState::Closed;
    }

    fn name(&self) -> Result<&str> {
        self.must_be_valid()?;
        Ok(&self.name)
    }

    fn size(&self) -> Result<usize> {
        self.must_be_valid()?;
        let mut total = 0;
        self.visit::<()>(|c| {
            total += c.size()?;
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(total)
    }

    fn entries(&self) -> Result<Vec<FileEntry>> {
        self.must_be_valid()?;
        let mut all = Vec::new();
        self.visit::<()>(|c| {
            all.extend(c.entries()?);
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(all)
    }

    fn get_entry(&self, name: &str, mode: MatchPath) -> Result<Option<FileEntry>> {
        self.must_be_valid()?;
        self.visit(|c| {
            Ok(match c.get_entry(name, mode)? {
                Some(entry) => ControlFlow::Break(entry),
                None => ControlFlow::Continue(()),
            })
        })
    }

    fn get_input_stream(&self, name: &str, mode: MatchPath) -> Result<Option<EntryReader>> {
        self.must_be_valid()?;
        // Resolve like get_entry: the first child with a match decides, and
        // a directory hit means no stream.
        let stream = self.visit(|c| {
            Ok(match c.get_entry(name, mode)? {
                None => ControlFlow::Continue(()),
                Some(entry) if entry.is_directory => ControlFlow::Break(None),
                Some(_) => ControlFlow::Break(c.get_input_stream(name, mode)?),
            })
        })?;
        Ok(stream.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(name: &str, children: usize) -> CollectionCollection {
        let mut cc = CollectionCollection::with_name(name);
        for i in 0..children {
            let child = CollectionCollection::with_name(format!("{}-{}", name, i));
            assert!(cc.add_collection(&child).unwrap());
        }
        cc
    }

    #[test]
    fn test_empty_composite() {
        let cc = CollectionCollection::new();
        assert!(cc.is_valid());
        assert_eq!(cc.name().unwrap(), "-");
        assert_eq!(cc.size().unwrap(), 0);
        assert!(cc.entries().unwrap().is_empty());
        assert!(cc.get_entry("a", MatchPath::Match).unwrap().is_none());
        assert!(cc.get_input_stream("a", MatchPath::Ignore).unwrap().is_none());
        assert_eq!(cc.child_count().unwrap(), 0);
    }

    #[test]
    fn test_add_by_value_is_independent() {
        let mut cc = CollectionCollection::new();
        let mut child = CollectionCollection::with_name("child");
        assert!(cc.add_collection(&child).unwrap());
        child.close();
        assert_eq!(cc.child_names().unwrap(), vec!["child".to_string()]);
    }

    #[test]
    fn test_add_closed_value_is_refused() {
        let mut cc = CollectionCollection::new();
        let mut child = CollectionCollection::new();
        child.close();
        assert!(!cc.add_collection(&child).unwrap());
        assert_eq!(cc.child_count().unwrap(), 0);
    }

    #[test]
    fn test_add_none_handle() {
        let mut cc = CollectionCollection::new();
        let err = cc.add_shared(None::<SharedCollection>).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_add_self_handle() {
        let shared = SharedCollection::new(CollectionCollection::new());
        let added = shared
            .borrow_mut()
            .as_composite_mut()
            .unwrap()
            .add_shared(shared.clone())
            .unwrap();
        assert!(!added);
        assert_eq!(shared.borrow().size().unwrap(), 0);
    }

    #[test]
    fn test_add_indirect_cycle() {
        let a = SharedCollection::new(CollectionCollection::with_name("a"));
        let b = SharedCollection::new(CollectionCollection::with_name("b"));
        assert!(a.borrow_mut().as_composite_mut().unwrap().add_shared(b.clone()).unwrap());
        let added = b
            .borrow_mut()
            .as_composite_mut()
            .unwrap()
            .add_shared(a.clone())
            .unwrap();
        assert!(!added);
    }

    #[test]
    fn test_add_copy_that_contains_receiver() {
        let a = SharedCollection::new(CollectionCollection::with_name("a"));
        let mut x = CollectionCollection::with_name("x");
        assert!(x.add_shared(a.clone()).unwrap());

        let added = a
            .borrow_mut()
            .as_composite_mut()
            .unwrap()
            .add_collection(&x)
            .unwrap();
        assert!(!added);
        assert_eq!(a.borrow().as_composite().unwrap().child_count().unwrap(), 0);

        // Unrelated copies are still accepted afterwards.
        let mut guard = a.borrow_mut();
        let cc = guard.as_composite_mut().unwrap();
        assert!(cc.add_collection(&CollectionCollection::with_name("y")).unwrap());
        assert_eq!(cc.child_names().unwrap(), vec!["y".to_string()]);
    }

    #[test]
    fn test_clone_keeps_borrowed_handle() {
        let a = SharedCollection::new(CollectionCollection::with_name("a"));
        let mut x = CollectionCollection::with_name("x");
        x.add_shared(a.clone()).unwrap();

        let guard = a.borrow_mut();
        let copy = x.clone();
        assert!(copy.reaches_borrowed());
        drop(guard);

        a.close();
        assert!(copy.child_names().unwrap().is_empty());
    }

    #[test]
    fn test_closed_shared_child_is_skipped() {
        let mut cc = CollectionCollection::new();
        let first = SharedCollection::new(nested("first", 0));
        let second = SharedCollection::new(nested("second", 0));
        assert!(cc.add_shared(first.clone()).unwrap());
        assert!(cc.add_shared(second.clone()).unwrap());

        first.close();
        assert_eq!(cc.child_count().unwrap(), 2);
        assert_eq!(cc.child_names().unwrap(), vec!["second".to_string()]);
        assert_eq!(cc.size().unwrap(), 0);
    }

    #[test]
    fn test_clone_snapshots_shared_children() {
        let mut cc = CollectionCollection::new();
        let shared = SharedCollection::new(nested("shared", 0));
        cc.add_shared(shared.clone()).unwrap();

        let copy = cc.clone();
        shared.close();
        assert_eq!(copy.child_names().unwrap(), vec!["shared".to_string()]);
        assert!(cc.child_names().unwrap().is_empty());
    }

    #[test]
    fn test_closed_composite() {
        let mut cc = nested("cc", 2);
        cc.close();
        cc.close();
        assert!(!cc.is_valid());
        assert!(cc.name().unwrap_err().is_state_error());
        assert!(cc.size().unwrap_err().is_state_error());
        assert!(cc.entries().unwrap_err().is_state_error());
        assert!(cc.child_count().unwrap_err().is_state_error());
        assert!(cc.add_shared(None::<SharedCollection>).unwrap_err().is_state_error());
        assert!(
            cc.add_collection(&CollectionCollection::new())
                .unwrap_err()
                .is_state_error()
        );

        let copy = cc.clone();
        assert!(!copy.is_valid());
        assert!(copy.size().unwrap_err().is_state_error());
    }
}
