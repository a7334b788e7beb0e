//! The collection contract and its variants.
//!
//! A collection is a named set of [`FileEntry`] values whose data can be
//! read as streams. Three variants exist:
//!
//! - [`DirectoryCollection`]: a directory tree on disk.
//! - [`ArchiveCollection`]: a ZIP archive, possibly embedded in a larger file.
//! - [`CollectionCollection`]: an ordered composite of other collections.
//!
//! They share the [`FileCollection`] contract and are unified by the
//! [`Collection`] enum, which is what composites store.
//!
//! # Validity
//!
//! Every collection starts open. [`close`](FileCollection::close) moves it to
//! the closed state for good. A closed collection answers only
//! [`is_valid`](FileCollection::is_valid) and `close`; every other method
//! fails with [`Error::InvalidState`]. `Clone` copies the state, so a clone of
//! a closed collection is closed too.

mod archive;
mod composite;
mod directory;

pub use archive::ArchiveCollection;
pub use composite::CollectionCollection;
pub use directory::DirectoryCollection;

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::io::Read;
use std::rc::Rc;

use crate::entry::FileEntry;
use crate::entry_path::MatchPath;
use crate::{Error, Result};

/// Display name of collections that have none of their own.
pub const DEFAULT_NAME: &str = "-";

/// A readable stream for one entry, opened on demand.
///
/// The stream does not borrow the collection it came from.
pub type EntryReader = Box<dyn Read>;

/// Lifecycle state of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionState {
    /// Queries are answered.
    #[default]
    Open,
    /// Terminal; queries fail with [`Error::InvalidState`].
    Closed,
}

impl CollectionState {
    /// Returns `true` if the state is [`Open`](Self::Open).
    pub fn is_open(self) -> bool {
        self == CollectionState::Open
    }

    /// Fails with [`Error::InvalidState`] unless open.
    pub fn check(self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::closed())
        }
    }
}

/// The contract every collection implements.
pub trait FileCollection {
    /// Returns `true` while the collection is open. Never fails.
    fn is_valid(&self) -> bool;

    /// Fails with [`Error::InvalidState`] if the collection is closed.
    fn must_be_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::closed())
        }
    }

    /// Closes the collection. Idempotent.
    ///
    /// Closing a composite does not close its children.
    fn close(&mut self);

    /// The display name.
    fn name(&self) -> Result<&str>;

    /// Number of entries.
    fn size(&self) -> Result<usize>;

    /// All entries, in collection order.
    fn entries(&self) -> Result<Vec<FileEntry>>;

    /// Looks up an entry.
    ///
    /// Returns `Ok(None)` when nothing matches.
    fn get_entry(&self, name: &str, mode: MatchPath) -> Result<Option<FileEntry>>;

    /// Opens the data of a file entry.
    ///
    /// Returns `Ok(None)` when no file matches. Directories never have a
    /// stream, so a name that only resolves to a directory yields `Ok(None)`.
    fn get_input_stream(&self, name: &str, mode: MatchPath) -> Result<Option<EntryReader>>;
}

/// Any collection variant.
///
/// `Clone` is a deep copy: a cloned composite owns clones of all of its
/// children, shared ones included.
#[derive(Debug, Clone)]
pub enum Collection {
    /// A directory tree.
    Directory(DirectoryCollection),
    /// A ZIP archive.
    Archive(ArchiveCollection),
    /// A composite of other collections.
    Composite(CollectionCollection),
}

macro_rules! dispatch {
    ($self:ident, $c:ident => $body:expr) => {
        match $self {
            Collection::Directory($c) => $body,
            Collection::Archive($c) => $body,
            Collection::Composite($c) => $body,
        }
    };
}

impl Collection {
    /// Returns the composite, if this is one.
    pub fn as_composite(&self) -> Option<&CollectionCollection> {
        match self {
            Collection::Composite(cc) => Some(cc),
            _ => None,
        }
    }

    /// Returns the composite mutably, if this is one.
    pub fn as_composite_mut(&mut self) -> Option<&mut CollectionCollection> {
        match self {
            Collection::Composite(cc) => Some(cc),
            _ => None,
        }
    }

    /// Short name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Collection::Directory(_) => "directory",
            Collection::Archive(_) => "archive",
            Collection::Composite(_) => "composite",
        }
    }
}

impl FileCollection for Collection {
    fn is_valid(&self) -> bool {
        dispatch!(self, c => c.is_valid())
    }

    fn close(&mut self) {
        dispatch!(self, c => c.close())
    }

    fn name(&self) -> Result<&str> {
        dispatch!(self, c => c.name())
    }

    fn size(&self) -> Result<usize> {
        dispatch!(self, c => c.size())
    }

    fn entries(&self) -> Result<Vec<FileEntry>> {
        dispatch!(self, c => c.entries())
    }

    fn get_entry(&self, name: &str, mode: MatchPath) -> Result<Option<FileEntry>> {
        dispatch!(self, c => c.get_entry(name, mode))
    }

    fn get_input_stream(&self, name: &str, mode: MatchPath) -> Result<Option<EntryReader>> {
        dispatch!(self, c => c.get_input_stream(name, mode))
    }
}

impl From<DirectoryCollection> for Collection {
    fn from(c: DirectoryCollection) -> Self {
        Collection::Directory(c)
    }
}

impl From<ArchiveCollection> for Collection {
    fn from(c: ArchiveCollection) -> Self {
        Collection::Archive(c)
    }
}

impl From<CollectionCollection> for Collection {
    fn from(c: CollectionCollection) -> Self {
        Collection::Composite(c)
    }
}

/// A shared, mutable handle to a collection.
///
/// Every clone of the handle refers to the same collection: closing it
/// through one handle is observed through all others, including composites
/// the handle was added to with
/// [`add_shared`](CollectionCollection::add_shared).
///
/// Handles are single-threaded (`Rc<RefCell<_>>`).
#[derive(Clone)]
pub struct SharedCollection(Rc<RefCell<Collection>>);

impl SharedCollection {
    /// Moves `collection` behind a new handle.
    pub fn new(collection: impl Into<Collection>) -> Self {
        Self(Rc::new(RefCell::new(collection.into())))
    }

    /// Borrows the collection.
    ///
    /// # Panics
    ///
    /// Panics if the collection is currently borrowed mutably, like
    /// [`RefCell::borrow`].
    pub fn borrow(&self) -> Ref<'_, Collection> {
        self.0.borrow()
    }

    /// Borrows the collection mutably.
    ///
    /// # Panics
    ///
    /// Panics if the collection is currently borrowed, like
    /// [`RefCell::borrow_mut`].
    pub fn borrow_mut(&self) -> RefMut<'_, Collection> {
        self.0.borrow_mut()
    }

    /// Borrows the collection, failing with [`Error::InvalidState`] instead
    /// of panicking when it is borrowed mutably.
    pub fn try_borrow(&self) -> Result<Ref<'_, Collection>> {
        self.0
            .try_borrow()
            .map_err(|_| Error::InvalidState("collection is borrowed mutably".into()))
    }

    /// Returns `true` if both handles refer to the same collection.
    pub fn ptr_eq(&self, other: &SharedCollection) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Deep-copies the current collection into an owned value.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the collection, or a shared collection
    /// reachable through it, is currently borrowed mutably.
    pub fn snapshot(&self) -> Result<Collection> {
        if self.reaches_borrowed() {
            return Err(Error::InvalidState(
                "cannot copy a collection that is borrowed mutably".into(),
            ));
        }
        Ok(self.try_borrow()?.clone())
    }

    /// Returns `true` if the collection is open. `false` while it is
    /// borrowed mutably.
    pub fn is_valid(&self) -> bool {
        self.0.try_borrow().is_ok_and(|c| c.is_valid())
    }

    /// Closes the collection for every holder of the handle.
    pub fn close(&self) {
        self.0.borrow_mut().close();
    }

    /// Returns `true` if this collection, or any collection reachable
    /// through it, is currently borrowed mutably.
    ///
    /// During [`CollectionCollection::add_shared`] the receiver is borrowed
    /// mutably, so this finds handles that lead back to the receiver.
    pub(crate) fn reaches_borrowed(&self) -> bool {
        match self.0.try_borrow() {
            Err(_) => true,
            Ok(c) => c.as_composite().is_some_and(|cc| cc.reaches_borrowed()),
        }
    }
}

impl fmt::Debug for SharedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(c) => f.debug_tuple("SharedCollection").field(&*c).finish(),
            Err(_) => f.write_str("SharedCollection(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state() {
        assert!(CollectionState::default().is_open());
        assert!(CollectionState::Open.check().is_ok());
        assert!(CollectionState::Closed.check().unwrap_err().is_state_error());
    }

    #[test]
    fn test_collection_dispatch() {
        let mut c = Collection::from(CollectionCollection::new());
        assert_eq!(c.kind(), "composite");
        assert!(c.is_valid());
        assert_eq!(c.name().unwrap(), DEFAULT_NAME);
        assert_eq!(c.size().unwrap(), 0);
        c.close();
        assert!(!c.is_valid());
        assert!(c.must_be_valid().unwrap_err().is_state_error());
    }

    #[test]
    fn test_shared_handle() {
        let a = SharedCollection::new(CollectionCollection::new());
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(b.is_valid());

        let snapshot = a.snapshot().unwrap();
        a.close();
        assert!(!b.is_valid());
        assert!(snapshot.is_valid());
    }

    #[test]
    fn test_reaches_borrowed() {
        let a = SharedCollection::new(CollectionCollection::new());
        assert!(!a.reaches_borrowed());
        let guard = a.borrow_mut();
        assert!(a.reaches_borrowed());
        assert!(!a.is_valid());
        assert!(a.snapshot().unwrap_err().is_state_error());
        drop(guard);
        assert!(a.try_borrow().is_ok());
    }
}
