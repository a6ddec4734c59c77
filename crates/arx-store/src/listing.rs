//! Lazy, closeable resource sequences.
//!
//! A [`Listing`] wraps a forward-only iterator that may hold backend handles
//! (open directory streams, walk state). The handle is released as soon as
//! the listing is exhausted, explicitly closed, or dropped, whichever comes
//! first. Closing twice is a no-op.

use std::fmt;

use crate::error::StorageResult;
use crate::resource::{BinaryVersion, Container, Resource};

/// Forward-only, single-pass sequence with explicit close.
pub struct Listing<T> {
    inner: Option<Box<dyn Iterator<Item = T> + Send>>,
}

/// Listing of resources under a container or directory.
pub type ResourceListing = Listing<StorageResult<Resource>>;
/// Listing of containers.
pub type ContainerListing = Listing<StorageResult<Container>>;
/// Listing of a binary's version history.
pub type VersionListing = Listing<StorageResult<BinaryVersion>>;

impl<T: Send + 'static> Listing<T> {
    /// A listing that yields nothing.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Wrap an iterator. The iterator is only advanced on demand.
    pub fn new<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner: Some(Box::new(iter.into_iter())),
        }
    }

    /// A listing whose source is produced by `open` on the first call to
    /// `next`. Nothing is opened if the listing is never advanced.
    pub fn deferred<F>(open: F) -> Self
    where
        F: FnOnce() -> Listing<T> + Send + 'static,
    {
        Self::new(std::iter::once(open).flat_map(|open| open()))
    }

    /// Chain several listings end to end, in order.
    ///
    /// Each part is only advanced once the previous one is exhausted, so
    /// deferred parts stay unopened until they are reached.
    pub fn concat<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Listing<T>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(parts.into_iter().flatten())
    }

    /// Transform every item lazily.
    pub fn map<U, F>(self, f: F) -> Listing<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        match self.inner {
            Some(inner) => Listing::new(inner.map(f)),
            None => Listing::empty(),
        }
    }

    /// Keep only items matching `predicate`.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        match self.inner {
            Some(inner) => Listing::new(inner.filter(predicate)),
            None => Listing::empty(),
        }
    }
}

impl<T> Listing<T> {
    /// Release the underlying source. Safe to call at any time, any number
    /// of times; subsequent calls to `next` yield `None`.
    pub fn close(&mut self) {
        self.inner = None;
    }

    /// `true` once the listing has been closed or exhausted.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl<T, E> Listing<Result<T, E>> {
    /// Drain the listing into a vector, stopping at the first error.
    pub fn try_collect(mut self) -> Result<Vec<T>, E> {
        let mut out = Vec::new();
        while let Some(item) = self.next() {
            out.push(item?);
        }
        Ok(out)
    }
}

impl<T> Iterator for Listing<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.inner.as_mut()?.next();
        if item.is_none() {
            self.inner = None;
        }
        item
    }
}

impl<T: Send + 'static> FromIterator<T> for Listing<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<T> fmt::Debug for Listing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing")
            .field("closed", &self.is_closed())
            .finish()
    }
}
