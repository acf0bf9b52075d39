//! Generation-tagged record pools.
//!
//! Every linked structure of the crate (mesh vertices, edges and triangles,
//! BSP nodes and triangles) lives in an [`Arena`] and refers to its peers
//! through [`Handle`]s instead of pointers. A handle stays valid until the
//! arena is [cleared](Arena::clear) or [flushed](Arena::flush); both bump the
//! arena generation so stale handles are caught by [`Arena::get`].

use crate::errors::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Typed index of a record inside an [`Arena<T>`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Position of the record in allocation order.
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the arena that produced this handle.
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

// Manual impls: deriving would put needless bounds on `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.generation, self.index).cmp(&(other.generation, other.index))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

/// Bump allocator handing out stable [`Handle`]s to records of type `T`.
///
/// Records are never freed individually; owners flag dead records themselves
/// and reclaim the storage wholesale with [`clear`](Self::clear).
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
    generation: u32,
    limit: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Highest number of records a single arena can address.
    pub const MAX_LEN: usize = u32::MAX as usize;

    /// Create an empty arena bounded only by the handle index space.
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            generation: 0,
            limit: Self::MAX_LEN,
        }
    }

    /// Create an empty arena that refuses to hold more than `limit` records.
    ///
    /// Growth past the limit fails with [`Error::OutOfMemory`], which makes
    /// memory budgets explicit for callers that share a fixed pool.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            generation: 0,
            limit: limit.min(Self::MAX_LEN),
        }
    }

    pub const fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.min(Self::MAX_LEN);
    }

    /// Make room for `additional` more records without reallocating.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let requested = self
            .items
            .len()
            .checked_add(additional)
            .ok_or_else(|| Error::Overflow("arena length overflows usize".into()))?;
        if requested > self.limit {
            return Err(Error::OutOfMemory { requested });
        }
        self.items
            .try_reserve(additional)
            .map_err(|_| Error::OutOfMemory { requested })
    }

    /// Store `value` and return its handle.
    pub fn alloc(&mut self, value: T) -> Result<Handle<T>> {
        let index = self.items.len();
        if index >= Self::MAX_LEN {
            return Err(Error::Overflow(format!(
                "arena index space exhausted at {index} records"
            )));
        }
        self.reserve(1)?;
        self.items.push(value);
        Ok(Handle::new(index as u32, self.generation))
    }

    /// Store `value` and hand back both its handle and a mutable reference.
    pub fn alloc_mut(&mut self, value: T) -> Result<(Handle<T>, &mut T)> {
        let handle = self.alloc(value)?;
        Ok((handle, &mut self.items[handle.index()]))
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if handle.generation != self.generation {
            return None;
        }
        self.items.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if handle.generation != self.generation {
            return None;
        }
        self.items.get_mut(handle.index())
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Number of records allocated since the last clear.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Drop every record but keep the backing storage.
    ///
    /// All outstanding handles become stale.
    pub fn clear(&mut self) {
        self.items.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Drop every record and release the backing storage.
    pub fn flush(&mut self) {
        self.items = Vec::new();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Exchange storage, generation and limit with `other` in O(1).
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Handle of the record at `index`, if it exists.
    pub fn handle_at(&self, index: usize) -> Option<Handle<T>> {
        (index < self.items.len()).then(|| Handle::new(index as u32, self.generation))
    }

    /// Handles of every record in allocation order.
    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + use<T> {
        let generation = self.generation;
        (0..self.items.len() as u32).map(move |i| Handle::new(i, generation))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        let generation = self.generation;
        self.items
            .iter()
            .enumerate()
            .map(move |(i, item)| (Handle::new(i as u32, generation), item))
    }

    pub fn values(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        debug_assert_eq!(handle.generation, self.generation, "stale arena handle {handle:?}");
        &self.items[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        debug_assert_eq!(handle.generation, self.generation, "stale arena handle {handle:?}");
        &mut self.items[handle.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_index() {
        let mut arena = Arena::new();
        let a = arena.alloc(1u32).unwrap();
        let b = arena.alloc(2u32).unwrap();
        assert_eq!(arena[a], 1);
        assert_eq!(arena[b], 2);
        arena[b] = 5;
        assert_eq!(arena.get(b), Some(&5));
        assert_eq!(arena.size(), 2);
    }

    #[test]
    fn clear_invalidates_handles_but_keeps_capacity() {
        let mut arena = Arena::new();
        let a = arena.alloc(7i32).unwrap();
        arena.reserve(64).unwrap();
        let capacity = arena.capacity();
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.capacity(), capacity);

        arena.flush();
        assert_eq!(arena.capacity(), 0);
    }

    #[test]
    fn limit_reports_out_of_memory() {
        let mut arena = Arena::with_limit(2);
        arena.alloc('a').unwrap();
        arena.alloc('b').unwrap();
        assert_eq!(arena.alloc('c'), Err(Error::OutOfMemory { requested: 3 }));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn alloc_mut_returns_the_new_record() {
        let mut arena = Arena::new();
        let (handle, value) = arena.alloc_mut(String::from("edge")).unwrap();
        value.push('s');
        assert_eq!(arena[handle], "edges");
    }
}
