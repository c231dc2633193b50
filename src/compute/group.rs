//! Work groups and group-local scratch memory.

use rayon::prelude::*;

/// Identity of one work group within a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGroup {
    /// Group index in dispatch order.
    pub id: usize,
    /// Lanes per group. The final group of a dispatch may cover fewer elements.
    pub size: usize,
}

impl WorkGroup {
    /// Index of this group's first element in the dispatched buffer.
    pub fn global_offset(&self) -> usize {
        self.id * self.size
    }
}

/// Group-private scratch memory.
///
/// Lane writes made during a phase land in a pending copy and only become
/// visible to reads after [`LocalBuffer::barrier`]. Every lane therefore
/// observes the state left by the previous phase, whatever order the lanes
/// of the current phase execute in.
#[derive(Debug, Clone)]
pub struct LocalBuffer<T> {
    visible: Vec<T>,
    pending: Vec<T>,
}

impl<T: Copy + Default> LocalBuffer<T> {
    /// Allocate `len` zero (default) initialized slots.
    pub fn zeroed(len: usize) -> Self {
        Self {
            visible: vec![T::default(); len],
            pending: vec![T::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Copy `src` from global memory into the front of the buffer.
    /// Slots past `src.len()` are reset to zero.
    pub fn load(&mut self, src: &[T]) {
        let n = src.len().min(self.len());
        self.visible[..n].copy_from_slice(&src[..n]);
        self.visible[n..].fill(T::default());
        self.pending.copy_from_slice(&self.visible);
    }

    #[inline]
    pub fn read(&self, lane: usize) -> T {
        self.visible[lane]
    }

    #[inline]
    pub fn write(&mut self, lane: usize, value: T) {
        self.pending[lane] = value;
    }

    /// Publish every write of the current phase.
    pub fn barrier(&mut self) {
        self.visible.copy_from_slice(&self.pending);
    }

    /// Copy the front of the buffer back into global memory.
    pub fn store(&self, dst: &mut [T]) {
        let n = dst.len().min(self.len());
        dst[..n].copy_from_slice(&self.visible[..n]);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.visible
    }
}

/// Run `kernel` once per work group over a read-only buffer.
///
/// Returns the per-group results in group order. `group_size` must be
/// non-zero.
pub fn dispatch_groups<T, R, F>(input: &[T], group_size: usize, kernel: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(WorkGroup, &[T]) -> R + Sync,
{
    debug_assert!(group_size > 0);
    input
        .par_chunks(group_size)
        .enumerate()
        .map(|(id, chunk)| kernel(WorkGroup { id, size: group_size }, chunk))
        .collect()
}

/// Run `kernel` once per work group, each owning its slice of `data`.
pub fn dispatch_groups_mut<T, F>(data: &mut [T], group_size: usize, kernel: F)
where
    T: Send,
    F: Fn(WorkGroup, &mut [T]) + Sync,
{
    debug_assert!(group_size > 0);
    data.par_chunks_mut(group_size)
        .enumerate()
        .for_each(|(id, chunk)| kernel(WorkGroup { id, size: group_size }, chunk));
}
