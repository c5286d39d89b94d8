use std::marker::PhantomData;

use rayon::prelude::*;

use crate::particles::ParticleCell;

/// Stride of the c08 coloring: a base cell writes to the block of cells
/// `[base, base + overlap]`.
pub(crate) fn c08_stride(overlap: [usize; 3]) -> [usize; 3] {
    [overlap[0] + 1, overlap[1] + 1, overlap[2] + 1]
}

/// Stride of the c18 coloring: a base cell writes to the cells at forward
/// offsets, i.e. `[base.x, base.x + overlap]` along the first dimension and
/// `[base - overlap, base + overlap]` along the others.
pub(crate) fn c18_stride(overlap: [usize; 3]) -> [usize; 3] {
    [overlap[0] + 1, 2 * overlap[1] + 1, 2 * overlap[2] + 1]
}

/// Call `work` on all cells of a grid with the given `shape`. Cells are
/// grouped in colors, where two cells share a color if their indexes are
/// equal modulo `stride`. Colors are processed one after the other, in
/// lexicographic order of their offset, and the cells of a single color are
/// processed in parallel.
pub(crate) fn colored_sweep<F>(shape: [usize; 3], stride: [usize; 3], work: F)
    where F: Fn([usize; 3]) + Sync
{
    let stride = [stride[0].max(1), stride[1].max(1), stride[2].max(1)];
    let mut bases = Vec::new();
    for cx in 0..stride[0] {
        for cy in 0..stride[1] {
            for cz in 0..stride[2] {
                bases.clear();
                for x in (cx..shape[0]).step_by(stride[0]) {
                    for y in (cy..shape[1]).step_by(stride[1]) {
                        for z in (cz..shape[2]).step_by(stride[2]) {
                            bases.push([x, y, z]);
                        }
                    }
                }

                bases.par_iter().for_each(|&base| work(base));
            }
        }
    }
}

/// Shared access to the cells of a container from multiple threads.
///
/// This is only sound when the threads access disjoint sets of cells, which
/// the coloring of the traversals guarantees.
pub(crate) struct SharedCells<'a> {
    ptr: *mut ParticleCell,
    len: usize,
    marker: PhantomData<&'a mut [ParticleCell]>,
}

// SAFETY: the cells are only accessed through `get`/`get_pair`, whose callers
// guarantee exclusive access to each cell
unsafe impl Send for SharedCells<'_> {}
unsafe impl Sync for SharedCells<'_> {}

impl<'a> SharedCells<'a> {
    pub(crate) fn new(cells: &'a mut [ParticleCell]) -> SharedCells<'a> {
        SharedCells {
            ptr: cells.as_mut_ptr(),
            len: cells.len(),
            marker: PhantomData,
        }
    }

    /// Get a mutable reference to the cell at `index`.
    ///
    /// # Safety
    ///
    /// No other reference to the same cell may be alive while the returned
    /// reference is used.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get(&self, index: usize) -> &mut ParticleCell {
        assert!(index < self.len);
        return &mut *self.ptr.add(index);
    }

    /// Get mutable references to two different cells.
    ///
    /// # Safety
    ///
    /// No other reference to these cells may be alive while the returned
    /// references are used.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_pair(&self, first: usize, second: usize) -> (&mut ParticleCell, &mut ParticleCell) {
        assert!(first != second && first < self.len && second < self.len);
        return (&mut *self.ptr.add(first), &mut *self.ptr.add(second));
    }
}

/// Get two mutable references to different elements of a slice
pub(crate) fn two_mut<T>(slice: &mut [T], first: usize, second: usize) -> (&mut T, &mut T) {
    assert_ne!(first, second);
    if first < second {
        let (left, right) = slice.split_at_mut(second);
        (&mut left[first], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(first);
        (&mut right[0], &mut left[second])
    }
}
