use ndarray::Array3;

use crate::particles::{Particle, ParticleCell};
use crate::{Error, Vector3D};

/// Maximal number of cells, to prevent allocating too many cells with a
/// large box and a small interaction length
const MAX_NUMBER_OF_CELLS: usize = 10_000_000;

/// Regular grid of cells covering the simulation box and a halo region
/// around it.
///
/// The number of cells along each dimension is chosen such that the cell
/// length is at least `interaction_length * cell_size_factor`. When the cell
/// size factor is smaller than one, the halo spans multiple layers of cells so
/// that all particles within the interaction length of the box are covered.
///
/// Cells are indexed by `[x, y, z]`, and stored in row-major order: `z` is
/// the fastest varying index, `x` the slowest.
/// `flat = (x * ny + y) * nz + z`.
#[derive(Debug, Clone)]
pub struct CellBlock {
    box_min: Vector3D,
    box_max: Vector3D,
    interaction_length: f64,
    cell_size_factor: f64,
    /// Length of a cell along each dimension
    cell_length: [f64; 3],
    /// Number of cells needed to cover the interaction length along each
    /// dimension, this is also the number of halo layers
    overlap: [usize; 3],
    cells: Array3<ParticleCell>,
}

impl CellBlock {
    /// Create a new empty cell block covering the box between `box_min` and
    /// `box_max`
    pub fn new(box_min: Vector3D, box_max: Vector3D, interaction_length: f64, cell_size_factor: f64) -> Result<CellBlock, Error> {
        if !(interaction_length > 0.0) || !interaction_length.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "interaction length must be a positive number, got {}", interaction_length
            )));
        }

        if !(cell_size_factor > 0.0) || !cell_size_factor.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "cell size factor must be a positive number, got {}", cell_size_factor
            )));
        }

        let mut cell_length = [0.0; 3];
        let mut overlap = [0; 3];
        let mut shape = [0; 3];
        for dim in 0..3 {
            let length = box_max[dim] - box_min[dim];
            if !(length > 0.0) || !length.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "box_max must be larger than box_min along all dimensions, got {:?} and {:?}",
                    box_min, box_max
                )));
            }

            let n_cells = f64::floor(length / (interaction_length * cell_size_factor)).max(1.0) as usize;
            cell_length[dim] = length / n_cells as f64;
            overlap[dim] = f64::ceil(interaction_length / cell_length[dim]) as usize;
            shape[dim] = n_cells + 2 * overlap[dim];
        }

        let n_cells = shape.iter().try_fold(1_usize, |acc, &n| acc.checked_mul(n));
        match n_cells {
            Some(n) if n <= MAX_NUMBER_OF_CELLS => {}
            _ => {
                return Err(Error::InvalidParameter(format!(
                    "too many cells ({:?}) for this box and interaction length, \
                    try using a larger cell size factor", shape
                )));
            }
        }

        Ok(CellBlock {
            box_min: box_min,
            box_max: box_max,
            interaction_length: interaction_length,
            cell_size_factor: cell_size_factor,
            cell_length: cell_length,
            overlap: overlap,
            cells: Array3::from_elem(shape, ParticleCell::new()),
        })
    }

    pub fn box_min(&self) -> Vector3D {
        self.box_min
    }

    pub fn box_max(&self) -> Vector3D {
        self.box_max
    }

    pub fn interaction_length(&self) -> f64 {
        self.interaction_length
    }

    pub fn cell_size_factor(&self) -> f64 {
        self.cell_size_factor
    }

    /// Length of the cells along each dimension
    pub fn cell_length(&self) -> [f64; 3] {
        self.cell_length
    }

    /// Number of cells needed to cover the interaction length along each
    /// dimension
    pub fn overlap(&self) -> [usize; 3] {
        self.overlap
    }

    /// Number of cells along each dimension, including halo cells
    pub fn cells_per_dimension(&self) -> [usize; 3] {
        let shape = self.cells.shape();
        [shape[0], shape[1], shape[2]]
    }

    /// Total number of cells, including halo cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get the 3D index of the cell containing `position`. Positions outside
    /// of the halo region are put in the outermost halo cells.
    pub fn cell_index(&self, position: Vector3D) -> [usize; 3] {
        let shape = self.cells_per_dimension();
        let mut index = [0; 3];
        for dim in 0..3 {
            let relative = (position[dim] - self.box_min[dim]) / self.cell_length[dim];
            let i = f64::floor(relative) + self.overlap[dim] as f64;
            index[dim] = i.clamp(0.0, (shape[dim] - 1) as f64) as usize;
        }
        return index;
    }

    /// Get the flat index corresponding to the 3D cell `index`
    pub fn flat_index(&self, index: [usize; 3]) -> usize {
        let shape = self.cells_per_dimension();
        (index[0] * shape[1] + index[1]) * shape[2] + index[2]
    }

    /// Get the 3D index corresponding to the `flat` cell index
    pub fn unflatten(&self, flat: usize) -> [usize; 3] {
        let shape = self.cells_per_dimension();
        [flat / (shape[1] * shape[2]), (flat / shape[2]) % shape[1], flat % shape[2]]
    }

    /// Is the cell at `index` part of the halo?
    pub fn is_halo_cell(&self, index: [usize; 3]) -> bool {
        let shape = self.cells_per_dimension();
        (0..3).any(|dim| index[dim] < self.overlap[dim] || index[dim] >= shape[dim] - self.overlap[dim])
    }

    /// Is `position` inside the simulation box?
    pub fn is_inside(&self, position: Vector3D) -> bool {
        position.is_inside(&self.box_min, &self.box_max)
    }

    /// Is `position` inside the halo region around the box?
    pub fn is_in_halo(&self, position: Vector3D) -> bool {
        let halo = Vector3D::new(self.interaction_length, self.interaction_length, self.interaction_length);
        !self.is_inside(position) && position.is_inside(&(self.box_min - halo), &(self.box_max + halo))
    }

    /// Offsets of all the cells which might contain particles within the
    /// interaction length of a particle in the central cell, including the
    /// central cell itself.
    pub fn neighbor_offsets(&self) -> Vec<[isize; 3]> {
        neighbor_offsets(self.overlap, self.cell_length, self.interaction_length)
    }

    /// Add a particle to the cell containing its position
    pub fn push(&mut self, particle: Particle) {
        let index = self.cell_index(particle.position);
        self.cells[index].push(particle);
    }

    /// Remove all particles from all cells and return them
    pub fn take_particles(&mut self) -> Vec<Particle> {
        let mut particles = Vec::new();
        for cell in &mut self.cells {
            particles.append(&mut cell.particles);
        }
        return particles;
    }

    /// Put all the particles back in the right cell after they moved, and
    /// remove dummy particles
    pub fn rebin(&mut self) {
        for particle in self.take_particles() {
            if !particle.is_dummy() {
                self.push(particle);
            }
        }
    }

    pub fn cells(&self) -> &Array3<ParticleCell> {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut Array3<ParticleCell> {
        &mut self.cells
    }

    /// Get all cells as a slice, ordered by flat index
    pub fn as_slice(&self) -> Result<&[ParticleCell], Error> {
        self.cells.as_slice().ok_or_else(|| Error::Internal("cells are not contiguous".into()))
    }

    /// Get all cells as a mutable slice, ordered by flat index
    pub fn as_slice_mut(&mut self) -> Result<&mut [ParticleCell], Error> {
        self.cells.as_slice_mut().ok_or_else(|| Error::Internal("cells are not contiguous".into()))
    }
}

/// Offsets of the cells within `overlap` of a central cell whose minimal
/// distance to the central cell is below the interaction length.
pub(crate) fn neighbor_offsets(overlap: [usize; 3], cell_length: [f64; 3], interaction_length: f64) -> Vec<[isize; 3]> {
    let overlap = [overlap[0] as isize, overlap[1] as isize, overlap[2] as isize];
    let interaction_length2 = interaction_length * interaction_length;

    let mut offsets = Vec::new();
    for x in -overlap[0]..=overlap[0] {
        for y in -overlap[1]..=overlap[1] {
            for z in -overlap[2]..=overlap[2] {
                let offset = [x, y, z];
                let mut distance2 = 0.0;
                for dim in 0..3 {
                    let gap = (offset[dim].abs() - 1).max(0) as f64 * cell_length[dim];
                    distance2 += gap * gap;
                }

                if distance2 <= interaction_length2 {
                    offsets.push(offset);
                }
            }
        }
    }
    return offsets;
}

/// Apply `offset` to `index`, returning `None` if the result is outside of a
/// grid with the given `shape`
#[inline]
pub(crate) fn offset_cell(shape: [usize; 3], index: [usize; 3], offset: [isize; 3]) -> Option<[usize; 3]> {
    let mut result = [0; 3];
    for dim in 0..3 {
        let i = index[dim] as isize + offset[dim];
        if i < 0 || i >= shape[dim] as isize {
            return None;
        }
        result[dim] = i as usize;
    }
    return Some(result);
}

/// Is `offset` in the forward half-space, i.e. does a cell at this offset
/// have a larger flat index than the central cell?
#[inline]
pub(crate) fn is_forward(offset: [isize; 3]) -> bool {
    offset[0] > 0 || (offset[0] == 0 && (offset[1] > 0 || (offset[1] == 0 && offset[2] > 0)))
}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;

    use super::*;

    #[test]
    fn geometry() {
        let block = CellBlock::new(Vector3D::zero(), Vector3D::new(10.0, 10.0, 5.0), 2.4, 1.0).unwrap();
        assert_eq!(block.cells_per_dimension(), [6, 6, 4]);
        assert_eq!(block.overlap(), [1, 1, 1]);
        assert_ulps_eq!(block.cell_length()[0], 2.5);
        assert_ulps_eq!(block.cell_length()[2], 2.5);

        let block = CellBlock::new(Vector3D::zero(), Vector3D::new(10.0, 10.0, 10.0), 2.0, 0.5).unwrap();
        assert_eq!(block.cells_per_dimension(), [14, 14, 14]);
        assert_eq!(block.overlap(), [2, 2, 2]);

        assert!(CellBlock::new(Vector3D::zero(), Vector3D::new(1.0, 0.0, 1.0), 2.0, 1.0).is_err());
        assert!(CellBlock::new(Vector3D::zero(), Vector3D::new(1.0, 1.0, 1.0), -2.0, 1.0).is_err());
        assert!(CellBlock::new(Vector3D::zero(), Vector3D::new(1.0, 1.0, 1.0), 2.0, 0.0).is_err());
    }

    #[test]
    fn indexes() {
        let block = CellBlock::new(Vector3D::zero(), Vector3D::new(10.0, 10.0, 10.0), 2.5, 1.0).unwrap();
        assert_eq!(block.cells_per_dimension(), [6, 6, 6]);

        assert_eq!(block.cell_index(Vector3D::new(0.1, 0.1, 0.1)), [1, 1, 1]);
        assert_eq!(block.cell_index(Vector3D::new(9.9, 5.0, 2.4)), [4, 3, 1]);
        assert_eq!(block.cell_index(Vector3D::new(-1.0, 11.0, 5.0)), [0, 5, 3]);
        // far away particles end up in the outermost halo cells
        assert_eq!(block.cell_index(Vector3D::new(-100.0, 100.0, 5.0)), [0, 5, 3]);

        for flat in 0..block.len() {
            assert_eq!(block.flat_index(block.unflatten(flat)), flat);
        }
        assert_eq!(block.flat_index([1, 0, 0]), 36);
        assert_eq!(block.flat_index([0, 1, 0]), 6);
        assert_eq!(block.flat_index([0, 0, 1]), 1);

        assert!(block.is_halo_cell([0, 3, 3]));
        assert!(block.is_halo_cell([3, 5, 3]));
        assert!(!block.is_halo_cell([1, 4, 2]));

        assert!(block.is_in_halo(Vector3D::new(-1.0, 5.0, 5.0)));
        assert!(!block.is_in_halo(Vector3D::new(1.0, 5.0, 5.0)));
        assert!(!block.is_in_halo(Vector3D::new(-3.0, 5.0, 5.0)));
    }

    #[test]
    fn rebin() {
        let mut block = CellBlock::new(Vector3D::zero(), Vector3D::new(4.0, 4.0, 4.0), 1.0, 1.0).unwrap();
        block.push(Particle::new(0, Vector3D::new(0.5, 0.5, 0.5)));
        block.push(Particle::new(1, Vector3D::new(1.5, 0.5, 0.5)));
        let mut dummy = Particle::new(2, Vector3D::new(2.5, 0.5, 0.5));
        dummy.mark_dummy();
        block.push(dummy);

        for cell in block.cells_mut() {
            for particle in &mut cell.particles {
                if particle.id == 0 {
                    particle.position = Vector3D::new(3.5, 3.5, 3.5);
                }
            }
        }
        block.rebin();

        let particles = block.cells().iter().flat_map(|cell| &cell.particles).collect::<Vec<_>>();
        assert_eq!(particles.len(), 2);
        assert!(particles.iter().all(|particle| !particle.is_dummy()));
        assert_eq!(block.cells()[[4, 4, 4]].len(), 1);
        assert_eq!(block.cells()[[4, 4, 4]].particles[0].id, 0);
    }

    #[test]
    fn offsets() {
        let offsets = neighbor_offsets([1, 1, 1], [1.0, 1.0, 1.0], 1.0);
        assert_eq!(offsets.len(), 27);
        assert_eq!(offsets.iter().filter(|&&o| is_forward(o)).count(), 13);

        // the corners at distance sqrt(3) are too far
        let offsets = neighbor_offsets([2, 2, 2], [0.6, 0.6, 0.6], 1.0);
        assert!(!offsets.contains(&[2, 2, 2]));
        assert!(!offsets.contains(&[-2, 2, -2]));
        assert!(offsets.contains(&[2, 2, 1]));
        assert!(offsets.contains(&[2, 0, 0]));

        assert_eq!(offset_cell([3, 3, 3], [0, 1, 2], [1, 1, 0]), Some([1, 2, 2]));
        assert_eq!(offset_cell([3, 3, 3], [0, 1, 2], [-1, 1, 0]), None);
        assert_eq!(offset_cell([3, 3, 3], [0, 1, 2], [0, 0, 1]), None);
    }
}
