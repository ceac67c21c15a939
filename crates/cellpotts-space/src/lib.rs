//! Grid topology for cellular Potts simulations.
//!
//! A [`CellSpace`] fixes the lattice dimensions, the boundary behaviour of each
//! axis and the neighbor offsets. Neighbor lists are precomputed once so the
//! Metropolis hot loop only performs slice lookups.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest number of axes a space may have.
pub const MAX_DIMS: usize = 3;
/// Smallest supported axis length; shorter axes alias the local 3^d box.
pub const MIN_AXIS_LEN: usize = 3;

/// Errors emitted while constructing a space.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpaceError {
    /// Indicates configuration values that cannot be used (e.g., a zero-length axis).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Per-axis boundary list does not match the number of axes.
    #[error("expected {expected} boundary modes, got {actual}")]
    BoundaryMismatch { expected: usize, actual: usize },
}

/// Behaviour of an axis at its edges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Coordinates wrap modulo the axis length.
    #[default]
    Periodic,
    /// Out-of-range neighbors do not exist.
    Fixed,
}

/// Which relative offsets count as adjacent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// Axis-aligned unit offsets (4 neighbors in 2D, 6 in 3D).
    VonNeumann,
    /// Every non-zero offset in {-1, 0, 1}^d (8 neighbors in 2D, 26 in 3D).
    #[default]
    Moore,
}

impl Neighborhood {
    fn includes(self, offset: &[isize]) -> bool {
        let manhattan: isize = offset.iter().map(|o| o.abs()).sum();
        let chebyshev = offset.iter().map(|o| o.abs()).max().unwrap_or(0);
        match self {
            Neighborhood::VonNeumann => manhattan == 1,
            Neighborhood::Moore => chebyshev == 1,
        }
    }
}

/// Serializable description of a space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpaceConfig {
    /// Axis lengths, x first.
    pub dims: Vec<usize>,
    /// Boundary mode applied to every axis.
    pub boundary: Boundary,
    /// Neighbor offsets used for adjacency.
    pub neighborhood: Neighborhood,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            dims: vec![50, 50],
            boundary: Boundary::Periodic,
            neighborhood: Neighborhood::Moore,
        }
    }
}

impl SpaceConfig {
    /// Build the described space.
    pub fn build(&self) -> Result<CellSpace, SpaceError> {
        CellSpace::new(&self.dims, self.boundary, self.neighborhood)
    }
}

/// Immutable lattice topology with precomputed neighbor lists.
#[derive(Debug, Clone)]
pub struct CellSpace {
    dims: Vec<usize>,
    strides: Vec<usize>,
    boundaries: Vec<Boundary>,
    neighborhood: Neighborhood,
    offsets: Vec<Vec<isize>>,
    len: usize,
    neighbor_starts: Vec<usize>,
    neighbor_table: Vec<usize>,
    box_offsets: Vec<Vec<isize>>,
    box_adjacency: Vec<u32>,
    neighbor_box_mask: u32,
}

impl CellSpace {
    /// Create a space with the same boundary mode on every axis.
    pub fn new(
        dims: &[usize],
        boundary: Boundary,
        neighborhood: Neighborhood,
    ) -> Result<Self, SpaceError> {
        Self::with_boundaries(dims, &vec![boundary; dims.len()], neighborhood)
    }

    /// Create a space with an explicit boundary mode per axis.
    pub fn with_boundaries(
        dims: &[usize],
        boundaries: &[Boundary],
        neighborhood: Neighborhood,
    ) -> Result<Self, SpaceError> {
        if dims.is_empty() {
            return Err(SpaceError::InvalidConfig("space needs at least one axis"));
        }
        if dims.len() > MAX_DIMS {
            return Err(SpaceError::InvalidConfig("space supports at most three axes"));
        }
        if dims.iter().any(|&d| d < MIN_AXIS_LEN) {
            return Err(SpaceError::InvalidConfig(
                "every axis must be at least 3 locations long",
            ));
        }
        if boundaries.len() != dims.len() {
            return Err(SpaceError::BoundaryMismatch {
                expected: dims.len(),
                actual: boundaries.len(),
            });
        }
        let len = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or(SpaceError::InvalidConfig("grid size overflows usize"))?;

        let mut strides = Vec::with_capacity(dims.len());
        let mut stride = 1;
        for &d in dims {
            strides.push(stride);
            stride *= d;
        }

        let box_offsets = unit_box(dims.len());
        let offsets: Vec<Vec<isize>> = box_offsets
            .iter()
            .filter(|o| neighborhood.includes(o))
            .cloned()
            .collect();

        let mut neighbor_box_mask = 0u32;
        let mut box_adjacency = vec![0u32; box_offsets.len()];
        for (i, a) in box_offsets.iter().enumerate() {
            if neighborhood.includes(a) {
                neighbor_box_mask |= 1 << i;
            }
            if a.iter().all(|&o| o == 0) {
                continue;
            }
            for (j, b) in box_offsets.iter().enumerate() {
                if i == j || b.iter().all(|&o| o == 0) {
                    continue;
                }
                let diff: Vec<isize> = a.iter().zip(b).map(|(x, y)| y - x).collect();
                if neighborhood.includes(&diff) {
                    box_adjacency[i] |= 1 << j;
                }
            }
        }

        let mut space = Self {
            dims: dims.to_vec(),
            strides,
            boundaries: boundaries.to_vec(),
            neighborhood,
            offsets,
            len,
            neighbor_starts: Vec::with_capacity(len + 1),
            neighbor_table: Vec::new(),
            box_offsets,
            box_adjacency,
            neighbor_box_mask,
        };
        space.build_neighbor_table();
        Ok(space)
    }

    fn build_neighbor_table(&mut self) {
        self.neighbor_table.reserve(self.len * self.offsets.len());
        self.neighbor_starts.push(0);
        for loc in 0..self.len {
            for offset in &self.offsets {
                if let Some(n) = self.offset_location(loc, offset) {
                    self.neighbor_table.push(n);
                }
            }
            self.neighbor_starts.push(self.neighbor_table.len());
        }
    }

    /// Axis lengths, x first.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of axes.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of grid locations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always false; constructors reject empty spaces.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    #[must_use]
    pub const fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    /// Relative neighbor offsets, identical for every location.
    #[must_use]
    pub fn offsets(&self) -> &[Vec<isize>] {
        &self.offsets
    }

    /// Neighbors of `loc` in offset order; border locations on fixed axes have fewer.
    #[inline]
    #[must_use]
    pub fn neighbors(&self, loc: usize) -> &[usize] {
        &self.neighbor_table[self.neighbor_starts[loc]..self.neighbor_starts[loc + 1]]
    }

    /// Coordinates of a flat location.
    #[must_use]
    pub fn coords(&self, loc: usize) -> Vec<usize> {
        self.dims
            .iter()
            .zip(&self.strides)
            .map(|(&d, &s)| (loc / s) % d)
            .collect()
    }

    /// Flat location of `coords`, or `None` when out of range or of the wrong arity.
    #[must_use]
    pub fn location(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.dims.len() {
            return None;
        }
        let mut loc = 0;
        for ((&c, &d), &s) in coords.iter().zip(&self.dims).zip(&self.strides) {
            if c >= d {
                return None;
            }
            loc += c * s;
        }
        Some(loc)
    }

    /// Location reached from `loc` by `offset`, honouring each axis' boundary mode.
    #[must_use]
    pub fn offset_location(&self, loc: usize, offset: &[isize]) -> Option<usize> {
        let mut target = 0;
        for axis in 0..self.dims.len() {
            let d = self.dims[axis] as isize;
            let s = self.strides[axis];
            let c = ((loc / s) % self.dims[axis]) as isize + offset[axis];
            let c = if (0..d).contains(&c) {
                c
            } else {
                match self.boundaries[axis] {
                    Boundary::Periodic => c.rem_euclid(d),
                    Boundary::Fixed => return None,
                }
            };
            target += c as usize * s;
        }
        Some(target)
    }

    /// Number of positions in the local 3^d box, centre included.
    #[must_use]
    pub fn box_len(&self) -> usize {
        self.box_offsets.len()
    }

    /// Index of the centre inside the local box.
    #[must_use]
    pub fn box_center(&self) -> usize {
        self.box_offsets.len() / 2
    }

    /// Offsets of every local box position, indexed in base-3 order.
    #[must_use]
    pub fn box_offsets(&self) -> &[Vec<isize>] {
        &self.box_offsets
    }

    /// Location at box position `index` around `loc`.
    #[inline]
    #[must_use]
    pub fn box_location(&self, loc: usize, index: usize) -> Option<usize> {
        self.offset_location(loc, &self.box_offsets[index])
    }

    /// Bitmask of box positions adjacent to box position `index` (centre excluded).
    #[inline]
    #[must_use]
    pub fn box_adjacency(&self, index: usize) -> u32 {
        self.box_adjacency[index]
    }

    /// Bitmask of box positions that are neighbors of the centre.
    #[inline]
    #[must_use]
    pub const fn neighbor_box_mask(&self) -> u32 {
        self.neighbor_box_mask
    }
}

fn unit_box(ndim: usize) -> Vec<Vec<isize>> {
    let count = 3usize.pow(ndim as u32);
    (0..count)
        .map(|mut index| {
            (0..ndim)
                .map(|_| {
                    let digit = (index % 3) as isize - 1;
                    index /= 3;
                    digit
                })
                .collect()
        })
        .collect()
}
