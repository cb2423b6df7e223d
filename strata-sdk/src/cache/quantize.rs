//! Coordinate quantization and key packing.
//!
//! Coordinates are floored onto a grid (`div_euclid`, so `-1` and `1` land in
//! different cells) and the cell indices are bit-packed into a `u64`:
//! 26 bits of x, 26 bits of z, 12 bits of y. Distinct cells within the host's
//! coordinate range never share a key.

use serde::{Deserialize, Serialize};

const XZ_BITS: u32 = 26;
const Y_BITS: u32 = 12;
const XZ_MASK: u64 = (1 << XZ_BITS) - 1;
const Y_MASK: u64 = (1 << Y_BITS) - 1;

/// Grid used to coarsen coordinates before keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantizer {
    /// Cell size on x and z
    pub horizontal: i32,
    /// Cell size on y
    pub vertical: i32,
}

impl Quantizer {
    pub fn new(horizontal: i32, vertical: i32) -> Self {
        Self {
            horizontal: horizontal.max(1),
            vertical: vertical.max(1),
        }
    }

    /// Same cell size on every axis.
    pub fn uniform(grid: i32) -> Self {
        Self::new(grid, grid)
    }

    /// No coarsening.
    pub fn exact() -> Self {
        Self::new(1, 1)
    }

    /// Cell indices of a coordinate.
    pub fn cell(&self, x: i32, y: i32, z: i32) -> (i32, i32, i32) {
        (
            x.div_euclid(self.horizontal),
            y.div_euclid(self.vertical),
            z.div_euclid(self.horizontal),
        )
    }

    /// Packed key of the cell containing a coordinate.
    pub fn key(&self, x: i32, y: i32, z: i32) -> u64 {
        let (cx, cy, cz) = self.cell(x, y, z);
        pack(cx, cy, cz)
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::exact()
    }
}

/// Pack cell indices into a single key.
pub fn pack(x: i32, y: i32, z: i32) -> u64 {
    ((x as u64 & XZ_MASK) << (XZ_BITS + Y_BITS)) | ((z as u64 & XZ_MASK) << Y_BITS) | (y as u64 & Y_MASK)
}

/// Key of the surface-block cache: the packed cell plus the surface depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    pub cell: u64,
    pub depth: i32,
}

impl SurfaceKey {
    pub fn new(quantizer: &Quantizer, x: i32, y: i32, z: i32, depth: i32) -> Self {
        Self {
            cell: quantizer.key(x, y, z),
            depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_coordinates_share_a_cell() {
        let q = Quantizer::uniform(10);
        assert_eq!(q.key(10, 64, 10), q.key(19, 69, 11));
        assert_ne!(q.key(10, 64, 10), q.key(20, 64, 10));
        assert_ne!(q.key(10, 64, 10), q.key(10, 70, 10));
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let q = Quantizer::uniform(10);
        assert_eq!(q.cell(-1, -1, -1), (-1, -1, -1));
        assert_ne!(q.key(-1, 0, 0), q.key(1, 0, 0));
        assert_eq!(q.key(-10, 0, 0), q.key(-1, 0, 0));
    }

    #[test]
    fn test_surface_quantizer_keeps_y_exact() {
        let q = Quantizer::new(16, 1);
        assert_eq!(q.key(0, 63, 0), q.key(15, 63, 15));
        assert_ne!(q.key(0, 63, 0), q.key(0, 64, 0));
        assert_ne!(SurfaceKey::new(&q, 0, 63, 0, 1), SurfaceKey::new(&q, 0, 63, 0, 2));
    }

    #[test]
    fn test_packing_keeps_axes_apart() {
        assert_ne!(pack(1, 0, 0), pack(0, 0, 1));
        assert_ne!(pack(0, 1, 0), pack(0, 0, 1));
        assert_ne!(pack(-1, 0, 0), pack(0, -1, 0));
        assert_eq!(pack(0, 0, 0), 0);
    }
}
