//! Grid coordinates used as tree keys.

use std::fmt;

/// A 3D integer grid coordinate.
///
/// Keys order lexicographically: `x` first, then `y`, then `z`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct GridKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridKey {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// A coordinate on the `z = 0` plane.
    #[inline]
    pub const fn planar(x: i32, y: i32) -> Self {
        Self::new(x, y, 0)
    }
}

impl From<(i32, i32, i32)> for GridKey {
    #[inline]
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<GridKey> for (i32, i32, i32) {
    #[inline]
    fn from(key: GridKey) -> Self {
        (key.x, key.y, key.z)
    }
}

impl fmt::Debug for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_order() {
        assert!(GridKey::new(0, 9, 9) < GridKey::new(1, 0, 0));
        assert!(GridKey::new(1, 0, 9) < GridKey::new(1, 1, 0));
        assert!(GridKey::new(1, 1, 0) < GridKey::new(1, 1, 1));
        assert!(GridKey::new(-1, -1, -1) < GridKey::new(0, 0, 0));
        assert!(GridKey::new(i32::MIN, 0, 0) < GridKey::new(i32::MAX, i32::MIN, i32::MIN));
    }

    #[test]
    fn test_conversions() {
        let key: GridKey = (3, -4, 5).into();
        assert_eq!(key, GridKey::new(3, -4, 5));
        assert_eq!(<(i32, i32, i32)>::from(key), (3, -4, 5));
        assert_eq!(GridKey::planar(7, 8), GridKey::new(7, 8, 0));
        assert_eq!(format!("{:?}", key), "(3, -4, 5)");
    }
}
