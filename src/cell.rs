/// Per-cell simulation state stored in the grid.
///
/// `material_id` refers to an entry in an external liquid-properties table.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cell {
    /// `[vx, vy, vz]`; `vz` is 0 for two-dimensional use.
    pub velocity: [f32; 3],
    pub pressure: f32,
    pub material_id: i32,
}

impl Cell {
    #[inline]
    pub const fn new(velocity: [f32; 3], pressure: f32, material_id: i32) -> Self {
        Self {
            velocity,
            pressure,
            material_id,
        }
    }

    #[inline]
    pub const fn planar(vx: f32, vy: f32, pressure: f32, material_id: i32) -> Self {
        Self::new([vx, vy, 0.0], pressure, material_id)
    }
}
