//! Curve data models fed by decoded records.
//!
//! Values are kept as [`ScaledPoint`]s: once the value range of an axis is
//! known every stored value lies in [0, 1] relative to it. Whenever the range
//! widens all points already stored are remapped before new ones go in.

pub mod grid;
pub mod scaled;
pub mod store1d;
pub mod store2d;

pub use scaled::{d2shrt, PixelCell, PixelPoint, RangeChange, Remap, ScaledPoint, ValueRange};
pub use store1d::{Axis1d, Config1d, Curve1d, Marker, Store1d};
pub use store2d::{Axis2d, Config2d, Curve2d, Marker2d, Store2d};

/// Smallest number of points along any axis.
pub const MIN_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

/// What needs redrawing after the records of one drain cycle were applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Dirty {
    pub canvas: bool,
    pub x_axis: bool,
    pub y_axis: bool,
    pub z_axis: bool,
    pub cut: bool,
}

impl Dirty {
    pub fn mark_axis(&mut self, axis: Axis) {
        match axis {
            Axis::X => self.x_axis = true,
            Axis::Y => self.y_axis = true,
            Axis::Z => self.z_axis = true,
        }
    }

    pub fn any(&self) -> bool {
        self.canvas || self.x_axis || self.y_axis || self.z_axis || self.cut
    }
}
