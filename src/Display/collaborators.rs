// Interfaces of the GUI side the acceptor drives. Drawing itself happens
// elsewhere; these only tell it what became stale.

use crate::Store::Axis;

/// Drawing surfaces of a display window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Canvas {
    Main,
    XAxis,
    YAxis,
    ZAxis,
    Cut,
}

/// Redraw hooks, each called at most once per canvas and drain cycle.
pub trait Surfaces {
    fn redraw_canvas_1d(&mut self, canvas: Canvas);
    fn redraw_canvas_2d(&mut self, canvas: Canvas);
}

/// A 1D slice through a 2D curve that follows its parent incrementally.
///
/// Every method returns whether the cut window needs a redraw.
pub trait CutView {
    /// The z range of `curve` changed to `[min, max]`.
    fn data_rescaled(&mut self, curve: usize, min: f64, max: f64) -> bool;

    /// `len` cells of `curve` starting at `(x, y)` along the x axis were written.
    fn new_points(&mut self, curve: usize, x: usize, y: usize, len: usize) -> bool;

    /// The grid now has `size` points along `axis`.
    fn num_points_changed(&mut self, axis: Axis, size: usize) -> bool;

    fn clear_curve(&mut self, curve: usize) -> bool;
}

/// For displays without a cut window.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCut;

impl CutView for NoCut {
    fn data_rescaled(&mut self, _curve: usize, _min: f64, _max: f64) -> bool {
        false
    }

    fn new_points(&mut self, _curve: usize, _x: usize, _y: usize, _len: usize) -> bool {
        false
    }

    fn num_points_changed(&mut self, _axis: Axis, _size: usize) -> bool {
        false
    }

    fn clear_curve(&mut self, _curve: usize) -> bool {
        false
    }
}
