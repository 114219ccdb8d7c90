use super::grid;
use super::scaled::{d2shrt, PixelCell, RangeChange, Remap, ScaledPoint, ValueRange};
use super::{Axis, Dirty, MIN_POINTS};
use crate::error::{IpcError, Result};
use crate::Display::CutView;
use crate::Protocol::record::{
    SCALE_X_DELTA, SCALE_X_START, SCALE_Y_DELTA, SCALE_Y_START, SCALE_Z_DELTA, SCALE_Z_START,
};
use crate::Protocol::{Command2d, Record2d};

const X: usize = Axis::X as usize;
const Y: usize = Axis::Y as usize;
const Z: usize = Axis::Z as usize;

#[derive(Debug, Clone)]
pub struct Config2d {
    pub curves: usize,
    pub nx: usize,
    pub ny: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub full_scale: bool,
}

impl Default for Config2d {
    fn default() -> Self {
        Self {
            curves: 1,
            nx: 16,
            ny: 16,
            canvas_width: 400,
            canvas_height: 400,
            full_scale: true,
        }
    }
}

impl Config2d {
    fn validate(&self) -> Result<()> {
        if self.curves == 0 {
            return Err(IpcError::Config("a 2D display needs at least one curve".into()));
        }
        if self.nx < MIN_POINTS || self.ny < MIN_POINTS {
            return Err(IpcError::Config(format!(
                "a 2D display needs at least {MIN_POINTS} points per axis, got {}x{}",
                self.nx, self.ny
            )));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(IpcError::Config("canvas size must not be zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker2d {
    pub x: usize,
    pub y: usize,
    pub color: i64,
}

/// One curve of the 2D display, a row-major `nx x ny` grid of intensities.
///
/// Unlike the 1D display every curve tracks its own z range.
#[derive(Debug, Clone)]
pub struct Curve2d {
    points: Vec<ScaledPoint>,
    pixels: Vec<PixelCell>,
    count: usize,
    s2d: [f64; 3],
    shift: [f64; 3],
    is_fs: bool,
    range: ValueRange,
    /// Real-world start and increment per axis, as set by CHANGE_SCALE.
    rwc_start: [f64; 3],
    rwc_delta: [f64; 3],
    markers: Vec<Marker2d>,
}

impl Curve2d {
    fn new(nx: usize, ny: usize, full_scale: bool) -> Self {
        Self {
            points: vec![ScaledPoint::default(); nx * ny],
            pixels: vec![PixelCell::default(); nx * ny],
            count: 0,
            s2d: [1.0; 3],
            shift: [0.0; 3],
            is_fs: full_scale,
            range: ValueRange::default(),
            rwc_start: [0.0; 3],
            rwc_delta: [1.0; 3],
            markers: Vec::new(),
        }
    }

    pub fn points(&self) -> &[ScaledPoint] {
        &self.points
    }

    pub fn pixels(&self) -> &[PixelCell] {
        &self.pixels
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn range(&self) -> &ValueRange {
        &self.range
    }

    pub fn s2d(&self) -> [f64; 3] {
        self.s2d
    }

    pub fn shift(&self) -> [f64; 3] {
        self.shift
    }

    pub fn is_full_scale(&self) -> bool {
        self.is_fs
    }

    pub fn scale_start(&self) -> [f64; 3] {
        self.rwc_start
    }

    pub fn scale_delta(&self) -> [f64; 3] {
        self.rwc_delta
    }

    pub fn markers(&self) -> &[Marker2d] {
        &self.markers
    }

    fn clear(&mut self) {
        self.points.fill(ScaledPoint::default());
        self.count = 0;
        self.range.reset();
    }

    fn relayout(&mut self, old: (usize, usize), new: (usize, usize)) -> Result<()> {
        grid::relayout(&mut self.points, old, new, ScaledPoint::default())?;
        grid::relayout(&mut self.pixels, old, new, PixelCell::default())?;
        self.count = self.points.iter().filter(|p| p.exists).count();
        Ok(())
    }

    /// One past the largest x and y in use.
    fn used_extent(&self, nx: usize) -> (usize, usize) {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.exists)
            .fold((0, 0), |(ux, uy), (i, _)| {
                (ux.max(i % nx + 1), uy.max(i / nx + 1))
            })
    }

    fn store(&mut self, index: usize, v: f64) {
        let p = &mut self.points[index];
        p.v = v;
        if !p.exists {
            p.exists = true;
            self.count += 1;
        }
    }

    fn recalc_pixels(&mut self, nx: usize, height: u32) {
        if !self.range.is_scale_set {
            return;
        }
        let top = height.saturating_sub(1).min(i16::MAX as u32) as i16;
        let (s2d, shift) = (self.s2d, self.shift);
        for (i, (p, px)) in self.points.iter().zip(self.pixels.iter_mut()).enumerate() {
            if p.exists {
                let (x, y) = ((i % nx) as f64, (i / nx) as f64);
                px.x = d2shrt(s2d[X] * (x + shift[X]));
                px.y = top.saturating_sub(d2shrt(s2d[Y] * (y + shift[Y])));
                px.z = s2d[Z] * (p.v + shift[Z]);
            }
        }
    }
}

/// Grid extents and labels shared by all 2D curves.
#[derive(Debug, Clone)]
pub struct Axis2d {
    pub nx: usize,
    pub ny: usize,
    pub labels: [String; 3],
}

/// Data model of the 2D display.
#[derive(Debug)]
pub struct Store2d {
    axis: Axis2d,
    curves: Vec<Curve2d>,
    width: u32,
    height: u32,
    dirty: Dirty,
}

impl Store2d {
    pub fn new(config: Config2d) -> Result<Self> {
        config.validate()?;

        let mut store = Self {
            axis: Axis2d {
                nx: config.nx,
                ny: config.ny,
                labels: Default::default(),
            },
            curves: (0..config.curves)
                .map(|_| Curve2d::new(config.nx, config.ny, config.full_scale))
                .collect(),
            width: config.canvas_width,
            height: config.canvas_height,
            dirty: Dirty::default(),
        };
        for c in 0..store.curves.len() {
            store.reset_pixel_scale(c);
        }
        Ok(store)
    }

    pub fn axis(&self) -> &Axis2d {
        &self.axis
    }

    pub fn nx(&self) -> usize {
        self.axis.nx
    }

    pub fn ny(&self) -> usize {
        self.axis.ny
    }

    pub fn curves(&self) -> &[Curve2d] {
        &self.curves
    }

    pub fn curve(&self, index: usize) -> Option<&Curve2d> {
        self.curves.get(index)
    }

    /// The point at `(x, y)` of `curve`, if inside the grid.
    pub fn point(&self, curve: usize, x: usize, y: usize) -> Option<ScaledPoint> {
        if x >= self.axis.nx || y >= self.axis.ny {
            return None;
        }
        self.curves
            .get(curve)
            .map(|c| c.points[y * self.axis.nx + x])
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn dirty(&self) -> Dirty {
        self.dirty
    }

    pub fn reset_dirty(&mut self) {
        self.dirty = Dirty::default();
    }

    fn curve_index(&self, curve: i64) -> Result<usize> {
        usize::try_from(curve)
            .ok()
            .filter(|&c| c < self.curves.len())
            .ok_or(IpcError::CurveOutOfRange {
                curve,
                count: self.curves.len(),
            })
    }

    fn full_scale(&self) -> [f64; 3] {
        [
            self.width.saturating_sub(1) as f64 / (self.axis.nx - 1) as f64,
            self.height.saturating_sub(1) as f64 / (self.axis.ny - 1) as f64,
            1.0,
        ]
    }

    fn reset_pixel_scale(&mut self, c: usize) {
        let s2d = self.full_scale();
        let curve = &mut self.curves[c];
        curve.s2d = s2d;
        curve.shift = [0.0; 3];
    }

    fn recalc_pixels(&mut self, only: Option<usize>) {
        let (nx, height) = (self.axis.nx, self.height);
        match only {
            Some(c) => self.curves[c].recalc_pixels(nx, height),
            None => self
                .curves
                .iter_mut()
                .for_each(|c| c.recalc_pixels(nx, height)),
        }
    }

    fn note_cut(&mut self, needs_redraw: bool) {
        self.dirty.cut |= needs_redraw;
    }

    /// Apply one curve-data record.
    ///
    /// Scalars and arrays fill a single row starting at `(x, y)`; matrix
    /// payloads fill consecutive rows from `y` on.
    pub fn apply(&mut self, record: &Record2d, cut: &mut dyn CutView) -> Result<()> {
        let c = self.curve_index(record.curve)?;
        let x = usize::try_from(record.x_index).map_err(|_| IpcError::NegativeField {
            what: "x index",
            value: record.x_index,
        })?;
        let y = usize::try_from(record.y_index).map_err(|_| IpcError::NegativeField {
            what: "y index",
            value: record.y_index,
        })?;

        let rows = record.payload.rows();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return Ok(());
        }
        let end_x = x.checked_add(width).ok_or(IpcError::Allocation(usize::MAX))?;
        let end_y = y.checked_add(rows.len()).ok_or(IpcError::Allocation(usize::MAX))?;

        let grown = if end_x > self.axis.nx || end_y > self.axis.ny {
            let new = (self.axis.nx.max(end_x), self.axis.ny.max(end_y));
            self.relayout(new, cut)?
        } else {
            false
        };

        let values: Vec<f64> = rows.iter().flatten().copied().collect();
        let z_changed = self.widen(c, &values, cut);

        let nx = self.axis.nx;
        let curve = &mut self.curves[c];
        let range = curve.range;
        for (dy, row) in rows.iter().enumerate() {
            let base = (y + dy) * nx + x;
            for (dx, &raw) in row.iter().enumerate() {
                curve.store(base + dx, range.scaled(raw));
            }
        }
        self.dirty.canvas = true;

        for (dy, row) in rows.iter().enumerate().filter(|(_, row)| !row.is_empty()) {
            let redraw = cut.new_points(c, x, y + dy, row.len());
            self.note_cut(redraw);
        }

        // a changed x or y scale moves the cells of every curve
        if grown {
            self.recalc_pixels(None);
        } else if z_changed || range.is_scale_set {
            self.recalc_pixels(Some(c));
        }
        Ok(())
    }

    /// Re-lay all curves out on a `new` grid. Returns whether a pixel scale changed.
    fn relayout(&mut self, new: (usize, usize), cut: &mut dyn CutView) -> Result<bool> {
        let old = (self.axis.nx, self.axis.ny);
        if new == old {
            return Ok(false);
        }
        for curve in self.curves.iter_mut() {
            curve.relayout(old, new)?;
        }
        self.axis.nx = new.0;
        self.axis.ny = new.1;

        if new.0 != old.0 {
            self.dirty.x_axis = true;
            let redraw = cut.num_points_changed(Axis::X, new.0);
            self.note_cut(redraw);
        }
        if new.1 != old.1 {
            self.dirty.y_axis = true;
            let redraw = cut.num_points_changed(Axis::Y, new.1);
            self.note_cut(redraw);
        }

        let full = self.full_scale();
        let mut changed = false;
        for curve in self.curves.iter_mut().filter(|c| c.is_fs) {
            curve.s2d[X] = full[X];
            curve.s2d[Y] = full[Y];
            changed = true;
        }
        Ok(changed)
    }

    /// Fold new values into the z range of curve `c`. Returns whether stored
    /// points of the curve changed their scaled value.
    fn widen(&mut self, c: usize, values: &[f64], cut: &mut dyn CutView) -> bool {
        let curve = &mut self.curves[c];
        let changed = match curve.range.widen(values) {
            RangeChange::Unchanged => return false,
            RangeChange::Raw => false,
            RangeChange::Established => {
                let range = curve.range;
                for p in curve.points.iter_mut().filter(|p| p.exists) {
                    p.v = range.first_normalization(p.v);
                }
                true
            }
            RangeChange::Widened(remap) => {
                remap.apply_to(&mut curve.points);
                if curve.is_fs {
                    curve.s2d[Z] = 1.0;
                    curve.shift[Z] = 0.0;
                } else {
                    remap.compensate(&mut curve.s2d[Z], &mut curve.shift[Z]);
                }
                true
            }
        };

        let (min, max) = (curve.range.min, curve.range.max);
        self.dirty.z_axis = true;
        let redraw = cut.data_rescaled(c, min, max);
        self.note_cut(redraw);
        changed
    }

    /// Execute a control command.
    pub fn command(&mut self, command: &Command2d, cut: &mut dyn CutView) -> Result<()> {
        match command {
            Command2d::ClearCurve { curves } => self.clear_curve(curves, cut),
            Command2d::ChangeScale {
                curve,
                mask,
                values,
            } => self.change_scale(*curve, *mask, values),
            Command2d::VertRescale { curve } => self.vert_rescale(*curve, cut),
            Command2d::ChangeLabel { labels } => {
                self.change_label(labels);
                Ok(())
            }
            Command2d::ChangePoints { nx, ny } => self.rescale(*nx, *ny, cut),
            Command2d::SetMarker { x, y, color, curve } => self.set_marker(*x, *y, *color, *curve),
            Command2d::ClearMarkers { curves } => self.clear_markers(curves),
        }
    }

    /// Drop all points and the z range of the listed curves.
    pub fn clear_curve(&mut self, curves: &[i64], cut: &mut dyn CutView) -> Result<()> {
        for &curve in curves {
            let c = self.curve_index(curve)?;
            self.curves[c].clear();
            let redraw = cut.clear_curve(c);
            self.note_cut(redraw);
        }
        self.dirty.canvas = true;
        Ok(())
    }

    pub fn change_scale(&mut self, curve: i64, mask: u32, values: &[f64; 6]) -> Result<()> {
        let c = self.curve_index(curve)?;
        let fields = [
            (SCALE_X_START, Axis::X, true),
            (SCALE_X_DELTA, Axis::X, false),
            (SCALE_Y_START, Axis::Y, true),
            (SCALE_Y_DELTA, Axis::Y, false),
            (SCALE_Z_START, Axis::Z, true),
            (SCALE_Z_DELTA, Axis::Z, false),
        ];
        let target = &mut self.curves[c];
        for ((bit, axis, is_start), &value) in fields.into_iter().zip(values) {
            if mask & bit == 0 {
                continue;
            }
            if is_start {
                target.rwc_start[axis as usize] = value;
            } else {
                target.rwc_delta[axis as usize] = value;
            }
            self.dirty.mark_axis(axis);
        }
        Ok(())
    }

    pub fn change_label(&mut self, labels: &[Option<String>; 3]) {
        let axes = [Axis::X, Axis::Y, Axis::Z];
        for (axis, label) in axes.into_iter().zip(labels) {
            if let Some(label) = label {
                self.axis.labels[axis as usize] = label.clone();
                self.dirty.mark_axis(axis);
            }
        }
    }

    /// Change the grid size. A negative size shrinks that axis to the points
    /// and markers in use; the result never cuts off either.
    pub fn rescale(&mut self, nx: i64, ny: i64, cut: &mut dyn CutView) -> Result<()> {
        let cur_nx = self.axis.nx;
        let (used_x, used_y) = self
            .curves
            .iter()
            .flat_map(|c| {
                std::iter::once(c.used_extent(cur_nx))
                    .chain(c.markers.iter().map(|m| (m.x + 1, m.y + 1)))
            })
            .fold((0, 0), |(ux, uy), (x, y)| (ux.max(x), uy.max(y)));

        let fit = |requested: i64, used: usize| {
            usize::try_from(requested)
                .map_or(used, |n| n.max(used))
                .max(MIN_POINTS)
        };
        let new = (fit(nx, used_x), fit(ny, used_y));

        let old = (cur_nx, self.axis.ny);
        self.relayout(new, cut)?;
        if new != old {
            self.dirty.canvas = true;
            self.recalc_pixels(None);
        }
        Ok(())
    }

    /// Stretch the points of `curve` so they fill the whole z range.
    pub fn vert_rescale(&mut self, curve: i64, cut: &mut dyn CutView) -> Result<()> {
        let c = self.curve_index(curve)?;
        let target = &mut self.curves[c];
        if !target.range.is_scale_set {
            return Ok(());
        }
        let (lo, hi) = target
            .points
            .iter()
            .filter(|p| p.exists)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.v), hi.max(p.v))
            });
        if !(hi > lo) {
            return Ok(());
        }

        let range = &mut target.range;
        let (new_min, new_max) = (range.real(lo), range.real(hi));
        let remap = Remap::between(range.min, range.max, new_min, new_max);
        range.min = new_min;
        range.max = new_max;

        remap.apply_to(&mut target.points);
        target.s2d[Z] = 1.0;
        target.shift[Z] = 0.0;

        self.dirty.z_axis = true;
        self.dirty.canvas = true;
        let redraw = cut.data_rescaled(c, new_min, new_max);
        self.note_cut(redraw);
        self.recalc_pixels(Some(c));
        Ok(())
    }

    pub fn set_marker(&mut self, x: i64, y: i64, color: i64, curve: i64) -> Result<()> {
        let c = self.curve_index(curve)?;
        let x = usize::try_from(x).map_err(|_| IpcError::NegativeField {
            what: "marker x",
            value: x,
        })?;
        let y = usize::try_from(y).map_err(|_| IpcError::NegativeField {
            what: "marker y",
            value: y,
        })?;
        self.curves[c].markers.push(Marker2d { x, y, color });
        self.dirty.canvas = true;
        Ok(())
    }

    pub fn clear_markers(&mut self, curves: &[i64]) -> Result<()> {
        for &curve in curves {
            let c = self.curve_index(curve)?;
            self.curves[c].markers.clear();
        }
        self.dirty.canvas = true;
        Ok(())
    }

    /// Toggle full-scale mode of a curve. Switching it on resets the pixel scale.
    pub fn set_full_scale(&mut self, curve: usize, on: bool) -> Result<()> {
        let c = self.curve_index(curve as i64)?;
        self.curves[c].is_fs = on;
        if on {
            self.reset_pixel_scale(c);
            self.recalc_pixels(Some(c));
            self.dirty.canvas = true;
        }
        Ok(())
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(IpcError::Config("canvas size must not be zero".into()));
        }
        self.width = width;
        self.height = height;
        for c in 0..self.curves.len() {
            if self.curves[c].is_fs {
                self.reset_pixel_scale(c);
            }
        }
        self.recalc_pixels(None);
        self.dirty.canvas = true;
        Ok(())
    }
}
