use super::grid;
use super::scaled::{d2shrt, PixelPoint, RangeChange, Remap, ScaledPoint, ValueRange};
use super::{Axis, Dirty, MIN_POINTS};
use crate::error::{IpcError, Result};
use crate::Protocol::record::{
    SCALE_X_DELTA, SCALE_X_START, SCALE_Y_DELTA, SCALE_Y_START,
};
use crate::Protocol::{Command1d, DisplayMode, Record1d};

const X: usize = Axis::X as usize;
const Y: usize = Axis::Y as usize;

#[derive(Debug, Clone)]
pub struct Config1d {
    pub curves: usize,
    pub points: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub full_scale: bool,
    pub mode: DisplayMode,
}

impl Default for Config1d {
    fn default() -> Self {
        Self {
            curves: 1,
            points: 32,
            canvas_width: 400,
            canvas_height: 300,
            full_scale: true,
            mode: DisplayMode::Normal,
        }
    }
}

impl Config1d {
    fn validate(&self) -> Result<()> {
        if self.curves == 0 {
            return Err(IpcError::Config("a 1D display needs at least one curve".into()));
        }
        if self.points < MIN_POINTS {
            return Err(IpcError::Config(format!(
                "a 1D display needs at least {MIN_POINTS} points, got {}",
                self.points
            )));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(IpcError::Config("canvas size must not be zero".into()));
        }
        Ok(())
    }
}

/// One curve of the 1D display.
#[derive(Debug, Clone)]
pub struct Curve1d {
    points: Vec<ScaledPoint>,
    pixels: Vec<PixelPoint>,
    count: usize,
    s2d: [f64; 2],
    shift: [f64; 2],
    is_fs: bool,
    /// Samples pushed out on the left in sliding mode since the last clear.
    pushed: usize,
}

impl Curve1d {
    fn new(nx: usize, full_scale: bool) -> Self {
        Self {
            points: vec![ScaledPoint::default(); nx],
            pixels: vec![PixelPoint::default(); nx],
            count: 0,
            s2d: [1.0, 1.0],
            shift: [0.0, 0.0],
            is_fs: full_scale,
            pushed: 0,
        }
    }

    pub fn points(&self) -> &[ScaledPoint] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<ScaledPoint> {
        self.points.get(index).copied()
    }

    /// Device coordinates, valid for points that exist once a scale is set.
    pub fn pixels(&self) -> &[PixelPoint] {
        &self.pixels
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn s2d(&self) -> [f64; 2] {
        self.s2d
    }

    pub fn shift(&self) -> [f64; 2] {
        self.shift
    }

    pub fn is_full_scale(&self) -> bool {
        self.is_fs
    }

    fn clear(&mut self) {
        self.points.fill(ScaledPoint::default());
        self.count = 0;
        self.pushed = 0;
    }

    fn resize(&mut self, nx: usize) -> Result<()> {
        grid::resize(&mut self.points, nx, ScaledPoint::default())?;
        grid::resize(&mut self.pixels, nx, PixelPoint::default())
    }

    /// One past the last point in use.
    fn used_extent(&self) -> usize {
        self.points
            .iter()
            .rposition(|p| p.exists)
            .map_or(0, |i| i + 1)
    }

    fn store(&mut self, index: usize, v: f64) {
        let p = &mut self.points[index];
        p.v = v;
        if !p.exists {
            p.exists = true;
            self.count += 1;
        }
    }

    fn recalc_pixels(&mut self, height: u32) {
        let top = height.saturating_sub(1).min(i16::MAX as u32) as i16;
        let (s2d, shift) = (self.s2d, self.shift);
        for (k, (p, px)) in self.points.iter().zip(self.pixels.iter_mut()).enumerate() {
            if p.exists {
                px.x = d2shrt(s2d[X] * (k as f64 + shift[X]));
                px.y = top.saturating_sub(d2shrt(s2d[Y] * (p.v + shift[Y])));
            }
        }
    }
}

/// Axis state shared by all curves of the 1D display.
#[derive(Debug, Clone)]
pub struct Axis1d {
    pub range: ValueRange,
    pub nx: usize,
    pub mode: DisplayMode,
    /// Real-world start and increment per axis, as set by CHANGE_SCALE.
    pub start: [f64; 2],
    pub delta: [f64; 2],
    pub labels: [String; 2],
    /// Sliding mode: how far the leading curve has pushed the shared window.
    /// Markers sit in window coordinates and move only when this grows.
    pub window_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub position: usize,
    pub color: i64,
}

/// Data model of the 1D display.
#[derive(Debug)]
pub struct Store1d {
    axis: Axis1d,
    curves: Vec<Curve1d>,
    markers: Vec<Marker>,
    width: u32,
    height: u32,
    dirty: Dirty,
}

impl Store1d {
    pub fn new(config: Config1d) -> Result<Self> {
        config.validate()?;

        let mut store = Self {
            axis: Axis1d {
                range: ValueRange::default(),
                nx: config.points,
                mode: config.mode,
                start: [0.0, 0.0],
                delta: [1.0, 1.0],
                labels: Default::default(),
                window_offset: 0,
            },
            curves: (0..config.curves)
                .map(|_| Curve1d::new(config.points, config.full_scale))
                .collect(),
            markers: Vec::new(),
            width: config.canvas_width,
            height: config.canvas_height,
            dirty: Dirty::default(),
        };
        for c in 0..store.curves.len() {
            store.reset_pixel_scale(c);
        }
        Ok(store)
    }

    pub fn axis(&self) -> &Axis1d {
        &self.axis
    }

    pub fn range(&self) -> &ValueRange {
        &self.axis.range
    }

    pub fn nx(&self) -> usize {
        self.axis.nx
    }

    pub fn mode(&self) -> DisplayMode {
        self.axis.mode
    }

    pub fn curves(&self) -> &[Curve1d] {
        &self.curves
    }

    pub fn curve(&self, index: usize) -> Option<&Curve1d> {
        self.curves.get(index)
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
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

    fn full_scale_x(&self) -> f64 {
        (self.width.saturating_sub(1)) as f64 / (self.axis.nx - 1) as f64
    }

    fn full_scale_y(&self) -> f64 {
        self.height.saturating_sub(1) as f64
    }

    fn reset_pixel_scale(&mut self, c: usize) {
        let s2d = [self.full_scale_x(), self.full_scale_y()];
        let curve = &mut self.curves[c];
        curve.s2d = s2d;
        curve.shift = [0.0, 0.0];
    }

    fn recalc_pixels(&mut self, only: Option<usize>) {
        if !self.axis.range.is_scale_set {
            return;
        }
        let height = self.height;
        match only {
            Some(c) => self.curves[c].recalc_pixels(height),
            None => self.curves.iter_mut().for_each(|c| c.recalc_pixels(height)),
        }
    }

    /// Apply one curve-data record.
    pub fn apply(&mut self, record: &Record1d) -> Result<()> {
        let c = self.curve_index(record.curve)?;
        let x = usize::try_from(record.x_index).map_err(|_| IpcError::NegativeField {
            what: "x index",
            value: record.x_index,
        })?;
        let values = record.payload.values()?;
        if values.is_empty() {
            return Ok(());
        }

        match self.axis.mode {
            DisplayMode::Normal => self.apply_normal(c, x, &values),
            DisplayMode::Sliding => self.apply_sliding(c, &values),
        }
    }

    fn apply_normal(&mut self, c: usize, x: usize, values: &[f64]) -> Result<()> {
        let end = x
            .checked_add(values.len())
            .ok_or(IpcError::Allocation(usize::MAX))?;

        let x_changed = end > self.axis.nx && self.grow(end)?;
        let y_changed = self.widen(values);

        let range = self.axis.range;
        let curve = &mut self.curves[c];
        for (k, &raw) in values.iter().enumerate() {
            curve.store(x + k, range.scaled(raw));
        }
        self.dirty.canvas = true;

        self.recalc_pixels((!x_changed && !y_changed).then_some(c));
        Ok(())
    }

    // Each curve fills its window from the left; once full, the oldest points
    // are pushed out on the left. The window width never changes.
    fn apply_sliding(&mut self, c: usize, values: &[f64]) -> Result<()> {
        let nx = self.axis.nx;
        let values = &values[values.len().saturating_sub(nx)..];
        self.widen(values);

        let keep = nx - values.len();
        let range = self.axis.range;
        let curve = &mut self.curves[c];
        let filled = curve.count;

        let start = if filled > keep {
            let overflow = filled - keep;
            curve.points.copy_within(overflow..filled, 0);
            curve.points[keep..filled].fill(ScaledPoint::default());
            curve.count = keep;
            curve.pushed += overflow;
            keep
        } else {
            filled
        };

        for (k, &raw) in values.iter().enumerate() {
            curve.store(start + k, range.scaled(raw));
        }
        let pushed = curve.pushed;
        self.advance_window(pushed);
        self.dirty.canvas = true;

        self.recalc_pixels(None);
        Ok(())
    }

    // Markers follow the leading curve only; curves catching up to it leave them alone.
    fn advance_window(&mut self, pushed: usize) {
        let Some(step) = pushed.checked_sub(self.axis.window_offset).filter(|&s| s > 0) else {
            return;
        };
        self.axis.window_offset = pushed;
        self.markers.retain_mut(|m| match m.position.checked_sub(step) {
            Some(position) => {
                m.position = position;
                true
            }
            None => false,
        });
    }

    /// Grow every curve to `nx` points. Returns whether a pixel scale changed.
    fn grow(&mut self, nx: usize) -> Result<bool> {
        for curve in self.curves.iter_mut() {
            curve.resize(nx)?;
        }
        self.axis.nx = nx;
        self.dirty.x_axis = true;

        let s2d_x = self.full_scale_x();
        let mut changed = false;
        for curve in self.curves.iter_mut().filter(|c| c.is_fs) {
            curve.s2d[X] = s2d_x;
            changed = true;
        }
        Ok(changed)
    }

    /// Fold new values into the range and bring stored points in line with it.
    /// Returns whether the y pixel scale of any curve changed.
    fn widen(&mut self, values: &[f64]) -> bool {
        match self.axis.range.widen(values) {
            RangeChange::Unchanged => false,
            RangeChange::Raw => {
                self.dirty.y_axis = true;
                false
            }
            RangeChange::Established => {
                let range = self.axis.range;
                for curve in self.curves.iter_mut() {
                    for p in curve.points.iter_mut().filter(|p| p.exists) {
                        p.v = range.first_normalization(p.v);
                    }
                }
                self.dirty.y_axis = true;
                true
            }
            RangeChange::Widened(remap) => {
                self.remap_all(remap);
                self.dirty.y_axis = true;
                true
            }
        }
    }

    fn remap_all(&mut self, remap: Remap) {
        let full_y = self.full_scale_y();
        for curve in self.curves.iter_mut() {
            remap.apply_to(&mut curve.points);
            if curve.is_fs {
                curve.s2d[Y] = full_y;
                curve.shift[Y] = 0.0;
            } else {
                remap.compensate(&mut curve.s2d[Y], &mut curve.shift[Y]);
            }
        }
    }

    /// Execute a control command.
    pub fn command(&mut self, command: &Command1d) -> Result<()> {
        match command {
            Command1d::ClearCurve { curves } => self.clear_curve(curves),
            Command1d::ChangeScale { mask, values } => {
                self.change_scale(*mask, values);
                Ok(())
            }
            Command1d::VertRescale => {
                self.vert_rescale();
                Ok(())
            }
            Command1d::ChangeLabel { labels } => {
                self.change_label(labels);
                Ok(())
            }
            Command1d::ChangePoints { nx } => self.rescale(*nx),
            Command1d::SetMarker { position, color } => self.set_marker(*position, *color),
            Command1d::ClearMarkers => {
                self.clear_markers();
                Ok(())
            }
            Command1d::ChangeMode { mode, width } => self.change_mode(*mode, *width),
        }
    }

    /// Drop all points of the listed curves. The value range is kept.
    pub fn clear_curve(&mut self, curves: &[i64]) -> Result<()> {
        for &curve in curves {
            let c = self.curve_index(curve)?;
            self.curves[c].clear();
        }
        self.axis.window_offset = self.curves.iter().map(|c| c.pushed).max().unwrap_or(0);
        self.dirty.canvas = true;
        Ok(())
    }

    /// Set the start and increment of the axes whose mask bits are on.
    pub fn change_scale(&mut self, mask: u32, values: &[f64; 4]) {
        let fields = [
            (SCALE_X_START, Axis::X, true),
            (SCALE_X_DELTA, Axis::X, false),
            (SCALE_Y_START, Axis::Y, true),
            (SCALE_Y_DELTA, Axis::Y, false),
        ];
        for ((bit, axis, is_start), &value) in fields.into_iter().zip(values) {
            if mask & bit == 0 {
                continue;
            }
            if is_start {
                self.axis.start[axis as usize] = value;
            } else {
                self.axis.delta[axis as usize] = value;
            }
            self.dirty.mark_axis(axis);
        }
    }

    pub fn change_label(&mut self, labels: &[Option<String>; 2]) {
        for (axis, label) in labels.iter().enumerate() {
            if let Some(label) = label {
                self.axis.labels[axis] = label.clone();
                self.dirty.mark_axis(if axis == X { Axis::X } else { Axis::Y });
            }
        }
    }

    /// Change the number of points. A negative `nx` shrinks to the points
    /// and markers in use; the result never cuts off either.
    pub fn rescale(&mut self, nx: i64) -> Result<()> {
        if self.axis.mode == DisplayMode::Sliding {
            tracing::warn!(nx, "ignoring change of points in sliding window mode");
            return Ok(());
        }

        let used = self
            .curves
            .iter()
            .map(Curve1d::used_extent)
            .chain(self.markers.iter().map(|m| m.position + 1))
            .max()
            .unwrap_or(0);
        let wanted = usize::try_from(nx).map_or(used, |nx| nx.max(used));
        let new_nx = wanted.max(MIN_POINTS);
        if new_nx == self.axis.nx {
            return Ok(());
        }

        for curve in self.curves.iter_mut() {
            curve.resize(new_nx)?;
        }
        self.axis.nx = new_nx;
        let s2d_x = self.full_scale_x();
        for curve in self.curves.iter_mut().filter(|c| c.is_fs) {
            curve.s2d[X] = s2d_x;
        }
        self.dirty.x_axis = true;
        self.dirty.canvas = true;
        self.recalc_pixels(None);
        Ok(())
    }

    /// Stretch the stored points so they fill the whole vertical range.
    pub fn vert_rescale(&mut self) {
        if !self.axis.range.is_scale_set {
            return;
        }
        let (lo, hi) = self
            .curves
            .iter()
            .flat_map(|c| c.points.iter().filter(|p| p.exists))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.v), hi.max(p.v))
            });
        if !(hi > lo) {
            return;
        }

        let range = &mut self.axis.range;
        let (new_min, new_max) = (range.real(lo), range.real(hi));
        let remap = Remap::between(range.min, range.max, new_min, new_max);
        range.min = new_min;
        range.max = new_max;

        let full_y = self.full_scale_y();
        for curve in self.curves.iter_mut() {
            remap.apply_to(&mut curve.points);
            curve.s2d[Y] = full_y;
            curve.shift[Y] = 0.0;
        }
        self.dirty.y_axis = true;
        self.dirty.canvas = true;
        self.recalc_pixels(None);
    }

    pub fn set_marker(&mut self, position: i64, color: i64) -> Result<()> {
        let position = usize::try_from(position).map_err(|_| IpcError::NegativeField {
            what: "marker position",
            value: position,
        })?;
        self.markers.push(Marker { position, color });
        self.dirty.canvas = true;
        Ok(())
    }

    pub fn clear_markers(&mut self) {
        self.markers.clear();
        self.dirty.canvas = true;
    }

    /// Switch between normal and sliding window display. Everything stored is
    /// discarded. A non-positive `width` keeps the current number of points.
    pub fn change_mode(&mut self, mode: DisplayMode, width: i64) -> Result<()> {
        let nx = usize::try_from(width)
            .ok()
            .filter(|&w| w > 0)
            .unwrap_or(self.axis.nx)
            .max(MIN_POINTS);

        for curve in self.curves.iter_mut() {
            curve.clear();
            curve.resize(nx)?;
        }
        self.markers.clear();
        self.axis.range.reset();
        self.axis.window_offset = 0;
        self.axis.nx = nx;
        self.axis.mode = mode;
        for c in 0..self.curves.len() {
            self.reset_pixel_scale(c);
        }

        self.dirty.canvas = true;
        self.dirty.x_axis = true;
        self.dirty.y_axis = true;
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
