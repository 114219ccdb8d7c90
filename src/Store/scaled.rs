/// A sample normalised against the range of its axis.
///
/// `v` holds the raw value until a usable range exists, afterwards a value
/// in [0, 1]. Slots nobody has written yet have `exists == false`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ScaledPoint {
    pub v: f64,
    pub exists: bool,
}

/// Device coordinates of a 1D point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PixelPoint {
    pub x: i16,
    pub y: i16,
}

/// Device coordinates of a 2D cell plus its intensity for the color map.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PixelCell {
    pub x: i16,
    pub y: i16,
    pub z: f64,
}

/// Round to the nearest device coordinate, saturating at the i16 limits.
pub fn d2shrt(value: f64) -> i16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Affine map `v' = factor * v + offset` taking points normalised against one
/// range to the same points normalised against another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Remap {
    pub factor: f64,
    pub offset: f64,
}

impl Remap {
    pub fn between(old_min: f64, old_max: f64, new_min: f64, new_max: f64) -> Self {
        let new_delta = new_max - new_min;
        Self {
            factor: (old_max - old_min) / new_delta,
            offset: (old_min - new_min) / new_delta,
        }
    }

    #[inline]
    pub fn apply(&self, v: f64) -> f64 {
        self.factor * v + self.offset
    }

    pub fn inverse(&self) -> Self {
        Self {
            factor: 1.0 / self.factor,
            offset: -self.offset / self.factor,
        }
    }

    /// Remap every existing point in place.
    pub fn apply_to(&self, points: &mut [ScaledPoint]) {
        for p in points.iter_mut().filter(|p| p.exists) {
            p.v = self.apply(p.v);
        }
    }

    /// Adjust a pixel scale and shift so `s2d * (v + shift)` yields the same
    /// pixel for a remapped point as before.
    pub fn compensate(&self, s2d: &mut f64, shift: &mut f64) {
        *s2d /= self.factor;
        *shift = self.factor * *shift - self.offset;
    }
}

/// Real-world value range of an axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    /// Set once `max > min`; from then on points are stored normalised.
    pub is_scale_set: bool,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            is_scale_set: false,
        }
    }
}

/// How [`ValueRange::widen`] changed the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeChange {
    Unchanged,
    /// Range moved but is still a single value, points stay raw.
    Raw,
    /// First usable range; raw points must be normalised with
    /// [`ValueRange::first_normalization`].
    Established,
    /// Range grew; normalised points must be remapped.
    Widened(Remap),
}

impl ValueRange {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn delta(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Include `values` in the range.
    pub fn widen(&mut self, values: &[f64]) -> RangeChange {
        let (new_min, new_max) = values
            .iter()
            .fold((self.min, self.max), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        if new_min == self.min && new_max == self.max {
            return RangeChange::Unchanged;
        }

        let change = if self.is_scale_set {
            RangeChange::Widened(Remap::between(self.min, self.max, new_min, new_max))
        } else if new_max != new_min {
            self.is_scale_set = true;
            RangeChange::Established
        } else {
            RangeChange::Raw
        };

        self.min = new_min;
        self.max = new_max;
        change
    }

    /// Value to store for a new raw sample.
    #[inline]
    pub fn scaled(&self, raw: f64) -> f64 {
        if self.is_scale_set {
            (raw - self.min) / self.delta()
        } else {
            raw
        }
    }

    /// Normalise a point that was stored raw before the range became usable.
    #[inline]
    pub fn first_normalization(&self, raw: f64) -> f64 {
        let delta = self.delta();
        raw / delta - self.min / delta
    }

    /// Real-world value of a stored point.
    pub fn real(&self, v: f64) -> f64 {
        if self.is_scale_set {
            self.min + v * self.delta()
        } else {
            v
        }
    }
}
