use crate::error::{IpcError, Result};

/// Integers beyond this magnitude do not survive the trip through a double.
const EXACT_INT_LIMIT: u64 = 1 << 53;

/// Kind of value carried by one curve-data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TypeTag {
    IntScalar = 1,
    FloatScalar = 2,
    IntArray = 3,
    FloatArray = 4,
    IntMatrix = 5,
    FloatMatrix = 6,
}

impl TypeTag {
    pub fn from_raw(raw: i32) -> Result<Self> {
        Ok(match raw {
            1 => TypeTag::IntScalar,
            2 => TypeTag::FloatScalar,
            3 => TypeTag::IntArray,
            4 => TypeTag::FloatArray,
            5 => TypeTag::IntMatrix,
            6 => TypeTag::FloatMatrix,
            _ => return Err(IpcError::UnknownType(raw)),
        })
    }

    pub fn raw(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    IntScalar(i64),
    FloatScalar(f64),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    /// Rows of a 2D block, each row starting at the record's x index.
    IntMatrix(Vec<Vec<i64>>),
    FloatMatrix(Vec<Vec<f64>>),
}

impl Payload {
    pub fn tag(&self) -> TypeTag {
        match self {
            Payload::IntScalar(_) => TypeTag::IntScalar,
            Payload::FloatScalar(_) => TypeTag::FloatScalar,
            Payload::IntArray(_) => TypeTag::IntArray,
            Payload::FloatArray(_) => TypeTag::FloatArray,
            Payload::IntMatrix(_) => TypeTag::IntMatrix,
            Payload::FloatMatrix(_) => TypeTag::FloatMatrix,
        }
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Payload::IntMatrix(_) | Payload::FloatMatrix(_))
    }

    /// The values as rows of doubles. Scalars and arrays give a single row.
    ///
    /// Integers too large to be represented exactly are rounded to the nearest
    /// double; this is reported once per payload.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        let mut lossy = false;
        let mut promote = |v: i64| {
            lossy |= v.unsigned_abs() > EXACT_INT_LIMIT;
            v as f64
        };

        let rows = match self {
            Payload::IntScalar(v) => vec![vec![promote(*v)]],
            Payload::FloatScalar(v) => vec![vec![*v]],
            Payload::IntArray(values) => vec![values.iter().map(|&v| promote(v)).collect()],
            Payload::FloatArray(values) => vec![values.clone()],
            Payload::IntMatrix(rows) => rows
                .iter()
                .map(|row| row.iter().map(|&v| promote(v)).collect())
                .collect(),
            Payload::FloatMatrix(rows) => rows.clone(),
        };

        if lossy {
            tracing::warn!("integer sample exceeds 2^53, stored rounded to the nearest double");
        }
        rows
    }

    /// The values of a scalar or array payload.
    pub fn values(&self) -> Result<Vec<f64>> {
        if self.is_matrix() {
            return Err(IpcError::MatrixIn1d);
        }
        Ok(self.rows().into_iter().next().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record1d {
    pub x_index: i64,
    pub curve: i64,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record2d {
    pub x_index: i64,
    pub y_index: i64,
    pub curve: i64,
    pub payload: Payload,
}

/// Control command number, sent as the negated record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Opcode {
    ClearCurve = 1,
    ChangeScale = 2,
    VertRescale = 3,
    ChangeLabel = 4,
    ChangePoints = 5,
    SetMarker = 6,
    ClearMarkers = 7,
    ChangeMode = 8,
}

impl Opcode {
    pub fn from_raw(raw: i32, dim: &'static str) -> Result<Self> {
        Ok(match raw {
            1 => Opcode::ClearCurve,
            2 => Opcode::ChangeScale,
            3 => Opcode::VertRescale,
            4 => Opcode::ChangeLabel,
            5 => Opcode::ChangePoints,
            6 => Opcode::SetMarker,
            7 => Opcode::ClearMarkers,
            8 => Opcode::ChangeMode,
            _ => return Err(IpcError::UnknownOpcode { dim, opcode: raw }),
        })
    }

    pub fn raw(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Normal,
    Sliding,
}

impl DisplayMode {
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            0 => Ok(DisplayMode::Normal),
            1 => Ok(DisplayMode::Sliding),
            _ => Err(IpcError::UnknownOpcode {
                dim: "display mode",
                opcode: raw as i32,
            }),
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            DisplayMode::Normal => 0,
            DisplayMode::Sliding => 1,
        }
    }
}

// Bits of the CHANGE_SCALE mask, one start/delta pair per axis.
pub const SCALE_X_START: u32 = 1;
pub const SCALE_X_DELTA: u32 = 2;
pub const SCALE_Y_START: u32 = 4;
pub const SCALE_Y_DELTA: u32 = 8;
pub const SCALE_Z_START: u32 = 16;
pub const SCALE_Z_DELTA: u32 = 32;

// Bits of the CHANGE_LABEL mask.
pub const LABEL_X: u32 = 1;
pub const LABEL_Y: u32 = 2;
pub const LABEL_Z: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum Command1d {
    ClearCurve { curves: Vec<i64> },
    /// `values` are x start, x delta, y start, y delta.
    ChangeScale { mask: u32, values: [f64; 4] },
    VertRescale,
    ChangeLabel { labels: [Option<String>; 2] },
    /// A negative width shrinks the display to the points in use.
    ChangePoints { nx: i64 },
    SetMarker { position: i64, color: i64 },
    ClearMarkers,
    ChangeMode { mode: DisplayMode, width: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command2d {
    ClearCurve { curves: Vec<i64> },
    /// `values` are start and delta for x, y and z.
    ChangeScale { curve: i64, mask: u32, values: [f64; 6] },
    VertRescale { curve: i64 },
    ChangeLabel { labels: [Option<String>; 3] },
    ChangePoints { nx: i64, ny: i64 },
    SetMarker { x: i64, y: i64, color: i64, curve: i64 },
    ClearMarkers { curves: Vec<i64> },
}

/// Decoded content of one queue entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Data1d(Vec<Record1d>),
    Data2d(Vec<Record2d>),
    Command1d(Command1d),
    Command2d(Command2d),
}
