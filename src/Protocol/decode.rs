use super::record::*;
use super::wire::WireReader;
use crate::error::{IpcError, Result};
use crate::Queue::Buffer::DataKind;

/// Turn the payload of a data entry into structured records or a command.
///
/// The first `int` is the record count; a negative count is the negated
/// opcode of a control command.
pub fn decode(kind: DataKind, bytes: &[u8]) -> Result<Batch> {
    let mut r = WireReader::new(bytes);
    let nsets = r.read_i32()?;

    match kind {
        DataKind::Data1d if nsets < 0 => {
            let opcode = Opcode::from_raw(nsets.wrapping_neg(), "1D")?;
            Ok(Batch::Command1d(decode_command_1d(&mut r, opcode)?))
        }
        DataKind::Data1d => {
            let records = (0..nsets)
                .map(|_| decode_record_1d(&mut r))
                .collect::<Result<Vec<_>>>()?;
            Ok(Batch::Data1d(records))
        }
        DataKind::Data2d if nsets < 0 => {
            let opcode = Opcode::from_raw(nsets.wrapping_neg(), "2D")?;
            Ok(Batch::Command2d(decode_command_2d(&mut r, opcode)?))
        }
        DataKind::Data2d => {
            let records = (0..nsets)
                .map(|_| decode_record_2d(&mut r))
                .collect::<Result<Vec<_>>>()?;
            Ok(Batch::Data2d(records))
        }
        DataKind::Request => Err(IpcError::UnknownKind(kind.raw())),
    }
}

fn decode_record_1d(r: &mut WireReader<'_>) -> Result<Record1d> {
    let x_index = r.read_i64()?;
    let curve = r.read_i64()?;
    let tag = TypeTag::from_raw(r.read_i32()?)?;
    if matches!(tag, TypeTag::IntMatrix | TypeTag::FloatMatrix) {
        return Err(IpcError::MatrixIn1d);
    }
    Ok(Record1d {
        x_index,
        curve,
        payload: decode_payload(r, tag)?,
    })
}

fn decode_record_2d(r: &mut WireReader<'_>) -> Result<Record2d> {
    let x_index = r.read_i64()?;
    let y_index = r.read_i64()?;
    let curve = r.read_i64()?;
    let tag = TypeTag::from_raw(r.read_i32()?)?;
    Ok(Record2d {
        x_index,
        y_index,
        curve,
        payload: decode_payload(r, tag)?,
    })
}

fn decode_payload(r: &mut WireReader<'_>, tag: TypeTag) -> Result<Payload> {
    Ok(match tag {
        TypeTag::IntScalar => Payload::IntScalar(r.read_i64()?),
        TypeTag::FloatScalar => Payload::FloatScalar(r.read_f64()?),
        TypeTag::IntArray => Payload::IntArray(r.read_i64_run()?),
        TypeTag::FloatArray => Payload::FloatArray(r.read_f64_run()?),
        TypeTag::IntMatrix => {
            let rows = r.read_count("row count")?;
            let rows = (0..rows).map(|_| r.read_i64_run()).collect::<Result<_>>()?;
            Payload::IntMatrix(rows)
        }
        TypeTag::FloatMatrix => {
            let rows = r.read_count("row count")?;
            let rows = (0..rows).map(|_| r.read_f64_run()).collect::<Result<_>>()?;
            Payload::FloatMatrix(rows)
        }
    })
}

fn read_curve_list(r: &mut WireReader<'_>) -> Result<Vec<i64>> {
    let count = r.read_count("curve count")?;
    (0..count).map(|_| r.read_i64()).collect()
}

fn read_labels<const N: usize>(r: &mut WireReader<'_>) -> Result<[Option<String>; N]> {
    let mask = r.read_i32()? as u32;
    let mut labels: [Option<String>; N] = std::array::from_fn(|_| None);
    for (axis, label) in labels.iter_mut().enumerate() {
        if mask & (1 << axis) != 0 {
            *label = Some(r.read_string()?);
        }
    }
    Ok(labels)
}

fn decode_command_1d(r: &mut WireReader<'_>, opcode: Opcode) -> Result<Command1d> {
    Ok(match opcode {
        Opcode::ClearCurve => Command1d::ClearCurve {
            curves: read_curve_list(r)?,
        },
        Opcode::ChangeScale => {
            let mask = r.read_i32()? as u32;
            let mut values = [0.0; 4];
            for v in values.iter_mut() {
                *v = r.read_f64()?;
            }
            Command1d::ChangeScale { mask, values }
        }
        Opcode::VertRescale => Command1d::VertRescale,
        Opcode::ChangeLabel => Command1d::ChangeLabel {
            labels: read_labels(r)?,
        },
        Opcode::ChangePoints => Command1d::ChangePoints { nx: r.read_i64()? },
        Opcode::SetMarker => Command1d::SetMarker {
            position: r.read_i64()?,
            color: r.read_i64()?,
        },
        Opcode::ClearMarkers => Command1d::ClearMarkers,
        Opcode::ChangeMode => Command1d::ChangeMode {
            mode: DisplayMode::from_raw(r.read_i64()?)?,
            width: r.read_i64()?,
        },
    })
}

fn decode_command_2d(r: &mut WireReader<'_>, opcode: Opcode) -> Result<Command2d> {
    Ok(match opcode {
        Opcode::ClearCurve => Command2d::ClearCurve {
            curves: read_curve_list(r)?,
        },
        Opcode::ChangeScale => {
            let curve = r.read_i64()?;
            let mask = r.read_i32()? as u32;
            let mut values = [0.0; 6];
            for v in values.iter_mut() {
                *v = r.read_f64()?;
            }
            Command2d::ChangeScale { curve, mask, values }
        }
        Opcode::VertRescale => Command2d::VertRescale {
            curve: r.read_i64()?,
        },
        Opcode::ChangeLabel => Command2d::ChangeLabel {
            labels: read_labels(r)?,
        },
        Opcode::ChangePoints => Command2d::ChangePoints {
            nx: r.read_i64()?,
            ny: r.read_i64()?,
        },
        Opcode::SetMarker => Command2d::SetMarker {
            x: r.read_i64()?,
            y: r.read_i64()?,
            color: r.read_i64()?,
            curve: r.read_i64()?,
        },
        Opcode::ClearMarkers => Command2d::ClearMarkers {
            curves: read_curve_list(r)?,
        },
        Opcode::ChangeMode => {
            return Err(IpcError::UnknownOpcode {
                dim: "2D",
                opcode: opcode.raw(),
            })
        }
    })
}
