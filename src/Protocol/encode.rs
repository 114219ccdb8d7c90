use super::record::*;
use super::wire::WireWriter;
use crate::Queue::Buffer::DataKind;

impl Batch {
    /// Queue entry kind this batch travels as.
    pub fn kind(&self) -> DataKind {
        match self {
            Batch::Data1d(_) | Batch::Command1d(_) => DataKind::Data1d,
            Batch::Data2d(_) | Batch::Command2d(_) => DataKind::Data2d,
        }
    }

    /// Producer-side serialisation, the exact inverse of [`super::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::with_capacity(64);
        match self {
            Batch::Data1d(records) => {
                w.put_i32(records.len() as i32);
                for rec in records {
                    w.put_i64(rec.x_index).put_i64(rec.curve);
                    put_payload(&mut w, &rec.payload);
                }
            }
            Batch::Data2d(records) => {
                w.put_i32(records.len() as i32);
                for rec in records {
                    w.put_i64(rec.x_index).put_i64(rec.y_index).put_i64(rec.curve);
                    put_payload(&mut w, &rec.payload);
                }
            }
            Batch::Command1d(cmd) => put_command_1d(&mut w, cmd),
            Batch::Command2d(cmd) => put_command_2d(&mut w, cmd),
        }
        w.into_inner()
    }
}

fn put_payload(w: &mut WireWriter, payload: &Payload) {
    w.put_i32(payload.tag().raw());
    match payload {
        Payload::IntScalar(v) => {
            w.put_i64(*v);
        }
        Payload::FloatScalar(v) => {
            w.put_f64(*v);
        }
        Payload::IntArray(values) => {
            w.put_i64_run(values);
        }
        Payload::FloatArray(values) => {
            w.put_f64_run(values);
        }
        Payload::IntMatrix(rows) => {
            w.put_len(rows.len());
            for row in rows {
                w.put_i64_run(row);
            }
        }
        Payload::FloatMatrix(rows) => {
            w.put_len(rows.len());
            for row in rows {
                w.put_f64_run(row);
            }
        }
    }
}

fn put_opcode(w: &mut WireWriter, opcode: Opcode) {
    w.put_i32(-opcode.raw());
}

fn put_curves(w: &mut WireWriter, curves: &[i64]) {
    w.put_len(curves.len());
    for &c in curves {
        w.put_i64(c);
    }
}

fn put_labels(w: &mut WireWriter, labels: &[Option<String>]) {
    let mask = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| label.is_some())
        .fold(0u32, |mask, (axis, _)| mask | (1 << axis));
    w.put_i32(mask as i32);
    for label in labels.iter().flatten() {
        w.put_string(label);
    }
}

fn put_command_1d(w: &mut WireWriter, cmd: &Command1d) {
    match cmd {
        Command1d::ClearCurve { curves } => {
            put_opcode(w, Opcode::ClearCurve);
            put_curves(w, curves);
        }
        Command1d::ChangeScale { mask, values } => {
            put_opcode(w, Opcode::ChangeScale);
            w.put_i32(*mask as i32);
            for &v in values {
                w.put_f64(v);
            }
        }
        Command1d::VertRescale => put_opcode(w, Opcode::VertRescale),
        Command1d::ChangeLabel { labels } => {
            put_opcode(w, Opcode::ChangeLabel);
            put_labels(w, labels);
        }
        Command1d::ChangePoints { nx } => {
            put_opcode(w, Opcode::ChangePoints);
            w.put_i64(*nx);
        }
        Command1d::SetMarker { position, color } => {
            put_opcode(w, Opcode::SetMarker);
            w.put_i64(*position).put_i64(*color);
        }
        Command1d::ClearMarkers => put_opcode(w, Opcode::ClearMarkers),
        Command1d::ChangeMode { mode, width } => {
            put_opcode(w, Opcode::ChangeMode);
            w.put_i64(mode.raw()).put_i64(*width);
        }
    }
}

fn put_command_2d(w: &mut WireWriter, cmd: &Command2d) {
    match cmd {
        Command2d::ClearCurve { curves } => {
            put_opcode(w, Opcode::ClearCurve);
            put_curves(w, curves);
        }
        Command2d::ChangeScale { curve, mask, values } => {
            put_opcode(w, Opcode::ChangeScale);
            w.put_i64(*curve).put_i32(*mask as i32);
            for &v in values {
                w.put_f64(v);
            }
        }
        Command2d::VertRescale { curve } => {
            put_opcode(w, Opcode::VertRescale);
            w.put_i64(*curve);
        }
        Command2d::ChangeLabel { labels } => {
            put_opcode(w, Opcode::ChangeLabel);
            put_labels(w, labels);
        }
        Command2d::ChangePoints { nx, ny } => {
            put_opcode(w, Opcode::ChangePoints);
            w.put_i64(*nx).put_i64(*ny);
        }
        Command2d::SetMarker { x, y, color, curve } => {
            put_opcode(w, Opcode::SetMarker);
            w.put_i64(*x).put_i64(*y).put_i64(*color).put_i64(*curve);
        }
        Command2d::ClearMarkers { curves } => {
            put_opcode(w, Opcode::ClearMarkers);
            put_curves(w, curves);
        }
    }
}
