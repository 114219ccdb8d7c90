use fsc2_ipc::Protocol::record::{LABEL_X, SCALE_X_START, SCALE_Y_DELTA};
use fsc2_ipc::Protocol::{
    decode, Batch, Command1d, Command2d, DisplayMode, Opcode, Payload, Record1d, Record2d,
    TypeTag, WireWriter,
};
use fsc2_ipc::Queue::Buffer::DataKind;
use fsc2_ipc::IpcError;

#[test]
fn scalar_record_by_hand() {
    let mut w = WireWriter::new();
    w.put_i32(1)
        .put_i64(0)
        .put_i64(0)
        .put_i32(TypeTag::IntScalar.raw())
        .put_i64(42);
    let bytes = w.into_inner();
    assert_eq!(bytes.len(), 4 + 8 + 8 + 4 + 8);

    let batch = decode(DataKind::Data1d, &bytes).unwrap();
    assert_eq!(
        batch,
        Batch::Data1d(vec![Record1d {
            x_index: 0,
            curve: 0,
            payload: Payload::IntScalar(42),
        }])
    );
}

#[test]
fn negative_count_is_an_opcode() {
    let mut w = WireWriter::new();
    w.put_i32(-Opcode::ClearCurve.raw()).put_i64(2).put_i64(0).put_i64(3);

    let batch = decode(DataKind::Data1d, &w.into_inner()).unwrap();
    assert_eq!(batch, Batch::Command1d(Command1d::ClearCurve { curves: vec![0, 3] }));
}

#[test]
fn clear_curve_wire_layout() {
    let bytes = Batch::Command1d(Command1d::ClearCurve { curves: vec![0] }).encode();

    let mut expected = Vec::new();
    expected.extend_from_slice(&(-1i32).to_ne_bytes());
    expected.extend_from_slice(&1i64.to_ne_bytes());
    expected.extend_from_slice(&0i64.to_ne_bytes());
    assert_eq!(bytes, expected);
}

#[test]
fn mixed_2d_records_survive_encoding() {
    let batch = Batch::Data2d(vec![
        Record2d {
            x_index: 1,
            y_index: 2,
            curve: 0,
            payload: Payload::FloatArray(vec![0.5, -1.5, 7.25]),
        },
        Record2d {
            x_index: 0,
            y_index: 0,
            curve: 1,
            payload: Payload::IntMatrix(vec![vec![1, 2], vec![], vec![3]]),
        },
    ]);
    assert_eq!(batch.kind(), DataKind::Data2d);
    assert_eq!(decode(DataKind::Data2d, &batch.encode()).unwrap(), batch);
}

#[test]
fn commands_survive_encoding() {
    let commands_1d = [
        Command1d::ChangeScale {
            mask: SCALE_X_START | SCALE_Y_DELTA,
            values: [1.0, 0.0, 0.0, 2.5],
        },
        Command1d::ChangeLabel {
            labels: [Some("Field [G]".into()), None],
        },
        Command1d::ChangeMode {
            mode: DisplayMode::Sliding,
            width: 64,
        },
        Command1d::VertRescale,
    ];
    for command in commands_1d {
        let batch = Batch::Command1d(command);
        assert_eq!(decode(DataKind::Data1d, &batch.encode()).unwrap(), batch);
    }

    let commands_2d = [
        Command2d::SetMarker {
            x: 3,
            y: 4,
            color: 2,
            curve: 1,
        },
        Command2d::ChangeLabel {
            labels: [None, Some("y".into()), Some("intensity".into())],
        },
        Command2d::ChangePoints { nx: -1, ny: 20 },
    ];
    for command in commands_2d {
        let batch = Batch::Command2d(command);
        assert_eq!(decode(DataKind::Data2d, &batch.encode()).unwrap(), batch);
    }
}

#[test]
fn label_mask_follows_present_labels() {
    let bytes = Batch::Command1d(Command1d::ChangeLabel {
        labels: [Some("x".into()), None],
    })
    .encode();
    let mask = i32::from_ne_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(mask as u32, LABEL_X);
}

#[test]
fn unknown_type_tag_is_rejected() {
    let mut w = WireWriter::new();
    w.put_i32(1).put_i64(0).put_i64(0).put_i32(17).put_i64(1);
    let err = decode(DataKind::Data1d, &w.into_inner()).unwrap_err();
    assert!(matches!(err, IpcError::UnknownType(17)));
}

#[test]
fn matrix_in_1d_is_rejected() {
    let mut w = WireWriter::new();
    w.put_i32(1)
        .put_i64(0)
        .put_i64(0)
        .put_i32(TypeTag::FloatMatrix.raw())
        .put_len(0);
    let err = decode(DataKind::Data1d, &w.into_inner()).unwrap_err();
    assert!(matches!(err, IpcError::MatrixIn1d));
}

#[test]
fn change_mode_is_1d_only() {
    let mut w = WireWriter::new();
    w.put_i32(-Opcode::ChangeMode.raw()).put_i64(1).put_i64(10);
    let err = decode(DataKind::Data2d, &w.into_inner()).unwrap_err();
    assert!(matches!(err, IpcError::UnknownOpcode { dim: "2D", opcode: 8 }));
}

#[test]
fn unknown_opcode_is_rejected() {
    let mut w = WireWriter::new();
    w.put_i32(-40);
    let err = decode(DataKind::Data1d, &w.into_inner()).unwrap_err();
    assert!(matches!(err, IpcError::UnknownOpcode { opcode: 40, .. }));

    // i32::MIN has no positive counterpart
    let err = decode(DataKind::Data1d, &i32::MIN.to_ne_bytes()).unwrap_err();
    assert!(matches!(err, IpcError::UnknownOpcode { .. }));
}

#[test]
fn truncated_array_is_rejected_before_allocation() {
    let mut w = WireWriter::new();
    w.put_i32(1)
        .put_i64(0)
        .put_i64(0)
        .put_i32(TypeTag::FloatArray.raw())
        .put_len(1 << 40)
        .put_f64(1.0);
    let err = decode(DataKind::Data1d, &w.into_inner()).unwrap_err();
    assert!(matches!(err, IpcError::Truncated { available: 8, .. }));
}

#[test]
fn record_cut_short_is_rejected() {
    let mut w = WireWriter::new();
    w.put_i32(2)
        .put_i64(0)
        .put_i64(0)
        .put_i32(TypeTag::IntScalar.raw())
        .put_i64(5);
    let err = decode(DataKind::Data1d, &w.into_inner()).unwrap_err();
    assert!(matches!(err, IpcError::Truncated { needed: 8, available: 0, .. }));
}

#[test]
fn negative_lengths_are_rejected() {
    let mut w = WireWriter::new();
    w.put_i32(1)
        .put_i64(0)
        .put_i64(0)
        .put_i32(TypeTag::IntArray.raw())
        .put_i64(-3);
    let err = decode(DataKind::Data1d, &w.into_inner()).unwrap_err();
    assert!(matches!(err, IpcError::NegativeField { value: -3, .. }));
}

#[test]
fn request_entries_are_not_decoded() {
    let err = decode(DataKind::Request, &0i32.to_ne_bytes()).unwrap_err();
    assert!(matches!(err, IpcError::UnknownKind(3)));
}

#[test]
fn huge_integers_are_rounded() {
    let big = (1i64 << 53) + 1;
    let payload = Payload::IntArray(vec![big, 7]);
    assert_eq!(payload.values().unwrap(), vec![(1i64 << 53) as f64, 7.0]);
}
