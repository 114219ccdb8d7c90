use fsc2_ipc::Display::{CutView, NoCut};
use fsc2_ipc::Protocol::record::{SCALE_Z_DELTA, SCALE_Z_START};
use fsc2_ipc::Protocol::{Command2d, Payload, Record2d};
use fsc2_ipc::Store::{Axis, Config2d, Store2d, MIN_POINTS};
use fsc2_ipc::IpcError;

#[derive(Default)]
struct RecordingCut {
    rescaled: Vec<(usize, f64, f64)>,
    new_points: Vec<(usize, usize, usize, usize)>,
    resized: Vec<(Axis, usize)>,
    cleared: Vec<usize>,
}

impl CutView for RecordingCut {
    fn data_rescaled(&mut self, curve: usize, min: f64, max: f64) -> bool {
        self.rescaled.push((curve, min, max));
        true
    }

    fn new_points(&mut self, curve: usize, x: usize, y: usize, len: usize) -> bool {
        self.new_points.push((curve, x, y, len));
        false
    }

    fn num_points_changed(&mut self, axis: Axis, size: usize) -> bool {
        self.resized.push((axis, size));
        true
    }

    fn clear_curve(&mut self, curve: usize) -> bool {
        self.cleared.push(curve);
        true
    }
}

fn store(curves: usize, nx: usize, ny: usize) -> Store2d {
    Store2d::new(Config2d {
        curves,
        nx,
        ny,
        ..Config2d::default()
    })
    .unwrap()
}

fn cell(curve: i64, x: i64, y: i64, value: f64) -> Record2d {
    Record2d {
        x_index: x,
        y_index: y,
        curve,
        payload: Payload::FloatScalar(value),
    }
}

fn row(curve: i64, x: i64, y: i64, values: &[f64]) -> Record2d {
    Record2d {
        x_index: x,
        y_index: y,
        curve,
        payload: Payload::FloatArray(values.to_vec()),
    }
}

fn assert_count_matches(store: &Store2d) {
    for curve in store.curves() {
        let existing = curve.points().iter().filter(|p| p.exists).count();
        assert_eq!(curve.count(), existing);
    }
}

fn fill_2x2(s: &mut Store2d) {
    for y in 0..2 {
        for x in 0..2 {
            s.apply(&cell(0, x, y, (x + 10 * y) as f64), &mut NoCut).unwrap();
        }
    }
}

#[test]
fn growing_both_axes_keeps_cells() {
    let mut s = store(1, 2, 2);
    fill_2x2(&mut s);
    let before: Vec<_> = (0..2)
        .flat_map(|y| (0..2).map(move |x| (x, y)))
        .map(|(x, y)| s.point(0, x, y).unwrap())
        .collect();

    s.apply(&cell(0, 4, 3, 5.0), &mut NoCut).unwrap();

    assert_eq!((s.nx(), s.ny()), (5, 4));
    let after: Vec<_> = (0..2)
        .flat_map(|y| (0..2).map(move |x| (x, y)))
        .map(|(x, y)| s.point(0, x, y).unwrap())
        .collect();
    assert_eq!(before, after);

    for y in 0..4 {
        for x in 0..5 {
            let p = s.point(0, x, y).unwrap();
            let old = x < 2 && y < 2;
            assert_eq!(p.exists, old || (x, y) == (4, 3), "cell ({x}, {y})");
        }
    }
    assert_eq!(s.curve(0).unwrap().count(), 5);
}

#[test]
fn growing_one_axis_at_a_time() {
    let mut s = store(2, 2, 2);
    fill_2x2(&mut s);

    s.apply(&cell(0, 3, 0, 1.0), &mut NoCut).unwrap();
    assert_eq!((s.nx(), s.ny()), (4, 2));
    s.apply(&cell(0, 0, 2, 1.0), &mut NoCut).unwrap();
    assert_eq!((s.nx(), s.ny()), (4, 3));

    let real = |x, y| {
        let c = s.curve(0).unwrap();
        c.range().real(s.point(0, x, y).unwrap().v)
    };
    assert!((real(1, 0) - 1.0).abs() < 1e-9);
    assert!((real(0, 1) - 10.0).abs() < 1e-9);
    assert!((real(1, 1) - 11.0).abs() < 1e-9);
    assert!(!s.point(0, 2, 1).unwrap().exists);
    assert!(s.curve(1).unwrap().points().iter().all(|p| !p.exists));
    assert_eq!(s.curve(1).unwrap().points().len(), 12);
    assert_count_matches(&s);
}

#[test]
fn matrix_and_rows_give_the_same_state() {
    let data = vec![
        vec![1.0, 2.0, 3.0],
        vec![-4.0, 5.0, 6.0],
        vec![7.0, 8.0, 90.0],
    ];

    let mut by_matrix = store(1, 2, 2);
    by_matrix
        .apply(
            &Record2d {
                x_index: 1,
                y_index: 1,
                curve: 0,
                payload: Payload::FloatMatrix(data.clone()),
            },
            &mut NoCut,
        )
        .unwrap();

    let mut by_rows = store(1, 2, 2);
    for (dy, values) in data.iter().enumerate() {
        by_rows.apply(&row(0, 1, 1 + dy as i64, values), &mut NoCut).unwrap();
    }

    assert_eq!((by_matrix.nx(), by_matrix.ny()), (by_rows.nx(), by_rows.ny()));
    let (a, b) = (by_matrix.curve(0).unwrap(), by_rows.curve(0).unwrap());
    assert_eq!(a.count(), b.count());
    assert_eq!(a.range(), b.range());
    for (p, q) in a.points().iter().zip(b.points()) {
        assert_eq!(p.exists, q.exists);
        assert!((p.v - q.v).abs() < 1e-12);
    }
}

#[test]
fn integer_matrix_is_accepted() {
    let mut s = store(1, 2, 2);
    s.apply(
        &Record2d {
            x_index: 0,
            y_index: 0,
            curve: 0,
            payload: Payload::IntMatrix(vec![vec![0, 1], vec![2, 3]]),
        },
        &mut NoCut,
    )
    .unwrap();
    assert_eq!(s.curve(0).unwrap().count(), 4);
    assert_eq!(s.point(0, 1, 1).unwrap().v, 1.0);
}

#[test]
fn cut_view_hears_about_changes() {
    let mut s = store(1, 2, 2);
    let mut cut = RecordingCut::default();

    s.apply(&row(0, 0, 0, &[1.0, 2.0]), &mut cut).unwrap();
    assert_eq!(cut.rescaled, vec![(0, 1.0, 2.0)]);
    assert_eq!(cut.new_points, vec![(0, 0, 0, 2)]);
    assert!(s.dirty().cut);
    assert!(s.dirty().z_axis);

    s.reset_dirty();
    s.apply(&row(0, 0, 1, &[1.5]), &mut cut).unwrap();
    assert_eq!(cut.rescaled.len(), 1);
    assert!(!s.dirty().cut);

    s.apply(&cell(0, 5, 2, 1.5), &mut cut).unwrap();
    assert_eq!(cut.resized, vec![(Axis::X, 6), (Axis::Y, 3)]);
    assert!(s.dirty().cut && s.dirty().x_axis && s.dirty().y_axis);

    s.command(&Command2d::ClearCurve { curves: vec![0] }, &mut cut)
        .unwrap();
    assert_eq!(cut.cleared, vec![0]);
    assert_eq!(s.curve(0).unwrap().count(), 0);
    assert!(!s.curve(0).unwrap().range().is_scale_set);
}

#[test]
fn each_curve_has_its_own_range() {
    let mut s = store(2, 4, 4);
    s.apply(&row(0, 0, 0, &[0.0, 1.0]), &mut NoCut).unwrap();
    s.apply(&row(1, 0, 0, &[100.0, 300.0]), &mut NoCut).unwrap();

    assert_eq!(s.curve(0).unwrap().range().max, 1.0);
    assert_eq!(s.curve(1).unwrap().range().min, 100.0);
    assert_eq!(s.point(1, 1, 0).unwrap().v, 1.0);
    assert_eq!(s.point(0, 1, 0).unwrap().v, 1.0);
}

#[test]
fn change_points_shrinks_to_used_cells() {
    let mut s = store(1, 4, 4);
    s.apply(&row(0, 0, 0, &[1.0, 2.0, 3.0]), &mut NoCut).unwrap();
    s.set_marker(0, 2, 1, 0).unwrap();

    s.command(&Command2d::ChangePoints { nx: -1, ny: -1 }, &mut NoCut)
        .unwrap();
    assert_eq!((s.nx(), s.ny()), (3, 3));
    assert_eq!(s.curve(0).unwrap().count(), 3);
    assert!((s.curve(0).unwrap().range().real(s.point(0, 2, 0).unwrap().v) - 3.0).abs() < 1e-9);

    s.command(&Command2d::ChangePoints { nx: 10, ny: 1 }, &mut NoCut)
        .unwrap();
    assert_eq!((s.nx(), s.ny()), (10, 3));

    s.command(&Command2d::ClearMarkers { curves: vec![0] }, &mut NoCut)
        .unwrap();
    s.clear_curve(&[0], &mut NoCut).unwrap();
    s.command(&Command2d::ChangePoints { nx: -1, ny: -1 }, &mut NoCut)
        .unwrap();
    assert_eq!((s.nx(), s.ny()), (MIN_POINTS, MIN_POINTS));
}

#[test]
fn change_scale_is_per_curve() {
    let mut s = store(2, 4, 4);
    s.command(
        &Command2d::ChangeScale {
            curve: 1,
            mask: SCALE_Z_START | SCALE_Z_DELTA,
            values: [9.0, 9.0, 9.0, 9.0, -1.0, 0.25],
        },
        &mut NoCut,
    )
    .unwrap();

    assert_eq!(s.curve(1).unwrap().scale_start(), [0.0, 0.0, -1.0]);
    assert_eq!(s.curve(1).unwrap().scale_delta(), [1.0, 1.0, 0.25]);
    assert_eq!(s.curve(0).unwrap().scale_start(), [0.0, 0.0, 0.0]);
    assert!(s.dirty().z_axis);
    assert!(!s.dirty().x_axis);
}

#[test]
fn vert_rescale_is_per_curve() {
    let mut s = store(1, 4, 4);
    let mut cut = RecordingCut::default();
    s.apply(&row(0, 0, 0, &[0.0, 10.0, 4.0, 6.0]), &mut cut).unwrap();
    s.clear_curve(&[0], &mut cut).unwrap();
    s.apply(&row(0, 0, 0, &[0.0, 10.0]), &mut cut).unwrap();
    s.apply(&row(0, 0, 0, &[4.0, 6.0]), &mut cut).unwrap();

    s.command(&Command2d::VertRescale { curve: 0 }, &mut cut).unwrap();
    let curve = s.curve(0).unwrap();
    assert!((curve.range().min - 4.0).abs() < 1e-12);
    assert!((curve.range().max - 6.0).abs() < 1e-12);
    assert!((s.point(0, 0, 0).unwrap().v - 0.0).abs() < 1e-12);
    assert!((s.point(0, 1, 0).unwrap().v - 1.0).abs() < 1e-12);
    assert_eq!(cut.rescaled.last().map(|r| r.0), Some(0));
}

#[test]
fn markers_belong_to_a_curve() {
    let mut s = store(2, 4, 4);
    s.set_marker(1, 1, 3, 1).unwrap();
    assert!(s.curve(0).unwrap().markers().is_empty());
    assert_eq!(s.curve(1).unwrap().markers().len(), 1);

    s.clear_markers(&[1]).unwrap();
    assert!(s.curve(1).unwrap().markers().is_empty());
    assert!(matches!(
        s.set_marker(-1, 0, 0, 0),
        Err(IpcError::NegativeField { .. })
    ));
}

#[test]
fn pixels_follow_the_grid() {
    let mut s = Store2d::new(Config2d {
        nx: 3,
        ny: 3,
        canvas_width: 101,
        canvas_height: 51,
        ..Config2d::default()
    })
    .unwrap();
    s.apply(&row(0, 0, 2, &[0.0, 1.0, 2.0]), &mut NoCut).unwrap();

    let px = s.curve(0).unwrap().pixels();
    let last = px[2 * 3 + 2];
    assert_eq!((last.x, last.y), (100, 0));
    assert!((last.z - 1.0).abs() < 1e-12);
    let first = px[2 * 3];
    assert_eq!((first.x, first.y), (0, 0));
    assert_eq!(first.z, 0.0);
}

#[test]
fn bad_records_are_fatal() {
    let mut s = store(1, 4, 4);
    assert!(matches!(
        s.apply(&cell(1, 0, 0, 1.0), &mut NoCut),
        Err(IpcError::CurveOutOfRange { curve: 1, count: 1 })
    ));
    assert!(matches!(
        s.apply(&cell(0, 0, -2, 1.0), &mut NoCut),
        Err(IpcError::NegativeField { value: -2, .. })
    ));
    assert!(matches!(
        s.command(&Command2d::VertRescale { curve: 3 }, &mut NoCut),
        Err(IpcError::CurveOutOfRange { .. })
    ));
}
