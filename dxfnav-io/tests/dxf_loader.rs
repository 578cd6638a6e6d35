use std::f64::consts::{FRAC_PI_2, PI};
use std::io::Write;
use std::path::PathBuf;

use dxfnav_core::drawing::{Attribute, Geometry};
use dxfnav_core::geometry::{Point2, Point3};
use dxfnav_io::{DrawingLoader, DxfFacade, IoError};
use serde_json::json;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_site_groups_entities_by_layer() {
    let loader = DxfFacade::new();
    let drawing = loader.load(&fixture("site.dxf")).expect("读取 DXF 失败");

    let summaries: Vec<(String, usize)> = drawing
        .layer_summaries()
        .into_iter()
        .map(|summary| (summary.name, summary.primitive_count))
        .collect();
    assert_eq!(
        summaries,
        vec![
            ("0".to_string(), 3),
            ("Defpoints".to_string(), 3),
            ("trackline".to_string(), 2),
            ("notes".to_string(), 1),
            ("walls".to_string(), 1),
        ]
    );
    assert_eq!(drawing.len(), 10);
}

#[test]
fn inserts_keep_attributes_in_source_order() {
    let drawing = DxfFacade::new()
        .load(&fixture("site.dxf"))
        .expect("读取 DXF 失败");
    let markers = drawing.layer("Defpoints");

    match &markers[0].geometry {
        Geometry::Insert {
            block_name,
            position,
            attributes,
        } => {
            assert_eq!(block_name, "WAYPOINT");
            assert_eq!(*position, Point3::new(0.0, 0.0, 0.0));
            assert_eq!(
                attributes,
                &vec![
                    Attribute::new("LABEL", "Main entrance"),
                    Attribute::new("ID", "A"),
                ]
            );
        }
        other => panic!("expected insert, got {other:?}"),
    }

    let value = serde_json::to_value(&markers[1]).expect("serialize marker");
    assert_eq!(
        value,
        json!({
            "layer": "Defpoints",
            "geometry": {
                "kind": "insert",
                "block_name": "WAYPOINT",
                "position": [10.0, 0.0, 0.0],
                "attributes": [{ "tag": "NAME", "text": "B" }]
            }
        })
    );

    match &markers[2].geometry {
        Geometry::Insert { attributes, .. } => assert!(attributes.is_empty()),
        other => panic!("expected insert, got {other:?}"),
    }
}

#[test]
fn malformed_line_is_dropped_and_others_survive() {
    let drawing = DxfFacade::new()
        .load(&fixture("site.dxf"))
        .expect("读取 DXF 失败");
    let tracks = drawing.layer("trackline");
    assert_eq!(tracks.len(), 2);
    match &tracks[1].geometry {
        Geometry::Line { start, end } => {
            assert_eq!(*start, Point3::new(10.2, 0.3, 0.0));
            assert_eq!(*end, Point3::new(9.9, 7.6, 0.0));
        }
        other => panic!("expected line, got {other:?}"),
    }
}

#[test]
fn curves_polylines_and_unknown_kinds() {
    let drawing = DxfFacade::new()
        .load(&fixture("site.dxf"))
        .expect("读取 DXF 失败");
    let base = drawing.layer("0");

    match &base[1].geometry {
        Geometry::Arc {
            center,
            radius,
            start_angle,
            end_angle,
        } => {
            assert_eq!(*center, Point2::new(-2.0, 4.0));
            assert!((radius - 1.0).abs() < 1e-12);
            assert!((start_angle - FRAC_PI_2).abs() < 1e-12);
            assert!((end_angle - PI).abs() < 1e-12);
        }
        other => panic!("expected arc, got {other:?}"),
    }

    match &base[2].geometry {
        Geometry::Polyline { points, is_closed } => {
            assert!(*is_closed);
            assert_eq!(points.len(), 3);
            assert_eq!(points[2], Point2::new(12.0, 10.0));
        }
        other => panic!("expected polyline, got {other:?}"),
    }

    match &drawing.layer("walls")[0].geometry {
        Geometry::Polyline { points, is_closed } => {
            assert!(!*is_closed);
            assert_eq!(points, &vec![Point2::new(1.0, 1.0), Point2::new(2.0, -3.0)]);
        }
        other => panic!("expected polyline, got {other:?}"),
    }

    assert_eq!(drawing.layer("notes")[0].geometry.kind(), "TEXT");
}

#[test]
fn load_from_temp_file_defaults_layer_zero() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(
        file,
        "0\nSECTION\n2\nENTITIES\n0\nCIRCLE\n10\n1.0\n20\n2.0\n40\n0.5\n0\nENDSEC\n0\nEOF\n"
    )
    .unwrap();

    let drawing = DxfFacade::new().load(file.path()).expect("load temp dxf");
    assert_eq!(drawing.layer("0").len(), 1);
    assert_eq!(
        drawing.layer("0")[0].geometry,
        Geometry::Circle {
            center: Point2::new(1.0, 2.0),
            radius: 0.5,
        }
    );
}

#[test]
fn missing_file_reports_read_error() {
    let err = DxfFacade::new()
        .load(&fixture("does_not_exist.dxf"))
        .unwrap_err();
    assert!(matches!(err, IoError::ReadError { .. }));
}

#[test]
fn structural_errors_are_fatal() {
    let facade = DxfFacade::new();

    let err = facade
        .parse_str("0\nSECTION\n2\nENTITIES\n0\nLINE\n8\ntrackline\n")
        .unwrap_err();
    assert!(matches!(err, IoError::InvalidDocument(_)));

    let err = facade.parse_str("5\nA1\n").unwrap_err();
    assert!(matches!(err, IoError::InvalidDocument(_)));

    let err = facade
        .parse_str("0\nSECTION\n2\nENTITIES\nxx\nLINE\n")
        .unwrap_err();
    assert!(matches!(err, IoError::InvalidDocument(_)));
}

#[test]
fn bad_numbers_only_drop_their_entity() {
    let source = "0\nSECTION\n2\nENTITIES\n\
        0\nINSERT\n8\nDefpoints\n2\nWP\n10\nnot-a-number\n20\n0.0\n\
        0\nATTRIB\n2\nID\n1\nLost\n\
        0\nSEQEND\n\
        0\nINSERT\n8\nDefpoints\n2\nWP\n10\n1.0\n20\n2.0\n30\n3.0\n\
        0\nENDSEC\n0\nEOF\n";
    let drawing = DxfFacade::new().parse_str(source).expect("parse");
    let markers = drawing.layer("Defpoints");
    assert_eq!(markers.len(), 1);
    match &markers[0].geometry {
        Geometry::Insert { position, .. } => {
            assert_eq!(*position, Point3::new(1.0, 2.0, 3.0));
        }
        other => panic!("expected insert, got {other:?}"),
    }
}
