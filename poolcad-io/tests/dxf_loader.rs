mod golden;

use std::f64::consts::FRAC_PI_2;
use std::path::PathBuf;

use golden::assert_golden;
use poolcad_core::{
    document::{Document, Entity, PolylineFlags, PolylineVertex},
    geometry::{Point2, Vector2},
};
use poolcad_io::{DocumentLoader, DocumentSaver, DxfFacade, IoError};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_site_plan_matches_expected_document() {
    let loader = DxfFacade::new();
    let doc = loader.load(&fixture("site_plan.dxf")).expect("读取 DXF 失败");
    assert_golden("site_plan", &doc);
}

#[test]
fn malformed_and_unsupported_entities_are_skipped_and_recorded() {
    let outcome = DxfFacade::new()
        .import(&fixture("site_plan.dxf"))
        .expect("读取 DXF 失败");
    assert!(!outcome.is_clean());

    let kinds: Vec<&str> = outcome
        .skipped
        .iter()
        .map(|skipped| skipped.kind.as_str())
        .collect();
    assert_eq!(kinds, ["TEXT", "CIRCLE", "LINE"]);
    assert!(outcome.skipped[1].reason.contains("半径"));
    assert!(outcome.skipped[2].reason.contains("abc"));

    let report = serde_json::to_value(&outcome.skipped[0]).expect("序列化跳过记录失败");
    assert_eq!(report["kind"], "TEXT");
    assert!(report["reason"].as_str().is_some_and(|reason| reason.contains("TEXT")));

    // 被跳过的实体不占用 ID，也不会创建图层
    let ids: Vec<u64> = outcome.document.entities().map(|(id, _)| id.get()).collect();
    assert_eq!(ids, [0, 1, 2, 3, 4]);
    assert!(outcome.document.layer("NOTES").is_none());
}

#[test]
fn load_polyline_with_bulge_preserves_value() {
    let doc = DxfFacade::new()
        .load(&fixture("bulge_polyline.dxf"))
        .expect("读取带 bulge 的 DXF 失败");

    let mut polylines = doc.entities().filter_map(|(_, entity)| match entity {
        Entity::Polyline(polyline) => Some(polyline),
        _ => None,
    });

    let polyline = polylines.next().expect("未找到多段线实体");
    assert!(polylines.next().is_none(), "期望仅有一个多段线实体");
    assert!(!polyline.is_closed());
    assert_eq!(polyline.vertices.len(), 2);

    let first = &polyline.vertices[0];
    let second = &polyline.vertices[1];
    assert_eq!(first.position, Point2::new(0.0, 0.0));
    assert!((first.bulge - 1.0).abs() < 1e-9);
    assert!(first.z.is_none());
    assert_eq!(second.position, Point2::new(10.0, 0.0));
    assert!(second.bulge.abs() < 1e-9);
}

#[test]
fn polyline_records_keep_flags_and_ignore_face_records() {
    let outcome = DxfFacade::new()
        .import(&fixture("polyline_records.dxf"))
        .expect("读取 POLYLINE DXF 失败");

    let entities: Vec<&Entity> = outcome.document.entities().map(|(_, e)| e).collect();
    assert_eq!(entities.len(), 3);

    match entities[0] {
        Entity::Arc(arc) => {
            assert!(arc.start_angle.abs() < 1e-12);
            assert!((arc.end_angle - FRAC_PI_2).abs() < 1e-12);
            assert_eq!(arc.layer, "HARDSCAPE");
        }
        other => panic!("期望 ARC，实际为 {other:?}"),
    }

    match entities[1] {
        Entity::Polyline(polyline) => {
            assert!(polyline.flags.closed);
            assert!(polyline.flags.polyline_3d);
            assert!(!polyline.flags.polyface_mesh);
            let depths: Vec<Option<f64>> = polyline.vertices.iter().map(|v| v.z).collect();
            assert_eq!(depths, [Some(-1.0), Some(-2.0), Some(-3.0)]);
        }
        other => panic!("期望 POLYLINE，实际为 {other:?}"),
    }

    assert!(matches!(entities[2], Entity::Circle(_)));
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].kind, "POLYLINE");
}

#[test]
fn broken_structure_fails_without_partial_document() {
    let loader = DxfFacade::new();
    let missing_endsec = "  0\nSECTION\n  2\nENTITIES\n  0\nLINE\n 10\n0\n 20\n0\n 11\n1\n 21\n1\n";
    match loader.parse_str(missing_endsec) {
        Err(IoError::InvalidDocument(message)) => assert!(message.contains("LINE") || message.contains("ENTITIES")),
        other => panic!("期望结构错误，实际为 {other:?}"),
    }

    let bad_code = "  0\nSECTION\n  2\nENTITIES\nxx\nLINE\n  0\nENDSEC\n  0\nEOF\n";
    assert!(matches!(
        loader.parse_str(bad_code),
        Err(IoError::InvalidDocument(_))
    ));
}

#[test]
fn missing_file_reports_read_error() {
    let loader = DxfFacade::new();
    let err = loader
        .load(&fixture("does_not_exist.dxf"))
        .expect_err("缺失文件应当报错");
    assert!(matches!(err, IoError::ReadError { .. }));
}

#[test]
fn exported_document_reimports_with_vertices_intact() {
    let mut document = Document::new();
    document.add_line(Point2::new(0.0, 0.0), Point2::new(200.0, 0.0), "LOT");
    document.add_arc(Point2::new(40.0, 100.0), 15.0, 0.0, FRAC_PI_2, "HARDSCAPE");
    let pool = document.add_polyline_with_vertices(
        [
            PolylineVertex::with_bulge(Point2::new(-20.0, 0.0), 1.0).with_z(-2.0),
            PolylineVertex::with_bulge(Point2::new(20.0, 0.0), 1.0),
        ],
        PolylineFlags::closed(),
        "SPA",
    );
    document.add_block_reference(
        "BENCH",
        Point2::new(20.0, 20.0),
        Vector2::new(1.5, 1.5),
        FRAC_PI_2,
        "FURNITURE",
    );

    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("layout.dxf");
    let facade = DxfFacade::new();
    facade.save(&document, &path).expect("导出 DXF 失败");

    let outcome = facade.import(&path).expect("重新导入 DXF 失败");
    assert!(outcome.is_clean(), "{:?}", outcome.skipped);
    let reloaded = outcome.document;
    assert_eq!(reloaded.entities().count(), 4);

    let original = document.polyline(pool).expect("原始多段线");
    let (_, imported) = reloaded
        .entities()
        .find(|(_, entity)| entity.layer_name() == "SPA")
        .expect("导入的多段线");
    match imported {
        Entity::Polyline(polyline) => {
            assert_eq!(polyline.vertices, original.vertices);
            assert_eq!(polyline.flags, original.flags);
        }
        other => panic!("期望 POLYLINE，实际为 {other:?}"),
    }

    let insert = reloaded
        .entities()
        .find_map(|(_, entity)| match entity {
            Entity::BlockReference(reference) => Some(reference),
            _ => None,
        })
        .expect("导入的块参照");
    assert_eq!(insert.name, "BENCH");
    assert!((insert.rotation - FRAC_PI_2).abs() < 1e-9);
    assert_eq!(insert.scale, Vector2::new(1.5, 1.5));
}
