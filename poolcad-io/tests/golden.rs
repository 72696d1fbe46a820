use poolcad_core::document::{Document, Entity, Polyline, PolylineVertex};
use poolcad_core::geometry::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GoldenDocument {
    layers: Vec<GoldenLayer>,
    entities: Vec<GoldenEntity>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenLayer {
    name: String,
    is_visible: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct GoldenEntity {
    id: u64,
    kind: String,
    layer: String,
    data: Value,
}

pub fn assert_golden(name: &str, document: &Document) {
    let snapshot = GoldenDocument::from_document(document);
    let base_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/golden");
    if let Err(err) = fs::create_dir_all(&base_dir) {
        panic!("无法创建黄金数据目录 {}: {err}", base_dir.display());
    }
    let golden_path = base_dir.join(format!("{name}.json"));
    let serialized = serde_json::to_string_pretty(&snapshot).expect("序列化黄金快照失败");

    if !golden_path.exists() {
        fs::write(&golden_path, &serialized)
            .unwrap_or_else(|err| panic!("写入黄金文件 {} 失败: {err}", golden_path.display()));
        panic!(
            "黄金文件 {} 不存在，已自动生成。请确认内容后重新运行测试。",
            golden_path.display()
        );
    }

    let expected_str = fs::read_to_string(&golden_path)
        .unwrap_or_else(|err| panic!("读取黄金文件 {} 失败: {err}", golden_path.display()));
    let expected: GoldenDocument = serde_json::from_str(&expected_str)
        .unwrap_or_else(|err| panic!("解析黄金文件 {} 失败: {err}", golden_path.display()));

    if expected != snapshot {
        let diff_path = base_dir.join(format!("{name}.actual.json"));
        fs::write(&diff_path, &serialized).expect("写入差异文件失败");
        panic!(
            "黄金文件 {} 与当前解析结果不一致。已生成对照输出 {}。",
            golden_path.display(),
            diff_path.display()
        );
    }
}

impl GoldenDocument {
    fn from_document(document: &Document) -> Self {
        let mut layers: Vec<GoldenLayer> = document
            .layers()
            .map(|layer| GoldenLayer {
                name: layer.name.clone(),
                is_visible: layer.is_visible,
            })
            .collect();
        layers.sort_by(|a, b| a.name.cmp(&b.name));

        let mut entities: Vec<GoldenEntity> = document
            .entities()
            .map(|(id, entity)| GoldenEntity {
                id: id.get(),
                kind: entity.kind_name().to_string(),
                layer: entity.layer_name().to_string(),
                data: entity_payload(entity),
            })
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));

        Self { layers, entities }
    }
}

fn entity_payload(entity: &Entity) -> Value {
    match entity {
        Entity::Line(line) => json!({
            "start": point_to_array(line.start),
            "end": point_to_array(line.end)
        }),
        Entity::Circle(circle) => json!({
            "center": point_to_array(circle.center),
            "radius": circle.radius
        }),
        Entity::Arc(arc) => json!({
            "center": point_to_array(arc.center),
            "radius": arc.radius,
            "start_angle": arc.start_angle,
            "end_angle": arc.end_angle
        }),
        Entity::Polyline(polyline) => polyline_to_value(polyline),
        Entity::BlockReference(reference) => json!({
            "name": reference.name,
            "insert": point_to_array(reference.insert),
            "scale": vector_to_array(reference.scale),
            "rotation": reference.rotation
        }),
    }
}

fn polyline_to_value(polyline: &Polyline) -> Value {
    let vertices: Vec<Value> = polyline
        .vertices
        .iter()
        .map(polyline_vertex_to_value)
        .collect();
    json!({
        "flags": polyline.flags.bits(),
        "vertices": vertices
    })
}

fn polyline_vertex_to_value(vertex: &PolylineVertex) -> Value {
    json!({
        "position": point_to_array(vertex.position),
        "bulge": vertex.bulge,
        "z": vertex.z
    })
}

fn point_to_array(point: Point2) -> [f64; 2] {
    [point.x(), point.y()]
}

fn vector_to_array(vector: Vector2) -> [f64; 2] {
    [vector.x(), vector.y()]
}
