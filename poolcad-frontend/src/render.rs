//! 将场景整理为外部画布可直接绘制的渲染帧。
//!
//! 帧内坐标已按配置翻转 Y 轴；多段线在这里经过形状生成器展开，
//! 编辑中的实体额外附带锚点与边长标注。

use std::f64::consts::TAU;
use std::io::Write;

use glam::DVec2;
use poolcad_core::document::{Arc, Entity, EntityId, MaterialHandle};
use poolcad_core::geometry::Point2;
use poolcad_core::shape::{ViewMode, generate_flat};
use poolcad_engine::editor::ShapeEditor;
use poolcad_engine::scene::Scene;
use serde::Serialize;

use crate::errors::FrontendError;
use crate::textures::TextureRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub view_mode: ViewMode,
    pub flip_y: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::default(),
            flip_y: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderFrame {
    pub view_mode: ViewMode,
    pub flip_y: bool,
    pub layers: Vec<RenderLayer>,
    pub materials: Vec<MaterialBinding>,
    pub overlays: Vec<EditOverlay>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderLayer {
    pub name: String,
    pub visible: bool,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    /// 展开后的 `[x0, y0, x1, y1, ...]`。
    Stroke {
        entity: u64,
        points: Vec<f64>,
        closed: bool,
        fill: Option<MaterialHandle>,
    },
    Circle {
        entity: u64,
        center: [f64; 2],
        radius: f64,
    },
    /// 从 `rotation_deg` 开始沿画布角度增大方向扫过 `sweep_deg`。
    Arc {
        entity: u64,
        center: [f64; 2],
        radius: f64,
        rotation_deg: f64,
        sweep_deg: f64,
    },
    Marker {
        entity: u64,
        name: String,
        position: [f64; 2],
        rotation_deg: f64,
        scale: [f64; 2],
    },
}

/// 帧中出现的材质及其贴图路径。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialBinding {
    pub handle: MaterialHandle,
    pub name: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditOverlay {
    pub entity: u64,
    pub anchors: Vec<AnchorOverlay>,
    pub edges: Vec<EdgeOverlay>,
}

/// 锚点位置经过翻转，标注文本使用原始坐标。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorOverlay {
    pub index: usize,
    pub position: [f64; 2],
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeOverlay {
    pub start_index: usize,
    pub position: [f64; 2],
    pub length: f64,
}

pub fn build_frame(scene: &Scene, textures: &TextureRegistry, options: RenderOptions) -> RenderFrame {
    let document = scene.document();
    let mut used_materials: Vec<MaterialHandle> = Vec::new();

    let layers = document
        .entities_by_layer()
        .into_iter()
        .map(|(name, members)| {
            let primitives = members
                .into_iter()
                .map(|(id, entity)| {
                    let fill = scene.material(id);
                    if let Some(handle) = fill {
                        if !used_materials.contains(&handle) {
                            used_materials.push(handle);
                        }
                    }
                    entity_primitive(id, entity, fill, options)
                })
                .collect();
            RenderLayer {
                name: name.to_string(),
                visible: document.layer(name).is_none_or(|layer| layer.is_visible),
                primitives,
            }
        })
        .collect();

    used_materials.sort_by_key(|handle| handle.get());
    let materials = used_materials
        .into_iter()
        .map(|handle| match textures.asset(handle) {
            Some(asset) => MaterialBinding {
                handle,
                name: asset.name.clone(),
                path: asset
                    .resolved_path
                    .as_ref()
                    .map(|path| path.to_string_lossy().into_owned()),
            },
            None => MaterialBinding {
                handle,
                name: format!("#{}", handle.get()),
                path: None,
            },
        })
        .collect();

    let mut overlays: Vec<EditOverlay> = scene
        .edit_sessions()
        .map(|(id, editor)| edit_overlay(id, editor, options))
        .collect();
    overlays.sort_by_key(|overlay| overlay.entity);

    RenderFrame {
        view_mode: options.view_mode,
        flip_y: options.flip_y,
        layers,
        materials,
        overlays,
    }
}

pub fn write_frame<W: Write>(frame: &RenderFrame, writer: W) -> Result<(), FrontendError> {
    serde_json::to_writer_pretty(writer, frame)?;
    Ok(())
}

fn entity_primitive(
    id: EntityId,
    entity: &Entity,
    fill: Option<MaterialHandle>,
    options: RenderOptions,
) -> Primitive {
    let entity_id = id.get();
    match entity {
        Entity::Line(line) => Primitive::Stroke {
            entity: entity_id,
            points: flip_flat(
                vec![line.start.x(), line.start.y(), line.end.x(), line.end.y()],
                options.flip_y,
            ),
            closed: false,
            fill,
        },
        Entity::Circle(circle) => Primitive::Circle {
            entity: entity_id,
            center: canvas_point(circle.center, options.flip_y),
            radius: circle.radius.abs(),
        },
        Entity::Arc(arc) => arc_primitive(entity_id, arc, options.flip_y),
        Entity::Polyline(polyline) => Primitive::Stroke {
            entity: entity_id,
            points: flip_flat(
                generate_flat(&polyline.vertices, options.view_mode),
                options.flip_y,
            ),
            closed: polyline.is_closed(),
            fill,
        },
        Entity::BlockReference(reference) => Primitive::Marker {
            entity: entity_id,
            name: reference.name.clone(),
            position: canvas_point(reference.insert, options.flip_y),
            rotation_deg: degrees(canvas_angle(reference.rotation, options.flip_y)),
            scale: [reference.scale.x(), reference.scale.y()],
        },
    }
}

/// DXF 圆弧总是从起始角逆时针扫到终止角；翻转后方向相反，
/// 因此改为从翻转后的终止角开始扫掠。起止角重合时画整圆。
fn arc_primitive(entity: u64, arc: &Arc, flip_y: bool) -> Primitive {
    let sweep = arc.sweep();
    let rotation = if flip_y {
        -arc.end_angle
    } else {
        arc.start_angle
    };
    Primitive::Arc {
        entity,
        center: canvas_point(arc.center, flip_y),
        radius: arc.radius.abs(),
        rotation_deg: degrees(rotation.rem_euclid(TAU)),
        sweep_deg: sweep.to_degrees(),
    }
}

/// 弧度转角度，`-0.0` 归一为 `0.0`。
#[inline]
fn degrees(angle: f64) -> f64 {
    angle.to_degrees() + 0.0
}

fn edit_overlay(id: EntityId, editor: &ShapeEditor, options: RenderOptions) -> EditOverlay {
    let anchors = editor
        .anchors()
        .into_iter()
        .map(|anchor| AnchorOverlay {
            index: anchor.index,
            position: canvas_point(anchor.position, options.flip_y),
            x: anchor.position.x(),
            y: anchor.position.y(),
            z: anchor.z,
        })
        .collect();
    let edges = editor
        .edge_labels()
        .into_iter()
        .map(|label| EdgeOverlay {
            start_index: label.start_index,
            position: canvas_point(label.midpoint, options.flip_y),
            length: label.length,
        })
        .collect();
    EditOverlay {
        entity: id.get(),
        anchors,
        edges,
    }
}

fn canvas_point(point: Point2, flip_y: bool) -> [f64; 2] {
    let mut vec: DVec2 = point.as_vec2();
    if flip_y {
        vec.y = -vec.y;
    }
    vec.to_array()
}

#[inline]
fn canvas_angle(angle: f64, flip_y: bool) -> f64 {
    if flip_y { -angle } else { angle }
}

fn flip_flat(mut flat: Vec<f64>, flip_y: bool) -> Vec<f64> {
    if flip_y {
        for y in flat.iter_mut().skip(1).step_by(2) {
            *y = -*y;
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolcad_core::document::{Document, PolylineFlags, PolylineVertex};
    use poolcad_engine::catalog::ItemKind;
    use std::f64::consts::FRAC_PI_2;

    fn layer<'a>(frame: &'a RenderFrame, name: &str) -> &'a RenderLayer {
        frame
            .layers
            .iter()
            .find(|layer| layer.name == name)
            .unwrap_or_else(|| panic!("缺少图层 {name}"))
    }

    #[test]
    fn rectangle_stroke_is_flipped_and_closed() {
        let mut scene = Scene::new();
        scene.drop_item(ItemKind::RectangularPool, Point2::new(100.0, 50.0));
        let frame = build_frame(&scene, &TextureRegistry::default(), RenderOptions::default());

        let pool = layer(&frame, "POOL");
        match &pool.primitives[0] {
            Primitive::Stroke { points, closed, fill, .. } => {
                assert!(*closed);
                assert!(fill.is_none());
                assert_eq!(
                    points,
                    &vec![50.0, -20.0, 150.0, -20.0, 150.0, -80.0, 50.0, -80.0]
                );
            }
            other => panic!("期望 Stroke，实际为 {other:?}"),
        }
    }

    #[test]
    fn unflipped_frame_keeps_drawing_coordinates() {
        let mut document = Document::new();
        document.add_line(Point2::new(1.0, 2.0), Point2::new(3.0, 4.0), "LOT");
        let scene = Scene::with_document(document);
        let frame = build_frame(
            &scene,
            &TextureRegistry::default(),
            RenderOptions {
                view_mode: ViewMode::Full,
                flip_y: false,
            },
        );
        assert_eq!(
            layer(&frame, "LOT").primitives[0],
            Primitive::Stroke {
                entity: 0,
                points: vec![1.0, 2.0, 3.0, 4.0],
                closed: false,
                fill: None,
            }
        );
    }

    #[test]
    fn flipped_arc_starts_from_mirrored_end_angle() {
        let mut document = Document::new();
        document.add_arc(Point2::new(0.0, 10.0), 5.0, 0.0, FRAC_PI_2, "HARDSCAPE");
        let scene = Scene::with_document(document);

        let frame = build_frame(&scene, &TextureRegistry::default(), RenderOptions::default());
        match &layer(&frame, "HARDSCAPE").primitives[0] {
            Primitive::Arc {
                center,
                rotation_deg,
                sweep_deg,
                ..
            } => {
                assert_eq!(center, &[0.0, -10.0]);
                assert!((rotation_deg - 270.0).abs() < 1e-9);
                assert!((sweep_deg - 90.0).abs() < 1e-9);
            }
            other => panic!("期望 Arc，实际为 {other:?}"),
        }
    }

    #[test]
    fn full_turn_arc_sweeps_a_whole_circle() {
        let mut document = Document::new();
        document.add_arc(Point2::new(0.0, 0.0), 5.0, 0.0, TAU, "HARDSCAPE");
        document.add_arc(Point2::new(20.0, 0.0), 5.0, FRAC_PI_2, FRAC_PI_2, "HARDSCAPE");
        let scene = Scene::with_document(document);

        for flip_y in [true, false] {
            let options = RenderOptions {
                flip_y,
                ..RenderOptions::default()
            };
            let frame = build_frame(&scene, &TextureRegistry::default(), options);
            let primitives = &layer(&frame, "HARDSCAPE").primitives;
            assert_eq!(primitives.len(), 2);
            for primitive in primitives {
                match primitive {
                    Primitive::Arc { sweep_deg, .. } => assert!((sweep_deg - 360.0).abs() < 1e-9),
                    other => panic!("期望 Arc，实际为 {other:?}"),
                }
            }
        }
    }

    #[test]
    fn zero_rotations_never_serialize_as_negative_zero() {
        let mut document = Document::new();
        document.add_arc(Point2::new(0.0, 0.0), 5.0, 0.0, TAU, "HARDSCAPE");
        document.add_block_reference(
            "BENCH",
            Point2::new(5.0, 5.0),
            poolcad_core::geometry::Vector2::new(1.0, 1.0),
            0.0,
            "FURNITURE",
        );
        let scene = Scene::with_document(document);

        let frame = build_frame(&scene, &TextureRegistry::default(), RenderOptions::default());
        let arc = &layer(&frame, "HARDSCAPE").primitives[0];
        let marker = &layer(&frame, "FURNITURE").primitives[0];
        for primitive in [arc, marker] {
            match primitive {
                Primitive::Arc { rotation_deg, .. } | Primitive::Marker { rotation_deg, .. } => {
                    assert_eq!(*rotation_deg, 0.0);
                    assert!(rotation_deg.is_sign_positive(), "{primitive:?}");
                }
                other => panic!("期望 Arc 或 Marker，实际为 {other:?}"),
            }
        }

        let json = serde_json::to_value(marker).expect("序列化 Marker");
        assert_eq!(json["rotation_deg"].to_string(), "0.0");
    }

    #[test]
    fn view_mode_controls_arc_density() {
        let start = Point2::new(0.0, 0.0);
        let end = Point2::new(10.0, 0.0);
        let coarse = poolcad_core::bulge::sample_segment(start, end, 0.5);
        let before_end = coarse[coarse.len() - 2];
        // 后续直边沿末段弦方向延伸，圆弧不会被交点裁剪
        let after = end.translate(before_end.vector_to(end));

        let mut document = Document::new();
        document.add_polyline_with_vertices(
            [
                PolylineVertex::with_bulge(start, 0.5),
                PolylineVertex::new(end),
                PolylineVertex::new(after),
            ],
            PolylineFlags::default(),
            "POOL",
        );
        let scene = Scene::with_document(document);
        let count = |mode| {
            let frame = build_frame(
                &scene,
                &TextureRegistry::default(),
                RenderOptions {
                    view_mode: mode,
                    flip_y: true,
                },
            );
            match &frame.layers[0].primitives[0] {
                Primitive::Stroke { points, .. } => points.len() / 2,
                other => panic!("期望 Stroke，实际为 {other:?}"),
            }
        };
        assert!(count(ViewMode::Full) > count(ViewMode::Clipped));
    }

    #[test]
    fn materials_and_edit_overlays_are_exported() {
        let registry = TextureRegistry::build(
            Vec::new(),
            &[poolcad_config::TextureEntry {
                name: "pool_water".to_string(),
                file: "water.png".into(),
            }],
        );
        let mut scene = Scene::new();
        let pool = scene.drop_item(ItemKind::RectangularPool, Point2::new(0.0, 0.0));
        let handle = registry.handle("pool_water").expect("handle");
        scene.assign_material(pool, handle).expect("assign");
        scene.begin_edit(pool).expect("begin edit");
        scene.set_depth(pool, 2, 1.5).expect("depth");

        let frame = build_frame(&scene, &registry, RenderOptions::default());
        assert_eq!(
            frame.materials,
            vec![MaterialBinding {
                handle,
                name: "pool_water".to_string(),
                path: None,
            }]
        );

        assert_eq!(frame.overlays.len(), 1);
        let overlay = &frame.overlays[0];
        assert_eq!(overlay.entity, pool.get());
        assert_eq!(overlay.anchors.len(), 4);
        assert_eq!(overlay.anchors[2].z, Some(-1.5));
        assert_eq!(overlay.anchors[2].position, [50.0, -30.0]);
        assert_eq!((overlay.anchors[2].x, overlay.anchors[2].y), (50.0, 30.0));
        assert!((overlay.edges[0].length - 100.0).abs() < 1e-9);

        let mut json = Vec::new();
        write_frame(&frame, &mut json).expect("serialize frame");
        let value: serde_json::Value = serde_json::from_slice(&json).expect("parse json");
        assert_eq!(value["layers"][0]["primitives"][0]["type"], "stroke");
        assert_eq!(value["layers"][0]["primitives"][0]["fill"], 0);
        assert_eq!(value["view_mode"], "clipped");
    }
}
