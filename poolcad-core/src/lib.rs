pub mod bulge;
pub mod intersect;
pub mod shape;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，与 DXF 的双精度坐标保持一致。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于平移量与方向。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算文档/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }
    }
}

pub mod document {
    use std::collections::HashMap;
    use std::f64::consts::{FRAC_PI_2, TAU};

    use serde::{Deserialize, Serialize};

    use crate::bulge::solve_arc;
    use crate::geometry::{Bounds2D, Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 材质句柄。核心层只保存与比较句柄，贴图本身由渲染层的注册表持有。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MaterialHandle(u32);

    impl MaterialHandle {
        #[inline]
        pub fn new(raw: u32) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u32 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
        BlockReference(BlockReference),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::BlockReference(reference) => &reference.layer,
            }
        }

        /// DXF 中的实体类型名，用于日志与导出。
        pub fn kind_name(&self) -> &'static str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Circle(_) => "CIRCLE",
                Entity::Arc(_) => "ARC",
                Entity::Polyline(_) => "POLYLINE",
                Entity::BlockReference(_) => "INSERT",
            }
        }

        /// 计算实体的 2D 轴对齐范围，块参照退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Entity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Entity::Circle(circle) => {
                    let radius = circle.radius.abs();
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Entity::Arc(arc) => {
                    let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
                    include_arc_span(arc.center, arc.radius.abs(), start, end, &mut bounds);
                }
                Entity::Polyline(polyline) => {
                    polyline_bounds(polyline, &mut bounds);
                }
                Entity::BlockReference(reference) => {
                    bounds.include_point(reference.insert);
                }
            }
            if bounds.is_empty() {
                None
            } else {
                Some(bounds)
            }
        }

        /// 整体平移实体（对应画布上的拖拽）。
        pub fn translate(&mut self, delta: Vector2) {
            match self {
                Entity::Line(line) => {
                    line.start = line.start.translate(delta);
                    line.end = line.end.translate(delta);
                }
                Entity::Circle(circle) => circle.center = circle.center.translate(delta),
                Entity::Arc(arc) => arc.center = arc.center.translate(delta),
                Entity::Polyline(polyline) => {
                    for vertex in &mut polyline.vertices {
                        vertex.position = vertex.position.translate(delta);
                    }
                }
                Entity::BlockReference(reference) => {
                    reference.insert = reference.insert.translate(delta);
                }
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    impl Arc {
        /// 从起始角逆时针扫到终止角的角度，落在 `(0, 2π]`；两角重合视为整圆。
        pub fn sweep(&self) -> f64 {
            let (start, end) = canonical_interval(self.start_angle, self.end_angle);
            end - start
        }
    }

    /// DXF 组码 70 的多段线标志，每一位独立。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PolylineFlags {
        pub closed: bool,
        pub curve_fit: bool,
        pub spline_fit: bool,
        pub polyline_3d: bool,
        pub polygon_mesh_3d: bool,
        pub mesh_closed_n: bool,
        pub polyface_mesh: bool,
    }

    impl PolylineFlags {
        pub const CLOSED: i32 = 0x01;
        pub const CURVE_FIT: i32 = 0x02;
        pub const SPLINE_FIT: i32 = 0x04;
        pub const POLYLINE_3D: i32 = 0x08;
        pub const POLYGON_MESH_3D: i32 = 0x10;
        pub const MESH_CLOSED_N: i32 = 0x20;
        pub const POLYFACE_MESH: i32 = 0x40;

        #[inline]
        pub fn closed() -> Self {
            Self {
                closed: true,
                ..Self::default()
            }
        }

        /// 按位解析，未知位忽略。
        pub fn from_bits(bits: i32) -> Self {
            Self {
                closed: bits & Self::CLOSED != 0,
                curve_fit: bits & Self::CURVE_FIT != 0,
                spline_fit: bits & Self::SPLINE_FIT != 0,
                polyline_3d: bits & Self::POLYLINE_3D != 0,
                polygon_mesh_3d: bits & Self::POLYGON_MESH_3D != 0,
                mesh_closed_n: bits & Self::MESH_CLOSED_N != 0,
                polyface_mesh: bits & Self::POLYFACE_MESH != 0,
            }
        }

        pub fn bits(&self) -> i32 {
            [
                (self.closed, Self::CLOSED),
                (self.curve_fit, Self::CURVE_FIT),
                (self.spline_fit, Self::SPLINE_FIT),
                (self.polyline_3d, Self::POLYLINE_3D),
                (self.polygon_mesh_3d, Self::POLYGON_MESH_3D),
                (self.mesh_closed_n, Self::MESH_CLOSED_N),
                (self.polyface_mesh, Self::POLYFACE_MESH),
            ]
            .iter()
            .filter(|(set, _)| *set)
            .fold(0, |acc, (_, bit)| acc | bit)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub flags: PolylineFlags,
        pub layer: String,
    }

    impl Polyline {
        #[inline]
        pub fn is_closed(&self) -> bool {
            self.flags.closed
        }
    }

    /// 多段线顶点。`bulge` 描述从本顶点到下一个顶点（循环）的圆弧，
    /// 为 0 或非有限值时视为直线；`z` 为可选深度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub z: Option<f64>,
        #[serde(default)]
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                z: None,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self {
                position,
                z: None,
                bulge,
            }
        }

        #[inline]
        pub fn at(x: f64, y: f64) -> Self {
            Self::new(Point2::new(x, y))
        }

        #[inline]
        pub fn with_z(mut self, z: f64) -> Self {
            self.z = Some(z);
            self
        }

        #[inline]
        pub fn has_bulge(&self) -> bool {
            self.bulge.is_finite() && self.bulge != 0.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub scale: Vector2,
        pub rotation: f64,
        pub layer: String,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.add_entity(Entity::Line(Line { start, end, layer }))
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.add_entity(Entity::Circle(Circle {
                center,
                radius,
                layer,
            }))
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                layer,
            }))
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            let flags = if is_closed {
                PolylineFlags::closed()
            } else {
                PolylineFlags::default()
            };
            self.add_polyline_with_vertices(collected, flags, layer)
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            flags: PolylineFlags,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let layer = layer.into();
            self.add_entity(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                flags,
                layer,
            }))
        }

        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.add_entity(Entity::BlockReference(BlockReference {
                name: name.into(),
                insert,
                scale,
                rotation,
                layer,
            }))
        }

        /// 追加实体并分配新的 ID，图层不存在时自动创建。
        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.get(name)
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        /// 按图层分组，图层顺序为首次出现的顺序，空图层名归入 "0"。
        pub fn entities_by_layer(&self) -> Vec<(&str, Vec<(EntityId, &Entity)>)> {
            let mut groups: Vec<(&str, Vec<(EntityId, &Entity)>)> = Vec::new();
            for (id, entity) in &self.entities {
                let name = match entity.layer_name() {
                    "" => "0",
                    name => name,
                };
                match groups.iter_mut().find(|(layer, _)| *layer == name) {
                    Some((_, members)) => members.push((*id, entity)),
                    None => groups.push((name, vec![(*id, entity)])),
                }
            }
            groups
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        #[inline]
        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
            self.entities
                .iter_mut()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        pub fn polyline(&self, id: EntityId) -> Option<&Polyline> {
            match self.entity(id) {
                Some(Entity::Polyline(polyline)) => Some(polyline),
                _ => None,
            }
        }

        pub fn polyline_mut(&mut self, id: EntityId) -> Option<&mut Polyline> {
            match self.entity_mut(id) {
                Some(Entity::Polyline(polyline)) => Some(polyline),
                _ => None,
            }
        }

        /// 整体替换多段线顶点，返回目标是否为多段线。
        pub fn replace_polyline_vertices(
            &mut self,
            id: EntityId,
            vertices: Vec<PolylineVertex>,
        ) -> bool {
            match self.polyline_mut(id) {
                Some(polyline) => {
                    polyline.vertices = vertices;
                    true
                }
                None => false,
            }
        }

        /// 平移实体，返回实体是否存在。
        pub fn translate_entity(&mut self, id: EntityId, delta: Vector2) -> bool {
            match self.entity_mut(id) {
                Some(entity) => {
                    entity.translate(delta);
                    true
                }
                None => false,
            }
        }

        #[inline]
        pub fn entity_bounds(&self, id: EntityId) -> Option<Bounds2D> {
            self.entity(id).and_then(Entity::bounds)
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    fn normalize_angle(angle: f64) -> f64 {
        let mut result = angle % TAU;
        if result < 0.0 {
            result += TAU;
        }
        result
    }

    fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    fn arc_point(center: Point2, radius: f64, angle: f64) -> Point2 {
        let offset = Vector2::new(radius * angle.cos(), radius * angle.sin());
        center.translate(offset)
    }

    /// 将 `[from, to]` 角度区间（弧度，from <= to）内的圆弧纳入范围，包括经过的象限点。
    fn include_arc_span(center: Point2, radius: f64, from: f64, to: f64, bounds: &mut Bounds2D) {
        if radius <= f64::EPSILON {
            bounds.include_point(center);
            return;
        }
        bounds.include_point(arc_point(center, radius, from));
        bounds.include_point(arc_point(center, radius, to));

        let mut quadrant = (from / FRAC_PI_2).ceil();
        while quadrant * FRAC_PI_2 <= to {
            bounds.include_point(arc_point(center, radius, quadrant * FRAC_PI_2));
            quadrant += 1.0;
        }
    }

    fn polyline_bounds(polyline: &Polyline, bounds: &mut Bounds2D) {
        let vertices = &polyline.vertices;
        for vertex in vertices {
            bounds.include_point(vertex.position);
        }
        if vertices.len() < 2 {
            return;
        }
        for (index, vertex) in vertices.iter().enumerate() {
            let next = &vertices[(index + 1) % vertices.len()];
            let Some(params) = solve_arc(vertex.position, next.position, vertex.bulge) else {
                continue;
            };
            let (from, to) = if params.end_angle >= params.start_angle {
                (params.start_angle, params.end_angle)
            } else {
                (params.end_angle, params.start_angle)
            };
            include_arc_span(params.center, params.radius.abs(), from, to, bounds);
        }
    }

}
