//! 曲线多段线的点生成与编辑辅助查询。

use serde::{Deserialize, Serialize};

use crate::bulge::{ArcSampling, sample_arc, sample_segment};
use crate::document::PolylineVertex;
use crate::geometry::Point2;
use crate::intersect::resolve_joint;

/// 渲染密度：`Clipped` 用于交互编辑（粗采样），`Full` 用于展示预览（平滑采样）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Clipped,
    Full,
}

impl ViewMode {
    #[inline]
    pub fn sampling(self) -> ArcSampling {
        match self {
            ViewMode::Clipped => ArcSampling::Segment,
            ViewMode::Full => ArcSampling::Smooth,
        }
    }
}

/// 顶点上方的锚点标注（原始 x/y/z，不经过采样）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnchorLabel {
    pub index: usize,
    pub position: Point2,
    pub z: Option<f64>,
}

/// 边长标注，位于弦的中点。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeLabel {
    pub start_index: usize,
    pub midpoint: Point2,
    pub length: f64,
}

/// 将顶点序列展开为连续轮廓点。
///
/// 每个带 bulge 的顶点先用分段采样求出与下一条边在共享顶点处的交点；
/// 求得交点时该边只输出这一个交点，否则按视图模式输出整段圆弧采样。
/// 末段弦与下一段首段弦共享顶点，因此只有两者共线时圆弧才会被完整保留。
/// 邻接关系总是循环的 `(i, i+1 mod n)`，与闭合标志无关。
pub fn generate_points(vertices: &[PolylineVertex], mode: ViewMode) -> Vec<Point2> {
    let len = vertices.len();
    if len < 2 {
        return vertices.iter().map(|vertex| vertex.position).collect();
    }

    let joints: Vec<Option<Point2>> = (0..len).map(|index| joint_at(vertices, index)).collect();

    let mut points = Vec::with_capacity(len);
    for (index, vertex) in vertices.iter().enumerate() {
        if !vertex.has_bulge() {
            points.push(vertex.position);
            continue;
        }
        if let Some(joint) = joints[index] {
            points.push(joint);
            continue;
        }
        let next = &vertices[(index + 1) % len];
        points.extend(sample_arc(
            vertex.position,
            next.position,
            vertex.bulge,
            mode.sampling(),
        ));
    }
    points
}

/// 生成并展开为 `[x0, y0, x1, y1, ...]`。
pub fn generate_flat(vertices: &[PolylineVertex], mode: ViewMode) -> Vec<f64> {
    flatten(&generate_points(vertices, mode))
}

pub fn flatten(points: &[Point2]) -> Vec<f64> {
    points
        .iter()
        .flat_map(|point| [point.x(), point.y()])
        .collect()
}

fn joint_at(vertices: &[PolylineVertex], index: usize) -> Option<Point2> {
    let vertex = &vertices[index];
    if !vertex.has_bulge() {
        return None;
    }
    let len = vertices.len();
    let next = &vertices[(index + 1) % len];
    let after = &vertices[(index + 2) % len];
    let current = sample_segment(vertex.position, next.position, vertex.bulge);
    let following = sample_segment(next.position, after.position, next.bulge);
    resolve_joint(&current, &following)
}

/// 点到线段（夹紧到端点）的距离；退化线段按点距计算。
pub fn point_to_segment_distance(point: Point2, start: Point2, end: Point2) -> f64 {
    let segment = end.as_vec2() - start.as_vec2();
    let length_squared = segment.length_squared();
    if length_squared <= f64::EPSILON {
        return point.distance(start);
    }
    let t = (point.as_vec2() - start.as_vec2()).dot(segment) / length_squared;
    let closest = start.as_vec2() + segment * t.clamp(0.0, 1.0);
    point.as_vec2().distance(closest)
}

/// 距离点最近的循环边起点索引；距离相同时取第一条。
pub fn nearest_edge(vertices: &[PolylineVertex], point: Point2) -> Option<usize> {
    let len = vertices.len();
    let mut best: Option<(usize, f64)> = None;
    for (index, vertex) in vertices.iter().enumerate() {
        let next = &vertices[(index + 1) % len];
        let distance = point_to_segment_distance(point, vertex.position, next.position);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

pub fn anchor_labels(vertices: &[PolylineVertex]) -> Vec<AnchorLabel> {
    vertices
        .iter()
        .enumerate()
        .map(|(index, vertex)| AnchorLabel {
            index,
            position: vertex.position,
            z: vertex.z,
        })
        .collect()
}

pub fn edge_labels(vertices: &[PolylineVertex]) -> Vec<EdgeLabel> {
    let len = vertices.len();
    if len < 2 {
        return Vec::new();
    }
    vertices
        .iter()
        .enumerate()
        .map(|(index, vertex)| {
            let next = &vertices[(index + 1) % len];
            EdgeLabel {
                start_index: index,
                midpoint: vertex.position.midpoint(next.position),
                length: vertex.position.distance(next.position),
            }
        })
        .collect()
}
