use crate::geometry::Point2;

/// 平行判定与参数边界使用的容差。
pub const INTERSECTION_TOLERANCE: f64 = 1e-10;

/// 有界线段求交：`a0-a1` 与 `b0-b1`，两侧参数都限制在 `[0, 1]`。
/// 平行或共线时返回 `None`。
pub fn segment_intersection(a0: Point2, a1: Point2, b0: Point2, b1: Point2) -> Option<Point2> {
    let da = a1.as_vec2() - a0.as_vec2();
    let db = b1.as_vec2() - b0.as_vec2();

    let cross = da.perp_dot(db);
    if cross.abs() < INTERSECTION_TOLERANCE {
        return None;
    }

    let offset = b0.as_vec2() - a0.as_vec2();
    let t = offset.perp_dot(db) / cross;
    let u = offset.perp_dot(da) / cross;

    let range = -INTERSECTION_TOLERANCE..=1.0 + INTERSECTION_TOLERANCE;
    if range.contains(&t) && range.contains(&u) {
        Some(Point2::from_vec(a0.as_vec2() + da * t.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// 相邻两段采样在共享顶点处的交点：取前一段的最后两个点与后一段的前两个点。
/// 任一采样不足两个点时返回 `None`。
pub fn resolve_joint(prev: &[Point2], next: &[Point2]) -> Option<Point2> {
    let [.., tail_start, tail_end] = prev else {
        return None;
    };
    let [head_start, head_end, ..] = next else {
        return None;
    };
    segment_intersection(*tail_start, *tail_end, *head_start, *head_end)
}
