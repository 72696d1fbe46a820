//! bulge 圆弧求解与采样。
//!
//! 约定：`bulge = tan(θ/4)`，θ 为圆弧包角；正值沿角度增大方向（逆时针）扫掠，
//! 负值沿角度减小方向（顺时针）扫掠。

use std::f64::consts::{PI, TAU};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point2, Vector2};

/// 平滑采样的固定点数（含首尾）。
pub const SMOOTH_SAMPLE_COUNT: usize = 51;

/// 分段采样的角度步长（约 10°）。
pub const SEGMENT_STEP_ANGLE: f64 = PI / 18.0;

const CHORD_EPSILON: f64 = 1e-12;

/// 由弦与 bulge 推导出的圆弧参数。`end_angle` 不做归一化，
/// `end_angle - start_angle` 的符号即扫掠方向。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcParameters {
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl ArcParameters {
    #[inline]
    pub fn sweep(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    #[inline]
    pub fn is_counter_clockwise(&self) -> bool {
        self.sweep() > 0.0
    }

    /// 圆弧上指定角度处的点。
    pub fn point_at_angle(&self, angle: f64) -> Point2 {
        let radius = self.radius.abs();
        self.center
            .translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
    }

    /// 参数 `t ∈ [0, 1]` 线性映射到起止角之间。
    pub fn point_at(&self, t: f64) -> Point2 {
        self.point_at_angle(self.start_angle + self.sweep() * t)
    }
}

/// 采样方式：平滑（固定点数，用于展示）或分段（按角度步长，用于求交）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcSampling {
    Smooth,
    Segment,
}

/// 由起点、终点与 bulge 求解圆弧参数。
///
/// bulge 为 0 或非有限值、弦长为 0 时返回 `None`，调用方应按直线处理。
pub fn solve_arc(start: Point2, end: Point2, bulge: f64) -> Option<ArcParameters> {
    if bulge == 0.0 || !bulge.is_finite() {
        return None;
    }

    let chord = end.as_vec2() - start.as_vec2();
    let distance = chord.length();
    if distance <= CHORD_EPSILON {
        return None;
    }

    let half_angle = 2.0 * bulge.abs().atan();
    let radius = distance / (2.0 * half_angle.sin());
    if !radius.is_finite() {
        return None;
    }

    let mid = (start.as_vec2() + end.as_vec2()) * 0.5;
    let normal = DVec2::new(-chord.y, chord.x) / distance * bulge.signum();
    let center = mid + normal * (radius * half_angle.cos());

    let start_angle = (start.y() - center.y).atan2(start.x() - center.x);
    let mut end_angle = (end.y() - center.y).atan2(end.x() - center.x);
    if bulge > 0.0 && end_angle < start_angle {
        end_angle += TAU;
    }
    if bulge < 0.0 && end_angle > start_angle {
        end_angle -= TAU;
    }

    Some(ArcParameters {
        center: Point2::from_vec(center),
        radius,
        start_angle,
        end_angle,
    })
}

/// 按指定方式采样圆弧；无圆弧时退化为 `[start, end]`。
/// 首尾采样点固定为 `start` 与 `end`。
pub fn sample_arc(start: Point2, end: Point2, bulge: f64, sampling: ArcSampling) -> Vec<Point2> {
    let Some(params) = solve_arc(start, end, bulge) else {
        return vec![start, end];
    };
    let steps = match sampling {
        ArcSampling::Smooth => SMOOTH_SAMPLE_COUNT - 1,
        ArcSampling::Segment => segment_step_count(&params),
    };

    let mut points: Vec<Point2> = (0..=steps)
        .map(|i| params.point_at(i as f64 / steps as f64))
        .collect();
    if let Some(first) = points.first_mut() {
        *first = start;
    }
    if let Some(last) = points.last_mut() {
        *last = end;
    }
    points
}

#[inline]
pub fn sample_smooth(start: Point2, end: Point2, bulge: f64) -> Vec<Point2> {
    sample_arc(start, end, bulge, ArcSampling::Smooth)
}

#[inline]
pub fn sample_segment(start: Point2, end: Point2, bulge: f64) -> Vec<Point2> {
    sample_arc(start, end, bulge, ArcSampling::Segment)
}

fn segment_step_count(params: &ArcParameters) -> usize {
    let steps = (params.sweep().abs() / SEGMENT_STEP_ANGLE).ceil();
    if steps.is_finite() && steps >= 1.0 {
        steps as usize
    } else {
        1
    }
}
