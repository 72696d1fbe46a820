//! 单个多段线轮廓的交互编辑状态。
//!
//! 编辑器持有顶点序列的所有权；每次修改都会整体替换顶点序列，
//! 再把新状态的只读切片广播给监听者。

use std::fmt;

use poolcad_core::document::{Polyline, PolylineVertex};
use poolcad_core::geometry::{Point2, Vector2};
use poolcad_core::shape::{self, AnchorLabel, EdgeLabel, ViewMode};
use tracing::debug;

use crate::errors::EngineError;

/// 顶点变化监听者。闭包 `FnMut(&[PolylineVertex])` 可直接作为监听者使用。
pub trait ShapeListener {
    fn vertices_changed(&mut self, vertices: &[PolylineVertex]);
}

impl<F> ShapeListener for F
where
    F: FnMut(&[PolylineVertex]),
{
    fn vertices_changed(&mut self, vertices: &[PolylineVertex]) {
        self(vertices)
    }
}

/// 一次待完成的深度输入请求。
///
/// 请求记录发起时的顶点数量，顶点数量变化后请求即失效。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRequest {
    index: usize,
    vertex_count: usize,
    current: Option<f64>,
}

impl DepthRequest {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// 发起请求时顶点已有的 z 值，用于输入框预填。
    #[inline]
    pub fn current_depth(&self) -> Option<f64> {
        self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthResponse {
    Entered(f64),
    Cancelled,
}

pub struct ShapeEditor {
    vertices: Vec<PolylineVertex>,
    closed: bool,
    listener: Option<Box<dyn ShapeListener>>,
}

impl fmt::Debug for ShapeEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeEditor")
            .field("vertices", &self.vertices)
            .field("closed", &self.closed)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl ShapeEditor {
    pub fn new(vertices: Vec<PolylineVertex>, closed: bool) -> Self {
        Self {
            vertices,
            closed,
            listener: None,
        }
    }

    pub fn from_polyline(polyline: &Polyline) -> Self {
        Self::new(polyline.vertices.clone(), polyline.is_closed())
    }

    /// 设置唯一的监听者，替换之前的监听者。
    pub fn set_listener<L>(&mut self, listener: L)
    where
        L: ShapeListener + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    #[inline]
    pub fn vertices(&self) -> &[PolylineVertex] {
        &self.vertices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 当前顶点的独立副本。
    pub fn snapshot(&self) -> Vec<PolylineVertex> {
        self.vertices.clone()
    }

    /// 在距离最近的边（循环）之后插入锚点，返回新顶点的索引。
    pub fn insert_anchor(&mut self, point: Point2) -> usize {
        let index = match shape::nearest_edge(&self.vertices, point) {
            Some(edge) => edge + 1,
            None => 0,
        };
        let mut next = self.vertices.clone();
        next.insert(index, PolylineVertex::new(point));
        debug!(index, x = point.x(), y = point.y(), "插入锚点");
        self.commit(next);
        index
    }

    /// 移动锚点，保留该顶点的 bulge 与 z。
    pub fn move_anchor(&mut self, index: usize, point: Point2) -> Result<(), EngineError> {
        self.check_index(index)?;
        let mut next = self.vertices.clone();
        next[index].position = point;
        self.commit(next);
        Ok(())
    }

    /// 设置顶点深度，存储为 `z = -|depth|`。
    ///
    /// 深度为 0 或非有限值时不做修改，返回 `Ok(false)`。
    pub fn set_depth(&mut self, index: usize, depth: f64) -> Result<bool, EngineError> {
        self.check_index(index)?;
        if depth == 0.0 || !depth.is_finite() {
            return Ok(false);
        }
        let mut next = self.vertices.clone();
        next[index].z = Some(-depth.abs());
        debug!(index, depth, "更新顶点深度");
        self.commit(next);
        Ok(true)
    }

    pub fn request_depth(&self, index: usize) -> Result<DepthRequest, EngineError> {
        self.check_index(index)?;
        Ok(DepthRequest {
            index,
            vertex_count: self.vertices.len(),
            current: self.vertices[index].z,
        })
    }

    /// 完成深度输入。取消时顶点保持不变，返回是否发生修改。
    pub fn complete_depth(
        &mut self,
        request: DepthRequest,
        response: DepthResponse,
    ) -> Result<bool, EngineError> {
        if request.vertex_count != self.vertices.len() || request.index >= self.vertices.len() {
            return Err(EngineError::StaleDepthRequest {
                index: request.index,
            });
        }
        match response {
            DepthResponse::Entered(depth) => self.set_depth(request.index, depth),
            DepthResponse::Cancelled => {
                debug!(index = request.index, "深度输入已取消");
                Ok(false)
            }
        }
    }

    /// 整体平移所有顶点（实体被拖动时同步编辑状态）。
    pub fn translate(&mut self, delta: Vector2) {
        let next = self
            .vertices
            .iter()
            .map(|vertex| PolylineVertex {
                position: vertex.position.translate(delta),
                ..*vertex
            })
            .collect();
        self.commit(next);
    }

    pub fn points(&self, mode: ViewMode) -> Vec<Point2> {
        shape::generate_points(&self.vertices, mode)
    }

    pub fn flat_points(&self, mode: ViewMode) -> Vec<f64> {
        shape::generate_flat(&self.vertices, mode)
    }

    pub fn anchors(&self) -> Vec<AnchorLabel> {
        shape::anchor_labels(&self.vertices)
    }

    pub fn edge_labels(&self) -> Vec<EdgeLabel> {
        shape::edge_labels(&self.vertices)
    }

    fn check_index(&self, index: usize) -> Result<(), EngineError> {
        if index < self.vertices.len() {
            Ok(())
        } else {
            Err(EngineError::VertexOutOfRange {
                index,
                len: self.vertices.len(),
            })
        }
    }

    fn commit(&mut self, vertices: Vec<PolylineVertex>) {
        self.vertices = vertices;
        if let Some(listener) = self.listener.as_mut() {
            listener.vertices_changed(&self.vertices);
        }
    }
}
