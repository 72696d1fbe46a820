//! 可拖放到图纸上的预定义物件。轮廓以原点为中心，放置时整体平移。

use std::fmt;
use std::str::FromStr;

use poolcad_core::document::{PolylineFlags, PolylineVertex};
use poolcad_core::geometry::{Point2, Vector2};

use crate::errors::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    RectangularPool,
    HotTub,
    FreeformPool,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [
        ItemKind::RectangularPool,
        ItemKind::HotTub,
        ItemKind::FreeformPool,
    ];

    /// 命令行与配置中使用的标识。
    pub fn key(self) -> &'static str {
        match self {
            ItemKind::RectangularPool => "rectangular_pool",
            ItemKind::HotTub => "hot_tub",
            ItemKind::FreeformPool => "freeform_pool",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ItemKind::RectangularPool => "矩形泳池",
            ItemKind::HotTub => "按摩浴缸",
            ItemKind::FreeformPool => "自由形泳池",
        }
    }

    pub fn default_layer(self) -> &'static str {
        match self {
            ItemKind::RectangularPool | ItemKind::FreeformPool => "POOL",
            ItemKind::HotTub => "SPA",
        }
    }

    /// 默认材质名，由渲染层的贴图注册表解析。
    pub fn default_material(self) -> Option<&'static str> {
        match self {
            ItemKind::RectangularPool | ItemKind::FreeformPool => Some("pool_water"),
            ItemKind::HotTub => Some("spa_water"),
        }
    }

    #[inline]
    pub fn flags(self) -> PolylineFlags {
        PolylineFlags::closed()
    }

    pub fn outline(self) -> Vec<PolylineVertex> {
        match self {
            ItemKind::RectangularPool => vec![
                PolylineVertex::at(-50.0, -30.0),
                PolylineVertex::at(50.0, -30.0),
                PolylineVertex::at(50.0, 30.0),
                PolylineVertex::at(-50.0, 30.0),
            ],
            // bulge = 1 的两段半圆组成整圆
            ItemKind::HotTub => vec![
                PolylineVertex::with_bulge(Point2::new(-20.0, 0.0), 1.0),
                PolylineVertex::with_bulge(Point2::new(20.0, 0.0), 1.0),
            ],
            ItemKind::FreeformPool => vec![
                PolylineVertex::with_bulge(Point2::new(-60.0, -10.0), 0.45),
                PolylineVertex::at(-15.0, -35.0),
                PolylineVertex::with_bulge(Point2::new(35.0, -30.0), 0.6),
                PolylineVertex::at(55.0, 15.0),
                PolylineVertex::with_bulge(Point2::new(20.0, 30.0), -0.35),
                PolylineVertex::with_bulge(Point2::new(-35.0, 25.0), 0.5),
            ],
        }
    }

    /// 平移到放置位置后的轮廓。
    pub fn outline_at(self, position: Point2) -> Vec<PolylineVertex> {
        let offset = Vector2::from_points(Point2::new(0.0, 0.0), position);
        self.outline()
            .into_iter()
            .map(|vertex| PolylineVertex {
                position: vertex.position.translate(offset),
                ..vertex
            })
            .collect()
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ItemKind {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.key() == normalized)
            .ok_or_else(|| EngineError::UnknownItem(value.to_string()))
    }
}
