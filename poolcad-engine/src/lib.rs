pub mod catalog;
pub mod command;
pub mod editor;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, Clone, PartialEq)]
    pub enum EngineError {
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
        #[error("entity with id {0} is not a polyline")]
        NotAPolyline(u64),
        #[error("vertex index {index} out of range for {len} vertices")]
        VertexOutOfRange { index: usize, len: usize },
        #[error("depth request for vertex {index} no longer matches the shape")]
        StaleDepthRequest { index: usize },
        #[error("entity with id {0} has no open edit session")]
        NoEditSession(u64),
        #[error("unknown item kind: {0}")]
        UnknownItem(String),
    }
}

pub mod scene {
    use std::collections::{HashMap, HashSet};

    use poolcad_core::document::{Document, Entity, EntityId, MaterialHandle, Polyline};
    use poolcad_core::geometry::{Bounds2D, Point2, Vector2};
    use tracing::debug;

    use crate::catalog::ItemKind;
    use crate::editor::{DepthRequest, DepthResponse, ShapeEditor};
    use crate::errors::EngineError;

    const DEFAULT_ZOOM: f64 = 1.0;
    const MIN_ZOOM: f64 = 0.01;
    const MAX_ZOOM: f64 = 1_000.0;

    /// 记录视口状态（中心点与缩放）。
    #[derive(Debug, Clone, Copy)]
    pub struct ViewportState {
        pub center: Point2,
        pub zoom: f64,
    }

    impl ViewportState {
        #[inline]
        fn clamp_zoom(value: f64) -> f64 {
            value.clamp(MIN_ZOOM, MAX_ZOOM)
        }
    }

    impl Default for ViewportState {
        fn default() -> Self {
            Self {
                center: Point2::new(0.0, 0.0),
                zoom: DEFAULT_ZOOM,
            }
        }
    }

    /// 引擎层负责维护 `Document` 和运行时状态：选中集、视口、材质分配与轮廓编辑会话。
    #[derive(Debug)]
    pub struct Scene {
        document: Document,
        selected: HashSet<EntityId>,
        viewport: ViewportState,
        materials: HashMap<EntityId, MaterialHandle>,
        sessions: HashMap<EntityId, ShapeEditor>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct DemoEntities {
        pub boundary: EntityId,
        pub tree: EntityId,
        pub planter: EntityId,
        pub bench: EntityId,
        pub pool: EntityId,
        pub hot_tub: EntityId,
    }

    impl Scene {
        pub fn new() -> Self {
            Self {
                document: Document::new(),
                selected: HashSet::new(),
                viewport: ViewportState::default(),
                materials: HashMap::new(),
                sessions: HashMap::new(),
            }
        }

        /// 使用现有文档初始化场景。
        pub fn with_document(document: Document) -> Self {
            let mut scene = Self::new();
            scene.load_document(document);
            scene
        }

        /// 替换当前文档并重置运行时状态。
        ///
        /// 调用方只应传入完整导入成功的文档，场景不会合并部分结果。
        pub fn load_document(&mut self, document: Document) {
            self.document = document;
            self.reset_runtime_state();

            if let Some(bounds) = self.document.bounds() {
                self.viewport.center = bounds.center();
            }
            debug!(
                entities = self.document.entities().count(),
                "场景已载入新文档"
            );
        }

        fn reset_runtime_state(&mut self) {
            self.selected.clear();
            self.viewport = ViewportState::default();
            self.materials.clear();
            self.sessions.clear();
        }

        #[inline]
        pub fn selection_len(&self) -> usize {
            self.selected.len()
        }

        #[inline]
        pub fn is_selected(&self, id: EntityId) -> bool {
            self.selected.contains(&id)
        }

        /// 选中指定实体。若实体不存在则返回错误。
        pub fn select(&mut self, id: EntityId) -> Result<(), EngineError> {
            self.ensure_entity(id)?;
            self.selected.insert(id);
            Ok(())
        }

        /// 切换实体选中状态，返回切换后的状态。
        pub fn toggle_selection(&mut self, id: EntityId) -> Result<bool, EngineError> {
            self.ensure_entity(id)?;
            if !self.selected.insert(id) {
                self.selected.remove(&id);
                Ok(false)
            } else {
                Ok(true)
            }
        }

        #[inline]
        pub fn clear_selection(&mut self) {
            self.selected.clear();
        }

        #[inline]
        pub fn selection(&self) -> impl Iterator<Item = EntityId> + '_ {
            self.selected.iter().copied()
        }

        /// 返回当前选中实体的包围盒。
        pub fn selection_bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for id in &self.selected {
                if let Some(entity_bounds) = self.document.entity_bounds(*id) {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        #[inline]
        pub fn viewport(&self) -> ViewportState {
            self.viewport
        }

        pub fn pan_viewport(&mut self, delta: Vector2) {
            self.viewport.center = self.viewport.center.translate(delta);
        }

        /// 按乘法因子调整缩放，结果限制在合法范围内；非有限因子被忽略。
        pub fn scale_viewport_zoom(&mut self, factor: f64) {
            if factor.is_finite() {
                self.viewport.zoom = ViewportState::clamp_zoom(self.viewport.zoom * factor);
            }
        }

        /// 聚焦当前选中实体，若为空则退化到整个文档范围。
        pub fn focus_on_selection(&mut self) {
            let target = self.selection_bounds().or_else(|| self.document.bounds());
            if let Some(bounds) = target {
                self.viewport.center = bounds.center();
            }
        }

        #[inline]
        pub fn document(&self) -> &Document {
            &self.document
        }

        #[inline]
        pub fn document_mut(&mut self) -> &mut Document {
            &mut self.document
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.document().entity(id)
        }

        /// 在指定位置放置预定义物件，返回新实体 ID。
        pub fn drop_item(&mut self, kind: ItemKind, position: Point2) -> EntityId {
            let id = self.document.add_polyline_with_vertices(
                kind.outline_at(position),
                kind.flags(),
                kind.default_layer(),
            );
            debug!(
                item = kind.key(),
                entity = id.get(),
                x = position.x(),
                y = position.y(),
                "已放置物件"
            );
            id
        }

        /// 整体拖动实体；若实体正在编辑，同步编辑会话中的顶点。
        pub fn translate_entity(&mut self, id: EntityId, delta: Vector2) -> Result<(), EngineError> {
            if !self.document.translate_entity(id, delta) {
                return Err(EngineError::EntityNotFound(id.get()));
            }
            if let Some(editor) = self.sessions.get_mut(&id) {
                editor.translate(delta);
            }
            debug!(entity = id.get(), dx = delta.x(), dy = delta.y(), "实体已平移");
            Ok(())
        }

        /// 为实体分配材质，返回之前的材质。
        pub fn assign_material(
            &mut self,
            id: EntityId,
            handle: MaterialHandle,
        ) -> Result<Option<MaterialHandle>, EngineError> {
            self.ensure_entity(id)?;
            debug!(entity = id.get(), material = handle.get(), "已分配材质");
            Ok(self.materials.insert(id, handle))
        }

        #[inline]
        pub fn material(&self, id: EntityId) -> Option<MaterialHandle> {
            self.materials.get(&id).copied()
        }

        /// 为多段线打开编辑会话；会话已存在时保持不变。
        pub fn begin_edit(&mut self, id: EntityId) -> Result<(), EngineError> {
            if self.sessions.contains_key(&id) {
                return Ok(());
            }
            let editor = ShapeEditor::from_polyline(self.polyline(id)?);
            debug!(entity = id.get(), vertices = editor.len(), "开始编辑轮廓");
            self.sessions.insert(id, editor);
            Ok(())
        }

        /// 关闭编辑会话，返回会话之前是否存在。
        pub fn end_edit(&mut self, id: EntityId) -> bool {
            let removed = self.sessions.remove(&id).is_some();
            if removed {
                debug!(entity = id.get(), "结束编辑轮廓");
            }
            removed
        }

        #[inline]
        pub fn is_editing(&self, id: EntityId) -> bool {
            self.sessions.contains_key(&id)
        }

        #[inline]
        pub fn edit_session(&self, id: EntityId) -> Option<&ShapeEditor> {
            self.sessions.get(&id)
        }

        pub fn edit_sessions(&self) -> impl Iterator<Item = (EntityId, &ShapeEditor)> + '_ {
            self.sessions.iter().map(|(id, editor)| (*id, editor))
        }

        pub fn insert_anchor(&mut self, id: EntityId, point: Point2) -> Result<usize, EngineError> {
            self.edit_with(id, |editor| Ok(editor.insert_anchor(point)))
        }

        pub fn move_anchor(
            &mut self,
            id: EntityId,
            index: usize,
            point: Point2,
        ) -> Result<(), EngineError> {
            self.edit_with(id, |editor| editor.move_anchor(index, point))
        }

        pub fn set_depth(&mut self, id: EntityId, index: usize, depth: f64) -> Result<bool, EngineError> {
            self.edit_with(id, |editor| editor.set_depth(index, depth))
        }

        pub fn request_depth(&self, id: EntityId, index: usize) -> Result<DepthRequest, EngineError> {
            self.sessions
                .get(&id)
                .ok_or(EngineError::NoEditSession(id.get()))?
                .request_depth(index)
        }

        pub fn complete_depth(
            &mut self,
            id: EntityId,
            request: DepthRequest,
            response: DepthResponse,
        ) -> Result<bool, EngineError> {
            self.edit_with(id, |editor| editor.complete_depth(request, response))
        }

        /// 为 CLI / 快速验证填充一组示例布局，返回关键实体 ID。
        pub fn populate_demo(&mut self) -> DemoEntities {
            use std::f64::consts::FRAC_PI_2;

            self.clear_selection();

            let boundary = self.document.add_polyline(
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(200.0, 0.0),
                    Point2::new(200.0, 120.0),
                    Point2::new(0.0, 120.0),
                ],
                true,
                "LOT",
            );
            let tree = self
                .document
                .add_circle(Point2::new(170.0, 95.0), 12.0, "PLANTING");
            let planter = self.document.add_arc(
                Point2::new(40.0, 100.0),
                15.0,
                0.0,
                FRAC_PI_2,
                "PLANTING",
            );
            let bench = self.document.add_block_reference(
                "BENCH",
                Point2::new(20.0, 20.0),
                Vector2::new(1.0, 1.0),
                0.0,
                "FURNITURE",
            );
            let pool = self.drop_item(ItemKind::RectangularPool, Point2::new(80.0, 60.0));
            let hot_tub = self.drop_item(ItemKind::HotTub, Point2::new(150.0, 40.0));

            let ids = DemoEntities {
                boundary,
                tree,
                planter,
                bench,
                pool,
                hot_tub,
            };

            debug!(
                boundary = ids.boundary.get(),
                tree = ids.tree.get(),
                planter = ids.planter.get(),
                bench = ids.bench.get(),
                pool = ids.pool.get(),
                hot_tub = ids.hot_tub.get(),
                "已创建演示实体"
            );

            ids
        }

        fn ensure_entity(&self, id: EntityId) -> Result<(), EngineError> {
            match self.document.entity(id) {
                Some(_) => Ok(()),
                None => Err(EngineError::EntityNotFound(id.get())),
            }
        }

        fn polyline(&self, id: EntityId) -> Result<&Polyline, EngineError> {
            match self.document.entity(id) {
                Some(Entity::Polyline(polyline)) => Ok(polyline),
                Some(_) => Err(EngineError::NotAPolyline(id.get())),
                None => Err(EngineError::EntityNotFound(id.get())),
            }
        }

        /// 在编辑会话上执行修改，并把结果写回文档中的多段线。
        fn edit_with<T>(
            &mut self,
            id: EntityId,
            action: impl FnOnce(&mut ShapeEditor) -> Result<T, EngineError>,
        ) -> Result<T, EngineError> {
            let editor = self
                .sessions
                .get_mut(&id)
                .ok_or(EngineError::NoEditSession(id.get()))?;
            let result = action(editor)?;
            if !self.document.replace_polyline_vertices(id, editor.snapshot()) {
                return Err(EngineError::NotAPolyline(id.get()));
            }
            Ok(result)
        }
    }

    impl Default for Scene {
        fn default() -> Self {
            Self::new()
        }
    }

    #[cfg(test)]
    mod tests {
        use poolcad_core::document::Document;

        use super::*;

        #[test]
        fn demo_population_creates_entities() {
            let mut scene = Scene::new();
            let ids = scene.populate_demo();
            assert_eq!(scene.document().entities().count(), 6);
            assert!(scene.entity(ids.planter).is_some());
            assert!(scene.document().polyline(ids.pool).is_some());
            assert_eq!(
                scene.entity(ids.hot_tub).map(Entity::layer_name),
                Some("SPA")
            );
        }

        #[test]
        fn selection_operations_work() {
            let mut scene = Scene::new();
            let ids = scene.populate_demo();

            assert_eq!(scene.selection_len(), 0);
            assert!(!scene.is_selected(ids.tree));

            scene.select(ids.tree).expect("select tree");
            assert!(scene.is_selected(ids.tree));
            assert_eq!(scene.selection_len(), 1);

            let now_selected = scene
                .toggle_selection(ids.tree)
                .expect("toggle existing selection");
            assert!(!now_selected);
            assert!(!scene.is_selected(ids.tree));

            let now_selected = scene.toggle_selection(ids.tree).expect("toggle again");
            assert!(now_selected);

            scene.clear_selection();
            assert_eq!(scene.selection_len(), 0);
            assert!(scene.toggle_selection(EntityId::new(9_999)).is_err());

            let missing = EntityId::new(9_999);
            let err = scene.select(missing).unwrap_err();
            assert!(matches!(err, EngineError::EntityNotFound(9_999)));
        }

        #[test]
        fn viewport_state_clamps_zoom() {
            let mut scene = Scene::new();
            let default = scene.viewport();
            assert!((default.zoom - 1.0).abs() < f64::EPSILON);

            scene.pan_viewport(Vector2::new(10.0, -5.0));
            scene.pan_viewport(Vector2::new(5.0, 5.0));
            assert_eq!(scene.viewport().center, Point2::new(15.0, 0.0));

            scene.scale_viewport_zoom(0.0001);
            assert!((scene.viewport().zoom - MIN_ZOOM).abs() < f64::EPSILON);

            scene.scale_viewport_zoom(1e9);
            assert!((scene.viewport().zoom - MAX_ZOOM).abs() < f64::EPSILON);

            scene.scale_viewport_zoom(0.002);
            scene.scale_viewport_zoom(0.5);
            assert!((scene.viewport().zoom - 1.0).abs() < 1e-9);
            scene.scale_viewport_zoom(f64::NAN);
            assert!((scene.viewport().zoom - 1.0).abs() < 1e-9);
        }

        #[test]
        fn focus_on_selection_recenters_viewport() {
            let mut scene = Scene::new();
            let ids = scene.populate_demo();
            scene.select(ids.tree).unwrap();
            scene.select(ids.bench).unwrap();

            scene.focus_on_selection();
            let viewport = scene.viewport();
            assert!((viewport.center.x() - 101.0).abs() < 1e-9);
            assert!((viewport.center.y() - 63.5).abs() < 1e-9);

            scene.clear_selection();
            scene.focus_on_selection();
            let viewport_all = scene.viewport();
            assert!((viewport_all.center.x() - 100.0).abs() < 1e-9);
            assert!((viewport_all.center.y() - 60.0).abs() < 1e-9);
        }

        #[test]
        fn load_document_resets_state_and_recenters_viewport() {
            let mut scene = Scene::new();
            let ids = scene.populate_demo();
            scene.select(ids.tree).unwrap();
            scene.begin_edit(ids.pool).unwrap();
            scene
                .assign_material(ids.pool, MaterialHandle::new(1))
                .unwrap();
            scene.scale_viewport_zoom(42.0);

            let mut document = Document::new();
            document.add_line(Point2::new(-10.0, -10.0), Point2::new(0.0, 10.0), "GEOM");
            document.add_circle(Point2::new(10.0, 0.0), 5.0, "GEOM");

            scene.load_document(document);

            assert_eq!(scene.selection_len(), 0);
            assert_eq!(scene.edit_sessions().count(), 0);
            assert!(scene.material(ids.pool).is_none());
            assert_eq!(scene.document().entities().count(), 2);

            let viewport = scene.viewport();
            let expected_center = scene
                .document()
                .bounds()
                .expect("document should have bounds")
                .center();
            assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
            assert!((viewport.center.x() - expected_center.x()).abs() < 1e-9);
            assert!((viewport.center.y() - expected_center.y()).abs() < 1e-9);
        }

        #[test]
        fn dropped_items_get_fresh_ids_and_translated_outlines() {
            let mut scene = Scene::new();
            let first = scene.drop_item(ItemKind::RectangularPool, Point2::new(10.0, 10.0));
            let second = scene.drop_item(ItemKind::RectangularPool, Point2::new(10.0, 10.0));
            assert_ne!(first, second);

            let polyline = scene.document().polyline(first).expect("pool");
            assert!(polyline.is_closed());
            assert_eq!(polyline.layer, "POOL");
            assert_eq!(polyline.vertices[0].position, Point2::new(-40.0, -20.0));
        }

        #[test]
        fn edit_session_writes_back_to_document() {
            let mut scene = Scene::new();
            let ids = scene.populate_demo();

            let err = scene.insert_anchor(ids.pool, Point2::new(0.0, 0.0)).unwrap_err();
            assert_eq!(err, EngineError::NoEditSession(ids.pool.get()));
            assert_eq!(
                scene.begin_edit(ids.tree).unwrap_err(),
                EngineError::NotAPolyline(ids.tree.get())
            );
            assert_eq!(
                scene.begin_edit(EntityId::new(404)).unwrap_err(),
                EngineError::EntityNotFound(404)
            );

            scene.begin_edit(ids.pool).expect("begin edit");
            assert!(scene.is_editing(ids.pool));

            // 泳池底边 (30,30)-(130,30) 的中点
            let index = scene
                .insert_anchor(ids.pool, Point2::new(80.0, 30.0))
                .expect("insert");
            assert_eq!(index, 1);
            assert_eq!(scene.document().polyline(ids.pool).unwrap().vertices.len(), 5);

            scene
                .move_anchor(ids.pool, 1, Point2::new(80.0, 25.0))
                .expect("move");
            assert!(scene.set_depth(ids.pool, 1, 2.0).expect("depth"));

            let request = scene.request_depth(ids.pool, 0).expect("request");
            assert!(!scene
                .complete_depth(ids.pool, request, DepthResponse::Cancelled)
                .expect("cancel"));

            let polyline = scene.document().polyline(ids.pool).unwrap();
            assert_eq!(polyline.vertices[1].position, Point2::new(80.0, 25.0));
            assert_eq!(polyline.vertices[1].z, Some(-2.0));
            assert!(polyline.vertices[0].z.is_none());

            assert!(scene.end_edit(ids.pool));
            assert!(!scene.end_edit(ids.pool));
        }

        #[test]
        fn translating_an_edited_entity_keeps_session_in_sync() {
            let mut scene = Scene::new();
            let id = scene.drop_item(ItemKind::HotTub, Point2::new(0.0, 0.0));
            scene.begin_edit(id).unwrap();
            scene.translate_entity(id, Vector2::new(5.0, -5.0)).unwrap();

            let session = scene.edit_session(id).expect("session");
            let document = scene.document().polyline(id).expect("polyline");
            assert_eq!(session.vertices(), document.vertices.as_slice());
            assert_eq!(document.vertices[0].position, Point2::new(-15.0, -5.0));

            assert_eq!(
                scene.translate_entity(EntityId::new(77), Vector2::new(1.0, 1.0)),
                Err(EngineError::EntityNotFound(77))
            );
        }

        #[test]
        fn materials_are_tracked_per_entity() {
            let mut scene = Scene::new();
            let ids = scene.populate_demo();
            assert_eq!(
                scene.assign_material(ids.pool, MaterialHandle::new(3)),
                Ok(None)
            );
            assert_eq!(
                scene.assign_material(ids.pool, MaterialHandle::new(4)),
                Ok(Some(MaterialHandle::new(3)))
            );
            assert_eq!(scene.material(ids.pool), Some(MaterialHandle::new(4)));
            assert!(scene.material(ids.hot_tub).is_none());
            assert!(scene
                .assign_material(EntityId::new(999), MaterialHandle::new(1))
                .is_err());
        }
    }
}
