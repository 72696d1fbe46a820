use std::env;
use std::path::{Path, PathBuf};

use poolcad_config::AppConfig;
use poolcad_engine::catalog::ItemKind;
use poolcad_engine::scene::{DemoEntities, Scene};
use poolcad_io::{DxfFacade, IoError, SkippedEntity};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::textures::TextureRegistry;

const SAMPLE_DXF_ENV: &str = "POOLCAD_SAMPLE_DXF";

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Dxf(PathBuf),
    Demo,
}

/// 统一封装加载后的场景与元信息。
#[derive(Debug)]
pub struct LoadedScene {
    pub scene: Scene,
    pub source: DocumentSource,
    pub demo_entities: Option<DemoEntities>,
    pub skipped: Vec<SkippedEntity>,
    pub textures: TextureRegistry,
    /// 环境变量指定的 DXF 读取失败、回退到示例时的错误信息。
    pub fallback_reason: Option<String>,
}

/// 优先读取显式路径，其次是环境变量 `POOLCAD_SAMPLE_DXF` 指定的 DXF，都没有时使用内置示例。
///
/// 显式路径导入失败直接返回错误；环境变量路径失败时回退到示例并记录原因。
/// 导入失败不会带入半成品文档。
pub fn load_scene(explicit: Option<&Path>, config: &AppConfig) -> Result<LoadedScene, FrontendError> {
    if let Some(path) = explicit {
        return import_scene(path, config).map_err(|source| FrontendError::Import {
            path: path.to_path_buf(),
            source,
        });
    }

    if let Some(path) = env::var_os(SAMPLE_DXF_ENV).map(PathBuf::from) {
        match import_scene(&path, config) {
            Ok(loaded) => return Ok(loaded),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载示例 DXF 失败，回退到内置示例");
                let mut loaded = load_demo(config);
                loaded.fallback_reason = Some(format!("{}: {err}", path.display()));
                return Ok(loaded);
            }
        }
    }

    Ok(load_demo(config))
}

fn import_scene(path: &Path, config: &AppConfig) -> Result<LoadedScene, IoError> {
    let outcome = DxfFacade::new().import(path)?;
    info!(path = %path.display(), "从 DXF 加载文档成功");
    let mut scene = Scene::new();
    scene.load_document(outcome.document);
    Ok(LoadedScene {
        scene,
        textures: TextureRegistry::from_config(path.parent(), config),
        source: DocumentSource::Dxf(path.to_path_buf()),
        demo_entities: None,
        skipped: outcome.skipped,
        fallback_reason: None,
    })
}

pub fn load_demo(config: &AppConfig) -> LoadedScene {
    let textures = TextureRegistry::from_config(None, config);
    let mut scene = Scene::new();
    let demo_entities = scene.populate_demo();

    for (id, kind) in [
        (demo_entities.pool, ItemKind::RectangularPool),
        (demo_entities.hot_tub, ItemKind::HotTub),
    ] {
        let material = kind
            .default_material()
            .or(config.resources.default_material.as_deref())
            .and_then(|name| textures.handle(name));
        if let Some(handle) = material {
            if let Err(err) = scene.assign_material(id, handle) {
                warn!(entity = id.get(), error = %err, "分配默认材质失败");
            }
        }
    }

    // 选中两个水景后聚焦。
    for id in [demo_entities.pool, demo_entities.hot_tub] {
        if let Err(err) = scene.select(id) {
            warn!(entity = id.get(), error = %err, "选中示例实体失败");
        }
    }
    scene.focus_on_selection();

    LoadedScene {
        scene,
        source: DocumentSource::Demo,
        demo_entities: Some(demo_entities),
        skipped: Vec::new(),
        textures,
        fallback_reason: None,
    }
}
