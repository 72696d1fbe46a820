//! 材质贴图注册表。启动时根据配置构建一次，此后只读。
//! 场景与文档中只保存 `MaterialHandle`，贴图路径在这里解析。

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use poolcad_config::{AppConfig, TextureEntry};
use poolcad_core::document::MaterialHandle;
use serde::Serialize;
use tracing::{debug, trace, warn};

const TEXTURE_ROOTS_ENV: &str = "POOLCAD_TEXTURE_ROOTS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextureAsset {
    pub handle: MaterialHandle,
    pub name: String,
    pub file: PathBuf,
    /// 找不到文件时为 `None`，条目仍然保留。
    pub resolved_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct TextureRegistry {
    assets: Vec<TextureAsset>,
    by_name: HashMap<String, MaterialHandle>,
}

impl TextureRegistry {
    /// 搜索根目录的优先级：文档所在目录、配置中的 `texture_roots`、
    /// 环境变量 `POOLCAD_TEXTURE_ROOTS`。
    pub fn from_config(base_dir: Option<&Path>, config: &AppConfig) -> Self {
        let mut roots: Vec<PathBuf> = Vec::new();

        if let Some(dir) = base_dir {
            roots.push(dir.to_path_buf());
        }

        roots.extend(
            config
                .resources
                .texture_roots
                .iter()
                .cloned()
                .filter(|path| path.is_dir()),
        );

        if let Some(env_paths) = env::var_os(TEXTURE_ROOTS_ENV) {
            roots.extend(env::split_paths(&env_paths).filter(|path| path.is_dir()));
        }

        Self::build(roots, &config.resources.textures)
    }

    pub fn build(roots: Vec<PathBuf>, entries: &[TextureEntry]) -> Self {
        // 去重，保持靠前优先级。
        let mut search_roots: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !search_roots.contains(&root) {
                search_roots.push(root);
            }
        }

        let mut registry = Self::default();
        for entry in entries {
            if registry.by_name.contains_key(&entry.name) {
                warn!(name = %entry.name, "材质名称重复，忽略后出现的条目");
                continue;
            }
            let resolved_path = resolve(&search_roots, &entry.file);
            if resolved_path.is_none() {
                warn!(name = %entry.name, file = %entry.file.display(), "未找到材质贴图文件");
            }
            let handle = MaterialHandle::new(registry.assets.len() as u32);
            registry.by_name.insert(entry.name.clone(), handle);
            registry.assets.push(TextureAsset {
                handle,
                name: entry.name.clone(),
                file: entry.file.clone(),
                resolved_path,
            });
        }
        debug!(
            textures = registry.assets.len(),
            roots = search_roots.len(),
            "材质注册表构建完成"
        );
        registry
    }

    #[inline]
    pub fn handle(&self, name: &str) -> Option<MaterialHandle> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn asset(&self, handle: MaterialHandle) -> Option<&TextureAsset> {
        self.assets.get(handle.get() as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureAsset> {
        self.assets.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

fn resolve(search_roots: &[PathBuf], file: &Path) -> Option<PathBuf> {
    if file.is_absolute() {
        return file.exists().then(|| canonicalize_or_clone(file));
    }
    search_roots.iter().find_map(|root| {
        let candidate = root.join(file);
        trace!(candidate = %candidate.display(), "材质候选路径");
        candidate.exists().then(|| canonicalize_or_clone(&candidate))
    })
}

fn canonicalize_or_clone(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
