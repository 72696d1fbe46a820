use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use poolcad_core::shape::ViewMode;
use serde::Deserialize;
use thiserror::Error;

/// 指向配置文件的环境变量。
pub const CONFIG_ENV: &str = "POOLCAD_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `POOLCAD_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(&cwd)
    }

    /// 在给定目录下寻找 `config/default.toml`。
    pub fn discover_in(dir: &Path) -> Result<Self, ConfigError> {
        let default_path = dir.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 画布与编辑相关选项。
#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub view_mode: ViewMode,
    /// 导入图纸的 Y 轴向下翻转以适配画布坐标。
    #[serde(default = "EditorConfig::default_flip_y")]
    pub flip_y: bool,
}

impl EditorConfig {
    fn default_flip_y() -> bool {
        true
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::default(),
            flip_y: Self::default_flip_y(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub texture_roots: Vec<PathBuf>,
    #[serde(default)]
    pub textures: Vec<TextureEntry>,
    #[serde(default)]
    pub default_material: Option<String>,
}

/// 材质贴图条目，`file` 相对于搜索根目录解析。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextureEntry {
    pub name: String,
    pub file: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cfg = AppConfig::discover_in(dir.path()).expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.editor.view_mode, ViewMode::Clipped);
        assert!(cfg.editor.flip_y);
        assert!(cfg.resources.texture_roots.is_empty());
        assert!(cfg.resources.textures.is_empty());
        assert!(cfg.resources.default_material.is_none());
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [editor]
            view_mode = "full"
            flip_y = false

            [resources]
            texture_roots = ["../assets", "../textures"]
            default_material = "pool_water"

            [[resources.textures]]
            name = "pool_water"
            file = "water/pool.png"

            [[resources.textures]]
            name = "decking"
            file = "wood/deck.jpg"
            "#
        )
        .expect("write config");

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.editor.view_mode, ViewMode::Full);
        assert!(!cfg.editor.flip_y);
        assert_eq!(cfg.resources.texture_roots.len(), 2);
        assert_eq!(cfg.resources.default_material.as_deref(), Some("pool_water"));
        assert_eq!(
            cfg.resources.textures[1],
            TextureEntry {
                name: "decking".to_string(),
                file: PathBuf::from("wood/deck.jpg"),
            }
        );
    }

    #[test]
    fn discover_reads_config_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir(dir.path().join("config")).expect("create config dir");
        fs::write(
            dir.path().join("config").join("default.toml"),
            "[editor]\nview_mode = \"full\"\n",
        )
        .expect("write config");

        let cfg = AppConfig::discover_in(dir.path()).expect("discover");
        assert_eq!(cfg.editor.view_mode, ViewMode::Full);
        // 未出现的段落保持默认值
        assert!(cfg.editor.flip_y);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn unknown_view_mode_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[editor]\nview_mode = \"wireframe\"").expect("write config");
        let err = AppConfig::from_file(file.path()).expect_err("invalid view mode");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("解析配置文件"));
    }

    #[test]
    fn missing_explicit_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
