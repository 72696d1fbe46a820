use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use poolcad_core::document::Document;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

mod reader;
mod writer;

pub use writer::{write_document, write_to_string};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 导入时被跳过的实体：缺少必需字段、数值无法解析或类型不受支持。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntity {
    pub kind: String,
    pub reason: String,
}

/// 一次完整导入的结果。只有整份文件结构有效时才会产生，
/// 单个实体的问题记录在 `skipped` 中而不会中断导入。
#[derive(Debug)]
pub struct ImportOutcome {
    pub document: Document,
    pub skipped: Vec<SkippedEntity>,
}

impl ImportOutcome {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 解析内存中的 DXF 文本。
    pub fn parse_str(&self, source: &str) -> Result<ImportOutcome, IoError> {
        reader::parse(source).map_err(IoError::InvalidDocument)
    }

    /// 读取文件并返回包含跳过记录的完整结果。
    pub fn import(&self, path: &Path) -> Result<ImportOutcome, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let outcome = self.parse_str(&data)?;
        info!(
            path = %path.display(),
            entities = outcome.document.entities().count(),
            skipped = outcome.skipped.len(),
            "DXF 导入完成"
        );
        Ok(outcome)
    }
}

impl Default for DxfFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        self.import(path).map(|outcome| outcome.document)
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let write_error = |source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(write_error)?;
        let mut writer = BufWriter::new(file);
        write_document(document, &mut writer).map_err(write_error)?;
        writer.flush().map_err(write_error)?;
        info!(
            path = %path.display(),
            entities = document.entities().count(),
            "DXF 导出完成"
        );
        Ok(())
    }
}
