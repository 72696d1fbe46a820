use std::path::PathBuf;

use poolcad_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("导入 DXF {path:?} 失败: {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("导出 DXF 失败: {0}")]
    Export(#[from] IoError),
    #[error("写入渲染帧 {path:?} 失败: {source}")]
    WriteFrame {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("渲染帧序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("输出失败: {0}")]
    Output(#[from] std::io::Error),
}
