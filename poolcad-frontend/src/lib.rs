pub mod cli;
pub mod errors;
pub mod loader;
pub mod render;
pub mod textures;

use errors::FrontendError;
use poolcad_config::AppConfig;
use tracing::info;

pub use cli::CliOptions;

/// 运行一次 CLI 会话。
pub fn run_cli(options: &CliOptions, config: &AppConfig) -> Result<(), FrontendError> {
    info!(
        dxf = ?options.dxf,
        commands = options.commands.len(),
        "启动 CLI 前端"
    );
    cli::run_session(options, config)
}
