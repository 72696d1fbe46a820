use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use poolcad_config::{AppConfig, ConfigError};
use poolcad_core::shape::ViewMode;
use poolcad_frontend::CliOptions;
use serde::Deserialize;
use serde::de::IntoDeserializer;
use serde::de::value::{Error as ValueError, StrDeserializer};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 泳池与景观布局编辑器。
#[derive(Debug, Parser)]
#[command(name = "poolcad", version, about)]
struct Args {
    /// 配置文件路径，缺省时读取 POOLCAD_CONFIG 或 ./config/default.toml。
    #[arg(long)]
    config: Option<PathBuf>,

    /// 要打开的 DXF 图纸，读取失败时报错退出且不导出。
    #[arg(long)]
    dxf: Option<PathBuf>,

    /// 覆盖配置中的视图模式（clipped 或 full）。
    #[arg(long, value_parser = parse_view_mode)]
    view_mode: Option<ViewMode>,

    /// 依次执行的命令，例如 --command "drop_item hot_tub 10 20"。
    #[arg(long = "command", short = 'c')]
    commands: Vec<String>,

    /// 将编辑后的文档导出为 DXF。
    #[arg(long)]
    export: Option<PathBuf>,

    /// 将渲染帧写为 JSON，`-` 表示标准输出。
    #[arg(long)]
    dump_render: Option<PathBuf>,
}

/// 与配置文件共用 `ViewMode` 的 serde 名称。
fn parse_view_mode(raw: &str) -> Result<ViewMode, String> {
    let deserializer: StrDeserializer<'_, ValueError> = raw.into_deserializer();
    ViewMode::deserialize(deserializer).map_err(|err| err.to_string())
}

fn main() {
    let args = Args::parse();
    let config = load_configuration(args.config.clone());
    init_logging(&config);
    info!("启动 PoolCAD");

    if let Err(err) = run(args, &config) {
        error!(error = %err, "执行失败");
        eprintln!("错误: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args, config: &AppConfig) -> anyhow::Result<()> {
    let options = CliOptions {
        dxf: args.dxf,
        view_mode: args.view_mode,
        commands: args.commands,
        export: args.export,
        dump_render: args.dump_render,
    };
    poolcad_frontend::run_cli(&options, config).context("CLI 会话失败")
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

/// 日志写到标准错误，标准输出留给概览与渲染帧。
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
