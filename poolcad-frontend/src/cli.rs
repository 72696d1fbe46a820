use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use poolcad_config::AppConfig;
use poolcad_core::document::Entity;
use poolcad_core::geometry::Point2;
use poolcad_core::shape::ViewMode;
use poolcad_engine::command::{CommandBus, CommandContext, CommandRequest, CommandResponse};
use poolcad_io::{DocumentSaver, DxfFacade};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, LoadedScene, load_scene};
use crate::render::{RenderOptions, build_frame, write_frame};

/// 一次 CLI 会话的输入。
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub dxf: Option<PathBuf>,
    pub view_mode: Option<ViewMode>,
    /// 依次执行的命令行，例如 `drop_item hot_tub 10 20`。
    pub commands: Vec<String>,
    pub export: Option<PathBuf>,
    /// 渲染帧输出路径，`-` 表示标准输出。
    pub dump_render: Option<PathBuf>,
}

/// 加载场景、执行命令、打印概览，并按需导出 DXF 与渲染帧。
///
/// 显式指定的 DXF 导入失败时只打印错误并返回，不执行命令也不导出。
pub fn run_session(options: &CliOptions, config: &AppConfig) -> Result<(), FrontendError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut loaded = match load_scene(options.dxf.as_deref(), config) {
        Ok(loaded) => loaded,
        Err(err) => {
            write_import_failure(&mut out, &err)?;
            return Err(err);
        }
    };
    let bus = CommandBus::new();
    let dump_to_stdout = options
        .dump_render
        .as_deref()
        .is_some_and(|path| path == Path::new("-"));

    // 渲染帧写入标准输出时，概览改写到标准错误，保证输出是合法 JSON。
    if dump_to_stdout {
        let stderr = io::stderr();
        let mut err = stderr.lock();
        run_commands(&bus, &mut loaded, &options.commands, &mut err)?;
        write_summary(&mut err, &loaded, &bus)?;
    } else {
        run_commands(&bus, &mut loaded, &options.commands, &mut out)?;
        write_summary(&mut out, &loaded, &bus)?;
    }

    if let Some(path) = &options.export {
        DxfFacade::new().save(loaded.scene.document(), path)?;
        if !dump_to_stdout {
            writeln!(out, "已导出 DXF：{}", path.display())?;
        }
    }

    if let Some(path) = &options.dump_render {
        let render_options = RenderOptions {
            view_mode: options.view_mode.unwrap_or(config.editor.view_mode),
            flip_y: config.editor.flip_y,
        };
        let frame = build_frame(&loaded.scene, &loaded.textures, render_options);
        if dump_to_stdout {
            write_frame(&frame, &mut out)?;
            writeln!(out)?;
        } else {
            let file = File::create(path).map_err(|source| FrontendError::WriteFrame {
                path: path.clone(),
                source,
            })?;
            let mut writer = BufWriter::new(file);
            write_frame(&frame, &mut writer)?;
            writer.flush().map_err(|source| FrontendError::WriteFrame {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "渲染帧已写出");
            writeln!(out, "已写出渲染帧：{}", path.display())?;
        }
    }

    Ok(())
}

/// 依次执行命令，失败的命令只打印原因，不会中断会话。
/// 结束后聚焦选中集，除非命令已经平移过视口。
pub fn run_commands<W: Write>(
    bus: &CommandBus,
    loaded: &mut LoadedScene,
    commands: &[String],
    out: &mut W,
) -> io::Result<usize> {
    let mut context = CommandContext {
        scene: &mut loaded.scene,
    };
    let mut failures = 0;
    let mut panned = false;
    for line in commands {
        let Some(request) = CommandRequest::parse_line(line) else {
            continue;
        };
        let response = bus.dispatch(&request, &mut context);
        report(out, &request, &response)?;
        if !response.success {
            failures += 1;
            warn!(command = %request.name, "CLI 命令执行失败");
        } else if request.name == "pan" {
            panned = true;
        }
    }
    if panned {
        return Ok(failures);
    }

    let focus = bus.dispatch(&CommandRequest::new("focus_selection", Vec::<String>::new()), &mut context);
    if !focus.success {
        warn!("聚焦选中集失败");
    }
    Ok(failures)
}

fn write_import_failure<W: Write>(out: &mut W, err: &FrontendError) -> io::Result<()> {
    writeln!(out, "PoolCAD 布局编辑器")?;
    writeln!(out, "{err}")?;
    writeln!(out, "未执行命令，也未导出任何文件。")
}

fn report<W: Write>(out: &mut W, request: &CommandRequest, response: &CommandResponse) -> io::Result<()> {
    let status = if response.success { "成功" } else { "失败" };
    match &response.message {
        Some(message) => writeln!(out, "[命令] {} {status}: {message}", request.name),
        None => writeln!(out, "[命令] {} {status}", request.name),
    }
}

pub fn write_summary<W: Write>(out: &mut W, loaded: &LoadedScene, bus: &CommandBus) -> io::Result<()> {
    let scene = &loaded.scene;
    let document = scene.document();

    let mut commands: Vec<&str> = bus.available_commands().copied().collect();
    commands.sort_unstable();
    writeln!(out, "PoolCAD 布局编辑器")?;
    writeln!(out, "支持的命令: {}", commands.join(", "))?;

    match &loaded.source {
        DocumentSource::Dxf(path) => {
            writeln!(out, "已从 DXF 加载文档：{}", path.display())?;
        }
        DocumentSource::Demo => {
            if let Some(reason) = &loaded.fallback_reason {
                writeln!(out, "导入 DXF 失败，已回退到内置示例：{reason}")?;
            }
            if let Some(ids) = &loaded.demo_entities {
                writeln!(out, "已构建内置示例布局：")?;
                writeln!(out, "  - 地块边界 ID = {}", ids.boundary.get())?;
                writeln!(out, "  - 树木 ID = {}", ids.tree.get())?;
                writeln!(out, "  - 花池 ID = {}", ids.planter.get())?;
                writeln!(out, "  - 长椅 ID = {}", ids.bench.get())?;
                writeln!(out, "  - 泳池 ID = {}", ids.pool.get())?;
                writeln!(out, "  - 热水池 ID = {}", ids.hot_tub.get())?;
            }
        }
    }
    if !loaded.skipped.is_empty() {
        writeln!(out, "导入时跳过 {} 个实体：", loaded.skipped.len())?;
        for skipped in &loaded.skipped {
            writeln!(out, "  - {}: {}", skipped.kind, skipped.reason)?;
        }
    }

    let selection: Vec<String> = scene.selection().map(|id| id.get().to_string()).collect();
    if selection.is_empty() {
        writeln!(out, "当前尚未选中任何实体。")?;
    } else {
        writeln!(out, "选中集包含实体 ID：{}", selection.join(", "))?;
    }
    let viewport = scene.viewport();
    writeln!(
        out,
        "视口中心=({:.2}, {:.2}), 缩放={:.3}",
        viewport.center.x(),
        viewport.center.y(),
        viewport.zoom
    )?;

    let mut layers: Vec<_> = document.layers().collect();
    layers.sort_by(|a, b| a.name.cmp(&b.name));
    writeln!(out, "当前文档图层：")?;
    for layer in layers {
        writeln!(out, "  - {} (可见: {})", layer.name, layer.is_visible)?;
    }

    writeln!(out, "当前文档实体：")?;
    for (id, entity) in document.entities() {
        let material = scene
            .material(*id)
            .and_then(|handle| loaded.textures.asset(handle))
            .map(|asset| format!(", 材质={}", asset.name))
            .unwrap_or_default();
        let editing = if scene.is_editing(*id) { ", 编辑中" } else { "" };
        writeln!(
            out,
            "  - {} #{}, Layer={}{material}{editing}",
            describe(entity),
            id.get(),
            entity.layer_name()
        )?;
    }
    info!(
        layers = document.layers().count(),
        entities = document.entities().count(),
        "CLI 文档统计"
    );
    Ok(())
}

fn describe(entity: &Entity) -> String {
    match entity {
        Entity::Line(line) => format!(
            "线段 起点={}, 终点={}",
            format_point(line.start),
            format_point(line.end)
        ),
        Entity::Circle(circle) => format!(
            "圆 圆心={}, 半径={:.2}",
            format_point(circle.center),
            circle.radius
        ),
        Entity::Arc(arc) => format!(
            "圆弧 圆心={}, 半径={:.2}, 起始角={:.1}°, 结束角={:.1}°",
            format_point(arc.center),
            arc.radius,
            arc.start_angle.to_degrees(),
            arc.end_angle.to_degrees()
        ),
        Entity::Polyline(polyline) => {
            let coords: Vec<String> = polyline
                .vertices
                .iter()
                .map(|vertex| {
                    let mut text = format_point(vertex.position);
                    if vertex.has_bulge() {
                        text.push_str(&format!("; bulge={:.3}", vertex.bulge));
                    }
                    if let Some(z) = vertex.z {
                        text.push_str(&format!("; z={z:.2}"));
                    }
                    text
                })
                .collect();
            format!(
                "多段线 顶点数={}, 闭合={}, 顶点={}",
                polyline.vertices.len(),
                if polyline.is_closed() { "是" } else { "否" },
                coords.join(" -> ")
            )
        }
        Entity::BlockReference(reference) => format!(
            "块参照 {} 插入点={}, 缩放=({:.2}, {:.2}), 旋转={:.1}°",
            reference.name,
            format_point(reference.insert),
            reference.scale.x(),
            reference.scale.y(),
            reference.rotation.to_degrees()
        ),
    }
}

fn format_point(point: Point2) -> String {
    format!("({:.2}, {:.2})", point.x(), point.y())
}
