use std::collections::HashMap;
use std::str::FromStr;

use poolcad_core::document::EntityId;
use poolcad_core::geometry::{Point2, Vector2};

use crate::catalog::ItemKind;
use crate::errors::EngineError;
use crate::scene::Scene;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// 按空白拆分一行命令文本，首个单词为命令名。
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        Some(Self::new(name, parts))
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub scene: &'a mut Scene,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(FocusSelectionCommand);
        bus.register(ClearSelectionCommand);
        bus.register(ToggleSelectCommand);
        bus.register(PanCommand);
        bus.register(ZoomCommand);
        bus.register(DropItemCommand);
        bus.register(InsertAnchorCommand);
        bus.register(MoveAnchorCommand);
        bus.register(SetDepthCommand);
        bus.register(MoveEntityCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析第 `index` 个参数，失败时直接生成错误响应。
fn arg<T: FromStr>(request: &CommandRequest, index: usize, label: &str) -> Result<T, CommandResponse> {
    let raw = request.args.get(index).ok_or_else(|| {
        CommandResponse::err(format!("{} 缺少参数 {}", request.name, label))
    })?;
    raw.parse::<T>().map_err(|_| {
        CommandResponse::err(format!("{} 的参数 {} 无效: {}", request.name, label, raw))
    })
}

fn finite_arg(request: &CommandRequest, index: usize, label: &str) -> Result<f64, CommandResponse> {
    let value: f64 = arg(request, index, label)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CommandResponse::err(format!(
            "{} 的参数 {} 必须是有限数值",
            request.name, label
        )))
    }
}

fn entity_arg(request: &CommandRequest, index: usize) -> Result<EntityId, CommandResponse> {
    arg::<u64>(request, index, "id").map(EntityId::new)
}

fn point_args(request: &CommandRequest, index: usize) -> Result<Point2, CommandResponse> {
    Ok(Point2::new(
        finite_arg(request, index, "x")?,
        finite_arg(request, index + 1, "y")?,
    ))
}

fn engine_error(err: EngineError) -> CommandResponse {
    CommandResponse::err(err.to_string())
}

/// 带参数的命令在 `run` 中用 `?` 传递错误响应。
type CommandResult = Result<CommandResponse, CommandResponse>;

fn respond(result: CommandResult) -> CommandResponse {
    result.unwrap_or_else(|response| response)
}

struct FocusSelectionCommand;

impl CommandHandler for FocusSelectionCommand {
    fn name(&self) -> &'static str {
        "focus_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.scene.focus_on_selection();
        CommandResponse::ok("视口已聚焦当前选中实体")
    }
}

struct ClearSelectionCommand;

impl CommandHandler for ClearSelectionCommand {
    fn name(&self) -> &'static str {
        "clear_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.scene.clear_selection();
        CommandResponse::ok("选中集已清空")
    }
}

/// `toggle_select <id>`
struct ToggleSelectCommand;

impl ToggleSelectCommand {
    fn run(request: &CommandRequest, scene: &mut Scene) -> CommandResult {
        let id = entity_arg(request, 0)?;
        let selected = scene.toggle_selection(id).map_err(engine_error)?;
        let state = if selected { "已选中" } else { "已取消选中" };
        Ok(CommandResponse::ok(format!("实体 {} {state}", id.get())))
    }
}

impl CommandHandler for ToggleSelectCommand {
    fn name(&self) -> &'static str {
        "toggle_select"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context.scene))
    }
}

/// `pan <dx> <dy>`
struct PanCommand;

impl PanCommand {
    fn run(request: &CommandRequest, scene: &mut Scene) -> CommandResult {
        let delta = Vector2::new(
            finite_arg(request, 0, "dx")?,
            finite_arg(request, 1, "dy")?,
        );
        scene.pan_viewport(delta);
        let center = scene.viewport().center;
        Ok(CommandResponse::ok(format!(
            "视口中心移动到 ({:.2}, {:.2})",
            center.x(),
            center.y()
        )))
    }
}

impl CommandHandler for PanCommand {
    fn name(&self) -> &'static str {
        "pan"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context.scene))
    }
}

/// `zoom <factor>`，因子必须为正数，结果受缩放上下限约束。
struct ZoomCommand;

impl ZoomCommand {
    fn run(request: &CommandRequest, scene: &mut Scene) -> CommandResult {
        let factor = finite_arg(request, 0, "factor")?;
        if factor <= 0.0 {
            return Err(CommandResponse::err("缩放因子必须为正数"));
        }
        scene.scale_viewport_zoom(factor);
        Ok(CommandResponse::ok(format!(
            "缩放倍数 {:.3}",
            scene.viewport().zoom
        )))
    }
}

impl CommandHandler for ZoomCommand {
    fn name(&self) -> &'static str {
        "zoom"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context.scene))
    }
}

/// `drop_item <kind> <x> <y>`
struct DropItemCommand;

impl DropItemCommand {
    fn run(request: &CommandRequest, scene: &mut Scene) -> CommandResult {
        let raw = request
            .args
            .first()
            .ok_or_else(|| CommandResponse::err("drop_item 缺少参数 kind"))?;
        let kind = raw.parse::<ItemKind>().map_err(engine_error)?;
        let position = point_args(request, 1)?;
        let id = scene.drop_item(kind, position);
        Ok(CommandResponse::ok(format!(
            "已放置{}，实体 ID {}",
            kind.display_name(),
            id.get()
        )))
    }
}

impl CommandHandler for DropItemCommand {
    fn name(&self) -> &'static str {
        "drop_item"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context.scene))
    }
}

/// `insert_anchor <id> <x> <y>`，必要时自动打开编辑会话。
struct InsertAnchorCommand;

impl InsertAnchorCommand {
    fn run(request: &CommandRequest, scene: &mut Scene) -> CommandResult {
        let id = entity_arg(request, 0)?;
        let point = point_args(request, 1)?;
        scene.begin_edit(id).map_err(engine_error)?;
        let index = scene.insert_anchor(id, point).map_err(engine_error)?;
        Ok(CommandResponse::ok(format!("已插入锚点 #{index}")))
    }
}

impl CommandHandler for InsertAnchorCommand {
    fn name(&self) -> &'static str {
        "insert_anchor"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context.scene))
    }
}

/// `move_anchor <id> <index> <x> <y>`
struct MoveAnchorCommand;

impl MoveAnchorCommand {
    fn run(request: &CommandRequest, scene: &mut Scene) -> CommandResult {
        let id = entity_arg(request, 0)?;
        let index: usize = arg(request, 1, "index")?;
        let point = point_args(request, 2)?;
        scene.begin_edit(id).map_err(engine_error)?;
        scene.move_anchor(id, index, point).map_err(engine_error)?;
        Ok(CommandResponse::ok(format!("锚点 #{index} 已移动")))
    }
}

impl CommandHandler for MoveAnchorCommand {
    fn name(&self) -> &'static str {
        "move_anchor"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context.scene))
    }
}

/// `set_depth <id> <index> <depth>`，深度为 0 时保持原值。
struct SetDepthCommand;

impl SetDepthCommand {
    fn run(request: &CommandRequest, scene: &mut Scene) -> CommandResult {
        let id = entity_arg(request, 0)?;
        let index: usize = arg(request, 1, "index")?;
        let depth = finite_arg(request, 2, "depth")?;
        scene.begin_edit(id).map_err(engine_error)?;
        let changed = scene.set_depth(id, index, depth).map_err(engine_error)?;
        Ok(if changed {
            CommandResponse::ok(format!("锚点 #{index} 深度已设为 {}", -depth.abs()))
        } else {
            CommandResponse::ok(format!("锚点 #{index} 深度未改变"))
        })
    }
}

impl CommandHandler for SetDepthCommand {
    fn name(&self) -> &'static str {
        "set_depth"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context.scene))
    }
}

/// `move_entity <id> <dx> <dy>`
struct MoveEntityCommand;

impl MoveEntityCommand {
    fn run(request: &CommandRequest, scene: &mut Scene) -> CommandResult {
        let id = entity_arg(request, 0)?;
        let delta = Vector2::new(
            finite_arg(request, 1, "dx")?,
            finite_arg(request, 2, "dy")?,
        );
        scene.translate_entity(id, delta).map_err(engine_error)?;
        Ok(CommandResponse::ok(format!("实体 {} 已平移", id.get())))
    }
}

impl CommandHandler for MoveEntityCommand {
    fn name(&self) -> &'static str {
        "move_entity"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        respond(Self::run(request, context.scene))
    }
}
