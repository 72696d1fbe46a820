//! ASCII DXF 读取。
//!
//! 文件结构错误（组码无法解析、段落缺少 ENDSEC 等）会中断整个导入；
//! 单个实体的字段问题只会跳过该实体并记录原因。

use poolcad_core::document::{
    Arc, BlockReference, Circle, Document, Entity, Line, Polyline, PolylineFlags, PolylineVertex,
};
use poolcad_core::geometry::{Point2, Vector2};
use tracing::{debug, warn};

use crate::{ImportOutcome, SkippedEntity};

/// VERTEX 组码 70：多面网格的面记录。
const VERTEX_FACE_RECORD: i32 = 0x80;

pub(crate) fn parse(source: &str) -> Result<ImportOutcome, String> {
    DxfParser::new(source).parse().map_err(|err| err.message())
}

#[derive(Debug)]
enum DxfError {
    /// 类型不受支持，实体被跳过。
    Unsupported { kind: String },
    /// 实体内容有误，实体被跳过。
    Malformed { message: String },
    /// 文件结构损坏，导入失败。
    Invalid { message: String },
}

impl DxfError {
    fn unsupported(kind: impl Into<String>) -> Self {
        Self::Unsupported { kind: kind.into() }
    }

    fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    fn message(self) -> String {
        match self {
            DxfError::Unsupported { kind } => format!("暂不支持的实体类型 {kind}"),
            DxfError::Malformed { message } | DxfError::Invalid { message } => message,
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    skipped: Vec<SkippedEntity>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
            skipped: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<ImportOutcome, DxfError> {
        let mut document = Document::new();
        let mut reached_eof = false;
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        other => {
                            debug!(section = other, "跳过 DXF 段");
                            self.skip_section()?
                        }
                    }
                }
                "EOF" => {
                    reached_eof = true;
                    break;
                }
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        if !reached_eof {
            return Err(DxfError::invalid("文件缺少 EOF 终止标记"));
        }
        Ok(ImportOutcome {
            document,
            skipped: self.skipped,
        })
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            let kind = value.trim().to_string();
            let parsed = match kind.as_str() {
                "ENDSEC" => break,
                // 属性与序列结束标记附属于前一个实体
                "ATTRIB" | "SEQEND" => {
                    self.skip_entity_body()?;
                    continue;
                }
                "POLYLINE" => {
                    let parsed = self.parse_polyline();
                    if matches!(parsed, Err(DxfError::Malformed { .. })) {
                        self.skip_polyline_sequence()?;
                    }
                    parsed
                }
                _ => {
                    let parsed = self.parse_entity(&kind);
                    if matches!(
                        parsed,
                        Err(DxfError::Malformed { .. } | DxfError::Unsupported { .. })
                    ) {
                        self.skip_entity_body()?;
                    }
                    parsed
                }
            };

            match parsed {
                Ok(entity) => {
                    document.add_entity(entity);
                }
                Err(DxfError::Invalid { message }) => return Err(DxfError::Invalid { message }),
                Err(err) => {
                    let reason = err.message();
                    warn!(kind = %kind, reason = %reason, "跳过无法导入的实体");
                    self.skipped.push(SkippedEntity { kind, reason });
                }
            }
        }
        Ok(())
    }

    fn parse_entity(&mut self, kind: &str) -> Result<Entity, DxfError> {
        match kind {
            "LINE" => self.parse_line(),
            "CIRCLE" => self.parse_circle(),
            "ARC" => self.parse_arc(),
            "LWPOLYLINE" => self.parse_lwpolyline(),
            "INSERT" => self.parse_insert(),
            other => Err(DxfError::unsupported(other)),
        }
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        while let Some((code, value)) = self.next_field("LINE")? {
            match code {
                8 => layer = Some(value),
                10 => assign_coord(&mut start_x, &value, "LINE 起点 X（组码 10）")?,
                20 => assign_coord(&mut start_y, &value, "LINE 起点 Y（组码 20）")?,
                11 => assign_coord(&mut end_x, &value, "LINE 终点 X（组码 11）")?,
                21 => assign_coord(&mut end_y, &value, "LINE 终点 Y（组码 21）")?,
                _ => {}
            }
        }

        let sx = start_x.ok_or_else(|| DxfError::malformed("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::malformed("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::malformed("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::malformed("LINE 缺少终点 Y（组码 21）"))?;

        Ok(Entity::Line(Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
            layer: layer_or_default(layer),
        }))
    }

    fn parse_circle(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        while let Some((code, value)) = self.next_field("CIRCLE")? {
            match code {
                8 => layer = Some(value),
                10 => assign_coord(&mut center_x, &value, "CIRCLE 圆心 X（组码 10）")?,
                20 => assign_coord(&mut center_y, &value, "CIRCLE 圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                _ => {}
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::malformed("CIRCLE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::malformed("CIRCLE 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::malformed("CIRCLE 缺少半径（组码 40）"))?;
        ensure_positive_radius(radius, "CIRCLE")?;

        Ok(Entity::Circle(Circle {
            center: Point2::new(cx, cy),
            radius,
            layer: layer_or_default(layer),
        }))
    }

    fn parse_arc(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        while let Some((code, value)) = self.next_field("ARC")? {
            match code {
                8 => layer = Some(value),
                10 => assign_coord(&mut center_x, &value, "ARC 圆心 X（组码 10）")?,
                20 => assign_coord(&mut center_y, &value, "ARC 圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                _ => {}
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::malformed("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::malformed("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::malformed("ARC 缺少半径（组码 40）"))?;
        ensure_positive_radius(radius, "ARC")?;
        let start_angle =
            start_angle.ok_or_else(|| DxfError::malformed("ARC 缺少起始角（组码 50）"))?;
        let end_angle =
            end_angle.ok_or_else(|| DxfError::malformed("ARC 缺少终止角（组码 51）"))?;

        Ok(Entity::Arc(Arc {
            center: Point2::new(cx, cy),
            radius,
            start_angle: start_angle.to_radians(),
            end_angle: end_angle.to_radians(),
            layer: layer_or_default(layer),
        }))
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags = PolylineFlags::default();
        let mut elevation: Option<f64> = None;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        while let Some((code, value)) = self.next_field("LWPOLYLINE")? {
            match code {
                8 => layer = Some(value),
                70 => flags = PolylineFlags::from_bits(parse_i32(&value, "LWPOLYLINE 标志")?),
                38 => elevation = Some(parse_f64(&value, "LWPOLYLINE 标高（组码 38）")?),
                10 => {
                    let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                    match pending_y.take() {
                        Some(y) => vertices.push(PolylineVertex::new(Point2::new(x, y))),
                        None => {
                            if pending_x.replace(x).is_some() {
                                return Err(DxfError::malformed(
                                    "LWPOLYLINE 顶点缺少对应的 Y（组码 20）",
                                ));
                            }
                        }
                    }
                }
                20 => {
                    let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                    match pending_x.take() {
                        Some(x) => vertices.push(PolylineVertex::new(Point2::new(x, y))),
                        None => {
                            if pending_y.replace(y).is_some() {
                                return Err(DxfError::malformed(
                                    "LWPOLYLINE 顶点缺少对应的 X（组码 10）",
                                ));
                            }
                        }
                    }
                }
                42 => {
                    let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge")?;
                    let vertex = vertices.last_mut().ok_or_else(|| {
                        DxfError::malformed("LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）")
                    })?;
                    vertex.bulge = bulge;
                }
                _ => {}
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::malformed(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }
        if vertices.is_empty() {
            return Err(DxfError::malformed("LWPOLYLINE 未解析到任何顶点"));
        }
        if let Some(z) = elevation {
            for vertex in &mut vertices {
                vertex.z = Some(z);
            }
        }

        Ok(Entity::Polyline(Polyline {
            vertices,
            flags,
            layer: layer_or_default(layer),
        }))
    }

    /// 解析 POLYLINE 头部及其后的 VERTEX 序列，直到 SEQEND。
    fn parse_polyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags = PolylineFlags::default();
        while let Some((code, value)) = self.next_field("POLYLINE")? {
            match code {
                8 => layer = Some(value),
                70 => {
                    flags = PolylineFlags::from_bits(parse_i32(&value, "POLYLINE 标志（组码 70）")?)
                }
                // 66 顶点跟随标志、10/20/30 占位点
                _ => {}
            }
        }

        let mut vertices = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => {
                        if let Some(vertex) = self.parse_vertex()? {
                            vertices.push(vertex);
                        }
                    }
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        // 缺少 SEQEND 时以下一个实体作为结束
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => {
                    return Err(DxfError::invalid(
                        "POLYLINE 遇到无效的记录，期望 VERTEX/SEQEND",
                    ));
                }
                None => {
                    return Err(DxfError::invalid(
                        "POLYLINE 缺少 SEQEND（组码 0, 值为 SEQEND）",
                    ));
                }
            }
        }

        if vertices.is_empty() {
            return Err(DxfError::malformed("POLYLINE 未解析到任何顶点"));
        }

        Ok(Entity::Polyline(Polyline {
            vertices,
            flags,
            layer: layer_or_default(layer),
        }))
    }

    /// 读取一个 VERTEX 记录；面记录（组码 70 含 128）返回 `None`。
    fn parse_vertex(&mut self) -> Result<Option<PolylineVertex>, DxfError> {
        let mut x = None;
        let mut y = None;
        let mut z = None;
        let mut bulge = 0.0;
        let mut flags = 0;
        while let Some((code, value)) = self.next_field("VERTEX")? {
            match code {
                10 => assign_coord(&mut x, &value, "VERTEX X（组码 10）")?,
                20 => assign_coord(&mut y, &value, "VERTEX Y（组码 20）")?,
                30 => assign_coord(&mut z, &value, "VERTEX Z（组码 30）")?,
                42 => bulge = parse_f64(&value, "VERTEX bulge（组码 42）")?,
                70 => flags = parse_i32(&value, "VERTEX 标志（组码 70）")?,
                _ => {}
            }
        }

        if flags & VERTEX_FACE_RECORD != 0 {
            return Ok(None);
        }

        let x = x.ok_or_else(|| DxfError::malformed("VERTEX 缺少 X（组码 10）"))?;
        let y = y.ok_or_else(|| DxfError::malformed("VERTEX 缺少 Y（组码 20）"))?;
        Ok(Some(PolylineVertex {
            position: Point2::new(x, y),
            z,
            bulge,
        }))
    }

    fn parse_insert(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut name = None;
        let mut insert_x = None;
        let mut insert_y = None;
        let mut scale_x: Option<f64> = None;
        let mut scale_y: Option<f64> = None;
        let mut rotation_deg: f64 = 0.0;
        while let Some((code, value)) = self.next_field("INSERT")? {
            match code {
                8 => layer = Some(value),
                2 => {
                    if name.is_some() {
                        return Err(DxfError::malformed("INSERT 遇到重复的块名（组码 2）"));
                    }
                    name = Some(value.trim().to_string());
                }
                10 => assign_coord(&mut insert_x, &value, "INSERT 插入点 X（组码 10）")?,
                20 => assign_coord(&mut insert_y, &value, "INSERT 插入点 Y（组码 20）")?,
                41 => scale_x = Some(parse_f64(&value, "INSERT 缩放 X")?),
                42 => scale_y = Some(parse_f64(&value, "INSERT 缩放 Y")?),
                50 => rotation_deg = parse_f64(&value, "INSERT 旋转角")?,
                _ => {}
            }
        }

        let name = name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DxfError::malformed("INSERT 缺少块名（组码 2）"))?;
        let ix = insert_x.ok_or_else(|| DxfError::malformed("INSERT 缺少插入点 X（组码 10）"))?;
        let iy = insert_y.ok_or_else(|| DxfError::malformed("INSERT 缺少插入点 Y（组码 20）"))?;
        let sx = scale_x.unwrap_or(1.0);
        let sy = scale_y.unwrap_or(sx);

        Ok(Entity::BlockReference(BlockReference {
            name,
            insert: Point2::new(ix, iy),
            scale: Vector2::new(sx, sy),
            rotation: rotation_deg.to_radians(),
            layer: layer_or_default(layer),
        }))
    }

    /// 读取当前实体的下一个字段；遇到组码 0 时回退并返回 `None`。
    fn next_field(&mut self, kind: &str) -> Result<Option<(i32, String)>, DxfError> {
        match self.reader.next_pair()? {
            Some((0, value)) => {
                self.reader.put_back((0, value));
                Ok(None)
            }
            Some(pair) => Ok(Some(pair)),
            None => Err(DxfError::invalid(format!("{kind} 未正确结束"))),
        }
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }

    /// 跳过损坏 POLYLINE 的剩余部分，包括其 VERTEX 与 SEQEND。
    fn skip_polyline_sequence(&mut self) -> Result<(), DxfError> {
        self.skip_entity_body()?;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => self.skip_entity_body()?,
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 文件末尾的空行不构成组码
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "只能回退一个 DXF pair");
        self.buffer = Some(pair);
    }
}

fn layer_or_default(layer: Option<String>) -> String {
    match layer.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "0".to_string(),
    }
}

fn ensure_positive_radius(radius: f64, kind: &str) -> Result<(), DxfError> {
    if radius > 0.0 {
        Ok(())
    } else {
        Err(DxfError::malformed(format!(
            "{kind} 半径必须为正数，实际为 {radius}"
        )))
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::malformed(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(DxfError::malformed(format!(
            "{context} 解析失败（值：\"{raw}\"）"
        ))),
    }
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| DxfError::malformed(format!("{context} 解析失败（值：\"{raw}\"）")))?;
    i32::try_from(value)
        .map_err(|_| DxfError::malformed(format!("{context} 超出 i32 范围（值：{value}）")))
}
