//! R12 风格的 ASCII DXF 导出。多段线按原始顶点写出（POLYLINE/VERTEX/SEQEND），
//! 不写入任何渲染用的采样点。

use std::fmt::Display;
use std::io::{self, Write};

use poolcad_core::document::{Document, Entity, Polyline};

/// 将文档写出为 DXF。
pub fn write_document<W: Write>(document: &Document, writer: &mut W) -> io::Result<()> {
    write_header(writer)?;

    pair(writer, 0, "SECTION")?;
    pair(writer, 2, "ENTITIES")?;
    for (_, entity) in document.entities() {
        write_entity(writer, entity)?;
    }
    pair(writer, 0, "ENDSEC")?;

    pair(writer, 0, "EOF")
}

/// 便于测试与预览的字符串形式。
pub fn write_to_string(document: &Document) -> io::Result<String> {
    let mut buffer = Vec::new();
    write_document(document, &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn write_header<W: Write>(writer: &mut W) -> io::Result<()> {
    pair(writer, 0, "SECTION")?;
    pair(writer, 2, "HEADER")?;
    pair(writer, 9, "$ACADVER")?;
    pair(writer, 1, "AC1009")?;
    pair(writer, 0, "ENDSEC")
}

fn write_entity<W: Write>(writer: &mut W, entity: &Entity) -> io::Result<()> {
    match entity {
        Entity::Line(line) => {
            pair(writer, 0, "LINE")?;
            pair(writer, 8, &line.layer)?;
            pair(writer, 10, line.start.x())?;
            pair(writer, 20, line.start.y())?;
            pair(writer, 11, line.end.x())?;
            pair(writer, 21, line.end.y())
        }
        Entity::Circle(circle) => {
            pair(writer, 0, "CIRCLE")?;
            pair(writer, 8, &circle.layer)?;
            pair(writer, 10, circle.center.x())?;
            pair(writer, 20, circle.center.y())?;
            pair(writer, 40, circle.radius)
        }
        Entity::Arc(arc) => {
            pair(writer, 0, "ARC")?;
            pair(writer, 8, &arc.layer)?;
            pair(writer, 10, arc.center.x())?;
            pair(writer, 20, arc.center.y())?;
            pair(writer, 40, arc.radius)?;
            pair(writer, 50, arc.start_angle.to_degrees())?;
            pair(writer, 51, arc.end_angle.to_degrees())
        }
        Entity::Polyline(polyline) => write_polyline(writer, polyline),
        Entity::BlockReference(reference) => {
            pair(writer, 0, "INSERT")?;
            pair(writer, 8, &reference.layer)?;
            pair(writer, 2, &reference.name)?;
            pair(writer, 10, reference.insert.x())?;
            pair(writer, 20, reference.insert.y())?;
            pair(writer, 41, reference.scale.x())?;
            pair(writer, 42, reference.scale.y())?;
            pair(writer, 50, reference.rotation.to_degrees())
        }
    }
}

fn write_polyline<W: Write>(writer: &mut W, polyline: &Polyline) -> io::Result<()> {
    pair(writer, 0, "POLYLINE")?;
    pair(writer, 8, &polyline.layer)?;
    pair(writer, 66, 1)?;
    pair(writer, 70, polyline.flags.bits())?;
    for vertex in &polyline.vertices {
        pair(writer, 0, "VERTEX")?;
        pair(writer, 8, &polyline.layer)?;
        pair(writer, 10, vertex.position.x())?;
        pair(writer, 20, vertex.position.y())?;
        if let Some(z) = vertex.z {
            pair(writer, 30, z)?;
        }
        if vertex.has_bulge() {
            pair(writer, 42, vertex.bulge)?;
        }
    }
    pair(writer, 0, "SEQEND")?;
    pair(writer, 8, &polyline.layer)
}

fn pair<W: Write>(writer: &mut W, code: i32, value: impl Display) -> io::Result<()> {
    writeln!(writer, "{code:>3}")?;
    writeln!(writer, "{value}")
}
