use std::fs;
use std::path::Path;

use dxfnav_core::{
    drawing::{Attribute, Drawing, Geometry, Primitive},
    geometry::{Point2, Point3},
};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_LAYER: &str = "0";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DrawingLoader {
    fn load(&self, path: &Path) -> Result<Drawing, IoError>;
}

/// ASCII DXF 读取入口，只提取导航与范围计算需要的实体。
#[derive(Debug, Default)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, source: &str) -> Result<Drawing, IoError> {
        let parser = DxfParser::new(source);
        parser.parse().map_err(|err| match err {
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
            DxfError::Malformed { entity, message } => {
                IoError::InvalidDocument(format!("{entity}: {message}"))
            }
        })
    }
}

impl DrawingLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&data)
    }
}

#[derive(Debug)]
enum DxfError {
    /// 文件结构损坏，无法继续读取。
    Invalid { message: String },
    /// 单个实体字段缺失或无法解析，跳过该实体即可。
    Malformed { entity: String, message: String },
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    fn malformed(entity: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            entity: entity.to_string(),
            message: message.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
        }
    }

    fn parse(mut self) -> Result<Drawing, DxfError> {
        let mut drawing = Drawing::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.as_str() {
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
                        "TABLES" => self.parse_tables(&mut drawing)?,
                        "ENTITIES" => self.parse_entities(&mut drawing)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok(drawing)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    /// 只关心 LAYER 表项，保证没有实体的图层也能列出。
    fn parse_tables(&mut self, drawing: &mut Drawing) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("TABLES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "TABLES 段遇到组码 {code}（期望 0 表示表项起始）"
                )));
            }
            match value.as_str() {
                "ENDSEC" => break,
                "LAYER" => {
                    let mut name = None;
                    loop {
                        match self.reader.next_pair()? {
                            Some((0, value)) => {
                                self.reader.put_back((0, value));
                                break;
                            }
                            Some((2, value)) => name = Some(value.trim().to_string()),
                            Some(_) => {}
                            None => return Err(DxfError::invalid("LAYER 表项未正确结束")),
                        }
                    }
                    match name {
                        Some(name) if !name.is_empty() => drawing.ensure_layer(name),
                        _ => warn!("LAYER 表项缺少名称（组码 2），已忽略"),
                    }
                }
                _ => self.skip_entity_body()?,
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, drawing: &mut Drawing) -> Result<(), DxfError> {
        let mut dropped = 0usize;
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

            let parsed = match value.as_str() {
                "ENDSEC" => break,
                // 孤立的子记录（所属实体已被跳过）
                "ATTRIB" | "VERTEX" | "SEQEND" => {
                    self.skip_entity_body()?;
                    continue;
                }
                "LINE" => self.parse_line(),
                "CIRCLE" => self.parse_circle(),
                "ARC" => self.parse_arc(),
                "LWPOLYLINE" => self.parse_lwpolyline(),
                "POLYLINE" => self.parse_polyline(),
                "INSERT" => self.parse_insert(),
                other => self.parse_unsupported(other),
            };

            match parsed {
                Ok(primitive) => drawing.push(primitive),
                Err(DxfError::Malformed { entity, message }) => {
                    warn!(entity = %entity, line = self.reader.line_number, "{message}，已跳过该实体");
                    self.skip_entity_body()?;
                    dropped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        debug!(dropped, "ENTITIES 段读取完成");
        Ok(())
    }

    fn parse_line(&mut self) -> Result<Primitive, DxfError> {
        const KIND: &str = "LINE";
        let mut layer = None;
        let mut start = CoordSlots::default();
        let mut end = CoordSlots::default();
        while let Some((code, value)) = self.next_field(KIND)? {
            match code {
                8 => layer = Some(value.trim().to_string()),
                10 => assign_coord(&mut start.x, &value, KIND, "起点 X（组码 10）")?,
                20 => assign_coord(&mut start.y, &value, KIND, "起点 Y（组码 20）")?,
                30 => assign_coord(&mut start.z, &value, KIND, "起点 Z（组码 30）")?,
                11 => assign_coord(&mut end.x, &value, KIND, "终点 X（组码 11）")?,
                21 => assign_coord(&mut end.y, &value, KIND, "终点 Y（组码 21）")?,
                31 => assign_coord(&mut end.z, &value, KIND, "终点 Z（组码 31）")?,
                _ => {}
            }
        }
        Ok(Primitive::new(
            layer_or_default(layer),
            Geometry::Line {
                start: start.point3(KIND, "起点")?,
                end: end.point3(KIND, "终点")?,
            },
        ))
    }

    fn parse_circle(&mut self) -> Result<Primitive, DxfError> {
        const KIND: &str = "CIRCLE";
        let mut layer = None;
        let mut center = CoordSlots::default();
        let mut radius = None;
        while let Some((code, value)) = self.next_field(KIND)? {
            match code {
                8 => layer = Some(value.trim().to_string()),
                10 => assign_coord(&mut center.x, &value, KIND, "圆心 X（组码 10）")?,
                20 => assign_coord(&mut center.y, &value, KIND, "圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, KIND, "半径（组码 40）")?,
                _ => {}
            }
        }
        let radius = radius.ok_or_else(|| DxfError::malformed(KIND, "缺少半径（组码 40）"))?;
        Ok(Primitive::new(
            layer_or_default(layer),
            Geometry::Circle {
                center: center.point2(KIND, "圆心")?,
                radius,
            },
        ))
    }

    fn parse_arc(&mut self) -> Result<Primitive, DxfError> {
        const KIND: &str = "ARC";
        let mut layer = None;
        let mut center = CoordSlots::default();
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        while let Some((code, value)) = self.next_field(KIND)? {
            match code {
                8 => layer = Some(value.trim().to_string()),
                10 => assign_coord(&mut center.x, &value, KIND, "圆心 X（组码 10）")?,
                20 => assign_coord(&mut center.y, &value, KIND, "圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, KIND, "半径（组码 40）")?,
                50 => assign_coord(&mut start_angle, &value, KIND, "起始角（组码 50）")?,
                51 => assign_coord(&mut end_angle, &value, KIND, "终止角（组码 51）")?,
                _ => {}
            }
        }
        let radius = radius.ok_or_else(|| DxfError::malformed(KIND, "缺少半径（组码 40）"))?;
        Ok(Primitive::new(
            layer_or_default(layer),
            Geometry::Arc {
                center: center.point2(KIND, "圆心")?,
                radius,
                start_angle: start_angle.unwrap_or(0.0).to_radians(),
                end_angle: end_angle.unwrap_or(360.0).to_radians(),
            },
        ))
    }

    fn parse_lwpolyline(&mut self) -> Result<Primitive, DxfError> {
        const KIND: &str = "LWPOLYLINE";
        let mut layer = None;
        let mut is_closed = false;
        let mut points: Vec<Point2> = Vec::new();
        let mut pending_x: Option<f64> = None;
        while let Some((code, value)) = self.next_field(KIND)? {
            match code {
                8 => layer = Some(value.trim().to_string()),
                70 => is_closed = parse_i32(&value, KIND, "标志（组码 70）")? & 0x01 == 0x01,
                10 => {
                    let x = parse_f64(&value, KIND, "顶点 X（组码 10）")?;
                    if pending_x.replace(x).is_some() {
                        return Err(DxfError::malformed(KIND, "顶点缺少对应的 Y（组码 20）"));
                    }
                }
                20 => {
                    let y = parse_f64(&value, KIND, "顶点 Y（组码 20）")?;
                    let x = pending_x
                        .take()
                        .ok_or_else(|| DxfError::malformed(KIND, "顶点缺少对应的 X（组码 10）"))?;
                    points.push(Point2::new(x, y));
                }
                _ => {}
            }
        }
        if pending_x.is_some() {
            return Err(DxfError::malformed(KIND, "检测到不完整的顶点"));
        }
        Ok(Primitive::new(
            layer_or_default(layer),
            Geometry::Polyline { points, is_closed },
        ))
    }

    /// 旧式 POLYLINE：头部之后跟随若干 VERTEX，以 SEQEND 结束。
    fn parse_polyline(&mut self) -> Result<Primitive, DxfError> {
        const KIND: &str = "POLYLINE";
        let mut layer = None;
        let mut is_closed = false;
        while let Some((code, value)) = self.next_field(KIND)? {
            match code {
                8 => layer = Some(value.trim().to_string()),
                70 => is_closed = parse_i32(&value, KIND, "标志（组码 70）")? & 0x01 == 0x01,
                _ => {}
            }
        }

        let mut points = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.as_str() {
                    "VERTEX" => points.push(self.parse_vertex()?),
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some((code, _)) => {
                    return Err(DxfError::invalid(format!(
                        "POLYLINE 顶点序列出现意外组码 {code}"
                    )));
                }
                None => return Err(DxfError::invalid("POLYLINE 未正确结束")),
            }
        }

        Ok(Primitive::new(
            layer_or_default(layer),
            Geometry::Polyline { points, is_closed },
        ))
    }

    fn parse_vertex(&mut self) -> Result<Point2, DxfError> {
        const KIND: &str = "VERTEX";
        let mut position = CoordSlots::default();
        while let Some((code, value)) = self.next_field(KIND)? {
            match code {
                10 => assign_coord(&mut position.x, &value, KIND, "X（组码 10）")?,
                20 => assign_coord(&mut position.y, &value, KIND, "Y（组码 20）")?,
                _ => {}
            }
        }
        position.point2(KIND, "顶点")
    }

    /// 块参照只读取插入点与其后的 ATTRIB；缩放与旋转不参与导航计算。
    fn parse_insert(&mut self) -> Result<Primitive, DxfError> {
        const KIND: &str = "INSERT";
        let mut layer = None;
        let mut block_name = None;
        let mut position = CoordSlots::default();
        while let Some((code, value)) = self.next_field(KIND)? {
            match code {
                8 => layer = Some(value.trim().to_string()),
                2 => {
                    if block_name.replace(value.trim().to_string()).is_some() {
                        return Err(DxfError::malformed(KIND, "重复的块名（组码 2）"));
                    }
                }
                10 => assign_coord(&mut position.x, &value, KIND, "插入点 X（组码 10）")?,
                20 => assign_coord(&mut position.y, &value, KIND, "插入点 Y（组码 20）")?,
                30 => assign_coord(&mut position.z, &value, KIND, "插入点 Z（组码 30）")?,
                _ => {}
            }
        }

        let mut attributes = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.as_str() {
                    "ATTRIB" => {
                        if let Some(attribute) = self.parse_attrib()? {
                            attributes.push(attribute);
                        }
                    }
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some((code, value)) => {
                    return Err(DxfError::invalid(format!(
                        "INSERT 属性段出现意外组码 {code} 值 {value}"
                    )));
                }
                None => break,
            }
        }

        let block_name =
            block_name.ok_or_else(|| DxfError::malformed(KIND, "缺少块名（组码 2）"))?;
        Ok(Primitive::new(
            layer_or_default(layer),
            Geometry::Insert {
                block_name,
                position: position.point3(KIND, "插入点")?,
                attributes,
            },
        ))
    }

    /// 读取 ATTRIB 的标签与文本；缺少标签的属性被忽略。
    fn parse_attrib(&mut self) -> Result<Option<Attribute>, DxfError> {
        let mut tag = None;
        let mut text = None;
        while let Some((code, value)) = self.next_field("ATTRIB")? {
            match code {
                2 => tag = Some(value.trim().to_string()),
                1 => text = Some(value),
                _ => {}
            }
        }
        match tag {
            Some(tag) => Ok(Some(Attribute::new(tag, text.unwrap_or_default()))),
            None => {
                warn!("ATTRIB 缺少标签（组码 2），已忽略");
                Ok(None)
            }
        }
    }

    fn parse_unsupported(&mut self, kind: &str) -> Result<Primitive, DxfError> {
        let mut layer = None;
        while let Some((code, value)) = self.next_field(kind)? {
            if code == 8 {
                layer = Some(value.trim().to_string());
            }
        }
        Ok(Primitive::new(
            layer_or_default(layer),
            Geometry::Unsupported {
                entity: kind.to_string(),
            },
        ))
    }

    /// 读取实体体内的下一个字段；遇到组码 0 时回退并返回 `None`。
    fn next_field(&mut self, entity: &str) -> Result<Option<(i32, String)>, DxfError> {
        match self.reader.next_pair()? {
            Some((0, value)) => {
                self.reader.put_back((0, value));
                Ok(None)
            }
            Some(pair) => Ok(Some(pair)),
            None => Err(DxfError::invalid(format!("{entity} 未正确结束"))),
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
}

#[derive(Debug, Default)]
struct CoordSlots {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

impl CoordSlots {
    fn point2(&self, entity: &str, label: &str) -> Result<Point2, DxfError> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Ok(Point2::new(x, y)),
            _ => Err(DxfError::malformed(
                entity,
                format!("{label}缺少完整的 XY 坐标"),
            )),
        }
    }

    fn point3(&self, entity: &str, label: &str) -> Result<Point3, DxfError> {
        let xy = self.point2(entity, label)?;
        Ok(Point3::new(xy.x(), xy.y(), self.z.unwrap_or(0.0)))
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

        loop {
            let code_line = match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    line
                }
                None => return Ok(None),
            };

            let value_line = match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    line
                }
                None => {
                    if code_line.trim().is_empty() {
                        return Ok(None);
                    }
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
            // 999 为注释
            if code == 999 {
                continue;
            }
            let value = value_line.trim_end_matches('\r').trim_start().to_string();
            return Ok(Some((code, value)));
        }
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }
}

fn layer_or_default(layer: Option<String>) -> String {
    match layer {
        Some(layer) if !layer.is_empty() => layer,
        _ => DEFAULT_LAYER.to_string(),
    }
}

fn assign_coord(
    slot: &mut Option<f64>,
    raw: &str,
    entity: &str,
    context: &str,
) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::malformed(entity, format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, entity, context)?);
    Ok(())
}

fn parse_f64(raw: &str, entity: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim().parse::<f64>().map_err(|_| {
        DxfError::malformed(entity, format!("{context} 解析失败（值：\"{raw}\"）"))
    })
}

fn parse_i32(raw: &str, entity: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim().parse::<i32>().map_err(|_| {
        DxfError::malformed(entity, format!("{context} 解析失败（值：\"{raw}\"）"))
    })
}
