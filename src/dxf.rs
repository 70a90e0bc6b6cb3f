//! ASCII DXF implementation of [`DocumentStore`].
//!
//! The file is kept as its raw list of group-code/value pairs. Block
//! instances (INSERT + ATTRIB ... SEQEND) and attribute definitions are lifted
//! into a [`Drawing`]; on save every pair is written back as it was read,
//! except the text values of fields that were changed.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::drawing::{AttributeField, BlockInstance, Drawing, HAlign, Point2, Space, VAlign};
use crate::error::{Error, Result};
use crate::logging::STORE;
use crate::store::DocumentStore;

/// Text height assumed when an ATTRIB carries no group 40.
pub const DEFAULT_TEXT_HEIGHT: f64 = 2.5;

#[derive(Debug, thiserror::Error)]
pub enum DxfError {
    #[error("binary DWG files are not supported, save the template as ASCII DXF")]
    BinaryDwg,
    #[error("binary DXF files are not supported")]
    BinaryDxf,
    #[error("file is not valid UTF-8 text")]
    NotUtf8,
    #[error("expected an even number of lines (code/value pairs)")]
    OddNumberOfLines,
    #[error("invalid group code {raw:?} at line {line}")]
    InvalidGroupCode { raw: String, line: usize },
    #[error("invalid number {raw:?} for group code {code} in {entity} at line {line}")]
    InvalidNumber {
        entity: &'static str,
        code: i32,
        raw: String,
        line: usize,
    },
    #[error("ATTRIB without a tag (group 2) at line {line}")]
    MissingTag { line: usize },
}

/// Where a field's text lives in the pair list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextSlot {
    Replace(usize),
    /// The ATTRIB had no group 1; a new pair goes after this index.
    InsertAfter(usize),
}

#[derive(Debug, Clone)]
struct RawPair {
    /// Code line exactly as read, padding included.
    code_line: String,
    code: i32,
    value: String,
}

#[derive(Debug, Clone)]
pub(crate) struct DxfSource {
    pairs: Vec<RawPair>,
    line_ending: &'static str,
    trailing_newline: bool,
    bom: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DxfStore;

impl DxfStore {
    pub fn new() -> Self {
        DxfStore
    }
}

impl DocumentStore for DxfStore {
    fn load(&self, path: &Path) -> Result<Drawing> {
        let bytes = std::fs::read(path).map_err(|e| Error::from_io(path, e))?;
        let drawing = parse_bytes(&bytes).map_err(|e| Error::corrupt(path, e.to_string()))?;
        debug!(
            target: STORE,
            path = %path.display(),
            instances = drawing.instances.len(),
            blocks = drawing.block_definitions.len(),
            "loaded template"
        );
        Ok(drawing)
    }

    fn save(&self, drawing: &Drawing, path: &Path) -> Result<()> {
        let text = render(drawing);
        std::fs::write(path, text).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(target: STORE, path = %path.display(), "saved drawing");
        Ok(())
    }
}

pub fn parse_bytes(bytes: &[u8]) -> std::result::Result<Drawing, DxfError> {
    if bytes.starts_with(b"AC10") {
        return Err(DxfError::BinaryDwg);
    }
    if bytes.starts_with(b"AutoCAD Binary DXF") {
        return Err(DxfError::BinaryDxf);
    }
    let text = std::str::from_utf8(bytes).map_err(|_| DxfError::NotUtf8)?;
    parse_str(text)
}

pub fn parse_str(input: &str) -> std::result::Result<Drawing, DxfError> {
    let (input, bom) = match input.strip_prefix('\u{feff}') {
        Some(rest) => (rest, true),
        None => (input, false),
    };
    let line_ending = if input.contains("\r\n") { "\r\n" } else { "\n" };
    let trailing_newline = input.ends_with('\n');

    let pairs = parse_pairs(input)?;
    let mut drawing = build_drawing(&pairs)?;
    drawing.source = Some(DxfSource {
        pairs,
        line_ending,
        trailing_newline,
        bom,
    });
    Ok(drawing)
}

fn parse_pairs(input: &str) -> std::result::Result<Vec<RawPair>, DxfError> {
    let mut lines: Vec<&str> = input.lines().collect();
    if lines.len() % 2 == 1 && lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines.len() % 2 == 1 {
        return Err(DxfError::OddNumberOfLines);
    }

    let mut pairs = Vec::with_capacity(lines.len() / 2);
    for (n, chunk) in lines.chunks(2).enumerate() {
        let code_raw = chunk[0];
        let code: i32 = code_raw
            .trim()
            .parse()
            .map_err(|_| DxfError::InvalidGroupCode {
                raw: code_raw.trim().to_string(),
                line: n * 2 + 1,
            })?;
        pairs.push(RawPair {
            code_line: code_raw.to_string(),
            code,
            value: chunk[1].to_string(),
        });
    }
    Ok(pairs)
}

/// Index of the next 0-group at or after `from`.
fn next_entity(pairs: &[RawPair], from: usize) -> usize {
    pairs[from..]
        .iter()
        .position(|p| p.code == 0)
        .map_or(pairs.len(), |offset| from + offset)
}

fn build_drawing(pairs: &[RawPair]) -> std::result::Result<Drawing, DxfError> {
    let mut drawing = Drawing::new();
    let mut section: Option<String> = None;
    let mut block: Option<(String, Vec<String>)> = None;
    let mut insert: Option<BlockInstance> = None;

    let mut i = 0usize;
    while i < pairs.len() {
        if pairs[i].code != 0 {
            i += 1;
            continue;
        }
        let kind = pairs[i].value.trim();
        let start = i + 1;
        let end = next_entity(pairs, start);
        let body = Body {
            pairs: &pairs[start..end],
            offset: start,
        };

        match kind {
            "SECTION" => section = body.get(2).map(|s| s.trim().to_string()),
            "ENDSEC" => {
                flush_insert(&mut drawing, &mut insert);
                section = None;
            }
            "EOF" => break,
            _ => match section.as_deref() {
                Some("BLOCKS") => match kind {
                    "BLOCK" => {
                        let name = body.get(2).unwrap_or_default().trim().to_string();
                        let flags = body.int(70, "BLOCK")?.unwrap_or(0);
                        // layout blocks and anonymous blocks never carry template fields
                        let skip = name.is_empty() || name.starts_with('*') || flags & 1 != 0;
                        block = (!skip).then(|| (name, Vec::new()));
                    }
                    "ATTDEF" => {
                        if let (Some((_, tags)), Some(tag)) = (block.as_mut(), body.get(2)) {
                            let tag = tag.trim().to_string();
                            if !tags.contains(&tag) {
                                tags.push(tag);
                            }
                        }
                    }
                    "ENDBLK" => {
                        if let Some((name, tags)) = block.take() {
                            if !tags.is_empty() {
                                drawing.block_definitions.insert(name, tags);
                            }
                        }
                    }
                    _ => {}
                },
                Some("ENTITIES") => match kind {
                    "INSERT" => {
                        flush_insert(&mut drawing, &mut insert);
                        insert = Some(parse_insert(&body, drawing.instances.len())?);
                    }
                    "ATTRIB" => {
                        if let Some(owner) = insert.as_mut() {
                            owner.fields.push(parse_attrib(&body)?);
                        }
                    }
                    _ => flush_insert(&mut drawing, &mut insert),
                },
                _ => {}
            },
        }
        i = end;
    }
    flush_insert(&mut drawing, &mut insert);
    Ok(drawing)
}

fn flush_insert(drawing: &mut Drawing, insert: &mut Option<BlockInstance>) {
    if let Some(instance) = insert.take() {
        drawing.instances.push(instance);
    }
}

/// Groups of one entity, without its leading 0-group.
struct Body<'a> {
    pairs: &'a [RawPair],
    /// Index of `pairs[0]` in the whole file.
    offset: usize,
}

impl<'a> Body<'a> {
    fn position(&self, code: i32) -> Option<usize> {
        self.pairs.iter().position(|p| p.code == code)
    }

    fn get(&self, code: i32) -> Option<&'a str> {
        self.position(code).map(|idx| self.pairs[idx].value.as_str())
    }

    /// 1-based file line of the value of pair `idx`.
    fn line(&self, idx: usize) -> usize {
        (self.offset + idx) * 2 + 2
    }

    fn float(&self, code: i32, entity: &'static str) -> std::result::Result<Option<f64>, DxfError> {
        let Some(idx) = self.position(code) else {
            return Ok(None);
        };
        let raw = self.pairs[idx].value.trim();
        raw.parse::<f64>()
            .map(Some)
            .map_err(|_| DxfError::InvalidNumber {
                entity,
                code,
                raw: raw.to_string(),
                line: self.line(idx),
            })
    }

    fn int(&self, code: i32, entity: &'static str) -> std::result::Result<Option<i16>, DxfError> {
        let Some(idx) = self.position(code) else {
            return Ok(None);
        };
        let raw = self.pairs[idx].value.trim();
        raw.parse::<i16>()
            .map(Some)
            .map_err(|_| DxfError::InvalidNumber {
                entity,
                code,
                raw: raw.to_string(),
                line: self.line(idx),
            })
    }
}

fn parse_insert(body: &Body<'_>, ordinal: usize) -> std::result::Result<BlockInstance, DxfError> {
    let block_name = body.get(2).unwrap_or_default().trim().to_string();
    let id = match body.get(5) {
        Some(handle) => handle.trim().to_string(),
        None => format!("#{ordinal}"),
    };
    let space = match body.int(67, "INSERT")? {
        Some(1) => Space::Paper,
        _ => Space::Model,
    };
    Ok(BlockInstance::new(id, block_name).in_space(space))
}

fn parse_attrib(body: &Body<'_>) -> std::result::Result<AttributeField, DxfError> {
    const ENTITY: &str = "ATTRIB";

    let tag_idx = body.position(2).ok_or(DxfError::MissingTag {
        line: body.line(0).saturating_sub(2),
    })?;
    let tag = body.pairs[tag_idx].value.trim().to_string();

    let (text, slot) = match body.position(1) {
        Some(idx) => (
            body.pairs[idx].value.clone(),
            TextSlot::Replace(body.offset + idx),
        ),
        None => (String::new(), TextSlot::InsertAfter(body.offset + tag_idx)),
    };

    let insert = Point2::new(
        body.float(10, ENTITY)?.unwrap_or(0.0),
        body.float(20, ENTITY)?.unwrap_or(0.0),
    );
    let height = body.float(40, ENTITY)?.unwrap_or(DEFAULT_TEXT_HEIGHT);
    let halign = HAlign::from_code(body.int(72, ENTITY)?.unwrap_or(0));
    let valign = VAlign::from_code(body.int(74, ENTITY)?.unwrap_or(0));

    let mut field = AttributeField::new(tag, text, insert, height).with_alignment(halign, valign);
    if let Some(handle) = body.get(5) {
        field = field.with_handle(handle.trim());
    }
    field.slot = Some(slot);
    Ok(field)
}

/// DXF text values are single-line.
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

pub fn render(drawing: &Drawing) -> String {
    match &drawing.source {
        Some(source) => render_source(source, drawing),
        None => render_minimal(drawing),
    }
}

fn render_source(source: &DxfSource, drawing: &Drawing) -> String {
    let mut replace: HashMap<usize, String> = HashMap::new();
    let mut insert_after: HashMap<usize, String> = HashMap::new();

    for instance in &drawing.instances {
        for field in instance.fields.iter().filter(|f| f.is_modified()) {
            let text = single_line(field.text());
            match field.slot {
                Some(TextSlot::Replace(idx)) => {
                    replace.insert(idx, text);
                }
                Some(TextSlot::InsertAfter(idx)) => {
                    insert_after.insert(idx, text);
                }
                None => warn!(
                    target: STORE,
                    instance = %instance.id,
                    tag = %field.tag,
                    "field was not read from this file, its text is not written"
                ),
            }
        }
    }

    let eol = source.line_ending;
    let mut out = String::new();
    if source.bom {
        out.push('\u{feff}');
    }
    for (idx, pair) in source.pairs.iter().enumerate() {
        out.push_str(&pair.code_line);
        out.push_str(eol);
        out.push_str(replace.get(&idx).map_or(pair.value.as_str(), String::as_str));
        out.push_str(eol);
        if let Some(text) = insert_after.get(&idx) {
            out.push_str("  1");
            out.push_str(eol);
            out.push_str(text);
            out.push_str(eol);
        }
    }
    if !source.trailing_newline && out.ends_with(eol) {
        out.truncate(out.len() - eol.len());
    }
    out
}

fn push_pair(out: &mut String, code: i32, value: impl AsRef<str>) {
    out.push_str(&format!("{code:>3}"));
    out.push('\n');
    out.push_str(value.as_ref());
    out.push('\n');
}

/// Writes a drawing that was built in memory rather than read from a file.
fn render_minimal(drawing: &Drawing) -> String {
    let mut out = String::new();

    push_pair(&mut out, 0, "SECTION");
    push_pair(&mut out, 2, "BLOCKS");
    for (name, tags) in &drawing.block_definitions {
        push_pair(&mut out, 0, "BLOCK");
        push_pair(&mut out, 8, "0");
        push_pair(&mut out, 2, name);
        push_pair(&mut out, 70, "2");
        push_pair(&mut out, 10, "0");
        push_pair(&mut out, 20, "0");
        push_pair(&mut out, 30, "0");
        push_pair(&mut out, 3, name);
        for tag in tags {
            push_pair(&mut out, 0, "ATTDEF");
            push_pair(&mut out, 8, "0");
            push_pair(&mut out, 10, "0");
            push_pair(&mut out, 20, "0");
            push_pair(&mut out, 30, "0");
            push_pair(&mut out, 40, DEFAULT_TEXT_HEIGHT.to_string());
            push_pair(&mut out, 1, "");
            push_pair(&mut out, 3, tag);
            push_pair(&mut out, 2, tag);
            push_pair(&mut out, 70, "0");
        }
        push_pair(&mut out, 0, "ENDBLK");
        push_pair(&mut out, 8, "0");
    }
    push_pair(&mut out, 0, "ENDSEC");

    push_pair(&mut out, 0, "SECTION");
    push_pair(&mut out, 2, "ENTITIES");
    for instance in &drawing.instances {
        push_pair(&mut out, 0, "INSERT");
        if !instance.id.starts_with('#') {
            push_pair(&mut out, 5, &instance.id);
        }
        if instance.space == Space::Paper {
            push_pair(&mut out, 67, "1");
        }
        push_pair(&mut out, 8, "0");
        if !instance.fields.is_empty() {
            push_pair(&mut out, 66, "1");
        }
        push_pair(&mut out, 2, &instance.block_name);
        push_pair(&mut out, 10, "0");
        push_pair(&mut out, 20, "0");
        push_pair(&mut out, 30, "0");
        for field in &instance.fields {
            push_pair(&mut out, 0, "ATTRIB");
            if let Some(handle) = &field.handle {
                push_pair(&mut out, 5, handle);
            }
            push_pair(&mut out, 8, "0");
            push_pair(&mut out, 10, field.insert.x.to_string());
            push_pair(&mut out, 20, field.insert.y.to_string());
            push_pair(&mut out, 30, "0");
            push_pair(&mut out, 40, field.height.to_string());
            push_pair(&mut out, 1, single_line(field.text()));
            push_pair(&mut out, 2, &field.tag);
            push_pair(&mut out, 70, "0");
            push_pair(&mut out, 72, field.halign.code().to_string());
            push_pair(&mut out, 74, field.valign.code().to_string());
        }
        if !instance.fields.is_empty() {
            push_pair(&mut out, 0, "SEQEND");
            push_pair(&mut out, 8, "0");
        }
    }
    push_pair(&mut out, 0, "ENDSEC");
    push_pair(&mut out, 0, "EOF");
    out
}
