//! In-memory model of a template drawing: block instances carrying tagged
//! attribute fields, plus the block definitions that declare those tags.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Width-to-height ratio used by the text extent estimate.
pub const TEXT_WIDTH_FACTOR: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Point2 { x, y }
    }
}

/// World-space axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        BBox {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
    /// Any other justification code; measured like `Left`.
    Other(i16),
}

impl HAlign {
    /// DXF group 72 value.
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => HAlign::Left,
            1 => HAlign::Center,
            2 => HAlign::Right,
            other => HAlign::Other(other),
        }
    }

    pub fn code(self) -> i16 {
        match self {
            HAlign::Left => 0,
            HAlign::Center => 1,
            HAlign::Right => 2,
            HAlign::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VAlign {
    #[default]
    Baseline,
    Bottom,
    Middle,
    Top,
    /// Any other justification code; measured like `Baseline`.
    Other(i16),
}

impl VAlign {
    /// DXF group 74 value.
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => VAlign::Baseline,
            1 => VAlign::Bottom,
            2 => VAlign::Middle,
            3 => VAlign::Top,
            other => VAlign::Other(other),
        }
    }

    pub fn code(self) -> i16 {
        match self {
            VAlign::Baseline => 0,
            VAlign::Bottom => 1,
            VAlign::Middle => 2,
            VAlign::Top => 3,
            VAlign::Other(code) => code,
        }
    }
}

/// Estimates the world-space region covered by a single line of text.
///
/// The width is a fixed multiple of the height rather than a font metric, and
/// any rotation, scale or offset of the owning block instance is ignored.
pub fn estimate_text_bbox(insert: Point2, height: f64, halign: HAlign, valign: VAlign) -> BBox {
    let h = height;
    let w = TEXT_WIDTH_FACTOR * h;
    let Point2 { x, y } = insert;

    let (xmin, xmax) = match halign {
        HAlign::Center => (x - w / 2.0, x + w / 2.0),
        HAlign::Right => (x - w, x),
        HAlign::Left | HAlign::Other(_) => (x, x + w),
    };
    let (ymin, ymax) = match valign {
        VAlign::Middle => (y - h / 2.0, y + h / 2.0),
        VAlign::Top => (y - h, y),
        VAlign::Baseline | VAlign::Bottom | VAlign::Other(_) => (y, y + h),
    };

    BBox::new(xmin, ymin, xmax, ymax)
}

/// One fillable, tagged text slot on a block instance.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeField {
    pub tag: String,
    text: String,
    pub insert: Point2,
    pub height: f64,
    pub halign: HAlign,
    pub valign: VAlign,
    /// Entity handle in the source document, when it has one.
    pub handle: Option<String>,
    pub(crate) dirty: bool,
    pub(crate) slot: Option<crate::dxf::TextSlot>,
}

impl AttributeField {
    pub fn new(tag: impl Into<String>, text: impl Into<String>, insert: Point2, height: f64) -> Self {
        AttributeField {
            tag: tag.into(),
            text: text.into(),
            insert,
            height,
            halign: HAlign::default(),
            valign: VAlign::default(),
            handle: None,
            dirty: false,
            slot: None,
        }
    }

    pub fn with_alignment(mut self, halign: HAlign, valign: VAlign) -> Self {
        self.halign = halign;
        self.valign = valign;
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// True once the text has been rewritten since the drawing was loaded.
    pub fn is_modified(&self) -> bool {
        self.dirty
    }

    pub fn bbox(&self) -> BBox {
        estimate_text_bbox(self.insert, self.height, self.halign, self.valign)
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.text = text;
        self.dirty = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Space {
    #[default]
    Model,
    Paper,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockInstance {
    /// Handle of the insert entity, or a positional id when it has none.
    pub id: String,
    pub block_name: String,
    pub space: Space,
    pub fields: Vec<AttributeField>,
}

impl BlockInstance {
    pub fn new(id: impl Into<String>, block_name: impl Into<String>) -> Self {
        BlockInstance {
            id: id.into(),
            block_name: block_name.into(),
            space: Space::Model,
            fields: Vec::new(),
        }
    }

    pub fn in_space(mut self, space: Space) -> Self {
        self.space = space;
        self
    }

    pub fn with_field(mut self, field: AttributeField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, tag: &str) -> Option<&AttributeField> {
        self.fields.iter().find(|f| f.tag == tag)
    }
}

/// A loaded template document.
///
/// `source` carries whatever the store that produced the drawing needs to
/// write it back without touching unrelated content.
#[derive(Debug, Clone, Default)]
pub struct Drawing {
    pub instances: Vec<BlockInstance>,
    /// Block name -> attribute-definition tags, in declaration order.
    pub block_definitions: IndexMap<String, Vec<String>>,
    pub(crate) source: Option<crate::dxf::DxfSource>,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(mut self, instance: BlockInstance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_block_definition<I, S>(mut self, block_name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.block_definitions
            .insert(block_name.into(), tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn model_space(&self) -> impl Iterator<Item = &BlockInstance> {
        self.instances.iter().filter(|i| i.space == Space::Model)
    }

    pub(crate) fn model_space_mut(&mut self) -> impl Iterator<Item = &mut BlockInstance> {
        self.instances.iter_mut().filter(|i| i.space == Space::Model)
    }

    /// Tag -> owning block names, in first-seen order.
    ///
    /// Collects attribute definitions first, then tags seen on model-space
    /// instances whose block does not declare them.
    pub fn field_tags(&self) -> IndexMap<String, Vec<String>> {
        let mut tags: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut add = |tag: &str, block: &str| {
            let owners = tags.entry(tag.to_string()).or_default();
            if !owners.iter().any(|b| b == block) {
                owners.push(block.to_string());
            }
        };

        for (block, defs) in &self.block_definitions {
            for tag in defs {
                add(tag.as_str(), block.as_str());
            }
        }
        for instance in self.model_space() {
            for field in &instance.fields {
                add(field.tag.as_str(), instance.block_name.as_str());
            }
        }
        tags
    }

    pub fn find_field(&self, instance_id: &str, tag: &str) -> Option<&AttributeField> {
        self.instances
            .iter()
            .find(|i| i.id == instance_id)
            .and_then(|i| i.field(tag))
    }
}
