#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use tagfill::{
    AttributeField, BlockInstance, DocumentStore, Drawing, Error, HAlign, Point2, Result, Row,
    Space, VAlign,
};

static INIT: Once = Once::new();

pub fn setup() {
    INIT.call_once(|| {
        tagfill::logging::init_logging(false);
    });
}

pub const TEMPLATE: &str = "templates/title.dxf";

/// Title block with a filled PROJECTNAME (right/top aligned at 100,50), an
/// empty DATE, and a paper-space copy of the same block.
pub const SAMPLE_DXF: &str = "  0
SECTION
  2
BLOCKS
  0
BLOCK
  2
TITLE
 70
2
  0
ATTDEF
  2
PROJECTNAME
  0
ATTDEF
  2
DATE
  0
ENDBLK
  0
ENDSEC
  0
SECTION
  2
ENTITIES
  0
INSERT
  5
1F
  2
TITLE
 66
1
  0
ATTRIB
  5
20
 10
100.0
 20
50.0
 40
2.5
  1
OLD NAME
  2
PROJECTNAME
 72
2
 74
3
  0
ATTRIB
  5
21
 10
100.0
 20
40.0
  1
2020-01-01
  2
DATE
  0
SEQEND
  0
INSERT
  5
2A
 67
1
  2
TITLE
 66
1
  0
ATTRIB
  5
2B
 10
10.0
 20
10.0
  1
PAPER NAME
  2
PROJECTNAME
  0
SEQEND
  0
ENDSEC
  0
EOF
";

/// Builds in-memory drawings without going through a store.
#[derive(Default)]
pub struct DrawingBuilder {
    drawing: Drawing,
    current: Option<BlockInstance>,
}

impl DrawingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(mut self, id: &str, block_name: &str) -> Self {
        self.flush();
        self.current = Some(BlockInstance::new(id, block_name));
        self
    }

    pub fn paper_block(mut self, id: &str, block_name: &str) -> Self {
        self.flush();
        self.current = Some(BlockInstance::new(id, block_name).in_space(Space::Paper));
        self
    }

    pub fn field(self, tag: &str, text: &str) -> Self {
        self.aligned_field(tag, text, Point2::new(0.0, 0.0), 2.5, HAlign::Left, VAlign::Baseline)
    }

    pub fn aligned_field(
        mut self,
        tag: &str,
        text: &str,
        insert: Point2,
        height: f64,
        halign: HAlign,
        valign: VAlign,
    ) -> Self {
        let field = AttributeField::new(tag, text, insert, height).with_alignment(halign, valign);
        let instance = self
            .current
            .take()
            .expect("call block() before field()")
            .with_field(field);
        self.current = Some(instance);
        self
    }

    pub fn definition(mut self, block_name: &str, tags: &[&str]) -> Self {
        self.drawing = self.drawing.with_block_definition(block_name, tags.iter().copied());
        self
    }

    fn flush(&mut self) {
        if let Some(instance) = self.current.take() {
            self.drawing = std::mem::take(&mut self.drawing).with_instance(instance);
        }
    }

    pub fn build(mut self) -> Drawing {
        self.flush();
        self.drawing
    }
}

/// The usual title block: one model-space TITLE instance with
/// PROJECTNAME, ADDRESS and DATE.
pub fn title_block() -> Drawing {
    DrawingBuilder::new()
        .definition("TITLE", &["PROJECTNAME", "ADDRESS", "DATE"])
        .block("1F", "TITLE")
        .aligned_field(
            "PROJECTNAME",
            "OLD NAME",
            Point2::new(100.0, 50.0),
            2.5,
            HAlign::Right,
            VAlign::Top,
        )
        .field("ADDRESS", "")
        .field("DATE", "2020-01-01")
        .build()
}

/// `DocumentStore` over a map of drawings, counting loads and recording saves.
#[derive(Default)]
pub struct MemoryStore {
    templates: Mutex<HashMap<PathBuf, Drawing>>,
    saved: Mutex<Vec<(PathBuf, Drawing)>>,
    fail_saves_containing: Vec<String>,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
    loads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, path: impl Into<PathBuf>, drawing: Drawing) -> Self {
        self.templates.lock().unwrap().insert(path.into(), drawing);
        self
    }

    /// Saves to a path whose file name contains `fragment` fail with an I/O error.
    pub fn failing_saves(mut self, fragment: &str) -> Self {
        self.fail_saves_containing.push(fragment.to_string());
        self
    }

    /// Raises `flag` once `saves` drawings have been saved.
    pub fn cancel_after(mut self, saves: usize, flag: Arc<AtomicBool>) -> Self {
        self.cancel_after = Some((saves, flag));
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn saved(&self, path: &Path) -> Option<Drawing> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, d)| d.clone())
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, path: &Path) -> Result<Drawing> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.templates
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn save(&self, drawing: &Drawing, path: &Path) -> Result<()> {
        let name = path.file_name().unwrap().to_string_lossy();
        if self.fail_saves_containing.iter().any(|f| name.contains(f.as_str())) {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push((path.to_path_buf(), drawing.clone()));
        if let Some((after, flag)) = &self.cancel_after {
            if saved.len() >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

pub fn text_of(drawing: &Drawing, instance: &str, tag: &str) -> String {
    drawing
        .find_field(instance, tag)
        .unwrap_or_else(|| panic!("no field {tag} on {instance}"))
        .text()
        .to_string()
}

pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs.iter().map(|(c, v)| (*c, *v)).collect()
}
