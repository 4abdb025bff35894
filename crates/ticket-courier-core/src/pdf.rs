use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::debug;

use crate::config::RedactionConfig;
use crate::error::Error;

/// Used when a page tree carries no MediaBox at all (US Letter).
const DEFAULT_PAGE_BOX: PageBox = PageBox {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

/// Document editing the redaction stage depends on.
pub trait DocumentEditor {
    /// Cover the configured region on every page of `input` and write the
    /// result to `output`. Returns the number of pages touched.
    fn cover_region(&self, input: &Path, output: &Path, redaction: &RedactionConfig) -> Result<usize, Error>;

    /// Trim `height` points off the bottom of every page.
    fn crop_bottom(&self, input: &Path, output: &Path, height: f32) -> Result<usize, Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEditor;

impl DocumentEditor for LopdfEditor {
    fn cover_region(&self, input: &Path, output: &Path, redaction: &RedactionConfig) -> Result<usize, Error> {
        let mut doc = PdfDocument::open(input)?;
        let pages = doc.page_ids();
        for page_id in &pages {
            doc.draw_opaque_rect(*page_id, redaction.region, redaction.fill)?;
        }
        doc.save(output)?;
        Ok(pages.len())
    }

    fn crop_bottom(&self, input: &Path, output: &Path, height: f32) -> Result<usize, Error> {
        let mut doc = PdfDocument::open(input)?;
        let pages = doc.page_ids();
        for page_id in &pages {
            doc.crop_bottom(*page_id, height)?;
        }
        doc.save(output)?;
        Ok(pages.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    fn from_array(values: &[Object], doc: &Document) -> Option<Self> {
        let nums: Vec<f32> = values.iter().filter_map(|o| number(resolve(doc, o))).collect();
        if nums.len() != 4 {
            return None;
        }
        Some(Self {
            llx: nums[0].min(nums[2]),
            lly: nums[1].min(nums[3]),
            urx: nums[0].max(nums[2]),
            ury: nums[1].max(nums[3]),
        })
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// Convert a top-left-origin `[x0, y0, x1, y1]` region into a PDF
    /// rectangle `(x, y, width, height)` in user space.
    pub fn to_pdf_rect(&self, region: [f32; 4]) -> (f32, f32, f32, f32) {
        let [x0, y0, x1, y1] = region;
        (self.llx + x0, self.ury - y1, x1 - x0, y1 - y0)
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// An opened PDF. Dropping it closes it.
pub struct PdfDocument {
    doc: Document,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let doc = Document::load(path)?;
        Ok(Self { doc })
    }

    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    /// Visible page area: CropBox if present, else MediaBox, both
    /// inheritable from ancestors in the page tree.
    pub fn page_box(&self, page_id: ObjectId) -> PageBox {
        self.inherited_box(page_id, b"CropBox")
            .or_else(|| self.inherited_box(page_id, b"MediaBox"))
            .unwrap_or(DEFAULT_PAGE_BOX)
    }

    fn inherited_box(&self, page_id: ObjectId, key: &[u8]) -> Option<PageBox> {
        let mut current = Some(page_id);
        // page trees are shallow; the bound guards against Parent cycles
        for _ in 0..32 {
            let id = current?;
            let dict = self.doc.get_object(id).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                if let Object::Array(values) = resolve(&self.doc, value) {
                    return PageBox::from_array(values, &self.doc);
                }
            }
            current = match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => Some(*parent),
                _ => None,
            };
        }
        None
    }

    /// Paint an opaque rectangle over `region` (top-left origin) on top of
    /// the existing page content.
    pub fn draw_opaque_rect(&mut self, page_id: ObjectId, region: [f32; 4], fill: [f32; 3]) -> Result<(), Error> {
        let (x, y, width, height) = self.page_box(page_id).to_pdf_rect(region);
        debug!(
            "Covering x={} y={} w={} h={} on page {:?}",
            x, y, width, height, page_id
        );

        let overlay = Content {
            operations: vec![
                Operation::new("Q", vec![]),
                Operation::new("q", vec![]),
                Operation::new(
                    "rg",
                    fill.iter().map(|c| Object::Real(*c)).collect(),
                ),
                Operation::new(
                    "re",
                    vec![
                        Object::Real(x),
                        Object::Real(y),
                        Object::Real(width),
                        Object::Real(height),
                    ],
                ),
                Operation::new("f", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        let save_state = Content {
            operations: vec![Operation::new("q", vec![])],
        };

        let existing = self.content_refs(page_id)?;
        let mut contents = Vec::with_capacity(existing.len() + 2);
        if existing.is_empty() {
            // nothing to isolate; drop the leading Q
            let mut ops = overlay.operations;
            ops.remove(0);
            let stream_id = self.add_stream(Content { operations: ops })?;
            contents.push(Object::Reference(stream_id));
        } else {
            let save_id = self.add_stream(save_state)?;
            let overlay_id = self.add_stream(overlay)?;
            contents.push(Object::Reference(save_id));
            contents.extend(existing);
            contents.push(Object::Reference(overlay_id));
        }

        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    pub fn crop_bottom(&mut self, page_id: ObjectId, height: f32) -> Result<(), Error> {
        let page_box = self.page_box(page_id);
        if height < 0.0 || height >= page_box.height() {
            return Err(Error::Other(format!(
                "crop height {} does not fit page height {}",
                height,
                page_box.height()
            )));
        }
        let crop = vec![
            Object::Real(page_box.llx),
            Object::Real(page_box.lly + height),
            Object::Real(page_box.urx),
            Object::Real(page_box.ury),
        ];
        self.page_dict_mut(page_id)?.set("CropBox", Object::Array(crop));
        Ok(())
    }

    pub fn save(&mut self, path: &Path) -> Result<(), Error> {
        self.doc.save(path)?;
        Ok(())
    }

    fn add_stream(&mut self, content: Content) -> Result<ObjectId, Error> {
        let bytes = content.encode()?;
        Ok(self.doc.add_object(Stream::new(Dictionary::new(), bytes)))
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, Error> {
        Ok(self.doc.get_object_mut(page_id)?.as_dict_mut()?)
    }

    /// Existing `/Contents` of a page as a flat list of stream references.
    fn content_refs(&self, page_id: ObjectId) -> Result<Vec<Object>, Error> {
        let page = self.doc.get_object(page_id)?.as_dict()?;
        let contents = match page.get(b"Contents") {
            Ok(contents) => contents,
            Err(_) => return Ok(Vec::new()),
        };
        let refs = match contents {
            Object::Reference(id) => match self.doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Object::Array(items) => items.clone(),
            Object::Stream(_) => {
                return Err(Error::Other(format!(
                    "page {:?} has a direct content stream, expected a reference",
                    page_id
                )));
            }
            _ => Vec::new(),
        };
        Ok(refs)
    }
}
