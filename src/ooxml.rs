//! Container access for ZIP-packaged OOXML documents, plus the XML helpers
//! shared by the DOCX and PPTX modules.
//!
//! A package is read fully into memory on open, parts in archive order.
//! Mutation happens through whole-part replacement; `save` serializes every
//! part back out, so all untouched content round-trips byte-for-byte.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

use crate::error::Error;
use crate::model::DocumentFormat;

pub const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

struct Part {
    name: String,
    data: Vec<u8>,
}

/// Part content types from `[Content_Types].xml`: Override entries keyed
/// by part name, Default entries keyed by extension.
#[derive(Default)]
pub struct ContentTypes {
    defaults: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    fn parse(xml: &str) -> Self {
        let mut types = ContentTypes::default();
        let Ok(doc) = roxmltree::Document::parse(xml) else {
            return types;
        };
        for node in doc.root_element().children() {
            match node.tag_name().name() {
                "Default" => {
                    if let (Some(ext), Some(ct)) =
                        (node.attribute("Extension"), node.attribute("ContentType"))
                    {
                        types.defaults.insert(ext.to_ascii_lowercase(), ct.to_string());
                    }
                }
                "Override" => {
                    if let (Some(part), Some(ct)) =
                        (node.attribute("PartName"), node.attribute("ContentType"))
                    {
                        types
                            .overrides
                            .insert(part.trim_start_matches('/').to_string(), ct.to_string());
                    }
                }
                _ => {}
            }
        }
        types
    }

    /// Content type for a part name (without leading slash): an Override
    /// entry wins, then the extension's Default.
    pub fn for_part(&self, part: &str) -> Option<&str> {
        if let Some(ct) = self.overrides.get(part) {
            return Some(ct.as_str());
        }
        let ext = part.rsplit('.').next()?.to_ascii_lowercase();
        self.defaults.get(&ext).map(String::as_str)
    }
}

pub struct OoxmlPackage {
    parts: Vec<Part>,
    index: HashMap<String, usize>,
    content_types: ContentTypes,
}

impl OoxmlPackage {
    /// Open and fully read a package, validating the file extension against
    /// the expected format before any parsing.
    pub fn open(path: &Path, format: DocumentFormat) -> Result<Self, Error> {
        if !path.exists() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }
        let expected = match format {
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Pdf => "pdf",
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if ext.as_deref() != Some(expected) {
            return Err(Error::FormatMismatch {
                path: path.to_path_buf(),
                detail: format!("expected a .{expected} file"),
            });
        }

        let file = File::open(path).map_err(Error::Io)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|_| Error::CorruptContainer {
            detail: format!("{}: file is not a ZIP archive", path.display()),
        })?;

        let mut parts = Vec::with_capacity(zip.len());
        let mut index = HashMap::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| Error::CorruptContainer {
                detail: format!("unreadable archive entry {i}: {e}"),
            })?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::CorruptContainer {
                    detail: format!("failed to read part {name}: {e}"),
                })?;
            index.insert(name.clone(), parts.len());
            parts.push(Part { name, data });
        }

        let mut package = OoxmlPackage {
            parts,
            index,
            content_types: ContentTypes::default(),
        };
        if let Some(xml) = package.part_text("[Content_Types].xml") {
            package.content_types = ContentTypes::parse(&xml);
        }
        Ok(package)
    }

    /// Declared content type of a part, from `[Content_Types].xml`.
    pub fn content_type_for(&self, part_name: &str) -> Option<&str> {
        self.content_types.for_part(part_name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.index.get(name).map(|&i| self.parts[i].data.as_slice())
    }

    /// Read a part as UTF-8 text. Returns `None` when the part is missing
    /// or not valid UTF-8.
    pub fn part_text(&self, name: &str) -> Option<String> {
        self.part(name)
            .and_then(|data| String::from_utf8(data.to_vec()).ok())
    }

    pub fn replace_part(&mut self, name: &str, data: Vec<u8>) {
        match self.index.get(name) {
            Some(&i) => self.parts[i].data = data,
            None => {
                self.index.insert(name.to_string(), self.parts.len());
                self.parts.push(Part {
                    name: name.to_string(),
                    data,
                });
            }
        }
    }

    /// Relationships for a part, e.g. "word/document.xml" →
    /// "word/_rels/document.xml.rels". Missing rels parts yield an empty map.
    pub fn rels_for(&self, part_name: &str) -> HashMap<String, String> {
        let Some(xml) = self.part_text(&rels_path_for(part_name)) else {
            return HashMap::new();
        };
        parse_rels_xml(&xml)
    }

    /// Serialize the whole package to `out`, every part in original order.
    pub fn save(&self, out: &Path) -> Result<(), Error> {
        let save_err = |e: std::io::Error| Error::Save {
            path: out.to_path_buf(),
            source: e,
        };
        let file = File::create(out).map_err(save_err)?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for part in &self.parts {
            writer
                .start_file(part.name.as_str(), options)
                .map_err(|e| save_err(std::io::Error::other(e)))?;
            writer.write_all(&part.data).map_err(save_err)?;
        }
        writer
            .finish()
            .map_err(|e| save_err(std::io::Error::other(e)))?;
        Ok(())
    }
}

/// Rels part path for a given part:
/// "ppt/slides/slide1.xml" → "ppt/slides/_rels/slide1.xml.rels".
pub fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

pub fn parse_rels_xml(xml: &str) -> HashMap<String, String> {
    let mut rels = HashMap::new();
    let Ok(doc) = roxmltree::Document::parse(xml) else {
        return rels;
    };
    for node in doc.root_element().children() {
        if node.tag_name().name() == "Relationship"
            && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
        {
            rels.insert(id.to_string(), target.to_string());
        }
    }
    rels
}

/// Resolve a relationship target against the directory of the referencing
/// part. Package-absolute targets start with '/'; relative ones may climb
/// with "..", e.g. "../media/image1.png" from "ppt/slides".
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut components: Vec<&str> = base_dir.split('/').filter(|c| !c.is_empty()).collect();
    for piece in target.split('/') {
        match piece {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }
    components.join("/")
}

/// Find a direct child element by namespace and local name.
pub fn child<'a>(
    node: roxmltree::Node<'a, 'a>,
    ns: &str,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(ns))
}

/// Byte range of an element's start tag within the source text. Scans for
/// the closing '>' outside quoted attribute values.
pub fn start_tag_range(xml: &str, node: roxmltree::Node) -> Range<usize> {
    let start = node.range().start;
    let bytes = xml.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = start;
    while i < bytes.len() {
        match (quote, bytes[i]) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(bytes[i]),
            (None, b'>') => return start..i + 1,
            _ => {}
        }
        i += 1;
    }
    start..bytes.len()
}

pub fn attr_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

struct AttrSpan {
    name: Range<usize>,
    value: Range<usize>,
}

/// Scan attribute name/value spans in a start tag. The input is trusted to
/// be well-formed (it came out of a successful roxmltree parse).
fn scan_attrs(tag: &str) -> Vec<AttrSpan> {
    let bytes = tag.as_bytes();
    let mut attrs = Vec::new();
    // Skip "<name"
    let mut i = 1;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/'
    {
        i += 1;
    }
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'>' || bytes[i] == b'/' {
            break;
        }
        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let name_end = i;
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'=') {
            i += 1;
        }
        if i >= bytes.len() || (bytes[i] != b'"' && bytes[i] != b'\'') {
            break;
        }
        let q = bytes[i];
        let value_start = i + 1;
        i = value_start;
        while i < bytes.len() && bytes[i] != q {
            i += 1;
        }
        attrs.push(AttrSpan {
            name: name_start..name_end,
            value: value_start..i,
        });
        i += 1;
    }
    attrs
}

/// Rewrite a start tag, setting each named attribute to the given value.
/// Existing attributes keep their position; missing ones are appended
/// before the closing bracket. Everything else is preserved verbatim.
pub fn set_start_tag_attrs(tag: &str, updates: &[(&str, &str)]) -> String {
    let mut out = tag.to_string();
    for &(name, value) in updates {
        // Re-scan after each edit; earlier replacements shift byte offsets.
        let spans = scan_attrs(&out);
        if let Some(span) = spans.iter().find(|s| &out[s.name.clone()] == name) {
            let range = span.value.clone();
            out.replace_range(range, &attr_escape(value));
        } else {
            let insert_at = if out.ends_with("/>") {
                out.len() - 2
            } else {
                out.len() - 1
            };
            out.insert_str(insert_at, &format!(" {}=\"{}\"", name, attr_escape(value)));
        }
    }
    out
}
