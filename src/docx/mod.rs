//! DOCX image extraction and alt-text assembly.
//!
//! Both directions run the same paragraph walk over `word/document.xml`:
//! the extractor numbers every `a:blip` it can reach from each paragraph,
//! and the assembler re-runs the walk to resolve an `img-P-S` id back to
//! the exact drawing it came from.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use std::path::Path;

use crate::error::{Error, ItemError, ItemFailure};
use crate::id::{docx_image_id, parse_docx_image_id};
use crate::model::{
    AltTextAssignment, AnchorKind, ApplyStatus, DocumentFormat, Extraction, ImageRecord, Position,
    RasterFormat,
};
use crate::normalize;
use crate::ooxml::{self, DML_NS, OoxmlPackage, REL_NS};

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const WPD_NS: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";

const DOCUMENT_PART: &str = "word/document.xml";

/// One image reference found during the paragraph walk.
struct BlipRef<'a> {
    paragraph_index: usize,
    seq: usize,
    node: roxmltree::Node<'a, 'a>,
}

fn is_blip(n: &roxmltree::Node) -> bool {
    n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS)
}

/// Walk body paragraphs in document order and number every reachable blip.
///
/// A floating drawing's blip can be reached both through the run subtree
/// and through the whole-paragraph search, so references are deduplicated
/// by arena node id, never by content: two pixel-identical images in one
/// paragraph are still two references. Returns the references plus the
/// total paragraph count (the assembler needs it for range checks).
fn collect_paragraph_blips<'a>(
    doc: &'a roxmltree::Document<'a>,
) -> Result<(Vec<BlipRef<'a>>, usize), Error> {
    let body = ooxml::child(doc.root_element(), WML_NS, "body").ok_or_else(|| {
        Error::CorruptContainer {
            detail: "missing w:body in word/document.xml".into(),
        }
    })?;

    let mut refs = Vec::new();
    let mut paragraph_count = 0;
    for para in body
        .children()
        .filter(|n| n.tag_name().name() == "p" && n.tag_name().namespace() == Some(WML_NS))
    {
        let paragraph_index = paragraph_count;
        paragraph_count += 1;

        let mut seen: HashSet<roxmltree::NodeId> = HashSet::new();
        let mut seq = 0;
        let mut push_unique = |node: roxmltree::Node<'a, 'a>| {
            if seen.insert(node.id()) {
                refs.push(BlipRef {
                    paragraph_index,
                    seq,
                    node,
                });
                seq += 1;
            }
        };

        // Inline pass: blips reachable through runs.
        for run in para
            .descendants()
            .filter(|n| n.tag_name().name() == "r" && n.tag_name().namespace() == Some(WML_NS))
        {
            for blip in run.descendants().filter(is_blip) {
                push_unique(blip);
            }
        }
        // Whole-paragraph pass catches anchored drawings outside runs.
        for blip in para.descendants().filter(is_blip) {
            push_unique(blip);
        }
    }
    Ok((refs, paragraph_count))
}

/// The `wp:inline` or `wp:anchor` container a blip hangs off.
fn drawing_container<'a>(blip: roxmltree::Node<'a, 'a>) -> Option<roxmltree::Node<'a, 'a>> {
    blip.ancestors().find(|n| {
        (n.tag_name().name() == "inline" || n.tag_name().name() == "anchor")
            && n.tag_name().namespace() == Some(WPD_NS)
    })
}

fn anchor_kind(blip: roxmltree::Node) -> AnchorKind {
    // Single ancestor check, same heuristic for drawings nested in text
    // boxes or tables.
    if blip
        .ancestors()
        .any(|n| n.tag_name().name() == "anchor" && n.tag_name().namespace() == Some(WPD_NS))
    {
        AnchorKind::Floating
    } else {
        AnchorKind::Inline
    }
}

/// Pre-existing alt text from the drawing's `wp:docPr`: title first, then
/// descr, first non-empty wins.
fn existing_alt_text(blip: roxmltree::Node) -> Option<String> {
    let doc_pr = drawing_container(blip).and_then(|c| ooxml::child(c, WPD_NS, "docPr"))?;
    for attr in ["title", "descr"] {
        if let Some(value) = doc_pr.attribute(attr) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

pub struct DocxExtractor {
    package: OoxmlPackage,
    document_xml: String,
    rels: HashMap<String, String>,
}

impl DocxExtractor {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let package = OoxmlPackage::open(path, DocumentFormat::Docx)?;
        let document_xml =
            package
                .part_text(DOCUMENT_PART)
                .ok_or_else(|| Error::CorruptContainer {
                    detail: "missing word/document.xml (is this a DOCX file?)".into(),
                })?;
        let rels = package.rels_for(DOCUMENT_PART);
        log::info!(
            "DOCX loaded: {} ({} relationships)",
            path.display(),
            rels.len()
        );
        Ok(DocxExtractor {
            package,
            document_xml,
            rels,
        })
    }

    pub fn format_tag(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    pub fn extract_images(&self) -> Result<Extraction, Error> {
        let doc = parse_document_xml(&self.document_xml)?;
        let (blips, _) = collect_paragraph_blips(&doc)?;

        let mut extraction = Extraction::default();
        for blip in &blips {
            match self.extract_one(blip) {
                Ok(record) => {
                    log::debug!(
                        "extracted {} ({:?}, {}x{})",
                        record.image_id,
                        record.format,
                        record.width_px,
                        record.height_px
                    );
                    extraction.images.push(record);
                }
                Err(error) => {
                    let context =
                        format!("paragraph {}, image {}", blip.paragraph_index, blip.seq);
                    log::warn!("skipping image at {context}: {error}");
                    extraction.failures.push(ItemFailure { context, error });
                }
            }
        }
        log::info!(
            "DOCX extraction complete: {} images, {} skipped",
            extraction.images.len(),
            extraction.failures.len()
        );
        Ok(extraction)
    }

    fn extract_one(&self, blip: &BlipRef) -> Result<ImageRecord, ItemError> {
        let rel_id =
            blip.node
                .attribute((REL_NS, "embed"))
                .ok_or_else(|| ItemError::MissingRelationship {
                    rel_id: "(no r:embed attribute)".into(),
                })?;
        let target = self
            .rels
            .get(rel_id)
            .ok_or_else(|| ItemError::MissingRelationship {
                rel_id: rel_id.to_string(),
            })?;
        let part = ooxml::resolve_target("word", target);
        let raw = self
            .package
            .part(&part)
            .ok_or_else(|| ItemError::MissingPart { part: part.clone() })?;

        let declared = match self.package.content_type_for(&part) {
            Some(content_type) => RasterFormat::from_content_type(content_type),
            None => part.rsplit('.').next().and_then(RasterFormat::from_extension),
        };
        let norm = normalize::normalize(raw, declared)?;

        let image_id = docx_image_id(blip.paragraph_index, blip.seq);
        Ok(ImageRecord {
            filename: format!("{image_id}.{}", norm.format.extension()),
            image_id,
            format: norm.format,
            size_bytes: norm.bytes.len() as u64,
            width_px: norm.width,
            height_px: norm.height,
            bytes: norm.bytes,
            page_or_slide: None,
            position: Position::Docx {
                paragraph_index: blip.paragraph_index,
                anchor: anchor_kind(blip.node),
            },
            existing_alt_text: existing_alt_text(blip.node),
        })
    }
}

fn parse_document_xml(xml: &str) -> Result<roxmltree::Document<'_>, Error> {
    roxmltree::Document::parse(xml).map_err(|e| Error::CorruptContainer {
        detail: format!("word/document.xml is not well-formed XML: {e}"),
    })
}

pub struct DocxAssembler {
    package: OoxmlPackage,
}

impl DocxAssembler {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let package = OoxmlPackage::open(path, DocumentFormat::Docx)?;
        if package.part(DOCUMENT_PART).is_none() {
            return Err(Error::CorruptContainer {
                detail: "missing word/document.xml (is this a DOCX file?)".into(),
            });
        }
        Ok(DocxAssembler { package })
    }

    pub fn format_tag(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    /// Apply each assignment, accumulating a per-id status. One bad id
    /// never blocks the rest; only a corrupt document part is fatal.
    pub fn apply(
        &mut self,
        assignments: &[AltTextAssignment],
    ) -> Result<BTreeMap<String, ApplyStatus>, Error> {
        let xml = self
            .package
            .part_text(DOCUMENT_PART)
            .ok_or_else(|| Error::CorruptContainer {
                detail: "missing word/document.xml".into(),
            })?;

        let mut statuses = BTreeMap::new();
        // Edits keyed by start offset: a duplicate id overwrites its own
        // earlier edit instead of corrupting the splice.
        let mut edits: BTreeMap<usize, (Range<usize>, String)> = BTreeMap::new();
        {
            let doc = parse_document_xml(&xml)?;
            let (blips, paragraph_count) = collect_paragraph_blips(&doc)?;
            for assignment in assignments {
                let status =
                    resolve_one(assignment, &blips, paragraph_count, &xml, &mut edits);
                if let ApplyStatus::Failed { reason } = &status {
                    log::warn!("assignment {} failed: {reason}", assignment.image_id);
                }
                statuses.insert(assignment.image_id.clone(), status);
            }
        }

        let mut new_xml = xml;
        for (_, (range, replacement)) in edits.into_iter().rev() {
            new_xml.replace_range(range, &replacement);
        }
        self.package.replace_part(DOCUMENT_PART, new_xml.into_bytes());

        let applied = statuses.values().filter(|s| s.is_success()).count();
        log::info!(
            "DOCX alt text applied: {applied}/{} assignments",
            assignments.len()
        );
        Ok(statuses)
    }

    pub fn save(&self, out: &Path) -> Result<(), Error> {
        self.package.save(out)?;
        log::info!("DOCX saved to {}", out.display());
        Ok(())
    }
}

fn resolve_one(
    assignment: &AltTextAssignment,
    blips: &[BlipRef],
    paragraph_count: usize,
    xml: &str,
    edits: &mut BTreeMap<usize, (Range<usize>, String)>,
) -> ApplyStatus {
    let Some((para_idx, image_idx)) = parse_docx_image_id(&assignment.image_id) else {
        return ApplyStatus::failed("invalid image id format");
    };
    if para_idx >= paragraph_count {
        return ApplyStatus::failed("paragraph index out of range");
    }
    let in_paragraph: Vec<&BlipRef> = blips
        .iter()
        .filter(|b| b.paragraph_index == para_idx)
        .collect();
    if in_paragraph.is_empty() {
        return ApplyStatus::failed("no images found in paragraph");
    }
    let Some(blip) = in_paragraph.iter().find(|b| b.seq == image_idx) else {
        return ApplyStatus::failed("image index out of range");
    };
    let Some(doc_pr) = drawing_container(blip.node).and_then(|c| ooxml::child(c, WPD_NS, "docPr"))
    else {
        return ApplyStatus::failed("no drawing properties element");
    };

    // A decorative image gets explicit empty fields, never absent ones,
    // so assistive tools don't fall back to an auto-generated filename.
    let decorative = assignment.is_decorative();
    let text = if decorative { "" } else { assignment.text.as_str() };

    let range = ooxml::start_tag_range(xml, doc_pr);
    let rewritten = ooxml::set_start_tag_attrs(&xml[range.clone()], &[("title", text), ("descr", text)]);
    edits.insert(range.start, (range, rewritten));

    if decorative {
        ApplyStatus::AppliedDecorative
    } else {
        ApplyStatus::Applied
    }
}
