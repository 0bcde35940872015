//! PPTX image extraction and alt-text assembly.
//!
//! Slides are visited in presentation order (the `p:sldIdLst` sequence
//! resolved through the presentation rels), shapes in z-order within each
//! slide's `p:spTree`. A shape's index counts every shape child of the
//! tree, not just pictures, and the assembler re-runs the identical walk,
//! so a `slideI_shapeJ` id resolves to the same element in both passes.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use crate::error::{Error, ItemError, ItemFailure};
use crate::id::{parse_pptx_image_id, pptx_image_id};
use crate::model::{
    AltTextAssignment, ApplyStatus, DocumentFormat, Extraction, ImageRecord, Position,
    RasterFormat,
};
use crate::normalize;
use crate::ooxml::{self, DML_NS, OoxmlPackage, REL_NS};

pub(crate) const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const SLIDE_DIR: &str = "ppt/slides";

/// Element names that occupy a slot in the shape tree.
const SHAPE_TAGS: &[&str] = &["sp", "pic", "graphicFrame", "grpSp", "cxnSp", "contentPart"];

/// One picture shape, with its ordinal among all shapes on the slide.
struct PicShape<'a> {
    shape_index: usize,
    pic: roxmltree::Node<'a, 'a>,
}

fn sp_tree<'a>(slide: &'a roxmltree::Document<'a>) -> Option<roxmltree::Node<'a, 'a>> {
    let c_sld = ooxml::child(slide.root_element(), P_NS, "cSld")?;
    ooxml::child(c_sld, P_NS, "spTree")
}

/// Walk the shape tree in z-order; keep pictures, count everything.
fn collect_pictures<'a>(
    slide: &'a roxmltree::Document<'a>,
    part: &str,
) -> Result<(Vec<PicShape<'a>>, usize), ItemError> {
    let tree = sp_tree(slide).ok_or_else(|| ItemError::MalformedXml {
        part: part.to_string(),
    })?;
    let mut pictures = Vec::new();
    let mut shape_count = 0;
    for node in tree.children().filter(|n| {
        n.tag_name().namespace() == Some(P_NS) && SHAPE_TAGS.contains(&n.tag_name().name())
    }) {
        let shape_index = shape_count;
        shape_count += 1;
        if node.tag_name().name() == "pic" {
            pictures.push(PicShape {
                shape_index,
                pic: node,
            });
        }
    }
    Ok((pictures, shape_count))
}

/// Title placeholder text, trimmed; `None` when absent or whitespace.
fn slide_title(slide: &roxmltree::Document) -> Option<String> {
    let tree = sp_tree(slide)?;
    for sp in tree
        .children()
        .filter(|n| n.tag_name().name() == "sp" && n.tag_name().namespace() == Some(P_NS))
    {
        let ph_type = ooxml::child(sp, P_NS, "nvSpPr")
            .and_then(|nv| ooxml::child(nv, P_NS, "nvPr"))
            .and_then(|nv_pr| ooxml::child(nv_pr, P_NS, "ph"))
            .and_then(|ph| ph.attribute("type"));
        if !matches!(ph_type, Some("title") | Some("ctrTitle")) {
            continue;
        }
        let text: String = sp
            .descendants()
            .filter(|n| n.tag_name().name() == "t" && n.tag_name().namespace() == Some(DML_NS))
            .filter_map(|n| n.text())
            .collect();
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

fn c_nv_pr<'a>(pic: roxmltree::Node<'a, 'a>) -> Option<roxmltree::Node<'a, 'a>> {
    let nv_pic_pr = ooxml::child(pic, P_NS, "nvPicPr")?;
    ooxml::child(nv_pic_pr, P_NS, "cNvPr")
}

/// PowerPoint assigns "Picture N" / "Image N" automatically; such names
/// carry no accessibility information.
fn is_default_shape_name(name: &str) -> bool {
    name.starts_with("Picture") || name.starts_with("Image")
}

/// Existing accessible text: a non-default shape name wins, then the
/// non-visual properties' title, then descr.
fn existing_alt_text(pic: roxmltree::Node) -> Option<String> {
    let props = c_nv_pr(pic)?;
    if let Some(name) = props.attribute("name") {
        let trimmed = name.trim();
        if !trimmed.is_empty() && !is_default_shape_name(trimmed) {
            return Some(trimmed.to_string());
        }
    }
    for attr in ["title", "descr"] {
        if let Some(value) = props.attribute(attr) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Shape geometry in EMU from `a:xfrm`, when the shape carries its own.
fn shape_geometry(pic: roxmltree::Node) -> (Option<i64>, Option<i64>, Option<i64>, Option<i64>) {
    let xfrm = ooxml::child(pic, P_NS, "spPr").and_then(|sp_pr| ooxml::child(sp_pr, DML_NS, "xfrm"));
    let attr = |node: Option<roxmltree::Node>, name: &str| {
        node.and_then(|n| n.attribute(name))
            .and_then(|v| v.parse::<i64>().ok())
    };
    let off = xfrm.and_then(|x| ooxml::child(x, DML_NS, "off"));
    let ext = xfrm.and_then(|x| ooxml::child(x, DML_NS, "ext"));
    (
        attr(off, "x"),
        attr(off, "y"),
        attr(ext, "cx"),
        attr(ext, "cy"),
    )
}

/// Slide part paths in presentation order.
fn slide_parts(package: &OoxmlPackage) -> Result<Vec<String>, Error> {
    let xml = package
        .part_text(PRESENTATION_PART)
        .ok_or_else(|| Error::CorruptContainer {
            detail: "missing ppt/presentation.xml (is this a PPTX file?)".into(),
        })?;
    let doc = roxmltree::Document::parse(&xml).map_err(|e| Error::CorruptContainer {
        detail: format!("ppt/presentation.xml is not well-formed XML: {e}"),
    })?;
    let rels = package.rels_for(PRESENTATION_PART);

    let mut parts = Vec::new();
    if let Some(list) = ooxml::child(doc.root_element(), P_NS, "sldIdLst") {
        for sld_id in list
            .children()
            .filter(|n| n.tag_name().name() == "sldId" && n.tag_name().namespace() == Some(P_NS))
        {
            let Some(target) = sld_id.attribute((REL_NS, "id")).and_then(|rid| rels.get(rid))
            else {
                continue;
            };
            parts.push(ooxml::resolve_target("ppt", target));
        }
    }
    Ok(parts)
}

pub struct PptxExtractor {
    package: OoxmlPackage,
    slides: Vec<String>,
}

impl PptxExtractor {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let package = OoxmlPackage::open(path, DocumentFormat::Pptx)?;
        let slides = slide_parts(&package)?;
        log::info!("PPTX loaded: {} ({} slides)", path.display(), slides.len());
        Ok(PptxExtractor { package, slides })
    }

    pub fn format_tag(&self) -> DocumentFormat {
        DocumentFormat::Pptx
    }

    pub fn extract_images(&self) -> Result<Extraction, Error> {
        let mut extraction = Extraction::default();
        for (slide_idx, part) in self.slides.iter().enumerate() {
            self.extract_slide(slide_idx, part, &mut extraction);
        }
        log::info!(
            "PPTX extraction complete: {} images across {} slides, {} skipped",
            extraction.images.len(),
            self.slides.len(),
            extraction.failures.len()
        );
        Ok(extraction)
    }

    fn extract_slide(&self, slide_idx: usize, part: &str, extraction: &mut Extraction) {
        let skip_slide = |error: ItemError, extraction: &mut Extraction| {
            let context = format!("slide {slide_idx}");
            log::warn!("skipping {context}: {error}");
            extraction.failures.push(ItemFailure { context, error });
        };

        let Some(xml) = self.package.part_text(part) else {
            skip_slide(
                ItemError::MissingPart {
                    part: part.to_string(),
                },
                extraction,
            );
            return;
        };
        let doc = match roxmltree::Document::parse(&xml) {
            Ok(doc) => doc,
            Err(_) => {
                skip_slide(
                    ItemError::MalformedXml {
                        part: part.to_string(),
                    },
                    extraction,
                );
                return;
            }
        };

        let title = slide_title(&doc);
        let rels = self.package.rels_for(part);
        let (pictures, _) = match collect_pictures(&doc, part) {
            Ok(v) => v,
            Err(error) => {
                skip_slide(error, extraction);
                return;
            }
        };

        for shape in &pictures {
            match self.extract_one(shape, slide_idx, title.clone(), &rels) {
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
                    let context = format!("slide {slide_idx}, shape {}", shape.shape_index);
                    log::warn!("skipping image at {context}: {error}");
                    extraction.failures.push(ItemFailure { context, error });
                }
            }
        }
    }

    fn extract_one(
        &self,
        shape: &PicShape,
        slide_idx: usize,
        slide_title: Option<String>,
        rels: &std::collections::HashMap<String, String>,
    ) -> Result<ImageRecord, ItemError> {
        let blip = ooxml::child(shape.pic, P_NS, "blipFill")
            .and_then(|fill| ooxml::child(fill, DML_NS, "blip"))
            .ok_or_else(|| ItemError::MissingRelationship {
                rel_id: "(no a:blip element)".into(),
            })?;
        let rel_id =
            blip.attribute((REL_NS, "embed"))
                .ok_or_else(|| ItemError::MissingRelationship {
                    rel_id: "(no r:embed attribute)".into(),
                })?;
        let target = rels
            .get(rel_id)
            .ok_or_else(|| ItemError::MissingRelationship {
                rel_id: rel_id.to_string(),
            })?;
        let part = ooxml::resolve_target(SLIDE_DIR, target);
        let raw = self
            .package
            .part(&part)
            .ok_or_else(|| ItemError::MissingPart { part: part.clone() })?;

        let declared = match self.package.content_type_for(&part) {
            Some(content_type) => RasterFormat::from_content_type(content_type),
            None => part.rsplit('.').next().and_then(RasterFormat::from_extension),
        };
        let norm = normalize::normalize(raw, declared)?;

        let (left_emu, top_emu, width_emu, height_emu) = shape_geometry(shape.pic);
        let image_id = pptx_image_id(slide_idx, shape.shape_index);
        Ok(ImageRecord {
            filename: format!("{image_id}.{}", norm.format.extension()),
            image_id,
            format: norm.format,
            size_bytes: norm.bytes.len() as u64,
            width_px: norm.width,
            height_px: norm.height,
            bytes: norm.bytes,
            page_or_slide: Some(slide_idx as u32 + 1),
            position: Position::Pptx {
                slide_index: slide_idx,
                shape_index: shape.shape_index,
                left_emu,
                top_emu,
                width_emu,
                height_emu,
                slide_title,
            },
            existing_alt_text: existing_alt_text(shape.pic),
        })
    }
}

pub struct PptxAssembler {
    package: OoxmlPackage,
    slides: Vec<String>,
}

impl PptxAssembler {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let package = OoxmlPackage::open(path, DocumentFormat::Pptx)?;
        let slides = slide_parts(&package)?;
        Ok(PptxAssembler { package, slides })
    }

    pub fn format_tag(&self) -> DocumentFormat {
        DocumentFormat::Pptx
    }

    /// Apply each assignment, accumulating per-id statuses. Assignments are
    /// grouped by slide so every slide part is parsed and spliced once.
    pub fn apply(
        &mut self,
        assignments: &[AltTextAssignment],
    ) -> Result<BTreeMap<String, ApplyStatus>, Error> {
        let mut statuses = BTreeMap::new();

        let mut by_slide: BTreeMap<usize, Vec<(&AltTextAssignment, usize)>> = BTreeMap::new();
        for assignment in assignments {
            match parse_pptx_image_id(&assignment.image_id) {
                Some((slide_idx, shape_idx)) if slide_idx < self.slides.len() => {
                    by_slide
                        .entry(slide_idx)
                        .or_default()
                        .push((assignment, shape_idx));
                }
                Some(_) => {
                    statuses.insert(
                        assignment.image_id.clone(),
                        ApplyStatus::failed("slide index out of range"),
                    );
                }
                None => {
                    statuses.insert(
                        assignment.image_id.clone(),
                        ApplyStatus::failed("invalid image id format"),
                    );
                }
            }
        }

        for (slide_idx, slide_assignments) in by_slide {
            let part = self.slides[slide_idx].clone();
            self.apply_to_slide(slide_idx, &part, &slide_assignments, &mut statuses);
        }

        for (id, status) in &statuses {
            if let ApplyStatus::Failed { reason } = status {
                log::warn!("assignment {id} failed: {reason}");
            }
        }
        let applied = statuses.values().filter(|s| s.is_success()).count();
        log::info!(
            "PPTX alt text applied: {applied}/{} assignments",
            assignments.len()
        );
        Ok(statuses)
    }

    fn apply_to_slide(
        &mut self,
        slide_idx: usize,
        part: &str,
        slide_assignments: &[(&AltTextAssignment, usize)],
        statuses: &mut BTreeMap<String, ApplyStatus>,
    ) {
        let Some(xml) = self.package.part_text(part) else {
            for (assignment, _) in slide_assignments {
                statuses.insert(
                    assignment.image_id.clone(),
                    ApplyStatus::failed("slide part missing"),
                );
            }
            return;
        };

        let mut edits: BTreeMap<usize, (Range<usize>, String)> = BTreeMap::new();
        {
            let Ok(doc) = roxmltree::Document::parse(&xml) else {
                for (assignment, _) in slide_assignments {
                    statuses.insert(
                        assignment.image_id.clone(),
                        ApplyStatus::failed("slide part is not well-formed XML"),
                    );
                }
                return;
            };
            let Ok((pictures, shape_count)) = collect_pictures(&doc, part) else {
                for (assignment, _) in slide_assignments {
                    statuses.insert(
                        assignment.image_id.clone(),
                        ApplyStatus::failed("slide has no shape tree"),
                    );
                }
                return;
            };

            for (assignment, shape_idx) in slide_assignments {
                let status = resolve_one(assignment, *shape_idx, &pictures, shape_count, &xml, &mut edits);
                statuses.insert(assignment.image_id.clone(), status);
            }
        }

        let mut new_xml = xml;
        for (_, (range, replacement)) in edits.into_iter().rev() {
            new_xml.replace_range(range, &replacement);
        }
        self.package.replace_part(part, new_xml.into_bytes());
        log::debug!("slide {slide_idx} rewritten");
    }

    pub fn save(&self, out: &Path) -> Result<(), Error> {
        self.package.save(out)?;
        log::info!("PPTX saved to {}", out.display());
        Ok(())
    }
}

fn resolve_one(
    assignment: &AltTextAssignment,
    shape_idx: usize,
    pictures: &[PicShape],
    shape_count: usize,
    xml: &str,
    edits: &mut BTreeMap<usize, (Range<usize>, String)>,
) -> ApplyStatus {
    if shape_idx >= shape_count {
        return ApplyStatus::failed("shape index out of range");
    }
    let Some(shape) = pictures.iter().find(|p| p.shape_index == shape_idx) else {
        return ApplyStatus::failed("picture shape not found");
    };
    let Some(props) = c_nv_pr(shape.pic) else {
        return ApplyStatus::failed("no non-visual properties element");
    };

    let decorative = assignment.is_decorative();
    let text = if decorative { "" } else { assignment.text.as_str() };

    let range = ooxml::start_tag_range(xml, props);
    let rewritten =
        ooxml::set_start_tag_attrs(&xml[range.clone()], &[("title", text), ("descr", text)]);
    edits.insert(range.start, (range, rewritten));

    if decorative {
        ApplyStatus::AppliedDecorative
    } else {
        ApplyStatus::Applied
    }
}
