#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// Output directory: tests/output/<case>/
pub fn output_dir(case: &str) -> PathBuf {
    let dir = PathBuf::from("tests/output").join(case);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn png_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    encode(image::DynamicImage::ImageRgb8(img), image::ImageFormat::Png)
}

pub fn png_rgba(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    encode(image::DynamicImage::ImageRgba8(img), image::ImageFormat::Png)
}

pub fn jpeg_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    encode(image::DynamicImage::ImageRgb8(img), image::ImageFormat::Jpeg)
}

fn encode(img: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format).unwrap();
    out
}

pub const DOC_NS_DECLS: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
);

pub const SLIDE_NS_DECLS: &str = concat!(
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
);

/// An inline run drawing referencing relationship `rid`. `doc_pr_extra`
/// lands inside the wp:docPr start tag (e.g. ` descr="..."`).
pub fn inline_drawing(rid: &str, doc_pr_extra: &str) -> String {
    format!(
        r#"<w:r><w:drawing><wp:inline><wp:docPr id="1" name="Picture 1"{doc_pr_extra}/><a:graphic><a:blip r:embed="{rid}"/></a:graphic></wp:inline></w:drawing></w:r>"#
    )
}

pub fn anchored_drawing(rid: &str) -> String {
    format!(
        r#"<w:drawing><wp:anchor><wp:docPr id="2" name="Picture 2"/><a:graphic><a:blip r:embed="{rid}"/></a:graphic></wp:anchor></w:drawing>"#
    )
}

pub fn text_paragraph(text: &str) -> String {
    format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
}

pub fn title_shape(text: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="1" name="Title 1"/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
    )
}

pub fn pic_shape(id: u32, rid: &str, name: &str, extra: &str) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{name}"{extra}/></p:nvPicPr><p:blipFill><a:blip r:embed="{rid}"/></p:blipFill><p:spPr><a:xfrm><a:off x="914400" y="457200"/><a:ext cx="1828800" cy="914400"/></a:xfrm></p:spPr></p:pic>"#
    )
}

pub fn write_zip(path: &Path, parts: &[(String, Vec<u8>)]) {
    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in parts {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

fn image_rels(prefix: &str, media: &[(&str, Vec<u8>)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, (name, _)) in media.iter().enumerate() {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="{prefix}{name}"/>"#,
            i + 1
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Default Extension="png" ContentType="image/png"/>"#,
    r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#,
    r#"</Types>"#,
);

/// Build a minimal DOCX at `path`. Media entries map in order to rId1,
/// rId2, ... in word/_rels/document.xml.rels.
pub fn write_docx(path: &Path, body: &str, media: &[(&str, Vec<u8>)]) {
    let document = format!(r#"<w:document {DOC_NS_DECLS}><w:body>{body}</w:body></w:document>"#);
    let mut parts: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".into(), CONTENT_TYPES.into()),
        (
            "_rels/.rels".into(),
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#.to_vec(),
        ),
        ("word/document.xml".into(), document.into_bytes()),
        (
            "word/_rels/document.xml.rels".into(),
            image_rels("media/", media).into_bytes(),
        ),
    ];
    for (name, data) in media {
        parts.push((format!("word/media/{name}"), data.clone()));
    }
    write_zip(path, &parts);
}

/// Build a minimal PPTX at `path`. Each entry in `slides` becomes the
/// spTree content of one slide, in presentation order. Every slide gets
/// the same media relationships (rId1, rId2, ... pointing into
/// ppt/media/).
pub fn write_pptx(path: &Path, slides: &[String], media: &[(&str, Vec<u8>)]) {
    let mut sld_ids = String::new();
    let mut pres_rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for i in 0..slides.len() {
        sld_ids.push_str(&format!(
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            256 + i,
            i + 1
        ));
        pres_rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
            i + 1,
            i + 1
        ));
    }
    pres_rels.push_str("</Relationships>");
    let presentation = format!(
        r#"<p:presentation {SLIDE_NS_DECLS}><p:sldIdLst>{sld_ids}</p:sldIdLst></p:presentation>"#
    );

    let mut parts: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".into(), CONTENT_TYPES.into()),
        (
            "_rels/.rels".into(),
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#.to_vec(),
        ),
        ("ppt/presentation.xml".into(), presentation.into_bytes()),
        (
            "ppt/_rels/presentation.xml.rels".into(),
            pres_rels.into_bytes(),
        ),
    ];
    for (i, shapes) in slides.iter().enumerate() {
        let slide = format!(
            r#"<p:sld {SLIDE_NS_DECLS}><p:cSld><p:spTree>{shapes}</p:spTree></p:cSld></p:sld>"#
        );
        parts.push((format!("ppt/slides/slide{}.xml", i + 1), slide.into_bytes()));
        parts.push((
            format!("ppt/slides/_rels/slide{}.xml.rels", i + 1),
            image_rels("../media/", media).into_bytes(),
        ));
    }
    for (name, data) in media {
        parts.push((format!("ppt/media/{name}"), data.clone()));
    }
    write_zip(path, &parts);
}
