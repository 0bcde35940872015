mod common;

use altdoc::{AltTextAssignment, ApplyStatus, Position};

#[test]
fn shape_ids_count_every_shape_on_the_slide() {
    let dir = common::output_dir("pptx_ids");
    let input = dir.join("input.pptx");

    // Slide 1: title shape then two pictures; slide 2: picture only.
    let slides = vec![
        format!(
            "{}{}{}",
            common::title_shape("Intro"),
            common::pic_shape(2, "rId1", "Picture 1", ""),
            common::pic_shape(3, "rId2", "Picture 2", ""),
        ),
        common::pic_shape(2, "rId2", "Picture 1", ""),
    ];
    common::write_pptx(
        &input,
        &slides,
        &[
            ("image1.png", common::png_rgb(4, 2, [0, 128, 0])),
            ("image2.jpeg", common::jpeg_rgb(6, 6, [128, 0, 0])),
        ],
    );

    let extraction = altdoc::extract_images(&input).unwrap();
    assert!(extraction.failures.is_empty());
    assert_eq!(extraction.images.len(), 3);

    let first = &extraction.images[0];
    // The title shape occupies index 0, so the pictures are shapes 1 and 2.
    assert_eq!(first.image_id, "slide0_shape1");
    assert_eq!(first.page_or_slide, Some(1));
    let Position::Pptx {
        slide_index,
        shape_index,
        left_emu,
        width_emu,
        slide_title,
        ..
    } = &first.position
    else {
        panic!("expected a PPTX position");
    };
    assert_eq!((*slide_index, *shape_index), (0, 1));
    assert_eq!(*left_emu, Some(914400));
    assert_eq!(*width_emu, Some(1828800));
    assert_eq!(slide_title.as_deref(), Some("Intro"));

    let second = &extraction.images[1];
    assert_eq!(second.image_id, "slide0_shape2");
    // Every record on the slide carries the same title.
    let Position::Pptx { slide_title, .. } = &second.position else {
        panic!("expected a PPTX position");
    };
    assert_eq!(slide_title.as_deref(), Some("Intro"));

    let third = &extraction.images[2];
    assert_eq!(third.image_id, "slide1_shape0");
    assert_eq!(third.page_or_slide, Some(2));
}

#[test]
fn apply_rewrites_only_the_targeted_slide() {
    let dir = common::output_dir("pptx_isolated_mutation");
    let input = dir.join("input.pptx");
    let output = dir.join("output.pptx");
    // Two pictures on slide 1, one on slide 2.
    let slides = vec![
        format!(
            "{}{}",
            common::pic_shape(2, "rId1", "Picture 1", ""),
            common::pic_shape(3, "rId1", "Picture 2", ""),
        ),
        common::pic_shape(2, "rId1", "Picture 1", ""),
    ];
    common::write_pptx(
        &input,
        &slides,
        &[("image1.png", common::png_rgb(2, 2, [0, 0, 0]))],
    );

    let assignments = vec![AltTextAssignment {
        image_id: "slide0_shape1".into(),
        text: "a dark square".into(),
    }];
    let statuses = altdoc::apply_alt_text(&input, &assignments, &output).unwrap();
    assert_eq!(statuses["slide0_shape1"], ApplyStatus::Applied);

    let read_part = |path: &std::path::Path, name: &str| -> Vec<u8> {
        let file = std::fs::File::open(path).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let mut data = Vec::new();
        std::io::Read::read_to_end(&mut zip.by_name(name).unwrap(), &mut data).unwrap();
        data
    };
    let slide1 = read_part(&output, "ppt/slides/slide1.xml");
    assert!(String::from_utf8(slide1).unwrap().contains(r#"descr="a dark square""#));
    // Slide 2 was not named by any assignment and must be untouched.
    assert_eq!(
        read_part(&output, "ppt/slides/slide2.xml"),
        read_part(&input, "ppt/slides/slide2.xml"),
    );

    let reread = altdoc::extract_images(&output).unwrap();
    // Only the second picture on slide 1 was touched.
    assert_eq!(reread.images[0].existing_alt_text, None);
    assert_eq!(
        reread.images[1].existing_alt_text.as_deref(),
        Some("a dark square")
    );
    assert_eq!(reread.images[2].existing_alt_text, None);
}

#[test]
fn out_of_range_ids_fail_without_blocking_the_save() {
    let dir = common::output_dir("pptx_partial_apply");
    let input = dir.join("input.pptx");
    let output = dir.join("output.pptx");
    common::write_pptx(
        &input,
        &[common::pic_shape(2, "rId1", "Picture 1", "")],
        &[("image1.png", common::png_rgb(2, 2, [0, 0, 0]))],
    );

    let assignments = vec![
        AltTextAssignment {
            image_id: "slide9_shape0".into(),
            text: "nowhere".into(),
        },
        AltTextAssignment {
            image_id: "slide0_shape7".into(),
            text: "nowhere either".into(),
        },
        AltTextAssignment {
            image_id: "slide0_shape0".into(),
            text: "applied".into(),
        },
    ];
    let statuses = altdoc::apply_alt_text(&input, &assignments, &output).unwrap();
    assert_eq!(
        statuses["slide9_shape0"],
        ApplyStatus::failed("slide index out of range")
    );
    assert_eq!(
        statuses["slide0_shape7"],
        ApplyStatus::failed("shape index out of range")
    );
    assert_eq!(statuses["slide0_shape0"], ApplyStatus::Applied);

    assert!(output.exists());
    let reread = altdoc::extract_images(&output).unwrap();
    assert_eq!(reread.images[0].existing_alt_text.as_deref(), Some("applied"));
}

#[test]
fn custom_shape_name_reported_as_existing_alt_text() {
    let dir = common::output_dir("pptx_existing_text");
    let input = dir.join("input.pptx");
    common::write_pptx(
        &input,
        &[format!(
            "{}{}",
            common::pic_shape(2, "rId1", "Quarterly revenue chart", ""),
            common::pic_shape(3, "rId1", "Picture 2", ""),
        )],
        &[("image1.png", common::png_rgb(2, 2, [0, 0, 0]))],
    );

    let extraction = altdoc::extract_images(&input).unwrap();
    assert_eq!(
        extraction.images[0].existing_alt_text.as_deref(),
        Some("Quarterly revenue chart")
    );
    // Auto-generated "Picture N" names carry no information.
    assert_eq!(extraction.images[1].existing_alt_text, None);
}
