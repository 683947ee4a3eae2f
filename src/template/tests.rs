use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use super::*;

fn helvetica() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    }
}

fn build_pdf(pages: &[&str], media_box: Option<[i64; 4]>) -> Vec<u8> {
    build_pdf_with(pages, media_box, helvetica(), None)
}

fn build_pdf_with(
    pages: &[&str],
    media_box: Option<[i64; 4]>,
    font: Dictionary,
    crop_box: Option<[i64; 4]>,
) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(font);

    let mut kids = Vec::new();
    for content in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        };
        if let Some([a, b, c, d]) = crop_box {
            page.set("CropBox", vec![a.into(), b.into(), c.into(), d.into()]);
        }
        let page_id = doc.add_object(page);
        kids.push(Object::Reference(page_id));
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
    };
    if let Some([a, b, c, d]) = media_box {
        tree.set("MediaBox", vec![a.into(), b.into(), c.into(), d.into()]);
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save fixture");
    out
}

#[test]
fn load_reads_page_count_and_inherited_height() {
    let bytes = build_pdf(&["", ""], Some([0, 0, 595, 842]));
    let doc = TemplateDocument::load(&bytes).expect("load");

    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.page_height(1), Some(842.0));
    assert_eq!(doc.page_height(2), Some(842.0));
    assert_eq!(doc.page_height(3), None);
    assert_eq!(doc.page_height(0), None);
}

#[test]
fn missing_media_box_falls_back_to_letter() {
    let bytes = build_pdf(&[""], None);
    let doc = TemplateDocument::load(&bytes).expect("load");
    assert_eq!(doc.page_height(1), Some(792.0));
}

#[test]
fn garbage_bytes_fail_to_parse() {
    let err = TemplateDocument::load(b"definitely not a pdf").err().expect("error");
    assert!(matches!(err, TemplateError::Parse(_)));
}

#[test]
fn text_runs_report_positions() {
    let bytes = build_pdf(
        &["BT /F1 12 Tf 100 700 Td (Gender:) Tj 80 0 Td (Male) Tj ET"],
        Some([0, 0, 612, 792]),
    );
    let doc = TemplateDocument::load(&bytes).expect("load");
    let runs = doc.text_runs(1).expect("runs");

    assert_eq!(
        runs,
        vec![
            TextRun {
                text: "Gender:".to_string(),
                x: 100.0,
                y: 700.0
            },
            TextRun {
                text: "Male".to_string(),
                x: 180.0,
                y: 700.0
            },
        ]
    );
}

#[test]
fn text_runs_reject_unknown_page() {
    let bytes = build_pdf(&[""], Some([0, 0, 612, 792]));
    let doc = TemplateDocument::load(&bytes).expect("load");
    assert!(matches!(
        doc.text_runs(4),
        Err(TemplateError::PageOutOfRange(4))
    ));
}

#[test]
fn drawn_text_survives_save_and_reload() {
    let bytes = build_pdf(&["BT /F1 12 Tf 20 20 Td (Template) Tj ET"], Some([0, 0, 612, 792]));
    let mut doc = TemplateDocument::load(&bytes).expect("load");
    doc.draw(1, &DrawOp::text("Jane Doe", 52.0, 736.0, 10.0))
        .expect("draw");
    doc.draw(
        1,
        &DrawOp::Line {
            start: (10.0, 10.0),
            end: (10.0, 30.0),
            thickness: 0.5,
            gray: 0.7,
        },
    )
    .expect("draw line");

    let saved = doc.save().expect("save");
    let reloaded = TemplateDocument::load(&saved).expect("reload");
    let texts: Vec<String> = reloaded
        .text_runs(1)
        .expect("runs")
        .into_iter()
        .map(|run| run.text)
        .collect();

    assert_eq!(texts, vec!["Template".to_string(), "Jane Doe".to_string()]);
}

#[test]
fn overlay_is_not_affected_by_template_transforms() {
    // The template leaves a scaled CTM on the stack without restoring it.
    let bytes = build_pdf(
        &["2 0 0 2 0 0 cm BT /F1 12 Tf 10 10 Td (Scaled) Tj ET"],
        Some([0, 0, 612, 792]),
    );
    let mut doc = TemplateDocument::load(&bytes).expect("load");
    doc.draw(1, &DrawOp::text("Mark", 300.0, 400.0, 10.0))
        .expect("draw");
    let saved = doc.save().expect("save");

    let runs = TemplateDocument::load(&saved)
        .expect("reload")
        .text_runs(1)
        .expect("runs");
    let mark = runs.iter().find(|run| run.text == "Mark").expect("mark");
    assert_eq!((mark.x, mark.y), (300.0, 400.0));
}

#[test]
fn draw_rejects_unknown_page() {
    let bytes = build_pdf(&[""], Some([0, 0, 612, 792]));
    let mut doc = TemplateDocument::load(&bytes).expect("load");
    let result = doc.draw(2, &DrawOp::text("x", 0.0, 0.0, 10.0));
    assert!(matches!(result, Err(TemplateError::PageOutOfRange(2))));
}

#[test]
fn saving_untouched_document_keeps_it_loadable() {
    let bytes = build_pdf(&["", ""], Some([0, 0, 612, 792]));
    let doc = TemplateDocument::load(&bytes).expect("load");
    let saved = doc.save().expect("save");
    assert_eq!(TemplateDocument::load(&saved).expect("reload").page_count(), 2);
}

#[test]
fn win_ansi_maps_bullet_and_replaces_unknown() {
    assert_eq!(encode_win_ansi("A•é"), vec![b'A', 0x95, 0xE9]);
    assert_eq!(encode_win_ansi("漢"), vec![b'?']);
    assert_eq!(encode_win_ansi("a\nb"), b"ab".to_vec());
}

#[test]
fn decode_handles_utf16_with_bom() {
    let bytes = [0xFE, 0xFF, 0x00, 0x4D, 0x00, 0x61];
    assert_eq!(text::decode_pdf_string(&bytes), "Ma");
}

fn runs_of(content: &[u8]) -> Vec<TextRun> {
    text::extract_runs(content, &FontMap::new(), Granularity::Runs).expect("runs")
}

fn words_of(content: &[u8]) -> Vec<TextRun> {
    text::extract_runs(content, &FontMap::new(), Granularity::Words).expect("words")
}

fn assert_near(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 0.01,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn tj_array_splits_at_wide_gaps_only() {
    // "Fe" + "male" = 611 + 556 + 833 + 556 + 222 + 556 = 3334, -10 kern = +10,
    // -400 kern = +400: "only" starts 3744/1000 em after the origin.
    let runs = runs_of(b"BT /F1 10 Tf 1 0 0 1 50 60 Tm [(Fe) -10 (male) -400 (only)] TJ ET");
    let texts: Vec<&str> = runs.iter().map(|run| run.text.as_str()).collect();
    assert_eq!(texts, vec!["Female", "only"]);
    assert_eq!((runs[0].x, runs[0].y), (50.0, 60.0));
    assert_near(runs[1].x, 87.44);
    assert_eq!(runs[1].y, 60.0);
}

#[test]
fn consecutive_shows_advance_the_pen() {
    // "Male" is 2167/1000 em wide in Helvetica, a space 278.
    let runs = runs_of(b"BT /F1 10 Tf 100 680 Td (Male) Tj ( ) Tj (Female) Tj ET");
    let texts: Vec<&str> = runs.iter().map(|run| run.text.as_str()).collect();
    assert_eq!(texts, vec!["Male", "Female"]);
    assert_eq!(runs[0].x, 100.0);
    assert_near(runs[1].x, 124.45);
}

#[test]
fn kerned_gap_in_one_array_separates_words() {
    let runs = runs_of(b"BT /F1 10 Tf 100 680 Td [(Male) -3000 (Female)] TJ ET");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].x, 100.0);
    assert_near(runs[1].x, 151.67);
}

#[test]
fn spacing_and_scaling_change_the_advance() {
    // Each glyph gains 1pt of Tc, the space another 5pt of Tw, all at 50%.
    let runs = words_of(b"BT /F1 10 Tf 1 Tc 5 Tw 50 Tz 0 0 Td (Male Female) Tj ET");
    assert_eq!(runs.len(), 2);
    // (21.67 + 4) + (2.78 + 1 + 5) = 34.45, halved.
    assert_near(runs[1].x, 17.225);
}

#[test]
fn word_granularity_splits_inside_one_string() {
    let runs = words_of(b"BT /F1 10 Tf 100 680 Td (  Male   Female) Tj ET");
    let texts: Vec<&str> = runs.iter().map(|run| run.text.as_str()).collect();
    assert_eq!(texts, vec!["Male", "Female"]);
    assert_near(runs[0].x, 105.56);
    assert_near(runs[1].x, 135.57);

    // Run granularity keeps the string whole, anchored at its first glyph.
    let runs = runs_of(b"BT /F1 10 Tf 100 680 Td (  Male   Female) Tj ET");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].text, "Male   Female");
    assert_near(runs[0].x, 105.56);
}

#[test]
fn font_state_is_restored_with_graphics_state() {
    let runs = runs_of(b"/F1 10 Tf q /F1 20 Tf Q BT 0 0 Td (M) Tj (x) Tj ET");
    // "M" at 10pt, not 20pt.
    assert_near(runs[1].x, 8.33);
}

#[test]
fn font_widths_come_from_the_page_resources() {
    let mut font = helvetica();
    font.set("FirstChar", Object::Integer(65));
    font.set("LastChar", Object::Integer(67));
    font.set("Widths", vec![Object::Integer(600); 3]);
    let bytes = build_pdf_with(
        &["BT /F1 10 Tf 20 20 Td (AB) Tj (C) Tj (z) Tj ET"],
        Some([0, 0, 612, 792]),
        font,
        None,
    );
    let runs = TemplateDocument::load(&bytes)
        .expect("load")
        .text_runs(1)
        .expect("runs");

    assert_near(runs[1].x, 32.0);
    // "C" from /Widths, then nothing for "z": Helvetica fills in.
    assert_near(runs[2].x, 38.0);
}

#[test]
fn missing_width_covers_codes_outside_the_table() {
    let widths = FontWidths {
        first_char: 65,
        widths: vec![600.0],
        missing_width: Some(250.0),
    };
    assert_eq!(widths.width(65), 600.0);
    assert_eq!(widths.width(66), 250.0);
    assert_eq!(widths.width(10), 250.0);
    assert_eq!(FontWidths::default().width(u32::from(b'M')), 833.0);
}

#[test]
fn text_words_read_side_by_side_labels() {
    let bytes = build_pdf(
        &["BT /F1 11 Tf 100 680 Td (Male      Female) Tj ET"],
        Some([0, 0, 612, 792]),
    );
    let doc = TemplateDocument::load(&bytes).expect("load");
    let words = doc.text_words(1).expect("words");

    assert_eq!(words.len(), 2);
    assert_eq!(words[0].x, 100.0);
    assert!(words[1].x > words[0].x + 20.0);
}

#[test]
fn crop_box_is_the_visible_area() {
    let bytes = build_pdf_with(
        &["", ""],
        Some([0, 0, 612, 792]),
        helvetica(),
        Some([36, 50, 612, 742]),
    );
    let doc = TemplateDocument::load(&bytes).expect("load");

    assert_eq!(doc.page_height(1), Some(792.0));
    assert_eq!(doc.visible_boxes()[0], Rect::new(36.0, 50.0, 576.0, 692.0));

    let uncropped = TemplateDocument::load(&build_pdf(&[""], Some([0, 0, 595, 842])))
        .expect("load");
    assert_eq!(uncropped.visible_boxes(), &[Rect::new(0.0, 0.0, 595.0, 842.0)]);
}

#[test]
fn next_line_operators_follow_leading() {
    let runs = runs_of(b"BT 14 TL 10 100 Td (one) Tj T* (two) Tj (three) ' ET");
    let positions: Vec<(f32, f32)> = runs.iter().map(|run| (run.x, run.y)).collect();
    assert_eq!(positions, vec![(10.0, 100.0), (10.0, 86.0), (10.0, 72.0)]);
}

#[test]
fn cm_inside_saved_state_is_restored() {
    let runs = runs_of(b"q 1 0 0 1 100 100 cm BT 0 0 Td (inner) Tj ET Q BT 5 5 Td (outer) Tj ET");
    assert_eq!((runs[0].x, runs[0].y), (100.0, 100.0));
    assert_eq!((runs[1].x, runs[1].y), (5.0, 5.0));
}
