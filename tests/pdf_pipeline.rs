mod common;

use pretty_assertions::assert_eq;
use table_structure::cell::RegionTextMethod;
use table_structure::geometry::Orientation;
use table_structure::structure::{RuledLines, StructureMethod};
use table_structure::{CellGrid, PdfPageReader, Pipeline, PipelineConfig, ReaderError};
use tempfile::tempdir;

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-6
}

#[test]
fn reads_word_boxes_in_top_left_coordinates() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("people.pdf");
    common::create_table_pdf(&input, common::PEOPLE, false).expect("PDF fixture should be created");

    let reader = PdfPageReader::open(&input).expect("PDF should load");
    assert_eq!(reader.page_numbers(), vec![1]);
    let layout = reader.layout(1).expect("page should be interpreted");
    assert!(close(layout.width, 595.0) && close(layout.height, common::PAGE_HEIGHT));

    let words = layout.words();
    let texts = words.iter().map(|word| word.text.as_str()).collect::<Vec<_>>();
    assert_eq!(
        texts,
        vec!["Name", "Age", "City", "Alice", "30", "Paris", "Bob", "25", "Rome"]
    );

    // Courier 12pt: 7.2 wide per glyph, ascent 9.6 above the 800 baseline.
    let name = &words[0].bbox;
    assert!(close(name.x0, 50.0), "unexpected box: {name:?}");
    assert!(close(name.x1, 78.8), "unexpected box: {name:?}");
    assert!(close(name.y0, 32.4), "unexpected box: {name:?}");
    assert!(close(name.y1, 44.4), "unexpected box: {name:?}");
    assert!(close(words[3].bbox.y0, 52.4));
    assert_eq!(layout.spans()[0].font, "Courier");
}

#[test]
fn reads_documents_from_memory() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("people.pdf");
    common::create_table_pdf(&input, common::PEOPLE, false).expect("PDF fixture should be created");
    let bytes = std::fs::read(&input).expect("fixture should be readable");

    let reader = PdfPageReader::from_bytes(&bytes).expect("PDF should load from memory");
    let ctx = reader
        .context(1, common::TABLE_REGION)
        .expect("context should build");
    assert_eq!(ctx.page_size(), (595.0, common::PAGE_HEIGHT));
    assert_eq!(ctx.words().len(), 9);
    assert!(matches!(
        PdfPageReader::from_bytes(b"not a pdf"),
        Err(ReaderError::PdfLoad(_))
    ));
}

#[test]
fn reads_ruled_lines_and_detects_them() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("ruled.pdf");
    common::create_table_pdf(&input, common::PEOPLE, true).expect("PDF fixture should be created");

    let reader = PdfPageReader::open(&input).expect("PDF should load");
    let ctx = reader
        .context(1, common::TABLE_REGION)
        .expect("context should build");
    assert_eq!(ctx.lines().len(), 3);
    assert_eq!(
        ctx.lines()[0].orientation(5.0),
        Some(Orientation::Horizontal)
    );
    assert!(close(ctx.lines()[0].y0, 48.0));

    let hypothesis = RuledLines::default()
        .detect(&ctx)
        .expect("detection should not fail")
        .expect("rules should be found");
    assert_eq!(hypothesis.column_positions(), vec![160.0, 280.0]);
    assert_eq!(hypothesis.row_positions(), vec![48.0]);
}

#[test]
fn extracts_text_table_from_pdf_region() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("people.pdf");
    common::create_table_pdf(&input, common::PEOPLE, false).expect("PDF fixture should be created");

    let reader = PdfPageReader::open(&input).expect("PDF should load");
    let layout = reader.layout(1).expect("page should be interpreted");
    let ctx = layout
        .context(common::TABLE_REGION)
        .expect("context should build");
    assert_eq!(ctx.words().len(), 9);
    assert_eq!(ctx.page(), 1);

    let mut config = PipelineConfig::standard();
    config
        .cell_methods
        .push(Box::new(RegionTextMethod::new(layout.region_source())));
    let pipeline = Pipeline::new(config).expect("config should be valid");

    let result = pipeline.extract(&ctx);
    assert!(result.method_errors.is_empty(), "{:?}", result.method_errors);
    assert!(result.candidates.iter().any(|candidate| candidate.cell == "pdf_region"));

    let grid = result.winning_grid().expect("a table should be selected");
    let expected = CellGrid::from_strs(
        &["Name", "Age", "City"],
        &[&["Alice", "30", "Paris"], &["Bob", "25", "Rome"]],
    );
    assert_eq!(grid.headers(), expected.headers());
    assert_eq!(grid.rows(), expected.rows());
}

#[test]
fn region_outside_the_text_yields_no_winner() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("people.pdf");
    common::create_table_pdf(&input, common::PEOPLE, false).expect("PDF fixture should be created");

    let reader = PdfPageReader::open(&input).expect("PDF should load");
    let ctx = reader
        .context(1, table_structure::BBox::new(400.0, 500.0, 500.0, 600.0))
        .expect("context should build");
    let pipeline = Pipeline::new(PipelineConfig::standard()).expect("config should be valid");

    let result = pipeline.extract(&ctx);
    assert!(result.candidates.is_empty());
    assert!(result.winning_grid().is_none());
}

#[test]
fn unknown_page_is_an_error() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("people.pdf");
    common::create_table_pdf(&input, common::PEOPLE, false).expect("PDF fixture should be created");

    let reader = PdfPageReader::open(&input).expect("PDF should load");
    assert!(matches!(reader.layout(3), Err(ReaderError::UnknownPage(3))));
}
