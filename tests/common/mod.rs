#![allow(dead_code)]

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use table_structure::{BBox, GeometryContext, Word};

/// Courier 12pt cells placed `COLUMN_PITCH` apart, one row every
/// `ROW_PITCH` points starting at baseline `FIRST_BASELINE` (PDF space) on
/// an A4 page.
pub const COLUMN_PITCH: i64 = 120;
pub const ROW_PITCH: i64 = 20;
pub const FIRST_BASELINE: i64 = 800;
pub const PAGE_HEIGHT: f64 = 842.0;

/// Region covering the fixture table in top-left page coordinates.
pub const TABLE_REGION: BBox = BBox::new(40.0, 20.0, 420.0, 100.0);

fn cell_operations(rows: &[&[&str]]) -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
    ];
    for (row_index, row) in rows.iter().enumerate() {
        let baseline = FIRST_BASELINE - ROW_PITCH * i64::try_from(row_index).unwrap_or(0);
        for (col_index, cell) in row.iter().enumerate() {
            let x = 50 + COLUMN_PITCH * i64::try_from(col_index).unwrap_or(0);
            operations.push(Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), baseline.into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*cell)]));
        }
    }
    operations.push(Operation::new("ET", vec![]));
    operations
}

/// A rule under the header row and two column separators.
fn rule_operations() -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("w", vec![1.into()]),
        Operation::new("m", vec![40.into(), 794.into()]),
        Operation::new("l", vec![400.into(), 794.into()]),
        Operation::new("S", vec![]),
    ];
    for x in [160, 280] {
        operations.push(Operation::new("m", vec![x.into(), 740.into()]));
        operations.push(Operation::new("l", vec![x.into(), 815.into()]));
        operations.push(Operation::new("S", vec![]));
    }
    operations
}

pub fn create_table_pdf(
    path: &Path,
    rows: &[&[&str]],
    ruled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut operations = cell_operations(rows);
    if ruled {
        operations.extend(rule_operations());
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)?;
    Ok(())
}

/// The three-column people table used across the integration tests.
pub const PEOPLE: &[&[&str]] = &[
    &["Name", "Age", "City"],
    &["Alice", "30", "Paris"],
    &["Bob", "25", "Rome"],
];

/// Words laid out on a regular grid: `rows[i][j]` starts at
/// `x = 100 * j` and sits on text row `i`, each row 10 high and 20 apart.
/// Empty strings leave the slot blank.
pub fn grid_words(rows: &[&[&str]]) -> Vec<Word> {
    let mut words = Vec::new();
    for (row_index, row) in rows.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let top = 20.0 * row_index as f64;
        for (col_index, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let x0 = 100.0 * col_index as f64;
            let mut x = x0;
            for part in cell.split_whitespace() {
                #[allow(clippy::cast_precision_loss)]
                let width = 6.0 * part.chars().count() as f64;
                words.push(Word::new(part, x, top, x + width, top + 10.0));
                x += width + 3.0;
            }
        }
    }
    words
}

pub fn grid_context(rows: &[&[&str]]) -> GeometryContext {
    let columns = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let region = BBox::new(
        0.0,
        0.0,
        100.0 * columns.max(1) as f64,
        20.0 * rows.len().max(1) as f64,
    );
    GeometryContext::new(region, grid_words(rows), vec![], vec![])
}
