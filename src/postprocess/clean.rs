use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::char::decompose_compatible;

use super::{Postprocessor, Processed};
use crate::geometry::GeometryContext;
use crate::grid::CellGrid;

/// Glyphs that symbol fonts commonly place in control-character slots.
const SYMBOL_GLYPHS: &[(char, char)] = &[
    ('\u{1}', '\u{b1}'),
    ('\u{2}', '\u{d7}'),
    ('\u{3}', '\u{2212}'),
    ('\u{4}', '\u{2264}'),
    ('\u{5}', '\u{2265}'),
    ('\u{6}', '\u{2020}'),
    ('\u{7}', '\u{2021}'),
    ('\u{8}', '\u{b7}'),
];

static MINUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x{2212}\s*(\.?\d)").expect("hardcoded minus regex is valid")
});

static BARE_DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([-+]?)\.(\d+)$").expect("hardcoded bare decimal regex is valid")
});

fn is_ligature(c: char) -> bool {
    ('\u{fb00}'..='\u{fb06}').contains(&c)
}

fn is_stray_control(c: char) -> bool {
    c.is_control() && !c.is_whitespace()
}

/// Normalises cell text: ligatures, whitespace, minus signs, bare decimals
/// and control characters left behind by symbol fonts.
#[derive(Debug, Clone, Default)]
pub struct CellCleaner;

/// Control characters that occur inside spans set in a symbol font.
fn symbol_controls(ctx: &GeometryContext) -> HashSet<char> {
    ctx.spans()
        .iter()
        .filter(|span| span.is_symbol_font())
        .flat_map(|span| span.text.chars().filter(|c| is_stray_control(*c)))
        .collect()
}

pub(crate) fn clean_cell(text: &str, symbol_controls: &HashSet<char>) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_ligature(c) {
            decompose_compatible(c, |part| out.push(part));
        } else if is_stray_control(c) {
            if symbol_controls.contains(&c)
                && let Some((_, glyph)) = SYMBOL_GLYPHS.iter().find(|(slot, _)| *slot == c)
            {
                out.push(*glyph);
            }
        } else {
            out.push(c);
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    let minus_fixed = MINUS_RE.replace_all(&collapsed, "-${1}");
    BARE_DECIMAL_RE
        .replace(&minus_fixed, "${1}0.${2}")
        .into_owned()
}

impl Postprocessor for CellCleaner {
    fn name(&self) -> &str {
        "cell_cleaner"
    }

    fn process(&self, grid: &CellGrid, ctx: &GeometryContext) -> Processed {
        let controls = symbol_controls(ctx);
        let headers = grid
            .headers()
            .iter()
            .map(|cell| clean_cell(cell, &controls))
            .collect();
        let rows = grid
            .rows()
            .iter()
            .map(|row| row.iter().map(|cell| clean_cell(cell, &controls)).collect())
            .collect();

        let next = grid
            .with_headers(headers, grid.header_extent())
            .with_rows(rows, grid.row_extents().to_vec());
        Processed::changed_if(grid, next)
    }
}
