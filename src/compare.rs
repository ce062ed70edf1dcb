//! Diffing an extracted grid against a reference grid.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strsim::{normalized_levenshtein, sorensen_dice};

use crate::grid::CellGrid;

const FUZZY_CELL_THRESHOLD: f64 = 0.85;
const ROW_MATCH_THRESHOLD: f64 = 0.5;
const COLUMN_MATCH_THRESHOLD: f64 = 0.3;
const EPSILON: f64 = 1e-9;

/// One reference row or column whose content was spread over several
/// consecutive extracted ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub ground_truth: usize,
    pub extracted: Vec<usize>,
}

/// Several consecutive reference rows or columns collapsed into one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub ground_truth: Vec<usize>,
    pub extracted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDiff {
    /// Reference row and column.
    pub row: usize,
    pub col: usize,
    pub expected: String,
    pub actual: String,
    /// Whether the cell still counts under fuzzy matching.
    pub fuzzy_match: bool,
}

/// Outcome of [`compare`]. Percentages are on a 0..=100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Exact matches over aligned data-row cells; headers are not counted.
    pub cell_accuracy: f64,
    /// Reference header cells matched by the aligned extracted header after
    /// normalisation. `None` when the reference has no header row or the
    /// header row is compared as data.
    pub header_accuracy: Option<f64>,
    pub structural_coverage: f64,
    /// `(rows, columns)`.
    pub gt_shape: (usize, usize),
    pub extracted_shape: (usize, usize),
    /// `(reference, extracted)` index pairs.
    pub matched_columns: Vec<(usize, usize)>,
    pub extra_columns: Vec<usize>,
    pub missing_columns: Vec<usize>,
    pub matched_rows: Vec<(usize, usize)>,
    pub extra_rows: Vec<usize>,
    pub missing_rows: Vec<usize>,
    pub row_splits: Vec<SplitRecord>,
    pub row_merges: Vec<MergeRecord>,
    pub column_splits: Vec<SplitRecord>,
    pub column_merges: Vec<MergeRecord>,
    pub cell_diffs: Vec<CellDiff>,
    pub fuzzy_accuracy: f64,
    pub fuzzy_precision: f64,
    pub fuzzy_recall: f64,
    /// No row or no column could be aligned at all.
    pub shape_mismatch: bool,
}

/// Lower-cased text with whitespace runs collapsed.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Exact-after-normalisation or close enough by edit distance.
#[must_use]
pub fn fuzzy_cell_match(expected: &str, actual: &str) -> bool {
    let expected = normalize_text(expected);
    let actual = normalize_text(actual);
    expected == actual || normalized_levenshtein(&expected, &actual) >= FUZZY_CELL_THRESHOLD
}

/// One side of the comparison, padded to a rectangle.
struct Side {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    width: usize,
}

impl Side {
    fn new(headers: &[String], rows: &[Vec<String>]) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(headers.len()))
            .max()
            .unwrap_or(0);
        Self {
            headers: headers.to_vec(),
            rows: rows.to_vec(),
            width,
        }
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map_or("", String::as_str)
    }

    fn header(&self, col: usize) -> &str {
        self.headers.get(col).map_or("", String::as_str)
    }

    fn has_headers(&self) -> bool {
        self.headers.iter().any(|cell| !cell.trim().is_empty())
    }

    fn column_text(&self, col: usize) -> String {
        normalize_text(
            &(0..self.rows.len())
                .map(|row| self.cell(row, col))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Text of consecutive rows, joined cell-wise over `cols`.
    fn rows_text(&self, rows: &[usize], cols: &[usize]) -> String {
        normalize_text(
            &cols
                .iter()
                .map(|col| {
                    rows.iter()
                        .map(|row| self.cell(*row, *col))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Text of consecutive columns, joined cell-wise over `rows`, header first.
    fn columns_text(&self, cols: &[usize], rows: &[usize]) -> String {
        let header = cols
            .iter()
            .map(|col| self.header(*col))
            .collect::<Vec<_>>()
            .join(" ");
        let body = rows
            .iter()
            .map(|row| {
                cols.iter()
                    .map(|col| self.cell(*row, *col))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join(" ");
        normalize_text(&format!("{header} {body}"))
    }

    fn cell_count(&self) -> usize {
        self.rows.len() * self.width
    }
}

fn relative_position(index: usize, count: usize) -> f64 {
    if count <= 1 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let position = index as f64 / (count - 1) as f64;
        position
    }
}

/// Greedy one-to-one column assignment by header text, column content and
/// position.
fn match_columns(gt: &Side, ex: &Side) -> Vec<(usize, usize)> {
    let gt_text = (0..gt.width).map(|col| gt.column_text(col)).collect::<Vec<_>>();
    let ex_text = (0..ex.width).map(|col| ex.column_text(col)).collect::<Vec<_>>();
    let use_headers = gt.has_headers() && ex.has_headers();

    let mut scored = Vec::new();
    for g in 0..gt.width {
        for e in 0..ex.width {
            let content = sorensen_dice(&gt_text[g], &ex_text[e]);
            let positional =
                1.0 - (relative_position(g, gt.width) - relative_position(e, ex.width)).abs();
            let score = if use_headers {
                let header = sorensen_dice(
                    &normalize_text(gt.header(g)),
                    &normalize_text(ex.header(e)),
                );
                0.5 * header + 0.4 * content + 0.1 * positional
            } else {
                0.8 * content + 0.2 * positional
            };
            if score >= COLUMN_MATCH_THRESHOLD {
                scored.push((score, g, e));
            }
        }
    }
    scored.sort_by(|left, right| {
        right
            .0
            .total_cmp(&left.0)
            .then(left.1.abs_diff(left.2).cmp(&right.1.abs_diff(right.2)))
            .then(left.1.cmp(&right.1))
            .then(left.2.cmp(&right.2))
    });

    let mut used_gt = HashSet::new();
    let mut used_ex = HashSet::new();
    let mut matched = Vec::new();
    for (_, g, e) in scored {
        if !used_gt.contains(&g) && !used_ex.contains(&e) {
            used_gt.insert(g);
            used_ex.insert(e);
            matched.push((g, e));
        }
    }
    matched.sort_unstable();
    matched
}

/// Order-preserving row alignment maximising total similarity; pairs below
/// the row threshold never align.
fn align_rows(similarity: &[Vec<f64>], n: usize, m: usize) -> Vec<(usize, usize)> {
    let mut score = vec![vec![0.0_f64; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            let sim = similarity[i - 1][j - 1];
            let diagonal = if sim >= ROW_MATCH_THRESHOLD {
                score[i - 1][j - 1] + sim
            } else {
                f64::NEG_INFINITY
            };
            score[i][j] = diagonal.max(score[i - 1][j]).max(score[i][j - 1]);
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        let sim = similarity[i - 1][j - 1];
        if sim >= ROW_MATCH_THRESHOLD && (score[i][j] - (score[i - 1][j - 1] + sim)).abs() < EPSILON
        {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if score[i - 1][j] >= score[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}

fn consecutive(run: &[usize]) -> bool {
    run.windows(2).all(|pair| pair[1] == pair[0] + 1)
}

/// First run of at least two consecutive, unused indices from `available`
/// accepted by `accept`.
fn find_run(
    available: &[usize],
    used: &HashSet<usize>,
    accept: impl Fn(&[usize]) -> bool,
) -> Option<Vec<usize>> {
    for start in 0..available.len() {
        for end in start + 2..=available.len() {
            let run = &available[start..end];
            if run.iter().any(|index| used.contains(index)) || !consecutive(run) {
                break;
            }
            if accept(run) {
                return Some(run.to_vec());
            }
        }
    }
    None
}

/// Longest-improving extension of `anchor` with the unused indices that
/// directly follow it.
fn extend_match(
    anchor: usize,
    available: &HashSet<usize>,
    used: &HashSet<usize>,
    similarity: impl Fn(&[usize]) -> f64,
) -> Option<Vec<usize>> {
    let mut run = vec![anchor];
    let base = similarity(&run);
    let mut best: Option<(f64, usize)> = None;
    let mut next = anchor + 1;
    while available.contains(&next) && !used.contains(&next) {
        run.push(next);
        let sim = similarity(&run);
        if sim >= ROW_MATCH_THRESHOLD && sim > base + EPSILON && best.is_none_or(|(top, _)| sim > top)
        {
            best = Some((sim, run.len()));
        }
        next += 1;
    }
    best.map(|(_, len)| run[..len].to_vec())
}

/// Split and merge detection shared by rows and columns.
///
/// `split_sim(g, run)` scores one reference unit against consecutive
/// extracted units; `merge_sim(run, e)` the reverse.
fn splits_and_merges(
    matched: &[(usize, usize)],
    gt_unmatched: &[usize],
    ex_unmatched: &[usize],
    split_sim: impl Fn(usize, &[usize]) -> f64,
    merge_sim: impl Fn(&[usize], usize) -> f64,
) -> (Vec<SplitRecord>, Vec<MergeRecord>) {
    let gt_free = gt_unmatched.iter().copied().collect::<HashSet<_>>();
    let ex_free = ex_unmatched.iter().copied().collect::<HashSet<_>>();
    let mut used_gt = HashSet::new();
    let mut used_ex = HashSet::new();
    let mut splits = Vec::new();
    let mut merges = Vec::new();

    for (g, e) in matched {
        if let Some(run) = extend_match(*e, &ex_free, &used_ex, |run| split_sim(*g, run)) {
            used_ex.extend(run.iter().copied());
            splits.push(SplitRecord {
                ground_truth: *g,
                extracted: run,
            });
        } else if let Some(run) = extend_match(*g, &gt_free, &used_gt, |run| merge_sim(run, *e)) {
            used_gt.extend(run.iter().copied());
            merges.push(MergeRecord {
                ground_truth: run,
                extracted: *e,
            });
        }
    }

    for g in gt_unmatched {
        if used_gt.contains(g) {
            continue;
        }
        if let Some(run) = find_run(ex_unmatched, &used_ex, |run| {
            split_sim(*g, run) >= ROW_MATCH_THRESHOLD
        }) {
            used_gt.insert(*g);
            used_ex.extend(run.iter().copied());
            splits.push(SplitRecord {
                ground_truth: *g,
                extracted: run,
            });
        }
    }
    for e in ex_unmatched {
        if used_ex.contains(e) {
            continue;
        }
        if let Some(run) = find_run(gt_unmatched, &used_gt, |run| {
            merge_sim(run, *e) >= ROW_MATCH_THRESHOLD
        }) {
            used_ex.insert(*e);
            used_gt.extend(run.iter().copied());
            merges.push(MergeRecord {
                ground_truth: run,
                extracted: *e,
            });
        }
    }

    splits.sort_by_key(|split| split.ground_truth);
    merges.sort_by_key(|merge| merge.extracted);
    (splits, merges)
}

fn unmatched(count: usize, matched: impl Iterator<Item = usize>) -> Vec<usize> {
    let matched = matched.collect::<HashSet<_>>();
    (0..count).filter(|index| !matched.contains(index)).collect()
}

/// Indices involved in splits or merges, on the reference or extracted side.
fn involved(splits: &[SplitRecord], merges: &[MergeRecord], reference: bool) -> HashSet<usize> {
    if reference {
        splits
            .iter()
            .map(|split| split.ground_truth)
            .chain(merges.iter().flat_map(|merge| merge.ground_truth.iter().copied()))
            .collect()
    } else {
        splits
            .iter()
            .flat_map(|split| split.extracted.iter().copied())
            .chain(merges.iter().map(|merge| merge.extracted))
            .collect()
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = 100.0 * part as f64 / whole as f64;
    value
}

/// Diff extracted headers and rows against a reference.
///
/// Cell accuracy covers data rows only; the header row is scored separately
/// in `header_accuracy`. When the reference has no data rows, both header
/// rows are compared as data instead.
#[must_use]
pub fn compare(
    extracted_headers: &[String],
    extracted_rows: &[Vec<String>],
    gt_headers: &[String],
    gt_rows: &[Vec<String>],
) -> ComparisonResult {
    let (gt, ex) = if gt_rows.is_empty() {
        let ex_rows = if extracted_headers.is_empty() {
            extracted_rows.to_vec()
        } else {
            std::iter::once(extracted_headers.to_vec())
                .chain(extracted_rows.iter().cloned())
                .collect()
        };
        (
            Side::new(&[], &[gt_headers.to_vec()]),
            Side::new(&[], &ex_rows),
        )
    } else {
        (
            Side::new(gt_headers, gt_rows),
            Side::new(extracted_headers, extracted_rows),
        )
    };

    let matched_columns = match_columns(&gt, &ex);
    let (gt_cols, ex_cols): (Vec<_>, Vec<_>) = if matched_columns.is_empty() {
        ((0..gt.width).collect(), (0..ex.width).collect())
    } else {
        matched_columns.iter().copied().unzip()
    };

    let gt_texts = (0..gt.rows.len())
        .map(|row| gt.rows_text(&[row], &gt_cols))
        .collect::<Vec<_>>();
    let ex_texts = (0..ex.rows.len())
        .map(|row| ex.rows_text(&[row], &ex_cols))
        .collect::<Vec<_>>();
    let similarity = gt_texts
        .iter()
        .map(|gt_text| {
            ex_texts
                .iter()
                .map(|ex_text| normalized_levenshtein(gt_text, ex_text))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let matched_rows = align_rows(&similarity, gt.rows.len(), ex.rows.len());

    let gt_row_gaps = unmatched(gt.rows.len(), matched_rows.iter().map(|(g, _)| *g));
    let ex_row_gaps = unmatched(ex.rows.len(), matched_rows.iter().map(|(_, e)| *e));
    let (row_splits, row_merges) = splits_and_merges(
        &matched_rows,
        &gt_row_gaps,
        &ex_row_gaps,
        |g, run| normalized_levenshtein(&gt_texts[g], &ex.rows_text(run, &ex_cols)),
        |run, e| normalized_levenshtein(&gt.rows_text(run, &gt_cols), &ex_texts[e]),
    );

    let (gt_aligned, ex_aligned): (Vec<_>, Vec<_>) = matched_rows.iter().copied().unzip();
    let gt_col_gaps = unmatched(gt.width, matched_columns.iter().map(|(g, _)| *g));
    let ex_col_gaps = unmatched(ex.width, matched_columns.iter().map(|(_, e)| *e));
    let (column_splits, column_merges) = splits_and_merges(
        &matched_columns,
        &gt_col_gaps,
        &ex_col_gaps,
        |g, run| {
            normalized_levenshtein(
                &gt.columns_text(&[g], &gt_aligned),
                &ex.columns_text(run, &ex_aligned),
            )
        },
        |run, e| {
            normalized_levenshtein(
                &gt.columns_text(run, &gt_aligned),
                &ex.columns_text(&[e], &ex_aligned),
            )
        },
    );

    let mut exact = 0;
    let mut fuzzy = 0;
    let mut cell_diffs = Vec::new();
    for (gr, er) in &matched_rows {
        for (gc, ec) in &matched_columns {
            let expected = gt.cell(*gr, *gc);
            let actual = ex.cell(*er, *ec);
            let fuzzy_match = fuzzy_cell_match(expected, actual);
            fuzzy += usize::from(fuzzy_match);
            if expected.trim() == actual.trim() {
                exact += 1;
            } else {
                cell_diffs.push(CellDiff {
                    row: *gr,
                    col: *gc,
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                    fuzzy_match,
                });
            }
        }
    }
    let compared = matched_rows.len() * matched_columns.len();
    let header_accuracy = gt
        .headers
        .iter()
        .any(|header| !header.trim().is_empty())
        .then(|| {
            let correct = matched_columns
                .iter()
                .filter(|(gc, ec)| {
                    normalize_text(gt.header(*gc)) == normalize_text(ex.header(*ec))
                })
                .count();
            percent(correct, gt.width)
        });

    let gt_row_involved = involved(&row_splits, &row_merges, true);
    let ex_row_involved = involved(&row_splits, &row_merges, false);
    let gt_col_involved = involved(&column_splits, &column_merges, true);
    let ex_col_involved = involved(&column_splits, &column_merges, false);

    ComparisonResult {
        cell_accuracy: percent(exact, compared),
        header_accuracy,
        structural_coverage: percent(compared, gt.cell_count()),
        gt_shape: (gt.rows.len(), gt.width),
        extracted_shape: (ex.rows.len(), ex.width),
        extra_columns: without(&ex_col_gaps, &ex_col_involved),
        missing_columns: without(&gt_col_gaps, &gt_col_involved),
        extra_rows: without(&ex_row_gaps, &ex_row_involved),
        missing_rows: without(&gt_row_gaps, &gt_row_involved),
        shape_mismatch: gt.cell_count() > 0 && compared == 0,
        matched_columns,
        matched_rows,
        row_splits,
        row_merges,
        column_splits,
        column_merges,
        cell_diffs,
        fuzzy_accuracy: percent(fuzzy, compared),
        fuzzy_precision: percent(fuzzy, ex.cell_count()),
        fuzzy_recall: percent(fuzzy, gt.cell_count()),
    }
}

fn without(indices: &[usize], remove: &HashSet<usize>) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .filter(|index| !remove.contains(index))
        .collect()
}

/// [`compare`] over two grids.
#[must_use]
pub fn compare_grids(extracted: &CellGrid, ground_truth: &CellGrid) -> ComparisonResult {
    compare(
        extracted.headers(),
        extracted.rows(),
        ground_truth.headers(),
        ground_truth.rows(),
    )
}
