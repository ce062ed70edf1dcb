use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::ExportError;
use crate::grid::CellGrid;

/// Render a grid as delimited text; the header row is written only when the
/// grid has headers.
///
/// # Errors
///
/// Returns [`ExportError`] when the CSV writer fails.
pub fn grid_to_csv_string(grid: &CellGrid, delimiter: u8) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(Vec::<u8>::new());
    if !grid.headers().is_empty() {
        writer.write_record(grid.headers())?;
    }
    for row in grid.rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|error| ExportError::Io(error.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Read a delimited file as a grid whose first record is the header row.
///
/// # Errors
///
/// Returns [`ExportError`] when the file cannot be read or parsed.
pub fn read_grid(path: &Path, delimiter: u8) -> Result<CellGrid, ExportError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut records = reader
        .records()
        .map(|record| record.map(|record| record.iter().map(str::to_string).collect::<Vec<_>>()));
    let headers = records.next().transpose()?.unwrap_or_default();
    let rows = records.collect::<Result<Vec<_>, _>>()?;
    Ok(CellGrid::new(headers, rows).with_geometry(Vec::new(), Vec::new(), "csv"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{grid_to_csv_string, read_grid};
    use crate::grid::CellGrid;

    #[test]
    fn quotes_cells_containing_the_delimiter() {
        let grid = CellGrid::from_strs(&["Name", "Note"], &[&["Alice", "a, b"]]);
        let csv = grid_to_csv_string(&grid, b',').expect("csv should render");
        assert_eq!(csv, "Name,Note\nAlice,\"a, b\"\n");
    }

    #[test]
    fn skips_header_record_for_headerless_grids() {
        let grid = CellGrid::from_strs(&[], &[&["1", "2"]]);
        let csv = grid_to_csv_string(&grid, b';').expect("csv should render");
        assert_eq!(csv, "1;2\n");
    }

    #[test]
    fn reads_first_record_as_headers() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        write!(file, "A,B\n1,2\n3\n").expect("fixture should be written");

        let grid = read_grid(file.path(), b',').expect("csv should parse");
        assert_eq!(grid.headers(), ["A", "B"]);
        assert_eq!(grid.rows(), [vec!["1", "2"], vec!["3", ""]]);
        assert_eq!(grid.method(), "csv");
    }
}
