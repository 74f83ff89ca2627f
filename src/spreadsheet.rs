//! SpreadsheetSplitter: loads a workbook, expands merged cells, and emits HTML-table
//! or row chunks (spec §4.3).

use crate::config::{ExcelConfig, ExcelStrategy};
use crate::error::{PipelineError, PipelineResult};
use crate::model::Chunk;
use calamine::{open_workbook_auto_from_rs, Data, Dimensions, Reader, Sheets};
use std::io::Cursor;

#[derive(Debug, Clone)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    fn from_calamine(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::String(s) if s.trim().is_empty() => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    fn render(&self, number_formatting: bool) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if number_formatting && n.abs() >= 1000.0 {
                    format_with_thousands_separator(*n)
                } else if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
        }
    }
}

fn format_with_thousands_separator(n: f64) -> String {
    let is_integer = n.fract() == 0.0;
    let sign = if n < 0.0 { "-" } else { "" };
    let abs = n.abs();
    let int_part = abs.trunc() as i64;
    let mut digits: Vec<char> = int_part.to_string().chars().collect();
    let mut grouped = Vec::new();
    while digits.len() > 3 {
        let split_at = digits.len() - 3;
        grouped.push(digits.split_off(split_at));
    }
    grouped.push(digits);
    grouped.reverse();
    let int_str = grouped
        .into_iter()
        .map(|chunk| chunk.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",");

    if is_integer {
        format!("{sign}{int_str}")
    } else {
        format!("{sign}{int_str}{:.2}", abs.fract())
            .replacen("0.", ".", 1)
    }
}

pub struct SheetGrid {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetGrid {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Pre-pass (spec §4.3): for each merged range, copy the top-left value into every
/// cell of the range and clear the merge. Operates on a working copy; never mutates
/// the caller's source bytes.
fn apply_merges(rows: &mut [Vec<CellValue>], merges: &[((usize, usize), (usize, usize))]) {
    for &((start_row, start_col), (end_row, end_col)) in merges {
        if start_row >= rows.len() {
            continue;
        }
        let top_left = rows[start_row]
            .get(start_col)
            .cloned()
            .unwrap_or(CellValue::Empty);
        for row in rows.iter_mut().take(end_row + 1).skip(start_row) {
            for cell in row.iter_mut().take(end_col + 1).skip(start_col) {
                *cell = top_left.clone();
            }
        }
    }
}

/// Dispatches on magic bytes: zip (xlsx/xlsm/ods), OLE2 (legacy xls), else delimited
/// text attempted as CSV UTF-8 then GBK with error replacement.
pub fn load_sheets(bytes: &[u8], preprocess_merged_cells: bool) -> PipelineResult<Vec<SheetGrid>> {
    if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"\xD0\xCF\x11\xE0") {
        load_workbook(bytes, preprocess_merged_cells)
    } else {
        load_csv(bytes)
    }
}

fn worksheet_merge_cells<RS>(workbook: &mut Sheets<RS>, name: &str) -> Option<Vec<Dimensions>>
where
    RS: std::io::Read + std::io::Seek,
{
    match workbook {
        Sheets::Xlsx(e) => e.worksheet_merge_cells(name).and_then(|r| r.ok()),
        Sheets::Xls(e) => e.worksheet_merge_cells(name),
        Sheets::Xlsb(_) | Sheets::Ods(_) => None,
    }
}

fn load_workbook(bytes: &[u8], preprocess_merged_cells: bool) -> PipelineResult<Vec<SheetGrid>> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| PipelineError::Other(anyhow::anyhow!("failed to open workbook: {e}")))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut grids = Vec::with_capacity(sheet_names.len());

    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| PipelineError::Other(anyhow::anyhow!("failed to read sheet {name}: {e}")))?;

        let mut all_rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(CellValue::from_calamine).collect())
            .collect();

        if all_rows.is_empty() {
            continue;
        }

        if preprocess_merged_cells {
            if let Some(merges) = worksheet_merge_cells(&mut workbook, &name) {
                let ranges: Vec<((usize, usize), (usize, usize))> = merges
                    .into_iter()
                    .map(|dim| {
                        (
                            (dim.start.0 as usize, dim.start.1 as usize),
                            (dim.end.0 as usize, dim.end.1 as usize),
                        )
                    })
                    .collect();
                apply_merges(&mut all_rows, &ranges);
            }
        }

        let header_row = all_rows.remove(0);
        let headers = header_row
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let rendered = c.render(false);
                if rendered.is_empty() {
                    format!("col_{i}")
                } else {
                    rendered
                }
            })
            .collect();

        grids.push(SheetGrid {
            name,
            headers,
            rows: all_rows,
        });
    }

    Ok(grids)
}

fn load_csv(bytes: &[u8]) -> PipelineResult<Vec<SheetGrid>> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _encoding, _had_errors) = encoding_rs::GBK.decode(bytes);
            decoded.into_owned()
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::Other(anyhow::anyhow!("failed to read CSV headers: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            PipelineError::Other(anyhow::anyhow!("failed to read CSV record: {e}"))
        })?;
        let row = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    CellValue::Empty
                } else if let Ok(n) = field.parse::<f64>() {
                    CellValue::Number(n)
                } else {
                    CellValue::Text(field.to_string())
                }
            })
            .collect();
        rows.push(row);
    }

    Ok(vec![SheetGrid {
        name: "Sheet1".to_string(),
        headers,
        rows,
    }])
}

/// Smart chunk-size heuristic (spec §4.3): `c` columns, `r` data rows.
pub fn smart_chunk_size(column_count: usize, row_count: usize) -> usize {
    let r = row_count as f64;
    if column_count <= 3 {
        (r / 3.0).max(8.0).min(20.0) as usize
    } else if column_count <= 8 {
        (r / 4.0).max(6.0).min(15.0) as usize
    } else {
        (r / 5.0).max(4.0).min(12.0) as usize
    }
}

fn row_is_empty(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_empty)
}

pub struct SpreadsheetSplitter;

impl SpreadsheetSplitter {
    pub fn new() -> Self {
        Self
    }

    pub fn split(&self, bytes: &[u8], config: &ExcelConfig) -> PipelineResult<Vec<Chunk>> {
        let sheets = load_sheets(bytes, config.preprocess_merged_cells)?;
        let mut chunks = Vec::new();

        for sheet in sheets {
            let strategy = resolve_strategy(config.default_strategy, &sheet);
            let sheet_chunks = match strategy {
                ExcelStrategy::Html => {
                    let rows_per_chunk = config.html_chunk_rows.map(|v| v as usize).unwrap_or_else(|| {
                        smart_chunk_size(sheet.column_count(), sheet.row_count())
                    });
                    html_chunks(&sheet, rows_per_chunk, config.number_formatting)
                }
                ExcelStrategy::Row | ExcelStrategy::Auto => row_chunks(&sheet),
            };
            chunks.extend(sheet_chunks);
        }

        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.source_index = index;
        }
        Ok(chunks)
    }
}

impl Default for SpreadsheetSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_strategy(configured: ExcelStrategy, sheet: &SheetGrid) -> ExcelStrategy {
    match configured {
        ExcelStrategy::Auto => {
            if sheet.column_count() >= 4 && sheet.row_count() >= 20 {
                ExcelStrategy::Html
            } else {
                ExcelStrategy::Row
            }
        }
        other => other,
    }
}

fn html_chunks(sheet: &SheetGrid, rows_per_chunk: usize, number_formatting: bool) -> Vec<Chunk> {
    let rows_per_chunk = rows_per_chunk.max(1);
    let header_row = format!(
        "<tr>{}</tr>",
        sheet
            .headers
            .iter()
            .map(|h| format!("<th>{h}</th>"))
            .collect::<String>()
    );

    let mut chunks = Vec::new();
    for block in sheet.rows.chunks(rows_per_chunk) {
        if block.iter().all(|row| row_is_empty(row)) {
            continue;
        }
        let body: String = block
            .iter()
            .map(|row| {
                let cells: String = row
                    .iter()
                    .map(|cell| format!("<td>{}</td>", cell.render(number_formatting)))
                    .collect();
                format!("<tr>{cells}</tr>")
            })
            .collect();

        let html = format!(
            "<table><caption>{}</caption>{header_row}{body}</table>",
            sheet.name
        );
        chunks.push(Chunk::new(html, chunks.len()));
    }
    chunks
}

fn row_chunks(sheet: &SheetGrid) -> Vec<Chunk> {
    sheet
        .rows
        .iter()
        .filter(|row| !row_is_empty(row))
        .map(|row| {
            let rendered = sheet
                .headers
                .iter()
                .zip(row.iter())
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(header, cell)| format!("{header}: {}", cell.render(true)))
                .collect::<Vec<_>>()
                .join(", ");
            Chunk::new(rendered, 0)
        })
        .collect()
}
