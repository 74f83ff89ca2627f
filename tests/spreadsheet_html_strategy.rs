//! End-to-end scenario 3: one sheet, 3 columns, 25 data rows, html strategy,
//! html_chunk_rows=10 -> 3 chunks of 10/10/5 rows, all sharing the header row.

use chunk_materialize::config::{ExcelConfig, ExcelStrategy};
use chunk_materialize::spreadsheet::SpreadsheetSplitter;

fn csv_fixture(rows: usize, cols: usize) -> Vec<u8> {
    let header = (0..cols).map(|c| format!("col{c}")).collect::<Vec<_>>().join(",");
    let mut out = format!("{header}\n");
    for r in 0..rows {
        let row = (0..cols).map(|c| format!("r{r}c{c}")).collect::<Vec<_>>().join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out.into_bytes()
}

#[test]
fn html_strategy_chunks_into_three_row_blocks() {
    let config = ExcelConfig {
        default_strategy: ExcelStrategy::Html,
        html_chunk_rows: Some(10),
        preprocess_merged_cells: true,
        number_formatting: true,
    };

    let bytes = csv_fixture(25, 3);
    let splitter = SpreadsheetSplitter::new();
    let chunks = splitter.split(&bytes, &config).expect("split should succeed");

    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert!(chunk.content.contains("<th>col0</th>"));
        assert!(chunk.content.starts_with("<table>"));
    }
    assert_eq!(chunks[0].content.matches("<tr>").count(), 11); // header + 10 rows
    assert_eq!(chunks[1].content.matches("<tr>").count(), 11);
    assert_eq!(chunks[2].content.matches("<tr>").count(), 6); // header + 5 rows
}
