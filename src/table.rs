use crate::workbook::{cell_text, CellValue, Sheet};

/// A header row plus the data rows underneath it, read from a sheet.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Trimmed header text per column, index 0 is sheet column 1.
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Reads every column up to the sheet's last populated one. Rows after
    /// `header_row` become data rows; trailing blank cells are padded.
    pub fn from_sheet(sheet: &Sheet, header_row: u32) -> Self {
        let width = sheet.max_col();
        let headers = (1..=width)
            .map(|col| sheet.text(header_row, col))
            .collect();

        let rows = (header_row + 1..=sheet.max_row())
            .map(|row| {
                (1..=width)
                    .map(|col| sheet.get(row, col).clone())
                    .collect()
            })
            .collect();

        Table { headers, rows }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    pub fn value<'a>(&'a self, row: &'a [CellValue], column: usize) -> &'a CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        row.get(column).unwrap_or(&EMPTY)
    }

    pub fn text(&self, row: &[CellValue], column: usize) -> String {
        cell_text(self.value(row, column))
    }
}
