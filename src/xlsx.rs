//! xlsx codec for [`Workbook`]. calamine decodes cell values; saving loads
//! the original file with umya-spreadsheet and replays the workbook's sheet
//! edits and changed cells onto it, so styles, merges, column widths and
//! number formats of every sheet survive.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::{Result, TransformError};
use crate::workbook::{is_valid_sheet_name, CellValue, Sheet, SheetEdit, Workbook};

const MAX_ROWS: u32 = 1_048_576;
const MAX_COLS: u32 = 16_384;

pub fn read_workbook(bytes: &[u8]) -> Result<Workbook> {
    let mut xlsx: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| TransformError::Decode(format!("Failed to open workbook: {}", e)))?;

    let mut sheets = Vec::new();
    for name in xlsx.sheet_names() {
        let range = xlsx.worksheet_range(&name).map_err(|e| {
            TransformError::Decode(format!("Failed to read '{}' sheet: {}", name, e))
        })?;

        let mut sheet = Sheet::new(name.clone());
        if let Some((row0, col0)) = range.start() {
            for (row, col, data) in range.used_cells() {
                let value = data_to_value(data);
                if value != CellValue::Empty {
                    sheet.set_value(row0 + row as u32 + 1, col0 + col as u32 + 1, value);
                }
            }
        }

        let formulas = xlsx.worksheet_formula(&name).map_err(|e| {
            TransformError::Decode(format!("Failed to read formulas of '{}': {}", name, e))
        })?;
        if let Some((row0, col0)) = formulas.start() {
            for (row, col, formula) in formulas.used_cells() {
                if !formula.is_empty() {
                    let (row, col) = (row0 + row as u32 + 1, col0 + col as u32 + 1);
                    sheet.set_formula(row, col, formula.clone());
                }
            }
        }

        sheets.push(sheet);
    }

    Ok(Workbook::loaded(sheets))
}

fn data_to_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
        Data::Empty => CellValue::Empty,
    }
}

/// Writes `book` over `original`, the file it was decoded from. Sheets and
/// cells the transform never touched are carried through as they were.
pub fn write_workbook(original: &[u8], book: &Workbook) -> Result<Vec<u8>> {
    let mut spreadsheet = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(original), true)
        .map_err(|e| TransformError::Decode(format!("Failed to open workbook: {}", e)))?;

    apply_edits(&mut spreadsheet, book)?;

    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&spreadsheet, &mut buffer)
        .map_err(|e| TransformError::Save(format!("Failed to save Excel file: {}", e)))?;
    Ok(buffer.into_inner())
}

fn apply_edits(spreadsheet: &mut Spreadsheet, book: &Workbook) -> Result<()> {
    if let Some(sheet) = book.sheets().iter().find(|s| !is_valid_sheet_name(&s.name)) {
        return Err(TransformError::Save(format!(
            "'{}' is not a valid sheet name",
            sheet.name
        )));
    }

    for edit in book.edits() {
        match edit {
            SheetEdit::Added(name) => {
                spreadsheet.new_sheet(name.as_str()).map_err(|e| {
                    TransformError::Save(format!("Failed to add sheet '{}': {}", name, e))
                })?;
            }
            SheetEdit::Copied { source, name } => {
                let mut copy = target(spreadsheet, source)?.clone();
                copy.set_name(name.as_str());
                spreadsheet.add_sheet(copy).map_err(|e| {
                    TransformError::Save(format!("Failed to add sheet '{}': {}", name, e))
                })?;
            }
            SheetEdit::Renamed { from, to } => {
                target(spreadsheet, from)?.set_name(to.as_str());
            }
        }
    }

    for sheet in book.sheets() {
        let worksheet = target(spreadsheet, &sheet.name)?;
        for (row, col) in sheet.dirty_cells() {
            check_grid(&sheet.name, row, col)?;
            let cell = worksheet.get_cell_mut((col, row));
            if let Some(formula) = sheet.formula(row, col) {
                cell.set_formula(formula);
                continue;
            }
            match sheet.get(row, col) {
                CellValue::Number(n) => cell.set_value_number(*n),
                CellValue::Text(s) => cell.set_value_string(s.as_str()),
                CellValue::Bool(b) => cell.set_value_bool(*b),
                CellValue::Empty => cell.set_value(""),
            };
        }
    }

    Ok(())
}

fn target<'a>(spreadsheet: &'a mut Spreadsheet, name: &str) -> Result<&'a mut Worksheet> {
    spreadsheet
        .get_sheet_by_name_mut(name)
        .ok_or_else(|| TransformError::Save(format!("sheet '{}' is not in the saved workbook", name)))
}

fn check_grid(sheet: &str, row: u32, col: u32) -> Result<()> {
    if row == 0 || col == 0 || row > MAX_ROWS || col > MAX_COLS {
        return Err(TransformError::Save(format!(
            "cell ({}, {}) of '{}' is outside the worksheet grid",
            row, col, sheet
        )));
    }
    Ok(())
}
