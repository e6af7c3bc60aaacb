use crate::report::{Diagnostic, Report};
use crate::roster::{DeptClass, Directory};
use crate::table::Table;
use crate::workbook::CellValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterColumn {
    pub index: usize,
    pub name: String,
}

/// Headers whose trimmed text is exactly a directory name, in header order.
/// Matching is case-sensitive on purpose: these are people, not field labels.
pub fn requester_columns(headers: &[String], directory: &Directory) -> Vec<RequesterColumn> {
    headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| {
            let name = header.trim();
            directory.contains(name).then(|| RequesterColumn {
                index,
                name: name.to_string(),
            })
        })
        .collect()
}

/// The quantity of a cell if it is a number greater than zero. Text that
/// happens to look numeric does not count.
pub fn actionable_quantity(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if *n > 0.0 => Some(*n),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Requisition {
    /// Index into the detail table's data rows.
    pub row: usize,
    pub part_id: String,
    pub requester: String,
    pub class: DeptClass,
    pub account_id: String,
    pub department: Option<String>,
    pub quantity: f64,
}

/// Walks the detail table row by row, requester column by requester column,
/// and keeps every actionable quantity. Rows without a part id are skipped
/// whatever their quantities say.
pub fn collect_requisitions(
    detail: &Table,
    directory: &Directory,
    sheet: &str,
    part_column: &str,
    report: &mut Report,
) -> Vec<Requisition> {
    let Some(part_col) = detail.column(part_column) else {
        report.push(Diagnostic::MissingPartColumn {
            sheet: sheet.to_string(),
            column: part_column.to_string(),
        });
        return Vec::new();
    };

    let columns = requester_columns(&detail.headers, directory);
    let mut requisitions = Vec::new();

    for (index, row) in detail.rows.iter().enumerate() {
        let part_id = detail.text(row, part_col);
        if part_id.is_empty() {
            continue;
        }

        for column in &columns {
            let Some(quantity) = actionable_quantity(detail.value(row, column.index)) else {
                continue;
            };
            let Some(entry) = directory.get(&column.name) else {
                continue;
            };
            requisitions.push(Requisition {
                row: index,
                part_id: part_id.clone(),
                requester: column.name.clone(),
                class: entry.class,
                account_id: entry.account_id.clone(),
                department: entry.department.clone(),
                quantity,
            });
        }
    }

    requisitions
}
