//! Diagnostics gathered during a transform and the miss report exports.

use std::fmt;
use std::io::Write;

use log::{info, warn};
use rust_xlsxwriter::Workbook;
use serde::Serialize;

use crate::error::{Result, TransformError};
use crate::roster::DeptClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissReason {
    RowNotFound,
    ColumnNotFound,
    RowAndColumnNotFound,
}

impl MissReason {
    /// `None` when both axes resolved.
    pub fn from_axes(row_found: bool, column_found: bool) -> Option<Self> {
        match (row_found, column_found) {
            (true, true) => None,
            (false, true) => Some(MissReason::RowNotFound),
            (true, false) => Some(MissReason::ColumnNotFound),
            (false, false) => Some(MissReason::RowAndColumnNotFound),
        }
    }

    pub fn row_missing(&self) -> bool {
        matches!(self, MissReason::RowNotFound | MissReason::RowAndColumnNotFound)
    }

    pub fn column_missing(&self) -> bool {
        matches!(self, MissReason::ColumnNotFound | MissReason::RowAndColumnNotFound)
    }
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::RowNotFound => write!(f, "row-not-found"),
            MissReason::ColumnNotFound => write!(f, "column-not-found"),
            MissReason::RowAndColumnNotFound => write!(f, "row-and-column-not-found"),
        }
    }
}

/// A quantity that could not be placed in its department sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissRecord {
    pub department: String,
    pub requester: String,
    pub part_id: String,
    pub account_id: String,
    pub reason: MissReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    SheetSelected { sheet: String },
    MissingTemplate { department: String, template: String },
    MissingPartColumn { sheet: String, column: String },
    RowNotFound { department: String, part_id: String },
    ColumnNotFound { department: String, account_id: String, requester: String },
    Completed { writes: usize, date: String },
    NoWrites,
}

impl Diagnostic {
    pub fn is_warning(&self) -> bool {
        !matches!(self, Diagnostic::SheetSelected { .. } | Diagnostic::Completed { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SheetSelected { sheet } => write!(f, "processing detail sheet: {}", sheet),
            Diagnostic::MissingTemplate { template, .. } => {
                write!(f, "missing template sheet: {}", template)
            }
            Diagnostic::MissingPartColumn { sheet, column } => write!(
                f,
                "detail sheet '{}' has no '{}' column, every row was skipped",
                sheet, column
            ),
            Diagnostic::RowNotFound { department, part_id } => {
                write!(f, "template {} has no part number: {}", department, part_id)
            }
            Diagnostic::ColumnNotFound {
                department,
                account_id,
                requester,
            } => write!(
                f,
                "template {} has no account id: {} ({})",
                department, account_id, requester
            ),
            Diagnostic::Completed { writes, date } => {
                write!(f, "done: {} quantities written for {}", writes, date)
            }
            Diagnostic::NoWrites => write!(f, "no quantities were written"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSheet {
    pub class: DeptClass,
    pub department: String,
    pub sheet: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub source_sheet: String,
    pub date: String,
    pub completed_sheet: Option<String>,
    pub outputs: Vec<OutputSheet>,
    pub writes: usize,
    pub misses: Vec<MissRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Records a diagnostic and logs it at the matching level.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_warning() {
            warn!("{}", diagnostic);
        } else {
            info!("{}", diagnostic);
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn output_for(&self, class: DeptClass) -> Option<&OutputSheet> {
        self.outputs.iter().find(|o| o.class == class)
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.to_string()).collect()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }
}

const MISS_HEADERS: [&str; 5] = ["Department", "Requester", "Part Number", "Account", "Reason"];

pub fn misses_to_xlsx(misses: &[MissRecord]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name("Misses")
        .map_err(|e| TransformError::Report(format!("Failed to set sheet name: {}", e)))?;

    for (col, header) in MISS_HEADERS.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .map_err(|e| TransformError::Report(format!("Failed to write header: {}", e)))?;
    }

    for (row, miss) in misses.iter().enumerate() {
        let row = row as u32 + 1;
        let reason = miss.reason.to_string();
        let values = [
            miss.department.as_str(),
            miss.requester.as_str(),
            miss.part_id.as_str(),
            miss.account_id.as_str(),
            reason.as_str(),
        ];
        for (col, value) in values.iter().enumerate() {
            worksheet
                .write_string(row, col as u16, *value)
                .map_err(|e| TransformError::Report(format!("Failed to write data: {}", e)))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| TransformError::Report(format!("Failed to save miss report: {}", e)))
}

pub fn write_misses_csv<W: Write>(misses: &[MissRecord], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for miss in misses {
        csv.serialize(miss)
            .map_err(|e| TransformError::Report(format!("Failed to write csv row: {}", e)))?;
    }
    csv.flush()?;
    Ok(())
}
