//! Fills per-department requisition sheets from a pending detail worksheet.
//!
//! The input workbook carries a date-stamped pending detail sheet (parts down,
//! requesters across), a roster mapping requesters to account ids and
//! department classes, and one template per department class. [`transform`]
//! clones the templates, writes every positive quantity at the template cell
//! addressed by part id and account id, marks the detail sheet as completed
//! and returns the new workbook together with a [`Report`] of what could not
//! be placed.

pub mod classify;
pub mod config;
pub mod error;
pub mod finalize;
pub mod provision;
pub mod report;
pub mod resolve;
pub mod roster;
pub mod selector;
pub mod table;
pub mod workbook;
pub mod xlsx;

use std::collections::BTreeSet;

pub use config::Config;
pub use error::{Result, TransformError};
pub use report::{Diagnostic, MissReason, MissRecord, Report};
pub use roster::DeptClass;
pub use workbook::{CellValue, Sheet, Workbook};

use classify::collect_requisitions;
use provision::{needed_classes, provision_templates};
use resolve::Writer;
use roster::build_directory;
use selector::select_detail_sheet;
use table::Table;

#[derive(Debug, Clone)]
pub struct Outcome {
    pub workbook: Vec<u8>,
    pub report: Report,
}

/// Decodes `input`, runs [`transform_workbook`] and encodes the result.
/// The input buffer is never modified.
pub fn transform(input: &[u8], config: &Config) -> Result<Outcome> {
    let mut book = xlsx::read_workbook(input)?;
    let report = transform_workbook(&mut book, config)?;
    let workbook = finalize::serialize(input, &book)?;
    Ok(Outcome { workbook, report })
}

/// Runs the whole transform on a decoded workbook.
///
/// Fails only on configuration problems (no pending sheet, no roster, roster
/// headers missing). Unresolvable coordinates are collected in the report.
pub fn transform_workbook(book: &mut Workbook, config: &Config) -> Result<Report> {
    config.validate()?;
    let pattern = config.detail_regex()?;

    let selected = select_detail_sheet(&book.sheet_names(), &pattern)?;
    let mut report = Report {
        source_sheet: selected.name.clone(),
        date: selected.date.clone(),
        ..Report::default()
    };
    report.push(Diagnostic::SheetSelected {
        sheet: selected.name.clone(),
    });

    let roster_sheet = book
        .sheet(&config.roster.sheet)
        .ok_or_else(|| TransformError::MissingRoster(config.roster.sheet.clone()))?;
    let directory = build_directory(roster_sheet, &config.roster, &config.departments)?;

    let detail = Table::from_sheet(&book.sheets()[selected.index], config.source.header_row);

    let requisitions = collect_requisitions(
        &detail,
        &directory,
        &selected.name,
        &config.source.part_column,
        &mut report,
    );

    let demand: BTreeSet<DeptClass> = requisitions.iter().map(|r| r.class).collect();
    let classes = needed_classes(config.provision, &demand);
    let mut targets = provision_templates(book, &classes, &selected.date, config, &mut report);

    let mut writer = Writer::new(config);
    for requisition in &requisitions {
        if writer.place(book, &mut targets, requisition, &detail, &mut report) {
            report.writes += 1;
        }
    }

    report.completed_sheet =
        finalize::mark_completed(book, &selected.name, config, report.writes);

    if report.writes == 0 {
        report.push(Diagnostic::NoWrites);
    } else {
        report.push(Diagnostic::Completed {
            writes: report.writes,
            date: selected.date.clone(),
        });
    }

    Ok(report)
}
