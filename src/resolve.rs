//! Coordinate resolution and write-back into the department sheets.
//!
//! A quantity lands at the intersection of the row whose key column holds the
//! part id and the column whose header cell holds the requester's account id.
//! When either lookup fails nothing is written and a [`MissRecord`] is kept.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::classify::Requisition;
use crate::config::{
    AuxiliarySync, Config, HeaderInfoSync, RowAdvance, RowPlacement, TemplateLayout,
};
use crate::provision::Provisioned;
use crate::report::{Diagnostic, MissReason, MissRecord, Report};
use crate::roster::DeptClass;
use crate::table::Table;
use crate::workbook::{normalize, CellValue, Sheet, Workbook};

/// First row from `data_start_row` down whose key cell equals `part_id`,
/// ignoring case and surrounding whitespace.
pub fn find_row_by_key(sheet: &Sheet, layout: &TemplateLayout, part_id: &str) -> Option<u32> {
    let target = normalize(part_id);
    if target.is_empty() {
        return None;
    }
    (layout.data_start_row..=sheet.max_row())
        .find(|&row| normalize(&sheet.text(row, layout.key_column)) == target)
}

/// First column of `header_row` whose cell equals `token`, ignoring case and
/// surrounding whitespace.
pub fn find_column_by_header(sheet: &Sheet, header_row: u32, token: &str) -> Option<u32> {
    let target = normalize(token);
    if target.is_empty() {
        return None;
    }
    (1..=sheet.max_col()).find(|&col| normalize(&sheet.text(header_row, col)) == target)
}

/// Two-phase header lookup for descriptive fields: an exact match on any
/// synonym is preferred, otherwise the first header containing a synonym.
pub fn find_field_column(sheet: &Sheet, header_row: u32, synonyms: &[String]) -> Option<u32> {
    let synonyms: Vec<String> = synonyms
        .iter()
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect();
    if synonyms.is_empty() {
        return None;
    }

    let headers: Vec<(u32, String)> = (1..=sheet.max_col())
        .map(|col| (col, normalize(&sheet.text(header_row, col))))
        .filter(|(_, text)| !text.is_empty())
        .collect();

    headers
        .iter()
        .find(|(_, text)| synonyms.iter().any(|s| text == s))
        .or_else(|| {
            headers
                .iter()
                .find(|(_, text)| synonyms.iter().any(|s| text.contains(s.as_str())))
        })
        .map(|(col, _)| *col)
}

pub struct Writer<'a> {
    config: &'a Config,
    part_rows: HashMap<(DeptClass, String), u32>,
    header_synced: BTreeSet<DeptClass>,
}

impl<'a> Writer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Writer {
            config,
            part_rows: HashMap::new(),
            header_synced: BTreeSet::new(),
        }
    }

    /// Writes one requisition. Returns `true` when the quantity was written.
    /// Classes without an output sheet are skipped; their missing template
    /// has already been reported.
    pub fn place(
        &mut self,
        book: &mut Workbook,
        targets: &mut Provisioned,
        requisition: &Requisition,
        detail: &Table,
        report: &mut Report,
    ) -> bool {
        let config = self.config;
        let layout = &config.layout;
        let Some(target) = targets.get_mut(requisition.class) else {
            return false;
        };
        let Some(sheet) = book.sheet_mut(&target.sheet) else {
            return false;
        };

        let column = find_column_by_header(sheet, layout.header_row, &requisition.account_id);
        let row = match config.placement {
            RowPlacement::Lookup => find_row_by_key(sheet, layout, &requisition.part_id),
            RowPlacement::Sequential if column.is_some() => {
                let key = (requisition.class, normalize(&requisition.part_id));
                let reuse = match config.row_advance {
                    RowAdvance::PerPart => self.part_rows.get(&key).copied(),
                    RowAdvance::PerEntry => None,
                };
                let row = match reuse {
                    Some(row) => row,
                    None => {
                        let row = target.next_row;
                        target.next_row += 1;
                        sheet.set_value(row, layout.key_column, requisition.part_id.as_str());
                        self.part_rows.insert(key, row);
                        row
                    }
                };
                Some(row)
            }
            // A column miss consumes no row.
            RowPlacement::Sequential => None,
        };

        let row_found = row.is_some() || config.placement == RowPlacement::Sequential;
        if let Some(reason) = MissReason::from_axes(row_found, column.is_some()) {
            record_miss(report, &target.label, requisition, reason);
            return false;
        }
        let (Some(row), Some(column)) = (row, column) else {
            return false;
        };

        sheet.set_value(row, column, requisition.quantity);
        debug!(
            "{}: {} x{} for {} at ({}, {})",
            target.sheet,
            requisition.part_id,
            requisition.quantity,
            requisition.requester,
            row,
            column
        );

        if let Some(auxiliary) = &config.auxiliary {
            sync_auxiliary(sheet, layout.header_row, row, auxiliary, detail, requisition.row);
        }
        if let Some(header_info) = &config.header_info {
            if self.header_synced.insert(requisition.class) {
                sync_header_info(sheet, header_info, requisition);
            }
        }

        true
    }
}

fn record_miss(report: &mut Report, department: &str, requisition: &Requisition, reason: MissReason) {
    if reason.row_missing() {
        report.push(Diagnostic::RowNotFound {
            department: department.to_string(),
            part_id: requisition.part_id.clone(),
        });
    }
    if reason.column_missing() {
        report.push(Diagnostic::ColumnNotFound {
            department: department.to_string(),
            account_id: requisition.account_id.clone(),
            requester: requisition.requester.clone(),
        });
    }
    report.misses.push(MissRecord {
        department: department.to_string(),
        requester: requisition.requester.clone(),
        part_id: requisition.part_id.clone(),
        account_id: requisition.account_id.clone(),
        reason,
    });
}

/// Copies descriptive detail columns into the output row. The fallback column
/// is read when the source cell is blank; blank values write nothing.
fn sync_auxiliary(
    sheet: &mut Sheet,
    header_row: u32,
    row: u32,
    auxiliary: &AuxiliarySync,
    detail: &Table,
    detail_row: usize,
) {
    let Some(values) = detail.rows.get(detail_row) else {
        return;
    };

    for field in &auxiliary.fields {
        let Some(column) = find_field_column(sheet, header_row, &field.synonyms) else {
            continue;
        };

        let lookup = |name: &str| -> Option<CellValue> {
            detail
                .column(name)
                .map(|col| detail.value(values, col).clone())
                .filter(|value| !value.is_blank())
        };
        let value = lookup(&field.source).or_else(|| field.fallback.as_deref().and_then(lookup));

        if let Some(value) = value {
            sheet.set_value(row, column, value);
        }
    }
}

/// Fills the cell right of each label found in the first `scan_rows` rows,
/// leaving cells that already hold something untouched.
fn sync_header_info(sheet: &mut Sheet, labels: &HeaderInfoSync, requisition: &Requisition) {
    let values = [
        (&labels.requester_labels, Some(requisition.requester.as_str())),
        (&labels.account_labels, Some(requisition.account_id.as_str())),
        (&labels.department_labels, requisition.department.as_deref()),
    ];

    let mut writes = Vec::new();
    for row in 1..=labels.scan_rows {
        for col in 1..=sheet.max_col() {
            let text = normalize(&sheet.text(row, col));
            if text.is_empty() {
                continue;
            }
            let matched = values.iter().find(|(labels, _)| {
                labels
                    .iter()
                    .map(|l| normalize(l))
                    .any(|l| !l.is_empty() && text.contains(&l))
            });
            if let Some((_, Some(value))) = matched {
                if sheet.get(row, col + 1).is_blank() && !value.is_empty() {
                    writes.push((row, col + 1, value.to_string()));
                }
            }
        }
    }

    for (row, col, value) in writes {
        sheet.set_value(row, col, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSpec;
    use crate::provision::provision_templates;
    use pretty_assertions::assert_eq;

    fn config() -> Config {
        let mut config = Config::default();
        config.departments.class_a = "DEPT_A".to_string();
        config.departments.class_b = "DEPT_B".to_string();
        config.departments.template_name = "template for {class}".to_string();
        config.departments.output_name = "{class}_output_{date}".to_string();
        config
    }

    fn template() -> Sheet {
        let mut sheet = Sheet::new("template for DEPT_A");
        sheet.set_value(1, 1, "Requester:");
        sheet.set_value(1, 3, "Account:");
        sheet.set_value(1, 4, "preset");
        sheet.set_value(2, 1, "Department");
        sheet.set_value(5, 2, "Vendor Name");
        sheet.set_value(5, 3, "Desc");
        sheet.set_value(5, 4, "Description");
        sheet.set_value(5, 5, "Part No");
        sheet.set_value(5, 6, "E001");
        sheet.set_value(5, 7, " e002 ");
        sheet.set_value(8, 5, "PN-100");
        sheet.set_value(9, 5, "PN-200");
        sheet
    }

    fn requisition(part: &str, requester: &str, account: &str, quantity: f64) -> Requisition {
        Requisition {
            row: 0,
            part_id: part.to_string(),
            requester: requester.to_string(),
            class: DeptClass::A,
            account_id: account.to_string(),
            department: Some("Assembly".to_string()),
            quantity,
        }
    }

    fn detail() -> Table {
        let mut sheet = Sheet::new("detail");
        for (col, header) in ["IEC PN", "Vendor", "Item", "Spec"].iter().enumerate() {
            sheet.set_value(1, col as u32 + 1, *header);
        }
        sheet.set_value(2, 1, "PN-100");
        sheet.set_value(2, 2, "ACME");
        sheet.set_value(2, 4, "M3 screw");
        Table::from_sheet(&sheet, 1)
    }

    fn setup(config: &Config) -> (Workbook, Provisioned, Report) {
        let mut book = Workbook::new();
        book.push_sheet(template());
        let mut report = Report::default();
        let targets = provision_templates(&mut book, &[DeptClass::A], "20240601", config, &mut report);
        (book, targets, report)
    }

    #[test]
    fn lookups_ignore_case_and_whitespace() {
        let sheet = template();
        let layout = TemplateLayout::default();
        assert_eq!(find_row_by_key(&sheet, &layout, " pn-100 "), Some(8));
        assert_eq!(find_row_by_key(&sheet, &layout, "PN-300"), None);
        assert_eq!(find_row_by_key(&sheet, &layout, ""), None);
        assert_eq!(find_column_by_header(&sheet, 5, "E002"), Some(7));
        assert_eq!(find_column_by_header(&sheet, 5, "E999"), None);
    }

    #[test]
    fn row_search_starts_at_data_start_row() {
        let sheet = template();
        let layout = TemplateLayout {
            data_start_row: 9,
            ..TemplateLayout::default()
        };
        assert_eq!(find_row_by_key(&sheet, &layout, "PN-100"), None);
    }

    #[test]
    fn field_lookup_prefers_exact_over_substring() {
        let sheet = template();
        let synonyms = vec!["description".to_string()];
        assert_eq!(find_field_column(&sheet, 5, &synonyms), Some(4));

        let synonyms = vec!["vendor".to_string()];
        assert_eq!(find_field_column(&sheet, 5, &synonyms), Some(2));
        assert_eq!(find_field_column(&sheet, 5, &[]), None);
    }

    #[test]
    fn writes_quantity_at_intersection() {
        let config = config();
        let (mut book, mut targets, mut report) = setup(&config);
        let mut writer = Writer::new(&config);

        let written = writer.place(&mut book, &mut targets, &requisition("pn-100", "Alice", "E001", 3.0), &detail(), &mut report);

        assert!(written);
        let sheet = book.sheet("DEPT_A_output_20240601").unwrap();
        assert_eq!(sheet.get(8, 6), &CellValue::Number(3.0));
        assert!(report.misses.is_empty());
    }

    #[test]
    fn later_write_to_same_cell_wins() {
        let config = config();
        let (mut book, mut targets, mut report) = setup(&config);
        let mut writer = Writer::new(&config);
        let detail = detail();

        writer.place(&mut book, &mut targets, &requisition("PN-100", "Alice", "E001", 3.0), &detail, &mut report);
        writer.place(&mut book, &mut targets, &requisition("PN-100", "Alice", "E001", 5.0), &detail, &mut report);

        assert_eq!(book.sheet("DEPT_A_output_20240601").unwrap().get(8, 6), &CellValue::Number(5.0));
    }

    #[test]
    fn misses_are_recorded_per_axis() {
        let config = config();
        let (mut book, mut targets, mut report) = setup(&config);
        let mut writer = Writer::new(&config);
        let detail = detail();

        assert!(!writer.place(&mut book, &mut targets, &requisition("PN-404", "Alice", "E001", 1.0), &detail, &mut report));
        assert!(!writer.place(&mut book, &mut targets, &requisition("PN-404", "Eve", "E404", 1.0), &detail, &mut report));

        let reasons: Vec<MissReason> = report.misses.iter().map(|m| m.reason).collect();
        assert_eq!(reasons, vec![MissReason::RowNotFound, MissReason::RowAndColumnNotFound]);
        assert_eq!(report.diagnostics.len(), 3);
        assert_eq!(report.misses[0].department, "DEPT_A");
    }

    #[test]
    fn class_without_target_is_skipped_silently() {
        let config = config();
        let (mut book, mut targets, mut report) = setup(&config);
        let mut writer = Writer::new(&config);
        let mut req = requisition("PN-100", "Bob", "E001", 2.0);
        req.class = DeptClass::B;

        assert!(!writer.place(&mut book, &mut targets, &req, &detail(), &mut report));
        assert!(report.misses.is_empty());
    }

    #[test]
    fn sequential_per_part_shares_rows() {
        let mut config = config();
        config.placement = RowPlacement::Sequential;
        config.row_advance = RowAdvance::PerPart;
        config.layout.data_start_row = 10;
        let (mut book, mut targets, mut report) = setup(&config);
        let mut writer = Writer::new(&config);
        let detail = detail();

        writer.place(&mut book, &mut targets, &requisition("PN-500", "Alice", "E001", 1.0), &detail, &mut report);
        writer.place(&mut book, &mut targets, &requisition("pn-500", "Bob", "E002", 2.0), &detail, &mut report);
        writer.place(&mut book, &mut targets, &requisition("PN-600", "Alice", "E001", 3.0), &detail, &mut report);

        let sheet = book.sheet("DEPT_A_output_20240601").unwrap();
        assert_eq!(sheet.text(10, 5), "PN-500");
        assert_eq!(sheet.get(10, 6), &CellValue::Number(1.0));
        assert_eq!(sheet.get(10, 7), &CellValue::Number(2.0));
        assert_eq!(sheet.text(11, 5), "PN-600");
        assert_eq!(targets.get(DeptClass::A).unwrap().next_row, 12);
    }

    #[test]
    fn sequential_per_entry_allocates_each_time() {
        let mut config = config();
        config.placement = RowPlacement::Sequential;
        config.layout.data_start_row = 10;
        let (mut book, mut targets, mut report) = setup(&config);
        let mut writer = Writer::new(&config);
        let detail = detail();

        writer.place(&mut book, &mut targets, &requisition("PN-500", "Alice", "E001", 1.0), &detail, &mut report);
        writer.place(&mut book, &mut targets, &requisition("PN-500", "Bob", "E002", 2.0), &detail, &mut report);
        assert!(!writer.place(&mut book, &mut targets, &requisition("PN-500", "Eve", "E404", 2.0), &detail, &mut report));

        let sheet = book.sheet("DEPT_A_output_20240601").unwrap();
        assert_eq!(sheet.get(10, 6), &CellValue::Number(1.0));
        assert_eq!(sheet.get(11, 7), &CellValue::Number(2.0));
        assert_eq!(targets.get(DeptClass::A).unwrap().next_row, 12);
        assert_eq!(report.misses[0].reason, MissReason::ColumnNotFound);
    }

    #[test]
    fn auxiliary_fields_use_fallback_when_blank() {
        let mut config = config();
        config.auxiliary = Some(AuxiliarySync {
            fields: vec![
                FieldSpec {
                    key: "vendor".to_string(),
                    source: "Vendor".to_string(),
                    fallback: None,
                    synonyms: vec!["vendor".to_string()],
                },
                FieldSpec {
                    key: "description".to_string(),
                    source: "Item".to_string(),
                    fallback: Some("Spec".to_string()),
                    synonyms: vec!["description".to_string()],
                },
            ],
        });
        let (mut book, mut targets, mut report) = setup(&config);
        let mut writer = Writer::new(&config);

        writer.place(&mut book, &mut targets, &requisition("PN-100", "Alice", "E001", 3.0), &detail(), &mut report);

        let sheet = book.sheet("DEPT_A_output_20240601").unwrap();
        assert_eq!(sheet.text(8, 2), "ACME");
        assert_eq!(sheet.text(8, 4), "M3 screw");
        assert_eq!(sheet.text(8, 3), "");
    }

    #[test]
    fn header_info_fills_blank_cells_once_per_class() {
        let mut config = config();
        config.header_info = Some(HeaderInfoSync {
            scan_rows: 4,
            requester_labels: vec!["requester".to_string()],
            account_labels: vec!["account".to_string()],
            department_labels: vec!["department".to_string()],
        });
        let (mut book, mut targets, mut report) = setup(&config);
        let mut writer = Writer::new(&config);
        let detail = detail();

        writer.place(&mut book, &mut targets, &requisition("PN-100", "Alice", "E001", 3.0), &detail, &mut report);
        writer.place(&mut book, &mut targets, &requisition("PN-200", "Bob", "E002", 1.0), &detail, &mut report);

        let sheet = book.sheet("DEPT_A_output_20240601").unwrap();
        assert_eq!(sheet.text(1, 2), "Alice");
        assert_eq!(sheet.text(1, 4), "preset");
        assert_eq!(sheet.text(2, 2), "Assembly");
    }
}
