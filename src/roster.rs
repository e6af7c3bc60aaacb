//! Requester directory built from the account-holder roster.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::config::{DepartmentConfig, RosterConfig};
use crate::error::{Result, TransformError};
use crate::table::Table;
use crate::workbook::{normalize, Sheet};

/// One of the two cost-center categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DeptClass {
    A,
    B,
}

impl DeptClass {
    pub const ALL: [DeptClass; 2] = [DeptClass::A, DeptClass::B];

    pub fn label<'a>(&self, departments: &'a DepartmentConfig) -> &'a str {
        match self {
            DeptClass::A => &departments.class_a,
            DeptClass::B => &departments.class_b,
        }
    }

    /// Class A when the category mentions the class A marker, ignoring case.
    pub fn classify(category: &str, departments: &DepartmentConfig) -> Self {
        if normalize(category).contains(&normalize(departments.marker())) {
            DeptClass::A
        } else {
            DeptClass::B
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub class: DeptClass,
    pub account_id: String,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: HashMap<String, RosterEntry>,
}

impl Directory {
    pub fn get(&self, name: &str) -> Option<&RosterEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, entry: RosterEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }
}

/// Builds the directory from the roster sheet.
///
/// The first column holds the category and is merged vertically in the
/// source workbook, so blank cells inherit the last non-blank category above
/// them. Rows without a usable name are skipped and a repeated name replaces
/// the earlier entry.
pub fn build_directory(
    sheet: &Sheet,
    roster: &RosterConfig,
    departments: &DepartmentConfig,
) -> Result<Directory> {
    let table = Table::from_sheet(sheet, roster.header_row);

    let name_col = require_column(&table, &sheet.name, &roster.name_column)?;
    let account_col = require_column(&table, &sheet.name, &roster.account_column)?;
    let department_col = roster
        .department_column
        .as_deref()
        .and_then(|name| table.column(name));

    let mut directory = Directory::default();
    let mut category = String::new();

    for row in &table.rows {
        let cell = table.text(row, 0);
        if !cell.is_empty() {
            category = cell;
        }

        let name = table.text(row, name_col);
        if is_null_name(&name) {
            continue;
        }

        let department = department_col
            .map(|col| table.text(row, col))
            .filter(|text| !text.is_empty());

        let entry = RosterEntry {
            class: DeptClass::classify(&category, departments),
            account_id: table.text(row, account_col),
            department,
            name,
        };
        debug!(
            "roster: {} -> {:?} account '{}'",
            entry.name, entry.class, entry.account_id
        );
        directory.insert(entry);
    }

    Ok(directory)
}

fn require_column(table: &Table, sheet: &str, name: &str) -> Result<usize> {
    table
        .column(name)
        .ok_or_else(|| TransformError::MissingColumn {
            sheet: sheet.to_string(),
            column: name.to_string(),
        })
}

fn is_null_name(name: &str) -> bool {
    name.is_empty() || name.eq_ignore_ascii_case("nan") || name.eq_ignore_ascii_case("none")
}
