//! In-memory workbook used by the transform.
//!
//! Coordinates are 1-based `(row, col)` pairs, matching the way template
//! layouts are described (header on row 5, part numbers in column E, ...).
//! Values are decoded with calamine. Saving replays the recorded sheet edits
//! and changed cells onto the original file, see [`crate::xlsx`].

use std::collections::{BTreeMap, BTreeSet};

/// Longest sheet name Excel accepts.
pub const MAX_SHEET_NAME: usize = 31;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        cell_text(self).is_empty()
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub formula: Option<String>,
}

/// Trimmed display text of a cell. Whole numbers render without a decimal
/// part so that `1234.0` read from a sheet compares equal to `"1234"`.
pub fn cell_text(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
    }
}

/// Key used for every case- and whitespace-insensitive comparison.
pub fn normalize(text: &str) -> String {
    text.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u32), Cell>,
    dirty: BTreeSet<(u32, u32)>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Sheet {
            name: name.into(),
            cells: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells
            .get(&(row, col))
            .map(|cell| &cell.value)
            .unwrap_or(&EMPTY)
    }

    pub fn text(&self, row: u32, col: u32) -> String {
        cell_text(self.get(row, col))
    }

    pub fn formula(&self, row: u32, col: u32) -> Option<&str> {
        self.cells
            .get(&(row, col))
            .and_then(|cell| cell.formula.as_deref())
    }

    /// Sets a value, dropping any formula previously stored at the
    /// coordinate. Writing `Empty` removes the cell.
    pub fn set_value(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        let value = value.into();
        self.dirty.insert((row, col));
        if value == CellValue::Empty {
            self.cells.remove(&(row, col));
            return;
        }
        self.cells.insert(
            (row, col),
            Cell {
                value,
                formula: None,
            },
        );
    }

    pub fn set_formula(&mut self, row: u32, col: u32, formula: impl Into<String>) {
        let cell = self.cells.entry((row, col)).or_default();
        cell.formula = Some(formula.into());
        self.dirty.insert((row, col));
    }

    pub fn max_row(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    pub fn max_col(&self) -> u32 {
        self.cells.keys().map(|(_, col)| *col).max().unwrap_or(0)
    }

    pub fn cells(&self) -> impl Iterator<Item = ((u32, u32), &Cell)> {
        self.cells.iter().map(|(pos, cell)| (*pos, cell))
    }

    /// Coordinates written since the sheet was loaded.
    pub fn dirty_cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.dirty.iter().copied()
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty.clear();
    }
}

/// Structural change to the sheet list, replayed in order on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetEdit {
    Added(String),
    Copied { source: String, name: String },
    Renamed { from: String, to: String },
}

/// Excel compares sheet names without regard to case.
pub fn same_sheet_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub fn is_valid_sheet_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_SHEET_NAME
        && !name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        && !name.starts_with('\'')
        && !name.ends_with('\'')
}

fn truncate(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    edits: Vec<SheetEdit>,
}

impl Workbook {
    pub fn new() -> Self {
        Workbook::default()
    }

    /// Wraps sheets decoded from a file. Nothing is recorded as changed.
    pub(crate) fn loaded(mut sheets: Vec<Sheet>) -> Self {
        sheets.iter_mut().for_each(Sheet::mark_clean);
        Workbook {
            sheets,
            edits: Vec::new(),
        }
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn edits(&self) -> &[SheetEdit] {
        &self.edits
    }

    /// Case-insensitive, like Excel.
    pub fn contains(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| same_sheet_name(&s.name, name))
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Appends a new sheet under a free variant of its name. Returns the name
    /// actually used.
    pub fn push_sheet(&mut self, mut sheet: Sheet) -> String {
        sheet.name = self.unique_name(&sheet.name);
        let name = sheet.name.clone();
        self.edits.push(SheetEdit::Added(name.clone()));
        self.sheets.push(sheet);
        name
    }

    /// `candidate` cut to [`MAX_SHEET_NAME`] characters if no sheet carries
    /// that name yet, otherwise the first free `candidate_2`, `candidate_3`,
    /// ... with the stem shortened to keep the suffix inside the limit.
    pub fn unique_name(&self, candidate: &str) -> String {
        self.free_name(candidate, None)
    }

    fn free_name(&self, candidate: &str, except: Option<&str>) -> String {
        let taken = |name: &str| {
            self.sheets
                .iter()
                .any(|s| Some(s.name.as_str()) != except && same_sheet_name(&s.name, name))
        };

        let base = truncate(candidate, MAX_SHEET_NAME);
        if !taken(&base) {
            return base;
        }
        (2..)
            .map(|n| {
                let suffix = format!("_{}", n);
                let stem = truncate(candidate, MAX_SHEET_NAME.saturating_sub(suffix.len()));
                format!("{}{}", stem, suffix)
            })
            .find(|name| !taken(name))
            .unwrap_or(base)
    }

    /// Clones `source` (values and formulas) to the end of the workbook under
    /// a unique variant of `new_name`. Returns the name actually used.
    pub fn copy_sheet(&mut self, source: &str, new_name: &str) -> Option<String> {
        let mut copy = self.sheet(source)?.clone();
        let name = self.unique_name(new_name);
        copy.name = name.clone();
        self.sheets.push(copy);
        self.edits.push(SheetEdit::Copied {
            source: source.to_string(),
            name: name.clone(),
        });
        Some(name)
    }

    /// Renames `old` to a unique variant of `new_name`. Returns the name
    /// actually used.
    pub fn rename_sheet(&mut self, old: &str, new_name: &str) -> Option<String> {
        if old == new_name {
            return self.sheet(old).map(|s| s.name.clone());
        }
        let name = self.free_name(new_name, Some(old));
        let sheet = self.sheet_mut(old)?;
        sheet.name = name.clone();
        self.edits.push(SheetEdit::Renamed {
            from: old.to_string(),
            to: name.clone(),
        });
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cell_text_renders_whole_numbers_without_fraction() {
        assert_eq!(cell_text(&CellValue::Number(1234.0)), "1234");
        assert_eq!(cell_text(&CellValue::Number(2.5)), "2.5");
        assert_eq!(cell_text(&CellValue::Text("  PN-1 ".into())), "PN-1");
        assert_eq!(cell_text(&CellValue::Empty), "");
    }

    #[test]
    fn set_value_clears_formula() {
        let mut sheet = Sheet::new("S");
        sheet.set_value(2, 3, 10.0);
        sheet.set_formula(2, 3, "SUM(A1:A2)");
        assert_eq!(sheet.formula(2, 3), Some("SUM(A1:A2)"));

        sheet.set_value(2, 3, 4.0);
        assert_eq!(sheet.formula(2, 3), None);
        assert_eq!(sheet.get(2, 3), &CellValue::Number(4.0));
        assert_eq!((sheet.max_row(), sheet.max_col()), (2, 3));
    }

    #[test]
    fn copy_sheet_picks_unique_names() {
        let mut book = Workbook::new();
        let mut tmpl = Sheet::new("tmpl");
        tmpl.set_value(1, 1, "x");
        book.push_sheet(tmpl);

        assert_eq!(book.copy_sheet("tmpl", "out").as_deref(), Some("out"));
        assert_eq!(book.copy_sheet("tmpl", "out").as_deref(), Some("out_2"));
        assert_eq!(book.sheet_names(), vec!["tmpl", "out", "out_2"]);
        assert_eq!(book.sheet("out_2").map(|s| s.text(1, 1)), Some("x".into()));
        assert_eq!(book.copy_sheet("missing", "x"), None);
    }

    #[test]
    fn rename_keeps_position() {
        let mut book = Workbook::new();
        book.push_sheet(Sheet::new("a (pending)"));
        book.push_sheet(Sheet::new("b"));

        let renamed = book.rename_sheet("a (pending)", "a (done)");
        assert_eq!(renamed.as_deref(), Some("a (done)"));
        assert_eq!(book.sheet_names(), vec!["a (done)", "b"]);
        assert_eq!(
            book.edits().last(),
            Some(&SheetEdit::Renamed {
                from: "a (pending)".to_string(),
                to: "a (done)".to_string(),
            })
        );
    }

    #[test]
    fn names_collide_without_regard_to_case() {
        let mut book = Workbook::new();
        book.push_sheet(Sheet::new("tmpl"));
        book.push_sheet(Sheet::new("dept_a_output_20240601"));

        assert!(book.contains("DEPT_A_OUTPUT_20240601"));
        let name = book.copy_sheet("tmpl", "DEPT_A_output_20240601");
        assert_eq!(name.as_deref(), Some("DEPT_A_output_20240601_2"));
    }

    #[test]
    fn case_only_rename_keeps_the_plain_name() {
        let mut book = Workbook::new();
        book.push_sheet(Sheet::new("detail pending"));
        let renamed = book.rename_sheet("detail pending", "Detail Pending");
        assert_eq!(renamed.as_deref(), Some("Detail Pending"));
    }

    #[test]
    fn long_names_are_cut_to_the_excel_limit() {
        let mut book = Workbook::new();
        book.push_sheet(Sheet::new("tmpl"));
        let long = "DEPT_A_output_for_the_assembly_line_20240601";

        let first = book.copy_sheet("tmpl", long).unwrap();
        let second = book.copy_sheet("tmpl", long).unwrap();

        assert_eq!(first, "DEPT_A_output_for_the_assembly_");
        assert_eq!(second, "DEPT_A_output_for_the_assembl_2");
        assert!(is_valid_sheet_name(&first) && is_valid_sheet_name(&second));
    }

    #[test]
    fn loaded_sheets_start_clean() {
        let mut sheet = Sheet::new("detail");
        sheet.set_value(1, 1, "x");
        let mut book = Workbook::loaded(vec![sheet]);
        assert!(book.edits().is_empty());

        let sheet = book.sheet_mut("detail").unwrap();
        assert_eq!(sheet.dirty_cells().count(), 0);
        sheet.set_value(2, 2, 1.0);
        assert_eq!(sheet.dirty_cells().collect::<Vec<_>>(), vec![(2, 2)]);
    }

    #[test]
    fn sheet_name_rules() {
        assert!(is_valid_sheet_name("IEC_產出_20240601"));
        assert!(!is_valid_sheet_name("IEC/output"));
        assert!(!is_valid_sheet_name("'quoted'"));
        assert!(!is_valid_sheet_name(""));
        assert!(!is_valid_sheet_name(&"x".repeat(32)));
    }
}
