//! Naming conventions, template layout and variant policies.
//!
//! Every field has a default matching the requisition workbooks this tool was
//! written for, so an empty YAML document is a valid configuration.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub roster: RosterConfig,
    pub departments: DepartmentConfig,
    pub layout: TemplateLayout,
    pub provision: ProvisionPolicy,
    pub placement: RowPlacement,
    pub row_advance: RowAdvance,
    pub finalize: FinalizePolicy,
    pub auxiliary: Option<AuxiliarySync>,
    pub header_info: Option<HeaderInfoSync>,
    /// File name offered for the produced workbook, `{date}` is substituted.
    pub output_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: SourceConfig::default(),
            roster: RosterConfig::default(),
            departments: DepartmentConfig::default(),
            layout: TemplateLayout::default(),
            provision: ProvisionPolicy::default(),
            placement: RowPlacement::default(),
            row_advance: RowAdvance::default(),
            finalize: FinalizePolicy::default(),
            auxiliary: None,
            header_info: None,
            output_file: "領用單產出_{date}.xlsx".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Regex matched anywhere in a sheet name. Capture group 1 is the date token.
    pub pattern: String,
    pub pending_marker: String,
    pub completed_marker: String,
    /// 1-based row holding the detail table's column headers.
    pub header_row: u32,
    pub part_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            pattern: r"\(說明\) 領用明細_(\d+) \(未開單\)".to_string(),
            pending_marker: "(未開單)".to_string(),
            completed_marker: "(已開單)".to_string(),
            header_row: 2,
            part_column: "IEC PN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RosterConfig {
    pub sheet: String,
    pub header_row: u32,
    pub name_column: String,
    pub account_column: String,
    pub department_column: Option<String>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig {
            sheet: "掛帳人清單".to_string(),
            header_row: 1,
            name_column: "領用人".to_string(),
            account_column: "掛帳人".to_string(),
            department_column: Some("部門".to_string()),
        }
    }
}

/// Labels of the two department classes and the sheet naming around them.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DepartmentConfig {
    pub class_a: String,
    pub class_b: String,
    /// Substring of the roster category that marks class A. Anything else is
    /// class B. Defaults to the class A label when unset.
    pub class_a_marker: Option<String>,
    /// Template sheet name, `{class}` is substituted.
    pub template_name: String,
    /// Output sheet name, `{class}` and `{date}` are substituted.
    pub output_name: String,
}

impl Default for DepartmentConfig {
    fn default() -> Self {
        DepartmentConfig {
            class_a: "IEC".to_string(),
            class_b: "ICC".to_string(),
            class_a_marker: None,
            template_name: "領用單格式範例 {class}".to_string(),
            output_name: "{class}_產出_{date}".to_string(),
        }
    }
}

impl DepartmentConfig {
    pub fn marker(&self) -> &str {
        self.class_a_marker.as_deref().unwrap_or(&self.class_a)
    }

    pub fn template_for(&self, label: &str) -> String {
        self.template_name.replace("{class}", label)
    }

    pub fn output_for(&self, label: &str, date: &str) -> String {
        self.output_name
            .replace("{class}", label)
            .replace("{date}", date)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TemplateLayout {
    pub header_row: u32,
    pub key_column: u32,
    pub data_start_row: u32,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        TemplateLayout {
            header_row: 5,
            key_column: 5,
            data_start_row: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPolicy {
    /// Clone a template for both classes on every run.
    #[default]
    Always,
    /// Clone only for classes with at least one actionable quantity.
    OnDemand,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowPlacement {
    /// Find the row whose key column holds the part id.
    #[default]
    Lookup,
    /// Fill rows from a per-class cursor starting at `data_start_row`.
    Sequential,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowAdvance {
    /// A fresh row for every (detail row, requester) pair.
    #[default]
    PerEntry,
    /// One row per part id, shared by all requesters of that part.
    PerPart,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinalizePolicy {
    #[default]
    Always,
    OnWrites,
}

/// Descriptive columns copied from the detail row into the output row.
/// An empty `auxiliary: {}` section selects the built-in field table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuxiliarySync {
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FieldSpec {
    pub key: String,
    /// Detail table column the value comes from.
    pub source: String,
    /// Column consulted when `source` is blank.
    #[serde(default)]
    pub fallback: Option<String>,
    /// Header texts that identify the field in the template header row.
    pub synonyms: Vec<String>,
}

impl Default for AuxiliarySync {
    fn default() -> Self {
        let field = |key: &str, source: &str, fallback: Option<&str>, synonyms: &[&str]| FieldSpec {
            key: key.to_string(),
            source: source.to_string(),
            fallback: fallback.map(str::to_string),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        };
        AuxiliarySync {
            fields: vec![
                field("vendor", "廠商", None, &["廠商", "供應商", "vendor"]),
                field("description", "品名", Some("規格"), &["品名", "品名規格", "description"]),
                field("unit", "單位", None, &["單位", "unit"]),
                field("price", "單價", None, &["單價", "price"]),
            ],
        }
    }
}

/// Label cells near the top of a template that get the requester's details.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HeaderInfoSync {
    pub scan_rows: u32,
    pub requester_labels: Vec<String>,
    pub account_labels: Vec<String>,
    pub department_labels: Vec<String>,
}

impl Default for HeaderInfoSync {
    fn default() -> Self {
        HeaderInfoSync {
            scan_rows: 4,
            requester_labels: vec!["領用人".to_string()],
            account_labels: vec!["掛帳人".to_string(), "工號".to_string()],
            department_labels: vec!["部門".to_string()],
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yml::from_str(text)
            .map_err(|e| TransformError::InvalidConfig(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TransformError::InvalidConfig(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.detail_regex()?;

        if self.source.pending_marker.is_empty() {
            return Err(TransformError::InvalidConfig(
                "source.pending_marker must not be empty".to_string(),
            ));
        }

        let rows = [
            ("source.header_row", self.source.header_row),
            ("roster.header_row", self.roster.header_row),
            ("layout.header_row", self.layout.header_row),
            ("layout.key_column", self.layout.key_column),
            ("layout.data_start_row", self.layout.data_start_row),
        ];
        if let Some((name, _)) = rows.iter().find(|(_, value)| *value == 0) {
            return Err(TransformError::InvalidConfig(format!(
                "{} is 1-based and must be at least 1",
                name
            )));
        }

        if self.departments.class_a == self.departments.class_b {
            return Err(TransformError::InvalidConfig(
                "departments.class_a and departments.class_b must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Compiles `source.pattern`, requiring a capture group for the date.
    pub fn detail_regex(&self) -> Result<Regex> {
        let re = Regex::new(&self.source.pattern).map_err(|e| {
            TransformError::InvalidConfig(format!("source.pattern is not a valid regex: {}", e))
        })?;
        if re.captures_len() < 2 {
            return Err(TransformError::InvalidConfig(
                "source.pattern needs a capture group for the date token".to_string(),
            ));
        }
        Ok(re)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.layout.header_row, 5);
        assert_eq!(config.departments.marker(), "IEC");
    }

    #[test]
    fn policies_parse_from_snake_case() {
        let config = Config::from_yaml(
            "provision: on_demand\nplacement: sequential\nrow_advance: per_part\nfinalize: on_writes\n",
        )
        .unwrap();
        assert_eq!(config.provision, ProvisionPolicy::OnDemand);
        assert_eq!(config.placement, RowPlacement::Sequential);
        assert_eq!(config.row_advance, RowAdvance::PerPart);
        assert_eq!(config.finalize, FinalizePolicy::OnWrites);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_yaml("layout:\n  header_row: 1\n").unwrap();
        assert_eq!(config.layout.header_row, 1);
        assert_eq!(config.layout.key_column, 5);
        assert_eq!(config.layout.data_start_row, 6);
    }

    #[test]
    fn pattern_without_capture_group_is_rejected() {
        let err = Config::from_yaml("source:\n  pattern: 'pending_detail_\\d+'\n").unwrap_err();
        assert!(matches!(err, TransformError::InvalidConfig(_)));
    }

    #[test]
    fn zero_coordinates_are_rejected() {
        let err = Config::from_yaml("layout:\n  key_column: 0\n").unwrap_err();
        assert!(err.to_string().contains("layout.key_column"));
    }

    #[test]
    fn auxiliary_synonyms_load_from_yaml() {
        let yaml = r#"
auxiliary:
  fields:
    - key: vendor
      source: Vendor
      synonyms: [vendor, supplier]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let aux = config.auxiliary.unwrap();
        assert_eq!(aux.fields[0].synonyms, vec!["vendor", "supplier"]);
        assert_eq!(aux.fields[0].fallback, None);
    }

    #[test]
    fn empty_auxiliary_section_enables_builtin_fields() {
        let config = Config::from_yaml("auxiliary: {}\nheader_info: {}\n").unwrap();
        let aux = config.auxiliary.unwrap();
        assert_eq!(aux, AuxiliarySync::default());
        assert_eq!(aux.fields[1].source, "品名");
        assert_eq!(aux.fields[1].fallback.as_deref(), Some("規格"));
        assert_eq!(config.header_info, Some(HeaderInfoSync::default()));
    }

    #[test]
    fn names_substitute_class_and_date() {
        let departments = DepartmentConfig::default();
        assert_eq!(departments.template_for("IEC"), "領用單格式範例 IEC");
        assert_eq!(departments.output_for("ICC", "20240601"), "ICC_產出_20240601");
    }
}
