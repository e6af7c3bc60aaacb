use std::collections::BTreeSet;

use log::info;

use crate::config::{Config, ProvisionPolicy};
use crate::report::{Diagnostic, OutputSheet, Report};
use crate::roster::DeptClass;
use crate::workbook::Workbook;

/// A cloned department sheet and its sequential write cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub class: DeptClass,
    pub label: String,
    pub sheet: String,
    pub next_row: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Provisioned {
    targets: Vec<OutputTarget>,
}

impl Provisioned {
    pub fn get(&self, class: DeptClass) -> Option<&OutputTarget> {
        self.targets.iter().find(|t| t.class == class)
    }

    pub fn get_mut(&mut self, class: DeptClass) -> Option<&mut OutputTarget> {
        self.targets.iter_mut().find(|t| t.class == class)
    }
}

/// Classes that get an output sheet under `policy`, always in A, B order.
pub fn needed_classes(policy: ProvisionPolicy, demand: &BTreeSet<DeptClass>) -> Vec<DeptClass> {
    DeptClass::ALL
        .into_iter()
        .filter(|class| policy == ProvisionPolicy::Always || demand.contains(class))
        .collect()
}

/// Clones the template of every class in `classes`. A missing template is
/// reported and its class is left out of the result.
pub fn provision_templates(
    book: &mut Workbook,
    classes: &[DeptClass],
    date: &str,
    config: &Config,
    report: &mut Report,
) -> Provisioned {
    let departments = &config.departments;
    let mut provisioned = Provisioned::default();

    for &class in classes {
        let label = class.label(departments).to_string();
        let template = departments.template_for(&label);
        let wanted = departments.output_for(&label, date);

        let Some(sheet) = book.copy_sheet(&template, &wanted) else {
            report.push(Diagnostic::MissingTemplate {
                department: label,
                template,
            });
            continue;
        };

        info!("cloned '{}' as '{}'", template, sheet);
        report.outputs.push(OutputSheet {
            class,
            department: label.clone(),
            sheet: sheet.clone(),
        });
        provisioned.targets.push(OutputTarget {
            class,
            label,
            sheet,
            next_row: config.layout.data_start_row,
        });
    }

    provisioned
}
