//! Tabular export of a Scope of Work (CSV and XLSX)

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use crate::errors::{Result, ScopeError};
use crate::scope::ScopeOfWork;

/// Column headers of the main scope table
pub const SCOPE_HEADERS: [&str; 3] = ["Module", "Sub Module", "Description"];
pub const TEAM_HEADERS: [&str; 3] = ["Role", "Responsibility", "Allocation Hours"];
pub const MILESTONE_HEADERS: [&str; 3] = ["Milestone", "Modules Covered", "Estimated Days"];

/// A named table of string cells
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeTable {
    /// Worksheet name
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Columns written as numbers in spreadsheets
    #[serde(skip)]
    pub numeric_columns: Vec<usize>,
}

impl ScopeTable {
    fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            numeric_columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row per sub-module; modules without sub-modules produce no rows
pub fn scope_table(scope: &ScopeOfWork) -> ScopeTable {
    let mut table = ScopeTable::new("Scope of Work", &SCOPE_HEADERS);
    for module in &scope.scope_of_work {
        for sub in &module.sub_modules {
            table.rows.push(vec![
                module.module.clone(),
                sub.sub_module.clone(),
                sub.description.clone(),
            ]);
        }
    }
    table
}

pub fn team_table(scope: &ScopeOfWork) -> ScopeTable {
    let mut table = ScopeTable::new("Team Planning", &TEAM_HEADERS);
    table.numeric_columns = vec![2];
    for role in &scope.team_planning {
        table.rows.push(vec![
            role.role.clone(),
            role.responsibility.clone(),
            format_number(role.allocation_hours),
        ]);
    }
    table
}

pub fn milestone_table(scope: &ScopeOfWork) -> ScopeTable {
    let mut table = ScopeTable::new("Milestones", &MILESTONE_HEADERS);
    table.numeric_columns = vec![2];
    for milestone in &scope.milestones {
        table.rows.push(vec![
            milestone.milestone.clone(),
            milestone.modules_covered.clone(),
            format_number(milestone.estimated_days),
        ]);
    }
    table
}

/// Scope table, plus plan tables when the scope carries a plan
pub fn tables_for(scope: &ScopeOfWork) -> Vec<ScopeTable> {
    let mut tables = vec![scope_table(scope)];
    if scope.has_plan() {
        tables.push(team_table(scope));
        tables.push(milestone_table(scope));
    }
    tables
}

/// Write `table` as CSV, replacing any existing file
pub fn write_csv(table: &ScopeTable, path: &Path) -> Result<()> {
    let export_err = |e: csv::Error| {
        ScopeError::Export(format!("Failed to write {}: {}", path.display(), e))
    };

    let mut writer = csv::Writer::from_path(path).map_err(export_err)?;
    writer.write_record(&table.headers).map_err(export_err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(export_err)?;
    }
    writer
        .flush()
        .map_err(|e| ScopeError::Export(format!("Failed to flush {}: {}", path.display(), e)))?;
    Ok(())
}

/// Write each table to its own worksheet, replacing any existing file
pub fn write_xlsx(tables: &[ScopeTable], path: &Path) -> Result<()> {
    let export_err = |e: rust_xlsxwriter::XlsxError| {
        ScopeError::Export(format!("Failed to write {}: {}", path.display(), e))
    };

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for table in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&table.name).map_err(export_err)?;

        for (col, header) in table.headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, header, &header_format)
                .map_err(export_err)?;
        }

        for (r, row) in table.rows.iter().enumerate() {
            let row_idx = (r + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let numeric = table
                    .numeric_columns
                    .contains(&col)
                    .then(|| cell.parse::<f64>().ok())
                    .flatten();
                let written = match numeric {
                    Some(n) => worksheet.write_number(row_idx, col as u16, n),
                    None => worksheet.write_string(row_idx, col as u16, cell),
                };
                written.map_err(export_err)?;
            }
        }
    }

    workbook.save(path).map_err(export_err)?;
    Ok(())
}

/// Whole numbers without a trailing `.0`
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Milestone, Module, SubModule, TeamRole};

    fn auth_scope() -> ScopeOfWork {
        ScopeOfWork {
            scope_of_work: vec![Module {
                module: "Auth".to_string(),
                sub_modules: vec![SubModule {
                    sub_module: "Login".to_string(),
                    description: "desc".to_string(),
                }],
            }],
            ..ScopeOfWork::default()
        }
    }

    #[test]
    fn test_single_sub_module_single_row() {
        let table = scope_table(&auth_scope());
        assert_eq!(table.headers, vec!["Module", "Sub Module", "Description"]);
        assert_eq!(table.rows, vec![vec!["Auth", "Login", "desc"]]);
    }

    #[test]
    fn test_module_without_sub_modules_has_no_rows() {
        let mut scope = auth_scope();
        scope.scope_of_work.push(Module {
            module: "Empty".to_string(),
            sub_modules: Vec::new(),
        });
        assert_eq!(scope_table(&scope).len(), 1);
        assert!(scope_table(&ScopeOfWork::empty()).is_empty());
    }

    #[test]
    fn test_plan_tables_only_when_present() {
        assert_eq!(tables_for(&auth_scope()).len(), 1);

        let mut scope = auth_scope();
        scope.team_planning.push(TeamRole {
            role: "QA".to_string(),
            responsibility: "Testing".to_string(),
            allocation_hours: 40.0,
        });
        scope.milestones.push(Milestone {
            milestone: "Beta".to_string(),
            modules_covered: "Auth".to_string(),
            estimated_days: 12.5,
        });

        let tables = tables_for(&scope);
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[1].rows[0][2], "40");
        assert_eq!(tables[2].rows[0][2], "12.5");
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.csv");

        write_csv(&scope_table(&auth_scope()), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Module,Sub Module,Description"));
        assert_eq!(lines.next(), Some("Auth,Login,desc"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_write_csv_empty_scope_is_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.csv");
        std::fs::write(&path, "stale content\n").unwrap();

        write_csv(&scope_table(&ScopeOfWork::empty()), &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Module,Sub Module,Description\n"
        );
    }

    #[test]
    fn test_write_csv_missing_directory_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("scope.csv");
        let err = write_csv(&scope_table(&auth_scope()), &path).unwrap_err();
        assert!(matches!(err, ScopeError::Export(_)));
    }

    #[test]
    fn test_write_xlsx_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.xlsx");

        write_xlsx(&tables_for(&auth_scope()), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
    }
}
