//! Typed Scope of Work model
//!
//! Built leniently from the coerced parser output: missing strings become
//! `""`, numbers may arrive as JSON numbers or numeric strings, and the flat
//! `{module, sub_module, description}` rows of the full-plan template are
//! grouped into modules in first-appearance order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parser::SCOPE_KEY;

/// One feature inside a module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubModule {
    pub sub_module: String,
    pub description: String,
}

/// A functional area and its features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub module: String,
    pub sub_modules: Vec<SubModule>,
}

/// Team planning entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRole {
    pub role: String,
    pub responsibility: String,
    pub allocation_hours: f64,
}

/// Delivery phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub milestone: String,
    pub modules_covered: String,
    pub estimated_days: f64,
}

/// Parsed scope, optionally with a delivery plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeOfWork {
    pub scope_of_work: Vec<Module>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub team_planning: Vec<TeamRole>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<Milestone>,
}

impl ScopeOfWork {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Lenient conversion from the parser output
    pub fn from_value(value: &Value) -> Self {
        let items = value
            .get(SCOPE_KEY)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut modules: Vec<Module> = Vec::new();
        for item in items {
            if !item.is_object() {
                continue;
            }
            let name = text_field(item, "module");

            if let Some(subs) = item.get("sub_modules").and_then(Value::as_array) {
                let sub_modules = subs.iter().filter_map(sub_module_from).collect();
                modules.push(Module {
                    module: name,
                    sub_modules,
                });
                continue;
            }

            // flat row: group under an existing module of the same name
            let sub = SubModule {
                sub_module: text_field(item, "sub_module"),
                description: text_field(item, "description"),
            };
            let has_sub = item.get("sub_module").is_some() || item.get("description").is_some();

            match modules.iter_mut().find(|m| m.module == name) {
                Some(existing) => {
                    if has_sub {
                        existing.sub_modules.push(sub);
                    }
                }
                None => modules.push(Module {
                    module: name,
                    sub_modules: if has_sub { vec![sub] } else { Vec::new() },
                }),
            }
        }

        let team_planning = array_field(value, "team_planning")
            .iter()
            .filter(|v| v.is_object())
            .map(|v| TeamRole {
                role: text_field(v, "role"),
                responsibility: text_field(v, "responsibility"),
                allocation_hours: number_field(v, "allocation_hours"),
            })
            .collect();

        let milestones = array_field(value, "milestones")
            .iter()
            .filter(|v| v.is_object())
            .map(|v| Milestone {
                milestone: text_field(v, "milestone"),
                modules_covered: text_field(v, "modules_covered"),
                estimated_days: number_field(v, "estimated_days"),
            })
            .collect();

        Self {
            scope_of_work: modules,
            team_planning,
            milestones,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scope_of_work.is_empty()
    }

    pub fn module_count(&self) -> usize {
        self.scope_of_work.len()
    }

    pub fn sub_module_count(&self) -> usize {
        self.scope_of_work.iter().map(|m| m.sub_modules.len()).sum()
    }

    pub fn has_plan(&self) -> bool {
        !self.team_planning.is_empty() || !self.milestones.is_empty()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| crate::parser::empty_scope())
    }
}

fn sub_module_from(value: &Value) -> Option<SubModule> {
    match value {
        Value::Object(_) => Some(SubModule {
            sub_module: text_field(value, "sub_module"),
            description: text_field(value, "description"),
        }),
        // some models list bare feature names
        Value::String(name) => Some(SubModule {
            sub_module: name.clone(),
            description: String::new(),
        }),
        _ => None,
    }
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// String field; numbers and booleans are rendered, anything else is `""`
fn text_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// Numeric field; accepts numeric strings such as `"40"` or `"12.5 days"`
fn number_field(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => leading_number(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_modules() {
        let value = json!({
            "scope_of_work": [
                {"module": "Auth", "sub_modules": [
                    {"sub_module": "Login", "description": "Email login"},
                    {"sub_module": "Reset"}
                ]},
                {"module": "Reports", "sub_modules": []}
            ]
        });
        let scope = ScopeOfWork::from_value(&value);

        assert_eq!(scope.module_count(), 2);
        assert_eq!(scope.sub_module_count(), 2);
        assert_eq!(scope.scope_of_work[0].sub_modules[1].description, "");
        assert!(scope.scope_of_work[1].sub_modules.is_empty());
        assert!(!scope.has_plan());
    }

    #[test]
    fn test_flat_rows_grouped_in_order() {
        let value = json!({
            "scope_of_work": [
                {"module": "Payroll", "sub_module": "Payslips", "description": "Monthly"},
                {"module": "Attendance", "sub_module": "Clock-in", "description": "Mobile"},
                {"module": "Payroll", "sub_module": "Tax", "description": "Deductions"}
            ]
        });
        let scope = ScopeOfWork::from_value(&value);

        let names: Vec<&str> = scope.scope_of_work.iter().map(|m| m.module.as_str()).collect();
        assert_eq!(names, vec!["Payroll", "Attendance"]);
        assert_eq!(scope.scope_of_work[0].sub_modules.len(), 2);
        assert_eq!(scope.scope_of_work[0].sub_modules[1].sub_module, "Tax");
    }

    #[test]
    fn test_plan_sections_with_string_numbers() {
        let value = json!({
            "scope_of_work": [],
            "team_planning": [
                {"role": "Backend Developer", "responsibility": "APIs", "allocation_hours": "120"},
                {"role": "QA", "allocation_hours": 40}
            ],
            "milestones": [
                {"milestone": "MVP", "modules_covered": ["Auth", "Payroll"], "estimated_days": "30 days"}
            ]
        });
        let scope = ScopeOfWork::from_value(&value);

        assert_eq!(scope.team_planning[0].allocation_hours, 120.0);
        assert_eq!(scope.team_planning[1].responsibility, "");
        assert_eq!(scope.milestones[0].modules_covered, "Auth, Payroll");
        assert_eq!(scope.milestones[0].estimated_days, 30.0);
        assert!(scope.has_plan());
        assert!(scope.is_empty());
    }

    #[test]
    fn test_missing_or_malformed_key() {
        assert!(ScopeOfWork::from_value(&json!({})).is_empty());
        assert!(ScopeOfWork::from_value(&json!({"scope_of_work": "none"})).is_empty());
        assert_eq!(ScopeOfWork::empty().to_value(), json!({"scope_of_work": []}));
    }

    #[test]
    fn test_bare_string_sub_modules() {
        let value = json!({"scope_of_work": [{"module": "Chat", "sub_modules": ["Rooms", 7]}]});
        let scope = ScopeOfWork::from_value(&value);
        assert_eq!(scope.scope_of_work[0].sub_modules.len(), 1);
        assert_eq!(scope.scope_of_work[0].sub_modules[0].sub_module, "Rooms");
    }
}
