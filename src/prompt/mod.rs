//! Prompt construction from retrieved chunks
//!
//! A [`PromptTemplate`] picks the instructions and the JSON contract the
//! model is asked to honour; [`PromptBuilder`] fills it with the objective and
//! the chunk context.

mod templates;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chunking::Chunk;
use crate::config::PromptConfig;

/// Prompt and output contract variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptTemplate {
    /// Product-lead prompt: 8-10 modules, 2-4 sub-modules each
    Modules,
    /// Every module, 3-4 sub-modules, long descriptions
    Detailed,
    /// Flat scope rows plus team planning and milestones
    FullPlan,
}

impl PromptTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptTemplate::Modules => "modules",
            PromptTemplate::Detailed => "detailed",
            PromptTemplate::FullPlan => "full-plan",
        }
    }

    /// Whether the model is also asked for team planning and milestones
    pub fn includes_plan(&self) -> bool {
        matches!(self, PromptTemplate::FullPlan)
    }

    fn body(&self) -> &'static str {
        match self {
            PromptTemplate::Modules => templates::MODULES,
            PromptTemplate::Detailed => templates::DETAILED,
            PromptTemplate::FullPlan => templates::FULL_PLAN,
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "modules" => Ok(PromptTemplate::Modules),
            "detailed" => Ok(PromptTemplate::Detailed),
            "full-plan" | "full_plan" | "plan" => Ok(PromptTemplate::FullPlan),
            other => Err(format!(
                "unknown template '{}' (expected modules, detailed or full-plan)",
                other
            )),
        }
    }
}

/// Builds the final prompt string
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: PromptTemplate,
    /// 0 means unlimited
    max_context_chars: usize,
}

impl PromptBuilder {
    pub fn new(template: PromptTemplate) -> Self {
        Self {
            template,
            max_context_chars: 0,
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.template).with_max_context_chars(config.max_context_chars)
    }

    pub fn with_max_context_chars(mut self, max: usize) -> Self {
        self.max_context_chars = max;
        self
    }

    pub fn template(&self) -> PromptTemplate {
        self.template
    }

    /// Chunk texts separated by a blank line, capped at a chunk boundary
    pub fn context(&self, chunks: &[Chunk]) -> String {
        let mut context = String::new();
        let mut used = 0usize;

        for chunk in chunks {
            let len = chunk.text.chars().count();
            let extra = if context.is_empty() { len } else { len + 2 };
            if self.max_context_chars > 0 && used + extra > self.max_context_chars {
                break;
            }
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&chunk.text);
            used += extra;
        }

        context
    }

    /// Full prompt for `query` over `chunks`
    pub fn build(&self, query: &str, chunks: &[Chunk]) -> String {
        let context = self.context(chunks);
        fill(
            self.template.body(),
            &[
                ("{rules}", templates::RULES),
                ("{objective}", query.trim()),
                ("{context}", context.as_str()),
            ],
        )
    }
}

/// Replace placeholders in one left-to-right pass over `body`; substituted
/// text is never scanned again
fn fill(body: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        match values.iter().find(|(key, _)| rest.starts_with(*key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &rest[key.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            start: 0,
            end: text.len(),
        }
    }

    #[test]
    fn test_context_joins_with_blank_line() {
        let builder = PromptBuilder::new(PromptTemplate::Modules);
        let context = builder.context(&[chunk(1, "first"), chunk(2, "second")]);
        assert_eq!(context, "first\n\nsecond");
    }

    #[test]
    fn test_context_cap_stops_at_chunk_boundary() {
        let builder = PromptBuilder::new(PromptTemplate::Modules).with_max_context_chars(12);
        let context = builder.context(&[chunk(1, "0123456789"), chunk(2, "abcdef")]);
        assert_eq!(context, "0123456789");
    }

    #[test]
    fn test_build_contains_contract() {
        let builder = PromptBuilder::new(PromptTemplate::Modules);
        let prompt = builder.build("Plan an HR app", &[chunk(1, "Employees clock in.")]);

        assert!(prompt.contains("Plan an HR app"));
        assert!(prompt.contains("Employees clock in."));
        assert!(prompt.contains("\"scope_of_work\""));
        assert!(prompt.contains("trailing comma"));
        assert!(!prompt.contains("{rules}"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn test_placeholders_in_query_and_context_stay_literal() {
        let builder = PromptBuilder::new(PromptTemplate::Modules);
        let prompt = builder.build(
            "Cover the {context} section",
            &[chunk(1, "Template uses {objective} and {rules} tokens.")],
        );

        assert!(prompt.contains("Cover the {context} section"));
        assert!(prompt.contains("Template uses {objective} and {rules} tokens."));
        assert_eq!(prompt.matches("Template uses").count(), 1);
    }

    #[test]
    fn test_fill_keeps_unknown_braces() {
        assert_eq!(fill("{a} {b} {", &[("{a}", "x")]), "x {b} {");
    }

    #[test]
    fn test_full_plan_asks_for_team_and_milestones() {
        let prompt = PromptBuilder::new(PromptTemplate::FullPlan).build("q", &[]);
        assert!(prompt.contains("team_planning"));
        assert!(prompt.contains("milestones"));
        assert!(PromptTemplate::FullPlan.includes_plan());
        assert!(!PromptTemplate::Detailed.includes_plan());
    }

    #[test]
    fn test_template_parsing() {
        assert_eq!("full-plan".parse::<PromptTemplate>(), Ok(PromptTemplate::FullPlan));
        assert_eq!("DETAILED".parse::<PromptTemplate>(), Ok(PromptTemplate::Detailed));
        assert!("table".parse::<PromptTemplate>().is_err());

        let t: PromptTemplate = serde_json::from_str("\"full-plan\"").unwrap();
        assert_eq!(t.to_string(), "full-plan");
    }
}
