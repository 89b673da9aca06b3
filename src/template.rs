//! New work unit template.
//!
//! Templates are plain markdown with `{{placeholder}}` markers. The built-in
//! template is used unless the project configures its own.

use chrono::NaiveDate;
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::work_unit::{Category, WorkUnitId};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid placeholder regex"))
}

const DEFAULT_TEMPLATE: &str = "# Work Unit: {{title}}

## Metadata
- **ID**: {{id}}
- **Type**: {{category}}
- **Status**: Proposed
- **Completion**: 0%
- **Priority**: {{priority}}
- **Owner**: {{owner}}
- **Created**: {{date}}
- **Last Updated**: {{date}}
- **Relationship Type**: Independent
- **Dependencies**: None

## Description
{{description}}

## Objectives
- Define the objectives of this work unit

## Requirements

## Related Components

## Changelog

- **{{timestamp}}**: Work unit created
";

const DEFAULT_DESCRIPTION: &str = "Describe what this work unit accomplishes and why it matters.";

/// Values substituted into a template.
#[derive(Debug, Clone)]
pub struct TemplateValues<'a> {
    pub id: &'a WorkUnitId,
    pub title: &'a str,
    pub category: Category,
    pub description: Option<&'a str>,
    pub priority: &'a str,
    pub owner: &'a str,
    pub created: chrono::NaiveDateTime,
}

/// Fill a template with the values of a new work unit.
#[must_use]
pub fn render_template(template: Option<&str>, values: &TemplateValues<'_>) -> String {
    let date: NaiveDate = values.created.date();
    let description = values
        .description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DESCRIPTION);

    let timestamp = values.created.format("%Y-%m-%d %H:%M").to_string();
    let date = date.format("%Y-%m-%d").to_string();

    // Single pass: substituted values are never expanded again.
    placeholder_re()
        .replace_all(template.unwrap_or(DEFAULT_TEMPLATE), |caps: &Captures<'_>| {
            match &caps[1] {
                "title" => values.title.trim().to_string(),
                "id" => values.id.as_str().to_string(),
                "category" => values.category.as_str().to_string(),
                "priority" => values.priority.to_string(),
                "owner" => values.owner.to_string(),
                "timestamp" => timestamp.clone(),
                "date" => date.clone(),
                "description" => description.to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// File name of a new work unit: `WU-007_add_caching_layer.md`.
#[must_use]
pub fn file_name(id: &WorkUnitId, title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        format!("{}.md", id)
    } else {
        format!("{}_{}.md", id, slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_unit::{parse_record, Status};

    fn values(id: &WorkUnitId) -> TemplateValues<'_> {
        TemplateValues {
            id,
            title: "Add caching layer",
            category: Category::Feature,
            description: Some("Cache expensive lookups."),
            priority: "Medium",
            owner: "Unassigned",
            created: NaiveDate::from_ymd_opt(2026, 4, 2)
                .unwrap()
                .and_hms_opt(14, 5, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_placeholders_in_values_stay_literal() {
        let id = WorkUnitId::new("WU-005");
        let mut v = values(&id);
        v.title = "Expand {{id}} and {{date}}";
        v.description = Some("Mentions {{owner}}.");
        let text = render_template(None, &v);
        assert!(text.starts_with("# Work Unit: Expand {{id}} and {{date}}\n"));
        assert!(text.contains("Mentions {{owner}}."));
        assert_eq!(parse_record(&text).unwrap().id, id);
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let id = WorkUnitId::new("WU-005");
        let text = render_template(Some("- **ID**: {{id}}\n{{unknown}}\n"), &values(&id));
        assert_eq!(text, "- **ID**: WU-005\n{{unknown}}\n");
    }

    #[test]
    fn test_default_template_parses() {
        let id = WorkUnitId::new("WU-005");
        let text = render_template(None, &values(&id));
        let unit = parse_record(&text).unwrap();
        assert_eq!(unit.id, id);
        assert_eq!(unit.title, "Add caching layer");
        assert_eq!(unit.status, Status::Proposed);
        assert_eq!(unit.completion.percent(), Some(0));
        assert_eq!(unit.description, "Cache expensive lookups.");
        assert_eq!(unit.created.as_deref(), Some("2026-04-02"));
        assert_eq!(unit.changelog[0].timestamp, "2026-04-02 14:05");
        assert!(unit.tasks.is_empty());
        assert!(!text.contains("{{"));
    }

    #[test]
    fn test_custom_template() {
        let id = WorkUnitId::new("WU-006");
        let text = render_template(Some("- **ID**: {{id}}\n# {{title}}\n"), &values(&id));
        assert_eq!(text, "- **ID**: WU-006\n# Add caching layer\n");
    }

    #[test]
    fn test_file_name_slug() {
        let id = WorkUnitId::new("WU-007");
        assert_eq!(file_name(&id, "Add caching layer"), "WU-007_add_caching_layer.md");
        assert_eq!(file_name(&id, "  Fix: login / logout!! "), "WU-007_fix_login_logout.md");
        assert_eq!(file_name(&id, "???"), "WU-007.md");
    }
}
