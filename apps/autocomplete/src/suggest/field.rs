//! Field kinds: the fixed set of resume-builder inputs that can be autocompleted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default cap on the number of suggestions returned for a field.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 10;
/// Summaries are full paragraphs, so fewer of them are returned.
pub const SUMMARY_MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[serde(alias = "title", alias = "jobTitle")]
    JobTitle,
    Company,
    Location,
    Skills,
    Summary,
    #[serde(alias = "project_name")]
    Project,
}

impl FieldKind {
    #[cfg(test)]
    pub const ALL: [FieldKind; 6] = [
        FieldKind::JobTitle,
        FieldKind::Company,
        FieldKind::Location,
        FieldKind::Skills,
        FieldKind::Summary,
        FieldKind::Project,
    ];

    /// Wire name, also used as the field segment of cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::JobTitle => "job_title",
            FieldKind::Company => "company",
            FieldKind::Location => "location",
            FieldKind::Skills => "skills",
            FieldKind::Summary => "summary",
            FieldKind::Project => "project",
        }
    }

    /// Upper bound on the length of any result (or cache entry) for this field.
    pub fn max_suggestions(&self) -> usize {
        match self {
            FieldKind::Summary => SUMMARY_MAX_SUGGESTIONS,
            _ => DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
