//! Generative suggestion backends.
//!
//! `SuggestionGenerator` is the contract the orchestrator depends on: it may
//! be slow, may fail, and may return nothing. Backends:
//!
//! - `LlmSuggestionGenerator`: field-specific prompt through `LlmClient`.
//! - `CuratedSuggestionGenerator`: deterministic lists, never fails.
//! - `ResilientGenerator`: LLM when configured, curated otherwise or on error.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::{strip_json_fences, CompletionOptions, LlmClient, LlmError};
use crate::suggest::field::FieldKind;
use crate::suggest::merge::dedup_case_insensitive;
use crate::suggest::models::{
    context_list, context_text, GeneratedSuggestions, SuggestionContext,
};
use crate::suggest::prompts::{build_prompt, system_prompt};

const LLM_CONFIDENCE: u8 = 85;
const CURATED_CONFIDENCE: u8 = 40;
/// Line-split fallback drops fragments this short or shorter.
const MIN_LINE_SUGGESTION_CHARS: usize = 5;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Model output contained no usable suggestions")]
    Empty,
}

#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn generate(
        &self,
        field: FieldKind,
        query: &str,
        context: &SuggestionContext,
    ) -> Result<GeneratedSuggestions, GenerationError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed generator
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmSuggestionGenerator {
    llm: LlmClient,
}

impl LlmSuggestionGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

fn completion_options(field: FieldKind) -> CompletionOptions {
    CompletionOptions {
        max_tokens: if field == FieldKind::Summary { 1000 } else { 500 },
        ..CompletionOptions::default()
    }
}

#[async_trait]
impl SuggestionGenerator for LlmSuggestionGenerator {
    async fn generate(
        &self,
        field: FieldKind,
        query: &str,
        context: &SuggestionContext,
    ) -> Result<GeneratedSuggestions, GenerationError> {
        let prompt = build_prompt(field, query, context);
        let text = self
            .llm
            .call_text(&prompt, &system_prompt(), completion_options(field))
            .await?;

        let suggestions = parse_suggestion_list(&text);
        if suggestions.is_empty() {
            return Err(GenerationError::Empty);
        }
        debug!("LLM produced {} suggestions for {field}", suggestions.len());

        Ok(GeneratedSuggestions {
            suggestions,
            confidence: LLM_CONFIDENCE,
        })
    }
}

/// Reads a suggestion list out of free-form model output.
///
/// In order: the whole text as JSON (array, or a single string), the first
/// embedded `[...]` span as a JSON array, then one suggestion per line.
pub fn parse_suggestion_list(text: &str) -> Vec<String> {
    let text = strip_json_fences(text);

    if let Some(items) = json_strings(text) {
        return items;
    }

    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            if let Some(items) = json_strings(&text[start..=end]) {
                return items;
            }
        }
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .map(|line| {
            line.trim_start_matches(['-', '*'])
                .trim()
                .trim_end_matches(',')
                .trim_matches(['"', '\''])
                .trim()
                .to_string()
        })
        .filter(|line| line.chars().count() > MIN_LINE_SUGGESTION_CHARS)
        .collect()
}

fn json_strings(text: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Curated generator
// ────────────────────────────────────────────────────────────────────────────

const COMPANIES: &[&str] = &[
    "Google", "Microsoft", "Amazon", "Apple", "Meta", "Netflix", "Adobe", "Oracle", "IBM",
    "Accenture", "TCS", "Infosys", "Wipro", "Cognizant", "Tech Mahindra", "HCL Technologies",
    "Capgemini", "Deloitte", "PwC", "EY", "KPMG", "JP Morgan", "Goldman Sachs",
    "Morgan Stanley", "Salesforce", "SAP", "VMware", "Intel", "NVIDIA", "Mindtree",
    "Mphasis", "Persistent Systems", "Hexaware", "Genpact",
];

const LOCATIONS: &[&str] = &[
    "Bangalore, India", "Mumbai, India", "Delhi, India", "Hyderabad, India", "Pune, India",
    "Chennai, India", "Kolkata, India", "Ahmedabad, India", "Gurgaon, India", "Noida, India",
    "Remote", "Hybrid", "San Francisco, CA", "New York, NY", "London, UK", "Singapore",
    "Dubai, UAE",
];

const JOB_TITLES: &[&str] = &[
    "Software Engineer", "Full Stack Developer", "Frontend Developer", "Backend Developer",
    "DevOps Engineer", "Data Scientist", "Machine Learning Engineer", "Product Manager",
    "UI/UX Designer", "Mobile App Developer", "Cloud Engineer", "Security Engineer",
    "Solutions Architect", "Technical Lead", "Engineering Manager", "Business Analyst",
    "Project Manager", "Data Analyst", "QA Engineer",
];

const FRONTEND_SKILLS: &[&str] = &[
    "React", "TypeScript", "JavaScript", "Next.js", "Vue.js", "HTML5", "CSS3",
    "Tailwind CSS", "Redux", "Webpack", "Jest", "Figma",
];
const BACKEND_SKILLS: &[&str] = &[
    "Node.js", "Python", "Java", "Spring Boot", "Go", "Rust", "PostgreSQL", "MongoDB",
    "Redis", "REST APIs", "GraphQL", "Docker", "Kubernetes", "AWS", "Microservices",
];
const DATA_SKILLS: &[&str] = &[
    "Python", "SQL", "Pandas", "NumPy", "Scikit-learn", "TensorFlow", "PyTorch",
    "Apache Spark", "Tableau", "Power BI", "Statistics", "Machine Learning",
];
const GENERAL_SKILLS: &[&str] = &[
    "Communication", "Project Management", "Problem Solving", "Team Leadership",
    "Microsoft Excel", "Agile Methodologies", "Stakeholder Management", "Data Analysis",
    "Time Management", "Critical Thinking",
];

const WEB_PROJECTS: &[&str] = &[
    "E-Commerce Platform", "Task Management App", "Real-time Chat Application",
    "Portfolio Website", "Blog CMS", "Expense Tracker", "Job Portal", "Weather Dashboard",
];
const DATA_PROJECTS: &[&str] = &[
    "Data Analytics Dashboard", "Customer Churn Prediction", "Sales Forecasting Model",
    "Recommendation Engine", "Sentiment Analysis Pipeline", "Fraud Detection System",
];
const SYSTEMS_PROJECTS: &[&str] = &[
    "CI/CD Pipeline Automation", "Infrastructure as Code Templates", "Log Aggregation Service",
    "Distributed Cache", "API Gateway", "Monitoring and Alerting Stack",
];

/// Broad role family inferred from a job title; picks the skills and project lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleFamily {
    Frontend,
    Backend,
    Data,
    Infrastructure,
    General,
}

fn role_family(job_title: &str) -> RoleFamily {
    let title = job_title.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| title.contains(w));
    if has(&["frontend", "front-end", "react", "ui/ux", "designer"]) {
        RoleFamily::Frontend
    } else if has(&["data", "machine learning", "ml ", "analyst", "scientist"]) {
        RoleFamily::Data
    } else if has(&["devops", "cloud", "sre", "infrastructure", "platform"]) {
        RoleFamily::Infrastructure
    } else if has(&["developer", "engineer", "backend", "software", "programmer"]) {
        RoleFamily::Backend
    } else {
        RoleFamily::General
    }
}

/// Deterministic fallback used when no model is configured or the model fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct CuratedSuggestionGenerator;

impl CuratedSuggestionGenerator {
    fn candidates(&self, field: FieldKind, context: &SuggestionContext) -> Vec<String> {
        let job_title = context_text(context, &["jobTitle", "job_title"]).unwrap_or("");
        let family = role_family(job_title);
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        match field {
            FieldKind::Company => owned(COMPANIES),
            FieldKind::Location => owned(LOCATIONS),
            FieldKind::JobTitle => owned(JOB_TITLES),
            FieldKind::Skills => {
                let list = match family {
                    RoleFamily::Frontend => FRONTEND_SKILLS,
                    RoleFamily::Backend | RoleFamily::Infrastructure => BACKEND_SKILLS,
                    RoleFamily::Data => DATA_SKILLS,
                    RoleFamily::General => GENERAL_SKILLS,
                };
                let chosen: Vec<String> = context_list(context, &["skills"])
                    .into_iter()
                    .map(|s| s.to_lowercase())
                    .collect();
                list.iter()
                    .filter(|s| !chosen.contains(&s.to_lowercase()))
                    .map(|s| s.to_string())
                    .collect()
            }
            FieldKind::Project => match family {
                RoleFamily::Data => owned(DATA_PROJECTS),
                RoleFamily::Infrastructure => owned(SYSTEMS_PROJECTS),
                _ => owned(WEB_PROJECTS),
            },
            FieldKind::Summary => summary_templates(context),
        }
    }
}

fn summary_templates(context: &SuggestionContext) -> Vec<String> {
    let role = context_text(context, &["jobTitle", "job_title"]).unwrap_or("professional");
    let level = context_text(context, &["experienceLevel", "experience_level"])
        .unwrap_or("Mid-level")
        .to_lowercase();
    let skills = context_list(context, &["skills"]);
    let skills = if skills.is_empty() {
        "modern tools and best practices".to_string()
    } else {
        skills.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
    };

    vec![
        format!(
            "Results-driven {level} {role} with hands-on expertise in {skills}. \
             Proven track record of delivering high-quality work on schedule and improving team processes. \
             Known for clear communication and a collaborative approach to solving complex problems. \
             Eager to contribute to ambitious goals in a fast-moving organization."
        ),
        format!(
            "Detail-oriented {role} bringing {level} experience with {skills}. \
             Skilled at translating requirements into reliable, maintainable solutions. \
             Consistently takes ownership from planning through delivery and measures outcomes. \
             Committed to continuous learning and mentoring peers."
        ),
        format!(
            "Adaptable {role} combining {level} experience and strong fundamentals in {skills}. \
             Thrives in cross-functional teams and balances speed with quality. \
             Has contributed to projects that improved efficiency and user satisfaction. \
             Looking to bring analytical thinking and initiative to a growing team."
        ),
    ]
}

#[async_trait]
impl SuggestionGenerator for CuratedSuggestionGenerator {
    async fn generate(
        &self,
        field: FieldKind,
        query: &str,
        context: &SuggestionContext,
    ) -> Result<GeneratedSuggestions, GenerationError> {
        let candidates = self.candidates(field, context);
        let needle = query.trim().to_lowercase();

        // Summaries are templates, not completions of the typed text.
        let filtered: Vec<String> = if field == FieldKind::Summary || needle.chars().count() <= 2 {
            candidates
        } else {
            candidates
                .into_iter()
                .filter(|c| c.to_lowercase().contains(&needle))
                .collect()
        };

        Ok(GeneratedSuggestions {
            suggestions: dedup_case_insensitive(filtered, field.max_suggestions()),
            confidence: CURATED_CONFIDENCE,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resilient composition
// ────────────────────────────────────────────────────────────────────────────

/// Tries the primary generator (if any) and falls back to a secondary one.
pub struct ResilientGenerator {
    primary: Option<Arc<dyn SuggestionGenerator>>,
    fallback: Arc<dyn SuggestionGenerator>,
}

impl ResilientGenerator {
    pub fn new(
        primary: Option<Arc<dyn SuggestionGenerator>>,
        fallback: Arc<dyn SuggestionGenerator>,
    ) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl SuggestionGenerator for ResilientGenerator {
    async fn generate(
        &self,
        field: FieldKind,
        query: &str,
        context: &SuggestionContext,
    ) -> Result<GeneratedSuggestions, GenerationError> {
        if let Some(primary) = &self.primary {
            match primary.generate(field, query, context).await {
                Ok(generated) => return Ok(generated),
                Err(e) => warn!("Primary generator failed for {field}, using fallback: {e}"),
            }
        }
        self.fallback.generate(field, query, context).await
    }
}
