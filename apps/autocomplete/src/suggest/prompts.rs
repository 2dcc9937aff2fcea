// Suggestion prompt templates.
// Placeholders in `{braces}` are replaced by `build_prompt` before sending.

use crate::llm_client::prompts::JSON_ARRAY_ONLY_SYSTEM;
use crate::suggest::field::FieldKind;
use crate::suggest::models::{context_list, context_text, SuggestionContext};

pub const SUGGESTION_SYSTEM_PREAMBLE: &str = "\
You are a career assistant helping users complete resume builder forms. \
Suggestions must be professional, relevant, ready to use, and build on what the user typed. \
Use the provided context (job title, skills, experience level) to stay specific. \
Summaries are complete 3-4 sentence paragraphs; every other field gets short entries.";

pub fn system_prompt() -> String {
    format!("{SUGGESTION_SYSTEM_PREAMBLE} {JSON_ARRAY_ONLY_SYSTEM}")
}

const JOB_TITLE_PROMPT: &str = r#"The user is typing a job title: "{query}".
Their current role context: {job_title}. Skills: {skills}.
Suggest 5-8 real job titles that complete or closely match the input, across seniority levels.
Return ONLY a JSON array of job title strings."#;

const COMPANY_PROMPT: &str = r#"The user is typing a company name: "{query}".
Suggest 5-8 real, well-known companies whose names match or resemble the input.
Include both technology companies and other industries. No generic placeholders.
Return ONLY a JSON array of company name strings."#;

const LOCATION_PROMPT: &str = r#"The user is typing a work location: "{query}".
Suggest 5-8 cities or regions (formatted "City, Country" or "City, ST") that match the input.
Include "Remote" or "Hybrid" only if the input points at them.
Return ONLY a JSON array of location strings."#;

const SKILLS_PROMPT: &str = r#"The user is adding a skill to a resume and has typed: "{query}".
Role: {job_title}. Experience level: {experience_level}. Industry: {industry}.
Skills already listed (do not repeat them): {skills}.
Suggest 5-8 specific, industry-standard skills or technologies matching the input.
Return ONLY a JSON array of skill strings."#;

const SUMMARY_PROMPT: &str = r#"The user is a {job_title}. Experience level: {experience_level}. Key skills: {skills}.
{draft}Write 3-5 professional summary statements, each 3-4 sentences (80-120 words) that:
- build on what the user has written, if anything
- highlight experience level, key skills and achievements
- use action verbs and quantify results where plausible
Return ONLY a JSON array of summary strings."#;

const PROJECT_PROMPT: &str = r#"{typed}Based on the job title "{job_title}", skills: {skills}, and experience level {experience_level},
suggest 5-8 realistic portfolio project names appropriate for this role.
Examples of the style: "E-Commerce Platform", "Real-time Chat Application", "Data Analytics Dashboard".
Return ONLY a JSON array of project name strings, no descriptions."#;

/// Fills the field's template from the query and context.
pub fn build_prompt(field: FieldKind, query: &str, context: &SuggestionContext) -> String {
    let query = query.trim();
    let job_title = context_text(context, &["jobTitle", "job_title"]).unwrap_or("professional");
    let experience_level =
        context_text(context, &["experienceLevel", "experience_level"]).unwrap_or("Mid-level");
    let industry = context_text(context, &["industry"]).unwrap_or("Technology");
    let skills = context_list(context, &["skills"]);
    let skills = if skills.is_empty() {
        "not specified".to_string()
    } else {
        skills.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
    };

    let template = match field {
        FieldKind::JobTitle => JOB_TITLE_PROMPT,
        FieldKind::Company => COMPANY_PROMPT,
        FieldKind::Location => LOCATION_PROMPT,
        FieldKind::Skills => SKILLS_PROMPT,
        FieldKind::Summary => SUMMARY_PROMPT,
        FieldKind::Project => PROJECT_PROMPT,
    };

    // Short summary drafts carry no signal worth quoting.
    let draft = if query.chars().count() > 10 {
        let excerpt: String = query.chars().take(200).collect();
        format!("The user has started writing: \"{excerpt}\".\n")
    } else {
        String::new()
    };
    let typed = if query.is_empty() {
        String::new()
    } else {
        format!("The user is typing: \"{query}\".\n")
    };

    template
        .replace("{query}", query)
        .replace("{job_title}", job_title)
        .replace("{experience_level}", experience_level)
        .replace("{industry}", industry)
        .replace("{skills}", &skills)
        .replace("{draft}", &draft)
        .replace("{typed}", &typed)
}
