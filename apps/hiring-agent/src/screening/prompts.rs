// Prompt templates for the resume screen.

use crate::llm_client::prompts::{join_or_none, truncate_chars, MAX_RESUME_CHARS};
use crate::models::JobProfile;

/// Replace: {title}, {description}, {required}, {preferred}, {experience},
///          {seniority}, {resume}
pub const SCREENING_PROMPT_TEMPLATE: &str = r#"You are an expert recruiter screening resumes for the following position:

Job Title: {title}
Job Description: {description}
Required Skills: {required}
Preferred Skills: {preferred}
Experience Required: {experience}
Seniority Level: {seniority}

Candidate Resume:
{resume}

Evaluate this candidate and return ONLY a valid JSON object (no markdown, no extra text):
{
  "score": <0-100 integer>,
  "summary": "<2-3 sentence evaluation>",
  "skills_matched": ["skill1", "skill2"],
  "skills_missing": ["skill3"],
  "experience_years_estimated": <number>,
  "recommendation": "advance" or "hold" or "reject"
}"#;

pub fn build_screening_prompt(job: &JobProfile, resume_text: &str) -> String {
    SCREENING_PROMPT_TEMPLATE
        .replace("{title}", &job.title)
        .replace("{description}", &job.description)
        .replace("{required}", &join_or_none(&job.required_skills))
        .replace("{preferred}", &join_or_none(&job.preferred_skills))
        .replace("{experience}", &job.experience_range)
        .replace("{seniority}", job.seniority.label())
        // Last, so placeholders inside the resume text are never expanded.
        .replace("{resume}", truncate_chars(resume_text, MAX_RESUME_CHARS))
}
