use crate::llm_client::prompts::join_or_none;
use crate::models::{AssessmentSessionRecord, Pipeline, PipelineCandidate};

/// Replace: {title}, {seniority}, {description}, {name}, {screen_score},
///          {screen_summary}, {matched}, {missing}, {assessment_results}
pub const DECISION_PROMPT_TEMPLATE: &str = r#"You are a senior hiring manager making a final hiring decision.

Position: {title} ({seniority})
Job Description: {description}

Candidate Summary:
- Name: {name}
- Resume Screen Score: {screen_score}/100
- Resume Summary: {screen_summary}
- Skills Matched: {matched}
- Skills Missing: {missing}

Assessment Results:
{assessment_results}

Based on ALL data, provide your hiring recommendation as ONLY a valid JSON object (no markdown, no extra text):
{
  "score": <0-100 integer>,
  "recommendation": "advance" or "hold" or "reject",
  "summary": "<3-4 sentence reasoning>",
  "strengths": ["strength1", "strength2"],
  "concerns": ["concern1"]
}"#;

pub const NO_ASSESSMENT_RESULTS: &str = "No assessment results available.";

/// "- Ux Design: 85/100 (submitted)", one line per session.
pub fn format_assessment_results(sessions: &[AssessmentSessionRecord]) -> String {
    if sessions.is_empty() {
        return NO_ASSESSMENT_RESULTS.to_string();
    }
    sessions
        .iter()
        .map(|s| {
            let score = s
                .score
                .map(|v| format!("{v:.0}/100"))
                .unwrap_or_else(|| "N/A".to_string());
            format!("- {}: {} ({})", s.kind.display_name(), score, s.status.as_str())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_decision_prompt(pipeline: &Pipeline, candidate: &PipelineCandidate) -> String {
    let screening = candidate.screening.as_ref();
    let screen_score = screening
        .map(|s| s.score.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let screen_summary = screening
        .map(|s| s.summary.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("N/A");
    let matched = screening.map(|s| join_or_none(&s.skills_matched));
    let missing = screening.map(|s| join_or_none(&s.skills_missing));

    DECISION_PROMPT_TEMPLATE
        .replace("{title}", &pipeline.job.title)
        .replace("{seniority}", pipeline.job.seniority.label())
        .replace("{description}", &pipeline.job.description)
        .replace("{name}", &candidate.candidate.full_name())
        .replace("{screen_score}", &screen_score)
        .replace("{screen_summary}", screen_summary)
        .replace("{matched}", matched.as_deref().unwrap_or("N/A"))
        .replace("{missing}", missing.as_deref().unwrap_or("N/A"))
        .replace(
            "{assessment_results}",
            &format_assessment_results(&candidate.assessment_sessions),
        )
}
