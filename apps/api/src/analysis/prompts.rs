// LLM prompt constants for analysis enhancement.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Role description for the enhancement system prompt.
pub const ENHANCE_SYSTEM: &str = "You are an expert resume analyst and career advisor. \
    Provide detailed, actionable analysis and recommendations.";

/// Per-chunk enhancement prompt. Replace every `{placeholder}` before sending.
pub const ENHANCE_PROMPT_TEMPLATE: &str = r#"Analyze how this resume matches the job description.

Job Description Summary:
{job_excerpt}

Current Analysis:
- Match Score: {score}%
- Matched Skills: {matched}
- Missing Skills: {missing}

{no_rescoring}

Resume (part {part} of {total}):
{resume_chunk}

Please provide:
1. Career alignment analysis
2. Specific experience enhancement suggestions
3. Industry-specific recommendations
4. Skills presentation improvements
5. Achievement quantification suggestions

Return a JSON object with this EXACT schema (no extra fields):
{
  "insights": "2-4 short paragraphs covering the points above for this part of the resume",
  "improvements": ["concrete, actionable suggestion"],
  "strengths": ["specific strength evidenced in this part of the resume"]
}"#;
