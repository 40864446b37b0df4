// Shared prompt fragments. Each feature that calls the LLM keeps its own
// prompts.rs alongside it and composes these.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Reminds the model that the local keyword analysis is authoritative for scores and skills.
pub const NO_RESCORING_INSTRUCTION: &str = "\
    The match score and skill lists below come from a deterministic keyword analysis. \
    Do NOT produce a new score and do NOT contradict the skill lists. \
    Only add insight, context and concrete suggestions.";
