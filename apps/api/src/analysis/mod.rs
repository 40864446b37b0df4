// Analysis API: request intake, the /api/analyze handler and optional LLM enhancement.
pub mod enhancer;
pub mod handlers;
pub mod intake;
pub mod prompts;
