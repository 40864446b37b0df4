// Local resume/job-description matching.
// Keyword detection against a static taxonomy, ratio scoring, recommendation synthesis.
// Everything here is synchronous and side-effect free; the LLM enhancement layer
// builds on top of the `Analysis` produced by `engine::analyze`.

pub mod engine;
pub mod matcher;
pub mod models;
pub mod recommendations;
pub mod score;
pub mod taxonomy;
