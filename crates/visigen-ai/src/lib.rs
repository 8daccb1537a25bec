pub mod client;
pub mod config;
pub mod gemini;
pub mod json;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod refine;
pub mod scene;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{GenerationClient, GenerationError, GenerationRequest, Stage};
pub use config::{ConfigError, GeminiConfig};
pub use gemini::GeminiClient;
pub use json::{StageError, parse_model_json, strip_code_fences};
pub use parser::{ParserOutcome, StageFailure, parse_problem};
pub use pipeline::{
    FixedDelay, NoDelay, ParsedPayload, PipelineConfig, RetryDelay, RoundRecord,
    SimulationPipeline, SimulationRun,
};
pub use refine::{RefineOutcome, RefineStatus, refine_scene};
pub use scene::{SceneOutcome, SceneStatus, generate_scene};
