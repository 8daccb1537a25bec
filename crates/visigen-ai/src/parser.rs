use serde::Serialize;
use tracing::{info, warn};
use visigen_core::{ParsedSpec, ProblemHints, clamp_parsed_spec, validate_parsed_spec};

use crate::client::{GenerationClient, GenerationRequest, Stage};
use crate::json::{StageError, generate_json};
use crate::prompts::parser_prompt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub error: String,
    pub raw_output: Option<String>,
    pub source_text: String,
}

impl StageFailure {
    pub fn new(error: &StageError, source_text: &str) -> Self {
        Self {
            error: error.to_string(),
            raw_output: error.raw_output().map(str::to_string),
            source_text: source_text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParserOutcome {
    Valid(ParsedSpec),
    Repaired { spec: ParsedSpec, errors: Vec<String> },
    Failed(StageFailure),
}

impl ParserOutcome {
    pub fn spec(&self) -> Option<&ParsedSpec> {
        match self {
            ParserOutcome::Valid(spec) | ParserOutcome::Repaired { spec, .. } => Some(spec),
            ParserOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            ParserOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            ParserOutcome::Repaired { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Spec the scene stage should work from. A failed parse falls back to an
    /// empty spec completed from the problem hints.
    pub fn working_spec(&self) -> ParsedSpec {
        match self {
            ParserOutcome::Valid(spec) | ParserOutcome::Repaired { spec, .. } => spec.clone(),
            ParserOutcome::Failed(failure) => hinted_spec(&failure.source_text),
        }
    }
}

pub fn hinted_spec(problem: &str) -> ParsedSpec {
    let mut spec = ParsedSpec::empty(problem);
    ProblemHints::extract(problem).apply_to(&mut spec);
    clamp_parsed_spec(&mut spec);
    spec
}

pub async fn parse_problem<C>(client: &C, problem: &str) -> ParserOutcome
where
    C: GenerationClient + ?Sized,
{
    let hints = ProblemHints::extract(problem);
    let prompt = parser_prompt(problem, &hints);
    let request = GenerationRequest {
        stage: Stage::Parser,
        prompt: &prompt,
        response_schema: None,
    };

    let value = match generate_json(client, request).await {
        Ok(value) => value,
        Err(error) => {
            warn!(stage = %Stage::Parser, %error, "parser produced no usable output");
            return ParserOutcome::Failed(StageFailure::new(&error, problem));
        }
    };

    let validation = validate_parsed_spec(&value);
    let mut spec = ParsedSpec::from_model_output(&value, problem);
    let filled = hints.apply_to(&mut spec);
    let clamped = clamp_parsed_spec(&mut spec);

    info!(
        stage = %Stage::Parser,
        environment = %spec.environment_type,
        objects = spec.objects.len(),
        ?filled,
        ?clamped,
        "parsed problem"
    );

    if validation.valid {
        ParserOutcome::Valid(spec)
    } else {
        warn!(stage = %Stage::Parser, errors = ?validation.errors, "parsed spec repaired");
        ParserOutcome::Repaired {
            spec,
            errors: validation.errors,
        }
    }
}
