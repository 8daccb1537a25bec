use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use visigen_core::{ParsedSpec, SceneJson, scene_is_valid};

use crate::client::GenerationClient;
use crate::parser::{ParserOutcome, StageFailure, parse_problem};
use crate::refine::refine_scene;
use crate::scene::generate_scene;

pub const DEFAULT_MAX_ROUNDS: usize = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_rounds: usize,
    pub retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[async_trait]
pub trait RetryDelay: Send + Sync {
    async fn wait(&self, completed_round: usize);
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl RetryDelay for FixedDelay {
    async fn wait(&self, _completed_round: usize) {
        tokio::time::sleep(self.0).await;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl RetryDelay for NoDelay {
    async fn wait(&self, _completed_round: usize) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub round: usize,
    pub scene: SceneJson,
    pub validated: SceneJson,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedPayload {
    Spec(ParsedSpec),
    Failure(StageFailure),
}

impl From<&ParserOutcome> for ParsedPayload {
    fn from(outcome: &ParserOutcome) -> Self {
        match outcome {
            ParserOutcome::Valid(spec) | ParserOutcome::Repaired { spec, .. } => {
                ParsedPayload::Spec(spec.clone())
            }
            ParserOutcome::Failed(failure) => ParsedPayload::Failure(failure.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRun {
    pub problem: String,
    pub parsed: ParsedPayload,
    pub scene: SceneJson,
    /// Accepted scene; the last generated scene when no round converged.
    pub validated: SceneJson,
    pub attempts: usize,
    pub converged: bool,
    pub history: Vec<RoundRecord>,
}

pub struct SimulationPipeline<C> {
    client: C,
    config: PipelineConfig,
    delay: Box<dyn RetryDelay>,
}

impl<C: GenerationClient> SimulationPipeline<C> {
    pub fn new(client: C, config: PipelineConfig) -> Self {
        let delay = Box::new(FixedDelay(config.retry_delay));
        Self {
            client,
            config,
            delay,
        }
    }

    pub fn with_delay(mut self, delay: impl RetryDelay + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    pub async fn parse(&self, problem: &str) -> ParserOutcome {
        parse_problem(&self.client, problem).await
    }

    pub async fn run(&self, problem: &str) -> SimulationRun {
        info!(problem_chars = problem.chars().count(), "simulation started");

        let outcome = self.parse(problem).await;
        let parsed = outcome.working_spec();
        let max_rounds = self.config.max_rounds.max(1);

        let mut history: Vec<RoundRecord> = Vec::with_capacity(max_rounds);
        let mut converged = false;

        for round in 1..=max_rounds {
            info!(round, "generating scene");
            let generated = generate_scene(&self.client, &parsed).await;
            let refined = refine_scene(&self.client, &generated.scene, &parsed, problem).await;
            converged = scene_is_valid(&refined.scene);

            history.push(RoundRecord {
                round,
                scene: generated.scene,
                validated: refined.scene,
            });

            if converged {
                info!(round, "scene validated");
                break;
            }
            if round < max_rounds {
                warn!(round, "scene still invalid; retrying");
                self.delay.wait(round).await;
            }
        }

        let attempts = history.len();
        let (scene, validated) = match history.last() {
            Some(last) if converged => (last.scene.clone(), last.validated.clone()),
            Some(last) => {
                warn!(attempts, "rounds exhausted; returning last generated scene");
                (last.scene.clone(), last.scene.clone())
            }
            None => (SceneJson::default(), SceneJson::default()),
        };

        SimulationRun {
            problem: problem.to_string(),
            parsed: ParsedPayload::from(&outcome),
            scene,
            validated,
            attempts,
            converged,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use visigen_core::{EnvironmentType, SceneJson, validate_scene_json};

    use super::{
        NoDelay, ParsedPayload, PipelineConfig, RetryDelay, SimulationPipeline, SimulationRun,
    };
    use crate::client::Stage;
    use crate::test_support::{ScriptedClient, complete_scene_json};

    #[derive(Clone, Default)]
    struct CountingDelay(Arc<AtomicUsize>);

    #[async_trait]
    impl RetryDelay for CountingDelay {
        async fn wait(&self, _completed_round: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pipeline(client: ScriptedClient) -> SimulationPipeline<ScriptedClient> {
        SimulationPipeline::new(client, PipelineConfig::default()).with_delay(NoDelay)
    }

    fn spec_of(run: &SimulationRun) -> &visigen_core::ParsedSpec {
        match &run.parsed {
            ParsedPayload::Spec(spec) => spec,
            ParsedPayload::Failure(failure) => panic!("parser failed: {failure:?}"),
        }
    }

    #[tokio::test]
    async fn box_on_incline_end_to_end() {
        let problem = "A 5 kg box slides down a 30 degree incline with friction coefficient 0.2.";
        let client = ScriptedClient::default()
            .with_json(
                Stage::Parser,
                json!({
                    "environment_type": "incline",
                    "angle_deg": 30,
                    "friction": 0.2,
                    "objects": [{"type": "box", "mass_kg": 5}],
                    "source_text": problem
                }),
            )
            .with_json(Stage::Scene, complete_scene_json("incline", 30.0, 0.2, 5.0));

        let run = pipeline(client).run(problem).await;

        let spec = spec_of(&run);
        assert_eq!(spec.environment_type, EnvironmentType::Incline);
        assert_eq!(spec.angle_deg, Some(30.0));
        assert_eq!(spec.friction, Some(0.2));
        assert_eq!(spec.objects[0].kind, "box");
        assert_eq!(spec.objects[0].mass_kg, Some(5.0));

        assert!(run.converged);
        assert_eq!(run.attempts, 1);
        assert!(validate_scene_json(&run.validated).valid);

        let environment = run.validated.environment.clone().expect("environment");
        assert_eq!(environment.kind, Some(EnvironmentType::Incline));
        assert_eq!(environment.angle, Some(30.0));
        assert_eq!(
            environment.material.and_then(|material| material.friction),
            Some(0.2)
        );
        let objects = run.validated.objects.clone().expect("objects");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].kind.as_deref(), Some("box"));
        assert_eq!(objects[0].mass, Some(5.0));
    }

    #[tokio::test]
    async fn no_friction_phrasing_parses_to_zero() {
        let problem = "A 3 kg block slides on a horizontal table with no friction.";
        let client = ScriptedClient::default().with_json(
            Stage::Parser,
            json!({
                "environment_type": "plane",
                "friction": null,
                "objects": [{"type": "block", "mass_kg": 3}],
                "source_text": problem
            }),
        );

        let run = pipeline(client).run(problem).await;

        assert_eq!(spec_of(&run).friction, Some(0.0));
        let friction = run
            .validated
            .environment
            .and_then(|environment| environment.material)
            .and_then(|material| material.friction);
        assert_eq!(friction, Some(0.0));
    }

    #[tokio::test]
    async fn exhausted_rounds_return_last_scene() {
        let delays = CountingDelay::default();
        let client = ScriptedClient::default();
        let pipeline = SimulationPipeline::new(client, PipelineConfig::default())
            .with_delay(delays.clone());

        let run = pipeline.run("Something unusual happens here.").await;

        assert!(!run.converged);
        assert_eq!(run.attempts, 3);
        assert_eq!(run.history.len(), 3);
        assert_eq!(delays.0.load(Ordering::SeqCst), 2);
        assert!(matches!(run.parsed, ParsedPayload::Failure(_)));
        assert_eq!(run.validated, run.history[2].scene);
        assert_eq!(pipeline.client().calls(Stage::Scene), 3);
    }

    #[tokio::test]
    async fn retry_converges_on_second_round() {
        let delays = CountingDelay::default();
        let client = ScriptedClient::default()
            .with_json(Stage::Scene, json!({"environment": {"type": "plane"}, "objects": []}))
            .with_json(Stage::Scene, complete_scene_json("plane", 0.0, 0.3, 1.0));
        let pipeline = SimulationPipeline::new(client, PipelineConfig::default())
            .with_delay(delays.clone());

        let run = pipeline.run("Something unusual happens here.").await;

        assert!(run.converged);
        assert_eq!(run.attempts, 2);
        assert_eq!(run.history.len(), 2);
        assert_eq!(delays.0.load(Ordering::SeqCst), 1);

        let prompts = pipeline.client().prompts(Stage::Scene);
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
        assert_eq!(pipeline.client().calls(Stage::Validator), 1);

        let expected = SceneJson::from_value(&complete_scene_json("plane", 0.0, 0.3, 1.0))
            .expect("scene object");
        assert_eq!(run.validated, run.history[1].validated);
        assert_eq!(run.validated, expected);
        assert_eq!(run.scene, run.history[1].scene);
        assert!(run.history[0].validated.objects.as_ref().is_some_and(Vec::is_empty));
    }

    #[tokio::test]
    async fn parser_failure_still_produces_a_scene() {
        let problem = "A 2 kg ball rolls down a 15 degree ramp.";
        let client = ScriptedClient::default().with_text(Stage::Parser, "no json here");

        let run = pipeline(client).run(problem).await;

        let ParsedPayload::Failure(failure) = &run.parsed else {
            panic!("expected a parser failure");
        };
        assert_eq!(failure.source_text, problem);
        assert!(run.converged);

        let environment = run.validated.environment.clone().expect("environment");
        assert_eq!(environment.kind, Some(EnvironmentType::Incline));
        assert_eq!(environment.angle, Some(15.0));
        let objects = run.validated.objects.expect("objects");
        assert_eq!(objects[0].kind.as_deref(), Some("ball"));
        assert_eq!(objects[0].mass, Some(2.0));
    }

    #[tokio::test]
    async fn run_serializes_with_flat_parsed_payload() {
        let client = ScriptedClient::default().with_text(Stage::Parser, "???");
        let run = pipeline(client).run("A cart on a track.").await;

        let value = serde_json::to_value(&run).expect("serializable");
        assert_eq!(value["problem"], "A cart on a track.");
        assert_eq!(value["parsed"]["raw_output"], "???");
        assert_eq!(value["history"][0]["round"], 1);
        assert!(value["validated"]["scene"]["gravity"].is_object());
    }
}
