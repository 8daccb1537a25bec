use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::client::{GenerationClient, GenerationError, GenerationRequest, Stage};

#[derive(Debug, Clone)]
pub struct RequestLog {
    pub stage: Stage,
    pub prompt: String,
    pub with_schema: bool,
}

/// Replays canned responses per stage; an exhausted queue answers with a
/// model error.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<HashMap<Stage, VecDeque<Result<String, GenerationError>>>>,
    logs: Mutex<Vec<RequestLog>>,
}

impl ScriptedClient {
    fn push(self, stage: Stage, response: Result<String, GenerationError>) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(stage)
            .or_default()
            .push_back(response);
        self
    }

    pub fn with_json(self, stage: Stage, value: Value) -> Self {
        self.push(stage, Ok(value.to_string()))
    }

    pub fn with_text(self, stage: Stage, text: &str) -> Self {
        self.push(stage, Ok(text.to_string()))
    }

    pub fn with_error(self, stage: Stage, error: GenerationError) -> Self {
        self.push(stage, Err(error))
    }

    pub fn calls(&self, stage: Stage) -> usize {
        self.logs
            .lock()
            .expect("logs lock")
            .iter()
            .filter(|log| log.stage == stage)
            .count()
    }

    pub fn prompts(&self, stage: Stage) -> Vec<String> {
        self.logs
            .lock()
            .expect("logs lock")
            .iter()
            .filter(|log| log.stage == stage)
            .map(|log| log.prompt.clone())
            .collect()
    }

    pub fn schemas_sent(&self, stage: Stage) -> bool {
        self.logs
            .lock()
            .expect("logs lock")
            .iter()
            .filter(|log| log.stage == stage)
            .all(|log| log.with_schema)
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        self.logs.lock().expect("logs lock").push(RequestLog {
            stage: request.stage,
            prompt: request.prompt.to_string(),
            with_schema: request.response_schema.is_some(),
        });

        self.responses
            .lock()
            .expect("responses lock")
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(GenerationError::Model(format!(
                    "no scripted response for {} stage",
                    request.stage
                )))
            })
    }
}

pub fn complete_scene_json(environment: &str, angle: f64, friction: f64, mass: f64) -> Value {
    json!({
        "scene": {
            "gravity": {"x": 0, "y": -9.81, "z": 0},
            "camera": {
                "position": {"x": 10, "y": 6, "z": 10},
                "lookAt": {"x": 0, "y": 0, "z": 0}
            },
            "lighting": [{"type": "ambient", "intensity": 0.5}]
        },
        "environment": {
            "type": environment,
            "angle": angle,
            "material": {"color": "#9aa5b1", "friction": friction, "restitution": 0.2}
        },
        "objects": [{
            "type": "box",
            "mass": mass,
            "size": {"width": 1, "height": 1, "depth": 1},
            "position": {"x": 0, "y": 1, "z": 0},
            "material": {"friction": friction}
        }],
        "simulation": {"timestep": 0.016, "duration": 5, "solver": "rapier"}
    })
}
