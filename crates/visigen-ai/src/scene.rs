use tracing::{info, warn};
use visigen_core::{
    ParsedSpec, SceneJson, complete_scene, enforce_bounds, scene_from_spec, validate_scene_json,
};

use crate::client::{GenerationClient, GenerationRequest, Stage};
use crate::json::generate_json;
use crate::prompts::{SCENE_SCHEMA, scene_prompt};

#[derive(Debug, Clone, PartialEq)]
pub enum SceneStatus {
    Generated,
    /// Model output was incomplete; sections were rebuilt around it.
    Rebuilt { errors: Vec<String> },
    Fallback { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneOutcome {
    pub scene: SceneJson,
    pub status: SceneStatus,
    pub repairs: Vec<String>,
}

pub async fn generate_scene<C>(client: &C, parsed: &ParsedSpec) -> SceneOutcome
where
    C: GenerationClient + ?Sized,
{
    let prompt = scene_prompt(parsed);
    let request = GenerationRequest {
        stage: Stage::Scene,
        prompt: &prompt,
        response_schema: Some(&SCENE_SCHEMA),
    };

    let draft = match generate_json(client, request).await {
        Ok(value) => SceneJson::from_value(&value)
            .ok_or_else(|| "scene output is not a JSON object".to_string()),
        Err(error) => Err(error.to_string()),
    };

    let (mut scene, status) = match draft {
        Ok(draft) => {
            let validation = validate_scene_json(&draft);
            if validation.valid {
                (draft, SceneStatus::Generated)
            } else {
                warn!(stage = %Stage::Scene, errors = ?validation.errors, "rebuilding incomplete scene");
                (
                    complete_scene(draft, parsed),
                    SceneStatus::Rebuilt {
                        errors: validation.errors,
                    },
                )
            }
        }
        Err(error) => {
            warn!(stage = %Stage::Scene, %error, "building scene from parsed spec");
            (scene_from_spec(parsed), SceneStatus::Fallback { error })
        }
    };

    let repairs = enforce_bounds(&mut scene);
    if !repairs.is_empty() {
        info!(stage = %Stage::Scene, ?repairs, "scene values clamped");
    }

    SceneOutcome {
        scene,
        status,
        repairs,
    }
}
