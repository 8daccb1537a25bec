use tracing::{debug, info, warn};
use visigen_core::{
    ParsedSpec, SceneJson, compare_parsed_and_scene, enforce_bounds, reconcile,
    validate_scene_json,
};

use crate::client::{GenerationClient, GenerationRequest, Stage};
use crate::json::generate_json;
use crate::prompts::{SCENE_SCHEMA, refine_prompt};

#[derive(Debug, Clone, PartialEq)]
pub enum RefineStatus {
    AlreadyValid,
    Refined {
        residual_errors: Vec<String>,
        repairs: Vec<String>,
    },
    /// Refinement produced nothing usable; the input scene is returned.
    KeptOriginal { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineOutcome {
    pub scene: SceneJson,
    pub status: RefineStatus,
}

impl RefineOutcome {
    pub fn called_model(&self) -> bool {
        !matches!(self.status, RefineStatus::AlreadyValid)
    }
}

pub async fn refine_scene<C>(
    client: &C,
    scene: &SceneJson,
    parsed: &ParsedSpec,
    problem: &str,
) -> RefineOutcome
where
    C: GenerationClient + ?Sized,
{
    let validation = validate_scene_json(scene);
    if validation.valid {
        debug!(stage = %Stage::Validator, "scene already valid");
        return RefineOutcome {
            scene: scene.clone(),
            status: RefineStatus::AlreadyValid,
        };
    }

    let mismatches = compare_parsed_and_scene(parsed, scene);
    let prompt = refine_prompt(scene, parsed, problem, &validation.errors, &mismatches);
    let request = GenerationRequest {
        stage: Stage::Validator,
        prompt: &prompt,
        response_schema: Some(&SCENE_SCHEMA),
    };

    let refined = match generate_json(client, request).await {
        Ok(value) => SceneJson::from_value(&value)
            .ok_or_else(|| "refined output is not a JSON object".to_string()),
        Err(error) => Err(error.to_string()),
    };

    let mut refined = match refined {
        Ok(refined) => refined,
        Err(error) => {
            warn!(stage = %Stage::Validator, %error, "keeping unrefined scene");
            return RefineOutcome {
                scene: scene.clone(),
                status: RefineStatus::KeptOriginal { error },
            };
        }
    };

    let mut repairs = reconcile(&mut refined, parsed);
    repairs.extend(enforce_bounds(&mut refined));

    let residual = validate_scene_json(&refined);
    if residual.valid {
        info!(stage = %Stage::Validator, repairs = repairs.len(), "scene refined");
    } else {
        warn!(stage = %Stage::Validator, errors = ?residual.errors, "refined scene still invalid");
    }

    RefineOutcome {
        scene: refined,
        status: RefineStatus::Refined {
            residual_errors: residual.errors,
            repairs,
        },
    }
}
