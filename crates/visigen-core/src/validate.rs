use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::SceneJson;
use crate::schema::{BoundKey, MASS_BOUNDS, VALID_ENVIRONMENTS, is_known_environment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

pub fn validate_parsed_spec(parsed: &Value) -> Validation {
    let Some(fields) = parsed.as_object() else {
        return Validation::from_errors(vec!["parsed spec must be a JSON object".to_string()]);
    };
    let mut errors = Vec::new();

    match fields.get("environment_type") {
        None => errors.push("missing required field: environment_type".to_string()),
        Some(Value::String(label)) if !is_known_environment(label) => errors.push(format!(
            "environment_type '{label}' is not one of {}",
            VALID_ENVIRONMENTS.join(", ")
        )),
        Some(Value::String(_)) => {}
        Some(_) => errors.push("environment_type must be a string".to_string()),
    }

    check_optional_number(fields, "angle_deg", BoundKey::Angle, &mut errors);
    check_optional_number(fields, "friction", BoundKey::Friction, &mut errors);

    match fields.get("objects") {
        None => errors.push("missing required field: objects".to_string()),
        Some(Value::Array(objects)) => {
            for (index, object) in objects.iter().enumerate() {
                check_object(index, object, &mut errors);
            }
        }
        Some(_) => errors.push("objects must be a list".to_string()),
    }

    match fields.get("source_text") {
        None => errors.push("missing required field: source_text".to_string()),
        Some(Value::String(_)) => {}
        Some(_) => errors.push("source_text must be a string".to_string()),
    }

    if let Some(extra) = fields.get("extra_terms") {
        if !extra.is_object() && !extra.is_null() {
            errors.push("extra_terms must be an object".to_string());
        }
    }

    Validation::from_errors(errors)
}

fn check_optional_number(
    fields: &Map<String, Value>,
    name: &str,
    key: BoundKey,
    errors: &mut Vec<String>,
) {
    match fields.get(name) {
        None | Some(Value::Null) => {}
        Some(Value::Number(number)) => {
            let bounds = key.bounds();
            if let Some(value) = number.as_f64() {
                if !bounds.contains(value) {
                    errors.push(format!(
                        "{name} {value} is outside [{}, {}]",
                        bounds.min, bounds.max
                    ));
                }
            }
        }
        Some(_) => errors.push(format!("{name} must be numeric when present")),
    }
}

fn check_object(index: usize, object: &Value, errors: &mut Vec<String>) {
    let Some(fields) = object.as_object() else {
        errors.push(format!("objects[{index}] must be an object"));
        return;
    };

    match fields.get("type") {
        Some(Value::String(kind)) if !kind.trim().is_empty() => {}
        _ => errors.push(format!("objects[{index}] is missing type")),
    }

    match fields.get("mass_kg") {
        None | Some(Value::Null) => {}
        Some(Value::Number(number)) => {
            if let Some(mass) = number.as_f64() {
                if !MASS_BOUNDS.contains(mass) {
                    errors.push(format!(
                        "objects[{index}].mass_kg {mass} is outside [{}, {}]",
                        MASS_BOUNDS.min, MASS_BOUNDS.max
                    ));
                }
            }
        }
        Some(_) => errors.push(format!("objects[{index}].mass_kg must be numeric or null")),
    }
}

pub fn validate_scene_json(scene: &SceneJson) -> Validation {
    let mut errors = Vec::new();

    match &scene.scene {
        None => errors.push("missing section: scene".to_string()),
        Some(settings) => {
            if settings.gravity.is_none() {
                errors.push("scene.gravity is required".to_string());
            }
            if settings.camera.is_none() {
                errors.push("scene.camera is required".to_string());
            }
        }
    }

    match &scene.environment {
        None => errors.push("missing section: environment".to_string()),
        Some(environment) => {
            if environment.kind.is_none() {
                errors.push("environment.type is required".to_string());
            }
            if environment.material.is_none() {
                errors.push("environment.material is required".to_string());
            }
        }
    }

    match &scene.objects {
        None => errors.push("missing section: objects".to_string()),
        Some(objects) if objects.is_empty() => {
            errors.push("objects must be a non-empty list".to_string());
        }
        Some(_) => {}
    }

    match &scene.simulation {
        None => errors.push("missing section: simulation".to_string()),
        Some(simulation) => {
            if simulation.timestep.is_none() {
                errors.push("simulation.timestep is required".to_string());
            }
            if simulation.duration.is_none() {
                errors.push("simulation.duration is required".to_string());
            }
            if simulation
                .solver
                .as_deref()
                .is_none_or(|solver| solver.trim().is_empty())
            {
                errors.push("simulation.solver is required".to_string());
            }
        }
    }

    Validation::from_errors(errors)
}

/// Completeness check used by the retry loop: all four sections present and
/// non-empty.
pub fn scene_is_valid(scene: &SceneJson) -> bool {
    let has_scene = scene
        .scene
        .as_ref()
        .is_some_and(|settings| !settings.is_empty());
    let has_environment = scene
        .environment
        .as_ref()
        .is_some_and(|environment| !environment.is_empty());
    let has_objects = scene
        .objects
        .as_ref()
        .is_some_and(|objects| !objects.is_empty());
    let has_simulation = scene
        .simulation
        .as_ref()
        .is_some_and(|simulation| !simulation.is_empty());

    has_scene && has_environment && has_objects && has_simulation
}

pub fn clamp_to_bounds(value: f64, key: BoundKey) -> f64 {
    key.bounds().clamp(value)
}

pub fn within_bounds(value: f64, key: BoundKey) -> bool {
    key.bounds().contains(value)
}
