use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde_json::{Value, json};
use visigen_core::schema::{
    ANGLE_BOUNDS, DEFAULT_FRICTION, FRICTION_BOUNDS, MASS_BOUNDS, VALID_ENVIRONMENTS,
    VALID_OBJECT_TYPES,
};
use visigen_core::{ParsedSpec, ProblemHints, SceneJson};

const PARSER_RULES: &str = "\
You extract structured data from a physics word problem for a 3D simulation.
Return ONLY a JSON object with these keys:
- environment_type: one of {environments}
- angle_deg: number or null (degrees, incline only)
- friction: number or null (coefficient, 0 when the problem says there is no friction)
- objects: list of {\"type\": one of {object_types}, \"mass_kg\": number or null}
- extra_terms: object with any other quantities mentioned (velocities, heights, forces)
- source_text: the problem text, verbatim
Use meters, kilograms and seconds. Do not invent values the problem does not state.";

const SCENE_RULES: &str = "\
You convert a parsed physics problem into a JSON scene for a 3D rigid-body simulation.
The JSON MUST have these keys: scene, environment, objects, simulation.
Rules:
- environment.type equals the parsed environment_type.
- If angle_deg is not null, environment.angle equals it exactly.
- If friction is not null, set environment.material.friction and every object's material.friction to it; otherwise use {default_friction}.
- objects mirror the parsed objects in order, with mass equal to mass_kg when it is not null.
- scene.gravity is {\"x\": 0, \"y\": -9.81, \"z\": 0}.
- Provide a camera (position and lookAt) and at least one light.
- simulation has timestep, duration and solver.
- Use meters, kilograms and seconds. Return ONLY JSON (no markdown, no text).";

const REFINE_CHECKLIST: &str = "\
Checklist:
1. environment.type matches the parsed environment_type.
2. Inclines have environment.angle set, within [{angle_min}, {angle_max}] degrees.
3. Friction values lie in [{friction_min}, {friction_max}]; use {default_friction} when unknown.
4. Every object has a type and a mass in [{mass_min}, {mass_max}] kg; take missing ones from the parsed spec.
5. scene has gravity, camera and lighting; use defaults (gravity y = -9.81) when absent.
6. simulation has timestep, duration and solver.
7. Every numeric field is a JSON number, never a string.";

fn fill(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (key, value)| {
            text.replace(&format!("{{{key}}}"), value)
        })
}

fn quoted_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

pub fn parser_prompt(problem: &str, hints: &ProblemHints) -> String {
    let rules = fill(
        PARSER_RULES,
        &[
            ("environments", quoted_list(&VALID_ENVIRONMENTS)),
            ("object_types", quoted_list(&VALID_OBJECT_TYPES)),
        ],
    );

    let mut prompt = rules;
    if !hints.is_empty() {
        prompt.push_str(
            "\n\nValues read directly from the text (use them verbatim when not null):\n",
        );
        prompt.push_str(&pretty(hints));
    }
    prompt.push_str("\n\nProblem:\n\"\"\"");
    prompt.push_str(problem);
    prompt.push_str("\"\"\"\n");
    prompt
}

pub fn scene_prompt(parsed: &ParsedSpec) -> String {
    let mut prompt = fill(SCENE_RULES, &[("default_friction", DEFAULT_FRICTION.to_string())]);
    prompt.push_str("\n\nParsed problem:\n");
    prompt.push_str(&pretty(parsed));
    prompt.push('\n');
    prompt
}

pub fn refine_prompt(
    scene: &SceneJson,
    parsed: &ParsedSpec,
    problem: &str,
    validation_errors: &[String],
    mismatches: &BTreeMap<String, String>,
) -> String {
    let checklist = fill(
        REFINE_CHECKLIST,
        &[
            ("angle_min", ANGLE_BOUNDS.min.to_string()),
            ("angle_max", ANGLE_BOUNDS.max.to_string()),
            ("friction_min", FRICTION_BOUNDS.min.to_string()),
            ("friction_max", FRICTION_BOUNDS.max.to_string()),
            ("mass_min", MASS_BOUNDS.min.to_string()),
            ("mass_max", MASS_BOUNDS.max.to_string()),
            ("default_friction", DEFAULT_FRICTION.to_string()),
        ],
    );

    let mut prompt = String::from(
        "You review a 3D physics scene generated from a word problem and return a corrected scene.\n\
         Return ONLY the corrected JSON with keys scene, environment, objects, simulation.\n\n",
    );
    prompt.push_str(&checklist);

    if !validation_errors.is_empty() {
        prompt.push_str("\n\nValidation errors:\n");
        for error in validation_errors {
            prompt.push_str("- ");
            prompt.push_str(error);
            prompt.push('\n');
        }
    }
    if !mismatches.is_empty() {
        prompt.push_str("\n\nDisagreements with the parsed problem:\n");
        for (field, detail) in mismatches {
            prompt.push_str(&format!("- {field}: {detail}\n"));
        }
    }

    prompt.push_str("\n\nProblem:\n\"\"\"");
    prompt.push_str(problem);
    prompt.push_str("\"\"\"\n\nParsed problem:\n");
    prompt.push_str(&pretty(parsed));
    prompt.push_str("\n\nCurrent scene:\n");
    prompt.push_str(&pretty(scene));
    prompt.push('\n');
    prompt
}

fn vec3_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "x": {"type": "NUMBER"},
            "y": {"type": "NUMBER"},
            "z": {"type": "NUMBER"}
        },
        "required": ["x", "y", "z"]
    })
}

fn material_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "color": {"type": "STRING"},
            "friction": {"type": "NUMBER"},
            "restitution": {"type": "NUMBER"}
        }
    })
}

pub static SCENE_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "OBJECT",
        "properties": {
            "scene": {
                "type": "OBJECT",
                "properties": {
                    "gravity": vec3_schema(),
                    "camera": {
                        "type": "OBJECT",
                        "properties": {"position": vec3_schema(), "lookAt": vec3_schema()},
                        "required": ["position", "lookAt"]
                    },
                    "lighting": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "type": {"type": "STRING"},
                                "intensity": {"type": "NUMBER"}
                            },
                            "required": ["type", "intensity"]
                        }
                    }
                },
                "required": ["gravity", "camera", "lighting"]
            },
            "environment": {
                "type": "OBJECT",
                "properties": {
                    "type": {"type": "STRING"},
                    "angle": {"type": "NUMBER"},
                    "dimensions": {
                        "type": "OBJECT",
                        "properties": {
                            "width": {"type": "NUMBER"},
                            "depth": {"type": "NUMBER"},
                            "height": {"type": "NUMBER"}
                        }
                    },
                    "material": material_schema()
                },
                "required": ["type"]
            },
            "objects": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "type": {"type": "STRING"},
                        "mass": {"type": "NUMBER"},
                        "size": {
                            "type": "OBJECT",
                            "properties": {
                                "width": {"type": "NUMBER"},
                                "height": {"type": "NUMBER"},
                                "depth": {"type": "NUMBER"},
                                "radius": {"type": "NUMBER"}
                            }
                        },
                        "position": vec3_schema(),
                        "material": material_schema()
                    },
                    "required": ["type", "mass", "position"]
                }
            },
            "simulation": {
                "type": "OBJECT",
                "properties": {
                    "timestep": {"type": "NUMBER"},
                    "duration": {"type": "NUMBER"},
                    "solver": {"type": "STRING"},
                    "notes": {"type": "STRING"}
                },
                "required": ["timestep", "duration", "solver"]
            }
        },
        "required": ["scene", "environment", "objects", "simulation"]
    })
});
