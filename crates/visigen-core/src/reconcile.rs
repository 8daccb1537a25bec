use std::collections::BTreeMap;

use crate::fallback::{default_gravity, object_from_spec};
use crate::model::{Environment, Material, ParsedSpec, SceneJson};
use crate::schema::{BoundKey, DEFAULT_FRICTION, EnvironmentType, ShapeFamily};
use crate::validate::{clamp_to_bounds, within_bounds};

pub const ANGLE_TOLERANCE_DEG: f64 = 0.5;
pub const FRICTION_TOLERANCE: f64 = 0.01;
pub const MASS_RELATIVE_TOLERANCE: f64 = 0.01;

pub fn compare_parsed_and_scene(parsed: &ParsedSpec, scene: &SceneJson) -> BTreeMap<String, String> {
    let mut mismatches = BTreeMap::new();
    let environment = scene.environment.as_ref();
    let scene_kind = environment.and_then(|environment| environment.kind);

    if parsed.environment_type != EnvironmentType::Unknown {
        match scene_kind {
            None => {
                mismatches.insert(
                    "environment.type".to_string(),
                    format!("missing; parsed spec says {}", parsed.environment_type),
                );
            }
            Some(kind) if kind != parsed.environment_type => {
                mismatches.insert(
                    "environment.type".to_string(),
                    format!("scene has {kind}, parsed spec says {}", parsed.environment_type),
                );
            }
            Some(_) => {}
        }
    }

    let is_incline = scene_kind == Some(EnvironmentType::Incline)
        || parsed.environment_type == EnvironmentType::Incline;
    let scene_angle = environment.and_then(|environment| environment.angle);
    match (scene_angle, parsed.angle_deg) {
        (None, expected) if is_incline => {
            let detail = match expected {
                Some(angle) => format!("incline has no angle; parsed spec says {angle}"),
                None => "incline has no angle".to_string(),
            };
            mismatches.insert("environment.angle".to_string(), detail);
        }
        (Some(actual), Some(expected)) if (actual - expected).abs() > ANGLE_TOLERANCE_DEG => {
            mismatches.insert(
                "environment.angle".to_string(),
                format!("scene has {actual}, parsed spec says {expected}"),
            );
        }
        _ => {}
    }

    if let Some(expected) = parsed.friction {
        let actual = environment
            .and_then(|environment| environment.material.as_ref())
            .and_then(|material| material.friction);
        match actual {
            None => {
                mismatches.insert(
                    "environment.material.friction".to_string(),
                    format!("missing; parsed spec says {expected}"),
                );
            }
            Some(actual) if (actual - expected).abs() > FRICTION_TOLERANCE => {
                mismatches.insert(
                    "environment.material.friction".to_string(),
                    format!("scene has {actual}, parsed spec says {expected}"),
                );
            }
            Some(_) => {}
        }
    }

    if parsed.objects.is_empty() {
        return mismatches;
    }

    let objects = scene.objects.as_deref().unwrap_or_default();
    if objects.len() != parsed.objects.len() {
        mismatches.insert(
            "objects".to_string(),
            format!(
                "scene has {} object(s), parsed spec has {}",
                objects.len(),
                parsed.objects.len()
            ),
        );
    }

    for (index, (object, spec)) in objects.iter().zip(&parsed.objects).enumerate() {
        match object.kind.as_deref() {
            None => {
                mismatches.insert(
                    format!("objects[{index}].type"),
                    format!("missing; parsed spec says {}", spec.kind),
                );
            }
            Some(kind) if !same_shape(kind, &spec.kind) => {
                mismatches.insert(
                    format!("objects[{index}].type"),
                    format!("scene has {kind}, parsed spec says {}", spec.kind),
                );
            }
            Some(_) => {}
        }

        let Some(expected) = spec.mass_kg else {
            continue;
        };
        match object.mass {
            None => {
                mismatches.insert(
                    format!("objects[{index}].mass"),
                    format!("missing; parsed spec says {expected}"),
                );
            }
            Some(actual) if mass_drifted(actual, expected) => {
                mismatches.insert(
                    format!("objects[{index}].mass"),
                    format!("scene has {actual}, parsed spec says {expected}"),
                );
            }
            Some(_) => {}
        }
    }

    mismatches
}

fn same_shape(scene_kind: &str, parsed_kind: &str) -> bool {
    let scene_family = ShapeFamily::of(scene_kind);
    let parsed_family = ShapeFamily::of(parsed_kind);
    if scene_family == ShapeFamily::Other || parsed_family == ShapeFamily::Other {
        return scene_kind.trim().eq_ignore_ascii_case(parsed_kind.trim());
    }
    scene_family == parsed_family
}

fn mass_drifted(actual: f64, expected: f64) -> bool {
    let scale = expected.abs().max(f64::EPSILON);
    (actual - expected).abs() / scale > MASS_RELATIVE_TOLERANCE
}

pub fn reconcile(scene: &mut SceneJson, parsed: &ParsedSpec) -> Vec<String> {
    let mut repairs = Vec::new();
    let environment = scene.environment.get_or_insert_with(Environment::default);

    let keep_kind = environment.kind.is_some_and(|kind| {
        kind == parsed.environment_type || parsed.environment_type == EnvironmentType::Unknown
    });
    if !keep_kind {
        let previous = environment.kind.replace(parsed.environment_type);
        repairs.push(match previous {
            Some(previous) => format!(
                "environment.type {previous} replaced with {}",
                parsed.environment_type
            ),
            None => format!("environment.type set to {}", parsed.environment_type),
        });
    }

    if environment.kind == Some(EnvironmentType::Incline) {
        if let Some(expected) = parsed.angle_deg {
            let drifted = environment
                .angle
                .is_none_or(|angle| (angle - expected).abs() > ANGLE_TOLERANCE_DEG);
            if drifted {
                environment.angle = Some(expected);
                repairs.push(format!("environment.angle set to {expected}"));
            }
        }
    }

    if let Some(expected) = parsed.friction {
        let material = environment.material.get_or_insert_with(Material::default);
        let drifted = material
            .friction
            .is_none_or(|friction| (friction - expected).abs() > FRICTION_TOLERANCE);
        if drifted {
            material.friction = Some(expected);
            repairs.push(format!("environment.material.friction set to {expected}"));
        }
    }

    let friction = parsed.friction.unwrap_or(DEFAULT_FRICTION);
    let objects = scene.objects.get_or_insert_with(Vec::new);
    if objects.is_empty() && !parsed.objects.is_empty() {
        objects.extend(
            parsed
                .objects
                .iter()
                .enumerate()
                .map(|(index, spec)| object_from_spec(spec, index, friction)),
        );
        repairs.push(format!(
            "objects rebuilt from parsed spec ({} object(s))",
            objects.len()
        ));
        return repairs;
    }

    for (index, (object, spec)) in objects.iter_mut().zip(&parsed.objects).enumerate() {
        if object.kind.is_none() {
            object.kind = Some(spec.kind.clone());
            repairs.push(format!("objects[{index}].type set to {}", spec.kind));
        }
        if object.mass.is_none() {
            if let Some(mass) = spec.mass_kg {
                object.mass = Some(mass);
                repairs.push(format!("objects[{index}].mass set to {mass}"));
            }
        }
    }

    repairs
}

/// Forces numeric fields into the registered ranges: angles and masses are
/// clamped, friction outside [0, 1] (or missing on a declared material) falls
/// back to the default, and gravity that does not point down is reset.
pub fn enforce_bounds(scene: &mut SceneJson) -> Vec<String> {
    let mut repairs = Vec::new();

    if let Some(settings) = scene.scene.as_mut() {
        if let Some(gravity) = settings.gravity {
            if gravity.y.is_nan() || gravity.y >= 0.0 {
                settings.gravity = Some(default_gravity());
                repairs.push(format!(
                    "scene.gravity.y {} does not point down; reset to default",
                    gravity.y
                ));
            }
        }
    }

    if let Some(environment) = scene.environment.as_mut() {
        if let Some(angle) = environment.angle {
            let clamped = clamp_to_bounds(angle, BoundKey::Angle);
            if clamped != angle {
                environment.angle = Some(clamped);
                repairs.push(format!("environment.angle {angle} clamped to {clamped}"));
            }
        }
        if let Some(material) = environment.material.as_mut() {
            if let Some(note) = enforce_friction(material, "environment.material.friction") {
                repairs.push(note);
            }
        }
    }

    if let Some(objects) = scene.objects.as_mut() {
        for (index, object) in objects.iter_mut().enumerate() {
            if let Some(mass) = object.mass {
                let clamped = clamp_to_bounds(mass, BoundKey::Mass);
                if clamped != mass {
                    object.mass = Some(clamped);
                    repairs.push(format!("objects[{index}].mass {mass} clamped to {clamped}"));
                }
            }
            if let Some(material) = object.material.as_mut() {
                let field = format!("objects[{index}].material.friction");
                if let Some(note) = enforce_friction(material, &field) {
                    repairs.push(note);
                }
            }
        }
    }

    repairs
}

pub fn clamp_parsed_spec(spec: &mut ParsedSpec) -> Vec<String> {
    let mut repairs = Vec::new();

    if let Some(angle) = spec.angle_deg {
        let clamped = clamp_to_bounds(angle, BoundKey::Angle);
        if clamped != angle {
            spec.angle_deg = Some(clamped);
            repairs.push(format!("angle_deg {angle} clamped to {clamped}"));
        }
    }
    if let Some(friction) = spec.friction {
        let clamped = clamp_to_bounds(friction, BoundKey::Friction);
        if clamped != friction {
            spec.friction = Some(clamped);
            repairs.push(format!("friction {friction} clamped to {clamped}"));
        }
    }
    for (index, object) in spec.objects.iter_mut().enumerate() {
        if let Some(mass) = object.mass_kg {
            let clamped = clamp_to_bounds(mass, BoundKey::Mass);
            if clamped != mass {
                object.mass_kg = Some(clamped);
                repairs.push(format!("objects[{index}].mass_kg {mass} clamped to {clamped}"));
            }
        }
    }

    repairs
}

fn enforce_friction(material: &mut Material, field: &str) -> Option<String> {
    match material.friction {
        Some(friction) if within_bounds(friction, BoundKey::Friction) => None,
        Some(friction) => {
            material.friction = Some(DEFAULT_FRICTION);
            Some(format!(
                "{field} {friction} outside [0, 1]; replaced with {DEFAULT_FRICTION}"
            ))
        }
        None => {
            material.friction = Some(DEFAULT_FRICTION);
            Some(format!("{field} missing; set to {DEFAULT_FRICTION}"))
        }
    }
}
