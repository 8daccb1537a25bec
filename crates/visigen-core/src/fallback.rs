use crate::model::{
    Camera, Environment, Light, Material, ObjectSpec, ParsedSpec, SceneJson, SceneObject,
    SceneSettings, Simulation, Size, Vec3,
};
use crate::schema::{
    DEFAULT_DURATION, DEFAULT_FRICTION, DEFAULT_GRAVITY_Y, DEFAULT_MASS_KG, DEFAULT_RESTITUTION,
    DEFAULT_SOLVER, DEFAULT_TIMESTEP, EnvironmentType, ShapeFamily,
};

const SURFACE_COLOR: &str = "#9aa5b1";
const OBJECT_COLORS: [&str; 4] = ["#e4572e", "#29335c", "#f3a712", "#669bbc"];
const OBJECT_SPACING: f64 = 1.5;

pub fn default_gravity() -> Vec3 {
    Vec3::new(0.0, DEFAULT_GRAVITY_Y, 0.0)
}

pub fn default_camera() -> Camera {
    Camera {
        position: Vec3::new(10.0, 6.0, 10.0),
        look_at: Vec3::ZERO,
    }
}

pub fn default_lighting() -> Vec<Light> {
    vec![
        Light {
            kind: Some("ambient".to_string()),
            intensity: Some(0.5),
            position: None,
            color: None,
        },
        Light {
            kind: Some("directional".to_string()),
            intensity: Some(1.0),
            position: Some(Vec3::new(10.0, 10.0, 5.0)),
            color: None,
        },
    ]
}

pub fn default_simulation() -> Simulation {
    Simulation {
        timestep: Some(DEFAULT_TIMESTEP),
        duration: Some(DEFAULT_DURATION),
        solver: Some(DEFAULT_SOLVER.to_string()),
        notes: None,
    }
}

pub fn scene_from_spec(parsed: &ParsedSpec) -> SceneJson {
    complete_scene(SceneJson::default(), parsed)
}

pub fn complete_scene(draft: SceneJson, parsed: &ParsedSpec) -> SceneJson {
    let friction = parsed.friction.unwrap_or(DEFAULT_FRICTION);

    let environment = complete_environment(draft.environment.unwrap_or_default(), parsed, friction);
    let objects = match draft.objects {
        Some(objects) if !objects.is_empty() => objects
            .into_iter()
            .enumerate()
            .map(|(index, object)| complete_object(object, parsed.objects.get(index), index, friction))
            .collect(),
        _ => parsed
            .objects
            .iter()
            .enumerate()
            .map(|(index, spec)| object_from_spec(spec, index, friction))
            .collect(),
    };

    SceneJson {
        scene: Some(complete_settings(draft.scene.unwrap_or_default())),
        environment: Some(environment),
        objects: Some(objects),
        simulation: Some(complete_simulation(draft.simulation.unwrap_or_default())),
    }
}

fn complete_settings(mut settings: SceneSettings) -> SceneSettings {
    settings.gravity.get_or_insert_with(default_gravity);
    settings.camera.get_or_insert_with(default_camera);
    if settings.lighting.is_empty() {
        settings.lighting = default_lighting();
    }
    settings
}

fn complete_environment(
    mut environment: Environment,
    parsed: &ParsedSpec,
    friction: f64,
) -> Environment {
    let kind = *environment.kind.get_or_insert(parsed.environment_type);
    if kind == EnvironmentType::Incline && environment.angle.is_none() {
        environment.angle = parsed.angle_deg;
    }

    let material = environment.material.get_or_insert_with(Material::default);
    material.color.get_or_insert_with(|| SURFACE_COLOR.to_string());
    material.friction.get_or_insert(friction);
    material.restitution.get_or_insert(DEFAULT_RESTITUTION);
    environment
}

fn complete_simulation(mut simulation: Simulation) -> Simulation {
    simulation.timestep.get_or_insert(DEFAULT_TIMESTEP);
    simulation.duration.get_or_insert(DEFAULT_DURATION);
    if simulation
        .solver
        .as_deref()
        .is_none_or(|solver| solver.trim().is_empty())
    {
        simulation.solver = Some(DEFAULT_SOLVER.to_string());
    }
    simulation
}

pub fn complete_object(
    mut object: SceneObject,
    spec: Option<&ObjectSpec>,
    index: usize,
    friction: f64,
) -> SceneObject {
    if object.kind.is_none() {
        object.kind = spec.map(|spec| spec.kind.clone());
    }
    if object.mass.is_none() {
        object.mass = Some(spec.and_then(|spec| spec.mass_kg).unwrap_or(DEFAULT_MASS_KG));
    }

    let family = ShapeFamily::of(object.kind.as_deref().unwrap_or_default());
    object.size.get_or_insert_with(|| default_size(family));
    object.position.get_or_insert_with(|| default_position(index));

    let material = object.material.get_or_insert_with(Material::default);
    material
        .color
        .get_or_insert_with(|| OBJECT_COLORS[index % OBJECT_COLORS.len()].to_string());
    material.friction.get_or_insert(friction);
    material.restitution.get_or_insert(DEFAULT_RESTITUTION);
    object
}

pub fn object_from_spec(spec: &ObjectSpec, index: usize, friction: f64) -> SceneObject {
    complete_object(SceneObject::default(), Some(spec), index, friction)
}

fn default_size(family: ShapeFamily) -> Size {
    match family {
        ShapeFamily::Round => Size {
            radius: Some(0.5),
            ..Size::default()
        },
        ShapeFamily::Boxy | ShapeFamily::Other => Size {
            width: Some(1.0),
            height: Some(1.0),
            depth: Some(1.0),
            radius: None,
        },
    }
}

fn default_position(index: usize) -> Vec3 {
    Vec3::new(index as f64 * OBJECT_SPACING, 1.0, 0.0)
}
