pub mod fallback;
pub mod hints;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod validate;

pub use fallback::{complete_scene, scene_from_spec};
pub use hints::ProblemHints;
pub use model::{
    Camera, Dimensions, Environment, Light, Material, ObjectSpec, ParsedSpec, SceneJson,
    SceneObject, SceneSettings, Simulation, Size, Vec3,
};
pub use reconcile::{clamp_parsed_spec, compare_parsed_and_scene, enforce_bounds, reconcile};
pub use schema::{
    BoundKey, Bounds, EnvironmentType, ShapeFamily, UNTYPED_OBJECT, VALID_ENVIRONMENTS,
    VALID_OBJECT_TYPES,
};
pub use validate::{
    Validation, clamp_to_bounds, scene_is_valid, validate_parsed_spec, validate_scene_json,
};
