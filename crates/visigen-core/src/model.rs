use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{EnvironmentType, UNTYPED_OBJECT};

// Wrongly typed JSON values decode as absent instead of failing the section.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).ok())
    }

    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(items(value))
    }

    pub fn option_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_array() {
            Ok(Some(items(value)))
        } else {
            Ok(None)
        }
    }

    fn items<T: DeserializeOwned>(value: Value) -> Vec<T> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub mass_kg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSpec {
    pub environment_type: EnvironmentType,
    #[serde(default)]
    pub angle_deg: Option<f64>,
    #[serde(default)]
    pub friction: Option<f64>,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default)]
    pub extra_terms: BTreeMap<String, Value>,
    pub source_text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ParsedDraft {
    #[serde(default, deserialize_with = "lenient::option")]
    environment_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    angle_deg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option")]
    friction: Option<f64>,
    #[serde(default, deserialize_with = "lenient::list")]
    objects: Vec<ObjectDraft>,
    #[serde(default, deserialize_with = "lenient::option")]
    extra_terms: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ObjectDraft {
    #[serde(rename = "type", default, deserialize_with = "lenient::option")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    mass_kg: Option<f64>,
}

impl ParsedSpec {
    pub fn empty(source_text: impl Into<String>) -> Self {
        Self {
            environment_type: EnvironmentType::Unknown,
            angle_deg: None,
            friction: None,
            objects: Vec::new(),
            extra_terms: BTreeMap::new(),
            source_text: source_text.into(),
        }
    }

    /// Keeps every well-typed field of `value`, defaults the rest and pins
    /// `source_text` to the caller's input. Objects without a type keep their
    /// position under the `UNTYPED_OBJECT` kind.
    pub fn from_model_output(value: &Value, source_text: &str) -> Self {
        let draft: ParsedDraft = if value.is_object() {
            serde_json::from_value(value.clone()).unwrap_or_default()
        } else {
            ParsedDraft::default()
        };

        let objects = draft
            .objects
            .into_iter()
            .map(|object| {
                let kind = object
                    .kind
                    .map(|kind| kind.trim().to_string())
                    .filter(|kind| !kind.is_empty())
                    .unwrap_or_else(|| UNTYPED_OBJECT.to_string());
                ObjectSpec {
                    kind,
                    mass_kg: object.mass_kg,
                }
            })
            .collect();

        Self {
            environment_type: draft
                .environment_type
                .as_deref()
                .map(EnvironmentType::from_label)
                .unwrap_or_default(),
            angle_deg: draft.angle_deg,
            friction: draft.friction,
            objects,
            extra_terms: draft.extra_terms.unwrap_or_default(),
            source_text: source_text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneJson {
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub scene: Option<SceneSettings>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub environment: Option<Environment>,
    #[serde(
        default,
        deserialize_with = "lenient::option_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub objects: Option<Vec<SceneObject>>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub simulation: Option<Simulation>,
}

impl SceneJson {
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneSettings {
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub gravity: Option<Vec3>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub camera: Option<Camera>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub lighting: Vec<Light>,
}

impl SceneSettings {
    pub fn is_empty(&self) -> bool {
        self.gravity.is_none() && self.camera.is_none() && self.lighting.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    #[serde(rename = "lookAt")]
    pub look_at: Vec3,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Light {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub intensity: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Vec3>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<EnvironmentType>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub angle: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub dimensions: Option<Dimensions>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub material: Option<Material>,
}

impl Environment {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.angle.is_none()
            && self.dimensions.is_none()
            && self.material.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub width: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub depth: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Material {
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub friction: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub restitution: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneObject {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub mass: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<Size>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Vec3>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub material: Option<Material>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub width: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub depth: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Simulation {
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestep: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub solver: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<String>,
}

impl Simulation {
    pub fn is_empty(&self) -> bool {
        self.timestep.is_none()
            && self.duration.is_none()
            && self.solver.is_none()
            && self.notes.is_none()
    }
}
