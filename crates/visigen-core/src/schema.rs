use std::fmt;

use serde::{Deserialize, Serialize};

pub const VALID_ENVIRONMENTS: [&str; 4] = ["incline", "plane", "pulley", "unknown"];
pub const VALID_OBJECT_TYPES: [&str; 7] = ["box", "sphere", "ball", "block", "cart", "crate", "cube"];
/// Kind given to parsed objects the model left untyped.
pub const UNTYPED_OBJECT: &str = "object";

pub const ANGLE_BOUNDS: Bounds = Bounds::new(0.0, 90.0);
pub const FRICTION_BOUNDS: Bounds = Bounds::new(0.0, 1.0);
pub const MASS_BOUNDS: Bounds = Bounds::new(0.01, 1000.0);

pub const DEFAULT_FRICTION: f64 = 0.3;
pub const DEFAULT_RESTITUTION: f64 = 0.2;
pub const DEFAULT_MASS_KG: f64 = 1.0;
pub const DEFAULT_GRAVITY_Y: f64 = -9.81;
pub const DEFAULT_TIMESTEP: f64 = 1.0 / 60.0;
pub const DEFAULT_DURATION: f64 = 5.0;
pub const DEFAULT_SOLVER: &str = "rapier";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKey {
    Angle,
    Friction,
    Mass,
}

impl BoundKey {
    pub fn bounds(self) -> Bounds {
        match self {
            BoundKey::Angle => ANGLE_BOUNDS,
            BoundKey::Friction => FRICTION_BOUNDS,
            BoundKey::Mass => MASS_BOUNDS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoundKey::Angle => "angle",
            BoundKey::Friction => "friction",
            BoundKey::Mass => "mass",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "angle" => Some(BoundKey::Angle),
            "friction" => Some(BoundKey::Friction),
            "mass" => Some(BoundKey::Mass),
            _ => None,
        }
    }
}

impl fmt::Display for BoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvironmentType {
    Incline,
    Plane,
    Pulley,
    #[default]
    Unknown,
}

impl EnvironmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvironmentType::Incline => "incline",
            EnvironmentType::Plane => "plane",
            EnvironmentType::Pulley => "pulley",
            EnvironmentType::Unknown => "unknown",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "incline" => Some(EnvironmentType::Incline),
            "plane" => Some(EnvironmentType::Plane),
            "pulley" => Some(EnvironmentType::Pulley),
            "unknown" => Some(EnvironmentType::Unknown),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Self {
        Self::parse(label).unwrap_or_default()
    }
}

impl From<String> for EnvironmentType {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<EnvironmentType> for String {
    fn from(value: EnvironmentType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeFamily {
    Boxy,
    Round,
    Other,
}

impl ShapeFamily {
    pub fn of(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        let singular = label.strip_suffix("es").filter(|stem| stem.ends_with('x'));
        let singular = singular.or_else(|| label.strip_suffix('s')).unwrap_or(&label);
        match singular {
            "box" | "block" | "cart" | "crate" | "cube" => ShapeFamily::Boxy,
            "sphere" | "ball" => ShapeFamily::Round,
            _ => ShapeFamily::Other,
        }
    }
}

pub fn is_known_environment(label: &str) -> bool {
    EnvironmentType::parse(label).is_some()
}

pub fn is_known_object_type(label: &str) -> bool {
    let label = label.trim().to_ascii_lowercase();
    VALID_OBJECT_TYPES.contains(&label.as_str())
}
