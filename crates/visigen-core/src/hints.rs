use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::{ObjectSpec, ParsedSpec};
use crate::schema::{EnvironmentType, UNTYPED_OBJECT};

static DEGREES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)[\s-]*(?:°|degrees?\b|deg\b)").expect("valid degrees pattern")
});
static ANGLE_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bangle\s*(?:of|=|is)?\s*(\d+(?:\.\d+)?)").expect("valid angle pattern")
});
static MASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)[\s-]*(?:kg|kilograms?)\b").expect("valid mass pattern")
});
static FRICTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:μ|\bmu\b|coefficient of (?:kinetic |static )?friction|friction coefficient)\s*(?:of|=|is|:)?\s*(\d*\.?\d+)",
    )
    .expect("valid friction pattern")
});
static FRICTIONLESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:no friction|without friction|frictionless|smooth)\b")
        .expect("valid frictionless pattern")
});
static OBJECT_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(box|sphere|ball|block|cart|crate|cube)(?:es|s)?\b").expect("valid object pattern")
});
static INCLINE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:incline[sd]?|ramps?|slopes?|angle)\b").expect("valid incline pattern"));
static PULLEY_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:pulleys?|atwood)\b").expect("valid pulley pattern"));
static PLANE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:horizontal|plane|floor|table|ground|level surface)\b")
        .expect("valid plane pattern")
});

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProblemHints {
    pub angle_deg: Option<f64>,
    pub mass_kg: Option<f64>,
    pub friction: Option<f64>,
    pub object_type: Option<String>,
    pub environment: Option<EnvironmentType>,
}

impl ProblemHints {
    pub fn extract(problem: &str) -> Self {
        let text = problem.to_lowercase();

        let angle_deg = first_number(&DEGREES, &text).or_else(|| first_number(&ANGLE_OF, &text));
        let mass_kg = first_number(&MASS, &text);
        let friction = first_number(&FRICTION, &text)
            .or_else(|| FRICTIONLESS.is_match(&text).then_some(0.0));
        let object_type = OBJECT_WORD
            .captures(&text)
            .and_then(|captures| captures.get(1))
            .map(|word| word.as_str().to_string());

        let environment = if PULLEY_WORD.is_match(&text) {
            Some(EnvironmentType::Pulley)
        } else if angle_deg.is_some() || INCLINE_WORD.is_match(&text) {
            Some(EnvironmentType::Incline)
        } else if PLANE_WORD.is_match(&text) {
            Some(EnvironmentType::Plane)
        } else {
            None
        };

        Self {
            angle_deg,
            mass_kg,
            friction,
            object_type,
            environment,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merges the hints into `spec` and returns the names of the fields it
    /// changed. Stated friction replaces the model's value; everything else
    /// only fills gaps.
    pub fn apply_to(&self, spec: &mut ParsedSpec) -> Vec<&'static str> {
        let mut filled = Vec::new();

        if spec.environment_type == EnvironmentType::Unknown {
            if let Some(environment) = self.environment {
                spec.environment_type = environment;
                filled.push("environment_type");
            }
        }
        if spec.angle_deg.is_none() && self.angle_deg.is_some() {
            spec.angle_deg = self.angle_deg;
            filled.push("angle_deg");
        }
        if self.friction.is_some() && spec.friction != self.friction {
            spec.friction = self.friction;
            filled.push("friction");
        }

        if let Some(kind) = &self.object_type {
            for object in spec.objects.iter_mut().filter(|object| object.kind == UNTYPED_OBJECT) {
                object.kind = kind.clone();
                if !filled.contains(&"objects.type") {
                    filled.push("objects.type");
                }
            }
        }

        if spec.objects.is_empty() {
            if let Some(kind) = &self.object_type {
                spec.objects.push(ObjectSpec {
                    kind: kind.clone(),
                    mass_kg: self.mass_kg,
                });
                filled.push("objects");
            }
        } else if let [only] = spec.objects.as_mut_slice() {
            if only.mass_kg.is_none() && self.mass_kg.is_some() {
                only.mass_kg = self.mass_kg;
                filled.push("objects[0].mass_kg");
            }
        }

        filled
    }
}

fn first_number(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse::<f64>().ok())
}
