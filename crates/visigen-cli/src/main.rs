use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use visigen_ai::config::{API_KEY_ENV, DEFAULT_MODEL};
use visigen_ai::pipeline::{DEFAULT_MAX_ROUNDS, PipelineConfig};
use visigen_ai::{GeminiClient, GeminiConfig, ParsedPayload, ParserOutcome, SimulationPipeline};
use visigen_core::{
    ParsedSpec, ProblemHints, SceneJson, compare_parsed_and_scene, scene_is_valid,
    validate_parsed_spec, validate_scene_json,
};

#[derive(Debug, Parser)]
#[command(name = "visigen", about = "Turn physics word problems into 3D scene descriptions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full parse, scene and validation pipeline.
    Simulate {
        problem: String,
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
        max_rounds: usize,
        #[arg(long, default_value_t = 2000)]
        retry_delay_ms: u64,
    },
    /// Run only the parser stage.
    Parse {
        problem: String,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Print the values read directly from the problem text. Needs no API key.
    Hints { problem: String },
    /// Validate a scene file, optionally comparing it with a parsed spec file.
    Check {
        scene: PathBuf,
        #[arg(long)]
        against: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct ModelArgs {
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "VISIGEN_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl ModelArgs {
    fn client(self) -> anyhow::Result<GeminiClient> {
        let config = GeminiConfig::new(self.api_key)?
            .with_model(self.model)?
            .with_timeout(Duration::from_secs(self.timeout_secs))?;
        Ok(GeminiClient::new(config)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let output = match Cli::parse().command {
        Command::Simulate {
            problem,
            model,
            max_rounds,
            retry_delay_ms,
        } => {
            if max_rounds == 0 {
                bail!("--max-rounds must be at least 1");
            }
            let config = PipelineConfig {
                max_rounds,
                retry_delay: Duration::from_millis(retry_delay_ms),
            };
            let pipeline = SimulationPipeline::new(model.client()?, config);
            serde_json::to_value(pipeline.run(&problem).await)?
        }
        Command::Parse { problem, model } => {
            let pipeline = SimulationPipeline::new(model.client()?, PipelineConfig::default());
            parse_report(&pipeline.parse(&problem).await)?
        }
        Command::Hints { problem } => serde_json::to_value(ProblemHints::extract(&problem))?,
        Command::Check { scene, against } => {
            let scene = read_json(&scene)?;
            let parsed = against.as_deref().map(read_json).transpose()?;
            check_report(&scene, parsed.as_ref())?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn parse_report(outcome: &ParserOutcome) -> anyhow::Result<Value> {
    let status = match outcome {
        ParserOutcome::Valid(_) => "valid",
        ParserOutcome::Repaired { .. } => "repaired",
        ParserOutcome::Failed(_) => "failed",
    };
    Ok(json!({
        "status": status,
        "errors": outcome.errors(),
        "parsed": serde_json::to_value(ParsedPayload::from(outcome))?,
    }))
}

fn check_report(scene: &Value, parsed: Option<&Value>) -> anyhow::Result<Value> {
    let Some(decoded) = SceneJson::from_value(scene) else {
        bail!("scene file must contain a JSON object");
    };
    let validation = validate_scene_json(&decoded);
    let mut report = json!({
        "valid": validation.valid,
        "complete": scene_is_valid(&decoded),
        "errors": validation.errors,
    });

    if let Some(parsed) = parsed {
        let spec_validation = validate_parsed_spec(parsed);
        let source_text = parsed
            .get("source_text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let spec = ParsedSpec::from_model_output(parsed, source_text);
        report["parsed_errors"] = json!(spec_validation.errors);
        report["mismatches"] = json!(compare_parsed_and_scene(&spec, &decoded));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use visigen_ai::{ParserOutcome, StageFailure};

    use super::{check_report, parse_report, read_json};

    fn scene() -> serde_json::Value {
        json!({
            "scene": {
                "gravity": {"x": 0, "y": -9.81, "z": 0},
                "camera": {"position": {"x": 10, "y": 6, "z": 10}, "lookAt": {"x": 0, "y": 0, "z": 0}}
            },
            "environment": {"type": "plane", "material": {"friction": 0.3}},
            "objects": [{"type": "box", "mass": 5}],
            "simulation": {"timestep": 0.016, "duration": 5, "solver": "rapier"}
        })
    }

    #[test]
    fn check_reports_validity() {
        let report = check_report(&scene(), None).expect("report");
        assert_eq!(report["valid"], true);
        assert_eq!(report["complete"], true);
        assert!(report.get("mismatches").is_none());

        let report = check_report(&json!({"objects": []}), None).expect("report");
        assert_eq!(report["valid"], false);
        assert!(report["errors"].as_array().is_some_and(|errors| errors.len() >= 3));
    }

    #[test]
    fn check_compares_against_parsed_spec() {
        let parsed = json!({
            "environment_type": "incline",
            "angle_deg": 30,
            "objects": [{"type": "box", "mass_kg": 5}],
            "source_text": "A 5 kg box on a 30 degree incline."
        });
        let report = check_report(&scene(), Some(&parsed)).expect("report");

        assert_eq!(report["parsed_errors"], json!([]));
        assert!(report["mismatches"]["environment.type"].is_string());
        assert!(report["mismatches"]["environment.angle"].is_string());
    }

    #[test]
    fn check_rejects_non_object_scene() {
        assert!(check_report(&json!([1, 2]), None).is_err());
    }

    #[test]
    fn parse_report_flags_failures() {
        let outcome = ParserOutcome::Failed(StageFailure {
            error: "model output is not valid JSON".to_string(),
            raw_output: Some("oops".to_string()),
            source_text: "A ball falls.".to_string(),
        });
        let report = parse_report(&outcome).expect("report");
        assert_eq!(report["status"], "failed");
        assert_eq!(report["parsed"]["raw_output"], "oops");
    }

    #[test]
    fn reads_json_files() {
        let path = std::env::temp_dir().join("visigen_cli_scene_test.json");
        std::fs::write(&path, scene().to_string()).expect("should write scene file");

        let value = read_json(&path).expect("file should parse");
        assert_eq!(value["environment"]["type"], "plane");

        std::fs::write(&path, "{not json").expect("should write scene file");
        assert!(read_json(&path).is_err());
        let _ = std::fs::remove_file(path);
    }
}
