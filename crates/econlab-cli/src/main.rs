use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use econlab_runner::{
    default_base_url, describe_input, render_input, run_pipeline, sample, InputSummary,
    NoopPrompter, RunConfig, RunSummary, StdinPrompter, DEFAULT_TIMEOUT_SECS,
};

#[derive(Parser)]
#[command(
    name = "econlab",
    version = "0.1.0",
    about = "Behavioral-economics experiments against a local LLM"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every trial in the input table and write the results table
    Run {
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        ollama_url: Option<String>,
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout_seconds: u64,
        #[arg(long)]
        interactive: bool,
        #[arg(long)]
        json: bool,
    },
    /// Render final prompts without calling the inference engine
    Render {
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Write a ready-to-run sample input table
    Sample {
        #[arg(long, default_value = "Experiment-SAMPLE-IN.csv")]
        out: PathBuf,
        #[arg(long, default_value_t = sample::DEFAULT_SAMPLE_TRIALS)]
        trials: usize,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
    /// Summarize an input table without running anything
    Describe {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run {
            input,
            out,
            ollama_url,
            timeout_seconds,
            interactive,
            json,
        } => {
            let config = RunConfig {
                output_path: out.unwrap_or_else(|| default_output_path(&input)),
                input_path: input,
                base_url: ollama_url.unwrap_or_else(default_base_url),
                timeout: Duration::from_secs(timeout_seconds),
            };
            let summary = if interactive {
                run_pipeline(&config, &StdinPrompter)?
            } else {
                run_pipeline(&config, &NoopPrompter)?
            };
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "run": run_summary_to_json(&summary),
                    "ollama_url": config.base_url,
                    "timeout_seconds": timeout_seconds
                })));
            }
            print_run_summary(&summary);
        }
        Commands::Render { input, out, json } => {
            let batch = render_input(&input)?;
            if let Some(path) = &out {
                batch.table.save(path)?;
            }
            if json {
                let prompts: Vec<Value> = batch
                    .rendered
                    .iter()
                    .map(|item| {
                        json!({
                            "trial": item.trial.index + 1,
                            "role": item.trial.role.name(),
                            "final_prompt": item.final_prompt
                        })
                    })
                    .collect();
                return Ok(Some(json!({
                    "ok": true,
                    "command": "render",
                    "trials": batch.rendered.len(),
                    "out": out.map(|p| p.display().to_string()),
                    "prompts": prompts
                })));
            }
            for item in &batch.rendered {
                println!(
                    "trial {} [{}]: {}",
                    item.trial.index + 1,
                    item.trial.role.name(),
                    item.final_prompt
                );
            }
            if let Some(path) = &out {
                println!("rendered table saved to: {}", path.display());
            }
        }
        Commands::Sample {
            out,
            trials,
            force,
            json,
        } => {
            if out.exists() && !force {
                return Err(anyhow!(
                    "output_exists: {} (pass --force to overwrite)",
                    out.display()
                ));
            }
            sample::write_sample_input(&out, trials)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "sample",
                    "out": out.display().to_string(),
                    "trials": trials
                })));
            }
            println!("sample input saved to: {}", out.display());
            println!("trials: {}", trials);
        }
        Commands::Describe { input, json } => {
            let summary = describe_input(&input)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "summary": input_summary_to_json(&summary)
                })));
            }
            print_input_summary(&summary);
        }
    }
    Ok(None)
}

// Experiment-SAMPLE-IN.csv becomes Experiment-SAMPLE-OUT.csv; anything else
// gets an -OUT suffix next to the input.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("results");
    let name = match stem.strip_suffix("-IN") {
        Some(prefix) => format!("{}-OUT.csv", prefix),
        None => format!("{}-OUT.csv", stem),
    };
    input.with_file_name(name)
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. }
        | Commands::Render { json, .. }
        | Commands::Sample { json, .. }
        | Commands::Describe { json, .. } => *json,
    }
}

fn run_summary_to_json(summary: &RunSummary) -> Value {
    json!({
        "trials": summary.total,
        "ok": summary.ok,
        "errors": summary.errors,
        "output": summary.output_path.display().to_string()
    })
}

fn print_run_summary(summary: &RunSummary) {
    println!("trials: {}", summary.total);
    println!("ok: {}", summary.ok);
    println!("errors: {}", summary.errors);
    println!("results: {}", summary.output_path.display());
}

fn input_summary_to_json(summary: &InputSummary) -> Value {
    json!({
        "trials": summary.trials,
        "proposers": summary.proposers,
        "receivers": summary.receivers,
        "models": summary.models,
        "without_model": summary.without_model,
        "columns": summary.columns
    })
}

fn print_input_summary(summary: &InputSummary) {
    println!("trials: {}", summary.trials);
    println!("proposers: {}", summary.proposers);
    println!("receivers: {}", summary.receivers);
    for (model, count) in &summary.models {
        println!("model {}: {}", model, count);
    }
    if summary.without_model > 0 {
        println!("without_model: {}", summary.without_model);
    }
    println!("columns: {}", summary.columns);
}
