use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::info;

pub mod console;
pub mod executor;
pub mod ollama;
pub mod options;
pub mod prompt;
pub mod sample;
pub mod table;
pub mod trial;

pub use console::{NoopPrompter, Prompter, StdinPrompter};
pub use executor::{run_trials, FailureReason, ResultRecord};
pub use ollama::{default_base_url, EngineError, GenerateRequest, Generator, OllamaClient};
pub use options::{map_options, CoercionError};
pub use prompt::{render_prompt, render_trials, with_final_prompts, RenderedTrial};
pub use table::{results_table, LoadError, Table};
pub use trial::{trials_from_table, ParseError, Role, Trial};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

// All paths and endpoints come in through here; nothing in the pipeline
// falls back to a process-wide default.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RenderedBatch {
    pub table: Table,
    pub rendered: Vec<RenderedTrial>,
}

#[derive(Debug, Clone)]
pub struct InputSummary {
    pub trials: usize,
    pub proposers: usize,
    pub receivers: usize,
    pub models: BTreeMap<String, usize>,
    pub without_model: usize,
    pub columns: usize,
}

pub fn run_pipeline(config: &RunConfig, prompter: &dyn Prompter) -> Result<RunSummary> {
    let engine = OllamaClient::new(&config.base_url, config.timeout)?;
    run_pipeline_with(config, &engine, prompter)
}

pub fn run_pipeline_with(
    config: &RunConfig,
    engine: &dyn Generator,
    prompter: &dyn Prompter,
) -> Result<RunSummary> {
    let started = Utc::now();
    info!(input = %config.input_path.display(), "loading trials");
    let table = Table::load(&config.input_path)?;
    let trials = trials_from_table(&table)?;
    let rendered = render_trials(trials)?;
    let rendered_table = with_final_prompts(&table, &rendered);

    if prompter.confirm("Preview rendered prompts before running?") {
        for item in &rendered {
            println!(
                "trial {} [{}]: {}",
                item.trial.index + 1,
                item.trial.role.name(),
                item.final_prompt
            );
        }
    }
    if let Some(path) = prompter.choose_path("Save rendered table to") {
        rendered_table.save(&path)?;
        info!(path = %path.display(), "rendered table saved");
    }

    let records = run_trials(engine, &rendered_table, &rendered);
    let results = results_table(&rendered_table.columns, &records);
    results.save(&config.output_path)?;

    let ok = records.iter().filter(|r| r.status() == "ok").count();
    let errors = records.len() - ok;
    info!(
        total = records.len(),
        ok,
        errors,
        elapsed_ms = (Utc::now() - started).num_milliseconds(),
        output = %config.output_path.display(),
        "pipeline finished"
    );
    Ok(RunSummary {
        total: records.len(),
        ok,
        errors,
        output_path: config.output_path.clone(),
    })
}

pub fn render_input(input_path: &Path) -> Result<RenderedBatch> {
    let table = Table::load(input_path)?;
    let trials = trials_from_table(&table)?;
    let rendered = render_trials(trials)?;
    let table = with_final_prompts(&table, &rendered);
    Ok(RenderedBatch { table, rendered })
}

pub fn describe_input(input_path: &Path) -> Result<InputSummary> {
    let table = Table::load(input_path)?;
    let trials = trials_from_table(&table)?;
    let mut models: BTreeMap<String, usize> = BTreeMap::new();
    let mut proposers = 0;
    let mut receivers = 0;
    let mut without_model = 0;
    for trial in &trials {
        match trial.role {
            Role::Proposer => proposers += 1,
            Role::Receiver { .. } => receivers += 1,
        }
        match trial.supplied_cell("model") {
            Some(model) => *models.entry(model.to_string()).or_default() += 1,
            None => without_model += 1,
        }
    }
    Ok(InputSummary {
        trials: trials.len(),
        proposers,
        receivers,
        models,
        without_model,
        columns: table.columns.len(),
    })
}
