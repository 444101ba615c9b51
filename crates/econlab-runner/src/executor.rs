use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::ollama::{EngineError, EngineResponse, GenerateRequest, Generator};
use crate::options::{map_options, CoercionError};
use crate::prompt::RenderedTrial;
use crate::table::Table;

#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("missing_field: trial has no usable '{0}'")]
    MissingField(&'static str),
    #[error("{0}")]
    Coercion(#[from] CoercionError),
    #[error("{0}")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub input: BTreeMap<String, String>,
    pub llm: Vec<(String, String)>,
}

impl ResultRecord {
    pub fn status(&self) -> &str {
        self.llm
            .iter()
            .find(|(name, _)| name == "llm_status")
            .map(|(_, value)| value.as_str())
            .unwrap_or("error")
    }
}

// One record per trial, in input order, no matter how many calls fail.
pub fn run_trials(
    engine: &dyn Generator,
    rendered_table: &Table,
    rendered: &[RenderedTrial],
) -> Vec<ResultRecord> {
    let total = rendered.len();
    let mut records = Vec::with_capacity(total);
    for item in rendered {
        let trial_no = item.trial.index + 1;
        info!(trial = trial_no, total, role = item.trial.role.name(), "running trial");
        let outcome = run_single_trial(engine, item);
        let llm = match outcome {
            Ok(response) => success_cells(&response),
            Err(reason) => {
                warn!(trial = trial_no, error = %reason, "trial failed");
                failure_cells(&reason)
            }
        };
        records.push(ResultRecord {
            input: rendered_table
                .rows
                .get(item.trial.index)
                .cloned()
                .unwrap_or_default(),
            llm,
        });
    }
    records
}

fn run_single_trial(
    engine: &dyn Generator,
    item: &RenderedTrial,
) -> Result<EngineResponse, FailureReason> {
    let model = item
        .trial
        .supplied_cell("model")
        .ok_or(FailureReason::MissingField("model"))?
        .to_string();
    if item.final_prompt.trim().is_empty() {
        return Err(FailureReason::MissingField("final-prompt"));
    }

    let options = map_options(&item.trial)?;

    let request = GenerateRequest {
        model,
        prompt: item.final_prompt.clone(),
        system: item
            .trial
            .supplied_cell("system-prompt")
            .map(str::to_string),
        options: if options.is_empty() {
            None
        } else {
            Some(options)
        },
        stream: false,
    };
    Ok(engine.generate(&request)?)
}

fn success_cells(response: &EngineResponse) -> Vec<(String, String)> {
    let mut cells = vec![
        ("llm_status".to_string(), "ok".to_string()),
        (
            "llm_model".to_string(),
            response.model.clone().unwrap_or_default(),
        ),
        (
            "llm_created_at".to_string(),
            response.created_at.clone().unwrap_or_default(),
        ),
        ("llm_response".to_string(), response.response.clone()),
        ("llm_done".to_string(), response.done.to_string()),
        (
            "llm_done_reason".to_string(),
            response.done_reason.clone().unwrap_or_default(),
        ),
        ("llm_eval_count".to_string(), count_cell(response.eval_count)),
        (
            "llm_eval_duration".to_string(),
            count_cell(response.eval_duration),
        ),
        (
            "llm_prompt_eval_count".to_string(),
            count_cell(response.prompt_eval_count),
        ),
        (
            "llm_prompt_eval_duration".to_string(),
            count_cell(response.prompt_eval_duration),
        ),
        (
            "llm_total_duration".to_string(),
            count_cell(response.total_duration),
        ),
    ];
    if let Some(info) = &response.info {
        for (key, value) in info {
            cells.push((format!("llm_info_{}", key), scalar_cell(value)));
        }
    }
    cells
}

fn failure_cells(reason: &FailureReason) -> Vec<(String, String)> {
    vec![
        ("llm_status".to_string(), "error".to_string()),
        ("llm_error".to_string(), reason.to_string()),
    ]
}

fn count_cell(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn scalar_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
