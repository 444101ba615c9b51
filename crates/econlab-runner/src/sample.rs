use std::collections::BTreeMap;
use std::path::Path;

use crate::table::{LoadError, Table};

pub const DEFAULT_SAMPLE_TRIALS: usize = 30;

const SAMPLE_MODEL: &str = "phi3:latest";

const SYSTEM_PROMPT: &str = "You are a rational agent participating in an economic \
decision-making experiment. Provide clear, direct responses that explain your \
reasoning. Focus only on the decision at hand.";

const PROPOSER_PROMPT: &str = "You are the proposer in an ultimatum game. The total \
pot is ${pot}. You must propose a split of the pot between you and the receiver. \
State your offer to the receiver and justify your reasoning.";

const RECEIVER_PROMPT: &str = "You are the receiver in an ultimatum game. The total \
pot is ${pot}. The proposer has offered you ${offer}. If you accept, you will \
receive ${offer} and the proposer will receive ${remainder}. If you reject, both \
of you will receive nothing. Decide whether to accept or reject the offer and \
justify your reasoning.";

const SAMPLE_COLUMNS: [&str; 31] = [
    "experiment-id",
    "trial-id",
    "game",
    "role",
    "pot",
    "offer",
    "model",
    "system-prompt",
    "base-prompt",
    "final-prompt",
    "temperature",
    "top_p",
    "top_k",
    "min_p",
    "repeat_penalty",
    "frequency_penalty",
    "presence_penalty",
    "tfs_z",
    "mirostat",
    "mirostat_eta",
    "mirostat_tau",
    "seed",
    "repeat_last_n",
    "reasoning_effort",
    "logit_bias",
    "num_ctx",
    "stop_sequence",
    "use_mmap",
    "use_mlock",
    "num_keep",
    "num_predict",
];

// Deterministic stand-in for the ad hoc sample sheet researchers start from:
// roles alternate, every trial carries the full default parameter block.
pub fn sample_table(num_trials: usize) -> Table {
    let mut table = Table::new(SAMPLE_COLUMNS.iter().map(|c| c.to_string()).collect());
    for i in 0..num_trials {
        let role = if i % 2 == 0 { "proposer" } else { "receiver" };
        let base_prompt = if role == "proposer" {
            PROPOSER_PROMPT
        } else {
            RECEIVER_PROMPT
        };
        let mut row = BTreeMap::new();
        let mut set = |column: &str, value: String| {
            row.insert(column.to_string(), value);
        };
        set("experiment-id", "EXP00".to_string());
        set("trial-id", format!("trial_{}", i + 1));
        set("game", "ultimatum".to_string());
        set("role", role.to_string());
        set("pot", "100".to_string());
        set("offer", "50.0".to_string());
        set("model", SAMPLE_MODEL.to_string());
        set("system-prompt", SYSTEM_PROMPT.to_string());
        set("base-prompt", base_prompt.to_string());
        set("final-prompt", String::new());
        set("temperature", "0.8".to_string());
        set("top_p", "0.9".to_string());
        set("top_k", "40".to_string());
        set("min_p", "0.0".to_string());
        set("repeat_penalty", "1.1".to_string());
        set("frequency_penalty", "0.0".to_string());
        set("presence_penalty", "0.0".to_string());
        set("tfs_z", "1.0".to_string());
        set("mirostat", "0".to_string());
        set("mirostat_eta", "0.1".to_string());
        set("mirostat_tau", "5.0".to_string());
        set("seed", "42".to_string());
        set("repeat_last_n", "64".to_string());
        set("reasoning_effort", String::new());
        set("logit_bias", String::new());
        set("num_ctx", "2048".to_string());
        set("stop_sequence", String::new());
        set("use_mmap", "True".to_string());
        set("use_mlock", "False".to_string());
        set("num_keep", "0".to_string());
        set("num_predict", "512".to_string());
        table.rows.push(row);
    }
    table
}

pub fn write_sample_input(path: &Path, num_trials: usize) -> Result<(), LoadError> {
    sample_table(num_trials).save(path)
}
