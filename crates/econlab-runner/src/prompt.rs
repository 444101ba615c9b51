use thiserror::Error;

use crate::table::Table;
use crate::trial::{Role, Trial};

pub const FINAL_PROMPT_COLUMN: &str = "final-prompt";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template_error: row {row}: no value for placeholder '{{{placeholder}}}'")]
    UnknownPlaceholder { row: usize, placeholder: String },
    #[error("template_error: row {row}: unclosed '{{' in template")]
    UnclosedBrace { row: usize },
}

#[derive(Debug, Clone)]
pub struct RenderedTrial {
    pub trial: Trial,
    pub final_prompt: String,
}

// Amounts coming from CSV cells like "100" should render as "100", not
// "100.0"; fractional amounts keep their fraction.
pub fn format_amount(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn render_prompt(trial: &Trial) -> Result<String, RenderError> {
    let vars: Vec<(&str, String)> = match trial.role {
        Role::Proposer => vec![("pot", format_amount(trial.pot))],
        Role::Receiver { offer } => vec![
            ("pot", format_amount(trial.pot)),
            ("offer", format_amount(offer)),
            ("remainder", format_amount(trial.pot - offer)),
        ],
    };
    substitute(&trial.base_prompt, trial.index + 1, &vars)
}

pub fn render_trials(trials: Vec<Trial>) -> Result<Vec<RenderedTrial>, RenderError> {
    let mut rendered = Vec::with_capacity(trials.len());
    for trial in trials {
        let final_prompt = render_prompt(&trial)?;
        rendered.push(RenderedTrial {
            trial,
            final_prompt,
        });
    }
    Ok(rendered)
}

// Input table plus the computed final-prompt column; an existing
// final-prompt column (the sample table ships one, blank) is overwritten.
pub fn with_final_prompts(table: &Table, rendered: &[RenderedTrial]) -> Table {
    let mut out = table.clone();
    if !out.columns.iter().any(|c| c == FINAL_PROMPT_COLUMN) {
        out.columns.push(FINAL_PROMPT_COLUMN.to_string());
    }
    for item in rendered {
        if let Some(row) = out.rows.get_mut(item.trial.index) {
            row.insert(FINAL_PROMPT_COLUMN.to_string(), item.final_prompt.clone());
        }
    }
    out
}

fn substitute(template: &str, row: usize, vars: &[(&str, String)]) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        if ch != '{' {
            out.push(ch);
            continue;
        }
        let mut name = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == '}' {
                closed = true;
                break;
            }
            name.push(inner);
        }
        if !closed {
            return Err(RenderError::UnclosedBrace { row });
        }
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => {
                return Err(RenderError::UnknownPlaceholder {
                    row,
                    placeholder: name,
                })
            }
        }
    }
    Ok(out)
}
