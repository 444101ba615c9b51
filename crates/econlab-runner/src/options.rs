use serde_json::{Map, Value};
use thiserror::Error;

use crate::trial::Trial;

// 1:1 name mapping into the engine's options block. Anything else in the row
// stays a pass-through column and never becomes an inference option.
pub const PASSTHROUGH_OPTIONS: [&str; 16] = [
    "seed",
    "temperature",
    "top_p",
    "top_k",
    "repeat_penalty",
    "presence_penalty",
    "frequency_penalty",
    "mirostat",
    "mirostat_tau",
    "mirostat_eta",
    "num_ctx",
    "num_predict",
    "num_keep",
    "tfs_z",
    "min_p",
    "repeat_last_n",
];

pub const BOOL_OPTIONS: [&str; 2] = ["use_mmap", "use_mlock"];

#[derive(Debug, Error)]
#[error("field_coercion: column '{column}': cannot interpret '{value}' as {expected}")]
pub struct CoercionError {
    pub column: String,
    pub value: String,
    pub expected: &'static str,
}

pub fn map_options(trial: &Trial) -> Result<Map<String, Value>, CoercionError> {
    let mut options = Map::new();

    for name in PASSTHROUGH_OPTIONS {
        if let Some(raw) = trial.supplied_cell(name) {
            options.insert(name.to_string(), numeric_value(raw));
        }
    }

    if let Some(raw) = trial.supplied_cell("stop_sequence") {
        options.insert("stop".to_string(), stop_value(raw)?);
    }

    for name in BOOL_OPTIONS {
        if let Some(raw) = trial.supplied_cell(name) {
            let flag = parse_bool(raw).ok_or_else(|| CoercionError {
                column: name.to_string(),
                value: raw.to_string(),
                expected: "boolean",
            })?;
            options.insert(name.to_string(), Value::Bool(flag));
        }
    }

    Ok(options)
}

// Integer-first so seeds and counts stay integral in the request body. A
// supplied cell that is neither integer nor finite float passes through as a
// string; the engine applies its own handling.
fn numeric_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    Value::String(raw.to_string())
}

fn stop_value(raw: &str) -> Result<Value, CoercionError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        // already a sequence: copy it verbatim
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
            if items.iter().all(Value::is_string) {
                return Ok(Value::Array(items));
            }
            return Err(CoercionError {
                column: "stop_sequence".to_string(),
                value: raw.to_string(),
                expected: "list of strings",
            });
        }
    }
    let parts: Vec<Value> = trimmed
        .split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Value::String(part.to_string()))
        .collect();
    Ok(Value::Array(parts))
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") || raw == "1" {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") || raw == "0" {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::Role;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn trial_with(cells: &[(&str, &str)]) -> Trial {
        let mut row = BTreeMap::new();
        for (name, value) in cells {
            row.insert(name.to_string(), value.to_string());
        }
        Trial {
            index: 0,
            role: Role::Proposer,
            pot: 100.0,
            base_prompt: "Pot is {pot}".to_string(),
            row,
        }
    }

    #[test]
    fn unsupplied_fields_never_emit_a_key() {
        let trial = trial_with(&[
            ("temperature", ""),
            ("top_p", "   "),
            ("seed", "nan"),
            ("top_k", "40"),
        ]);
        let options = map_options(&trial).expect("map");
        assert_eq!(options.len(), 1);
        assert_eq!(options.get("top_k"), Some(&json!(40)));
    }

    #[test]
    fn numeric_fields_coerce_integer_first() {
        let trial = trial_with(&[
            ("seed", "42"),
            ("temperature", "0.8"),
            ("repeat_last_n", "64"),
            ("mirostat_tau", "5.0"),
        ]);
        let options = map_options(&trial).expect("map");
        assert_eq!(options.get("seed"), Some(&json!(42)));
        assert_eq!(options.get("temperature"), Some(&json!(0.8)));
        assert_eq!(options.get("repeat_last_n"), Some(&json!(64)));
        assert_eq!(options.get("mirostat_tau"), Some(&json!(5.0)));
    }

    #[test]
    fn malformed_numeric_passes_through_as_string() {
        let trial = trial_with(&[("num_ctx", "lots")]);
        let options = map_options(&trial).expect("map");
        assert_eq!(options.get("num_ctx"), Some(&json!("lots")));
    }

    #[test]
    fn stop_sequence_splits_on_pipe_and_trims() {
        let trial = trial_with(&[("stop_sequence", "foo|bar| baz ")]);
        let options = map_options(&trial).expect("map");
        assert_eq!(options.get("stop"), Some(&json!(["foo", "bar", "baz"])));
    }

    #[test]
    fn single_stop_entry_is_still_a_list() {
        let trial = trial_with(&[("stop_sequence", "solo")]);
        let options = map_options(&trial).expect("map");
        assert_eq!(options.get("stop"), Some(&json!(["solo"])));
    }

    #[test]
    fn absent_stop_sequence_emits_no_stop_key() {
        let trial = trial_with(&[("stop_sequence", "")]);
        let options = map_options(&trial).expect("map");
        assert!(options.get("stop").is_none());
    }

    #[test]
    fn json_list_stop_sequence_is_copied_verbatim() {
        let trial = trial_with(&[("stop_sequence", r#"["END", "STOP"]"#)]);
        let options = map_options(&trial).expect("map");
        assert_eq!(options.get("stop"), Some(&json!(["END", "STOP"])));
    }

    #[test]
    fn json_list_with_non_strings_is_a_coercion_error() {
        let trial = trial_with(&[("stop_sequence", "[1, 2]")]);
        let err = map_options(&trial).expect_err("must fail");
        assert!(err.to_string().contains("field_coercion"), "got: {}", err);
    }

    #[test]
    fn booleans_coerce_strictly() {
        let trial = trial_with(&[("use_mmap", "True"), ("use_mlock", "0")]);
        let options = map_options(&trial).expect("map");
        assert_eq!(options.get("use_mmap"), Some(&json!(true)));
        assert_eq!(options.get("use_mlock"), Some(&json!(false)));

        let bad = trial_with(&[("use_mmap", "sometimes")]);
        let err = map_options(&bad).expect_err("must fail");
        assert!(err.to_string().contains("use_mmap"), "got: {}", err);
    }

    #[test]
    fn unknown_columns_are_ignored_by_the_mapper() {
        let trial = trial_with(&[
            ("experiment-id", "EXP00"),
            ("reasoning_effort", "high"),
            ("logit_bias", "{}"),
        ]);
        let options = map_options(&trial).expect("map");
        assert!(options.is_empty());
    }
}
