use std::collections::BTreeMap;

use thiserror::Error;

use crate::table::Table;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid_role: row {row}: '{value}' is not proposer|receiver")]
    InvalidRole { row: usize, value: String },
    #[error("invalid_number: row {row}: column '{column}' holds '{value}'")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("negative_pot: row {row}: pot must be non-negative, got {value}")]
    NegativePot { row: usize, value: f64 },
    #[error("offer_required: row {row}: receiver trials must supply an offer")]
    OfferRequired { row: usize },
}

// Receiver carries its offer so rendering is total over the enum: a receiver
// without an offer cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Role {
    Proposer,
    Receiver { offer: f64 },
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Proposer => "proposer",
            Role::Receiver { .. } => "receiver",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trial {
    pub index: usize,
    pub role: Role,
    pub pot: f64,
    pub base_prompt: String,
    pub row: BTreeMap<String, String>,
}

impl Trial {
    // The one presence test: a cell counts as supplied iff it exists, is
    // non-empty after trimming, and is not a NaN marker.
    pub fn supplied_cell(&self, column: &str) -> Option<&str> {
        supplied(self.row.get(column).map(String::as_str))
    }
}

pub fn supplied(cell: Option<&str>) -> Option<&str> {
    let value = cell?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return None;
    }
    Some(value)
}

fn parse_number(
    row: usize,
    column: &'static str,
    value: &str,
) -> Result<f64, ParseError> {
    value.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        row,
        column,
        value: value.to_string(),
    })
}

pub fn trials_from_table(table: &Table) -> Result<Vec<Trial>, ParseError> {
    let mut trials = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        let display_row = index + 1;

        let role_cell = supplied(row.get("role").map(String::as_str)).unwrap_or("");
        let pot_cell = supplied(row.get("pot").map(String::as_str)).ok_or_else(|| {
            ParseError::InvalidNumber {
                row: display_row,
                column: "pot",
                value: String::new(),
            }
        })?;
        let pot = parse_number(display_row, "pot", pot_cell)?;
        if pot < 0.0 {
            return Err(ParseError::NegativePot {
                row: display_row,
                value: pot,
            });
        }

        let role = match role_cell {
            "proposer" => Role::Proposer,
            "receiver" => {
                let offer_cell = supplied(row.get("offer").map(String::as_str))
                    .ok_or(ParseError::OfferRequired { row: display_row })?;
                let offer = parse_number(display_row, "offer", offer_cell)?;
                Role::Receiver { offer }
            }
            other => {
                return Err(ParseError::InvalidRole {
                    row: display_row,
                    value: other.to_string(),
                })
            }
        };

        trials.push(Trial {
            index,
            role,
            pot,
            base_prompt: row.get("base-prompt").cloned().unwrap_or_default(),
            row: row.clone(),
        });
    }
    Ok(trials)
}
