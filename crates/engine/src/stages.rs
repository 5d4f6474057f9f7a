//! Stage table: the admin-defined tiers of inactivity.
//!
//! The table is plain text, one stage per line:
//!
//! ```text
//! 0|18|21|1 year and 6 months|6 months
//! 1|22|23|1 year and 10 months|2 months
//! ```
//!
//! Lines are kept raw and only split when a stage is looked up, so a malformed
//! line never prevents the rest of the table from being used. Lookups go by line
//! position; the leading index field is carried along but never consulted.

use thiserror::Error;

use dormant_common::types::StageDefinition;

/// Number of pipe-delimited fields every stage line must carry.
const STAGE_FIELDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Stage {index} not found ({defined} stages defined)")]
    NotFound { index: usize, defined: usize },

    #[error("Stage {index} is malformed: {reason} (line: {line:?})")]
    MalformedLine {
        index: usize,
        line: String,
        reason: String,
    },
}

/// Parsed stage table, indexed by line position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTable {
    lines: Vec<String>,
}

impl StageTable {
    /// Split raw admin text into stage lines. Never fails.
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Number of stage lines, well-formed or not.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Resolve the stage at line position `index`.
    pub fn get(&self, index: usize) -> Result<StageDefinition, StageError> {
        let line = self.lines.get(index).ok_or(StageError::NotFound {
            index,
            defined: self.lines.len(),
        })?;

        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < STAGE_FIELDS {
            return Err(StageError::MalformedLine {
                index,
                line: line.clone(),
                reason: format!(
                    "expected {} fields, found {}",
                    STAGE_FIELDS,
                    fields.len()
                ),
            });
        }

        Ok(StageDefinition {
            index,
            declared_index: fields[0].to_string(),
            lower_bound: parse_bound(fields[1]),
            upper_bound: parse_bound(fields[2]),
            inactive_period_label: fields[3].to_string(),
            remaining_period_label: fields[4].to_string(),
        })
    }

    /// Every line resolved in order, malformed lines included as errors.
    pub fn definitions(&self) -> impl Iterator<Item = Result<StageDefinition, StageError>> + '_ {
        (0..self.lines.len()).map(|index| self.get(index))
    }

    /// Position of the first well-formed stage whose range covers `days`.
    ///
    /// Short lines and lines without integer bounds are skipped here.
    pub fn stage_for_age(&self, days: i64) -> Option<usize> {
        self.definitions()
            .filter_map(Result::ok)
            .find(|stage| stage.covers(days))
            .map(|stage| stage.index)
    }
}

/// Bounds are only consulted for age matching, never for dispatch.
fn parse_bound(field: &str) -> Option<i64> {
    field.trim().parse().ok()
}
