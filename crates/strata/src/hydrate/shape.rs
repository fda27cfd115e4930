use crate::{
    error::HydrateError,
    value::{Row, Value},
};
use std::collections::BTreeMap;

/// Per-relation dedup payload: relation name → {key → related row}.
pub type DedupRelations = BTreeMap<String, BTreeMap<Value, Row>>;

///
/// RawResult
///
/// The three result shapes an execution engine may return. Hydration
/// normalizes all of them to mapping rows before reconstruction.
///

#[derive(Clone, Debug, PartialEq)]
pub enum RawResult {
    /// One mapping per row.
    Rows(Vec<Row>),
    /// Column names plus row-major value arrays.
    Columnar {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Main rows plus each related record once, keyed by its identifier.
    Deduplicated {
        main: Vec<Row>,
        relations: DedupRelations,
    },
}

impl RawResult {
    /// Normalize to mapping rows, carrying the dedup payload through when
    /// present. Columnar rows must match the column count exactly.
    pub fn into_rows(self) -> Result<(Vec<Row>, Option<DedupRelations>), HydrateError> {
        match self {
            Self::Rows(rows) => Ok((rows, None)),
            Self::Columnar { columns, rows } => {
                let mut out = Vec::with_capacity(rows.len());
                for values in rows {
                    if values.len() != columns.len() {
                        return Err(HydrateError::ColumnarWidth {
                            got: values.len(),
                            want: columns.len(),
                        });
                    }
                    out.push(columns.iter().cloned().zip(values).collect());
                }
                Ok((out, None))
            }
            Self::Deduplicated { main, relations } => Ok((main, Some(relations))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columnar_rows_zip_with_columns() {
        let raw = RawResult::Columnar {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![vec![Value::Int(1), Value::from("ada")]],
        };
        let (rows, dedup) = raw.into_rows().expect("normalizes");
        assert!(dedup.is_none());
        assert_eq!(rows[0]["id"], Value::Int(1));
        assert_eq!(rows[0]["name"], Value::from("ada"));
    }

    #[test]
    fn columnar_width_mismatch_fails_loudly() {
        let raw = RawResult::Columnar {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![vec![Value::Int(1)]],
        };
        assert_eq!(
            raw.into_rows().expect_err("width mismatch"),
            HydrateError::ColumnarWidth { got: 1, want: 2 }
        );
    }
}
