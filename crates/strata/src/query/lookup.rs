use crate::{
    error::{Error, LookupError, LookupValueError},
    model::{ColumnModel, FieldCategory},
    query::filter::{Condition, Operator},
    value::Value,
};
use chrono::NaiveDate;

///
/// Lookup registry
///
/// Static table of legal lookup suffixes per field category, plus the
/// common lookups every category accepts. Each builder validates the value
/// shape at build time; nothing here reaches the execution capability.
///

/// Lookups legal for every category.
const COMMON_LOOKUPS: &[&str] = &["exact", "in", "isnull"];

const TEXT_LOOKUPS: &[&str] = &[
    "iexact",
    "contains",
    "icontains",
    "startswith",
    "istartswith",
    "endswith",
    "iendswith",
];

const NUMERIC_LOOKUPS: &[&str] = &["gt", "gte", "lt", "lte", "between"];

const DATETIME_LOOKUPS: &[&str] = &["gt", "gte", "lt", "lte", "between", "year", "month", "day"];

/// Category-specific lookups, excluding the common set.
#[must_use]
pub const fn category_lookups(category: FieldCategory) -> &'static [&'static str] {
    match category {
        FieldCategory::Text => TEXT_LOOKUPS,
        FieldCategory::Numeric => NUMERIC_LOOKUPS,
        FieldCategory::DateTime => DATETIME_LOOKUPS,
        FieldCategory::Bool | FieldCategory::Generic => &[],
    }
}

/// Full allowed set for a field: its category's lookups plus the common ones.
#[must_use]
pub fn allowed_lookups(category: FieldCategory) -> Vec<&'static str> {
    let mut lookups = category_lookups(category).to_vec();
    lookups.extend_from_slice(COMMON_LOOKUPS);
    lookups
}

fn is_allowed(category: FieldCategory, lookup: &str) -> bool {
    COMMON_LOOKUPS.contains(&lookup) || category_lookups(category).contains(&lookup)
}

/// Canonical `&'static` name for a known lookup, if any category knows it.
fn canonical_lookup(name: &str) -> Option<&'static str> {
    COMMON_LOOKUPS
        .iter()
        .chain(TEXT_LOOKUPS)
        .chain(NUMERIC_LOOKUPS)
        .chain(DATETIME_LOOKUPS)
        .find(|known| **known == name)
        .copied()
}

/// Split `field[__lookup]` on the last separator.
///
/// The suffix is a lookup only when it names a known lookup; otherwise the
/// whole key is a field path with an implicit `exact`. An empty field part
/// is rejected.
pub fn split_lookup_key(key: &str) -> Result<(&str, &'static str), LookupError> {
    let (field, lookup) = match key.rsplit_once("__") {
        Some((field, suffix)) => match canonical_lookup(suffix) {
            Some(lookup) => (field, lookup),
            None => (key, "exact"),
        },
        None => (key, "exact"),
    };
    if field.is_empty() {
        return Err(LookupError::EmptyField {
            key: key.to_string(),
        });
    }
    Ok((field, lookup))
}

/// Validate a lookup against a field's category and compile it to one or
/// more leaf conditions (date-part lookups expand to a half-open range).
pub(crate) fn validate_and_build(
    meta: &ColumnModel,
    field: &str,
    column: Option<String>,
    lookup: &'static str,
    value: Value,
) -> Result<Vec<Condition>, Error> {
    if !is_allowed(meta.category, lookup) {
        return Err(LookupError::Unsupported {
            field: field.to_string(),
            lookup: lookup.to_string(),
        }
        .into());
    }

    let cond = |operator: Operator, value: Value| Condition {
        field: field.to_string(),
        column: column.clone(),
        operator,
        value,
    };
    let invalid = |reason: &str| -> Error {
        LookupValueError::new(field, lookup, reason).into()
    };

    let conditions = match lookup {
        "exact" => {
            if value.is_null() {
                vec![cond(Operator::IsNull, Value::Null)]
            } else {
                vec![cond(Operator::Eq, value)]
            }
        }
        "iexact" => match value {
            Value::Text(_) => vec![cond(Operator::ILike, value)],
            _ => return Err(invalid("expected a string value")),
        },
        "contains" | "icontains" | "startswith" | "istartswith" | "endswith" | "iendswith" => {
            let Value::Text(raw) = value else {
                return Err(invalid("expected a string value"));
            };
            let escaped = escape_pattern(&raw);
            let (operator, pattern) = match lookup {
                "contains" => (Operator::Like, format!("%{escaped}%")),
                "icontains" => (Operator::ILike, format!("%{escaped}%")),
                "startswith" => (Operator::Like, format!("{escaped}%")),
                "istartswith" => (Operator::ILike, format!("{escaped}%")),
                "endswith" => (Operator::Like, format!("%{escaped}")),
                _ => (Operator::ILike, format!("%{escaped}")),
            };
            vec![cond(operator, Value::Text(pattern))]
        }
        "gt" | "gte" | "lt" | "lte" => {
            if value.is_null() {
                return Err(invalid("comparison requires a non-null value"));
            }
            let operator = match lookup {
                "gt" => Operator::Gt,
                "gte" => Operator::Gte,
                "lt" => Operator::Lt,
                _ => Operator::Lte,
            };
            vec![cond(operator, value)]
        }
        "between" => match value {
            Value::List(items) if items.len() == 2 => {
                vec![cond(Operator::Between, Value::List(items))]
            }
            _ => return Err(invalid("expected an ordered pair of bounds")),
        },
        "in" => match value {
            Value::List(items) => vec![cond(Operator::In, Value::List(items))],
            Value::Text(_) => {
                return Err(invalid("a bare string is not a valid membership collection"));
            }
            _ => return Err(invalid("expected a finite collection of values")),
        },
        "isnull" => match value {
            Value::Bool(true) => vec![cond(Operator::IsNull, Value::Null)],
            Value::Bool(false) => vec![cond(Operator::IsNotNull, Value::Null)],
            _ => return Err(invalid("expected true or false")),
        },
        "year" => {
            let Some(year) = value.as_int() else {
                return Err(invalid("expected an integer year"));
            };
            let (start, end) = (format!("{year:04}-01-01"), format!("{:04}-01-01", year + 1));
            range_pair(&cond, start, end)
        }
        "month" => {
            let Some([year, month]) = int_pair(&value) else {
                return Err(invalid("expected a (year, month) pair"));
            };
            if !(1..=12).contains(&month) {
                return Err(invalid("month must be between 1 and 12"));
            }
            let start = format!("{year:04}-{month:02}-01");
            let end = if month == 12 {
                format!("{:04}-01-01", year + 1)
            } else {
                format!("{year:04}-{:02}-01", month + 1)
            };
            range_pair(&cond, start, end)
        }
        "day" => {
            let Some([year, month, day]) = int_triple(&value) else {
                return Err(invalid("expected a (year, month, day) triple"));
            };
            let year_i32 = i32::try_from(year).map_err(|_| invalid("year out of range"))?;
            let date = u32::try_from(month)
                .ok()
                .zip(u32::try_from(day).ok())
                .and_then(|(m, d)| NaiveDate::from_ymd_opt(year_i32, m, d))
                .ok_or_else(|| invalid("not a valid calendar date"))?;
            let end = date
                .succ_opt()
                .ok_or_else(|| invalid("date has no following day"))?;
            range_pair(
                &cond,
                date.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string(),
            )
        }
        _ => return Err(invalid("unhandled lookup")),
    };

    Ok(conditions)
}

/// Half-open range: `>= start` and `< end`, inclusive start only.
fn range_pair(
    cond: &impl Fn(Operator, Value) -> Condition,
    start: String,
    end: String,
) -> Vec<Condition> {
    vec![
        cond(Operator::Gte, Value::Text(start)),
        cond(Operator::Lt, Value::Text(end)),
    ]
}

fn int_pair(value: &Value) -> Option<[i64; 2]> {
    match value {
        Value::List(items) if items.len() == 2 => {
            Some([items[0].as_int()?, items[1].as_int()?])
        }
        _ => None,
    }
}

fn int_triple(value: &Value) -> Option<[i64; 3]> {
    match value {
        Value::List(items) if items.len() == 3 => Some([
            items[0].as_int()?,
            items[1].as_int()?,
            items[2].as_int()?,
        ]),
        _ => None,
    }
}

/// Escape interior wildcards so user text matches literally once the
/// builder wraps it in `%`/`_` pattern syntax.
fn escape_pattern(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
