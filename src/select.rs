// src/select.rs

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::error::{Result, RetailError};
use crate::index::Index;
use crate::record::{Metric, Record, Sector};

pub(crate) static STATE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("state code pattern should compile"));

/// Typed constraints; `None` leaves that dimension unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub state: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub sector: Option<Sector>,
    pub metric: Option<Metric>,
}

impl Selection {
    /// Coerce `field -> value` pairs. Field names are matched case-insensitively;
    /// all pairs must hold at once.
    pub fn parse<I, K, V>(constraints: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut sel = Selection::default();
        for (field, value) in constraints {
            let (field, value) = (field.as_ref().trim(), value.as_ref().trim());
            let repeated = match field.to_ascii_lowercase().as_str() {
                "state" => sel.state.replace(coerce_state(field, value)?).is_some(),
                "year" => sel.year.replace(coerce_year(field, value)?).is_some(),
                "month" => sel.month.replace(coerce_month(field, value)?).is_some(),
                "sector" => {
                    if value.is_empty() {
                        return Err(RetailError::selection(field, value, "empty sector"));
                    }
                    sel.sector.replace(Sector::parse(value)).is_some()
                }
                "metric" | "value" => {
                    if value.is_empty() {
                        return Err(RetailError::selection(field, value, "empty metric"));
                    }
                    sel.metric.replace(Metric::parse(value)).is_some()
                }
                _ => return Err(RetailError::selection(field, value, "unrecognized field")),
            };
            if repeated {
                return Err(RetailError::selection(field, value, "field given more than once"));
            }
        }
        Ok(sel)
    }

    pub fn is_empty(&self) -> bool {
        *self == Selection::default()
    }

    /// Filters that the index does not resolve itself. Sector and metric
    /// names compare case-insensitively, unlisted names included.
    fn keeps(&self, r: &Record) -> bool {
        self.month.map_or(true, |m| r.month == m)
            && self
                .sector
                .as_ref()
                .map_or(true, |s| s.as_str().eq_ignore_ascii_case(r.sector.as_str()))
            && self
                .metric
                .as_ref()
                .map_or(true, |m| m.as_str().eq_ignore_ascii_case(r.metric.as_str()))
    }

    /// Resolve against `index`. No match is an empty vector.
    pub fn apply<'a>(&self, index: &'a Index) -> Vec<&'a Record> {
        index
            .lookup(self.state.as_deref(), self.year)
            .into_iter()
            .filter(|r| self.keeps(r))
            .collect()
    }
}

fn coerce_state(field: &str, value: &str) -> Result<String> {
    let code = value.to_ascii_uppercase();
    if STATE_CODE.is_match(&code) {
        Ok(code)
    } else {
        Err(RetailError::selection(field, value, "expected a 2-letter state code"))
    }
}

fn coerce_year(field: &str, value: &str) -> Result<i32> {
    value
        .parse()
        .map_err(|_| RetailError::selection(field, value, "expected an integer year"))
}

fn coerce_month(field: &str, value: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(m),
        _ => Err(RetailError::selection(field, value, "expected a month number 1-12")),
    }
}

/// Parse and apply `constraints` in one step. Malformed constraints fail
/// before the index is touched.
#[instrument(level = "debug", skip_all)]
pub fn select<'a, I, K, V>(index: &'a Index, constraints: I) -> Result<Vec<&'a Record>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sel = Selection::parse(constraints)?;
    let out = sel.apply(index);
    debug!(?sel, selected = out.len(), "select");
    Ok(out)
}

/// Split the command-line form `State:CA,Year:2020` into pairs.
pub fn parse_select(text: &str) -> Result<Vec<(String, String)>> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once(':') {
            Some((field, value)) => Ok((field.trim().to_string(), value.trim().to_string())),
            None => Err(RetailError::selection(item, "", "expected Field:Value")),
        })
        .collect()
}
