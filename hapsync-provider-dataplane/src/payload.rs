//! Payload - Rule <-> Data Plane JSON conversion

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use hapsync_core::rule::{ObservedRule, Rule, Value};

const INDEX_FIELD: &str = "index";

/// v2 list response
#[derive(Debug, Deserialize)]
pub struct VersionedList {
    #[serde(rename = "_version", default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub data: Vec<Json>,
}

/// Convert a JSON field value; `null` is absence
fn to_value(json: Json) -> Option<Value> {
    match json {
        Json::Null => None,
        Json::Bool(b) => Some(Value::Bool(b)),
        Json::Number(n) => Some(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::String(n.to_string()),
        }),
        Json::String(s) => Some(Value::String(s)),
        Json::Array(items) => Some(Value::List(items.into_iter().filter_map(to_value).collect())),
        Json::Object(map) => Some(Value::Map(
            map.into_iter()
                .filter_map(|(k, v)| to_value(v).map(|v| (k, v)))
                .collect(),
        )),
    }
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::String(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => Json::Object(map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect()),
    }
}

/// Split a remote rule object into its `index` and the rule fields
pub fn rule_from_json(json: Json) -> Result<(Option<usize>, Rule), String> {
    let Json::Object(mut object) = json else {
        return Err(format!("expected a rule object, got {}", json));
    };

    let index = match object.remove(INDEX_FIELD) {
        Some(Json::Number(n)) => n
            .as_u64()
            .map(|i| i as usize)
            .ok_or_else(|| format!("invalid rule index {}", n))
            .map(Some)?,
        Some(Json::Null) | None => None,
        Some(other) => return Err(format!("invalid rule index {}", other)),
    };

    let rule = object
        .into_iter()
        .filter_map(|(name, value)| to_value(value).map(|v| (name, v)))
        .collect();

    Ok((index, rule))
}

/// Rule fields as a JSON object, with `index` set when given
pub fn rule_to_json(rule: &Rule, index: Option<usize>) -> Json {
    let mut object: Map<String, Json> = rule
        .fields()
        .iter()
        .map(|(name, value)| (name.clone(), to_json(value)))
        .collect();
    if let Some(index) = index {
        object.insert(INDEX_FIELD.to_string(), Json::from(index as u64));
    }
    Json::Object(object)
}

/// Observed rules from a list body
///
/// Either every rule carries an `index` or none does; without one, the
/// array position is the index. A mix of both is rejected. The result is
/// ordered by index.
pub fn observed_from_list(items: Vec<Json>) -> Result<Vec<ObservedRule>, String> {
    let parsed = items
        .into_iter()
        .map(rule_from_json)
        .collect::<Result<Vec<_>, String>>()?;

    let indexed = parsed.iter().filter(|(index, _)| index.is_some()).count();
    if indexed != 0 && indexed != parsed.len() {
        return Err(format!(
            "{} of {} rules carry an index",
            indexed,
            parsed.len()
        ));
    }

    let mut observed: Vec<ObservedRule> = parsed
        .into_iter()
        .enumerate()
        .map(|(position, (index, rule))| ObservedRule::new(index.unwrap_or(position), rule))
        .collect();
    observed.sort_by_key(|o| o.index);

    if observed.windows(2).any(|pair| pair[0].index == pair[1].index) {
        log::warn!("Data Plane API reported the same rule index more than once");
    }
    Ok(observed)
}
