//! Rule - Ordered configuration entries and the parents that own them

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::transaction::TransactionId;

/// Type of the configuration section that owns rule collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentType {
    Backend,
    Frontend,
}

impl ParentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentType::Backend => "backend",
            ParentType::Frontend => "frontend",
        }
    }

    /// Path segment used by the v3 API (e.g., "backends")
    pub fn plural(&self) -> &'static str {
        match self {
            ParentType::Backend => "backends",
            ParentType::Frontend => "frontends",
        }
    }
}

impl fmt::Display for ParentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backend" => Ok(ParentType::Backend),
            "frontend" => Ok(ParentType::Frontend),
            other => Err(format!("unknown parent type '{}'", other)),
        }
    }
}

/// Identity of a parent resource (a backend or frontend)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParentId {
    pub parent_type: ParentType,
    pub name: String,
}

impl ParentId {
    pub fn new(parent_type: ParentType, name: impl Into<String>) -> Self {
        Self {
            parent_type,
            name: name.into(),
        }
    }

    pub fn backend(name: impl Into<String>) -> Self {
        Self::new(ParentType::Backend, name)
    }

    pub fn frontend(name: impl Into<String>) -> Self {
        Self::new(ParentType::Frontend, name)
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent_type, self.name)
    }
}

/// Ordered rule collections a parent can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    HttpRequestRules,
    HttpResponseRules,
    TcpRequestRules,
    TcpResponseRules,
    Acls,
    HttpChecks,
    TcpChecks,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Acls,
        Collection::HttpRequestRules,
        Collection::HttpResponseRules,
        Collection::TcpRequestRules,
        Collection::TcpResponseRules,
        Collection::HttpChecks,
        Collection::TcpChecks,
    ];

    /// Name used in documents and API paths (e.g., "http_request_rules")
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::HttpRequestRules => "http_request_rules",
            Collection::HttpResponseRules => "http_response_rules",
            Collection::TcpRequestRules => "tcp_request_rules",
            Collection::TcpResponseRules => "tcp_response_rules",
            Collection::Acls => "acls",
            Collection::HttpChecks => "http_checks",
            Collection::TcpChecks => "tcp_checks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independently reconciled collection: `(parent_type, parent_name, collection)`
///
/// The transaction, when present, is passed through to the client untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionScope {
    pub parent: ParentId,
    pub collection: Collection,
    pub transaction: Option<TransactionId>,
}

impl CollectionScope {
    pub fn new(parent: ParentId, collection: Collection) -> Self {
        Self {
            parent,
            collection,
            transaction: None,
        }
    }

    pub fn with_transaction(mut self, transaction: TransactionId) -> Self {
        self.transaction = Some(transaction);
        self
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.parent, self.collection)
    }
}

/// Field value of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical text form used in identity keys and plan output
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", inner.join(","))
            }
            Value::Map(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k, v.render()))
                    .collect();
                format!("{{{}}}", inner.join(","))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A single entry of an ordered rule collection
///
/// Rules are sparse: a field that is not set is simply not in the map, and
/// JSON `null` deserializes to absence. The position of a rule is its index
/// in the owning list, never a field.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Rule {
    fields: BTreeMap<String, Value>,
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Option<Value>>::deserialize(deserializer)?;
        let fields = raw
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        Ok(Self { fields })
    }
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule whose `type` field is set (the kind field of most collections)
    pub fn of_type(kind: impl Into<String>) -> Self {
        Self::new().with("type", Value::String(kind.into()))
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Compact single-line form (e.g., `type=set-header hdr_name=X-Foo`)
    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.render()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<(String, Value)> for Rule {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A rule as read from the remote API, tagged with the index the API assigned
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedRule {
    /// Remote index at read time; not stable across writes
    pub index: usize,
    pub rule: Rule,
}

impl ObservedRule {
    pub fn new(index: usize, rule: Rule) -> Self {
        Self { index, rule }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fields_are_absent() {
        let rule: Rule =
            serde_json::from_str(r#"{"type": "deny", "cond": null, "deny_status": 403}"#).unwrap();

        assert_eq!(rule.get_str("type"), Some("deny"));
        assert_eq!(rule.get("cond"), None);
        assert_eq!(rule.get("deny_status"), Some(&Value::Int(403)));
        assert_eq!(rule.fields().len(), 2);
    }

    #[test]
    fn rule_serializes_as_flat_object() {
        let rule = Rule::of_type("set-header")
            .with("hdr_name", "X-Foo")
            .with("hdr_format", "bar");

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "set-header", "hdr_name": "X-Foo", "hdr_format": "bar"})
        );
    }

    #[test]
    fn value_render_is_canonical() {
        assert_eq!(Value::Bool(true).render(), "true");
        assert_eq!(Value::Int(42).render(), "42");
        assert_eq!(
            Value::List(vec![Value::from("a"), Value::Int(1)]).render(),
            "[a,1]"
        );
    }

    #[test]
    fn collection_names_match_api_paths() {
        let json = serde_json::to_string(&Collection::HttpRequestRules).unwrap();
        assert_eq!(json, "\"http_request_rules\"");
        let acls: Collection = serde_json::from_str("\"acls\"").unwrap();
        assert_eq!(acls, Collection::Acls);
        for collection in Collection::ALL {
            let parsed: Collection =
                serde_json::from_value(serde_json::Value::String(collection.to_string())).unwrap();
            assert_eq!(parsed, collection);
        }
    }

    #[test]
    fn scope_display() {
        let scope = CollectionScope::new(ParentId::backend("web"), Collection::Acls);
        assert_eq!(scope.to_string(), "backend/web acls");
        assert_eq!("frontend".parse::<ParentType>(), Ok(ParentType::Frontend));
        assert!("listen".parse::<ParentType>().is_err());
    }
}
