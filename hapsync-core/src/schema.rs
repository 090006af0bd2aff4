//! Schema - Field schemas for each rule collection
//!
//! Every collection declares its fields, the field that carries the rule kind,
//! the fields that make up a rule's identity key, and the parents that may own
//! it. Validation rejects desired rules that do not fit; projection strips
//! observed fields the schema does not know about, so server-side extras never
//! show up as differences.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::rule::{Collection, ParentType, Rule, Value};

/// Field type
#[derive(Debug, Clone)]
pub enum AttributeType {
    String,
    Int,
    Bool,
    /// String restricted to a fixed set of values
    Enum(Vec<String>),
    /// List of strings or objects, passed through as-is
    List,
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
}

impl AttributeType {
    fn enumeration(values: &[&str]) -> Self {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),
            (AttributeType::List, Value::List(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|message| TypeError::ValidationFailed { message })
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name().to_string(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::List => "List".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error for a single value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Schema error for a rule
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Field '{name}': {inner}")]
    InvalidField { name: String, inner: TypeError },

    #[error("Required field '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown field '{name}'")]
    UnknownField { name: String },
}

/// Field schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Schema of one rule collection
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub collection: Collection,
    /// Field holding the rule kind (e.g., "type" or "criterion")
    pub kind_field: &'static str,
    /// Fields in declaration order
    pub attributes: Vec<AttributeSchema>,
    /// Fields that form the identity key, in key order
    pub key_fields: Vec<&'static str>,
    pub parents: Vec<ParentType>,
}

impl CollectionSchema {
    pub fn new(collection: Collection, kind_field: &'static str) -> Self {
        Self {
            collection,
            kind_field,
            attributes: Vec::new(),
            key_fields: Vec::new(),
            parents: vec![ParentType::Backend, ParentType::Frontend],
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.push(schema);
        self
    }

    pub fn attributes(mut self, schemas: impl IntoIterator<Item = AttributeSchema>) -> Self {
        self.attributes.extend(schemas);
        self
    }

    pub fn key_fields(mut self, fields: &[&'static str]) -> Self {
        self.key_fields = fields.to_vec();
        self
    }

    pub fn backend_only(mut self) -> Self {
        self.parents = vec![ParentType::Backend];
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn allows_parent(&self, parent_type: ParentType) -> bool {
        self.parents.contains(&parent_type)
    }

    /// The rule's kind, read from the collection's kind field
    pub fn kind_of<'a>(&self, rule: &'a Rule) -> Option<&'a str> {
        rule.get_str(self.kind_field)
    }

    /// Validate a desired rule against this schema
    pub fn validate(&self, rule: &Rule) -> Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();

        for attribute in &self.attributes {
            if attribute.required && rule.get(&attribute.name).is_none() {
                errors.push(SchemaError::MissingRequired {
                    name: attribute.name.clone(),
                });
            }
        }

        for (name, value) in rule.fields() {
            match self.get(name) {
                Some(attribute) => {
                    if let Err(inner) = attribute.attr_type.validate(value) {
                        errors.push(SchemaError::InvalidField {
                            name: name.clone(),
                            inner,
                        });
                    }
                }
                None => errors.push(SchemaError::UnknownField { name: name.clone() }),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Keep only the fields this schema declares
    pub fn project(&self, rule: &Rule) -> Rule {
        rule.fields()
            .iter()
            .filter(|(name, _)| self.get(name).is_some())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

static SCHEMAS: LazyLock<HashMap<Collection, CollectionSchema>> = LazyLock::new(|| {
    all_schemas()
        .into_iter()
        .map(|schema| (schema.collection, schema))
        .collect()
});

/// Schema for a collection
pub fn schema_for(collection: Collection) -> &'static CollectionSchema {
    // Every Collection variant has an entry in all_schemas()
    &SCHEMAS[&collection]
}

/// Schemas for every supported collection
pub fn all_schemas() -> Vec<CollectionSchema> {
    vec![
        http_request_rules(),
        http_response_rules(),
        tcp_request_rules(),
        tcp_response_rules(),
        acls(),
        http_checks(),
        tcp_checks(),
    ]
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// HTTP status code (100-599)
    pub fn status_code() -> AttributeType {
        AttributeType::Custom {
            name: "StatusCode".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if (100..=599).contains(n) => Ok(()),
                Value::Int(n) => Err(format!("HTTP status {} is out of range 100-599", n)),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// Redirect status code
    pub fn redirect_code() -> AttributeType {
        AttributeType::Custom {
            name: "RedirectCode".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(301 | 302 | 303 | 307 | 308) => Ok(()),
                Value::Int(n) => Err(format!(
                    "Redirect code {} is not one of 301, 302, 303, 307, 308",
                    n
                )),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// TCP port (1-65535)
    pub fn port() -> AttributeType {
        AttributeType::Custom {
            name: "Port".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if (1..=65535).contains(n) => Ok(()),
                Value::Int(n) => Err(format!("Port {} is out of range 1-65535", n)),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// Non-negative integer
    pub fn non_negative_int() -> AttributeType {
        AttributeType::Custom {
            name: "NonNegativeInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if *n >= 0 => Ok(()),
                Value::Int(_) => Err("Value must not be negative".to_string()),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    pub fn condition() -> AttributeType {
        AttributeType::enumeration(&["if", "unless"])
    }

    pub fn var_scope() -> AttributeType {
        AttributeType::enumeration(&["proc", "sess", "txn", "req", "res", "check"])
    }

    pub fn log_level() -> AttributeType {
        AttributeType::enumeration(&[
            "emerg", "alert", "crit", "err", "warning", "notice", "info", "debug", "silent",
        ])
    }
}

fn string(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
}

fn int(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, types::non_negative_int())
}

fn boolean(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::Bool)
}

fn kind(name: &str, kinds: &[&str]) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::enumeration(kinds)).required()
}

fn condition_fields() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("cond", types::condition()),
        string("cond_test"),
    ]
}

fn header_fields() -> Vec<AttributeSchema> {
    vec![
        string("hdr_name"),
        string("hdr_format"),
        string("hdr_match"),
        string("hdr_method"),
    ]
}

fn redirect_fields() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new(
            "redir_type",
            AttributeType::enumeration(&["location", "prefix", "scheme"]),
        ),
        string("redir_value"),
        AttributeSchema::new("redir_code", types::redirect_code()),
        string("redir_option"),
    ]
}

fn variable_fields() -> Vec<AttributeSchema> {
    vec![
        string("var_name"),
        AttributeSchema::new("var_scope", types::var_scope()),
        string("var_expr"),
        string("var_format"),
    ]
}

fn return_fields() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("deny_status", types::status_code()),
        AttributeSchema::new("return_status_code", types::status_code()),
        string("return_content"),
        string("return_content_type"),
        AttributeSchema::new(
            "return_content_format",
            AttributeType::enumeration(&[
                "default-errorfile",
                "errorfile",
                "errorfiles",
                "file",
                "lf-file",
                "string",
                "lf-string",
            ]),
        ),
        AttributeSchema::new("return_hdrs", AttributeType::List),
    ]
}

fn map_fields() -> Vec<AttributeSchema> {
    vec![
        string("acl_file"),
        string("acl_keyfmt"),
        string("map_file"),
        string("map_keyfmt"),
        string("map_valuefmt"),
    ]
}

fn tuning_fields() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("log_level", types::log_level()),
        int("nice_value"),
        string("mark_value"),
        string("tos_value"),
        string("timeout"),
        AttributeSchema::new(
            "timeout_type",
            AttributeType::enumeration(&["server", "tunnel", "client"]),
        ),
        string("lua_action"),
        string("lua_params"),
        string("spoe_engine"),
        string("spoe_group"),
        string("bandwidth_limit_name"),
        string("bandwidth_limit_limit"),
        string("bandwidth_limit_period"),
    ]
}

fn tracking_fields() -> Vec<AttributeSchema> {
    vec![
        string("track_sc_key"),
        string("track_sc_table"),
        int("track_sc_stick_counter"),
        int("sc_id"),
        int("sc_idx"),
        string("sc_expr"),
        string("capture_sample"),
        int("capture_len"),
        int("capture_id"),
    ]
}

fn check_endpoint_fields() -> Vec<AttributeSchema> {
    vec![
        string("addr"),
        AttributeSchema::new("port", types::port()),
        string("port_string"),
        string("sni"),
        string("alpn"),
        boolean("ssl"),
        boolean("send_proxy"),
        boolean("via_socks4"),
        boolean("linger"),
        string("proto"),
        boolean("default"),
    ]
}

fn check_outcome_fields() -> Vec<AttributeSchema> {
    vec![
        boolean("exclamation_mark"),
        string("pattern"),
        string("check_comment"),
        string("error_status"),
        string("ok_status"),
        string("tout_status"),
        string("on_error"),
        string("on_success"),
        string("status-code"),
        int("min_recv"),
    ]
}

const HTTP_REQUEST_KINDS: &[&str] = &[
    "add-acl",
    "add-header",
    "allow",
    "auth",
    "cache-use",
    "capture",
    "del-acl",
    "del-header",
    "del-map",
    "deny",
    "disable-l7-retry",
    "do-resolve",
    "early-hint",
    "lua",
    "normalize-uri",
    "redirect",
    "reject",
    "replace-header",
    "replace-path",
    "replace-pathq",
    "replace-uri",
    "replace-value",
    "return",
    "sc-inc-gpc0",
    "sc-inc-gpc1",
    "sc-set-gpt0",
    "send-spoe-group",
    "set-bandwidth-limit",
    "set-dst",
    "set-dst-port",
    "set-header",
    "set-log-level",
    "set-map",
    "set-mark",
    "set-method",
    "set-nice",
    "set-path",
    "set-pathq",
    "set-priority-class",
    "set-priority-offset",
    "set-query",
    "set-src",
    "set-src-port",
    "set-timeout",
    "set-tos",
    "set-uri",
    "set-var",
    "set-var-fmt",
    "silent-drop",
    "strict-mode",
    "tarpit",
    "track-sc0",
    "track-sc1",
    "track-sc2",
    "unset-var",
    "use-service",
    "wait-for-body",
    "wait-for-handshake",
];

const HTTP_RESPONSE_KINDS: &[&str] = &[
    "add-acl",
    "add-header",
    "allow",
    "cache-store",
    "capture",
    "del-acl",
    "del-header",
    "del-map",
    "deny",
    "lua",
    "redirect",
    "replace-header",
    "replace-value",
    "return",
    "sc-inc-gpc0",
    "sc-inc-gpc1",
    "sc-set-gpt0",
    "send-spoe-group",
    "set-bandwidth-limit",
    "set-header",
    "set-log-level",
    "set-map",
    "set-mark",
    "set-nice",
    "set-status",
    "set-timeout",
    "set-tos",
    "set-var",
    "set-var-fmt",
    "silent-drop",
    "strict-mode",
    "track-sc0",
    "track-sc1",
    "track-sc2",
    "unset-var",
    "wait-for-body",
];

const TCP_REQUEST_ACTIONS: &[&str] = &[
    "accept",
    "attach-srv",
    "capture",
    "do-resolve",
    "expect-netscaler-cip",
    "expect-proxy",
    "lua",
    "reject",
    "sc-add-gpc",
    "sc-inc-gpc",
    "sc-inc-gpc0",
    "sc-inc-gpc1",
    "sc-set-gpt",
    "sc-set-gpt0",
    "send-spoe-group",
    "set-bandwidth-limit",
    "set-dst",
    "set-dst-port",
    "set-log-level",
    "set-mark",
    "set-nice",
    "set-priority-class",
    "set-priority-offset",
    "set-src",
    "set-src-port",
    "set-tos",
    "set-var",
    "set-var-fmt",
    "silent-drop",
    "switch-mode",
    "track-sc0",
    "track-sc1",
    "track-sc2",
    "unset-var",
    "use-service",
];

const TCP_RESPONSE_ACTIONS: &[&str] = &[
    "accept",
    "close",
    "lua",
    "reject",
    "sc-add-gpc",
    "sc-inc-gpc",
    "sc-inc-gpc0",
    "sc-inc-gpc1",
    "sc-set-gpt",
    "sc-set-gpt0",
    "send-spoe-group",
    "set-bandwidth-limit",
    "set-fc-mark",
    "set-fc-tos",
    "set-log-level",
    "set-mark",
    "set-nice",
    "set-tos",
    "set-var",
    "set-var-fmt",
    "silent-drop",
    "unset-var",
];

fn http_request_rules() -> CollectionSchema {
    CollectionSchema::new(Collection::HttpRequestRules, "type")
        .attribute(kind("type", HTTP_REQUEST_KINDS))
        .attributes(condition_fields())
        .attributes(header_fields())
        .attributes(redirect_fields())
        .attributes(variable_fields())
        .attributes(return_fields())
        .attributes(map_fields())
        .attributes(tuning_fields())
        .attributes(tracking_fields())
        .attributes([
            string("path_match"),
            string("path_fmt"),
            string("uri_match"),
            string("uri-fmt"),
            string("query-fmt"),
            string("method_fmt"),
            string("auth_realm"),
            string("service_name"),
            string("cache_name"),
            string("normalizer"),
            boolean("normalizer_full"),
            boolean("normalizer_strict"),
            AttributeSchema::new("strict_mode", AttributeType::enumeration(&["on", "off"])),
            int("wait_time"),
            int("wait_at_least"),
            string("expr"),
        ])
        .key_fields(&[
            "type",
            "cond",
            "cond_test",
            "hdr_name",
            "hdr_format",
            "hdr_match",
            "redir_type",
            "redir_value",
            "var_name",
            "var_scope",
            "var_expr",
            "path_fmt",
        ])
}

fn http_response_rules() -> CollectionSchema {
    CollectionSchema::new(Collection::HttpResponseRules, "type")
        .attribute(kind("type", HTTP_RESPONSE_KINDS))
        .attributes(condition_fields())
        .attributes(header_fields())
        .attributes(redirect_fields())
        .attributes(variable_fields())
        .attributes(return_fields())
        .attributes(map_fields())
        .attributes(tuning_fields())
        .attributes(tracking_fields())
        .attributes([
            AttributeSchema::new("status", types::status_code()),
            string("status_reason"),
            string("cache_name"),
            AttributeSchema::new("strict_mode", AttributeType::enumeration(&["on", "off"])),
            int("wait_time"),
            int("wait_at_least"),
        ])
        .key_fields(&[
            "type",
            "cond",
            "cond_test",
            "hdr_name",
            "hdr_format",
            "hdr_match",
            "redir_type",
            "redir_value",
            "status",
            "var_name",
            "var_scope",
            "var_expr",
        ])
}

fn tcp_request_rules() -> CollectionSchema {
    CollectionSchema::new(Collection::TcpRequestRules, "type")
        .attribute(kind(
            "type",
            &["connection", "content", "inspect-delay", "session"],
        ))
        .attribute(AttributeSchema::new(
            "action",
            AttributeType::enumeration(TCP_REQUEST_ACTIONS),
        ))
        .attributes(condition_fields())
        .attributes(variable_fields())
        .attributes(tuning_fields())
        .attributes([
            string("expr"),
            int("capture_len"),
            string("capture_sample"),
            string("track_key"),
            string("track_table"),
            int("track_stick_counter"),
            int("sc_id"),
            int("sc_idx"),
            string("sc_inc_id"),
            string("gpt_value"),
            string("service_name"),
            string("server_name"),
            string("resolve_var"),
            string("resolve_resolvers"),
            string("resolve_protocol"),
            string("priority_type"),
            string("switch_mode_proto"),
        ])
        .key_fields(&[
            "type",
            "action",
            "cond",
            "cond_test",
            "expr",
            "var_name",
            "var_scope",
            "track_key",
        ])
}

fn tcp_response_rules() -> CollectionSchema {
    CollectionSchema::new(Collection::TcpResponseRules, "type")
        .attribute(kind("type", &["content", "inspect-delay"]))
        .attribute(AttributeSchema::new(
            "action",
            AttributeType::enumeration(TCP_RESPONSE_ACTIONS),
        ))
        .attributes(condition_fields())
        .attributes(variable_fields())
        .attributes(tuning_fields())
        .attributes([
            string("expr"),
            int("sc_id"),
            int("sc_idx"),
            string("sc_expr"),
        ])
        .key_fields(&["type", "action", "cond", "cond_test", "expr", "var_name"])
        .backend_only()
}

fn acls() -> CollectionSchema {
    CollectionSchema::new(Collection::Acls, "criterion")
        .attribute(string("acl_name").required())
        .attribute(string("criterion").required())
        .attribute(string("value"))
        .key_fields(&["acl_name", "criterion", "value"])
}

fn http_checks() -> CollectionSchema {
    CollectionSchema::new(Collection::HttpChecks, "type")
        .attribute(kind(
            "type",
            &[
                "comment",
                "connect",
                "disable-on-404",
                "expect",
                "send",
                "send-state",
                "set-var",
                "set-var-fmt",
                "unset-var",
            ],
        ))
        .attribute(AttributeSchema::new(
            "method",
            AttributeType::enumeration(&[
                "HEAD", "PUT", "POST", "GET", "TRACE", "PATCH", "DELETE", "CONNECT", "OPTIONS",
            ]),
        ))
        .attributes([
            string("uri"),
            string("uri_log_format"),
            string("version"),
            AttributeSchema::new("headers", AttributeType::List),
            string("body"),
            string("body_log_format"),
            AttributeSchema::new(
                "match",
                AttributeType::enumeration(&[
                    "status", "rstatus", "hdr", "fhdr", "string", "rstring",
                ]),
            ),
        ])
        .attributes(check_outcome_fields())
        .attributes(check_endpoint_fields())
        .attributes(variable_fields())
        .key_fields(&[
            "type", "method", "uri", "match", "pattern", "addr", "port", "var_name",
        ])
        .backend_only()
}

fn tcp_checks() -> CollectionSchema {
    CollectionSchema::new(Collection::TcpChecks, "action")
        .attribute(kind(
            "action",
            &[
                "comment",
                "connect",
                "expect",
                "send",
                "send-lf",
                "send-binary",
                "send-binary-lf",
                "set-var",
                "set-var-fmt",
                "unset-var",
            ],
        ))
        .attributes([
            AttributeSchema::new(
                "match",
                AttributeType::enumeration(&[
                    "string",
                    "rstring",
                    "string-lf",
                    "binary",
                    "rbinary",
                    "binary-lf",
                ]),
            ),
            string("data"),
            string("fmt"),
            string("hex_string"),
            string("hex_fmt"),
            string("log_message"),
        ])
        .attributes(check_outcome_fields())
        .attributes(check_endpoint_fields())
        .attributes(variable_fields())
        .key_fields(&[
            "action", "match", "pattern", "data", "fmt", "addr", "port", "var_name",
        ])
        .backend_only()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::enumeration(&["if", "unless"]);
        assert!(t.validate(&Value::from("if")).is_ok());
        assert!(t.validate(&Value::from("when")).is_err());
        assert!(t.validate(&Value::Int(1)).is_err());
    }

    #[test]
    fn validate_status_code() {
        let t = types::status_code();
        assert!(t.validate(&Value::Int(403)).is_ok());
        assert!(t.validate(&Value::Int(99)).is_err());
        assert!(t.validate(&Value::Int(600)).is_err());
        assert!(matches!(
            t.validate(&Value::from("403")),
            Err(TypeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn every_collection_has_a_schema() {
        for collection in Collection::ALL {
            let schema = schema_for(collection);
            assert_eq!(schema.collection, collection);
            assert!(schema.get(schema.kind_field).is_some());
            for field in &schema.key_fields {
                assert!(
                    schema.get(field).is_some(),
                    "{} key field '{}' is not declared",
                    collection,
                    field
                );
            }
        }
    }

    #[test]
    fn valid_http_request_rule() {
        let schema = schema_for(Collection::HttpRequestRules);
        let rule = Rule::of_type("set-header")
            .with("hdr_name", "X-Foo")
            .with("hdr_format", "bar")
            .with("cond", "if")
            .with("cond_test", "{ ssl_fc }");

        assert!(schema.validate(&rule).is_ok());
    }

    #[test]
    fn rejects_unknown_field_and_bad_kind() {
        let schema = schema_for(Collection::HttpRequestRules);
        let rule = Rule::of_type("teleport").with("hdr_nme", "X-Foo");

        let errors = schema.validate(&rule).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&SchemaError::UnknownField {
            name: "hdr_nme".to_string()
        }));
        assert!(errors.iter().any(|e| matches!(
            e,
            SchemaError::InvalidField { name, inner: TypeError::InvalidEnumVariant { .. } } if name == "type"
        )));
    }

    #[test]
    fn missing_kind_field() {
        let schema = schema_for(Collection::Acls);
        let rule = Rule::new().with("acl_name", "is_api");

        let errors = schema.validate(&rule).unwrap_err();
        assert_eq!(
            errors,
            vec![SchemaError::MissingRequired {
                name: "criterion".to_string()
            }]
        );
    }

    #[test]
    fn redirect_code_must_be_a_redirect() {
        let schema = schema_for(Collection::HttpRequestRules);
        let ok = Rule::of_type("redirect")
            .with("redir_type", "scheme")
            .with("redir_value", "https")
            .with("redir_code", 301i64);
        let bad = ok.clone().with("redir_code", 200i64);

        assert!(schema.validate(&ok).is_ok());
        assert!(schema.validate(&bad).is_err());
    }

    #[test]
    fn project_drops_unknown_fields() {
        let schema = schema_for(Collection::Acls);
        let observed = Rule::new()
            .with("acl_name", "is_api")
            .with("criterion", "path_beg")
            .with("value", "/api")
            .with("metadata", "server-side");

        let projected = schema.project(&observed);
        assert_eq!(projected.get("metadata"), None);
        assert_eq!(projected.fields().len(), 3);
    }

    #[test]
    fn checks_belong_to_backends() {
        assert!(schema_for(Collection::HttpChecks).allows_parent(ParentType::Backend));
        assert!(!schema_for(Collection::HttpChecks).allows_parent(ParentType::Frontend));
        assert!(schema_for(Collection::HttpRequestRules).allows_parent(ParentType::Frontend));
    }

    #[test]
    fn kind_of_uses_kind_field() {
        let check = Rule::new().with("action", "connect").with("port", 8080i64);
        assert_eq!(schema_for(Collection::TcpChecks).kind_of(&check), Some("connect"));
        assert_eq!(schema_for(Collection::HttpChecks).kind_of(&check), None);
    }
}
