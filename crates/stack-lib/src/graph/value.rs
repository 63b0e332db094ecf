//! Property values and intrinsic functions
//!
//! A `Value` is either a literal known at synthesis time or a token the
//! provisioning engine resolves later (references, attributes, joins).

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value as Json};

/// Pseudo parameters supplied by the engine for every stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    AccountId,
    Region,
    Partition,
    UrlSuffix,
    StackName,
}

impl Pseudo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Region => "AWS::Region",
            Pseudo::Partition => "AWS::Partition",
            Pseudo::UrlSuffix => "AWS::URLSuffix",
            Pseudo::StackName => "AWS::StackName",
        }
    }
}

/// A template property value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// `Ref` to a resource or pseudo parameter
    Ref(String),
    /// `Fn::GetAtt` on a resource
    GetAtt(String, String),
    /// `Fn::Join` with a separator
    Join(String, Vec<Value>),
    /// `Fn::Select` an index out of a list value
    Select(u32, Box<Value>),
    /// `Fn::GetAZs` for the current region
    GetAzs,
    /// `Fn::Sub` template string
    Sub(String),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Value::Ref(logical_id.into())
    }

    pub fn pseudo(pseudo: Pseudo) -> Self {
        Value::Ref(pseudo.as_str().to_string())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Value::GetAtt(logical_id.into(), attribute.into())
    }

    /// Join parts with a separator, collapsing to a literal when every
    /// part is already known.
    pub fn join(separator: impl Into<String>, parts: Vec<Value>) -> Self {
        let separator = separator.into();
        let literals: Option<Vec<&str>> = parts.iter().map(Value::as_literal).collect();
        match literals {
            Some(literals) => Value::String(literals.join(&separator)),
            None => {
                let merged = merge_adjacent_literals(&separator, parts);
                Value::Join(separator, merged)
            }
        }
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// ARN of an AWS managed IAM policy in the current partition
    pub fn managed_policy_arn(name: &str) -> Self {
        Value::join(
            "",
            vec![
                Value::str("arn:"),
                Value::pseudo(Pseudo::Partition),
                Value::str(format!(":iam::aws:policy/{}", name)),
            ],
        )
    }

    /// Dynamic reference to one JSON field of a managed secret
    pub fn secret_field(secret_id: &str, field: &str) -> Self {
        Value::join(
            "",
            vec![
                Value::str("{{resolve:secretsmanager:"),
                Value::reference(secret_id),
                Value::str(format!(":SecretString:{}::}}}}", field)),
            ],
        )
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.as_literal().is_some()
    }

    /// Resolve to a concrete string, asking `lookup` for every token.
    ///
    /// Returns `None` if any token cannot be resolved.
    pub fn resolve(&self, lookup: &dyn Fn(&Value) -> Option<String>) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::Join(separator, parts) => {
                let resolved: Option<Vec<String>> =
                    parts.iter().map(|part| part.resolve(lookup)).collect();
                resolved.map(|parts| parts.join(separator))
            }
            other => lookup(other),
        }
    }

    /// Logical ids of resources this value refers to.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Value::Ref(id) if !id.starts_with("AWS::") => out.push(id),
            Value::GetAtt(id, _) => out.push(id),
            Value::List(items) | Value::Join(_, items) => {
                items.iter().for_each(|v| v.collect_references(out))
            }
            Value::Map(entries) => entries.values().for_each(|v| v.collect_references(out)),
            Value::Select(_, inner) => inner.collect_references(out),
            _ => {}
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::String(s) => Json::String(s.clone()),
            Value::Number(n) => json!(n),
            Value::Bool(b) => Json::Bool(*b),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                Json::Object(map)
            }
            Value::Ref(id) => json!({ "Ref": id }),
            Value::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id, attr] }),
            Value::Join(sep, parts) => {
                let parts: Vec<Json> = parts.iter().map(Value::to_json).collect();
                json!({ "Fn::Join": [sep, parts] })
            }
            Value::Select(index, inner) => json!({ "Fn::Select": [index, inner.to_json()] }),
            Value::GetAzs => json!({ "Fn::GetAZs": "" }),
            Value::Sub(template) => json!({ "Fn::Sub": template }),
        }
    }
}

fn merge_adjacent_literals(separator: &str, parts: Vec<Value>) -> Vec<Value> {
    // Only safe without a separator; otherwise part boundaries carry meaning.
    if !separator.is_empty() {
        return parts;
    }
    let mut merged: Vec<Value> = Vec::with_capacity(parts.len());
    for part in parts {
        match (merged.last_mut(), part) {
            (Some(Value::String(prev)), Value::String(next)) => prev.push_str(&next),
            (_, part) => merged.push(part),
        }
    }
    merged
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Number(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as i64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_collapses_literals() {
        let joined = Value::join(",", vec!["subnet-a".into(), "subnet-b".into()]);
        assert_eq!(joined, Value::str("subnet-a,subnet-b"));
    }

    #[test]
    fn test_join_keeps_tokens() {
        let joined = Value::join(
            "",
            vec![
                "db+".into(),
                "postgresql://".into(),
                Value::get_att("Db", "Endpoint.Address"),
            ],
        );
        assert_eq!(
            joined,
            Value::Join(
                String::new(),
                vec![
                    Value::str("db+postgresql://"),
                    Value::get_att("Db", "Endpoint.Address")
                ]
            )
        );
    }

    #[test]
    fn test_resolve_with_lookup() {
        let value = Value::join(
            ",",
            vec![Value::reference("SubnetA"), Value::reference("SubnetB")],
        );
        let resolved = value.resolve(&|token| match token {
            Value::Ref(id) => Some(id.to_lowercase()),
            _ => None,
        });
        assert_eq!(resolved.as_deref(), Some("subneta,subnetb"));

        let unresolved = Value::get_att("Db", "Endpoint.Address").resolve(&|_| None);
        assert!(unresolved.is_none());
    }

    #[test]
    fn test_references_skip_pseudo_parameters() {
        let value = Value::managed_policy_arn("AmazonSQSFullAccess");
        assert!(value.references().is_empty());

        let value = Value::List(vec![
            Value::reference("Vpc"),
            Value::get_att("Db", "Endpoint.Port"),
        ]);
        assert_eq!(value.references(), vec!["Vpc", "Db"]);
    }

    #[test]
    fn test_intrinsic_json_shapes() {
        assert_eq!(Value::reference("Vpc").to_json(), json!({ "Ref": "Vpc" }));
        assert_eq!(
            Value::Select(1, Box::new(Value::GetAzs)).to_json(),
            json!({ "Fn::Select": [1, { "Fn::GetAZs": "" }] })
        );
        assert_eq!(
            Value::secret_field("Secret", "password").to_json(),
            json!({ "Fn::Join": ["", [
                "{{resolve:secretsmanager:",
                { "Ref": "Secret" },
                ":SecretString:password::}}"
            ]] })
        );
    }
}
