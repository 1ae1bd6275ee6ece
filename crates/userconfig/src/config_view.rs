//! What the user literally wrote in their configuration.
//!
//! The expander never takes final values from here (those come from the
//! [`MaterializedStore`](crate::store::MaterializedStore), which also knows remote and computed
//! values). It only asks whether something was declared at a path, and which elements a declared
//! container holds.
use indexmap::IndexMap;
use serde_json::Value;

use crate::path::{FieldPath, Segment};

/// How much the user declared at a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// Never written.
    Absent,

    /// Written as an explicit null, or as a sequence without elements.
    NullOrEmpty,

    Present,
}

/// Read-only access to the declared configuration.
pub trait ConfigView {
    fn presence(&self, path: &FieldPath) -> Presence;

    /// Returns the declared elements of the container at `path`.
    ///
    /// Returns [`None`] unless a sequence was declared there. An empty slice means the user
    /// explicitly declared an empty sequence, which is different from not declaring one.
    fn raw_elements(&self, path: &FieldPath) -> Option<&[ConfigValue]>;
}

/// A node of the declared configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConfigValue {
    #[default]
    Absent,
    Null,
    Scalar(Value),
    Sequence(Vec<ConfigValue>),
    Object(IndexMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn presence(&self) -> Presence {
        match self {
            Self::Absent => Presence::Absent,
            Self::Null => Presence::NullOrEmpty,
            Self::Sequence(elements) if elements.is_empty() => Presence::NullOrEmpty,
            Self::Scalar(_) | Self::Sequence(_) | Self::Object(_) => Presence::Present,
        }
    }

    /// Returns the node addressed by `path`, relative to `self`.
    pub fn lookup(&self, path: &FieldPath) -> Option<&ConfigValue> {
        path.segments()
            .iter()
            .try_fold(self, |value, segment| match (value, segment) {
                (Self::Object(fields), Segment::Field(name)) => fields.get(name),
                (Self::Sequence(elements), Segment::Index(index)) => elements.get(*index),
                _ => None,
            })
    }

    /// The text a set element hashes to: strings verbatim, numbers in their canonical decimal
    /// form, so that `1` and `1.0` hash alike.
    pub fn hash_key(&self) -> Option<String> {
        match self {
            Self::Scalar(value) => scalar_hash_key(value),
            Self::Absent
            | Self::Null
            | Self::Sequence(_)
            | Self::Object(_) => None,
        }
    }
}

/// See [`ConfigValue::hash_key`].
pub(crate) fn scalar_hash_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(number) => match number.as_i64() {
            Some(int) => Some(int.to_string()),
            None => number.as_f64().map(|float| float.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Self::Scalar(value),
            Value::Array(elements) => {
                Self::Sequence(elements.into_iter().map(Self::from).collect())
            }
            Value::Object(fields) => Self::Object(
                fields
                    .into_iter()
                    .map(|(name, value)| (name, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

/// The declared configuration of one resource, rooted at the resource itself.
///
/// Paths are resolved the same way as in the store, e.g. `pg_user_config.0.ip_filter_string`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawConfig {
    root: ConfigValue,
}

impl RawConfig {
    pub fn new(root: ConfigValue) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &ConfigValue {
        &self.root
    }
}

impl From<Value> for RawConfig {
    fn from(value: Value) -> Self {
        Self::new(value.into())
    }
}

impl ConfigView for RawConfig {
    fn presence(&self, path: &FieldPath) -> Presence {
        self.root
            .lookup(path)
            .map_or(Presence::Absent, ConfigValue::presence)
    }

    fn raw_elements(&self, path: &FieldPath) -> Option<&[ConfigValue]> {
        match self.root.lookup(path)? {
            ConfigValue::Sequence(elements) => Some(elements),
            ConfigValue::Absent
            | ConfigValue::Null
            | ConfigValue::Scalar(_)
            | ConfigValue::Object(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn config() -> RawConfig {
        let value: Value = serde_yaml::from_str(indoc! {"
            pg_user_config:
              - admin_username: avnadmin
                admin_password: null
                ip_filter_string: []
                pg_read_replica: false
                pgbouncer:
                  - autodb_pool_size: 10
                    ignore_startup_parameters: [extra_float_digits]
        "})
        .expect("test YAML is valid");
        value.into()
    }

    #[rstest]
    #[case("pg_user_config.0.admin_username", Presence::Present)]
    #[case("pg_user_config.0.admin_password", Presence::NullOrEmpty)]
    #[case("pg_user_config.0.ip_filter_string", Presence::NullOrEmpty)]
    #[case("pg_user_config.0.ip_filter_object", Presence::Absent)]
    #[case("pg_user_config.0.pg_read_replica", Presence::Present)]
    #[case("pg_user_config.0.pgbouncer.0.autodb_pool_size", Presence::Present)]
    #[case("pg_user_config.0.pgbouncer.1", Presence::Absent)]
    #[case("pg_user_config.1", Presence::Absent)]
    #[case("pg_user_config.admin_username", Presence::Absent)]
    fn presence(#[case] path: &str, #[case] expected: Presence) {
        let path: FieldPath = path.parse().expect("path parsing is infallible");
        assert_eq!(config().presence(&path), expected);
    }

    #[test]
    fn raw_elements_distinguish_empty_from_missing() {
        let config = config();
        let root: FieldPath = "pg_user_config.0".parse().expect("path parsing is infallible");

        assert_eq!(config.raw_elements(&root.field("ip_filter_string")), Some(&[][..]));
        assert_eq!(config.raw_elements(&root.field("ip_filter_object")), None);
        assert_eq!(config.raw_elements(&root.field("admin_password")), None);
        assert_eq!(
            config
                .raw_elements(&root.field("pgbouncer").index(0).field("ignore_startup_parameters"))
                .map(<[_]>::len),
            Some(1)
        );
    }

    #[rstest]
    #[case(json!("10.0.0.0/8"), Some("10.0.0.0/8"))]
    #[case(json!(42), Some("42"))]
    #[case(json!(1.0), Some("1"))]
    #[case(json!(1.5), Some("1.5"))]
    #[case(json!(null), None)]
    fn hash_keys(#[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(ConfigValue::from(value).hash_key().as_deref(), expected);
    }
}
