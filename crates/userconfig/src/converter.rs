//! Entry point tying a user configuration field, its schema and the convention tables together.
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::{
    config_view::ConfigView,
    conventions::Conventions,
    expand,
    flatten,
    path::FieldPath,
    schema::{ObjectSchema, SchemaCatalog, SchemaNode, user_config_key},
    store::{self, MaterializedStore},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unknown service type {service_type:?}"))]
    UnknownServiceType { service_type: String },

    #[snafu(display("failed to expand {field}"))]
    Expand {
        source: expand::Error,
        field: String,
    },

    #[snafu(display("failed to flatten {field}"))]
    Flatten {
        source: flatten::Error,
        field: String,
    },

    #[snafu(display("failed to store the flattened value of {field}"))]
    WriteState {
        source: store::Error,
        field: String,
    },
}

/// Converts one user configuration field between the local representation and the DTO.
#[derive(Clone, Debug)]
pub struct Converter<'a> {
    field: String,
    schema: &'a SchemaNode,
    conventions: &'a Conventions,
}

impl<'a> Converter<'a> {
    pub fn new(
        field: impl Into<String>,
        schema: &'a SchemaNode,
        conventions: &'a Conventions,
    ) -> Self {
        Self {
            field: field.into(),
            schema,
            conventions,
        }
    }

    /// Creates a converter for the `<service_type>_user_config` field.
    pub fn for_service_type(
        catalog: &'a SchemaCatalog,
        service_type: &str,
        conventions: &'a Conventions,
    ) -> Result<Self> {
        let schema = catalog
            .user_config(service_type)
            .context(UnknownServiceTypeSnafu { service_type })?;
        Ok(Self::new(user_config_key(service_type), schema, conventions))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// A resource-level schema holding only the converted field, for addressing values in a
    /// [`ResourceData`](crate::store::ResourceData).
    pub fn resource_schema(&self) -> ObjectSchema {
        ObjectSchema::new().with_field(self.field.clone(), self.schema.clone())
    }

    pub fn expand<C, S>(&self, config: &C, store: &S) -> Result<Map<String, Value>>
    where
        C: ConfigView + ?Sized,
        S: MaterializedStore + ?Sized,
    {
        expand::expand(&self.field, self.schema, config, store, self.conventions)
            .context(ExpandSnafu { field: &self.field })
    }

    pub fn flatten<S>(&self, dto: Map<String, Value>, prior: &S) -> Result<Option<Value>>
    where
        S: MaterializedStore + ?Sized,
    {
        flatten::flatten(&self.field, self.schema, dto, prior, self.conventions)
            .context(FlattenSnafu { field: &self.field })
    }

    /// Flattens `dto` against the current contents of `store` and writes the result back.
    ///
    /// The field is left untouched if the DTO flattens to nothing. Returns whether the store
    /// was written.
    pub fn refresh<S>(&self, dto: Map<String, Value>, store: &mut S) -> Result<bool>
    where
        S: MaterializedStore + ?Sized,
    {
        let Some(value) = self.flatten(dto, &*store)? else {
            debug!(field = %self.field, "remote user configuration is empty, keeping local value");
            return Ok(false);
        };

        store
            .set(&FieldPath::root().field(&self.field), value)
            .context(WriteStateSnafu { field: &self.field })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;
    use crate::store::ResourceData;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::from_yaml_str(indoc! {"
            redis:
              redis_maxmemory_policy:
                type: string
                optional: true
              redis_timeout:
                type: int
                optional: true
        "})
        .expect("test YAML is valid")
    }

    fn store(catalog: &SchemaCatalog, state: &str) -> ResourceData {
        ResourceData::new(catalog.resource_schema("redis").expect("redis is registered"))
            .with_state(serde_yaml::from_str(state).expect("test YAML is valid"))
    }

    #[test]
    fn unknown_service_type() {
        let catalog = catalog();
        let err = Converter::for_service_type(&catalog, "mysql", Conventions::builtin())
            .expect_err("mysql is not registered");
        assert_eq!(err.to_string(), "unknown service type \"mysql\"");
    }

    #[test]
    fn refresh_writes_flattened_value() {
        let catalog = catalog();
        let converter = Converter::for_service_type(&catalog, "redis", Conventions::builtin())
            .expect("redis is registered");
        let mut store = store(
            &catalog,
            indoc! {"
                redis_user_config:
                  - redis_timeout: 30
            "},
        );
        let Value::Object(dto) = json!({"redis_timeout": 60, "redis_maxmemory_policy": "noeviction"})
        else {
            panic!("test DTO is an object")
        };

        assert!(converter.refresh(dto, &mut store).expect("refresh succeeds"));
        assert_eq!(
            Value::Object(store.into_state()),
            json!({
                "redis_user_config": [{"redis_maxmemory_policy": "noeviction", "redis_timeout": 60}],
            })
        );
    }

    #[test]
    fn refresh_keeps_local_value_for_empty_dto() {
        let catalog = catalog();
        let converter = Converter::for_service_type(&catalog, "redis", Conventions::builtin())
            .expect("redis is registered");
        let state = indoc! {"
            redis_user_config:
              - redis_timeout: 30
        "};
        let mut store = store(&catalog, state);

        assert!(!converter.refresh(Map::new(), &mut store).expect("refresh succeeds"));
        assert_eq!(
            store.into_state(),
            serde_yaml::from_str::<Map<String, Value>>(state).expect("test YAML is valid")
        );
    }

    #[test]
    fn errors_name_the_field() {
        let catalog = catalog();
        let converter = Converter::for_service_type(&catalog, "redis", Conventions::builtin())
            .expect("redis is registered");
        let Value::Object(dto) = json!({"redis_timeout": "sixty"}) else {
            panic!("test DTO is an object")
        };

        let err = converter
            .flatten(dto, &store(&catalog, "{}"))
            .expect_err("redis_timeout is not an int");
        assert_eq!(err.to_string(), "failed to flatten redis_user_config");
    }
}
