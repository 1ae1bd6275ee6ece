use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use snafu::{ResultExt, Snafu};

use super::{ObjectSchema, SchemaNode};

/// Suffix of the resource field holding the user configuration of a service type.
const USER_CONFIG_SUFFIX: &str = "_user_config";

#[derive(Debug, Snafu)]
pub enum CatalogError {
    #[snafu(display("failed to open schema catalog {path:?}"))]
    OpenFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse schema catalog"))]
    Parse { source: serde_yaml::Error },
}

/// Returns the name of the resource field holding the user configuration of `service_type`,
/// e.g. `pg_user_config`.
pub fn user_config_key(service_type: &str) -> String {
    format!("{service_type}{USER_CONFIG_SUFFIX}")
}

/// The user configuration schemas of all known service types.
///
/// The catalog is keyed by service type (`pg`, `kafka`, ...) and holds the fields of the
/// user configuration object. The resource field itself (`pg_user_config`) is always a
/// singleton list of that object.
///
/// Catalogs are loaded once and only read afterwards. The file format is YAML (or JSON):
///
/// ```yaml
/// pg:
///   admin_password:
///     type: string
///     optional: true
///     force_new: true
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(from = "BTreeMap<String, ObjectSchema>")]
pub struct SchemaCatalog {
    service_types: BTreeMap<String, SchemaNode>,
}

impl SchemaCatalog {
    pub fn from_yaml_str(input: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(input).context(ParseSnafu)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = File::open(path).context(OpenFileSnafu { path })?;
        serde_yaml::from_reader(file).context(ParseSnafu)
    }

    /// Registers the user configuration fields of `service_type`.
    pub fn with_service_type(
        mut self,
        service_type: impl Into<String>,
        fields: ObjectSchema,
    ) -> Self {
        self.service_types.insert(service_type.into(), Self::root_node(fields));
        self
    }

    /// Returns the schema of the `<service_type>_user_config` field.
    pub fn user_config(&self, service_type: &str) -> Option<&SchemaNode> {
        self.service_types.get(service_type)
    }

    /// Returns a resource-level schema holding only the user configuration field of
    /// `service_type`, as needed to address values in a
    /// [`ResourceData`](crate::store::ResourceData).
    pub fn resource_schema(&self, service_type: &str) -> Option<ObjectSchema> {
        let node = self.user_config(service_type)?;
        Some(ObjectSchema::new().with_field(user_config_key(service_type), node.clone()))
    }

    pub fn service_types(&self) -> impl Iterator<Item = &str> {
        self.service_types.keys().map(String::as_str)
    }

    fn root_node(fields: ObjectSchema) -> SchemaNode {
        SchemaNode::singleton(fields).optional()
    }
}

impl From<BTreeMap<String, ObjectSchema>> for SchemaCatalog {
    fn from(service_types: BTreeMap<String, ObjectSchema>) -> Self {
        Self {
            service_types: service_types
                .into_iter()
                .map(|(service_type, fields)| (service_type, Self::root_node(fields)))
                .collect(),
        }
    }
}
