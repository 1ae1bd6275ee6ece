//! Builds the DTO sent to the remote API from declared configuration and resolved values.
//!
//! The remote API cannot delete user configuration fields, it can only override them. The
//! expander therefore only emits what the user declared (or changed), and leaves everything
//! else out of the DTO.
use std::collections::HashSet;

use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, trace};

use crate::{
    alias,
    config_view::{ConfigValue, ConfigView, Presence, scalar_hash_key},
    conventions::Conventions,
    path::FieldPath,
    schema::{NodeKind, ObjectSchema, ScalarKind, SchemaNode, json_kind},
    store::{self, MaterializedStore},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("the user configuration schema must describe an object"))]
    RootNotObject,

    #[snafu(display("value at {path} is of kind {found}, but the schema expects {expected}"))]
    ShapeMismatch {
        path: FieldPath,
        expected: String,
        found: &'static str,
    },

    #[snafu(display("{path} holds {count} objects, but at most {max_items} are allowed"))]
    TooManyElements {
        path: FieldPath,
        count: usize,
        max_items: usize,
    },

    #[snafu(display("failed to read resolved value"))]
    ReadStore { source: store::Error },

    #[snafu(display("failed to collapse field aliases"))]
    CollapseAliases { source: alias::Error },
}

/// Expands the user configuration stored under `field` into a DTO object.
///
/// `root` is the schema of `field`, usually a singleton list of objects. Only values the user
/// declared in `config` are emitted; their values are taken from `store`. Fields marked
/// `force_new` are only sent for new resources.
pub fn expand<C, S>(
    field: &str,
    root: &SchemaNode,
    config: &C,
    store: &S,
    conventions: &Conventions,
) -> Result<Map<String, Value>>
where
    C: ConfigView + ?Sized,
    S: MaterializedStore + ?Sized,
{
    let fields = root.object_fields().context(RootNotObjectSnafu)?;
    let path = match root.kind {
        NodeKind::Object(_) => FieldPath::root().field(field),
        NodeKind::Scalar(_) | NodeKind::List(_) | NodeKind::Set(_) => {
            FieldPath::root().field(field).index(0)
        }
    };

    let expander = Expander { config, store };
    let mut dto = expander.object(&path, fields)?;
    conventions
        .aliases()
        .collapse(&mut dto)
        .context(CollapseAliasesSnafu)?;

    debug!(
        field,
        new_resource = store.is_new_resource(),
        fields = dto.len(),
        "expanded user configuration"
    );
    Ok(dto)
}

struct Expander<'a, C: ?Sized, S: ?Sized> {
    config: &'a C,
    store: &'a S,
}

impl<C, S> Expander<'_, C, S>
where
    C: ConfigView + ?Sized,
    S: MaterializedStore + ?Sized,
{
    fn object(&self, path: &FieldPath, fields: &ObjectSchema) -> Result<Map<String, Value>> {
        let mut dto = Map::new();
        for (name, node) in fields.fields() {
            if node.force_new && !self.store.is_new_resource() {
                trace!(%path, field = name, "skipping force-new field of existing resource");
                continue;
            }
            if let Some(value) = self.attr(&path.field(name), node)? {
                dto.insert(name.to_owned(), value);
            }
        }
        Ok(dto)
    }

    fn attr(&self, path: &FieldPath, node: &SchemaNode) -> Result<Option<Value>> {
        match &node.kind {
            NodeKind::Scalar(kind) => self.scalar(path, *kind),
            NodeKind::Set(element) => match &element.kind {
                NodeKind::Scalar(kind) => self.set_items(path, *kind),
                NodeKind::List(_) | NodeKind::Set(_) | NodeKind::Object(_) => {
                    self.set_elements(path, element)
                }
            },
            NodeKind::List(element) => self.elements(path, node, element),
            NodeKind::Object(fields) => self.nested_object(path, fields),
        }
    }

    fn scalar(&self, path: &FieldPath, kind: ScalarKind) -> Result<Option<Value>> {
        if self.config.presence(path) != Presence::Present {
            return Ok(None);
        }
        let value = self.store.get(path).context(ReadStoreSnafu)?;
        ensure!(
            kind.matches(&value),
            ShapeMismatchSnafu {
                path: path.clone(),
                expected: kind.to_string(),
                found: json_kind(&value),
            }
        );
        Ok(Some(value))
    }

    /// Returns the resolved set elements that are backed by the declaration.
    ///
    /// A declared empty set yields an empty array, which clears the remote list.
    fn set_items(&self, path: &FieldPath, kind: ScalarKind) -> Result<Option<Value>> {
        let Some(declared) = self.config.raw_elements(path) else {
            return Ok(None);
        };
        let hashes: HashSet<String> = declared.iter().filter_map(ConfigValue::hash_key).collect();

        let items = match self.store.get(path).context(ReadStoreSnafu)? {
            Value::Array(items) => items,
            other => {
                return ShapeMismatchSnafu {
                    path: path.clone(),
                    expected: "set",
                    found: json_kind(&other),
                }
                .fail();
            }
        };

        let mut backed = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            ensure!(
                kind.matches(&item),
                ShapeMismatchSnafu {
                    path: path.index(index),
                    expected: kind.to_string(),
                    found: json_kind(&item),
                }
            );
            if scalar_hash_key(&item).is_some_and(|key| hashes.contains(&key)) {
                backed.push(item);
            }
        }
        Ok(Some(Value::Array(backed)))
    }

    fn elements(
        &self,
        path: &FieldPath,
        node: &SchemaNode,
        element: &SchemaNode,
    ) -> Result<Option<Value>> {
        if self.config.presence(path) != Presence::Present && !self.store.has_change(path) {
            // Received from the API, but not declared by the user yet
            return Ok(None);
        }

        let mut items = self.items(path, element)?;
        match element.kind {
            NodeKind::Object(_) if node.is_singleton() => {
                ensure!(
                    items.len() <= 1,
                    TooManyElementsSnafu {
                        path: path.clone(),
                        count: items.len(),
                        max_items: node.max_items,
                    }
                );
                // An empty singleton is never sent, the API cannot remove it anyway
                Ok(items.pop())
            }
            NodeKind::Scalar(_) | NodeKind::List(_) | NodeKind::Set(_) | NodeKind::Object(_) => {
                Ok(Some(Value::Array(items)))
            }
        }
    }

    /// Expands a set of non-scalar elements. Like scalar sets, a declared empty set yields an
    /// empty array.
    fn set_elements(&self, path: &FieldPath, element: &SchemaNode) -> Result<Option<Value>> {
        if self.config.raw_elements(path).is_none() {
            return Ok(None);
        }
        Ok(Some(Value::Array(self.items(path, element)?)))
    }

    /// Expands every declared element of the container at `path`, dropping empty ones.
    fn items(&self, path: &FieldPath, element: &SchemaNode) -> Result<Vec<Value>> {
        let count = self.config.raw_elements(path).map_or(0, <[_]>::len);
        let mut items = Vec::with_capacity(count);
        for index in 0..count {
            let item_path = path.index(index);
            let item = match &element.kind {
                NodeKind::Scalar(kind) => self.scalar(&item_path, *kind)?,
                NodeKind::Object(fields) => self.nested_object(&item_path, fields)?,
                NodeKind::List(_) | NodeKind::Set(_) => self.attr(&item_path, element)?,
            };
            items.extend(item);
        }
        Ok(items)
    }

    fn nested_object(&self, path: &FieldPath, fields: &ObjectSchema) -> Result<Option<Value>> {
        let object = self.object(path, fields)?;
        Ok((!object.is_empty()).then_some(Value::Object(object)))
    }
}
