//! Fields that the config model has to split into several physical fields.
//!
//! The config model has no union types. A remote field that accepts either strings or objects
//! (like `ip_filter`) is therefore declared locally as several aliases, e.g. `ip_filter_string`
//! and `ip_filter_object`, of which at most one is populated. The DTO only knows the logical
//! name.
//!
//! This module performs the rename in both directions, as the last step of expansion
//! ([`AliasTable::collapse`]) and the first step of flattening ([`AliasTable::denormalize`]),
//! so that the recursive converters never see aliases.
use std::collections::HashMap;

use serde_json::{Map, Value};
use snafu::Snafu;
use tracing::trace;

use crate::{
    config_view::scalar_hash_key,
    path::FieldPath,
    schema::{NodeKind, ObjectSchema},
    store::MaterializedStore,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display(
        "more than one alias of {logical_name:?} is populated at {path}: {populated:?}"
    ))]
    AliasAmbiguity {
        path: FieldPath,
        logical_name: String,
        populated: Vec<String>,
    },
}

/// One logical field and the physical aliases it is split into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasGroup {
    parent: Vec<String>,
    logical_name: String,
    aliases: Vec<String>,
    ordering_key: Option<String>,
}

impl AliasGroup {
    pub fn new<I>(logical_name: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            parent: Vec::new(),
            logical_name: logical_name.into(),
            aliases: aliases.into_iter().map(Into::into).collect(),
            ordering_key: None,
        }
    }

    /// Places the group inside nested objects, given as the chain of field names leading from
    /// the user configuration root to the object that holds the aliases.
    ///
    /// Every object reached along the chain is handled, whether the fields on the way are
    /// single objects or lists of objects.
    pub fn with_parent<I>(mut self, parent: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.parent = parent.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the object field used to line remote elements up with the locally declared order.
    pub fn with_ordering_key(mut self, ordering_key: impl Into<String>) -> Self {
        self.ordering_key = Some(ordering_key.into());
        self
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    pub fn ordering_key(&self) -> Option<&str> {
        self.ordering_key.as_deref()
    }

    pub fn declares(&self, alias: &str) -> bool {
        self.aliases.iter().any(|declared| declared == alias)
    }

    pub fn string_alias(&self) -> String {
        format!("{}_string", self.logical_name)
    }

    pub fn object_alias(&self) -> String {
        format!("{}_object", self.logical_name)
    }

    /// Picks the physical alias that receives `value` when it comes back from the remote API.
    ///
    /// The alias already populated in the prior local state wins. Otherwise object-shaped
    /// values go to the object alias, and anything else to the bare logical name if both the
    /// group and the local `schema` declare it, or to the string alias.
    pub fn resolve_physical_alias(
        &self,
        value: &Value,
        prior_alias: Option<&str>,
        schema: &ObjectSchema,
    ) -> String {
        if let Some(prior_alias) = prior_alias.filter(|alias| self.declares(alias)) {
            return prior_alias.to_owned();
        }
        if holds_objects(value) {
            self.object_alias()
        } else if self.declares(&self.logical_name) && schema.field(&self.logical_name).is_some() {
            self.logical_name.clone()
        } else {
            self.string_alias()
        }
    }

    fn collapse(&self, object: &mut Map<String, Value>, path: &FieldPath) -> Result<()> {
        let populated: Vec<&String> = self
            .aliases
            .iter()
            .filter(|alias| object.contains_key(alias.as_str()))
            .collect();

        match populated.as_slice() {
            [] => Ok(()),
            [alias] if **alias == self.logical_name => Ok(()),
            [alias] => {
                if let Some(value) = object.shift_remove(alias.as_str()) {
                    trace!(%path, %alias, logical_name = %self.logical_name, "collapsing alias");
                    object.insert(self.logical_name.clone(), value);
                }
                Ok(())
            }
            _ => AliasAmbiguitySnafu {
                path: path.clone(),
                logical_name: self.logical_name.clone(),
                populated: populated.into_iter().cloned().collect::<Vec<_>>(),
            }
            .fail(),
        }
    }

    fn denormalize<S>(
        &self,
        object: &mut Map<String, Value>,
        schema: &ObjectSchema,
        path: &FieldPath,
        prior: &S,
    ) -> Result<()>
    where
        S: MaterializedStore + ?Sized,
    {
        if !object.contains_key(&self.logical_name) {
            return Ok(());
        }

        let populated: Vec<(&String, Value)> = self
            .aliases
            .iter()
            .filter_map(|alias| Some((alias, prior.get_ok(&path.field(alias))?)))
            .collect();
        if populated.len() > 1 {
            return AliasAmbiguitySnafu {
                path: path.clone(),
                logical_name: self.logical_name.clone(),
                populated: populated
                    .into_iter()
                    .map(|(alias, _)| alias.clone())
                    .collect::<Vec<_>>(),
            }
            .fail();
        }
        let prior_alias = populated.first();

        let Some(value) = object.shift_remove(&self.logical_name) else {
            return Ok(());
        };
        let target = self.resolve_physical_alias(
            &value,
            prior_alias.map(|(alias, _)| alias.as_str()),
            schema,
        );

        let value = if target == self.object_alias() {
            let value = self.wrap_strings(value);
            match (prior_alias, &self.ordering_key) {
                (Some((alias, Value::Array(prior_elements))), Some(ordering_key))
                    if **alias == target =>
                {
                    sort_by_prior_order(ordering_key, prior_elements, value)
                }
                _ => value,
            }
        } else {
            self.unwrap_objects(value)
        };

        trace!(%path, alias = %target, logical_name = %self.logical_name, "expanding alias");
        object.insert(target, value);
        Ok(())
    }

    /// Turns plain strings into `{ordering_key: string}` objects, so that a remote list of
    /// strings still fits a local object alias.
    fn wrap_strings(&self, value: Value) -> Value {
        let Some(ordering_key) = &self.ordering_key else {
            return value;
        };
        map_elements(value, |element| match element {
            Value::String(s) => {
                let mut object = Map::new();
                object.insert(ordering_key.clone(), Value::String(s));
                Value::Object(object)
            }
            other => other,
        })
    }

    /// The inverse of [`Self::wrap_strings`]: keeps only the ordering key of each object.
    fn unwrap_objects(&self, value: Value) -> Value {
        let Some(ordering_key) = &self.ordering_key else {
            return value;
        };
        map_elements(value, |element| match element {
            Value::Object(mut object) => match object.remove(ordering_key) {
                Some(key @ Value::String(_)) => key,
                Some(key) => {
                    object.insert(ordering_key.clone(), key);
                    Value::Object(object)
                }
                None => Value::Object(object),
            },
            other => other,
        })
    }
}

fn holds_objects(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(elements) => elements.first().is_some_and(Value::is_object),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
    }
}

fn map_elements(value: Value, f: impl FnMut(Value) -> Value) -> Value {
    match value {
        Value::Array(elements) => Value::Array(elements.into_iter().map(f).collect()),
        other => other,
    }
}

/// Orders `value`'s objects like the objects in `prior`, matched by `ordering_key`.
///
/// Elements unknown to `prior` keep their relative order and follow the known ones.
fn sort_by_prior_order(ordering_key: &str, prior: &[Value], value: Value) -> Value {
    let Value::Array(mut elements) = value else {
        return value;
    };

    let mut positions = HashMap::new();
    for (position, element) in prior.iter().enumerate() {
        if let Some(key) = element.get(ordering_key).and_then(scalar_hash_key) {
            positions.entry(key).or_insert(position);
        }
    }

    elements.sort_by_key(|element| {
        element
            .get(ordering_key)
            .and_then(scalar_hash_key)
            .and_then(|key| positions.get(&key).copied())
            .unwrap_or(usize::MAX)
    });
    Value::Array(elements)
}

/// All alias groups known to the converter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasTable {
    groups: Vec<AliasGroup>,
}

impl AliasTable {
    pub fn new(groups: impl IntoIterator<Item = AliasGroup>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }

    pub fn groups(&self) -> &[AliasGroup] {
        &self.groups
    }

    /// Renames populated physical aliases in an outgoing DTO to their logical names.
    ///
    /// `dto` is the expanded user configuration object, where single objects are no longer
    /// wrapped in lists.
    pub fn collapse(&self, dto: &mut Map<String, Value>) -> Result<()> {
        for group in &self.groups {
            for_each_dto_object(dto, &group.parent, FieldPath::root(), &mut |object, path| {
                group.collapse(object, path)
            })?;
        }
        Ok(())
    }

    /// Renames logical fields of an incoming DTO to the physical alias the local state uses.
    ///
    /// `schema` describes the user configuration object and `path` is its location in the
    /// local state, e.g. `pg_user_config.0`.
    pub fn denormalize<S>(
        &self,
        dto: &mut Map<String, Value>,
        schema: &ObjectSchema,
        path: &FieldPath,
        prior: &S,
    ) -> Result<()>
    where
        S: MaterializedStore + ?Sized,
    {
        for group in &self.groups {
            for_each_local_object(
                dto,
                schema,
                &group.parent,
                path.clone(),
                &mut |object, schema, path| group.denormalize(object, schema, path, prior),
            )?;
        }
        Ok(())
    }
}

fn for_each_dto_object<F>(
    object: &mut Map<String, Value>,
    parent: &[String],
    path: FieldPath,
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&mut Map<String, Value>, &FieldPath) -> Result<()>,
{
    let Some((name, rest)) = parent.split_first() else {
        return f(object, &path);
    };
    let path = path.field(name);
    match object.get_mut(name) {
        Some(Value::Object(child)) => for_each_dto_object(child, rest, path, f),
        Some(Value::Array(elements)) => {
            for (index, element) in elements.iter_mut().enumerate() {
                if let Value::Object(child) = element {
                    for_each_dto_object(child, rest, path.index(index), f)?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Like [`for_each_dto_object`], but tracks the local path and schema of every object. Local
/// paths include the list index the config model uses even for single objects.
fn for_each_local_object<F>(
    object: &mut Map<String, Value>,
    schema: &ObjectSchema,
    parent: &[String],
    path: FieldPath,
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&mut Map<String, Value>, &ObjectSchema, &FieldPath) -> Result<()>,
{
    let Some((name, rest)) = parent.split_first() else {
        return f(object, schema, &path);
    };
    let Some(node) = schema.field(name) else {
        return Ok(());
    };
    let Some(fields) = node.object_fields() else {
        return Ok(());
    };
    let path = path.field(name);
    match object.get_mut(name) {
        Some(Value::Object(child)) => {
            let path = match node.kind {
                NodeKind::Object(_) => path,
                NodeKind::Scalar(_) | NodeKind::List(_) | NodeKind::Set(_) => path.index(0),
            };
            for_each_local_object(child, fields, rest, path, f)
        }
        Some(Value::Array(elements)) => {
            for (index, element) in elements.iter_mut().enumerate() {
                if let Value::Object(child) = element {
                    for_each_local_object(child, fields, rest, path.index(index), f)?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
