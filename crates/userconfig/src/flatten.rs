//! Turns a DTO received from the remote API into the declarative tree stored locally.
use std::collections::HashSet;

use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, trace};

use crate::{
    alias,
    config_view::scalar_hash_key,
    conventions::Conventions,
    path::FieldPath,
    schema::{NodeKind, ObjectSchema, ScalarKind, SchemaNode, json_kind},
    store::MaterializedStore,
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

    #[snafu(display("failed to expand field aliases"))]
    ExpandAliases { source: alias::Error },
}

/// Flattens `dto` into the local value of the user configuration field `field`.
///
/// `prior` holds the local state before the refresh. It decides which physical alias receives
/// a split field, in which order objects of such a field are kept, and supplies create-only
/// fields the API no longer returns.
///
/// Returns [`None`] if nothing in `dto` maps to a populated field. Callers must then leave
/// `field` unset instead of setting it to an empty value.
pub fn flatten<S>(
    field: &str,
    root: &SchemaNode,
    mut dto: Map<String, Value>,
    prior: &S,
    conventions: &Conventions,
) -> Result<Option<Value>>
where
    S: MaterializedStore + ?Sized,
{
    let fields = root.object_fields().context(RootNotObjectSnafu)?;
    let wrapped = match root.kind {
        NodeKind::Object(_) => false,
        NodeKind::Scalar(_) | NodeKind::List(_) | NodeKind::Set(_) => true,
    };
    let path = if wrapped {
        FieldPath::root().field(field).index(0)
    } else {
        FieldPath::root().field(field)
    };

    conventions
        .aliases()
        .denormalize(&mut dto, fields, &path, prior)
        .context(ExpandAliasesSnafu)?;

    for name in conventions.create_only_fields() {
        if dto.get(name).is_some_and(|value| !value.is_null()) {
            continue;
        }
        if let Some(value) = prior.get_ok(&path.field(name)) {
            trace!(%path, field = name, "keeping create-only field from prior state");
            dto.insert(name.to_owned(), value);
        }
    }

    let object = flatten_object(&path, fields, &dto)?;
    debug!(
        field,
        fields = object.as_ref().map_or(0, Map::len),
        "flattened user configuration"
    );
    Ok(object.map(|object| {
        if wrapped {
            Value::Array(vec![Value::Object(object)])
        } else {
            Value::Object(object)
        }
    }))
}

/// Returns [`None`] if none of the schema's fields is populated in `dto`.
fn flatten_object(
    path: &FieldPath,
    fields: &ObjectSchema,
    dto: &Map<String, Value>,
) -> Result<Option<Map<String, Value>>> {
    for name in dto.keys().filter(|name| fields.field(name).is_none()) {
        trace!(%path, field = %name, "ignoring field unknown to the schema");
    }

    let mut object = Map::new();
    for (name, node) in fields.fields() {
        let Some(data) = dto.get(name).filter(|data| !data.is_null()) else {
            continue;
        };
        if let Some(value) = flatten_attr(&path.field(name), node, data)? {
            object.insert(name.to_owned(), value);
        }
    }
    Ok((!object.is_empty()).then_some(object))
}

fn flatten_attr(path: &FieldPath, node: &SchemaNode, data: &Value) -> Result<Option<Value>> {
    match &node.kind {
        NodeKind::Scalar(kind) => cast(path, *kind, data).map(Some),
        NodeKind::List(element) => match &element.kind {
            NodeKind::Scalar(_) => {
                ensure_array(path, data)?;
                Ok(Some(data.clone()))
            }
            NodeKind::Object(fields) => flatten_objects(path, fields, data),
            NodeKind::List(_) | NodeKind::Set(_) => flatten_elements(path, element, data),
        },
        NodeKind::Set(element) => match &element.kind {
            NodeKind::Scalar(kind) => flatten_scalar_set(path, *kind, data),
            NodeKind::Object(fields) => flatten_objects(path, fields, data),
            NodeKind::List(_) | NodeKind::Set(_) => flatten_elements(path, element, data),
        },
        NodeKind::Object(fields) => match data {
            Value::Object(dto) => Ok(flatten_object(path, fields, dto)?.map(Value::Object)),
            other => mismatch(path, "object", other),
        },
    }
}

fn cast(path: &FieldPath, kind: ScalarKind, data: &Value) -> Result<Value> {
    kind.cast(data).with_context(|| ShapeMismatchSnafu {
        path: path.clone(),
        expected: kind.to_string(),
        found: json_kind(data),
    })
}

/// Casts every element and drops duplicates, keeping the first occurrence.
fn flatten_scalar_set(path: &FieldPath, kind: ScalarKind, data: &Value) -> Result<Option<Value>> {
    let elements = ensure_array(path, data)?;
    let mut seen = HashSet::new();
    let mut values = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let value = cast(&path.index(index), kind, element)?;
        if scalar_hash_key(&value).is_none_or(|key| seen.insert(key)) {
            values.push(value);
        }
    }
    Ok(Some(Value::Array(values)))
}

/// Flattens a list or set of objects. A bare DTO object is a list holding only that object,
/// which is how single nested objects arrive from the API.
fn flatten_objects(path: &FieldPath, fields: &ObjectSchema, data: &Value) -> Result<Option<Value>> {
    let elements = match data {
        Value::Object(object) if object.is_empty() => &[][..],
        Value::Object(_) => std::slice::from_ref(data),
        Value::Array(elements) => elements.as_slice(),
        other => return mismatch(path, "list of objects", other),
    };
    if elements.is_empty() {
        return Ok(None);
    }

    let mut items = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let item_path = path.index(index);
        let Value::Object(dto) = element else {
            return mismatch(&item_path, "object", element);
        };
        if let Some(object) = flatten_object(&item_path, fields, dto)? {
            items.push(Value::Object(object));
        }
    }
    Ok(Some(Value::Array(items)))
}

fn flatten_elements(path: &FieldPath, element: &SchemaNode, data: &Value) -> Result<Option<Value>> {
    let elements = ensure_array(path, data)?;
    let mut items = Vec::with_capacity(elements.len());
    for (index, item) in elements.iter().enumerate() {
        if let Some(value) = flatten_attr(&path.index(index), element, item)? {
            items.push(value);
        }
    }
    Ok(Some(Value::Array(items)))
}

fn ensure_array<'a>(path: &FieldPath, data: &'a Value) -> Result<&'a Vec<Value>> {
    match data {
        Value::Array(elements) => Ok(elements),
        other => mismatch(path, "array", other),
    }
}

fn mismatch<T>(path: &FieldPath, expected: &str, found: &Value) -> Result<T> {
    ShapeMismatchSnafu {
        path: path.clone(),
        expected,
        found: json_kind(found),
    }
    .fail()
}
