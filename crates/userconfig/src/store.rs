//! The resolved value store: plan and state values of a resource.
//!
//! Unlike the [`ConfigView`](crate::config_view::ConfigView), every value here has a concrete
//! type. Leaves that were never set read as the zero value of their schema kind, and scalar
//! leaves read as their schema kind where they can be cast to it.
use serde_json::{Map, Value};
use snafu::{OptionExt, Snafu};

use crate::{
    path::{FieldPath, Segment},
    schema::{NodeKind, ObjectSchema},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("path {path} does not address a field of the resource schema"))]
    UnknownPath { path: FieldPath },

    #[snafu(display("cannot write to {path}: element {index} is past the end of the list"))]
    IndexOutOfBounds { path: FieldPath, index: usize },
}

/// Read/write access to resolved resource values.
pub trait MaterializedStore {
    /// Returns the value at `path`, or the zero value of its schema node if nothing is set.
    ///
    /// Fails only if `path` is not part of the schema.
    fn get(&self, path: &FieldPath) -> Result<Value>;

    /// Whether the value at `path` differs from what it was after the previous apply.
    fn has_change(&self, path: &FieldPath) -> bool;

    /// Whether the resource is being created, rather than updated.
    fn is_new_resource(&self) -> bool;

    fn set(&mut self, path: &FieldPath, value: Value) -> Result<()>;

    /// Returns the value at `path` if it is set to something other than its zero value.
    fn get_ok(&self, path: &FieldPath) -> Option<Value> {
        self.get(path).ok().filter(|value| !is_zero(value))
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(elements) => elements.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// An in-memory [`MaterializedStore`].
///
/// Holds the current values of a resource, the values recorded after the previous apply (used
/// for change detection), and whether the resource is new.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceData {
    schema: ObjectSchema,
    state: Map<String, Value>,
    prior: Map<String, Value>,
    new_resource: bool,
}

impl ResourceData {
    pub fn new(schema: ObjectSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: Map<String, Value>) -> Self {
        self.state = state;
        self
    }

    /// Sets the values recorded after the previous apply.
    pub fn with_prior(mut self, prior: Map<String, Value>) -> Self {
        self.prior = prior;
        self
    }

    pub fn with_new_resource(mut self, new_resource: bool) -> Self {
        self.new_resource = new_resource;
        self
    }

    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    pub fn into_state(self) -> Map<String, Value> {
        self.state
    }

    fn resolve(&self, tree: &Map<String, Value>, path: &FieldPath) -> Result<Value> {
        let node = self
            .schema
            .lookup(path)
            .context(UnknownPathSnafu { path: path.clone() })?;
        let value = lookup(tree, path).filter(|value| !value.is_null()).cloned();
        Ok(match (value, &node.kind) {
            // Uncastable values are returned as stored, so that callers can report them
            (Some(value), NodeKind::Scalar(kind)) => kind.cast(&value).unwrap_or(value),
            (Some(value), _) => value,
            (None, _) => node.zero_value(),
        })
    }
}

fn lookup<'a>(tree: &'a Map<String, Value>, path: &FieldPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    let Segment::Field(name) = first else {
        return None;
    };
    rest.iter()
        .try_fold(tree.get(name)?, |value, segment| match (value, segment) {
            (Value::Object(fields), Segment::Field(name)) => fields.get(name),
            (Value::Array(elements), Segment::Index(index)) => elements.get(*index),
            _ => None,
        })
}

/// Walks `segments` below `target`, creating intermediate containers, and stores `value` at
/// the end. Null or mistyped intermediates are replaced.
fn insert(target: &mut Value, segments: &[Segment], value: Value, path: &FieldPath) -> Result<()> {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return Ok(());
    };

    let child = match (first, target) {
        (Segment::Field(name), Value::Object(fields)) => {
            fields.entry(name.clone()).or_insert(Value::Null)
        }
        (Segment::Index(index), Value::Array(elements)) => {
            if *index == elements.len() {
                elements.push(Value::Null);
            }
            elements.get_mut(*index).context(IndexOutOfBoundsSnafu {
                path: path.clone(),
                index: *index,
            })?
        }
        (Segment::Field(_), target) => {
            *target = Value::Object(Map::new());
            return insert(target, segments, value, path);
        }
        (Segment::Index(_), target) => {
            *target = Value::Array(Vec::new());
            return insert(target, segments, value, path);
        }
    };
    insert(child, rest, value, path)
}

impl MaterializedStore for ResourceData {
    fn get(&self, path: &FieldPath) -> Result<Value> {
        self.resolve(&self.state, path)
    }

    fn has_change(&self, path: &FieldPath) -> bool {
        match (self.resolve(&self.prior, path), self.resolve(&self.state, path)) {
            (Ok(prior), Ok(current)) => prior != current,
            _ => false,
        }
    }

    fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    fn set(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        if self.schema.lookup(path).is_none() {
            return UnknownPathSnafu { path: path.clone() }.fail();
        }
        let mut root = Value::Object(std::mem::take(&mut self.state));
        let result = insert(&mut root, path.segments(), value, path);
        if let Value::Object(state) = root {
            self.state = state;
        }
        result
    }
}
