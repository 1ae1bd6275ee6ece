//! Declarative description of the shape of a user configuration.
//!
//! A [`SchemaNode`] is pure data. The converters in [`crate::expand`] and [`crate::flatten`]
//! walk it side by side with concrete value trees, matching exhaustively on [`NodeKind`] so
//! that a new kind of node has to be handled everywhere before the crate compiles again.
//!
//! Schemas can be built in code:
//!
//! ```
//! use userconfig::schema::{ObjectSchema, SchemaNode};
//!
//! let pg = ObjectSchema::new()
//!     .with_field("admin_password", SchemaNode::string().optional().force_new())
//!     .with_field("ip_filter_string", SchemaNode::set(SchemaNode::string()).optional())
//!     .with_field(
//!         "pgbouncer",
//!         SchemaNode::singleton(
//!             ObjectSchema::new().with_field("autodb_pool_size", SchemaNode::int().optional()),
//!         ),
//!     );
//! assert_eq!(pg.fields().count(), 3);
//! ```
//!
//! or deserialized, which is how the [`SchemaCatalog`] is loaded:
//!
//! ```yaml
//! type: list
//! max_items: 1
//! element:
//!   type: object
//!   fields:
//!     autodb_pool_size:
//!       type: int
//!       optional: true
//! ```
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use snafu::{OptionExt, Snafu, ensure};

use crate::path::{FieldPath, Segment};

mod catalog;

pub use catalog::{CatalogError, SchemaCatalog, user_config_key};

/// Errors raised while turning a deserialized schema definition into a [`SchemaNode`].
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("a {kind} node requires an element schema"))]
    MissingElement { kind: &'static str },

    #[snafu(display("an object node requires a fields mapping"))]
    MissingFields,

    #[snafu(display("a {kind} node must not declare {attribute:?}"))]
    UnexpectedAttribute {
        kind: &'static str,
        attribute: &'static str,
    },
}

/// The kind of a leaf value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ScalarKind {
    String,
    Bool,
    Int,
    Float,
}

impl ScalarKind {
    /// Returns the zero value of this kind, which is what a store reports for unset leaves.
    pub fn zero_value(self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Bool => Value::Bool(false),
            Self::Int => Value::from(0_i64),
            Self::Float => Value::from(0.0_f64),
        }
    }

    /// Casts a loosely typed JSON leaf to this kind.
    ///
    /// Returns [`None`] if the value cannot represent this kind. Integers are accepted for
    /// floats, but not the other way around.
    pub fn cast(self, value: &Value) -> Option<Value> {
        match self {
            Self::String => value.as_str().map(|s| Value::String(s.to_owned())),
            Self::Bool => value.as_bool().map(Value::Bool),
            Self::Int => value.as_i64().map(Value::from),
            Self::Float => value
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64(),
            Self::Float => value.is_number(),
        }
    }
}

/// Names the JSON kind of `value`, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// What a [`SchemaNode`] describes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Scalar(ScalarKind),

    /// A list whose element order is significant.
    List(Box<SchemaNode>),

    /// A collection whose element order is not significant.
    Set(Box<SchemaNode>),

    Object(ObjectSchema),
}

impl NodeKind {
    /// A short name for the kind, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Object(_) => "object",
        }
    }
}

/// The schema of one field in a user configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "SchemaNodeDef")]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub optional: bool,
    pub computed: bool,

    /// The field cannot change once the resource exists, so it is only sent on creation.
    pub force_new: bool,

    /// Upper bound for the number of container elements, `0` meaning unbounded.
    ///
    /// A list of objects with `max_items == 1` is how the config model spells a single
    /// nested object.
    pub max_items: usize,
}

impl SchemaNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            optional: false,
            computed: false,
            force_new: false,
            max_items: 0,
        }
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self::new(NodeKind::Scalar(kind))
    }

    pub fn string() -> Self {
        Self::scalar(ScalarKind::String)
    }

    pub fn bool() -> Self {
        Self::scalar(ScalarKind::Bool)
    }

    pub fn int() -> Self {
        Self::scalar(ScalarKind::Int)
    }

    pub fn float() -> Self {
        Self::scalar(ScalarKind::Float)
    }

    pub fn list(element: SchemaNode) -> Self {
        Self::new(NodeKind::List(Box::new(element)))
    }

    pub fn set(element: SchemaNode) -> Self {
        Self::new(NodeKind::Set(Box::new(element)))
    }

    pub fn object(fields: ObjectSchema) -> Self {
        Self::new(NodeKind::Object(fields))
    }

    /// A nested object, expressed as a list of objects holding at most one element.
    pub fn singleton(fields: ObjectSchema) -> Self {
        Self::list(Self::object(fields)).with_max_items(1)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.max_items == 1
    }

    /// Returns the fields of the object this node holds, either directly or as the element of
    /// a list or set.
    pub fn object_fields(&self) -> Option<&ObjectSchema> {
        match &self.kind {
            NodeKind::Object(fields) => Some(fields),
            NodeKind::List(element) | NodeKind::Set(element) => match &element.kind {
                NodeKind::Object(fields) => Some(fields),
                NodeKind::Scalar(_) | NodeKind::List(_) | NodeKind::Set(_) => None,
            },
            NodeKind::Scalar(_) => None,
        }
    }

    /// The value a store reports for this node when nothing has been set.
    pub fn zero_value(&self) -> Value {
        match &self.kind {
            NodeKind::Scalar(kind) => kind.zero_value(),
            NodeKind::List(_) | NodeKind::Set(_) => Value::Array(Vec::new()),
            NodeKind::Object(_) => Value::Object(serde_json::Map::new()),
        }
    }

    fn child(&self, segment: &Segment) -> Option<&SchemaNode> {
        match (&self.kind, segment) {
            (NodeKind::List(element) | NodeKind::Set(element), Segment::Index(_)) => Some(element),
            (NodeKind::Object(fields), Segment::Field(name)) => fields.field(name),
            (NodeKind::List(_) | NodeKind::Set(_), Segment::Field(_))
            | (NodeKind::Object(_) | NodeKind::Scalar(_), Segment::Index(_))
            | (NodeKind::Scalar(_), Segment::Field(_)) => None,
        }
    }
}

/// The named fields of an object, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ObjectSchema {
    fields: IndexMap<String, SchemaNode>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.fields.insert(name.into(), node);
        self
    }

    pub fn field(&self, name: &str) -> Option<&SchemaNode> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.fields.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Looks up the schema of the value addressed by `path`, relative to this object.
    ///
    /// Returns [`None`] for the root path and for paths leaving the schema.
    pub fn lookup(&self, path: &FieldPath) -> Option<&SchemaNode> {
        let (first, rest) = path.segments().split_first()?;
        let Segment::Field(name) = first else {
            return None;
        };
        rest.iter()
            .try_fold(self.field(name)?, |node, segment| node.child(segment))
    }
}

impl<K: Into<String>> FromIterator<(K, SchemaNode)> for ObjectSchema {
    fn from_iter<T: IntoIterator<Item = (K, SchemaNode)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum NodeType {
    String,
    Bool,
    Int,
    Float,
    List,
    Set,
    Object,
}

/// The serialized form of a [`SchemaNode`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaNodeDef {
    #[serde(rename = "type")]
    node_type: NodeType,
    element: Option<Box<SchemaNode>>,
    fields: Option<ObjectSchema>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    computed: bool,
    #[serde(default)]
    force_new: bool,
    #[serde(default)]
    max_items: usize,
}

impl SchemaNodeDef {
    /// Takes the element node of a list or set definition.
    fn take_element(&mut self, kind: &'static str) -> Result<Box<SchemaNode>, Error> {
        ensure!(
            self.fields.is_none(),
            UnexpectedAttributeSnafu {
                kind,
                attribute: "fields",
            }
        );
        self.element.take().context(MissingElementSnafu { kind })
    }
}

impl TryFrom<SchemaNodeDef> for SchemaNode {
    type Error = Error;

    fn try_from(mut def: SchemaNodeDef) -> Result<Self, Self::Error> {
        let scalar = |kind: ScalarKind| -> Result<NodeKind, Error> {
            if def.element.is_some() {
                return UnexpectedAttributeSnafu {
                    kind: "scalar",
                    attribute: "element",
                }
                .fail();
            }
            if def.fields.is_some() {
                return UnexpectedAttributeSnafu {
                    kind: "scalar",
                    attribute: "fields",
                }
                .fail();
            }
            Ok(NodeKind::Scalar(kind))
        };

        let kind = match def.node_type {
            NodeType::String => scalar(ScalarKind::String)?,
            NodeType::Bool => scalar(ScalarKind::Bool)?,
            NodeType::Int => scalar(ScalarKind::Int)?,
            NodeType::Float => scalar(ScalarKind::Float)?,
            NodeType::List => NodeKind::List(def.take_element("list")?),
            NodeType::Set => NodeKind::Set(def.take_element("set")?),
            NodeType::Object => {
                if def.element.is_some() {
                    return UnexpectedAttributeSnafu {
                        kind: "object",
                        attribute: "element",
                    }
                    .fail();
                }
                NodeKind::Object(def.fields.ok_or(Error::MissingFields)?)
            }
        };

        Ok(Self {
            kind,
            optional: def.optional,
            computed: def.computed,
            force_new: def.force_new,
            max_items: def.max_items,
        })
    }
}
