//! Addresses of values inside a configuration tree.
//!
//! Paths use the notation of the config model: field names and list indices joined by dots,
//! for example `pg_user_config.0.ip_filter_object.1.network`.
use std::{
    fmt::{Display, Write},
    str::FromStr,
};

/// A single step of a [`FieldPath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Named field of an object.
    Field(String),

    /// Element of a list or set.
    Index(usize),
}

impl Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A path from the root of a resource to one of its values.
///
/// [`FieldPath::field`] and [`FieldPath::index`] return a new path and leave `self` untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// The empty path, addressing the resource itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns the path of the field `name` below `self`.
    pub fn field(&self, name: impl Into<String>) -> Self {
        self.child(Segment::Field(name.into()))
    }

    /// Returns the path of the element `index` below `self`.
    pub fn index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    fn child(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_char('.')?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = std::convert::Infallible;

    /// Parses the dotted notation. Purely numeric segments are list indices, field names in
    /// the config model never consist of digits only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.parse::<usize>() {
                Ok(index) => Segment::Index(index),
                Err(_) => Segment::Field(segment.to_owned()),
            })
            .collect();
        Ok(Self { segments })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("pg_user_config.0.ip_filter", 3)]
    #[case("pg_user_config.0.rules.0.mapping.2.namespaces_object", 7)]
    #[case("", 0)]
    fn parse_and_display(#[case] input: &str, #[case] len: usize) {
        let path: FieldPath = input.parse().expect("path parsing is infallible");
        assert_eq!(path.segments().len(), len);
        assert_eq!(path.to_string(), input);
    }

    #[test]
    fn child_paths_leave_parent_untouched() {
        let parent = FieldPath::root().field("kafka_user_config").index(0);
        let child = parent.field("ip_filter_string").index(3);

        assert_eq!(parent.to_string(), "kafka_user_config.0");
        assert_eq!(child.to_string(), "kafka_user_config.0.ip_filter_string.3");
        assert_eq!(child.segments()[3], Segment::Index(3));
    }
}
