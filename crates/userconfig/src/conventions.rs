use std::sync::LazyLock;

use crate::alias::{AliasGroup, AliasTable};

static BUILTIN: LazyLock<Conventions> = LazyLock::new(|| {
    Conventions::new(AliasTable::new([
        AliasGroup::new(
            "ip_filter",
            ["ip_filter", "ip_filter_string", "ip_filter_object"],
        )
        .with_ordering_key("network"),
        AliasGroup::new("namespaces", ["namespaces_string", "namespaces_object"])
            .with_parent(["rules", "mapping"])
            .with_ordering_key("name"),
    ]))
    .with_create_only_fields(["admin_username", "admin_password"])
});

/// The static tables describing where the config model and the remote API disagree.
///
/// Built once and handed to the converters by reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conventions {
    aliases: AliasTable,
    create_only_fields: Vec<String>,
}

impl Conventions {
    pub fn new(aliases: AliasTable) -> Self {
        Self {
            aliases,
            create_only_fields: Vec::new(),
        }
    }

    /// The tables used for all service types of the remote API.
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Sets the fields the remote API only returns when the service is created, such as the
    /// generated admin credentials.
    pub fn with_create_only_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.create_only_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn create_only_fields(&self) -> impl Iterator<Item = &str> {
        self.create_only_fields.iter().map(String::as_str)
    }
}
