//! Converts the user configuration of managed services between the declarative config model
//! and the DTOs of the remote service API.
//!
//! The config model has no notion of "unset": every field the user did not write still has a
//! zero value. [`expand`](expand::expand) therefore consults a [`ConfigView`] of what the user
//! actually declared, and only emits those fields, taking their resolved values from a
//! [`MaterializedStore`]. [`flatten`](flatten::flatten) goes the other way and turns a DTO
//! returned by the API back into the local tree, reconciling it with the prior state.
//!
//! Both directions are driven by a [`SchemaNode`] and the static [`Conventions`] tables. The
//! [`Converter`] bundles the three for one field.
//!
//! [`ConfigView`]: config_view::ConfigView
//! [`MaterializedStore`]: store::MaterializedStore
//! [`SchemaNode`]: schema::SchemaNode
//! [`Conventions`]: conventions::Conventions
//! [`Converter`]: converter::Converter

pub mod alias;
pub mod config_view;
pub mod conventions;
pub mod converter;
pub mod expand;
pub mod flatten;
pub mod path;
pub mod schema;
pub mod store;
