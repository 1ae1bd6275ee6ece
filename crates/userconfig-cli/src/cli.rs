use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use snafu::Snafu;

/// Locations searched for the schema catalog when `--catalog` is not given.
pub const DEFAULT_CATALOG_PATHS: &[&str] = &["catalog.yaml", "/etc/userconfig/catalog.yaml"];

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display(
        "failed to locate a required file in any of the following locations: {search_path:?}"
    ))]
    RequiredFileMissing { search_path: Vec<PathBuf> },
}

/// Converts service user configuration between local state and remote API DTOs.
#[derive(Debug, Parser)]
#[command(name = "userconfig", author, version, about)]
pub struct Opts {
    /// Path of the schema catalog. Defaults to the first existing file of
    /// `./catalog.yaml` and `/etc/userconfig/catalog.yaml`.
    #[arg(long, env = "USERCONFIG_CATALOG", global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Builds the DTO sent to the API and prints it as JSON.
    Expand(ExpandArgs),

    /// Flattens a DTO returned by the API into local state and prints it as YAML.
    Flatten(FlattenArgs),
}

#[derive(Debug, Args)]
pub struct ExpandArgs {
    /// Service type whose user configuration is converted, e.g. `pg`.
    #[arg(long, env = "USERCONFIG_SERVICE_TYPE")]
    pub service_type: String,

    /// The resource as declared by the user (YAML or JSON).
    #[arg(long)]
    pub config: PathBuf,

    /// The resolved resource values. Defaults to the declared configuration.
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// The resource values recorded after the previous apply. Defaults to the resolved values,
    /// meaning nothing changed.
    #[arg(long)]
    pub prior: Option<PathBuf>,

    /// Treat the resource as not yet created, which also sends force-new fields.
    #[arg(long, env = "USERCONFIG_NEW_RESOURCE")]
    pub new_resource: bool,
}

#[derive(Debug, Args)]
pub struct FlattenArgs {
    /// Service type whose user configuration is converted, e.g. `pg`.
    #[arg(long, env = "USERCONFIG_SERVICE_TYPE")]
    pub service_type: String,

    /// The user configuration object returned by the API (YAML or JSON).
    #[arg(long)]
    pub dto: PathBuf,

    /// The local resource state before the refresh.
    #[arg(long)]
    pub prior: Option<PathBuf>,
}

/// Returns the path of the file to load.
///
/// 1. The user provided `user_provided_path`: return it if it exists, an [`Error`] otherwise.
/// 2. Otherwise return the first existing path of `default_paths`.
/// 3. Return an [`Error`] if nothing was found.
pub fn resolve_path<'a>(
    user_provided_path: Option<&'a Path>,
    default_paths: &'a [impl AsRef<Path> + 'a],
) -> Result<&'a Path> {
    let search_paths = match user_provided_path {
        Some(path) => vec![path],
        None => default_paths.iter().map(AsRef::as_ref).collect(),
    };
    if let Some(path) = search_paths.iter().copied().find(|path| path.exists()) {
        return Ok(path);
    }
    RequiredFileMissingSnafu {
        search_path: search_paths
            .into_iter()
            .map(PathBuf::from)
            .collect::<Vec<_>>(),
    }
    .fail()
}
