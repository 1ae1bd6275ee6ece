use clap::Parser;
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use userconfig::{
    config_view::RawConfig,
    conventions::Conventions,
    converter::{self, Converter},
    schema::{CatalogError, SchemaCatalog},
    store::ResourceData,
};

use crate::cli::{Command, DEFAULT_CATALOG_PATHS, ExpandArgs, FlattenArgs, Opts};

mod cli;
mod files;
mod logging;

const APP_NAME: &str = "userconfig";
const LOG_ENV: &str = "USERCONFIG_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to find the schema catalog"))]
    FindCatalog { source: cli::Error },

    #[snafu(display("failed to load the schema catalog"))]
    LoadCatalog { source: CatalogError },

    #[snafu(display("failed to read input"))]
    ReadInput { source: files::Error },

    #[snafu(display("failed to convert the user configuration"))]
    Convert { source: converter::Error },

    #[snafu(display("failed to write output"))]
    WriteOutput { source: files::Error },
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let opts = Opts::parse();
    logging::initialize_logging(LOG_ENV, APP_NAME).context(InitializeLoggingSnafu)?;

    let catalog_path = cli::resolve_path(opts.catalog.as_deref(), DEFAULT_CATALOG_PATHS)
        .context(FindCatalogSnafu)?;
    tracing::debug!(path = %catalog_path.display(), "loading schema catalog");
    let catalog = SchemaCatalog::from_yaml_file(catalog_path).context(LoadCatalogSnafu)?;

    match opts.command {
        Command::Expand(args) => expand(&catalog, &args),
        Command::Flatten(args) => flatten(&catalog, &args),
    }
}

fn expand(catalog: &SchemaCatalog, args: &ExpandArgs) -> Result<(), Error> {
    let converter = Converter::for_service_type(catalog, &args.service_type, Conventions::builtin())
        .context(ConvertSnafu)?;

    let config = files::read_mapping(&args.config).context(ReadInputSnafu)?;
    let state = match &args.state {
        Some(path) => files::read_mapping(path).context(ReadInputSnafu)?,
        None => config.clone(),
    };
    let prior = match &args.prior {
        Some(path) => files::read_mapping(path).context(ReadInputSnafu)?,
        None => state.clone(),
    };
    let store = ResourceData::new(converter.resource_schema())
        .with_state(state)
        .with_prior(prior)
        .with_new_resource(args.new_resource);

    let dto = converter
        .expand(&RawConfig::from(Value::Object(config)), &store)
        .context(ConvertSnafu)?;
    tracing::info!(
        service_type = %args.service_type,
        fields = dto.len(),
        "expanded user configuration"
    );

    files::write_json(&Value::Object(dto), std::io::stdout().lock()).context(WriteOutputSnafu)
}

fn flatten(catalog: &SchemaCatalog, args: &FlattenArgs) -> Result<(), Error> {
    let converter = Converter::for_service_type(catalog, &args.service_type, Conventions::builtin())
        .context(ConvertSnafu)?;

    let dto = files::read_mapping(&args.dto).context(ReadInputSnafu)?;
    let prior = match &args.prior {
        Some(path) => files::read_mapping(path).context(ReadInputSnafu)?,
        None => serde_json::Map::new(),
    };
    let mut store = ResourceData::new(converter.resource_schema())
        .with_state(prior.clone())
        .with_prior(prior);

    let updated = converter.refresh(dto, &mut store).context(ConvertSnafu)?;
    tracing::info!(
        service_type = %args.service_type,
        field = converter.field(),
        updated,
        "flattened user configuration"
    );

    files::write_yaml(&Value::Object(store.into_state()), std::io::stdout().lock())
        .context(WriteOutputSnafu)
}
