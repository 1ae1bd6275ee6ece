use std::path::PathBuf;

use serde_json::{Map, Value, json};
use userconfig::{
    config_view::RawConfig, conventions::Conventions, converter::Converter,
    schema::SchemaCatalog, store::ResourceData,
};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

fn read(name: &str) -> Map<String, Value> {
    let content = std::fs::read_to_string(demo(name)).expect("demo file exists");
    serde_yaml::from_str(&content).expect("demo file is valid")
}

#[test]
fn demo_catalog_loads() {
    let catalog = SchemaCatalog::from_yaml_file(demo("catalog.yaml")).expect("catalog is valid");
    assert_eq!(catalog.service_types().collect::<Vec<_>>(), ["m3db", "pg"]);
}

#[test]
fn demo_expand_and_flatten() {
    let catalog = SchemaCatalog::from_yaml_file(demo("catalog.yaml")).expect("catalog is valid");
    let converter = Converter::for_service_type(&catalog, "pg", Conventions::builtin())
        .expect("pg is registered");
    let resource = read("pg-resource.yaml");

    let mut store = ResourceData::new(converter.resource_schema())
        .with_state(resource.clone())
        .with_prior(resource.clone());
    let dto = converter
        .expand(&RawConfig::from(Value::Object(resource)), &store)
        .expect("expansion succeeds");
    assert_eq!(
        Value::Object(dto),
        json!({
            "pg_version": "16",
            "ip_filter": [{"network": "10.0.0.0/8", "description": "office"}],
            "pgbouncer": {"autodb_pool_size": 10},
        })
    );

    converter
        .refresh(read("pg-dto.json"), &mut store)
        .expect("refresh succeeds");
    assert_eq!(
        Value::Object(store.into_state()),
        json!({
            "service_name": "pg-demo",
            "pg_user_config": [{
                "pg_version": "16",
                "static_ips": false,
                "ip_filter_object": [
                    {"network": "10.0.0.0/8", "description": "office"},
                    {"network": "0.0.0.0/0", "description": "anywhere"},
                ],
                "pgbouncer": [{"autodb_pool_size": 10, "server_reset_query_always": false}],
            }],
        })
    );
}
