use indoc::indoc;
use rstest::{fixture, rstest};
use serde_json::{Map, Value, json};
use userconfig::{
    config_view::RawConfig, conventions::Conventions, converter::Converter,
    schema::SchemaCatalog, store::ResourceData,
};

#[fixture]
fn catalog() -> SchemaCatalog {
    SchemaCatalog::from_yaml_str(indoc! {"
        pg:
          admin_password:
            type: string
            optional: true
            force_new: true
          pg_version:
            type: string
            optional: true
          static_ips:
            type: bool
            optional: true
          ip_filter_string:
            type: set
            optional: true
            element:
              type: string
          ip_filter_object:
            type: set
            optional: true
            element:
              type: object
              fields:
                network:
                  type: string
                description:
                  type: string
                  optional: true
          pgbouncer:
            type: list
            max_items: 1
            optional: true
            element:
              type: object
              fields:
                autodb_pool_size:
                  type: int
                  optional: true
                ignore_startup_parameters:
                  type: list
                  optional: true
                  element:
                    type: string
    "})
    .expect("test YAML is valid")
}

fn yaml<T: serde::de::DeserializeOwned>(input: &str) -> T {
    serde_yaml::from_str(input).expect("test YAML is valid")
}

fn object(value: Value) -> Map<String, Value> {
    let Value::Object(object) = value else {
        panic!("test value is an object")
    };
    object
}

fn store(catalog: &SchemaCatalog, state: &str) -> ResourceData {
    ResourceData::new(catalog.resource_schema("pg").expect("pg is registered"))
        .with_state(yaml(state))
        .with_prior(yaml(state))
}

#[rstest]
fn round_trip_of_declared_values(catalog: SchemaCatalog) {
    let converter = Converter::for_service_type(&catalog, "pg", Conventions::builtin())
        .expect("pg is registered");
    let state = indoc! {"
        pg_user_config:
          - admin_password: secret123
            pg_version: '16'
            static_ips: true
            ip_filter_string: [10.0.0.0/8, 192.168.0.0/16]
            pgbouncer:
              - autodb_pool_size: 10
                ignore_startup_parameters: [extra_float_digits, search_path]
    "};
    let mut store = store(&catalog, state);
    let config = RawConfig::from(yaml::<Value>(state));

    let dto = converter.expand(&config, &store).expect("expansion succeeds");
    assert_eq!(
        Value::Object(dto.clone()),
        json!({
            "pg_version": "16",
            "static_ips": true,
            "ip_filter": ["10.0.0.0/8", "192.168.0.0/16"],
            "pgbouncer": {
                "autodb_pool_size": 10,
                "ignore_startup_parameters": ["extra_float_digits", "search_path"],
            },
        })
    );

    assert!(converter.refresh(dto, &mut store).expect("refresh succeeds"));
    assert_eq!(store.into_state(), yaml::<Map<String, Value>>(state));
}

#[rstest]
#[case::declared_empty(indoc! {"
    pg_user_config:
      - ip_filter_string: []
"}, json!({"ip_filter": []}))]
#[case::omitted(indoc! {"
    pg_user_config:
      - static_ips: true
"}, json!({"static_ips": true}))]
fn empty_set_versus_omitted_set(
    catalog: SchemaCatalog,
    #[case] config: &str,
    #[case] expected: Value,
) {
    let converter = Converter::for_service_type(&catalog, "pg", Conventions::builtin())
        .expect("pg is registered");
    let store = store(
        &catalog,
        indoc! {"
            pg_user_config:
              - static_ips: true
                ip_filter_string: [10.0.0.0/8]
        "},
    );

    let dto = converter
        .expand(&RawConfig::from(yaml::<Value>(config)), &store)
        .expect("expansion succeeds");
    assert_eq!(Value::Object(dto), expected);
}

#[rstest]
fn singleton_collapses_and_restores(catalog: SchemaCatalog) {
    let converter = Converter::for_service_type(&catalog, "pg", Conventions::builtin())
        .expect("pg is registered");
    let state = indoc! {"
        pg_user_config:
          - pgbouncer:
              - autodb_pool_size: 5
    "};
    let store = store(&catalog, state);

    let dto = converter
        .expand(&RawConfig::from(yaml::<Value>(state)), &store)
        .expect("expansion succeeds");
    assert_eq!(dto.get("pgbouncer"), Some(&json!({"autodb_pool_size": 5})));

    let flattened = converter.flatten(dto, &store).expect("flattening succeeds");
    assert_eq!(
        flattened,
        Some(json!([{"pgbouncer": [{"autodb_pool_size": 5}]}]))
    );
}

#[rstest]
fn alias_of_prior_state_is_kept_exclusively(catalog: SchemaCatalog) {
    let converter = Converter::for_service_type(&catalog, "pg", Conventions::builtin())
        .expect("pg is registered");
    let prior = store(
        &catalog,
        indoc! {"
            pg_user_config:
              - ip_filter_object:
                  - network: 10.0.0.0/8
                    description: office
        "},
    );

    let flattened = converter
        .flatten(
            object(json!({"ip_filter": ["192.168.0.0/16", "10.0.0.0/8"]})),
            &prior,
        )
        .expect("flattening succeeds");
    assert_eq!(
        flattened,
        Some(json!([{
            "ip_filter_object": [
                {"network": "10.0.0.0/8"},
                {"network": "192.168.0.0/16"},
            ],
        }]))
    );
}

#[rstest]
fn create_only_fields_survive_refresh(catalog: SchemaCatalog) {
    let converter = Converter::for_service_type(&catalog, "pg", Conventions::builtin())
        .expect("pg is registered");
    let mut store = store(
        &catalog,
        indoc! {"
            pg_user_config:
              - admin_password: secret123
                pg_version: '15'
        "},
    );

    converter
        .refresh(object(json!({"pg_version": "16"})), &mut store)
        .expect("refresh succeeds");
    assert_eq!(
        Value::Object(store.into_state()),
        json!({"pg_user_config": [{"admin_password": "secret123", "pg_version": "16"}]})
    );
}

#[rstest]
fn remote_order_follows_prior_state(catalog: SchemaCatalog) {
    let converter = Converter::for_service_type(&catalog, "pg", Conventions::builtin())
        .expect("pg is registered");
    let prior = store(
        &catalog,
        indoc! {"
            pg_user_config:
              - ip_filter_object:
                  - network: 192.168.0.0/16
                    description: vpn
                  - network: 10.0.0.0/8
                    description: office
        "},
    );

    let flattened = converter
        .flatten(
            object(json!({
                "ip_filter": [
                    {"network": "10.0.0.0/8", "description": "office"},
                    {"network": "192.168.0.0/16", "description": "vpn"},
                ],
            })),
            &prior,
        )
        .expect("flattening succeeds");
    assert_eq!(
        flattened,
        Some(json!([{
            "ip_filter_object": [
                {"network": "192.168.0.0/16", "description": "vpn"},
                {"network": "10.0.0.0/8", "description": "office"},
            ],
        }]))
    );
}
