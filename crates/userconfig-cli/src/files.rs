//! Reading inputs from and writing results to disk and stdout.
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to open {path:?}"))]
    OpenFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse {path:?}"))]
    ParseFile {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("{path:?} does not contain a mapping"))]
    NotAMapping { path: PathBuf },

    #[snafu(display("failed to serialize JSON"))]
    SerializeJson { source: serde_json::Error },

    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to write output"))]
    WriteOutput { source: std::io::Error },
}

/// Reads a YAML or JSON file holding a mapping.
pub fn read_mapping(path: &Path) -> Result<Map<String, Value>> {
    let file = File::open(path).context(OpenFileSnafu { path })?;
    match serde_yaml::from_reader(file).context(ParseFileSnafu { path })? {
        Value::Object(mapping) => Ok(mapping),
        // An empty file
        Value::Null => Ok(Map::new()),
        _ => NotAMappingSnafu { path }.fail(),
    }
}

/// Writes `value` as pretty-printed JSON, followed by a newline.
pub fn write_json<W: Write>(value: &Value, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value).context(SerializeJsonSnafu)?;
    writer.write_all(b"\n").context(WriteOutputSnafu)
}

/// Writes `value` as an explicit YAML document, with a leading `---`.
pub fn write_yaml<W: Write>(value: &Value, mut writer: W) -> Result<()> {
    writer
        .write_all(b"---\n")
        .context(WriteDocumentSeparatorSnafu)?;
    serde_yaml::to_writer(writer, value).context(SerializeYamlSnafu)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    #[rstest]
    #[case::yaml("pg_user_config:\n  - pg_version: '16'\n")]
    #[case::json(r#"{"pg_user_config": [{"pg_version": "16"}]}"#)]
    fn read_yaml_and_json(#[case] content: &str) {
        let dir = tempdir().expect("create temporary directory");
        let path = dir.path().join("resource");
        std::fs::write(&path, content).expect("write temporary file");

        let mapping = read_mapping(&path).expect("file holds a mapping");
        assert_eq!(
            Value::Object(mapping),
            json!({"pg_user_config": [{"pg_version": "16"}]})
        );
    }

    #[test]
    fn reject_non_mappings() {
        let dir = tempdir().expect("create temporary directory");
        let path = dir.path().join("resource.yaml");
        std::fs::write(&path, "- a\n").expect("write temporary file");

        let err = read_mapping(&path).expect_err("file holds a sequence");
        assert!(matches!(err, Error::NotAMapping { .. }), "{err}");
    }

    #[test]
    fn write_explicit_yaml_document() {
        let mut buffer = Vec::new();
        write_yaml(&json!({"pg_user_config": [{"pg_version": "16"}]}), &mut buffer)
            .expect("writing to a buffer succeeds");

        assert_eq!(
            String::from_utf8(buffer).expect("YAML is valid UTF-8"),
            indoc! {"
                ---
                pg_user_config:
                - pg_version: '16'
            "}
        );
    }
}
