use std::fs;

use assert_matches::assert_matches;

use planet_microbe_loader::config::{ConfigLoader, DEFAULT_OUTPUT_DIR};
use planet_microbe_loader::error::LoaderError;

#[test]
fn reads_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pm-load.json");
    fs::write(
        &path,
        r#"{"unit_conversions": "ref/units.tsv", "coordinate_tolerance": 2.5}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.unit_conversions, "ref/units.tsv");
    assert!(resolved.unit_conversions_required);
    assert_eq!(resolved.output_dir, DEFAULT_OUTPUT_DIR);
    assert_eq!(resolved.coordinate_tolerance, 2.5);
}

#[test]
fn named_config_must_exist() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, LoaderError::ConfigRead(_));
}

#[test]
fn malformed_config_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pm-load.json");
    fs::write(&path, "{\"coordinate_tolerance\": \"wide\"}").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, LoaderError::ConfigParse(_));
}
