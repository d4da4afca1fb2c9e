use assert_matches::assert_matches;

use planet_microbe_loader::classify::{TypedValue, classify, classify_row};
use planet_microbe_loader::domain::{
    CellValue, EntityKind, FieldDescriptor, LoadWarning, ResourceType, SAMPLE_ID_PURL,
    SAMPLING_EVENT_ID_PURL, ValueType,
};
use planet_microbe_loader::error::LoaderError;
use planet_microbe_loader::geo::{LATITUDE_PURLS, LONGITUDE_PURLS};
use planet_microbe_loader::join::join;
use planet_microbe_loader::package::Resource;
use planet_microbe_loader::units::{UnitConversion, UnitConversionTable};

fn sample_id() -> FieldDescriptor {
    FieldDescriptor::new("sample_name", ValueType::String).with_semantic_type(SAMPLE_ID_PURL)
}

fn coordinate(name: &str, purl: &str) -> FieldDescriptor {
    FieldDescriptor::new(name, ValueType::Number)
        .with_semantic_type(purl)
        .searchable()
}

fn kelvin_table() -> UnitConversionTable {
    let mut table = UnitConversionTable::default();
    table.insert(
        "obo:temp",
        "kelvin",
        UnitConversion {
            preferred_unit_type: "celsius".to_string(),
            conversion_factor: 1.0,
            offset: -273.15,
        },
    );
    table
}

fn mixed_resource() -> Resource {
    Resource::new(
        "samples",
        ResourceType::Sample,
        vec![
            sample_id(),
            FieldDescriptor::new("temp", ValueType::Number)
                .with_semantic_type("obo:temp")
                .with_unit_type("kelvin"),
            FieldDescriptor::new("depth", ValueType::Number).with_semantic_type("obo:depth"),
            FieldDescriptor::new("collected", ValueType::Datetime),
            FieldDescriptor::new("soak", ValueType::Time),
            FieldDescriptor::new("where", ValueType::from("geopoint")),
        ],
    )
    .with_rows(&[
        &["S1", "300.0", "12.5", "2017-06-01T10:00:00Z", "10:00", "1,2"],
        &["S2", "", "", "", "", ""],
    ])
}

#[test]
fn record_arrays_align_with_fields() {
    let joined = join(EntityKind::SAMPLE, &[mixed_resource()]).unwrap();
    let units = kelvin_table();

    for entity in &joined.entities {
        let classified = classify(&joined.fields, entity, &units).unwrap();
        let record = &classified.record;
        assert_eq!(record.number_values.len(), joined.fields.len());
        assert_eq!(record.string_values.len(), joined.fields.len());
        assert_eq!(record.datetime_values.len(), joined.fields.len());

        for i in 0..record.len() {
            let populated = [
                record.number_values[i].is_some(),
                record.string_values[i].is_some(),
                record.datetime_values[i].is_some(),
            ]
            .iter()
            .filter(|set| **set)
            .count();
            assert!(populated <= 1, "slot {i} of {} has {populated} values", entity.id);
        }
    }
}

#[test]
fn converts_kelvin_to_celsius() {
    let joined = join(EntityKind::SAMPLE, &[mixed_resource()]).unwrap();
    let entity = joined.entity("S1").unwrap();
    let classified = classify(&joined.fields, entity, &kelvin_table()).unwrap();

    let celsius = classified.record.number_values[1].unwrap();
    assert!((celsius - 26.85).abs() < 1e-9);
    assert_eq!(classified.record.string_values[0].as_deref(), Some("S1"));
    assert_eq!(
        classified.record.datetime_values[3].as_deref(),
        Some("2017-06-01T10:00:00Z")
    );
    assert_eq!(classified.record.string_values[4].as_deref(), Some("10:00"));
}

#[test]
fn unconverted_numbers_are_unchanged() {
    let joined = join(EntityKind::SAMPLE, &[mixed_resource()]).unwrap();
    let entity = joined.entity("S1").unwrap();
    let classified = classify(&joined.fields, entity, &kelvin_table()).unwrap();
    assert_eq!(classified.record.number_values[2], Some(12.5));
}

#[test]
fn unknown_type_is_null_with_warning() {
    let joined = join(EntityKind::SAMPLE, &[mixed_resource()]).unwrap();
    let entity = joined.entity("S1").unwrap();
    let classified = classify(&joined.fields, entity, &kelvin_table()).unwrap();

    assert_eq!(classified.record.number_values[5], None);
    assert_eq!(classified.record.string_values[5], None);
    assert_eq!(classified.record.datetime_values[5], None);
    assert_matches!(
        classified.warnings.as_slice(),
        [LoadWarning::UnknownType { field, declared_type, .. }]
            if field == "where" && declared_type == "geopoint"
    );
}

#[test]
fn null_entity_values_stay_null() {
    let joined = join(EntityKind::SAMPLE, &[mixed_resource()]).unwrap();
    let entity = joined.entity("S2").unwrap();
    let classified = classify(&joined.fields, entity, &kelvin_table()).unwrap();

    assert!(classified.record.number_values.iter().all(Option::is_none));
    assert!(classified.record.datetime_values.iter().all(Option::is_none));
    assert_eq!(classified.record.string_values[0].as_deref(), Some("S2"));
    assert_eq!(classified.record.string_values[4], None);
}

#[test]
fn coordinates_pair_by_role_not_column_order() {
    // end pair declared before the point pair, longitudes before latitudes
    let resource = Resource::new(
        "stations",
        ResourceType::Sample,
        vec![
            sample_id(),
            coordinate("end_lon", LONGITUDE_PURLS[2]),
            coordinate("lon", LONGITUDE_PURLS[0]),
            coordinate("lat", LATITUDE_PURLS[0]),
            coordinate("end_lat", LATITUDE_PURLS[2]),
        ],
    )
    .with_rows(&[&["S1", "-158.2", "-158.0", "22.75", "22.8"]]);

    let joined = join(EntityKind::SAMPLE, &[resource]).unwrap();
    let entity = joined.entity("S1").unwrap();
    let classified = classify(&joined.fields, entity, &UnitConversionTable::default()).unwrap();

    assert_eq!(classified.latitudes, vec![22.75, 22.8]);
    assert_eq!(classified.longitudes, vec![-158.0, -158.2]);
}

#[test]
fn coordinates_from_different_roles_are_not_paired() {
    let resource = Resource::new(
        "stations",
        ResourceType::Sample,
        vec![
            sample_id(),
            coordinate("lat", LATITUDE_PURLS[0]),
            coordinate("start_lon", LONGITUDE_PURLS[1]),
        ],
    )
    .with_rows(&[&["S1", "10.0", "20.0"]]);

    let joined = join(EntityKind::SAMPLE, &[resource]).unwrap();
    let entity = joined.entity("S1").unwrap();
    let classified = classify(&joined.fields, entity, &UnitConversionTable::default()).unwrap();

    assert!(classified.latitudes.is_empty());
    assert!(classified.longitudes.is_empty());
    let roles = classified
        .warnings
        .iter()
        .filter_map(|warning| match warning {
            LoadWarning::IncompleteCoordinates { entity_id, role } if entity_id == "S1" => {
                Some(role.as_str())
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(roles, vec!["point", "start"]);
}

#[test]
fn row_classification_uses_resource_fields() {
    let fields = vec![
        FieldDescriptor::new("event", ValueType::String).with_semantic_type(SAMPLING_EVENT_ID_PURL),
        FieldDescriptor::new("temp", ValueType::Number)
            .with_semantic_type("obo:temp")
            .with_unit_type("kelvin"),
        FieldDescriptor::new("cast_time", ValueType::Datetime),
    ];
    let cells = vec![
        CellValue::Text("E1".to_string()),
        CellValue::Text("300".to_string()),
        CellValue::Null,
    ];

    let classified = classify_row(&fields, &cells, "E1", &kelvin_table()).unwrap();
    assert_eq!(classified.record.len(), 3);
    assert_eq!(classified.record.string_values[0].as_deref(), Some("E1"));
    assert!((classified.record.number_values[1].unwrap() - 26.85).abs() < 1e-9);
    assert_eq!(classified.record.datetime_values[2], None);
}

#[test]
fn numeric_parse_failure_names_field_and_entity() {
    let resource = Resource::new(
        "samples",
        ResourceType::Sample,
        vec![
            sample_id(),
            FieldDescriptor::new("depth", ValueType::Number).with_semantic_type("obo:depth"),
        ],
    )
    .with_rows(&[&["S7", "five"]]);

    let joined = join(EntityKind::SAMPLE, &[resource]).unwrap();
    let entity = joined.entity("S7").unwrap();
    let err = classify(&joined.fields, entity, &UnitConversionTable::default()).unwrap_err();
    assert_matches!(
        err,
        LoaderError::NumericParseError { field, raw_value, entity_id }
            if field == "depth" && raw_value == "five" && entity_id == "S7"
    );
}

#[test]
fn typed_value_variants_cover_every_slot() {
    use planet_microbe_loader::classify::TypedRecord;

    let mut record = TypedRecord::default();
    record.push(TypedValue::Number(Some(1.0)));
    record.push(TypedValue::Text(Some("a".to_string())));
    record.push(TypedValue::Temporal(Some("2017-06-01".to_string())));
    record.push(TypedValue::Unknown);

    assert_eq!(record.number_values, vec![Some(1.0), None, None, None]);
    assert_eq!(
        record.string_values,
        vec![None, Some("a".to_string()), None, None]
    );
    assert_eq!(
        record.datetime_values,
        vec![None, None, Some("2017-06-01".to_string()), None]
    );
}
