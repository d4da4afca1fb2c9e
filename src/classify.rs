use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use tracing::trace;

use crate::domain::{CellValue, FieldDescriptor, LoadWarning, ValueType};
use crate::error::LoaderError;
use crate::geo::{Axis, CoordinateRole, coordinate_of};
use crate::join::{JoinedEntity, MergedField};
use crate::units::UnitConversionTable;

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Number(Option<f64>),
    Text(Option<String>),
    Temporal(Option<String>),
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypedRecord {
    #[serde(serialize_with = "serialize_numbers")]
    pub number_values: Vec<Option<f64>>,
    pub string_values: Vec<Option<String>>,
    pub datetime_values: Vec<Option<String>>,
}

impl TypedRecord {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            number_values: Vec::with_capacity(capacity),
            string_values: Vec::with_capacity(capacity),
            datetime_values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: TypedValue) {
        let (number, string, datetime) = match value {
            TypedValue::Number(number) => (number, None, None),
            TypedValue::Text(text) => (None, text, None),
            TypedValue::Temporal(datetime) => (None, None, datetime),
            TypedValue::Unknown => (None, None, None),
        };
        self.number_values.push(number);
        self.string_values.push(string);
        self.datetime_values.push(datetime);
    }

    pub fn len(&self) -> usize {
        self.number_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.number_values.is_empty()
    }
}

// NaN has no JSON number form.
fn serialize_numbers<S: Serializer>(values: &[Option<f64>], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for value in values {
        match value {
            Some(number) if number.is_nan() => seq.serialize_element("NaN")?,
            Some(number) => seq.serialize_element(number)?,
            None => seq.serialize_element(&Option::<f64>::None)?,
        }
    }
    seq.end()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub record: TypedRecord,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub warnings: Vec<LoadWarning>,
}

pub fn classify_value(
    field: &FieldDescriptor,
    cell: &CellValue,
    entity_id: &str,
    units: &UnitConversionTable,
) -> Result<TypedValue, LoaderError> {
    let value = match &field.value_type {
        ValueType::Number => TypedValue::Number(parse_number(field, cell, entity_id, units)?),
        ValueType::String | ValueType::Duration | ValueType::Time => {
            TypedValue::Text((!cell.is_null()).then(|| cell.to_string()))
        }
        ValueType::Datetime | ValueType::Date => {
            TypedValue::Temporal(cell.as_text().map(str::to_string))
        }
        ValueType::Other(_) => TypedValue::Unknown,
    };
    Ok(value)
}

fn parse_number(
    field: &FieldDescriptor,
    cell: &CellValue,
    entity_id: &str,
    units: &UnitConversionTable,
) -> Result<Option<f64>, LoaderError> {
    let raw = match cell {
        CellValue::Null => return Ok(None),
        CellValue::NotANumber => return Ok(Some(f64::NAN)),
        CellValue::Text(raw) => raw,
    };
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| LoaderError::NumericParseError {
            field: field.name.clone(),
            raw_value: raw.clone(),
            entity_id: entity_id.to_string(),
        })?;

    let quantity = field.semantic_type.as_deref().unwrap_or(&field.name);
    let converted = match field.unit_type.as_deref() {
        Some(unit) => units.convert(quantity, unit, value).1,
        None => value,
    };
    Ok(Some(converted))
}

pub fn classify(
    fields: &[MergedField],
    entity: &JoinedEntity,
    units: &UnitConversionTable,
) -> Result<Classified, LoaderError> {
    let cells = fields
        .iter()
        .map(|field| (&field.descriptor, entity.value(&field.key)));
    classify_cells(cells, fields.len(), &entity.id, units)
}

/// Classifies one row of a resource against the resource's own fields.
pub fn classify_row(
    fields: &[FieldDescriptor],
    cells: &[CellValue],
    entity_id: &str,
    units: &UnitConversionTable,
) -> Result<Classified, LoaderError> {
    classify_cells(fields.iter().zip(cells), fields.len(), entity_id, units)
}

fn classify_cells<'a>(
    cells: impl Iterator<Item = (&'a FieldDescriptor, &'a CellValue)>,
    capacity: usize,
    entity_id: &str,
    units: &UnitConversionTable,
) -> Result<Classified, LoaderError> {
    let mut record = TypedRecord::with_capacity(capacity);
    let mut by_role: [(Vec<f64>, Vec<f64>); 3] = Default::default();
    let mut warnings = Vec::new();

    for (descriptor, cell) in cells {
        let value = classify_value(descriptor, cell, entity_id, units)?;

        match &value {
            TypedValue::Number(Some(number)) => {
                let coordinate = descriptor.semantic_type.as_deref().and_then(coordinate_of);
                if let Some((axis, role)) = coordinate {
                    trace!(entity = entity_id, %axis, %role, value = *number, "coordinate");
                    let (latitudes, longitudes) = &mut by_role[role.index()];
                    match axis {
                        Axis::Latitude => latitudes.push(*number),
                        Axis::Longitude => longitudes.push(*number),
                    }
                }
            }
            TypedValue::Unknown => {
                let warning = LoadWarning::UnknownType {
                    entity_id: entity_id.to_string(),
                    field: descriptor.name.clone(),
                    declared_type: descriptor.value_type.to_string(),
                };
                warning.emit();
                warnings.push(warning);
            }
            _ => {}
        }
        record.push(value);
    }

    let (latitudes, longitudes) = pair_coordinates(entity_id, by_role, &mut warnings)?;
    Ok(Classified {
        record,
        latitudes,
        longitudes,
        warnings,
    })
}

/// Flattens per-role coordinates into point, start, end order. A role
/// with only one axis present contributes nothing.
fn pair_coordinates(
    entity_id: &str,
    by_role: [(Vec<f64>, Vec<f64>); 3],
    warnings: &mut Vec<LoadWarning>,
) -> Result<(Vec<f64>, Vec<f64>), LoaderError> {
    let mut latitudes = Vec::new();
    let mut longitudes = Vec::new();

    for (role, (lats, lngs)) in CoordinateRole::ALL.into_iter().zip(by_role) {
        if lats.is_empty() && lngs.is_empty() {
            continue;
        }
        if lats.is_empty() || lngs.is_empty() {
            let warning = LoadWarning::IncompleteCoordinates {
                entity_id: entity_id.to_string(),
                role: role.to_string(),
            };
            warning.emit();
            warnings.push(warning);
            continue;
        }
        if lats.len() != lngs.len() {
            return Err(LoaderError::CoordinateCountMismatch {
                entity_id: entity_id.to_string(),
                latitudes: lats.len(),
                longitudes: lngs.len(),
            });
        }
        latitudes.extend(lats);
        longitudes.extend(lngs);
    }
    Ok((latitudes, longitudes))
}
