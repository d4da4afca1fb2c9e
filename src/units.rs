use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{debug, warn};

use crate::domain::FieldDescriptor;
use crate::error::LoaderError;

pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub struct UnitConversion {
    pub preferred_unit_type: String,
    pub conversion_factor: f64,
    /// Added after scaling; zero for purely multiplicative conversions.
    pub offset: f64,
}

impl UnitConversion {
    pub fn apply(&self, value: f64) -> f64 {
        value * self.conversion_factor + self.offset
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnitConversionTable {
    entries: HashMap<String, HashMap<String, UnitConversion>>,
}

impl UnitConversionTable {
    pub fn load(path: &Path) -> Result<Self, LoaderError> {
        let file = File::open(path).map_err(|err| {
            LoaderError::Filesystem(format!("open unit conversions {}: {err}", path.display()))
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoaderError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        let mut table = Self::default();
        for result in reader.records() {
            let record = result.map_err(|err| LoaderError::MalformedReferenceData {
                line: err.position().map(|pos| pos.line() as usize).unwrap_or(0),
                reason: err.to_string(),
            })?;
            let line = record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(0);

            let quantity = record.get(0).unwrap_or("");
            if quantity.is_empty() || quantity.starts_with('#') {
                continue;
            }
            if record.len() < 4 {
                return Err(LoaderError::MalformedReferenceData {
                    line,
                    reason: format!("expected at least 4 fields, found {}", record.len()),
                });
            }

            let conversion_factor = parse_number(&record[3], line, "conversion factor")?;
            let offset = match record.get(4).map(str::trim) {
                Some(raw) if !raw.is_empty() => parse_number(raw, line, "offset")?,
                _ => 0.0,
            };

            table.insert(
                quantity,
                &record[2],
                UnitConversion {
                    preferred_unit_type: record[1].to_string(),
                    conversion_factor,
                    offset,
                },
            );
        }
        Ok(table)
    }

    pub fn insert(&mut self, quantity_type: &str, source_unit_type: &str, entry: UnitConversion) {
        let previous = self
            .entries
            .entry(quantity_type.to_string())
            .or_default()
            .insert(source_unit_type.to_string(), entry);
        if previous.is_some() {
            warn!(
                quantity = quantity_type,
                unit = source_unit_type,
                "duplicate unit conversion entry replaces earlier row"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the conversion for a source unit. A source unit registered
    /// under the wildcard quantity wins over any quantity-specific row.
    pub fn lookup(&self, quantity_type: &str, source_unit_type: &str) -> Option<&UnitConversion> {
        if let Some(entry) = self
            .entries
            .get(WILDCARD)
            .and_then(|units| units.get(source_unit_type))
        {
            return Some(entry);
        }
        self.entries
            .get(quantity_type)
            .and_then(|units| units.get(source_unit_type))
    }

    pub fn convert<'a>(
        &'a self,
        quantity_type: &str,
        source_unit_type: &'a str,
        value: f64,
    ) -> (&'a str, f64) {
        match self.lookup(quantity_type, source_unit_type) {
            Some(entry) => {
                let converted = entry.apply(value);
                debug!(
                    quantity = quantity_type,
                    from = source_unit_type,
                    to = entry.preferred_unit_type.as_str(),
                    value,
                    converted,
                    "converting units"
                );
                (entry.preferred_unit_type.as_str(), converted)
            }
            None => (source_unit_type, value),
        }
    }

    pub fn preferred_unit(&self, field: &FieldDescriptor) -> Option<&str> {
        let quantity = field.semantic_type.as_deref().unwrap_or(&field.name);
        let unit = field.unit_type.as_deref()?;
        self.lookup(quantity, unit)
            .map(|entry| entry.preferred_unit_type.as_str())
    }

    pub fn normalize_field_units(&self, fields: &mut [FieldDescriptor]) {
        for field in fields.iter_mut() {
            if let Some(unit) = self.preferred_unit(field) {
                field.unit_type = Some(unit.to_string());
            }
        }
    }
}

fn parse_number(raw: &str, line: usize, what: &str) -> Result<f64, LoaderError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| LoaderError::MalformedReferenceData {
            line,
            reason: format!("non-numeric {what} {raw:?}"),
        })
}
