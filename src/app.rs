use std::collections::HashSet;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::campaign::validate_campaign;
use crate::classify::{classify, classify_row};
use crate::domain::{CellValue, EntityKind, LoadWarning, ResourceType, SAMPLING_EVENT_ID_PURL};
use crate::error::LoaderError;
use crate::geo::{DEFAULT_COORDINATE_TOLERANCE, aggregate};
use crate::join::JoinSession;
use crate::package::{DataPackage, Resource};
use crate::store::{EntityRecord, EntitySink, EventDataRecord};
use crate::units::UnitConversionTable;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub coordinate_tolerance: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            coordinate_tolerance: DEFAULT_COORDINATE_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub package: String,
    pub title: Option<String>,
    pub project_type: Option<String>,
    pub loaded_at: String,
    pub kinds: Vec<KindSummary>,
    pub warnings: Vec<LoadWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindSummary {
    pub kind: String,
    pub resources: usize,
    pub fields: usize,
    pub entities: usize,
    pub located: usize,
}

#[derive(Debug, Clone)]
pub struct KindOutcome {
    pub summary: KindSummary,
    pub records: Vec<EntityRecord>,
    pub warnings: Vec<LoadWarning>,
}

impl KindOutcome {
    pub fn ids(&self) -> HashSet<&str> {
        self.records.iter().map(|record| record.id.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<S: EntitySink> {
    sink: S,
    units: UnitConversionTable,
}

impl<S: EntitySink> App<S> {
    pub fn new(sink: S, units: UnitConversionTable) -> Self {
        Self { sink, units }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn load_package(
        &mut self,
        path: &Utf8Path,
        options: &LoadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<LoadResult, LoaderError> {
        let package = DataPackage::open(path)?;
        let name = package.name();
        progress.event(ProgressEvent {
            message: format!("phase=Resolve; package {name}"),
            elapsed: None,
        });

        if package.resources_of(ResourceType::Sample).is_empty() {
            return Err(LoaderError::MissingResourceType(ResourceType::Sample.to_string()));
        }

        let campaigns = package.load_resources(ResourceType::Campaign)?;
        let events = package.load_resources(ResourceType::SamplingEvent)?;
        let samples = package.load_resources(ResourceType::Sample)?;
        let mut event_data = package.load_resources(ResourceType::Ctd)?;
        event_data.extend(package.load_resources(ResourceType::Niskin)?);

        let mut warnings = Vec::new();
        let mut kinds = Vec::new();

        let campaign_outcome = if campaigns.is_empty() {
            info!(package = name, "no campaign resources");
            None
        } else {
            Some(self.load_kind(name, EntityKind::CAMPAIGN, &campaigns, options, progress)?)
        };
        let event_outcome =
            self.load_kind(name, EntityKind::SAMPLING_EVENT, &events, options, progress)?;
        let sample_outcome =
            self.load_kind(name, EntityKind::SAMPLE, &samples, options, progress)?;

        let event_ids = event_outcome.ids();
        let mut data_summaries = Vec::with_capacity(event_data.len());
        for resource in &event_data {
            let (summary, data_warnings) =
                self.load_event_data(name, resource, &event_ids, progress)?;
            data_summaries.push(summary);
            warnings.extend(data_warnings);
        }

        if let Some(campaign_outcome) = &campaign_outcome {
            warnings.extend(campaign_outcome.warnings.iter().cloned());
            warnings.extend(unresolved_parents(&event_outcome, campaign_outcome));
        }
        warnings.extend(event_outcome.warnings.iter().cloned());
        warnings.extend(sample_outcome.warnings.iter().cloned());
        warnings.extend(unresolved_parents(&sample_outcome, &event_outcome));

        if let Some(campaign_outcome) = campaign_outcome {
            kinds.push(campaign_outcome.summary);
        }
        kinds.push(event_outcome.summary);
        kinds.push(sample_outcome.summary);
        kinds.extend(data_summaries);

        Ok(LoadResult {
            package: name.to_string(),
            title: package.descriptor().title.clone(),
            project_type: package.descriptor().project_type.clone(),
            loaded_at: iso_timestamp(),
            kinds,
            warnings,
        })
    }

    /// Stores every row of a ctd or niskin resource against its sampling
    /// event. Rows naming an event that was not loaded abort the package.
    pub fn load_event_data(
        &mut self,
        package: &str,
        resource: &Resource,
        events: &HashSet<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<(KindSummary, Vec<LoadWarning>), LoaderError> {
        let start = Instant::now();
        let event_pos = resource
            .fields
            .iter()
            .position(|field| field.has_semantic_type(SAMPLING_EVENT_ID_PURL))
            .ok_or_else(|| LoaderError::MissingIdentifierField {
                resource: resource.name.clone(),
                semantic_type: SAMPLING_EVENT_ID_PURL.to_string(),
            })?;

        let mut fields = resource.fields.clone();
        self.units.normalize_field_units(&mut fields);
        self.sink
            .write_event_data_schema(package, &resource.name, resource.resource_type, &fields)?;

        let mut warnings = Vec::new();
        for row in &resource.rows {
            if row.values.len() != resource.fields.len() {
                return Err(LoaderError::RowLength {
                    resource: resource.name.clone(),
                    line: row.line,
                    expected: resource.fields.len(),
                    found: row.values.len(),
                });
            }
            let cells = row
                .values
                .iter()
                .map(|raw| {
                    CellValue::from_raw(raw, &resource.missing_values, &resource.below_detection_limit)
                })
                .collect::<Vec<_>>();

            let event_id = match cells[event_pos].as_text() {
                Some(id) if !id.is_empty() => id,
                _ => {
                    return Err(LoaderError::InvalidEntityIdentifier {
                        resource: resource.name.clone(),
                        line: row.line,
                        value: row.values[event_pos].clone(),
                    });
                }
            };
            if !events.contains(event_id) {
                return Err(LoaderError::SamplingEventNotFound {
                    resource: resource.name.clone(),
                    line: row.line,
                    event_id: event_id.to_string(),
                });
            }

            let classified = classify_row(&resource.fields, &cells, event_id, &self.units)?;
            warnings.extend(classified.warnings);
            let record = EventDataRecord {
                sampling_event: event_id.to_string(),
                line: row.line,
                values: classified.record,
            };
            self.sink.write_event_data(package, &resource.name, &record)?;
        }

        info!(
            package,
            resource = resource.name.as_str(),
            rows = resource.rows.len(),
            "loaded sampling event data"
        );
        progress.event(ProgressEvent {
            message: format!(
                "phase=Store; {} {} rows",
                resource.rows.len(),
                resource.resource_type
            ),
            elapsed: Some(start.elapsed()),
        });

        Ok((
            KindSummary {
                kind: resource.resource_type.to_string(),
                resources: 1,
                fields: fields.len(),
                entities: resource.rows.len(),
                located: 0,
            },
            warnings,
        ))
    }

    pub fn load_kind(
        &mut self,
        package: &str,
        kind: EntityKind,
        resources: &[Resource],
        options: &LoadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<KindOutcome, LoaderError> {
        let start = Instant::now();
        let mut session = JoinSession::new(kind);
        for resource in resources {
            progress.event(ProgressEvent {
                message: format!("phase=Join; {} resource {}", kind.name, resource.name),
                elapsed: None,
            });
            session.add_resource(resource)?;
        }
        let joined = session.finish();
        let mut warnings = joined.warnings.clone();

        let mut fields = joined.descriptors();
        self.units.normalize_field_units(&mut fields);
        self.sink.write_schema(package, &kind, &fields)?;

        let mut records = Vec::with_capacity(joined.entities.len());
        let mut located = 0;
        for entity in &joined.entities {
            if kind == EntityKind::CAMPAIGN {
                validate_campaign(&joined.fields, entity)?;
            }
            let classified = classify(&joined.fields, entity, &self.units)?;
            let (location, geo_warnings) = aggregate(
                &entity.id,
                &classified.latitudes,
                &classified.longitudes,
                options.coordinate_tolerance,
            )?;
            warnings.extend(classified.warnings);
            warnings.extend(geo_warnings);
            if !location.is_empty() {
                located += 1;
            }

            let record = EntityRecord {
                id: entity.id.clone(),
                parents: entity.parents.clone(),
                location,
                values: classified.record,
            };
            self.sink.write_entity(package, &kind, &record)?;
            records.push(record);
        }

        info!(
            package,
            kind = kind.name,
            entities = records.len(),
            fields = fields.len(),
            "loaded entities"
        );
        progress.event(ProgressEvent {
            message: format!("phase=Store; {} {} records", records.len(), kind.name),
            elapsed: Some(start.elapsed()),
        });

        Ok(KindOutcome {
            summary: KindSummary {
                kind: kind.name.to_string(),
                resources: resources.len(),
                fields: fields.len(),
                entities: records.len(),
                located,
            },
            records,
            warnings,
        })
    }
}

pub fn unresolved_parents(children: &KindOutcome, parents: &KindOutcome) -> Vec<LoadWarning> {
    let known = parents.ids();
    let mut warnings = Vec::new();
    for record in &children.records {
        for parent in &record.parents {
            if !known.contains(parent.as_str()) {
                let warning = LoadWarning::UnresolvedParent {
                    entity_id: record.id.clone(),
                    parent_id: parent.clone(),
                };
                warning.emit();
                warnings.push(warning);
            }
        }
    }
    warnings
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
