use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::Builder;

use crate::classify::TypedRecord;
use crate::domain::{EntityKind, FieldDescriptor, ResourceType};
use crate::error::LoaderError;
use crate::geo::GeoLocation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRecord {
    pub id: String,
    pub parents: Vec<String>,
    pub location: GeoLocation,
    #[serde(flatten)]
    pub values: TypedRecord,
}

/// One ctd or niskin row attached to its sampling event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDataRecord {
    pub sampling_event: String,
    pub line: usize,
    #[serde(flatten)]
    pub values: TypedRecord,
}

pub trait EntitySink {
    fn write_schema(
        &mut self,
        package: &str,
        kind: &EntityKind,
        fields: &[FieldDescriptor],
    ) -> Result<(), LoaderError>;

    fn write_entity(
        &mut self,
        package: &str,
        kind: &EntityKind,
        record: &EntityRecord,
    ) -> Result<(), LoaderError>;

    fn write_event_data_schema(
        &mut self,
        package: &str,
        resource: &str,
        resource_type: ResourceType,
        fields: &[FieldDescriptor],
    ) -> Result<(), LoaderError>;

    fn write_event_data(
        &mut self,
        package: &str,
        resource: &str,
        record: &EventDataRecord,
    ) -> Result<(), LoaderError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl EntitySink for DiscardSink {
    fn write_schema(&mut self, _: &str, _: &EntityKind, _: &[FieldDescriptor]) -> Result<(), LoaderError> {
        Ok(())
    }

    fn write_entity(&mut self, _: &str, _: &EntityKind, _: &EntityRecord) -> Result<(), LoaderError> {
        Ok(())
    }

    fn write_event_data_schema(
        &mut self,
        _: &str,
        _: &str,
        _: ResourceType,
        _: &[FieldDescriptor],
    ) -> Result<(), LoaderError> {
        Ok(())
    }

    fn write_event_data(&mut self, _: &str, _: &str, _: &EventDataRecord) -> Result<(), LoaderError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct SchemaFile<'a> {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    fields: &'a [FieldDescriptor],
}

#[derive(Serialize)]
struct EntityLine<'a> {
    #[serde(flatten)]
    record: &'a EntityRecord,
    wkt: Option<String>,
}

/// Writes one directory per package: `schema-<kind>.json` and one JSON
/// line per entity in `<kind>.jsonl`. Event data resources go to
/// `schema-data-<resource>.json` and `data-<resource>.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: Utf8PathBuf,
}

impl JsonStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn package_dir(&self, package: &str) -> Utf8PathBuf {
        self.root.join(sanitize(package))
    }

    pub fn schema_path(&self, package: &str, kind: &EntityKind) -> Utf8PathBuf {
        self.package_dir(package)
            .join(format!("schema-{}.json", kind.name))
    }

    pub fn entities_path(&self, package: &str, kind: &EntityKind) -> Utf8PathBuf {
        self.package_dir(package).join(format!("{}.jsonl", kind.name))
    }

    pub fn event_data_schema_path(&self, package: &str, resource: &str) -> Utf8PathBuf {
        self.package_dir(package)
            .join(format!("schema-data-{}.json", sanitize(resource)))
    }

    pub fn event_data_path(&self, package: &str, resource: &str) -> Utf8PathBuf {
        self.package_dir(package)
            .join(format!("data-{}.jsonl", sanitize(resource)))
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), LoaderError> {
        let parent = path
            .parent()
            .ok_or_else(|| LoaderError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("pm-load")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn start_dataset(
        schema_path: &Utf8Path,
        lines_path: &Utf8Path,
        schema: &SchemaFile<'_>,
    ) -> Result<(), LoaderError> {
        let content = serde_json::to_vec_pretty(schema)
            .map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(schema_path, &content)?;
        Self::write_bytes_atomic(lines_path, b"")
    }

    fn append_line<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), LoaderError> {
        let mut content =
            serde_json::to_vec(value).map_err(|err| LoaderError::Filesystem(err.to_string()))?;
        content.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|err| LoaderError::Filesystem(format!("open {path}: {err}")))?;
        file.write_all(&content)
            .map_err(|err| LoaderError::Filesystem(err.to_string()))
    }
}

impl EntitySink for JsonStore {
    fn write_schema(
        &mut self,
        package: &str,
        kind: &EntityKind,
        fields: &[FieldDescriptor],
    ) -> Result<(), LoaderError> {
        let schema = SchemaFile {
            name: format!("{package} - {}", kind.name),
            kind: kind.name.to_string(),
            fields,
        };
        Self::start_dataset(
            &self.schema_path(package, kind),
            &self.entities_path(package, kind),
            &schema,
        )
    }

    fn write_entity(
        &mut self,
        package: &str,
        kind: &EntityKind,
        record: &EntityRecord,
    ) -> Result<(), LoaderError> {
        let line = EntityLine {
            record,
            wkt: record.location.to_wkt(),
        };
        Self::append_line(&self.entities_path(package, kind), &line)
    }

    fn write_event_data_schema(
        &mut self,
        package: &str,
        resource: &str,
        resource_type: ResourceType,
        fields: &[FieldDescriptor],
    ) -> Result<(), LoaderError> {
        let schema = SchemaFile {
            name: format!("{package} - {resource}"),
            kind: resource_type.to_string(),
            fields,
        };
        Self::start_dataset(
            &self.event_data_schema_path(package, resource),
            &self.event_data_path(package, resource),
            &schema,
        )
    }

    fn write_event_data(
        &mut self,
        package: &str,
        resource: &str,
        record: &EventDataRecord,
    ) -> Result<(), LoaderError> {
        Self::append_line(&self.event_data_path(package, resource), record)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
