use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{FieldDescriptor, ResourceType};
use crate::error::LoaderError;

#[derive(Debug, Clone, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "pm:projectType", default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub path: String,
    #[serde(rename = "pm:resourceType", default = "other_resource_type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub dialect: Dialect,
    pub schema: TableSchema,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dialect {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_header")]
    pub header: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            header: default_header(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<FieldDescriptor>,
    #[serde(rename = "missingValues", default = "default_missing_values")]
    pub missing_values: Vec<String>,
    #[serde(rename = "belowDetectionLimitValues", default)]
    pub below_detection_limit: Vec<String>,
}

fn other_resource_type() -> ResourceType {
    ResourceType::Other
}

fn default_delimiter() -> String {
    "\t".to_string()
}

fn default_header() -> bool {
    true
}

pub fn default_missing_values() -> Vec<String> {
    vec![String::new()]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub line: usize,
    pub values: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub resource_type: ResourceType,
    pub fields: Vec<FieldDescriptor>,
    pub missing_values: Vec<String>,
    pub below_detection_limit: Vec<String>,
    pub rows: Vec<Row>,
}

impl Resource {
    pub fn new(name: impl Into<String>, resource_type: ResourceType, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            resource_type,
            fields,
            missing_values: default_missing_values(),
            below_detection_limit: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_missing_values(mut self, tokens: &[&str]) -> Self {
        self.missing_values = tokens.iter().map(|token| token.to_string()).collect();
        self
    }

    pub fn with_below_detection_limit(mut self, tokens: &[&str]) -> Self {
        self.below_detection_limit = tokens.iter().map(|token| token.to_string()).collect();
        self
    }

    pub fn with_rows(mut self, rows: &[&[&str]]) -> Self {
        for values in rows {
            let line = self.rows.len() + 2;
            self.rows.push(Row {
                line,
                values: values.iter().map(|value| value.to_string()).collect(),
            });
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct DataPackage {
    root: Utf8PathBuf,
    descriptor: PackageDescriptor,
}

impl DataPackage {
    pub fn open(path: &Utf8Path) -> Result<Self, LoaderError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| LoaderError::PackageRead(path.as_std_path().to_path_buf()))?;
        let descriptor: PackageDescriptor = serde_json::from_str(&content)
            .map_err(|err| LoaderError::PackageParse(err.to_string()))?;
        let root = path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        info!(package = descriptor.name.as_str(), path = %path, "opened data package");
        Ok(Self { root, descriptor })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    pub fn resources_of(&self, resource_type: ResourceType) -> Vec<&ResourceDescriptor> {
        self.descriptor
            .resources
            .iter()
            .filter(|resource| resource.resource_type == resource_type)
            .collect()
    }

    pub fn load_resources(&self, resource_type: ResourceType) -> Result<Vec<Resource>, LoaderError> {
        self.resources_of(resource_type)
            .into_iter()
            .map(|descriptor| self.read_resource(descriptor))
            .collect()
    }

    pub fn read_resource(&self, descriptor: &ResourceDescriptor) -> Result<Resource, LoaderError> {
        let path = self.root.join(&descriptor.path);
        let read_error = |message: String| LoaderError::ResourceRead {
            resource: descriptor.name.clone(),
            message,
        };

        let delimiter = match descriptor.dialect.delimiter.as_bytes() {
            [byte] => *byte,
            _ => {
                return Err(read_error(format!(
                    "unsupported delimiter {:?}",
                    descriptor.dialect.delimiter
                )));
            }
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(descriptor.dialect.header)
            .flexible(true)
            .from_path(path.as_std_path())
            .map_err(|err| read_error(format!("open {path}: {err}")))?;

        let expected = descriptor.schema.fields.len();
        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|err| read_error(err.to_string()))?;
            let line = record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(rows.len() + 1);
            if record.len() != expected {
                return Err(LoaderError::RowLength {
                    resource: descriptor.name.clone(),
                    line,
                    expected,
                    found: record.len(),
                });
            }
            rows.push(Row {
                line,
                values: record.iter().map(str::to_string).collect(),
            });
        }
        debug!(resource = descriptor.name.as_str(), rows = rows.len(), "read resource");

        Ok(Resource {
            name: descriptor.name.clone(),
            resource_type: descriptor.resource_type,
            fields: descriptor.schema.fields.clone(),
            missing_values: descriptor.schema.missing_values.clone(),
            below_detection_limit: descriptor.schema.below_detection_limit.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::ValueType;

    fn write_package(dir: &Utf8Path, data: &str) -> Utf8PathBuf {
        let descriptor = r#"{
            "name": "test-package",
            "pm:projectType": "marine metagenome",
            "resources": [{
                "name": "samples",
                "path": "data/samples.tsv",
                "pm:resourceType": "sample",
                "schema": {
                    "fields": [
                        {"name": "sample", "type": "string", "rdfType": "http://purl.obolibrary.org/obo/OBI_0001901"},
                        {"name": "depth", "type": "number", "rdfType": "obo:depth"}
                    ],
                    "missingValues": ["", "nd"],
                    "belowDetectionLimitValues": ["bdl"]
                }
            }, {
                "name": "ctd",
                "path": "data/ctd.tsv",
                "pm:resourceType": "ctd",
                "schema": {"fields": []}
            }]
        }"#;
        std::fs::create_dir_all(dir.join("data").as_std_path()).unwrap();
        std::fs::write(dir.join("data/samples.tsv").as_std_path(), data).unwrap();
        let path = dir.join("datapackage.json");
        std::fs::write(path.as_std_path(), descriptor).unwrap();
        path
    }

    #[test]
    fn reads_sample_resources() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = write_package(&dir, "sample\tdepth\nS1\t5\nS2\tbdl\n");

        let package = DataPackage::open(&path).unwrap();
        assert_eq!(package.name(), "test-package");
        assert_eq!(package.resources_of(ResourceType::Ctd).len(), 1);

        let resources = package.load_resources(ResourceType::Sample).unwrap();
        assert_eq!(resources.len(), 1);
        let resource = &resources[0];
        assert_eq!(resource.fields[1].value_type, ValueType::Number);
        assert_eq!(resource.missing_values, vec!["".to_string(), "nd".to_string()]);
        assert_eq!(resource.below_detection_limit, vec!["bdl".to_string()]);
        assert_eq!(resource.rows.len(), 2);
        assert_eq!(resource.rows[1].line, 3);
        assert_eq!(resource.rows[1].values, vec!["S2".to_string(), "bdl".to_string()]);
    }

    #[test]
    fn short_row_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = write_package(&dir, "sample\tdepth\nS1\n");

        let package = DataPackage::open(&path).unwrap();
        let err = package.load_resources(ResourceType::Sample).unwrap_err();
        assert_matches!(
            err,
            LoaderError::RowLength {
                line: 2,
                expected: 2,
                found: 1,
                ..
            }
        );
    }

    #[test]
    fn missing_descriptor_is_read_error() {
        let err = DataPackage::open(Utf8Path::new("/nonexistent/datapackage.json")).unwrap_err();
        assert_matches!(err, LoaderError::PackageRead(_));
    }
}
