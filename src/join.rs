use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::domain::{CellValue, EntityKind, FieldDescriptor, FieldKey, LoadWarning};
use crate::error::LoaderError;
use crate::package::Resource;

#[derive(Debug, Clone, PartialEq)]
pub struct MergedField {
    pub key: FieldKey,
    pub descriptor: FieldDescriptor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedEntity {
    pub id: String,
    pub values: HashMap<FieldKey, CellValue>,
    pub parents: Vec<String>,
}

impl JoinedEntity {
    fn new(id: String) -> Self {
        Self {
            id,
            values: HashMap::new(),
            parents: Vec::new(),
        }
    }

    pub fn value(&self, key: &FieldKey) -> &CellValue {
        self.values.get(key).unwrap_or(&CellValue::Null)
    }

    fn add_parents(&mut self, parents: Vec<String>) {
        for parent in parents {
            if !self.parents.contains(&parent) {
                self.parents.push(parent);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub kind: EntityKind,
    pub fields: Vec<MergedField>,
    pub entities: Vec<JoinedEntity>,
    pub warnings: Vec<LoadWarning>,
    index: HashMap<String, usize>,
}

impl JoinOutput {
    pub fn entity(&self, id: &str) -> Option<&JoinedEntity> {
        self.index.get(id).map(|&pos| &self.entities[pos])
    }

    pub fn descriptors(&self) -> Vec<FieldDescriptor> {
        self.fields
            .iter()
            .map(|field| field.descriptor.clone())
            .collect()
    }

    pub fn parent_links(&self) -> BTreeMap<&str, &[String]> {
        self.entities
            .iter()
            .filter(|entity| !entity.parents.is_empty())
            .map(|entity| (entity.id.as_str(), entity.parents.as_slice()))
            .collect()
    }
}

#[derive(Debug)]
pub struct JoinSession {
    kind: EntityKind,
    fields: Vec<MergedField>,
    seen: HashSet<FieldKey>,
    entities: Vec<JoinedEntity>,
    index: HashMap<String, usize>,
    warnings: Vec<LoadWarning>,
}

struct StagedRow {
    entity_id: String,
    parents: Vec<String>,
    cells: Vec<CellValue>,
}

impl JoinSession {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            seen: HashSet::new(),
            entities: Vec::new(),
            index: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Joins one resource into the session.
    ///
    /// All rows are validated before anything is merged, so a failing
    /// resource leaves the session as it was.
    pub fn add_resource(&mut self, resource: &Resource) -> Result<(), LoaderError> {
        info!(
            resource = resource.name.as_str(),
            kind = self.kind.name,
            rows = resource.rows.len(),
            "joining resource"
        );

        let identifier_pos = resource
            .fields
            .iter()
            .position(|field| field.has_semantic_type(self.kind.identifier_type))
            .ok_or_else(|| LoaderError::MissingIdentifierField {
                resource: resource.name.clone(),
                semantic_type: self.kind.identifier_type.to_string(),
            })?;
        let parent_pos = self.kind.parent_type.and_then(|parent_type| {
            resource
                .fields
                .iter()
                .position(|field| field.has_semantic_type(parent_type))
        });

        let keys = resource
            .fields
            .iter()
            .map(|field| FieldKey::of(field, self.kind.identifier_type))
            .collect::<Vec<_>>();

        let staged = self.stage_rows(resource, identifier_pos, parent_pos)?;

        for (field, key) in resource.fields.iter().zip(&keys) {
            if !self.seen.insert(key.clone()) {
                // every resource repeats the identifier column
                if field.has_semantic_type(self.kind.identifier_type) {
                    continue;
                }
                self.warn(LoadWarning::RedundantField {
                    resource: resource.name.clone(),
                    field: field.name.clone(),
                    key: key.to_string(),
                });
                continue;
            }
            self.fields.push(MergedField {
                key: key.clone(),
                descriptor: field.clone(),
            });
        }

        for row in staged {
            let pos = self.entity_slot(row.entity_id);
            self.entities[pos].add_parents(row.parents);
            for ((field, key), cell) in resource.fields.iter().zip(&keys).zip(row.cells) {
                self.write_value(pos, &resource.name, field, key, cell);
            }
        }

        debug!(
            resource = resource.name.as_str(),
            fields = self.fields.len(),
            entities = self.entities.len(),
            "resource joined"
        );
        Ok(())
    }

    pub fn finish(self) -> JoinOutput {
        JoinOutput {
            kind: self.kind,
            fields: self.fields,
            entities: self.entities,
            warnings: self.warnings,
            index: self.index,
        }
    }

    fn stage_rows(
        &self,
        resource: &Resource,
        identifier_pos: usize,
        parent_pos: Option<usize>,
    ) -> Result<Vec<StagedRow>, LoaderError> {
        let expected = resource.fields.len();
        let mut staged = Vec::with_capacity(resource.rows.len());

        for row in &resource.rows {
            if row.values.len() != expected {
                return Err(LoaderError::RowLength {
                    resource: resource.name.clone(),
                    line: row.line,
                    expected,
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

            let entity_id = match cells[identifier_pos].as_text() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    return Err(LoaderError::InvalidEntityIdentifier {
                        resource: resource.name.clone(),
                        line: row.line,
                        value: row.values[identifier_pos].clone(),
                    });
                }
            };

            let parents = parent_pos
                .and_then(|pos| cells[pos].as_text())
                .map(split_parent_ids)
                .unwrap_or_default();

            staged.push(StagedRow {
                entity_id,
                parents,
                cells,
            });
        }
        Ok(staged)
    }

    fn entity_slot(&mut self, entity_id: String) -> usize {
        if let Some(&pos) = self.index.get(&entity_id) {
            return pos;
        }
        let pos = self.entities.len();
        self.index.insert(entity_id.clone(), pos);
        self.entities.push(JoinedEntity::new(entity_id));
        pos
    }

    fn write_value(
        &mut self,
        pos: usize,
        resource: &str,
        field: &FieldDescriptor,
        key: &FieldKey,
        cell: CellValue,
    ) {
        let entity = &mut self.entities[pos];
        let existing = match entity.values.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(cell);
                return;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if cell.is_null() || existing.same_value(&cell, &field.value_type) {
            return;
        }
        if existing.is_null() {
            *existing = cell;
            return;
        }

        let warning = LoadWarning::ValueMismatch {
            resource: resource.to_string(),
            entity_id: entity.id.clone(),
            key: key.to_string(),
            kept: existing.to_string(),
            discarded: cell.to_string(),
        };
        self.warn(warning);
    }

    fn warn(&mut self, warning: LoadWarning) {
        warning.emit();
        self.warnings.push(warning);
    }
}

pub fn join(kind: EntityKind, resources: &[Resource]) -> Result<JoinOutput, LoaderError> {
    let mut session = JoinSession::new(kind);
    for resource in resources {
        session.add_resource(resource)?;
    }
    Ok(session.finish())
}

pub fn split_parent_ids(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
