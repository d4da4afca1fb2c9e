use crate::error::LoaderError;
use crate::join::{JoinedEntity, MergedField};

pub const CAMPAIGN_REQUIRED_FIELDS: [(&str, &[&str]); 6] = [
    ("deployment", &["http://purl.obolibrary.org/obo/PMO_00000007"]),
    (
        "start_location",
        &["http://purl.obolibrary.org/obo/pmo.owl/PMO_00000144"],
    ),
    (
        "end_location",
        &["http://purl.obolibrary.org/obo/pmo.owl/PMO_00000145"],
    ),
    (
        "start_time",
        &["http://purl.obolibrary.org/obo/pmo.owl/PMO_00000137"],
    ),
    (
        "end_time",
        &["http://purl.obolibrary.org/obo/pmo.owl/PMO_00000138"],
    ),
    (
        "urls",
        &[
            "http://purl.obolibrary.org/obo/pmo.owl/PMO_00000133",
            "http://purl.obolibrary.org/obo/PMO_00000047",
        ],
    ),
];

pub fn validate_campaign(fields: &[MergedField], entity: &JoinedEntity) -> Result<(), LoaderError> {
    for (name, purls) in CAMPAIGN_REQUIRED_FIELDS {
        let present = fields
            .iter()
            .filter(|field| {
                purls
                    .iter()
                    .any(|purl| field.descriptor.has_semantic_type(purl))
            })
            .any(|field| !entity.value(&field.key).is_null());
        if !present {
            return Err(LoaderError::MissingCampaignField {
                entity_id: entity.id.clone(),
                field: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::{CAMPAIGN_ID_PURL, EntityKind, FieldDescriptor, ResourceType, ValueType};
    use crate::join::join;
    use crate::package::Resource;

    fn campaign_fields() -> Vec<FieldDescriptor> {
        let mut fields = vec![
            FieldDescriptor::new("cruise", ValueType::String).with_semantic_type(CAMPAIGN_ID_PURL),
        ];
        for (name, purls) in CAMPAIGN_REQUIRED_FIELDS {
            fields.push(FieldDescriptor::new(name, ValueType::String).with_semantic_type(purls[0]));
        }
        fields
    }

    #[test]
    fn complete_campaign_passes() {
        let resource = Resource::new("cruises", ResourceType::Campaign, campaign_fields())
            .with_rows(&[&[
                "KM1709",
                "HOT",
                "Honolulu",
                "Honolulu",
                "2017-06-01",
                "2017-06-05",
                "https://hahana.soest.hawaii.edu",
            ]]);
        let joined = join(EntityKind::CAMPAIGN, &[resource]).unwrap();
        let entity = joined.entity("KM1709").unwrap();
        assert!(validate_campaign(&joined.fields, entity).is_ok());
    }

    #[test]
    fn missing_end_time_is_reported() {
        let resource = Resource::new("cruises", ResourceType::Campaign, campaign_fields())
            .with_rows(&[&[
                "KM1709",
                "HOT",
                "Honolulu",
                "Honolulu",
                "2017-06-01",
                "",
                "https://hahana.soest.hawaii.edu",
            ]]);
        let joined = join(EntityKind::CAMPAIGN, &[resource]).unwrap();
        let entity = joined.entity("KM1709").unwrap();
        let err = validate_campaign(&joined.fields, entity).unwrap_err();
        assert_matches!(
            err,
            LoaderError::MissingCampaignField { entity_id, field }
                if entity_id == "KM1709" && field == "end_time"
        );
    }
}
