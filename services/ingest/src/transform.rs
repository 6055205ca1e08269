//! Upstream object to typed mirror record. The only place that knows CRM property names.

use chrono::{DateTime, TimeZone, Utc};
use crmirror_db::mirror::models::{CallDirection, CallRecord, ContactRecord, DealRecord};
use crmirror_db::owners::models::OwnerRecord;
use crmirror_db::sync::models::ObjectType;
use uuid::Uuid;

use crate::crm::models::{CrmObject, CrmOwner};

pub const CONTACT_PROPERTIES: &[&str] = &[
    "email",
    "firstname",
    "lastname",
    "phone",
    "mobilephone",
    "hubspot_owner_id",
    "lifecyclestage",
    "createdate",
    "lastmodifieddate",
];

/// `amount` is the canonical value; `hs_mrr` is the recurring payment size and is only kept raw.
pub const DEAL_PROPERTIES: &[&str] = &[
    "dealname",
    "dealstage",
    "pipeline",
    "amount",
    "hs_mrr",
    "hubspot_owner_id",
    "createdate",
    "closedate",
    "hs_lastmodifieddate",
];

pub const CALL_PROPERTIES: &[&str] = &[
    "hs_call_direction",
    "hs_call_from_number",
    "hs_call_to_number",
    "hs_call_duration",
    "hs_call_disposition",
    "hubspot_owner_id",
    "hs_timestamp",
    "hs_lastmodifieddate",
];

/// Property projection requested for an object type. Owners have a fixed shape.
pub fn properties(object_type: ObjectType) -> &'static [&'static str] {
    match object_type {
        ObjectType::Contacts => CONTACT_PROPERTIES,
        ObjectType::Deals => DEAL_PROPERTIES,
        ObjectType::Calls => CALL_PROPERTIES,
        ObjectType::Owners => &[],
    }
}

/// Property the incremental search filters and sorts on.
pub fn modified_property(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Contacts => "lastmodifieddate",
        _ => "hs_lastmodifieddate",
    }
}

pub fn associations(object_type: ObjectType) -> Option<&'static str> {
    match object_type {
        ObjectType::Deals | ObjectType::Calls => Some("contacts"),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DataShapeError {
    #[error("malformed object: {0}")]
    Malformed(String),

    #[error("object {object_id}: invalid {field} value {value:?}")]
    InvalidValue {
        object_id: String,
        field: &'static str,
        value: String,
    },
}

impl From<DataShapeError> for crmirror_common::error::CrmirrorError {
    fn from(err: DataShapeError) -> Self {
        Self::DataShape(err.to_string())
    }
}

/// A transformed record ready for the store that owns its object type.
#[derive(Debug, Clone)]
pub enum MirrorRecord {
    Contact(ContactRecord),
    Deal(DealRecord),
    Call(CallRecord),
    Owner(OwnerRecord),
}

impl MirrorRecord {
    pub fn external_id(&self) -> &str {
        match self {
            Self::Contact(r) => &r.external_id,
            Self::Deal(r) => &r.external_id,
            Self::Call(r) => &r.external_id,
            Self::Owner(r) => &r.external_id,
        }
    }
}

/// Best-effort id for logging a record that failed to transform.
pub fn raw_id(value: &serde_json::Value) -> String {
    match value.get("id") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "<missing>".to_string(),
    }
}

pub fn transform(
    object_type: ObjectType,
    value: serde_json::Value,
    batch_id: Uuid,
    synced_at: DateTime<Utc>,
) -> Result<MirrorRecord, DataShapeError> {
    let record = match object_type {
        ObjectType::Owners => {
            let owner: CrmOwner = serde_json::from_value(value.clone())
                .map_err(|e| DataShapeError::Malformed(e.to_string()))?;
            require_id(&owner.id)?;
            MirrorRecord::Owner(OwnerRecord {
                name: owner.full_name(),
                email: owner.email.filter(|e| !e.trim().is_empty()),
                external_id: owner.id,
                raw: value,
                synced_at,
            })
        }
        ObjectType::Contacts => {
            let obj = parse_object(&value)?;
            MirrorRecord::Contact(ContactRecord {
                external_id: obj.id.clone(),
                email: owned(obj.prop("email")),
                first_name: owned(obj.prop("firstname")),
                last_name: owned(obj.prop("lastname")),
                phone: owned(obj.prop("phone")),
                mobile_phone: owned(obj.prop("mobilephone")),
                owner_id: owned(obj.prop("hubspot_owner_id")),
                lifecycle_stage: obj.prop("lifecyclestage").map(str::to_ascii_lowercase),
                created_at_crm: timestamp(&obj, "createdate")?,
                updated_at_crm: timestamp(&obj, "lastmodifieddate")?,
                raw: value,
                batch_id,
                synced_at,
            })
        }
        ObjectType::Deals => {
            let obj = parse_object(&value)?;
            MirrorRecord::Deal(DealRecord {
                external_id: obj.id.clone(),
                name: owned(obj.prop("dealname")),
                stage: obj.prop("dealstage").map(str::to_ascii_lowercase),
                pipeline: owned(obj.prop("pipeline")),
                amount: number(&obj, "amount")?,
                owner_id: owned(obj.prop("hubspot_owner_id")),
                contact_id: owned(obj.first_association("contacts")),
                created_at_crm: timestamp(&obj, "createdate")?,
                closed_at: timestamp(&obj, "closedate")?,
                updated_at_crm: timestamp(&obj, "hs_lastmodifieddate")?,
                raw: value,
                batch_id,
                synced_at,
            })
        }
        ObjectType::Calls => {
            let obj = parse_object(&value)?;
            MirrorRecord::Call(CallRecord {
                external_id: obj.id.clone(),
                direction: obj
                    .prop("hs_call_direction")
                    .and_then(|d| d.parse().ok())
                    .unwrap_or(CallDirection::Unknown),
                from_number: owned(obj.prop("hs_call_from_number")),
                to_number: owned(obj.prop("hs_call_to_number")),
                duration_ms: number(&obj, "hs_call_duration")?.map(|ms| ms.round() as i64),
                disposition: owned(obj.prop("hs_call_disposition")),
                owner_id: owned(obj.prop("hubspot_owner_id")),
                call_timestamp: timestamp(&obj, "hs_timestamp")?,
                updated_at_crm: timestamp(&obj, "hs_lastmodifieddate")?,
                raw: value,
                batch_id,
                synced_at,
            })
        }
    };

    Ok(record)
}

fn parse_object(value: &serde_json::Value) -> Result<CrmObject, DataShapeError> {
    let obj: CrmObject = serde_json::from_value(value.clone())
        .map_err(|e| DataShapeError::Malformed(e.to_string()))?;
    require_id(&obj.id)?;
    Ok(obj)
}

fn require_id(id: &str) -> Result<(), DataShapeError> {
    if id.trim().is_empty() {
        return Err(DataShapeError::Malformed("empty id".to_string()));
    }
    Ok(())
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// RFC 3339 or epoch milliseconds; the CRM uses both depending on the property.
fn timestamp(obj: &CrmObject, field: &'static str) -> Result<Option<DateTime<Utc>>, DataShapeError> {
    let Some(raw) = obj.prop(field) else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(Some)
        .ok_or_else(|| DataShapeError::InvalidValue {
            object_id: obj.id.clone(),
            field,
            value: raw.to_string(),
        })
}

fn number(obj: &CrmObject, field: &'static str) -> Result<Option<f64>, DataShapeError> {
    let Some(raw) = obj.prop(field) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(DataShapeError::InvalidValue {
            object_id: obj.id.clone(),
            field,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(object_type: ObjectType, value: serde_json::Value) -> Result<MirrorRecord, DataShapeError> {
        transform(object_type, value, Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn deal_keeps_canonical_amount_and_raw_payment_size() {
        let value = serde_json::json!({
            "id": "d1",
            "properties": {
                "dealname": "Annual plan",
                "dealstage": "closedwon",
                "amount": "12000",
                "hs_mrr": "1000",
                "createdate": "2026-03-02T10:00:00.000Z"
            },
            "associations": { "contacts": { "results": [{ "id": "c9", "type": "deal_to_contact" }] } }
        });

        let MirrorRecord::Deal(deal) = run(ObjectType::Deals, value).unwrap() else {
            panic!("expected deal");
        };
        assert_eq!(deal.amount, Some(12000.0));
        assert_eq!(deal.contact_id.as_deref(), Some("c9"));
        assert_eq!(deal.raw["properties"]["hs_mrr"], "1000");
        assert!(deal.created_at_crm.is_some());
    }

    #[test]
    fn call_direction_and_epoch_timestamp() {
        let value = serde_json::json!({
            "id": "call-1",
            "properties": {
                "hs_call_direction": "OUTBOUND",
                "hs_call_to_number": "+1 555 010 0123",
                "hs_call_duration": "65000",
                "hs_timestamp": "1772445600000"
            }
        });

        let MirrorRecord::Call(call) = run(ObjectType::Calls, value).unwrap() else {
            panic!("expected call");
        };
        assert_eq!(call.direction, CallDirection::Outbound);
        assert_eq!(call.duration_ms, Some(65000));
        assert_eq!(call.call_timestamp.map(|t| t.timestamp_millis()), Some(1772445600000));
    }

    #[test]
    fn unknown_direction_degrades_to_unknown() {
        let value = serde_json::json!({ "id": "call-2", "properties": { "hs_call_direction": "SIDEWAYS" } });
        let MirrorRecord::Call(call) = run(ObjectType::Calls, value).unwrap() else {
            panic!("expected call");
        };
        assert_eq!(call.direction, CallDirection::Unknown);
    }

    #[test]
    fn bad_amount_is_a_data_shape_error() {
        let value = serde_json::json!({ "id": "d2", "properties": { "amount": "lots" } });
        let err = run(ObjectType::Deals, value).unwrap_err();
        assert!(matches!(err, DataShapeError::InvalidValue { field: "amount", .. }));
    }

    #[test]
    fn missing_id_is_malformed() {
        let err = run(ObjectType::Contacts, serde_json::json!({ "properties": {} })).unwrap_err();
        assert!(matches!(err, DataShapeError::Malformed(_)));
        assert_eq!(raw_id(&serde_json::json!({ "properties": {} })), "<missing>");
    }

    #[test]
    fn contact_lifecycle_is_lowercased() {
        let value = serde_json::json!({
            "id": "k1",
            "properties": { "lifecyclestage": "Customer", "phone": "555 010 0123", "mobilephone": "" }
        });
        let MirrorRecord::Contact(c) = run(ObjectType::Contacts, value).unwrap() else {
            panic!("expected contact");
        };
        assert_eq!(c.lifecycle_stage.as_deref(), Some("customer"));
        assert_eq!(c.mobile_phone, None);
    }

    #[test]
    fn owner_name_joins_first_and_last() {
        let value = serde_json::json!({
            "id": "o1", "firstName": "Ana", "lastName": "Lima", "email": "ana@example.com"
        });
        let MirrorRecord::Owner(o) = run(ObjectType::Owners, value).unwrap() else {
            panic!("expected owner");
        };
        assert_eq!(o.name.as_deref(), Some("Ana Lima"));
        assert_eq!(o.external_id, "o1");
    }
}
