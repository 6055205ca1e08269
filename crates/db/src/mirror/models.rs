use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an upsert created a row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    pub external_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub owner_id: Option<String>,
    pub lifecycle_stage: Option<String>,
    pub created_at_crm: Option<DateTime<Utc>>,
    pub updated_at_crm: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
    pub batch_id: Uuid,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealRecord {
    pub external_id: String,
    pub name: Option<String>,
    pub stage: Option<String>,
    pub pipeline: Option<String>,
    /// Canonical monetary value: the CRM `amount` property (full contract value).
    pub amount: Option<f64>,
    pub owner_id: Option<String>,
    pub contact_id: Option<String>,
    pub created_at_crm: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at_crm: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
    pub batch_id: Uuid,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
    #[default]
    Unknown,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for CallDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            "unknown" | "" => Ok(Self::Unknown),
            other => Err(format!("unknown call direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub external_id: String,
    pub direction: CallDirection,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub duration_ms: Option<i64>,
    pub disposition: Option<String>,
    pub owner_id: Option<String>,
    pub call_timestamp: Option<DateTime<Utc>>,
    pub updated_at_crm: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
    pub batch_id: Uuid,
    pub synced_at: DateTime<Utc>,
}

/// Phone-bearing slice of a contact, enough to build the resolution index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPhones {
    pub external_id: String,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub owner_id: Option<String>,
    /// `updated_at_crm`, falling back to the local sync time.
    pub last_updated: DateTime<Utc>,
}

/// Number-bearing slice of a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNumbers {
    pub external_id: String,
    pub direction: CallDirection,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub call_timestamp: Option<DateTime<Utc>>,
}

impl CallNumbers {
    /// The other party's number: caller for inbound, callee otherwise.
    pub fn counterpart_number(&self) -> Option<&str> {
        match self.direction {
            CallDirection::Inbound => self.from_number.as_deref(),
            CallDirection::Outbound => self.to_number.as_deref(),
            CallDirection::Unknown => self
                .to_number
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .or(self.from_number.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(direction: CallDirection, from: Option<&str>, to: Option<&str>) -> CallNumbers {
        CallNumbers {
            external_id: "c1".to_string(),
            direction,
            from_number: from.map(str::to_string),
            to_number: to.map(str::to_string),
            call_timestamp: None,
        }
    }

    #[test]
    fn inbound_counterpart_is_caller() {
        let c = call(CallDirection::Inbound, Some("+1 555 0100"), Some("+1 555 0199"));
        assert_eq!(c.counterpart_number(), Some("+1 555 0100"));
    }

    #[test]
    fn outbound_counterpart_is_callee() {
        let c = call(CallDirection::Outbound, Some("+1 555 0100"), Some("+1 555 0199"));
        assert_eq!(c.counterpart_number(), Some("+1 555 0199"));
    }

    #[test]
    fn unknown_direction_falls_back_to_from() {
        let c = call(CallDirection::Unknown, Some("+1 555 0100"), Some("  "));
        assert_eq!(c.counterpart_number(), Some("+1 555 0100"));
    }

    #[test]
    fn direction_parses_upstream_casing() {
        assert_eq!("OUTBOUND".parse::<CallDirection>().unwrap(), CallDirection::Outbound);
        assert_eq!("".parse::<CallDirection>().unwrap(), CallDirection::Unknown);
        assert!("sideways".parse::<CallDirection>().is_err());
    }
}
