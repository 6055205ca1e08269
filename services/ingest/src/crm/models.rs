use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One page of a CRM v3 collection. Results stay untyped so a malformed record
/// fails on its own instead of failing the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    pub paging: Option<Paging>,
}

impl Page {
    /// Cursor of the following page, `None` on the last one.
    pub fn next_after(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_ref())
            .map(|n| n.after.as_str())
            .filter(|after| !after.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    pub next: Option<NextPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextPage {
    pub after: String,
}

/// A contact, deal or call object (`/crm/v3/objects/{type}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmObject {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Option<String>>,
    #[serde(default)]
    pub associations: HashMap<String, AssociationList>,
    #[serde(default)]
    pub archived: bool,
}

impl CrmObject {
    /// Property value with blanks treated as absent.
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// First associated object id of a kind, e.g. `contacts`.
    pub fn first_association(&self, kind: &str) -> Option<&str> {
        self.associations
            .get(kind)
            .and_then(|list| list.results.first())
            .map(|a| a.id.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssociationList {
    #[serde(default)]
    pub results: Vec<AssociationRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// A sales owner (`/crm/v3/owners`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmOwner {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl CrmOwner {
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_deal_with_association() {
        let json = r#"{
            "id": "9001",
            "properties": { "dealname": "Renewal", "amount": "1200.50", "closedate": null },
            "associations": {
                "contacts": { "results": [ { "id": "501", "type": "deal_to_contact" } ] }
            },
            "archived": false
        }"#;
        let obj: CrmObject = serde_json::from_str(json).expect("should deserialize");
        assert_eq!(obj.id, "9001");
        assert_eq!(obj.prop("amount"), Some("1200.50"));
        assert_eq!(obj.prop("closedate"), None);
        assert_eq!(obj.first_association("contacts"), Some("501"));
    }

    #[test]
    fn blank_property_is_absent() {
        let json = r#"{ "id": "1", "properties": { "phone": "   " } }"#;
        let obj: CrmObject = serde_json::from_str(json).unwrap();
        assert_eq!(obj.prop("phone"), None);
        assert_eq!(obj.first_association("contacts"), None);
    }

    #[test]
    fn last_page_has_no_cursor() {
        let page: Page = serde_json::from_str(r#"{ "results": [] }"#).unwrap();
        assert_eq!(page.next_after(), None);

        let page: Page =
            serde_json::from_str(r#"{ "results": [], "paging": { "next": { "after": "100" } } }"#)
                .unwrap();
        assert_eq!(page.next_after(), Some("100"));
    }

    #[test]
    fn owner_full_name_skips_blank_parts() {
        let owner: CrmOwner =
            serde_json::from_str(r#"{ "id": "7", "firstName": "Ana", "lastName": " " }"#).unwrap();
        assert_eq!(owner.full_name().as_deref(), Some("Ana"));
    }
}
