use serde::{Deserialize, Serialize};

/// Which side of a catering contract a company sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum CompanyType {
    #[serde(rename = "CATERING")]
    Catering,
    #[serde(rename = "CLIENT")]
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum CompanyStatus {
    #[default]
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "INACTIVE")]
    Inactive,
}

/// Public profile of the authenticated company, returned alongside tokens at
/// login. Stored verbatim; fields the console does not know about are kept in
/// `extra` so nothing the backend sent is lost on a round trip through disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "legalName", default)]
    pub legal_name: String,
    #[serde(rename = "taxId", default)]
    pub tax_id: String,
    #[serde(rename = "companyType")]
    pub company_type: CompanyType,
    #[serde(default)]
    pub status: CompanyStatus,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: String,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Account {
    pub fn is_catering(&self) -> bool {
        self.company_type == CompanyType::Catering
    }

    pub fn is_client(&self) -> bool {
        self.company_type == CompanyType::Client
    }

    /// Name for headers and prompts; legal name when no display name is set.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.legal_name
        } else {
            &self.name
        }
    }
}

impl std::fmt::Display for CompanyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanyType::Catering => write!(f, "catering"),
            CompanyType::Client => write!(f, "client"),
        }
    }
}
