use std::fmt;

/// Row discriminator inside a tenant partition of the office collection.
///
/// The organization row and every office row share the tenant alias as
/// partition key; the sort key tells them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantEntity {
    Organization,
    Office(String),
}

impl TenantEntity {
    pub const ORGANIZATION: &'static str = "organization";
    pub const OFFICE_PREFIX: &'static str = "OFFICE#";

    pub fn office(office_id: impl Into<String>) -> Self {
        TenantEntity::Office(office_id.into())
    }

    /// Parse a stored sort key. Unknown shapes yield `None`.
    pub fn parse(entity_id: &str) -> Option<Self> {
        if entity_id == Self::ORGANIZATION {
            return Some(TenantEntity::Organization);
        }
        entity_id
            .strip_prefix(Self::OFFICE_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|id| TenantEntity::Office(id.to_string()))
    }
}

impl fmt::Display for TenantEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantEntity::Organization => f.write_str(Self::ORGANIZATION),
            TenantEntity::Office(id) => write!(f, "{}{}", Self::OFFICE_PREFIX, id),
        }
    }
}
