use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::audit::Audit;

/// Tag taxonomy. GLOBAL tags have no tenant scope and are visible to every
/// tenant; all other types carry (or imply) a tenant_id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagType {
    Global,
    Tenant,
    User,
    Device,
    Folder,
    UserCreated,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Global => "GLOBAL",
            TagType::Tenant => "TENANT",
            TagType::User => "USER",
            TagType::Device => "DEVICE",
            TagType::Folder => "FOLDER",
            TagType::UserCreated => "USER_CREATED",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GLOBAL" => Ok(TagType::Global),
            "TENANT" => Ok(TagType::Tenant),
            "USER" => Ok(TagType::User),
            "DEVICE" => Ok(TagType::Device),
            "FOLDER" => Ok(TagType::Folder),
            "USER_CREATED" => Ok(TagType::UserCreated),
            other => Err(format!("unknown tag type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// None means a GLOBAL tag, visible across all tenants.
    pub tenant_id: Option<i64>,
    pub tag_type: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl Tag {
    pub fn tag_type(&self) -> Option<TagType> {
        self.tag_type.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_type_round_trips_through_db_strings() {
        for t in [
            TagType::Global,
            TagType::Tenant,
            TagType::User,
            TagType::Device,
            TagType::Folder,
            TagType::UserCreated,
        ] {
            assert_eq!(t.as_str().parse::<TagType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_tag_type_is_rejected() {
        assert!("WIDGET".parse::<TagType>().is_err());
    }
}
