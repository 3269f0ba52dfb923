use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Protein,
    Peptide,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Protein => "protein",
            EntityKind::Peptide => "peptide",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = OppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "protein" => Ok(EntityKind::Protein),
            "peptide" => Ok(EntityKind::Peptide),
            other => Err(OppError::Configuration(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Protein,
    Peptide,
    Fasta,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Protein => "protein",
            ResourceType::Peptide => "peptide",
            ResourceType::Fasta => "fasta",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = OppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "protein" => Ok(ResourceType::Protein),
            "peptide" => Ok(ResourceType::Peptide),
            "fasta" => Ok(ResourceType::Fasta),
            other => Err(OppError::Configuration(format!(
                "unknown resource type: {other}"
            ))),
        }
    }
}

/// Stable document identifier derived from a natural key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guid(String);

impl Guid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Guid(value)
    }
}

/// Deterministic GUID over an arbitrary string: a v3 (name-based) UUID in
/// the DNS namespace, so the same input always yields the same identifier.
pub fn stable_guid(value: &str) -> Guid {
    Guid(Uuid::new_v3(&Uuid::NAMESPACE_DNS, value.as_bytes()).to_string())
}

/// Dataset identity is derived from the package name and version.
pub fn dataset_guid(package_name: &str, version: Option<&str>) -> Guid {
    let name = format!("{package_name}_ver.{}", version.unwrap_or("noversion"));
    stable_guid(&name)
}

/// Entity identity is derived from the dataset, the entity kind and the
/// entity's natural key. Distinct natural keys never collide within a
/// dataset because the composite string embeds all three parts.
pub fn entity_guid(dataset: &Guid, kind: EntityKind, natural_key: &str) -> Guid {
    stable_guid(&format!("{dataset}:{kind}:{natural_key}"))
}
