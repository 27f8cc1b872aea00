//! Canonical tag model
//!
//! The vendor-neutral record every other component reads and writes.
//! Addresses stay vendor-native strings here; only the vendor translators
//! understand their grammar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Project identifier (owned by the external project service)
pub type ProjectId = i64;

/// Supported PLC vendors
///
/// Rockwell is vendor "A", Siemens vendor "B", Beckhoff vendor "C".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Rockwell,
    Siemens,
    Beckhoff,
}

impl Vendor {
    pub const ALL: [Vendor; 3] = [Vendor::Rockwell, Vendor::Siemens, Vendor::Beckhoff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Rockwell => "rockwell",
            Vendor::Siemens => "siemens",
            Vendor::Beckhoff => "beckhoff",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rockwell" | "a" | "ab" | "allen-bradley" | "allen_bradley" => Ok(Vendor::Rockwell),
            "siemens" | "b" | "s7" | "tia" => Ok(Vendor::Siemens),
            "beckhoff" | "c" | "twincat" | "codesys" => Ok(Vendor::Beckhoff),
            other => Err(Error::InvalidInput(format!("Unknown vendor: {}", other))),
        }
    }
}

/// Canonical data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int16,
    Int32,
    Real,
    String,
    Timer,
    Counter,
}

impl DataType {
    pub const ALL: [DataType; 7] = [
        DataType::Bool,
        DataType::Int16,
        DataType::Int32,
        DataType::Real,
        DataType::String,
        DataType::Timer,
        DataType::Counter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Real => "real",
            DataType::String => "string",
            DataType::Timer => "timer",
            DataType::Counter => "counter",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown data type: {}", s)))
    }
}

/// Declaration scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Local,
    Input,
    Output,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Local => "local",
            Scope::Input => "input",
            Scope::Output => "output",
        }
    }

    /// Input and output tags are expected to be wired to a physical address
    pub fn is_io(&self) -> bool {
        matches!(self, Scope::Input | Scope::Output)
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" | "public" => Ok(Scope::Global),
            "local" | "private" => Ok(Scope::Local),
            "input" => Ok(Scope::Input),
            "output" => Ok(Scope::Output),
            other => Err(Error::InvalidInput(format!("Unknown scope: {}", other))),
        }
    }
}

/// Memory area an address points into, as far as categorisation cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaKind {
    Input,
    Output,
    Memory,
}

/// Tag category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Input,
    Output,
    Memory,
    Temp,
    Constant,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Input => "input",
            Category::Output => "output",
            Category::Memory => "memory",
            Category::Temp => "temp",
            Category::Constant => "constant",
        }
    }

    /// Infer a category when the source does not state one
    ///
    /// The address area wins over the scope; scope only decides for
    /// unaddressed tags.
    pub fn infer(scope: Scope, area: Option<AreaKind>) -> Category {
        match area {
            Some(AreaKind::Input) => Category::Input,
            Some(AreaKind::Output) => Category::Output,
            Some(AreaKind::Memory) => Category::Memory,
            None => match scope {
                Scope::Input => Category::Input,
                Scope::Output => Category::Output,
                Scope::Global | Scope::Local => Category::Memory,
            },
        }
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "input" => Ok(Category::Input),
            "output" => Ok(Category::Output),
            "memory" => Ok(Category::Memory),
            "temp" => Ok(Category::Temp),
            "constant" => Ok(Category::Constant),
            other => Err(Error::InvalidInput(format!("Unknown category: {}", other))),
        }
    }
}

/// Vendor-neutral tag attributes (no persistence identity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTag {
    pub name: String,
    pub data_type: DataType,
    /// Vendor-native address; empty when the tag is unaddressed
    #[serde(default)]
    pub address: String,
    pub scope: Scope,
    pub category: Category,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub description: String,
    pub vendor: Vendor,
    #[serde(default)]
    pub is_generated: bool,
}

impl CanonicalTag {
    /// Unaddressed local memory tag with empty optional fields
    pub fn new(name: impl Into<String>, data_type: DataType, vendor: Vendor) -> Self {
        Self {
            name: name.into(),
            data_type,
            address: String::new(),
            scope: Scope::Local,
            category: Category::Memory,
            default_value: String::new(),
            description: String::new(),
            vendor,
            is_generated: false,
        }
    }

    /// Case-insensitive identity key within a project
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    pub fn has_address(&self) -> bool {
        !self.address.trim().is_empty()
    }

    /// Field equivalence as used by bulk round trips
    ///
    /// Ignores `is_generated`, which no vendor container carries.
    pub fn field_equivalent(&self, other: &CanonicalTag) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && self.address == other.address
            && self.scope == other.scope
            && self.category == other.category
            && self.default_value == other.default_value
            && self.description == other.description
            && self.vendor == other.vendor
    }
}

/// Lower-cased name used for uniqueness checks
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A persisted tag row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTag {
    pub id: Uuid,
    pub project_id: ProjectId,
    #[serde(flatten)]
    pub tag: CanonicalTag,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
