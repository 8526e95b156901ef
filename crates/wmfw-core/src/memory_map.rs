//! Per-part memory maps.
//!
//! The table is a versioned TOML document. The built-in copy is embedded in
//! the crate; an alternative can be loaded from disk. Region and width names
//! are closed enumerations, so a row naming an unknown region or width is
//! rejected while the table is loaded rather than at lookup time.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

const BUILTIN_TABLE: &str = include_str!("../memory_maps.toml");

/// Logical storage area on the DSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRegion {
    /// Container already carries an absolute device address.
    Abs,
    /// Program memory.
    Pm,
    /// X data memory.
    Xm,
    /// Y data memory.
    Ym,
    /// Z data memory (ADSP2 only, not mapped on HALO parts).
    Zm,
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryRegion::Abs => write!(f, "abs"),
            MemoryRegion::Pm => write!(f, "pm"),
            MemoryRegion::Xm => write!(f, "xm"),
            MemoryRegion::Ym => write!(f, "ym"),
            MemoryRegion::Zm => write!(f, "zm"),
        }
    }
}

/// Storage granularity of a word within a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataWidth {
    /// 24-bit word, unpacked into 32 bits.
    U24,
    /// 24-bit words packed four to three 32-bit registers.
    P32,
    /// 32-bit word.
    U32,
    /// 40-bit program word.
    Pm32,
}

impl DataWidth {
    /// Number of device addresses spanned by one word of this width.
    pub fn addresses_per_word(self) -> u32 {
        match self {
            DataWidth::U24 => 4,
            DataWidth::P32 => 3,
            DataWidth::U32 => 4,
            DataWidth::Pm32 => 5,
        }
    }
}

impl fmt::Display for DataWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWidth::U24 => write!(f, "u24"),
            DataWidth::P32 => write!(f, "p32"),
            DataWidth::U32 => write!(f, "u32"),
            DataWidth::Pm32 => write!(f, "pm32"),
        }
    }
}

/// Addressing shared by one or more parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    pub name: String,
    pub parts: Vec<String>,
    bases: BTreeMap<(MemoryRegion, DataWidth), u32>,
}

impl MemoryMap {
    /// Base address of `(region, width)`, if the map has one.
    pub fn base(&self, region: MemoryRegion, width: DataWidth) -> Option<u32> {
        self.bases.get(&(region, width)).copied()
    }

    pub fn supports(&self, part: &str) -> bool {
        self.parts.iter().any(|p| p.eq_ignore_ascii_case(part))
    }

    /// All `(region, width, base)` rows in region order.
    pub fn entries(&self) -> impl Iterator<Item = (MemoryRegion, DataWidth, u32)> + '_ {
        self.bases.iter().map(|(&(r, w), &b)| (r, w, b))
    }
}

/// Every known memory map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMapTable {
    pub version: u32,
    maps: Vec<MemoryMap>,
}

impl MemoryMapTable {
    /// Table schema version understood by this crate.
    pub const VERSION: u32 = 1;

    /// Parse the table embedded in the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_TABLE)
    }

    /// Load a table from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawTable = toml::from_str(content)?;
        if raw.version != Self::VERSION {
            return Err(ConfigError::UnsupportedMapVersion {
                version: raw.version,
                expected: Self::VERSION,
            });
        }

        let mut maps: Vec<MemoryMap> = Vec::with_capacity(raw.maps.len());
        for raw_map in raw.maps {
            let map = raw_map.into_map()?;
            for part in &map.parts {
                if let Some(other) = maps.iter().find(|m| m.supports(part)) {
                    return Err(ConfigError::InvalidMemoryMap {
                        map: map.name.clone(),
                        message: format!("part '{}' is already listed by '{}'", part, other.name),
                    });
                }
            }
            debug!(map = %map.name, parts = map.parts.len(), "Loaded memory map");
            maps.push(map);
        }

        Ok(Self {
            version: raw.version,
            maps,
        })
    }

    /// The map serving `part`, if any.
    pub fn find_part(&self, part: &str) -> Option<&MemoryMap> {
        self.maps.iter().find(|m| m.supports(part))
    }

    pub fn maps(&self) -> &[MemoryMap] {
        &self.maps
    }

    /// Every supported part number across all maps.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.maps
            .iter()
            .flat_map(|m| m.parts.iter().map(String::as_str))
    }
}

#[derive(Debug, Deserialize)]
struct RawTable {
    version: u32,
    #[serde(default)]
    maps: Vec<RawMap>,
}

#[derive(Debug, Deserialize)]
struct RawMap {
    name: String,
    parts: Vec<String>,
    #[serde(default)]
    regions: Vec<RawRegion>,
}

#[derive(Debug, Deserialize)]
struct RawRegion {
    region: MemoryRegion,
    width: DataWidth,
    base: u32,
}

impl RawMap {
    fn into_map(self) -> Result<MemoryMap, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidMemoryMap {
            map: self.name.clone(),
            message,
        };

        if self.parts.is_empty() {
            return Err(invalid("no parts listed".to_string()));
        }

        let mut bases = BTreeMap::new();
        for row in &self.regions {
            if row.region == MemoryRegion::Abs {
                return Err(invalid("'abs' addresses bypass the map and cannot be listed".to_string()));
            }
            if bases.insert((row.region, row.width), row.base).is_some() {
                return Err(invalid(format!("duplicate {}/{} row", row.region, row.width)));
            }
        }

        let parts = self.parts.iter().map(|p| p.to_ascii_lowercase()).collect();
        Ok(MemoryMap {
            name: self.name,
            parts,
            bases,
        })
    }
}
