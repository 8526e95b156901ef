//! Logical coordinate to device address translation.

use tracing::debug;

use crate::error::{ConfigError, ConvertError};
use crate::memory_map::{DataWidth, MemoryMap, MemoryMapTable, MemoryRegion};

/// Resolves `(region, width, word offset)` into absolute addresses for one part.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    part: String,
    map: MemoryMap,
}

impl AddressResolver {
    /// Create a resolver for `part`.
    ///
    /// Fails with [`ConfigError::UnsupportedPart`] if no map in `table` lists it.
    pub fn new(table: &MemoryMapTable, part: &str) -> Result<Self, ConfigError> {
        let map = table
            .find_part(part)
            .ok_or_else(|| ConfigError::UnsupportedPart {
                part: part.to_string(),
            })?;
        debug!(part = %part, map = %map.name, "Address resolver ready");
        Ok(Self {
            part: part.to_ascii_lowercase(),
            map: map.clone(),
        })
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    pub fn memory_map(&self) -> &MemoryMap {
        &self.map
    }

    /// Translate a word offset into a 4-byte aligned device address.
    ///
    /// `abs` offsets are already addresses and are returned as-is.
    pub fn resolve(
        &self,
        region: MemoryRegion,
        width: DataWidth,
        offset: u32,
    ) -> Result<u32, ConvertError> {
        if region == MemoryRegion::Abs {
            return Ok(offset);
        }

        let base = self
            .map
            .base(region, width)
            .ok_or(ConvertError::UnresolvedAddress {
                region,
                width,
                offset,
            })?;

        let scaled = u64::from(offset) * u64::from(width.addresses_per_word());
        let address = u32::try_from(u64::from(base) + scaled)
            .map_err(|_| ConvertError::AddressOverflow { base, offset: scaled })?;

        Ok(address & !0x3)
    }
}
