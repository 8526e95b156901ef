//! Symbolic control list.
//!
//! One control per coefficient descriptor of every algorithm, addressed
//! as a u24 word in the descriptor's region.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::container::{AlgorithmInfoBlock, CoefficientDescriptor, FirmwareContainer};
use crate::error::ConvertError;
use crate::memory_map::DataWidth;
use crate::resolver::AddressResolver;

/// Algorithm name used for the firmware's own controls with
/// [`AlgorithmNaming::Generic`].
pub const GENERIC_ALGORITHM_NAME: &str = "FIRMWARE";

/// Coefficients whose name contains this marker have a full name without
/// the algorithm prefix.
pub const STRUCT_SUFFIX: &str = "_struct_t";

/// How the firmware's own algorithm is named in control names.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmNaming {
    /// Use the name stored in the container.
    #[default]
    Container,
    /// Use [`GENERIC_ALGORITHM_NAME`] for the algorithm whose id is the
    /// firmware id.
    Generic,
}

/// Named, addressed coefficient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub algorithm_name: String,
    pub algorithm_id: u32,
    pub control_name: String,
    pub address: u32,
}

/// Build the control list in algorithm then descriptor order.
pub fn assemble_controls(
    container: &FirmwareContainer,
    resolver: &AddressResolver,
    naming: AlgorithmNaming,
) -> Result<Vec<Control>, ConvertError> {
    let firmware_id = container.firmware_id();
    let mut controls = Vec::new();

    for algorithm in container.algorithm_blocks() {
        let algorithm_name = match naming {
            AlgorithmNaming::Generic if algorithm.algorithm_id == firmware_id.firmware_id => {
                GENERIC_ALGORITHM_NAME.to_string()
            }
            _ => algorithm.name.clone(),
        };

        for coeff in &algorithm.coefficients {
            let offset = firmware_id.adjusted_offset(
                algorithm.algorithm_id,
                coeff.region,
                coeff.start_offset,
            )?;
            let address = resolver.resolve(coeff.region, DataWidth::U24, offset)?;

            controls.push(Control {
                algorithm_name: algorithm_name.clone(),
                algorithm_id: algorithm.algorithm_id,
                control_name: control_name(algorithm, coeff, &algorithm_name),
                address,
            });
        }
    }

    debug!(controls = controls.len(), "Assembled controls");
    Ok(controls)
}

fn control_name(
    algorithm: &AlgorithmInfoBlock,
    coeff: &CoefficientDescriptor,
    algorithm_name: &str,
) -> String {
    if coeff.name.contains(STRUCT_SUFFIX) {
        format!("{}_{}", algorithm_name, coeff.name)
    } else if algorithm.name.is_empty() {
        coeff.full_name.clone()
    } else {
        coeff.full_name.replace(&algorithm.name, algorithm_name)
    }
}
