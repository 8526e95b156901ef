//! Synthetic container images for tests.

use super::constants::*;

pub(crate) struct Coeff<'a> {
    pub name: &'a str,
    pub full_name: &'a str,
    pub memory_type: u16,
    pub offset: u16,
}

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn pad_to_word(buf: &mut Vec<u8>, start: usize) {
    while (buf.len() - start) % 4 != 0 {
        buf.push(0);
    }
}

fn push_string_u8(buf: &mut Vec<u8>, s: &str) {
    let start = buf.len();
    buf.push(s.len() as u8);
    buf.extend_from_slice(s.as_bytes());
    pad_to_word(buf, start);
}

fn push_string_u16(buf: &mut Vec<u8>, s: &str) {
    let start = buf.len();
    push_u16(buf, s.len() as u16);
    buf.extend_from_slice(s.as_bytes());
    pad_to_word(buf, start);
}

/// Algorithm information payload.
pub(crate) fn algorithm_info(id: u32, name: &str, coeffs: &[Coeff<'_>]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_u32(&mut buf, id);
    push_string_u8(&mut buf, name);
    push_string_u16(&mut buf, "");
    push_u32(&mut buf, coeffs.len() as u32);
    for c in coeffs {
        let mut body = Vec::new();
        push_string_u8(&mut body, c.name);
        push_string_u8(&mut body, c.full_name);
        push_string_u16(&mut body, "test coefficient");
        push_u16(&mut body, 0x1000);
        push_u16(&mut body, 0x0003);
        push_u32(&mut body, 4);

        push_u16(&mut buf, c.offset);
        push_u16(&mut buf, c.memory_type);
        push_u32(&mut buf, body.len() as u32);
        buf.extend_from_slice(&body);
    }
    buf
}

/// Firmware id payload. `algs` rows are `(id, xm_base, ym_base)`.
pub(crate) fn firmware_id(
    fw_id: u32,
    fw_rev: u32,
    xm_base: u32,
    ym_base: u32,
    algs: &[(u32, u32, u32)],
) -> Vec<u8> {
    let mut buf = Vec::new();
    for v in [0x0040_0000, 3, 2, fw_id, fw_rev, xm_base, 0x20, ym_base, 0x10] {
        push_u32(&mut buf, v);
    }
    push_u32(&mut buf, algs.len() as u32);
    for &(id, xm, ym) in algs {
        for v in [id, 0x0001_0000, xm, 0x40, ym, 0x40] {
            push_u32(&mut buf, v);
        }
    }
    buf
}

pub(crate) struct WmfwBuilder {
    version: u8,
    blocks: Vec<u8>,
}

impl WmfwBuilder {
    pub fn new() -> Self {
        Self {
            version: 3,
            blocks: Vec::new(),
        }
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn block(mut self, tag: u8, offset: u32, payload: &[u8]) -> Self {
        push_u32(&mut self.blocks, (u32::from(tag) << WMFW_TYPE_SHIFT) | (offset & WMFW_OFFSET_MASK));
        push_u32(&mut self.blocks, payload.len() as u32);
        self.blocks.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&WMFW_MAGIC);
        push_u32(&mut buf, WMFW_HEADER_LEN as u32);
        push_u16(&mut buf, 0x0001);
        buf.push(4);
        buf.push(self.version);
        for size in [0x3000, 0x2000, 0x1000, 0] {
            push_u32(&mut buf, size);
        }
        buf.extend_from_slice(&0x5F00_0000u64.to_le_bytes());
        push_u32(&mut buf, 0xDEAD_BEEF);
        buf.extend_from_slice(&self.blocks);
        buf
    }
}

pub(crate) struct WmdrBuilder {
    revision: u8,
    blocks: Vec<u8>,
}

impl WmdrBuilder {
    pub fn new() -> Self {
        Self {
            revision: 2,
            blocks: Vec::new(),
        }
    }

    pub fn revision(mut self, revision: u8) -> Self {
        self.revision = revision;
        self
    }

    pub fn block(mut self, tag: u16, offset: u16, algorithm_id: u32, payload: &[u8]) -> Self {
        push_u16(&mut self.blocks, offset);
        push_u16(&mut self.blocks, tag);
        push_u32(&mut self.blocks, algorithm_id);
        push_u32(&mut self.blocks, 0x0001_0000);
        push_u32(&mut self.blocks, 48000);
        push_u32(&mut self.blocks, payload.len() as u32);
        let start = self.blocks.len();
        self.blocks.extend_from_slice(payload);
        pad_to_word(&mut self.blocks, start);
        self
    }

    pub fn text(self, text: &str) -> Self {
        self.block(WMDR_INFO_TEXT, 0, 0, text.as_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&WMDR_MAGIC);
        push_u32(&mut buf, WMDR_MIN_HEADER_LEN as u32);
        buf.extend_from_slice(&[0x00, 0x01, 0x00, self.revision]);
        push_u32(&mut buf, 0x0004_0000);
        buf.extend_from_slice(&self.blocks);
        buf
    }
}

/// Firmware image used across module tests.
///
/// Firmware 0x40000 with XM/YM bases 0x10/0x20 and algorithm 0xF100 at
/// XM 0x100 / YM 0x200; one XM (u24) data block at offset 2, one packed
/// XM block at offset 0x40, one absolute block at 0x5000.
pub(crate) fn sample_firmware() -> Vec<u8> {
    let algs = algorithm_info(
        0xF100,
        "EQ",
        &[
            Coeff {
                name: "GAIN",
                full_name: "EQ GAIN",
                memory_type: MEM_ADSP2_XM,
                offset: 3,
            },
            Coeff {
                name: "bands_struct_t",
                full_name: "bands_struct_t",
                memory_type: MEM_ADSP2_YM,
                offset: 0,
            },
        ],
    );
    let fw_algs = algorithm_info(
        0x40000,
        "MAIN",
        &[Coeff {
            name: "ENABLE",
            full_name: "MAIN ENABLE",
            memory_type: MEM_HALO_XM_PACKED,
            offset: 1,
        }],
    );
    WmfwBuilder::new()
        .block(WMFW_INFO_TEXT, 0, b"built by tests")
        .block(
            WMFW_FIRMWARE_ID,
            0,
            &firmware_id(0x40000, 0x010203, 0x10, 0x20, &[(0xF100, 0x100, 0x200)]),
        )
        .block(WMFW_ALGORITHM_INFO, 0, &fw_algs)
        .block(WMFW_ALGORITHM_INFO, 0, &algs)
        .block(MEM_ADSP2_XM as u8, 2, &[1, 2, 3, 4, 5, 6, 7, 8])
        .block(MEM_HALO_XM_PACKED as u8, 0x40, &[0xAA; 12])
        .block(WMFW_ABSOLUTE, 0x5000, &[9, 9, 9, 9])
        .build()
}
