/*++

Licensed under the Apache-2.0 license.

File Name:

   fdt.rs

Abstract:

    Minimal flattened device tree writer.

--*/

const FDT_MAGIC: u32 = 0xD00D_FEED;
const FDT_HEADER_SIZE: u32 = 40;
const FDT_RSVMAP_SIZE: u32 = 16;
const FDT_VERSION: u32 = 17;
const FDT_LAST_COMP_VERSION: u32 = 16;

const FDT_BEGIN_NODE: u32 = 0x1;
const FDT_END_NODE: u32 = 0x2;
const FDT_PROP: u32 = 0x3;
const FDT_END: u32 = 0x9;

/// Device tree writer
#[derive(Default)]
pub struct FdtWriter {
    structs: Vec<u8>,
    strings: Vec<u8>,
    names: Vec<(String, u32)>,
}

impl FdtWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn pad(&mut self) {
        while self.structs.len() % 4 != 0 {
            self.structs.push(0);
        }
    }

    fn string_offset(&mut self, name: &str) -> u32 {
        if let Some((_, off)) = self.names.iter().find(|(n, _)| n == name) {
            return *off;
        }
        let off = self.strings.len() as u32;
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        self.names.push((name.into(), off));
        off
    }

    pub fn begin_node(&mut self, name: &str) {
        self.structs.extend_from_slice(&FDT_BEGIN_NODE.to_be_bytes());
        self.structs.extend_from_slice(name.as_bytes());
        self.structs.push(0);
        self.pad();
    }

    pub fn end_node(&mut self) {
        self.structs.extend_from_slice(&FDT_END_NODE.to_be_bytes());
    }

    pub fn prop(&mut self, name: &str, value: &[u8]) {
        let name_off = self.string_offset(name);
        self.structs.extend_from_slice(&FDT_PROP.to_be_bytes());
        self.structs
            .extend_from_slice(&(value.len() as u32).to_be_bytes());
        self.structs.extend_from_slice(&name_off.to_be_bytes());
        self.structs.extend_from_slice(value);
        self.pad();
    }

    pub fn prop_str(&mut self, name: &str, value: &str) {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.prop(name, &bytes);
    }

    pub fn prop_str_list(&mut self, name: &str, values: &[&str]) {
        let mut bytes = Vec::new();
        for value in values {
            bytes.extend_from_slice(value.as_bytes());
            bytes.push(0);
        }
        self.prop(name, &bytes);
    }

    pub fn prop_u32(&mut self, name: &str, value: u32) {
        self.prop(name, &value.to_be_bytes());
    }

    pub fn prop_u64(&mut self, name: &str, value: u64) {
        self.prop(name, &value.to_be_bytes());
    }

    /// Emit the blob. Nodes must be balanced.
    pub fn finish(mut self) -> Vec<u8> {
        self.structs.extend_from_slice(&FDT_END.to_be_bytes());

        let off_mem_rsvmap = FDT_HEADER_SIZE;
        let off_dt_struct = off_mem_rsvmap + FDT_RSVMAP_SIZE;
        let size_dt_struct = self.structs.len() as u32;
        let off_dt_strings = off_dt_struct + size_dt_struct;
        let size_dt_strings = self.strings.len() as u32;
        let totalsize = off_dt_strings + size_dt_strings;

        let mut blob = Vec::with_capacity(totalsize as usize);
        for field in [
            FDT_MAGIC,
            totalsize,
            off_dt_struct,
            off_dt_strings,
            off_mem_rsvmap,
            FDT_VERSION,
            FDT_LAST_COMP_VERSION,
            0,
            size_dt_strings,
            size_dt_struct,
        ] {
            blob.extend_from_slice(&field.to_be_bytes());
        }
        blob.extend_from_slice(&[0u8; FDT_RSVMAP_SIZE as usize]);
        blob.extend_from_slice(&self.structs);
        blob.extend_from_slice(&self.strings);
        blob
    }
}
