/*++

Licensed under the Apache-2.0 license.

File Name:

    fdt.rs

Abstract:

    Read-only walker over a flattened device tree blob.

--*/

use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};
use vboot_image_types::FDT_MAGIC;
use zerocopy::byteorder::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::cursor::ByteCursor;

pub const FDT_BEGIN_NODE: u32 = 0x1;
pub const FDT_END_NODE: u32 = 0x2;
pub const FDT_PROP: u32 = 0x3;
pub const FDT_NOP: u32 = 0x4;
pub const FDT_END: u32 = 0x9;

pub const FDT_FIRST_SUPPORTED_VERSION: u32 = 16;
pub const FDT_LAST_SUPPORTED_VERSION: u32 = 17;

pub const FDT_HEADER_SIZE: usize = core::mem::size_of::<FdtHeader>();

/// Flattened device tree header
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Copy, Clone)]
pub struct FdtHeader {
    pub magic: U32,
    pub totalsize: U32,
    pub off_dt_struct: U32,
    pub off_dt_strings: U32,
    pub off_mem_rsvmap: U32,
    pub version: U32,
    pub last_comp_version: U32,
    pub boot_cpuid_phys: U32,
    pub size_dt_strings: U32,
    pub size_dt_struct: U32,
}

/// Handle to a node; the offset of its `FDT_BEGIN_NODE` token inside the
/// structure block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node(usize);

#[derive(Debug)]
enum Token<'a> {
    BeginNode(&'a [u8]),
    EndNode,
    Prop { name_off: usize, value: &'a [u8] },
    Nop,
    End,
}

/// Validated device tree.
#[derive(Debug, Clone)]
pub struct Fdt<'a> {
    total_size: usize,
    structs: &'a [u8],
    strings: &'a [u8],
}

fn block(blob: &[u8], off: u32, size: u32) -> VbootResult<&[u8]> {
    let off = off as usize;
    let end = off
        .checked_add(size as usize)
        .ok_or(VbootError::PARSE_BAD_STRUCTURE)?;
    blob.get(off..end).ok_or(VbootError::PARSE_BAD_STRUCTURE)
}

/// Read the total size declared by a tree header without validating the
/// rest of the tree.
pub fn fdt_total_size(buf: &[u8]) -> VbootResult<usize> {
    let (hdr, _) = FdtHeader::read_from_prefix(buf).map_err(|_| VbootError::PARSE_TRUNCATED)?;
    if hdr.magic.get() != FDT_MAGIC {
        return Err(VbootError::PARSE_BAD_MAGIC);
    }
    Ok(hdr.totalsize.get() as usize)
}

impl<'a> Fdt<'a> {
    /// Validate the header and block layout of the tree at the start of
    /// `buf`. Bytes past `totalsize` are not part of the tree.
    pub fn new(buf: &'a [u8]) -> VbootResult<Self> {
        let (hdr, _) =
            FdtHeader::read_from_prefix(buf).map_err(|_| VbootError::PARSE_TRUNCATED)?;
        if hdr.magic.get() != FDT_MAGIC {
            return Err(VbootError::PARSE_BAD_MAGIC);
        }
        if hdr.version.get() < FDT_FIRST_SUPPORTED_VERSION
            || hdr.last_comp_version.get() > FDT_LAST_SUPPORTED_VERSION
        {
            return Err(VbootError::PARSE_BAD_VERSION);
        }

        let total_size = hdr.totalsize.get() as usize;
        if total_size < FDT_HEADER_SIZE {
            return Err(VbootError::PARSE_BAD_STRUCTURE);
        }
        let blob = buf.get(..total_size).ok_or(VbootError::PARSE_TRUNCATED)?;

        if hdr.off_dt_struct.get() % 4 != 0
            || (hdr.off_mem_rsvmap.get() as usize) < FDT_HEADER_SIZE
            || hdr.off_mem_rsvmap.get() as usize >= total_size
        {
            return Err(VbootError::PARSE_BAD_STRUCTURE);
        }
        let structs = block(blob, hdr.off_dt_struct.get(), hdr.size_dt_struct.get())?;
        let strings = block(blob, hdr.off_dt_strings.get(), hdr.size_dt_strings.get())?;

        Ok(Self {
            total_size,
            structs,
            strings,
        })
    }

    /// Size of the tree as declared by its header.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    fn token(&self, off: usize) -> VbootResult<(Token<'a>, usize)> {
        let mut cursor = ByteCursor::at(self.structs, off)?;
        let token = match cursor.u32_be()? {
            FDT_BEGIN_NODE => {
                let name = cursor.cstr()?;
                cursor.align4()?;
                Token::BeginNode(name)
            }
            FDT_END_NODE => Token::EndNode,
            FDT_PROP => {
                let len = cursor.u32_be()? as usize;
                let name_off = cursor.u32_be()? as usize;
                let value = cursor.bytes(len)?;
                cursor.align4()?;
                Token::Prop { name_off, value }
            }
            FDT_NOP => Token::Nop,
            FDT_END => Token::End,
            _ => return Err(VbootError::PARSE_BAD_STRUCTURE),
        };
        Ok((token, cursor.position()))
    }

    fn checked_token(&self, off: usize) -> VbootResult<(Token<'a>, usize)> {
        self.token(off).map_err(|_| VbootError::PARSE_BAD_STRUCTURE)
    }

    fn string_at(&self, off: usize) -> VbootResult<&'a [u8]> {
        let mut cursor =
            ByteCursor::at(self.strings, off).map_err(|_| VbootError::PARSE_BAD_STRUCTURE)?;
        cursor.cstr().map_err(|_| VbootError::PARSE_BAD_STRUCTURE)
    }

    /// Skip NOP tokens starting at `off`.
    fn skip_nops(&self, mut off: usize) -> VbootResult<(Token<'a>, usize)> {
        loop {
            let (token, next) = self.checked_token(off)?;
            match token {
                Token::Nop => off = next,
                _ => return Ok((token, off)),
            }
        }
    }

    pub fn root(&self) -> VbootResult<Node> {
        match self.skip_nops(0)? {
            (Token::BeginNode(_), off) => Ok(Node(off)),
            _ => Err(VbootError::PARSE_BAD_STRUCTURE),
        }
    }

    /// Node name, including any unit address.
    pub fn name(&self, node: Node) -> VbootResult<&'a str> {
        match self.checked_token(node.0)? {
            (Token::BeginNode(name), _) => {
                core::str::from_utf8(name).map_err(|_| VbootError::PARSE_BAD_STRUCTURE)
            }
            _ => Err(VbootError::PARSE_BAD_STRUCTURE),
        }
    }

    /// Offset of the first token after the node's properties.
    fn after_properties(&self, node: Node) -> VbootResult<(Token<'a>, usize)> {
        let (_, mut off) = self.checked_token(node.0)?;
        loop {
            let (token, next) = self.checked_token(off)?;
            match token {
                Token::Prop { .. } | Token::Nop => off = next,
                _ => return Ok((token, off)),
            }
        }
    }

    pub fn get_property(&self, node: Node, name: &str) -> VbootResult<Option<&'a [u8]>> {
        let (_, mut off) = self.checked_token(node.0)?;
        loop {
            let (token, next) = self.checked_token(off)?;
            match token {
                Token::Prop { name_off, value } => {
                    if self.string_at(name_off)? == name.as_bytes() {
                        return Ok(Some(value));
                    }
                }
                Token::Nop => {}
                Token::BeginNode(_) | Token::EndNode => return Ok(None),
                Token::End => return Err(VbootError::PARSE_BAD_STRUCTURE),
            }
            off = next;
        }
    }

    pub fn first_child(&self, node: Node) -> VbootResult<Option<Node>> {
        match self.after_properties(node)? {
            (Token::BeginNode(_), off) => Ok(Some(Node(off))),
            (Token::EndNode, _) => Ok(None),
            _ => Err(VbootError::PARSE_BAD_STRUCTURE),
        }
    }

    /// Offset just past the node's matching `FDT_END_NODE`.
    fn end_of(&self, node: Node) -> VbootResult<usize> {
        let mut depth = 0usize;
        let mut off = node.0;
        loop {
            let (token, next) = self.checked_token(off)?;
            match token {
                Token::BeginNode(_) => depth += 1,
                Token::EndNode => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(next);
                    }
                }
                Token::End => return Err(VbootError::PARSE_BAD_STRUCTURE),
                Token::Prop { .. } | Token::Nop => {}
            }
            off = next;
        }
    }

    pub fn next_sibling(&self, node: Node) -> VbootResult<Option<Node>> {
        let off = self.end_of(node)?;
        match self.skip_nops(off)? {
            (Token::BeginNode(_), off) => Ok(Some(Node(off))),
            (Token::EndNode, _) | (Token::End, _) => Ok(None),
            _ => Err(VbootError::PARSE_BAD_STRUCTURE),
        }
    }

    /// Direct children of `node`, in tree order.
    pub fn children(&self, node: Node) -> VbootResult<Vec<Node>> {
        let mut result = Vec::new();
        let mut child = self.first_child(node)?;
        while let Some(c) = child {
            result.push(c);
            child = self.next_sibling(c)?;
        }
        Ok(result)
    }

    pub fn subnode(&self, node: Node, name: &str) -> VbootResult<Option<Node>> {
        let mut child = self.first_child(node)?;
        while let Some(c) = child {
            if self.name(c)? == name {
                return Ok(Some(c));
            }
            child = self.next_sibling(c)?;
        }
        Ok(None)
    }

    /// Look up an absolute path such as `/images/kernel`.
    pub fn path(&self, path: &str) -> VbootResult<Option<Node>> {
        let mut node = self.root()?;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            match self.subnode(node, component)? {
                Some(n) => node = n,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    /// String property, without its terminator.
    pub fn prop_str(&self, node: Node, name: &str) -> VbootResult<Option<&'a str>> {
        match self.get_property(node, name)? {
            Some(value) => Ok(Some(prop_to_str(value)?)),
            None => Ok(None),
        }
    }

    /// String list property.
    pub fn prop_str_list(&self, node: Node, name: &str) -> VbootResult<Vec<&'a str>> {
        let mut result = Vec::new();
        if let Some(value) = self.get_property(node, name)? {
            let body = value
                .strip_suffix(&[0])
                .ok_or(VbootError::PARSE_BAD_PROPERTY)?;
            for item in body.split(|&b| b == 0) {
                result.push(core::str::from_utf8(item).map_err(|_| VbootError::PARSE_BAD_PROPERTY)?);
            }
        }
        Ok(result)
    }

    pub fn prop_u32(&self, node: Node, name: &str) -> VbootResult<Option<u32>> {
        match self.get_property(node, name)? {
            Some(&[a, b, c, d]) => Ok(Some(u32::from_be_bytes([a, b, c, d]))),
            Some(_) => Err(VbootError::PARSE_BAD_PROPERTY),
            None => Ok(None),
        }
    }

    /// Address property encoded in one or two cells.
    pub fn prop_addr(&self, node: Node, name: &str) -> VbootResult<Option<u64>> {
        match self.get_property(node, name)? {
            Some(&[a, b, c, d]) => Ok(Some(u32::from_be_bytes([a, b, c, d]).into())),
            Some(&[a, b, c, d, e, f, g, h]) => {
                Ok(Some(u64::from_be_bytes([a, b, c, d, e, f, g, h])))
            }
            Some(_) => Err(VbootError::PARSE_BAD_PROPERTY),
            None => Ok(None),
        }
    }
}

/// Decode a NUL terminated property value.
pub fn prop_to_str(value: &[u8]) -> VbootResult<&str> {
    let body = value
        .strip_suffix(&[0])
        .ok_or(VbootError::PARSE_BAD_PROPERTY)?;
    if body.contains(&0) {
        return Err(VbootError::PARSE_BAD_PROPERTY);
    }
    core::str::from_utf8(body).map_err(|_| VbootError::PARSE_BAD_PROPERTY)
}
