/*++

Licensed under the Apache-2.0 license.

File Name:

    fit.rs

Abstract:

    FIT image parser.

--*/

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};
use vboot_image_types::*;

use crate::cursor::align4;
use crate::fdt::{Fdt, Node};

const IMAGES_PATH: &str = "images";
const CONFS_PATH: &str = "configurations";

fn is_node_kind(name: &str, kind: &str) -> bool {
    match name.strip_prefix(kind) {
        Some(rest) => rest.is_empty() || rest.starts_with('-'),
        None => false,
    }
}

/// Reject unit addresses in the image and configuration subtrees. A name
/// such as `kernel@1` can be resolved by different code paths to
/// different nodes.
fn check_no_at(fdt: &Fdt, node: Node, depth: usize) -> VbootResult<()> {
    for child in fdt.children(node)? {
        if fdt.name(child)?.contains('@') {
            return Err(VbootError::PARSE_UNIT_ADDRESS);
        }
        if depth > 1 {
            check_no_at(fdt, child, depth - 1)?;
        }
    }
    Ok(())
}

/// Name of the configuration to boot. A `#` suffix on the requested name
/// selects overlays, which are not applied here.
fn select_configuration<'a>(
    fdt: &Fdt<'a>,
    confs: Node,
    requested: Option<&'a str>,
) -> VbootResult<&'a str> {
    let requested = requested
        .map(|name| name.split('#').next().unwrap_or(name))
        .filter(|name| !name.is_empty());
    match requested {
        Some(name) => Ok(name),
        None => fdt
            .prop_str(confs, "default")?
            .ok_or(VbootError::PARSE_MISSING_CONFIGURATION),
    }
}

/// Slot a loaded image is referenced from
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Slot {
    Primary,
    Fdt,
    Ramdisk,
    Loadable,
}

/// Firmware style images are accepted from any slot.
const ANY_SLOT_TYPES: [&str; 3] = ["firmware", "tee", "tfa-bl31"];

const BOOTABLE_OS: [&str; 7] = ["linux", "u-boot", "tee", "openrtos", "efi", "vxworks", "elf"];

fn config_references(fdt: &Fdt, conf: Node) -> VbootResult<Vec<ConfigReference>> {
    let mut refs = Vec::new();
    for property in CONFIG_REFERENCE_PROPS {
        let images = fdt.prop_str_list(conf, property)?;
        if !images.is_empty() {
            refs.push(ConfigReference {
                property: property.into(),
                images: images.into_iter().map(String::from).collect(),
            });
        }
    }
    Ok(refs)
}

fn slot_images<'a>(
    refs: &'a [ConfigReference],
    property: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    refs.iter()
        .filter(move |r| r.property == property)
        .flat_map(|r| r.images.iter().map(String::as_str))
}

/// Images to load, primary image first.
fn loaded_images(refs: &[ConfigReference]) -> VbootResult<Vec<(&str, Slot)>> {
    let primary = slot_images(refs, "firmware")
        .next()
        .or_else(|| slot_images(refs, "kernel").next())
        .ok_or(VbootError::PARSE_NO_PAYLOAD)?;

    let mut images = alloc::vec![(primary, Slot::Primary)];
    for (property, slot) in [
        ("fdt", Slot::Fdt),
        ("ramdisk", Slot::Ramdisk),
        ("loadables", Slot::Loadable),
    ] {
        for name in slot_images(refs, property) {
            if !images.iter().any(|&(n, _)| n == name) {
                images.push((name, slot));
            }
        }
    }
    Ok(images)
}

fn image_props(fdt: &Fdt, image: Node) -> VbootResult<FitImageProps> {
    Ok(FitImageProps {
        image_type: fdt.prop_str(image, "type")?.map(String::from),
        arch: fdt.prop_str(image, "arch")?.map(String::from),
        os: fdt.prop_str(image, "os")?.map(String::from),
        compression: fdt.prop_str(image, "compression")?.map(String::from),
        load: fdt.prop_addr(image, "load")?,
        entry: fdt.prop_addr(image, "entry")?,
    })
}

/// Check that an image can be booted from `slot` on `platform`. Loadables
/// are not checked. A `None` platform skips the architecture check.
fn check_image(props: &FitImageProps, slot: Slot, platform: Option<Arch>) -> VbootResult<()> {
    let image_type = props.image_type.as_deref().unwrap_or_default();
    let type_ok = ANY_SLOT_TYPES.contains(&image_type)
        || match slot {
            Slot::Primary => matches!(image_type, "kernel" | "kernel_noload"),
            Slot::Fdt => image_type == "flat_dt",
            Slot::Ramdisk => image_type == "ramdisk",
            Slot::Loadable => return Ok(()),
        };
    if !type_ok {
        return Err(VbootError::PARSE_WRONG_TYPE);
    }
    if image_type == "flat_dt" {
        return Ok(());
    }

    if let Some(platform) = platform {
        match props.arch.as_deref().and_then(Arch::from_fit_name) {
            Some(arch) if platform.runs(arch) => {}
            _ => return Err(VbootError::PARSE_WRONG_ARCH),
        }
    }
    match props.os.as_deref() {
        Some(os) if BOOTABLE_OS.contains(&os) => Ok(()),
        _ => Err(VbootError::PARSE_WRONG_OS),
    }
}

/// Offset of a property value inside the buffer it was borrowed from.
fn offset_in(buf: &[u8], value: &[u8]) -> usize {
    value.as_ptr() as usize - buf.as_ptr() as usize
}

fn size_prop(fdt: &Fdt, image: Node) -> VbootResult<usize> {
    fdt.prop_u32(image, "data-size")?
        .map(|size| size as usize)
        .ok_or(VbootError::PARSE_MISSING_PROPERTY)
}

/// Byte range of an image's payload. The range is not checked against
/// the buffer here.
fn image_data(fdt: &Fdt, buf: &[u8], image: Node) -> VbootResult<ByteRange> {
    if let Some(data) = fdt.get_property(image, "data")? {
        return Ok(ByteRange::new(offset_in(buf, data), data.len()));
    }
    if let Some(position) = fdt.prop_u32(image, "data-position")? {
        return Ok(ByteRange::new(position as usize, size_prop(fdt, image)?));
    }
    if let Some(offset) = fdt.prop_u32(image, "data-offset")? {
        let base = align4(fdt.total_size()).ok_or(VbootError::PARSE_TRUNCATED)?;
        let offset = base
            .checked_add(offset as usize)
            .ok_or(VbootError::PARSE_TRUNCATED)?;
        return Ok(ByteRange::new(offset, size_prop(fdt, image)?));
    }
    Err(VbootError::PARSE_MISSING_PROPERTY)
}

/// Collect the hash and signature nodes below `parent`. A configuration
/// only carries signature nodes.
fn verification_nodes(
    fdt: &Fdt,
    parent: Node,
    parent_name: &str,
    target: NodeTarget,
    nodes: &mut Vec<VerificationNode>,
) -> VbootResult<()> {
    for child in fdt.children(parent)? {
        let name = fdt.name(child)?;
        let kind = if is_node_kind(name, "hash") && target != NodeTarget::Configuration {
            NodeKind::Hash
        } else if is_node_kind(name, "signature") {
            NodeKind::Signature
        } else {
            continue;
        };

        // Missing algo or value is left for the verifier to reject.
        let algo = fdt.prop_str(child, "algo")?.unwrap_or_default();
        let expected_value = fdt.get_property(child, "value")?.unwrap_or_default();
        let (key_hint, required) = match kind {
            NodeKind::Hash => (None, true),
            NodeKind::Signature => (
                fdt.prop_str(child, "key-name-hint")?.map(String::from),
                fdt.get_property(child, "required")?.is_some(),
            ),
        };

        nodes.push(VerificationNode {
            name: format!("{}/{}", parent_name, name),
            target,
            kind,
            algo: algo.into(),
            key_hint,
            required,
            expected_value: expected_value.to_vec(),
        });
    }
    Ok(())
}

/// Parse a FIT image, selecting `requested` or the default configuration.
/// Images are checked against the `platform` architecture.
pub fn parse_fit(
    buf: &[u8],
    requested: Option<&str>,
    platform: Option<Arch>,
) -> VbootResult<ImageDescriptor> {
    let fdt = Fdt::new(buf)?;
    let root = fdt.root()?;
    let images = fdt
        .subnode(root, IMAGES_PATH)?
        .ok_or(VbootError::PARSE_MISSING_IMAGES)?;
    let confs = fdt
        .subnode(root, CONFS_PATH)?
        .ok_or(VbootError::PARSE_MISSING_CONFIGURATION)?;

    check_no_at(&fdt, images, 2)?;
    check_no_at(&fdt, confs, 1)?;

    let conf_name = select_configuration(&fdt, confs, requested)?;
    let conf = fdt
        .subnode(confs, conf_name)?
        .ok_or(VbootError::PARSE_MISSING_CONFIGURATION)?;
    let references = config_references(&fdt, conf)?;

    // Every referenced image is resolved, loaded or not, since a
    // configuration signature covers all of them.
    let mut signed_images = Vec::new();
    let mut image_nodes = Vec::new();
    for name in referenced_names(&references) {
        let image = fdt
            .subnode(images, name)?
            .ok_or(VbootError::PARSE_DANGLING_REFERENCE)?;
        let data = image_data(&fdt, buf, image)?;
        data.within(buf.len())?;
        signed_images.push(SignedImage {
            name: name.into(),
            props: image_props(&fdt, image)?,
            data,
        });
        image_nodes.push(image);
    }

    let mut payload_ranges = Vec::new();
    let mut nodes = Vec::new();
    let mut load_address = 0;
    let mut entry_point = 0;

    for (index, (image_name, slot)) in loaded_images(&references)?.into_iter().enumerate() {
        let Some(pos) = signed_images.iter().position(|i| i.name == image_name) else {
            return Err(VbootError::PARSE_DANGLING_REFERENCE);
        };
        let SignedImage { props, data, .. } = &signed_images[pos];
        check_image(props, slot, platform)?;

        if slot == Slot::Primary {
            load_address = props.load.ok_or(VbootError::PARSE_MISSING_PROPERTY)?;
            entry_point = props.entry.unwrap_or(load_address);
        }

        let compression = match props.compression.as_deref() {
            Some(name) => Compression::from_fit_name(name),
            None => Compression::None,
        };

        payload_ranges.push(PayloadRange {
            name: image_name.into(),
            offset: data.offset,
            len: data.len,
            load_address: props.load,
            compression,
        });
        verification_nodes(
            &fdt,
            image_nodes[pos],
            image_name,
            NodeTarget::Image(index),
            &mut nodes,
        )?;
    }
    verification_nodes(&fdt, conf, conf_name, NodeTarget::Configuration, &mut nodes)?;

    Ok(ImageDescriptor {
        format: ImageFormat::Fit(FitInfo {
            configuration: conf_name.into(),
            tree_size: fdt.total_size(),
            references,
            signed_images,
        }),
        payload_ranges,
        load_address,
        entry_point,
        declared_checksum: None,
        verification_nodes: nodes,
    })
}

/// Number of bytes the image occupies, counting payloads stored outside
/// the tree. `buf` must hold at least the whole tree.
pub fn required_len(buf: &[u8]) -> VbootResult<usize> {
    let fdt = Fdt::new(buf)?;
    let mut len = fdt.total_size();
    let root = fdt.root()?;
    if let Some(images) = fdt.subnode(root, IMAGES_PATH)? {
        for image in fdt.children(images)? {
            if fdt.get_property(image, "data")?.is_some() {
                continue;
            }
            if let Ok(data) = image_data(&fdt, buf, image) {
                let end = data.end().ok_or(VbootError::PARSE_TRUNCATED)?;
                len = len.max(end);
            }
        }
    }
    Ok(len)
}
