/*++

Licensed under the Apache-2.0 license.

File Name:

    keys.rs

Abstract:

    Reads the trust anchor table from a trusted control tree.

--*/

use alloc::string::String;
use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};
use vboot_image_types::{EcCurve, KeyMaterial, KeyRequirement, PublicKey, TrustStore};

use crate::fdt::{Fdt, Node};

const KEY_NODE_PREFIX: &str = "key-";
const RSA_DEFAULT_EXPONENT: u64 = 65537;

fn rsa_material(fdt: &Fdt, node: Node) -> VbootResult<KeyMaterial> {
    let modulus = fdt
        .get_property(node, "rsa,modulus")?
        .ok_or(VbootError::CONFIG_TRUST_STORE_MALFORMED)?;
    let exponent = match fdt.get_property(node, "rsa,exponent")? {
        None => RSA_DEFAULT_EXPONENT,
        Some(&[a, b, c, d]) => u32::from_be_bytes([a, b, c, d]).into(),
        Some(&[a, b, c, d, e, f, g, h]) => u64::from_be_bytes([a, b, c, d, e, f, g, h]),
        Some(_) => return Err(VbootError::CONFIG_TRUST_STORE_MALFORMED),
    };
    let material = KeyMaterial::Rsa {
        modulus: modulus.to_vec(),
        exponent,
    };

    if let Some(bits) = fdt.prop_u32(node, "rsa,num-bits")? {
        let key = PublicKey::new("", material.clone(), KeyRequirement::Optional);
        if key.rsa_bits() != Some(bits as usize) {
            return Err(VbootError::CONFIG_TRUST_STORE_MALFORMED);
        }
    }
    Ok(material)
}

fn ecdsa_material(fdt: &Fdt, node: Node) -> VbootResult<KeyMaterial> {
    let curve = fdt
        .prop_str(node, "ecdsa,curve")?
        .and_then(EcCurve::from_name)
        .ok_or(VbootError::CONFIG_TRUST_STORE_MALFORMED)?;
    let coord = |name: &str| -> VbootResult<Vec<u8>> {
        match fdt.get_property(node, name)? {
            Some(value) if value.len() == curve.coord_size() => Ok(value.to_vec()),
            _ => Err(VbootError::CONFIG_TRUST_STORE_MALFORMED),
        }
    };
    Ok(KeyMaterial::Ecdsa {
        curve,
        x: coord("ecdsa,x-point")?,
        y: coord("ecdsa,y-point")?,
    })
}

fn read_key(fdt: &Fdt, node: Node) -> VbootResult<Option<PublicKey>> {
    let node_name = fdt.name(node)?;
    let Some(suffix) = node_name.strip_prefix(KEY_NODE_PREFIX) else {
        return Ok(None);
    };
    let name = fdt.prop_str(node, "key-name-hint")?.unwrap_or(suffix);
    let algo = fdt
        .prop_str(node, "algo")?
        .ok_or(VbootError::CONFIG_TRUST_STORE_MALFORMED)?;
    let (_, crypto) = algo
        .split_once(',')
        .ok_or(VbootError::CONFIG_TRUST_STORE_MALFORMED)?;

    let material = if crypto.starts_with("rsa") {
        rsa_material(fdt, node)?
    } else if crypto.starts_with("ecdsa") {
        ecdsa_material(fdt, node)?
    } else {
        return Err(VbootError::CONFIG_TRUST_STORE_MALFORMED);
    };
    let required = match fdt.prop_str(node, "required")? {
        Some(level) => {
            KeyRequirement::from_name(level).ok_or(VbootError::CONFIG_TRUST_STORE_MALFORMED)?
        }
        None => KeyRequirement::Optional,
    };
    Ok(Some(PublicKey::new(name, material, required)))
}

/// Build the trust store from the `/signature` node of a control tree.
/// The tree must come from the boot stage itself, never from the medium
/// being verified.
pub fn trust_store_from_fdt(blob: &[u8]) -> VbootResult<TrustStore> {
    let fdt = Fdt::new(blob).map_err(|_| VbootError::CONFIG_TRUST_STORE_MALFORMED)?;
    let mut keys = Vec::new();
    if let Some(signature) = fdt.path("/signature")? {
        for node in fdt.children(signature)? {
            if let Some(key) = read_key(&fdt, node)? {
                keys.push(key);
            }
        }
    }
    TrustStore::new(keys)
}

/// Read the `/config/boot-order` string list of a control tree.
pub fn boot_order_from_fdt(blob: &[u8]) -> VbootResult<Vec<String>> {
    let fdt = Fdt::new(blob)?;
    match fdt.path("/config")? {
        Some(config) => Ok(fdt
            .prop_str_list(config, "boot-order")?
            .into_iter()
            .map(String::from)
            .collect()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vboot_image_fake_keys::*;
    use vboot_image_gen::{control_fdt, FdtWriter};

    #[test]
    fn test_round_trip_key_table() {
        let keys = vec![
            rsa2048_public_key("dev", false),
            p256_key_0_public("ec", true),
            p384_key_0_public("ec384", KeyRequirement::Conf),
        ];
        let blob = control_fdt(&keys, &[]);
        let store = trust_store_from_fdt(&blob).unwrap();
        assert_eq!(store.keys(), keys.as_slice());
        assert_eq!(store.required_keys(KeyRequirement::Image).count(), 1);
        assert_eq!(store.required_keys(KeyRequirement::Conf).count(), 1);
    }

    #[test]
    fn test_boot_order() {
        let blob = control_fdt(&[], &["mmc1", "spi0"]);
        assert_eq!(boot_order_from_fdt(&blob), Ok(vec!["mmc1".into(), "spi0".into()]));
        let blob = control_fdt(&[], &[]);
        assert_eq!(boot_order_from_fdt(&blob), Ok(vec![]));
    }

    fn key_node(props: impl FnOnce(&mut FdtWriter)) -> Vec<u8> {
        let mut w = FdtWriter::new();
        w.begin_node("");
        w.begin_node("signature");
        w.begin_node("key-bad");
        props(&mut w);
        w.end_node();
        w.end_node();
        w.end_node();
        w.finish()
    }

    #[test]
    fn test_malformed_keys() {
        let no_algo = key_node(|w| w.prop("rsa,modulus", &[0x80; 256]));
        assert_eq!(
            trust_store_from_fdt(&no_algo),
            Err(VbootError::CONFIG_TRUST_STORE_MALFORMED)
        );

        let wrong_bits = key_node(|w| {
            w.prop_str("algo", "sha256,rsa2048");
            w.prop_u32("rsa,num-bits", 4096);
            w.prop("rsa,modulus", &[0x80; 256]);
        });
        assert_eq!(
            trust_store_from_fdt(&wrong_bits),
            Err(VbootError::CONFIG_TRUST_STORE_MALFORMED)
        );

        let bad_requirement = key_node(|w| {
            w.prop_str("algo", "sha256,rsa2048");
            w.prop("rsa,modulus", &[0x80; 256]);
            w.prop_str("required", "always");
        });
        assert_eq!(
            trust_store_from_fdt(&bad_requirement),
            Err(VbootError::CONFIG_TRUST_STORE_MALFORMED)
        );

        let short_point = key_node(|w| {
            w.prop_str("algo", "sha256,ecdsa256");
            w.prop_str("ecdsa,curve", "prime256v1");
            w.prop("ecdsa,x-point", &[1; 31]);
            w.prop("ecdsa,y-point", &[1; 32]);
        });
        assert_eq!(
            trust_store_from_fdt(&short_point),
            Err(VbootError::CONFIG_TRUST_STORE_MALFORMED)
        );
    }

    #[test]
    fn test_default_exponent_and_name() {
        let blob = key_node(|w| {
            w.prop_str("algo", "sha256,rsa2048");
            w.prop("rsa,modulus", &[0x80; 256]);
        });
        let store = trust_store_from_fdt(&blob).unwrap();
        let key = store.find("bad").unwrap();
        match key.material() {
            KeyMaterial::Rsa { exponent, .. } => assert_eq!(*exponent, 65537),
            _ => panic!("expected RSA key"),
        }
    }
}
