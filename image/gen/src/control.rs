/*++

Licensed under the Apache-2.0 license.

File Name:

   control.rs

Abstract:

    Generator for the trusted control tree carrying the key table and
    the boot order.

--*/

use vboot_image_types::{EcCurve, KeyMaterial, PublicKey};

use crate::FdtWriter;

/// Build a control tree with a `/signature` key table and an optional
/// `/config/boot-order` list.
pub fn control_fdt(keys: &[PublicKey], boot_order: &[&str]) -> Vec<u8> {
    let mut w = FdtWriter::new();
    w.begin_node("");

    if !boot_order.is_empty() {
        w.begin_node("config");
        w.prop_str_list("boot-order", boot_order);
        w.end_node();
    }

    w.begin_node("signature");
    for key in keys {
        w.begin_node(&format!("key-{}", key.name()));
        w.prop_str("key-name-hint", key.name());
        if let Some(required) = key.required().name() {
            w.prop_str("required", required);
        }
        match key.material() {
            KeyMaterial::Rsa { modulus, exponent } => {
                let bits = key.rsa_bits().unwrap_or(0);
                w.prop_str("algo", &format!("sha256,rsa{bits}"));
                w.prop_u32("rsa,num-bits", bits as u32);
                w.prop("rsa,modulus", modulus);
                w.prop_u64("rsa,exponent", *exponent);
            }
            KeyMaterial::Ecdsa { curve, x, y } => {
                let (algo, name) = match curve {
                    EcCurve::P256 => ("sha256,ecdsa256", "prime256v1"),
                    EcCurve::P384 => ("sha384,ecdsa384", "secp384r1"),
                };
                w.prop_str("algo", algo);
                w.prop_str("ecdsa,curve", name);
                w.prop("ecdsa,x-point", x);
                w.prop("ecdsa,y-point", y);
            }
        }
        w.end_node();
    }
    w.end_node();

    w.end_node();
    w.finish()
}
