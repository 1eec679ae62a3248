/*++

Licensed under the Apache-2.0 license.

File Name:

    ecdsa.rs

Abstract:

    ECDSA signature verification over P-256 and P-384.

--*/

use alloc::vec::Vec;

use p256::ecdsa::signature::hazmat::PrehashVerifier;
use vboot_image_types::{DigestBytes, EcCurve, KeyAlgo, KeyMaterial, PublicKey};

use crate::sig::SignatureAlgorithm;

pub(crate) struct Ecdsa {
    name: &'static str,
    curve: EcCurve,
}

impl Ecdsa {
    pub(crate) const fn new(name: &'static str, curve: EcCurve) -> Self {
        Self { name, curve }
    }
}

/// Uncompressed SEC1 encoding of an affine point.
fn sec1_point(x: &[u8], y: &[u8]) -> Vec<u8> {
    let mut point = Vec::with_capacity(1 + x.len() + y.len());
    point.push(0x04);
    point.extend_from_slice(x);
    point.extend_from_slice(y);
    point
}

impl SignatureAlgorithm for Ecdsa {
    fn name(&self) -> &'static str {
        self.name
    }

    fn key_algo(&self) -> KeyAlgo {
        KeyAlgo::Ecdsa(self.curve)
    }

    /// `signature` is `r || s`. Point decoding rejects points off the
    /// curve and signature decoding rejects scalars outside `[1, n)`.
    fn verify(&self, key: &PublicKey, digest: &DigestBytes, signature: &[u8]) -> bool {
        let KeyMaterial::Ecdsa { curve, x, y } = key.material() else {
            return false;
        };
        let size = self.curve.coord_size();
        if *curve != self.curve || digest.len() != size || signature.len() != 2 * size {
            return false;
        }
        let point = sec1_point(x, y);

        match self.curve {
            EcCurve::P256 => {
                let (Ok(key), Ok(sig)) = (
                    p256::ecdsa::VerifyingKey::from_sec1_bytes(&point),
                    p256::ecdsa::Signature::from_slice(signature),
                ) else {
                    return false;
                };
                key.verify_prehash(digest.as_bytes(), &sig).is_ok()
            }
            EcCurve::P384 => {
                let (Ok(key), Ok(sig)) = (
                    p384::ecdsa::VerifyingKey::from_sec1_bytes(&point),
                    p384::ecdsa::Signature::from_slice(signature),
                ) else {
                    return false;
                };
                key.verify_prehash(digest.as_bytes(), &sig).is_ok()
            }
        }
    }
}
