/*++

Licensed under the Apache-2.0 license.

File Name:

    rsa.rs

Abstract:

    RSA PKCS#1 v1.5 signature verification.

--*/

use ::rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use vboot_image_types::{DigestBytes, HashId, KeyAlgo, KeyMaterial, PublicKey};

use crate::sig::SignatureAlgorithm;

pub(crate) struct RsaPkcs1v15 {
    name: &'static str,
    bits: usize,
}

impl RsaPkcs1v15 {
    pub(crate) const fn new(name: &'static str, bits: usize) -> Self {
        Self { name, bits }
    }
}

fn padding(algo: HashId) -> Option<Pkcs1v15Sign> {
    match algo {
        HashId::Sha1 => Some(Pkcs1v15Sign::new::<Sha1>()),
        HashId::Sha256 => Some(Pkcs1v15Sign::new::<Sha256>()),
        HashId::Sha384 => Some(Pkcs1v15Sign::new::<Sha384>()),
        HashId::Sha512 => Some(Pkcs1v15Sign::new::<Sha512>()),
        HashId::Md5 | HashId::Crc32 => None,
    }
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn name(&self) -> &'static str {
        self.name
    }

    fn key_algo(&self) -> KeyAlgo {
        KeyAlgo::Rsa
    }

    /// The padding and the embedded DigestInfo are checked by the `rsa`
    /// crate; the recovered digest is compared in constant time.
    fn verify(&self, key: &PublicKey, digest: &DigestBytes, signature: &[u8]) -> bool {
        let KeyMaterial::Rsa { modulus, exponent } = key.material() else {
            return false;
        };
        if key.rsa_bits() != Some(self.bits) || signature.len() != self.bits / 8 {
            return false;
        }
        let Some(padding) = padding(digest.algo()) else {
            return false;
        };
        let Ok(public) = RsaPublicKey::new(BigUint::from_bytes_be(modulus), BigUint::from(*exponent))
        else {
            return false;
        };
        public.verify(padding, digest.as_bytes(), signature).is_ok()
    }
}
