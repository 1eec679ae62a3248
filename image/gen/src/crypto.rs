/*++

Licensed under the Apache-2.0 license.

File Name:

   crypto.rs

Abstract:

    File contains crypto utilities needed to generate images.

--*/

use anyhow::{anyhow, bail};
use md5::Md5;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::ImageGeneratorCrypto;

/// Private key used to sign generated images
pub enum SigningKey {
    Rsa(Box<RsaPrivateKey>),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl SigningKey {
    /// Build an RSA key from big-endian components.
    pub fn rsa(
        modulus: &[u8],
        exponent: u64,
        d: &[u8],
        primes: &[Vec<u8>],
    ) -> anyhow::Result<Self> {
        let key = RsaPrivateKey::from_components(
            BigUint::from_bytes_be(modulus),
            BigUint::from(exponent),
            BigUint::from_bytes_be(d),
            primes.iter().map(|p| BigUint::from_bytes_be(p)).collect(),
        )
        .map_err(|e| anyhow!("invalid RSA private key: {e}"))?;
        Ok(Self::Rsa(Box::new(key)))
    }

    pub fn p256(scalar: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::P256(
            p256::ecdsa::SigningKey::from_slice(scalar)
                .map_err(|e| anyhow!("invalid P-256 scalar: {e}"))?,
        ))
    }

    pub fn p384(scalar: &[u8]) -> anyhow::Result<Self> {
        Ok(Self::P384(
            p384::ecdsa::SigningKey::from_slice(scalar)
                .map_err(|e| anyhow!("invalid P-384 scalar: {e}"))?,
        ))
    }
}

#[derive(Default)]
pub struct RustCrypto {}

impl ImageGeneratorCrypto for RustCrypto {
    fn digest(&self, algo: &str, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(match algo {
            "md5" => Md5::digest(data).to_vec(),
            "sha1" => Sha1::digest(data).to_vec(),
            "sha256" => Sha256::digest(data).to_vec(),
            "sha384" => Sha384::digest(data).to_vec(),
            "sha512" => Sha512::digest(data).to_vec(),
            "crc32" => crc::crc32::checksum_ieee(data).to_be_bytes().to_vec(),
            _ => bail!("unsupported hash algorithm {algo}"),
        })
    }

    fn sign(&self, key: &SigningKey, hash: &str, digest: &[u8]) -> anyhow::Result<Vec<u8>> {
        match key {
            SigningKey::Rsa(key) => {
                let padding = match hash {
                    "sha1" => Pkcs1v15Sign::new::<Sha1>(),
                    "sha256" => Pkcs1v15Sign::new::<Sha256>(),
                    "sha384" => Pkcs1v15Sign::new::<Sha384>(),
                    "sha512" => Pkcs1v15Sign::new::<Sha512>(),
                    _ => bail!("unsupported RSA hash {hash}"),
                };
                key.sign(padding, digest)
                    .map_err(|e| anyhow!("RSA signing failed: {e}"))
            }
            SigningKey::P256(key) => {
                let sig: p256::ecdsa::Signature = key
                    .sign_prehash(digest)
                    .map_err(|e| anyhow!("ECDSA signing failed: {e}"))?;
                Ok(sig.to_bytes().to_vec())
            }
            SigningKey::P384(key) => {
                let sig: p384::ecdsa::Signature = key
                    .sign_prehash(digest)
                    .map_err(|e| anyhow!("ECDSA signing failed: {e}"))?;
                Ok(sig.to_bytes().to_vec())
            }
        }
    }
}
