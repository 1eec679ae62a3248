/*++

Licensed under the Apache-2.0 license.

File Name:

    sig.rs

Abstract:

    Static registry of signature algorithms.

--*/

use vboot_error::{VbootError, VbootResult};
use vboot_image_types::{DigestBytes, EcCurve, KeyAlgo, PublicKey};

use crate::ecdsa::Ecdsa;
use crate::rsa::RsaPkcs1v15;

/// Signature algorithm
pub trait SignatureAlgorithm: Sync {
    /// Name used after the comma in image `algo` properties
    fn name(&self) -> &'static str;

    /// Key family this algorithm accepts
    fn key_algo(&self) -> KeyAlgo;

    /// Verify `signature` over a precomputed digest. Any malformed input
    /// is a failed verification.
    fn verify(&self, key: &PublicKey, digest: &DigestBytes, signature: &[u8]) -> bool;
}

static RSA2048: RsaPkcs1v15 = RsaPkcs1v15::new("rsa2048", 2048);
static RSA3072: RsaPkcs1v15 = RsaPkcs1v15::new("rsa3072", 3072);
static RSA4096: RsaPkcs1v15 = RsaPkcs1v15::new("rsa4096", 4096);
static ECDSA256: Ecdsa = Ecdsa::new("ecdsa256", EcCurve::P256);
static ECDSA384: Ecdsa = Ecdsa::new("ecdsa384", EcCurve::P384);

static SIGNATURE_ALGORITHMS: [&dyn SignatureAlgorithm; 5] =
    [&RSA2048, &RSA3072, &RSA4096, &ECDSA256, &ECDSA384];

/// Split `sha256,rsa2048` into its hash and signature names.
pub fn split_algo(algo: &str) -> VbootResult<(&str, &str)> {
    match algo.split_once(',') {
        Some((hash, crypto)) if !hash.is_empty() && !crypto.is_empty() && !crypto.contains(',') => {
            Ok((hash, crypto))
        }
        _ => Err(VbootError::POLICY_MALFORMED_ALGO),
    }
}

/// Look up a signature algorithm by name.
pub fn find_signature(name: &str) -> VbootResult<&'static dyn SignatureAlgorithm> {
    SIGNATURE_ALGORITHMS
        .iter()
        .copied()
        .find(|algo| algo.name() == name)
        .ok_or(VbootError::POLICY_UNKNOWN_ALGO)
}

/// Fail unless `key` can be used with the named algorithm.
pub fn check_key(algo: &str, key: &PublicKey) -> VbootResult<()> {
    if find_signature(algo)?.key_algo() != key.algo() {
        return Err(VbootError::POLICY_KEY_ALGO_MISMATCH);
    }
    Ok(())
}

/// Verify a signature. Unknown algorithms and key type mismatches fail
/// without attempting verification.
pub fn verify(algo: &str, key: &PublicKey, digest: &DigestBytes, signature: &[u8]) -> bool {
    match find_signature(algo) {
        Ok(sig) if sig.key_algo() == key.algo() => sig.verify(key, digest, signature),
        _ => false,
    }
}
