/*++

Licensed under the Apache-2.0 license.

File Name:

   env.rs

Abstract:

    Verification environment backed by the software crypto engines.

--*/

use vboot_error::VbootResult;
use vboot_image_types::{ByteRange, DigestBytes, PublicKey};

use crate::ImageVerificationEnv;

/// Production verification environment
#[derive(Debug, Default, Copy, Clone)]
pub struct CryptoEnv;

impl ImageVerificationEnv for CryptoEnv {
    fn digest(&self, algo: &str, ranges: &[ByteRange], buffer: &[u8]) -> VbootResult<DigestBytes> {
        vboot_image_crypto::digest(algo, ranges, buffer)
    }

    fn verify_signature(
        &self,
        algo: &str,
        key: &PublicKey,
        digest: &DigestBytes,
        signature: &[u8],
    ) -> bool {
        vboot_image_crypto::verify(algo, key, digest, signature)
    }

    fn crc32(&self, data: &[u8]) -> u32 {
        crc::crc32::checksum_ieee(data)
    }
}
