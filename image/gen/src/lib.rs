/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures for the boot image generator.

--*/

mod control;
mod crypto;
mod fdt;
mod fit;
mod legacy;

pub use control::control_fdt;
pub use crypto::{RustCrypto, SigningKey};
pub use fdt::FdtWriter;
pub use fit::{DataPlacement, FitConfig, FitGenerator, FitImage, FitSignature};
pub use legacy::LegacyGenerator;

/// Image Generator Crypto Trait
pub trait ImageGeneratorCrypto {
    /// Digest `data` with the named hash algorithm (`sha256`, `crc32`, ...)
    fn digest(&self, algo: &str, data: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Sign a digest produced by `hash`
    fn sign(&self, key: &SigningKey, hash: &str, digest: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// Split `sha256,rsa2048` into its hash and crypto halves.
pub fn split_algo(algo: &str) -> anyhow::Result<(&str, &str)> {
    algo.split_once(',')
        .ok_or_else(|| anyhow::anyhow!("invalid signature algorithm {algo}"))
}
