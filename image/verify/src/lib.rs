/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Boot image verification library.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod env;
mod verifier;

use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;
use vboot_error::{VbootError, VbootResult};
use vboot_image_types::*;

pub use env::CryptoEnv;
pub use verifier::ImageVerifier;

bitflags! {
    /// Verification policy of the boot stage
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct VerificationPolicy: u32 {
        /// FIT images need a verified configuration signature
        const REQUIRE_SIGNATURE = 0b0000_0001;

        /// Legacy images may be booted on their data checksum alone
        const ALLOW_LEGACY = 0b0000_0010;
    }
}

/// Verification outcome
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VerificationOutcome {
    Accepted,

    /// Rejected, with the error that decided it
    Rejected(VbootError),
}

/// Node that did not pass
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FailedNode {
    /// Node name, or the payload or configuration name for checks that
    /// are not tied to a single node
    pub name: String,

    pub error: VbootError,
}

/// Verdict over one image descriptor
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VerificationVerdict {
    pub outcome: VerificationOutcome,

    /// Diagnostics only; never consulted for the decision
    pub failed_nodes: Vec<FailedNode>,
}

impl VerificationVerdict {
    pub fn is_accepted(&self) -> bool {
        self.outcome == VerificationOutcome::Accepted
    }

    /// Convert into a result carrying the rejection error.
    pub fn into_result(self) -> VbootResult<()> {
        match self.outcome {
            VerificationOutcome::Accepted => Ok(()),
            VerificationOutcome::Rejected(err) => Err(err),
        }
    }
}

/// Image Verification Environment
pub trait ImageVerificationEnv {
    /// Digest the concatenation of `ranges` of `buffer`
    fn digest(&self, algo: &str, ranges: &[ByteRange], buffer: &[u8]) -> VbootResult<DigestBytes>;

    /// Verify a signature over a digest
    fn verify_signature(
        &self,
        algo: &str,
        key: &PublicKey,
        digest: &DigestBytes,
        signature: &[u8],
    ) -> bool;

    /// Compute the CRC32 of a Legacy image's data
    fn crc32(&self, data: &[u8]) -> u32;
}
