/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the digest and signature engines used to verify boot
    images.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod ecdsa;
pub mod hash;
mod rsa;
pub mod sig;

pub use hash::{digest, find_hash, HashAlgorithm};
pub use sig::{check_key, find_signature, split_algo, verify, SignatureAlgorithm};
