/*++

Licensed under the Apache-2.0 license.

File Name:

    hash.rs

Abstract:

    Static registry of digest algorithms.

--*/

use core::marker::PhantomData;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use vboot_error::{VbootError, VbootResult};
use vboot_image_types::{ByteRange, DigestBytes, HashId};

/// Digest algorithm
pub trait HashAlgorithm: Sync {
    /// Name used in image `algo` properties
    fn name(&self) -> &'static str;

    fn id(&self) -> HashId;

    /// Digest the concatenation of `chunks`
    fn digest(&self, chunks: &[&[u8]]) -> VbootResult<DigestBytes>;
}

struct RustCryptoHash<D> {
    name: &'static str,
    id: HashId,
    _digest: PhantomData<fn() -> D>,
}

impl<D> RustCryptoHash<D> {
    const fn new(name: &'static str, id: HashId) -> Self {
        Self {
            name,
            id,
            _digest: PhantomData,
        }
    }
}

impl<D: Digest> HashAlgorithm for RustCryptoHash<D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn id(&self) -> HashId {
        self.id
    }

    fn digest(&self, chunks: &[&[u8]]) -> VbootResult<DigestBytes> {
        let mut hasher = D::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        DigestBytes::new(self.id, &hasher.finalize()).ok_or(VbootError::POLICY_UNKNOWN_ALGO)
    }
}

/// CRC32 stored big-endian, as in FIT `hash` nodes
struct Crc32Hash;

impl HashAlgorithm for Crc32Hash {
    fn name(&self) -> &'static str {
        "crc32"
    }

    fn id(&self) -> HashId {
        HashId::Crc32
    }

    fn digest(&self, chunks: &[&[u8]]) -> VbootResult<DigestBytes> {
        let mut crc = crc::crc32::Digest::new(crc::crc32::IEEE);
        for chunk in chunks {
            crc::Hasher32::write(&mut crc, chunk);
        }
        let value = crc::Hasher32::sum32(&crc).to_be_bytes();
        DigestBytes::new(HashId::Crc32, &value).ok_or(VbootError::POLICY_UNKNOWN_ALGO)
    }
}

static MD5: RustCryptoHash<Md5> = RustCryptoHash::new("md5", HashId::Md5);
static SHA1: RustCryptoHash<Sha1> = RustCryptoHash::new("sha1", HashId::Sha1);
static SHA256: RustCryptoHash<Sha256> = RustCryptoHash::new("sha256", HashId::Sha256);
static SHA384: RustCryptoHash<Sha384> = RustCryptoHash::new("sha384", HashId::Sha384);
static SHA512: RustCryptoHash<Sha512> = RustCryptoHash::new("sha512", HashId::Sha512);
static CRC32: Crc32Hash = Crc32Hash;

static HASH_ALGORITHMS: [&dyn HashAlgorithm; 6] = [&MD5, &SHA1, &SHA256, &SHA384, &SHA512, &CRC32];

/// Look up a digest algorithm by name.
pub fn find_hash(name: &str) -> VbootResult<&'static dyn HashAlgorithm> {
    HASH_ALGORITHMS
        .iter()
        .copied()
        .find(|algo| algo.name() == name)
        .ok_or(VbootError::POLICY_UNKNOWN_ALGO)
}

/// Digest the concatenation of `ranges` of `buffer` with the named
/// algorithm.
pub fn digest(algo: &str, ranges: &[ByteRange], buffer: &[u8]) -> VbootResult<DigestBytes> {
    let algo = find_hash(algo)?;
    let mut chunks = alloc::vec::Vec::with_capacity(ranges.len());
    for range in ranges {
        chunks.push(
            range
                .slice(buffer)
                .map_err(|_| VbootError::CRYPTO_RANGE_OUT_OF_BOUNDS)?,
        );
    }
    algo.digest(&chunks)
}
