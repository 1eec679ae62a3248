/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains API and macros used by the boot pipeline for error handling

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Boot pipeline error type
///
/// The upper 16 bits identify the component that raised the error, the
/// lower 16 bits the error within that component.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VbootError(pub NonZeroU32);

/// Error taxonomy used to decide how a failure is reported.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorClass {
    /// Malformed container
    Structural,

    /// Security rejection by policy (missing node, unknown algorithm, ...)
    PolicyViolation,

    /// Security rejection by a failed computation (hash or signature)
    CryptoFailure,

    /// Device I/O or platform memory failure
    ResourceFailure,

    /// No device yielded an accepted image
    Exhaustion,

    /// Trusted boot-stage configuration is unusable
    Configuration,
}

const COMPONENT_PARSE: u32 = 0x0001;
const COMPONENT_POLICY: u32 = 0x0002;
const COMPONENT_CRYPTO: u32 = 0x0003;
const COMPONENT_DEVICE: u32 = 0x0004;
const COMPONENT_LOAD: u32 = 0x0005;
const COMPONENT_BOOT: u32 = 0x0006;
const COMPONENT_CONFIG: u32 = 0x0007;

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: VbootError = VbootError::new_const($value);
        )*

        /// Returns the description attached to a known error code.
        pub fn description(&self) -> &'static str {
            $(
                if *self == Self::$name {
                    return $doc;
                }
            )*
            "Unknown error"
        }

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl VbootError {
    /// Create an error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get a VbootError from a u32 is to
    /// use `VbootError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("VbootError cannot be 0"),
        }
    }

    /// Component identifier stored in the upper half of the code.
    pub fn component(&self) -> u32 {
        self.0.get() >> 16
    }

    /// Map the error to its taxonomy class.
    pub fn class(&self) -> ErrorClass {
        match self.component() {
            COMPONENT_PARSE => ErrorClass::Structural,
            COMPONENT_POLICY => ErrorClass::PolicyViolation,
            COMPONENT_CRYPTO => ErrorClass::CryptoFailure,
            COMPONENT_DEVICE | COMPONENT_LOAD => ErrorClass::ResourceFailure,
            COMPONENT_BOOT => ErrorClass::Exhaustion,
            COMPONENT_CONFIG => ErrorClass::Configuration,
            _ => ErrorClass::Configuration,
        }
    }

    /// Returns true when the error is a security rejection of the image.
    pub fn is_security_rejection(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::PolicyViolation | ErrorClass::CryptoFailure
        )
    }

    define_error_constants![
        (PARSE_BAD_MAGIC, 0x0001_0001, "Parse Error: Bad magic number"),
        (
            PARSE_CHECKSUM_MISMATCH,
            0x0001_0002,
            "Parse Error: Header checksum mismatch"
        ),
        (
            PARSE_TRUNCATED,
            0x0001_0003,
            "Parse Error: Declared length exceeds buffer"
        ),
        (
            PARSE_MISSING_CONFIGURATION,
            0x0001_0004,
            "Parse Error: Configuration not found"
        ),
        (
            PARSE_DANGLING_REFERENCE,
            0x0001_0005,
            "Parse Error: Configuration references a missing image"
        ),
        (
            PARSE_NO_PAYLOAD,
            0x0001_0006,
            "Parse Error: Container holds no payload"
        ),
        (
            PARSE_MISSING_IMAGES,
            0x0001_0007,
            "Parse Error: Images node not found"
        ),
        (
            PARSE_MISSING_PROPERTY,
            0x0001_0008,
            "Parse Error: Mandatory property missing"
        ),
        (
            PARSE_BAD_PROPERTY,
            0x0001_0009,
            "Parse Error: Property has an invalid value"
        ),
        (
            PARSE_BAD_STRUCTURE,
            0x0001_000A,
            "Parse Error: Corrupted tree structure"
        ),
        (
            PARSE_BAD_VERSION,
            0x0001_000B,
            "Parse Error: Unsupported tree version"
        ),
        (
            PARSE_UNIT_ADDRESS,
            0x0001_000C,
            "Parse Error: Node name carries a unit address"
        ),
        (
            PARSE_WRONG_ARCH,
            0x0001_000D,
            "Parse Error: Image built for another architecture"
        ),
        (
            PARSE_WRONG_TYPE,
            0x0001_000E,
            "Parse Error: Image type not bootable from its slot"
        ),
        (
            PARSE_WRONG_OS,
            0x0001_000F,
            "Parse Error: Image operating system not bootable"
        ),
        (
            POLICY_UNKNOWN_ALGO,
            0x0002_0001,
            "Policy Error: Unknown algorithm"
        ),
        (
            POLICY_MALFORMED_ALGO,
            0x0002_0002,
            "Policy Error: Malformed signature algorithm name"
        ),
        (
            POLICY_MISSING_KEY_HINT,
            0x0002_0003,
            "Policy Error: Signature node names no key"
        ),
        (
            POLICY_KEY_NOT_FOUND,
            0x0002_0004,
            "Policy Error: Key not present in trust store"
        ),
        (
            POLICY_KEY_ALGO_MISMATCH,
            0x0002_0005,
            "Policy Error: Key type incompatible with algorithm"
        ),
        (
            POLICY_NO_SIGNATURE,
            0x0002_0006,
            "Policy Error: No verified configuration signature"
        ),
        (
            POLICY_LEGACY_NOT_PERMITTED,
            0x0002_0007,
            "Policy Error: Legacy images not permitted"
        ),
        (
            POLICY_REQUIRED_KEY_UNUSED,
            0x0002_0008,
            "Policy Error: Required key did not verify image"
        ),
        (
            POLICY_MISSING_VALUE,
            0x0002_0009,
            "Policy Error: Verification node carries no value"
        ),
        (
            CRYPTO_HASH_MISMATCH,
            0x0003_0001,
            "Crypto Error: Hash mismatch"
        ),
        (
            CRYPTO_HASH_LENGTH_MISMATCH,
            0x0003_0002,
            "Crypto Error: Hash length mismatch"
        ),
        (
            CRYPTO_SIGNATURE_INVALID,
            0x0003_0003,
            "Crypto Error: Signature verification failed"
        ),
        (
            CRYPTO_DATA_CRC_MISMATCH,
            0x0003_0004,
            "Crypto Error: Data checksum mismatch"
        ),
        (
            CRYPTO_RANGE_OUT_OF_BOUNDS,
            0x0003_0005,
            "Crypto Error: Digest range outside buffer"
        ),
        (DEVICE_NOT_PRESENT, 0x0004_0001, "Device Error: Not present"),
        (DEVICE_IO, 0x0004_0002, "Device Error: Read failed"),
        (
            DEVICE_NO_FILESYSTEM,
            0x0004_0003,
            "Device Error: Filesystem access not supported"
        ),
        (
            DEVICE_IMAGE_TOO_LARGE,
            0x0004_0004,
            "Device Error: Image exceeds maximum size"
        ),
        (
            LOAD_OUT_OF_RAM,
            0x0005_0001,
            "Load Error: Destination outside RAM"
        ),
        (
            LOAD_OVERLAPS_STAGE,
            0x0005_0002,
            "Load Error: Destination overlaps boot stage"
        ),
        (
            LOAD_OVERLAPPING_PAYLOADS,
            0x0005_0003,
            "Load Error: Payload destinations overlap"
        ),
        (
            LOAD_ENTRY_OUTSIDE_IMAGE,
            0x0005_0004,
            "Load Error: Entry point outside loaded image"
        ),
        (
            LOAD_UNSUPPORTED_COMPRESSION,
            0x0005_0005,
            "Load Error: Compressed payloads not supported"
        ),
        (
            LOAD_SOURCE_ALIASES_DEST,
            0x0005_0006,
            "Load Error: Source buffer aliases destination"
        ),
        (
            LOAD_NO_DESTINATION,
            0x0005_0007,
            "Load Error: No payload has a load address"
        ),
        (
            BOOT_EXHAUSTED,
            0x0006_0001,
            "Boot Error: All boot devices failed"
        ),
        (
            BOOT_NO_DEVICES,
            0x0006_0002,
            "Boot Error: Boot device list is empty"
        ),
        (
            CONFIG_TRUST_STORE_MALFORMED,
            0x0007_0001,
            "Config Error: Malformed key node"
        ),
        (
            CONFIG_TRUST_STORE_DUPLICATE_KEY,
            0x0007_0002,
            "Config Error: Duplicate key name"
        ),
        (
            CONFIG_BAD_MEMORY_LAYOUT,
            0x0007_0003,
            "Config Error: Invalid memory layout"
        ),
    ];
}

impl From<core::num::NonZeroU32> for crate::VbootError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::VbootError(val)
    }
}

impl From<VbootError> for core::num::NonZeroU32 {
    fn from(val: VbootError) -> Self {
        val.0
    }
}

impl From<VbootError> for u32 {
    fn from(val: VbootError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for VbootError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(VbootError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type VbootResult<T> = Result<T, VbootError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_try_from() {
        assert!(VbootError::try_from(0).is_err());
        assert_eq!(
            Ok(VbootError::PARSE_TRUNCATED),
            VbootError::try_from(0x0001_0003)
        );
    }

    #[test]
    fn test_error_constants_uniqueness() {
        let constants = VbootError::all_constants();
        let mut error_values = HashSet::new();
        let mut duplicates = Vec::new();

        for (name, value) in constants {
            if !error_values.insert(value) {
                duplicates.push((name, value));
            }
        }

        assert!(
            duplicates.is_empty(),
            "Found duplicate error codes: {:?}",
            duplicates
        );
    }

    #[test]
    fn test_class() {
        assert_eq!(
            VbootError::PARSE_BAD_MAGIC.class(),
            ErrorClass::Structural
        );
        assert_eq!(
            VbootError::POLICY_NO_SIGNATURE.class(),
            ErrorClass::PolicyViolation
        );
        assert_eq!(
            VbootError::CRYPTO_SIGNATURE_INVALID.class(),
            ErrorClass::CryptoFailure
        );
        assert_eq!(VbootError::DEVICE_IO.class(), ErrorClass::ResourceFailure);
        assert_eq!(
            VbootError::LOAD_OVERLAPS_STAGE.class(),
            ErrorClass::ResourceFailure
        );
        assert_eq!(VbootError::BOOT_EXHAUSTED.class(), ErrorClass::Exhaustion);
        assert_eq!(
            VbootError::CONFIG_BAD_MEMORY_LAYOUT.class(),
            ErrorClass::Configuration
        );
    }

    #[test]
    fn test_security_rejection() {
        assert!(VbootError::CRYPTO_HASH_MISMATCH.is_security_rejection());
        assert!(VbootError::POLICY_KEY_NOT_FOUND.is_security_rejection());
        assert!(!VbootError::PARSE_CHECKSUM_MISMATCH.is_security_rejection());
        assert!(!VbootError::DEVICE_IO.is_security_rejection());
    }

    #[test]
    fn test_description() {
        assert_eq!(
            VbootError::PARSE_BAD_MAGIC.description(),
            "Parse Error: Bad magic number"
        );
        let unknown = VbootError::try_from(0x00ff_00ff).unwrap();
        assert_eq!(unknown.description(), "Unknown error");
    }
}
