/*++

Licensed under the Apache-2.0 license.

File Name:

    keys.rs

Abstract:

    File contains the trust anchor types.

--*/

use alloc::string::String;
use alloc::vec::Vec;

use getset::{CopyGetters, Getters};
use vboot_error::{VbootError, VbootResult};

/// Elliptic curves supported for image signatures
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EcCurve {
    P256,
    P384,
}

impl EcCurve {
    /// Decode an `ecdsa,curve` property value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "prime256v1" | "secp256r1" => Some(Self::P256),
            "secp384r1" => Some(Self::P384),
            _ => None,
        }
    }

    /// Coordinate size in bytes.
    pub const fn coord_size(&self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
        }
    }
}

/// Key family, derived from the key material.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyAlgo {
    Rsa,
    Ecdsa(EcCurve),
}

/// Public key material
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum KeyMaterial {
    /// Big-endian modulus and public exponent
    Rsa { modulus: Vec<u8>, exponent: u64 },

    /// Affine point coordinates, big-endian
    Ecdsa { curve: EcCurve, x: Vec<u8>, y: Vec<u8> },
}

/// What a required key must have verified before an image is accepted.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum KeyRequirement {
    /// Key may verify signatures but is never demanded
    #[default]
    Optional,

    /// Every loaded image must carry a signature verified by this key
    Image,

    /// The selected configuration must carry a signature verified by this key
    Conf,
}

impl KeyRequirement {
    /// Decode a key node `required` property value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "image" => Some(Self::Image),
            "conf" => Some(Self::Conf),
            _ => None,
        }
    }

    pub const fn name(&self) -> Option<&'static str> {
        match self {
            Self::Optional => None,
            Self::Image => Some("image"),
            Self::Conf => Some("conf"),
        }
    }

    pub fn is_required(&self) -> bool {
        *self != Self::Optional
    }
}

impl From<bool> for KeyRequirement {
    fn from(required: bool) -> Self {
        if required {
            Self::Image
        } else {
            Self::Optional
        }
    }
}

/// Trust anchor
#[derive(Debug, Clone, Eq, PartialEq, Getters, CopyGetters)]
pub struct PublicKey {
    /// Name referenced by `key-name-hint`
    #[getset(get = "pub")]
    name: String,

    /// Key material
    #[getset(get = "pub")]
    material: KeyMaterial,

    /// Signatures this key must have verified
    #[getset(get_copy = "pub")]
    required: KeyRequirement,
}

impl PublicKey {
    pub fn new(name: &str, material: KeyMaterial, required: impl Into<KeyRequirement>) -> Self {
        Self {
            name: name.into(),
            material,
            required: required.into(),
        }
    }

    pub fn algo(&self) -> KeyAlgo {
        match &self.material {
            KeyMaterial::Rsa { .. } => KeyAlgo::Rsa,
            KeyMaterial::Ecdsa { curve, .. } => KeyAlgo::Ecdsa(*curve),
        }
    }

    /// Modulus size in bits for RSA keys, ignoring leading zero bytes.
    pub fn rsa_bits(&self) -> Option<usize> {
        match &self.material {
            KeyMaterial::Rsa { modulus, .. } => {
                let lead = modulus.iter().take_while(|&&b| b == 0).count();
                let rest = &modulus[lead..];
                match rest.first() {
                    Some(first) => {
                        Some((rest.len() - 1) * 8 + (8 - first.leading_zeros() as usize))
                    }
                    None => Some(0),
                }
            }
            KeyMaterial::Ecdsa { .. } => None,
        }
    }
}

/// Immutable set of trust anchors.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TrustStore {
    keys: Vec<PublicKey>,
}

impl TrustStore {
    /// Build the store. Key names must be unique.
    pub fn new(keys: Vec<PublicKey>) -> VbootResult<Self> {
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].iter().any(|k| k.name == key.name) {
                return Err(VbootError::CONFIG_TRUST_STORE_DUPLICATE_KEY);
            }
        }
        Ok(Self { keys })
    }

    pub fn find(&self, name: &str) -> Option<&PublicKey> {
        self.keys.iter().find(|k| k.name == name)
    }

    /// Keys carrying the given requirement.
    pub fn required_keys(&self, level: KeyRequirement) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter().filter(move |k| k.required == level)
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn rsa_key(name: &str, required: bool) -> PublicKey {
        PublicKey::new(
            name,
            KeyMaterial::Rsa {
                modulus: vec![0x00, 0x80, 0x01],
                exponent: 65537,
            },
            required,
        )
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let res = TrustStore::new(vec![rsa_key("dev", false), rsa_key("dev", true)]);
        assert_eq!(res, Err(VbootError::CONFIG_TRUST_STORE_DUPLICATE_KEY));
    }

    #[test]
    fn test_lookup() {
        let conf = PublicKey::new(
            "conf",
            KeyMaterial::Rsa {
                modulus: vec![0x80, 0x01],
                exponent: 3,
            },
            KeyRequirement::Conf,
        );
        let store =
            TrustStore::new(vec![rsa_key("dev", false), rsa_key("prod", true), conf]).unwrap();
        assert!(store.find("dev").is_some());
        assert!(store.find("missing").is_none());
        let image: Vec<_> = store
            .required_keys(KeyRequirement::Image)
            .map(|k| k.name().as_str())
            .collect();
        assert_eq!(image, vec!["prod"]);
        let conf: Vec<_> = store
            .required_keys(KeyRequirement::Conf)
            .map(|k| k.name().as_str())
            .collect();
        assert_eq!(conf, vec!["conf"]);
        assert_eq!(KeyRequirement::from_name("conf"), Some(KeyRequirement::Conf));
        assert_eq!(KeyRequirement::from_name("yes"), None);
    }

    #[test]
    fn test_algo_follows_material() {
        let key = rsa_key("dev", false);
        assert_eq!(key.algo(), KeyAlgo::Rsa);
        assert_eq!(key.rsa_bits(), Some(16));

        let ec = PublicKey::new(
            "ec",
            KeyMaterial::Ecdsa {
                curve: EcCurve::P384,
                x: vec![0; 48],
                y: vec![0; 48],
            },
            false,
        );
        assert_eq!(ec.algo(), KeyAlgo::Ecdsa(EcCurve::P384));
        assert_eq!(ec.rsa_bits(), None);
        assert_eq!(EcCurve::from_name("prime256v1"), Some(EcCurve::P256));
        assert_eq!(EcCurve::from_name("brainpool"), None);
    }
}
