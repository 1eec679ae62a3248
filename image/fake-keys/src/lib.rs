// Licensed under the Apache-2.0 license

use vboot_image_gen::SigningKey;
use vboot_image_types::{EcCurve, KeyMaterial, KeyRequirement, PublicKey};

/// Development signing keys. Never provision these on a production part.
///
/// The RSA key was generated with
///
/// ```text
/// openssl genrsa -out dev-rsa2048.pem 2048
/// openssl rsa -in dev-rsa2048.pem -text -noout
/// ```
///
/// The ECDSA keys use fixed private scalars so that the public points can
/// be reproduced with any tool.
pub const RSA2048_MODULUS: &str = concat!(
    "be3fe8450e8a9246bf2f6e491d51e547173e52d324c20b1cc349607e59cfaec6",
    "bf195f19b5340971c164851d6d81678ff5043a3d299b574ec8356fd65b71c337",
    "c4c404195e7522156b978dec1e1171ef13cb517cf6b7d38c7b96829dc357b104",
    "d2db910965470750628fb75429cca130a66bcb856d038db8879471d1a124a7c6",
    "bba81c47b486c1c01896ca21349beb8b2ee9c9ffeb9d95fda22952a57e8b5cde",
    "e63e717008d1f698232d89dc64213ea7e88b18d2e8bb7784dbf45d3216c6818b",
    "e924a4dac397b79a5687056419fd201af4d440faaba6c93801dc37ddddb1f44a",
    "2903f74071d6e2fcef99a98b8f187d820ed35cbe3b17bebfaa2b539e3997ab2d",
);

pub const RSA2048_PUBLIC_EXPONENT: u64 = 65537;

pub const RSA2048_PRIVATE_EXPONENT: &str = concat!(
    "1ed0ec370f596bc330e1a66c0a67430ba65cae7ecbf3f067dacc0e68b8f4767b",
    "73e5d0ad31d83975671d78a06125f657ef989d345e026efc705a938075b4722a",
    "1ce1a14658b20170d5ca292f67596d0a8c3ac13acc1dcf92f04bdb61618c593c",
    "8e49096fabab7b284ea6b7cbd6af722696b65c33830a71d0c3894c7c67ad2fcd",
    "ada1a74ae388e9426a850df2b4b82aa1c5b6db0f121c7b039457bbe62d4b811c",
    "bceb985b66d989deabe905e7fb8fb297611ea7f024f87c25632ab68f508b7503",
    "638bcbd078e05f64bf65eb6ffc9d694e99ef4129c98653ebdd87b215b571f0ee",
    "131926d01a5625571300a3c2e79f5e2b62ad5ca58162ce18c5da00dedeede763",
);

pub const RSA2048_PRIME_P: &str = concat!(
    "f512f1af792b5abb9e96d9dea65b2f3ed0d637411df45781b576cd14dec73dc3",
    "68b6fb84337bade2bbdf2b216955017457f6260decd6fd30cf7c11ed4cb71ab7",
    "b6f47d1a15f91974461ad99017a7c3c9822c2b8d8208c0b33c976b393b30973f",
    "0c7c28c80708e89aa639d30ab0f97dcb749f40418387fa374f79e7c3540490cb",
);

pub const RSA2048_PRIME_Q: &str = concat!(
    "c6bb3f3352ef5852b9a75fdc6f0cddc5b8a6e09498c9475b71b9541e2daeb899",
    "0c3ff05b4a812809f2449ea305834c29d1237ea52d758afbb7ad3f20340ac20c",
    "d7a42ddf1ea1219fdd8be63b8955e18869eb09dca8295ce823f208172efcd3a1",
    "c2ec58d0deb2d4e40b79efcfcd13a84fdc77acf4923918ab9cd5f06c079e8ce7",
);

pub const P256_KEY_0_PRIVATE: [u8; 32] = [0x11; 32];
pub const P256_KEY_0_X: &str = "0217e617f0b6443928278f96999e69a23a4f2c152bdf6d6cdf66e5b80282d4ed";
pub const P256_KEY_0_Y: &str = "194a7debcb97712d2dda3ca85aa8765a56f45fc758599652f2897c65306e5794";

pub const P256_KEY_1_PRIVATE: [u8; 32] = [0x33; 32];
pub const P256_KEY_1_X: &str = "51a7580833898ea1b183cbd7350a4099078c6ef1c1e18e970cd7683035f25e7d";
pub const P256_KEY_1_Y: &str = "0110522712b0b5a7cff081685486984a94e6831edac46e7360fa9d834a7a81a1";

pub const P384_KEY_0_PRIVATE: [u8; 48] = [0x22; 48];
pub const P384_KEY_0_X: &str = concat!(
    "4f2bda7fd2105f8467e21f45223ad58863ffa4c084832d9f",
    "6c64ffc47fdd519727ab53cb71f9c40de24b64acde61f02f",
);
pub const P384_KEY_0_Y: &str = concat!(
    "c7dce130b612fa5dbcac94573a2354fd005d8e9caefdc5fd",
    "e48304474708bbd82f77e1fd2c630bea236f6f8dccc1678e",
);

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}

pub fn rsa2048_modulus() -> Vec<u8> {
    unhex(RSA2048_MODULUS)
}

pub fn rsa2048_private_exponent() -> Vec<u8> {
    unhex(RSA2048_PRIVATE_EXPONENT)
}

pub fn rsa2048_primes() -> [Vec<u8>; 2] {
    [unhex(RSA2048_PRIME_P), unhex(RSA2048_PRIME_Q)]
}

pub fn rsa2048_public_key(name: &str, required: impl Into<KeyRequirement>) -> PublicKey {
    PublicKey::new(
        name,
        KeyMaterial::Rsa {
            modulus: rsa2048_modulus(),
            exponent: RSA2048_PUBLIC_EXPONENT,
        },
        required,
    )
}

pub fn p256_key_0_public(name: &str, required: impl Into<KeyRequirement>) -> PublicKey {
    ec_public(name, EcCurve::P256, P256_KEY_0_X, P256_KEY_0_Y, required)
}

pub fn p256_key_1_public(name: &str, required: impl Into<KeyRequirement>) -> PublicKey {
    ec_public(name, EcCurve::P256, P256_KEY_1_X, P256_KEY_1_Y, required)
}

pub fn p384_key_0_public(name: &str, required: impl Into<KeyRequirement>) -> PublicKey {
    ec_public(name, EcCurve::P384, P384_KEY_0_X, P384_KEY_0_Y, required)
}

pub fn rsa2048_signing_key() -> SigningKey {
    SigningKey::rsa(
        &rsa2048_modulus(),
        RSA2048_PUBLIC_EXPONENT,
        &rsa2048_private_exponent(),
        &rsa2048_primes(),
    )
    .unwrap()
}

pub fn p256_key_0_signing_key() -> SigningKey {
    SigningKey::p256(&P256_KEY_0_PRIVATE).unwrap()
}

pub fn p256_key_1_signing_key() -> SigningKey {
    SigningKey::p256(&P256_KEY_1_PRIVATE).unwrap()
}

pub fn p384_key_0_signing_key() -> SigningKey {
    SigningKey::p384(&P384_KEY_0_PRIVATE).unwrap()
}

fn ec_public(name: &str, curve: EcCurve, x: &str, y: &str, required: impl Into<KeyRequirement>) -> PublicKey {
    PublicKey::new(
        name,
        KeyMaterial::Ecdsa {
            curve,
            x: unhex(x),
            y: unhex(y),
        },
        required,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_sizes() {
        assert_eq!(rsa2048_public_key("dev", false).rsa_bits(), Some(2048));
        assert_eq!(rsa2048_primes()[0].len(), 128);
        assert_eq!(unhex(P256_KEY_0_X).len(), 32);
        assert_eq!(unhex(P256_KEY_1_Y).len(), 32);
        assert_eq!(unhex(P384_KEY_0_X).len(), 48);
        assert_eq!(unhex(P384_KEY_0_Y).len(), 48);
    }
}
