/*++

Licensed under the Apache-2.0 license.

File Name:

   verifier.rs

Abstract:

    This file is the main implementation of the boot image verifier.

--*/

use alloc::vec::Vec;

use subtle::ConstantTimeEq;
use vboot_error::{VbootError, VbootResult};
use vboot_image_crypto::{check_key, split_algo};
use vboot_image_types::*;

use crate::*;

/// Signature that verified a payload or the configuration
struct VerifiedSignature<'a> {
    target: NodeTarget,
    key: &'a str,
}

fn reject(failed: &mut Vec<FailedNode>, name: &str, err: VbootError) -> VbootResult<()> {
    failed.push(FailedNode {
        name: name.into(),
        error: err,
    });
    Err(err)
}

/// Image Verifier
pub struct ImageVerifier<Env: ImageVerificationEnv> {
    /// Verification Environment
    env: Env,

    /// Policy flags
    policy: VerificationPolicy,
}

impl<Env: ImageVerificationEnv> ImageVerifier<Env> {
    /// Create a new instance `ImageVerifier`
    ///
    /// # Arguments
    ///
    /// * `env`    - Environment
    /// * `policy` - Verification policy
    pub fn new(env: Env, policy: VerificationPolicy) -> Self {
        Self { env, policy }
    }

    pub fn policy(&self) -> VerificationPolicy {
        self.policy
    }

    /// Evaluate an image
    ///
    /// The verdict depends only on the arguments; evaluating the same
    /// image twice yields the same verdict.
    ///
    /// # Arguments
    ///
    /// * `desc`   - Parsed image descriptor
    /// * `buffer` - Buffer the descriptor was parsed from
    /// * `store`  - Trust anchors
    ///
    /// # Returns
    ///
    /// * `VerificationVerdict` - Accepted or rejected, with the failed nodes
    pub fn evaluate(
        &self,
        desc: &ImageDescriptor,
        buffer: &[u8],
        store: &TrustStore,
    ) -> VerificationVerdict {
        let mut failed_nodes = Vec::new();
        let result = match (&desc.format, desc.primary()) {
            (_, None) => Err(VbootError::PARSE_NO_PAYLOAD),
            (ImageFormat::Legacy(_), Some(primary)) => {
                self.evaluate_legacy(desc, primary, buffer, &mut failed_nodes)
            }
            (ImageFormat::Fit(info), Some(_)) => {
                self.evaluate_fit(desc, info, buffer, store, &mut failed_nodes)
            }
        };
        let outcome = match result {
            Ok(()) => VerificationOutcome::Accepted,
            Err(err) => VerificationOutcome::Rejected(err),
        };
        VerificationVerdict {
            outcome,
            failed_nodes,
        }
    }

    /// Legacy images carry a data checksum only, which is no proof of
    /// origin.
    fn evaluate_legacy(
        &self,
        desc: &ImageDescriptor,
        primary: &PayloadRange,
        buffer: &[u8],
        failed: &mut Vec<FailedNode>,
    ) -> VbootResult<()> {
        match self.verify_legacy_checksum(desc, buffer) {
            Err(err) => reject(failed, &primary.name, err),
            Ok(()) => Ok(()),
        }
    }

    fn verify_legacy_checksum(&self, desc: &ImageDescriptor, buffer: &[u8]) -> VbootResult<()> {
        if self.policy.contains(VerificationPolicy::REQUIRE_SIGNATURE)
            || !self.policy.contains(VerificationPolicy::ALLOW_LEGACY)
        {
            return Err(VbootError::POLICY_LEGACY_NOT_PERMITTED);
        }
        let checksum = desc
            .declared_checksum
            .ok_or(VbootError::POLICY_MISSING_VALUE)?;
        let data = checksum
            .range
            .slice(buffer)
            .map_err(|_| VbootError::CRYPTO_RANGE_OUT_OF_BOUNDS)?;
        if self.env.crc32(data) != checksum.value {
            return Err(VbootError::CRYPTO_DATA_CRC_MISMATCH);
        }
        Ok(())
    }

    /// Walk the verification nodes in order, then apply the policy.
    ///
    /// Under `REQUIRE_SIGNATURE` the selected configuration must carry a
    /// verified signature; image signatures do not count. Keys marked
    /// `image` must have verified every loaded payload, keys marked
    /// `conf` the configuration.
    fn evaluate_fit<'a>(
        &self,
        desc: &ImageDescriptor,
        info: &FitInfo,
        buffer: &[u8],
        store: &'a TrustStore,
        failed: &mut Vec<FailedNode>,
    ) -> VbootResult<()> {
        let mut verified: Vec<VerifiedSignature<'a>> = Vec::new();

        for node in &desc.verification_nodes {
            let (required, result) = match node.kind {
                NodeKind::Hash => (node.required, self.verify_hash_node(desc, node, buffer)),
                NodeKind::Signature => {
                    let level = match node.target {
                        NodeTarget::Image(_) => KeyRequirement::Image,
                        NodeTarget::Configuration => KeyRequirement::Conf,
                    };
                    let key_required = node
                        .key_hint
                        .as_deref()
                        .and_then(|hint| store.find(hint))
                        .map_or(false, |key| key.required() == level);
                    let result = self
                        .verify_signature_node(desc, info, node, buffer, store)
                        .map(|key| {
                            verified.push(VerifiedSignature {
                                target: node.target,
                                key: key.name(),
                            })
                        });
                    (node.required || key_required, result)
                }
            };

            if let Err(err) = result {
                failed.push(FailedNode {
                    name: node.name.clone(),
                    error: err,
                });
                if required {
                    return Err(err);
                }
            }
        }

        let verified_by = |target: NodeTarget, key: Option<&str>| {
            verified
                .iter()
                .any(|v| v.target == target && key.map_or(true, |key| v.key == key))
        };

        for (index, payload) in desc.payload_ranges.iter().enumerate() {
            for key in store.required_keys(KeyRequirement::Image) {
                if !verified_by(NodeTarget::Image(index), Some(key.name().as_str())) {
                    return reject(failed, &payload.name, VbootError::POLICY_REQUIRED_KEY_UNUSED);
                }
            }
        }

        let conf = NodeTarget::Configuration;
        if self.policy.contains(VerificationPolicy::REQUIRE_SIGNATURE) && !verified_by(conf, None) {
            return reject(failed, &info.configuration, VbootError::POLICY_NO_SIGNATURE);
        }
        for key in store.required_keys(KeyRequirement::Conf) {
            if !verified_by(conf, Some(key.name().as_str())) {
                return reject(
                    failed,
                    &info.configuration,
                    VbootError::POLICY_REQUIRED_KEY_UNUSED,
                );
            }
        }
        Ok(())
    }

    fn payload_range(desc: &ImageDescriptor, node: &VerificationNode) -> VbootResult<ByteRange> {
        let NodeTarget::Image(index) = node.target else {
            return Err(VbootError::CRYPTO_RANGE_OUT_OF_BOUNDS);
        };
        desc.payload_ranges
            .get(index)
            .map(PayloadRange::range)
            .ok_or(VbootError::CRYPTO_RANGE_OUT_OF_BOUNDS)
    }

    /// Digest of the message a configuration signature covers; see
    /// [`ConfigSignedData`]. Every loaded payload must be one of the
    /// signed images.
    fn config_digest(
        &self,
        desc: &ImageDescriptor,
        info: &FitInfo,
        hash: &str,
        buffer: &[u8],
    ) -> VbootResult<DigestBytes> {
        let find = |name: &str| info.signed_images.iter().find(|image| image.name == name);
        for payload in &desc.payload_ranges {
            match find(payload.name.as_str()) {
                Some(image) if image.data == payload.range() => {}
                _ => return Err(VbootError::CRYPTO_RANGE_OUT_OF_BOUNDS),
            }
        }

        let mut data = ConfigSignedData::new(&info.configuration, &info.references);
        for name in referenced_names(&info.references) {
            let image = find(name).ok_or(VbootError::PARSE_DANGLING_REFERENCE)?;
            let digest = self.env.digest(hash, &[image.data], buffer)?;
            data.image(name, &image.props, digest.as_bytes());
        }
        let data = data.finish();
        self.env
            .digest(hash, &[ByteRange::new(0, data.len())], &data)
    }

    /// Verify a hash node
    fn verify_hash_node(
        &self,
        desc: &ImageDescriptor,
        node: &VerificationNode,
        buffer: &[u8],
    ) -> VbootResult<()> {
        if node.expected_value.is_empty() {
            return Err(VbootError::POLICY_MISSING_VALUE);
        }
        let range = Self::payload_range(desc, node)?;
        let digest = self.env.digest(&node.algo, &[range], buffer)?;
        if digest.len() != node.expected_value.len() {
            return Err(VbootError::CRYPTO_HASH_LENGTH_MISMATCH);
        }
        if !bool::from(digest.as_bytes().ct_eq(&node.expected_value)) {
            return Err(VbootError::CRYPTO_HASH_MISMATCH);
        }
        Ok(())
    }

    /// Verify a signature node
    ///
    /// # Returns
    ///
    /// * `PublicKey` - Key that verified the signature
    fn verify_signature_node<'a>(
        &self,
        desc: &ImageDescriptor,
        info: &FitInfo,
        node: &VerificationNode,
        buffer: &[u8],
        store: &'a TrustStore,
    ) -> VbootResult<&'a PublicKey> {
        let (hash, crypto) = split_algo(&node.algo)?;
        let hint = node
            .key_hint
            .as_deref()
            .ok_or(VbootError::POLICY_MISSING_KEY_HINT)?;
        let key = store.find(hint).ok_or(VbootError::POLICY_KEY_NOT_FOUND)?;
        check_key(crypto, key)?;
        if node.expected_value.is_empty() {
            return Err(VbootError::POLICY_MISSING_VALUE);
        }

        let digest = match node.target {
            NodeTarget::Image(_) => {
                let range = Self::payload_range(desc, node)?;
                self.env.digest(hash, &[range], buffer)?
            }
            NodeTarget::Configuration => self.config_digest(desc, info, hash, buffer)?,
        };
        if !self
            .env
            .verify_signature(crypto, key, &digest, &node.expected_value)
        {
            return Err(VbootError::CRYPTO_SIGNATURE_INVALID);
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use vboot_image_fake_keys::*;
    use vboot_image_gen::*;
    use vboot_image_parse::{parse, ParseOptions};

    const LOAD: u64 = 0x8020_0000;
    const PAYLOAD: &[u8] = b"\x13\x00\x00\x00 second stage payload";

    fn node_names(failed: &[FailedNode]) -> Vec<String> {
        failed.iter().map(|n| n.name.clone()).collect()
    }

    fn fit_verifier() -> ImageVerifier<CryptoEnv> {
        ImageVerifier::new(CryptoEnv, VerificationPolicy::REQUIRE_SIGNATURE)
    }

    fn store() -> TrustStore {
        TrustStore::new(vec![
            rsa2048_public_key("dev", false),
            p256_key_0_public("ec", false),
        ])
        .unwrap()
    }

    fn build(image: FitImage<'_>) -> Vec<u8> {
        FitGenerator::new(RustCrypto::default())
            .image(image)
            .config(FitConfig::new("conf-1").kernel("kernel"))
            .default_config("conf-1")
            .generate()
            .unwrap()
    }

    fn parse_image(blob: &[u8]) -> ImageDescriptor {
        parse(blob, &ParseOptions::default()).unwrap()
    }

    fn kernel<'a>() -> FitImage<'a> {
        FitImage::new("kernel", "kernel", PAYLOAD).load(LOAD)
    }

    /// Image under a configuration signed with `key`
    fn signed(image: FitImage<'_>, algo: &str, hint: &str, key: &SigningKey) -> Vec<u8> {
        FitGenerator::new(RustCrypto::default())
            .image(image)
            .config(
                FitConfig::new("conf-1")
                    .kernel("kernel")
                    .required_signature(algo, hint, key),
            )
            .default_config("conf-1")
            .generate()
            .unwrap()
    }

    fn payload_offset(desc: &ImageDescriptor) -> usize {
        desc.primary().unwrap().offset
    }

    fn conf_signature(desc: &ImageDescriptor) -> &[u8] {
        desc.verification_nodes
            .iter()
            .find(|n| n.target == NodeTarget::Configuration)
            .map(|n| n.expected_value.as_slice())
            .unwrap()
    }

    #[test]
    fn test_configuration_signature_accepts() {
        let key = rsa2048_signing_key();
        let blob = signed(kernel().hash("sha256"), "sha256,rsa2048", "dev", &key);
        let desc = parse_image(&blob);
        let verdict = fit_verifier().evaluate(&desc, &blob, &store());
        assert_eq!(verdict.outcome, VerificationOutcome::Accepted);
        assert!(verdict.failed_nodes.is_empty());
    }

    #[test]
    fn test_payload_tamper_rejected() {
        let key = rsa2048_signing_key();
        let blob = signed(kernel(), "sha256,rsa2048", "dev", &key);
        let desc = parse_image(&blob);
        let mut tampered = blob.clone();
        tampered[payload_offset(&desc) + 5] ^= 0x20;

        let verdict = fit_verifier().evaluate(&desc, &tampered, &store());
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::CRYPTO_SIGNATURE_INVALID)
        );
        assert_eq!(verdict.failed_nodes[0].name, "conf-1/signature-1");
    }

    #[test]
    fn test_relocated_image_rejected() {
        let key = rsa2048_signing_key();
        let original = signed(kernel().entry(LOAD), "sha256,rsa2048", "dev", &key);
        let relocated = signed(
            FitImage::new("kernel", "kernel", PAYLOAD)
                .load(0x8030_0000)
                .entry(0x8030_0020),
            "sha256,rsa2048",
            "dev",
            &key,
        );

        // Carry the original signature over to the relocated image.
        let original_sig = conf_signature(&parse_image(&original)).to_vec();
        let relocated_sig = conf_signature(&parse_image(&relocated)).to_vec();
        assert_ne!(original_sig, relocated_sig);
        let pos = relocated
            .windows(relocated_sig.len())
            .position(|w| w == relocated_sig.as_slice())
            .unwrap();
        let mut forged = relocated.clone();
        forged[pos..pos + original_sig.len()].copy_from_slice(&original_sig);

        let desc = parse_image(&forged);
        assert_eq!(desc.entry_point, 0x8030_0020);
        let verdict = fit_verifier().evaluate(&desc, &forged, &store());
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::CRYPTO_SIGNATURE_INVALID)
        );
        assert_eq!(
            node_names(&verdict.failed_nodes),
            ["conf-1/signature-1"]
        );
    }

    #[test]
    fn test_image_signature_alone_rejected() {
        // Image signatures cover the payload bytes only, so the load and
        // entry addresses could be edited without breaking them.
        let key = rsa2048_signing_key();
        let blob = build(
            FitImage::new("kernel", "kernel", PAYLOAD)
                .load(0x8030_0000)
                .entry(0x8030_0020)
                .required_signature("sha256,rsa2048", "dev", &key),
        );
        let desc = parse_image(&blob);
        let verdict = fit_verifier().evaluate(&desc, &blob, &store());
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::POLICY_NO_SIGNATURE)
        );
        assert_eq!(
            verdict.failed_nodes,
            vec![FailedNode {
                name: "conf-1".into(),
                error: VbootError::POLICY_NO_SIGNATURE
            }]
        );

        // Without secure boot the verified image signature is enough.
        let relaxed = ImageVerifier::new(CryptoEnv, VerificationPolicy::empty());
        assert!(relaxed.evaluate(&desc, &blob, &store()).is_accepted());
    }

    #[test]
    fn test_hash_tamper_rejected_first() {
        let key = p256_key_0_signing_key();
        let blob = signed(kernel().hash("sha1"), "sha256,ecdsa256", "ec", &key);
        let desc = parse_image(&blob);
        let mut tampered = blob.clone();
        tampered[payload_offset(&desc)] ^= 0x01;

        let verdict = fit_verifier().evaluate(&desc, &tampered, &store());
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::CRYPTO_HASH_MISMATCH)
        );
        // Evaluation stopped at the failing hash node.
        assert_eq!(verdict.failed_nodes.len(), 1);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let key = rsa2048_signing_key();
        let blob = FitGenerator::new(RustCrypto::default())
            .image(kernel())
            .config(
                FitConfig::new("conf-1")
                    .kernel("kernel")
                    .signature("sha256,rsa2048", "missing", &key)
                    .required_signature("sha256,rsa2048", "dev", &key),
            )
            .default_config("conf-1")
            .generate()
            .unwrap();
        let desc = parse_image(&blob);
        let store = store();
        let verifier = fit_verifier();
        let first = verifier.evaluate(&desc, &blob, &store);
        let second = verifier.evaluate(&desc, &blob, &store);
        assert_eq!(first, second);
        assert!(first.is_accepted());
    }

    #[test]
    fn test_downgrade_rejected() {
        let blob = build(kernel().hash("sha256"));
        let desc = parse_image(&blob);
        let verdict = fit_verifier().evaluate(&desc, &blob, &store());
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::POLICY_NO_SIGNATURE)
        );

        // The same image passes when signatures are not required.
        let relaxed = ImageVerifier::new(CryptoEnv, VerificationPolicy::empty());
        assert!(relaxed.evaluate(&desc, &blob, &store()).is_accepted());
    }

    #[test]
    fn test_configuration_signature_covers_every_image() {
        let key = rsa2048_signing_key();
        let blob = FitGenerator::new(RustCrypto::default())
            .image(FitImage::new("fw", "firmware", b"firmware").load(LOAD))
            .image(FitImage::new("kernel", "kernel", b"unloaded kernel"))
            .image(FitImage::new("fdt-1", "flat_dt", b"dtb").load(LOAD + 0x10_0000))
            .config(
                FitConfig::new("conf-1")
                    .firmware("fw")
                    .kernel("kernel")
                    .fdt("fdt-1")
                    .required_signature("sha256,rsa2048", "dev", &key),
            )
            .default_config("conf-1")
            .generate()
            .unwrap();
        let desc = parse_image(&blob);
        assert!(fit_verifier().evaluate(&desc, &blob, &store()).is_accepted());

        let ImageFormat::Fit(info) = &desc.format else {
            panic!("expected FIT");
        };
        for image in &info.signed_images {
            let mut tampered = blob.clone();
            tampered[image.data.offset] ^= 0x04;
            assert_eq!(
                fit_verifier().evaluate(&desc, &tampered, &store()).outcome,
                VerificationOutcome::Rejected(VbootError::CRYPTO_SIGNATURE_INVALID),
                "{}",
                image.name
            );
        }
    }

    #[test]
    fn test_optional_failure_recorded() {
        let rsa = rsa2048_signing_key();
        let ec = p256_key_1_signing_key();
        let blob = FitGenerator::new(RustCrypto::default())
            .image(kernel())
            .config(
                FitConfig::new("conf-1")
                    .kernel("kernel")
                    // Signed by a key the store does not trust.
                    .signature("sha256,ecdsa256", "ec", &ec)
                    .signature("sha256,rsa2048", "dev", &rsa),
            )
            .default_config("conf-1")
            .generate()
            .unwrap();
        let desc = parse_image(&blob);
        let verdict = fit_verifier().evaluate(&desc, &blob, &store());
        assert!(verdict.is_accepted());
        assert_eq!(
            verdict.failed_nodes,
            vec![FailedNode {
                name: "conf-1/signature-1".into(),
                error: VbootError::CRYPTO_SIGNATURE_INVALID
            }]
        );
    }

    #[test]
    fn test_required_signature_missing_key() {
        let key = rsa2048_signing_key();
        let blob = signed(kernel(), "sha256,rsa2048", "prod", &key);
        let desc = parse_image(&blob);
        let verdict = fit_verifier().evaluate(&desc, &blob, &store());
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::POLICY_KEY_NOT_FOUND)
        );
    }

    #[test]
    fn test_required_key_must_sign() {
        let key = rsa2048_signing_key();
        let blob = build(kernel().signature("sha256,rsa2048", "dev", &key));
        let desc = parse_image(&blob);
        let store = TrustStore::new(vec![
            rsa2048_public_key("dev", false),
            p256_key_0_public("ec", KeyRequirement::Image),
        ])
        .unwrap();
        let verdict = ImageVerifier::new(CryptoEnv, VerificationPolicy::empty())
            .evaluate(&desc, &blob, &store);
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::POLICY_REQUIRED_KEY_UNUSED)
        );
        assert_eq!(node_names(&verdict.failed_nodes), ["kernel"]);
    }

    #[test]
    fn test_conf_key_must_sign_configuration() {
        let key = rsa2048_signing_key();
        let store = TrustStore::new(vec![rsa2048_public_key("dev", KeyRequirement::Conf)]).unwrap();
        let verifier = ImageVerifier::new(CryptoEnv, VerificationPolicy::empty());

        // An image signature by the same key does not count.
        let blob = build(kernel().signature("sha256,rsa2048", "dev", &key));
        let verdict = verifier.evaluate(&parse_image(&blob), &blob, &store);
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::POLICY_REQUIRED_KEY_UNUSED)
        );
        assert_eq!(node_names(&verdict.failed_nodes), ["conf-1"]);

        let blob = signed(kernel(), "sha256,rsa2048", "dev", &key);
        assert!(verifier.evaluate(&parse_image(&blob), &blob, &store).is_accepted());
    }

    #[test]
    fn test_required_key_makes_node_required() {
        let key = rsa2048_signing_key();
        let blob = build(kernel().signature("sha256,rsa2048", "dev", &key));
        let desc = parse_image(&blob);
        let mut tampered = blob.clone();
        tampered[payload_offset(&desc) + 1] ^= 0x80;
        let store = TrustStore::new(vec![rsa2048_public_key("dev", true)]).unwrap();
        let verdict = ImageVerifier::new(CryptoEnv, VerificationPolicy::empty())
            .evaluate(&desc, &tampered, &store);
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::CRYPTO_SIGNATURE_INVALID)
        );
    }

    #[test]
    fn test_key_type_mismatch() {
        let key = p256_key_0_signing_key();
        // ECDSA signature pointed at the RSA key.
        let blob = signed(kernel(), "sha256,ecdsa256", "dev", &key);
        let desc = parse_image(&blob);
        let verdict = fit_verifier().evaluate(&desc, &blob, &store());
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Rejected(VbootError::POLICY_KEY_ALGO_MISMATCH)
        );
    }

    #[test]
    fn test_descriptor_without_payloads() {
        let image = LegacyGenerator::kernel(WordSize::Bits32, 0x8000, 0x8000, PAYLOAD).generate();
        let options = ParseOptions {
            word_size: WordSize::Bits32,
            ..Default::default()
        };
        let mut legacy = parse(&image, &options).unwrap();
        legacy.payload_ranges.clear();
        let mut fit = fit_descriptor(Vec::new());
        fit.payload_ranges.clear();

        let verifier = ImageVerifier::new(CryptoEnv, VerificationPolicy::ALLOW_LEGACY);
        for desc in [legacy, fit] {
            assert_eq!(
                verifier.evaluate(&desc, &image, &TrustStore::default()).outcome,
                VerificationOutcome::Rejected(VbootError::PARSE_NO_PAYLOAD)
            );
        }
    }

    fn fit_descriptor(nodes: Vec<VerificationNode>) -> ImageDescriptor {
        ImageDescriptor {
            format: ImageFormat::Fit(FitInfo::default()),
            payload_ranges: vec![PayloadRange {
                name: "kernel".into(),
                offset: 0,
                len: 16,
                load_address: Some(LOAD),
                compression: Compression::None,
            }],
            load_address: LOAD,
            entry_point: LOAD,
            declared_checksum: None,
            verification_nodes: nodes,
        }
    }

    fn hash_node(name: &str, algo: &str, value: &[u8]) -> VerificationNode {
        VerificationNode {
            name: name.into(),
            target: NodeTarget::Image(0),
            kind: NodeKind::Hash,
            algo: algo.into(),
            key_hint: None,
            required: true,
            expected_value: value.to_vec(),
        }
    }

    #[test]
    fn test_hash_node_failures() {
        let verifier = ImageVerifier::new(CryptoEnv, VerificationPolicy::empty());
        let buffer = [0u8; 16];
        let store = TrustStore::default();
        let cases = [
            (hash_node("n", "sha256", &[0; 20]), VbootError::CRYPTO_HASH_LENGTH_MISMATCH),
            (hash_node("n", "sha256", &[0; 32]), VbootError::CRYPTO_HASH_MISMATCH),
            (hash_node("n", "whirlpool", &[0; 64]), VbootError::POLICY_UNKNOWN_ALGO),
            (hash_node("n", "sha256", &[]), VbootError::POLICY_MISSING_VALUE),
        ];
        for (node, err) in cases {
            let desc = fit_descriptor(vec![node]);
            assert_eq!(
                verifier.evaluate(&desc, &buffer, &store).outcome,
                VerificationOutcome::Rejected(err)
            );
        }
    }

    #[test]
    fn test_signature_node_failures() {
        let verifier = ImageVerifier::new(CryptoEnv, VerificationPolicy::empty());
        let buffer = [0u8; 16];
        let store = store();
        let node = |algo: &str, hint: Option<&str>| VerificationNode {
            name: "kernel/signature-1".into(),
            target: NodeTarget::Image(0),
            kind: NodeKind::Signature,
            algo: algo.into(),
            key_hint: hint.map(String::from),
            required: true,
            expected_value: vec![0; 256],
        };
        let cases = [
            (node("rsa2048", Some("dev")), VbootError::POLICY_MALFORMED_ALGO),
            (node("sha256,rsa2048", None), VbootError::POLICY_MISSING_KEY_HINT),
            (node("sha256,rsa1024", Some("dev")), VbootError::POLICY_UNKNOWN_ALGO),
            (node("sha256,rsa2048", Some("dev")), VbootError::CRYPTO_SIGNATURE_INVALID),
        ];
        for (node, err) in cases {
            let desc = fit_descriptor(vec![node]);
            assert_eq!(
                verifier.evaluate(&desc, &buffer, &store).outcome,
                VerificationOutcome::Rejected(err)
            );
        }
    }

    #[derive(Default)]
    struct CountingEnv {
        digests: Cell<usize>,
    }

    impl ImageVerificationEnv for CountingEnv {
        fn digest(
            &self,
            algo: &str,
            ranges: &[ByteRange],
            buffer: &[u8],
        ) -> VbootResult<DigestBytes> {
            self.digests.set(self.digests.get() + 1);
            CryptoEnv.digest(algo, ranges, buffer)
        }

        fn verify_signature(
            &self,
            _algo: &str,
            _key: &PublicKey,
            _digest: &DigestBytes,
            _signature: &[u8],
        ) -> bool {
            true
        }

        fn crc32(&self, _data: &[u8]) -> u32 {
            0
        }
    }

    #[test]
    fn test_required_failure_short_circuits() {
        let verifier = ImageVerifier::new(CountingEnv::default(), VerificationPolicy::empty());
        let desc = fit_descriptor(vec![
            hash_node("kernel/hash-1", "sha256", &[0; 32]),
            hash_node("kernel/hash-2", "sha256", &[0; 32]),
            hash_node("kernel/hash-3", "sha256", &[0; 32]),
        ]);
        let verdict = verifier.evaluate(&desc, &[0u8; 16], &TrustStore::default());
        assert!(!verdict.is_accepted());
        assert_eq!(verifier.env.digests.get(), 1);
        assert_eq!(node_names(&verdict.failed_nodes), ["kernel/hash-1"]);
    }

    #[test]
    fn test_legacy_policy() {
        let image = LegacyGenerator::kernel(WordSize::Bits32, 0x8000, 0x8000, PAYLOAD).generate();
        let options = ParseOptions {
            word_size: WordSize::Bits32,
            ..Default::default()
        };
        let desc = parse(&image, &options).unwrap();
        let store = TrustStore::default();

        let legacy_ok = ImageVerifier::new(CryptoEnv, VerificationPolicy::ALLOW_LEGACY);
        assert!(legacy_ok.evaluate(&desc, &image, &store).is_accepted());

        // Secure boot never accepts a checksum-only image.
        let secure = ImageVerifier::new(
            CryptoEnv,
            VerificationPolicy::REQUIRE_SIGNATURE | VerificationPolicy::ALLOW_LEGACY,
        );
        assert_eq!(
            secure.evaluate(&desc, &image, &store).outcome,
            VerificationOutcome::Rejected(VbootError::POLICY_LEGACY_NOT_PERMITTED)
        );

        let no_legacy = ImageVerifier::new(CryptoEnv, VerificationPolicy::empty());
        assert!(!no_legacy.evaluate(&desc, &image, &store).is_accepted());

        let mut tampered = image.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        assert_eq!(
            legacy_ok.evaluate(&desc, &tampered, &store).into_result(),
            Err(VbootError::CRYPTO_DATA_CRC_MISMATCH)
        );
    }
}
