/*++

Licensed under the Apache-2.0 license.

File Name:

    dispatcher.rs

Abstract:

    File contains the boot flow: read, parse, verify and load an image
    from each boot device in turn.

--*/

use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};
use vboot_image_parse::{detect, probe_len, required_len, Magic, ParseOptions};
use vboot_image_types::LEGACY_HEADER64_SIZE;
use vboot_image_verify::{ImageVerificationEnv, ImageVerifier, VerificationOutcome};
use zeroize::Zeroizing;

use crate::config::DEFAULT_BOOT_TARGETS;
use crate::print::HexU64;
use crate::sequencer::{device_list, Attempt, BootDeviceSequencer};
use crate::{cprintln, stage, AccessMode, BootContext, BootDevice, LoadedImage};

/// Bytes read to identify an image and learn its size
const HEADER_READ_LEN: usize = LEGACY_HEADER64_SIZE;

/// Every boot device failed
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BootFailure {
    /// Failed attempts, one per device
    pub attempts: Vec<Attempt>,

    /// An image was rejected by a security check on some device
    pub security_rejection: bool,
}

impl BootFailure {
    fn new(attempts: Vec<Attempt>) -> Self {
        let security_rejection = attempts.iter().any(|a| a.error.is_security_rejection());
        Self {
            attempts,
            security_rejection,
        }
    }

    pub fn error(&self) -> VbootError {
        if self.attempts.is_empty() {
            VbootError::BOOT_NO_DEVICES
        } else {
            VbootError::BOOT_EXHAUSTED
        }
    }
}

/// Boot Dispatcher
pub struct BootDispatcher<'c, 'a, Env: ImageVerificationEnv> {
    ctx: &'c mut BootContext<'a>,
    verifier: ImageVerifier<Env>,
}

impl<'c, 'a, Env: ImageVerificationEnv> BootDispatcher<'c, 'a, Env> {
    /// Create a dispatcher verifying images with `env` under the policy of
    /// the boot configuration
    pub fn new(ctx: &'c mut BootContext<'a>, env: Env) -> Self {
        let policy = ctx.config.policy;
        Self {
            ctx,
            verifier: ImageVerifier::new(env, policy),
        }
    }

    /// Try every configured boot device once
    ///
    /// # Returns
    ///
    /// * `LoadedImage` - Image loaded from the first device that succeeded
    /// * `BootFailure` - Every device failed
    pub fn run(&mut self) -> Result<LoadedImage, BootFailure> {
        let devices = device_list(
            &self.ctx.config.boot_targets,
            DEFAULT_BOOT_TARGETS,
            &mut *self.ctx.log,
        );
        let mut sequencer = BootDeviceSequencer::new(devices);

        let result = sequencer.run(|device| {
            self.ctx.watchdog.kick();
            cprintln!(self.ctx.log, "[dispatch] Trying {}", device);
            let result = self.try_device(device);
            if let Err(err) = result {
                cprintln!(
                    self.ctx.log,
                    "[dispatch] {} failed: 0x{:08X}",
                    device,
                    u32::from(err)
                );
            }
            result
        });

        match result {
            Some((_, image)) => Ok(image),
            None => {
                let failure = BootFailure::new(sequencer.into_attempts());
                cprintln!(
                    self.ctx.log,
                    "[dispatch] No bootable image after {} attempts",
                    failure.attempts.len()
                );
                Err(failure)
            }
        }
    }

    fn try_device(&mut self, device: &BootDevice) -> VbootResult<LoadedImage> {
        // Scratch image buffer, wiped when the attempt ends.
        let buffer = Zeroizing::new(self.read_image(device)?);

        let options = ParseOptions {
            word_size: self.ctx.config.word_size,
            arch: self.ctx.config.arch,
            configuration: self.ctx.config.configuration.as_deref(),
        };
        let desc = vboot_image_parse::parse(&buffer, &options)?;

        let verdict = self
            .verifier
            .evaluate(&desc, &buffer, self.ctx.trust_store);
        for node in &verdict.failed_nodes {
            cprintln!(
                self.ctx.log,
                "[verify] {} failed: 0x{:08X}",
                node.name.as_str(),
                u32::from(node.error)
            );
        }
        if let VerificationOutcome::Rejected(err) = verdict.outcome {
            return Err(err);
        }

        let mut image = stage::load(&desc, &buffer, self.ctx.layout, &mut *self.ctx.memory)?;
        cprintln!(
            self.ctx.log,
            "[load] Loaded {} bytes at {}, entry {}",
            image.bytes_loaded,
            HexU64(image.load_address),
            HexU64(image.entry_point)
        );
        image.device = Some(device.clone());
        Ok(image)
    }

    /// Read exactly the bytes the image declares, capped by the
    /// configured maximum.
    fn read_image(&mut self, device: &BootDevice) -> VbootResult<alloc::vec::Vec<u8>> {
        let max_len = self.ctx.config.max_image_size;
        let offset = match &device.mode {
            AccessMode::Filesystem { path } => {
                let image = self.ctx.source.read_file(device, path, max_len)?;
                if image.len() > max_len {
                    return Err(VbootError::DEVICE_IMAGE_TOO_LARGE);
                }
                return Ok(image);
            }
            AccessMode::Raw { offset } => *offset,
        };

        let header = Zeroizing::new(self.ctx.source.read(device, offset, HEADER_READ_LEN)?);
        let len = probe_len(&header, self.ctx.config.word_size)?;
        let image = self.read_raw(device, offset, len, max_len)?;
        if detect(&image)? != Magic::Fit {
            return Ok(image);
        }

        // Payloads stored after the tree
        let image = Zeroizing::new(image);
        let full_len = required_len(&image)?;
        if full_len <= image.len() {
            return Ok(image.to_vec());
        }
        self.read_raw(device, offset, full_len, max_len)
    }

    fn read_raw(
        &mut self,
        device: &BootDevice,
        offset: u64,
        len: usize,
        max_len: usize,
    ) -> VbootResult<alloc::vec::Vec<u8>> {
        if len > max_len {
            return Err(VbootError::DEVICE_IMAGE_TOO_LARGE);
        }
        self.ctx.source.read(device, offset, len)
    }
}
