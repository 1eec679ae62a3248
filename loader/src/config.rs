/*++

Licensed under the Apache-2.0 license.

File Name:

    config.rs

Abstract:

    Boot configuration: compiled-in defaults, the control FDT boot order
    and the environment store overlay.

--*/

use alloc::string::String;

use vboot_error::VbootResult;
use vboot_image_types::{Arch, WordSize};
use vboot_image_verify::VerificationPolicy;

use crate::EnvStore;

/// Boot targets tried when nothing else is configured
pub const DEFAULT_BOOT_TARGETS: &str = "mmc0 mmc1 spi0";

/// Largest image read from a medium
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 64 * 1024 * 1024;

/// Environment variable overriding the boot targets
pub const ENV_BOOT_TARGETS: &str = "boot_targets";

/// Environment variable selecting the FIT configuration
pub const ENV_BOOTCONF: &str = "bootconf";

/// What to do once every boot device failed
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TerminalAction {
    Halt,
    Reset,

    /// Halt when an image was rejected by a security check, reset otherwise
    Auto,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BootConfig {
    /// Whitespace separated boot targets
    pub boot_targets: String,

    /// FIT configuration to boot, `None` for the image's default
    pub configuration: Option<String>,

    pub max_image_size: usize,

    pub policy: VerificationPolicy,

    pub on_exhaustion: TerminalAction,

    pub word_size: WordSize,

    /// Architecture images must be built for; `None` accepts any
    pub arch: Option<Arch>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            boot_targets: DEFAULT_BOOT_TARGETS.into(),
            configuration: None,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            policy: VerificationPolicy::REQUIRE_SIGNATURE,
            on_exhaustion: TerminalAction::Auto,
            word_size: WordSize::native(),
            arch: Arch::native(),
        }
    }
}

impl BootConfig {
    /// Take the boot order from a trusted control FDT, when it has one
    pub fn apply_control_fdt(&mut self, blob: &[u8]) -> VbootResult<()> {
        let order = vboot_image_parse::boot_order_from_fdt(blob)?;
        if !order.is_empty() {
            self.boot_targets = order.join(" ");
        }
        Ok(())
    }

    /// Overlay the environment store. Only the boot targets and the FIT
    /// configuration can be changed; the verification policy cannot.
    pub fn apply_env(&mut self, env: &dyn EnvStore) {
        if let Some(targets) = env.get(ENV_BOOT_TARGETS) {
            if !targets.trim().is_empty() {
                self.boot_targets = targets.into();
            }
        }
        if let Some(conf) = env.get(ENV_BOOTCONF) {
            if !conf.is_empty() {
                self.configuration = Some(conf.into());
            }
        }
    }
}
