/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the boot stage that finds, verifies, loads and runs the
    next stage image.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod config;
mod context;
mod device;
mod dispatcher;
mod exit;
pub mod memory_layout;
pub mod print;
mod sequencer;
mod source;
mod stage;

pub use config::{
    BootConfig, TerminalAction, DEFAULT_BOOT_TARGETS, DEFAULT_MAX_IMAGE_SIZE, ENV_BOOTCONF,
    ENV_BOOT_TARGETS,
};
pub use context::BootContext;
pub use device::{AccessMode, BootDevice, DeviceKind};
pub use dispatcher::{BootDispatcher, BootFailure};
pub use exit::{decide, finish, TerminalDecision};
pub use sequencer::{device_list, Attempt, BootDeviceSequencer, SequencerState};
#[cfg(feature = "std")]
pub use source::StdoutSink;
pub use source::{
    ByteSource, EmptyEnv, EnvStore, LogSink, NoWatchdog, NullSink, Platform, Watchdog,
};
pub use stage::{load, LoadedImage, RawMemory, SimMemory, TargetMemory};

use vboot_image_verify::CryptoEnv;

const BANNER: &str = r#"
Running verified boot ...
"#;

/// Boot the next stage. Returns only through the platform.
///
/// # Arguments
///
/// * `ctx`      - Boot context
/// * `platform` - Terminal operations of the platform
pub fn boot(ctx: &mut BootContext, platform: &mut dyn Platform) -> ! {
    cprintln!(ctx.log, "{}", BANNER);

    let result = BootDispatcher::new(ctx, CryptoEnv).run();
    let decision = decide(result, ctx.config.on_exhaustion);
    finish(decision, platform, &mut *ctx.log)
}
