/*++

Licensed under the Apache-2.0 license.

File Name:

    exit.rs

Abstract:

    File contains the single point where the boot stage decides how it
    ends: run the loaded image, halt or reset.

--*/

use vboot_error::VbootError;

use crate::print::HexU64;
use crate::{cprintln, BootFailure, LoadedImage, LogSink, Platform, TerminalAction};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TerminalDecision {
    /// Run the verified image
    Transfer(LoadedImage),

    Halt(VbootError),

    Reset(VbootError),
}

/// Decide how to end the boot stage. Only a loaded image is ever run.
pub fn decide(
    result: Result<LoadedImage, BootFailure>,
    action: TerminalAction,
) -> TerminalDecision {
    match result {
        Ok(image) => TerminalDecision::Transfer(image),
        Err(failure) => {
            let err = failure.error();
            match action {
                TerminalAction::Halt => TerminalDecision::Halt(err),
                TerminalAction::Reset => TerminalDecision::Reset(err),
                TerminalAction::Auto if failure.security_rejection => TerminalDecision::Halt(err),
                TerminalAction::Auto => TerminalDecision::Reset(err),
            }
        }
    }
}

/// Carry out a terminal decision
pub fn finish(decision: TerminalDecision, platform: &mut dyn Platform, log: &mut dyn LogSink) -> ! {
    match decision {
        TerminalDecision::Transfer(image) => {
            cprintln!(log, "[exit] Launching image @ {}", HexU64(image.entry_point));
            platform.transfer_control(&image)
        }
        TerminalDecision::Halt(err) => {
            cprintln!(log, "[exit] Boot Fatal Error: 0x{:08X}, halting", u32::from(err));
            platform.halt()
        }
        TerminalDecision::Reset(err) => {
            cprintln!(log, "[exit] Boot Fatal Error: 0x{:08X}, resetting", u32::from(err));
            platform.reset()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Attempt;
    use crate::{BootDevice, DeviceKind};

    fn failure(errors: &[VbootError]) -> BootFailure {
        let attempts = errors
            .iter()
            .enumerate()
            .map(|(i, error)| Attempt {
                device: BootDevice::raw(DeviceKind::Mmc, i as u8, 0),
                error: *error,
            })
            .collect::<alloc::vec::Vec<_>>();
        BootFailure {
            security_rejection: errors.iter().any(|e| e.is_security_rejection()),
            attempts,
        }
    }

    #[test]
    fn test_success_transfers() {
        let image = LoadedImage {
            entry_point: 0x8020_0000,
            load_address: 0x8020_0000,
            bytes_loaded: 16,
            device: None,
        };
        for action in [TerminalAction::Halt, TerminalAction::Reset, TerminalAction::Auto] {
            assert_eq!(
                decide(Ok(image.clone()), action),
                TerminalDecision::Transfer(image.clone())
            );
        }
    }

    #[test]
    fn test_exhaustion() {
        let io = failure(&[VbootError::DEVICE_IO, VbootError::PARSE_BAD_MAGIC]);
        let rejected = failure(&[VbootError::DEVICE_IO, VbootError::CRYPTO_SIGNATURE_INVALID]);

        assert_eq!(
            decide(Err(io.clone()), TerminalAction::Auto),
            TerminalDecision::Reset(VbootError::BOOT_EXHAUSTED)
        );
        assert_eq!(
            decide(Err(rejected.clone()), TerminalAction::Auto),
            TerminalDecision::Halt(VbootError::BOOT_EXHAUSTED)
        );
        assert_eq!(
            decide(Err(rejected), TerminalAction::Reset),
            TerminalDecision::Reset(VbootError::BOOT_EXHAUSTED)
        );
        assert_eq!(
            decide(Err(io), TerminalAction::Halt),
            TerminalDecision::Halt(VbootError::BOOT_EXHAUSTED)
        );
        assert_eq!(
            decide(Err(failure(&[])), TerminalAction::Halt),
            TerminalDecision::Halt(VbootError::BOOT_NO_DEVICES)
        );
    }
}
