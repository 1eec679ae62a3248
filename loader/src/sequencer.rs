/*++

Licensed under the Apache-2.0 license.

File Name:

    sequencer.rs

Abstract:

    File contains the boot device sequencer. Devices are tried in order,
    each at most once, until one boots or the list is exhausted.

--*/

use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};

use crate::{cprintln, BootDevice, LogSink};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SequencerState {
    Init,
    TryDevice(usize),
    Success(usize),
    NextDevice(usize),
    Exhausted,
}

/// Failed attempt on one device
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Attempt {
    pub device: BootDevice,
    pub error: VbootError,
}

/// Build the device list from a boot target string.
///
/// Unknown names are logged and skipped, repeated devices are dropped and
/// an empty result falls back to `default`.
pub fn device_list(targets: &str, default: &str, log: &mut dyn LogSink) -> Vec<BootDevice> {
    let mut devices = parse_targets(targets, log);
    if devices.is_empty() {
        cprintln!(log, "[seq] No usable boot targets, using defaults");
        devices = parse_targets(default, log);
    }
    devices
}

fn parse_targets(targets: &str, log: &mut dyn LogSink) -> Vec<BootDevice> {
    let mut devices: Vec<BootDevice> = Vec::new();
    for target in targets.split_whitespace() {
        match BootDevice::parse(target) {
            Some(device) if devices.contains(&device) => {
                cprintln!(log, "[seq] Dropping duplicate boot target {}", target);
            }
            Some(device) => devices.push(device),
            None => cprintln!(log, "[seq] Skipping unknown boot target {}", target),
        }
    }
    devices
}

/// Boot Device Sequencer
pub struct BootDeviceSequencer {
    devices: Vec<BootDevice>,
    state: SequencerState,
    attempts: Vec<Attempt>,
}

impl BootDeviceSequencer {
    pub fn new(devices: Vec<BootDevice>) -> Self {
        Self {
            devices,
            state: SequencerState::Init,
            attempts: Vec::new(),
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn devices(&self) -> &[BootDevice] {
        &self.devices
    }

    /// Failed attempts so far, in the order they were made
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn into_attempts(self) -> Vec<Attempt> {
        self.attempts
    }

    /// Move to the next device to try
    ///
    /// # Returns
    ///
    /// * `Some(index)` - State is now `TryDevice(index)`
    /// * `None`        - State is `Exhausted` or `Success`
    pub fn advance(&mut self) -> Option<usize> {
        let next = match self.state {
            SequencerState::Init => 0,
            SequencerState::NextDevice(i) => i + 1,
            // An attempt must be reported before moving on.
            SequencerState::TryDevice(_)
            | SequencerState::Success(_)
            | SequencerState::Exhausted => return None,
        };
        if next < self.devices.len() {
            self.state = SequencerState::TryDevice(next);
            Some(next)
        } else {
            self.state = SequencerState::Exhausted;
            None
        }
    }

    /// Report the outcome of the current attempt
    pub fn report(&mut self, result: VbootResult<()>) {
        let SequencerState::TryDevice(i) = self.state else {
            return;
        };
        match result {
            Ok(()) => self.state = SequencerState::Success(i),
            Err(error) => {
                self.attempts.push(Attempt {
                    device: self.devices[i].clone(),
                    error,
                });
                self.state = SequencerState::NextDevice(i);
            }
        }
    }

    /// Try devices until `attempt` succeeds on one of them
    ///
    /// # Returns
    ///
    /// * `Some((index, value))` - Device that succeeded and its result
    /// * `None`                 - Every device failed
    pub fn run<T>(
        &mut self,
        mut attempt: impl FnMut(&BootDevice) -> VbootResult<T>,
    ) -> Option<(usize, T)> {
        while let Some(i) = self.advance() {
            match attempt(&self.devices[i]) {
                Ok(value) => {
                    self.report(Ok(()));
                    return Some((i, value));
                }
                Err(err) => self.report(Err(err)),
            }
        }
        None
    }
}
