/*++

Licensed under the Apache-2.0 license.

File Name:

    source.rs

Abstract:

    File contains the interfaces the loader consumes from the platform:
    raw storage, the environment store, the watchdog, the console and
    the final transfer of control.

--*/

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use vboot_error::{VbootError, VbootResult};

use crate::{BootDevice, LoadedImage};

/// Raw access to a boot medium
///
/// Every byte returned is untrusted. A read shorter than requested is not
/// an error here; the parser rejects a short image as truncated.
pub trait ByteSource {
    /// Read up to `len` bytes at `offset` of `device`
    fn read(&mut self, device: &BootDevice, offset: u64, len: usize) -> VbootResult<Vec<u8>>;

    /// Read at most `max_len` bytes of the file at `path` on `device`
    fn read_file(
        &mut self,
        _device: &BootDevice,
        _path: &str,
        _max_len: usize,
    ) -> VbootResult<Vec<u8>> {
        Err(VbootError::DEVICE_NO_FILESYSTEM)
    }
}

/// Trusted but mutable key/value store
pub trait EnvStore {
    fn get(&self, name: &str) -> Option<&str>;
}

impl EnvStore for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<&str> {
        BTreeMap::get(self, name).map(String::as_str)
    }
}

/// Store with no variables
pub struct EmptyEnv;

impl EnvStore for EmptyEnv {
    fn get(&self, _name: &str) -> Option<&str> {
        None
    }
}

pub trait Watchdog {
    /// Restart the watchdog countdown
    fn kick(&mut self);
}

/// Platform without a watchdog
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {
    fn kick(&mut self) {}
}

/// Console the diagnostics are written to
pub trait LogSink {
    fn write_str(&mut self, str: &str);
}

impl LogSink for String {
    fn write_str(&mut self, str: &str) {
        self.push_str(str);
    }
}

/// Sink that drops everything
pub struct NullSink;

impl LogSink for NullSink {
    fn write_str(&mut self, _str: &str) {}
}

/// Sink printing to the host's standard output
#[cfg(feature = "std")]
pub struct StdoutSink;

#[cfg(feature = "std")]
impl LogSink for StdoutSink {
    fn write_str(&mut self, str: &str) {
        std::print!("{str}");
    }
}

/// Terminal operations of the boot stage. None of them return.
pub trait Platform {
    /// Jump to the entry point of a verified and loaded image
    fn transfer_control(&mut self, image: &LoadedImage) -> !;

    /// Stop the processor
    fn halt(&mut self) -> !;

    /// Reset the system
    fn reset(&mut self) -> !;
}
