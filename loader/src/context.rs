/*++

Licensed under the Apache-2.0 license.

File Name:

    context.rs

Abstract:

    File implements a context holding all the services utilized by the
    boot flow. The flow never reaches for global state; everything it
    touches is passed in here.

--*/

use vboot_image_types::TrustStore;

use crate::memory_layout::MemoryLayout;
use crate::{BootConfig, ByteSource, LogSink, TargetMemory, Watchdog};

/// Boot Context
pub struct BootContext<'a> {
    /// Boot media
    pub source: &'a mut dyn ByteSource,

    /// Trust anchors
    pub trust_store: &'a TrustStore,

    /// Diagnostics console
    pub log: &'a mut dyn LogSink,

    /// Memory the next stage is loaded into
    pub memory: &'a mut dyn TargetMemory,

    pub layout: &'a MemoryLayout,

    pub watchdog: &'a mut dyn Watchdog,

    pub config: BootConfig,
}
