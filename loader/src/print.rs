/*++

Licensed under the Apache-2.0 license.

File Name:

    print.rs

Abstract:

    File contains support routines and macros to print to the log sink

--*/
use core::convert::Infallible;
use ufmt::{uDisplay, uWrite};

use crate::LogSink;

/// Adapts a [`LogSink`] to `ufmt`
pub struct Printer<'a>(pub &'a mut dyn LogSink);

impl uWrite for Printer<'_> {
    type Error = Infallible;

    /// Writes a string slice into this writer, returning whether the write succeeded.
    fn write_str(&mut self, str: &str) -> Result<(), Self::Error> {
        self.0.write_str(str);
        Ok(())
    }
}

#[macro_export]
macro_rules! cprint {
    ($sink:expr, $($tt:tt)*) => {{
        let _ = ufmt::uwrite!(&mut $crate::print::Printer(&mut *$sink), $($tt)*);
    }}
}

#[macro_export]
macro_rules! cprintln {
    ($sink:expr, $($tt:tt)*) => {{
        let _ = ufmt::uwriteln!(&mut $crate::print::Printer(&mut *$sink), $($tt)*);
    }}
}

pub struct HexBytes<'a>(pub &'a [u8]);
impl uDisplay for HexBytes<'_> {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        for byte in self.0.iter() {
            ufmt::uwrite!(f, "{:02X}", *byte)?;
        }
        Ok(())
    }
}

/// Address printed as `0x` followed by 8 or 16 hex digits
pub struct HexU64(pub u64);
impl uDisplay for HexU64 {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        let high = (self.0 >> 32) as u32;
        let low = self.0 as u32;
        if high == 0 {
            ufmt::uwrite!(f, "0x{:08X}", low)
        } else {
            ufmt::uwrite!(f, "0x{:08X}{:08X}", high, low)
        }
    }
}
