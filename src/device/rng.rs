//! Random number generation

use super::Device;
use crate::error::Error;
use core::num::NonZeroU32;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use signature::rand_core;

/// `RngCore` backed by the device's hardware random number generator.
pub struct DeviceRng<'a, PHY, D> {
    device: &'a mut Device<PHY, D>,
}

impl<'a, PHY, D> DeviceRng<'a, PHY, D> {
    pub(crate) fn new(device: &'a mut Device<PHY, D>) -> Self {
        Self { device }
    }
}

impl<'a, PHY, D> DeviceRng<'a, PHY, D>
where
    PHY: I2c,
    D: DelayNs,
{
    pub fn try_fill(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        for c in dest.chunks_mut(32) {
            let block = self.device.random()?;
            c.copy_from_slice(&block.as_ref()[..c.len()]);
        }
        Ok(())
    }
}

impl<'a, PHY, D> rand_core::RngCore for DeviceRng<'a, PHY, D>
where
    PHY: I2c,
    D: DelayNs,
{
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    /// # Panics
    ///
    /// Panics when the device fails to produce random bytes. Use
    /// `try_fill_bytes` to handle the failure instead.
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.try_fill(dest) {
            panic!("device random number generator failed: {}", e);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.try_fill(dest).map_err(|e| {
            rand_core::Error::from(NonZeroU32::new(e.code()).unwrap_or(NonZeroU32::MAX))
        })
    }
}

impl<'a, PHY, D> rand_core::CryptoRng for DeviceRng<'a, PHY, D>
where
    PHY: I2c,
    D: DelayNs,
{
}
