//! The caller-owned session with a secure element.
//!
//! A [`Device`] owns the bus for its whole life and binds a command family
//! when [`Device::open`] is called. Every operation takes `&mut self`, so a
//! device shared between threads has to be wrapped in the caller's own mutex.

mod capability;
pub(crate) mod family;
mod rng;

pub use capability::Operation;
pub use family::AES_BLOCK_SIZE;
pub use rng::DeviceRng;

use crate::config::{DeviceType, IfaceType, InterfaceConfig};
use crate::datalink::Bus;
use crate::error::{Error, ErrorKind};
use crate::memory::{Slot, Zone, CONFIG_ZONE_SIZE};
use crate::types::{Block, Digest, PublicKey, Serial, SharedSecret, Signature, Word};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use family::{Bound, CommandSet};

struct Session {
    config: InterfaceConfig,
    // `None` when the configured device type is unknown.
    bound: Option<Bound>,
}

pub struct Device<PHY, D> {
    bus: Bus<PHY, D>,
    session: Option<Session>,
}

impl<PHY, D> Device<PHY, D> {
    /// A closed handle over the given bus and delay provider.
    pub fn new(phy: PHY, delay: D) -> Self {
        Self {
            bus: Bus::new(phy, delay),
            session: None,
        }
    }

    /// Device type of the open session, `Unknown` while closed.
    pub fn device_type(&self) -> DeviceType {
        self.session
            .as_ref()
            .map(|session| session.config.device_type)
            .unwrap_or_default()
    }

    pub fn config(&self) -> Option<&InterfaceConfig> {
        self.session.as_ref().map(|session| &session.config)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the bound device implements `operation`.
    pub fn supports(&self, operation: Operation) -> bool {
        capability::supports(self.device_type(), operation)
    }

    /// Tear down the bound command family. Releasing a closed handle is a
    /// no-op.
    pub fn release(&mut self) -> Result<(), Error> {
        if let Some(session) = self.session.take() {
            debug!("released {:?}", session.config.device_type);
        }
        Ok(())
    }

    /// Give back the bus and the delay provider.
    pub fn free(self) -> (PHY, D) {
        self.bus.release()
    }

    fn dispatch<T>(
        &mut self,
        operation: Operation,
        f: impl FnOnce(&mut dyn CommandSet<PHY, D>, &mut Bus<PHY, D>) -> Result<T, Error>,
    ) -> Result<T, Error>
    where
        PHY: I2c,
        D: DelayNs,
    {
        let session = self
            .session
            .as_mut()
            .ok_or(Error::from(ErrorKind::NotInitialized))?;
        let bound = session
            .bound
            .as_mut()
            .ok_or(Error::from(ErrorKind::NotInitialized))?;
        if !capability::supports(session.config.device_type, operation) {
            return Err(ErrorKind::Unimplemented.into());
        }
        f(bound.commands(), &mut self.bus)
    }
}

impl<PHY, D> Device<PHY, D>
where
    PHY: I2c,
    D: DelayNs,
{
    /// Bind `config` to this handle, releasing any open session first. The
    /// old session is gone even when `config` is rejected.
    ///
    /// An ATECC608A is asked for its clock divider during open. A failure of
    /// that read aborts the open and leaves the handle closed.
    pub fn open(&mut self, config: InterfaceConfig) -> Result<(), Error> {
        self.release()?;
        if !config.is_well_formed() || config.iface_type != IfaceType::I2c {
            return Err(ErrorKind::BadParam.into());
        }

        self.bus.configure(&config);
        let mut bound = Bound::new(config.device_type);
        if let Some(Bound::Ca(calib)) = bound.as_mut() {
            calib.calibrate(&mut self.bus)?;
        }

        debug!(
            "opened {:?} at {:02x}",
            config.device_type, config.address
        );
        self.session = Some(Session { config, bound });
        Ok(())
    }

    /// Borrow the device's random number generator.
    pub fn rng(&mut self) -> DeviceRng<'_, PHY, D> {
        DeviceRng::new(self)
    }

    pub fn wake(&mut self) -> Result<(), Error> {
        self.dispatch(Operation::Wake, |cmds, bus| cmds.wake(bus))
    }

    pub fn idle(&mut self) -> Result<(), Error> {
        self.dispatch(Operation::Idle, |cmds, bus| cmds.idle(bus))
    }

    pub fn sleep(&mut self) -> Result<(), Error> {
        self.dispatch(Operation::Sleep, |cmds, bus| cmds.sleep(bus))
    }

    /// Revision word of the device.
    pub fn info(&mut self) -> Result<Word, Error> {
        self.dispatch(Operation::Info, |cmds, bus| cmds.info(bus))
    }

    /// 32 bytes from the hardware random number generator.
    pub fn random(&mut self) -> Result<Block, Error> {
        self.dispatch(Operation::Random, |cmds, bus| cmds.random(bus))
    }

    /// Read a word or a block, depending on the length of `data`, at a
    /// block/word position of a zone.
    pub fn read_zone(
        &mut self,
        zone: Zone,
        slot: Slot,
        block: u8,
        offset: u8,
        data: &mut [u8],
    ) -> Result<(), Error> {
        self.dispatch(Operation::ReadZone, |cmds, bus| {
            cmds.read_zone(bus, zone, slot, block, offset, data)
        })
    }

    /// Read an arbitrary byte range of a zone or slot.
    pub fn read_bytes_zone(
        &mut self,
        zone: Zone,
        slot: Slot,
        offset: usize,
        data: &mut [u8],
    ) -> Result<(), Error> {
        self.dispatch(Operation::ReadBytesZone, |cmds, bus| {
            cmds.read_bytes_zone(bus, zone, slot, offset, data)
        })
    }

    pub fn write_zone(
        &mut self,
        zone: Zone,
        slot: Slot,
        block: u8,
        offset: u8,
        data: &[u8],
    ) -> Result<(), Error> {
        self.dispatch(Operation::WriteZone, |cmds, bus| {
            cmds.write_zone(bus, zone, slot, block, offset, data)
        })
    }

    pub fn read_serial_number(&mut self) -> Result<Serial, Error> {
        self.dispatch(Operation::ReadSerialNumber, |cmds, bus| {
            cmds.read_serial_number(bus)
        })
    }

    pub fn read_config_zone(&mut self) -> Result<[u8; CONFIG_ZONE_SIZE], Error> {
        let mut config = [0u8; CONFIG_ZONE_SIZE];
        self.dispatch(Operation::ReadConfigZone, |cmds, bus| {
            cmds.read_config_zone(bus, &mut config)
        })?;
        Ok(config)
    }

    pub fn is_locked(&mut self, zone: Zone) -> Result<bool, Error> {
        self.dispatch(Operation::IsLocked, |cmds, bus| cmds.is_locked(bus, zone))
    }

    pub fn is_slot_locked(&mut self, slot: Slot) -> Result<bool, Error> {
        self.dispatch(Operation::IsSlotLocked, |cmds, bus| {
            cmds.is_slot_locked(bus, slot)
        })
    }

    pub fn lock_config_zone(&mut self) -> Result<(), Error> {
        self.dispatch(Operation::LockConfigZone, |cmds, bus| {
            cmds.lock_config_zone(bus)
        })
    }

    pub fn lock_data_zone(&mut self) -> Result<(), Error> {
        self.dispatch(Operation::LockDataZone, |cmds, bus| cmds.lock_data_zone(bus))
    }

    pub fn lock_data_slot(&mut self, slot: Slot) -> Result<(), Error> {
        self.dispatch(Operation::LockDataSlot, |cmds, bus| {
            cmds.lock_data_slot(bus, slot)
        })
    }

    /// Public key stored in a data slot.
    pub fn read_pubkey(&mut self, slot: Slot) -> Result<PublicKey, Error> {
        self.dispatch(Operation::ReadPubKey, |cmds, bus| cmds.read_pubkey(bus, slot))
    }

    pub fn write_pubkey(&mut self, slot: Slot, public_key: &PublicKey) -> Result<(), Error> {
        self.dispatch(Operation::WritePubKey, |cmds, bus| {
            cmds.write_pubkey(bus, slot, public_key)
        })
    }

    /// Create a private key in `slot` and output its public key.
    pub fn genkey(&mut self, slot: Slot) -> Result<PublicKey, Error> {
        self.dispatch(Operation::GenKey, |cmds, bus| cmds.genkey(bus, slot))
    }

    /// Given a private key created and stored in advance, calculate its
    /// public key.
    pub fn get_pubkey(&mut self, slot: Slot) -> Result<PublicKey, Error> {
        self.dispatch(Operation::GetPubKey, |cmds, bus| cmds.get_pubkey(bus, slot))
    }

    /// Sign a 32-byte digest with the private key in `slot`.
    pub fn sign(&mut self, slot: Slot, digest: &Digest) -> Result<Signature, Error> {
        self.dispatch(Operation::Sign, |cmds, bus| cmds.sign(bus, slot, digest))
    }

    /// Verify a signature over a digest with a caller supplied public key.
    /// A mismatch is `Ok(false)`; an invalid key is a device error.
    pub fn verify_extern(
        &mut self,
        digest: &Digest,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> Result<bool, Error> {
        self.dispatch(Operation::VerifyExtern, |cmds, bus| {
            cmds.verify_extern(bus, digest, signature, public_key)
        })
    }

    /// Verify a signature over a digest with the public key stored in `slot`.
    pub fn verify_stored(
        &mut self,
        digest: &Digest,
        signature: &Signature,
        slot: Slot,
    ) -> Result<bool, Error> {
        self.dispatch(Operation::VerifyStored, |cmds, bus| {
            cmds.verify_stored(bus, digest, signature, slot)
        })
    }

    /// Load a 32-byte value into TempKey.
    pub fn nonce(&mut self, value: &Digest) -> Result<(), Error> {
        self.dispatch(Operation::Nonce, |cmds, bus| cmds.nonce(bus, value))
    }

    pub fn counter_read(&mut self, counter_id: u16) -> Result<u32, Error> {
        self.dispatch(Operation::CounterRead, |cmds, bus| {
            cmds.counter_read(bus, counter_id)
        })
    }

    /// Increment a monotonic counter and return its new value.
    pub fn counter_increment(&mut self, counter_id: u16) -> Result<u32, Error> {
        self.dispatch(Operation::CounterIncrement, |cmds, bus| {
            cmds.counter_increment(bus, counter_id)
        })
    }

    pub fn derive_key(&mut self, mode: u8, target: Slot, mac: Option<&Digest>) -> Result<(), Error> {
        self.dispatch(Operation::DeriveKey, |cmds, bus| {
            cmds.derive_key(bus, mode, target, mac)
        })
    }

    pub fn aes_encrypt(
        &mut self,
        slot: Slot,
        plaintext: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        self.dispatch(Operation::AesEncrypt, |cmds, bus| {
            cmds.aes_encrypt(bus, slot, plaintext)
        })
    }

    pub fn aes_decrypt(
        &mut self,
        slot: Slot,
        ciphertext: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        self.dispatch(Operation::AesDecrypt, |cmds, bus| {
            cmds.aes_decrypt(bus, slot, ciphertext)
        })
    }

    pub fn sha_start(&mut self) -> Result<(), Error> {
        self.dispatch(Operation::ShaStart, |cmds, bus| cmds.sha_start(bus))
    }

    /// Feed exactly one 64-byte block.
    pub fn sha_update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.dispatch(Operation::ShaUpdate, |cmds, bus| cmds.sha_update(bus, data))
    }

    /// Feed the final, possibly empty, partial block and get the digest.
    pub fn sha_end(&mut self, data: &[u8]) -> Result<Digest, Error> {
        self.dispatch(Operation::ShaEnd, |cmds, bus| cmds.sha_end(bus, data))
    }

    /// SHA-256 of a whole message, computed by the device.
    pub fn sha(&mut self, message: &[u8]) -> Result<Digest, Error> {
        const BLOCK: usize = 64;
        self.sha_start()?;
        let mut blocks = message.chunks_exact(BLOCK);
        for block in &mut blocks {
            self.sha_update(block)?;
        }
        self.sha_end(blocks.remainder())
    }

    pub fn ecdh(&mut self, slot: Slot, public_key: &PublicKey) -> Result<SharedSecret, Error> {
        self.dispatch(Operation::Ecdh, |cmds, bus| cmds.ecdh(bus, slot, public_key))
    }

    pub fn selftest(&mut self, mode: u8, param2: u16) -> Result<(), Error> {
        self.dispatch(Operation::SelfTest, |cmds, bus| {
            cmds.selftest(bus, mode, param2)
        })
    }

    /// Import a private key. Only possible while the data zone is unlocked
    /// or the slot permits it.
    pub fn priv_write(&mut self, slot: Slot, private_key: &Block) -> Result<(), Error> {
        self.dispatch(Operation::PrivWrite, |cmds, bus| {
            cmds.priv_write(bus, slot, private_key)
        })
    }
}

#[cfg(test)]
mod tests;
