//! The two command protocol implementations behind a `Device`.

use crate::calib::Calib;
use crate::config::{DeviceType, Family};
use crate::datalink::Bus;
use crate::error::{Error, ErrorKind};
use crate::memory::{Slot, Zone, CONFIG_ZONE_SIZE};
use crate::talib::Talib;
use crate::types::{Block, Digest, PublicKey, Serial, SharedSecret, Signature, Word};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// Length of a block processed by AES.
pub const AES_BLOCK_SIZE: usize = 16;

fn unimplemented<T>() -> Result<T, Error> {
    Err(ErrorKind::Unimplemented.into())
}

/// One logical operation per method. Each family overrides what its wire
/// protocol can express; the rest report `Unimplemented`.
///
/// The trait is crate-private, so `Calib` and `Talib` are the only
/// implementors.
#[allow(unused_variables)]
pub(crate) trait CommandSet<PHY, D> {
    fn wake(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        unimplemented()
    }

    fn idle(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        unimplemented()
    }

    fn sleep(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        unimplemented()
    }

    fn info(&mut self, bus: &mut Bus<PHY, D>) -> Result<Word, Error> {
        unimplemented()
    }

    fn random(&mut self, bus: &mut Bus<PHY, D>) -> Result<Block, Error> {
        unimplemented()
    }

    fn read_zone(
        &mut self,
        bus: &mut Bus<PHY, D>,
        zone: Zone,
        slot: Slot,
        block: u8,
        offset: u8,
        data: &mut [u8],
    ) -> Result<(), Error> {
        unimplemented()
    }

    fn read_bytes_zone(
        &mut self,
        bus: &mut Bus<PHY, D>,
        zone: Zone,
        slot: Slot,
        offset: usize,
        data: &mut [u8],
    ) -> Result<(), Error> {
        unimplemented()
    }

    fn write_zone(
        &mut self,
        bus: &mut Bus<PHY, D>,
        zone: Zone,
        slot: Slot,
        block: u8,
        offset: u8,
        data: &[u8],
    ) -> Result<(), Error> {
        unimplemented()
    }

    fn read_serial_number(&mut self, bus: &mut Bus<PHY, D>) -> Result<Serial, Error> {
        unimplemented()
    }

    fn read_config_zone(
        &mut self,
        bus: &mut Bus<PHY, D>,
        config: &mut [u8; CONFIG_ZONE_SIZE],
    ) -> Result<(), Error> {
        unimplemented()
    }

    fn is_locked(&mut self, bus: &mut Bus<PHY, D>, zone: Zone) -> Result<bool, Error> {
        unimplemented()
    }

    fn is_slot_locked(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<bool, Error> {
        unimplemented()
    }

    fn lock_config_zone(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        unimplemented()
    }

    fn lock_data_zone(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        unimplemented()
    }

    fn lock_data_slot(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<(), Error> {
        unimplemented()
    }

    fn read_pubkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        unimplemented()
    }

    fn write_pubkey(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        public_key: &PublicKey,
    ) -> Result<(), Error> {
        unimplemented()
    }

    fn genkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        unimplemented()
    }

    fn get_pubkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        unimplemented()
    }

    fn sign(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        digest: &Digest,
    ) -> Result<Signature, Error> {
        unimplemented()
    }

    fn verify_extern(
        &mut self,
        bus: &mut Bus<PHY, D>,
        digest: &Digest,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> Result<bool, Error> {
        unimplemented()
    }

    fn verify_stored(
        &mut self,
        bus: &mut Bus<PHY, D>,
        digest: &Digest,
        signature: &Signature,
        slot: Slot,
    ) -> Result<bool, Error> {
        unimplemented()
    }

    fn nonce(&mut self, bus: &mut Bus<PHY, D>, value: &Digest) -> Result<(), Error> {
        unimplemented()
    }

    fn counter_read(&mut self, bus: &mut Bus<PHY, D>, counter_id: u16) -> Result<u32, Error> {
        unimplemented()
    }

    fn counter_increment(&mut self, bus: &mut Bus<PHY, D>, counter_id: u16) -> Result<u32, Error> {
        unimplemented()
    }

    fn derive_key(
        &mut self,
        bus: &mut Bus<PHY, D>,
        mode: u8,
        target: Slot,
        mac: Option<&Digest>,
    ) -> Result<(), Error> {
        unimplemented()
    }

    fn aes_encrypt(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        plaintext: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        unimplemented()
    }

    fn aes_decrypt(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        ciphertext: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        unimplemented()
    }

    fn sha_start(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        unimplemented()
    }

    fn sha_update(&mut self, bus: &mut Bus<PHY, D>, data: &[u8]) -> Result<(), Error> {
        unimplemented()
    }

    fn sha_end(&mut self, bus: &mut Bus<PHY, D>, data: &[u8]) -> Result<Digest, Error> {
        unimplemented()
    }

    fn ecdh(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        public_key: &PublicKey,
    ) -> Result<SharedSecret, Error> {
        unimplemented()
    }

    fn selftest(&mut self, bus: &mut Bus<PHY, D>, mode: u8, param2: u16) -> Result<(), Error> {
        unimplemented()
    }

    fn priv_write(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        private_key: &Block,
    ) -> Result<(), Error> {
        unimplemented()
    }
}

/// Family implementation bound to a session at open time.
pub(crate) enum Bound {
    Ca(Calib),
    Ta(Talib),
}

impl Bound {
    pub(crate) fn new(device_type: DeviceType) -> Option<Self> {
        match device_type.family()? {
            Family::Ca => Some(Self::Ca(Calib::new(device_type))),
            Family::Ta => Some(Self::Ta(Talib::new())),
        }
    }

    pub(crate) fn commands<PHY, D>(&mut self) -> &mut dyn CommandSet<PHY, D>
    where
        PHY: I2c,
        D: DelayNs,
    {
        match self {
            Self::Ca(calib) => calib,
            Self::Ta(talib) => talib,
        }
    }
}
