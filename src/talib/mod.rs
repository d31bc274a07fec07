//! Family B command set: TA100.
//!
//! There is no power handshake. A command frame is written and the response
//! polled for after the configured initial delay. Counters, key derivation,
//! nonce loading, self test and private key import have no family B
//! encoding here.

mod command;
mod packet;

use crate::datalink::{Bus, LengthField};
use crate::device::family::{CommandSet, AES_BLOCK_SIZE};
use crate::error::{Error, ErrorKind, Status};
use crate::memory::{Slot, Zone, CONFIG_ZONE_SIZE};
use crate::types::{Block, Digest, PublicKey, Serial, SharedSecret, Signature, Word};
use command::{Aes, Ecdh, Info, KeyGen, Lock, Random, Read, Sha, Sign, Verify, Write};
use core::convert::TryFrom;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use heapless::Vec;
use packet::{Packet, PacketBuilder, Response};

// Largest payload moved by a single Read or Write.
const MAX_TRANSFER: usize = 128;
const SHA_BLOCK_SIZE: usize = 64;

pub(crate) struct Talib {
    buffer: Vec<u8, 256>,
}

impl Talib {
    pub(crate) fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn packet_builder(&mut self) -> PacketBuilder<'_> {
        let capacity = self.buffer.capacity();
        self.buffer.clear();
        self.buffer
            .resize(capacity, 0x00u8)
            .unwrap_or_else(|()| unreachable!("Input length equals to the current capacity."));
        PacketBuilder::new(&mut self.buffer)
    }

    fn execute<PHY, D>(&mut self, bus: &mut Bus<PHY, D>, packet: Packet) -> Result<Response<'_>, Error>
    where
        PHY: I2c,
        D: DelayNs,
    {
        trace!("family B command {:?}", packet.opcode());
        bus.send(packet.buffer(&self.buffer))?;
        let response_buffer = bus.receive(&mut self.buffer, LengthField::U16, None)?;
        Response::new(response_buffer)
    }

    fn locked(response: Response<'_>) -> Result<bool, Error> {
        response
            .as_ref()
            .first()
            .map(|state| *state != 0)
            .ok_or_else(|| ErrorKind::RxFail.into())
    }
}

fn verified(result: Result<(), Error>) -> Result<bool, Error> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.device_status() == Some(Status::CheckmacVerifyFailed) => Ok(false),
        Err(e) => Err(e),
    }
}

fn aes_block(response: Response<'_>) -> Result<[u8; AES_BLOCK_SIZE], Error> {
    <[u8; AES_BLOCK_SIZE]>::try_from(response.as_ref()).map_err(|_| ErrorKind::RxFail.into())
}

impl<PHY, D> CommandSet<PHY, D> for Talib
where
    PHY: I2c,
    D: DelayNs,
{
    // Power states are managed by the device itself.
    fn wake(&mut self, _bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        Ok(())
    }

    fn idle(&mut self, _bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        Ok(())
    }

    fn sleep(&mut self, _bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        Ok(())
    }

    fn info(&mut self, bus: &mut Bus<PHY, D>) -> Result<Word, Error> {
        let packet = Info::new(self.packet_builder()).revision()?;
        Word::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn random(&mut self, bus: &mut Bus<PHY, D>) -> Result<Block, Error> {
        let packet = Random::new(self.packet_builder()).random()?;
        Block::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn read_bytes_zone(
        &mut self,
        bus: &mut Bus<PHY, D>,
        zone: Zone,
        slot: Slot,
        offset: usize,
        data: &mut [u8],
    ) -> Result<(), Error> {
        if offset + data.len() > u16::MAX as usize {
            return Err(ErrorKind::BadParam.into());
        }

        let mut copied = 0;
        for chunk in data.chunks_mut(MAX_TRANSFER) {
            let position = (offset + copied) as u16;
            let packet =
                Read::new(self.packet_builder()).read(zone, slot, position, chunk.len() as u16)?;
            let response = self.execute(bus, packet)?;
            if response.as_ref().len() != chunk.len() {
                return Err(ErrorKind::RxFail.into());
            }
            chunk.copy_from_slice(response.as_ref());
            copied += chunk.len();
        }
        Ok(())
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
        if !matches!(data.len(), 4 | 32) || offset > 7 {
            return Err(ErrorKind::BadParam.into());
        }

        let position = block as u16 * 32 + offset as u16 * 4;
        let packet = Write::new(self.packet_builder()).write(zone, slot, position, data)?;
        self.execute(bus, packet).map(drop)
    }

    fn read_serial_number(&mut self, bus: &mut Bus<PHY, D>) -> Result<Serial, Error> {
        let packet = Info::new(self.packet_builder()).serial()?;
        Serial::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn read_config_zone(
        &mut self,
        bus: &mut Bus<PHY, D>,
        config: &mut [u8; CONFIG_ZONE_SIZE],
    ) -> Result<(), Error> {
        CommandSet::<PHY, D>::read_bytes_zone(self, bus, Zone::Config, Slot::PrivateKey00, 0, config)
    }

    fn is_locked(&mut self, bus: &mut Bus<PHY, D>, zone: Zone) -> Result<bool, Error> {
        let packet = Info::new(self.packet_builder()).zone_lock(zone)?;
        Self::locked(self.execute(bus, packet)?)
    }

    fn is_slot_locked(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<bool, Error> {
        let packet = Info::new(self.packet_builder()).slot_lock(slot)?;
        Self::locked(self.execute(bus, packet)?)
    }

    fn lock_config_zone(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        let packet = Lock::new(self.packet_builder()).zone(Zone::Config)?;
        self.execute(bus, packet).map(drop)
    }

    fn lock_data_zone(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        let packet = Lock::new(self.packet_builder()).zone(Zone::Data)?;
        self.execute(bus, packet).map(drop)
    }

    fn lock_data_slot(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<(), Error> {
        let packet = Lock::new(self.packet_builder()).slot(slot)?;
        self.execute(bus, packet).map(drop)
    }

    fn read_pubkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        let mut public_key = PublicKey::default();
        CommandSet::<PHY, D>::read_bytes_zone(self, bus, Zone::Data, slot, 0, public_key.as_mut())?;
        Ok(public_key)
    }

    fn write_pubkey(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        public_key: &PublicKey,
    ) -> Result<(), Error> {
        let packet =
            Write::new(self.packet_builder()).write(Zone::Data, slot, 0, public_key.as_ref())?;
        self.execute(bus, packet).map(drop)
    }

    fn genkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        let packet = KeyGen::new(self.packet_builder()).private_key(slot)?;
        PublicKey::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn get_pubkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        let packet = KeyGen::new(self.packet_builder()).public_key(slot)?;
        PublicKey::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn sign(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        digest: &Digest,
    ) -> Result<Signature, Error> {
        let packet = Sign::new(self.packet_builder()).external(slot, digest)?;
        Signature::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn verify_extern(
        &mut self,
        bus: &mut Bus<PHY, D>,
        digest: &Digest,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> Result<bool, Error> {
        let packet = Verify::new(self.packet_builder()).external(digest, signature, public_key)?;
        verified(self.execute(bus, packet).map(drop))
    }

    fn verify_stored(
        &mut self,
        bus: &mut Bus<PHY, D>,
        digest: &Digest,
        signature: &Signature,
        slot: Slot,
    ) -> Result<bool, Error> {
        let packet = Verify::new(self.packet_builder()).stored(digest, signature, slot)?;
        verified(self.execute(bus, packet).map(drop))
    }

    fn aes_encrypt(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        plaintext: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        let packet = Aes::new(self.packet_builder()).encrypt(slot, plaintext)?;
        aes_block(self.execute(bus, packet)?)
    }

    fn aes_decrypt(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        ciphertext: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        let packet = Aes::new(self.packet_builder()).decrypt(slot, ciphertext)?;
        aes_block(self.execute(bus, packet)?)
    }

    fn sha_start(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        let packet = Sha::new(self.packet_builder()).start()?;
        self.execute(bus, packet).map(drop)
    }

    fn sha_update(&mut self, bus: &mut Bus<PHY, D>, data: &[u8]) -> Result<(), Error> {
        if data.len() != SHA_BLOCK_SIZE {
            return Err(ErrorKind::BadParam.into());
        }
        let packet = Sha::new(self.packet_builder()).update(data)?;
        self.execute(bus, packet).map(drop)
    }

    fn sha_end(&mut self, bus: &mut Bus<PHY, D>, data: &[u8]) -> Result<Digest, Error> {
        if data.len() > SHA_BLOCK_SIZE {
            return Err(ErrorKind::BadParam.into());
        }
        let packet = Sha::new(self.packet_builder()).end(data)?;
        Digest::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn ecdh(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        public_key: &PublicKey,
    ) -> Result<SharedSecret, Error> {
        let packet = Ecdh::new(self.packet_builder()).diffie_hellman(slot, public_key)?;
        SharedSecret::try_from(self.execute(bus, packet)?.as_ref())
    }
}
