//! Family A command set: ATSHA204A, ATSHA206A, ATECC108A, ATECC508A and
//! ATECC608A.
//!
//! Every command is a wake, send, poll and idle cycle on the bus. Response
//! frames carry a one-byte length and a little-endian CRC.

mod clock_divider;
mod command;
mod packet;

pub(crate) use packet::CRC16;

use crate::config::DeviceType;
use crate::datalink::{Bus, LengthField};
use crate::device::family::{CommandSet, AES_BLOCK_SIZE};
use crate::error::{Error, ErrorKind, Status};
use crate::memory::{Size, Slot, Zone, CONFIG_ZONE_SIZE};
use crate::types::{Block, Digest, PublicKey, Serial, SharedSecret, Signature, Word};
use clock_divider::{ClockDivider, CHIP_MODE_OFFSET};
use command::{
    Aes, Counter, DeriveKey, Ecdh, GenKey, Info, Lock, NonceCtx, PrivWrite, Random, Read,
    SelfTest, Sha, Sign, Verify, Write,
};
use core::convert::TryFrom;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use heapless::Vec;
use packet::{Packet, PacketBuilder, Response};

// Lock bytes of the configuration zone. 0x55 means unlocked.
const LOCK_VALUE_OFFSET: usize = 86;
const LOCK_CONFIG_OFFSET: usize = 87;
const SLOT_LOCKED_OFFSET: usize = 88;
const UNLOCKED: u8 = 0x55;

// Public keys in data slots are stored as two 36-byte halves, each with 4
// leading pad bytes.
const PUBKEY_PAD: usize = 4;
const PUBKEY_SLOT_SIZE: usize = 72;

pub(crate) struct Calib {
    device_type: DeviceType,
    buffer: Vec<u8, 192>,
    clock_divider: ClockDivider,
}

impl Calib {
    pub(crate) fn new(device_type: DeviceType) -> Self {
        Self {
            device_type,
            buffer: Vec::new(),
            clock_divider: ClockDivider::Zero,
        }
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
        let exec_time = self.clock_divider.execution_time(packet.opcode());
        bus.wake()?;
        let exchange = match bus.send(packet.buffer(&self.buffer)) {
            Ok(()) => bus.receive(&mut self.buffer, LengthField::U8, Some(exec_time)),
            Err(e) => Err(e),
        };
        // Put the part back to idle even when the exchange failed.
        let response_buffer = match exchange {
            Ok(buffer) => buffer,
            Err(e) => {
                bus.idle().ok();
                return Err(e);
            }
        };
        bus.idle()?;
        Response::new(response_buffer)
    }

    /// Only the ATECC608A can run on a divided clock. Its execution times
    /// depend on the ChipMode byte, which is read once per session.
    pub(crate) fn calibrate<PHY, D>(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error>
    where
        PHY: I2c,
        D: DelayNs,
    {
        if self.device_type != DeviceType::Atecc608a {
            return Ok(());
        }

        let mut word = Word::default();
        let word_offset = CHIP_MODE_OFFSET / Size::Word.len();
        self.read_zone(
            bus,
            Zone::Config,
            Slot::PrivateKey00,
            0,
            word_offset as u8,
            word.as_mut(),
        )?;
        let chip_mode = word.as_ref()[CHIP_MODE_OFFSET % Size::Word.len()];
        self.clock_divider = ClockDivider::from_chip_mode(chip_mode);
        debug!("chip mode {:02x}, clock divider {:?}", chip_mode, self.clock_divider);
        Ok(())
    }

    fn read<PHY, D>(
        &mut self,
        bus: &mut Bus<PHY, D>,
        zone: Zone,
        size: Size,
        address: u16,
        data: &mut [u8],
    ) -> Result<(), Error>
    where
        PHY: I2c,
        D: DelayNs,
    {
        let packet = Read::new(self.packet_builder()).read(zone, size, address)?;
        let response = self.execute(bus, packet)?;
        let bytes = response.as_ref();
        if bytes.len() < data.len() {
            return Err(ErrorKind::RxFail.into());
        }
        data.copy_from_slice(&bytes[..data.len()]);
        Ok(())
    }

    /// Writes whole words starting at a word-aligned byte offset, using block
    /// writes where a full block is covered.
    fn write_bytes<PHY, D>(
        &mut self,
        bus: &mut Bus<PHY, D>,
        zone: Zone,
        slot: Slot,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Error>
    where
        PHY: I2c,
        D: DelayNs,
    {
        let word = Size::Word.len();
        let block = Size::Block.len();
        if offset % word != 0 || data.len() % word != 0 {
            return Err(ErrorKind::BadParam.into());
        }
        if offset + data.len() > zone.size(self.device_type, slot) {
            return Err(ErrorKind::BadParam.into());
        }

        let mut written = 0;
        while written < data.len() {
            let position = offset + written;
            let remaining = data.len() - written;
            let size = if position % block == 0 && remaining >= block {
                Size::Block
            } else {
                Size::Word
            };
            let address = zone.get_addr(
                slot,
                (position / block) as u8,
                ((position % block) / word) as u8,
            )?;
            let chunk = &data[written..written + size.len()];
            let packet = Write::new(self.packet_builder()).write(zone, size, address, chunk)?;
            self.execute(bus, packet)?;
            written += size.len();
        }
        Ok(())
    }

    fn load_message_digest_buffer<PHY, D>(
        &mut self,
        bus: &mut Bus<PHY, D>,
        digest: &Digest,
    ) -> Result<(), Error>
    where
        PHY: I2c,
        D: DelayNs,
    {
        let packet = NonceCtx::new(self.packet_builder()).message_digest_buffer(digest)?;
        self.execute(bus, packet).map(drop)
    }

    fn read_config_word<PHY, D>(
        &mut self,
        bus: &mut Bus<PHY, D>,
        byte_offset: usize,
    ) -> Result<Word, Error>
    where
        PHY: I2c,
        D: DelayNs,
    {
        let mut word = Word::default();
        let block = (byte_offset / Size::Block.len()) as u8;
        let offset = ((byte_offset % Size::Block.len()) / Size::Word.len()) as u8;
        self.read_zone(bus, Zone::Config, Slot::PrivateKey00, block, offset, word.as_mut())?;
        Ok(word)
    }
}

// A mismatch reported by Verify is an answer, not a failure.
fn verified(result: Result<(), Error>) -> Result<bool, Error> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.device_status() == Some(Status::CheckmacVerifyFailed) => Ok(false),
        Err(e) => Err(e),
    }
}

fn counter_value(response: Response<'_>) -> Result<u32, Error> {
    let bytes = response.as_ref();
    if bytes.len() < 4 {
        return Err(ErrorKind::RxFail.into());
    }
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl<PHY, D> CommandSet<PHY, D> for Calib
where
    PHY: I2c,
    D: DelayNs,
{
    fn wake(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        bus.wake()
    }

    fn idle(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        bus.idle()
    }

    fn sleep(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        bus.sleep()
    }

    fn info(&mut self, bus: &mut Bus<PHY, D>) -> Result<Word, Error> {
        let packet = Info::new(self.packet_builder()).revision()?;
        Word::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn random(&mut self, bus: &mut Bus<PHY, D>) -> Result<Block, Error> {
        let packet = Random::new(self.packet_builder()).random()?;
        Block::try_from(self.execute(bus, packet)?.as_ref())
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
        let size = match data.len() {
            4 => Size::Word,
            32 => Size::Block,
            _ => return Err(ErrorKind::BadParam.into()),
        };
        let address = zone.get_addr(slot, block, offset)?;
        self.read(bus, zone, size, address, data)
    }

    fn read_bytes_zone(
        &mut self,
        bus: &mut Bus<PHY, D>,
        zone: Zone,
        slot: Slot,
        offset: usize,
        data: &mut [u8],
    ) -> Result<(), Error> {
        let zone_size = zone.size(self.device_type, slot);
        if offset + data.len() > zone_size {
            return Err(ErrorKind::BadParam.into());
        }

        let word = Size::Word.len();
        let block = Size::Block.len();
        let mut chunk = [0u8; 32];
        let mut copied = 0;
        while copied < data.len() {
            let position = offset + copied;
            let block_index = position / block;
            // Read whole blocks while the zone has one left, words after.
            let (size, start) = if (block_index + 1) * block <= zone_size {
                (Size::Block, block_index * block)
            } else {
                (Size::Word, position - position % word)
            };
            let address = zone.get_addr(
                slot,
                block_index as u8,
                ((start % block) / word) as u8,
            )?;
            let chunk = &mut chunk[..size.len()];
            self.read(bus, zone, size, address, chunk)?;

            let skip = position - start;
            let length = (size.len() - skip).min(data.len() - copied);
            data[copied..copied + length].copy_from_slice(&chunk[skip..skip + length]);
            copied += length;
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
        let size = match data.len() {
            4 => Size::Word,
            32 => Size::Block,
            _ => return Err(ErrorKind::BadParam.into()),
        };
        let address = zone.get_addr(slot, block, offset)?;
        let packet = Write::new(self.packet_builder()).write(zone, size, address, data)?;
        self.execute(bus, packet).map(drop)
    }

    fn read_serial_number(&mut self, bus: &mut Bus<PHY, D>) -> Result<Serial, Error> {
        let mut block = Block::default();
        self.read_zone(bus, Zone::Config, Slot::PrivateKey00, 0, 0, block.as_mut())?;
        Serial::from_config_block(block.as_ref())
    }

    fn read_config_zone(
        &mut self,
        bus: &mut Bus<PHY, D>,
        config: &mut [u8; CONFIG_ZONE_SIZE],
    ) -> Result<(), Error> {
        self.read_bytes_zone(bus, Zone::Config, Slot::PrivateKey00, 0, config)
    }

    fn is_locked(&mut self, bus: &mut Bus<PHY, D>, zone: Zone) -> Result<bool, Error> {
        let index = match zone {
            Zone::Config => LOCK_CONFIG_OFFSET,
            Zone::Data => LOCK_VALUE_OFFSET,
            Zone::Otp => return Err(ErrorKind::BadParam.into()),
        };
        let word = self.read_config_word(bus, index)?;
        Ok(word.as_ref()[index % Size::Word.len()] != UNLOCKED)
    }

    fn is_slot_locked(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<bool, Error> {
        let word = self.read_config_word(bus, SLOT_LOCKED_OFFSET)?;
        let index = SLOT_LOCKED_OFFSET % Size::Word.len();
        let slot_locked = u16::from_le_bytes([word.as_ref()[index], word.as_ref()[index + 1]]);
        // A cleared bit marks a locked slot.
        Ok(slot_locked & (1 << slot as u16) == 0)
    }

    fn lock_config_zone(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        let packet = Lock::new(self.packet_builder()).zone(Zone::Config, None)?;
        self.execute(bus, packet).map(drop)
    }

    fn lock_data_zone(&mut self, bus: &mut Bus<PHY, D>) -> Result<(), Error> {
        let packet = Lock::new(self.packet_builder()).zone(Zone::Data, None)?;
        self.execute(bus, packet).map(drop)
    }

    fn lock_data_slot(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<(), Error> {
        let packet = Lock::new(self.packet_builder()).slot(slot)?;
        self.execute(bus, packet).map(drop)
    }

    fn read_pubkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        if slot.is_private_key() {
            return Err(ErrorKind::BadParam.into());
        }

        let mut stored = [0u8; PUBKEY_SLOT_SIZE];
        self.read_bytes_zone(bus, Zone::Data, slot, 0, &mut stored)?;
        let half = PUBKEY_SLOT_SIZE / 2;
        let mut public_key = PublicKey::default();
        public_key.as_mut()[..32].copy_from_slice(&stored[PUBKEY_PAD..half]);
        public_key.as_mut()[32..].copy_from_slice(&stored[half + PUBKEY_PAD..]);
        Ok(public_key)
    }

    fn write_pubkey(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        public_key: &PublicKey,
    ) -> Result<(), Error> {
        if slot.is_private_key() {
            return Err(ErrorKind::BadParam.into());
        }

        let mut stored = [0u8; PUBKEY_SLOT_SIZE];
        let half = PUBKEY_SLOT_SIZE / 2;
        stored[PUBKEY_PAD..half].copy_from_slice(public_key.x());
        stored[half + PUBKEY_PAD..].copy_from_slice(public_key.y());
        self.write_bytes(bus, Zone::Data, slot, 0, &stored)
    }

    fn genkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        let packet = GenKey::new(self.packet_builder()).private_key(slot)?;
        PublicKey::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn get_pubkey(&mut self, bus: &mut Bus<PHY, D>, slot: Slot) -> Result<PublicKey, Error> {
        let packet = GenKey::new(self.packet_builder()).public_key(slot)?;
        PublicKey::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn sign(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        digest: &Digest,
    ) -> Result<Signature, Error> {
        // 1. Random value generation updates the RNG seed
        let packet = Random::new(self.packet_builder()).random()?;
        self.execute(bus, packet)?;
        // 2. Nonce load
        self.load_message_digest_buffer(bus, digest)?;
        // 3. Sign
        let packet = Sign::new(self.packet_builder()).external(slot)?;
        Signature::try_from(self.execute(bus, packet)?.as_ref())
    }

    fn verify_extern(
        &mut self,
        bus: &mut Bus<PHY, D>,
        digest: &Digest,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> Result<bool, Error> {
        self.load_message_digest_buffer(bus, digest)?;
        let packet = Verify::new(self.packet_builder()).external(signature, public_key)?;
        verified(self.execute(bus, packet).map(drop))
    }

    fn verify_stored(
        &mut self,
        bus: &mut Bus<PHY, D>,
        digest: &Digest,
        signature: &Signature,
        slot: Slot,
    ) -> Result<bool, Error> {
        self.load_message_digest_buffer(bus, digest)?;
        let packet = Verify::new(self.packet_builder()).stored(signature, slot)?;
        verified(self.execute(bus, packet).map(drop))
    }

    fn nonce(&mut self, bus: &mut Bus<PHY, D>, value: &Digest) -> Result<(), Error> {
        let packet = NonceCtx::new(self.packet_builder()).temp_key(value)?;
        self.execute(bus, packet).map(drop)
    }

    fn counter_read(&mut self, bus: &mut Bus<PHY, D>, counter_id: u16) -> Result<u32, Error> {
        let packet = Counter::new(self.packet_builder()).read(counter_id)?;
        counter_value(self.execute(bus, packet)?)
    }

    fn counter_increment(&mut self, bus: &mut Bus<PHY, D>, counter_id: u16) -> Result<u32, Error> {
        let packet = Counter::new(self.packet_builder()).increment(counter_id)?;
        counter_value(self.execute(bus, packet)?)
    }

    fn derive_key(
        &mut self,
        bus: &mut Bus<PHY, D>,
        mode: u8,
        target: Slot,
        mac: Option<&Digest>,
    ) -> Result<(), Error> {
        let packet = DeriveKey::new(self.packet_builder()).derive(mode, target, mac)?;
        self.execute(bus, packet).map(drop)
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
        let packet = Sha::new(self.packet_builder()).update(data)?;
        self.execute(bus, packet).map(drop)
    }

    fn sha_end(&mut self, bus: &mut Bus<PHY, D>, data: &[u8]) -> Result<Digest, Error> {
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

    fn selftest(&mut self, bus: &mut Bus<PHY, D>, mode: u8, param2: u16) -> Result<(), Error> {
        let packet = SelfTest::new(self.packet_builder()).run(mode, param2)?;
        self.execute(bus, packet).map(drop)
    }

    fn priv_write(
        &mut self,
        bus: &mut Bus<PHY, D>,
        slot: Slot,
        private_key: &Block,
    ) -> Result<(), Error> {
        if !slot.is_private_key() {
            return Err(ErrorKind::BadParam.into());
        }

        let packet = PrivWrite::new(self.packet_builder()).write_private_key(slot, private_key)?;
        self.execute(bus, packet).map(drop)
    }
}

fn aes_block(response: Response<'_>) -> Result<[u8; AES_BLOCK_SIZE], Error> {
    let bytes = response.as_ref();
    if bytes.len() < AES_BLOCK_SIZE {
        return Err(ErrorKind::RxFail.into());
    }
    let mut block = [0u8; AES_BLOCK_SIZE];
    block.copy_from_slice(&bytes[..AES_BLOCK_SIZE]);
    Ok(block)
}
