//! Simulated secure element for unit tests.
//!
//! `MockDevice` answers on the I2C bus the way the real parts do: family A
//! with wake tokens and little-endian CRC frames, family B with 16-bit length
//! frames. Keys are real P-256 keys, so verify mismatches and invalid points
//! come back with the status bytes hardware reports.

use crate::calib::CRC16;
use crate::config::Family;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest as _, Sha256};
use std::vec::Vec;

pub(crate) const SERIAL: [u8; 9] = [0x01, 0x23, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6, 0xEE];
pub(crate) const REVISION: [u8; 4] = [0x00, 0x00, 0x60, 0x02];

const STATUS_OK: u8 = 0x00;
const STATUS_VERIFY_FAILED: u8 = 0x01;
const STATUS_PARSE: u8 = 0x03;
const STATUS_EXECUTION: u8 = 0x0F;
const STATUS_CRC: u8 = 0xFF;

const SLOT_SIZE: usize = 416;

/// Route `log` records through the test harness. Repeated calls are no-ops.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Delay provider that returns immediately.
pub(crate) struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub(crate) struct MockDevice {
    family: Family,
    address: u8,
    pub(crate) config: [u8; 128],
    pub(crate) slots: Vec<[u8; SLOT_SIZE]>,
    keys: Vec<Option<SigningKey>>,
    counters: [u32; 2],
    message_digest: [u8; 32],
    temp_key: [u8; 32],
    sha: Option<Sha256>,
    rng_counter: u32,
    awake: bool,
    wake_token: bool,
    pending: Option<Vec<u8>>,
    cursor: usize,
    /// Every read is NACKed while set.
    pub(crate) unresponsive: bool,
    /// Family A commands are taken but never answered while set.
    pub(crate) mute: bool,
    /// Opcodes received, in order.
    pub(crate) commands: Vec<u8>,
}

impl MockDevice {
    /// `address` is the 7-bit bus address.
    pub(crate) fn new(family: Family, address: u8) -> Self {
        let mut config = [0u8; 128];
        config[0..4].copy_from_slice(&SERIAL[0..4]);
        config[8..13].copy_from_slice(&SERIAL[4..9]);
        // Unlocked zones, every slot unlocked.
        config[86] = 0x55;
        config[87] = 0x55;
        config[88] = 0xFF;
        config[89] = 0xFF;
        Self {
            family,
            address,
            config,
            slots: std::vec![[0u8; SLOT_SIZE]; 16],
            keys: (0..16).map(|_| None).collect(),
            counters: [0; 2],
            message_digest: [0; 32],
            temp_key: [0; 32],
            sha: None,
            rng_counter: 0,
            awake: false,
            wake_token: false,
            pending: None,
            cursor: 0,
            unresponsive: false,
            mute: false,
            commands: Vec::new(),
        }
    }

    pub(crate) fn atecc608a() -> Self {
        Self::new(Family::Ca, 0x60)
    }

    pub(crate) fn ta100() -> Self {
        Self::new(Family::Ta, 0x17)
    }

    /// Store a private key the way GenKey or PrivWrite would.
    pub(crate) fn set_key(&mut self, slot: usize, key: SigningKey) {
        self.keys[slot] = Some(key);
    }

    pub(crate) fn public_key(&self, slot: usize) -> Option<[u8; 64]> {
        self.keys[slot].as_ref().map(raw_public_key)
    }

    /// Public key held in a data slot: 36-byte padded halves on family A,
    /// raw on family B.
    fn stored_public_key(&self, slot: usize) -> [u8; 64] {
        let stored = &self.slots[slot];
        let mut key = [0u8; 64];
        match self.family {
            Family::Ca => {
                key[..32].copy_from_slice(&stored[4..36]);
                key[32..].copy_from_slice(&stored[40..72]);
            }
            Family::Ta => key.copy_from_slice(&stored[..64]),
        }
        key
    }

    pub(crate) fn is_awake(&self) -> bool {
        self.awake
    }

    /// Place bytes in a data slot starting at byte 0.
    pub(crate) fn set_slot(&mut self, slot: usize, data: &[u8]) {
        self.slots[slot][..data.len()].copy_from_slice(data);
    }

    fn next_random(&mut self) -> [u8; 32] {
        self.rng_counter += 1;
        let mut hasher = Sha256::new();
        hasher.update(b"mock rng");
        hasher.update(self.rng_counter.to_be_bytes());
        hasher.finalize().into()
    }

    fn on_write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        match (self.family, bytes) {
            (_, []) => Ok(()),
            // A wake pulse while asleep; the IO reset otherwise.
            (Family::Ca, [0x00]) => {
                if self.pending.is_some() {
                    self.cursor = 0;
                } else {
                    self.awake = true;
                    self.wake_token = true;
                }
                Ok(())
            }
            (Family::Ca, [0x01]) | (Family::Ca, [0x02]) => {
                self.awake = false;
                self.pending = None;
                Ok(())
            }
            (Family::Ca, [0x03, packet @ ..]) if self.awake => {
                let response = self.ca_command(packet);
                self.pending = Some(response).filter(|_| !self.mute);
                self.cursor = 0;
                Ok(())
            }
            (Family::Ta, [0x03, packet @ ..]) => {
                let response = self.ta_command(packet);
                self.pending = Some(response);
                self.cursor = 0;
                Ok(())
            }
            _ => Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
        }
    }

    fn on_read(&mut self, buffer: &mut [u8]) -> Result<(), ErrorKind> {
        if self.unresponsive {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        if self.wake_token {
            self.wake_token = false;
            buffer.copy_from_slice(&[0x04, 0x11, 0x33, 0x43][..buffer.len()]);
            return Ok(());
        }

        let pending = self
            .pending
            .as_ref()
            .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;
        let end = self.cursor + buffer.len();
        if end > pending.len() {
            return Err(ErrorKind::Overrun);
        }
        buffer.copy_from_slice(&pending[self.cursor..end]);
        self.cursor = end;
        if self.family == Family::Ta && self.cursor == pending.len() {
            self.pending = None;
        }
        Ok(())
    }

    fn ca_command(&mut self, packet: &[u8]) -> Vec<u8> {
        let length = packet[0] as usize;
        if length < 7 || length > packet.len() {
            return ca_frame(&[STATUS_PARSE]);
        }
        let (body, crc) = packet[..length].split_at(length - 2);
        if CRC16.checksum(body).to_le_bytes() != [crc[0], crc[1]] {
            return ca_frame(&[STATUS_CRC]);
        }

        let opcode = body[1];
        let mode = body[2];
        let param2 = u16::from_le_bytes([body[3], body[4]]);
        let data = &body[5..];
        self.commands.push(opcode);

        let result = match opcode {
            0x30 => Ok(REVISION.to_vec()),
            0x1B => Ok(self.next_random().to_vec()),
            0x02 => self.ca_read(mode, param2),
            0x12 => self.ca_write(mode, param2, data),
            0x16 => {
                match mode {
                    0x43 => self.message_digest.copy_from_slice(&data[..32]),
                    0x03 => self.temp_key.copy_from_slice(&data[..32]),
                    _ => return ca_frame(&[STATUS_PARSE]),
                }
                Ok(std::vec![STATUS_OK])
            }
            0x40 => self.genkey(mode == 0x04, param2 as usize),
            0x41 => self.sign(param2 as usize),
            0x45 => match mode {
                0x22 => self.verify(&data[..64], &data[64..128]),
                0x20 => {
                    let key = self.stored_public_key(param2 as usize);
                    self.verify(&data[..64], &key)
                }
                _ => Err(STATUS_PARSE),
            },
            0x24 => self.counter(mode, param2 as usize),
            0x47 => self.sha(mode, data),
            0x17 => {
                self.lock(mode);
                Ok(std::vec![STATUS_OK])
            }
            0x51 => Ok(data.iter().map(|b| b ^ 0x5A).collect()),
            0x43 => Ok(Sha256::digest(data).to_vec()),
            0x46 => {
                match SigningKey::from_slice(&data[4..36]) {
                    Ok(key) => self.keys[param2 as usize] = Some(key),
                    Err(_) => return ca_frame(&[STATUS_EXECUTION]),
                }
                Ok(std::vec![STATUS_OK])
            }
            0x1C | 0x77 => Ok(std::vec![STATUS_OK]),
            _ => Err(STATUS_PARSE),
        };

        match result {
            Ok(data) => ca_frame(&data),
            Err(status) => ca_frame(&[status]),
        }
    }

    fn ca_location(&self, mode: u8, address: u16) -> Option<(u8, usize, usize)> {
        let zone = mode & 0x03;
        let size = if mode & 0x80 != 0 { 32 } else { 4 };
        let offset = (address & 0x07) as usize * 4;
        match zone {
            0x00 | 0x01 => Some((zone, ((address >> 3) & 0x1F) as usize * 32 + offset, size)),
            0x02 => {
                let slot = ((address >> 3) & 0x0F) as usize;
                let block = (address >> 8) as usize;
                Some((slot as u8 | 0x80, block * 32 + offset, size))
            }
            _ => None,
        }
    }

    fn storage(&mut self, location: u8) -> &mut [u8] {
        match location {
            0x00 => &mut self.config,
            loc if loc & 0x80 != 0 => &mut self.slots[(loc & 0x0F) as usize],
            // OTP is not modelled.
            _ => &mut [],
        }
    }

    fn ca_read(&mut self, mode: u8, address: u16) -> Result<Vec<u8>, u8> {
        let (location, start, size) = self.ca_location(mode, address).ok_or(STATUS_PARSE)?;
        let storage = self.storage(location);
        storage
            .get(start..start + size)
            .map(|bytes| bytes.to_vec())
            .ok_or(STATUS_PARSE)
    }

    fn ca_write(&mut self, mode: u8, address: u16, data: &[u8]) -> Result<Vec<u8>, u8> {
        let (location, start, size) = self.ca_location(mode, address).ok_or(STATUS_PARSE)?;
        let storage = self.storage(location);
        let target = storage.get_mut(start..start + size).ok_or(STATUS_PARSE)?;
        target.copy_from_slice(&data[..size]);
        Ok(std::vec![STATUS_OK])
    }

    fn genkey(&mut self, create: bool, slot: usize) -> Result<Vec<u8>, u8> {
        if create {
            let seed = self.next_random();
            let key = SigningKey::from_slice(&seed).map_err(|_| STATUS_EXECUTION)?;
            self.keys[slot] = Some(key);
        }
        self.public_key(slot)
            .map(|key| key.to_vec())
            .ok_or(STATUS_EXECUTION)
    }

    fn sign(&mut self, slot: usize) -> Result<Vec<u8>, u8> {
        let key = self.keys[slot].as_ref().ok_or(STATUS_EXECUTION)?;
        let signature: Signature = key
            .sign_prehash(&self.message_digest)
            .map_err(|_| STATUS_EXECUTION)?;
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(&self, signature: &[u8], public_key: &[u8]) -> Result<Vec<u8>, u8> {
        let mut sec1 = std::vec![0x04];
        sec1.extend_from_slice(public_key);
        // The device refuses keys that are not points on the curve.
        let key = VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| STATUS_EXECUTION)?;
        let signature = match Signature::from_slice(signature) {
            Ok(signature) => signature,
            Err(_) => return Err(STATUS_VERIFY_FAILED),
        };
        key.verify_prehash(&self.message_digest, &signature)
            .map(|()| std::vec![STATUS_OK])
            .map_err(|_| STATUS_VERIFY_FAILED)
    }

    fn counter(&mut self, mode: u8, id: usize) -> Result<Vec<u8>, u8> {
        let counter = self.counters.get_mut(id).ok_or(STATUS_PARSE)?;
        if mode == 0x01 {
            *counter += 1;
        }
        Ok(counter.to_le_bytes().to_vec())
    }

    fn sha(&mut self, mode: u8, data: &[u8]) -> Result<Vec<u8>, u8> {
        match mode {
            0x00 => {
                self.sha = Some(Sha256::new());
                Ok(std::vec![STATUS_OK])
            }
            0x01 => {
                self.sha.as_mut().ok_or(STATUS_EXECUTION)?.update(data);
                Ok(std::vec![STATUS_OK])
            }
            0x02 => {
                let mut sha = self.sha.take().ok_or(STATUS_EXECUTION)?;
                sha.update(data);
                Ok(sha.finalize().to_vec())
            }
            _ => Err(STATUS_PARSE),
        }
    }

    fn lock(&mut self, mode: u8) {
        match mode & 0x03 {
            0x00 => self.config[87] = 0x00,
            0x01 => self.config[86] = 0x00,
            _ => {
                let slot = (mode >> 2) & 0x0F;
                let bits = u16::from_le_bytes([self.config[88], self.config[89]]) & !(1 << slot);
                self.config[88..90].copy_from_slice(&bits.to_le_bytes());
            }
        }
    }

    fn ta_command(&mut self, packet: &[u8]) -> Vec<u8> {
        let length = u16::from_be_bytes([packet[0], packet[1]]) as usize;
        if length < 8 || length > packet.len() {
            return ta_frame(STATUS_PARSE, &[]);
        }
        let (body, crc) = packet[..length].split_at(length - 2);
        if CRC16.checksum(body).to_be_bytes() != [crc[0], crc[1]] {
            return ta_frame(STATUS_CRC, &[]);
        }

        let opcode = body[2];
        let mode = body[3];
        let handle = u16::from_be_bytes([body[4], body[5]]);
        let slot = (handle & 0x0F) as usize;
        let data = &body[6..];
        self.commands.push(opcode);

        let result = match opcode {
            0x01 => Ok(data.iter().map(|b| b ^ 0x5A).collect()),
            0x02 => Ok(Sha256::digest(data).to_vec()),
            0x03 => match mode {
                0x00 => Ok(REVISION.to_vec()),
                0x01 => {
                    let index = if handle == 0 { 87 } else { 86 };
                    Ok(std::vec![(self.config[index] != 0x55) as u8])
                }
                0x02 => {
                    let bits = u16::from_le_bytes([self.config[88], self.config[89]]);
                    Ok(std::vec![(bits & (1 << slot) == 0) as u8])
                }
                0x03 => Ok(SERIAL.to_vec()),
                _ => Err(STATUS_PARSE),
            },
            0x04 => self.genkey(mode == 0x00, slot),
            0x05 => {
                match mode {
                    0x03 => self.lock(((slot as u8) << 2) | 0x02),
                    0x02 => self.lock(0x01),
                    _ => self.lock(0x00),
                }
                Ok(Vec::new())
            }
            0x06 => Ok(self.next_random().to_vec()),
            0x07 => {
                let offset = u16::from_be_bytes([data[0], data[1]]) as usize;
                let count = u16::from_be_bytes([data[2], data[3]]) as usize;
                let storage = self.ta_storage(mode, slot);
                storage
                    .get(offset..offset + count)
                    .map(|bytes| bytes.to_vec())
                    .ok_or(STATUS_PARSE)
            }
            0x08 => self.sha(mode, data).map(|out| if mode == 0x02 { out } else { Vec::new() }),
            0x09 => {
                self.message_digest.copy_from_slice(&data[..32]);
                self.sign(slot)
            }
            0x0A => {
                self.message_digest.copy_from_slice(&data[..32]);
                match mode {
                    0x00 => self.verify(&data[32..96], &data[96..160]),
                    _ => {
                        let key = self.stored_public_key(slot);
                        self.verify(&data[32..96], &key)
                    }
                }
                .map(|_| Vec::new())
            }
            0x0B => {
                let offset = u16::from_be_bytes([data[0], data[1]]) as usize;
                let bytes = &data[2..];
                let storage = self.ta_storage(mode, slot);
                match storage.get_mut(offset..offset + bytes.len()) {
                    Some(target) => {
                        target.copy_from_slice(bytes);
                        Ok(Vec::new())
                    }
                    None => Err(STATUS_PARSE),
                }
            }
            _ => Err(STATUS_PARSE),
        };

        match result {
            Ok(data) => ta_frame(STATUS_OK, &data),
            Err(status) => ta_frame(status, &[]),
        }
    }

    fn ta_storage(&mut self, zone: u8, slot: usize) -> &mut [u8] {
        match zone {
            0x02 => &mut self.slots[slot],
            _ => &mut self.config,
        }
    }
}

fn raw_public_key(key: &SigningKey) -> [u8; 64] {
    let point = key.verifying_key().to_encoded_point(false);
    let mut raw = [0u8; 64];
    raw.copy_from_slice(&point.as_bytes()[1..]);
    raw
}

fn ca_frame(data: &[u8]) -> Vec<u8> {
    let mut frame = std::vec![(data.len() + 3) as u8];
    frame.extend_from_slice(data);
    let crc = CRC16.checksum(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

fn ta_frame(status: u8, data: &[u8]) -> Vec<u8> {
    let length = (data.len() + 5) as u16;
    let mut frame = length.to_be_bytes().to_vec();
    frame.push(status);
    frame.extend_from_slice(data);
    let crc = CRC16.checksum(&frame);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame
}

impl ErrorType for MockDevice {
    type Error = ErrorKind;
}

impl i2c::I2c for MockDevice {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.on_write(bytes)?,
                Operation::Read(buffer) => self.on_read(buffer)?,
            }
        }
        Ok(())
    }
}
