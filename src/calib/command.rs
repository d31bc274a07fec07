// Command definitions
// Overall structure is modeled after https://github.com/tokio-rs/mini-redis/blob/master/src/cmd/mod.rs
use super::packet::{Packet, PacketBuilder};
use crate::error::{Error, ErrorKind};
use crate::memory::{Size, Slot, Zone};
use crate::types::{Block, Digest, PublicKey, Signature};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OpCode {
    /// Counter command op-code
    Counter = 0x24,
    /// DeriveKey command op-code
    DeriveKey = 0x1C,
    /// ECDH command op-code
    Ecdh = 0x43,
    /// GenKey command op-code
    GenKey = 0x40,
    /// Info command op-code
    Info = 0x30,
    /// Lock command op-code
    Lock = 0x17,
    /// Nonce command op-code
    Nonce = 0x16,
    /// PrivWrite command op-code
    PrivWrite = 0x46,
    /// Random command op-code
    Random = 0x1B,
    /// Read command op-code
    Read = 0x02,
    /// Self test command op-code
    SelfTest = 0x77,
    /// Sign command op-code
    Sign = 0x41,
    /// SHA command op-code
    Sha = 0x47,
    /// AES command op-code
    Aes = 0x51,
    /// Verify command op-code
    Verify = 0x45,
    /// Write command op-code
    Write = 0x12,
}

pub(crate) struct Aes<'a>(PacketBuilder<'a>);
pub(crate) struct Counter<'a>(PacketBuilder<'a>);
pub(crate) struct DeriveKey<'a>(PacketBuilder<'a>);
pub(crate) struct Ecdh<'a>(PacketBuilder<'a>);
pub(crate) struct GenKey<'a>(PacketBuilder<'a>);
pub(crate) struct Info<'a>(PacketBuilder<'a>);
pub(crate) struct Lock<'a>(PacketBuilder<'a>);
pub(crate) struct NonceCtx<'a>(PacketBuilder<'a>);
// For best security, it is recommended that the `PrivWrite` command not be
// used, and that private keys be internally generated from the RNG using the
// `GenKey` command.
pub(crate) struct PrivWrite<'a>(PacketBuilder<'a>);
pub(crate) struct Random<'a>(PacketBuilder<'a>);
pub(crate) struct Read<'a>(PacketBuilder<'a>);
pub(crate) struct SelfTest<'a>(PacketBuilder<'a>);
pub(crate) struct Sha<'a>(PacketBuilder<'a>);
pub(crate) struct Sign<'a>(PacketBuilder<'a>);
pub(crate) struct Verify<'a>(PacketBuilder<'a>);
pub(crate) struct Write<'a>(PacketBuilder<'a>);

/// AES
impl<'a> Aes<'a> {
    pub(crate) const DATA_SIZE: usize = 0x10;
    /// AES mode: Encrypt
    const MODE_ENCRYPT: u8 = 0x00;
    /// AES mode: Decrypt
    const MODE_DECRYPT: u8 = 0x01;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn encrypt(&mut self, slot: Slot, plaintext: &[u8]) -> Result<Packet, Error> {
        self.block(Self::MODE_ENCRYPT, slot, plaintext)
    }

    pub(crate) fn decrypt(&mut self, slot: Slot, ciphertext: &[u8]) -> Result<Packet, Error> {
        self.block(Self::MODE_DECRYPT, slot, ciphertext)
    }

    fn block(&mut self, mode: u8, slot: Slot, data: &[u8]) -> Result<Packet, Error> {
        // Input length should be exactly 16 bytes. Otherwise the device
        // couldn't recognize the command properly.
        if data.len() != Self::DATA_SIZE {
            return Err(ErrorKind::InvalidSize.into());
        }

        self.0
            .opcode(OpCode::Aes)
            .mode(mode)
            .param2(slot as u16)
            .pdu_data(data)
            .build()
    }
}

/// Counter
impl<'a> Counter<'a> {
    const MODE_READ: u8 = 0x00;
    const MODE_INCREMENT: u8 = 0x01;
    /// Devices carry two monotonic counters.
    pub(crate) const COUNTERS: u16 = 2;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn read(&mut self, counter_id: u16) -> Result<Packet, Error> {
        self.counter(Self::MODE_READ, counter_id)
    }

    pub(crate) fn increment(&mut self, counter_id: u16) -> Result<Packet, Error> {
        self.counter(Self::MODE_INCREMENT, counter_id)
    }

    fn counter(&mut self, mode: u8, counter_id: u16) -> Result<Packet, Error> {
        if counter_id >= Self::COUNTERS {
            return Err(ErrorKind::BadParam.into());
        }

        self.0
            .opcode(OpCode::Counter)
            .mode(mode)
            .param2(counter_id)
            .build()
    }
}

/// DeriveKey
impl<'a> DeriveKey<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    /// An authorizing MAC is only required when the target slot asks for one.
    pub(crate) fn derive(
        &mut self,
        mode: u8,
        target: Slot,
        mac: Option<&Digest>,
    ) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::DeriveKey)
            .mode(mode)
            .param2(target as u16);
        if let Some(mac) = mac {
            self.0.pdu_data(mac);
        }
        self.0.build()
    }
}

/// ECDH
impl<'a> Ecdh<'a> {
    // Shared secret is returned in the clear.
    const MODE_COMPATIBLE: u8 = 0x00;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn diffie_hellman(
        &mut self,
        private_key_id: Slot,
        public_key: &PublicKey,
    ) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Ecdh)
            .mode(Self::MODE_COMPATIBLE)
            .param2(private_key_id as u16)
            .pdu_data(public_key)
            .build()
    }
}

/// GenKey
impl<'a> GenKey<'a> {
    // Config zone should be locked, otherwise GenKey always fails regardless of
    // a mode parameter.
    const MODE_PRIVATE: u8 = 0x04; // Private key generation
    const MODE_PUBLIC: u8 = 0x00; // Public key calculation

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn private_key(&mut self, key_id: Slot) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::GenKey)
            .mode(Self::MODE_PRIVATE)
            .param2(key_id as u16)
            .build()
    }

    pub(crate) fn public_key(&mut self, key_id: Slot) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::GenKey)
            .mode(Self::MODE_PUBLIC)
            .param2(key_id as u16)
            .build()
    }
}

impl<'a> Info<'a> {
    // Info mode Revision
    const MODE_REVISION: u8 = 0x00;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    /// Command execution will return a word containing the revision.
    pub(crate) fn revision(&mut self) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Info)
            .mode(Self::MODE_REVISION)
            .build()
    }
}

impl<'a> Lock<'a> {
    const LOCK_ZONE_NO_CRC: u8 = 0x80;
    const LOCK_ZONE_CONFIG: u8 = 0x00;
    const LOCK_ZONE_DATA: u8 = 0x01;
    const LOCK_ZONE_DATA_SLOT: u8 = 0x02;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn zone(&mut self, zone: Zone, crc: Option<u16>) -> Result<Packet, Error> {
        let zone = match zone {
            Zone::Config => Self::LOCK_ZONE_CONFIG,
            Zone::Data => Self::LOCK_ZONE_DATA,
            Zone::Otp => return Err(ErrorKind::BadParam.into()),
        };

        match crc {
            None => self
                .0
                .opcode(OpCode::Lock)
                .mode(Self::LOCK_ZONE_NO_CRC | zone)
                .build(),
            Some(crc) => self
                .0
                .opcode(OpCode::Lock)
                .mode(zone)
                .param2(crc)
                .build(),
        }
    }

    pub(crate) fn slot(&mut self, key_id: Slot) -> Result<Packet, Error> {
        let mode = (key_id as u8) << 2 | Self::LOCK_ZONE_DATA_SLOT | Self::LOCK_ZONE_NO_CRC;
        self.0.opcode(OpCode::Lock).mode(mode).build()
    }
}

/// Nonce
impl<'a> NonceCtx<'a> {
    const MODE_PASSTHROUGH: u8 = 0x03; // Nonce mode: pass-through
    const MODE_TARGET_MASK: u8 = 0xc0; // Nonce mode: target mask
    const MODE_TARGET_TEMPKEY: u8 = 0x00; // Nonce mode: target is TempKey
    const MODE_TARGET_MSGDIGBUF: u8 = 0x40; // Nonce mode: target is Message Digest Buffer

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn temp_key(&mut self, value: &Digest) -> Result<Packet, Error> {
        let mode = Self::MODE_PASSTHROUGH | (Self::MODE_TARGET_TEMPKEY & Self::MODE_TARGET_MASK);
        self.0
            .opcode(OpCode::Nonce)
            .mode(mode)
            .pdu_data(value)
            .build()
    }

    pub(crate) fn message_digest_buffer(&mut self, msg: &Digest) -> Result<Packet, Error> {
        let mode = Self::MODE_PASSTHROUGH | (Self::MODE_TARGET_MSGDIGBUF & Self::MODE_TARGET_MASK);
        self.0
            .opcode(OpCode::Nonce)
            .mode(mode)
            .pdu_data(msg)
            .build()
    }
}

/// PrivWrite
impl<'a> PrivWrite<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn write_private_key(
        &mut self,
        key_id: Slot,
        private_key: &Block,
    ) -> Result<Packet, Error> {
        // Input is an ECC private key consisting of padding 4 bytes of all 0s
        // and 32 byte integer, followed by a MAC that is ignored while the
        // data zone is unlocked.
        let private_key_range = 4..Size::Block.len() + 4;
        let private_key_length = private_key_range.end;
        let mac_length = private_key_length + Size::Block.len();
        let pdu = self.0.pdu_buffer();
        if pdu.len() < mac_length {
            return Err(ErrorKind::SmallBuffer.into());
        }
        pdu[..mac_length].fill(0x00);
        pdu[private_key_range].copy_from_slice(private_key.as_ref());
        self.0
            .pdu_length(mac_length)
            .opcode(OpCode::PrivWrite)
            .param2(key_id as u16)
            .build()
    }
}

/// Random
impl<'a> Random<'a> {
    const MODE_SEED_UPDATE: u8 = 0x00;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn random(&mut self) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Random)
            .mode(Self::MODE_SEED_UPDATE)
            .build()
    }
}

/// Read
impl<'a> Read<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn read(&mut self, zone: Zone, size: Size, address: u16) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Read)
            .mode(zone.encode(size))
            .param2(address)
            .build()
    }
}

/// SelfTest
impl<'a> SelfTest<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn run(&mut self, mode: u8, param2: u16) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::SelfTest)
            .mode(mode)
            .param2(param2)
            .build()
    }
}

impl<'a> Sha<'a> {
    /// Initialization, does not accept a message
    const MODE_SHA256_START: u8 = 0x00;
    /// Add 64 bytes in the meesage to the SHA context
    const MODE_SHA256_UPDATE: u8 = 0x01;
    /// Complete the calculation and return the digest
    const MODE_SHA256_END: u8 = 0x02;
    pub(crate) const BLOCK_SIZE: usize = 64;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn start(&mut self) -> Result<Packet, Error> {
        self.0
            .opcode(OpCode::Sha)
            .mode(Self::MODE_SHA256_START)
            .build()
    }

    /// Data length should be exactly 64 bytes.
    pub(crate) fn update(&mut self, data: impl AsRef<[u8]>) -> Result<Packet, Error> {
        let length = data.as_ref().len();
        if length != Self::BLOCK_SIZE {
            return Err(ErrorKind::BadParam.into());
        }

        self.0
            .opcode(OpCode::Sha)
            .mode(Self::MODE_SHA256_UPDATE)
            .param2(length as u16)
            .pdu_data(data)
            .build()
    }

    /// Command execution will return a digest of Block size.
    pub(crate) fn end(&mut self, data: impl AsRef<[u8]>) -> Result<Packet, Error> {
        let length = data.as_ref().len();
        if length > Self::BLOCK_SIZE {
            return Err(ErrorKind::BadParam.into());
        }

        self.0
            .opcode(OpCode::Sha)
            .mode(Self::MODE_SHA256_END)
            .param2(length as u16)
            .pdu_data(data)
            .build()
    }
}

/// Sign
impl<'a> Sign<'a> {
    /// Sign mode bit 7: external
    const MODE_EXTERNAL: u8 = 0x80;
    /// Sign mode message source is the Message Digest Buffer
    const MODE_SOURCE_MSGDIGBUF: u8 = 0x20;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    // Sign a 32-byte external message using the private key in the specified
    // slot.
    pub(crate) fn external(&mut self, key_id: Slot) -> Result<Packet, Error> {
        let mode = Self::MODE_EXTERNAL | Self::MODE_SOURCE_MSGDIGBUF;
        self.0
            .opcode(OpCode::Sign)
            .mode(mode)
            .param2(key_id as u16)
            .build()
    }
}

/// Verify
impl<'a> Verify<'a> {
    const MODE_STORED: u8 = 0x00;
    const MODE_EXTERNAL: u8 = 0x02;
    const MODE_SOURCE_MSGDIGBUF: u8 = 0x20;
    const KEY_P256: u16 = 0x0004;

    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    // Verify a 32-byte external message using the provided public key.
    pub(crate) fn external(
        &mut self,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> Result<Packet, Error> {
        let mode = Self::MODE_EXTERNAL | Self::MODE_SOURCE_MSGDIGBUF;
        let length = self.load(signature, Some(public_key))?;
        self.0
            .opcode(OpCode::Verify)
            .mode(mode)
            .param2(Self::KEY_P256)
            .pdu_length(length)
            .build()
    }

    // Verify a 32-byte external message using the public key stored in a slot.
    pub(crate) fn stored(&mut self, signature: &Signature, key_id: Slot) -> Result<Packet, Error> {
        let mode = Self::MODE_STORED | Self::MODE_SOURCE_MSGDIGBUF;
        let length = self.load(signature, None)?;
        self.0
            .opcode(OpCode::Verify)
            .mode(mode)
            .param2(key_id as u16)
            .pdu_length(length)
            .build()
    }

    fn load(&mut self, signature: &Signature, public_key: Option<&PublicKey>) -> Result<usize, Error> {
        let sig_length = signature.as_ref().len();
        let pubkey_length = public_key.map_or(0, |key| key.as_ref().len());
        let pdu_buffer = self.0.pdu_buffer();
        if pdu_buffer.len() < sig_length + pubkey_length {
            return Err(ErrorKind::SmallBuffer.into());
        }

        let (sig_buf, rest) = pdu_buffer.split_at_mut(sig_length);
        sig_buf.copy_from_slice(signature.as_ref());
        if let Some(key) = public_key {
            rest[..pubkey_length].copy_from_slice(key.as_ref());
        }
        Ok(sig_length + pubkey_length)
    }
}

/// Write
impl<'a> Write<'a> {
    pub(crate) fn new(builder: PacketBuilder<'a>) -> Self {
        Self(builder)
    }

    pub(crate) fn write(
        &mut self,
        zone: Zone,
        size: Size,
        address: u16,
        data: impl AsRef<[u8]>,
    ) -> Result<Packet, Error> {
        if size.len() != data.as_ref().len() {
            return Err(ErrorKind::BadParam.into());
        }

        self.0
            .opcode(OpCode::Write)
            .mode(zone.encode(size))
            .param2(address)
            .pdu_data(data)
            .build()
    }
}
