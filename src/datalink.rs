use crate::config::{InterfaceConfig, Timing};
use crate::error::{Error, ErrorKind};
use core::slice::from_ref;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

const WAKE_RESPONSE_EXPECTED: &[u8] = &[0x04, 0x11, 0x33, 0x43];
const WAKE_SELFTEST_FAILED: &[u8] = &[0x04, 0x07, 0xC4, 0x40];

// Devices such as ATECCx08A require a word address value prepended to every
// frame. Both families share the values below.
/// So-called "word address".
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Transaction {
    Reset = 0x00,
    Sleep = 0x01,
    Idle = 0x02,
    Command = 0x03,
}

/// Shape of a response frame header. Family A uses a single length byte,
/// family B a big-endian 16-bit length.
#[derive(Clone, Copy, Debug)]
pub(crate) enum LengthField {
    U8,
    U16,
}

impl LengthField {
    fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
        }
    }

    fn decode(&self, header: &[u8]) -> usize {
        match self {
            Self::U8 => header[0] as usize,
            Self::U16 => u16::from_be_bytes([header[0], header[1]]) as usize,
        }
    }
}

/// Physical bus shared by both command families. Owns the caller supplied
/// I2C peripheral and delay provider across sessions.
pub(crate) struct Bus<PHY, D> {
    phy: PHY,
    delay: D,
    address: u8,
    timing: Timing,
}

impl<PHY, D> Bus<PHY, D> {
    pub(crate) fn new(phy: PHY, delay: D) -> Self {
        Self {
            phy,
            delay,
            address: 0,
            timing: Timing::DEFAULT,
        }
    }

    /// Take on the addressing and timing of a newly bound endpoint.
    pub(crate) fn configure(&mut self, config: &InterfaceConfig) {
        self.address = config.bus_address();
        self.timing = config.timing;
    }

    pub(crate) fn release(self) -> (PHY, D) {
        (self.phy, self.delay)
    }
}

impl<PHY, D> Bus<PHY, D>
where
    PHY: I2c,
    D: DelayNs,
{
    pub(crate) fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let retries = self.timing.rx_retries;
        let mut count = 0;
        loop {
            match self.phy.write(self.address, bytes) {
                Ok(()) => return Ok(()),
                Err(_) if count < retries => {
                    trace!("write nacked, retry {}", count);
                    count += 1;
                }
                Err(_) => return Err(ErrorKind::TxFail.into()),
            }
        }
    }

    fn write_word_address(&mut self, word_address: Transaction) -> Result<(), Error> {
        self.send(from_ref(&(word_address as u8)))
    }

    /// Reads one complete response frame into `buffer`, polling until the
    /// device answers or the configured window closes.
    pub(crate) fn receive<'a>(
        &mut self,
        buffer: &'a mut [u8],
        length_field: LengthField,
        first_wait_ms: Option<u32>,
    ) -> Result<&'a mut [u8], Error> {
        let Timing {
            poll_init_ms,
            poll_interval_ms,
            poll_max_ms,
            ..
        } = self.timing;

        // Without a known execution time, wait the configured initial delay.
        let first_wait_ms = first_wait_ms.unwrap_or(poll_init_ms);
        self.delay.delay_ms(first_wait_ms);
        let mut elapsed = first_wait_ms;
        let length = loop {
            match self.try_receive(buffer, length_field) {
                Ok(length) => break length,
                Err(e) if elapsed < poll_max_ms => {
                    trace!("response not ready: {:?}", e);
                    self.delay.delay_ms(poll_interval_ms);
                    elapsed += poll_interval_ms;
                }
                Err(e) => {
                    warn!("response polling gave up after {} ms", elapsed);
                    return Err(match e.kind() {
                        ErrorKind::RxFail => ErrorKind::Timeout.into(),
                        _ => e,
                    });
                }
            }
        };
        Ok(buffer[..length].as_mut())
    }

    fn try_receive(&mut self, buffer: &mut [u8], length_field: LengthField) -> Result<usize, Error> {
        let header = length_field.size();
        // Family A devices report a count of one byte when they have nothing
        // but a single status to tell.
        let min_resp_size = 4;

        // Reset indicates the beginning of a family A transaction.
        if let LengthField::U8 = length_field {
            self.reset_io()?;
        }

        self.phy
            .read(self.address, &mut buffer[0..header])
            .map_err(|_| Error::from(ErrorKind::RxFail))?;

        let length_to_read = match length_field.decode(buffer) {
            length if length == 1 && header == 1 => return Ok(1),
            // Buffer cannot contain the response to come. Abort.
            length if buffer.len() < length => return Err(ErrorKind::CommFail.into()),
            // The coming response is malformed. Abort.
            length if length < min_resp_size => return Err(ErrorKind::CommFail.into()),
            length => length,
        };

        self.phy
            .read(self.address, buffer[header..length_to_read].as_mut())
            .map(|()| length_to_read)
            .map_err(|_| ErrorKind::RxFail.into())
    }

    /// Family A wake pulse followed by a check of the wake token.
    pub(crate) fn wake(&mut self) -> Result<(), Error> {
        // Send a single null byte. Ignore errors as this will error if the
        // device is not awake yet.
        self.phy.write(self.address, from_ref(&0x00)).ok();

        // Wait for the device to wake up.
        self.delay.delay_us(self.timing.wake_delay_us);

        let buffer = &mut [0x00, 0x00, 0x00, 0x00];
        let retries = self.timing.rx_retries;
        let mut count = 0;
        loop {
            let result = self.phy.read(self.address, buffer.as_mut());
            if result.is_ok() {
                break;
            } else if count >= retries {
                return Err(ErrorKind::TooManyCommRetries.into());
            }
            count += 1;
        }

        match buffer.as_ref() {
            WAKE_RESPONSE_EXPECTED => Ok(()),
            WAKE_SELFTEST_FAILED => {
                error!("device reports self test failure on wake");
                Err(ErrorKind::WakeFailed.into())
            }
            _ => Err(ErrorKind::WakeFailed.into()),
        }
    }

    /// Reset the read pointer of a family A device before reading a response.
    pub(crate) fn reset_io(&mut self) -> Result<(), Error> {
        self.write_word_address(Transaction::Reset)
    }

    pub(crate) fn idle(&mut self) -> Result<(), Error> {
        self.write_word_address(Transaction::Idle)
    }

    pub(crate) fn sleep(&mut self) -> Result<(), Error> {
        // Wait for the I2C bus to be ready.
        self.delay.delay_us(30);
        self.write_word_address(Transaction::Sleep)
    }
}
