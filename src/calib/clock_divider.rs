use super::command::OpCode;

const EXEC_TIME_AES: [u32; 3] = [27, 27, 27];
const EXEC_TIME_COUNTER: [u32; 3] = [25, 25, 25];
const EXEC_TIME_DERIVE_KEY: [u32; 3] = [50, 50, 50];
const EXEC_TIME_ECDH: [u32; 3] = [75, 172, 531];
const EXEC_TIME_GENKEY: [u32; 3] = [115, 215, 653];
const EXEC_TIME_INFO: [u32; 3] = [5, 5, 5];
const EXEC_TIME_LOCK: [u32; 3] = [35, 35, 35];
const EXEC_TIME_NONCE: [u32; 3] = [20, 20, 20];
const EXEC_TIME_PRIVWRITE: [u32; 3] = [50, 50, 50];
const EXEC_TIME_RANDOM: [u32; 3] = [23, 23, 23];
const EXEC_TIME_READ: [u32; 3] = [5, 5, 5];
const EXEC_TIME_SELFTEST: [u32; 3] = [250, 625, 2324];
const EXEC_TIME_SHA: [u32; 3] = [36, 42, 75];
const EXEC_TIME_SIGN: [u32; 3] = [115, 220, 665];
const EXEC_TIME_VERIFY: [u32; 3] = [105, 295, 1085];
const EXEC_TIME_WRITE: [u32; 3] = [45, 45, 45];

// ChipMode byte in the configuration zone and the bits that select the clock.
pub(crate) const CHIP_MODE_OFFSET: usize = 19;
const CHIP_MODE_CLOCK_DIV_MASK: u8 = 0xF8;
const CHIP_MODE_CLOCK_DIV_M1: u8 = 0x28;
const CHIP_MODE_CLOCK_DIV_M2: u8 = 0x68;

/// ChipMode clock divider {M0, M1, M2}
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ClockDivider {
    #[default]
    Zero = 0,
    One = 1,
    Two = 2,
}

impl ClockDivider {
    /// Decode the ChipMode byte of an ATECC608A.
    pub(crate) fn from_chip_mode(chip_mode: u8) -> Self {
        match chip_mode & CHIP_MODE_CLOCK_DIV_MASK {
            CHIP_MODE_CLOCK_DIV_M1 => Self::One,
            CHIP_MODE_CLOCK_DIV_M2 => Self::Two,
            _ => Self::Zero,
        }
    }

    /// Get the typical execution time for the given command.
    pub(crate) fn execution_time(&self, opcode: &OpCode) -> u32 {
        use OpCode::*;
        let index = *self as usize;
        match opcode {
            Aes => EXEC_TIME_AES[index],
            Counter => EXEC_TIME_COUNTER[index],
            DeriveKey => EXEC_TIME_DERIVE_KEY[index],
            Ecdh => EXEC_TIME_ECDH[index],
            GenKey => EXEC_TIME_GENKEY[index],
            Info => EXEC_TIME_INFO[index],
            Lock => EXEC_TIME_LOCK[index],
            Nonce => EXEC_TIME_NONCE[index],
            PrivWrite => EXEC_TIME_PRIVWRITE[index],
            Random => EXEC_TIME_RANDOM[index],
            Read => EXEC_TIME_READ[index],
            SelfTest => EXEC_TIME_SELFTEST[index],
            Sha => EXEC_TIME_SHA[index],
            Sign => EXEC_TIME_SIGN[index],
            Verify => EXEC_TIME_VERIFY[index],
            Write => EXEC_TIME_WRITE[index],
        }
    }
}
