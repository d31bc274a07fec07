//! Interface configuration describing one physical secure element endpoint.

/// Physical protocol used to reach the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IfaceType {
    /// Two-wire bus addressed protocol
    I2c,
    /// Synchronous single-wire protocol
    Swi,
    /// Byte stream protocol
    Uart,
    /// Host interface device protocol
    Hid,
}

/// The two command protocol generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    /// ATSHA/ATECC devices: wake/idle/sleep power management, 8-bit framing.
    Ca,
    /// TA100: no power handshake, 16-bit framing, handle addressing.
    Ta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceType {
    Atsha204a,
    Atsha206a,
    Atecc108a,
    Atecc508a,
    Atecc608a,
    Ta100,
    Unknown,
}

impl DeviceType {
    pub fn family(&self) -> Option<Family> {
        match self {
            Self::Atsha204a
            | Self::Atsha206a
            | Self::Atecc108a
            | Self::Atecc508a
            | Self::Atecc608a => Some(Family::Ca),
            Self::Ta100 => Some(Family::Ta),
            Self::Unknown => None,
        }
    }

    /// Whether the model carries the ECC-P256 command set.
    pub fn is_ecc(&self) -> bool {
        matches!(
            self,
            Self::Atecc108a | Self::Atecc508a | Self::Atecc608a | Self::Ta100
        )
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Timing knobs of the transport. Values mirror what board support packages
/// ship for these parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Settle time after the wake pulse, in microseconds.
    pub wake_delay_us: u32,
    /// How many times a NACKed transfer is retried.
    pub rx_retries: u8,
    /// Wait before the first response poll, in milliseconds.
    pub poll_init_ms: u32,
    /// Wait between response polls, in milliseconds.
    pub poll_interval_ms: u32,
    /// Give up polling after this long, in milliseconds.
    pub poll_max_ms: u32,
}

impl Timing {
    pub const DEFAULT: Self = Self {
        wake_delay_us: 1500,
        rx_retries: 20,
        poll_init_ms: 1,
        poll_interval_ms: 2,
        poll_max_ms: 2500,
    };
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Immutable description of an endpoint. Bound to a `Device` by `open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceConfig {
    pub iface_type: IfaceType,
    pub device_type: DeviceType,
    /// Bus address in its 8-bit (shifted) form, e.g. 0xC0.
    pub address: u8,
    pub bus: u8,
    pub baud: u32,
    pub timing: Timing,
}

impl InterfaceConfig {
    pub const fn i2c(device_type: DeviceType, address: u8) -> Self {
        Self {
            iface_type: IfaceType::I2c,
            device_type,
            address,
            bus: 0,
            baud: 400,
            timing: Timing::DEFAULT,
        }
    }

    pub const fn atecc608a() -> Self {
        Self::i2c(DeviceType::Atecc608a, 0xC0)
    }

    pub const fn ta100() -> Self {
        Self::i2c(DeviceType::Ta100, 0x2E).with_baud(100_000)
    }

    pub const fn with_iface_type(mut self, iface_type: IfaceType) -> Self {
        self.iface_type = iface_type;
        self
    }

    pub const fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    pub const fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    pub const fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub const fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// 7-bit address as used by `embedded_hal::i2c`.
    pub(crate) fn bus_address(&self) -> u8 {
        self.address >> 1
    }

    /// Structural checks performed before a session is bound.
    pub(crate) fn is_well_formed(&self) -> bool {
        self.address != 0
            && self.baud != 0
            && self.timing.poll_interval_ms != 0
            && self.timing.poll_max_ms >= self.timing.poll_init_ms
    }
}
