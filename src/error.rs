use core::fmt;

/// Everything that can go wrong between the host and the RPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// The RPU address doesn't fall into a region, that permits the access.
    InvalidAddress,
    /// Core and BEV accesses are word granular.
    Misaligned,
    /// A length, pool, descriptor or queue index was out of range.
    InvalidParam,
    /// An allocation for a message, queue node or context failed.
    NoMemory,
    /// A bounded poll expired.
    Timeout,
    /// A register read returned the all-ones sentinel.
    BusNotReady,
    /// The buffer slot is mapped already.
    AlreadyMapped,
    /// The buffer slot isn't mapped.
    NotMapped,
    /// The bus refused to map or unmap a DMA region.
    DmaMapFailed,
    /// The software event queue is full.
    QueueFull,
    /// An event header announced an impossible length.
    InvalidEvent,
    /// The bus failed to bring up the device.
    BusInitFailed,
    /// The registered callback reported a failure.
    CallbackFailed,
}
impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidAddress => "invalid RPU address",
            Self::Misaligned => "access not word aligned",
            Self::InvalidParam => "invalid parameter",
            Self::NoMemory => "out of memory",
            Self::Timeout => "timed out",
            Self::BusNotReady => "bus not ready",
            Self::AlreadyMapped => "buffer already mapped",
            Self::NotMapped => "buffer not mapped",
            Self::DmaMapFailed => "DMA mapping failed",
            Self::QueueFull => "event queue full",
            Self::InvalidEvent => "malformed event",
            Self::BusInitFailed => "bus initialization failed",
            Self::CallbackFailed => "callback failed",
        })
    }
}

pub type HalResult<T> = Result<T, HalError>;
