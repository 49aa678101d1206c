//! The seam between the HAL and the physical bus driver.
//!
//! A bus driver (QSPI, SPI, a simulator...) implements [Bus] and [BusDevice]. All offsets
//! passed to a [BusDevice] are host bus offsets, as produced by [crate::pal].

use crate::{error::HalResult, regs::RpuPsStatus};

/// Direction of a DMA transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaDirection {
    /// Host to RPU.
    ToDevice,
    /// RPU to host.
    FromDevice,
    Bidirectional,
}

/// Per device parameters handed to the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusDevConfig {
    /// Bus offset of the start of packet RAM.
    pub addr_pktram_base: u32,
}

/// A bus, to which RPU devices can be attached.
pub trait Bus: Sized {
    /// Bus specific configuration, such as pins and clock rates.
    type Config;
    type Device: BusDevice;

    fn init(config: &Self::Config) -> HalResult<Self>;
    fn deinit(&mut self) {}
    /// Attach a device.
    ///
    /// The driver is responsible for routing the device's interrupt to
    /// [HalPriv::irq_handler](crate::HalPriv::irq_handler).
    fn dev_add(&mut self, dev_config: &BusDevConfig) -> HalResult<Self::Device>;
    fn dev_rem(&mut self, device: Self::Device) {
        let _ = device;
    }
}

/// One RPU attached to a [Bus].
pub trait BusDevice {
    fn dev_init(&mut self) -> HalResult<()>;
    fn dev_deinit(&mut self) {}

    fn read_word(&mut self, offset: u32) -> u32;
    fn write_word(&mut self, offset: u32, value: u32);
    fn read_block(&mut self, dst: &mut [u8], offset: u32);
    fn write_block(&mut self, offset: u32, src: &[u8]);

    /// Make a host buffer visible to the RPU and return the address the RPU sees.
    fn dma_map(&mut self, virt_addr: u32, len: usize, dir: DmaDirection) -> Option<u32>;
    /// Undo [BusDevice::dma_map] and return the host address again.
    fn dma_unmap(&mut self, phy_addr: u32, len: usize, dir: DmaDirection) -> Option<u32>;

    /// Let the RPU go to sleep.
    fn rpu_ps_sleep(&mut self) {}
    /// Signal the RPU to wake up.
    fn rpu_ps_wake(&mut self) {}
    /// Raw power status, laid out as [RpuPsStatus].
    ///
    /// Buses without power management always report the RPU as ready.
    fn rpu_ps_status(&mut self) -> u32 {
        RpuPsStatus::new()
            .with_awake(true)
            .with_ready(true)
            .into_bits()
    }
}
