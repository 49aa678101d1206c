//! Translation of RPU addresses into bus offsets.

use crate::{
    error::{HalError, HalResult},
    regs::{
        AddrRange, RPU_ADDR_GRAM_END, RPU_ADDR_GRAM_START, RPU_ADDR_MASK_BASE,
        RPU_ADDR_MASK_OFFSET, RPU_ADDR_PBUS_START, RPU_ADDR_PKTRAM_START, RPU_ADDR_SBUS_START,
    },
};

/// Offset of the system bus window on the host bus.
pub const SOC_MMAP_ADDR_OFFSET_SYSBUS: u32 = 0x000000;
/// Offset of the peripheral bus window on the host bus.
pub const SOC_MMAP_ADDR_OFFSET_PBUS: u32 = 0x040000;
/// Offset of the packed GRAM window on the host bus.
pub const SOC_MMAP_ADDR_OFFSET_GRAM_PKD: u32 = 0x080000;
/// Offset of the host view of the packet RAM.
pub const SOC_MMAP_ADDR_OFFSET_PKTRAM_HOST_VIEW: u32 = 0x0c0000;

/// The regions of the RPU, which are visible on the host bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RpuRegion {
    SysBus,
    PeriphBus,
    Gram,
    PktRam,
}
impl RpuRegion {
    /// Classify an RPU address.
    pub const fn classify(rpu_addr: u32) -> Option<Self> {
        let addr_base = rpu_addr & RPU_ADDR_MASK_BASE;
        if addr_base == RPU_ADDR_SBUS_START {
            Some(Self::SysBus)
        } else if AddrRange::new(RPU_ADDR_GRAM_START, RPU_ADDR_GRAM_END).contains(rpu_addr) {
            Some(Self::Gram)
        } else if addr_base == RPU_ADDR_PBUS_START {
            Some(Self::PeriphBus)
        } else if addr_base == RPU_ADDR_PKTRAM_START {
            Some(Self::PktRam)
        } else {
            None
        }
    }
    /// The offset at which this region starts on the host bus.
    pub const fn base_offset(&self) -> u32 {
        match self {
            Self::SysBus => SOC_MMAP_ADDR_OFFSET_SYSBUS,
            Self::PeriphBus => SOC_MMAP_ADDR_OFFSET_PBUS,
            Self::Gram => SOC_MMAP_ADDR_OFFSET_GRAM_PKD,
            Self::PktRam => SOC_MMAP_ADDR_OFFSET_PKTRAM_HOST_VIEW,
        }
    }
}

/// Get the bus offset of `rpu_addr`.
///
/// This fails for every address, that doesn't lie in one of the [RpuRegion]s.
#[doc(alias = "pal_rpu_addr_offset_get")]
pub fn addr_offset_get(rpu_addr: u32) -> HalResult<u32> {
    let Some(region) = RpuRegion::classify(rpu_addr) else {
        error!("Invalid RPU address: {:x}", rpu_addr);
        return Err(HalError::InvalidAddress);
    };
    Ok(region.base_offset() + (rpu_addr & RPU_ADDR_MASK_OFFSET))
}
