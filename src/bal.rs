//! Bus abstraction layer.
//!
//! This is a thin dispatcher over the [Bus] implementation, which the HAL was instantiated with.

use crate::{
    bus::{Bus, BusDevConfig, BusDevice, DmaDirection},
    error::{HalError, HalResult},
};

/// Parameters of the BAL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalConfig {
    /// Bus offset of the start of packet RAM.
    pub addr_pktram_base: u32,
}

/// The BAL instance, owning the bus.
pub struct BalPriv<B: Bus> {
    bus: B,
    config: BalConfig,
}
impl<B: Bus> BalPriv<B> {
    pub fn init(bus_config: &B::Config, config: BalConfig) -> HalResult<Self> {
        let bus = B::init(bus_config).inspect_err(|_| error!("Bus initialization failed."))?;
        Ok(Self { bus, config })
    }
    pub fn deinit(mut self) {
        self.bus.deinit();
    }
    /// Attach a new device to the bus.
    pub fn dev_add(&mut self) -> HalResult<BalDevCtx<B::Device>> {
        let dev = self
            .bus
            .dev_add(&BusDevConfig {
                addr_pktram_base: self.config.addr_pktram_base,
            })
            .inspect_err(|_| error!("Adding the device to the bus failed."))?;
        Ok(BalDevCtx { dev })
    }
    pub fn dev_rem(&mut self, dev_ctx: BalDevCtx<B::Device>) {
        self.bus.dev_rem(dev_ctx.dev);
    }
}

/// A device as seen by the BAL.
pub struct BalDevCtx<D> {
    dev: D,
}
impl<D: BusDevice> BalDevCtx<D> {
    pub fn dev_init(&mut self) -> HalResult<()> {
        self.dev.dev_init().map_err(|_| {
            error!("Bus device initialization failed.");
            HalError::BusInitFailed
        })
    }
    pub fn dev_deinit(&mut self) {
        self.dev.dev_deinit();
    }
    pub fn read_word(&mut self, offset: u32) -> u32 {
        let value = self.dev.read_word(offset);
        trace!("BAL: read word {:x} from {:x}", value, offset);
        value
    }
    pub fn write_word(&mut self, offset: u32, value: u32) {
        trace!("BAL: write word {:x} to {:x}", value, offset);
        self.dev.write_word(offset, value);
    }
    pub fn read_block(&mut self, dst: &mut [u8], offset: u32) {
        trace!("BAL: read {} bytes from {:x}", dst.len(), offset);
        self.dev.read_block(dst, offset);
    }
    pub fn write_block(&mut self, offset: u32, src: &[u8]) {
        trace!("BAL: write {} bytes to {:x}", src.len(), offset);
        self.dev.write_block(offset, src);
    }
    pub fn dma_map(&mut self, virt_addr: u32, len: usize, dir: DmaDirection) -> HalResult<u32> {
        self.dev.dma_map(virt_addr, len, dir).ok_or_else(|| {
            error!("DMA mapping of {:x} failed.", virt_addr);
            HalError::DmaMapFailed
        })
    }
    pub fn dma_unmap(&mut self, phy_addr: u32, len: usize, dir: DmaDirection) -> HalResult<u32> {
        self.dev.dma_unmap(phy_addr, len, dir).ok_or_else(|| {
            error!("DMA unmapping of {:x} failed.", phy_addr);
            HalError::DmaMapFailed
        })
    }
    pub fn rpu_ps_sleep(&mut self) {
        self.dev.rpu_ps_sleep();
    }
    pub fn rpu_ps_wake(&mut self) {
        self.dev.rpu_ps_wake();
    }
    pub fn rpu_ps_status(&mut self) -> u32 {
        self.dev.rpu_ps_status()
    }
}
