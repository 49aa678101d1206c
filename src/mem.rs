//! Register and memory access to the RPU.
//!
//! Every access is validated first, then the RPU is woken up and only then the bus is touched.
//! A rejected access never reaches the bus.

use crate::{
    bal::BalDevCtx,
    bus::BusDevice,
    error::{HalError, HalResult},
    pal,
    ps::PsCtx,
    regs::{
        AddrRange, RpuProc, BEV_INSTR_COUNT, RPU_ADDR_BEV_END, RPU_ADDR_BEV_START,
        RPU_ADDR_GRAM_END, RPU_ADDR_GRAM_START, RPU_ADDR_MASK_BASE, RPU_ADDR_MASK_BEV_OFFSET,
        RPU_ADDR_MASK_OFFSET, RPU_ADDR_PBUS_START, RPU_ADDR_PKTRAM_END, RPU_ADDR_PKTRAM_START,
        RPU_ADDR_SBUS_START, RPU_MCU_CORE_INDIRECT_BASE, RPU_REG_READ_SENTINEL,
    },
};

const GRAM: AddrRange = AddrRange::new(RPU_ADDR_GRAM_START, RPU_ADDR_GRAM_END);
const PKTRAM: AddrRange = AddrRange::new(RPU_ADDR_PKTRAM_START, RPU_ADDR_PKTRAM_END);
const BEV: AddrRange = AddrRange::new(RPU_ADDR_BEV_START, RPU_ADDR_BEV_END);

/// The kind of memory an RPU address refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MemClass {
    /// GRAM or packet RAM, accessed directly.
    Ram,
    /// Core memory of the current MCU, written through its indirect port.
    Core,
    /// The boot exception vector of the current MCU.
    Bev,
}

/// Check whether `addr` is a register, i.e. on the system or peripheral bus.
pub(crate) const fn is_reg(addr: u32) -> bool {
    let addr_base = addr & RPU_ADDR_MASK_BASE;
    addr_base == RPU_ADDR_SBUS_START || addr_base == RPU_ADDR_PBUS_START
}

fn padded_word(chunk: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word[..chunk.len()].copy_from_slice(chunk);
    u32::from_le_bytes(word)
}

/// The state of an RPU, that has to be accessed under the device lock.
pub struct RpuCore<D> {
    pub(crate) bal: BalDevCtx<D>,
    pub(crate) proc: RpuProc,
    pub(crate) ps: PsCtx,
}
impl<D: BusDevice> RpuCore<D> {
    pub(crate) fn new(bal: BalDevCtx<D>, ps: PsCtx) -> Self {
        Self {
            bal,
            proc: RpuProc::default(),
            ps,
        }
    }
    /// Classify `addr` with regard to the current processor context.
    pub(crate) fn mem_class(&self, addr: u32) -> Option<MemClass> {
        if GRAM.contains(addr) || PKTRAM.contains(addr) {
            Some(MemClass::Ram)
        } else if BEV.contains(addr) {
            Some(MemClass::Bev)
        } else if addr & RPU_ADDR_MASK_BASE == RPU_MCU_CORE_INDIRECT_BASE
            || self
                .proc
                .core_regions()
                .iter()
                .any(|region| region.contains(addr))
        {
            Some(MemClass::Core)
        } else {
            None
        }
    }

    /// Read the register at `addr`.
    pub fn reg_read(&mut self, addr: u32) -> HalResult<u32> {
        if !is_reg(addr) {
            error!("Invalid register address {:x}.", addr);
            return Err(HalError::InvalidAddress);
        }
        let offset = pal::addr_offset_get(addr)?;
        self.ps_wake()?;
        let value = self.bal.read_word(offset);
        if value == RPU_REG_READ_SENTINEL {
            error!("Bus not ready, while reading {:x}.", addr);
            return Err(HalError::BusNotReady);
        }
        Ok(value)
    }
    /// Write `value` to the register at `addr`.
    pub fn reg_write(&mut self, addr: u32, value: u32) -> HalResult<()> {
        if !is_reg(addr) {
            error!("Invalid register address {:x}.", addr);
            return Err(HalError::InvalidAddress);
        }
        let offset = pal::addr_offset_get(addr)?;
        self.ps_wake()?;
        self.bal.write_word(offset, value);
        Ok(())
    }
    /// Read GRAM or packet RAM at `addr` into `dst`.
    pub fn mem_read(&mut self, addr: u32, dst: &mut [u8]) -> HalResult<()> {
        if dst.is_empty() {
            error!("Empty memory read from {:x}.", addr);
            return Err(HalError::InvalidParam);
        }
        if self.mem_class(addr) != Some(MemClass::Ram) {
            error!("Invalid memory address {:x}.", addr);
            return Err(HalError::InvalidAddress);
        }
        let offset = pal::addr_offset_get(addr)?;
        self.ps_wake()?;
        self.bal.read_block(dst, offset);
        Ok(())
    }
    /// Write `src` to RAM, core memory or the boot exception vector at `addr`.
    pub fn mem_write(&mut self, addr: u32, src: &[u8]) -> HalResult<()> {
        if src.is_empty() {
            error!("Empty memory write to {:x}.", addr);
            return Err(HalError::InvalidParam);
        }
        match self.mem_class(addr) {
            Some(MemClass::Ram) => {
                let offset = pal::addr_offset_get(addr)?;
                self.ps_wake()?;
                self.bal.write_block(offset, src);
                Ok(())
            }
            Some(MemClass::Core) => self.core_mem_write(addr, src),
            Some(MemClass::Bev) => self.bev_mem_write(addr, src),
            None => {
                error!("Invalid memory address {:x}.", addr);
                Err(HalError::InvalidAddress)
            }
        }
    }
    fn core_mem_write(&mut self, addr: u32, src: &[u8]) -> HalResult<()> {
        if addr % 4 != 0 {
            error!("Core memory address {:x} is not word aligned.", addr);
            return Err(HalError::Misaligned);
        }
        let regs = self.proc.regs();
        self.reg_write(regs.core_mem_ctrl, (addr & RPU_ADDR_MASK_OFFSET) / 4)?;
        for chunk in src.chunks(4) {
            self.reg_write(regs.core_mem_wdata, padded_word(chunk))?;
        }
        Ok(())
    }
    fn bev_mem_write(&mut self, addr: u32, src: &[u8]) -> HalResult<()> {
        let offset = addr & RPU_ADDR_MASK_BEV_OFFSET;
        if offset % 4 != 0 || src.len() % 4 != 0 {
            error!("BEV access at {:x} is not word aligned.", addr);
            return Err(HalError::Misaligned);
        }
        if offset as usize + src.len() > (BEV_INSTR_COUNT * 4) as usize {
            error!("BEV access at {:x} exceeds the vector.", addr);
            return Err(HalError::InvalidAddress);
        }
        let instr_base = self.proc.regs().boot_excp_instr_0 + offset;
        for (i, chunk) in src.chunks(4).enumerate() {
            self.reg_write(instr_base + (i as u32) * 4, padded_word(chunk))?;
        }
        Ok(())
    }

    /// The processor, which core and BEV accesses currently target.
    pub fn proc(&self) -> RpuProc {
        self.proc
    }
    pub fn set_proc(&mut self, proc: RpuProc) {
        self.proc = proc;
    }
}
