//! Loading and booting the RPU firmware patches.

use embassy_time::{block_for, Duration};

use crate::{
    bus::BusDevice,
    error::{HalError, HalResult},
    hal::HalDevCtx,
    mem::RpuCore,
    regs::{
        RpuProc, BEV_INSTR_COUNT, NRF_WIFI_LMAC_BOOT_SIG, NRF_WIFI_LMAC_ROM_PATCH_OFFSET,
        NRF_WIFI_PATCH_BOOT_EXCP_VECT, NRF_WIFI_UMAC_BOOT_SIG, NRF_WIFI_UMAC_ROM_PATCH_OFFSET,
        RPU_ADDR_BEV_START, RPU_MEM_LMAC_PATCH_BIMG, RPU_MEM_LMAC_PATCH_BIN,
        RPU_MEM_UMAC_PATCH_BIMG, RPU_MEM_UMAC_PATCH_BIN,
    },
};

/// Patches are written in chunks of this size.
pub const MAX_PATCH_CHUNK_SIZE: usize = 1024;

impl RpuProc {
    const fn boot_sig(&self) -> u32 {
        match self {
            Self::Lmac => NRF_WIFI_LMAC_BOOT_SIG,
            Self::Umac => NRF_WIFI_UMAC_BOOT_SIG,
        }
    }
    const fn patch_offset(&self) -> u32 {
        match self {
            Self::Lmac => NRF_WIFI_LMAC_ROM_PATCH_OFFSET,
            Self::Umac => NRF_WIFI_UMAC_ROM_PATCH_OFFSET,
        }
    }
    /// Destinations of the primary and secondary patch.
    const fn patch_addrs(&self) -> (u32, u32) {
        match self {
            Self::Lmac => (RPU_MEM_LMAC_PATCH_BIMG, RPU_MEM_LMAC_PATCH_BIN),
            Self::Umac => (RPU_MEM_UMAC_PATCH_BIMG, RPU_MEM_UMAC_PATCH_BIN),
        }
    }
}

fn patch_write<D: BusDevice>(rpu: &mut RpuCore<D>, addr: u32, patch: &[u8]) -> HalResult<()> {
    for (i, chunk) in patch.chunks(MAX_PATCH_CHUNK_SIZE).enumerate() {
        rpu.mem_write(addr + (i * MAX_PATCH_CHUNK_SIZE) as u32, chunk)
            .inspect_err(|_| error!("Patch chunk {} failed to load.", i))?;
    }
    Ok(())
}

impl<D: BusDevice> HalDevCtx<D> {
    /// Poll `addr`, until the bits in `mask` read as `req_value`.
    pub(crate) fn poll_reg(
        &self,
        addr: u32,
        mask: u32,
        req_value: u32,
        poll_interval: Duration,
    ) -> HalResult<()> {
        for _ in 0..self.config().timeouts.reg_poll_count {
            match self.reg_read(addr) {
                Ok(value) if value & mask == req_value => return Ok(()),
                Ok(_) => {}
                Err(err) => {
                    error!("Reading {:x} failed.", addr);
                    return Err(err);
                }
            }
            block_for(poll_interval);
        }
        error!("Timed out polling {:x}.", addr);
        Err(HalError::Timeout)
    }
    /// Soft reset `proc` and wait for it to enter its boot wait state.
    #[doc(alias = "nrf_wifi_hal_proc_reset")]
    pub fn proc_reset(&self, proc: RpuProc) -> HalResult<()> {
        let regs = proc.regs();
        let poll_interval = self.config().timeouts.reg_poll_interval;
        self.reg_write(regs.control, 0x1)?;
        self.poll_reg(regs.control, 0x1, 0x0, poll_interval)?;
        self.poll_reg(regs.boot_wait_status, 0x1, 0x1, poll_interval)
            .inspect_err(|_| error!("{:?} didn't enter boot wait.", proc))
    }
    /// Wait for the firmware of `proc` to publish its boot signature.
    #[doc(alias = "nrf_wifi_hal_fw_chk_boot")]
    pub fn fw_chk_boot(&self, proc: RpuProc) -> HalResult<()> {
        let timeouts = self.config().timeouts;
        let mut boot_sig = [0u8; 4];
        for _ in 0..timeouts.boot_poll_count {
            self.mem_read(proc.boot_sig_addr(), &mut boot_sig)?;
            if u32::from_le_bytes(boot_sig) == proc.boot_sig() {
                debug!("{:?} booted.", proc);
                return Ok(());
            }
            block_for(timeouts.boot_poll_interval);
        }
        error!(
            "Boot signature check of {:?} failed, read {:x}.",
            proc,
            u32::from_le_bytes(boot_sig)
        );
        Err(HalError::Timeout)
    }
    /// Load the primary and secondary patch of `proc` into its retained RAM.
    ///
    /// The processor context is switched for the duration of the load only.
    #[doc(alias = "nrf_wifi_hal_fw_patch_load")]
    pub fn fw_patch_load(&self, proc: RpuProc, fw_pri: &[u8], fw_sec: &[u8]) -> HalResult<()> {
        let (pri_addr, sec_addr) = proc.patch_addrs();
        self.with_rpu(|rpu| {
            let prev_proc = rpu.proc();
            rpu.set_proc(proc);
            let ret = patch_write(rpu, pri_addr, fw_pri)
                .and_then(|_| patch_write(rpu, sec_addr, fw_sec));
            rpu.set_proc(prev_proc);
            ret
        })
    }
    /// Point the boot exception vector of `proc` at its patch and reset it.
    #[doc(alias = "nrf_wifi_hal_fw_patch_boot")]
    pub fn fw_patch_boot(&self, proc: RpuProc, is_patch_present: bool) -> HalResult<()> {
        self.mem_write(proc.boot_sig_addr(), &0u32.to_le_bytes())?;
        if is_patch_present {
            self.reg_write(proc.regs().sleep_ctrl_data, proc.patch_offset())?;
        }

        let mut bev = [0u8; (BEV_INSTR_COUNT * 4) as usize];
        for (instr, chunk) in NRF_WIFI_PATCH_BOOT_EXCP_VECT.iter().zip(bev.chunks_mut(4)) {
            chunk.copy_from_slice(&instr.to_le_bytes());
        }
        self.with_rpu(|rpu| {
            let prev_proc = rpu.proc();
            rpu.set_proc(proc);
            let ret = rpu.mem_write(RPU_ADDR_BEV_START, &bev);
            rpu.set_proc(prev_proc);
            ret
        })?;

        self.proc_reset(proc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hal::{DevId, HalPriv},
        mock::{test_config, ChipModel, MockBus},
        regs::RPU_REG_UCC_SLEEP_CTRL_DATA_1,
    };
    use alloc::vec::Vec;

    type TestHal = HalPriv<MockBus, fn(DevId, &[u8]) -> HalResult<()>>;

    fn no_events(_dev: DevId, _data: &[u8]) -> HalResult<()> {
        Ok(())
    }
    fn hal(chip: &ChipModel) -> (TestHal, DevId) {
        let mut hal = TestHal::init(test_config(), chip, no_events).unwrap();
        let id = hal.dev_add().unwrap();
        chip.clear_log();
        (hal, id)
    }

    #[test]
    fn proc_reset_waits_for_boot_wait() {
        let chip = ChipModel::new();
        let (hal, id) = hal(&chip);
        let dev = hal.dev(id).unwrap();
        let regs = RpuProc::Umac.regs();
        chip.set_self_clearing(regs.control);
        chip.write_rpu_word(regs.boot_wait_status, 1);

        assert_eq!(dev.proc_reset(RpuProc::Umac), Ok(()));
        assert_eq!(chip.writes_to(regs.control), [1]);

        chip.write_rpu_word(regs.boot_wait_status, 0);
        assert_eq!(dev.proc_reset(RpuProc::Umac), Err(HalError::Timeout));
    }
    #[test]
    fn boot_signature() {
        let chip = ChipModel::new();
        let (hal, id) = hal(&chip);
        let dev = hal.dev(id).unwrap();

        assert_eq!(dev.fw_chk_boot(RpuProc::Lmac), Err(HalError::Timeout));
        chip.write_rpu_word(RpuProc::Lmac.boot_sig_addr(), NRF_WIFI_LMAC_BOOT_SIG);
        assert_eq!(dev.fw_chk_boot(RpuProc::Lmac), Ok(()));
        assert_eq!(dev.fw_chk_boot(RpuProc::Umac), Err(HalError::Timeout));
    }
    #[test]
    fn patch_load_is_chunked() {
        let chip = ChipModel::new();
        let (hal, id) = hal(&chip);
        let dev = hal.dev(id).unwrap();
        let pri: Vec<u8> = (0..1500).map(|i| i as u8).collect();
        let sec = [0xabu8; 8];

        dev.fw_patch_load(RpuProc::Umac, &pri, &sec).unwrap();
        let regs = RpuProc::Umac.regs();
        let word_addr = |addr: u32| (addr & 0x00ff_ffff) / 4;
        assert_eq!(
            chip.writes_to(regs.core_mem_ctrl),
            [
                word_addr(RPU_MEM_UMAC_PATCH_BIMG),
                word_addr(RPU_MEM_UMAC_PATCH_BIMG + 1024),
                word_addr(RPU_MEM_UMAC_PATCH_BIN),
            ]
        );
        let data = chip.writes_to(regs.core_mem_wdata);
        assert_eq!(data.len(), 1500 / 4 + 2);
        assert_eq!(data[0], 0x0302_0100);
        assert_eq!(data[data.len() - 1], 0xabab_abab);
        // The processor context is restored.
        assert!(chip.writes_to(RpuProc::Lmac.regs().core_mem_ctrl).is_empty());
        assert_eq!(dev.rpu.lock(|rpu| rpu.borrow().proc()), RpuProc::Lmac);
        dev.mem_write(0x8004_0000, &[0; 4]).unwrap();
        assert_eq!(chip.writes_to(RpuProc::Lmac.regs().core_mem_ctrl).len(), 1);
    }
    #[test]
    fn patch_boot() {
        let chip = ChipModel::new();
        let (hal, id) = hal(&chip);
        let dev = hal.dev(id).unwrap();
        let regs = RpuProc::Umac.regs();
        chip.set_self_clearing(regs.control);
        chip.write_rpu_word(regs.boot_wait_status, 1);
        chip.write_rpu_word(RpuProc::Umac.boot_sig_addr(), NRF_WIFI_UMAC_BOOT_SIG);

        dev.fw_patch_boot(RpuProc::Umac, true).unwrap();
        assert_eq!(chip.read_rpu_word(RpuProc::Umac.boot_sig_addr()), 0);
        assert_eq!(
            chip.writes_to(RPU_REG_UCC_SLEEP_CTRL_DATA_1),
            [NRF_WIFI_UMAC_ROM_PATCH_OFFSET]
        );
        for (i, instr) in NRF_WIFI_PATCH_BOOT_EXCP_VECT.iter().enumerate() {
            assert_eq!(
                chip.writes_to(regs.boot_excp_instr_0 + i as u32 * 4),
                [*instr]
            );
        }
        assert_eq!(chip.writes_to(regs.control), [1]);

        chip.clear_log();
        dev.fw_patch_boot(RpuProc::Umac, false).unwrap();
        assert!(chip.writes_to(RPU_REG_UCC_SLEEP_CTRL_DATA_1).is_empty());
    }
}
