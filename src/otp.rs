//! Factory programmed information of the RPU.
//!
//! The UMAC copies its OTP contents behind its boot signature, once it's up.

use crate::{
    bus::BusDevice,
    error::HalResult,
    hal::HalDevCtx,
    regs::{RPU_MEM_OTP_FT_PROG_VERSION, RPU_MEM_OTP_INFO_FLAGS, RPU_MEM_UMAC_BOOT_SIG},
};

/// The UMAC information block at [RPU_MEM_UMAC_BOOT_SIG].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UmacInfo {
    pub boot_status: u32,
    pub version: u32,
    pub part: u32,
    pub variant: u32,
    pub lrom_version: u32,
    pub urom_version: u32,
    pub uuid: [u32; 4],
    pub spare: [u32; 2],
    pub mac_address0: [u32; 2],
    pub mac_address1: [u32; 2],
    pub calib: [u32; 9],
}
impl UmacInfo {
    pub const SIZE: usize = 25 * 4;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let word = |i: usize| {
            let i = i * 4;
            u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
        };
        Self {
            boot_status: word(0),
            version: word(1),
            part: word(2),
            variant: word(3),
            lrom_version: word(4),
            urom_version: word(5),
            uuid: core::array::from_fn(|i| word(6 + i)),
            spare: core::array::from_fn(|i| word(10 + i)),
            mac_address0: core::array::from_fn(|i| word(12 + i)),
            mac_address1: core::array::from_fn(|i| word(14 + i)),
            calib: core::array::from_fn(|i| word(16 + i)),
        }
    }
}

/// OTP contents together with the flags telling, which regions are programmed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OtpInfo {
    pub info: UmacInfo,
    pub flags: u32,
}

fn read_word<D: BusDevice>(dev: &HalDevCtx<D>, addr: u32) -> HalResult<u32> {
    let mut word = [0u8; 4];
    dev.mem_read(addr, &mut word)?;
    Ok(u32::from_le_bytes(word))
}

impl<D: BusDevice> HalDevCtx<D> {
    #[doc(alias = "nrf_wifi_hal_otp_info_get")]
    pub fn otp_info_get(&self) -> HalResult<OtpInfo> {
        let mut info = [0u8; UmacInfo::SIZE];
        self.mem_read(RPU_MEM_UMAC_BOOT_SIG, &mut info)
            .inspect_err(|_| error!("Reading the OTP info failed."))?;
        let flags = read_word(self, RPU_MEM_OTP_INFO_FLAGS)
            .inspect_err(|_| error!("Reading the OTP flags failed."))?;
        Ok(OtpInfo {
            info: UmacInfo::from_bytes(&info),
            flags,
        })
    }
    /// Version of the program, that was used to program the OTP at the factory.
    #[doc(alias = "nrf_wifi_hal_otp_ft_prog_ver_get")]
    pub fn otp_ft_prog_ver_get(&self) -> HalResult<u32> {
        read_word(self, RPU_MEM_OTP_FT_PROG_VERSION)
            .inspect_err(|_| error!("Reading the FT program version failed."))
    }
}
