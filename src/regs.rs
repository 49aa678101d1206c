//! RPU address map, register locations and register layouts.
//!
//! All addresses here are in the RPU's own view. They have to be translated by [crate::pal]
//! before they can be handed to the bus.

use bitfield_struct::bitfield;

/// One of the two MCUs inside the RPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RpuProc {
    /// The lower MAC.
    #[default]
    Lmac,
    /// The upper MAC.
    Umac,
}

pub const RPU_ADDR_MASK_BASE: u32 = 0xff00_0000;
pub const RPU_ADDR_MASK_OFFSET: u32 = 0x00ff_ffff;
pub const RPU_ADDR_MASK_BEV_OFFSET: u32 = 0x000f_ffff;

pub const RPU_ADDR_SBUS_START: u32 = 0xa400_0000;
pub const RPU_ADDR_PBUS_START: u32 = 0xa500_0000;
pub const RPU_ADDR_GRAM_START: u32 = 0xb700_0000;
pub const RPU_ADDR_GRAM_END: u32 = 0xb701_01ff;
pub const RPU_ADDR_PKTRAM_START: u32 = 0xb000_0000;
pub const RPU_ADDR_PKTRAM_END: u32 = 0xb003_0fff;
pub const RPU_ADDR_BEV_START: u32 = 0xbfc0_0000;
pub const RPU_ADDR_BEV_END: u32 = 0xbfcf_ffff;

/// Base used to tag RPU core memory addresses for indirect access.
pub const RPU_MCU_CORE_INDIRECT_BASE: u32 = 0xc000_0000;

/// Inclusive address range of a memory block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddrRange {
    pub start: u32,
    pub end: u32,
}
impl AddrRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }
}

/// ROM, retained RAM and scratch RAM of the LMAC.
pub const LMAC_CORE_REGIONS: [AddrRange; 3] = [
    AddrRange::new(0x8000_0000, 0x8003_3fff),
    AddrRange::new(0x8004_0000, 0x8004_bfff),
    AddrRange::new(0x8008_0000, 0x8008_ffff),
];
/// ROM, retained RAM and scratch RAM of the UMAC.
pub const UMAC_CORE_REGIONS: [AddrRange; 3] = [
    AddrRange::new(0x8000_0000, 0x8006_17ff),
    AddrRange::new(0x8008_0000, 0x800a_3fff),
    AddrRange::new(0x8010_0000, 0x8013_7fff),
];

/// Number of boot exception vector instructions per MCU.
pub const BEV_INSTR_COUNT: u32 = 4;

pub const RPU_REG_INT_FROM_RPU_CTRL: u32 = 0xa400_0400;
pub const RPU_REG_BIT_INT_FROM_RPU_CTRL: u32 = 17;
pub const RPU_REG_INT_TO_MCU_CTRL: u32 = 0xa400_0480;
pub const RPU_REG_INT_FROM_MCU_ACK: u32 = 0xa400_0488;
pub const RPU_REG_BIT_INT_FROM_MCU_ACK: u32 = 31;
pub const RPU_REG_INT_FROM_MCU_CTRL: u32 = 0xa400_0494;
pub const RPU_REG_BIT_INT_FROM_MCU_CTRL: u32 = 31;

pub const RPU_REG_MIPS_MCU_UCCP_INT_STATUS: u32 = 0xa400_0004;
pub const RPU_REG_MIPS_MCU_UCCP_INT_CLEAR: u32 = 0xa400_000c;
pub const RPU_REG_BIT_MIPS_WATCHDOG_INT_STATUS: u32 = 1;
pub const RPU_REG_MIPS_MCU_TIMER_CONTROL: u32 = 0xa400_0048;

pub const RPU_REG_UCC_SLEEP_CTRL_DATA_0: u32 = 0xa400_2c2c;
pub const RPU_REG_UCC_SLEEP_CTRL_DATA_1: u32 = 0xa400_2c30;

/// The per MCU register block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McuRegs {
    /// Pulsed soft reset.
    pub control: u32,
    /// Reads `1` once the MCU sits in its boot wait instruction.
    pub boot_wait_status: u32,
    /// Word address for indirect core memory writes.
    pub core_mem_ctrl: u32,
    /// Data port for indirect core memory writes.
    pub core_mem_wdata: u32,
    /// First of [BEV_INSTR_COUNT] boot exception instruction registers.
    pub boot_excp_instr_0: u32,
    /// Receives the patch entry offset before booting.
    pub sleep_ctrl_data: u32,
}
const LMAC_REGS: McuRegs = McuRegs {
    control: 0xa400_0000,
    boot_wait_status: 0xa400_0018,
    core_mem_ctrl: 0xa400_0030,
    core_mem_wdata: 0xa400_0034,
    boot_excp_instr_0: 0xa400_0050,
    sleep_ctrl_data: RPU_REG_UCC_SLEEP_CTRL_DATA_0,
};
const UMAC_REGS: McuRegs = McuRegs {
    control: 0xa400_0100,
    boot_wait_status: 0xa400_0118,
    core_mem_ctrl: 0xa400_0130,
    core_mem_wdata: 0xa400_0134,
    boot_excp_instr_0: 0xa400_0150,
    sleep_ctrl_data: RPU_REG_UCC_SLEEP_CTRL_DATA_1,
};

impl RpuProc {
    /// The register block of this MCU.
    pub const fn regs(&self) -> &'static McuRegs {
        match self {
            Self::Lmac => &LMAC_REGS,
            Self::Umac => &UMAC_REGS,
        }
    }
    /// The directly mapped core memories of this MCU.
    pub const fn core_regions(&self) -> &'static [AddrRange; 3] {
        match self {
            Self::Lmac => &LMAC_CORE_REGIONS,
            Self::Umac => &UMAC_CORE_REGIONS,
        }
    }
    /// Where the MCU writes its boot signature, once the firmware is up.
    pub const fn boot_sig_addr(&self) -> u32 {
        match self {
            Self::Lmac => RPU_MEM_LMAC_BOOT_SIG,
            Self::Umac => RPU_MEM_UMAC_BOOT_SIG,
        }
    }
}

/// Hostport queue information block.
pub const RPU_MEM_HPQ_INFO: u32 = 0xb000_0024;
pub const RPU_MEM_TX_CMD_BASE: u32 = 0xb000_00b8;
pub const RPU_MEM_RX_CMD_BASE: u32 = 0xb700_0d58;
pub const RPU_MEM_LMAC_BOOT_SIG: u32 = 0xb700_0d50;
pub const RPU_MEM_UMAC_BOOT_SIG: u32 = 0xb000_0000;
/// Validity flags of the OTP regions.
pub const RPU_MEM_OTP_INFO_FLAGS: u32 = 0xb000_0fc0;
pub const RPU_MEM_OTP_FT_PROG_VERSION: u32 = 0xb000_4fd8;
/// Start of the packet RAM usable for host-RPU data exchange.
pub const RPU_MEM_PKT_BASE: u32 = 0xb000_5000;
pub const RPU_PKTRAM_SIZE: u32 = RPU_ADDR_PKTRAM_END - RPU_MEM_PKT_BASE + 1;

pub const RPU_MEM_LMAC_PATCH_BIN: u32 = 0x8004_4000;
pub const RPU_MEM_LMAC_PATCH_BIMG: u32 = 0x8004_9000;
pub const RPU_MEM_UMAC_PATCH_BIN: u32 = 0x8008_c000;
pub const RPU_MEM_UMAC_PATCH_BIMG: u32 = 0x8009_4400;

pub const NRF_WIFI_LMAC_BOOT_SIG: u32 = 0x5a5a_5a5a;
pub const NRF_WIFI_UMAC_BOOT_SIG: u32 = 0x5a5a_5a5a;
/// Patch entry points, relative to the retained RAM of the respective MCU.
pub const NRF_WIFI_LMAC_ROM_PATCH_OFFSET: u32 = RPU_MEM_LMAC_PATCH_BIMG - LMAC_CORE_REGIONS[1].start;
pub const NRF_WIFI_UMAC_ROM_PATCH_OFFSET: u32 = RPU_MEM_UMAC_PATCH_BIMG - UMAC_CORE_REGIONS[1].start;

/// The bootstrap the MCUs run from their boot exception vector, when a patch is present.
pub const NRF_WIFI_PATCH_BOOT_EXCP_VECT: [u32; BEV_INSTR_COUNT as usize] =
    [0x3c1a_8000, 0x275a_0000, 0x0340_0008, 0x0000_0000];

/// Seed of the command sequence number.
pub const RPU_CMD_START_MAGIC: u32 = 0xdead;
pub const RPU_DATA_CMD_SIZE_MAX_RX: u32 = 8;
pub const RPU_DATA_CMD_SIZE_MAX_TX: u32 = 148;
/// Size of the event prefix, which is read before the header is known.
pub const RPU_EVENT_COMMON_SIZE_MAX: usize = 128;
pub const MAX_NUM_OF_RX_QUEUES: usize = 3;

/// Returned by the event queue, while the RPU is still waking up.
pub const RPU_INVALID_EVENT_ADDR: u32 = 0xaaaa_aaaa;
/// A register read of this value means, that the bus couldn't reach the RPU.
pub const RPU_REG_READ_SENTINEL: u32 = 0xffff_ffff;

#[bitfield(u32)]
/// The power status reported by the bus.
pub struct RpuPsStatus {
    #[bits(1)]
    __: u8,
    /// The RPU has left its sleep state.
    pub awake: bool,
    /// The RPU is ready for register and memory accesses.
    pub ready: bool,
    #[bits(29)]
    __: u32,
}
impl RpuPsStatus {
    /// Both bits required, before the RPU may be accessed.
    pub const fn is_ready(&self) -> bool {
        self.awake() && self.ready()
    }
}

#[bitfield(u32)]
/// Value written to [RPU_REG_INT_TO_MCU_CTRL] to signal a posted command.
pub struct MsgTrigger {
    #[bits(16)]
    pub sequence_number: u16,
    #[bits(16)]
    pub magic: u16,
}
impl MsgTrigger {
    pub const MAGIC: u16 = 0x7fff;
    pub const fn for_sequence_number(sequence_number: u32) -> Self {
        Self::new()
            .with_sequence_number(sequence_number as u16)
            .with_magic(Self::MAGIC)
    }
}
