//! # `nrf-wifi-hal`
//! This is the host side transport for the nRF700x series of Wi-Fi companion chips.
//! It moves commands to and events from the chip, maps packet buffers, loads firmware patches and
//! manages the chip's sleep state. The actual bus (QSPI, SPI...) is provided by the user through
//! the [Bus] and [BusDevice] traits.
//! ## Hardware overview
//! This chapter will give a short overview of the parts of the chip, that the host talks to.
//! Inside the chip sits the RPU, which contains two MCUs: the LMAC and the UMAC.
//!
//! ### Address map
//! The RPU has its own 32-bit address space. Only four regions of it are visible on the host bus:
//! the system bus and peripheral bus registers, the GRAM and the packet RAM. Addresses are
//! translated into bus offsets by [pal]. The core memories of the MCUs aren't directly visible,
//! instead a word address is written to a control register of the MCU and the data is then
//! streamed through a data register. The boot exception vectors (BEV) are remapped onto registers
//! of the MCU as well. Which MCU core and BEV accesses go to is selected with
//! [HalDevCtx::proc_ctx_set].
//!
//! ### Hostport queues
//! Free buffers and pending work are exchanged through hardware queues. Reading the dequeue
//! register of a queue returns its head, or zero if it's empty, and writing that value back pops
//! it. The firmware publishes the location of these queues once it's up, which is why the device
//! can only be brought up with [HalDevCtx::dev_init] after booting.
//!
//! ### Commands
//! To send a command, we wait for a free buffer in the command available queue, write the command
//! to it and enqueue its address to the command busy queue. A write of a sequence number to the
//! interrupt register of the MCU then tells the firmware, that a command is pending. Commands
//! larger than the maximum command size are split up into fragments, that are posted one by one.
//! Data commands live at fixed descriptor slots instead and RX descriptors don't need the kick.
//!
//! ### Events
//! When the RPU raises an interrupt, [HalPriv::irq_handler] drains the event busy queue. Each entry
//! is the address of an event, which starts with its length and whether the buffer has to be
//! returned. Events larger than the maximum event size arrive in pieces over multiple interrupts
//! and are reassembled. Complete events are queued and later handed to the [HalCallbacks] by
//! [HalPriv::eventq_process] or [EventRunner]. If an interrupt carries no events, we check if the
//! watchdog of the RPU fired and if so, request recovery.
//!
//! ### Power saving
//! With the `low-power` feature, the RPU is put to sleep after a period of inactivity, which is
//! tracked by [HalDevCtx::run_ps_timer]. Every access wakes it up again, by signalling the bus and
//! polling the power status until the RPU reports itself as awake and ready.

#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub(crate) mod fmt;

mod bal;
mod buf_map;
mod bus;
mod config;
mod error;
mod fw;
mod hal;
mod hpqm;
mod mem;
mod msg;
mod otp;
pub mod pal;
mod ps;
pub mod regs;
#[cfg(feature = "low-power")]
mod sync;

#[cfg(test)]
mod mock;

pub use buf_map::BufMapInfo;
pub use bus::{Bus, BusDevConfig, BusDevice, DmaDirection};
pub use config::*;
pub use error::{HalError, HalResult};
pub use fw::MAX_PATCH_CHUNK_SIZE;
pub use hal::{DevId, EventRunner, HalCallbacks, HalDevCtx, HalPriv, EVENT_QUEUE_DEPTH};
pub use hpqm::{HostRpuHpq, HpqmInfo, RpuInfo};
pub use msg::{HalMsg, HalMsgType, MsgHeader};
pub use otp::{OtpInfo, UmacInfo};
pub use ps::RpuPsState;
pub use regs::RpuProc;

#[cfg(not(feature = "critical_section"))]
type DefaultRawMutex = embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(feature = "critical_section")]
type DefaultRawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
