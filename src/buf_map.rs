//! Mapping of host buffers into the packet RAM.
//!
//! The top of the packet RAM holds the RX pools back to back, while the TX token areas start at
//! its base. Host buffers are bounced through these areas and mapped for DMA.

use alloc::vec::Vec;

use crate::{
    bus::{BusDevice, DmaDirection},
    config::HalConfig,
    error::{HalError, HalResult},
    hal::HalDevCtx,
    pal,
    regs::{MAX_NUM_OF_RX_QUEUES, RPU_MEM_PKT_BASE, RPU_PKTRAM_SIZE},
};

/// A mapped buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufMapInfo {
    /// Opaque tag of the host buffer, returned on unmap.
    pub virt_addr: usize,
    pub phy_addr: u32,
    pub buf_len: usize,
}

const fn align4(value: u32) -> u32 {
    (value + 3) & !3
}

/// One entry of a buffer map table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum BufSlot {
    #[default]
    Free,
    /// A map or unmap of this slot is in progress.
    Busy,
    Mapped(BufMapInfo),
}
impl BufSlot {
    /// Claim a free slot for mapping.
    fn reserve(&mut self) -> HalResult<()> {
        match self {
            Self::Free => {
                *self = Self::Busy;
                Ok(())
            }
            _ => Err(HalError::AlreadyMapped),
        }
    }
    /// Claim a mapped slot for unmapping.
    fn take(&mut self) -> HalResult<BufMapInfo> {
        match *self {
            Self::Mapped(info) => {
                *self = Self::Busy;
                Ok(info)
            }
            _ => Err(HalError::NotMapped),
        }
    }
}

fn slots(len: usize) -> HalResult<Vec<BufSlot>> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(len).map_err(|_| {
        error!("Allocation of {} buffer map slots failed.", len);
        HalError::NoMemory
    })?;
    slots.resize(len, BufSlot::Free);
    Ok(slots)
}

pub(crate) struct BufMaps {
    pub(crate) rx: [Vec<BufSlot>; MAX_NUM_OF_RX_QUEUES],
    pub(crate) tx: Vec<BufSlot>,
    /// Bus offset of [RPU_MEM_PKT_BASE].
    addr_pktram_base: u32,
    rx_pool_base: [u32; MAX_NUM_OF_RX_QUEUES],
    /// Where the next frame of the current TX token goes.
    tx_frame_offset: u32,
}
impl BufMaps {
    pub(crate) fn new(config: &HalConfig) -> HalResult<Self> {
        let addr_pktram_base = pal::addr_offset_get(RPU_MEM_PKT_BASE)?;
        let mut rx_pool_base = [0u32; MAX_NUM_OF_RX_QUEUES];
        let mut pool_base =
            addr_pktram_base + RPU_PKTRAM_SIZE - config.rx_pools_size() as u32;
        for (base, pool) in rx_pool_base.iter_mut().zip(config.rx_buf_pool.iter()) {
            *base = pool_base;
            pool_base += pool.pool_size() as u32;
        }
        let [rx0, rx1, rx2] = &config.rx_buf_pool;
        Ok(Self {
            rx: [
                slots(rx0.num_bufs)?,
                slots(rx1.num_bufs)?,
                slots(rx2.num_bufs)?,
            ],
            tx: slots(config.max_tx_frms)?,
            addr_pktram_base,
            rx_pool_base,
            tx_frame_offset: addr_pktram_base,
        })
    }
    /// The RPU address of a bounce buffer.
    fn rpu_addr(&self, bounce_addr: u32) -> u32 {
        RPU_MEM_PKT_BASE + (bounce_addr - self.addr_pktram_base)
    }
    /// Bus offset of the area of `token`, if it lies below the RX pools.
    fn token_offset(&self, token: usize, max_ampdu_len_per_token: usize) -> Option<u32> {
        token
            .checked_mul(max_ampdu_len_per_token)
            .and_then(|offset| u32::try_from(offset).ok())
            .and_then(|offset| self.addr_pktram_base.checked_add(offset))
            .filter(|offset| *offset < self.rx_pool_base[0])
    }
}

impl<D: BusDevice> HalDevCtx<D> {
    fn rx_slot_check(&self, pool_id: usize, buf_id: usize) -> HalResult<usize> {
        match self.config().rx_buf_pool.get(pool_id) {
            Some(pool) if buf_id < pool.num_bufs => Ok(pool.buf_sz),
            _ => {
                error!("Invalid RX buffer {} in pool {}.", buf_id, pool_id);
                Err(HalError::InvalidParam)
            }
        }
    }
    /// Set an RX slot, which was reserved or taken before.
    fn rx_slot_set(&self, pool_id: usize, buf_id: usize, slot: BufSlot) {
        self.buf_maps
            .lock(|maps| maps.borrow_mut().rx[pool_id][buf_id] = slot);
    }
    fn tx_slot_set(&self, desc_id: usize, slot: BufSlot) {
        self.buf_maps
            .lock(|maps| maps.borrow_mut().tx[desc_id] = slot);
    }
    /// Map an RX buffer of pool `pool_id` and return the address the RPU DMAs to.
    ///
    /// `buf` has to be exactly as large as the buffers of the pool. Its headroom is copied into the
    /// bounce buffer.
    #[doc(alias = "nrf_wifi_hal_buf_map_rx")]
    pub fn buf_map_rx(&self, buf: &[u8], pool_id: usize, buf_id: usize) -> HalResult<u32> {
        let buf_sz = self.rx_slot_check(pool_id, buf_id)?;
        if buf.len() != buf_sz {
            error!("RX buffer of {} bytes, expected {}.", buf.len(), buf_sz);
            return Err(HalError::InvalidParam);
        }
        let headroom = self.config().rx_buf_headroom_sz;

        let (bounce_addr, rpu_addr) = self.buf_maps.lock(|maps| {
            let mut maps = maps.borrow_mut();
            maps.rx[pool_id][buf_id].reserve().inspect_err(|_| {
                error!("RX buffer {} in pool {} is mapped already.", buf_id, pool_id)
            })?;
            let bounce_addr = maps.rx_pool_base[pool_id] + (buf_id * buf_sz) as u32;
            HalResult::Ok((bounce_addr, maps.rpu_addr(bounce_addr)))
        })?;
        let headroom_copied = if headroom != 0 {
            self.mem_write(rpu_addr, &buf[..headroom])
        } else {
            Ok(())
        };
        let mapped = headroom_copied.and_then(|_| {
            self.rpu.lock(|rpu| {
                rpu.borrow_mut().bal.dma_map(
                    bounce_addr + headroom as u32,
                    buf_sz,
                    DmaDirection::FromDevice,
                )
            })
        });

        match mapped {
            Ok(phy_addr) => {
                self.rx_slot_set(
                    pool_id,
                    buf_id,
                    BufSlot::Mapped(BufMapInfo {
                        virt_addr: buf.as_ptr() as usize,
                        phy_addr,
                        buf_len: buf_sz,
                    }),
                );
                Ok(phy_addr)
            }
            Err(err) => {
                self.rx_slot_set(pool_id, buf_id, BufSlot::Free);
                Err(err)
            }
        }
    }
    /// Unmap an RX buffer and copy `data_len` received bytes behind the headroom of `dst`.
    ///
    /// Returns the tag of the buffer passed to [HalDevCtx::buf_map_rx].
    #[doc(alias = "nrf_wifi_hal_buf_unmap_rx")]
    pub fn buf_unmap_rx(
        &self,
        dst: &mut [u8],
        data_len: usize,
        pool_id: usize,
        buf_id: usize,
    ) -> HalResult<usize> {
        self.rx_slot_check(pool_id, buf_id)?;
        let headroom = self.config().rx_buf_headroom_sz;
        let info = self.buf_maps.lock(|maps| {
            let mut maps = maps.borrow_mut();
            let slot = &mut maps.rx[pool_id][buf_id];
            match *slot {
                BufSlot::Mapped(info) if data_len > info.buf_len || dst.len() < headroom + data_len => {
                    error!("Can't copy {} bytes into the RX buffer.", data_len);
                    Err(HalError::InvalidParam)
                }
                _ => slot.take().inspect_err(|_| {
                    error!("RX buffer {} in pool {} isn't mapped.", buf_id, pool_id)
                }),
            }
        })?;

        let unmapped = self
            .rpu
            .lock(|rpu| {
                rpu.borrow_mut()
                    .bal
                    .dma_unmap(info.phy_addr, info.buf_len, DmaDirection::FromDevice)
            })
            .and_then(|unmapped_addr| {
                if data_len == 0 {
                    return Ok(());
                }
                let rpu_addr = self.buf_maps.lock(|maps| maps.borrow().rpu_addr(unmapped_addr));
                self.mem_read(rpu_addr, &mut dst[headroom..headroom + data_len])
            });
        match unmapped {
            Ok(()) => {
                self.rx_slot_set(pool_id, buf_id, BufSlot::Free);
                Ok(info.virt_addr)
            }
            Err(err) => {
                self.rx_slot_set(pool_id, buf_id, BufSlot::Mapped(info));
                Err(err)
            }
        }
    }

    /// Map the frame `buf` of `token` for TX and return the address the RPU DMAs from.
    ///
    /// `buf_indx` is the position of the frame within its token, the first frame restarts the
    /// token area.
    #[doc(alias = "nrf_wifi_hal_buf_map_tx")]
    pub fn buf_map_tx(
        &self,
        buf: &[u8],
        desc_id: usize,
        token: usize,
        buf_indx: usize,
    ) -> HalResult<u32> {
        let config = *self.config();
        if desc_id >= config.max_tx_frms {
            error!("Invalid TX descriptor {}.", desc_id);
            return Err(HalError::InvalidParam);
        }
        if buf.is_empty() || buf.len() > config.max_tx_frm_sz - config.tx_buf_headroom_sz {
            error!("Invalid TX frame of {} bytes.", buf.len());
            return Err(HalError::InvalidParam);
        }
        let buf_len = align4(buf.len() as u32);

        let (bounce_addr, rpu_addr) = self.buf_maps.lock(|maps| {
            let mut maps = maps.borrow_mut();
            let frame_offset = if buf_indx == 0 {
                maps.token_offset(token, config.max_ampdu_len_per_token)
            } else {
                Some(maps.tx_frame_offset)
            };
            let Some(bounce_addr) = frame_offset.map(align4) else {
                error!("TX token {} lies outside of packet RAM.", token);
                return Err(HalError::InvalidParam);
            };
            let next_frame_offset = bounce_addr + buf_len + config.tx_buf_headroom_sz as u32;
            if next_frame_offset > maps.rx_pool_base[0] {
                error!("TX token {} doesn't fit into packet RAM.", token);
                return Err(HalError::InvalidParam);
            }
            maps.tx[desc_id]
                .reserve()
                .inspect_err(|_| error!("TX descriptor {} is mapped already.", desc_id))?;
            maps.tx_frame_offset = next_frame_offset;
            Ok((bounce_addr, maps.rpu_addr(bounce_addr)))
        })?;

        let mapped = self.mem_write(rpu_addr, buf).and_then(|_| {
            self.rpu.lock(|rpu| {
                rpu.borrow_mut()
                    .bal
                    .dma_map(bounce_addr, buf_len as usize, DmaDirection::ToDevice)
            })
        });
        match mapped {
            Ok(phy_addr) => {
                self.tx_slot_set(
                    desc_id,
                    BufSlot::Mapped(BufMapInfo {
                        virt_addr: buf.as_ptr() as usize,
                        phy_addr,
                        buf_len: buf_len as usize,
                    }),
                );
                Ok(phy_addr)
            }
            Err(err) => {
                self.tx_slot_set(desc_id, BufSlot::Free);
                Err(err)
            }
        }
    }
    /// Unmap the TX frame of `desc_id` and return its tag.
    #[doc(alias = "nrf_wifi_hal_buf_unmap_tx")]
    pub fn buf_unmap_tx(&self, desc_id: usize) -> HalResult<usize> {
        let info = self.buf_maps.lock(|maps| {
            let mut maps = maps.borrow_mut();
            let Some(slot) = maps.tx.get_mut(desc_id) else {
                error!("Invalid TX descriptor {}.", desc_id);
                return Err(HalError::InvalidParam);
            };
            slot.take()
                .inspect_err(|_| error!("TX descriptor {} isn't mapped.", desc_id))
        })?;
        let unmapped = self.rpu.lock(|rpu| {
            rpu.borrow_mut()
                .bal
                .dma_unmap(info.phy_addr, info.buf_len, DmaDirection::ToDevice)
        });
        match unmapped {
            Ok(_) => {
                self.tx_slot_set(desc_id, BufSlot::Free);
                Ok(info.virt_addr)
            }
            Err(err) => {
                self.tx_slot_set(desc_id, BufSlot::Mapped(info));
                Err(err)
            }
        }
    }
}
