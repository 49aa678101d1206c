//! The HAL core: device lifecycle, command submission and event harvesting.

use alloc::{collections::VecDeque, vec::Vec};
use core::cell::{Cell, RefCell};

use embassy_futures::yield_now;
use embassy_sync::{blocking_mutex, channel::Channel, mutex::Mutex};
use embassy_time::Instant;
use macro_bits::{bit, check_bit};
use portable_atomic::{AtomicBool, Ordering};

use crate::{
    bal::{BalConfig, BalDevCtx, BalPriv},
    buf_map::BufMaps,
    bus::{Bus, BusDevice},
    config::HalConfig,
    error::{HalError, HalResult},
    hpqm::{HostRpuHpq, HpqmInfo, RpuInfo},
    mem::RpuCore,
    msg::{self, EventReassembly, HalMsg, HalMsgType, MsgHeader},
    pal,
    ps::{PsCtx, RpuPsState},
    regs::*,
    DefaultRawMutex,
};

#[cfg(feature = "low-power")]
use crate::sync::RearmSignal;
#[cfg(feature = "low-power")]
use embassy_futures::select::{select, Either};
#[cfg(feature = "low-power")]
use embassy_time::Timer;

/// Number of complete events, that can wait for dispatch.
pub const EVENT_QUEUE_DEPTH: usize = 16;

type BlockingMutex<T> = blocking_mutex::Mutex<DefaultRawMutex, RefCell<T>>;

/// Handle of a device registered with a [HalPriv].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DevId(usize);

/// The upper layer's hooks.
pub trait HalCallbacks {
    /// Called once for every complete event, outside of interrupt context.
    fn event(&self, dev: DevId, data: &[u8]) -> HalResult<()>;
    /// Called from the interrupt handler, after the RPU's watchdog fired.
    fn recovery(&self, dev: DevId) -> HalResult<()> {
        let _ = dev;
        warn!("No recovery handler registered.");
        Err(HalError::CallbackFailed)
    }
}
impl<F: Fn(DevId, &[u8]) -> HalResult<()>> HalCallbacks for F {
    fn event(&self, dev: DevId, data: &[u8]) -> HalResult<()> {
        (self)(dev, data)
    }
}

struct CmdState {
    queue: VecDeque<HalMsg>,
    /// Sequence number of the next posted command.
    num_cmds: u32,
}

/// A single RPU attached to the HAL.
pub struct HalDevCtx<D> {
    id: DevId,
    config: HalConfig,
    pub(crate) rpu: BlockingMutex<RpuCore<D>>,
    rpu_info: blocking_mutex::Mutex<DefaultRawMutex, Cell<Option<RpuInfo>>>,
    /// Serializes command submissions.
    cmd: Mutex<DefaultRawMutex, CmdState>,
    rx: BlockingMutex<EventReassembly>,
    event_q: Channel<DefaultRawMutex, HalMsg, EVENT_QUEUE_DEPTH>,
    pub(crate) buf_maps: BlockingMutex<BufMaps>,
    irq_ctx: AtomicBool,
    #[cfg(feature = "low-power")]
    ps_idle: RearmSignal,
}
impl<D: BusDevice> HalDevCtx<D> {
    fn new(id: DevId, config: HalConfig, bal: BalDevCtx<D>, buf_maps: BufMaps) -> Self {
        Self {
            id,
            config,
            rpu: blocking_mutex::Mutex::new(RefCell::new(RpuCore::new(
                bal,
                PsCtx::new(config.timeouts),
            ))),
            rpu_info: blocking_mutex::Mutex::new(Cell::new(None)),
            cmd: Mutex::new(CmdState {
                queue: VecDeque::new(),
                num_cmds: RPU_CMD_START_MAGIC,
            }),
            rx: blocking_mutex::Mutex::new(RefCell::new(EventReassembly::default())),
            event_q: Channel::new(),
            buf_maps: blocking_mutex::Mutex::new(RefCell::new(buf_maps)),
            irq_ctx: AtomicBool::new(false),
            #[cfg(feature = "low-power")]
            ps_idle: RearmSignal::new(),
        }
    }
    fn into_bal(self) -> BalDevCtx<D> {
        self.rpu.into_inner().into_inner().bal
    }
    pub fn id(&self) -> DevId {
        self.id
    }
    pub fn config(&self) -> &HalConfig {
        &self.config
    }

    /// Run `f` on the locked access layer.
    ///
    /// Outside of interrupt context, this restarts the inactivity timer.
    pub(crate) fn with_rpu<R>(
        &self,
        f: impl FnOnce(&mut RpuCore<D>) -> HalResult<R>,
    ) -> HalResult<R> {
        let ret = self.rpu.lock(|rpu| f(&mut rpu.borrow_mut()));
        #[cfg(feature = "low-power")]
        if !self.irq_ctx.load(Ordering::Relaxed) {
            self.ps_idle.arm();
        }
        ret
    }
    #[doc(alias = "hal_rpu_reg_read")]
    pub fn reg_read(&self, addr: u32) -> HalResult<u32> {
        self.with_rpu(|rpu| rpu.reg_read(addr))
    }
    #[doc(alias = "hal_rpu_reg_write")]
    pub fn reg_write(&self, addr: u32, value: u32) -> HalResult<()> {
        self.with_rpu(|rpu| rpu.reg_write(addr, value))
    }
    #[doc(alias = "hal_rpu_mem_read")]
    pub fn mem_read(&self, addr: u32, dst: &mut [u8]) -> HalResult<()> {
        self.with_rpu(|rpu| rpu.mem_read(addr, dst))
    }
    #[doc(alias = "hal_rpu_mem_write")]
    pub fn mem_write(&self, addr: u32, src: &[u8]) -> HalResult<()> {
        self.with_rpu(|rpu| rpu.mem_write(addr, src))
    }
    /// Select the processor, which core and BEV accesses target.
    pub fn proc_ctx_set(&self, proc: RpuProc) {
        self.rpu.lock(|rpu| rpu.borrow_mut().set_proc(proc));
    }
    pub fn rpu_ps_state(&self) -> RpuPsState {
        self.rpu.lock(|rpu| rpu.borrow().ps.state)
    }
    pub(crate) fn rpu_info(&self) -> HalResult<RpuInfo> {
        self.rpu_info.lock(Cell::get).ok_or_else(|| {
            error!("Device isn't initialized.");
            HalError::InvalidParam
        })
    }

    /// Bring up the device, once the firmware booted.
    ///
    /// This learns the queue layout and the command bases from the firmware.
    pub fn dev_init(&self) -> HalResult<()> {
        self.rpu.lock(|rpu| {
            let mut rpu = rpu.borrow_mut();
            rpu.ps.fw_booted = true;
            rpu.bal.dev_init()
        })?;

        let mut hpqm_bytes = [0u8; HpqmInfo::SIZE];
        self.mem_read(RPU_MEM_HPQ_INFO, &mut hpqm_bytes)
            .inspect_err(|_| error!("Reading the queue information failed."))?;
        let mut rx_cmd_base = [0u8; 4];
        self.mem_read(RPU_MEM_RX_CMD_BASE, &mut rx_cmd_base)
            .inspect_err(|_| error!("Reading the RX command base failed."))?;

        let rpu_info = RpuInfo {
            hpqm_info: HpqmInfo::from_bytes(&hpqm_bytes),
            rx_cmd_base: u32::from_le_bytes(rx_cmd_base),
            tx_cmd_base: RPU_MEM_TX_CMD_BASE,
        };
        debug!(
            "RX command base: {:x} TX command base: {:x}",
            rpu_info.rx_cmd_base, rpu_info.tx_cmd_base
        );
        self.rpu_info.lock(|info| info.set(Some(rpu_info)));
        Ok(())
    }
    pub fn dev_deinit(&self) {
        self.rpu.lock(|rpu| rpu.borrow_mut().bal.dev_deinit());
    }

    #[doc(alias = "hal_rpu_irq_enable")]
    pub fn irq_enable(&self) -> HalResult<()> {
        let value = self.reg_read(RPU_REG_INT_FROM_RPU_CTRL)?;
        self.reg_write(
            RPU_REG_INT_FROM_RPU_CTRL,
            value | bit!(RPU_REG_BIT_INT_FROM_RPU_CTRL),
        )?;
        self.reg_write(RPU_REG_INT_FROM_MCU_CTRL, bit!(RPU_REG_BIT_INT_FROM_MCU_CTRL))
    }
    #[doc(alias = "hal_rpu_irq_disable")]
    pub fn irq_disable(&self) -> HalResult<()> {
        let value = self.reg_read(RPU_REG_INT_FROM_RPU_CTRL)?;
        self.reg_write(
            RPU_REG_INT_FROM_RPU_CTRL,
            value & !bit!(RPU_REG_BIT_INT_FROM_RPU_CTRL),
        )?;
        self.reg_write(
            RPU_REG_INT_FROM_MCU_CTRL,
            !bit!(RPU_REG_BIT_INT_FROM_MCU_CTRL),
        )
    }
    fn irq_ack(&self) -> HalResult<()> {
        self.reg_write(RPU_REG_INT_FROM_MCU_ACK, bit!(RPU_REG_BIT_INT_FROM_MCU_ACK))
    }
    fn irq_wdog_chk(&self) -> HalResult<bool> {
        let status = self.reg_read(RPU_REG_MIPS_MCU_UCCP_INT_STATUS)?;
        Ok(check_bit!(status, bit!(RPU_REG_BIT_MIPS_WATCHDOG_INT_STATUS)))
    }
    fn irq_wdog_ack(&self) -> HalResult<()> {
        self.reg_write(RPU_REG_MIPS_MCU_TIMER_CONTROL, 0)?;
        self.reg_write(
            RPU_REG_MIPS_MCU_UCCP_INT_CLEAR,
            bit!(RPU_REG_BIT_MIPS_WATCHDOG_INT_STATUS),
        )
    }

    /// Wait for the RPU to hand out a buffer on `hpq`.
    async fn rpu_ready_wait(&self, hpq: &HostRpuHpq) -> HalResult<()> {
        let start = Instant::now();
        while self.with_rpu(|rpu| rpu.hpq_is_empty(hpq))? {
            if start.elapsed() >= self.config.timeouts.rpu_ready_wait {
                error!("Timed out waiting for a free command buffer.");
                return Err(HalError::Timeout);
            }
            yield_now().await;
        }
        Ok(())
    }
    /// Hand the message at `addr` to the RPU.
    fn msg_post(
        &self,
        cmd: &mut CmdState,
        msg_type: HalMsgType,
        queue_id: usize,
        addr: u32,
    ) -> HalResult<()> {
        let hpqm_info = self.rpu_info()?.hpqm_info;
        let busy_queue = match msg_type {
            HalMsgType::CmdCtrl | HalMsgType::CmdDataTx => hpqm_info.cmd_busy_queue,
            HalMsgType::CmdDataRx => *hpqm_info.rx_buf_busy_queue.get(queue_id).ok_or_else(|| {
                error!("Invalid RX queue {}.", queue_id);
                HalError::InvalidParam
            })?,
            HalMsgType::Event => return Err(HalError::InvalidParam),
        };
        self.with_rpu(|rpu| rpu.hpq_enqueue(&busy_queue, addr))?;

        // The RPU polls for RX descriptors, everything else needs a kick.
        if msg_type != HalMsgType::CmdDataRx {
            self.reg_write(
                RPU_REG_INT_TO_MCU_CTRL,
                MsgTrigger::for_sequence_number(cmd.num_cmds).into_bits(),
            )?;
            cmd.num_cmds = cmd.num_cmds.wrapping_add(1);
        }
        Ok(())
    }
    async fn cmd_process_queue(&self, cmd: &mut CmdState) -> HalResult<()> {
        while let Some(fragment) = cmd.queue.pop_front() {
            let hpqm_info = self.rpu_info()?.hpqm_info;
            let posted = match self.rpu_ready_wait(&hpqm_info.cmd_avl_queue).await {
                Ok(()) => self.ctrl_cmd_post(cmd, &hpqm_info, &fragment),
                Err(err) => Err(err),
            };
            if let Err(err) = posted {
                error!(
                    "Posting a command fragment failed, dropping {} more.",
                    cmd.queue.len()
                );
                cmd.queue.clear();
                return Err(err);
            }
        }
        Ok(())
    }
    fn ctrl_cmd_post(
        &self,
        cmd: &mut CmdState,
        hpqm_info: &HpqmInfo,
        fragment: &HalMsg,
    ) -> HalResult<()> {
        let Some(addr) = self.with_rpu(|rpu| rpu.hpq_dequeue(&hpqm_info.cmd_avl_queue))? else {
            error!("No free command buffer.");
            return Err(HalError::Timeout);
        };
        self.mem_write(addr, fragment.data())?;
        self.msg_post(cmd, HalMsgType::CmdCtrl, 0, addr)
    }
    /// Send a control command, fragmenting it if it exceeds the maximum command size.
    ///
    /// If a fragment can't be posted, the remaining fragments of that command are dropped.
    #[doc(alias = "nrf_wifi_hal_ctrl_cmd_send")]
    pub async fn ctrl_cmd_send(&self, cmd: &[u8]) -> HalResult<()> {
        let mut cmd_state = self.cmd.lock().await;
        let fragments = msg::fragment(cmd, self.config.max_cmd_size)?;
        cmd_state
            .queue
            .try_reserve(fragments.len())
            .map_err(|_| HalError::NoMemory)?;
        cmd_state.queue.extend(fragments);
        self.cmd_process_queue(&mut cmd_state).await
    }
    /// Write a data command at `desc_id` and post it.
    ///
    /// For RX commands, `pool_id` selects the RX queue.
    #[doc(alias = "nrf_wifi_hal_data_cmd_send")]
    pub async fn data_cmd_send(
        &self,
        cmd_type: HalMsgType,
        cmd: &[u8],
        desc_id: u32,
        pool_id: usize,
    ) -> HalResult<()> {
        let mut cmd_state = self.cmd.lock().await;
        if cmd_type == HalMsgType::CmdDataRx && pool_id >= MAX_NUM_OF_RX_QUEUES {
            error!("Invalid RX queue {}.", pool_id);
            return Err(HalError::InvalidParam);
        }
        let rpu_info = self.rpu_info()?;
        let (base, max_size, num_descs) = match cmd_type {
            HalMsgType::CmdDataRx => (
                rpu_info.rx_cmd_base,
                RPU_DATA_CMD_SIZE_MAX_RX,
                self.config.rx_buf_pool.iter().map(|pool| pool.num_bufs).sum(),
            ),
            HalMsgType::CmdDataTx => (
                rpu_info.tx_cmd_base,
                RPU_DATA_CMD_SIZE_MAX_TX,
                self.config.max_tx_frms,
            ),
            _ => {
                error!("Invalid data command type {:?}.", cmd_type);
                return Err(HalError::InvalidParam);
            }
        };
        if cmd.len() > max_size as usize {
            error!("Data command of {} bytes exceeds {}.", cmd.len(), max_size);
            return Err(HalError::InvalidParam);
        }
        let addr = usize::try_from(desc_id)
            .ok()
            .filter(|desc_id| *desc_id < num_descs)
            .and_then(|_| max_size.checked_mul(desc_id))
            .and_then(|offset| base.checked_add(offset))
            .ok_or_else(|| {
                error!("Invalid {:?} descriptor {}.", cmd_type, desc_id);
                HalError::InvalidParam
            })?;
        // RX descriptors live in core memory.
        let host_addr = if cmd_type == HalMsgType::CmdDataRx {
            (addr & RPU_ADDR_MASK_OFFSET) | RPU_MCU_CORE_INDIRECT_BASE
        } else {
            addr
        };
        self.mem_write(host_addr, cmd)?;
        self.msg_post(&mut cmd_state, cmd_type, pool_id, addr)
    }

    fn event_enqueue(&self, event: HalMsg) -> HalResult<()> {
        self.event_q.try_send(event).map_err(|_| {
            error!("Event queue is full, dropping event.");
            HalError::QueueFull
        })
    }
    fn event_free(&self, hpqm_info: &HpqmInfo, addr: u32) -> HalResult<()> {
        self.with_rpu(|rpu| rpu.hpq_enqueue(&hpqm_info.event_avl_queue, addr))
    }
    /// Read the next piece of the fragmented event at `addr`.
    fn event_continue(&self, rx: &mut EventReassembly, addr: u32) -> HalResult<()> {
        let read = msg::try_zeroed(rx.pending().min(self.config.max_event_size))
            .and_then(|mut chunk| self.mem_read(addr, &mut chunk).map(|_| chunk));
        let chunk = match read {
            Ok(chunk) => chunk,
            Err(err) => {
                error!("Reading an event fragment failed, dropping the event.");
                rx.reset();
                return Err(err);
            }
        };
        match rx.append(&chunk) {
            Some(event) => self.event_enqueue(event),
            None => Ok(()),
        }
    }
    /// Read a new event, of which `buf` holds the prefix.
    fn event_start(
        &self,
        rx: &mut EventReassembly,
        header: MsgHeader,
        mut buf: Vec<u8>,
        addr: u32,
    ) -> HalResult<()> {
        header.validate()?;
        let len = header.len as usize;
        if len <= RPU_EVENT_COMMON_SIZE_MAX {
            buf.truncate(len);
            return self.event_enqueue(HalMsg::from_vec(buf));
        }
        let read_len = len.min(self.config.max_event_size);
        msg::try_resize(&mut buf, read_len)?;
        self.mem_read(
            addr + RPU_EVENT_COMMON_SIZE_MAX as u32,
            &mut buf[RPU_EVENT_COMMON_SIZE_MAX..],
        )?;
        if len == read_len {
            return self.event_enqueue(HalMsg::from_vec(buf));
        }
        debug!("Event of {} bytes spans multiple interrupts.", len);
        rx.start(header)?;
        let _ = rx.append(&buf);
        Ok(())
    }
    /// Read the event at `addr`, either continuing a fragmented event or starting a new one.
    ///
    /// Once it's known, that the buffer has to be handed back, it is, even if the event is lost.
    fn event_get(
        &self,
        rx: &mut EventReassembly,
        hpqm_info: &HpqmInfo,
        addr: u32,
    ) -> HalResult<()> {
        let (resubmit, ret) = if rx.is_active() {
            let resubmit = rx.resubmit();
            (resubmit, self.event_continue(rx, addr))
        } else {
            let mut buf = msg::try_zeroed(RPU_EVENT_COMMON_SIZE_MAX)?;
            self.mem_read(addr, &mut buf)?;
            let header = MsgHeader::parse(&buf)?;
            (header.resubmit, self.event_start(rx, header, buf, addr))
        };
        if resubmit {
            self.event_free(hpqm_info, addr)
                .inspect_err(|_| error!("Handing back the event buffer {:x} failed.", addr))?;
        }
        ret
    }
    /// Drain the event busy queue into the software event queue.
    ///
    /// A broken event doesn't stop the harvest, the first error is returned once the queue is
    /// drained. Returns `true`, if the interrupt was caused by the watchdog.
    fn events_harvest(&self, rx: &mut EventReassembly) -> HalResult<bool> {
        let hpqm_info = self.rpu_info()?.hpqm_info;
        let mut num_events = 0usize;
        let mut ret = Ok(());
        loop {
            let addr = match self.with_rpu(|rpu| rpu.hpq_dequeue(&hpqm_info.event_busy_queue))? {
                None | Some(RPU_INVALID_EVENT_ADDR) => break,
                Some(addr) => addr,
            };
            num_events += 1;
            if let Err(err) = self.event_get(rx, &hpqm_info, addr) {
                error!("Event at {:x} was dropped.", addr);
                ret = ret.and(Err(err));
            }
        }
        ret?;
        if num_events == 0 && self.irq_wdog_chk()? {
            warn!("Received watchdog interrupt.");
            self.irq_wdog_ack()?;
            return Ok(true);
        }
        trace!("Harvested {} events.", num_events);
        Ok(false)
    }
    /// Service an interrupt of this device.
    ///
    /// Returns `true`, if recovery is needed.
    pub fn irq_handler(&self) -> HalResult<bool> {
        self.irq_ctx.store(true, Ordering::Relaxed);
        // The RPU raised the interrupt, so it's awake.
        let prev_state = self
            .rpu
            .lock(|rpu| rpu.borrow_mut().ps_state_force(RpuPsState::Awake));

        let ret = self.rx.lock(|rx| {
            let harvested = self.events_harvest(&mut rx.borrow_mut());
            let acked = self.irq_ack();
            let do_recovery = harvested?;
            acked?;
            Ok(do_recovery)
        });

        self.rpu
            .lock(|rpu| rpu.borrow_mut().ps_state_force(prev_state));
        self.irq_ctx.store(false, Ordering::Relaxed);
        ret
    }
    fn event_dispatch(&self, callbacks: &impl HalCallbacks, event: &HalMsg) {
        if callbacks.event(self.id, event.data()).is_err() {
            error!("Event callback failed.");
        }
    }
    /// Dispatch all queued events and return their number.
    #[doc(alias = "nrf_wifi_hal_rpu_eventq_drain")]
    pub fn eventq_process(&self, callbacks: &impl HalCallbacks) -> usize {
        let mut num_events = 0;
        while let Ok(event) = self.event_q.try_receive() {
            self.event_dispatch(callbacks, &event);
            num_events += 1;
        }
        num_events
    }

    #[cfg(feature = "low-power")]
    pub(crate) fn ps_sleep(&self) {
        self.rpu.lock(|rpu| rpu.borrow_mut().ps_sleep());
    }
    /// Put the RPU to sleep after every period of inactivity.
    ///
    /// This has to be polled continuously, for power saving to take place.
    #[cfg(feature = "low-power")]
    pub async fn run_ps_timer(&self) -> ! {
        loop {
            self.ps_idle.wait().await;
            while let Either::Second(()) = select(
                Timer::after(self.config.timeouts.ps_idle_timeout),
                self.ps_idle.wait(),
            )
            .await
            {}
            self.ps_sleep();
        }
    }
}

/// Dispatches events of one device to the [HalCallbacks].
pub struct EventRunner<'a, D, C> {
    dev: &'a HalDevCtx<D>,
    callbacks: &'a C,
}
impl<D: BusDevice, C: HalCallbacks> EventRunner<'_, D, C> {
    pub async fn run(&mut self) -> ! {
        loop {
            let event = self.dev.event_q.receive().await;
            self.dev.event_dispatch(self.callbacks, &event);
        }
    }
}

/// A HAL instance, owning the bus and all devices on it.
pub struct HalPriv<B: Bus, C> {
    bal: BalPriv<B>,
    config: HalConfig,
    callbacks: C,
    devs: Vec<Option<HalDevCtx<B::Device>>>,
}
impl<B: Bus, C: HalCallbacks> HalPriv<B, C> {
    /// Initialize the HAL and the bus.
    #[doc(alias = "nrf_wifi_hal_init")]
    pub fn init(config: HalConfig, bus_config: &B::Config, callbacks: C) -> HalResult<Self> {
        config.validate()?;
        let bal = BalPriv::init(
            bus_config,
            BalConfig {
                addr_pktram_base: pal::addr_offset_get(RPU_ADDR_PKTRAM_START)?,
            },
        )?;
        Ok(Self {
            bal,
            config,
            callbacks,
            devs: Vec::new(),
        })
    }
    #[doc(alias = "nrf_wifi_hal_deinit")]
    pub fn deinit(mut self) {
        for slot in self.devs.iter_mut() {
            if let Some(dev) = slot.take() {
                self.bal.dev_rem(dev.into_bal());
            }
        }
        self.bal.deinit();
    }
    pub fn config(&self) -> &HalConfig {
        &self.config
    }
    /// Attach a new device and enable its interrupts.
    #[doc(alias = "nrf_wifi_hal_dev_add")]
    pub fn dev_add(&mut self) -> HalResult<DevId> {
        let slot = match self.devs.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                self.devs
                    .try_reserve(1)
                    .map_err(|_| HalError::NoMemory)?;
                self.devs.push(None);
                self.devs.len() - 1
            }
        };
        let id = DevId(slot);
        let buf_maps = BufMaps::new(&self.config)?;
        let bal_dev = self.bal.dev_add()?;
        let dev = HalDevCtx::new(id, self.config, bal_dev, buf_maps);
        if let Err(err) = dev.irq_enable() {
            error!("Enabling interrupts failed.");
            self.bal.dev_rem(dev.into_bal());
            return Err(err);
        }
        self.devs[slot] = Some(dev);
        debug!("Added device {}.", slot);
        Ok(id)
    }
    #[doc(alias = "nrf_wifi_hal_dev_rem")]
    pub fn dev_rem(&mut self, id: DevId) -> HalResult<()> {
        let dev = self
            .devs
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(HalError::InvalidParam)?;
        self.bal.dev_rem(dev.into_bal());
        Ok(())
    }
    pub fn dev(&self, id: DevId) -> HalResult<&HalDevCtx<B::Device>> {
        self.devs
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                error!("Unknown device {}.", id.0);
                HalError::InvalidParam
            })
    }
    /// Entry point for the bus driver's interrupt.
    #[doc(alias = "hal_rpu_irq_handler")]
    pub fn irq_handler(&self, id: DevId) -> HalResult<()> {
        let dev = self.dev(id)?;
        if dev.irq_handler().inspect_err(|_| error!("Interrupt processing failed."))? {
            self.callbacks
                .recovery(id)
                .inspect_err(|_| error!("RPU recovery failed."))?;
        }
        Ok(())
    }
    /// Dispatch all queued events of the device.
    pub fn eventq_process(&self, id: DevId) -> HalResult<usize> {
        Ok(self.dev(id)?.eventq_process(&self.callbacks))
    }
    /// A runner, that dispatches events of the device as they arrive.
    pub fn event_runner(&self, id: DevId) -> HalResult<EventRunner<'_, B::Device, C>> {
        Ok(EventRunner {
            dev: self.dev(id)?,
            callbacks: &self.callbacks,
        })
    }
}
