//! Messages exchanged with the RPU.

use alloc::vec::Vec;

use crate::error::{HalError, HalResult};

/// The kinds of messages the HAL moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalMsgType {
    CmdCtrl,
    CmdDataRx,
    CmdDataTx,
    Event,
}

/// An owned, length prefixed message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HalMsg {
    data: Vec<u8>,
}
impl HalMsg {
    /// Copy `data` into a new message.
    pub fn try_from_slice(data: &[u8]) -> HalResult<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(data.len())
            .map_err(|_| HalError::NoMemory)?;
        buf.extend_from_slice(data);
        Ok(Self { data: buf })
    }
    pub(crate) fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Allocate a zeroed buffer, without aborting on allocation failure.
pub(crate) fn try_zeroed(len: usize) -> HalResult<Vec<u8>> {
    let mut buf = Vec::new();
    try_resize(&mut buf, len)?;
    Ok(buf)
}
pub(crate) fn try_resize(buf: &mut Vec<u8>, len: usize) -> HalResult<()> {
    buf.try_reserve_exact(len.saturating_sub(buf.len()))
        .map_err(|_| {
            error!("Allocation of {} bytes failed.", len);
            HalError::NoMemory
        })?;
    buf.resize(len, 0);
    Ok(())
}

/// Split `cmd` into messages of at most `max_cmd_size` bytes.
///
/// A command, that fits, yields exactly one message.
pub(crate) fn fragment(cmd: &[u8], max_cmd_size: usize) -> HalResult<Vec<HalMsg>> {
    if cmd.is_empty() || max_cmd_size == 0 {
        error!("Invalid command of {} bytes.", cmd.len());
        return Err(HalError::InvalidParam);
    }
    let mut fragments = Vec::new();
    fragments
        .try_reserve_exact(cmd.len().div_ceil(max_cmd_size))
        .map_err(|_| HalError::NoMemory)?;
    for chunk in cmd.chunks(max_cmd_size) {
        fragments.push(HalMsg::try_from_slice(chunk)?);
    }
    Ok(fragments)
}

/// Header shared by all events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgHeader {
    /// Total length of the event, including this header.
    pub len: u32,
    /// Whether the event buffer has to be handed back to the RPU.
    pub resubmit: bool,
}
impl MsgHeader {
    pub const SIZE: usize = 8;

    /// Read the header from the start of `bytes`.
    ///
    /// The length isn't checked here, see [MsgHeader::validate].
    pub fn parse(bytes: &[u8]) -> HalResult<Self> {
        let Some(header) = bytes.first_chunk::<{ Self::SIZE }>() else {
            return Err(HalError::InvalidEvent);
        };
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let resubmit = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        Ok(Self {
            len,
            resubmit: resubmit != 0,
        })
    }
    /// Check that the announced length at least covers the header.
    pub fn validate(&self) -> HalResult<()> {
        if (self.len as usize) < Self::SIZE {
            error!("Event header announces {} bytes.", self.len);
            return Err(HalError::InvalidEvent);
        }
        Ok(())
    }
}

/// Accumulator for events, which span multiple interrupts.
#[derive(Debug, Default)]
pub(crate) struct EventReassembly {
    buf: Vec<u8>,
    total_len: usize,
    resubmit: bool,
}
impl EventReassembly {
    pub(crate) fn is_active(&self) -> bool {
        self.total_len != 0
    }
    /// Bytes still missing.
    pub(crate) fn pending(&self) -> usize {
        self.total_len - self.buf.len()
    }
    pub(crate) fn resubmit(&self) -> bool {
        self.resubmit
    }
    pub(crate) fn start(&mut self, header: MsgHeader) -> HalResult<()> {
        self.reset();
        self.buf
            .try_reserve_exact(header.len as usize)
            .map_err(|_| {
                error!("Allocation of a {} byte event failed.", header.len);
                HalError::NoMemory
            })?;
        self.total_len = header.len as usize;
        self.resubmit = header.resubmit;
        Ok(())
    }
    /// Append a chunk and return the event, once it's complete.
    ///
    /// Bytes beyond the announced length are dropped.
    pub(crate) fn append(&mut self, chunk: &[u8]) -> Option<HalMsg> {
        let len = chunk.len().min(self.pending());
        self.buf.extend_from_slice(&chunk[..len]);
        if self.pending() != 0 {
            return None;
        }
        let event = HalMsg::from_vec(core::mem::take(&mut self.buf));
        self.reset();
        Some(event)
    }
    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.total_len = 0;
        self.resubmit = false;
    }
}
