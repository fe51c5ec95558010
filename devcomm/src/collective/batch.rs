use crate::buffer::BufferView;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{GroupConfig, Rank, StreamHandle};
use crate::wire::{WireDescriptor, describe};

/// Scoped group of point-to-point calls issued as one unit.
///
/// `group_start` is called on creation and `group_end` on [`finish`] or,
/// failing that, on drop, so the transport is never left with an open
/// group. Only errors from `finish` reach the caller; a close that fails
/// during drop is logged.
///
/// [`finish`]: Batch::finish
pub struct Batch<'a, T: Transport> {
    transport: &'a T,
    group: GroupConfig,
    stream: StreamHandle,
    open: bool,
}

impl<'a, T: Transport> Batch<'a, T> {
    pub(crate) fn open(transport: &'a T, group: GroupConfig, stream: StreamHandle) -> Result<Self> {
        transport.group_start()?;
        Ok(Self {
            transport,
            group,
            stream,
            open: true,
        })
    }

    /// Queue a send of `buf` to `peer`.
    ///
    /// # Safety
    /// `buf` must satisfy [`BufferView::from_raw`]'s contract until the
    /// batch is finished and the stream has executed it.
    pub unsafe fn send(&self, buf: &BufferView, peer: Rank) -> Result<()> {
        self.group.check_rank(peer)?;
        let desc = describe(buf, "send", "input")?;
        unsafe { self.send_wire(&desc, peer) }
    }

    /// Queue a receive into `buf` from `peer`.
    ///
    /// # Safety
    /// Same as [`Batch::send`].
    pub unsafe fn recv(&self, buf: &BufferView, peer: Rank) -> Result<()> {
        self.group.check_rank(peer)?;
        let desc = describe(buf, "recv", "output")?;
        unsafe { self.recv_wire(&desc, peer) }
    }

    pub(crate) unsafe fn send_wire(&self, desc: &WireDescriptor, peer: Rank) -> Result<()> {
        unsafe {
            self.transport
                .send(desc.ptr, desc.count, desc.wire_type, peer, self.stream)
        }
    }

    pub(crate) unsafe fn recv_wire(&self, desc: &WireDescriptor, peer: Rank) -> Result<()> {
        unsafe {
            self.transport
                .recv(desc.ptr, desc.count, desc.wire_type, peer, self.stream)
        }
    }

    /// Close the group, issuing everything queued since it was opened.
    pub fn finish(mut self) -> Result<()> {
        self.open = false;
        self.transport.group_end()
    }
}

impl<T: Transport> Drop for Batch<'_, T> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.transport.group_end() {
                tracing::error!(rank = self.group.rank(), error = %e, "failed to close transport group");
            }
        }
    }
}
