//! Wire layout for fragments, as produced by contributors.
//!
//! The header layout is fixed by the transport's producers; the core only
//! ever reads it. Payload bytes are opaque — the builder reduces them with a
//! contributor-supplied function, never interprets them itself.

use bytemuck::{Pod, Zeroable};

use crate::error::{EvbError, Result};

/// 20-byte fixed header in front of every fragment. `#[repr(C)]` plus
/// `Pod`/`Zeroable` so a raw byte slice from registered memory can be
/// reinterpreted without a copy.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct FragmentHeader {
    /// Monotonically-useful sequence key identifying the event.
    pub pulse_id: u64,
    /// Transition/service code. Only `L1_ACCEPT` is interpreted by this core;
    /// see the crate-level docs for why other transitions are out of scope.
    pub service: u32,
    /// High bits: producer id (0..63). Low 16 bits: remote buffer index at
    /// the producer, echoed back so the producer knows which of its own
    /// slots a given result corresponds to.
    pub source_tag: u32,
    /// Payload length in bytes, immediately following this header.
    pub extent: u32,
}

/// Non-L1Accept transition code. Transition handling beyond L1Accept is not
/// part of this core; fragments carrying one are rejected rather than
/// silently misrouted.
pub const SERVICE_L1_ACCEPT: u32 = 0;

impl FragmentHeader {
    pub fn producer_id(&self) -> u8 {
        (self.source_tag >> 16) as u8
    }

    pub fn remote_index(&self) -> u16 {
        (self.source_tag & 0xffff) as u16
    }

    pub fn pack_source_tag(producer_id: u8, remote_index: u16) -> u32 {
        ((producer_id as u32) << 16) | (remote_index as u32)
    }
}

/// A fragment as read out of registered memory: a borrowed header plus
/// payload, with no ownership of the underlying bytes (those belong to the
/// contributor and are released back to the transport with the batch).
#[derive(Clone, Copy)]
pub struct Fragment<'a> {
    pub header: FragmentHeader,
    pub payload: &'a [u32],
}

impl<'a> Fragment<'a> {
    /// Parse a fragment out of a contiguous byte slice: header followed by
    /// `extent` bytes of payload, which must be a whole number of 32-bit
    /// words (the only payload shape this core reduces).
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let header_size = std::mem::size_of::<FragmentHeader>();
        if bytes.len() < header_size {
            return Err(EvbError::invalid_fragment("buffer shorter than header"));
        }
        let header = *bytemuck::from_bytes::<FragmentHeader>(&bytes[..header_size]);
        let extent = header.extent as usize;
        if bytes.len() < header_size + extent {
            return Err(EvbError::invalid_fragment("buffer shorter than declared extent"));
        }
        if extent % 4 != 0 {
            return Err(EvbError::invalid_fragment("extent is not a whole number of words"));
        }
        let payload = bytemuck::cast_slice(&bytes[header_size..header_size + extent]);
        Ok(Self { header, payload })
    }

    #[inline]
    pub fn pulse_id(&self) -> u64 {
        self.header.pulse_id
    }

    #[inline]
    pub fn producer_id(&self) -> u8 {
        self.header.producer_id()
    }

    #[inline]
    pub fn remote_index(&self) -> u16 {
        self.header.remote_index()
    }
}
