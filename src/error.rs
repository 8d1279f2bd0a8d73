//! This module provides an `Error` type for the crate using the [`thiserror`] crate.
use crate::fields::Width;
use thiserror::Error;

/// The `Error` type. Every variant is a fatal host-level condition; guest
/// MIPS exceptions never surface here, they are vectored inside the
/// interpreter instead.
#[derive(Debug, Error)]
pub enum EmuError {
    /// An opcode the decoder does not know.
    #[error("[EE] unknown instruction {opcode:#010x} at pc {pc:#010x}")]
    Decode { pc: u32, opcode: u32 },
    /// An access outside every mapped region.
    #[error("[BUS] access to unmapped address {addr:#010x}")]
    Address { addr: u32 },
    /// A naturally misaligned CPU access.
    #[error("[EE] misaligned {width}-byte access at {addr:#010x}")]
    Alignment { addr: u32, width: Width },
    /// An I/O region touched at a width it does not support.
    #[error("[BUS] unsupported {width}-byte access at {addr:#010x}")]
    Width { addr: u32, width: Width },
    /// A DMA decoding failure: unknown channel, tag id or transfer mode.
    #[error("[DMAC] {0}")]
    Dma(String),
    /// A fatal register setting on the Graphics Synthesizer.
    #[error("[GS] {0}")]
    Gs(String),
    /// The BIOS image is missing or has the wrong size.
    #[error("[BIOS] {0}")]
    Bios(String),
    /// A bus-side protocol the core refuses to guess at.
    #[error("[BUS] {0}")]
    Unhandled(String),
    /// Wraps ['std::io::Error'].
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
