// The physical address map and the system bus. The bus owns every memory
// array and every device register plane; the CPU holds a shared handle to it
// and all cross-device traffic (DMA, GIF, scheduler edges) happens between
// sibling fields of this one root value.

use crate::devices::{Console, Gif, IntLine, Intc, QwordFifo, Rdram, VideoClock, VideoEvent};
use crate::dmac::Dmac;
use crate::error::EmuError;
use crate::fields::{OpResult, Width};
use crate::gs::Gs;
use crate::vu0::VectorUnit;
use log::{trace, warn};
use std::cell::RefCell;
use std::rc::Rc;

pub const RAM_SIZE: usize = 32 * 1024 * 1024;
pub const BIOS_SIZE: usize = 4 * 1024 * 1024;
pub const SPRAM_SIZE: usize = 16 * 1024;
pub const VU1_CODE_SIZE: usize = 16 * 1024;
pub const VU1_DATA_SIZE: usize = 16 * 1024;

pub type BusPtr = Rc<RefCell<Bus>>;

// Every physical region the EE side can address. A lookup is inclusive at
// the base and exclusive at base + size.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Region {
    Ram,
    TimerIo,
    IpuIo,
    GifIo,
    Vif0Io,
    Vif1Io,
    Vif0Fifo,
    Vif1Fifo,
    GifFifo,
    IpuInFifo,
    DmacIo,
    IntcStat,
    IntcMask,
    Kputchar,
    MchRicm,
    MchDrd,
    Scattered,
    Vu0Code,
    Vu0Data,
    Vu1Code,
    Vu1Data,
    GsPriv,
    IopWindow,
    Bios,
}

const REGIONS: [(u32, u32, Region); 24] = [
    (0x0000_0000, 0x0200_0000, Region::Ram),
    (0x1000_0000, 0x0000_1840, Region::TimerIo),
    (0x1000_2000, 0x0000_0040, Region::IpuIo),
    (0x1000_3000, 0x0000_0100, Region::GifIo),
    (0x1000_3800, 0x0000_0180, Region::Vif0Io),
    (0x1000_3c00, 0x0000_0180, Region::Vif1Io),
    (0x1000_4000, 0x0000_0010, Region::Vif0Fifo),
    (0x1000_5000, 0x0000_0010, Region::Vif1Fifo),
    (0x1000_6000, 0x0000_0010, Region::GifFifo),
    (0x1000_7010, 0x0000_0010, Region::IpuInFifo),
    (0x1000_8000, 0x0000_7000, Region::DmacIo),
    (0x1000_f000, 0x0000_0004, Region::IntcStat),
    (0x1000_f010, 0x0000_0004, Region::IntcMask),
    (0x1000_f180, 0x0000_0001, Region::Kputchar),
    (0x1000_f430, 0x0000_0004, Region::MchRicm),
    (0x1000_f440, 0x0000_0004, Region::MchDrd),
    (0x1000_f100, 0x0000_0500, Region::Scattered),
    (0x1100_0000, 0x0000_1000, Region::Vu0Code),
    (0x1100_4000, 0x0000_1000, Region::Vu0Data),
    (0x1100_8000, 0x0000_4000, Region::Vu1Code),
    (0x1100_c000, 0x0000_4000, Region::Vu1Data),
    (0x1200_0000, 0x0000_2000, Region::GsPriv),
    (0x1a00_0000, 0x0001_0000, Region::IopWindow),
    (0x1fc0_0000, 0x0040_0000, Region::Bios),
];

// Physical address -> (region, offset into it). The specific 0x1000_Fxxx
// registers come before the catch-all scattered block in the table, so they
// win the scan.
pub fn decode(address: u32) -> Option<(Region, u32)> {
    for &(base, size, region) in REGIONS.iter() {
        if address >= base && address < base + size {
            return Some((region, address - base));
        }
    }
    None
}

fn buf_read(buf: &[u8], offset: usize, width: Width) -> OpResult {
    width.from_le_bytes(&buf[offset..offset + width as usize])
}

fn buf_write(buf: &mut [u8], offset: usize, value: OpResult) {
    let bytes = value.to_le_bytes();
    buf[offset..offset + bytes.len()].copy_from_slice(&bytes);
}

pub struct Bus {
    pub ram: Vec<u8>,
    pub bios: Vec<u8>,
    pub spram: Vec<u8>,
    pub vu1_code: Vec<u8>,
    pub vu1_data: Vec<u8>,
    pub intc: Intc,
    pub dmac: Dmac,
    pub gs: Gs,
    pub gif: Gif,
    pub vu0: VectorUnit,
    pub video: VideoClock,
    pub rdram: Rdram,
    pub console: Console,
    pub sif0: QwordFifo,
    pub sif1: QwordFifo,
    pub vif0: QwordFifo,
    pub vif1: QwordFifo,
    pub ipu_in: QwordFifo,
}

impl Bus {
    pub fn new(bios: Vec<u8>) -> Self {
        Bus {
            ram: vec![0; RAM_SIZE],
            bios,
            spram: vec![0; SPRAM_SIZE],
            vu1_code: vec![0; VU1_CODE_SIZE],
            vu1_data: vec![0; VU1_DATA_SIZE],
            intc: Intc::new(),
            dmac: Dmac::new(),
            gs: Gs::new(),
            gif: Gif::new(),
            vu0: VectorUnit::new(),
            video: VideoClock::new(),
            rdram: Rdram::new(),
            console: Console::new(),
            sif0: QwordFifo::new("SIF0"),
            sif1: QwordFifo::new("SIF1"),
            vif0: QwordFifo::new("VIF0"),
            vif1: QwordFifo::new("VIF1"),
            ipu_in: QwordFifo::new("IPU"),
        }
    }

    fn check_width(region_width: Width, addr: u32, width: Width) -> Result<(), EmuError> {
        if width == region_width {
            Ok(())
        } else {
            Err(EmuError::Width { addr, width })
        }
    }

    pub fn read(&mut self, addr: u32, width: Width) -> Result<OpResult, EmuError> {
        let (region, offset) = decode(addr).ok_or(EmuError::Address { addr })?;
        let offset = offset as usize;
        match region {
            Region::Ram => Ok(buf_read(&self.ram, offset, width)),
            Region::Bios => Ok(buf_read(&self.bios, offset, width)),
            Region::Vu0Code => Ok(buf_read(&self.vu0.code, offset, width)),
            Region::Vu0Data => Ok(buf_read(&self.vu0.data, offset, width)),
            Region::Vu1Code => Ok(buf_read(&self.vu1_code, offset, width)),
            Region::Vu1Data => Ok(buf_read(&self.vu1_data, offset, width)),
            Region::IntcStat => {
                Self::check_width(Width::Word, addr, width)?;
                Ok(OpResult::Word(self.intc.get_stat()))
            }
            Region::IntcMask => {
                Self::check_width(Width::Word, addr, width)?;
                Ok(OpResult::Word(self.intc.get_mask()))
            }
            Region::DmacIo => {
                Self::check_width(Width::Word, addr, width)?;
                Ok(OpResult::Word(self.dmac_io_read(addr)?))
            }
            Region::GsPriv => {
                Self::check_width(Width::Dword, addr, width)?;
                Ok(OpResult::Dword(self.gs.read_priv(offset as u32)?))
            }
            Region::MchRicm => {
                Self::check_width(Width::Word, addr, width)?;
                Ok(OpResult::Word(self.rdram.read_ricm()))
            }
            Region::MchDrd => {
                Self::check_width(Width::Word, addr, width)?;
                Ok(OpResult::Word(self.rdram.read_drd()?))
            }
            Region::Kputchar => {
                Self::check_width(Width::Byte, addr, width)?;
                Ok(OpResult::Byte(0))
            }
            Region::Vif0Fifo | Region::Vif1Fifo | Region::GifFifo | Region::IpuInFifo => {
                Self::check_width(Width::Qword, addr, width)?;
                warn!("[BUS] read of write-only FIFO at {:#010x}", addr);
                Ok(OpResult::Qword(0))
            }
            Region::TimerIo | Region::IpuIo | Region::GifIo | Region::Vif0Io | Region::Vif1Io => {
                Self::check_width(Width::Word, addr, width)?;
                trace!("[BUS] read of stub I/O register {:#010x}", addr);
                Ok(OpResult::Word(0))
            }
            Region::Scattered | Region::IopWindow => {
                trace!("[BUS] read of scattered register {:#010x}", addr);
                Ok(width.zero())
            }
        }
    }

    pub fn write(&mut self, addr: u32, value: OpResult) -> Result<(), EmuError> {
        let width = value.width();
        let (region, offset) = decode(addr).ok_or(EmuError::Address { addr })?;
        let offset = offset as usize;
        match region {
            Region::Ram => buf_write(&mut self.ram, offset, value),
            Region::Bios => warn!("[BUS] write {} to read-only BIOS at {:#010x}", value, addr),
            Region::Vu0Code => buf_write(&mut self.vu0.code, offset, value),
            Region::Vu0Data => buf_write(&mut self.vu0.data, offset, value),
            Region::Vu1Code => buf_write(&mut self.vu1_code, offset, value),
            Region::Vu1Data => buf_write(&mut self.vu1_data, offset, value),
            Region::IntcStat => {
                Self::check_width(Width::Word, addr, width)?;
                self.intc.set_stat(value.inner() as u32);
            }
            Region::IntcMask => {
                Self::check_width(Width::Word, addr, width)?;
                self.intc.set_mask(value.inner() as u32);
            }
            Region::DmacIo => {
                Self::check_width(Width::Word, addr, width)?;
                self.dmac_io_write(addr, value.inner() as u32)?;
            }
            Region::GsPriv => {
                Self::check_width(Width::Dword, addr, width)?;
                self.gs.write_priv(offset as u32, value.inner() as u64)?;
            }
            Region::MchRicm => {
                Self::check_width(Width::Word, addr, width)?;
                self.rdram.write_ricm(value.inner() as u32);
            }
            Region::MchDrd => {
                Self::check_width(Width::Word, addr, width)?;
                self.rdram.write_drd(value.inner() as u32);
            }
            Region::Kputchar => {
                Self::check_width(Width::Byte, addr, width)?;
                self.console.putchar(value.inner() as u8);
            }
            Region::GifFifo => {
                Self::check_width(Width::Qword, addr, width)?;
                self.gif.push(&mut self.gs, value.inner())?;
            }
            Region::Vif0Fifo => {
                Self::check_width(Width::Qword, addr, width)?;
                self.vif0.push(value.inner());
            }
            Region::Vif1Fifo => {
                Self::check_width(Width::Qword, addr, width)?;
                self.vif1.push(value.inner());
            }
            Region::IpuInFifo => {
                Self::check_width(Width::Qword, addr, width)?;
                self.ipu_in.push(value.inner());
            }
            Region::TimerIo | Region::IpuIo | Region::GifIo | Region::Vif0Io | Region::Vif1Io => {
                Self::check_width(Width::Word, addr, width)?;
                trace!("[BUS] write {} to stub I/O register {:#010x}", value, addr);
            }
            Region::Scattered | Region::IopWindow => {
                trace!("[BUS] write {} to scattered register {:#010x}", value, addr);
            }
        }
        Ok(())
    }

    // The five concrete access widths the CPU dispatches through.
    pub fn read8(&mut self, addr: u32) -> Result<u8, EmuError> {
        Ok(self.read(addr, Width::Byte)?.inner() as u8)
    }
    pub fn read16(&mut self, addr: u32) -> Result<u16, EmuError> {
        Ok(self.read(addr, Width::Half)?.inner() as u16)
    }
    pub fn read32(&mut self, addr: u32) -> Result<u32, EmuError> {
        Ok(self.read(addr, Width::Word)?.inner() as u32)
    }
    pub fn read64(&mut self, addr: u32) -> Result<u64, EmuError> {
        Ok(self.read(addr, Width::Dword)?.inner() as u64)
    }
    pub fn read128(&mut self, addr: u32) -> Result<u128, EmuError> {
        Ok(self.read(addr, Width::Qword)?.inner())
    }
    pub fn write8(&mut self, addr: u32, value: u8) -> Result<(), EmuError> {
        self.write(addr, OpResult::Byte(value))
    }
    pub fn write16(&mut self, addr: u32, value: u16) -> Result<(), EmuError> {
        self.write(addr, OpResult::Half(value))
    }
    pub fn write32(&mut self, addr: u32, value: u32) -> Result<(), EmuError> {
        self.write(addr, OpResult::Word(value))
    }
    pub fn write64(&mut self, addr: u32, value: u64) -> Result<(), EmuError> {
        self.write(addr, OpResult::Dword(value))
    }
    pub fn write128(&mut self, addr: u32, value: u128) -> Result<(), EmuError> {
        self.write(addr, OpResult::Qword(value))
    }

    // Advance the scanline scheduler by the cycles the CPU just spent and
    // apply the resulting edges. Returns true once per frame, at the start
    // of vertical blanking, when the display buffer is ready to present.
    pub fn tick(&mut self, cycles: u64) -> bool {
        let mut events = Vec::new();
        self.video.advance(cycles, &mut events);
        let mut frame = false;
        for event in events {
            match event {
                VideoEvent::Hblank => self.gs.signal_hsint(),
                VideoEvent::VblankStart => {
                    self.intc.raise(IntLine::VblankStart);
                    self.gs.signal_vsint();
                    self.gs.toggle_field();
                    frame = true;
                }
                VideoEvent::VblankEnd => self.intc.raise(IntLine::VblankEnd),
            }
        }
        if self.gs.take_irq() {
            self.intc.raise(IntLine::Gs);
        }
        frame
    }
}
