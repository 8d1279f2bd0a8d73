// The small devices that sit beside the big register planes: the EE-side
// interrupt controller, the scanline scheduler, the GIF front door of the GS,
// the stub peripheral FIFOs, the kernel console sink and the RDRAM
// controller handshake the BIOS probes at boot.

use crate::error::EmuError;
use crate::gs::{reg, Gs};
use log::{debug, trace};
use std::collections::VecDeque;
use std::io::Write;

pub enum Signal {
    Ok,
    Quit,
    NoOp,
}

// EE interrupt controller lines, INTC_STAT/INTC_MASK bit positions.
#[derive(Debug, Copy, Clone)]
pub enum IntLine {
    Gs = 0,
    Sbus = 1,
    VblankStart = 2,
    VblankEnd = 3,
    Vif0 = 4,
    Vif1 = 5,
    Vu0 = 6,
    Vu1 = 7,
    Ipu = 8,
    Timer0 = 9,
    Timer1 = 10,
    Timer2 = 11,
    Timer3 = 12,
    Sfifo = 13,
    Vu0Watchdog = 14,
}

// Two 15-bit registers. STAT is write-to-clear; MASK is plain replace. An
// interrupt is pending toward the EE whenever they intersect.
pub struct Intc {
    mask: u16,
    stat: u16,
}

impl Intc {
    pub fn new() -> Self {
        Intc { mask: 0, stat: 0 }
    }
    pub fn get_mask(&self) -> u32 {
        self.mask as u32
    }
    pub fn get_stat(&self) -> u32 {
        self.stat as u32
    }
    pub fn set_mask(&mut self, value: u32) {
        self.mask = (value & 0x7fff) as u16;
    }
    pub fn set_stat(&mut self, value: u32) {
        self.stat &= !(value & 0x7fff) as u16;
    }
    pub fn raise(&mut self, line: IntLine) {
        trace!("[INTC] raise {:?}", line);
        self.stat |= 1 << line as u16;
    }
    pub fn pending(&self) -> bool {
        self.stat & self.mask != 0
    }
}

pub const CYCLES_PER_SCANLINE: u64 = 9371;
pub const LINES_PER_FRAME: u32 = 544;
pub const VBLANK_START_LINE: u32 = 480;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VideoEvent {
    Hblank,
    VblankStart,
    VblankEnd,
}

// The scanline counter. The orchestrator reports elapsed EE cycles after
// every step; crossing a scanline boundary produces HBLANK work and the two
// VBLANK edges that drive INTC and the GS FIELD/VSINT state.
pub struct VideoClock {
    cycles: u64,
    pub line: u32,
}

impl VideoClock {
    pub fn new() -> Self {
        VideoClock { cycles: 0, line: 0 }
    }
    pub fn advance(&mut self, elapsed: u64, events: &mut Vec<VideoEvent>) {
        self.cycles += elapsed;
        while self.cycles >= CYCLES_PER_SCANLINE {
            self.cycles -= CYCLES_PER_SCANLINE;
            self.line += 1;
            events.push(VideoEvent::Hblank);
            if self.line == VBLANK_START_LINE {
                events.push(VideoEvent::VblankStart);
            }
            if self.line == LINES_PER_FRAME {
                self.line = 0;
                events.push(VideoEvent::VblankEnd);
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum GifMode {
    Packed,
    Reglist,
    Image,
}

struct GifTag {
    nloop: u32,
    mode: GifMode,
    regs: Vec<u8>,
    reg_index: usize,
}

// The Graphics Interface: quadwords arrive here from the GIF FIFO and the
// PATH3 DMA channel, get parsed as GIFtags and demuxed onto the GS write
// surfaces.
pub struct Gif {
    tag: Option<GifTag>,
}

impl Gif {
    pub fn new() -> Self {
        Gif { tag: None }
    }

    pub fn push(&mut self, gs: &mut Gs, qword: u128) -> Result<(), EmuError> {
        match self.tag.take() {
            None => self.start_tag(gs, qword),
            Some(tag) => self.feed(gs, tag, qword),
        }
    }

    fn start_tag(&mut self, gs: &mut Gs, qword: u128) -> Result<(), EmuError> {
        let nloop = (qword & 0x7fff) as u32;
        let eop = qword & 1 << 15 != 0;
        let pre = qword & 1 << 46 != 0;
        let prim = (qword >> 47) as u64 & 0x7ff;
        let mode = match qword >> 58 & 3 {
            0 => GifMode::Packed,
            1 => GifMode::Reglist,
            // 3 is documented as IMAGE as well
            _ => GifMode::Image,
        };
        let nregs = match (qword >> 60 & 0xf) as usize {
            0 => 16,
            n => n,
        };
        let regs = (0..nregs).map(|j| (qword >> (64 + 4 * j)) as u8 & 0xf).collect();
        trace!(
            "[GIF] tag nloop {} eop {} mode {:?} nregs {}",
            nloop, eop, mode, nregs
        );
        if mode == GifMode::Packed && pre {
            gs.write_internal(reg::PRIM, prim)?;
        }
        if nloop > 0 {
            self.tag = Some(GifTag { nloop, mode, regs, reg_index: 0 });
        }
        Ok(())
    }

    fn feed(&mut self, gs: &mut Gs, mut tag: GifTag, qword: u128) -> Result<(), EmuError> {
        match tag.mode {
            GifMode::Packed => {
                let descriptor = tag.regs[tag.reg_index];
                gs.write_packed(descriptor, qword)?;
                tag.reg_index += 1;
                if tag.reg_index == tag.regs.len() {
                    tag.reg_index = 0;
                    tag.nloop -= 1;
                }
            }
            GifMode::Reglist => {
                for half in 0..2 {
                    if tag.nloop == 0 {
                        break;
                    }
                    let descriptor = tag.regs[tag.reg_index];
                    let data = (qword >> (64 * half)) as u64;
                    // 0xe carries no address in a reglist; both it and 0xf
                    // are padding.
                    if descriptor < 0xe {
                        gs.write_internal(descriptor, data)?;
                    }
                    tag.reg_index += 1;
                    if tag.reg_index == tag.regs.len() {
                        tag.reg_index = 0;
                        tag.nloop -= 1;
                    }
                }
            }
            GifMode::Image => {
                gs.write_internal(reg::HWREG, qword as u64)?;
                gs.write_internal(reg::HWREG, (qword >> 64) as u64)?;
                tag.nloop -= 1;
            }
        }
        if tag.nloop > 0 {
            self.tag = Some(tag);
        }
        Ok(())
    }
}

// A stub peripheral that swallows (or supplies) quadwords across the bus
// boundary. The real VIF/SIF/IPU cores live outside this crate; what matters
// here is that DMA and FIFO traffic has somewhere observable to go.
pub struct QwordFifo {
    name: &'static str,
    pub fifo: VecDeque<u128>,
}

impl QwordFifo {
    pub fn new(name: &'static str) -> Self {
        QwordFifo { name, fifo: VecDeque::new() }
    }
    pub fn push(&mut self, qword: u128) {
        trace!("[{}] <- {:#034x}", self.name, qword);
        self.fifo.push_back(qword);
    }
    pub fn pop(&mut self) -> Option<u128> {
        self.fifo.pop_front()
    }
}

// The KPUTCHAR port. The kernel prints its boot log one byte at a time;
// zero writes are padding and stay silent.
pub struct Console {
    pub buffer: Vec<u8>,
}

impl Console {
    pub fn new() -> Self {
        Console { buffer: Vec::new() }
    }
    pub fn putchar(&mut self, byte: u8) {
        if byte == 0 {
            return;
        }
        self.buffer.push(byte);
        let mut out = std::io::stdout();
        let _ = out.write_all(&[byte]);
        let _ = out.flush();
    }
}

// The RDRAM controller handshake: the BIOS walks the serial-command
// protocol through MCH_RICM/MCH_DRD to count memory devices.
pub struct Rdram {
    mch_ricm: u32,
    mch_drd: u32,
    sdev_id: u32,
}

impl Rdram {
    pub fn new() -> Self {
        Rdram { mch_ricm: 0, mch_drd: 0, sdev_id: 0 }
    }

    pub fn write_ricm(&mut self, value: u32) {
        self.mch_ricm = value & !(1 << 31);
        let sa = self.mch_ricm >> 16 & 0xfff;
        let sbc = self.mch_ricm & 0x20 != 0;
        if sa == 0x21 && sbc && self.mch_drd & 0x80 == 0 {
            self.sdev_id = 0;
        }
        debug!("[RDRAM] MCH_RICM <- {:#010x}", value);
    }

    pub fn write_drd(&mut self, value: u32) {
        self.mch_drd = value;
    }

    pub fn read_ricm(&self) -> u32 {
        self.mch_ricm
    }

    pub fn read_drd(&mut self) -> Result<u32, EmuError> {
        let sop = self.mch_ricm >> 6 & 0xf;
        if sop != 0 {
            return Ok(0);
        }
        match self.mch_ricm >> 16 & 0xfff {
            0x21 => {
                if self.sdev_id < 2 {
                    self.sdev_id += 1;
                    Ok(0x1f)
                } else {
                    Ok(0)
                }
            }
            0x40 => Ok(self.mch_ricm & 0x1f),
            sa => Err(EmuError::Unhandled(format!(
                "RDRAM serial read with SA {:#05x}",
                sa
            ))),
        }
    }
}
