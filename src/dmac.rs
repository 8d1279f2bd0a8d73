// The DMA controller: ten channels of (CHCR, MADR, QWC, TADR, ASR0/1, SADR)
// plus the global control registers, and the source-chain walker that parses
// in-band DMA tags and bursts quadwords from memory into the peripheral
// sinks. The walker runs to tag-end synchronously: a store that starts a
// transfer sees it complete before the next instruction.

use crate::error::EmuError;
use crate::memory::Bus;
use log::{debug, trace, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelId {
    Vif0,
    Vif1,
    Gif,
    IpuFrom,
    IpuTo,
    Sif0,
    Sif1,
    Sif2,
    SprFrom,
    SprTo,
}

pub const CHANNELS: [ChannelId; 10] = [
    ChannelId::Vif0,
    ChannelId::Vif1,
    ChannelId::Gif,
    ChannelId::IpuFrom,
    ChannelId::IpuTo,
    ChannelId::Sif0,
    ChannelId::Sif1,
    ChannelId::Sif2,
    ChannelId::SprFrom,
    ChannelId::SprTo,
];

impl ChannelId {
    // Channels are addressed by the top byte of the I/O offset.
    pub fn from_byte(byte: u32) -> Option<Self> {
        match byte {
            0x80 => Some(Self::Vif0),
            0x90 => Some(Self::Vif1),
            0xa0 => Some(Self::Gif),
            0xb0 => Some(Self::IpuFrom),
            0xb4 => Some(Self::IpuTo),
            0xc0 => Some(Self::Sif0),
            0xc4 => Some(Self::Sif1),
            0xc8 => Some(Self::Sif2),
            0xd0 => Some(Self::SprFrom),
            0xd4 => Some(Self::SprTo),
            _ => None,
        }
    }
    pub fn index(&self) -> usize {
        *self as usize
    }
    // Channels whose peer is the IOP drop their request line once a
    // transfer completes; the others are always-ready sinks.
    fn iop_facing(&self) -> bool {
        matches!(self, Self::Sif0 | Self::Sif1 | Self::Sif2)
    }
    fn always_ready(&self) -> bool {
        matches!(self, Self::Vif0 | Self::Vif1 | Self::Gif | Self::IpuTo | Self::SprTo)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    ToMemory,
    FromMemory,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Chain,
    Interleave,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Channel {
    pub chcr: u32,
    pub madr: u32,
    pub qwc: u32,
    pub tadr: u32,
    pub asr: [u32; 2],
    pub sadr: u32,
    pub req: bool,
}

impl Channel {
    pub fn direction(&self) -> Direction {
        if self.chcr & 1 != 0 {
            Direction::FromMemory
        } else {
            Direction::ToMemory
        }
    }
    pub fn mode(&self) -> Option<Mode> {
        match self.chcr >> 2 & 3 {
            0 => Some(Mode::Normal),
            1 => Some(Mode::Chain),
            2 => Some(Mode::Interleave),
            _ => None,
        }
    }
    pub fn asp(&self) -> usize {
        (self.chcr >> 4 & 3) as usize
    }
    fn set_asp(&mut self, asp: usize) {
        self.chcr = (self.chcr & !0x30) | ((asp as u32 & 3) << 4);
    }
    pub fn tte(&self) -> bool {
        self.chcr & 1 << 6 != 0
    }
    pub fn tie(&self) -> bool {
        self.chcr & 1 << 7 != 0
    }
    pub fn str(&self) -> bool {
        self.chcr & 1 << 8 != 0
    }
    fn clear_str(&mut self) {
        self.chcr &= !(1 << 8);
    }
    // Bits 16..31 of the most recent DMA tag are reflected into CHCR.
    fn set_tag(&mut self, tag: u16) {
        self.chcr = (self.chcr & 0xffff) | (tag as u32) << 16;
    }
}

// The lower 64 bits of a source-chain DMA tag.
#[derive(Debug, Copy, Clone)]
struct DmaTag {
    qwc: u32,
    id: u32,
    irq: bool,
    addr: u32,
}

impl DmaTag {
    fn decode(qword: u128) -> Self {
        let low = qword as u64;
        DmaTag {
            qwc: (low & 0xffff) as u32,
            id: (low >> 28 & 7) as u32,
            irq: low & 1 << 31 != 0,
            // 31-bit address, quadword aligned; bit 63 selects scratchpad
            addr: ((low >> 32) as u32 & 0x7fff_fff0) | ((low >> 63) as u32) << 31,
        }
    }
}

pub struct Dmac {
    pub channels: [Channel; 10],
    pub ctrl: u32,
    pub stat: u32,
    pub pcr: u32,
    sqwc: u32,
    rbsr: u32,
    rbor: u32,
    stadr: u32,
}

impl Dmac {
    pub fn new() -> Self {
        let mut dmac = Dmac {
            channels: [Channel::default(); 10],
            ctrl: 0,
            stat: 0,
            pcr: 0,
            sqwc: 0,
            rbsr: 0,
            rbor: 0,
            stadr: 0,
        };
        for id in CHANNELS.iter() {
            // SIF1 has its request line preset by the IOP at boot; the pure
            // sink channels are always ready to accept.
            dmac.channels[id.index()].req = id.always_ready() || *id == ChannelId::Sif1;
        }
        dmac
    }
    pub fn enabled(&self) -> bool {
        self.ctrl & 1 != 0
    }
    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }
    pub fn channel_mut(&mut self, id: ChannelId) -> &mut Channel {
        &mut self.channels[id.index()]
    }
}

impl Bus {
    pub fn dmac_io_read(&mut self, addr: u32) -> Result<u32, EmuError> {
        match addr {
            0x1000_e000 => return Ok(self.dmac.ctrl),
            0x1000_e010 => return Ok(self.dmac.stat),
            0x1000_e020 => return Ok(self.dmac.pcr),
            0x1000_e030 => return Ok(self.dmac.sqwc),
            0x1000_e040 => return Ok(self.dmac.rbsr),
            0x1000_e050 => return Ok(self.dmac.rbor),
            0x1000_e060 => return Ok(self.dmac.stadr),
            0x1000_e000..=0x1000_efff => {
                warn!("[DMAC] read of unknown global register {:#010x}", addr);
                return Ok(0);
            }
            _ => {}
        }
        let id = ChannelId::from_byte(addr >> 8 & 0xff)
            .ok_or_else(|| EmuError::Dma(format!("unknown channel at {:#010x}", addr)))?;
        let channel = self.dmac.channel(id);
        let value = match addr & 0xff {
            0x00 => channel.chcr,
            0x10 => channel.madr,
            0x20 => channel.qwc,
            0x30 => channel.tadr,
            0x40 => channel.asr[0],
            0x50 => channel.asr[1],
            0x80 => channel.sadr,
            _ => {
                warn!("[DMAC] read of unknown {:?} register {:#010x}", id, addr);
                0
            }
        };
        Ok(value)
    }

    pub fn dmac_io_write(&mut self, addr: u32, value: u32) -> Result<(), EmuError> {
        match addr {
            0x1000_e000 => {
                self.dmac.ctrl = value;
                debug!("[DMAC] D_CTRL <- {:#010x}", value);
                if value & 1 != 0 {
                    self.dmac_check_running()?;
                }
                return Ok(());
            }
            0x1000_e010 => {
                // low half write-to-clear, high half toggles the mask
                let stat = self.dmac.stat;
                self.dmac.stat = (stat & !(value & 0xffff)) ^ (value & 0xffff_0000);
                return Ok(());
            }
            0x1000_e020 => {
                self.dmac.pcr = value;
                return Ok(());
            }
            0x1000_e030 => {
                self.dmac.sqwc = value;
                return Ok(());
            }
            0x1000_e040 => {
                self.dmac.rbsr = value;
                return Ok(());
            }
            0x1000_e050 => {
                self.dmac.rbor = value;
                return Ok(());
            }
            0x1000_e060 => {
                self.dmac.stadr = value;
                return Ok(());
            }
            0x1000_e000..=0x1000_efff => {
                warn!("[DMAC] write {:#010x} to unknown global register {:#010x}", value, addr);
                return Ok(());
            }
            _ => {}
        }
        let id = ChannelId::from_byte(addr >> 8 & 0xff)
            .ok_or_else(|| EmuError::Dma(format!("unknown channel at {:#010x}", addr)))?;
        let channel = self.dmac.channel_mut(id);
        match addr & 0xff {
            0x00 => {
                channel.chcr = value;
                trace!("[DMAC] {:?} CHCR <- {:#010x}", id, value);
                self.dmac_check_running()?;
            }
            0x10 => channel.madr = value & 0xffff_fff0,
            0x20 => channel.qwc = value & 0xffff,
            0x30 => channel.tadr = value & 0xffff_fff0,
            0x40 => channel.asr[0] = value & 0xffff_fff0,
            0x50 => channel.asr[1] = value & 0xffff_fff0,
            0x80 => channel.sadr = value & 0x3ff0,
            _ => warn!("[DMAC] write {:#010x} to unknown {:?} register {:#010x}", value, id, addr),
        }
        Ok(())
    }

    // Scan the channels in ascending id order and run every one that is
    // both started (CHCR.STR) and requested by its peer.
    pub fn dmac_check_running(&mut self) -> Result<(), EmuError> {
        if !self.dmac.enabled() {
            return Ok(());
        }
        for id in CHANNELS.iter() {
            let channel = *self.dmac.channel(*id);
            if !channel.str() || !channel.req {
                continue;
            }
            match channel.mode() {
                Some(Mode::Chain) => self.dmac_source_chain(*id)?,
                Some(mode) => {
                    return Err(EmuError::Dma(format!("unhandled {:?} transfer on {:?}", mode, id)))
                }
                None => return Err(EmuError::Dma(format!("reserved transfer mode on {:?}", id))),
            }
        }
        Ok(())
    }

    // The source-chain walker: follow tags from TADR, moving each burst of
    // QWC quadwords from MADR into the channel sink, until a terminating
    // tag (Refe/End, or an IRQ tag with TIE set) ends the transfer.
    fn dmac_source_chain(&mut self, id: ChannelId) -> Result<(), EmuError> {
        if self.dmac.channel(id).direction() == Direction::ToMemory {
            return Err(EmuError::Dma(format!("from-direction chain on {:?} unhandled", id)));
        }
        debug!("[DMAC] {:?} source chain from tadr {:#010x}", id, self.dmac.channel(id).tadr);
        // a QWC left over from before the chain drains first
        if self.dmac.channel(id).qwc > 0 {
            self.dma_burst(id)?;
        }
        loop {
            let mut end = false;
            let tadr = self.dmac.channel(id).tadr;
            let qword = self.dma_load_qword(tadr)?;
            let tag = DmaTag::decode(qword);
            trace!("[DMAC] {:?} tag id {} qwc {} addr {:#010x}", id, tag.id, tag.qwc, tag.addr);
            {
                let channel = self.dmac.channel_mut(id);
                channel.set_tag((qword as u64 >> 16) as u16);
                channel.qwc = tag.qwc;
                match tag.id {
                    // Refe: transfer from the tag address, then stop.
                    0 => {
                        channel.madr = tag.addr;
                        end = true;
                    }
                    // Cnt: data follows the tag, next tag follows the data.
                    1 => {
                        channel.madr = tadr.wrapping_add(16);
                        channel.tadr = channel.madr.wrapping_add(16 * tag.qwc);
                    }
                    // Next: data follows the tag, next tag at the tag address.
                    2 => {
                        channel.madr = tadr.wrapping_add(16);
                        channel.tadr = tag.addr;
                    }
                    // Ref/Refs: data at the tag address, tags advance linearly.
                    3 | 4 => {
                        channel.madr = tag.addr;
                        channel.tadr = tadr.wrapping_add(16);
                    }
                    // Call: as Cnt, but remember where to come back to.
                    5 => {
                        let asp = channel.asp();
                        if asp >= 2 {
                            return Err(EmuError::Dma(format!("ASR stack overflow on {:?}", id)));
                        }
                        channel.asr[asp] = tadr.wrapping_add(16);
                        channel.set_asp(asp + 1);
                        channel.madr = tadr.wrapping_add(16);
                        channel.tadr = tag.addr;
                    }
                    // Ret: pop the remembered tag address.
                    6 => {
                        let asp = channel.asp();
                        if asp == 0 {
                            return Err(EmuError::Dma(format!("ASR stack underflow on {:?}", id)));
                        }
                        channel.set_asp(asp - 1);
                        channel.tadr = channel.asr[asp - 1];
                        channel.madr = channel.tadr.wrapping_add(16);
                    }
                    // End: transfer the trailing data, then stop.
                    7 => {
                        channel.madr = tadr.wrapping_add(16);
                        end = true;
                    }
                    _ => {
                        return Err(EmuError::Dma(format!("unknown tag id {} on {:?}", tag.id, id)))
                    }
                }
            }
            if self.dmac.channel(id).tte() {
                self.dma_sink(id, qword)?;
            }
            self.dma_burst(id)?;
            if tag.irq && self.dmac.channel(id).tie() {
                end = true;
            }
            if end {
                break;
            }
        }
        let channel = self.dmac.channel_mut(id);
        channel.clear_str();
        if id.iop_facing() {
            channel.req = false;
        }
        self.dmac.stat |= 1 << id.index();
        debug!("[DMAC] {:?} chain complete", id);
        Ok(())
    }

    // Move the channel's current QWC quadwords from MADR into its sink.
    fn dma_burst(&mut self, id: ChannelId) -> Result<(), EmuError> {
        while self.dmac.channel(id).qwc > 0 {
            let madr = self.dmac.channel(id).madr;
            let qword = self.dma_load_qword(madr)?;
            self.dma_sink(id, qword)?;
            let channel = self.dmac.channel_mut(id);
            channel.madr = madr.wrapping_add(16);
            channel.qwc -= 1;
        }
        Ok(())
    }

    // Bit 31 of a DMA address selects the scratchpad instead of main memory.
    fn dma_load_qword(&mut self, addr: u32) -> Result<u128, EmuError> {
        if addr & 1 << 31 != 0 {
            let offset = (addr & 0x3ff0) as usize;
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&self.spram[offset..offset + 16]);
            Ok(u128::from_le_bytes(bytes))
        } else {
            self.read128(addr & 0x1fff_fff0)
        }
    }

    fn dma_sink(&mut self, id: ChannelId, qword: u128) -> Result<(), EmuError> {
        match id {
            ChannelId::Vif0 => self.vif0.push(qword),
            ChannelId::Vif1 => self.vif1.push(qword),
            ChannelId::Gif => self.gif.push(&mut self.gs, qword)?,
            ChannelId::IpuTo => self.ipu_in.push(qword),
            ChannelId::Sif1 => self.sif1.push(qword),
            ChannelId::SprTo => {
                let channel = self.dmac.channel_mut(id);
                let offset = (channel.sadr & 0x3ff0) as usize;
                channel.sadr = (channel.sadr + 16) & 0x3fff;
                self.spram[offset..offset + 16].copy_from_slice(&qword.to_le_bytes());
            }
            _ => {
                return Err(EmuError::Dma(format!("{:?} cannot sink quadwords", id)));
            }
        }
        Ok(())
    }
}
