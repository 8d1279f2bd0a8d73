// The Graphics Synthesizer register plane. Three write surfaces feed it: the
// 64-bit internal surface (register index + payload), the packed surface the
// GIF demuxes 128-bit quadwords through, and the privileged surface mapped at
// 0x1200_0000 on the system bus. Rasterization itself lives behind the
// Rasterizer trait; this module owns every register the rasterizer reads,
// the vertex queue, VRAM and the host/local transmission machinery.

use crate::error::EmuError;
use bitflags::bitflags;
use log::{debug, trace, warn};

pub const VRAM_SIZE: usize = 4 * 1024 * 1024;

// Internal register indices, 0x00..0x62.
pub mod reg {
    pub const PRIM: u8 = 0x00;
    pub const RGBAQ: u8 = 0x01;
    pub const ST: u8 = 0x02;
    pub const UV: u8 = 0x03;
    pub const XYZF2: u8 = 0x04;
    pub const XYZ2: u8 = 0x05;
    pub const TEX0_1: u8 = 0x06;
    pub const TEX0_2: u8 = 0x07;
    pub const CLAMP_1: u8 = 0x08;
    pub const CLAMP_2: u8 = 0x09;
    pub const FOG: u8 = 0x0a;
    pub const XYZF3: u8 = 0x0c;
    pub const XYZ3: u8 = 0x0d;
    pub const AD: u8 = 0x0e;
    pub const NOP: u8 = 0x0f;
    pub const TEX1_1: u8 = 0x14;
    pub const TEX1_2: u8 = 0x15;
    pub const TEX2_1: u8 = 0x16;
    pub const TEX2_2: u8 = 0x17;
    pub const XYOFFSET_1: u8 = 0x18;
    pub const XYOFFSET_2: u8 = 0x19;
    pub const PRMODECONT: u8 = 0x1a;
    pub const PRMODE: u8 = 0x1b;
    pub const TEXCLUT: u8 = 0x1c;
    pub const SCANMSK: u8 = 0x22;
    pub const MIPTBP1_1: u8 = 0x34;
    pub const MIPTBP1_2: u8 = 0x35;
    pub const MIPTBP2_1: u8 = 0x36;
    pub const MIPTBP2_2: u8 = 0x37;
    pub const TEXA: u8 = 0x3b;
    pub const FOGCOL: u8 = 0x3d;
    pub const TEXFLUSH: u8 = 0x3f;
    pub const SCISSOR_1: u8 = 0x40;
    pub const SCISSOR_2: u8 = 0x41;
    pub const ALPHA_1: u8 = 0x42;
    pub const ALPHA_2: u8 = 0x43;
    pub const DIMX: u8 = 0x44;
    pub const DTHE: u8 = 0x45;
    pub const COLCLAMP: u8 = 0x46;
    pub const TEST_1: u8 = 0x47;
    pub const TEST_2: u8 = 0x48;
    pub const PABE: u8 = 0x49;
    pub const FBA_1: u8 = 0x4a;
    pub const FBA_2: u8 = 0x4b;
    pub const FRAME_1: u8 = 0x4c;
    pub const FRAME_2: u8 = 0x4d;
    pub const ZBUF_1: u8 = 0x4e;
    pub const ZBUF_2: u8 = 0x4f;
    pub const BITBLTBUF: u8 = 0x50;
    pub const TRXPOS: u8 = 0x51;
    pub const TRXREG: u8 = 0x52;
    pub const TRXDIR: u8 = 0x53;
    pub const HWREG: u8 = 0x54;
    pub const SIGNAL: u8 = 0x60;
    pub const FINISH: u8 = 0x61;
    pub const LABEL: u8 = 0x62;
}

// Privileged register offsets inside the 0x1200_0000 window.
mod priv_reg {
    pub const PMODE: u32 = 0x0000;
    pub const SMODE1: u32 = 0x0010;
    pub const SMODE2: u32 = 0x0020;
    pub const SRFSH: u32 = 0x0030;
    pub const SYNCH1: u32 = 0x0040;
    pub const SYNCH2: u32 = 0x0050;
    pub const SYNCV: u32 = 0x0060;
    pub const DISPFB1: u32 = 0x0070;
    pub const DISPLAY1: u32 = 0x0080;
    pub const DISPFB2: u32 = 0x0090;
    pub const DISPLAY2: u32 = 0x00a0;
    pub const EXTBUF: u32 = 0x00b0;
    pub const EXTDATA: u32 = 0x00c0;
    pub const EXTWRITE: u32 = 0x00d0;
    pub const BGCOLOR: u32 = 0x00e0;
    pub const CSR: u32 = 0x1000;
    pub const IMR: u32 = 0x1010;
    pub const BUSDIR: u32 = 0x1040;
    pub const SIGLBLID: u32 = 0x1080;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrimKind {
    Point,
    Line,
    LineStrip,
    Triangle,
    TriangleStrip,
    TriangleFan,
    Sprite,
    Reserved,
}

impl PrimKind {
    pub fn from(raw: u64) -> Self {
        match raw & 7 {
            0 => Self::Point,
            1 => Self::Line,
            2 => Self::LineStrip,
            3 => Self::Triangle,
            4 => Self::TriangleStrip,
            5 => Self::TriangleFan,
            6 => Self::Sprite,
            _ => Self::Reserved,
        }
    }
    // How many queued vertices make a drawable primitive.
    pub fn vertex_count(&self) -> Option<usize> {
        match self {
            Self::Point => Some(1),
            Self::Line | Self::LineStrip | Self::Sprite => Some(2),
            Self::Triangle | Self::TriangleStrip | Self::TriangleFan => Some(3),
            Self::Reserved => None,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Prim {
    pub kind: PrimKind,
    pub iip: bool,  // Gouraud shading
    pub tme: bool,  // texturing
    pub fge: bool,  // fog
    pub abe: bool,  // alpha blending
    pub aa1: bool,  // antialiasing
    pub fst: bool,  // UV rather than ST coordinates
    pub ctxt: usize,
    pub fix: bool,
}

impl Prim {
    fn decode(raw: u64) -> Self {
        Prim {
            kind: PrimKind::from(raw),
            iip: raw & 1 << 3 != 0,
            tme: raw & 1 << 4 != 0,
            fge: raw & 1 << 5 != 0,
            abe: raw & 1 << 6 != 0,
            aa1: raw & 1 << 7 != 0,
            fst: raw & 1 << 8 != 0,
            ctxt: (raw >> 9 & 1) as usize,
            fix: raw & 1 << 10 != 0,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Rgbaq {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
    pub q: u32, // f32 bits
}

impl Rgbaq {
    fn decode(raw: u64) -> Self {
        Rgbaq {
            r: raw as u8,
            g: (raw >> 8) as u8,
            b: (raw >> 16) as u8,
            a: (raw >> 24) as u8,
            q: (raw >> 32) as u32,
        }
    }
}

// A vertex as latched at kick time. Coordinates are the raw 12.4 fixed-point
// window coordinates.
#[derive(Debug, Copy, Clone)]
pub struct Vertex {
    pub x: u16,
    pub y: u16,
    pub z: u32,
    pub fog: u8,
    pub color: Rgbaq,
    pub s: u32,
    pub t: u32,
    pub u: u16,
    pub v: u16,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Tex0 {
    pub tbp0: u32,
    pub tbw: u32,
    pub psm: u8,
    pub tw: u8,
    pub th: u8,
    pub tcc: bool,
    pub tfx: u8,
    pub cbp: u32,
    pub cpsm: u8,
    pub csm: bool,
    pub csa: u8,
    pub cld: u8,
}

impl Tex0 {
    fn decode(raw: u64) -> Self {
        Tex0 {
            tbp0: (raw & 0x3fff) as u32,
            tbw: (raw >> 14 & 0x3f) as u32,
            psm: (raw >> 20 & 0x3f) as u8,
            tw: (raw >> 26 & 0xf) as u8,
            th: (raw >> 30 & 0xf) as u8,
            tcc: raw & 1 << 34 != 0,
            tfx: (raw >> 35 & 3) as u8,
            cbp: (raw >> 37 & 0x3fff) as u32,
            cpsm: (raw >> 51 & 0xf) as u8,
            csm: raw & 1 << 55 != 0,
            csa: (raw >> 56 & 0x1f) as u8,
            cld: (raw >> 61 & 7) as u8,
        }
    }
    // TEX2 rewrites only the CLUT-related half of TEX0.
    fn apply_tex2(&mut self, raw: u64) {
        let t = Tex0::decode(raw);
        self.psm = t.psm;
        self.cbp = t.cbp;
        self.cpsm = t.cpsm;
        self.csm = t.csm;
        self.csa = t.csa;
        self.cld = t.cld;
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Alpha {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub fix: u8,
}

impl Alpha {
    fn decode(raw: u64) -> Result<Self, EmuError> {
        let alpha = Alpha {
            a: (raw & 3) as u8,
            b: (raw >> 2 & 3) as u8,
            c: (raw >> 4 & 3) as u8,
            d: (raw >> 6 & 3) as u8,
            fix: (raw >> 32) as u8,
        };
        // Setting 3 is reserved in every selector field.
        if alpha.a == 3 || alpha.b == 3 || alpha.c == 3 || alpha.d == 3 {
            return Err(EmuError::Gs(format!(
                "reserved alpha blend selector in {:#018x}",
                raw
            )));
        }
        Ok(alpha)
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Frame {
    pub fbp: u32,
    pub fbw: u32,
    pub psm: u8,
    pub fbmsk: u32,
}

impl Frame {
    fn decode(raw: u64) -> Self {
        Frame {
            fbp: (raw & 0x1ff) as u32,
            fbw: (raw >> 16 & 0x3f) as u32,
            psm: (raw >> 24 & 0x3f) as u8,
            fbmsk: (raw >> 32) as u32,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Zbuf {
    pub zbp: u32,
    pub psm: u8,
    pub zmsk: bool,
}

impl Zbuf {
    fn decode(raw: u64) -> Self {
        Zbuf {
            zbp: (raw & 0x1ff) as u32,
            psm: (raw >> 24 & 0xf) as u8,
            zmsk: raw & 1 << 32 != 0,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Test {
    pub ate: bool,
    pub atst: u8,
    pub aref: u8,
    pub afail: u8,
    pub date: bool,
    pub datm: bool,
    pub zte: bool,
    pub ztst: u8,
}

impl Test {
    fn decode(raw: u64) -> Self {
        Test {
            ate: raw & 1 != 0,
            atst: (raw >> 1 & 7) as u8,
            aref: (raw >> 4) as u8,
            afail: (raw >> 12 & 3) as u8,
            date: raw & 1 << 14 != 0,
            datm: raw & 1 << 15 != 0,
            zte: raw & 1 << 16 != 0,
            ztst: (raw >> 17 & 3) as u8,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct XyOffset {
    pub x: u16,
    pub y: u16,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Scissor {
    pub x0: u16,
    pub x1: u16,
    pub y0: u16,
    pub y1: u16,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Texa {
    pub ta0: u8,
    pub aem: bool,
    pub ta1: u8,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Bitbltbuf {
    pub sbp: u32,
    pub sbw: u32,
    pub spsm: u8,
    pub dbp: u32,
    pub dbw: u32,
    pub dpsm: u8,
}

impl Bitbltbuf {
    fn decode(raw: u64) -> Self {
        Bitbltbuf {
            sbp: (raw & 0x3fff) as u32,
            sbw: (raw >> 16 & 0x3f) as u32,
            spsm: (raw >> 24 & 0x3f) as u8,
            dbp: (raw >> 32 & 0x3fff) as u32,
            dbw: (raw >> 48 & 0x3f) as u32,
            dpsm: (raw >> 56 & 0x3f) as u8,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Trxpos {
    pub sx: u32,
    pub sy: u32,
    pub dx: u32,
    pub dy: u32,
    pub dir: u8,
}

impl Trxpos {
    fn decode(raw: u64) -> Self {
        Trxpos {
            sx: (raw & 0x7ff) as u32,
            sy: (raw >> 16 & 0x7ff) as u32,
            dx: (raw >> 32 & 0x7ff) as u32,
            dy: (raw >> 48 & 0x7ff) as u32,
            dir: (raw >> 59 & 3) as u8,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Trxreg {
    pub w: u32,
    pub h: u32,
}

impl Trxreg {
    fn decode(raw: u64) -> Self {
        Trxreg { w: (raw & 0xfff) as u32, h: (raw >> 32 & 0xfff) as u32 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrxDir {
    HostToLocal,
    LocalToHost,
    LocalToLocal,
    Off,
}

impl TrxDir {
    fn from(raw: u64) -> Self {
        match raw & 3 {
            0 => Self::HostToLocal,
            1 => Self::LocalToHost,
            2 => Self::LocalToLocal,
            _ => Self::Off,
        }
    }
}

// Control/status register. FIELD and the FIFO status are live on read; the
// five low bits are sticky event flags the scheduler and FINISH path set.
#[derive(Debug, Copy, Clone, Default)]
pub struct Csr {
    pub signal: bool,
    pub finish: bool,
    pub hsint: bool,
    pub vsint: bool,
    pub edwint: bool,
    pub field: bool,
}

const CSR_REVISION: u64 = 0x1b;
const CSR_ID: u64 = 0x55;

bitflags! {
    pub struct Imr: u64 {
        const SIGMSK = 1 << 8;
        const FINISHMSK = 1 << 9;
        const HSMSK = 1 << 10;
        const VSMSK = 1 << 11;
        const EDWMSK = 1 << 12;
    }
}

// The drawing inner loops live outside this core; the register plane hands
// finished primitives across this seam.
pub trait Rasterizer {
    fn kick(&mut self, prim: &Prim, vertices: &[Vertex]);
}

pub struct NullRasterizer;

impl Rasterizer for NullRasterizer {
    fn kick(&mut self, prim: &Prim, vertices: &[Vertex]) {
        debug!("[GS] kick {:?} with {} vertices", prim.kind, vertices.len());
    }
}

pub struct Gs {
    // drawing environment
    pub prim: Prim,
    prmode: Prim,
    prmodecont: bool,
    pub rgbaq: Rgbaq,
    st: u64,
    uv: u64,
    fog: u8,
    pub tex0: [Tex0; 2],
    tex1: [u64; 2],
    clamp: [u64; 2],
    miptbp1: [u64; 2],
    miptbp2: [u64; 2],
    texclut: u64,
    scanmsk: u64,
    pub texa: Texa,
    fogcol: u64,
    pub xyoffset: [XyOffset; 2],
    pub scissor: [Scissor; 2],
    pub alpha: [Alpha; 2],
    dimx: u64,
    dthe: bool,
    pub colclamp: bool,
    pub test: [Test; 2],
    pabe: bool,
    fba: [bool; 2],
    pub frame: [Frame; 2],
    pub zbuf: [Zbuf; 2],
    vertex_queue: Vec<Vertex>,
    // transmission
    bitbltbuf: Bitbltbuf,
    trxpos: Trxpos,
    trxreg: Trxreg,
    trxdir: TrxDir,
    trx_x: u32,
    trx_y: u32,
    trx_pixels: u64,
    pub vram: Vec<u8>,
    // packed-path latch
    packed_q: u32,
    // privileged plane
    pmode: u64,
    smode1: u64,
    smode2: u64,
    srfsh: u64,
    synch1: u64,
    synch2: u64,
    syncv: u64,
    dispfb: [u64; 2],
    display: [u64; 2],
    extbuf: u64,
    extdata: u64,
    extwrite: u64,
    bgcolor: u64,
    busdir: u64,
    siglblid: u64,
    pub csr: Csr,
    pub imr: Imr,
    // word pointer into VRAM of the current display buffer
    pub display_fb: u32,
    irq: bool,
    raster: Box<dyn Rasterizer>,
}

impl Gs {
    pub fn new() -> Self {
        Gs {
            prim: Prim::decode(0),
            prmode: Prim::decode(0),
            prmodecont: true,
            rgbaq: Rgbaq::default(),
            st: 0,
            uv: 0,
            fog: 0,
            tex0: [Tex0::default(); 2],
            tex1: [0; 2],
            clamp: [0; 2],
            miptbp1: [0; 2],
            miptbp2: [0; 2],
            texclut: 0,
            scanmsk: 0,
            texa: Texa::default(),
            fogcol: 0,
            xyoffset: [XyOffset::default(); 2],
            scissor: [Scissor::default(); 2],
            alpha: [Alpha::default(); 2],
            dimx: 0,
            dthe: false,
            colclamp: false,
            test: [Test::default(); 2],
            pabe: false,
            fba: [false; 2],
            frame: [Frame::default(); 2],
            zbuf: [Zbuf::default(); 2],
            vertex_queue: Vec::with_capacity(3),
            bitbltbuf: Bitbltbuf::default(),
            trxpos: Trxpos::default(),
            trxreg: Trxreg::default(),
            trxdir: TrxDir::Off,
            trx_x: 0,
            trx_y: 0,
            trx_pixels: 0,
            vram: vec![0; VRAM_SIZE],
            packed_q: 0x3f80_0000,
            pmode: 0,
            smode1: 0,
            smode2: 0,
            srfsh: 0,
            synch1: 0,
            synch2: 0,
            syncv: 0,
            dispfb: [0; 2],
            display: [0; 2],
            extbuf: 0,
            extdata: 0,
            extwrite: 0,
            bgcolor: 0,
            busdir: 0,
            siglblid: 0,
            csr: Csr::default(),
            imr: Imr::all(),
            display_fb: 0,
            irq: false,
            raster: Box::new(NullRasterizer),
        }
    }

    pub fn set_rasterizer(&mut self, raster: Box<dyn Rasterizer>) {
        self.raster = raster;
    }

    // The 64-bit internal write surface.
    pub fn write_internal(&mut self, register: u8, data: u64) -> Result<(), EmuError> {
        trace!("[GS] reg {:#04x} <- {:#018x}", register, data);
        match register {
            reg::PRIM => {
                self.prim = Prim::decode(data);
                self.vertex_queue.clear();
            }
            reg::RGBAQ => self.rgbaq = Rgbaq::decode(data),
            reg::ST => self.st = data,
            reg::UV => self.uv = data & 0x3fff_3fff,
            reg::XYZF2 => self.vertex_kick(data, true, register),
            reg::XYZ2 => self.vertex_kick(data, false, register),
            reg::XYZF3 => self.vertex_kick(data, true, register),
            reg::XYZ3 => self.vertex_kick(data, false, register),
            reg::TEX0_1 => self.tex0[0] = Tex0::decode(data),
            reg::TEX0_2 => self.tex0[1] = Tex0::decode(data),
            reg::CLAMP_1 => self.clamp[0] = data,
            reg::CLAMP_2 => self.clamp[1] = data,
            reg::FOG => self.fog = (data >> 56) as u8,
            reg::NOP => {}
            reg::TEX1_1 => self.tex1[0] = data,
            reg::TEX1_2 => self.tex1[1] = data,
            reg::TEX2_1 => self.tex0[0].apply_tex2(data),
            reg::TEX2_2 => self.tex0[1].apply_tex2(data),
            reg::XYOFFSET_1 | reg::XYOFFSET_2 => {
                let offset = XyOffset { x: data as u16, y: (data >> 32) as u16 };
                self.xyoffset[(register - reg::XYOFFSET_1) as usize] = offset;
            }
            reg::PRMODECONT => self.prmodecont = data & 1 != 0,
            reg::PRMODE => {
                let kind = self.prmode.kind;
                self.prmode = Prim::decode(data & !7);
                self.prmode.kind = kind;
            }
            reg::TEXCLUT => self.texclut = data,
            reg::SCANMSK => self.scanmsk = data & 3,
            reg::MIPTBP1_1 => self.miptbp1[0] = data,
            reg::MIPTBP1_2 => self.miptbp1[1] = data,
            reg::MIPTBP2_1 => self.miptbp2[0] = data,
            reg::MIPTBP2_2 => self.miptbp2[1] = data,
            reg::TEXA => {
                self.texa = Texa {
                    ta0: data as u8,
                    aem: data & 1 << 15 != 0,
                    ta1: (data >> 32) as u8,
                }
            }
            reg::FOGCOL => self.fogcol = data & 0xff_ffff,
            reg::TEXFLUSH => {}
            reg::SCISSOR_1 | reg::SCISSOR_2 => {
                let scissor = Scissor {
                    x0: (data & 0x7ff) as u16,
                    x1: (data >> 16 & 0x7ff) as u16,
                    y0: (data >> 32 & 0x7ff) as u16,
                    y1: (data >> 48 & 0x7ff) as u16,
                };
                self.scissor[(register - reg::SCISSOR_1) as usize] = scissor;
            }
            reg::ALPHA_1 => self.alpha[0] = Alpha::decode(data)?,
            reg::ALPHA_2 => self.alpha[1] = Alpha::decode(data)?,
            reg::DIMX => self.dimx = data,
            reg::DTHE => self.dthe = data & 1 != 0,
            reg::COLCLAMP => self.colclamp = data & 1 != 0,
            reg::TEST_1 => self.test[0] = Test::decode(data),
            reg::TEST_2 => self.test[1] = Test::decode(data),
            reg::PABE => self.pabe = data & 1 != 0,
            reg::FBA_1 => self.fba[0] = data & 1 != 0,
            reg::FBA_2 => self.fba[1] = data & 1 != 0,
            reg::FRAME_1 => self.frame[0] = Frame::decode(data),
            reg::FRAME_2 => self.frame[1] = Frame::decode(data),
            reg::ZBUF_1 => self.zbuf[0] = Zbuf::decode(data),
            reg::ZBUF_2 => self.zbuf[1] = Zbuf::decode(data),
            reg::BITBLTBUF => self.bitbltbuf = Bitbltbuf::decode(data),
            reg::TRXPOS => self.trxpos = Trxpos::decode(data),
            reg::TRXREG => self.trxreg = Trxreg::decode(data),
            reg::TRXDIR => self.start_transmission(TrxDir::from(data)),
            reg::HWREG => self.write_hwreg(data),
            reg::SIGNAL => {
                self.siglblid = (self.siglblid & !0xffff_ffff) | (data & 0xffff_ffff);
                self.csr.signal = true;
                if !self.imr.contains(Imr::SIGMSK) {
                    self.irq = true;
                }
            }
            reg::FINISH => self.set_finish(),
            reg::LABEL => self.siglblid = (self.siglblid & 0xffff_ffff) | (data & 0xffff_ffff) << 32,
            _ => warn!("[GS] write {:#018x} to unknown register {:#04x}", data, register),
        }
        Ok(())
    }

    // The packed write surface fed by the GIF: a 4-bit register descriptor
    // plus an unpacked 128-bit payload, demuxed onto the 64-bit surface.
    pub fn write_packed(&mut self, descriptor: u8, data: u128) -> Result<(), EmuError> {
        match descriptor {
            0x0 => self.write_internal(reg::PRIM, data as u64 & 0x7ff),
            0x1 => {
                let rgba = (data as u64 & 0xff)
                    | ((data >> 32) as u64 & 0xff) << 8
                    | ((data >> 64) as u64 & 0xff) << 16
                    | ((data >> 96) as u64 & 0xff) << 24;
                self.write_internal(reg::RGBAQ, rgba | (self.packed_q as u64) << 32)
            }
            0x2 => {
                self.packed_q = (data >> 64) as u32;
                self.write_internal(reg::ST, data as u64)
            }
            0x3 => {
                let uv = (data as u64 & 0x3fff) | ((data >> 32) as u64 & 0x3fff) << 16;
                self.write_internal(reg::UV, uv)
            }
            0x4 => {
                let xyzf = (data as u64 & 0xffff)
                    | ((data >> 32) as u64 & 0xffff) << 16
                    | ((data >> 68) as u64 & 0xff_ffff) << 32
                    | ((data >> 100) as u64 & 0xff) << 56;
                let register = if data & 1 << 111 != 0 { reg::XYZF3 } else { reg::XYZF2 };
                self.write_internal(register, xyzf)
            }
            0x5 => {
                let xyz = (data as u64 & 0xffff)
                    | ((data >> 32) as u64 & 0xffff) << 16
                    | ((data >> 64) as u64 & 0xffff_ffff) << 32;
                let register = if data & 1 << 111 != 0 { reg::XYZ3 } else { reg::XYZ2 };
                self.write_internal(register, xyz)
            }
            0x6 => self.write_internal(reg::TEX0_1, data as u64),
            0x7 => self.write_internal(reg::TEX0_2, data as u64),
            0x8 => self.write_internal(reg::CLAMP_1, data as u64),
            0x9 => self.write_internal(reg::CLAMP_2, data as u64),
            0xa => self.write_internal(reg::FOG, ((data >> 100) as u64 & 0xff) << 56),
            0xe => self.write_internal((data >> 64) as u8, data as u64),
            0xf => Ok(()),
            _ => {
                warn!("[GS] packed write with reserved descriptor {:#03x}", descriptor);
                Ok(())
            }
        }
    }

    // The attribute set a kick draws with: PRIM when PRMODECONT selects it,
    // PRMODE otherwise (the primitive kind always comes from PRIM).
    fn draw_prim(&self) -> Prim {
        if self.prmodecont {
            self.prim
        } else {
            let mut prim = self.prmode;
            prim.kind = self.prim.kind;
            prim
        }
    }

    fn vertex_kick(&mut self, data: u64, with_fog: bool, register: u8) {
        let vertex = Vertex {
            x: data as u16,
            y: (data >> 16) as u16,
            z: if with_fog { (data >> 32) as u32 & 0xff_ffff } else { (data >> 32) as u32 },
            fog: if with_fog { (data >> 56) as u8 } else { self.fog },
            color: self.rgbaq,
            s: self.st as u32,
            t: (self.st >> 32) as u32,
            u: self.uv as u16 & 0x3fff,
            v: (self.uv >> 16) as u16 & 0x3fff,
        };
        self.vertex_queue.push(vertex);
        let prim = self.draw_prim();
        let needed = match prim.kind.vertex_count() {
            Some(n) => n,
            None => {
                warn!("[GS] vertex written with reserved primitive kind (reg {:#04x})", register);
                self.vertex_queue.clear();
                return;
            }
        };
        if self.vertex_queue.len() >= needed {
            self.raster.kick(&prim, &self.vertex_queue);
            if prim.kind == PrimKind::TriangleStrip {
                // keep the rolling pair
                self.vertex_queue.remove(0);
            } else {
                self.vertex_queue.clear();
            }
        }
    }

    pub fn vertex_queue_len(&self) -> usize {
        self.vertex_queue.len()
    }

    fn start_transmission(&mut self, dir: TrxDir) {
        self.trxdir = dir;
        self.trx_x = 0;
        self.trx_y = 0;
        self.trx_pixels = self.trxreg.w as u64 * self.trxreg.h as u64;
        match dir {
            TrxDir::HostToLocal => {
                debug!(
                    "[GS] host -> local transmission armed, {}x{} at dbp {:#x}",
                    self.trxreg.w, self.trxreg.h, self.bitbltbuf.dbp
                );
            }
            TrxDir::LocalToHost => {
                debug!("[GS] local -> host transmission armed (drained by HWREG reads)");
            }
            TrxDir::LocalToLocal => {
                self.local_to_local();
                self.trxdir = TrxDir::Off;
            }
            TrxDir::Off => {}
        }
    }

    fn src_word(&self, x: u32, y: u32) -> usize {
        let word = self.bitbltbuf.sbp * 64
            + (self.trxpos.sy + y) * self.bitbltbuf.sbw * 64
            + self.trxpos.sx
            + x;
        (word as usize * 4) & (VRAM_SIZE - 1)
    }

    fn dst_word(&self, x: u32, y: u32) -> usize {
        let word = self.bitbltbuf.dbp * 64
            + (self.trxpos.dy + y) * self.bitbltbuf.dbw * 64
            + self.trxpos.dx
            + x;
        (word as usize * 4) & (VRAM_SIZE - 1)
    }

    fn local_to_local(&mut self) {
        for y in 0..self.trxreg.h {
            for x in 0..self.trxreg.w {
                let src = self.src_word(x, y);
                let dst = self.dst_word(x, y);
                let mut pixel = [0u8; 4];
                pixel.copy_from_slice(&self.vram[src..src + 4]);
                self.vram[dst..dst + 4].copy_from_slice(&pixel);
            }
        }
        debug!("[GS] local -> local copy of {}x{} done", self.trxreg.w, self.trxreg.h);
    }

    // HWREG carries transmission source data, two 32-bit pixels per write.
    fn write_hwreg(&mut self, data: u64) {
        if self.trxdir != TrxDir::HostToLocal || self.trx_pixels == 0 {
            warn!("[GS] HWREG write {:#018x} with no transmission armed", data);
            return;
        }
        for half in 0..2 {
            if self.trx_pixels == 0 {
                break;
            }
            let pixel = (data >> (32 * half)) as u32;
            let dst = self.dst_word(self.trx_x, self.trx_y);
            self.vram[dst..dst + 4].copy_from_slice(&pixel.to_le_bytes());
            self.trx_x += 1;
            if self.trx_x == self.trxreg.w {
                self.trx_x = 0;
                self.trx_y += 1;
            }
            self.trx_pixels -= 1;
        }
        if self.trx_pixels == 0 {
            self.trxdir = TrxDir::Off;
            debug!("[GS] host -> local transmission complete");
        }
    }

    pub fn transmission_active(&self) -> bool {
        self.trxdir != TrxDir::Off
    }

    // The privileged plane, 64-bit access from the bus.
    pub fn write_priv(&mut self, offset: u32, data: u64) -> Result<(), EmuError> {
        trace!("[GS] priv {:#06x} <- {:#018x}", offset, data);
        match offset {
            priv_reg::PMODE => self.pmode = data,
            priv_reg::SMODE1 => self.smode1 = data,
            priv_reg::SMODE2 => self.smode2 = data,
            priv_reg::SRFSH => self.srfsh = data,
            priv_reg::SYNCH1 => self.synch1 = data,
            priv_reg::SYNCH2 => self.synch2 = data,
            priv_reg::SYNCV => self.syncv = data,
            priv_reg::DISPFB1 => {
                self.dispfb[0] = data;
                self.display_fb = 2048 * (data as u32 & 0x1ff);
            }
            priv_reg::DISPLAY1 => self.display[0] = data,
            priv_reg::DISPFB2 => {
                self.dispfb[1] = data;
                self.display_fb = 2048 * (data as u32 & 0x1ff);
            }
            priv_reg::DISPLAY2 => self.display[1] = data,
            priv_reg::EXTBUF => self.extbuf = data,
            priv_reg::EXTDATA => self.extdata = data,
            priv_reg::EXTWRITE => self.extwrite = data,
            priv_reg::BGCOLOR => self.bgcolor = data & 0xff_ffff,
            priv_reg::CSR => self.write_csr(data),
            priv_reg::IMR => self.imr = Imr::from_bits_truncate(data),
            priv_reg::BUSDIR => self.busdir = data & 1,
            priv_reg::SIGLBLID => self.siglblid = data,
            _ => warn!("[GS] write {:#018x} to unknown privileged offset {:#06x}", data, offset),
        }
        Ok(())
    }

    pub fn read_priv(&self, offset: u32) -> Result<u64, EmuError> {
        let value = match offset {
            priv_reg::PMODE => self.pmode,
            priv_reg::SMODE1 => self.smode1,
            priv_reg::SMODE2 => self.smode2,
            priv_reg::SRFSH => self.srfsh,
            priv_reg::SYNCH1 => self.synch1,
            priv_reg::SYNCH2 => self.synch2,
            priv_reg::SYNCV => self.syncv,
            priv_reg::DISPFB1 => self.dispfb[0],
            priv_reg::DISPLAY1 => self.display[0],
            priv_reg::DISPFB2 => self.dispfb[1],
            priv_reg::DISPLAY2 => self.display[1],
            priv_reg::BGCOLOR => self.bgcolor,
            priv_reg::CSR => self.read_csr(),
            priv_reg::IMR => self.imr.bits(),
            priv_reg::BUSDIR => self.busdir,
            priv_reg::SIGLBLID => self.siglblid,
            _ => {
                warn!("[GS] read of unknown privileged offset {:#06x}", offset);
                0
            }
        };
        Ok(value)
    }

    // Writing 1 to a sticky bit clears it; bit 9 resets the whole control
    // plane and restores all five IMR masks.
    fn write_csr(&mut self, data: u64) {
        if data & 1 << 9 != 0 {
            self.csr = Csr::default();
            self.imr = Imr::all();
            debug!("[GS] CSR reset");
            return;
        }
        if data & 1 != 0 {
            self.csr.signal = false;
        }
        if data & 1 << 1 != 0 {
            self.csr.finish = false;
        }
        if data & 1 << 2 != 0 {
            self.csr.hsint = false;
        }
        if data & 1 << 3 != 0 {
            self.csr.vsint = false;
        }
        if data & 1 << 4 != 0 {
            self.csr.edwint = false;
        }
    }

    fn read_csr(&self) -> u64 {
        (self.csr.signal as u64)
            | (self.csr.finish as u64) << 1
            | (self.csr.hsint as u64) << 2
            | (self.csr.vsint as u64) << 3
            | (self.csr.edwint as u64) << 4
            | (self.csr.field as u64) << 13
            | 1 << 14 // output FIFO empty
            | CSR_REVISION << 16
            | CSR_ID << 24
    }

    pub fn set_finish(&mut self) {
        self.csr.finish = true;
        if !self.imr.contains(Imr::FINISHMSK) {
            self.irq = true;
        }
    }

    // Scheduler edges. The scanline counter is the only caller.
    pub fn signal_hsint(&mut self) {
        self.csr.hsint = true;
        if !self.imr.contains(Imr::HSMSK) {
            self.irq = true;
        }
    }
    pub fn signal_vsint(&mut self) {
        self.csr.vsint = true;
        if !self.imr.contains(Imr::VSMSK) {
            self.irq = true;
        }
    }
    pub fn toggle_field(&mut self) {
        self.csr.field = !self.csr.field;
    }

    // Drains the pending interrupt edge toward INTC.GS.
    pub fn take_irq(&mut self) -> bool {
        let irq = self.irq;
        self.irq = false;
        irq
    }

    // Copy the current display buffer out of VRAM as packed 0RGB words for
    // the host window. The line stride comes from the DISPFB width field.
    pub fn display_framebuffer(&self, width: usize, height: usize, out: &mut Vec<u32>) {
        out.clear();
        let fbw = {
            let raw = (self.dispfb[0] >> 9 & 0x3f) as usize * 64;
            if raw == 0 { width } else { raw }
        };
        for y in 0..height {
            for x in 0..width {
                let word = self.display_fb as usize + y * fbw + x;
                let ptr = (word * 4) & (VRAM_SIZE - 1);
                let mut pixel = [0u8; 4];
                pixel.copy_from_slice(&self.vram[ptr..ptr + 4]);
                let (r, g, b) = (pixel[0] as u32, pixel[1] as u32, pixel[2] as u32);
                out.push(r << 16 | g << 8 | b);
            }
        }
    }
}
