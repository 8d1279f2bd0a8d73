// Here reside the definitions of access widths and instruction fields; rather
// than have magic numbers everywhere, we opt for rich types wherever it is not
// too ridiculous. The parser then becomes the naturally messy code responsible
// for constructing said rich types.

use crate::conversions::Truncate;
use std::fmt;

// Everything on the EE side of the machine is little-endian and moves in one
// of five power-of-two widths, up to a full quadword.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Width {
    Byte = 1,
    Half = 2,
    Word = 4,
    Dword = 8,
    Qword = 16,
}

impl Width {
    pub fn from<T>(&self, res: T) -> OpResult
    where
        T: Truncate<u8> + Truncate<u16> + Truncate<u32> + Truncate<u64> + Truncate<u128>,
    {
        match *self {
            Self::Byte => OpResult::Byte(res.truncate()),
            Self::Half => OpResult::Half(res.truncate()),
            Self::Word => OpResult::Word(res.truncate()),
            Self::Dword => OpResult::Dword(res.truncate()),
            Self::Qword => OpResult::Qword(res.truncate()),
        }
    }
    pub fn from_le_bytes(&self, slice: &[u8]) -> OpResult {
        let mut bytes = [0u8; 16];
        bytes[..*self as usize].copy_from_slice(&slice[..*self as usize]);
        self.from(u128::from_le_bytes(bytes))
    }
    pub fn zero(&self) -> OpResult {
        self.from(0u8)
    }
    pub fn aligned(&self, addr: u32) -> bool {
        addr & (*self as u32 - 1) == 0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpResult {
    Byte(u8),
    Half(u16),
    Word(u32),
    Dword(u64),
    Qword(u128),
}

impl OpResult {
    pub fn inner(&self) -> u128 {
        match *self {
            Self::Byte(b) => b as u128,
            Self::Half(h) => h as u128,
            Self::Word(w) => w as u128,
            Self::Dword(d) => d as u128,
            Self::Qword(q) => q,
        }
    }
    // Zero extension into the common register width.
    pub fn zero_extend(&self) -> u64 {
        self.inner() as u64
    }
    // Sign extension into the common register width. A quadword has no sign
    // to extend; its low half passes through.
    pub fn sign_extend(&self) -> i64 {
        match *self {
            Self::Byte(b) => b as i8 as i64,
            Self::Half(h) => h as i16 as i64,
            Self::Word(w) => w as i32 as i64,
            Self::Dword(d) => d as i64,
            Self::Qword(q) => q as i64,
        }
    }
    pub fn width(&self) -> Width {
        match self {
            Self::Byte(_) => Width::Byte,
            Self::Half(_) => Width::Half,
            Self::Word(_) => Width::Word,
            Self::Dword(_) => Width::Dword,
            Self::Qword(_) => Width::Qword,
        }
    }
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let value = self.inner();
        let size = self.width() as usize;
        value.to_le_bytes()[..size].to_vec()
    }
}

impl fmt::Display for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            OpResult::Byte(b) => write!(f, "${:02x}", b),
            OpResult::Half(h) => write!(f, "${:04x}", h),
            OpResult::Word(w) => write!(f, "${:08x}", w),
            OpResult::Dword(d) => write!(f, "${:016x}", d),
            OpResult::Qword(q) => write!(f, "${:032x}", q),
        }
    }
}

// The 4-bit destination field of a VU operation selects which of the x/y/z/w
// lanes are written; unselected lanes keep their previous contents. Bit 3 is
// x, bit 0 is w.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DestMask(pub usize);

impl DestMask {
    pub fn x(&self) -> bool {
        self.0 & 0b1000 != 0
    }
    pub fn y(&self) -> bool {
        self.0 & 0b0100 != 0
    }
    pub fn z(&self) -> bool {
        self.0 & 0b0010 != 0
    }
    pub fn w(&self) -> bool {
        self.0 & 0b0001 != 0
    }
    pub fn lane(&self, lane: usize) -> bool {
        self.0 & (0b1000 >> lane) != 0
    }
    pub fn as_asm(&self) -> String {
        let mut suffix = String::new();
        for (j, name) in ["x", "y", "z", "w"].iter().enumerate() {
            if self.lane(j) {
                suffix.push_str(name);
            }
        }
        suffix
    }
}

impl fmt::Display for DestMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_asm())
    }
}

// Conventional register names, for the disassembler only.
pub const GPR_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as usize)
    }
}
