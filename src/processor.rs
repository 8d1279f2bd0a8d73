// This is the place for the basic processor implementation: the step loop,
// address translation and the exception machinery. What the individual
// instructions do to this state is implemented in the instructions module.

use crate::devices::Signal;
use crate::error::EmuError;
use crate::fields::{OpResult, Width, GPR_NAMES};
use crate::memory::BusPtr;
use crate::parser::parse_instruction;
use bitflags::bitflags;
use log::{debug, trace, warn};
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::io::prelude::*;
use termion::{clear, color, cursor};

pub const RESET_VECTOR: u32 = 0xbfc0_0000;

// ERET lands here when the BIOS hands control to a side-loaded program;
// the orchestrator owns what happens next.
const FAST_BOOT_HOOK: u32 = 0x0008_2000;

// The general purpose register file. Each register is a 128-bit value whose
// low half carries the ordinary 64-bit architectural state; register 0 is
// pinned to zero after every write.
pub struct Gprs {
    regs: [u128; 32],
}

impl Gprs {
    pub fn new() -> Self {
        Gprs { regs: [0; 32] }
    }
    pub fn get32(&self, reg: usize) -> u32 {
        self.regs[reg] as u32
    }
    pub fn get64(&self, reg: usize) -> u64 {
        self.regs[reg] as u64
    }
    pub fn get128(&self, reg: usize) -> u128 {
        self.regs[reg]
    }
    // 32-bit writes sign-extend into the low half, like every MIPS-III
    // word operation.
    pub fn set32(&mut self, reg: usize, value: u32) {
        self.set64(reg, value as i32 as i64 as u64);
    }
    pub fn set64(&mut self, reg: usize, value: u64) {
        self.regs[reg] = (self.regs[reg] & !(u64::MAX as u128)) | value as u128;
        self.regs[0] = 0;
    }
    pub fn set128(&mut self, reg: usize, value: u128) {
        self.regs[reg] = value;
        self.regs[0] = 0;
    }
}

bitflags! {
    pub struct Status: u32 {
        const IE = 1;
        const EXL = 1 << 1;
        const ERL = 1 << 2;
        const KSU0 = 1 << 3;
        const KSU1 = 1 << 4;
        const IM2 = 1 << 10;
        const IM3 = 1 << 11;
        const IM7 = 1 << 15;
        const EIE = 1 << 16;
        const EDI = 1 << 17;
        const BEV = 1 << 22;
        const CU0 = 1 << 28;
        const CU1 = 1 << 29;
        const CU2 = 1 << 30;
        const CU3 = 1 << 31;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    Interrupt = 0,
    AddressErrorLoad = 4,
    AddressErrorStore = 5,
    Syscall = 8,
    Break = 9,
    Overflow = 12,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct TlbEntry {
    pub page_mask: u32,
    pub entry_hi: u32,
    pub entry_lo0: u32,
    pub entry_lo1: u32,
}

const CAUSE_BD: u32 = 1 << 31;

// The system-control coprocessor, mirrored as plain fields. Only the
// registers the kernel actually drives during boot are modelled.
pub struct Cop0 {
    pub status: Status,
    pub cause: u32,
    pub epc: u32,
    pub error_epc: u32,
    pub count: u32,
    pub compare: u32,
    pub index: u32,
    pub entry_lo0: u32,
    pub entry_lo1: u32,
    pub context: u32,
    pub page_mask: u32,
    pub wired: u32,
    pub bad_vaddr: u32,
    pub entry_hi: u32,
    pub prid: u32,
    pub config: u32,
    pub tlb: [TlbEntry; 48],
}

impl Cop0 {
    pub fn new() -> Self {
        Cop0 {
            status: Status::ERL | Status::BEV,
            cause: 0,
            epc: 0,
            error_epc: 0,
            count: 0,
            compare: 0,
            index: 0,
            entry_lo0: 0,
            entry_lo1: 0,
            context: 0,
            page_mask: 0,
            wired: 0,
            bad_vaddr: 0,
            entry_hi: 0,
            prid: 0x2e20,
            config: 0,
            tlb: [TlbEntry::default(); 48],
        }
    }

    pub fn read(&self, reg: usize) -> u32 {
        match reg {
            0 => self.index,
            2 => self.entry_lo0,
            3 => self.entry_lo1,
            4 => self.context,
            5 => self.page_mask,
            6 => self.wired,
            8 => self.bad_vaddr,
            9 => self.count,
            10 => self.entry_hi,
            11 => self.compare,
            12 => self.status.bits(),
            13 => self.cause,
            14 => self.epc,
            15 => self.prid,
            16 => self.config,
            30 => self.error_epc,
            _ => {
                warn!("[COP0] read of unimplemented register {}", reg);
                0
            }
        }
    }

    pub fn write(&mut self, reg: usize, value: u32) {
        match reg {
            0 => self.index = value & 0x3f,
            2 => self.entry_lo0 = value,
            3 => self.entry_lo1 = value,
            4 => self.context = value,
            5 => self.page_mask = value,
            6 => self.wired = value,
            9 => self.count = value,
            10 => self.entry_hi = value,
            11 => {
                self.compare = value;
                // writing Compare retires the timer interrupt
                self.cause &= !(1 << 15);
            }
            12 => self.status = Status::from_bits_truncate(value),
            13 => self.cause = (self.cause & !0x300) | (value & 0x300),
            14 => self.epc = value,
            16 => self.config = value,
            30 => self.error_epc = value,
            _ => warn!("[COP0] write {:#010x} to unimplemented register {}", value, reg),
        }
    }

    pub fn is_kernel(&self) -> bool {
        !self.status.intersects(Status::KSU0 | Status::KSU1)
            || self.status.intersects(Status::EXL | Status::ERL)
    }
    pub fn interrupts_enabled(&self) -> bool {
        self.status.contains(Status::IE | Status::EIE)
            && !self.status.intersects(Status::EXL | Status::ERL)
    }
    pub fn edi_enabled(&self) -> bool {
        self.is_kernel() || self.status.contains(Status::EDI)
    }
    pub fn cop_usable(&self, cop: usize) -> bool {
        self.is_kernel() || self.status.bits() & 1 << (28 + cop) != 0
    }

    pub fn set_excode(&mut self, exc: Exception) {
        self.cause = (self.cause & !0x7c) | (exc as u32) << 2;
    }
    pub fn set_ip(&mut self, line: usize, pending: bool) {
        if pending {
            self.cause |= 1 << (8 + line);
        } else {
            self.cause &= !(1 << (8 + line));
        }
    }
    fn interrupt_pending(&self) -> bool {
        (self.status.bits() >> 8) & (self.cause >> 8) & 0xff != 0
    }

    // TLBWI: write the staged entry registers into the slot Index selects.
    pub fn tlbwi(&mut self) {
        let slot = self.index as usize % self.tlb.len();
        self.tlb[slot] = TlbEntry {
            page_mask: self.page_mask,
            entry_hi: self.entry_hi,
            entry_lo0: self.entry_lo0,
            entry_lo1: self.entry_lo1,
        };
        trace!("[COP0] TLB entry {} written", slot);
    }
}

enum Translated {
    Bus(u32),
    Spram(u32),
}

pub struct CPU {
    pub gpr: Gprs,
    pub pc: u32,        // Address of the next fetch
    pub npc: u32,       // Fetch after that; branches redirect it
    pub cpc: u32,       // Address of the committed instruction
    pub hi: u128,       // Multiplier results; the high halves belong
    pub lo: u128,       // to pipeline 1
    pub sa: u32,        // Shift-amount register
    pub cop0: Cop0,
    pub fpr: [u32; 32], // COP1 register file, raw bits
    pub fcr31: u32,
    pub bus: BusPtr,    // Address bus
    pub in_slot: [bool; 2],
    int_pending: bool,
    pub fast_boot: bool,
    pub jmp: u32,       // Last jump location (debugger)
}

impl CPU {
    pub fn new(bus: BusPtr) -> Self {
        CPU {
            gpr: Gprs::new(),
            pc: RESET_VECTOR,
            npc: RESET_VECTOR.wrapping_add(4),
            cpc: RESET_VECTOR,
            hi: 0,
            lo: 0,
            sa: 0,
            cop0: Cop0::new(),
            fpr: [0; 32],
            fcr31: 0,
            bus,
            in_slot: [false, false],
            int_pending: false,
            fast_boot: false,
            jmp: RESET_VECTOR,
        }
    }

    // One architectural step: advance the delay-slot queue and Count, take a
    // pending interrupt, or fetch, decode and execute a single instruction.
    // The returned cycle cost feeds the scanline scheduler.
    pub fn step(&mut self) -> Result<u64, EmuError> {
        self.cpc = self.pc;
        self.in_slot[0] = self.in_slot[1];
        self.in_slot[1] = false;
        self.cop0.count = self.cop0.count.wrapping_add(1);
        if self.cop0.count == self.cop0.compare {
            self.cop0.set_ip(7, true);
        }
        if self.int_pending {
            self.int_pending = false;
            debug!("[EE] interrupt taken at {:#010x}", self.cpc);
            self.exception(Exception::Interrupt);
            return Ok(1);
        }
        let opcode = self.fetch()?;
        self.pc = self.npc;
        self.npc = self.npc.wrapping_add(4);
        let instruction =
            parse_instruction(opcode).ok_or(EmuError::Decode { pc: self.cpc, opcode })?;
        if log::log_enabled!(log::Level::Trace) {
            trace!("{:08x}: {}", self.cpc, instruction.as_asm());
        }
        instruction.execute(self)?;
        self.poll_interrupts();
        Ok(1)
    }

    // Mirror the INTC line into Cause.IP2 and latch the pending decision so
    // the next step vectors before fetching.
    fn poll_interrupts(&mut self) {
        let intc = self.bus.borrow().intc.pending();
        self.cop0.set_ip(2, intc);
        self.int_pending = self.cop0.interrupts_enabled() && self.cop0.interrupt_pending();
    }

    fn fetch(&mut self) -> Result<u32, EmuError> {
        if self.pc & 3 != 0 {
            return Err(EmuError::Alignment { addr: self.pc, width: Width::Word });
        }
        Ok(self.load(Width::Word, self.pc)?.inner() as u32)
    }

    // Kernel segments 8..B strip straight to physical; everything else goes
    // through the TLB, which is stubbed down to the kernel scratchpad
    // window plus an identity mapping.
    fn translate(&self, vaddr: u32) -> Translated {
        match vaddr >> 28 {
            0x8..=0xb => Translated::Bus(vaddr & 0x1fff_ffff),
            _ => {
                if (0x7000_0000..0x7000_4000).contains(&vaddr) {
                    Translated::Spram(vaddr & 0x3fff)
                } else {
                    Translated::Bus(vaddr & 0x1fff_ffff)
                }
            }
        }
    }

    pub fn load(&mut self, width: Width, vaddr: u32) -> Result<OpResult, EmuError> {
        if !width.aligned(vaddr) {
            return Err(EmuError::Alignment { addr: vaddr, width });
        }
        match self.translate(vaddr) {
            Translated::Spram(offset) => {
                let bus = self.bus.borrow();
                let offset = offset as usize;
                Ok(width.from_le_bytes(&bus.spram[offset..offset + width as usize]))
            }
            Translated::Bus(paddr) => self.bus.borrow_mut().read(paddr, width),
        }
    }

    pub fn store(&mut self, vaddr: u32, value: OpResult) -> Result<(), EmuError> {
        let width = value.width();
        if !width.aligned(vaddr) {
            return Err(EmuError::Alignment { addr: vaddr, width });
        }
        match self.translate(vaddr) {
            Translated::Spram(offset) => {
                let mut bus = self.bus.borrow_mut();
                let offset = offset as usize;
                let bytes = value.to_le_bytes();
                bus.spram[offset..offset + bytes.len()].copy_from_slice(&bytes);
                Ok(())
            }
            Translated::Bus(paddr) => self.bus.borrow_mut().write(paddr, value),
        }
    }

    // Non-faulting word read for the debugger panes.
    pub fn peek(&self, vaddr: u32) -> u32 {
        match self.translate(vaddr) {
            Translated::Spram(offset) => {
                let bus = self.bus.borrow();
                let offset = offset as usize & !3;
                u32::from_le_bytes([
                    bus.spram[offset],
                    bus.spram[offset + 1],
                    bus.spram[offset + 2],
                    bus.spram[offset + 3],
                ])
            }
            Translated::Bus(paddr) => self
                .bus
                .borrow_mut()
                .read(paddr & !3, Width::Word)
                .map(|r| r.inner() as u32)
                .unwrap_or(0),
        }
    }

    // A conditional branch computes its target from the already-advanced PC
    // (the delay slot address). An untaken likely branch annuls the slot by
    // stepping straight over it.
    pub fn branch(&mut self, taken: bool, offset: i16, likely: bool) {
        self.in_slot[1] = true;
        if taken {
            self.npc = self.pc.wrapping_add(((offset as i32) << 2) as u32);
            self.jmp = self.npc;
        } else if likely {
            self.in_slot[1] = false;
            self.pc = self.pc.wrapping_add(4);
            self.npc = self.pc.wrapping_add(4);
        }
    }

    pub fn jump(&mut self, target: u32) {
        self.in_slot[1] = true;
        self.npc = target;
        self.jmp = target;
    }

    // The link register receives the address of the instruction after the
    // delay slot, which is exactly the not-yet-redirected npc.
    pub fn link(&mut self, reg: usize) {
        let npc = self.npc;
        self.gpr.set64(reg, npc as u64);
    }

    // Level-1 exception entry.
    pub fn exception(&mut self, exc: Exception) {
        self.cop0.set_excode(exc);
        let base = if self.cop0.status.contains(Status::BEV) { 0xbfc0_0200 } else { 0x8000_0000 };
        let vector = base + if exc == Exception::Interrupt { 0x200 } else { 0x180 };
        if !self.cop0.status.contains(Status::EXL) {
            if self.in_slot[0] {
                self.cop0.epc = self.cpc.wrapping_sub(4);
                self.cop0.cause |= CAUSE_BD;
            } else {
                self.cop0.epc = self.cpc;
                self.cop0.cause &= !CAUSE_BD;
            }
            self.cop0.status.insert(Status::EXL);
        }
        self.in_slot = [false, false];
        self.pc = vector;
        self.npc = vector.wrapping_add(4);
        debug!("[EE] exception {:?}, vector {:#010x}", exc, vector);
    }

    // ERET: return through ErrorEPC while ERL is up, EPC otherwise. The
    // fast-boot hook address is where the BIOS jumps into a side-loaded
    // program; the orchestrator picks the flag up.
    pub fn eret(&mut self) {
        if self.cop0.status.contains(Status::ERL) {
            self.pc = self.cop0.error_epc;
            self.cop0.status.remove(Status::ERL);
        } else {
            self.pc = self.cop0.epc;
            self.cop0.status.remove(Status::EXL);
        }
        self.npc = self.pc.wrapping_add(4);
        self.in_slot = [false, false];
        self.jmp = self.pc;
        if self.pc == FAST_BOOT_HOOK {
            debug!("[EE] fast boot hook reached");
            self.fast_boot = true;
        }
    }

    pub fn ei(&mut self) {
        if self.cop0.edi_enabled() {
            self.cop0.status.insert(Status::EIE);
        }
    }
    pub fn di(&mut self) {
        if self.cop0.edi_enabled() {
            self.cop0.status.remove(Status::EIE);
        }
    }

    // HI/LO halves; the upper 64 bits belong to the pipeline-1 variants of
    // the multiplier instructions.
    pub fn lo0(&self) -> u64 {
        self.lo as u64
    }
    pub fn lo1(&self) -> u64 {
        (self.lo >> 64) as u64
    }
    pub fn hi0(&self) -> u64 {
        self.hi as u64
    }
    pub fn hi1(&self) -> u64 {
        (self.hi >> 64) as u64
    }
    pub fn set_lo0(&mut self, value: u64) {
        self.lo = (self.lo & !(u64::MAX as u128)) | value as u128;
    }
    pub fn set_lo1(&mut self, value: u64) {
        self.lo = (self.lo & u64::MAX as u128) | (value as u128) << 64;
    }
    pub fn set_hi0(&mut self, value: u64) {
        self.hi = (self.hi & !(u64::MAX as u128)) | value as u128;
    }
    pub fn set_hi1(&mut self, value: u64) {
        self.hi = (self.hi & u64::MAX as u128) | (value as u128) << 64;
    }

    pub fn disassemble(&self, lines: usize) -> Vec<(u32, u32, String)> {
        let mut rows = Vec::with_capacity(lines);
        for j in 0..lines {
            let addr = self.cpc.wrapping_add(4 * j as u32);
            let opcode = self.peek(addr);
            let text = match parse_instruction(opcode) {
                Some(instruction) => instruction.as_asm(),
                None => String::from("dc"),
            };
            rows.push((addr, opcode, text));
        }
        rows
    }
}

impl fmt::Display for CPU {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::from("\n");
        s.push_str(&format!("{r}╔═══════════════════════════════════════════════════╗", r = cursor::Goto(1, 2)));
        s.push_str(&format!("{r}║ EE state                                          ║", r = cursor::Goto(1, 3)));
        s.push_str(&format!("{r}╟──────┬──────────────────┬──────┬──────────────────╢", r = cursor::Goto(1, 4)));
        for j in 0..16 {
            s.push_str(&format!(
                "{r}║ {n1:<4} │ {a:016x} │ {n2:<4} │ {d:016x} ║\n",
                n1 = GPR_NAMES[j],
                a = self.gpr.get64(j),
                n2 = GPR_NAMES[j + 16],
                d = self.gpr.get64(j + 16),
                r = cursor::Goto(1, (j + 5) as u16),
            ));
        }
        s.push_str(&format!("{r}╟──────┼──────────────────┼──────┼──────────────────╢", r = cursor::Goto(1, 21)));
        s.push_str(&format!(
            "{r}║ pc   │ {pc:016x} │ stat │ {st:016x} ║\n",
            pc = self.cpc as u64,
            st = self.cop0.status.bits() as u64,
            r = cursor::Goto(1, 22),
        ));
        s.push_str(&format!(
            "{r}║ hi   │ {hi:016x} │ lo   │ {lo:016x} ║\n",
            hi = self.hi0(),
            lo = self.lo0(),
            r = cursor::Goto(1, 23),
        ));
        s.push_str(&format!("{r}╚══════╧══════════════════╧══════╧══════════════════╝", r = cursor::Goto(1, 24)));
        write!(f, "{}", s)
    }
}

pub struct Disassembly {
    pub rows: Vec<(u32, u32, String)>,
    pub length: usize,
    pub breakpoints: HashSet<u32>,
}

impl Disassembly {
    pub fn new(lines: usize) -> Self {
        Self { rows: Vec::with_capacity(lines), length: lines, breakpoints: HashSet::new() }
    }
    pub fn update(&mut self, cpu: &CPU) {
        self.rows = cpu.disassemble(self.length);
    }
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut result = String::new();
        result.push_str(&format!(
            "{r} Next instructions\n",
            r = cursor::Goto(56, 3)
        ));
        for (j, line) in self.rows.iter().enumerate() {
            let mut symbol = String::from(" ");
            let mut col = format!("{}", color::Fg(color::Reset));
            if self.breakpoints.contains(&line.0) {
                symbol = format!("{r}*{n}", n = color::Fg(color::Reset), r = color::Fg(color::Red));
            }
            if j == 0 {
                symbol.push_str(&format!("{g}>", g = color::Fg(color::Green)));
                col = format!("{}", color::Fg(color::Green));
            }
            result.push_str(&format!(
                "{r}{sym}{a:08x} │ {col}{o:08x}  {i:<32}{n}\n",
                n = color::Fg(color::Reset),
                col = col,
                o = line.1,
                i = line.2,
                a = line.0,
                r = cursor::Goto(56, (j + 5) as u16),
                sym = symbol,
            ));
        }
        write!(f, "{}", result)
    }
}

pub struct Debugger {
    disassembly: Disassembly,
    code_running: bool,
    last_cmd: DebugCommand,
    variables: HashSet<u32>,
}

#[derive(PartialEq, Clone)]
enum DebugCommand {
    Quit,
    SetBreakpoint(Option<String>),
    DeleteBreakpoint(Option<String>),
    Continue,
    Step,
    Jump(Option<String>),
    Watch(Option<String>),
    Unwatch(Option<String>),
}

impl Debugger {
    pub fn new() -> Box<Self> {
        Box::new(Debugger {
            disassembly: Disassembly::new(12),
            code_running: false,
            last_cmd: DebugCommand::Step,
            variables: HashSet::new(),
        })
    }
    fn set_breakpoint(&mut self, breakpoint: &Option<String>, cpu: &CPU, delete: bool) {
        if let Some(address) = parse_address(breakpoint) {
            if delete {
                self.disassembly.breakpoints.remove(&address);
            } else {
                self.disassembly.breakpoints.insert(address);
            }
            self.draw_user_interface(cpu);
            if delete {
                println!("Breakpoint deleted.");
            } else {
                println!("Breakpoint created.");
            }
        } else {
            self.draw_user_interface(cpu);
            println!("Invalid address!");
        }
    }
    fn watch_address(&mut self, address: &Option<String>, cpu: &CPU, watch: bool) {
        if let Some(address) = parse_address(address) {
            if watch {
                self.variables.insert(address);
            } else {
                self.variables.remove(&address);
            }
            self.draw_user_interface(cpu);
        } else {
            self.draw_user_interface(cpu);
            println!("Invalid address!");
        }
    }
    fn get_command(&mut self) -> DebugCommand {
        let mut input = String::new();
        io::stdin().read_line(&mut input).unwrap_or(0);
        let mut cmd = input.split_whitespace();
        match cmd.next() {
            Some("q") => DebugCommand::Quit,
            Some("s") | Some("n") => DebugCommand::Step,
            Some("b") => DebugCommand::SetBreakpoint(cmd.next().map(String::from)),
            Some("d") => DebugCommand::DeleteBreakpoint(cmd.next().map(String::from)),
            Some("j") => DebugCommand::Jump(cmd.next().map(String::from)),
            Some("w") => DebugCommand::Watch(cmd.next().map(String::from)),
            Some("u") => DebugCommand::Unwatch(cmd.next().map(String::from)),
            Some("c") => DebugCommand::Continue,
            _ => self.last_cmd.clone(),
        }
    }
    fn draw_user_interface(&mut self, cpu: &CPU) {
        print!("{c}{tl}{cpu}", c = clear::All, tl = cursor::Goto(1, 1), cpu = cpu);
        print!("{dis}", dis = self.disassembly);
        if !self.variables.is_empty() {
            println!("{r}Watched memory locations", r = cursor::Goto(1, 26));
            for var in self.variables.iter() {
                println!("{:08x}: {:08x}", var, cpu.peek(*var));
            }
        }
        println!("{r}\nDebugger attached. Enter n to single step, c to continue, b/d <addr> to enter/delete a breakpoint at addr, j <addr> to jump to <addr> or q to quit.",
            r = cursor::Goto(1, (27 + self.variables.len()) as u16));
        print!("{r}> ", r = cursor::Goto(1, (29 + self.variables.len()) as u16));
        io::stdout().flush().expect("");
    }
    pub fn update(&mut self, cpu: &mut CPU) -> Signal {
        if !self.code_running || self.disassembly.breakpoints.contains(&cpu.cpc) {
            self.code_running = false;
            self.disassembly.update(cpu);
            self.draw_user_interface(cpu);
            let cmd = self.get_command();
            match &cmd {
                DebugCommand::Quit => Signal::Quit,
                DebugCommand::SetBreakpoint(b) => {
                    self.set_breakpoint(&b, cpu, false);
                    Signal::NoOp
                }
                DebugCommand::DeleteBreakpoint(b) => {
                    self.set_breakpoint(&b, cpu, true);
                    Signal::NoOp
                }
                DebugCommand::Watch(a) => {
                    self.watch_address(&a, cpu, true);
                    Signal::NoOp
                }
                DebugCommand::Unwatch(a) => {
                    self.watch_address(&a, cpu, false);
                    Signal::NoOp
                }
                DebugCommand::Continue => {
                    self.code_running = true;
                    Signal::Ok
                }
                DebugCommand::Step => {
                    self.last_cmd = cmd;
                    Signal::Ok
                }
                DebugCommand::Jump(a) => {
                    if let Some(address) = parse_address(a) {
                        cpu.pc = address;
                        cpu.npc = address.wrapping_add(4);
                        self.last_cmd = cmd;
                        Signal::Ok
                    } else {
                        Signal::NoOp
                    }
                }
            }
        } else {
            Signal::Ok
        }
    }
}

fn parse_address(address: &Option<String>) -> Option<u32> {
    match address {
        Some(addr) => u32::from_str_radix(addr.trim_start_matches("0x"), 16).ok(),
        None => None,
    }
}
