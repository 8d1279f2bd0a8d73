use log::info;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
mod conversions;
pub mod devices;
pub mod dmac;
mod error;
pub mod fields;
pub mod gs;
mod instructions;
pub mod memory;
mod parser;
pub mod processor;
pub mod ps2;
pub mod vu0;
use devices::Signal;
use memory::Bus;
use processor::{Debugger, CPU};

pub use error::EmuError;

pub const DISPLAY_WIDTH: usize = 640;
pub const DISPLAY_HEIGHT: usize = 480;

pub struct Configuration {
    pub bus: Bus,
    pub program: Option<PathBuf>,
}

// The front end: a window (or a test harness) that presents each finished
// frame and reports whether the machine should keep running.
pub trait Host {
    fn render_frame(&mut self, framebuffer: &[u32], width: usize, height: usize);
    fn poll_input(&mut self) -> bool;
    // Reached when the BIOS hands control to a side-loaded program.
    fn boot_hook(&mut self) {}
}

pub struct Emulator {
    pub cpu: CPU,
    program: Option<PathBuf>,
    frame: Vec<u32>,
}

impl Emulator {
    pub fn new(config: Configuration) -> Emulator {
        let busptr = Rc::new(RefCell::new(config.bus));
        let cpu = CPU::new(Rc::clone(&busptr));
        Emulator { cpu, program: config.program, frame: Vec::new() }
    }

    // The top-level loop: one EE step, then the scanline scheduler, then —
    // once per vertical blank — presentation and input polling.
    pub fn run(&mut self, host: &mut dyn Host, debug: bool) -> Result<(), EmuError> {
        let mut debugger = Debugger::new();
        let mut idle = false;
        loop {
            if !idle {
                let cycles = self.cpu.step()?;
                let frame_ready = self.cpu.bus.borrow_mut().tick(cycles);
                if self.cpu.fast_boot {
                    self.cpu.fast_boot = false;
                    if let Some(program) = &self.program {
                        info!("boot hook reached, program {} is up to the host", program.display());
                    }
                    host.boot_hook();
                }
                if frame_ready {
                    {
                        let bus = self.cpu.bus.borrow();
                        bus.gs.display_framebuffer(DISPLAY_WIDTH, DISPLAY_HEIGHT, &mut self.frame);
                    }
                    host.render_frame(&self.frame, DISPLAY_WIDTH, DISPLAY_HEIGHT);
                    if !host.poll_input() {
                        break;
                    }
                }
            } else {
                idle = false;
            }
            if debug {
                match debugger.update(&mut self.cpu) {
                    Signal::Quit => break,
                    Signal::NoOp => {
                        idle = true;
                    }
                    _ => (),
                }
            }
        }
        Ok(())
    }
}
