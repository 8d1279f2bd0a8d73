// Machine description for the PlayStation 2: the BIOS loader and the
// configuration handed to the emulator core.

use crate::error::EmuError;
use crate::memory::{Bus, BIOS_SIZE};
use crate::Configuration;
use std::fs;
use std::path::{Path, PathBuf};

// EE physical memory map
//
//   $0000_0000  32M   Main RAM
//   $1000_0000        Timer I/O
//   $1000_2000        IPU I/O
//   $1000_3000        GIF I/O
//   $1000_3800        VIF0 I/O
//   $1000_3C00        VIF1 I/O
//   $1000_4000  16B   VIF0 FIFO
//   $1000_5000  16B   VIF1 FIFO
//   $1000_6000  16B   GIF FIFO
//   $1000_7010  16B   IPU input FIFO
//   $1000_8000        DMAC channels + globals
//   $1000_F000   4B   INTC_STAT
//   $1000_F010   4B   INTC_MASK
//   $1000_F180   1B   KPUTCHAR
//   $1000_F430   4B   MCH_RICM
//   $1000_F440   4B   MCH_DRD
//   $1100_0000   4K   VU0 code
//   $1100_4000   4K   VU0 data
//   $1100_8000  16K   VU1 code
//   $1100_C000  16K   VU1 data
//   $1200_0000   8K   GS privileged registers
//   $1A00_0000        IOP window (stub)
//   $1FC0_0000   4M   BIOS
//
// The kernel scratchpad lives at virtual $7000_0000 and never appears on
// the physical bus; the CPU's address translator routes it.

pub fn ps2(bios_path: &Path, program: Option<PathBuf>) -> Result<Configuration, EmuError> {
    let bios = load_bios(bios_path)?;
    Ok(Configuration { bus: Bus::new(bios), program })
}

// The BIOS image is loaded verbatim; anything but exactly 4 MiB is refused.
pub fn load_bios(path: &Path) -> Result<Vec<u8>, EmuError> {
    let bios =
        fs::read(path).map_err(|e| EmuError::Bios(format!("{}: {}", path.display(), e)))?;
    if bios.len() != BIOS_SIZE {
        return Err(EmuError::Bios(format!(
            "{} is {} bytes, expected {}",
            path.display(),
            bios.len(),
            BIOS_SIZE
        )));
    }
    Ok(bios)
}
