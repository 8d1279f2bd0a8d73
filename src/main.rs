use em5900::{ps2, Emulator, Host, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use minifb::{Key, Window, WindowOptions};
use std::path::PathBuf;
use std::process;

struct WindowHost {
    window: Window,
}

impl Host for WindowHost {
    fn render_frame(&mut self, framebuffer: &[u32], width: usize, height: usize) {
        self.window
            .update_with_buffer(framebuffer, width, height)
            .expect("Error updating screen!");
    }
    fn poll_input(&mut self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }
}

fn main() {
    env_logger::init();
    let mut debug = false;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--debug" {
            debug = true;
        } else {
            positional.push(arg);
        }
    }
    if positional.len() < 2 {
        eprintln!("usage: myps2 <bios-path> <executable-path> [--debug]");
        process::exit(-1);
    }
    let bios = PathBuf::from(&positional[0]);
    let program = PathBuf::from(&positional[1]);

    let config = match ps2::ps2(&bios, Some(program)) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}", error);
            process::exit(1);
        }
    };
    let mut emulator = Emulator::new(config);

    let window = Window::new(
        "em5900 - ESC to exit",
        DISPLAY_WIDTH,
        DISPLAY_HEIGHT,
        WindowOptions::default(),
    )
    .unwrap_or_else(|e| {
        panic!("{}", e);
    });
    let mut host = WindowHost { window };

    if let Err(error) = emulator.run(&mut host, debug) {
        eprintln!("{} (pc {:#010x})", error, emulator.cpu.cpc);
        process::exit(1);
    }
}
