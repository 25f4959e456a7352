use std::fs;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use sbc6502::cli::{self, Action, Options};
use sbc6502::io::{DataFileKeyboard, InteractiveKeyboard, StdoutTerminal};
use sbc6502::machine::Machine;
use sbc6502::EmulatorError;

/// Cycles executed per throttle batch. At 1.000 MHz this batch takes 20 ms.
const CYCLES_PER_BATCH: u32 = 20_000;
const BATCH_DURATION: Duration = Duration::from_millis(20);

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let action = match cli::parse(args) {
        Ok(action) => action,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::from(2);
        }
    };

    let options = match action {
        Action::Help(text) => {
            print!("{text}");
            return ExitCode::SUCCESS;
        }
        Action::Version(text) => {
            print!("{text}");
            return ExitCode::SUCCESS;
        }
        Action::Run(options) => options,
    };

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(3)
        }
    }
}

fn run(options: Options) -> Result<(), EmulatorError> {
    let has_data_file = options.data_file.is_some();
    let data_file_bytes = match &options.data_file {
        Some(path) => Some(fs::read(path)?),
        None => None,
    };

    // A data file needs no reset channel of its own; build the machine
    // with a throwaway keyboard first so we have a real ResetChannel to
    // hand to InteractiveKeyboard before it touches the terminal.
    let terminal = Box::new(StdoutTerminal::new());
    let bootstrap_keyboard: Box<dyn sbc6502::acia::KeyboardSource> =
        Box::new(DataFileKeyboard::new(Vec::new()));
    let mut machine = Machine::new(&options.rom_file, bootstrap_keyboard, terminal)?;

    let keyboard: Box<dyn sbc6502::acia::KeyboardSource> = match data_file_bytes {
        Some(bytes) => Box::new(DataFileKeyboard::new(bytes)),
        None => Box::new(InteractiveKeyboard::new(machine.reset_channel())?),
    };
    machine.set_keyboard(keyboard);
    machine.reset();

    let mut data_file_active = has_data_file;

    loop {
        let throttled = !(options.turbo || data_file_active);
        let start = throttled.then(Instant::now);

        let mut cycles = 0u32;
        while cycles < CYCLES_PER_BATCH {
            cycles += machine.step();
        }

        if data_file_active && machine.keyboard_exhausted() {
            machine.set_keyboard(Box::new(InteractiveKeyboard::new(machine.reset_channel())?));
            data_file_active = false;
        }

        if let Some(start) = start {
            let elapsed = start.elapsed();
            if elapsed < BATCH_DURATION {
                std::thread::sleep(BATCH_DURATION - elapsed);
            }
        }
    }
}
