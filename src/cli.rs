/*!
Hand-rolled command-line parser.

Mirrors the reference front-end's flag set exactly: `-h/--help`,
`-v/--version`, `-t/--turbo`, `-r/--rom FILE`, and a single trailing
positional data-injection file. There is no long-option-with-`=`
syntax (`--rom=FILE`) in the original and none is accepted here.
*/

use crate::error::EmulatorError;

const BANNER: &str = "sbc6502: 6502 + MC6850 single-board computer emulator\n";

const HELP: &str = "\
Usage:

  sbc6502 [options] [datafile]

Options:

  -h, --help          Show this help.
  -v, --version       Show version.
  -t, --turbo         Enable turbo mode.
  -r, --rom FILE      Specify ROM file.

Keyboard shortcuts:

  Ctrl-X      Quits emulator.
  Ctrl-R      Resets 6502 CPU.
";

/// What the driver should do after parsing argv.
#[derive(Debug)]
pub enum Action {
    /// `-h`/`--help` was given: the help text has already been produced.
    Help(String),
    /// `-v`/`--version` was given: the banner has already been produced.
    Version(String),
    /// Proceed with the machine using these options.
    Run(Options),
}

#[derive(Debug, Clone)]
pub struct Options {
    pub rom_file: String,
    pub turbo: bool,
    pub data_file: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rom_file: "all.rom".to_string(),
            turbo: false,
            data_file: None,
        }
    }
}

/// Parse the arguments following argv\[0\] (the caller strips the program
/// name before calling this).
pub fn parse<I, S>(args: I) -> Result<Action, EmulatorError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = Options::default();
    let mut positional = Vec::new();

    let mut iter = args.into_iter().map(|s| s.as_ref().to_string());
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Action::Help(HELP.to_string())),
            "-v" | "--version" => return Ok(Action::Version(BANNER.to_string())),
            "-t" | "--turbo" => options.turbo = true,
            "-r" | "--rom" => {
                let value = iter.next().ok_or_else(|| {
                    EmulatorError::Cli(format!("option {arg} needs an argument"))
                })?;
                options.rom_file = value;
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(EmulatorError::Cli(format!("unknown option {other}")));
            }
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() > 1 {
        return Err(EmulatorError::Cli(format!(
            "unexpected extra argument: {}",
            positional[1]
        )));
    }
    options.data_file = positional.into_iter().next();

    Ok(Action::Run(options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_all_rom_with_no_datafile() {
        let action = parse(std::iter::empty::<&str>()).unwrap();
        match action {
            Action::Run(opts) => {
                assert_eq!(opts.rom_file, "all.rom");
                assert!(!opts.turbo);
                assert!(opts.data_file.is_none());
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn parses_rom_turbo_and_datafile() {
        let action = parse(["-t", "--rom", "custom.rom", "inject.dat"]).unwrap();
        match action {
            Action::Run(opts) => {
                assert_eq!(opts.rom_file, "custom.rom");
                assert!(opts.turbo);
                assert_eq!(opts.data_file.as_deref(), Some("inject.dat"));
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn help_flag_short_circuits() {
        let action = parse(["-h"]).unwrap();
        assert!(matches!(action, Action::Help(_)));
    }

    #[test]
    fn version_flag_short_circuits() {
        let action = parse(["--version"]).unwrap();
        assert!(matches!(action, Action::Version(_)));
    }

    #[test]
    fn rom_flag_without_value_is_a_cli_error() {
        let err = parse(["--rom"]).unwrap_err();
        assert!(matches!(err, EmulatorError::Cli(_)));
    }

    #[test]
    fn unknown_flag_is_a_cli_error() {
        let err = parse(["--bogus"]).unwrap_err();
        assert!(matches!(err, EmulatorError::Cli(_)));
    }

    #[test]
    fn second_positional_argument_is_a_cli_error() {
        let err = parse(["one", "two"]).unwrap_err();
        assert!(matches!(err, EmulatorError::Cli(_)));
    }
}
