use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "snowscene",
    author,
    version,
    about = "Layered animated winter scene",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Scene file to load instead of `<config dir>/scene.toml`.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory that layer asset paths are resolved against.
    #[arg(long, value_name = "DIR", env = "SNOWSCENE_ASSETS", global = true)]
    pub assets: Option<PathBuf>,

    /// Override the window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size, global = true)]
    pub size: Option<(u32, u32)>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a window and animate the scene (the default).
    Run,
    /// Render the scene on the in-memory backend with a fixed tick rate.
    Simulate(SimulateArgs),
    /// Manage the bundled scene file and show resolved paths.
    Defaults(DefaultsCommand),
}

#[derive(Args, Debug, Default)]
pub struct SimulateArgs {
    /// Simulated wall-clock span (e.g. `2s`, `1500ms`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Frames presented per simulated second.
    #[arg(long, value_name = "HZ", value_parser = clap::value_parser!(u32).range(1..))]
    pub tick_hz: Option<u32>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Use generated textures instead of decoding assets from disk.
    #[arg(long)]
    pub synthetic: bool,
}

#[derive(Parser, Debug)]
pub struct DefaultsCommand {
    #[command(subcommand)]
    pub action: DefaultsAction,
}

#[derive(Subcommand, Debug)]
pub enum DefaultsAction {
    /// Write the bundled scene file into the config directory.
    Write(DefaultsWriteArgs),
    /// Print resolved directories and the scene file location.
    Where(DefaultsWhereArgs),
}

#[derive(Args, Debug, Default)]
pub struct DefaultsWriteArgs {
    /// Replace an existing scene file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Default)]
pub struct DefaultsWhereArgs {
    /// Print the paths as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds)
            .map_err(|err| format!("invalid duration '{trimmed}': {err}"));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{trimmed}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_surface_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_surface_size(" 640 X 480 "), Ok((640, 480)));
        assert!(parse_surface_size("0x720").is_err());
        assert!(parse_surface_size("1280").is_err());
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("1500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("0.5"), Ok(Duration::from_millis(500)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn out_of_range_durations_are_errors() {
        for value in ["1e30", "inf", "-2", "NaN"] {
            assert!(parse_duration(value).is_err(), "{value}");
        }
        assert!(
            Cli::try_parse_from(["snowscene", "simulate", "--duration", "1e30"]).is_err()
        );
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["snowscene", "--size", "800x600"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.global.size, Some((800, 600)));
    }

    #[test]
    fn simulate_flags_parse() {
        let cli = Cli::try_parse_from([
            "snowscene",
            "simulate",
            "--duration",
            "3s",
            "--tick-hz",
            "30",
            "--json",
            "--synthetic",
        ])
        .expect("parse");
        match cli.command {
            Some(Command::Simulate(args)) => {
                assert_eq!(args.duration, Some(Duration::from_secs(3)));
                assert_eq!(args.tick_hz, Some(30));
                assert!(args.json && args.synthetic);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["snowscene", "simulate", "--tick-hz", "0"]).is_err());
    }
}
