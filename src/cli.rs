//! Command line

use clap::Parser;
use resinkit_core::constants::DEFAULT_SETTINGS_PATH;
use std::path::PathBuf;

/// ResinKit printer control core
#[derive(Parser, Debug, Clone)]
#[command(name = "resinkit")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Settings file, created with defaults on first save
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    pub settings: PathBuf,

    /// Directory holding the loaded print data (overrides the settings file)
    #[arg(long)]
    pub print_data_dir: Option<PathBuf>,

    /// Read host commands from this file or FIFO instead of stdin
    #[arg(long)]
    pub command_pipe: Option<PathBuf>,

    /// Simulate the motor controller so motions complete on their own
    #[arg(long)]
    pub simulate: bool,

    /// Seconds each simulated motion takes
    #[arg(long, default_value_t = 0.5)]
    pub motion_seconds: f64,

    /// Boot into demo mode
    #[arg(long)]
    pub demo: bool,

    /// Boot as if the door were open
    #[arg(long)]
    pub door_open: bool,

    /// One-wire thermometer device file; a fixed simulated reading otherwise
    #[arg(long)]
    pub thermometer: Option<PathBuf>,

    /// Log one JSON object per line
    #[arg(long)]
    pub json_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["resinkit"]);
        assert_eq!(args.settings, PathBuf::from(DEFAULT_SETTINGS_PATH));
        assert!(!args.simulate);
        assert!(args.command_pipe.is_none());
    }

    #[test]
    fn test_simulation_flags() {
        let args = Args::parse_from([
            "resinkit",
            "--simulate",
            "--motion-seconds",
            "0.1",
            "--door-open",
            "--print-data-dir",
            "/tmp/job",
        ]);
        assert!(args.simulate);
        assert_eq!(args.motion_seconds, 0.1);
        assert!(args.door_open);
        assert_eq!(args.print_data_dir, Some(PathBuf::from("/tmp/job")));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Args::try_parse_from(["resinkit", "--frobnicate"]).is_err());
    }
}
