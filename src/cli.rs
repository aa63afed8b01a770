use clap::Parser;

/// Checks today's LMS calendar for attendance sessions that can be
/// submitted and posts a notification for each one.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Env-style file with KEY=value settings (overrides CONFIG_FILE)
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Log notifications instead of posting them
    #[arg(long)]
    pub dry_run: bool,

    /// Eligibility policy for this run: state, window or lead
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<String>,
}
