//! Command-line surface. Mirrors the original `ConfigService`'s argparse
//! flags (`--setup`, `--health`, `--version`, `--clear-key`, `--incognito`)
//! as a `clap` derive struct.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "whisperdoc-client")]
#[command(about = "Push-to-talk dictation client", long_about = None)]
pub struct Args {
    /// Run the interactive setup wizard and exit.
    #[arg(long)]
    pub setup: bool,

    /// Run a pre-flight server health check and exit.
    #[arg(long)]
    pub health: bool,

    /// Print the client version and exit.
    #[arg(long)]
    pub version: bool,

    /// Clear the stored API key for the configured server and exit.
    #[arg(long = "clear-key")]
    pub clear_key: bool,

    /// Enable Ghost Mode: demotes the local transcript log line and asks
    /// the server to minimize logging for this session.
    #[arg(long)]
    pub incognito: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_no_flags() {
        let args = Args::parse_from(["whisperdoc-client"]);
        assert!(!args.setup && !args.health && !args.version && !args.clear_key && !args.incognito);
    }

    #[test]
    fn parses_incognito_and_health() {
        let args = Args::parse_from(["whisperdoc-client", "--incognito", "--health"]);
        assert!(args.incognito);
        assert!(args.health);
        assert!(!args.setup);
    }

    #[test]
    fn parses_clear_key() {
        let args = Args::parse_from(["whisperdoc-client", "--clear-key"]);
        assert!(args.clear_key);
    }
}
