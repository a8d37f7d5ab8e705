use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cleanmodels-front", version)]
#[command(about = "Console front-end for the cleanmodels-cli model cleaner", long_about = None)]
pub struct Cli {
    /// Directory the tool runs in and its configuration file lives in
    #[arg(long, global = true, value_name = "DIR")]
    pub work_dir: Option<Utf8PathBuf>,

    /// Front-end settings file (default: <work-dir>/cleanmodels-front.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<Utf8PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also print diagnostics to stderr and show status changes
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clean every model in the input directory
    Clean,
    /// Decompile binary models in the input directory
    Decompile,
    /// Show the input directory listing
    List,
    /// Show current option values
    Show,
    /// List options and the values they accept
    Options,
    /// Change one option in the configuration file
    Set {
        /// Option name, or indir/outdir/pattern/logfile/small_log
        key: String,
        /// New value
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Copy the configuration file out (a missing extension becomes .cm)
    Export { file: Utf8PathBuf },
    /// Replace the configuration file with a saved copy
    Import { file: Utf8PathBuf },
    /// Write the effective front-end settings to the settings file
    InitSettings,
    /// Watch the input directory and read commands from stdin
    Interactive,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_with_global_flags() {
        let cli = Cli::parse_from([
            "cleanmodels-front",
            "set",
            "rescaleXYZ",
            "2,1,1",
            "--work-dir",
            "models",
            "--debug",
        ]);
        assert!(cli.debug);
        assert_eq!(cli.work_dir, Some(Utf8PathBuf::from("models")));
        match cli.command {
            Some(Commands::Set { key, value }) => {
                assert_eq!(key, "rescaleXYZ");
                assert_eq!(value, "2,1,1");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::parse_from(["cleanmodels-front"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }
}
