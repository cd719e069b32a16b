use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "unpackr")]
#[command(version)]
#[command(about = "List, test and extract ZIP archives from files or HTTP URLs", long_about = None)]
#[command(after_help = "Examples:\n  \
  unpackr data1.zip -x joe        extract all files except joe from data1.zip\n  \
  unpackr -p foo.zip | more       send contents of foo.zip via pipe into more\n  \
  unpackr -t archive.zip          check sizes and CRCs of every entry\n  \
  unpackr -l https://example.com/archive.zip   list files from remote ZIP")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Test archive integrity without writing anything
    #[arg(short = 't')]
    pub test: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Diagnostic log level (off, error, warn, info, debug, trace)
    #[arg(long = "log", value_name = "LEVEL", default_value = "warn")]
    pub log_level: log::LevelFilter,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}
