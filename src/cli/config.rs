// CLI configuration
use clap::{Parser, Subcommand, ValueEnum};

/// oggplex - Ogg bitstream inspection and remuxing tool
#[derive(Parser, Debug)]
#[command(name = "oggplex")]
#[command(about = "Inspect, verify and remux Ogg bitstreams", long_about = None)]
#[command(version)]
pub struct Config {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub format: OutputFormat,

    /// Quiet mode (suppress progress messages)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One aligned line per item
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the pages of Ogg file(s), reporting damaged ones
    Pages {
        /// Ogg file path(s) or glob patterns
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,
    },

    /// List reassembled packets of Ogg file(s)
    Packets {
        /// Ogg file path(s) or glob patterns
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,

        /// Only show packets of this stream serial number
        #[arg(short, long)]
        serial: Option<u32>,

        /// Include packet payloads (base64)
        #[arg(long)]
        data: bool,
    },

    /// Demultiplex a file and write its packets back out as fresh pages
    Remux {
        /// Source Ogg file
        #[arg(value_name = "INPUT")]
        input: String,

        /// Destination file
        #[arg(short, long)]
        output: String,

        /// Maximum segments per output page
        #[arg(long, default_value_t = 255, value_parser = clap::value_parser!(u8).range(1..))]
        max_segments: u8,
    },
}
