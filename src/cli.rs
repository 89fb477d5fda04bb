use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "espfs")]
#[command(version)]
#[command(about = "Read files out of an EspFs image", long_about = None)]
#[command(after_help = "Examples:\n  \
  espfs webpages.espfs index.html              print index.html to stdout\n  \
  espfs webpages.espfs /js/app.js -z -o app.js  extract and gunzip a precompressed file\n  \
  espfs webpages.espfs style.css --flags       show entry information")]
pub struct Cli {
    /// EspFs image file
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Path of the file inside the image
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Write to FILE instead of stdout
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show flags, compression and lengths instead of the content
    #[arg(long = "flags")]
    pub show_flags: bool,

    /// Decode entries marked as gzip-precompressed
    #[arg(short = 'z', long = "gunzip")]
    pub gunzip: bool,

    /// Start reading at this offset (stored entries only)
    #[arg(long, value_name = "N", default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,

    /// Name buffer capacity used when matching paths
    #[arg(long, value_name = "BYTES", default_value_t = Config::DEFAULT_MAX_NAME_LEN)]
    pub max_name_len: usize,

    /// Compressed bytes fed to the decoder per step
    #[arg(long, value_name = "BYTES", default_value_t = Config::DEFAULT_FEED_CHUNK)]
    pub feed_chunk: usize,

    /// Decoder input buffer size
    #[arg(long, value_name = "BYTES", default_value_t = Config::DEFAULT_DECODER_INPUT_BUFFER)]
    pub decoder_buffer: usize,

    /// Passes without progress before a read is declared corrupt
    #[arg(long, value_name = "N", default_value_t = Config::DEFAULT_STALL_LIMIT)]
    pub stall_limit: u32,

    /// Verbose logging (-vv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode
    #[arg(short = 'q')]
    pub quiet: bool,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            max_name_len: self.max_name_len,
            feed_chunk: self.feed_chunk,
            decoder_input_buffer: self.decoder_buffer,
            stall_limit: self.stall_limit,
        }
    }

    /// Default log filter when `RUST_LOG` is not set
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_config() {
        let cli = Cli::parse_from(["espfs", "image.bin", "index.html"]);
        assert_eq!(cli.config(), Config::default());
        assert_eq!(cli.offset, 0);
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn flags_are_parsed() {
        let cli = Cli::parse_from([
            "espfs", "image.bin", "/a.js", "-z", "--offset", "-4", "--feed-chunk", "32", "-vv",
        ]);
        assert!(cli.gunzip);
        assert_eq!(cli.path, "/a.js");
        assert_eq!(cli.offset, -4);
        assert_eq!(cli.config().feed_chunk, 32);
        assert_eq!(cli.log_filter(), "trace");
    }
}
