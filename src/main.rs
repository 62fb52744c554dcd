use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use legacy2manifest::config::DEFAULT_ARCHITECTURE;
use legacy2manifest::{ChainPolicy, Config, ManifestProcessor, Notifier};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(help = "Path to a legacy image archive (docker save output, plain or gzipped)")]
    archive: PathBuf,

    #[arg(
        short,
        long,
        help = "Private key to sign the manifest with (PKCS#8 PEM/DER or JWK key.json)"
    )]
    key: Option<PathBuf>,

    #[arg(
        long,
        help = "Fail when some layers are not reachable from the root layer instead of dropping them"
    )]
    strict: bool,

    #[arg(
        long = "arch",
        default_value = DEFAULT_ARCHITECTURE,
        help = "Architecture recorded in the manifest"
    )]
    architecture: String,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace)"
    )]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::new(self.archive)
            .with_verbosity(self.verbose)
            .with_architecture(self.architecture);
        if let Some(key) = self.key {
            config = config.with_key(key);
        }
        if self.strict {
            config = config.with_chain_policy(ChainPolicy::Strict);
        }
        config
    }
}

fn write_stdout(bytes: &[u8]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|_| stdout.flush())
        .context("Failed to write manifest to stdout")
}

fn main() -> ExitCode {
    let config = Cli::parse().into_config();
    let verbosity = config.verbosity;
    let notifier = Notifier::new(verbosity);
    notifier.debug(&format!("Configuration: {:?}", config));

    let processor = match ManifestProcessor::new(config, notifier) {
        Ok(processor) => processor,
        Err(e) => {
            // Only key loading can fail here. The failed constructor consumed the notifier
            Notifier::new(verbosity).error(&e.to_string());
            return ExitCode::from(e.exit_code());
        }
    };

    match processor.generate() {
        Ok(output) => match write_stdout(&output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                processor.notifier().error(&format!("{:#}", e));
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            processor.notifier().error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}
