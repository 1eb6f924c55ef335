//! This module contains the main structure and logic for the whole
//! application.

use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{debug, info, trace, warn, LevelFilter};
use simple_logger::SimpleLogger;

use crate::error::ApplicationError;
use crate::fetcher::BulkFetcher;
use crate::models::{AddOns, PageRequest, Writers, MAX_RESULTS_PER_PAGE};
use crate::nvd::client::CveConnector;
use crate::nvd::{NvdConfig, NVD_BASE_URL};
use crate::writers;

/// Represents the application
pub struct Application {
    /// The arguments given on the command line.
    argv: Option<Args>,
}

impl Application {
    /// Creates a new application
    pub fn new() -> Self {
        Application { argv: None }
    }

    /// Read argv to get the arguments before running the application
    ///
    /// A .env file in the working directory is loaded first, so the API key
    /// can be defined there.
    pub fn read_argv(&mut self) {
        if let Err(e) = dotenvy::dotenv() {
            // A missing .env file is the common case
            if !e.not_found() {
                eprintln!("Unable to load the .env file: {}", e);
            }
        }
        self.argv = Some(Args::parse());
    }

    /// Initializes the logger, the level depends on --verbose.
    /// RUST_LOG overrides it.
    /// read_argv() MUST have been called before
    pub fn init_logger(&self) {
        let verbose = self.argv.as_ref().map(|a| a.verbose).unwrap_or(0);
        let result = SimpleLogger::new()
            .with_level(level_filter(verbose))
            .env()
            .init();
        if let Err(e) = result {
            eprintln!("Unable to initialize the logger: {}", e);
        }
    }

    /// Builds the NVD configuration from the arguments.
    fn config(args: &Args) -> NvdConfig {
        NvdConfig::new(args.api_key.clone()).with_base_url(&args.base_url)
    }

    /// Runs the global application
    /// read_argv() MUST have been called before
    pub fn run(&self) -> Result<(), ApplicationError> {
        trace!("Running Application::run()");
        let args = self.argv.as_ref().ok_or(ApplicationError::ArgsNotRead)?;
        if args.api_key.is_none() {
            warn!("No API key provided, requests will be heavily rate limited");
        }

        let config = Self::config(args);
        let writer = writers::from_choice(args.writer);

        match &args.command {
            Command::Cve { cve_id } => {
                info!("Fetching {}", cve_id);
                let connector = CveConnector::new(config)?;
                match connector.get_cve(cve_id)? {
                    Some(record) => writer.write(1, &[&record]),
                    None => println!("{} is not known by the NVD", cve_id),
                }
            }
            Command::Cves {
                start_index,
                results_per_page,
                add_ons,
            } => {
                let request =
                    PageRequest::new(*start_index, *results_per_page, AddOns::from_flag(*add_ons));
                debug!("Fetching one page: {:?}", request);
                let connector = CveConnector::new(config)?;
                let page = connector.get_cves(&request)?;
                let records: Vec<_> = page.items.iter().collect();
                writer.write(page.total_results, &records);
            }
            Command::All {
                results_per_page,
                delay_ms,
                add_ons,
            } => {
                let config = match delay_ms {
                    Some(ms) => config.with_request_delay(Duration::from_millis(*ms)),
                    None => config,
                };
                info!(
                    "Fetching all CVEs, {:?} between requests",
                    config.request_delay
                );
                let connector = CveConnector::new(config.clone())?;
                let fetcher = BulkFetcher::from_config(connector, &config);
                let snapshot = fetcher.get_all_cves(
                    AddOns::from_flag(*add_ons),
                    *results_per_page,
                    |progress| info!("Fetched {}", progress),
                )?;
                writer.write_snapshot(&snapshot);
            }
        }
        Ok(())
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps the number of --verbose flags to a log level.
fn level_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Represents the CLI arguments accepted by nvd_connector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The NVD API key
    #[arg(short = 'k', long, env = "NVD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// The root URL of the NVD REST API
    #[arg(short, long, value_name = "URL", default_value = NVD_BASE_URL)]
    pub base_url: String,
    /// The writer to use
    #[arg(short, long, value_name = "WRITER", default_value = "textstdout")]
    pub writer: Writers,
    /// Increase the log level, can be repeated
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// What to fetch
    #[command(subcommand)]
    pub command: Command,
}

/// The operations available from the command line
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Fetch a single CVE
    Cve {
        /// The CVE identifier, e.g. CVE-2021-44228
        cve_id: String,
    },
    /// Fetch one page of CVEs
    Cves {
        /// Index of the first CVE of the page
        #[arg(short, long, default_value_t = 0)]
        start_index: u64,
        /// Number of CVEs in the page
        #[arg(short, long, default_value_t = MAX_RESULTS_PER_PAGE)]
        results_per_page: u32,
        /// Request the CPE dictionary data too
        #[arg(short, long)]
        add_ons: bool,
    },
    /// Fetch every CVE known by the NVD
    All {
        /// Number of CVEs per request
        #[arg(short, long, default_value_t = MAX_RESULTS_PER_PAGE)]
        results_per_page: u32,
        /// Pause between requests, defaults to the NVD rate limit
        #[arg(short, long, value_name = "MILLISECONDS")]
        delay_ms: Option<u64>,
        /// Request the CPE dictionary data too
        #[arg(short, long)]
        add_ons: bool,
    },
}
