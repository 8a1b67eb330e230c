use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use permitscout::config::DEFAULT_WEBDRIVER_URL;
use permitscout::intervals::{parse_portal_date, plan_intervals};
use permitscout::pipeline::{self, OutputFormat};
use permitscout::utils::{RecordWindow, RunStats};
use permitscout::{PipelineConfig, WebDriverBrowser, with_session};

#[derive(Parser)]
#[command(name = "permitscout")]
#[command(
    about = "Collects Columbus building permit records and enriches them with Franklin County auditor data",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(flatten)]
    browser: BrowserArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputArg {
    Xlsx,
    Csv,
    Json,
}

impl From<OutputArg> for OutputFormat {
    fn from(output: OutputArg) -> Self {
        match output {
            OutputArg::Xlsx => OutputFormat::Xlsx,
            OutputArg::Csv => OutputFormat::Csv,
            OutputArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Args)]
struct BrowserArgs {
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_WEBDRIVER_URL,
        help = "WebDriver (chromedriver) endpoint"
    )]
    webdriver_url: String,

    #[arg(
        long,
        global = true,
        default_value_t = true,
        action = ArgAction::Set,
        help = "Run Chrome without a window"
    )]
    headless: bool,

    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Directory for downloads, the data file and the output table"
    )]
    download_dir: PathBuf,
}

#[derive(Args)]
struct DateArgs {
    #[arg(
        long,
        value_name = "MM/DD/YYYY",
        help = "First day to collect; prompted for when omitted",
        value_parser = parse_date,
    )]
    start_date: Option<NaiveDate>,

    #[arg(
        long,
        value_name = "MM/DD/YYYY",
        help = "Last day to collect; prompted for when omitted",
        value_parser = parse_date,
    )]
    end_date: Option<NaiveDate>,

    #[arg(
        long,
        default_value_t = 10,
        help = "Retry passes over failed months before giving up"
    )]
    max_retry_passes: usize,
}

#[derive(Args)]
struct EnrichArgs {
    #[arg(long, help = "Maximum number of records to enrich")]
    limit: Option<usize>,

    #[arg(long, help = "Number of records to skip from the beginning")]
    offset: Option<usize>,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "xlsx",
        help = "Output format"
    )]
    format: OutputArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the permits portal month by month and build the data file
    Collect {
        #[command(flatten)]
        dates: DateArgs,
    },
    /// Look the collected records up on the auditor site and write the output table
    Enrich {
        #[command(flatten)]
        enrich: EnrichArgs,
    },
    /// Collect, then enrich
    Run {
        #[command(flatten)]
        dates: DateArgs,

        #[command(flatten)]
        enrich: EnrichArgs,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_portal_date(s).map_err(|e| e.to_string())
}

fn prompt_date(prompt: &str) -> NaiveDate {
    let stdin = io::stdin();
    loop {
        print!("{prompt}\t");
        if let Err(e) = io::stdout().flush() {
            log::warn!("Could not flush stdout: {e}");
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                log::error!("No date given");
                process::exit(1);
            }
            Ok(_) => match parse_portal_date(&line) {
                Ok(date) => return date,
                Err(e) => log::error!("{e}"),
            },
            Err(e) => {
                log::error!("Error reading input: {e}");
                process::exit(1);
            }
        }
    }
}

impl DateArgs {
    fn resolve(&self) -> (NaiveDate, NaiveDate) {
        let start = self
            .start_date
            .unwrap_or_else(|| prompt_date("Enter a starting date(MM/DD/YYYY): "));
        let end = self
            .end_date
            .unwrap_or_else(|| prompt_date("Enter a Ending date(MM/DD/YYYY): "));

        if let Err(e) = plan_intervals(start, end) {
            log::error!("Invalid args: {e}");
            process::exit(1);
        }
        (start, end)
    }
}

fn build_config(args: &BrowserArgs) -> PipelineConfig {
    if let Err(e) = std::fs::create_dir_all(&args.download_dir) {
        log::error!(
            "Error creating directory {}: {e}",
            args.download_dir.display()
        );
        process::exit(1);
    }

    let mut config = PipelineConfig::in_dir(&args.download_dir);
    config.webdriver_url = args.webdriver_url.clone();
    config.headless = args.headless;
    config
}

fn with_enrich_args(config: PipelineConfig, args: &EnrichArgs) -> PipelineConfig {
    let window = RecordWindow {
        offset: args.offset,
        limit: args.limit,
    }
    .validate()
    .unwrap_or_else(|e| {
        log::error!("Invalid args: {e}");
        process::exit(1);
    });

    let format = OutputFormat::from(args.format.clone());
    let output = config
        .download_dir
        .join(format!("Output.{}", format.extension()));
    let mut config = config.with_output_path(output);
    config.window = window;
    config
}

async fn connect(config: &PipelineConfig) -> WebDriverBrowser {
    WebDriverBrowser::connect(&config.browser_options())
        .await
        .unwrap_or_else(|e| {
            log::error!("Error starting browser session: {e}");
            process::exit(1);
        })
}

async fn collect(config: &PipelineConfig, start: NaiveDate, end: NaiveDate, stats: &mut RunStats) {
    let mut browser = connect(config).await;
    log::info!("Opened the browser");

    let result = with_session(&mut browser, async |b| {
        pipeline::run_collection(b, config, start, end, stats).await
    })
    .await;

    if let Err(e) = result {
        log::error!("Error collecting permit records: {e}");
        process::exit(1);
    }
}

async fn enrich(config: &PipelineConfig, format: OutputFormat, stats: &mut RunStats) {
    let mut browser = connect(config).await;

    let result = with_session(&mut browser, async |b| {
        pipeline::run_enrichment(b, config, format, stats).await
    })
    .await;

    if let Err(e) = result {
        log::error!("Error enriching records: {e}");
        process::exit(1);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let config = build_config(&cli.browser);
    let mut stats = RunStats::default();

    match cli.command {
        Commands::Collect { dates } => {
            let (start, end) = dates.resolve();
            let config = PipelineConfig {
                max_retry_passes: dates.max_retry_passes,
                ..config
            };
            collect(&config, start, end, &mut stats).await;
        }

        Commands::Enrich { enrich: args } => {
            let config = with_enrich_args(config, &args);
            enrich(&config, args.format.into(), &mut stats).await;
        }

        Commands::Run {
            dates,
            enrich: args,
        } => {
            let (start, end) = dates.resolve();
            let config = PipelineConfig {
                max_retry_passes: dates.max_retry_passes,
                ..with_enrich_args(config, &args)
            };
            collect(&config, start, end, &mut stats).await;
            enrich(&config, args.format.into(), &mut stats).await;
        }
    }

    print!("{stats}");
}
