use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::utils::RecordWindow;
use crate::webdriver::BrowserOptions;

static RE_EXPORT_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RecordList.*\.csv").expect("invalid regex: export file"));

pub const IN_PROGRESS_SUFFIX: &str = ".crdownload";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Upper bounds for every wait the pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Form inputs and buttons.
    pub presence: Duration,
    /// The portal's global loading overlay.
    pub loading: Duration,
    pub download: Duration,
    pub download_poll: Duration,
    /// Check for the permits portal's "no results" message.
    pub no_results: Duration,
    /// Each detail field.
    pub field: Duration,
    pub owners: Duration,
    /// Check for the auditor's "did not find any records" message.
    pub no_records: Duration,
    pub results_row: Duration,
    pub rental_button: Duration,
    pub frame: Duration,
    pub frame_check: Duration,
    /// Pause after a search or sub-page click before reading the page.
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            presence: Duration::from_secs(60),
            loading: Duration::from_secs(500),
            download: Duration::from_secs(10_000),
            download_poll: Duration::from_secs(1),
            no_results: Duration::from_secs(60),
            field: Duration::from_secs(5),
            owners: Duration::from_secs(10),
            no_records: Duration::from_secs(11),
            results_row: Duration::from_secs(5),
            rental_button: Duration::from_secs(10),
            frame: Duration::from_secs(60),
            frame_check: Duration::from_secs(10),
            settle: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub permits_url: String,
    pub auditor_url: String,
    pub webdriver_url: String,
    pub headless: bool,

    pub download_dir: PathBuf,
    pub export_pattern: Regex,
    pub in_progress_suffix: String,

    /// Accumulated search-result rows.
    pub canonical_path: PathBuf,
    /// Single-column allow-list of record types.
    pub filter_path: PathBuf,
    pub output_path: PathBuf,
    pub previous_output_path: PathBuf,
    pub processed_path: PathBuf,

    pub timeouts: Timeouts,
    pub attempts_per_interval: usize,
    pub interval_retry_delay: Duration,
    /// Retry passes over failed intervals after the first chronological pass.
    pub max_retry_passes: usize,

    pub window: RecordWindow,
}

impl PipelineConfig {
    /// Default configuration with every file living in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            permits_url: crate::PERMITS_URL.to_string(),
            auditor_url: crate::AUDITOR_URL.to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            download_dir: dir.to_path_buf(),
            export_pattern: RE_EXPORT_FILE.clone(),
            in_progress_suffix: IN_PROGRESS_SUFFIX.to_string(),
            canonical_path: dir.join("DataFile.csv"),
            filter_path: dir.join("record_types.csv"),
            output_path: dir.join("Output.xlsx"),
            previous_output_path: dir.join("Previous_output.xlsx"),
            processed_path: dir.join("ProcessedRecords.csv"),
            timeouts: Timeouts::default(),
            attempts_per_interval: 5,
            interval_retry_delay: Duration::from_secs(2),
            max_retry_passes: 10,
            window: RecordWindow::default(),
        }
    }

    /// Points the final table at `path`, keeping the rotation slot beside it.
    pub fn with_output_path(mut self, path: PathBuf) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Output".to_string());
        let previous = match path.extension() {
            Some(ext) => format!("Previous_{}.{}", stem.to_lowercase(), ext.to_string_lossy()),
            None => format!("Previous_{}", stem.to_lowercase()),
        };
        self.previous_output_path = path.with_file_name(previous);
        self.output_path = path;
        self
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
            download_dir: self.download_dir.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}
