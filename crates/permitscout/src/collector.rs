use std::collections::VecDeque;
use std::fmt::Display;
use std::fs;

use tokio::time::sleep;

use crate::actions::{click_when_clickable, enter_frame, is_in_frame, set_field_value};
use crate::browser::{Browser, BrowserError, Locator};
use crate::config::PipelineConfig;
use crate::dataset::{DatasetError, MergeOutcome, merge_export};
use crate::intervals::DateInterval;
use crate::utils::RecordTypeFilter;
use crate::wait::{Wait, find_download, wait_for_download};

pub const PORTAL_FRAME: Locator = Locator::xpath_static(r#"//iframe[@id="ACAFrame"]"#);
pub const PERMITS_TAB: Locator = Locator::xpath_static(
    r#"//a[@id="ctl00_PlaceHolderMain_TabDataList_TabsDataList_ctl02_LinksDataList_ctl00_LinkItemUrl"]"#,
);
pub const START_DATE_INPUT: Locator = Locator::xpath_static(
    r#"//input[@id="ctl00_PlaceHolderMain_generalSearchForm_txtGSStartDate"]"#,
);
pub const END_DATE_INPUT: Locator = Locator::xpath_static(
    r#"//input[@id="ctl00_PlaceHolderMain_generalSearchForm_txtGSEndDate"]"#,
);
pub const SEARCH_BUTTON: Locator =
    Locator::xpath_static(r#"//a[@id="ctl00_PlaceHolderMain_btnNewSearch"]"#);
pub const NO_RESULTS_MESSAGE: Locator = Locator::xpath_static(
    r#"//span[@id="ctl00_PlaceHolderMain_RecordSearchResultInfo_noDataMessageForSearchResultList_lblMessage"]"#,
);
pub const EXPORT_BUTTON: Locator = Locator::xpath_static(
    r#"//a[@id="ctl00_PlaceHolderMain_dgvPermitList_gdvPermitList_gdvPermitListtop4btnExport"]"#,
);
pub const LOADING_INDICATOR: Locator = Locator::class_static("ACA_Global_Loading");

const DATE_EVENTS: [&str; 2] = ["change", "blur"];

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("Download failed or timed out")]
    DownloadTimedOut,
    #[error("Download finished but no export file matched {0}")]
    DownloadMissing(String),
    #[error("Could not enter the portal iframe")]
    FrameUnavailable,
}

/// Where a single interval is in its search/export cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalState {
    Idle,
    FormFilled,
    Searched,
    NoResults,
    ResultsExported,
    Merged,
}

impl Display for IntervalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IntervalState::Idle => "idle",
            IntervalState::FormFilled => "form filled",
            IntervalState::Searched => "searched",
            IntervalState::NoResults => "no results",
            IntervalState::ResultsExported => "results exported",
            IntervalState::Merged => "merged",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalOutcome {
    /// The portal had nothing for the interval. Not a failure.
    NoResults,
    /// The export was folded in; `rows` is the canonical dataset's size after.
    Merged { rows: usize },
}

/// Intervals waiting for another attempt, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedIntervalQueue {
    intervals: VecDeque<DateInterval>,
}

impl FailedIntervalQueue {
    pub fn push(&mut self, interval: DateInterval) {
        self.intervals.push_back(interval);
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateInterval> {
        self.intervals.iter()
    }

    /// Empties the queue for a retry pass.
    pub fn take(&mut self) -> Vec<DateInterval> {
        self.intervals.drain(..).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub completed: Vec<(DateInterval, IntervalOutcome)>,
    /// Intervals still failing when retrying stopped.
    pub abandoned: Vec<DateInterval>,
    pub passes: usize,
}

impl CollectionReport {
    pub fn merged(&self) -> usize {
        self.completed
            .iter()
            .filter(|(_, o)| matches!(o, IntervalOutcome::Merged { .. }))
            .count()
    }

    pub fn empty(&self) -> usize {
        self.completed
            .iter()
            .filter(|(_, o)| *o == IntervalOutcome::NoResults)
            .count()
    }
}

/// Drives the permits portal's search form one date interval at a time and
/// folds each export into the canonical dataset.
pub struct CollectionController<'a, B: Browser> {
    browser: &'a mut B,
    config: &'a PipelineConfig,
    filter: Option<RecordTypeFilter>,
}

impl<'a, B: Browser> CollectionController<'a, B> {
    pub fn new(
        browser: &'a mut B,
        config: &'a PipelineConfig,
        filter: Option<RecordTypeFilter>,
    ) -> Self {
        Self {
            browser,
            config,
            filter,
        }
    }

    fn presence_wait(&self) -> Wait {
        Wait::at_most(self.config.timeouts.presence)
    }

    fn loading_wait(&self) -> Wait {
        Wait::at_most(self.config.timeouts.loading)
    }

    /// Loads the portal, enters its iframe and opens the permit search tab.
    pub async fn open_portal(&mut self) -> Result<(), CollectError> {
        self.browser
            .navigate(&self.config.permits_url)
            .await
            .inspect_err(|e| log::error!("Failed to open the permits portal: {e}"))?;
        log::info!("Opened {}", self.config.permits_url);

        let frame_wait = Wait::at_most(self.config.timeouts.frame);
        if !enter_frame(self.browser, &PORTAL_FRAME, frame_wait).await {
            return Err(CollectError::FrameUnavailable);
        }

        click_when_clickable(self.browser, &PERMITS_TAB, self.presence_wait()).await?;
        log::info!("Opened the permit search tab");
        Ok(())
    }

    /// One search/export/merge cycle for `interval`.
    pub async fn collect_interval(
        &mut self,
        interval: DateInterval,
    ) -> Result<IntervalOutcome, CollectError> {
        let mut state = IntervalState::Idle;
        log::debug!("{interval}: {state}");

        // A failed attempt can leave the session outside the portal iframe
        let frame_check = Wait::at_most(self.config.timeouts.frame_check);
        if !is_in_frame(self.browser, &PORTAL_FRAME, frame_check).await {
            log::warn!("{interval}: not inside the portal iframe, reopening the portal");
            self.open_portal().await?;
        }

        let presence = self.presence_wait();
        let (start, end) = (interval.start_text(), interval.end_text());
        set_field_value(self.browser, &START_DATE_INPUT, &start, &DATE_EVENTS, presence).await?;
        log::info!("Set the start date: {start}");
        set_field_value(self.browser, &END_DATE_INPUT, &end, &DATE_EVENTS, presence).await?;
        log::info!("Set the end date: {end}");
        state = IntervalState::FormFilled;
        log::debug!("{interval}: {state}");

        let loading = self.loading_wait();
        loading
            .for_disappearance(self.browser, &LOADING_INDICATOR)
            .await;
        click_when_clickable(self.browser, &SEARCH_BUTTON, presence).await?;
        log::info!("Clicked the Search Button");
        loading
            .for_disappearance(self.browser, &LOADING_INDICATOR)
            .await;
        sleep(self.config.timeouts.settle).await;
        state = IntervalState::Searched;
        log::debug!("{interval}: {state}");

        let no_results = Wait::at_most(self.config.timeouts.no_results);
        match no_results
            .for_presence(self.browser, &NO_RESULTS_MESSAGE)
            .await
        {
            Ok(_) => {
                state = IntervalState::NoResults;
                log::info!("{interval}: {state}");
                return Ok(IntervalOutcome::NoResults);
            }
            Err(e) if e.is_absent() => {}
            Err(e) => return Err(e.into()),
        }

        self.clear_stale_exports()?;
        click_when_clickable(self.browser, &EXPORT_BUTTON, presence).await?;
        log::info!("Clicked the Download Button");
        loading
            .for_disappearance(self.browser, &LOADING_INDICATOR)
            .await;

        let downloaded = wait_for_download(
            &self.config.download_dir,
            &self.config.export_pattern,
            &self.config.in_progress_suffix,
            self.config.timeouts.download,
            self.config.timeouts.download_poll,
        )
        .await;
        if !downloaded {
            return Err(CollectError::DownloadTimedOut);
        }
        state = IntervalState::ResultsExported;
        log::debug!("{interval}: {state}");

        let export = find_download(&self.config.download_dir, &self.config.export_pattern)
            .ok_or_else(|| CollectError::DownloadMissing(self.config.export_pattern.to_string()))?;
        let rows = match merge_export(
            &export,
            &self.config.canonical_path,
            self.filter.as_ref(),
        )? {
            MergeOutcome::Created { rows } | MergeOutcome::Merged { rows } => rows,
        };
        state = IntervalState::Merged;
        log::info!("{interval}: {state}, data file now has {rows} row(s)");

        Ok(IntervalOutcome::Merged { rows })
    }

    /// Exports left over from an interrupted attempt would be merged twice.
    fn clear_stale_exports(&self) -> Result<(), CollectError> {
        while let Some(stale) = find_download(&self.config.download_dir, &self.config.export_pattern)
        {
            log::warn!("Removing leftover export {}", stale.display());
            fs::remove_file(&stale).map_err(DatasetError::from)?;
        }
        Ok(())
    }

    /// Up to `attempts_per_interval` tries at one interval.
    pub async fn collect_with_attempts(&mut self, interval: DateInterval) -> Option<IntervalOutcome> {
        let attempts = self.config.attempts_per_interval.max(1);
        for attempt in 1..=attempts {
            match self.collect_interval(interval).await {
                Ok(outcome) => return Some(outcome),
                Err(e) => {
                    log::error!("{interval}: attempt {attempt}/{attempts} failed: {e}");
                    sleep(self.config.interval_retry_delay).await;
                }
            }
        }
        None
    }

    /// Processes `intervals` in order, returning the ones that still failed.
    pub async fn run_pass(
        &mut self,
        intervals: Vec<DateInterval>,
        report: &mut CollectionReport,
    ) -> FailedIntervalQueue {
        let mut failed = FailedIntervalQueue::default();
        for interval in intervals {
            log::info!("Processing interval: {interval}");
            match self.collect_with_attempts(interval).await {
                Some(outcome) => report.completed.push((interval, outcome)),
                None => {
                    log::warn!("Failed to get case files for {interval}");
                    failed.push(interval);
                }
            }
        }
        report.passes += 1;
        failed
    }

    /// A chronological pass over every interval, then breadth-first retry
    /// passes over the failures.
    ///
    /// Retrying stops once nothing is left, when a retry pass recovers no
    /// interval, or after `max_retry_passes` retry passes.
    pub async fn collect_all(&mut self, intervals: Vec<DateInterval>) -> CollectionReport {
        let mut report = CollectionReport::default();
        let mut failed = self.run_pass(intervals, &mut report).await;

        let mut retry_passes = 0;
        while !failed.is_empty() {
            if retry_passes >= self.config.max_retry_passes {
                log::error!(
                    "Giving up on {} interval(s) after {retry_passes} retry pass(es)",
                    failed.len()
                );
                break;
            }
            retry_passes += 1;

            let before = failed.len();
            log::info!("Retry pass {retry_passes} over {before} failed interval(s)");
            let remaining = self.run_pass(failed.take(), &mut report).await;

            if remaining.len() >= before {
                log::error!(
                    "No progress in retry pass {retry_passes}, giving up on {} interval(s)",
                    remaining.len()
                );
                failed = remaining;
                break;
            }
            failed = remaining;
        }

        report.abandoned = failed.take();
        report
    }
}
