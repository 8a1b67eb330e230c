use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tokio::time::{Instant, sleep};

use crate::browser::{Browser, BrowserError, ErrorKind, Locator};

pub const DEFAULT_POLL: Duration = Duration::from_millis(500);

/// A bounded polling wait against the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Wait {
    pub fn at_most(timeout: Duration) -> Self {
        Self {
            timeout,
            poll: DEFAULT_POLL,
        }
    }

    pub fn every(self, poll: Duration) -> Self {
        Self { poll, ..self }
    }

    pub async fn for_presence<B: Browser>(
        &self,
        browser: &mut B,
        locator: &Locator,
    ) -> Result<B::Element, BrowserError> {
        self.for_element(browser, locator, false).await
    }

    /// Present, displayed and enabled.
    pub async fn for_clickable<B: Browser>(
        &self,
        browser: &mut B,
        locator: &Locator,
    ) -> Result<B::Element, BrowserError> {
        self.for_element(browser, locator, true).await
    }

    /// Every element matching `locator`, once at least one exists.
    pub async fn for_all_present<B: Browser>(
        &self,
        browser: &mut B,
        locator: &Locator,
    ) -> Result<Vec<B::Element>, BrowserError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match browser.locate_all(locator).await {
                Ok(found) if !found.is_empty() => return Ok(found),
                Ok(_) => {}
                Err(e) if still_loading(&e) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(self.gave_up(locator));
            }
            sleep(self.poll).await;
        }
    }

    /// Waits until nothing matching `locator` is visible.
    ///
    /// A timeout is logged and reported as `false`; callers carry on either way,
    /// since the indicator may never have been shown.
    pub async fn for_disappearance<B: Browser>(&self, browser: &mut B, locator: &Locator) -> bool {
        let deadline = Instant::now() + self.timeout;
        loop {
            let visible = match browser.locate(locator).await {
                Ok(Some(element)) => match browser.is_displayed(&element).await {
                    Ok(displayed) => displayed,
                    Err(e) if e.kind() == ErrorKind::Stale => false,
                    Err(e) => {
                        log::warn!("Error checking visibility of {locator}: {e}");
                        true
                    }
                },
                Ok(None) => false,
                Err(e) => {
                    log::warn!("Error locating {locator}: {e}");
                    true
                }
            };

            if !visible {
                log::debug!("{locator} is no longer visible");
                return true;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "Timed out after {:?} waiting for {locator} to disappear",
                    self.timeout
                );
                return false;
            }
            sleep(self.poll).await;
        }
    }

    async fn for_element<B: Browser>(
        &self,
        browser: &mut B,
        locator: &Locator,
        clickable: bool,
    ) -> Result<B::Element, BrowserError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match locate_ready(browser, locator, clickable).await {
                Ok(Some(element)) => return Ok(element),
                Ok(None) => {}
                Err(e) if still_loading(&e) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(self.gave_up(locator));
            }
            sleep(self.poll).await;
        }
    }

    fn gave_up(&self, locator: &Locator) -> BrowserError {
        BrowserError::NotFound(format!("{locator} (waited {:?})", self.timeout))
    }
}

async fn locate_ready<B: Browser>(
    browser: &mut B,
    locator: &Locator,
    clickable: bool,
) -> Result<Option<B::Element>, BrowserError> {
    let Some(element) = browser.locate(locator).await? else {
        return Ok(None);
    };
    if clickable
        && !(browser.is_displayed(&element).await? && browser.is_enabled(&element).await?)
    {
        return Ok(None);
    }
    Ok(Some(element))
}

fn still_loading(err: &BrowserError) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::Stale)
}

/// Polls `folder` until a file matching `pattern` exists and no file ending in
/// `in_progress_suffix` remains. Returns `false` on timeout.
pub async fn wait_for_download(
    folder: &Path,
    pattern: &Regex,
    in_progress_suffix: &str,
    timeout: Duration,
    poll: Duration,
) -> bool {
    let started = Instant::now();
    loop {
        let names = list_file_names(folder);
        if names.iter().any(|name| name.ends_with(in_progress_suffix)) {
            log::info!(
                "Download in progress... ({}s waited)",
                started.elapsed().as_secs()
            );
        } else if names.iter().any(|name| pattern.is_match(name)) {
            log::info!("Download complete");
            return true;
        }

        if started.elapsed() >= timeout {
            log::warn!("Timed out after {timeout:?} waiting for download");
            return false;
        }
        sleep(poll).await;
    }
}

/// First file in `folder` whose name matches `pattern`.
pub fn find_download(folder: &Path, pattern: &Regex) -> Option<PathBuf> {
    let mut names = list_file_names(folder);
    names.sort();
    names
        .into_iter()
        .find(|name| pattern.is_match(name))
        .map(|name| folder.join(name))
}

fn list_file_names(folder: &Path) -> Vec<String> {
    match std::fs::read_dir(folder) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect(),
        Err(e) => {
            log::warn!("Could not list {}: {e}", folder.display());
            Vec::new()
        }
    }
}
