pub mod actions;
pub mod address;
pub mod browser;
pub mod collector;
pub mod config;
pub mod dataset;
pub mod detail;
pub mod intervals;
pub mod names;
pub mod owners;
pub mod pipeline;
pub mod retry;
pub mod session;
pub mod types;
pub mod utils;
pub mod wait;
pub mod webdriver;

#[cfg(test)]
mod testing;

pub use browser::{Browser, BrowserError, Locator};
pub use config::PipelineConfig;
pub use pipeline::{OutputFormat, PipelineError};
pub use session::with_session;
pub use webdriver::WebDriverBrowser;

pub const PERMITS_URL: &str = "https://portal.columbus.gov/permits/Default.aspx";
pub const AUDITOR_URL: &str =
    "https://property.franklincountyauditor.com/_web/search/commonsearch.aspx?mode=address";
