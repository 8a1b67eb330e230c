use std::time::Duration;

use tokio::time::sleep;

use crate::browser::{Browser, BrowserError, Locator};
use crate::retry::RetryPolicy;
use crate::wait::Wait;

const FRAME_ATTEMPTS: usize = 3;
const FRAME_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Waits for `locator` to become clickable and clicks it, re-locating the
/// element when a click is intercepted or goes stale.
pub async fn click_when_clickable<B: Browser>(
    browser: &mut B,
    locator: &Locator,
    wait: Wait,
) -> Result<(), BrowserError> {
    RetryPolicy::click()
        .run(&locator.to_string(), async || {
            let element = wait.for_clickable(browser, locator).await?;
            browser.click(&element).await
        })
        .await
}

/// Clicks an element that may not have been found; a missing one is skipped.
pub async fn click_element<B: Browser>(
    browser: &mut B,
    element: Option<&B::Element>,
) -> Result<(), BrowserError> {
    let Some(element) = element else {
        log::warn!("Element not found, skipping click");
        return Ok(());
    };
    RetryPolicy::click()
        .run("click", async || browser.click(element).await)
        .await?;
    log::debug!("Element clicked");
    Ok(())
}

/// Injects `value` into an input and fires `events` on it.
///
/// Typing into the permits portal's date picker is unreliable, so the value
/// property is set directly and the widget is told through synthetic events.
pub async fn set_field_value<B: Browser>(
    browser: &mut B,
    locator: &Locator,
    value: &str,
    events: &[&str],
    wait: Wait,
) -> Result<(), BrowserError> {
    RetryPolicy::transient()
        .run("set_field_value", async || {
            let input = wait.for_presence(browser, locator).await?;
            browser.set_value_direct(&input, value).await?;
            for event in events {
                browser.dispatch_event(&input, event).await?;
            }
            Ok(())
        })
        .await
}

/// Types into an input if it shows up; a missing input is logged, not fatal.
pub async fn fill_input<B: Browser>(
    browser: &mut B,
    locator: &Locator,
    value: &str,
    label: &str,
    wait: Wait,
) -> Result<(), BrowserError> {
    match wait.for_presence(browser, locator).await {
        Ok(input) => {
            browser.type_text(&input, value).await?;
            log::info!("{label} input sent: {value}");
            Ok(())
        }
        Err(e) if e.is_absent() => {
            log::warn!("{label} input field not found");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Switches into the iframe at `frame`, refreshing the page between attempts.
///
/// Returns `false` (back in the top-level document) when every attempt failed.
pub async fn enter_frame<B: Browser>(browser: &mut B, frame: &Locator, wait: Wait) -> bool {
    for attempt in 1..=FRAME_ATTEMPTS {
        if let Err(e) = browser.switch_to_default_context().await {
            log::warn!("Could not return to the top-level document: {e}");
        }

        match wait.for_clickable(browser, frame).await {
            Ok(element) => match browser.switch_to_frame(&element).await {
                Ok(()) => {
                    log::info!("Switched to iframe {frame}");
                    return true;
                }
                Err(e) => log::warn!("Error on attempt {attempt}/{FRAME_ATTEMPTS}: {e}"),
            },
            Err(e) if e.is_absent() => {
                log::warn!(
                    "Timeout while waiting for iframe on attempt {attempt}/{FRAME_ATTEMPTS}, refreshing"
                );
                if let Err(e) = browser.refresh().await {
                    log::warn!("Refresh failed: {e}");
                }
                sleep(FRAME_RETRY_DELAY).await;
            }
            Err(e) => log::warn!("Error on attempt {attempt}/{FRAME_ATTEMPTS}: {e}"),
        }
        sleep(FRAME_RETRY_DELAY).await;
    }

    log::error!("Failed to switch to iframe after {FRAME_ATTEMPTS} attempts");
    if let Err(e) = browser.switch_to_default_context().await {
        log::warn!("Could not return to the top-level document: {e}");
    }
    false
}

/// Reports whether the iframe at `frame` could be entered, entering it if so.
pub async fn is_in_frame<B: Browser>(browser: &mut B, frame: &Locator, wait: Wait) -> bool {
    let entered = async {
        browser.switch_to_default_context().await?;
        let element = wait.for_presence(browser, frame).await?;
        browser.switch_to_frame(&element).await
    }
    .await;

    match entered {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Could not switch to iframe: {e}");
            false
        }
    }
}
