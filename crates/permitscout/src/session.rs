use crate::browser::Browser;

/// Runs `op` against `browser` and terminates the WebDriver session afterwards,
/// whatever `op` returned.
pub async fn with_session<B: Browser, T>(browser: &mut B, op: impl AsyncFnOnce(&mut B) -> T) -> T {
    let result = op(&mut *browser).await;

    match browser.current_session_id().await {
        Ok(Some(id)) => log::info!("Closing browser session {id}"),
        Ok(None) => log::debug!("Browser session already closed"),
        Err(e) => log::warn!("Could not read the session id: {e}"),
    }
    if let Err(e) = browser.terminate_session().await {
        log::warn!("Failed to terminate the browser session: {e}");
    }
    result
}
