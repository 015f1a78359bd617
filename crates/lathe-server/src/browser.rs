//! Opening the served site in local browsers.

use lathe_pipeline::BrowserSelection;

/// Open `url` in the selected browser(s).
///
/// Launch failures are logged; a missing browser never stops the server.
pub fn launch_browsers(url: &str, selection: &BrowserSelection) {
    let browsers = selection.browsers();

    if browsers.is_empty() {
        if let Err(e) = open::that(url) {
            tracing::warn!("Failed to open default browser: {}", e);
        }
        return;
    }

    for browser in browsers {
        tracing::debug!("Opening {} in {}", url, browser.app_name());
        if let Err(e) = open::with(url, browser.app_name()) {
            tracing::warn!("Failed to open {}: {}", browser, e);
        }
    }
}
