//! Browser selection for the dev server.

use std::fmt;
use std::str::FromStr;

/// A local browser the dev server can launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Browser {
    Safari,
    Firefox,
    Chrome,
    Opera,
    Edge,
}

impl Browser {
    /// Every browser, in declared order.
    pub const ALL: [Browser; 5] = [
        Browser::Safari,
        Browser::Firefox,
        Browser::Chrome,
        Browser::Opera,
        Browser::Edge,
    ];

    /// Name used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Browser::Safari => "safari",
            Browser::Firefox => "firefox",
            Browser::Chrome => "chrome",
            Browser::Opera => "opera",
            Browser::Edge => "edge",
        }
    }

    /// Application name handed to the OS launcher.
    pub const fn app_name(self) -> &'static str {
        match self {
            Browser::Safari => "safari",
            Browser::Firefox => "firefox",
            Browser::Chrome => "google chrome",
            Browser::Opera => "opera",
            Browser::Edge => "microsoft-edge",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a browser name outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown browser '{0}' (expected safari, firefox, chrome, opera, edge or all)")]
pub struct UnknownBrowser(pub String);

impl FromStr for Browser {
    type Err = UnknownBrowser;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Browser::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| UnknownBrowser(s.to_string()))
    }
}

/// Which browser(s) the dev server opens once it is listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserSelection {
    /// The system default browser
    #[default]
    Default,

    /// A single named browser
    One(Browser),

    /// Every browser in [`Browser::ALL`]
    All,
}

impl BrowserSelection {
    /// Resolve a name from `safari`, `firefox`, `chrome`, `opera`, `edge`, `all`.
    pub fn choose(name: &str) -> Result<Self, UnknownBrowser> {
        if name == "all" {
            return Ok(BrowserSelection::All);
        }
        name.parse().map(BrowserSelection::One)
    }

    /// The browsers to launch. Empty means the system default.
    pub fn browsers(&self) -> &[Browser] {
        match self {
            BrowserSelection::Default => &[],
            BrowserSelection::One(browser) => std::slice::from_ref(browser),
            BrowserSelection::All => &Browser::ALL,
        }
    }
}

impl fmt::Display for BrowserSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserSelection::Default => f.write_str("default"),
            BrowserSelection::One(browser) => write!(f, "{}", browser),
            BrowserSelection::All => f.write_str("all"),
        }
    }
}
