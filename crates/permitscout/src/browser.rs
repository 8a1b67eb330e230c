use std::borrow::Cow;
use std::fmt::Display;

/// How an element is found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    XPath(Cow<'static, str>),
    Css(Cow<'static, str>),
    ClassName(Cow<'static, str>),
}

impl Locator {
    pub const fn xpath_static(query: &'static str) -> Self {
        Locator::XPath(Cow::Borrowed(query))
    }

    pub const fn class_static(name: &'static str) -> Self {
        Locator::ClassName(Cow::Borrowed(name))
    }

    pub fn xpath(query: impl Into<Cow<'static, str>>) -> Self {
        Locator::XPath(query.into())
    }

    /// XPath and CSS are the only strategies WebDriver needs; class names become CSS.
    pub(crate) fn to_query(&self) -> (Strategy, Cow<'_, str>) {
        match self {
            Locator::XPath(q) => (Strategy::XPath, Cow::Borrowed(q.as_ref())),
            Locator::Css(q) => (Strategy::Css, Cow::Borrowed(q.as_ref())),
            Locator::ClassName(name) => (Strategy::Css, Cow::Owned(format!(".{name}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    XPath,
    Css,
}

impl Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::XPath(q) => write!(f, "xpath:{q}"),
            Locator::Css(q) => write!(f, "css:{q}"),
            Locator::ClassName(name) => write!(f, "class:{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotInteractable,
    Stale,
    Intercepted,
    Timeout,
    Session,
    Script,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BrowserError {
    #[error("Element not found: {0}")]
    NotFound(String),
    #[error("Element not interactable: {0}")]
    NotInteractable(String),
    #[error("Stale element reference: {0}")]
    Stale(String),
    #[error("Click intercepted: {0}")]
    Intercepted(String),
    #[error("Browser timed out: {0}")]
    Timeout(String),
    #[error("Browser session error: {0}")]
    Session(String),
    #[error("Script execution failed: {0}")]
    Script(String),
}

impl BrowserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrowserError::NotFound(_) => ErrorKind::NotFound,
            BrowserError::NotInteractable(_) => ErrorKind::NotInteractable,
            BrowserError::Stale(_) => ErrorKind::Stale,
            BrowserError::Intercepted(_) => ErrorKind::Intercepted,
            BrowserError::Timeout(_) => ErrorKind::Timeout,
            BrowserError::Session(_) => ErrorKind::Session,
            BrowserError::Script(_) => ErrorKind::Script,
        }
    }

    /// True when the element or condition simply was not there in time.
    pub fn is_absent(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Timeout)
    }
}

/// The browser-control capabilities the pipeline drives.
///
/// Every call may fail with a not-found, not-interactable or stale condition
/// at any time; callers wrap the calls they care about in a
/// [`RetryPolicy`](crate::retry::RetryPolicy) or a [`Wait`](crate::wait::Wait).
#[allow(async_fn_in_trait)]
pub trait Browser {
    type Element: Clone;

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    async fn refresh(&mut self) -> Result<(), BrowserError>;

    /// `Ok(None)` when nothing matches right now.
    async fn locate(&mut self, locator: &Locator) -> Result<Option<Self::Element>, BrowserError>;

    async fn locate_all(&mut self, locator: &Locator) -> Result<Vec<Self::Element>, BrowserError>;

    async fn click(&mut self, element: &Self::Element) -> Result<(), BrowserError>;

    async fn type_text(&mut self, element: &Self::Element, text: &str) -> Result<(), BrowserError>;

    async fn text(&mut self, element: &Self::Element) -> Result<String, BrowserError>;

    async fn is_displayed(&mut self, element: &Self::Element) -> Result<bool, BrowserError>;

    async fn is_enabled(&mut self, element: &Self::Element) -> Result<bool, BrowserError>;

    /// Writes the value property directly, without keystrokes.
    async fn set_value_direct(
        &mut self,
        element: &Self::Element,
        value: &str,
    ) -> Result<(), BrowserError>;

    /// Fires a synthetic DOM event (`change`, `blur`, ...) on the element.
    async fn dispatch_event(
        &mut self,
        element: &Self::Element,
        event: &str,
    ) -> Result<(), BrowserError>;

    async fn switch_to_frame(&mut self, frame: &Self::Element) -> Result<(), BrowserError>;

    async fn switch_to_default_context(&mut self) -> Result<(), BrowserError>;

    async fn current_session_id(&mut self) -> Result<Option<String>, BrowserError>;

    async fn terminate_session(&mut self) -> Result<(), BrowserError>;
}
