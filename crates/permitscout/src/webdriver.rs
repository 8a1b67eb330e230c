use std::path::PathBuf;

use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};

use crate::browser::{Browser, BrowserError, Locator, Strategy};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    /// Where Chrome drops exported files.
    pub download_dir: PathBuf,
}

/// Chrome over a WebDriver endpoint (chromedriver).
#[derive(Debug, Clone)]
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    pub async fn connect(options: &BrowserOptions) -> Result<Self, BrowserError> {
        let capabilities = chrome_capabilities(options);

        RetryPolicy::session()
            .run("connect", async || {
                log::info!("Connecting to WebDriver at {}", options.webdriver_url);
                let client = ClientBuilder::native()
                    .capabilities(capabilities.clone())
                    .connect(&options.webdriver_url)
                    .await
                    .inspect_err(|e| log::error!("WebDriver session error: {e:?}"))
                    .map_err(|e| BrowserError::Session(e.to_string()))?;
                Ok(Self { client })
            })
            .await
    }
}

pub(crate) fn chrome_capabilities(options: &BrowserOptions) -> Map<String, Value> {
    let mut args = vec!["--disable-logging", "--start-maximized"];
    if options.headless {
        args.push("--headless=new");
    }

    let chrome = json!({
        "args": args,
        "prefs": {
            "download.default_directory": options.download_dir.to_string_lossy(),
            "download.prompt_for_download": false,
            "download.directory_upgrade": true,
            "safebrowsing.enabled": true,
        },
    });

    let mut capabilities = Map::new();
    capabilities.insert("browserName".to_string(), json!("chrome"));
    capabilities.insert("goog:chromeOptions".to_string(), chrome);
    capabilities
}

fn classify(err: CmdError, context: &str) -> BrowserError {
    let message = format!("{context}: {err}");
    match &err {
        CmdError::Standard(wd) => match wd.error {
            ErrorStatus::ElementClickIntercepted => BrowserError::Intercepted(message),
            ErrorStatus::StaleElementReference => BrowserError::Stale(message),
            ErrorStatus::ElementNotInteractable | ErrorStatus::InvalidElementState => {
                BrowserError::NotInteractable(message)
            }
            ErrorStatus::NoSuchElement | ErrorStatus::NoSuchFrame => {
                BrowserError::NotFound(message)
            }
            ErrorStatus::Timeout | ErrorStatus::ScriptTimeout => BrowserError::Timeout(message),
            ErrorStatus::JavascriptError => BrowserError::Script(message),
            _ => BrowserError::Session(message),
        },
        CmdError::WaitTimeout => BrowserError::Timeout(message),
        _ if err.is_no_such_element() => BrowserError::NotFound(message),
        _ => BrowserError::Session(message),
    }
}

fn wd_locator<'a>(strategy: Strategy, query: &'a str) -> fantoccini::Locator<'a> {
    match strategy {
        Strategy::XPath => fantoccini::Locator::XPath(query),
        Strategy::Css => fantoccini::Locator::Css(query),
    }
}

impl WebDriverBrowser {
    async fn script(&mut self, script: &str, args: Vec<Value>) -> Result<(), BrowserError> {
        self.client
            .execute(script, args)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "execute"))
    }
}

fn element_arg(element: &Element) -> Result<Value, BrowserError> {
    serde_json::to_value(element).map_err(|e| BrowserError::Script(e.to_string()))
}

impl Browser for WebDriverBrowser {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        log::debug!("Navigating to {url}");
        self.client
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, url))
    }

    async fn refresh(&mut self) -> Result<(), BrowserError> {
        self.client
            .refresh()
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "refresh"))
    }

    async fn locate(&mut self, locator: &Locator) -> Result<Option<Element>, BrowserError> {
        let (strategy, query) = locator.to_query();
        match self.client.find(wd_locator(strategy, &query)).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(classify(e, &locator.to_string())),
        }
    }

    async fn locate_all(&mut self, locator: &Locator) -> Result<Vec<Element>, BrowserError> {
        let (strategy, query) = locator.to_query();
        match self.client.find_all(wd_locator(strategy, &query)).await {
            Ok(elements) => Ok(elements),
            Err(e) if e.is_no_such_element() => Ok(Vec::new()),
            Err(e) => Err(classify(e, &locator.to_string())),
        }
    }

    async fn click(&mut self, element: &Element) -> Result<(), BrowserError> {
        element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "click"))
    }

    async fn type_text(&mut self, element: &Element, text: &str) -> Result<(), BrowserError> {
        element
            .send_keys(text)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "send_keys"))
    }

    async fn text(&mut self, element: &Element) -> Result<String, BrowserError> {
        element.text().await.map_err(|e| classify(e, "text"))
    }

    async fn is_displayed(&mut self, element: &Element) -> Result<bool, BrowserError> {
        element
            .is_displayed()
            .await
            .map_err(|e| classify(e, "is_displayed"))
    }

    async fn is_enabled(&mut self, element: &Element) -> Result<bool, BrowserError> {
        element
            .is_enabled()
            .await
            .map_err(|e| classify(e, "is_enabled"))
    }

    async fn set_value_direct(&mut self, element: &Element, value: &str) -> Result<(), BrowserError> {
        let args = vec![element_arg(element)?, json!(value)];
        self.script("arguments[0].value = arguments[1];", args).await
    }

    async fn dispatch_event(&mut self, element: &Element, event: &str) -> Result<(), BrowserError> {
        let args = vec![element_arg(element)?, json!(event)];
        self.script(
            "arguments[0].dispatchEvent(new Event(arguments[1], { bubbles: true }));",
            args,
        )
        .await
    }

    async fn switch_to_frame(&mut self, frame: &Element) -> Result<(), BrowserError> {
        frame
            .clone()
            .enter_frame()
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "enter_frame"))
    }

    async fn switch_to_default_context(&mut self) -> Result<(), BrowserError> {
        self.client
            .enter_frame(None)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "default content"))
    }

    async fn current_session_id(&mut self) -> Result<Option<String>, BrowserError> {
        self.client
            .session_id()
            .await
            .map_err(|e| classify(e, "session_id"))
    }

    async fn terminate_session(&mut self) -> Result<(), BrowserError> {
        log::info!("Closing WebDriver session");
        self.client
            .clone()
            .close()
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "close"))
    }
}
