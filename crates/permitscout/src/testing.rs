use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use crate::browser::{Browser, BrowserError, Locator};
use crate::config::{PipelineConfig, Timeouts};

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub id: usize,
    pub locator: Locator,
    pub text: String,
    pub displayed: bool,
    pub enabled: bool,
}

/// The DOM as the fake browser currently shows it, plus everything done to it.
#[derive(Debug, Default)]
pub struct FakePage {
    nodes: Vec<FakeNode>,
    next_id: usize,
    pub events: Vec<String>,
}

impl FakePage {
    pub fn add(&mut self, locator: Locator, text: &str) -> usize {
        self.next_id += 1;
        self.nodes.push(FakeNode {
            id: self.next_id,
            locator,
            text: text.to_string(),
            displayed: true,
            enabled: true,
        });
        self.next_id
    }

    pub fn remove(&mut self, locator: &Locator) {
        self.nodes.retain(|n| &n.locator != locator);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn set_displayed(&mut self, id: usize, displayed: bool) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.displayed = displayed;
        }
    }

    pub fn set_enabled(&mut self, id: usize, enabled: bool) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.enabled = enabled;
        }
    }

    fn node(&self, handle: &FakeHandle) -> Result<&FakeNode, BrowserError> {
        self.nodes
            .iter()
            .find(|n| n.id == handle.id)
            .ok_or_else(|| BrowserError::Stale(handle.locator.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeHandle {
    pub id: usize,
    pub locator: Locator,
}

type Handler = Box<dyn FnMut(&mut FakePage)>;

/// Scripted stand-in for a WebDriver session.
#[derive(Default)]
pub struct FakeBrowser {
    pub page: FakePage,
    on_click: HashMap<Locator, Handler>,
    on_navigate: Vec<Handler>,
    click_failures: HashMap<Locator, VecDeque<BrowserError>>,
    pub terminated: bool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_click(&mut self, locator: Locator, handler: impl FnMut(&mut FakePage) + 'static) {
        self.on_click.insert(locator, Box::new(handler));
    }

    pub fn on_navigate(&mut self, handler: impl FnMut(&mut FakePage) + 'static) {
        self.on_navigate.push(Box::new(handler));
    }

    pub fn fail_clicks(&mut self, locator: Locator, errors: Vec<BrowserError>) {
        self.click_failures.insert(locator, errors.into());
    }

    pub fn events(&self) -> &[String] {
        &self.page.events
    }

    pub fn clicked(&self, locator: &Locator) -> usize {
        let wanted = format!("click {locator}");
        self.page.events.iter().filter(|e| **e == wanted).count()
    }
}

impl Browser for FakeBrowser {
    type Element = FakeHandle;

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.page.events.push(format!("navigate {url}"));
        for handler in self.on_navigate.iter_mut() {
            handler(&mut self.page);
        }
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), BrowserError> {
        self.page.events.push("refresh".to_string());
        Ok(())
    }

    async fn locate(&mut self, locator: &Locator) -> Result<Option<FakeHandle>, BrowserError> {
        Ok(self
            .page
            .nodes
            .iter()
            .find(|n| &n.locator == locator)
            .map(|n| FakeHandle {
                id: n.id,
                locator: n.locator.clone(),
            }))
    }

    async fn locate_all(&mut self, locator: &Locator) -> Result<Vec<FakeHandle>, BrowserError> {
        Ok(self
            .page
            .nodes
            .iter()
            .filter(|n| &n.locator == locator)
            .map(|n| FakeHandle {
                id: n.id,
                locator: n.locator.clone(),
            })
            .collect())
    }

    async fn click(&mut self, element: &FakeHandle) -> Result<(), BrowserError> {
        self.page.node(element)?;
        self.page.events.push(format!("click {}", element.locator));
        if let Some(err) = self
            .click_failures
            .get_mut(&element.locator)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        if let Some(mut handler) = self.on_click.remove(&element.locator) {
            handler(&mut self.page);
            self.on_click.insert(element.locator.clone(), handler);
        }
        Ok(())
    }

    async fn type_text(&mut self, element: &FakeHandle, text: &str) -> Result<(), BrowserError> {
        self.page.node(element)?;
        self.page
            .events
            .push(format!("type {}={text}", element.locator));
        Ok(())
    }

    async fn text(&mut self, element: &FakeHandle) -> Result<String, BrowserError> {
        Ok(self.page.node(element)?.text.clone())
    }

    async fn is_displayed(&mut self, element: &FakeHandle) -> Result<bool, BrowserError> {
        Ok(self.page.node(element)?.displayed)
    }

    async fn is_enabled(&mut self, element: &FakeHandle) -> Result<bool, BrowserError> {
        Ok(self.page.node(element)?.enabled)
    }

    async fn set_value_direct(
        &mut self,
        element: &FakeHandle,
        value: &str,
    ) -> Result<(), BrowserError> {
        self.page.node(element)?;
        self.page
            .events
            .push(format!("set {}={value}", element.locator));
        Ok(())
    }

    async fn dispatch_event(&mut self, element: &FakeHandle, event: &str) -> Result<(), BrowserError> {
        self.page.node(element)?;
        self.page
            .events
            .push(format!("event {}:{event}", element.locator));
        Ok(())
    }

    async fn switch_to_frame(&mut self, frame: &FakeHandle) -> Result<(), BrowserError> {
        self.page.node(frame)?;
        self.page.events.push(format!("frame {}", frame.locator));
        Ok(())
    }

    async fn switch_to_default_context(&mut self) -> Result<(), BrowserError> {
        self.page.events.push("default".to_string());
        Ok(())
    }

    async fn current_session_id(&mut self) -> Result<Option<String>, BrowserError> {
        Ok((!self.terminated).then(|| "fake-session".to_string()))
    }

    async fn terminate_session(&mut self) -> Result<(), BrowserError> {
        self.page.events.push("terminate".to_string());
        self.terminated = true;
        Ok(())
    }
}

/// Short waits, files under `dir`.
pub fn test_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::in_dir(dir);
    config.timeouts = Timeouts {
        presence: Duration::from_secs(2),
        loading: Duration::from_secs(2),
        download: Duration::from_secs(3),
        download_poll: Duration::from_secs(1),
        no_results: Duration::from_secs(2),
        field: Duration::from_secs(1),
        owners: Duration::from_secs(1),
        no_records: Duration::from_secs(1),
        results_row: Duration::from_secs(1),
        rental_button: Duration::from_secs(1),
        frame: Duration::from_secs(2),
        frame_check: Duration::from_secs(1),
        settle: Duration::from_millis(100),
    };
    config.interval_retry_delay = Duration::from_millis(100);
    config
}
