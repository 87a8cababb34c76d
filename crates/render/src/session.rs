//! Renderer session: one headless browser driving one page.

use crate::scripts;
use deck_core::{ConvertConfig, Error, Rect, Result};
use headless_chrome::browser::tab::element::BoxModel;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::Page::{self, CaptureScreenshotFormatOption};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Interval between load-settle polls.
const SETTLE_POLL: Duration = Duration::from_millis(100);

/// How long the network must stay quiet to count as settled.
const NETWORK_QUIET: Duration = Duration::from_millis(500);

/// Attribute holding each slide's index, set once the page has settled.
const SLIDE_ATTRIBUTE: &str = "data-deck-slide";

/// Page operations the slide extractor needs.
///
/// Every call is a synchronous request/response against the loaded page.
/// Slides are addressed by their 0-based index among the slide markers.
/// Captures cover the element's border box, the same box its records use.
pub trait PageSession {
    /// Number of slide-marker elements in the document.
    fn slide_count(&self) -> Result<usize>;

    /// Viewport box of a slide, `None` when it has no layout box.
    fn slide_bounds(&self, index: usize) -> Result<Option<Rect>>;

    /// PNG capture of the full bounds of one slide.
    fn capture_slide(&self, index: usize) -> Result<Vec<u8>>;

    /// Call `function` with the slide element bound to `this`.
    ///
    /// The function must return a string; it is handed back verbatim.
    fn evaluate_on_slide(&self, index: usize, function: &str, args: Vec<Value>) -> Result<String>;

    /// PNG capture of the single element matching `selector`.
    fn capture_element(&self, selector: &str) -> Result<Vec<u8>>;
}

/// Requests in flight, fed from Network domain events.
#[derive(Debug)]
pub struct NetworkActivity {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl NetworkActivity {
    pub fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
        }
    }

    pub fn started(&mut self, request_id: &str, now: Instant) {
        self.in_flight.insert(request_id.to_string());
        self.last_change = now;
    }

    pub fn finished(&mut self, request_id: &str, now: Instant) {
        if self.in_flight.remove(request_id) {
            self.last_change = now;
        }
    }

    /// No request in flight, and none started or finished for `quiet`.
    pub fn is_idle(&self, now: Instant, quiet: Duration) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_change) >= quiet
    }
}

/// Clip covering the element's border box.
pub fn border_clip(model: &BoxModel) -> Page::Viewport {
    model.border_viewport()
}

/// Selector for the slide tagged with `index`.
pub fn slide_marker(index: usize) -> String {
    format!("[{}=\"{}\"]", SLIDE_ATTRIBUTE, index)
}

/// A [`PageSession`] backed by headless Chrome.
pub struct ChromeSession {
    /// Kills the browser process when dropped, closing the session.
    _browser: Browser,
    tab: Arc<Tab>,
    network: Arc<Mutex<NetworkActivity>>,
    slide_selector: String,
    slide_count: usize,
    settle_timeout: Duration,
    browser_timeout: Duration,
}

impl ChromeSession {
    /// Launch a headless browser with a window sized to the slide viewport.
    pub fn launch(config: &ConvertConfig) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.slide_width_px(), config.slide_height_px())))
            .build()
            .map_err(|e| Error::BrowserError(format!("Invalid launch options: {}", e)))?;

        log::debug!(
            "Launching browser ({}x{})",
            config.slide_width_px(),
            config.slide_height_px()
        );
        let browser =
            Browser::new(options).map_err(|e| Error::BrowserError(format!("Failed to launch browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| Error::BrowserError(format!("Failed to open page: {}", e)))?;
        tab.set_default_timeout(config.browser_timeout);

        let network = Arc::new(Mutex::new(NetworkActivity::new(Instant::now())));
        Self::track_network(&tab, Arc::clone(&network))?;

        Ok(Self {
            _browser: browser,
            tab,
            network,
            slide_selector: config.slide_selector.clone(),
            slide_count: 0,
            settle_timeout: config.settle_timeout,
            browser_timeout: config.browser_timeout,
        })
    }

    fn track_network(tab: &Tab, network: Arc<Mutex<NetworkActivity>>) -> Result<()> {
        tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            report_direct_socket_traffic: None,
            enable_durable_messages: None,
        })
        .map_err(|e| Error::BrowserError(format!("Failed to enable network events: {}", e)))?;

        tab.add_event_listener(Arc::new(move |event: &Event| {
            let Ok(mut activity) = network.lock() else {
                return;
            };
            let now = Instant::now();
            match event {
                Event::NetworkRequestWillBeSent(ev) => activity.started(&ev.params.request_id, now),
                Event::NetworkLoadingFinished(ev) => activity.finished(&ev.params.request_id, now),
                Event::NetworkLoadingFailed(ev) => activity.finished(&ev.params.request_id, now),
                _ => {}
            }
        }))
        .map_err(|e| Error::BrowserError(format!("Failed to watch network events: {}", e)))?;
        Ok(())
    }

    /// Navigate to `uri`, wait for the document to settle, and tag the slides.
    ///
    /// A failed navigation is an error. Running out of settle time is
    /// logged and extraction proceeds against whatever has loaded.
    pub fn open(&mut self, uri: &str) -> Result<()> {
        log::debug!("Navigating to {}", uri);
        self.tab
            .navigate_to(uri)
            .map_err(|e| Error::BrowserError(format!("Failed to navigate to {}: {}", uri, e)))?;

        self.tab.set_default_timeout(self.settle_timeout);
        if let Err(e) = self.tab.wait_until_navigated() {
            log::debug!("Navigation did not settle: {}", e);
        }
        self.wait_for_settle();
        self.tab.set_default_timeout(self.browser_timeout);

        self.slide_count = self.tag_slides()?;
        Ok(())
    }

    fn wait_for_settle(&self) {
        let deadline = Instant::now() + self.settle_timeout;
        loop {
            let document_ready = match self.tab.evaluate(scripts::DOCUMENT_SETTLED, false) {
                Ok(result) => result.value == Some(Value::Bool(true)),
                Err(e) => {
                    log::debug!("Load-settle check failed: {}", e);
                    return;
                }
            };
            let network_idle = self
                .network
                .lock()
                .map(|activity| activity.is_idle(Instant::now(), NETWORK_QUIET))
                .unwrap_or(true);

            if document_ready && network_idle {
                log::debug!("Document settled");
                return;
            }
            if Instant::now() >= deadline {
                log::debug!(
                    "Load settle timed out after {:?} (document ready: {}, network idle: {})",
                    self.settle_timeout,
                    document_ready,
                    network_idle
                );
                return;
            }
            thread::sleep(SETTLE_POLL);
        }
    }

    /// Mark every slide with its index so later lookups are one query each.
    fn tag_slides(&self) -> Result<usize> {
        let args = serde_json::to_string(&(&self.slide_selector, SLIDE_ATTRIBUTE))
            .map_err(|e| Error::ScriptError(format!("Bad selector: {}", e)))?;
        let expression = format!("({}).apply(null, {})", scripts::TAG_SLIDES, args);
        let result = self
            .tab
            .evaluate(&expression, false)
            .map_err(|e| Error::ScriptError(format!("Failed to tag slides: {}", e)))?;

        result
            .value
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .ok_or_else(|| Error::ScriptError("Slide count was not a number".to_string()))
    }

    fn slide(&self, index: usize) -> Result<Element<'_>> {
        if index >= self.slide_count {
            return Err(Error::BrowserError(format!("Slide {} not found", index + 1)));
        }
        self.tab
            .find_element(&slide_marker(index))
            .map_err(|e| Error::BrowserError(format!("Slide {} not found: {}", index + 1, e)))
    }

    fn capture_border_box(&self, element: &Element) -> Result<Vec<u8>> {
        element
            .scroll_into_view()
            .and_then(|el| el.get_box_model())
            .and_then(|model| {
                self.tab
                    .capture_screenshot(CaptureScreenshotFormatOption::Png, None, Some(border_clip(&model)), true)
            })
            .map_err(|e| Error::BrowserError(e.to_string()))
    }
}

impl PageSession for ChromeSession {
    fn slide_count(&self) -> Result<usize> {
        Ok(self.slide_count)
    }

    fn slide_bounds(&self, index: usize) -> Result<Option<Rect>> {
        let json = self.evaluate_on_slide(index, scripts::ELEMENT_BOUNDS, Vec::new())?;
        serde_json::from_str(&json).map_err(|e| Error::ScriptError(format!("Bad slide bounds: {}", e)))
    }

    fn capture_slide(&self, index: usize) -> Result<Vec<u8>> {
        let slide = self.slide(index)?;
        self.capture_border_box(&slide)
            .map_err(|e| Error::BrowserError(format!("Failed to capture slide {}: {}", index + 1, e)))
    }

    fn evaluate_on_slide(&self, index: usize, function: &str, args: Vec<Value>) -> Result<String> {
        let result = self
            .slide(index)?
            .call_js_fn(function, args, false)
            .map_err(|e| Error::ScriptError(format!("Script failed on slide {}: {}", index + 1, e)))?;

        match result.value {
            Some(Value::String(json)) => Ok(json),
            other => Err(Error::ScriptError(format!(
                "Script on slide {} returned {:?} instead of a string",
                index + 1,
                other
            ))),
        }
    }

    fn capture_element(&self, selector: &str) -> Result<Vec<u8>> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|e| Error::BrowserError(format!("No element matches {}: {}", selector, e)))?;
        self.capture_border_box(&element)
            .map_err(|e| Error::BrowserError(format!("Failed to capture {}: {}", selector, e)))
    }
}
