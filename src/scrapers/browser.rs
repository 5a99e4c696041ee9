use crate::config::{Config, Selectors};
use crate::models::HotelLink;
use crate::scrapers::calendar::TabCalendar;
use crate::scrapers::traits::PageSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Run a script that returns `JSON.stringify(...)` and decode the result
pub(crate) fn evaluate_json<T: DeserializeOwned>(tab: &Tab, script: &str) -> Result<T> {
    let result = tab.evaluate(script, false)?;
    let json = result
        .value
        .as_ref()
        .and_then(|value| value.as_str())
        .context("Script returned no JSON string")?;

    serde_json::from_str(json).context("Failed to decode script result")
}

/// Highest page number listed in the pagination block text
pub fn max_page_number(pagination_text: &str) -> Option<u32> {
    pagination_text
        .split_whitespace()
        .filter_map(|token| token.parse::<u32>().ok())
        .max()
}

/// Booking site driven through headless Chrome
pub struct BookingBrowser {
    browser: Browser,
    selectors: Selectors,
    settle_delay: Duration,
    wait_timeout: Duration,
}

impl BookingBrowser {
    /// Launch Chrome
    pub fn launch(config: &Config) -> Result<Self> {
        info!("Launching {} Chrome...", if config.headless { "headless" } else { "visible" });

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser,
            selectors: config.selectors.clone(),
            settle_delay: config.settle_delay(),
            wait_timeout: Duration::from_secs(config.call_timeout_secs),
        })
    }

    fn open(&self, url: &str) -> Result<Arc<Tab>> {
        let tab = self.browser.new_tab()?;
        tab.set_default_timeout(self.wait_timeout);

        debug!("Navigating to {}", url);
        tab.navigate_to(url)
            .with_context(|| format!("Failed to open {}", url))?;
        tab.wait_until_navigated()?;
        Ok(tab)
    }

    /// Walk every page of a search result listing and collect hotel cards
    pub fn collect_search_results(&self, url: &str) -> Result<Vec<HotelLink>> {
        info!("Opening search results...");
        let tab = self.open(url)?;

        tab.wait_for_element(&self.selectors.pagination)
            .context("Search results never showed pagination")?;

        // The sign-in prompt covers the pagination buttons
        match tab.wait_for_element_with_custom_timeout(&self.selectors.dismiss_sign_in, Duration::from_secs(5)) {
            Ok(button) => {
                button.click()?;
                debug!("Dismissed sign-in prompt");
            }
            Err(_) => debug!("No sign-in prompt"),
        }

        let pagination_text = tab
            .find_element(&self.selectors.pagination_nav)
            .and_then(|nav| nav.get_inner_text())
            .unwrap_or_default();
        let pages = max_page_number(&pagination_text).unwrap_or(1);
        info!("Search has {} result pages", pages);

        let mut hotels = Vec::new();
        for page in 1..=pages {
            let cards = self.read_cards(&tab)?;
            info!("Page {}: {} property cards", page, cards.len());
            hotels.extend(cards);

            if page != pages {
                tab.find_element(&self.selectors.next_results_page)?
                    .click()
                    .with_context(|| format!("Failed to move past results page {}", page))?;
                tab.wait_for_element(&self.selectors.pagination)?;
                self.wait_until_hidden(&tab, &self.selectors.loading_overlay);
            }
        }

        let _ = tab.close(true);
        info!("Collected {} hotels", hotels.len());
        Ok(hotels)
    }

    fn read_cards(&self, tab: &Tab) -> Result<Vec<HotelLink>> {
        let script = format!(
            r#"JSON.stringify(Array.from(document.querySelectorAll({card})).map(card => {{
                const title = card.querySelector({title});
                const link = card.querySelector({link});
                return {{
                    name: title ? title.innerText.trim() : "",
                    link: link ? link.getAttribute("href") || "" : ""
                }};
            }}).filter(h => h.name && h.link))"#,
            card = serde_json::to_string(&self.selectors.property_card)?,
            title = serde_json::to_string(&self.selectors.card_title)?,
            link = serde_json::to_string(&self.selectors.card_link)?,
        );

        evaluate_json(tab, &script)
    }

    fn wait_until_hidden(&self, tab: &Tab, selector: &str) {
        let script = format!(
            r#"JSON.stringify((() => {{
                const el = document.querySelector({});
                return !!el && el.offsetParent !== null;
            }})())"#,
            serde_json::Value::from(selector)
        );

        let deadline = Instant::now() + self.wait_timeout;
        while Instant::now() < deadline {
            match evaluate_json::<bool>(tab, &script) {
                Ok(false) => return,
                Ok(true) => thread::sleep(Duration::from_millis(250)),
                Err(e) => {
                    warn!("Could not check {}: {}", selector, e);
                    return;
                }
            }
        }
        warn!("{} still visible after {:?}", selector, self.wait_timeout);
    }

    /// Fully rendered HTML of a hotel page
    pub fn page_html(&self, url: &str) -> Result<String> {
        let tab = self.open(url)?;
        thread::sleep(self.settle_delay);

        let html = tab.get_content().context("Failed to read page HTML")?;
        debug!("Captured {} bytes of HTML", html.len());

        let _ = tab.close(true);
        Ok(html)
    }

    /// Open a hotel page and its date picker
    pub fn open_calendar(&self, url: &str) -> Result<TabCalendar> {
        let tab = self.open(url)?;

        tab.wait_for_element(&self.selectors.dates_box)
            .context("Hotel page has no dates box")?
            .click()?;
        thread::sleep(self.settle_delay);

        Ok(TabCalendar::new(tab, &self.selectors, self.settle_delay))
    }
}

#[async_trait]
impl PageSource for BookingBrowser {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        tokio::task::block_in_place(|| self.page_html(url))
    }

    fn source_name(&self) -> &'static str {
        "browser"
    }
}
