use crate::availability::{ParseFailurePolicy, WalkerOptions};
use crate::models::Amenity;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Pause between hotels
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Wait after clicking a calendar arrow before reading cells again
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_max_pages")]
    pub max_seek_pages: usize,
    #[serde(default = "default_max_pages")]
    pub max_collect_pages: usize,
    #[serde(default)]
    pub on_parse_failure: ParseFailurePolicy,
    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default)]
    pub keywords: Keywords,
}

/// CSS selectors for the pieces of the site the scraper touches
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Selectors {
    pub pagination: String,
    pub pagination_nav: String,
    pub dismiss_sign_in: String,
    pub next_results_page: String,
    pub loading_overlay: String,
    pub property_card: String,
    pub card_title: String,
    pub card_link: String,
    pub dates_box: String,
    pub calendar_cell: String,
    pub cell_price: String,
    pub calendar_previous: String,
    pub calendar_next: String,
    pub amenity_item: String,
    pub house_rules: String,
    pub rating: String,
    pub review_subscore: String,
    pub location_block: String,
    pub hotel_name: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            pagination: r#"[data-testid="pagination"]"#.to_string(),
            pagination_nav: r#"[data-testid="pagination"] nav"#.to_string(),
            dismiss_sign_in: r#"[aria-label="Ignorar informações de login."]"#.to_string(),
            next_results_page: r#"[aria-label="Página seguinte"]"#.to_string(),
            loading_overlay: r#"[data-testid="overlay-spinner"]"#.to_string(),
            property_card: r#"[data-testid="property-card"]"#.to_string(),
            card_title: r#"[data-testid="title"]"#.to_string(),
            card_link: r#"[data-testid="title-link"]"#.to_string(),
            dates_box: r#"[data-testid="searchbox-dates-container"]"#.to_string(),
            calendar_cell: r#"td[role="gridcell"] span[data-date]"#.to_string(),
            cell_price: ".b1f25950bd".to_string(),
            calendar_previous: r#"button[aria-label="Mês anterior"]"#.to_string(),
            calendar_next: r#"button[aria-label="Próximo mês"]"#.to_string(),
            amenity_item: r#"[data-testid="property-most-popular-facilities-wrapper"] li"#
                .to_string(),
            house_rules: r#"#hotelPoliciesInc, [data-testid="HouseRules-wrapper"]"#.to_string(),
            rating: r#"[aria-label^="Com nota"]"#.to_string(),
            review_subscore: r#"[data-testid="review-subscore"]"#.to_string(),
            location_block: r#"ul[data-location-block-list="true"]"#.to_string(),
            hotel_name: "h2.pp-header__title, #hp_hotel_name h2".to_string(),
        }
    }
}

/// Localized text the page extraction looks for
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Keywords {
    pub beach: String,
    pub pets_allowed: String,
    /// Overrides for individual amenity labels
    pub amenities: BTreeMap<Amenity, String>,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            beach: "Praia".to_string(),
            pets_allowed: "Aceita pets".to_string(),
            amenities: BTreeMap::new(),
        }
    }
}

impl Keywords {
    pub fn amenity(&self, amenity: Amenity) -> &str {
        self.amenities
            .get(&amenity)
            .map(String::as_str)
            .unwrap_or_else(|| amenity.default_keyword())
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_max_pages() -> usize {
    36 // three years of monthly pages
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracing_level: default_tracing_level(),
            headless: default_headless(),
            user_agent: default_user_agent(),
            output_dir: default_output_dir(),
            request_delay_ms: default_request_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            max_seek_pages: default_max_pages(),
            max_collect_pages: default_max_pages(),
            on_parse_failure: ParseFailurePolicy::default(),
            selectors: Selectors::default(),
            keywords: Keywords::default(),
        }
    }
}

impl Config {
    /// Load from a YAML file if it exists, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// The YAML file at `path`, or the defaults when it does not exist
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&config_str).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(level) = env::var("TRACING_LEVEL") {
            self.tracing_level = level;
        }

        if let Ok(headless) = env::var("HEADLESS") {
            self.headless = headless
                .parse()
                .context("Failed to parse HEADLESS environment variable")?;
        }

        if let Ok(user_agent) = env::var("USER_AGENT") {
            self.user_agent = user_agent;
        }

        if let Ok(dir) = env::var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }

        if let Ok(timeout) = env::var("CALL_TIMEOUT_SECS") {
            self.call_timeout_secs = timeout
                .parse()
                .context("Failed to parse CALL_TIMEOUT_SECS environment variable")?;
        }

        Ok(())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn walker_options(&self) -> WalkerOptions {
        WalkerOptions {
            max_seek_pages: self.max_seek_pages,
            max_collect_pages: self.max_collect_pages,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            on_parse_failure: self.on_parse_failure,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}
