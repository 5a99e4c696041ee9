use anyhow::Result;
use async_trait::async_trait;

/// Something that can hand back the rendered HTML of a hotel page
/// (a headless browser tab, or a plain HTTP client)
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page at `url`
    async fn fetch_html(&self, url: &str) -> Result<String>;

    /// Get the name of the page source
    fn source_name(&self) -> &'static str;
}
