pub mod browser;
pub mod calendar;
pub mod hotel_page;
pub mod http;
pub mod traits;
pub mod types;

pub use browser::BookingBrowser;
pub use http::HttpPageSource;
pub use traits::PageSource;
pub use types::SearchParams;
