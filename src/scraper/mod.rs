pub mod fetcher;
pub mod simulated;
pub mod traits;

pub use fetcher::HtmlFeedDriver;
pub use simulated::SimulatedFeed;
pub use traits::PageDriver;
