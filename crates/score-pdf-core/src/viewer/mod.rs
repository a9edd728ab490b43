mod traits;
mod chrome;
mod discover;
mod page_index;

pub use traits::ViewerSession;
pub use chrome::ChromeSession;
pub use discover::PageDiscoverer;
pub use page_index::PageIndex;
