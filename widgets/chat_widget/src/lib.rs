pub mod config;
pub mod memory;
pub mod pagination;
pub mod presence;
pub mod reads;
pub mod viewport;
pub mod widget;

pub use memory::MemoryChatService;
pub use pagination::{PaginationController, ScrollOutcome};
pub use viewport::{RowViewport, Viewport};
pub use widget::ChatWidget;
