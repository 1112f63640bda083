pub mod accounts;
pub mod listing;
pub mod posts;

pub use accounts::{AccountService, Session};
pub use listing::{PageRequest, PostListing};
pub use posts::{PostForm, PostService};
