pub mod post;
pub mod user;

pub use post::{NewPost, Pagination, Post, PostChanges, PostPage, PostScope};
pub use user::{NewUser, User, UserProfile};
