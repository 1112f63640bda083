mod post;
mod user;

pub use post::PgPostStore;
pub use user::PgUserStore;
