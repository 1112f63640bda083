mod handler;
mod model;

pub use handler::{forgot_password, login, logout, reset_password, signup};
