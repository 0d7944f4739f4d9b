pub mod config;
pub mod db;
pub mod entities;
pub mod services;

pub use config::Config;
pub use db::Store;
pub use services::{
    AuthError, AuthService, LoginResult, SeaOrmAuthService, SessionManager, UserInfo,
};
