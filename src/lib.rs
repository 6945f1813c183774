pub mod barcode;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod resolver;
pub mod response;
pub mod server;
pub mod session;

pub use barcode::Barcode;
pub use config::Config;
pub use driver::{DriverManager, DriverType};
pub use error::{Result, ScrapeError};
pub use pipeline::{PartsRecord, Stage};
pub use server::{AppState, router, serve};
pub use session::BrowserSession;
