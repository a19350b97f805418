pub mod client;
pub mod config;
pub mod error;
pub mod form;

pub use client::{RelayClient, SUCCESS_MESSAGE};
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use form::{ContactForm, Field, FieldError};
