//! Mailcast Core - Campaign send engine
//!
//! This crate provides:
//! - SMTP transport adapter (verify and single-message send)
//! - Template rendering
//! - The settings store the engine reads and writes campaigns through
//! - The campaign send engine and its lifecycle controller

pub mod campaign;
pub mod render;
pub mod store;
pub mod transport;

pub use campaign::{
    CampaignController, CampaignEngine, CampaignError, NewCampaign, Notice, NoticeLevel,
    RunSummary,
};
pub use render::TemplateRenderer;
pub use store::{CampaignStore, SettingsStore};
pub use transport::{MailTransport, SmtpTransport, TransportError};
