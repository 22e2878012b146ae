//! Campaign module - send engine and lifecycle controller

mod controller;
mod engine;
mod error;
mod notice;

pub use controller::{CampaignController, NewCampaign};
pub use engine::CampaignEngine;
pub use error::CampaignError;
pub use notice::{Notice, NoticeLevel, RunSummary};
