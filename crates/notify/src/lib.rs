#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Notification errors (`NotifyError`)
//! - [`blocks`]: Block Kit model (`Block`, `TextObject`, `Message`) and text truncation
//! - [`message`]: Summary / detailed / threaded message builders (`ReportContext`, `Notification`)
//! - [`client`]: Webhook and threaded API delivery (`SlackClient`, `Delivery`)
//!
//! # Architecture
//!
//! ```text
//! ImageResult[] + ComparisonResult? --> ReportContext --> message::build --> Notification
//!                                                                              |
//!                                                               SlackClient::send
//!                                                               /              \
//!                                                         webhook          chat.postMessage
//!                                                      (one message)     (main + thread replies)
//! ```

pub mod blocks;
pub mod client;
pub mod error;
pub mod message;

// --- Public API Re-exports ---

// Error
pub use error::NotifyError;

// Block Kit
pub use blocks::{Block, Message, TextObject, truncate_text};

// Message builders
pub use message::{ComponentInfo, MessageFormat, Notification, ReportContext, RiskLevel, build};

// Client
pub use client::{Delivery, SlackClient};
