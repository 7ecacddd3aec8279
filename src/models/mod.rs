mod client;
mod invoice;
mod message;
mod recurring;
mod service;

pub use client::{Client, ClientStatus, ClientType};
pub use invoice::{BankDetails, Invoice, InvoiceType};
pub use message::{Message, RepeatInterval, RepeatRule, ScheduledMessage};
pub use recurring::{Frequency, RecurringInvoice};
pub use service::{Service, round_money, services_total};

use thiserror::Error;

/// Errors raised when a stored or typed value does not map onto a model enum.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown client status: {0}")]
    UnknownClientStatus(String),
    #[error("unknown client type: {0}")]
    UnknownClientType(String),
    #[error("unknown invoice type: {0}")]
    UnknownInvoiceType(String),
    #[error("unknown recurrence frequency: {0}")]
    UnknownFrequency(String),
    #[error("unknown repeat interval: {0}")]
    UnknownRepeatInterval(String),
}
