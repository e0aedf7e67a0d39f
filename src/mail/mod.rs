//! Outbound mail — message composition and SMTP dispatch.

pub mod compose;
pub mod transport;

pub use compose::ComposedMessage;
pub use transport::{DeliveryOutcome, MailTransport, SmtpMailer};
