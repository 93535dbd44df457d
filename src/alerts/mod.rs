/// Alert dispatch and transports
pub mod dispatcher;
pub mod smtp;
pub mod threshold;

pub use dispatcher::{AlertDispatcher, AlertTransport, Delivery};
pub use smtp::{SmtpMailer, SmtpSettings};
pub use threshold::{evaluate, Alert, Metric, Percent, ThresholdConfig};
