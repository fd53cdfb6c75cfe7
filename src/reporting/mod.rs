//! Registration handshake and periodic shipping of measurements

mod payload;
mod reporter;
mod transport;

pub use payload::{report_body, Registration, RegistrationResponse};
pub use reporter::{Reporter, ReporterHandle};
pub use transport::{HttpResponse, HttpTransport, OutboundRequest, Transport};

#[cfg(test)]
pub(crate) use transport::mock;
