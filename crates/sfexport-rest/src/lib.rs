//! sfexport-rest - HTTP transport for the attachment exporter.
//!
//! [`SoapLogin`] implements [`IdentityProvider`](sfexport_core::IdentityProvider)
//! against the partner SOAP `login` call. [`RestApi`] implements
//! [`RecordSource`](sfexport_core::RecordSource) and
//! [`BodySource`](sfexport_core::BodySource) against the versioned REST API.

mod client;
mod login;
mod soql;
mod source;

pub use client::RestClient;
pub use login::SoapLogin;
pub use soql::{SObjectName, build_page_query};
pub use source::RestApi;
