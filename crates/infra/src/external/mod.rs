//! External service clients: the HTTP seam between the orchestrator and providers.

pub mod http;
pub mod scripted;
pub mod transport;

pub use http::ReqwestTransport;
pub use scripted::ScriptedTransport;
pub use transport::{
    HttpMethod, PayloadFile, ProviderRequest, ProviderResponse, ProviderTransport, RequestBody,
    TransportError,
};
