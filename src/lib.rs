//! Client management for 3x-ui / X-UI panels and share-link rendering for
//! the VMESS, VLESS, Trojan and Shadowsocks protocols.

pub mod api;
pub mod clients;
pub mod config;
pub mod errors;
pub mod protocols;
pub mod share;

pub use api::XUiClient;
pub use clients::ClientMatch;
pub use config::PanelConfig;
pub use errors::XuiError;
pub use protocols::{ClientParameters, ClientRecord, ClientSettings, IdentityField, Protocol};
pub use share::{ExtraParams, ShareEndpoint};
