use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::errors::XuiError;

/// Cipher used for Shadowsocks clients when the caller does not pick one.
pub const DEFAULT_SS_METHOD: &str = "aes-256-gcm";

/// Proxy protocols whose clients can be managed and shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
}

/// The client field that uniquely identifies a client inside an inbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Uuid,
    Password,
    Email,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::Vmess,
        Protocol::Vless,
        Protocol::Trojan,
        Protocol::Shadowsocks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
        }
    }

    /// Name of the secret a client of this protocol must carry.
    ///
    /// For Shadowsocks this is the cipher, which falls back to
    /// [`DEFAULT_SS_METHOD`] instead of failing validation.
    pub fn required_secret(self) -> &'static str {
        match self {
            Protocol::Vmess | Protocol::Vless => "uuid",
            Protocol::Trojan => "password",
            Protocol::Shadowsocks => "method",
        }
    }

    pub fn identity_field(self) -> IdentityField {
        match self {
            Protocol::Vmess | Protocol::Vless => IdentityField::Uuid,
            Protocol::Trojan => IdentityField::Password,
            Protocol::Shadowsocks => IdentityField::Email,
        }
    }

    /// Returns the value of this protocol's identity field in `record`.
    pub fn identity_of<'a>(self, record: &'a ClientRecord) -> Result<&'a str, XuiError> {
        let field = self.identity_field();
        field.value_in(record).ok_or_else(|| {
            XuiError::Validation(format!(
                "{} not found for {} client",
                field.json_key(),
                self
            ))
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = XuiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vmess" => Ok(Protocol::Vmess),
            "vless" => Ok(Protocol::Vless),
            "trojan" => Ok(Protocol::Trojan),
            "shadowsocks" => Ok(Protocol::Shadowsocks),
            other => Err(XuiError::Validation(format!(
                "Unsupported protocol: {}",
                other
            ))),
        }
    }
}

impl IdentityField {
    /// Key under which the field is stored in the panel's client JSON.
    pub fn json_key(self) -> &'static str {
        match self {
            IdentityField::Uuid => "id",
            IdentityField::Password => "password",
            IdentityField::Email => "email",
        }
    }

    /// Non-empty value of the field in `record`, if any.
    pub fn value_in(self, record: &ClientRecord) -> Option<&str> {
        let value = match self {
            IdentityField::Uuid => record.id.as_deref(),
            IdentityField::Password => record.password.as_deref(),
            IdentityField::Email => Some(record.email.as_str()),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Everything needed to create or update a client on an inbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientParameters {
    pub email: String,
    pub enable: bool,
    pub flow: String,
    pub limit_ip: u32,
    /// Traffic quota in bytes, 0 for unlimited.
    pub total_gb: u64,
    /// Expiry as an epoch timestamp, 0 for never.
    pub expire_time: i64,
    pub telegram_id: String,
    pub subscription_id: String,
    pub uuid: Option<String>,
    pub password: Option<String>,
    pub method: Option<String>,
}

impl Default for ClientParameters {
    fn default() -> Self {
        Self {
            email: String::new(),
            enable: true,
            flow: String::new(),
            limit_ip: 0,
            total_gb: 0,
            expire_time: 0,
            telegram_id: String::new(),
            subscription_id: String::new(),
            uuid: None,
            password: None,
            method: None,
        }
    }
}

impl ClientParameters {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_flow(mut self, flow: impl Into<String>) -> Self {
        self.flow = flow.into();
        self
    }

    pub fn with_enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    pub fn with_limits(mut self, limit_ip: u32, total_gb: u64, expire_time: i64) -> Self {
        self.limit_ip = limit_ip;
        self.total_gb = total_gb;
        self.expire_time = expire_time;
        self
    }

    pub fn with_telegram_id(mut self, telegram_id: impl Into<String>) -> Self {
        self.telegram_id = telegram_id.into();
        self
    }

    pub fn with_subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = subscription_id.into();
        self
    }

    /// Cipher to use for Shadowsocks, falling back to [`DEFAULT_SS_METHOD`].
    pub fn method_or_default(&self) -> &str {
        non_empty(self.method.as_deref()).unwrap_or(DEFAULT_SS_METHOD)
    }

    /// The protocol's required secret, failing when it is absent or empty.
    pub fn require_secret(&self, protocol: Protocol) -> Result<&str, XuiError> {
        let secret = match protocol {
            Protocol::Vmess | Protocol::Vless => non_empty(self.uuid.as_deref()),
            Protocol::Trojan => non_empty(self.password.as_deref()),
            Protocol::Shadowsocks => Some(self.method_or_default()),
        };
        secret.ok_or(XuiError::MissingSecret {
            protocol,
            field: protocol.required_secret(),
        })
    }

    /// Checks the parameters against `protocol` without building anything.
    pub fn validate(&self, protocol: Protocol) -> Result<(), XuiError> {
        if self.email.is_empty() {
            return Err(XuiError::MissingField("email"));
        }
        self.require_secret(protocol)?;
        Ok(())
    }
}

/// A client as stored in an inbound's `settings.clients` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_enable")]
    pub enable: bool,
    #[serde(default)]
    pub flow: String,
    #[serde(default, rename = "limitIp")]
    pub limit_ip: u32,
    #[serde(default, rename = "totalGB")]
    pub total_gb: u64,
    #[serde(default, rename = "expiryTime")]
    pub expiry_time: i64,
    #[serde(default, rename = "tgId", deserialize_with = "string_or_number")]
    pub tg_id: String,
    #[serde(default, rename = "subId")]
    pub sub_id: String,
    /// Panel fields this crate does not model (`alterId`, `reset`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_enable() -> bool {
    true
}

// Newer panels store the Telegram id as a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// The `settings` payload accepted by the panel's addClient/updateClient calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub clients: Vec<ClientRecord>,
    pub decryption: String,
    pub fallbacks: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ClientSettings {
    /// Serializes the settings the way the panel expects them: as a JSON string.
    pub fn to_json_string(&self) -> Result<String, XuiError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builds the panel record for a client of `protocol`.
///
/// Exactly one protocol secret ends up in the record: `id` for VMESS/VLESS,
/// `password` for Trojan and `method` for Shadowsocks.
pub fn build_client_record(
    protocol: Protocol,
    params: &ClientParameters,
) -> Result<ClientRecord, XuiError> {
    params.validate(protocol)?;
    let secret = params.require_secret(protocol)?.to_string();

    let mut record = ClientRecord {
        id: None,
        password: None,
        method: None,
        email: params.email.clone(),
        enable: params.enable,
        flow: params.flow.clone(),
        limit_ip: params.limit_ip,
        total_gb: params.total_gb,
        expiry_time: params.expire_time,
        tg_id: params.telegram_id.clone(),
        sub_id: params.subscription_id.clone(),
        extra: Map::new(),
    };
    match protocol {
        Protocol::Vmess | Protocol::Vless => record.id = Some(secret),
        Protocol::Trojan => record.password = Some(secret),
        Protocol::Shadowsocks => record.method = Some(secret),
    }
    Ok(record)
}

/// Wraps the client record into the settings object sent to the panel.
pub fn create_client_settings(
    protocol: Protocol,
    params: &ClientParameters,
) -> Result<ClientSettings, XuiError> {
    let record = build_client_record(protocol, params)?;
    let method = match protocol {
        Protocol::Shadowsocks => record.method.clone(),
        _ => None,
    };
    Ok(ClientSettings {
        clients: vec![record],
        decryption: "none".to_string(),
        fallbacks: Vec::new(),
        method,
    })
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
