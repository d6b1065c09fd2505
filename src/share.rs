//! Share-link rendering.
//!
//! Every renderer is a pure function of its inputs: nothing is fetched from
//! the panel and nothing is cached. The produced strings are the formats
//! understood by v2rayN, Nekoray, Shadowrocket and similar client apps:
//!
//! * `vmess://<base64-json>`
//! * `vless://<uuid>@<host>:<port>?<query>#<name>`
//! * `trojan://<password>@<host>:<port>?<query>#<name>`
//! * `ss://<base64(method:password)>@<host>:<port>?<query>#<name>`

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::errors::XuiError;
use crate::protocols::{ClientParameters, DEFAULT_SS_METHOD, Protocol, non_empty};

/// Keys of the VMESS JSON object that are filled from the endpoint and secret.
const VMESS_RESERVED_KEYS: [&str; 5] = ["v", "ps", "add", "port", "id"];

/// Where a share link points and what it is called in the client app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareEndpoint {
    pub address: String,
    pub port: u16,
    pub name: String,
}

impl ShareEndpoint {
    pub fn new(address: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port,
            name: name.into(),
        }
    }

    fn validate(&self) -> Result<(), XuiError> {
        if self.address.is_empty() {
            return Err(XuiError::MissingField("address"));
        }
        if self.port == 0 {
            return Err(XuiError::MissingField("port"));
        }
        if self.name.is_empty() {
            return Err(XuiError::MissingField("name"));
        }
        Ok(())
    }

    /// `host:port`, with IPv6 literals bracketed.
    fn authority(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// Optional transport and TLS parameters (`type`, `security`, `sni`, `path`, ...).
///
/// Entries keep the order in which they were first inserted, so rendered
/// query strings are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraParams {
    entries: Vec<(String, String)>,
}

impl ExtraParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing the value in place when the key is already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Form-encoded query of the non-empty entries, `None` when nothing is left.
    fn query(&self) -> Option<String> {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        for (key, value) in self.iter().filter(|(_, v)| !v.is_empty()) {
            serializer.append_pair(key, value);
            any = true;
        }
        any.then(|| serializer.finish())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtraParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = ExtraParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Shadowsocks SIP003 plugin, e.g. `obfs-local` with `obfs=http;obfs-host=example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsPlugin {
    pub name: String,
    pub opts: Option<String>,
}

impl SsPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            opts: None,
        }
    }

    pub fn with_opts(mut self, opts: impl Into<String>) -> Self {
        self.opts = Some(opts.into());
        self
    }

    fn value(&self) -> String {
        match non_empty(self.opts.as_deref()) {
            Some(opts) => format!("{};{}", self.name, opts),
            None => self.name.clone(),
        }
    }
}

fn require<'a>(
    protocol: Protocol,
    field: &'static str,
    secret: &'a str,
) -> Result<&'a str, XuiError> {
    if secret.is_empty() {
        Err(XuiError::MissingSecret { protocol, field })
    } else {
        Ok(secret)
    }
}

/// `{scheme}://{userinfo}@{authority}[?query]#{name}`
fn assemble(
    scheme: &str,
    userinfo: &str,
    endpoint: &ShareEndpoint,
    query: Option<String>,
) -> String {
    let mut uri = format!("{}://{}@{}", scheme, userinfo, endpoint.authority());
    if let Some(query) = query {
        uri.push('?');
        uri.push_str(&query);
    }
    uri.push('#');
    uri.push_str(&urlencoding::encode(&endpoint.name));
    uri
}

/// Renders a `vmess://` link.
///
/// Every entry of `extra` is copied verbatim into the JSON payload, empty
/// values included. An entry that would overwrite one of the endpoint or
/// secret keys is rejected.
pub fn render_vmess(
    endpoint: &ShareEndpoint,
    uuid: &str,
    extra: &ExtraParams,
) -> Result<String, XuiError> {
    endpoint.validate()?;
    let uuid = require(Protocol::Vmess, "uuid", uuid)?;

    let mut object = Map::new();
    object.insert("v".into(), Value::from("2"));
    object.insert("ps".into(), Value::from(endpoint.name.as_str()));
    object.insert("add".into(), Value::from(endpoint.address.as_str()));
    object.insert("port".into(), Value::from(endpoint.port.to_string()));
    object.insert("id".into(), Value::from(uuid));
    for (key, value) in extra.iter() {
        if VMESS_RESERVED_KEYS.iter().any(|reserved| *reserved == key) {
            return Err(XuiError::Validation(format!(
                "extra parameter '{}' collides with a vmess core field",
                key
            )));
        }
        object.insert(key.to_string(), Value::from(value));
    }

    let payload = serde_json::to_string(&Value::Object(object))?;
    Ok(format!("vmess://{}", STANDARD.encode(payload)))
}

/// Renders a `vless://` link. Empty extra entries are left out of the query.
pub fn render_vless(
    endpoint: &ShareEndpoint,
    uuid: &str,
    extra: &ExtraParams,
) -> Result<String, XuiError> {
    endpoint.validate()?;
    let uuid = require(Protocol::Vless, "uuid", uuid)?;
    Ok(assemble(
        "vless",
        &urlencoding::encode(uuid),
        endpoint,
        extra.query(),
    ))
}

/// Renders a `trojan://` link. Empty extra entries are left out of the query.
pub fn render_trojan(
    endpoint: &ShareEndpoint,
    password: &str,
    extra: &ExtraParams,
) -> Result<String, XuiError> {
    endpoint.validate()?;
    let password = require(Protocol::Trojan, "password", password)?;
    Ok(assemble(
        "trojan",
        &urlencoding::encode(password),
        endpoint,
        extra.query(),
    ))
}

/// Renders an `ss://` link with base64 `method:password` user info.
///
/// An empty `method` falls back to the default cipher. The only query
/// parameter ever emitted is `plugin`.
pub fn render_shadowsocks(
    endpoint: &ShareEndpoint,
    method: &str,
    password: &str,
    plugin: Option<&SsPlugin>,
) -> Result<String, XuiError> {
    endpoint.validate()?;
    let password = require(Protocol::Shadowsocks, "password", password)?;
    let method = non_empty(Some(method)).unwrap_or(DEFAULT_SS_METHOD);

    let userinfo = STANDARD.encode(format!("{}:{}", method, password));
    let query = plugin
        .filter(|p| !p.name.is_empty())
        .map(|p| {
            form_urlencoded::Serializer::new(String::new())
                .append_pair("plugin", &p.value())
                .finish()
        });
    Ok(assemble("ss", &userinfo, endpoint, query))
}

/// Renders the share link of a client for whichever protocol it uses.
///
/// For Shadowsocks the plugin is read from the `plugin` and `plugin-opts`
/// entries of `extra`; all other extra entries are ignored for that protocol.
pub fn render_share_uri(
    protocol: Protocol,
    endpoint: &ShareEndpoint,
    params: &ClientParameters,
    extra: &ExtraParams,
) -> Result<String, XuiError> {
    let secret = params.require_secret(protocol)?;
    tracing::debug!(protocol = %protocol, address = %endpoint.address, "rendering share link");
    match protocol {
        Protocol::Vmess => render_vmess(endpoint, secret, extra),
        Protocol::Vless => render_vless(endpoint, secret, extra),
        Protocol::Trojan => render_trojan(endpoint, secret, extra),
        Protocol::Shadowsocks => {
            let password = non_empty(params.password.as_deref()).ok_or(
                XuiError::MissingSecret {
                    protocol,
                    field: "password",
                },
            )?;
            let plugin = non_empty(extra.get("plugin")).map(|name| SsPlugin {
                name: name.to_string(),
                opts: extra.get("plugin-opts").map(str::to_string),
            });
            render_shadowsocks(endpoint, secret, password, plugin.as_ref())
        }
    }
}
