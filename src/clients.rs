//! Client management on top of the panel's inbound API.
//!
//! Every operation fetches the inbound list afresh; nothing is cached
//! between calls.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::XUiClient;
use crate::errors::XuiError;
use crate::protocols::{ClientParameters, ClientRecord, Protocol, create_client_settings, non_empty};

/// An inbound as returned by `panel/api/inbounds/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundRecord {
    pub id: u64,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub port: u16,
    /// JSON document encoded as a string, holding the `clients` list.
    #[serde(default)]
    pub settings: String,
    #[serde(default, rename = "clientStats")]
    pub client_stats: Option<Vec<Value>>,
}

fn default_protocol() -> String {
    Protocol::Vless.as_str().to_string()
}

#[derive(Deserialize)]
struct StoredSettings {
    #[serde(default)]
    clients: Vec<ClientRecord>,
}

impl InboundRecord {
    /// Decodes the clients stored in the inbound's settings.
    pub fn clients(&self) -> Result<Vec<ClientRecord>, XuiError> {
        if self.settings.trim().is_empty() {
            return Ok(Vec::new());
        }
        let settings: StoredSettings = serde_json::from_str(&self.settings)?;
        Ok(settings.clients)
    }

    /// The inbound's protocol, if it is one this crate can manage clients for.
    pub fn managed_protocol(&self) -> Option<Protocol> {
        self.protocol.parse().ok()
    }
}

/// Criteria for locating a client inside an inbound.
///
/// Email matches for every protocol. The uuid only matches on VMESS/VLESS
/// inbounds and the password only on Trojan inbounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMatch {
    pub email: Option<String>,
    pub uuid: Option<String>,
    pub password: Option<String>,
}

impl ClientMatch {
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn by_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            ..Self::default()
        }
    }

    pub fn by_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Everything in `params` that can identify an existing client.
    pub fn from_parameters(params: &ClientParameters) -> Self {
        Self {
            email: non_empty(Some(params.email.as_str())).map(str::to_string),
            uuid: non_empty(params.uuid.as_deref()).map(str::to_string),
            password: non_empty(params.password.as_deref()).map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email().is_none() && self.uuid().is_none() && self.password().is_none()
    }

    fn email(&self) -> Option<&str> {
        non_empty(self.email.as_deref())
    }

    fn uuid(&self) -> Option<&str> {
        non_empty(self.uuid.as_deref())
    }

    fn password(&self) -> Option<&str> {
        non_empty(self.password.as_deref())
    }

    /// Whether `record`, stored on an inbound of `protocol`, satisfies any criterion.
    pub fn matches(&self, protocol: Protocol, record: &ClientRecord) -> bool {
        let by_email = self.email().is_some_and(|email| record.email == email);
        let by_secret = match protocol {
            Protocol::Vmess | Protocol::Vless => self
                .uuid()
                .is_some_and(|uuid| record.id.as_deref() == Some(uuid)),
            Protocol::Trojan => self
                .password()
                .is_some_and(|password| record.password.as_deref() == Some(password)),
            Protocol::Shadowsocks => false,
        };
        by_email || by_secret
    }
}

impl XUiClient {
    /// Fetches and decodes the inbound list, failing if the panel reports an error.
    pub async fn list_inbounds(&mut self) -> Result<Vec<InboundRecord>, XuiError> {
        let response = self.get_inbounds().await?;
        let response = self.verify_response(response)?;
        match response.get("obj") {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(obj) => Ok(Vec::<InboundRecord>::deserialize(obj)?),
        }
    }

    async fn find_inbound(&mut self, inbound_id: u64) -> Result<InboundRecord, XuiError> {
        self.list_inbounds()
            .await?
            .into_iter()
            .find(|inbound| inbound.id == inbound_id)
            .ok_or_else(|| XuiError::NotFound(format!("inbound {}", inbound_id)))
    }

    /// Locates a client and the protocol of the inbound holding it.
    async fn locate_client(
        &mut self,
        inbound_id: u64,
        criteria: &ClientMatch,
    ) -> Result<(Protocol, ClientRecord), XuiError> {
        if criteria.is_empty() {
            return Err(XuiError::NotFound(
                "no email, uuid or password given to match a client".to_string(),
            ));
        }

        let inbound = self.find_inbound(inbound_id).await?;
        let protocol = inbound.managed_protocol().ok_or_else(|| {
            XuiError::NotFound(format!(
                "client in inbound {} ({} inbounds hold no managed clients)",
                inbound_id, inbound.protocol
            ))
        })?;
        tracing::debug!(inbound_id, %protocol, "looking up client");

        inbound
            .clients()?
            .into_iter()
            .find(|client| criteria.matches(protocol, client))
            .map(|client| (protocol, client))
            .ok_or_else(|| XuiError::NotFound(format!("client in inbound {}", inbound_id)))
    }

    /// Finds a client of an inbound by email, uuid or password.
    ///
    /// # Example
    ///
    /// ```
    /// use xui_clients::{ClientMatch, XUiClient};
    ///
    /// async fn example() -> Result<(), xui_clients::errors::XuiError> {
    ///     let mut client = XUiClient::new("https://your-xui-panel.com/")?;
    ///     client.login("admin", "password").await?;
    ///     let found = client.find_client(1, &ClientMatch::by_email("user@example.com")).await?;
    ///     println!("{:?}", found);
    ///     Ok(())
    /// }
    /// ```
    pub async fn find_client(
        &mut self,
        inbound_id: u64,
        criteria: &ClientMatch,
    ) -> Result<ClientRecord, XuiError> {
        let (_, client) = self.locate_client(inbound_id, criteria).await?;
        Ok(client)
    }

    /// Returns the traffic statistics entry of the client with `email`.
    pub async fn get_client_stats(
        &mut self,
        inbound_id: u64,
        email: &str,
    ) -> Result<Value, XuiError> {
        if email.is_empty() {
            return Err(XuiError::MissingField("email"));
        }

        let inbound = self.find_inbound(inbound_id).await?;
        inbound
            .client_stats
            .unwrap_or_default()
            .into_iter()
            .find(|stat| stat.get("email").and_then(Value::as_str) == Some(email))
            .ok_or_else(|| {
                XuiError::NotFound(format!("stats of {} in inbound {}", email, inbound_id))
            })
    }

    /// Adds a client to an inbound.
    ///
    /// The parameters are validated before anything is sent to the panel.
    pub async fn add_client(
        &mut self,
        inbound_id: u64,
        protocol: Protocol,
        params: &ClientParameters,
    ) -> Result<Value, XuiError> {
        let settings = create_client_settings(protocol, params)?;
        let body = json!({
            "id": inbound_id,
            "settings": settings.to_json_string()?,
        });

        tracing::debug!(inbound_id, %protocol, email = %params.email, "adding client");
        let response = self
            .request(&["addClient"], Method::POST, Some(&body))
            .await?;
        self.verify_response(response)
    }

    /// Replaces an existing client of an inbound.
    ///
    /// The client is located by the email, uuid or password carried in
    /// `params`, then updated under its identity field.
    pub async fn update_client(
        &mut self,
        inbound_id: u64,
        protocol: Protocol,
        params: &ClientParameters,
    ) -> Result<Value, XuiError> {
        let settings = create_client_settings(protocol, params)?;
        let body = json!({
            "id": inbound_id,
            "settings": settings.to_json_string()?,
        });

        let criteria = ClientMatch::from_parameters(params);
        let (_, existing) = self.locate_client(inbound_id, &criteria).await?;
        let client_id = protocol.identity_of(&existing)?.to_string();

        tracing::debug!(inbound_id, %protocol, email = %existing.email, "updating client");
        let response = self
            .request(&["updateClient", client_id.as_str()], Method::POST, Some(&body))
            .await?;
        self.verify_response(response)
    }

    /// Removes a client from an inbound.
    pub async fn delete_client(
        &mut self,
        inbound_id: u64,
        criteria: &ClientMatch,
    ) -> Result<Value, XuiError> {
        let (protocol, existing) = self.locate_client(inbound_id, criteria).await?;
        let client_id = protocol.identity_of(&existing)?.to_string();
        let inbound = inbound_id.to_string();

        tracing::debug!(inbound_id, %protocol, email = %existing.email, "deleting client");
        let response = self
            .request(&[inbound.as_str(), "delClient", client_id.as_str()], Method::POST, None)
            .await?;
        self.verify_response(response)
    }

    /// Resets the upload/download counters of a client.
    pub async fn reset_client_traffic(
        &mut self,
        inbound_id: u64,
        criteria: &ClientMatch,
    ) -> Result<Value, XuiError> {
        let (_, existing) = self.locate_client(inbound_id, criteria).await?;
        let inbound = inbound_id.to_string();

        tracing::debug!(inbound_id, email = %existing.email, "resetting client traffic");
        let response = self
            .request(
                &[inbound.as_str(), "resetClientTraffic", existing.email.as_str()],
                Method::POST,
                None,
            )
            .await?;
        self.verify_response(response)
    }
}
