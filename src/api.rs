use regex::Regex;
use reqwest::header::COOKIE;
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::PanelConfig;
use crate::errors::XuiError;

/// Root of every inbound-related endpoint, relative to the panel base URL.
const INBOUNDS_API: &str = "panel/api/inbounds/";

static MAX_AGE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Max-Age=(\d+)").ok());

pub struct XUiClient {
    client: Client,
    panel_base_url: Url,
    session_cookie: Option<String>,
    cookie_expiry: Option<Instant>,
    username: Option<String>,
    password: Option<String>,
}

impl XUiClient {
    /// Creates a new instance of `XUiClient`.
    ///
    /// No request is made until [`XUiClient::login`] is called. A trailing
    /// slash on `panel_url` is significant: without it the last path segment
    /// is dropped when endpoints are joined onto the base.
    ///
    /// # Example
    ///
    /// ```
    /// use xui_clients::api::XUiClient;
    ///
    /// fn example() -> Result<(), xui_clients::errors::XuiError> {
    ///     let client = XUiClient::new("https://your-xui-panel.com/")?;
    ///     Ok(())
    /// }
    /// ```
    pub fn new(panel_url: impl AsRef<str>) -> Result<Self, XuiError> {
        let url = Url::parse(panel_url.as_ref())?;
        let new_client = Client::builder().build()?;

        Ok(Self {
            client: new_client,
            panel_base_url: url,
            session_cookie: None,
            cookie_expiry: None,
            username: None,
            password: None,
        })
    }

    /// Creates a client from `config` and logs in with its credentials.
    pub async fn connect(config: &PanelConfig) -> Result<Self, XuiError> {
        let mut client = Self::new(&config.panel_url)?;
        client.login(&config.username, &config.password).await?;
        Ok(client)
    }

    fn extract_max_age(&self) -> Option<u64> {
        let re = MAX_AGE_RE.as_ref()?;
        let cookie_str = self.session_cookie.as_ref()?;
        re.captures(cookie_str)?.get(1)?.as_str().parse::<u64>().ok()
    }

    fn extract_cookie_expiry(&mut self) {
        self.cookie_expiry = self
            .extract_max_age()
            .map(|max_age| Instant::now() + Duration::from_secs(max_age));
    }

    /// Logs in to the panel and stores the session cookie.
    ///
    /// The credentials are kept so that an expired session can be renewed
    /// transparently before the next request.
    ///
    /// # Example
    ///
    /// ```
    /// use xui_clients::api::XUiClient;
    ///
    /// async fn example() -> Result<(), xui_clients::errors::XuiError> {
    ///     let mut client = XUiClient::new("https://your-xui-panel.com/")?;
    ///     client.login("admin", "password").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), XuiError> {
        let login_endpoint = self.panel_base_url.join("login")?;

        let mut params = HashMap::new();
        params.insert("username", username);
        params.insert("password", password);

        let response = self
            .client
            .post(login_endpoint)
            .json(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "panel login rejected");
            return Err(XuiError::Auth(format!(
                "Login failed with status: {}",
                response.status()
            )));
        }

        if let Some(cookie) = response.headers().get("set-cookie") {
            self.session_cookie = Some(cookie.to_str()?.to_string());
            self.extract_cookie_expiry();
            self.username = Some(username.to_owned());
            self.password = Some(password.to_owned());
        }
        tracing::info!(panel = %self.panel_base_url, user = username, "logged in to panel");
        Ok(())
    }

    /// Checks if the stored session cookie is still valid
    fn is_cookie_valid(&self) -> bool {
        if self.session_cookie.is_none() {
            return false;
        }

        match self.cookie_expiry {
            // One minute of slack for network delays
            Some(expiry) => expiry > Instant::now() + Duration::from_secs(60),
            None => true,
        }
    }

    async fn ensure_authenticated(&mut self) -> Result<(), XuiError> {
        if self.is_cookie_valid() {
            return Ok(());
        }
        match (self.username.clone(), self.password.clone()) {
            (Some(username), Some(password)) => {
                tracing::debug!("session cookie expired, logging in again");
                self.login(&username, &password).await
            }
            _ => Err(XuiError::Auth(
                "Session expired and no credentials available for re-login".to_string(),
            )),
        }
    }

    /// Attaches the session cookie (its `name=value` pair) to the request.
    async fn with_cookie(
        &mut self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, XuiError> {
        self.ensure_authenticated().await?;

        match self.session_cookie.as_deref() {
            Some(cookie) => {
                let pair = cookie.split(';').next().unwrap_or(cookie).trim();
                Ok(req.header(COOKIE, pair))
            }
            None => Err(XuiError::Auth("No session cookie available".to_string())),
        }
    }

    /// Builds `panel/api/inbounds/{segments...}`, escaping each segment.
    fn inbounds_endpoint(&self, segments: &[&str]) -> Result<Url, XuiError> {
        let mut url = self.panel_base_url.join(INBOUNDS_API)?;
        url.path_segments_mut()
            .map_err(|_| {
                XuiError::Config(format!(
                    "panel URL cannot be used as a base: {}",
                    self.panel_base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends an authenticated request to `panel/api/inbounds/{segments...}`.
    ///
    /// `params`, when given, is sent as the JSON body. A non-2xx status is
    /// reported as [`XuiError::Panel`]; the `success` flag of the body is
    /// left to [`XUiClient::verify_response`].
    pub async fn request(
        &mut self,
        segments: &[&str],
        method: Method,
        params: Option<&Value>,
    ) -> Result<Value, XuiError> {
        let endpoint = self.inbounds_endpoint(segments)?;
        tracing::debug!(%method, %endpoint, "panel request");

        let mut req = self.client.request(method, endpoint.clone());
        if let Some(params) = params {
            req = req.json(params);
        }
        let response = self.with_cookie(req).await?.send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, %endpoint, "panel request failed");
            return Err(XuiError::Panel(format!(
                "{} returned status {}",
                endpoint.path(),
                status
            )));
        }

        Ok(response.json().await?)
    }

    /// Returns the response when the panel reports `"success": true`.
    pub fn verify_response(&self, response: Value) -> Result<Value, XuiError> {
        if response.get("success").and_then(Value::as_bool) == Some(true) {
            return Ok(response);
        }
        let msg = response
            .get("msg")
            .and_then(Value::as_str)
            .filter(|msg| !msg.is_empty())
            .unwrap_or("panel reported failure")
            .to_string();
        tracing::warn!(%msg, "panel rejected request");
        Err(XuiError::Panel(msg))
    }

    /// Retrieves a list of all inbound configurations from the panel.
    ///
    /// The raw panel response is returned: `{"success", "msg", "obj": [...]}`.
    ///
    /// # Example
    ///
    /// ```
    /// use xui_clients::api::XUiClient;
    ///
    /// async fn example() -> Result<(), xui_clients::errors::XuiError> {
    ///     let mut client = XUiClient::new("https://your-xui-panel.com/")?;
    ///     client.login("admin", "password").await?;
    ///     let inbounds = client.get_inbounds().await?;
    ///     println!("Inbounds: {}", inbounds);
    ///     Ok(())
    /// }
    /// ```
    pub async fn get_inbounds(&mut self) -> Result<Value, XuiError> {
        self.request(&["list"], Method::GET, None).await
    }

    /// Retrieves the configuration of a single inbound.
    pub async fn get_inbound(&mut self, inbound_id: u64) -> Result<Value, XuiError> {
        let inbound_id = inbound_id.to_string();
        self.request(&["get", inbound_id.as_str()], Method::GET, None).await
    }

    /// Retrieves traffic counters of the client with the given email.
    pub async fn get_client_traffics(&mut self, client_email: &str) -> Result<Value, XuiError> {
        self.request(&["getClientTraffics", client_email], Method::GET, None)
            .await
    }
}
