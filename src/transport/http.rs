use super::*;
use serde::de::DeserializeOwned;

/// HTTP transport backed by a reqwest client with a cookie store, so the
/// session cookie set by login/signup rides along on every later call.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

impl HttpTransport {
    /// Create a transport talking to the backend at `base_url`
    pub fn new(base_url: &str) -> TransportResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| TransportError::Config(format!("invalid base URL {}: {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a JSON body whatever the status code; the backend reports
    /// application errors as `{error}` alongside 4xx/5xx statuses.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> TransportResult<T> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read body: {}", e)))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            TransportError::Decode(format!("status {}: {}", status.as_u16(), e))
        })
    }

    async fn post_credentials(
        &self,
        path: &str,
        credentials: Credentials,
    ) -> TransportResult<AuthResponse> {
        let response = self
            .client
            .post(self.url(path))
            .json(&credentials)
            .send()
            .await
            .map_err(network)?;

        Self::decode(response).await
    }
}

fn network(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn check_session(&self) -> TransportResult<SessionCheck> {
        let response = self
            .client
            .get(self.url("/auth/check"))
            .send()
            .await
            .map_err(network)?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        Self::decode(response).await
    }

    async fn login(&self, credentials: Credentials) -> TransportResult<AuthResponse> {
        self.post_credentials("/auth/login", credentials).await
    }

    async fn signup(&self, credentials: Credentials) -> TransportResult<AuthResponse> {
        self.post_credentials("/auth/signup", credentials).await
    }

    async fn logout(&self) -> TransportResult<()> {
        self.client
            .post(self.url("/auth/logout"))
            .send()
            .await
            .map_err(network)?;
        Ok(())
    }

    async fn chat(&self, message: &str) -> TransportResult<ChatReply> {
        let response = self
            .client
            .post(self.url("/chat"))
            .json(&ChatRequest { message })
            .send()
            .await
            .map_err(network)?;

        let body: ChatBody = Self::decode(response).await?;
        body.into_reply()
    }

    fn name(&self) -> &str {
        "http"
    }
}
