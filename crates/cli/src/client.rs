// HTTP client wrapper for the Bizdesk API

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found")]
    NotFound,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token: None,
        }
    }

    /// Same client, sending `token` as a bearer credential.
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, &url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        handle_response(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        handle_response(response).await
    }

    /// POST where the response carries no body (204).
    pub async fn post_no_content<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized(message));
    }
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/auth/me"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(&format!("{}/", server.uri())).with_token("abc");
        let body: Value = client.get("/v1/auth/me").await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_error_statuses_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(path("/unauthorized"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid or expired token" })),
            )
            .mount(&server)
            .await;
        Mock::given(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403).set_body_string("plain text"))
            .mount(&server)
            .await;

        let client = Client::new(&server.uri());

        match client.get::<Value>("/unauthorized").await {
            Err(ClientError::Unauthorized(message)) => {
                assert_eq!(message, "Invalid or expired token")
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        match client.get::<Value>("/forbidden").await {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "plain text");
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            client.get::<Value>("/missing").await,
            Err(ClientError::NotFound)
        ));
    }
}
