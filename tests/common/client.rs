//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per API route. When routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::{multipart, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client carrying an optional bearer token
#[allow(dead_code)]
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Token sent with every request, if any
    pub token: Option<String>,
}

#[allow(dead_code)]
impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client logged in as the controller account
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        Self::logged_in(base_url, TEST_USER, TEST_PASS).await
    }

    /// Creates a client logged in as the admin account
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::logged_in(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    async fn logged_in(base_url: String, username: &str, password: &str) -> Self {
        let mut client = Self::new(base_url);
        let response = client.login(username, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Authentication of {} failed",
            username
        );
        let body: Value = response.json().await.expect("Login body is not JSON");
        client.token = Some(
            body["token"]
                .as_str()
                .expect("Login body has no token")
                .to_string(),
        );
        client
    }

    /// Same client, different token
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.to_string()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/api/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Login request failed")
    }

    pub async fn refresh(&self) -> Response {
        self.request(reqwest::Method::POST, "/api/refresh")
            .send()
            .await
            .expect("Refresh request failed")
    }

    pub async fn home(&self) -> Response {
        self.request(reqwest::Method::GET, "/")
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Media Endpoints
    // ========================================================================

    pub async fn list_files(&self) -> Response {
        self.request(reqwest::Method::GET, "/api/files")
            .send()
            .await
            .expect("List files request failed")
    }

    pub async fn upload(&self, filename: &str, data: &[u8]) -> Response {
        self.upload_field("media", filename, data).await
    }

    /// Uploads under an arbitrary multipart field name
    pub async fn upload_field(&self, field: &str, filename: &str, data: &[u8]) -> Response {
        let part = multipart::Part::bytes(data.to_vec()).file_name(filename.to_string());
        let form = multipart::Form::new().part(field.to_string(), part);
        self.request(reqwest::Method::POST, "/api/upload")
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    pub async fn delete_file(&self, name: &str) -> Response {
        self.request(
            reqwest::Method::DELETE,
            &format!("/api/delete/{}", urlencoding::encode(name)),
        )
        .send()
        .await
        .expect("Delete request failed")
    }

    pub async fn get_upload(&self, name: &str) -> Response {
        self.client
            .get(self.url(&format!("/api/uploads/{}", urlencoding::encode(name))))
            .send()
            .await
            .expect("Uploads request failed")
    }

    // ========================================================================
    // Selection Endpoints
    // ========================================================================

    pub async fn select(&self, filename: &str) -> Response {
        self.request(reqwest::Method::POST, "/api/select")
            .json(&json!({ "filename": filename }))
            .send()
            .await
            .expect("Select request failed")
    }

    pub async fn select_raw(&self, body: Value) -> Response {
        self.request(reqwest::Method::POST, "/api/select")
            .json(&body)
            .send()
            .await
            .expect("Select request failed")
    }

    pub async fn deselect(&self) -> Response {
        self.request(reqwest::Method::POST, "/api/deselect")
            .send()
            .await
            .expect("Deselect request failed")
    }

    pub async fn selected(&self) -> Response {
        self.request(reqwest::Method::GET, "/api/selected")
            .send()
            .await
            .expect("Selected request failed")
    }

    /// The selected name, or None
    pub async fn selected_name(&self) -> Option<String> {
        let body: Value = self
            .selected()
            .await
            .json()
            .await
            .expect("Selected body is not JSON");
        body["selected"].as_str().map(str::to_string)
    }

    // ========================================================================
    // Settings Endpoints
    // ========================================================================

    pub async fn get_settings(&self, account: &str) -> Response {
        self.request(
            reqwest::Method::GET,
            &format!("/api/settings/{}", urlencoding::encode(account)),
        )
        .send()
        .await
        .expect("Get settings request failed")
    }

    pub async fn save_settings(&self, body: Value) -> Response {
        self.request(reqwest::Method::POST, "/api/settings")
            .json(&body)
            .send()
            .await
            .expect("Save settings request failed")
    }
}
