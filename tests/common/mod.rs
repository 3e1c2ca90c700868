#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use community::{
    ServerConfig,
    cli::ClientIpHeader,
    create_app,
    db::Database,
    jwt::{JwtConfig, SigningKey, TokenLifetimes},
};
use serde_json::{Value, json};
use std::num::NonZeroU32;
use tower::ServiceExt;

pub const TEST_KEY: [u8; 64] = [0x5a; 64];

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    /// Shares the app's signing key, for minting tokens directly in tests
    pub jwt: JwtConfig,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_limit(1000).await
}

pub async fn create_test_app_with_limit(per_minute: u32) -> TestApp {
    create_test_app_with(per_minute, None).await
}

pub async fn create_test_app_with(per_minute: u32, ip_header: Option<ClientIpHeader>) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let signing_key = SigningKey::new(TEST_KEY.to_vec()).expect("Test key too short");
    let jwt = JwtConfig::new(&signing_key, TokenLifetimes::default());
    let config = ServerConfig {
        db: db.clone(),
        signing_key,
        lifetimes: TokenLifetimes::default(),
        sign_in_rate_limit: NonZeroU32::new(per_minute).expect("Rate limit must be non-zero"),
        ip_header,
    };
    TestApp {
        app: create_app(&config),
        db,
        jwt,
    }
}

impl TestApp {
    /// Send a request and return the status and parsed JSON body (Null if empty or not JSON).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        authorization: Option<&str>,
    ) -> (StatusCode, Value) {
        match authorization {
            Some(value) => {
                self.send_with_headers(method, uri, body, &[(header::AUTHORIZATION.as_str(), value)])
                    .await
            }
            None => self.send_with_headers(method, uri, body, &[]).await,
        }
    }

    /// Like `send`, with arbitrary extra request headers.
    pub async fn send_with_headers(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body), None).await
    }

    pub async fn delete_with_token(&self, uri: &str, access_token: &str) -> (StatusCode, Value) {
        self.send("DELETE", uri, None, Some(&format!("Bearer {}", access_token)))
            .await
    }

    pub async fn put_with_token(
        &self,
        uri: &str,
        body: Value,
        access_token: &str,
    ) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(body), Some(&format!("Bearer {}", access_token)))
            .await
    }

    pub async fn get_with_token(&self, uri: &str, access_token: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None, Some(&format!("Bearer {}", access_token)))
            .await
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> StatusCode {
        let (status, _) = self
            .post(
                "/api/sign-up",
                json!({
                    "username": username,
                    "password": password,
                    "nickname": format!("{}_nick", username),
                    "name": format!("{} Name", username),
                }),
            )
            .await;
        status
    }

    /// Sign in and return the token response body.
    pub async fn sign_in(&self, username: &str, password: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/sign-in",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {}", body);
        body
    }

    /// Sign up and sign in a fresh user, returning (access_token, refresh_token).
    pub async fn register(&self, username: &str) -> (String, String) {
        assert_eq!(self.sign_up(username, "hunter22").await, StatusCode::CREATED);
        let tokens = self.sign_in(username, "hunter22").await;
        (
            tokens["accessToken"].as_str().unwrap().to_string(),
            tokens["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    pub async fn reissue(&self, access_token: &str, refresh_token: &str) -> (StatusCode, Value) {
        self.post(
            "/api/reissue",
            json!({ "accessToken": access_token, "refreshToken": refresh_token }),
        )
        .await
    }
}
