#![allow(dead_code)]

use assignment_review::api::{self, user::Role};
use constcat::concat;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

const BASE_URL: &str = "http://localhost:3000";

pub const PASSWORD: &str = "Secret1!";

/// Rejected request.
#[derive(Debug)]
pub struct Failure {
    pub status: StatusCode,
    pub body: api::Message,
}

pub struct Client {
    inner: reqwest::Client,
    pub auth_token: Option<String>,
}

/// Email no other test run has registered.
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}.{}@example.com", Uuid::new_v4().simple())
}

fn scope(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::User => "user",
    }
}

/// Registers a fresh account and logs it in.
pub async fn account(role: Role, name: &str) -> (Client, String) {
    let email = unique_email(&name.to_lowercase().replace(' ', "."));
    let client = Client::new();
    client
        .register(
            role,
            json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "role": role.to_string(),
            }),
        )
        .await
        .expect("failed to register");
    (client.auth(role, &email, PASSWORD).await, email)
}

impl Client {
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
            auth_token: None,
        }
    }

    pub async fn auth(mut self, role: Role, email: &str, password: &str) -> Self {
        let token = self
            .login(role, email, password)
            .await
            .expect("failed to log in");
        self.auth_token = Some(token.token);
        self
    }

    async fn send<T: DeserializeOwned>(
        &self,
        mut req: RequestBuilder,
    ) -> Result<T, Failure> {
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let res = req.send().await.expect("failed to send a request");
        let status = res.status();
        if status.is_success() {
            Ok(res.json::<T>().await.expect("failed to get a response"))
        } else {
            Err(Failure {
                status,
                body: res
                    .json::<api::Message>()
                    .await
                    .expect("failed to get an error response"),
            })
        }
    }

    pub async fn register(
        &self,
        role: Role,
        body: serde_json::Value,
    ) -> Result<api::Message, Failure> {
        let url = format!("{BASE_URL}/{}/register", scope(role));
        self.send(self.inner.post(url).json(&body)).await
    }

    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<api::Token, Failure> {
        let url = format!("{BASE_URL}/{}/login", scope(role));
        self.send(self.inner.post(url).json(&json!({
            "email": email,
            "password": password,
        })))
        .await
    }

    pub async fn upload(
        &self,
        task: &str,
        admin_id: &str,
    ) -> Result<api::assignment::Uploaded, Failure> {
        const URL: &str = concat!(BASE_URL, "/user/upload");

        self.send(self.inner.post(URL).json(&json!({
            "task": task,
            "adminId": admin_id,
        })))
        .await
    }

    pub async fn admins(&self) -> Result<Vec<api::User>, Failure> {
        const URL: &str = concat!(BASE_URL, "/user/admins");

        self.send(self.inner.get(URL)).await
    }

    /// Id of the admin registered with `email`.
    pub async fn admin_id(&self, email: &str) -> api::user::Id {
        self.admins()
            .await
            .expect("failed to list admins")
            .into_iter()
            .find(|admin| admin.email == email)
            .expect("admin not listed")
            .id
    }

    pub async fn admin_assignments(
        &self,
    ) -> Result<Vec<api::Assignment>, Failure> {
        const URL: &str = concat!(BASE_URL, "/admin/assignments");

        self.send(self.inner.get(URL)).await
    }

    pub async fn user_assignments(
        &self,
    ) -> Result<Vec<api::Assignment>, Failure> {
        const URL: &str = concat!(BASE_URL, "/user/assignments");

        self.send(self.inner.get(URL)).await
    }

    pub async fn accept(
        &self,
        id: api::assignment::Id,
    ) -> Result<api::Message, Failure> {
        const URL: &str = concat!(BASE_URL, "/admin/assignments");

        self.send(self.inner.post(format!("{URL}/{id}/accept"))).await
    }

    pub async fn reject(
        &self,
        id: api::assignment::Id,
    ) -> Result<api::Message, Failure> {
        const URL: &str = concat!(BASE_URL, "/admin/assignments");

        self.send(self.inner.post(format!("{URL}/{id}/reject"))).await
    }
}
