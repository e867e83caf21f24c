use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod sentence;
pub(crate) mod user;
pub(crate) mod vocabulary;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) api_prefix: String,
}
