use super::models::{AccessDecision, Authorizer};
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use filedrop_core::constants::ANONYMOUS_IDENTITY;
use subtle::ConstantTimeEq;

/// Static bearer keys from configuration. With no keys configured every caller is
/// allowed as `anonymous`.
#[derive(Clone)]
pub struct ApiKeyAuthorizer {
    keys: Vec<String>,
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

impl ApiKeyAuthorizer {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn is_open(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl Authorizer for ApiKeyAuthorizer {
    async fn authorize(&self, headers: &HeaderMap) -> AccessDecision {
        if self.is_open() {
            return AccessDecision::allow(ANONYMOUS_IDENTITY);
        }

        let Some(auth_header) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) else {
            return AccessDecision::deny("Missing authorization header");
        };

        let Some(token) = auth_header.strip_prefix("Bearer ") else {
            return AccessDecision::deny("Invalid authorization header format");
        };

        // every key is compared so timing does not reveal which one matched
        let matched = self
            .keys
            .iter()
            .enumerate()
            .fold(None, |found, (index, key)| {
                if secure_compare(token.trim(), key) {
                    found.or(Some(index))
                } else {
                    found
                }
            });

        match matched {
            Some(index) => AccessDecision::allow(format!("api-key-{}", index + 1)),
            None => AccessDecision::deny("Invalid API key"),
        }
    }
}
