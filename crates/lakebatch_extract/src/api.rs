//! REST API extractor.
//!
//! Interprets a dataset's ordered `api_connection_dtl` rows as a short linear
//! workflow: zero or more `TOKEN` steps set an `Authorization` header, followed by
//! exactly one `RESPONSE` step that issues the actual request. `$current_date[-N][:
//! FORMAT]$` tokens in the body are substituted before dispatch, and a `body_values`
//! map expands into the Cartesian product of its value lists, dispatched
//! concurrently.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ApiStep {
    #[serde(rename = "TOKEN")]
    Token(TokenStep),
    #[serde(rename = "RESPONSE")]
    Response(ResponseStep),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenStep {
    pub auth_type: String,
    pub method: Option<String>,
    pub token_url: Option<String>,
    pub token_type: Option<String>,
    pub token_path: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub issuer: Option<String>,
    pub scope: Option<String>,
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseStep {
    pub method: Option<String>,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub json_body: Value,
    #[serde(default)]
    pub body_values: Vec<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    exp: i64,
    iat: i64,
}

/// Substitute every `$current_date[-N][:FORMAT]$` token in `text` against `today`.
pub fn substitute_current_date(text: &str, today: chrono::NaiveDate) -> String {
    let token_re = Regex::new(r"\$current_date(?:-(\d+))?(?::([^$]+))?\$").expect("static regex");
    token_re
        .replace_all(text, |caps: &regex::Captures| {
            let offset: i64 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let format = caps.get(2).map(|m| m.as_str()).unwrap_or("%Y-%m-%d");
            let date = today - Duration::days(offset);
            date.format(format).to_string()
        })
        .into_owned()
}

async fn fetch_token(client: &reqwest::Client, step: &TokenStep) -> Result<(String, String)> {
    match step.auth_type.as_str() {
        "oauth" => {
            let token_url = step
                .token_url
                .as_deref()
                .ok_or_else(|| ExtractError::InvalidConfig("oauth token step missing token_url".into()))?;
            let response: Value = client
                .request(
                    step.method.as_deref().unwrap_or("POST").parse().unwrap_or(reqwest::Method::POST),
                    token_url,
                )
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", step.client_id.as_deref().unwrap_or_default()),
                    ("client_secret", step.client_secret.as_deref().unwrap_or_default()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let token_path = step.token_path.as_deref().unwrap_or("access_token");
            let token = response
                .get(token_path)
                .and_then(Value::as_str)
                .ok_or_else(|| ExtractError::InvalidConfig(format!("oauth response missing '{token_path}'")))?;
            let token_type = step.token_type.as_deref().unwrap_or("Bearer");
            Ok(("Authorization".to_string(), format!("{token_type} {token}")))
        }
        "service_account" => {
            let token_url = step
                .token_url
                .as_deref()
                .ok_or_else(|| ExtractError::InvalidConfig("service_account step missing token_url".into()))?;
            let private_key = step
                .private_key
                .as_deref()
                .ok_or_else(|| ExtractError::InvalidConfig("service_account step missing private_key".into()))?;
            let now = Utc::now();
            let claims = JwtClaims {
                iss: step.issuer.clone().unwrap_or_default(),
                scope: step.scope.clone().unwrap_or_default(),
                aud: token_url.to_string(),
                exp: (now + Duration::minutes(60)).timestamp(),
                iat: now.timestamp(),
            };
            let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
                .map_err(ExtractError::Jwt)?;
            let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(ExtractError::Jwt)?;
            let response: Value = client
                .post(token_url)
                .form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", jwt.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let token_path = step.token_path.as_deref().unwrap_or("access_token");
            let token = response
                .get(token_path)
                .and_then(Value::as_str)
                .ok_or_else(|| ExtractError::InvalidConfig(format!("service_account response missing '{token_path}'")))?;
            Ok(("Authorization".to_string(), format!("Bearer {token}")))
        }
        "basic_auth" => {
            let username = step.username.as_deref().unwrap_or_default();
            let password = step.password.as_deref().unwrap_or_default();
            let encoded = BASE64.encode(format!("{username}:{password}"));
            Ok(("Authorization".to_string(), format!("Basic {encoded}")))
        }
        "custom" => {
            let token_url = step
                .token_url
                .as_deref()
                .ok_or_else(|| ExtractError::InvalidConfig("custom auth step missing token_url".into()))?;
            let response: Value = client.get(token_url).send().await?.error_for_status()?.json().await?;
            let token_path = step
                .token_path
                .as_deref()
                .ok_or_else(|| ExtractError::InvalidConfig("custom auth step missing token_path".into()))?;
            let token = response
                .get(token_path)
                .and_then(Value::as_str)
                .ok_or_else(|| ExtractError::InvalidConfig(format!("custom auth response missing '{token_path}'")))?;
            Ok(("Authorization".to_string(), format!("Bearer {token}")))
        }
        other => Err(ExtractError::InvalidConfig(format!("unsupported auth_type: {other}"))),
    }
}

/// Compute the Cartesian product of `body_values`' value lists and substitute each
/// combination's placeholders into `template`.
fn expand_body_values(template: &str, body_values: &[HashMap<String, Vec<String>>]) -> Vec<String> {
    let mut rendered = Vec::new();
    for map in body_values {
        let keys: Vec<&String> = map.keys().collect();
        let value_lists: Vec<&Vec<String>> = keys.iter().map(|k| &map[*k]).collect();
        let mut combos: Vec<Vec<String>> = vec![Vec::new()];
        for values in &value_lists {
            let mut next = Vec::new();
            for combo in &combos {
                for value in values.iter() {
                    let mut extended = combo.clone();
                    extended.push(value.clone());
                    next.push(extended);
                }
            }
            combos = next;
        }
        for combo in combos {
            let mut body = template.to_string();
            for (key, value) in keys.iter().zip(combo.iter()) {
                body = body.replace(key.as_str(), value);
            }
            rendered.push(body);
        }
    }
    rendered
}

/// Execute `step` with the accumulated auth headers from earlier `TOKEN` steps. When
/// `body_values` is absent this issues one request; otherwise it dispatches every
/// expanded combination concurrently and returns `{"values_based_response": [...]}`.
pub async fn execute_response_step(
    client: &reqwest::Client,
    auth_headers: &HashMap<String, String>,
    step: &ResponseStep,
    today: chrono::NaiveDate,
) -> Result<Value> {
    let method: reqwest::Method = step
        .method
        .as_deref()
        .unwrap_or("GET")
        .parse()
        .unwrap_or(reqwest::Method::GET);

    let mut headers = auth_headers.clone();
    headers.extend(step.headers.clone());

    let json_body = substitute_current_date(&step.json_body.to_string(), today);
    let data = substitute_current_date(&step.data.to_string(), today);

    if step.body_values.is_empty() {
        let mut request = client.request(method, &step.url).query(&step.params);
        for (key, value) in &headers {
            request = request.header(key, value);
        }
        if !step.json_body.is_null() {
            request = request.body(json_body).header("content-type", "application/json");
        } else if !step.data.is_null() {
            request = request.body(data);
        }
        let response: Value = request.send().await?.error_for_status()?.json().await?;
        return Ok(response);
    }

    let template = if !step.json_body.is_null() { &json_body } else { &data };
    let bodies = expand_body_values(template, &step.body_values);

    let requests = bodies.into_iter().map(|body| {
        let client = client.clone();
        let url = step.url.clone();
        let headers = headers.clone();
        let params = step.params.clone();
        let method = method.clone();
        async move {
            let mut request = client.request(method, &url).query(&params).body(body);
            for (key, value) in &headers {
                request = request.header(key, value);
            }
            request.send().await?.error_for_status()?.json::<Value>().await
        }
    });

    let responses: Vec<Value> = futures::future::try_join_all(requests).await?;
    Ok(serde_json::json!({ "values_based_response": responses }))
}

/// Run the full ordered step list and return the final `RESPONSE` step's result.
pub async fn execute_workflow(client: &reqwest::Client, steps: &[ApiStep], today: chrono::NaiveDate) -> Result<Value> {
    let mut auth_headers = HashMap::new();
    for step in steps {
        match step {
            ApiStep::Token(token_step) => {
                let (key, value) = fetch_token(client, token_step).await?;
                auth_headers.insert(key, value);
            }
            ApiStep::Response(response_step) => {
                return execute_response_step(client, &auth_headers, response_step, today).await;
            }
        }
    }
    Err(ExtractError::InvalidConfig(
        "api workflow has no RESPONSE step".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_plain_current_date() {
        let today = chrono::NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(substitute_current_date("$current_date$", today), "2025-03-14");
    }

    #[test]
    fn substitutes_offset_and_custom_format() {
        let today = chrono::NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(
            substitute_current_date("$current_date-7:%Y-%m-%d$", today),
            "2025-03-07"
        );
    }

    #[test]
    fn expands_cartesian_product_of_body_values() {
        let mut map = HashMap::new();
        map.insert("@region".to_string(), vec!["EU".to_string(), "US".to_string()]);
        let rendered = expand_body_values(r#"{"region":"@region"}"#, &[map]);
        assert_eq!(rendered.len(), 2);
        assert!(rendered.contains(&r#"{"region":"EU"}"#.to_string()));
        assert!(rendered.contains(&r#"{"region":"US"}"#.to_string()));
    }

    #[test]
    fn multi_key_body_values_produce_full_product() {
        let mut map = HashMap::new();
        map.insert("@a".to_string(), vec!["1".to_string(), "2".to_string()]);
        map.insert("@b".to_string(), vec!["x".to_string()]);
        let rendered = expand_body_values("@a-@b", &[map]);
        assert_eq!(rendered.len(), 2);
    }
}
