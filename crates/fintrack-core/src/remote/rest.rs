//! PostgREST table client.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{Mutation, RemoteTable};
use crate::config::ProjectEndpoints;
use crate::error::{Error, Result};
use crate::models::{RecordId, UserId};
use crate::resource::{Draft, Resource};
use crate::util::compact_text;

#[derive(Clone)]
pub struct SupabaseRestClient {
    rest_url: String,
    anon_key: String,
    access_token: String,
    client: Client,
}

impl SupabaseRestClient {
    pub fn new(endpoints: &ProjectEndpoints, access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(Error::Unauthorized(
                "table access requires a signed-in access token".to_string(),
            ));
        }
        Ok(Self {
            rest_url: endpoints.rest_url(),
            anon_key: endpoints.anon_key().to_string(),
            access_token,
            client: Client::builder().build()?,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.rest_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
    }

    /// Row filter for a single owned row.
    fn row_filter(id: &RecordId, owner: &UserId) -> [(&'static str, String); 2] {
        [
            ("id", format!("eq.{id}")),
            ("user_id", format!("eq.{owner}")),
        ]
    }

    fn draft_body<D: Draft>(draft: &D, owner: &UserId) -> Result<Value> {
        draft.validate()?;
        let mut body = serde_json::to_value(draft)?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("user_id".to_string(), Value::String(owner.to_string()));
        }
        Ok(body)
    }

    async fn representation<R: Resource>(response: Response, id: Option<&RecordId>) -> Result<R> {
        let response = check_status(response).await?;
        let mut rows = response.json::<Vec<R>>().await?;
        if rows.is_empty() {
            let target = id.map_or_else(String::new, |id| format!(" {id}"));
            return Err(Error::NotFound(format!("{}{target}", R::TABLE)));
        }
        Ok(rows.swap_remove(0))
    }
}

impl RemoteTable for SupabaseRestClient {
    async fn query<R: Resource>(&self, owner: &UserId) -> Result<Vec<R>> {
        let request = self.authorized(self.client.get(self.table_url(R::TABLE)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{owner}")),
            ("order", R::ORDER.to_query_value()),
        ]));
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<Vec<R>>().await?)
    }

    async fn write<R: Resource>(&self, owner: &UserId, mutation: Mutation<R::Draft>) -> Result<R> {
        let url = self.table_url(R::TABLE);
        match mutation {
            Mutation::Create(draft) => {
                let body = Self::draft_body(&draft, owner)?;
                let request = self.authorized(self.client.post(url).json(&body));
                let response = request
                    .header("Prefer", "return=representation")
                    .send()
                    .await?;
                Self::representation(response, None).await
            }
            Mutation::Update(id, draft) => {
                let body = Self::draft_body(&draft, owner)?;
                let request = self.authorized(
                    self.client
                        .patch(url)
                        .query(&Self::row_filter(&id, owner))
                        .json(&body),
                );
                let response = request
                    .header("Prefer", "return=representation")
                    .send()
                    .await?;
                Self::representation(response, Some(&id)).await
            }
            Mutation::Delete(id) => {
                let request = self.authorized(
                    self.client
                        .delete(url)
                        .query(&Self::row_filter(&id, owner)),
                );
                let response = request
                    .header("Prefer", "return=representation")
                    .send()
                    .await?;
                Self::representation(response, Some(&id)).await
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body))
}

/// Map a failed PostgREST response to the error the store reports.
fn classify_error(status: StatusCode, body: &str) -> Error {
    let parsed = serde_json::from_str::<PostgrestErrorBody>(body).ok();
    let code = parsed.as_ref().and_then(|error| error.code.clone());
    let message = parsed
        .and_then(|error| {
            let base = error.message?;
            Some(match error.details.or(error.hint) {
                Some(extra) => format!("{base} ({extra})"),
                None => base,
            })
        })
        .unwrap_or_else(|| {
            let text = compact_text(body);
            if text.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                text
            }
        });

    // 42501: insufficient_privilege, raised by row-level security.
    if code.as_deref() == Some("42501") {
        return Error::Unauthorized(message);
    }
    // Class 22 (data exception) and 23 (integrity constraint violation).
    if code
        .as_deref()
        .is_some_and(|code| code.starts_with("22") || code.starts_with("23"))
    {
        return Error::Validation(message);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::Validation(message)
        }
        _ => Error::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTransaction;

    #[test]
    fn row_level_security_violation_is_unauthorized() {
        let error = classify_error(
            StatusCode::FORBIDDEN,
            r#"{"code":"42501","message":"new row violates row-level security policy for table \"transactions\"","details":null,"hint":null}"#,
        );
        assert!(matches!(error, Error::Unauthorized(message) if message.contains("row-level security")));
    }

    #[test]
    fn constraint_violation_is_validation() {
        let error = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":"23514","message":"violates check constraint","details":"Failing row contains (...)","hint":null}"#,
        );
        assert!(matches!(error, Error::Validation(message) if message.contains("Failing row")));
    }

    #[test]
    fn server_errors_keep_status() {
        let error = classify_error(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
        assert!(matches!(error, Error::Api { status: 503, ref message } if message == "upstream down"));
        assert!(error.is_transient());
        let empty = classify_error(StatusCode::BAD_GATEWAY, "");
        assert!(matches!(empty, Error::Api { message, .. } if message == "HTTP 502"));
    }

    #[test]
    fn draft_body_injects_owner() {
        let body =
            SupabaseRestClient::draft_body(&NewTransaction::expense(9.5), &UserId::new("u-1")).unwrap();
        assert_eq!(body["user_id"], "u-1");
        assert_eq!(body["type"], "expense");
    }

    #[test]
    fn draft_body_rejects_invalid_draft() {
        assert!(
            SupabaseRestClient::draft_body(&NewTransaction::expense(-1.0), &UserId::new("u-1"))
                .is_err()
        );
    }

    #[test]
    fn client_requires_access_token() {
        let endpoints = ProjectEndpoints::new("https://demo.supabase.co", "anon").unwrap();
        assert!(SupabaseRestClient::new(&endpoints, "").is_err());
        let client = SupabaseRestClient::new(&endpoints, "jwt").unwrap();
        assert_eq!(
            client.table_url("budgets"),
            "https://demo.supabase.co/rest/v1/budgets"
        );
    }
}
