use crate::errors::{AppError, ResultExt};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Result of a contact creation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateContact {
    /// The contact was created; carries the CRM response body.
    Created(Value),
    /// A contact with this email already exists.
    Conflict,
}

/// Client for the HubSpot CRM REST API.
#[derive(Clone)]
pub struct HubSpotClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HubSpotClient {
    /// Builds a ready client, or reports why the CRM cannot be used.
    ///
    /// Resolved once at startup; callers hold on to the result instead of
    /// re-initializing per submission.
    pub async fn connect(base_url: String, token: Option<String>) -> Result<Self, AppError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Configuration("HubSpot API key not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create HubSpot client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Searches for a contact by email and returns its ID.
    pub async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>, AppError> {
        let url = format!("{}/crm/v3/objects/contacts/search", self.base_url);
        tracing::debug!("Searching HubSpot contact by email: {}", email);

        let body = json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": "email",
                    "operator": "EQ",
                    "value": email
                }]
            }],
            "properties": ["email"],
            "limit": 1
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("HubSpot contact search failed")?;

        let data = Self::expect_success(response, "contact search").await?;

        let id = data
            .get("results")
            .and_then(|r| r.as_array())
            .and_then(|results| results.first())
            .and_then(Self::extract_id);

        Ok(id)
    }

    /// Creates a new contact. A 409 from HubSpot is reported as
    /// [`CreateContact::Conflict`] rather than an error.
    pub async fn create_contact(
        &self,
        properties: Map<String, Value>,
    ) -> Result<CreateContact, AppError> {
        let url = format!("{}/crm/v3/objects/contacts", self.base_url);
        tracing::info!("Creating HubSpot contact");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .context("HubSpot contact creation failed")?;

        if response.status() == StatusCode::CONFLICT {
            tracing::info!("HubSpot contact already exists");
            return Ok(CreateContact::Conflict);
        }

        let data = Self::expect_success(response, "contact creation").await?;

        if Self::extract_id(&data).is_none() {
            tracing::warn!("Unexpected HubSpot response format: {:?}", data);
            return Err(AppError::SinkDelivery(
                "Contact creation response missing 'id' field".to_string(),
            ));
        }

        Ok(CreateContact::Created(data))
    }

    /// Updates properties of an existing contact.
    pub async fn update_contact(
        &self,
        contact_id: &str,
        properties: Map<String, Value>,
    ) -> Result<Value, AppError> {
        let url = format!("{}/crm/v3/objects/contacts/{}", self.base_url, contact_id);
        tracing::info!("Updating HubSpot contact {}", contact_id);

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .context("HubSpot contact update failed")?;

        Self::expect_success(response, "contact update").await
    }

    /// Looks up a static contact list by its exact name.
    pub async fn find_list_by_name(&self, name: &str) -> Result<Option<i64>, AppError> {
        let url = format!("{}/contacts/v1/lists", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("count", "250")])
            .send()
            .await
            .context("HubSpot list lookup failed")?;

        let data = Self::expect_success(response, "list lookup").await?;

        let list_id = data
            .get("lists")
            .and_then(|l| l.as_array())
            .and_then(|lists| {
                lists
                    .iter()
                    .find(|list| list.get("name").and_then(|n| n.as_str()) == Some(name))
            })
            .and_then(|list| list.get("listId"))
            .and_then(|id| id.as_i64());

        Ok(list_id)
    }

    /// Adds a contact to a static list.
    pub async fn add_contact_to_list(&self, list_id: i64, contact_id: &str) -> Result<(), AppError> {
        let url = format!("{}/contacts/v1/lists/{}/add", self.base_url, list_id);

        // The v1 lists API takes numeric vids; v3 hands out string IDs.
        let vid = contact_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(contact_id));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "vids": [vid] }))
            .send()
            .await
            .context("HubSpot list membership failed")?;

        Self::expect_success(response, "list membership").await?;
        Ok(())
    }

    /// Extracts an ID that may come back as a string or a number.
    pub fn extract_id(data: &Value) -> Option<String> {
        match data.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    async fn expect_success(response: reqwest::Response, what: &str) -> Result<Value, AppError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::SinkDelivery(format!(
                "HubSpot {} failed {}: {}",
                what, status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::SinkDelivery(format!("Failed to parse HubSpot {} response: {}", what, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_token() {
        let result = HubSpotClient::connect("https://api.hubapi.com".to_string(), None).await;
        assert!(matches!(result, Err(AppError::Configuration(_))));

        let result =
            HubSpotClient::connect("https://api.hubapi.com".to_string(), Some("  ".to_string()))
                .await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = HubSpotClient::connect(
            "https://api.hubapi.com/".to_string(),
            Some("token".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(client.base_url, "https://api.hubapi.com");
    }

    #[test]
    fn test_extract_id() {
        assert_eq!(
            HubSpotClient::extract_id(&json!({"id": "123"})),
            Some("123".to_string())
        );
        assert_eq!(
            HubSpotClient::extract_id(&json!({"id": 456})),
            Some("456".to_string())
        );
        assert_eq!(HubSpotClient::extract_id(&json!({"data": {}})), None);
    }
}
