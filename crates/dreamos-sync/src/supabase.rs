//! # Supabase REST Client
//!
//! [`RemoteStore`] over Supabase's PostgREST endpoint.
//!
//! ## Request Mapping
//! ```text
//! select(t, order)    GET    /rest/v1/{t}?select=*&order={field}.{asc|desc}
//! insert(t, rec)      POST   /rest/v1/{t}              body [rec]
//! update(t, p, id)    PATCH  /rest/v1/{t}?id=eq.{id}   body p
//! delete(t, id)       DELETE /rest/v1/{t}?id=eq.{id}
//!
//! Headers: apikey, Authorization: Bearer <key>, Prefer: return=representation
//! ```

use async_trait::async_trait;
use dreamos_core::{Collection, SortOrder};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    rest_base: Url,
    api_key: String,
}

impl SupabaseClient {
    /// Creates a client for the project at `project_url`.
    pub fn new(project_url: &str, api_key: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let mut base = Url::parse(project_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rest_base = base.join("rest/v1/")?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(SupabaseClient {
            http,
            rest_base,
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: Collection) -> SyncResult<Url> {
        Ok(self.rest_base.join(table.table_name())?)
    }

    fn select_url(&self, table: Collection, order: SortOrder) -> SyncResult<Url> {
        let mut url = self.table_url(table)?;
        let direction = if order.ascending { "asc" } else { "desc" };
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", &format!("{}.{}", order.field, direction));
        Ok(url)
    }

    fn row_url(&self, table: Collection, id: &str) -> SyncResult<Url> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Turns a non-success response into [`SyncError::RemoteStatus`].
    async fn check(table: Collection, response: Response) -> SyncResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        warn!(table = %table, status = status.as_u16(), "Remote store rejected request");
        Err(SyncError::RemoteStatus {
            table: table.table_name().to_string(),
            status: status.as_u16(),
            message,
        })
    }

    /// First row of a `return=representation` body, or `Null` when empty.
    async fn first_row(response: Response) -> SyncResult<Value> {
        let body: Value = response.json().await?;
        Ok(match body {
            Value::Array(mut rows) if !rows.is_empty() => rows.swap_remove(0),
            Value::Array(_) => Value::Null,
            other => other,
        })
    }
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn select(&self, table: Collection, order: SortOrder) -> SyncResult<Vec<Value>> {
        let url = self.select_url(table, order)?;
        debug!(%url, "Remote select");
        let response = self.authorize(self.http.get(url)).send().await?;
        let rows: Vec<Value> = Self::check(table, response).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: Collection, record: &Value) -> SyncResult<Value> {
        let url = self.table_url(table)?;
        let response = self
            .authorize(self.http.post(url))
            .header("Prefer", "return=representation")
            .json(&[record])
            .send()
            .await?;
        Self::first_row(Self::check(table, response).await?).await
    }

    async fn update(&self, table: Collection, patch: &Value, id: &str) -> SyncResult<Value> {
        let url = self.row_url(table, id)?;
        let response = self
            .authorize(self.http.patch(url))
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        Self::first_row(Self::check(table, response).await?).await
    }

    async fn delete(&self, table: Collection, id: &str) -> SyncResult<()> {
        let url = self.row_url(table, id)?;
        let response = self.authorize(self.http.delete(url)).send().await?;
        Self::check(table, response).await?;
        Ok(())
    }

    /// Any HTTP response counts as reachable; only transport failures don't.
    async fn health(&self) -> bool {
        self.authorize(self.http.get(self.rest_base.clone()))
            .send()
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> SupabaseClient {
        SupabaseClient::new(url, "anon", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_select_url() {
        let c = client("https://xyz.supabase.co");
        let url = c
            .select_url(Collection::Inventory, Collection::Inventory.default_order())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://xyz.supabase.co/rest/v1/inventory?select=*&order=nama.asc"
        );

        let url = c
            .select_url(Collection::K3Reports, Collection::K3Reports.default_order())
            .unwrap();
        assert!(url.as_str().ends_with("/rest/v1/k3_reports?select=*&order=createdAt.desc"));
    }

    #[test]
    fn test_row_url_with_base_path() {
        let c = client("https://example.com/proxy");
        let url = c.row_url(Collection::Bookings, "bk-1").unwrap();
        assert_eq!(url.as_str(), "https://example.com/proxy/rest/v1/bookings?id=eq.bk-1");
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(SupabaseClient::new("::nope", "k", Duration::from_secs(1)).is_err());
    }
}
