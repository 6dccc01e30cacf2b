use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::{
    config::{MatchPolicy, UDConfig},
    ddns::{DynamicDns, Upserted, id_of},
};

pub struct Provider {
    client: reqwest::Client,
    base_url: String,
    token: String,
    zone: String,
    record_name: String,
    match_policy: MatchPolicy,
}

impl Provider {
    pub fn new(config: &UDConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            zone: config.zone.clone(),
            record_name: config.record_name.clone(),
            match_policy: config.match_policy,
        })
    }

    /// Sends `req` and returns the `data` array of a successful response.
    async fn fetch_data(&self, req: reqwest::RequestBuilder) -> anyhow::Result<Vec<Value>> {
        let resp = req.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        tracing::debug!(status = %status, body = %text, "API response");

        if !status.is_success() {
            anyhow::bail!("DNS provider API error ({}): {}", status, text);
        }

        let mut body: Value = serde_json::from_str(&text)?;

        match body.get_mut("data").map(Value::take) {
            Some(Value::Array(list)) => Ok(list),
            _ => anyhow::bail!("DNS provider response has no data list: {}", text),
        }
    }

    async fn fetch_account_id(&self) -> anyhow::Result<String> {
        let url = format!("{}/v2/accounts", self.base_url);
        let accounts = self.fetch_data(self.client.get(url)).await?;

        let account_id = accounts
            .first()
            .and_then(|account| id_of(&account["id"]))
            .ok_or_else(|| anyhow::anyhow!("No account visible to the configured token"))?;

        tracing::debug!(account_id = %account_id, "Account resolved");

        Ok(account_id)
    }

    async fn search_record_id(&self, account_id: &str) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/v2/{}/zones/{}/records",
            self.base_url, account_id, self.zone
        );
        let records = self.fetch_data(self.client.get(url)).await?;

        let mut found = None;
        for record in &records {
            let Some(rectype) = record["type"].as_str() else {
                anyhow::bail!("Malformed record in zone {}: {}", self.zone, record);
            };
            if rectype != "A" {
                continue;
            }

            let Some(name) = record["name"].as_str() else {
                anyhow::bail!("Malformed A record in zone {}: {}", self.zone, record);
            };
            if name != self.record_name {
                continue;
            }

            let id = id_of(&record["id"])
                .ok_or_else(|| anyhow::anyhow!("Record without id in zone {}", self.zone))?;
            found = Some(id);

            if self.match_policy == MatchPolicy::First {
                break;
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl DynamicDns for Provider {
    async fn upsert_a(&self, address: &str) -> anyhow::Result<Upserted> {
        let account_id = self.fetch_account_id().await?;
        let record_id = self.search_record_id(&account_id).await?;

        let records_url = format!(
            "{}/v2/{}/zones/{}/records",
            self.base_url, account_id, self.zone
        );

        let (method, url, payload) = match &record_id {
            Some(id) => {
                tracing::debug!(record_id = %id, "Record exists, patching");
                (
                    reqwest::Method::PATCH,
                    format!("{}/{}", records_url, id),
                    json!({ "content": address }),
                )
            }
            None => {
                tracing::debug!(name = %self.record_name, "Record does not exist, creating");
                (
                    reqwest::Method::POST,
                    records_url,
                    json!({ "name": &self.record_name, "content": address, "type": "A" }),
                )
            }
        };

        let resp = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        tracing::debug!(status = %status, body = %text, "API response");

        if !status.is_success() {
            anyhow::bail!("DNS provider API error ({}): {}", status, text);
        }

        tracing::info!(
            action = %method,
            name = %self.record_name,
            content = %address,
            "Record synchronization successful"
        );

        Ok(match record_id {
            Some(record_id) => Upserted::Patched { record_id },
            None => Upserted::Created,
        })
    }
}
