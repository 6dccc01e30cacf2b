mod dnsimple;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::UDConfig;

/// How an A record ended up holding the candidate address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted {
    Patched { record_id: String },
    Created,
}

#[async_trait]
pub trait DynamicDns {
    async fn upsert_a(&self, address: &str) -> anyhow::Result<Upserted>;
}

pub fn from_config(config: &UDConfig) -> anyhow::Result<Box<dyn DynamicDns + Send + Sync>> {
    let provider = dnsimple::Provider::new(config)?;

    Ok(Box::new(provider))
}

/// Renders a provider ID, which may arrive as a JSON string or number.
fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_id_of() {
        assert_eq!(id_of(&json!("A1")), Some("A1".to_string()));
        assert_eq!(id_of(&json!(1385)), Some("1385".to_string()));
        assert_eq!(id_of(&json!(null)), None);
        assert_eq!(id_of(&json!({"id": 1})), None);
    }
}
