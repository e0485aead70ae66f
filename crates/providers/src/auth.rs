use serde::{Deserialize, Serialize};

/// How the API key is presented to a provider.
///
/// Providers have changed this between API versions, so a candidate set lists
/// several styles and the prober tries them in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "style")]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// Custom header, e.g. `x-api-key: <key>`.
    Header { name: String },
    /// Key embedded in the query string, e.g. `?api_key=<key>`.
    Query { param: String },
}

impl AuthStyle {
    pub fn header(name: impl Into<String>) -> Self {
        Self::Header { name: name.into() }
    }

    pub fn query(param: impl Into<String>) -> Self {
        Self::Query {
            param: param.into(),
        }
    }

    /// Short label used in logs and aggregated errors (never includes the key).
    pub fn label(&self) -> String {
        match self {
            AuthStyle::Bearer => "bearer".to_string(),
            AuthStyle::Header { name } => format!("header:{name}"),
            AuthStyle::Query { param } => format!("query:{param}"),
        }
    }
}

impl core::fmt::Display for AuthStyle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.label())
    }
}
