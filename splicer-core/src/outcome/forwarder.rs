//! Forwarding of outcome scores to the user-modeling (UM) service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{LtiError, Result};
use crate::tools::ToolConfig;

/// Single attempt, bounded wait. Tools retry failed deliveries themselves,
/// so no retry loop on our side.
pub const UM_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields taken from the cached launch context plus the reported score.
#[derive(Debug, Clone, Copy)]
pub struct UmOutcome<'a> {
    pub score_raw: &'a str,
    pub usr: &'a str,
    pub grp: &'a str,
    pub sub: &'a str,
    pub sid: &'a str,
    pub svc: &'a str,
    pub cid: &'a str,
}

/// Builds the UM query URL for one outcome, applying the tool's score and
/// act hooks. Empty fields are omitted from the query entirely.
pub fn build_um_url(base_um_url: &str, config: &ToolConfig, outcome: &UmOutcome<'_>) -> Result<String> {
    let mut url = Url::parse(base_um_url)
        .map_err(|e| LtiError::Configuration(format!("invalid UM service URL: {e}")))?;

    let (score, sub) = match config.outcome_score_processor {
        Some(processor) => processor.apply(outcome.score_raw, outcome.sub),
        None => (outcome.score_raw.to_string(), outcome.sub.to_string()),
    };
    let act = match config.outcome_act_modifier {
        Some(modifier) => modifier.apply(config.act),
        None => config.act.to_string(),
    };

    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in [
            ("app", config.app_id),
            ("act", act.as_str()),
            ("sub", sub.as_str()),
            ("res", score.as_str()),
            ("usr", outcome.usr),
            ("grp", outcome.grp),
            ("sid", outcome.sid),
            ("svc", outcome.svc),
            ("cid", outcome.cid),
        ] {
            if !value.is_empty() {
                pairs.append_pair(key, value);
            }
        }
    }

    Ok(url.into())
}

/// Transport for UM deliveries; swapped for a stub in tests.
#[async_trait]
pub trait UmForwarder: Send + Sync {
    /// Fire the GET and return the HTTP status code.
    async fn forward(&self, url: &str) -> Result<u16>;
}

#[derive(Debug, Clone)]
pub struct HttpUmForwarder {
    client: Client,
}

impl HttpUmForwarder {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(UM_TIMEOUT)
            .build()
            .map_err(|e| LtiError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UmForwarder for HttpUmForwarder {
    async fn forward(&self, url: &str) -> Result<u16> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                LtiError::Upstream("UM service timeout".to_string())
            } else {
                LtiError::Upstream(format!("UM service error: {e}"))
            }
        })?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::tools::{ToolId, ToolRegistry};

    const UM_BASE: &str = "http://adapt2.sis.pitt.edu/aggregate2/UserActivity";

    fn registry() -> ToolRegistry {
        ToolRegistry::from_lookup(|name| match name {
            "CTAT_KEY" | "DBQA_KEY" | "CODECHECK_KEY" => Some("key".to_string()),
            "CTAT_SECRET" | "DBQA_SECRET" | "CODECHECK_SECRET" => Some("secret".to_string()),
            "CTAT_LAUNCH" => Some("https://ctat.example.edu/tutors".to_string()),
            "DBQA_LAUNCH" => Some("https://dbqa.example.edu/lti".to_string()),
            "CODECHECK_LAUNCH" => Some("https://codecheck.io/lti".to_string()),
            _ => None,
        })
    }

    fn query_map(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn outcome<'a>(score: &'a str, sub: &'a str) -> UmOutcome<'a> {
        UmOutcome {
            score_raw: score,
            usr: "42",
            grp: "7",
            sub,
            sid: "",
            svc: "",
            cid: "",
        }
    }

    #[test]
    fn plain_tool_forwards_score_verbatim() {
        let registry = registry();
        let config = registry.get(ToolId::Codecheck).unwrap();
        let url = build_um_url(UM_BASE, config, &outcome("0.85", "ex1")).unwrap();
        let pairs = query_map(&url);
        assert_eq!(pairs["app"], "56");
        assert_eq!(pairs["act"], "codecheck");
        assert_eq!(pairs["sub"], "ex1");
        assert_eq!(pairs["res"], "0.85");
        assert_eq!(pairs["usr"], "42");
        assert_eq!(pairs["grp"], "7");
        assert!(!pairs.contains_key("sid"));
        assert!(!pairs.contains_key("svc"));
        assert!(!pairs.contains_key("cid"));
    }

    #[test]
    fn ctat_scores_collapse_to_binary() {
        let registry = registry();
        let config = registry.get(ToolId::Ctat).unwrap();

        let url = build_um_url(UM_BASE, config, &outcome("0.3", "ps1")).unwrap();
        assert_eq!(query_map(&url)["res"], "1");

        let url = build_um_url(UM_BASE, config, &outcome("0", "ps1")).unwrap();
        assert_eq!(query_map(&url)["res"], "0");
    }

    #[test]
    fn dbqa_suffixes_sub_and_act() {
        let registry = registry();
        let config = registry.get(ToolId::Dbqa).unwrap();
        let url = build_um_url(UM_BASE, config, &outcome("0.9", "join")).unwrap();
        let pairs = query_map(&url);
        assert_eq!(pairs["sub"], "join-lti");
        assert_eq!(pairs["act"], "dbqa-lti");
        assert_eq!(pairs["res"], "0.9");
    }

    #[test]
    fn optional_fields_appear_when_present() {
        let registry = registry();
        let config = registry.get(ToolId::Codecheck).unwrap();
        let outcome = UmOutcome {
            score_raw: "1.0",
            usr: "42",
            grp: "7",
            sub: "ex1",
            sid: "sess9",
            svc: "https://host/lti/outcome",
            cid: "course1",
        };
        let pairs = query_map(&build_um_url(UM_BASE, config, &outcome).unwrap());
        assert_eq!(pairs["sid"], "sess9");
        assert_eq!(pairs["svc"], "https://host/lti/outcome");
        assert_eq!(pairs["cid"], "course1");
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let registry = registry();
        let config = registry.get(ToolId::Codecheck).unwrap();
        let err = build_um_url("not a url", config, &outcome("1", "ex1")).unwrap_err();
        assert!(matches!(err, LtiError::Configuration(_)));
    }
}
