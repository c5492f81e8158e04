//! POX ("plain old XML") outcome payloads: hardened parsing of inbound
//! `replaceResultRequest` bodies and rendering of `replaceResultResponse`
//! replies.

use roxmltree::{Document, ParsingOptions};
use uuid::Uuid;

use crate::error::{LtiError, Result};

pub const POX_NS: &str = "http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0";

/// Fields extracted from a `replaceResultRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRequest {
    pub source_id: String,
    /// Score exactly as sent, trimmed but not yet parsed.
    pub score_raw: String,
    /// Request message id, echoed back as `imsx_messageRefIdentifier`.
    pub message_id: Option<String>,
}

/// Parses an untrusted outcome body.
///
/// DTDs are rejected outright so entity tricks cannot pull in external
/// content. Elements are matched with the POX namespace or none at all;
/// several deployed tools omit the namespace entirely.
pub fn parse_outcome(body: &[u8]) -> Result<OutcomeRequest> {
    let text = std::str::from_utf8(body)
        .map_err(|e| LtiError::Protocol(format!("Invalid XML: {e}")))?;

    let options = ParsingOptions {
        allow_dtd: false,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text, options)
        .map_err(|e| LtiError::Protocol(format!("Invalid XML: {e}")))?;

    let source_id = match find_text(&doc, "sourcedId") {
        Some(text) => text.trim().to_string(),
        None => {
            return Err(LtiError::Protocol(
                "Missing sourcedId in outcome XML".to_string(),
            ));
        }
    };

    let score_raw = match find_text(&doc, "textString") {
        Some(text) => text.trim().to_string(),
        None => {
            return Err(LtiError::Protocol(
                "Missing textString (score) in outcome XML".to_string(),
            ));
        }
    };

    let message_id = find_text(&doc, "imsx_messageIdentifier")
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(OutcomeRequest {
        source_id,
        score_raw,
        message_id,
    })
}

/// First element named `local` in the POX namespace or no namespace at all.
/// Elements in a foreign namespace are never matched.
fn find_text<'a>(doc: &'a Document<'_>, local: &str) -> Option<&'a str> {
    doc.descendants()
        .find(|node| {
            node.is_element()
                && node.tag_name().name() == local
                && match node.tag_name().namespace() {
                    None => true,
                    Some(ns) => ns == POX_NS,
                }
        })
        .and_then(|node| node.text())
}

/// Renders a `replaceResultResponse`. `message_ref` should echo the request's
/// message identifier when the tool sent one; without it an ISO timestamp
/// stands in.
pub fn render_response(success: bool, description: &str, message_ref: Option<&str>) -> String {
    let message_ref = match message_ref {
        Some(id) => id.to_string(),
        None => chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    };
    let code_major = if success { "success" } else { "failure" };
    let severity = if success { "status" } else { "error" };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<imsx_POXEnvelopeResponse xmlns="{POX_NS}">
  <imsx_POXHeader>
    <imsx_POXResponseHeaderInfo>
      <imsx_version>V1.0</imsx_version>
      <imsx_messageIdentifier>{message_id}</imsx_messageIdentifier>
      <imsx_statusInfo>
        <imsx_codeMajor>{code_major}</imsx_codeMajor>
        <imsx_severity>{severity}</imsx_severity>
        <imsx_description>{description}</imsx_description>
        <imsx_messageRefIdentifier>{message_ref}</imsx_messageRefIdentifier>
      </imsx_statusInfo>
    </imsx_POXResponseHeaderInfo>
  </imsx_POXHeader>
  <imsx_POXBody>
    <replaceResultResponse/>
  </imsx_POXBody>
</imsx_POXEnvelopeResponse>"#,
        message_id = Uuid::new_v4(),
        description = escape_text(description),
        message_ref = escape_text(&message_ref),
    )
}

/// Escaping for XML text content; descriptions can carry tool-supplied
/// strings.
fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace_result_request(source_id: &str, score: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<imsx_POXEnvelopeRequest xmlns="{POX_NS}">
  <imsx_POXHeader>
    <imsx_POXRequestHeaderInfo>
      <imsx_version>V1.0</imsx_version>
      <imsx_messageIdentifier>999999123</imsx_messageIdentifier>
    </imsx_POXRequestHeaderInfo>
  </imsx_POXHeader>
  <imsx_POXBody>
    <replaceResultRequest>
      <resultRecord>
        <sourcedGUID>
          <sourcedId>{source_id}</sourcedId>
        </sourcedGUID>
        <result>
          <resultScore>
            <language>en</language>
            <textString>{score}</textString>
          </resultScore>
        </result>
      </resultRecord>
    </replaceResultRequest>
  </imsx_POXBody>
</imsx_POXEnvelopeRequest>"#
        )
    }

    #[test]
    fn parses_namespaced_request() {
        let body = replace_result_request("42_7_ex1", "0.85");
        let parsed = parse_outcome(body.as_bytes()).unwrap();
        assert_eq!(parsed.source_id, "42_7_ex1");
        assert_eq!(parsed.score_raw, "0.85");
        assert_eq!(parsed.message_id.as_deref(), Some("999999123"));
    }

    #[test]
    fn parses_bare_request_without_namespace() {
        let body = r#"<request>
            <sourcedId> 42_7_ex1 </sourcedId>
            <textString> 0.5 </textString>
        </request>"#;
        let parsed = parse_outcome(body.as_bytes()).unwrap();
        assert_eq!(parsed.source_id, "42_7_ex1");
        assert_eq!(parsed.score_raw, "0.5");
        assert_eq!(parsed.message_id, None);
    }

    #[test]
    fn missing_sourced_id_is_an_error() {
        let body = r#"<request><textString>0.5</textString></request>"#;
        let err = parse_outcome(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("sourcedId"));
    }

    #[test]
    fn missing_score_is_an_error() {
        let body = r#"<request><sourcedId>42_7_ex1</sourcedId></request>"#;
        let err = parse_outcome(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("textString"));
    }

    #[test]
    fn foreign_namespace_elements_are_not_matched() {
        let body = r#"<request xmlns="http://example.com/other">
            <sourcedId>42_7_ex1</sourcedId>
            <textString>0.5</textString>
        </request>"#;
        let err = parse_outcome(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("sourcedId"));
    }

    #[test]
    fn doctype_is_rejected() {
        let body = r#"<?xml version="1.0"?>
<!DOCTYPE foo [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<request><sourcedId>&xxe;</sourcedId><textString>1</textString></request>"#;
        let err = parse_outcome(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Invalid XML"));
    }

    #[test]
    fn garbage_is_an_invalid_xml_error() {
        let err = parse_outcome(b"this is not xml").unwrap_err();
        assert!(err.to_string().contains("Invalid XML"));
    }

    #[test]
    fn success_response_reports_status_severity() {
        let xml = render_response(true, "Score 0.85 recorded", None);
        assert!(xml.contains("<imsx_codeMajor>success</imsx_codeMajor>"));
        assert!(xml.contains("<imsx_severity>status</imsx_severity>"));
        assert!(xml.contains("Score 0.85 recorded"));
        assert!(xml.contains("<replaceResultResponse/>"));
    }

    #[test]
    fn failure_response_reports_error_severity() {
        let xml = render_response(false, "Launch context not found or expired", None);
        assert!(xml.contains("<imsx_codeMajor>failure</imsx_codeMajor>"));
        assert!(xml.contains("<imsx_severity>error</imsx_severity>"));
        assert!(xml.contains("Launch context not found or expired"));
    }

    #[test]
    fn response_echoes_request_message_id() {
        let xml = render_response(true, "ok", Some("msg-123"));
        assert!(xml.contains("<imsx_messageRefIdentifier>msg-123</imsx_messageRefIdentifier>"));
    }

    #[test]
    fn description_is_escaped() {
        let xml = render_response(false, "bad <input> & more", None);
        assert!(xml.contains("bad &lt;input&gt; &amp; more"));
        assert!(!xml.contains("bad <input>"));
    }

    #[test]
    fn rendered_response_is_well_formed() {
        let xml = render_response(true, "Score 1 recorded (UM notified)", Some("m1"));
        let doc = Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().name(), "imsx_POXEnvelopeResponse");
        assert_eq!(root.tag_name().namespace(), Some(POX_NS));
    }
}
