//! LTI launch body construction.
//!
//! Every tool shares one base parameter set; per-tool overrides from the
//! registry are applied on top, with `{usr}`/`{grp}`/`{sub}`/`{cid}`/
//! `{source_id}` template substitution.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::tools::{ToolConfig, ToolId};

/// Launch body parameters, keyed by LTI field name.
pub type LaunchParams = BTreeMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex should compile")
});

/// Template variables available to override values.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub usr: &'a str,
    pub grp: &'a str,
    pub sub: &'a str,
    pub cid: &'a str,
    pub source_id: &'a str,
}

impl TemplateVars<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "usr" => Some(self.usr),
            "grp" => Some(self.grp),
            "sub" => Some(self.sub),
            "cid" => Some(self.cid),
            "source_id" => Some(self.source_id),
            _ => None,
        }
    }
}

/// Substitutes `{name}` placeholders in an override value.
///
/// A value referencing any unknown placeholder comes back unchanged (`Err`
/// carries the offending name) so a config typo degrades to a visible literal
/// instead of corrupting the launch. `{}` is not a placeholder and passes
/// through as literal braces.
fn substitute(value: &str, vars: &TemplateVars<'_>) -> Result<String, String> {
    for caps in PLACEHOLDER.captures_iter(value) {
        let name = &caps[1];
        if vars.get(name).is_none() {
            return Err(name.to_string());
        }
    }
    let substituted = PLACEHOLDER.replace_all(value, |caps: &regex::Captures<'_>| {
        vars.get(&caps[1]).unwrap_or_default().to_string()
    });
    Ok(substituted.into_owned())
}

/// Base LTI 1.0 field set shared by every direct tool.
///
/// `grp` is unused here: the context fields carry `source_id`, which already
/// embeds it.
pub fn base_body(
    source_id: &str,
    usr: &str,
    _grp: &str,
    sub: &str,
    outcome_service_url: &str,
) -> LaunchParams {
    let mut body = LaunchParams::new();
    let mut set = |key: &str, value: String| {
        body.insert(key.to_string(), value);
    };

    set("lti_message_type", "basic-lti-launch-request".to_string());
    set("lti_version", "LTI-1p0".to_string());

    set("user_id", usr.to_string());
    set("roles", "Learner".to_string());
    set("lis_person_name_full", usr.to_string());
    set("lis_person_name_family", usr.to_string());
    set("lis_person_name_given", usr.to_string());
    set("lis_person_contact_email_primary", format!("{usr}@mg.paws.edu"));

    set("tool_consumer_info_product_family_code", "splicer".to_string());
    set("tool_consumer_info_version", "1.1".to_string());
    set("tool_consumer_instance_guid", "splicer.paws.edu".to_string());
    set(
        "tool_consumer_instance_description",
        "Splicer LTI consumer".to_string(),
    );

    set("lis_outcome_service_url", outcome_service_url.to_string());
    set("lis_result_sourcedid", source_id.to_string());

    set("resource_link_id", format!("mg_{sub}"));
    set("resource_link_title", format!("mg_{sub}"));
    set("resource_link_description", format!("mg_{sub}"));
    set("ext_lti_assignment_id", format!("splicer_{sub}"));

    set("context_id", source_id.to_string());
    set("context_title", source_id.to_string());
    set("context_label", source_id.to_string());

    set("lis_person_sourcedid", "splicer".to_string());

    set("launch_presentation_document_target", "iframe".to_string());
    set("ext_submit", "Press to Launch".to_string());

    body
}

/// Inputs for building a complete per-tool launch body.
#[derive(Debug, Clone, Copy)]
pub struct BodyRequest<'a> {
    pub source_id: &'a str,
    pub usr: &'a str,
    pub grp: &'a str,
    pub sub: &'a str,
    pub cid: &'a str,
    pub outcome_service_url: &'a str,
    pub step_explanation: Option<&'a str>,
}

/// Builds the launch body for one tool: base fields, then the tool's
/// overrides with template substitution, then request-specific extras.
pub fn build_body(config: &ToolConfig, request: &BodyRequest<'_>) -> LaunchParams {
    let mut body = base_body(
        request.source_id,
        request.usr,
        request.grp,
        request.sub,
        request.outcome_service_url,
    );

    let vars = TemplateVars {
        usr: request.usr,
        grp: request.grp,
        sub: request.sub,
        cid: request.cid,
        source_id: request.source_id,
    };

    for &(key, template) in config.body_overrides {
        let value = match substitute(template, &vars) {
            Ok(value) => value,
            Err(unknown) => {
                warn!(
                    tool = %config.id,
                    field = key,
                    placeholder = %unknown,
                    "unknown template variable in override, keeping raw value"
                );
                template.to_string()
            }
        };
        body.insert(key.to_string(), value);
    }

    // DBQA renders an optional explanation panel next to the activity.
    if config.id == ToolId::Dbqa {
        if let Some(step_explanation) = request.step_explanation {
            body.insert(
                "ext_display_step_explanation".to_string(),
                step_explanation.to_string(),
            );
        }
    }

    if !request.cid.is_empty() {
        body.insert("course_id".to_string(), request.cid.to_string());
    }

    body
}
