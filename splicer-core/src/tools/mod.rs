//! Per-tool configuration and the process-wide tool registry.
//!
//! Every launchable tool is a [`ToolId`] variant. Credentials and launch URLs
//! come from the environment at startup; everything else about a tool (app
//! id, act label, body overrides, behavior hooks) is fixed in
//! [`registry`]'s declaration table.

use std::fmt;

pub mod hooks;
mod registry;

pub use registry::ToolRegistry;

use hooks::{ActModifier, LaunchUrlModifier, ScoreProcessor};

/// Closed set of launchable tools.
///
/// The `paws_*` variants are mediated: the PAWS platform performs the OAuth
/// handshake and this engine only redirects to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    PawsCodeocean,
    PawsCtat,
    PawsCodecheck,
    Codecheck,
    Codeworkout,
    Ctat,
    Codelab,
    Dbqa,
    Codeocean,
    OpendsaProblems,
    OpendsaSlideshows,
}

impl ToolId {
    pub const ALL: [ToolId; 11] = [
        ToolId::PawsCodeocean,
        ToolId::PawsCtat,
        ToolId::PawsCodecheck,
        ToolId::Codecheck,
        ToolId::Codeworkout,
        ToolId::Ctat,
        ToolId::Codelab,
        ToolId::Dbqa,
        ToolId::Codeocean,
        ToolId::OpendsaProblems,
        ToolId::OpendsaSlideshows,
    ];

    /// Wire name as it appears in launch query parameters and cache rows.
    pub fn as_str(self) -> &'static str {
        match self {
            ToolId::PawsCodeocean => "paws_codeocean",
            ToolId::PawsCtat => "paws_ctat",
            ToolId::PawsCodecheck => "paws_codecheck",
            ToolId::Codecheck => "codecheck",
            ToolId::Codeworkout => "codeworkout",
            ToolId::Ctat => "ctat",
            ToolId::Codelab => "codelab",
            ToolId::Dbqa => "dbqa",
            ToolId::Codeocean => "codeocean",
            ToolId::OpendsaProblems => "opendsa_problems",
            ToolId::OpendsaSlideshows => "opendsa_slideshows",
        }
    }

    pub fn parse(name: &str) -> Option<ToolId> {
        match name {
            "paws_codeocean" => Some(ToolId::PawsCodeocean),
            "paws_ctat" => Some(ToolId::PawsCtat),
            "paws_codecheck" => Some(ToolId::PawsCodecheck),
            "codecheck" => Some(ToolId::Codecheck),
            "codeworkout" => Some(ToolId::Codeworkout),
            "ctat" => Some(ToolId::Ctat),
            "codelab" => Some(ToolId::Codelab),
            "dbqa" => Some(ToolId::Dbqa),
            "codeocean" => Some(ToolId::Codeocean),
            "opendsa_problems" => Some(ToolId::OpendsaProblems),
            "opendsa_slideshows" => Some(ToolId::OpendsaSlideshows),
            _ => None,
        }
    }

    /// Prefix for this tool's `_KEY` / `_SECRET` / `_LAUNCH` environment
    /// variables.
    pub fn env_prefix(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable configuration for one tool, fixed for the life of the process.
///
/// Credentials default to empty strings when the environment does not supply
/// them; [`ToolConfig::is_configured`] is the gate that decides whether the
/// tool is actually launchable.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub id: ToolId,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub launch_url: String,
    /// Application id registered with the UM service.
    pub app_id: &'static str,
    /// Activity label reported to the UM service.
    pub act: &'static str,
    pub is_paws_proxy: bool,
    /// Tool name announced to the mediating platform (mediated tools only).
    pub paws_tool: Option<&'static str>,
    /// Body parameter overrides; values may carry `{usr}`/`{grp}`/`{sub}`/
    /// `{cid}`/`{source_id}` placeholders.
    pub body_overrides: &'static [(&'static str, &'static str)],
    pub launch_url_modifier: Option<LaunchUrlModifier>,
    pub outcome_score_processor: Option<ScoreProcessor>,
    pub outcome_act_modifier: Option<ActModifier>,
}

impl ToolConfig {
    /// Mediated tools only need a launch URL; direct tools need the full
    /// credential set.
    pub fn is_configured(&self) -> bool {
        if self.is_paws_proxy {
            !self.launch_url.is_empty()
        } else {
            !self.consumer_key.is_empty()
                && !self.consumer_secret.is_empty()
                && !self.launch_url.is_empty()
        }
    }

    /// Launch URL for one activity, with the tool's URL modifier applied.
    pub fn launch_url_for(&self, sub: &str) -> String {
        match self.launch_url_modifier {
            Some(modifier) => modifier.apply(&self.launch_url, sub),
            None => self.launch_url.clone(),
        }
    }
}
