//! Declaration table and environment loading for the tool registry.

use std::collections::HashMap;

use tracing::debug;

use super::hooks::{ActModifier, LaunchUrlModifier, ScoreProcessor};
use super::{ToolConfig, ToolId};

/// Shared launch endpoint for all PAWS-mediated tools.
const DEFAULT_PAWS_LAUNCH_URL: &str = "http://adapt2.sis.pitt.edu/lti/launch";

struct ToolSpec {
    app_id: &'static str,
    act: &'static str,
    is_paws_proxy: bool,
    paws_tool: Option<&'static str>,
    default_launch_url: &'static str,
    body_overrides: &'static [(&'static str, &'static str)],
    launch_url_modifier: Option<LaunchUrlModifier>,
    outcome_score_processor: Option<ScoreProcessor>,
    outcome_act_modifier: Option<ActModifier>,
}

impl ToolSpec {
    const fn direct(
        app_id: &'static str,
        act: &'static str,
        default_launch_url: &'static str,
        body_overrides: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            app_id,
            act,
            is_paws_proxy: false,
            paws_tool: None,
            default_launch_url,
            body_overrides,
            launch_url_modifier: None,
            outcome_score_processor: None,
            outcome_act_modifier: None,
        }
    }

    const fn mediated(app_id: &'static str, act: &'static str, paws_tool: &'static str) -> Self {
        Self {
            app_id,
            act,
            is_paws_proxy: true,
            paws_tool: Some(paws_tool),
            default_launch_url: DEFAULT_PAWS_LAUNCH_URL,
            body_overrides: &[],
            launch_url_modifier: None,
            outcome_score_processor: None,
            outcome_act_modifier: None,
        }
    }
}

const CODEWORKOUT_OVERRIDES: &[(&str, &str)] = &[
    ("lis_person_sourcedid", "mastery_grids"),
    ("custom_course_name", "Introduction to Java Programming"),
    ("custom_course_number", "IS 0017"),
    ("custom_label", "SPLICE"),
    ("custom_term", "spring-2019"),
];

const CTAT_OVERRIDES: &[(&str, &str)] = &[
    ("context_title", "Python Mastery Grids Spring 2019"),
    ("context_label", "Python Mastery Grids Spring 2019"),
    ("lis_person_sourcedid", "{usr}"),
];

const CODELAB_OVERRIDES: &[(&str, &str)] = &[
    // CodeLab requires a fixed course context registered on their side.
    ("context_id", "S3294476"),
    ("context_title", "Mastery Grids"),
    ("context_label", "MasteryGrids"),
    ("lis_person_sourcedid", "mastery_grids"),
];

const DBQA_OVERRIDES: &[(&str, &str)] = &[
    ("resource_link_id", "mg_{grp}_{sub}"),
    ("resource_link_title", "mg_{grp}_{sub}"),
    ("resource_link_description", "mg_{grp}_{sub}"),
    ("context_id", "mg_{grp}"),
    ("context_title", "Mastery Grids {grp}"),
    ("context_label", "MasteryGrids {grp}"),
    ("lis_person_sourcedid", "mastery_grids_{usr}"),
];

const CODEOCEAN_OVERRIDES: &[(&str, &str)] = &[
    ("custom_locale", "en"),
    ("custom_course", "splice-live-catalog"),
    ("custom_token", "{sub}"),
    ("lis_person_sourcedid", "mastery_grids"),
];

const OPENDSA_OVERRIDES: &[(&str, &str)] = &[
    ("custom_ex_short_name", "{sub}"),
    // Literal empty JSON object, not a placeholder.
    ("custom_ex_settings", "{}"),
    ("lis_person_sourcedid", "mastery_grids"),
];

fn spec(id: ToolId) -> ToolSpec {
    match id {
        ToolId::PawsCodeocean => ToolSpec::mediated("54", "codeocean", "codeocean"),
        ToolId::PawsCtat => ToolSpec::mediated("50", "ctat", "ctat"),
        ToolId::PawsCodecheck => ToolSpec::mediated("56", "codecheck", "codecheck"),
        ToolId::Codecheck => {
            ToolSpec::direct("56", "codecheck", "https://codecheck.io/lti", &[])
        }
        ToolId::Codeworkout => ToolSpec::direct(
            "49",
            "codeworkout",
            "https://codeworkout.cs.vt.edu/lti/launch",
            CODEWORKOUT_OVERRIDES,
        ),
        ToolId::Ctat => {
            let mut tool = ToolSpec::direct(
                "50",
                "ctat",
                "https://preview.ctat.cs.cmu.edu/run_lti_problem_set/ProgramCompFinal_ItgtModel_English",
                CTAT_OVERRIDES,
            );
            tool.launch_url_modifier = Some(LaunchUrlModifier::CtatProblemSet);
            tool.outcome_score_processor = Some(ScoreProcessor::CtatBinary);
            tool
        }
        ToolId::Codelab => ToolSpec::direct(
            "52",
            "codelab",
            "https://codelab.turingscraft.com/codelab/lti/launch",
            CODELAB_OVERRIDES,
        ),
        ToolId::Dbqa => {
            let mut tool = ToolSpec::direct(
                "53",
                "dbqa",
                "https://codesmell.org/dbqa/lti/1.1/launch",
                DBQA_OVERRIDES,
            );
            tool.launch_url_modifier = Some(LaunchUrlModifier::DbqaQueryType);
            tool.outcome_score_processor = Some(ScoreProcessor::DbqaSuffix);
            tool.outcome_act_modifier = Some(ActModifier::DbqaSuffix);
            tool
        }
        ToolId::Codeocean => ToolSpec::direct(
            "54",
            "codeocean",
            "https://codeocean.openhpi.de/lti/launch",
            CODEOCEAN_OVERRIDES,
        ),
        ToolId::OpendsaProblems => {
            let mut tool = ToolSpec::direct(
                "60",
                "opendsa_problems",
                "https://opendsa-server.cs.vt.edu/lti/launch",
                OPENDSA_OVERRIDES,
            );
            tool.launch_url_modifier = Some(LaunchUrlModifier::OpendsaExercise);
            tool
        }
        ToolId::OpendsaSlideshows => {
            let mut tool = ToolSpec::direct(
                "61",
                "opendsa_slideshows",
                "https://opendsa-server.cs.vt.edu/lti/launch",
                OPENDSA_OVERRIDES,
            );
            tool.launch_url_modifier = Some(LaunchUrlModifier::OpendsaExercise);
            tool
        }
    }
}

/// Process-wide tool configuration, loaded once at startup and shared
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<ToolId, ToolConfig>,
}

impl ToolRegistry {
    /// Loads every tool's credentials from the process environment.
    ///
    /// Direct tools read `{TOOL}_KEY` / `{TOOL}_SECRET` / `{TOOL}_LAUNCH`;
    /// mediated tools share `PAWS_LTI_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a registry from an explicit variable lookup. Tests use this so
    /// they never touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut tools = HashMap::with_capacity(ToolId::ALL.len());
        for id in ToolId::ALL {
            let spec = spec(id);
            let prefix = id.env_prefix();

            let (consumer_key, consumer_secret, launch_url) = if spec.is_paws_proxy {
                let url = lookup("PAWS_LTI_URL")
                    .unwrap_or_else(|| spec.default_launch_url.to_string());
                (String::new(), String::new(), url)
            } else {
                (
                    lookup(&format!("{prefix}_KEY")).unwrap_or_default(),
                    lookup(&format!("{prefix}_SECRET")).unwrap_or_default(),
                    lookup(&format!("{prefix}_LAUNCH"))
                        .unwrap_or_else(|| spec.default_launch_url.to_string()),
                )
            };

            let config = ToolConfig {
                id,
                consumer_key,
                consumer_secret,
                launch_url,
                app_id: spec.app_id,
                act: spec.act,
                is_paws_proxy: spec.is_paws_proxy,
                paws_tool: spec.paws_tool,
                body_overrides: spec.body_overrides,
                launch_url_modifier: spec.launch_url_modifier,
                outcome_score_processor: spec.outcome_score_processor,
                outcome_act_modifier: spec.outcome_act_modifier,
            };
            debug!(tool = %id, configured = config.is_configured(), "registered tool");
            tools.insert(id, config);
        }
        Self { tools }
    }

    pub fn get(&self, id: ToolId) -> Option<&ToolConfig> {
        self.tools.get(&id)
    }

    /// Resolves a wire name to its config; `None` for names outside the
    /// closed tool set.
    pub fn lookup(&self, name: &str) -> Option<&ToolConfig> {
        ToolId::parse(name).and_then(|id| self.get(id))
    }

    pub fn is_configured(&self, id: ToolId) -> bool {
        self.get(id).is_some_and(ToolConfig::is_configured)
    }

    /// Names of launchable tools, in declaration order.
    pub fn list_configured(&self) -> Vec<&'static str> {
        ToolId::ALL
            .into_iter()
            .filter(|id| self.is_configured(*id))
            .map(ToolId::as_str)
            .collect()
    }
}
