//! Adaptive request timeouts per integration template.
//!
//! Integrations differ wildly in how long their statistics endpoints take:
//! Overseerr answers in milliseconds, a Proxmox cluster listing can take tens
//! of seconds. Each known template carries a [`LatencyClass`]; an explicit
//! per-app timeout always wins over it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Budget used for templates without a known latency profile.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Expected latency profile of an integration's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    Fast,
    Moderate,
    Slow,
    VerySlow,
}

impl LatencyClass {
    pub const fn budget_ms(self) -> u64 {
        match self {
            LatencyClass::Fast => 10_000,
            LatencyClass::Moderate => 15_000,
            LatencyClass::Slow => 20_000,
            LatencyClass::VerySlow => 30_000,
        }
    }
}

const BUILTIN_TEMPLATES: &[(&str, LatencyClass)] = &[
    ("overseerr", LatencyClass::Fast),
    ("jellyseerr", LatencyClass::Fast),
    ("homeassistant", LatencyClass::Fast),
    ("sonarr", LatencyClass::Moderate),
    ("radarr", LatencyClass::Moderate),
    ("lidarr", LatencyClass::Moderate),
    ("readarr", LatencyClass::Moderate),
    ("prowlarr", LatencyClass::Moderate),
    ("plex", LatencyClass::Slow),
    ("jellyfin", LatencyClass::Slow),
    ("tautulli", LatencyClass::Slow),
    ("proxmox", LatencyClass::VerySlow),
    ("truenas", LatencyClass::VerySlow),
    ("unraid", LatencyClass::VerySlow),
];

/// Static table of template latency budgets, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRegistry {
    budgets: HashMap<String, u64>,
}

impl TemplateRegistry {
    /// Registry holding the built-in integration templates.
    pub fn builtin() -> Self {
        let budgets = BUILTIN_TEMPLATES
            .iter()
            .map(|(id, class)| (id.to_string(), class.budget_ms()))
            .collect();
        Self { budgets }
    }

    /// Add or replace template budgets (milliseconds). Zero budgets are ignored.
    pub fn with_overrides(mut self, overrides: &HashMap<String, u64>) -> Self {
        for (template, budget) in overrides {
            if *budget == 0 {
                tracing::warn!(template = %template, "Ignoring zero timeout budget");
                continue;
            }
            self.budgets.insert(template.to_lowercase(), *budget);
        }
        self
    }

    pub fn budget_ms(&self, template_id: &str) -> Option<u64> {
        self.budgets.get(&template_id.to_lowercase()).copied()
    }

    /// Milliseconds to allow one request of `template_id`.
    ///
    /// A positive `configured_override` is returned unchanged; otherwise the
    /// template's budget, or [`DEFAULT_TIMEOUT_MS`] for unknown templates.
    pub fn resolve_timeout(&self, template_id: Option<&str>, configured_override: Option<u64>) -> u64 {
        if let Some(ms) = configured_override.filter(|ms| *ms > 0) {
            return ms;
        }
        template_id
            .and_then(|id| self.budget_ms(id))
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// Known templates sorted by id.
    pub fn templates(&self) -> Vec<(&str, u64)> {
        let mut templates: Vec<_> = self
            .budgets
            .iter()
            .map(|(id, ms)| (id.as_str(), *ms))
            .collect();
        templates.sort_unstable();
        templates
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Resolve against the built-in table only.
pub fn resolve_timeout(template_id: Option<&str>, configured_override: Option<u64>) -> u64 {
    static BUILTIN: OnceLock<TemplateRegistry> = OnceLock::new();
    BUILTIN
        .get_or_init(TemplateRegistry::builtin)
        .resolve_timeout(template_id, configured_override)
}
