//! Knowledge module routing.
//!
//! Maps free-text request content to the minimal set of reference modules
//! worth loading. Table-driven: a static list of (id, keywords, tier)
//! records evaluated by case-insensitive substring containment, nothing
//! dynamic. The router only shrinks the candidate set; it never ranks
//! within it, and the caller loads the returned set in full.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use task_orchestrator_sdk::{KnowledgeModule, ModuleTier};

/// Static index of knowledge modules, loaded once at process start
#[derive(Debug, Clone)]
pub struct ModuleIndex {
    modules: Vec<KnowledgeModule>,
}

#[derive(Debug, Deserialize)]
struct ModuleFile {
    #[serde(default)]
    modules: Vec<KnowledgeModule>,
}

impl ModuleIndex {
    /// Built-in module table used when no index file is configured
    pub fn builtin() -> Self {
        let module = |id: &str, keywords: &[&str], tier: ModuleTier| KnowledgeModule {
            id: id.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            tier,
            content_ref: format!("modules/{}.md", id),
        };

        Self {
            modules: vec![
                module(
                    "context-recovery",
                    &[
                        "context",
                        "контекст",
                        "auto-compact",
                        "восстанов",
                        "resume",
                        "what was i doing",
                    ],
                    ModuleTier::Critical,
                ),
                module(
                    "task-lifecycle",
                    &["status", "статус", "transition", "review", "lifecycle"],
                    ModuleTier::Critical,
                ),
                module(
                    "prioritization",
                    &[
                        "priority",
                        "приоритет",
                        "critical path",
                        "blocker",
                        "блокир",
                        "dependenc",
                    ],
                    ModuleTier::High,
                ),
                module(
                    "fast-track",
                    &["incident", "инцидент", "urgent", "срочн", "hotfix", "deadline"],
                    ModuleTier::High,
                ),
                module(
                    "batching",
                    &["batch", "пакет", "promote", "parallel"],
                    ModuleTier::Medium,
                ),
            ],
        }
    }

    /// Load the index from a YAML file (`modules:` list)
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read module index {}", path.display()))?;
        let file: ModuleFile =
            serde_yaml::from_str(&content).context("Failed to parse module index YAML")?;
        Ok(Self {
            modules: file.modules,
        })
    }

    pub fn modules(&self) -> &[KnowledgeModule] {
        &self.modules
    }

    /// Route a request to the modules whose keywords occur in it
    ///
    /// Matching is case-insensitive substring containment over the
    /// normalized request text; keywords may be in any language. Zero
    /// matches returns the fixed fallback: every critical-tier module.
    pub fn route(&self, request: &str) -> Vec<&KnowledgeModule> {
        let normalized = request.to_lowercase();

        let matched: Vec<&KnowledgeModule> = self
            .modules
            .iter()
            .filter(|module| {
                module
                    .keywords
                    .iter()
                    .any(|keyword| normalized.contains(&keyword.to_lowercase()))
            })
            .collect();

        if !matched.is_empty() {
            return matched;
        }

        self.modules
            .iter()
            .filter(|module| module.tier == ModuleTier::Critical)
            .collect()
    }
}
