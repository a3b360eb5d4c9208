//! Bridge orchestration
//!
//! `Bridge` is the explicit orchestration context: it owns the content
//! repository, the live session, the session store, the Ollama client and
//! the current mode. Nothing lives in globals, so independent bridges (and
//! tests) never share state.

use crate::backend::OllamaClient;
use crate::content::{ContentItem, ContentRepository};
use crate::evolution::{aggregate_sessions, render_report, suggest};
use crate::modes::Mode;
use crate::prompt::{build_system_prompt, build_user_prompt, SynapseElements};
use crate::session::{mastery_mermaid, Session, SessionStore};
use crate::{BridgeConfig, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Framework pools consulted by specific modes.
const ENGINEER_FORGE: &str = "engineer_forge";
const DISINTEGRATION: &str = "cognitive_disintegration";
const SOCRATIC: &str = "socratic_digital";

/// The ritual orchestrator.
pub struct Bridge {
    config: BridgeConfig,
    repo: ContentRepository,
    session: Session,
    store: SessionStore,
    client: OllamaClient,
    current_mode: Mode,
    cooperation_case: Option<ContentItem>,
}

impl Bridge {
    pub async fn new(config: BridgeConfig) -> Self {
        let repo = ContentRepository::load(&config.base_path, config.seed).await;
        let session = Session::new(&config.model);
        let store = SessionStore::new(config.sessions_dir());
        let client =
            OllamaClient::new(&config.ollama_url, &config.model, config.generate_timeout);
        info!("Bridge initialized with model {} at {}", config.model, config.base_path.display());
        Self {
            config,
            repo,
            session,
            store,
            client,
            current_mode: Mode::Standard,
            cooperation_case: None,
        }
    }

    pub fn current_mode(&self) -> Mode {
        self.current_mode
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn repository(&self) -> &ContentRepository {
        &self.repo
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Switch mode by name. An unknown name is an error and leaves the
    /// current mode untouched.
    pub fn set_mode(&mut self, name: &str) -> Result<Mode> {
        let mode = Mode::from_str(name)?;
        self.current_mode = mode;
        info!("Mode set to {}", mode);
        Ok(mode)
    }

    /// Run one ritual exchange: sample content, compose prompts, call the
    /// backend, record the result. The turn is recorded even when the
    /// backend fails; its error text becomes the response.
    pub async fn pulse(&mut self, user_input: &str) -> String {
        let mode = self.current_mode;
        let koan = self.repo.random_koan();
        let archetype = self.repo.random_archetype();

        // Cooperative mode activates a fresh case on every exchange
        if mode == Mode::Cooperative {
            self.cooperation_case = Some(self.repo.random_cooperation_case());
        }

        let teaching_mode = if mode == Mode::Engineer {
            self.repo
                .random_framework_entry(ENGINEER_FORGE, &["pedagogy", "teaching_modes"])
        } else {
            None
        };

        let synapse = if mode == Mode::FullSynapse {
            Some(SynapseElements {
                koan: koan.clone(),
                archetype: archetype.clone(),
                cooperation: self.repo.random_cooperation_case(),
                bias: self.repo.framework_element(DISINTEGRATION, "disintegrators"),
                socratic: self.repo.framework_element(SOCRATIC, "question_cascades"),
            })
        } else {
            None
        };

        let forge = self.repo.framework(ENGINEER_FORGE).cloned();
        let system_prompt = build_system_prompt(
            mode,
            &archetype,
            forge.as_ref(),
            teaching_mode
                .as_ref()
                .map(|(name, desc)| (name.as_str(), desc.as_str())),
            self.cooperation_case.as_ref(),
        );
        let user_prompt = build_user_prompt(
            mode,
            user_input,
            &koan,
            self.cooperation_case.as_ref(),
            synapse.as_ref(),
        );

        let response = self.client.generate(&user_prompt, Some(&system_prompt)).await;

        self.session
            .record_exchange(mode, koan, &archetype, user_input, response.clone());
        response
    }

    /// Save the current session (JSON + transcript), default path derived
    /// from the session id.
    pub async fn save_session(&self, path: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
        self.store.save(&self.session, path).await
    }

    /// Replace the live session with one loaded from disk.
    pub async fn load_session(&mut self, path: &Path) -> Result<()> {
        self.session = self.store.load(path).await?;
        Ok(())
    }

    pub async fn list_sessions(&self) -> Result<Vec<PathBuf>> {
        self.store.list().await
    }

    pub async fn reload(&mut self) {
        self.repo.reload().await;
    }

    pub async fn load_framework(&mut self, path: &str) -> Result<usize> {
        self.repo.load_framework(path).await
    }

    /// Render the evolution report over persisted sessions; all of them
    /// when no explicit file list is given.
    pub async fn evolution_report(&self, files: Option<&[String]>) -> Result<String> {
        match aggregate_sessions(&self.store, files).await? {
            Some(report) => {
                let suggestions = suggest(&report, &self.repo.archetype_names());
                Ok(render_report(&report, &suggestions))
            }
            None => Ok("[Evolution] No sessions found".to_string()),
        }
    }

    /// Mermaid diagram of the live session's mastery.
    pub fn mastery_diagram(&self) -> String {
        mastery_mermaid(&self.session)
    }

    pub async fn check_backend(&self) -> bool {
        self.client.check().await
    }

    pub async fn list_models(&self) -> Vec<String> {
        self.client.list_models().await
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
