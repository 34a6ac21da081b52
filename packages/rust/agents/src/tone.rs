//! Tone analysis of a reference document.
//!
//! The profile is a single heuristic prompt call; results are cached in
//! storage keyed by the reference content hash and model, so re-running
//! against an unchanged reference never re-spends a generation call.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use blogsmith_ai::{GenerationClient, GenerationRequest, extract_json_as};
use blogsmith_shared::{BlogsmithError, Result};
use blogsmith_storage::Storage;

const TONE_SYSTEM_PROMPT: &str = "\
You are a writing analyst. Study the reference document and describe the
author's tone so another writer can imitate it.

IMPORTANT: Respond with ONLY valid JSON, no additional text.

Format:
{
  \"characteristics\": \"overall voice in one or two sentences\",
  \"vocabulary\": \"word choice tendencies\",
  \"patterns\": \"recurring sentence/paragraph patterns\",
  \"style\": \"formality, rhythm, person\"
}";

/// A learned tone profile applied by the Writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneProfile {
    pub characteristics: String,
    pub vocabulary: String,
    pub patterns: String,
    pub style: String,
}

/// Learns a tone profile from a reference document.
pub struct ToneLearner {
    ai: GenerationClient,
}

impl ToneLearner {
    pub fn new(ai: GenerationClient) -> Self {
        Self { ai }
    }

    /// Analyze the reference file, consulting the cache first.
    #[instrument(skip_all, fields(path = %reference_path.display()))]
    pub async fn analyze(
        &self,
        reference_path: &Path,
        cache: Option<&Storage>,
    ) -> Result<ToneProfile> {
        let content = std::fs::read_to_string(reference_path)
            .map_err(|e| BlogsmithError::io(reference_path, e))?;

        if content.trim().is_empty() {
            return Err(BlogsmithError::validation(format!(
                "reference file is empty: {}",
                reference_path.display()
            )));
        }

        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(content.as_bytes());
            hasher.update(b"tone_profile");
            format!("{:x}", hasher.finalize())
        };

        if let Some(storage) = cache {
            match storage.get_tone_profile(&content_hash, self.ai.model()).await {
                Ok(Some(cached)) => match serde_json::from_str::<ToneProfile>(&cached) {
                    Ok(profile) => {
                        info!("tone profile loaded from cache");
                        return Ok(profile);
                    }
                    Err(e) => warn!(error = %e, "cached tone profile invalid, re-analyzing"),
                },
                Ok(None) => {}
                Err(e) => warn!(error = %e, "tone cache read failed"),
            }
        }

        let user = format!("Reference document:\n\n{content}\n\nAnalyze the tone.");
        let response = self
            .ai
            .generate(GenerationRequest::new(TONE_SYSTEM_PROMPT, &user).temperature(0.3))
            .await?;

        let profile: ToneProfile = extract_json_as(&response)?;

        if let Some(storage) = cache {
            let json = serde_json::to_string(&profile).unwrap_or_default();
            if let Err(e) = storage
                .set_tone_profile(&content_hash, self.ai.model(), &json)
                .await
            {
                warn!(error = %e, "tone cache write failed");
            }
        }

        info!("tone profile analyzed");
        Ok(profile)
    }
}
