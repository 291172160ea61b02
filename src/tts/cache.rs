//! Warm MP3 cache for fixed phrases (greetings, farewells, beeps).
//!
//! Keyed by `md5(sentence)[..8]` exactly as the original agent's cache
//! naming scheme did, so a cache populated by an older run is still valid.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use super::synth::TtsSynth;

pub fn cache_file_name(sentence: &str) -> String {
    let digest = md5::compute(sentence.as_bytes());
    format!("{:x}", digest)[..8].to_string() + ".mp3"
}

pub struct TtsCache {
    dir: PathBuf,
}

impl TtsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, sentence: &str) -> PathBuf {
        self.dir.join(cache_file_name(sentence))
    }

    /// Return cached MP3 bytes for `sentence`, if present on disk.
    pub async fn get(&self, sentence: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(sentence)).await.ok()
    }

    async fn put(&self, sentence: &str, mp3: &[u8]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.path_for(sentence), mp3).await?;
        Ok(())
    }

    /// Render and cache every phrase in `phrases` that isn't already on
    /// disk. Called once at startup for the fixed German phrase sets the
    /// speech agent uses (greetings, hellos, farewells).
    pub async fn warm(&self, synth: &TtsSynth, phrases: &[&str]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        for phrase in phrases {
            let path = self.path_for(phrase);
            if Path::new(&path).exists() {
                continue;
            }
            debug!(phrase, "rendering cache entry");
            match synth.render(phrase).await {
                Ok(mp3) => {
                    if let Err(e) = self.put(phrase, &mp3).await {
                        tracing::warn!(error = %e, phrase, "failed to write tts cache entry");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, phrase, "failed to render tts cache entry");
                }
            }
        }
        info!(count = phrases.len(), dir = %self.dir.display(), "tts cache warm-up complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_file_name_is_eight_hex_chars_plus_extension() {
        let name = cache_file_name("Moin!");
        assert_eq!(name.len(), 12);
        assert!(name.ends_with(".mp3"));
        assert!(name[..8].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cache_file_name_is_deterministic() {
        assert_eq!(cache_file_name("Hallo"), cache_file_name("Hallo"));
        assert_ne!(cache_file_name("Hallo"), cache_file_name("Tschüss"));
    }
}
