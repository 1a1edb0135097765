use crate::source::clock_seed;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SeedMode {
    /// Reproducible corpora.
    Fixed(u64),
    /// Exploratory runs, seeded from the realtime clock.
    #[default]
    Clock,
}

impl SeedMode {
    pub fn resolve(&self) -> u64 {
        match self {
            SeedMode::Fixed(seed) => *seed,
            SeedMode::Clock => clock_seed(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct HarnessSettings {
    #[serde(default = "default_max_run_bytes")]
    pub max_run_bytes: usize,
    #[serde(default = "default_max_accepted_runs")]
    pub max_accepted_runs: u64,
    #[serde(default)]
    pub seed: SeedMode,
}

pub fn default_max_run_bytes() -> usize {
    65_536
}

pub fn default_max_accepted_runs() -> u64 {
    10_000
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            max_run_bytes: default_max_run_bytes(),
            max_accepted_runs: default_max_accepted_runs(),
            seed: SeedMode::default(),
        }
    }
}

impl HarnessSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_run_bytes == 0 {
            return Err("max-run-bytes must be greater than zero".to_string());
        }
        if self.max_accepted_runs == 0 {
            return Err("max-accepted-runs must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("./vectors")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct VectraceConfig {
    #[serde(default)]
    pub harness: HarnessSettings,
    #[serde(default)]
    pub output: OutputConfig,
}

impl VectraceConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        Self::from_toml_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = VectraceConfig::from_toml_str("").unwrap();
        assert_eq!(config.harness.max_run_bytes, default_max_run_bytes());
        assert_eq!(config.harness.max_accepted_runs, default_max_accepted_runs());
        assert_eq!(config.harness.seed, SeedMode::Clock);
        assert_eq!(config.output.dir, default_output_dir());
    }

    #[test]
    fn full_document_is_parsed() {
        let config = VectraceConfig::from_toml_str(
            r#"
            [harness]
            max-run-bytes = 128
            max-accepted-runs = 3
            seed = { fixed = 1618033988 }

            [output]
            dir = "/tmp/vectors"
            "#,
        )
        .unwrap();
        assert_eq!(config.harness.max_run_bytes, 128);
        assert_eq!(config.harness.max_accepted_runs, 3);
        assert_eq!(config.harness.seed, SeedMode::Fixed(1618033988));
        assert_eq!(config.output.dir, PathBuf::from("/tmp/vectors"));
    }

    #[test]
    fn clock_seed_is_spelled_as_a_string() {
        let config = VectraceConfig::from_toml_str("[harness]\nseed = \"clock\"\n").unwrap();
        assert_eq!(config.harness.seed, SeedMode::Clock);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = VectraceConfig::from_toml_str("[harness]\nthreads = 4\n");
        assert!(result.is_err(), "deny_unknown_fields should reject 'threads'");
    }

    #[test]
    fn zero_bounds_fail_validation() {
        let mut settings = HarnessSettings::default();
        assert!(settings.validate().is_ok());

        settings.max_run_bytes = 0;
        assert!(settings.validate().unwrap_err().contains("max-run-bytes"));

        settings.max_run_bytes = 16;
        settings.max_accepted_runs = 0;
        assert!(settings.validate().unwrap_err().contains("max-accepted-runs"));
    }

    #[test]
    fn load_from_file_reads_and_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectrace.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[harness]\nmax-accepted-runs = 9").unwrap();

        let config = VectraceConfig::load_from_file(&path).unwrap();
        assert_eq!(config.harness.max_accepted_runs, 9);

        let missing = dir.path().join("missing.toml");
        let err = VectraceConfig::load_from_file(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
