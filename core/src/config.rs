use crate::{store::SettingsRow, types::Amount};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STATE_SUBLIMIT: Amount = 3_600_000.0;
pub const DEFAULT_MUNICIPAL_SUBLIMIT: Amount = 4_800_000.0;
pub const DEFAULT_WITHHOLDING_RATE: f64 = 0.05;

/// What the batch orchestrator does when one company's crossing fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Abort the whole batch on the first error.
    FailFast,
    /// Record the failure in the summary and move on.
    #[default]
    ContinueOnError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossingConfig {
    /// Registered home municipality. `None` disables the
    /// municipality-mismatch checks.
    #[serde(default)]
    pub home_municipality: Option<String>,
    #[serde(default = "default_state_sublimit")]
    pub state_sublimit: Amount,
    #[serde(default = "default_municipal_sublimit")]
    pub municipal_sublimit: Amount,
    /// Assumed withheld rate when neither the invoice nor its payload says.
    #[serde(default = "default_withholding_rate")]
    pub default_withholding_rate: f64,
    #[serde(default = "default_simplified_regime")]
    pub simplified_regime: String,
    #[serde(default = "default_active_status")]
    pub active_status: String,
    /// Guide tax code that carries withheld tax, summed separately.
    #[serde(default = "default_withholding_tax_code")]
    pub withholding_tax_code: String,
    /// Days past the filing due date after which a filing is reported as
    /// retroactive.
    #[serde(default = "default_late_filing_threshold_days")]
    pub late_filing_threshold_days: i64,
    #[serde(default)]
    pub batch_policy: BatchPolicy,
}

fn default_state_sublimit() -> Amount {
    DEFAULT_STATE_SUBLIMIT
}

fn default_municipal_sublimit() -> Amount {
    DEFAULT_MUNICIPAL_SUBLIMIT
}

fn default_withholding_rate() -> f64 {
    DEFAULT_WITHHOLDING_RATE
}

fn default_simplified_regime() -> String {
    "SIMPLES_NACIONAL".into()
}

fn default_active_status() -> String {
    "ATIVA".into()
}

fn default_withholding_tax_code() -> String {
    "ISS_RETIDO".into()
}

fn default_late_filing_threshold_days() -> i64 {
    90
}

impl Default for CrossingConfig {
    fn default() -> Self {
        Self {
            home_municipality: None,
            state_sublimit: DEFAULT_STATE_SUBLIMIT,
            municipal_sublimit: DEFAULT_MUNICIPAL_SUBLIMIT,
            default_withholding_rate: DEFAULT_WITHHOLDING_RATE,
            simplified_regime: default_simplified_regime(),
            active_status: default_active_status(),
            withholding_tax_code: default_withholding_tax_code(),
            late_filing_threshold_days: default_late_filing_threshold_days(),
            batch_policy: BatchPolicy::default(),
        }
    }
}

impl CrossingConfig {
    /// Load from the data/ directory.
    /// In tests, use CrossingConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/crossing/crossing_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: CrossingConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// In-code configuration used by tests: defaults plus a home
    /// municipality so every check is live.
    pub fn default_test() -> Self {
        Self {
            home_municipality: Some("Campinas".into()),
            ..Self::default()
        }
    }

    /// Overlay the store's global settings record. Unset fields keep the
    /// current values.
    pub fn with_settings(mut self, settings: &SettingsRow) -> Self {
        if let Some(name) = settings
            .municipality_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            self.home_municipality = Some(name.to_string());
        }
        if let Some(v) = settings.state_sublimit.filter(|v| *v > 0.0) {
            self.state_sublimit = v;
        }
        if let Some(v) = settings.municipal_sublimit.filter(|v| *v > 0.0) {
            self.municipal_sublimit = v;
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.state_sublimit <= 0.0 || self.municipal_sublimit <= 0.0 {
            anyhow::bail!("sublimits must be positive");
        }
        if !(0.0..=1.0).contains(&self.default_withholding_rate) {
            anyhow::bail!(
                "default_withholding_rate must be a fraction, got {}",
                self.default_withholding_rate
            );
        }
        if self.late_filing_threshold_days < 0 {
            anyhow::bail!("late_filing_threshold_days must not be negative");
        }
        Ok(())
    }
}
