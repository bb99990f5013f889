use gazet_common::model::{Level, PlanDefaults};
use gazet_common::sentinel::SentinelRules;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GazetConfig {
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub chrome_bin: Option<String>,
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
    /// WebDriver endpoint; when set the WebDriver backend is used instead of CDP.
    #[serde(default)]
    pub driver_url: Option<String>,
}

/// Everything the cascade needs to know about the target page and its timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    #[serde(default)]
    pub n1_index: usize,
    #[serde(default = "default_n2_index")]
    pub n2_index: usize,
    #[serde(default = "default_n3_index")]
    pub n3_index: usize,
    #[serde(default)]
    pub enable_n3: bool,
    #[serde(default = "default_delay_after_select_ms")]
    pub delay_after_select_ms: u64,
    #[serde(default = "default_wait_after_n1_ms")]
    pub wait_after_n1_ms: u64,
    #[serde(default = "default_wait_after_n2_ms")]
    pub wait_after_n2_ms: u64,
    #[serde(default = "default_per_combo_timeout_ms")]
    pub per_combo_timeout_ms: u64,
    #[serde(default = "default_select_ready_timeout_ms")]
    pub select_ready_timeout_ms: u64,
    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
    #[serde(default = "default_min_real_options")]
    pub min_real_options: usize,
    #[serde(default = "default_settle_after_open_ms")]
    pub settle_after_open_ms: u64,
    /// Only dropdowns inside the first element matching this selector are considered.
    #[serde(default)]
    pub scope_selector: Option<String>,
    #[serde(default)]
    pub extra_sentinel_regex: Option<String>,
    #[serde(default = "default_results_root_selector")]
    pub results_root_selector: String,
    #[serde(default = "default_result_item_selector")]
    pub result_item_selector: String,
    #[serde(default)]
    pub result_link_selector: Option<String>,
    #[serde(default)]
    pub max_items_per_combo: Option<usize>,
    #[serde(default)]
    pub submit_selector: Option<String>,
    #[serde(default = "default_submit_wait_ms")]
    pub submit_wait_ms: u64,
    #[serde(default)]
    pub dynamic_n2_chunk_limit: Option<usize>,
    #[serde(default = "default_dynamic_reuse_cache")]
    pub dynamic_reuse_cache: bool,
    #[serde(default)]
    pub stop_on_error: bool,
    /// Number of level-1 entries explored during map discovery.
    #[serde(default)]
    pub sample_size: Option<usize>,
    #[serde(default)]
    pub limit_combos: Option<usize>,
    #[serde(default)]
    pub combo_retries: u32,
    #[serde(default = "default_reload_per_combo")]
    pub reload_per_combo: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            n1_index: 0,
            n2_index: default_n2_index(),
            n3_index: default_n3_index(),
            enable_n3: false,
            delay_after_select_ms: default_delay_after_select_ms(),
            wait_after_n1_ms: default_wait_after_n1_ms(),
            wait_after_n2_ms: default_wait_after_n2_ms(),
            per_combo_timeout_ms: default_per_combo_timeout_ms(),
            select_ready_timeout_ms: default_select_ready_timeout_ms(),
            ready_poll_ms: default_ready_poll_ms(),
            min_real_options: default_min_real_options(),
            settle_after_open_ms: default_settle_after_open_ms(),
            scope_selector: None,
            extra_sentinel_regex: None,
            results_root_selector: default_results_root_selector(),
            result_item_selector: default_result_item_selector(),
            result_link_selector: None,
            max_items_per_combo: None,
            submit_selector: None,
            submit_wait_ms: default_submit_wait_ms(),
            dynamic_n2_chunk_limit: None,
            dynamic_reuse_cache: default_dynamic_reuse_cache(),
            stop_on_error: false,
            sample_size: None,
            limit_combos: None,
            combo_retries: 0,
            reload_per_combo: default_reload_per_combo(),
            workers: default_workers(),
        }
    }
}

impl CascadeConfig {
    /// Dropdown position (among discovered roots) that drives `level`.
    pub fn index_for(&self, level: Level) -> usize {
        match level {
            Level::N1 => self.n1_index,
            Level::N2 => self.n2_index,
            Level::N3 => self.n3_index,
        }
    }

    /// Copy of this config with the plan's stored defaults applied on top.
    pub fn with_plan_defaults(&self, defaults: &PlanDefaults) -> CascadeConfig {
        let mut cfg = self.clone();
        if let Some(v) = defaults.n1_index {
            cfg.n1_index = v;
        }
        if let Some(v) = defaults.n2_index {
            cfg.n2_index = v;
        }
        if let Some(v) = defaults.n3_index {
            cfg.n3_index = v;
        }
        if let Some(v) = defaults.delay_after_select_ms {
            cfg.delay_after_select_ms = v;
        }
        if let Some(v) = defaults.wait_after_n1_ms {
            cfg.wait_after_n1_ms = v;
        }
        if let Some(v) = defaults.wait_after_n2_ms {
            cfg.wait_after_n2_ms = v;
        }
        cfg
    }

    pub fn sentinel_rules(&self) -> Result<SentinelRules, regex::Error> {
        match self.extra_sentinel_regex.as_deref() {
            Some(p) if !p.trim().is_empty() => SentinelRules::with_pattern(p),
            _ => Ok(SentinelRules::default()),
        }
    }

    pub fn per_combo_timeout(&self) -> Duration {
        Duration::from_millis(self.per_combo_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.select_ready_timeout_ms)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms.max(1))
    }
}

fn default_n2_index() -> usize {
    1
}

fn default_n3_index() -> usize {
    2
}

fn default_delay_after_select_ms() -> u64 {
    500
}

fn default_wait_after_n1_ms() -> u64 {
    800
}

fn default_wait_after_n2_ms() -> u64 {
    500
}

fn default_per_combo_timeout_ms() -> u64 {
    60_000
}

fn default_select_ready_timeout_ms() -> u64 {
    8_000
}

fn default_ready_poll_ms() -> u64 {
    250
}

fn default_min_real_options() -> usize {
    1
}

fn default_settle_after_open_ms() -> u64 {
    300
}

fn default_results_root_selector() -> String {
    "body".to_string()
}

fn default_result_item_selector() -> String {
    "a".to_string()
}

fn default_submit_wait_ms() -> u64 {
    1_500
}

fn default_dynamic_reuse_cache() -> bool {
    true
}

fn default_reload_per_combo() -> bool {
    true
}

fn default_workers() -> usize {
    1
}
