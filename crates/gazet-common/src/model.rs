use crate::filter::LevelFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Position in the dependent dropdown chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    N1,
    N2,
    N3,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::N1, Level::N2, Level::N3];

    pub fn number(self) -> u8 {
        match self {
            Level::N1 => 1,
            Level::N2 => 2,
            Level::N3 => 3,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.number())
    }
}

/// Widget family a dropdown root belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    NativeSelect,
    CustomListbox,
}

/// Attributes used only to re-locate an option element when replaying a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionLocator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_index: Option<String>,
}

impl OptionLocator {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.data_id.is_none()
            && self.data_value.is_none()
            && self.data_index.is_none()
    }
}

/// One dropdown entry as read from the page.
///
/// Snapshots go stale once a dependent dropdown repopulates; re-read before reuse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "OptionLocator::is_empty")]
    pub locator: OptionLocator,
}

impl DropdownOption {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            text: text.into(),
            value: if value.is_empty() { None } else { Some(value) },
            locator: OptionLocator::default(),
        }
    }

    /// Option without an underlying value (custom widgets); the label is the key.
    pub fn labelled(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: None,
            locator: OptionLocator::default(),
        }
    }

    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Stable identifier: the value when present, else the label.
    pub fn key(&self) -> &str {
        match self.value.as_deref() {
            Some(v) if !v.trim().is_empty() => v,
            _ => &self.text,
        }
    }

    /// Composite identity used to collapse duplicates produced while a list re-renders.
    pub fn dedup_key(&self) -> String {
        [
            self.locator.id.as_deref().unwrap_or(""),
            self.locator.data_id.as_deref().unwrap_or(""),
            self.text.trim(),
            self.value_str(),
            self.locator.data_value.as_deref().unwrap_or(""),
            self.locator.data_index.as_deref().unwrap_or(""),
        ]
        .join("\u{1f}")
    }
}

/// What a combo asks a level to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelTarget<'a> {
    pub value: &'a str,
    pub label: &'a str,
}

/// One point in the search space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    pub key1: String,
    pub label1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label3: Option<String>,
    #[serde(rename = "_dynamicN2", default, skip_serializing_if = "is_false")]
    pub dynamic_n2: bool,
}

impl Combo {
    pub fn level1(option: &DropdownOption) -> Self {
        Self {
            key1: option.key().to_string(),
            label1: option.text.clone(),
            ..Default::default()
        }
    }

    /// Level-1 combo whose level 2 is discovered at execution time.
    pub fn dynamic(option: &DropdownOption) -> Self {
        Self {
            dynamic_n2: true,
            ..Self::level1(option)
        }
    }

    pub fn with_level2(mut self, option: &DropdownOption) -> Self {
        self.key2 = Some(option.key().to_string());
        self.label2 = Some(option.text.clone());
        self.dynamic_n2 = false;
        self
    }

    pub fn with_level3(mut self, option: &DropdownOption) -> Self {
        self.key3 = Some(option.key().to_string());
        self.label3 = Some(option.text.clone());
        self
    }

    pub fn target(&self, level: Level) -> Option<LevelTarget<'_>> {
        let (key, label) = match level {
            Level::N1 => (Some(&self.key1), Some(&self.label1)),
            Level::N2 => (self.key2.as_ref(), self.label2.as_ref()),
            Level::N3 => (self.key3.as_ref(), self.label3.as_ref()),
        };
        let key = key?;
        Some(LevelTarget {
            value: key,
            label: label.map(String::as_str).unwrap_or(key),
        })
    }

    pub fn describe(&self) -> String {
        let mut parts = vec![self.label1.as_str()];
        if let Some(l2) = &self.label2 {
            parts.push(l2);
        } else if self.dynamic_n2 {
            parts.push("*");
        }
        if let Some(l3) = &self.label3 {
            parts.push(l3);
        }
        parts.join(" / ")
    }
}

/// Shared defaults stored with a plan. Unset fields fall back to the run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n1_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n2_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n3_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after_select_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after_n1_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after_n2_ms: Option<u64>,
    /// Filter applied to level-2 options discovered at execution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n2_filter: Option<LevelFilter>,
    /// Collaborator fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The combination set plus shared defaults. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(rename = "secaoDefault", default, skip_serializing_if = "Option::is_none")]
    secao_default: Option<String>,
    #[serde(default)]
    defaults: PlanDefaults,
    #[serde(default)]
    combos: Vec<Combo>,
    #[serde(rename = "dynamicN2", default)]
    dynamic_n2: bool,
}

impl Plan {
    pub fn builder() -> PlanBuilder {
        PlanBuilder::default()
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn secao_default(&self) -> Option<&str> {
        self.secao_default.as_deref()
    }

    pub fn defaults(&self) -> &PlanDefaults {
        &self.defaults
    }

    pub fn combos(&self) -> &[Combo] {
        &self.combos
    }

    pub fn is_dynamic_n2(&self) -> bool {
        self.dynamic_n2
    }
}

#[derive(Debug, Default)]
pub struct PlanBuilder {
    data: Option<String>,
    secao_default: Option<String>,
    defaults: PlanDefaults,
    combos: Vec<Combo>,
    dynamic_n2: bool,
}

impl PlanBuilder {
    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn secao_default(mut self, secao: impl Into<String>) -> Self {
        self.secao_default = Some(secao.into());
        self
    }

    pub fn defaults(mut self, defaults: PlanDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn combos(mut self, combos: Vec<Combo>) -> Self {
        self.combos = combos;
        self
    }

    pub fn dynamic_n2(mut self, dynamic: bool) -> Self {
        self.dynamic_n2 = dynamic;
        self
    }

    pub fn build(self) -> Plan {
        // A plan is dynamic when asked to be or when any combo defers level 2.
        let dynamic_n2 = self.dynamic_n2 || self.combos.iter().any(|c| c.dynamic_n2);
        Plan {
            data: self.data,
            secao_default: self.secao_default,
            defaults: self.defaults,
            combos: self.combos,
            dynamic_n2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComboStatus {
    Ok,
    Empty,
    Error,
    Timeout,
}

impl fmt::Display for ComboStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComboStatus::Ok => "ok",
            ComboStatus::Empty => "empty",
            ComboStatus::Error => "error",
            ComboStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub text: String,
    pub href: String,
}

/// Outcome of one combo (or one expanded level-2 entry of a dynamic combo).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboResult {
    pub combo: Combo,
    /// Position of the source combo in the plan.
    pub combo_index: usize,
    pub status: ComboStatus,
    #[serde(default)]
    pub items: Vec<ResultItem>,
    pub elapsed_ms: u64,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_attempts() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub ok: usize,
    pub empty: usize,
    pub error: usize,
    pub timeout: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl Summary {
    pub fn record(&mut self, status: ComboStatus) {
        match status {
            ComboStatus::Ok => self.ok += 1,
            ComboStatus::Empty => self.empty += 1,
            ComboStatus::Error => self.error += 1,
            ComboStatus::Timeout => self.timeout += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub summary: Summary,
    pub results: Vec<ComboResult>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cancelled: bool,
}

impl CascadeReport {
    pub fn push(&mut self, result: ComboResult) {
        self.summary.record(result.status);
        self.results.push(result);
    }

    /// Merge per-partition reports into one ordered by source combo position.
    pub fn merge(reports: Vec<CascadeReport>) -> CascadeReport {
        let mut merged = CascadeReport::default();
        let mut elapsed = 0;
        for report in reports {
            elapsed = elapsed.max(report.summary.elapsed_ms);
            merged.summary.skipped += report.summary.skipped;
            merged.cancelled |= report.cancelled;
            for result in report.results {
                merged.push(result);
            }
        }
        merged.results.sort_by_key(|r| r.combo_index);
        merged.summary.elapsed_ms = elapsed;
        merged
    }
}

/// Dropdown tree captured by discovery, input to plan building.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropdownMap {
    pub url: String,
    pub level1: Vec<MapEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    pub option: DropdownOption,
    #[serde(default)]
    pub level2: Vec<DropdownOption>,
    /// Level-3 options keyed by the level-2 option they appeared under.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub level3: BTreeMap<String, Vec<DropdownOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Debug report of what each requested dropdown currently shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectInspection {
    pub selects: Vec<InspectedSelect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectedSelect {
    pub index: usize,
    /// `None` when no dropdown exists at this index.
    pub kind: Option<WidgetKind>,
    pub options: Vec<InspectedOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectedOption {
    pub text: String,
    pub value: String,
}

impl From<&DropdownOption> for InspectedOption {
    fn from(option: &DropdownOption) -> Self {
        Self {
            text: option.text.clone(),
            value: option.value_str().to_string(),
        }
    }
}
