use gazet_common::combos::{build_dynamic_n2, generate_cartesian};
use gazet_common::filter::{FilterError, LevelFilter};
use gazet_common::model::{Combo, DropdownMap, DropdownOption, Plan, PlanDefaults};
use tracing::{debug, info};

/// What to keep from a discovered map and how to shape the plan.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    pub data: Option<String>,
    pub secao_default: Option<String>,
    pub defaults: PlanDefaults,
    pub n1: LevelFilter,
    pub n2: LevelFilter,
    pub n3: LevelFilter,
    pub max_combos: Option<usize>,
    pub dynamic_n2: bool,
}

fn keep(options: &[DropdownOption], filter: &LevelFilter) -> Result<Vec<DropdownOption>, FilterError> {
    filter.to_filter().with_token_fallback().apply(options)
}

/// Build a plan from a discovery map.
///
/// Level 2 depends on level 1, so the product is taken per level-1 entry using
/// the level-2 options recorded under it. An entry whose level 2 existed but was
/// filtered down to nothing is left out; an entry that never had a level 2 runs
/// as a level-1-only combo. Level 3 pairs only with the level-2 option it was
/// recorded under.
pub fn build_plan_from_map(map: &DropdownMap, request: PlanRequest) -> Result<Plan, FilterError> {
    let firsts: Vec<DropdownOption> = map.level1.iter().map(|e| e.option.clone()).collect();
    let kept1 = keep(&firsts, &request.n1)?;

    let mut defaults = request.defaults;
    if defaults.url.is_none() && !map.url.is_empty() {
        defaults.url = Some(map.url.clone());
    }

    let combos = if request.dynamic_n2 {
        if !request.n2.is_empty() {
            defaults.n2_filter = Some(request.n2.clone());
        }
        build_dynamic_n2(&kept1, request.max_combos)
    } else {
        let cap = request.max_combos.unwrap_or(usize::MAX);
        let mut combos: Vec<Combo> = Vec::new();
        for option in &kept1 {
            if combos.len() >= cap {
                break;
            }
            let Some(entry) = map.level1.iter().find(|e| e.option == *option) else {
                continue;
            };
            let level2 = keep(&entry.level2, &request.n2)?;
            if level2.is_empty() && !entry.level2.is_empty() {
                debug!("No level-2 option of '{}' passes the filter", option.text);
                continue;
            }
            if level2.is_empty() {
                combos.extend(generate_cartesian(
                    std::slice::from_ref(option),
                    None,
                    None,
                    Some(cap - combos.len()),
                ));
                continue;
            }
            for second in &level2 {
                if combos.len() >= cap {
                    break;
                }
                let level3 = match entry.level3.get(second.key()) {
                    Some(recorded) => keep(recorded, &request.n3)?,
                    None => Vec::new(),
                };
                combos.extend(generate_cartesian(
                    std::slice::from_ref(option),
                    Some(std::slice::from_ref(second)),
                    Some(level3.as_slice()),
                    Some(cap - combos.len()),
                ));
            }
        }
        combos
    };

    info!(
        "Plan with {} combo(s){}",
        combos.len(),
        if request.dynamic_n2 { " (dynamic level 2)" } else { "" }
    );

    let mut builder = Plan::builder()
        .defaults(defaults)
        .combos(combos)
        .dynamic_n2(request.dynamic_n2);
    if let Some(data) = request.data {
        builder = builder.data(data);
    }
    if let Some(secao) = request.secao_default {
        builder = builder.secao_default(secao);
    }
    Ok(builder.build())
}

/// Copy of `plan` keeping only its first `limit` combos.
pub fn limit_plan(plan: &Plan, limit: usize) -> Plan {
    let mut builder = Plan::builder()
        .defaults(plan.defaults().clone())
        .combos(plan.combos().iter().take(limit).cloned().collect())
        .dynamic_n2(plan.is_dynamic_n2());
    if let Some(data) = plan.data() {
        builder = builder.data(data);
    }
    if let Some(secao) = plan.secao_default() {
        builder = builder.secao_default(secao);
    }
    builder.build()
}
