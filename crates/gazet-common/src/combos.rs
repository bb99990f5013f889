//! Combination generation across dependent dropdown levels.

use crate::model::{Combo, DropdownOption};

/// Nested product level1 × level2 (× level3), level 1 outermost.
///
/// With no level-2 options, one combo per level-1 option. Generation stops as soon
/// as `max_combos` entries exist, so a cap yields a prefix of the full product.
pub fn generate_cartesian(
    level1: &[DropdownOption],
    level2: Option<&[DropdownOption]>,
    level3: Option<&[DropdownOption]>,
    max_combos: Option<usize>,
) -> Vec<Combo> {
    let cap = max_combos.unwrap_or(usize::MAX);
    let mut combos = Vec::new();
    if cap == 0 {
        return combos;
    }

    let level2 = level2.filter(|l| !l.is_empty());
    let level3 = level3.filter(|l| !l.is_empty());

    let Some(level2) = level2 else {
        combos.extend(level1.iter().take(cap).map(Combo::level1));
        return combos;
    };

    for o1 in level1 {
        for o2 in level2 {
            let base = Combo::level1(o1).with_level2(o2);
            match level3 {
                Some(level3) => {
                    for o3 in level3 {
                        combos.push(base.clone().with_level3(o3));
                        if combos.len() >= cap {
                            return combos;
                        }
                    }
                }
                None => {
                    combos.push(base);
                    if combos.len() >= cap {
                        return combos;
                    }
                }
            }
        }
    }
    combos
}

/// One combo per level-1 option, level 2 deferred to execution time.
pub fn build_dynamic_n2(level1: &[DropdownOption], max_combos: Option<usize>) -> Vec<Combo> {
    level1
        .iter()
        .take(max_combos.unwrap_or(usize::MAX))
        .map(Combo::dynamic)
        .collect()
}
