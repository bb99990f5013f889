mod common;

use common::{Event, FakePage, Site, Widget, fast_config, opt, opts};
use gazet_engine::config::CascadeConfig;
use gazet_engine::model::{Level, LevelTarget};
use gazet_engine::selector::{LevelSelector, SelectError, SelectOutcome};

fn site() -> Site {
    Site::new(opts(&[("Ministério A", "a"), ("Ministério B", "b")]))
        .level2("a", opts(&[("Secretaria X", "ax"), ("Secretaria Y", "ay")]))
}

fn target<'a>(value: &'a str, label: &'a str) -> LevelTarget<'a> {
    LevelTarget { value, label }
}

async fn select(
    page: &mut FakePage,
    config: &CascadeConfig,
    level: Level,
    value: &str,
    label: &str,
) -> Result<SelectOutcome, SelectError> {
    let rules = config.sentinel_rules().unwrap();
    LevelSelector::new(config, &rules)
        .select_level(page, level, target(value, label))
        .await
}

#[tokio::test(start_paused = true)]
async fn placeholder_target_is_a_no_op() {
    let mut page = FakePage::new(site());
    let outcome = select(&mut page, &fast_config(), Level::N1, "", "Selecione...")
        .await
        .unwrap();
    assert_eq!(outcome, SelectOutcome::Placeholder);
    assert!(page.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn extra_sentinel_pattern_extends_placeholders() {
    let mut config = fast_config();
    let mut page = FakePage::new(site());
    let err = select(&mut page, &config, Level::N1, "0", "Todas as secretarias")
        .await
        .unwrap_err();
    assert!(matches!(err, SelectError::NoMatch { .. }));

    config.extra_sentinel_regex = Some("^todas as".into());
    let outcome = select(&mut page, &config, Level::N1, "0", "Todas as secretarias")
        .await
        .unwrap();
    assert_eq!(outcome, SelectOutcome::Placeholder);
}

#[tokio::test(start_paused = true)]
async fn value_match_wins_over_label() {
    let mut page = FakePage::new(site());
    let outcome = select(&mut page, &fast_config(), Level::N1, "b", "Ministério A")
        .await
        .unwrap();
    let SelectOutcome::Selected(chosen) = outcome else {
        panic!("expected a selection");
    };
    assert_eq!(chosen.text, "Ministério B");
    assert_eq!(page.selection().n1.as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn label_match_when_value_is_unknown() {
    let mut page = FakePage::new(site());
    select(&mut page, &fast_config(), Level::N1, "stale-id", "ministerio a")
        .await
        .unwrap();
    assert_eq!(page.selection().n1.as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn no_match_reports_available_options() {
    let mut page = FakePage::new(site());
    let err = select(&mut page, &fast_config(), Level::N1, "zz", "Ministério Z")
        .await
        .unwrap_err();
    let SelectError::NoMatch {
        level,
        wanted,
        available,
    } = err
    else {
        panic!("expected NoMatch");
    };
    assert_eq!(level, Level::N1);
    assert_eq!(wanted, "Ministério Z");
    assert!(available.contains(&"Ministério A [a]".to_string()));
    assert!(available.contains(&"Ministério B [b]".to_string()));
    assert!(page.selection().n1.is_none());
}

#[tokio::test(start_paused = true)]
async fn missing_level_is_absent() {
    let mut page = FakePage::new(site());
    let err = select(&mut page, &fast_config(), Level::N3, "p", "Portaria")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SelectError::Absent {
            level: Level::N3,
            index: 2
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn dependent_level_after_population() {
    let mut page = FakePage::new(site());
    let config = fast_config();
    select(&mut page, &config, Level::N1, "a", "Ministério A")
        .await
        .unwrap();
    select(&mut page, &config, Level::N2, "ay", "Secretaria Y")
        .await
        .unwrap();
    assert_eq!(page.selection().n2.as_deref(), Some("ay"));
    assert_eq!(
        page.events(),
        vec![
            Event::Select(Level::N1, "a".into()),
            Event::Select(Level::N2, "ay".into())
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn re_rendered_dropdown_is_located_again() {
    let mut page = FakePage::new(site().rerender_on_populate());
    let config = fast_config();
    select(&mut page, &config, Level::N1, "a", "Ministério A")
        .await
        .unwrap();
    select(&mut page, &config, Level::N2, "ax", "Secretaria X")
        .await
        .unwrap();
    assert_eq!(page.selection().n2.as_deref(), Some("ax"));
}

#[tokio::test(start_paused = true)]
async fn slow_dropdown_is_used_best_effort() {
    let mut config = fast_config();
    config.select_ready_timeout_ms = 100;
    let mut page = FakePage::new(site());
    select(&mut page, &config, Level::N1, "a", "Ministério A")
        .await
        .unwrap();
    // Level 2 is still disabled with only its placeholder: the wait gives up and
    // the requested value is reported missing.
    let err = select(&mut page, &config, Level::N2, "ax", "Secretaria X")
        .await
        .unwrap_err();
    assert!(matches!(err, SelectError::NoMatch { level: Level::N2, .. }));
}

#[tokio::test(start_paused = true)]
async fn listbox_entry_scrolled_out_of_view() {
    let level1 = (1..=20)
        .map(|n| opt(&format!("Unidade {:02}", n), &format!("u{:02}", n)))
        .collect();
    let site = Site::new(level1).widget(Level::N1, Widget::Listbox { window: Some(5) });
    let mut page = FakePage::new(site);

    // Readiness leaves the list scrolled to its end; the target sits at the top.
    select(&mut page, &fast_config(), Level::N1, "u02", "Unidade 02")
        .await
        .unwrap();
    assert_eq!(page.selection().n1.as_deref(), Some("u02"));

    select(&mut page, &fast_config(), Level::N1, "u19", "Unidade 19")
        .await
        .unwrap();
    assert_eq!(page.selection().n1.as_deref(), Some("u19"));
}
