//! Scripted in-memory page for driving the engine without a browser.
//!
//! The page renders a small form with up to three dependent dropdowns (native
//! `<select>` or ARIA combobox with an optionally virtualized option panel), a
//! submit button and a results container. Element handles stay stable while the
//! logical element survives and go stale on navigation or re-render.

#![allow(dead_code)]

use async_trait::async_trait;
use gazet_engine::model::Level;
use gazet_engine::page::{BackendError, ElementRef, Page, PageFactory};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Honour RUST_LOG while debugging a failing scenario.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Opt {
    pub label: String,
    pub value: String,
}

pub fn opt(label: &str, value: &str) -> Opt {
    Opt {
        label: label.to_string(),
        value: value.to_string(),
    }
}

pub fn opts(pairs: &[(&str, &str)]) -> Vec<Opt> {
    pairs.iter().map(|(l, v)| opt(l, v)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Widget {
    Native,
    /// Combobox whose panel only renders `window` options at a time when set.
    Listbox { window: Option<usize> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub n1: Option<String>,
    pub n2: Option<String>,
    pub n3: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Items(Vec<(String, String)>),
    /// The results script throws.
    Fail(String),
    Panic,
    /// The results never arrive.
    Hang,
}

pub type ResultsFn = Arc<dyn Fn(&Selection) -> Outcome + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Goto(String),
    Select(Level, String),
    Submit,
}

#[derive(Clone)]
pub struct Site {
    pub level1: Vec<Opt>,
    pub level2: HashMap<String, Vec<Opt>>,
    pub level3: HashMap<String, Vec<Opt>>,
    pub widgets: [Widget; 3],
    pub placeholder: Option<String>,
    pub populate_delay: Duration,
    /// Dependent dropdowns are replaced by new elements once populated.
    pub rerender_on_populate: bool,
    pub requires_submit: bool,
    /// Listbox widgets keep the original, hidden `<select>` next to them.
    pub shadow_selects: bool,
    pub fail_navigation: bool,
    pub results: ResultsFn,
}

/// One result per selection, linking to a document named after it.
pub fn default_results() -> ResultsFn {
    Arc::new(|s: &Selection| {
        let name = [&s.n1, &s.n2, &s.n3]
            .iter()
            .filter_map(|v| v.as_deref())
            .collect::<Vec<_>>()
            .join("-");
        Outcome::Items(vec![(
            format!("Resultado {}", name),
            format!("https://example.test/doc/{}", name),
        )])
    })
}

impl Site {
    pub fn new(level1: Vec<Opt>) -> Self {
        Self {
            level1,
            level2: HashMap::new(),
            level3: HashMap::new(),
            widgets: [Widget::Native; 3],
            placeholder: Some("Selecione...".to_string()),
            populate_delay: Duration::from_millis(200),
            rerender_on_populate: false,
            requires_submit: false,
            shadow_selects: false,
            fail_navigation: false,
            results: default_results(),
        }
    }

    pub fn level2(mut self, parent: &str, options: Vec<Opt>) -> Self {
        self.level2.insert(parent.to_string(), options);
        self
    }

    pub fn level3(mut self, parent: &str, options: Vec<Opt>) -> Self {
        self.level3.insert(parent.to_string(), options);
        self
    }

    pub fn widget(mut self, level: Level, widget: Widget) -> Self {
        self.widgets[slot(level)] = widget;
        self
    }

    pub fn results(mut self, f: impl Fn(&Selection) -> Outcome + Send + Sync + 'static) -> Self {
        self.results = Arc::new(f);
        self
    }

    pub fn populate_delay(mut self, delay: Duration) -> Self {
        self.populate_delay = delay;
        self
    }

    pub fn rerender_on_populate(mut self) -> Self {
        self.rerender_on_populate = true;
        self
    }

    pub fn requires_submit(mut self) -> Self {
        self.requires_submit = true;
        self
    }

    pub fn shadow_selects(mut self) -> Self {
        self.shadow_selects = true;
        self
    }

    fn has_level(&self, i: usize) -> bool {
        match i {
            0 => true,
            1 => !self.level2.is_empty(),
            _ => !self.level3.is_empty(),
        }
    }
}

fn slot(level: Level) -> usize {
    usize::from(level.number()) - 1
}

fn level_of(i: usize) -> Level {
    Level::ALL[i]
}

#[derive(Debug, Clone, Default)]
struct LevelState {
    selected: Option<String>,
    open: bool,
    window_start: usize,
    ready_at: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq)]
enum Role {
    Root(usize),
    Opt { level: usize, value: String, index: usize },
    Submit,
    Results,
    Other,
}

#[derive(Debug, Clone)]
struct Node {
    id: u32,
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    parent: Option<usize>,
    role: Role,
}

struct DomBuilder {
    nodes: Vec<Node>,
    ids: HashMap<String, u32>,
    next_id: u32,
    nav: usize,
}

impl DomBuilder {
    fn push(
        &mut self,
        parent: Option<usize>,
        tag: &str,
        key: &str,
        attrs: &[(&str, String)],
        text: &str,
        role: Role,
    ) -> usize {
        let full_key = format!("{}/{}", self.nav, key);
        let id = match self.ids.get(&full_key) {
            Some(id) => *id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.ids.insert(full_key, id);
                id
            }
        };
        self.nodes.push(Node {
            id,
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            text: text.to_string(),
            parent,
            role,
        });
        self.nodes.len() - 1
    }
}

pub struct FakePage {
    site: Site,
    levels: [LevelState; 3],
    submitted: bool,
    results: Option<(Selection, Outcome)>,
    ids: HashMap<String, u32>,
    next_id: u32,
    dom: Vec<Node>,
    navigations: usize,
    log: Arc<Mutex<Vec<Event>>>,
    closed: bool,
    /// Times each dropdown was replaced by a fresh element.
    generations: [u32; 3],
    replace_after_query: Option<usize>,
    releases: usize,
}

impl FakePage {
    pub fn new(site: Site) -> Self {
        let mut page = Self {
            site,
            levels: Default::default(),
            submitted: false,
            results: None,
            ids: HashMap::new(),
            next_id: 1,
            dom: Vec::new(),
            navigations: 0,
            log: Arc::new(Mutex::new(Vec::new())),
            closed: false,
            generations: [0; 3],
            replace_after_query: None,
            releases: 0,
        };
        page.reset();
        page
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    pub fn selections_of(&self, level: Level, value: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Select(l, v) if *l == level && v == value))
            .count()
    }

    /// Replace the dropdown at `level` right after the next `query_all`
    /// returns, so handles from that query go stale.
    pub fn replace_after_next_query(&mut self, level: Level) {
        self.replace_after_query = Some(slot(level));
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    pub fn navigations(&self) -> usize {
        self.navigations
    }

    pub fn selection(&self) -> Selection {
        Selection {
            n1: self.levels[0].selected.clone(),
            n2: self.levels[1].selected.clone(),
            n3: self.levels[2].selected.clone(),
        }
    }

    fn reset(&mut self) {
        self.levels = Default::default();
        self.levels[0].ready_at = Some(Instant::now());
        self.submitted = false;
        self.results = None;
    }

    fn real_options(&self, i: usize) -> Vec<Opt> {
        let parent = match i {
            0 => return self.site.level1.clone(),
            _ => self.levels[i - 1].selected.as_deref(),
        };
        let table = if i == 1 { &self.site.level2 } else { &self.site.level3 };
        parent
            .and_then(|p| table.get(p))
            .cloned()
            .unwrap_or_default()
    }

    fn populated(&self, i: usize) -> bool {
        self.levels[i]
            .ready_at
            .is_some_and(|t| Instant::now() >= t)
    }

    fn shown_options(&self, i: usize) -> Vec<Opt> {
        let mut shown: Vec<Opt> = self
            .site
            .placeholder
            .iter()
            .map(|p| opt(p, ""))
            .collect();
        if self.populated(i) {
            shown.extend(self.real_options(i));
        }
        shown
    }

    fn window(&self, i: usize, len: usize) -> (usize, usize) {
        let w = match self.site.widgets[i] {
            Widget::Listbox { window: Some(w) } => w.max(1),
            _ => len,
        };
        let start = self.levels[i].window_start.min(len.saturating_sub(w));
        (start, (start + w).min(len))
    }

    fn results_visible(&self) -> bool {
        if self.site.requires_submit {
            self.submitted
        } else {
            self.levels[0].selected.is_some()
        }
    }

    fn rebuild(&mut self) {
        let mut b = DomBuilder {
            nodes: Vec::new(),
            ids: std::mem::take(&mut self.ids),
            next_id: self.next_id,
            nav: self.navigations,
        };
        let body = b.push(None, "body", "body", &[], "", Role::Other);
        let form = b.push(
            Some(body),
            "form",
            "form",
            &[("id", "form".to_string())],
            "",
            Role::Other,
        );
        for i in 0..3 {
            if self.site.has_level(i) {
                self.build_level(&mut b, form, i);
            }
        }
        b.push(
            Some(form),
            "button",
            "submit",
            &[("id", "buscar".to_string()), ("type", "button".to_string())],
            "Buscar",
            Role::Submit,
        );
        if self.results_visible() {
            let container = b.push(
                Some(body),
                "div",
                "results",
                &[("id", "results".to_string())],
                "",
                Role::Results,
            );
            if let Some((selection, Outcome::Items(items))) = &self.results
                && *selection == self.selection()
            {
                for (n, (text, href)) in items.iter().enumerate() {
                    let item = b.push(
                        Some(container),
                        "li",
                        &format!("item{}:{}", n, href),
                        &[("class", "item".to_string())],
                        "",
                        Role::Other,
                    );
                    b.push(
                        Some(item),
                        "a",
                        &format!("item{}:{}/a", n, href),
                        &[("href", href.clone())],
                        text,
                        Role::Other,
                    );
                }
            }
        }
        self.ids = b.ids;
        self.next_id = b.next_id;
        self.dom = b.nodes;
    }

    fn build_level(&self, b: &mut DomBuilder, form: usize, i: usize) {
        let populated = self.populated(i);
        let key = format!(
            "n{}{}#{}",
            i + 1,
            if self.site.rerender_on_populate && populated { "p" } else { "" },
            self.generations[i]
        );
        let shown = self.shown_options(i);
        let state = &self.levels[i];
        let selected = state.selected.clone().unwrap_or_default();
        let name = format!("n{}", i + 1);

        let native = |b: &mut DomBuilder, key: &str, mut attrs: Vec<(&'static str, String)>, role: bool| {
            if !populated {
                attrs.push(("disabled", String::new()));
            }
            let select = b.push(
                Some(form),
                "select",
                key,
                &attrs,
                "",
                if role { Role::Root(i) } else { Role::Other },
            );
            for (n, o) in shown.iter().enumerate() {
                let mut oattrs = vec![("value", o.value.clone())];
                if o.value == selected {
                    oattrs.push(("selected", String::new()));
                }
                b.push(
                    Some(select),
                    "option",
                    &format!("{}/o{}:{}", key, n, o.value),
                    &oattrs,
                    &o.label,
                    if role {
                        Role::Opt {
                            level: i,
                            value: o.value.clone(),
                            index: n,
                        }
                    } else {
                        Role::Other
                    },
                );
            }
        };

        match self.site.widgets[i] {
            Widget::Native => {
                native(
                    b,
                    &key,
                    vec![("id", name.clone()), ("name", name.clone())],
                    true,
                );
            }
            Widget::Listbox { .. } => {
                if self.site.shadow_selects {
                    native(
                        b,
                        &format!("{}/shadow", key),
                        vec![
                            ("name", name.clone()),
                            ("class", "select2-hidden-accessible".to_string()),
                            ("aria-hidden", "true".to_string()),
                        ],
                        false,
                    );
                }
                let label = shown
                    .iter()
                    .find(|o| o.value == selected)
                    .map(|o| o.label.clone())
                    .unwrap_or_default();
                let panel_id = format!("lb{}", i + 1);
                let mut attrs = vec![
                    ("role", "combobox".to_string()),
                    ("aria-expanded", state.open.to_string()),
                    ("aria-controls", panel_id.clone()),
                ];
                if !populated {
                    attrs.push(("aria-disabled", "true".to_string()));
                }
                b.push(Some(form), "div", &key, &attrs, &label, Role::Root(i));
                if state.open {
                    let panel = b.push(
                        Some(form),
                        "ul",
                        &format!("{}/panel", key),
                        &[("id", panel_id.clone()), ("role", "listbox".to_string())],
                        "",
                        Role::Other,
                    );
                    let (start, end) = self.window(i, shown.len());
                    for (n, o) in shown.iter().enumerate().take(end).skip(start) {
                        b.push(
                            Some(panel),
                            "li",
                            &format!("{}/panel/o{}", key, n),
                            &[
                                ("role", "option".to_string()),
                                ("id", format!("{}-o{}", panel_id, n)),
                                ("data-value", o.value.clone()),
                            ],
                            &o.label,
                            Role::Opt {
                                level: i,
                                value: o.value.clone(),
                                index: n,
                            },
                        );
                    }
                }
            }
        }
    }

    fn index_of(&self, element: ElementRef) -> Result<usize, BackendError> {
        match self.dom.iter().position(|n| n.id == element.0) {
            Some(idx) => Ok(idx),
            None if element.0 < self.next_id => Err(BackendError::ElementStale { id: element.0 }),
            None => Err(BackendError::ElementNotFound { id: element.0 }),
        }
    }

    fn node(&mut self, element: ElementRef) -> Result<Node, BackendError> {
        self.rebuild();
        let idx = self.index_of(element)?;
        Ok(self.dom[idx].clone())
    }

    fn set_selection(&mut self, i: usize, value: &str) {
        self.levels[i].selected = Some(value.to_string()).filter(|v| !v.is_empty());
        self.levels[i].open = false;
        for d in (i + 1)..3 {
            self.levels[d] = LevelState::default();
        }
        if i + 1 < 3 && !value.is_empty() {
            self.levels[i + 1].ready_at = Some(Instant::now() + self.site.populate_delay);
        }
        self.submitted = false;
        self.results = None;
        self.log
            .lock()
            .unwrap()
            .push(Event::Select(level_of(i), value.to_string()));
    }

    async fn evaluate_results(&mut self) -> Result<(), BackendError> {
        let selection = self.selection();
        let outcome = match &self.results {
            Some((s, o)) if *s == selection => o.clone(),
            _ => {
                let o = (self.site.results)(&selection);
                self.results = Some((selection, o.clone()));
                o
            }
        };
        match outcome {
            Outcome::Items(_) => Ok(()),
            Outcome::Fail(msg) => Err(BackendError::ScriptError(msg)),
            Outcome::Panic => panic!("results renderer crashed"),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    fn is_descendant(&self, mut idx: usize, ancestor: usize) -> bool {
        while let Some(p) = self.dom[idx].parent {
            if p == ancestor {
                return true;
            }
            idx = p;
        }
        false
    }

    fn matches(&self, idx: usize, complex: &[Compound]) -> bool {
        let Some((last, rest)) = complex.split_last() else {
            return false;
        };
        if !last.matches(&self.dom[idx]) {
            return false;
        }
        let mut cursor = self.dom[idx].parent;
        for compound in rest.iter().rev() {
            loop {
                let Some(p) = cursor else {
                    return false;
                };
                cursor = self.dom[p].parent;
                if compound.matches(&self.dom[p]) {
                    break;
                }
            }
        }
        true
    }

    fn text_of(&self, idx: usize) -> String {
        let mut out = self.dom[idx].text.clone();
        for child in 0..self.dom.len() {
            if self.dom[child].parent == Some(idx) {
                out.push_str(&self.text_of(child));
            }
        }
        out
    }
}

#[async_trait]
impl Page for FakePage {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.closed = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.closed = true;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        !self.closed
    }

    async fn release_handles(&mut self) {
        self.releases += 1;
    }

    async fn goto(&mut self, url: &str) -> Result<(), BackendError> {
        if self.site.fail_navigation {
            return Err(BackendError::Navigation(format!("{} unreachable", url)));
        }
        self.navigations += 1;
        self.reset();
        self.log.lock().unwrap().push(Event::Goto(url.to_string()));
        Ok(())
    }

    async fn query_all(
        &mut self,
        scope: Option<ElementRef>,
        selector: &str,
    ) -> Result<Vec<ElementRef>, BackendError> {
        let complexes = parse_selector_list(selector).ok_or_else(|| BackendError::SelectorInvalid {
            selector: selector.to_string(),
        })?;
        self.rebuild();
        if let Some(scope) = scope
            && self.dom[self.index_of(scope)?].role == Role::Results
        {
            self.evaluate_results().await?;
            self.rebuild();
        }
        let scope_idx = match scope {
            Some(scope) => Some(self.index_of(scope)?),
            None => None,
        };
        let found = (0..self.dom.len())
            .filter(|&idx| match scope_idx {
                Some(s) => self.is_descendant(idx, s),
                None => true,
            })
            .filter(|&idx| complexes.iter().any(|c| self.matches(idx, c)))
            .map(|idx| ElementRef(self.dom[idx].id))
            .collect();
        if let Some(i) = self.replace_after_query.take() {
            self.generations[i] += 1;
        }
        Ok(found)
    }

    async fn tag_name(&mut self, element: ElementRef) -> Result<String, BackendError> {
        Ok(self.node(element)?.tag)
    }

    async fn attribute(
        &mut self,
        element: ElementRef,
        name: &str,
    ) -> Result<Option<String>, BackendError> {
        Ok(self.node(element)?.attrs.get(name).cloned())
    }

    async fn text(&mut self, element: ElementRef) -> Result<String, BackendError> {
        self.rebuild();
        let idx = self.index_of(element)?;
        Ok(self.text_of(idx))
    }

    async fn click(&mut self, element: ElementRef) -> Result<(), BackendError> {
        let node = self.node(element)?;
        match node.role {
            Role::Root(i) if matches!(self.site.widgets[i], Widget::Listbox { .. }) => {
                if self.populated(i) {
                    self.levels[i].open = !self.levels[i].open;
                }
            }
            Role::Opt { level, value, .. }
                if matches!(self.site.widgets[level], Widget::Listbox { .. }) =>
            {
                self.set_selection(level, &value);
            }
            Role::Submit => {
                self.submitted = true;
                self.results = None;
                self.log.lock().unwrap().push(Event::Submit);
            }
            _ => {}
        }
        Ok(())
    }

    async fn select_value(
        &mut self,
        element: ElementRef,
        value: &str,
    ) -> Result<bool, BackendError> {
        let node = self.node(element)?;
        let Role::Root(i) = node.role else {
            return Err(BackendError::ScriptError("not a <select>".into()));
        };
        if self.shown_options(i).iter().any(|o| o.value == value) {
            self.set_selection(i, value);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn press_key(&mut self, element: ElementRef, key: &str) -> Result<(), BackendError> {
        let node = self.node(element)?;
        if let Role::Root(i) = node.role {
            match key {
                "End" => self.levels[i].window_start = usize::MAX,
                "Home" => self.levels[i].window_start = 0,
                "Escape" => self.levels[i].open = false,
                _ => {}
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, element: ElementRef) -> Result<(), BackendError> {
        let node = self.node(element)?;
        if let Role::Opt { level, index, .. } = node.role
            && let Widget::Listbox { window: Some(w) } = self.site.widgets[level]
        {
            let len = self.shown_options(level).len();
            let (start, end) = self.window(level, len);
            if index + 1 == end {
                let step = (w / 2).max(1);
                self.levels[level].window_start = (start + step).min(len.saturating_sub(w));
            }
        }
        Ok(())
    }

    async fn element_path(&mut self, element: ElementRef) -> Result<String, BackendError> {
        self.rebuild();
        let mut idx = self.index_of(element)?;
        let mut parts = Vec::new();
        loop {
            let node = &self.dom[idx];
            let Some(parent) = node.parent else {
                parts.push(node.tag.clone());
                break;
            };
            let nth = (0..=idx)
                .filter(|&s| self.dom[s].parent == Some(parent) && self.dom[s].tag == node.tag)
                .count();
            parts.push(format!("{}:nth-of-type({})", node.tag, nth));
            idx = parent;
        }
        parts.reverse();
        Ok(parts.join(">"))
    }
}

/// Hands out independent fake pages, one per worker.
pub struct FakeFactory {
    pub site: Site,
    pub fail_workers: Vec<usize>,
    /// Workers whose page opens but cannot load any URL.
    pub offline_workers: Vec<usize>,
    pub opened: Arc<Mutex<Vec<usize>>>,
}

impl FakeFactory {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            fail_workers: Vec::new(),
            offline_workers: Vec::new(),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl PageFactory for FakeFactory {
    async fn open_isolated(&self, worker: usize) -> Result<Box<dyn Page>, BackendError> {
        if self.fail_workers.contains(&worker) {
            return Err(BackendError::ConnectionLost);
        }
        self.opened.lock().unwrap().push(worker);
        let mut site = self.site.clone();
        site.fail_navigation |= self.offline_workers.contains(&worker);
        let mut page = FakePage::new(site);
        page.launch().await?;
        Ok(Box::new(page))
    }
}

// Minimal CSS: compound selectors (tag, #id, .class, [attr], [attr='v'],
// [attr*='v']) joined by descendant combinators, in comma-separated lists.

#[derive(Debug, Clone)]
enum Cond {
    Id(String),
    Class(String),
    Has(String),
    Eq(String, String),
    Contains(String, String),
}

#[derive(Debug, Clone)]
struct Compound {
    tag: Option<String>,
    conds: Vec<Cond>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag
            && tag != "*"
            && !tag.eq_ignore_ascii_case(&node.tag)
        {
            return false;
        }
        self.conds.iter().all(|c| match c {
            Cond::Id(id) => node.attrs.get("id") == Some(id),
            Cond::Class(class) => node
                .attrs
                .get("class")
                .is_some_and(|v| v.split_whitespace().any(|c| c == class)),
            Cond::Has(name) => node.attrs.contains_key(name),
            Cond::Eq(name, value) => node.attrs.get(name) == Some(value),
            Cond::Contains(name, value) => node.attrs.get(name).is_some_and(|v| v.contains(value.as_str())),
        })
    }
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches(|c| c == '\'' || c == '"').replace("\\'", "'")
}

fn parse_compound(text: &str) -> Option<Compound> {
    let mut chars = text.chars().peekable();
    let mut tag = String::new();
    while let Some(&c) = chars.peek() {
        if is_ident(c) || c == '*' {
            tag.push(c);
            chars.next();
        } else {
            break;
        }
    }
    let mut conds = Vec::new();
    while let Some(c) = chars.next() {
        match c {
            '#' | '.' => {
                let mut ident = String::new();
                while let Some(&n) = chars.peek() {
                    if !is_ident(n) {
                        break;
                    }
                    ident.push(n);
                    chars.next();
                }
                if ident.is_empty() {
                    return None;
                }
                conds.push(if c == '#' {
                    Cond::Id(ident)
                } else {
                    Cond::Class(ident)
                });
            }
            '[' => {
                let mut inner = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(n);
                }
                if !closed {
                    return None;
                }
                if let Some((name, value)) = inner.split_once("*=") {
                    conds.push(Cond::Contains(name.trim().to_string(), unquote(value)));
                } else if let Some((name, value)) = inner.split_once('=') {
                    conds.push(Cond::Eq(name.trim().to_string(), unquote(value)));
                } else {
                    conds.push(Cond::Has(inner.trim().to_string()));
                }
            }
            _ => return None,
        }
    }
    Some(Compound {
        tag: Some(tag).filter(|t| !t.is_empty()),
        conds,
    })
}

fn parse_selector_list(selector: &str) -> Option<Vec<Vec<Compound>>> {
    let mut list = Vec::new();
    for complex in selector.split(',') {
        let compounds = complex
            .split_whitespace()
            .map(parse_compound)
            .collect::<Option<Vec<_>>>()?;
        if compounds.is_empty() {
            return None;
        }
        list.push(compounds);
    }
    Some(list)
}

/// Engine config tuned for the fake page: short waits, explicit result selectors.
pub fn fast_config() -> gazet_engine::config::CascadeConfig {
    gazet_engine::config::CascadeConfig {
        delay_after_select_ms: 10,
        wait_after_n1_ms: 10,
        wait_after_n2_ms: 10,
        settle_after_open_ms: 10,
        submit_wait_ms: 10,
        select_ready_timeout_ms: 1_000,
        ready_poll_ms: 50,
        per_combo_timeout_ms: 10_000,
        results_root_selector: "#results".to_string(),
        result_item_selector: "li.item".to_string(),
        reload_per_combo: false,
        ..Default::default()
    }
}
