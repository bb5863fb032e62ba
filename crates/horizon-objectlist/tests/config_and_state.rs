//! Host-facing configuration and saved state.

use horizon_objectlist::prelude::*;
use horizon_objectlist::{ListError, ListState, RebuildState};

#[derive(Debug, Clone)]
struct Mail {
    id: u64,
    subject: String,
    sender: Option<String>,
}

impl Model for Mail {
    type Key = u64;
    fn key(&self) -> u64 {
        self.id
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("horizon_objectlist=trace")
        .with_test_writer()
        .try_init();
}

fn mail(id: u64, subject: &str, sender: Option<&str>) -> Mail {
    Mail {
        id,
        subject: subject.to_string(),
        sender: sender.map(str::to_string),
    }
}

fn columns() -> Vec<Column<Mail>> {
    vec![
        Column::new("subject", |m: &Mail| m.subject.clone()).with_width(240),
        Column::partial("sender", |m: &Mail| m.sender.clone().map(Value::from)),
    ]
}

fn inbox() -> Vec<Mail> {
    vec![
        mail(1, "hello", Some("ann")),
        mail(2, "invoice", None),
        mail(3, "agenda", Some("bob")),
        mail(4, "re: hello", Some("ann")),
    ]
}

#[test]
fn test_config_from_toml() {
    init_tracing();
    let config: ListConfig = toml::from_str(
        r#"
        null_group_title = "(unknown)"
        group_item_count_format = "{title} ({n})"
        group_item_count_singular_format = "{title} ({n})"
        selection_mode = "SingleSelection"
        "#,
    )
    .unwrap();
    assert!(config.use_filtering);
    assert_eq!(config.selection_mode, SelectionMode::SingleSelection);

    let mut list = ObjectList::new(columns(), config);
    list.set_objects(inbox(), false).unwrap();
    list.group_by(1, SortOrder::Ascending).unwrap();

    let titles: Vec<&str> = list.projection().groups().iter().map(|g| g.title()).collect();
    assert_eq!(titles, vec!["(unknown) (1)", "ann (2)", "bob (1)"]);

    list.select([1, 3], SelectionFlags::SELECT);
    assert_eq!(list.selection().selected_keys(), &[3]);
}

#[test]
fn test_item_counts_can_be_hidden() {
    let mut list = ObjectList::new(columns(), ListConfig::default().with_item_counts_on_groups(false));
    list.set_objects(inbox(), false).unwrap();
    list.group_by(1, SortOrder::Descending).unwrap();
    let titles: Vec<&str> = list.projection().groups().iter().map(|g| g.title()).collect();
    assert_eq!(titles, vec!["bob", "ann", "{null}"]);
}

#[test]
fn test_strict_mode_surfaces_unresolved_aspects() {
    init_tracing();
    let mut list = ObjectList::new(columns(), ListConfig::default().with_strict(true));
    let result = list.set_objects(inbox(), false);
    assert_eq!(
        result,
        Err(ListError::UnresolvedAspect {
            column: "sender".into()
        })
    );
    assert!(result.unwrap_err().is_configuration());
    assert!(list.objects().is_empty());
    assert_eq!(list.rebuild_state(), RebuildState::Idle);
}

#[test]
fn test_lenient_mode_renders_empty_cells() {
    let mut list = ObjectList::new(columns(), ListConfig::default());
    list.set_objects(inbox(), false).unwrap();
    assert_eq!(list.row_for(&2).map(|r| r.cells().to_vec()), Some(vec!["invoice".to_string(), String::new()]));
}

#[test]
fn test_state_round_trip_through_toml() {
    let mut list = ObjectList::new(columns(), ListConfig::default());
    list.set_objects(inbox(), false).unwrap();
    list.group_by(1, SortOrder::Ascending).unwrap();
    list.sort_by(0, SortOrder::Descending).unwrap();
    list.set_column_width(1, 90).unwrap();

    let text = toml::to_string(&list.save_state()).unwrap();
    let state: ListState = toml::from_str(&text).unwrap();

    let mut restored = ObjectList::new(columns(), ListConfig::default());
    restored.set_objects(inbox(), false).unwrap();
    restored.restore_state(&state).unwrap();

    assert_eq!(restored.parameters(), list.parameters());
    assert_eq!(restored.columns()[1].width(), 90);
    assert_eq!(
        restored.projection().keys().collect::<Vec<_>>(),
        list.projection().keys().collect::<Vec<_>>()
    );
}

#[test]
fn test_filtering_switch() {
    let mut list = ObjectList::new(columns(), ListConfig::default());
    list.set_objects(inbox(), false).unwrap();
    list.set_model_filter(TextMatchFilter::prefix(columns(), "re:")).unwrap();
    assert_eq!(list.len(), 1);

    list.clear_model_filter().unwrap();
    list.set_additional_filter(|m: &Mail| m.sender.is_some()).unwrap();
    list.clear_filters().unwrap();
    // The additional filter outlives clear_filters.
    assert_eq!(list.len(), 3);
}
