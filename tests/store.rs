mod common;

use colmap::{
    catalog::GlobalRule,
    mapping::{ColumnMapping, FieldEdit, SourceColumn},
    store::{MappingStore, Selection},
};
use common::{ORDERS, order_columns};
use proptest::prelude::*;
use serde_json::json;

fn derived_store() -> MappingStore {
    let mut store = MappingStore::new();
    assert!(store.derive_default(ORDERS, &order_columns()));
    store
}

fn targets(store: &MappingStore) -> Vec<&str> {
    store
        .mappings(ORDERS)
        .iter()
        .map(|mapping| mapping.target.as_str())
        .collect()
}

#[test]
fn derive_default_creates_direct_mappings_in_column_order() {
    let store = derived_store();
    let list = store.mappings(ORDERS);
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].source.as_deref(), Some("id"));
    assert_eq!(list[0].target, "id");
    assert_eq!(list[0].transformation, "direct");
    assert_eq!(list[0].source_data_type.as_deref(), Some("int"));
    assert_eq!(list[1].source.as_deref(), Some("updated_at"));
    assert_eq!(list[1].source_data_type.as_deref(), Some("timestamp"));
}

#[test]
fn derive_default_is_idempotent() {
    let mut store = derived_store();
    store.update_field(ORDERS, "id", FieldEdit::Target("order_id".into()));
    let before = store.mappings(ORDERS).to_vec();

    assert!(!store.derive_default(ORDERS, &order_columns()));
    assert_eq!(store.mappings(ORDERS), before.as_slice());
}

#[test]
fn derive_default_runs_once_even_after_the_list_is_emptied() {
    let mut store = derived_store();
    store.remove_mapping(ORDERS, "id");
    store.remove_mapping(ORDERS, "updated_at");
    assert!(store.mappings(ORDERS).is_empty());

    assert!(!store.derive_default(ORDERS, &order_columns()));
    assert!(store.mappings(ORDERS).is_empty());
}

#[test]
fn unknown_tables_read_as_empty() {
    let mut store = MappingStore::new();
    assert!(store.mappings("nope.nothing").is_empty());
    assert!(!store.reorder("nope.nothing", 0, 1));
    assert_eq!(store.remove_mapping("nope.nothing", "id"), 0);
    assert_eq!(store.delete_selected("nope.nothing", &Selection::from([0])), 0);
    assert!(store.select_all("nope.nothing").is_empty());
}

#[test]
fn update_field_edits_existing_mapping_in_place() {
    let mut store = derived_store();
    store.update_field(
        ORDERS,
        "updated_at",
        FieldEdit::Transformation("date_format".into()),
    );
    store.update_field(
        ORDERS,
        "updated_at",
        FieldEdit::Parameter {
            name: "format".into(),
            value: Some(json!("%d/%m/%Y")),
        },
    );

    let list = store.mappings(ORDERS);
    assert_eq!(list.len(), 2);
    assert_eq!(list[1].transformation, "date_format");
    assert_eq!(list[1].params.get("format"), Some(&json!("%d/%m/%Y")));
    assert_eq!(list[1].target, "updated_at");
}

#[test]
fn update_field_inserts_minimal_mapping_for_new_source() {
    let mut store = derived_store();
    store.update_field(
        ORDERS,
        "total",
        FieldEdit::TargetDataType(Some("decimal".into())),
    );

    let list = store.mappings(ORDERS);
    assert_eq!(list.len(), 3);
    let added = &list[2];
    assert_eq!(added.source.as_deref(), Some("total"));
    assert_eq!(added.target, "total");
    assert_eq!(added.transformation, "direct");
    assert_eq!(added.target_data_type.as_deref(), Some("decimal"));
}

#[test]
fn add_mapping_is_idempotent_and_appends() {
    let mut store = derived_store();
    assert!(!store.add_mapping(ORDERS, &SourceColumn::new("id", "int")));
    assert!(store.add_mapping(ORDERS, &SourceColumn::new("status", "varchar")));
    assert_eq!(targets(&store), vec!["id", "updated_at", "status"]);
}

#[test]
fn remove_mapping_leaves_audit_columns_alone() {
    let mut store = derived_store();
    let audit = store.add_audit_column(ORDERS);
    assert_eq!(store.remove_mapping(ORDERS, "id"), 1);
    assert_eq!(store.remove_mapping(ORDERS, &audit), 0);
    assert_eq!(targets(&store), vec!["updated_at", audit.as_str()]);
}

#[test]
fn reorder_moves_and_shifts() {
    let mut store = MappingStore::new();
    for name in ["a", "b", "c", "d"] {
        store.add_mapping(ORDERS, &SourceColumn::new(name, "text"));
    }
    assert!(store.reorder(ORDERS, 0, 2));
    assert_eq!(targets(&store), vec!["b", "c", "a", "d"]);
    assert!(store.reorder(ORDERS, 3, 0));
    assert_eq!(targets(&store), vec!["d", "b", "c", "a"]);
    assert!(!store.reorder(ORDERS, 4, 0));
    assert_eq!(targets(&store), vec!["d", "b", "c", "a"]);
}

#[test]
fn global_rules_touch_only_matching_columns() {
    let mut store = derived_store();
    let rules = vec![GlobalRule::new("updates", "updated.*", "date_iso").unwrap()];
    assert_eq!(store.apply_global_rules(ORDERS, &rules), 1);

    let list = store.mappings(ORDERS);
    assert_eq!(list[0].transformation, "direct");
    assert_eq!(list[1].transformation, "date_iso");
}

#[test]
fn global_rules_first_match_wins() {
    let mut store = derived_store();
    let rules = vec![
        GlobalRule::new("first", "^UPDATED", "timestamp_utc").unwrap(),
        GlobalRule::new("second", "_at$", "date_iso").unwrap(),
    ];
    store.apply_global_rules(ORDERS, &rules);
    assert_eq!(store.mappings(ORDERS)[1].transformation, "timestamp_utc");
}

#[test]
fn global_rules_overwrite_manual_choices_and_skip_audit() {
    let mut store = derived_store();
    store.update_field(ORDERS, "updated_at", FieldEdit::Transformation("trim".into()));
    store.add_audit_column(ORDERS);
    let rules = vec![GlobalRule::new("all", ".*", "upper").unwrap()];

    assert_eq!(store.apply_global_rules(ORDERS, &rules), 2);
    let list = store.mappings(ORDERS);
    assert_eq!(list[1].transformation, "upper");
    assert_eq!(list[2].transformation, "direct");
}

#[test]
fn select_all_excludes_audit_columns() {
    let mut store = derived_store();
    store.add_audit_column(ORDERS);
    store.add_mapping(ORDERS, &SourceColumn::new("status", "varchar"));
    assert_eq!(store.select_all(ORDERS), Selection::from([0, 1, 3]));
    assert!(store.deselect_all().is_empty());
}

#[test]
fn apply_transformation_updates_selected_rows() {
    let mut store = derived_store();
    let selection = Selection::from([1, 9]);
    assert_eq!(store.apply_transformation(ORDERS, &selection, "trim"), 1);
    let list = store.mappings(ORDERS);
    assert_eq!(list[0].transformation, "direct");
    assert_eq!(list[1].transformation, "trim");
}

#[test]
fn delete_selected_never_removes_audit_columns() {
    let mut store = derived_store();
    let audit = store.add_audit_column(ORDERS);
    let selection = Selection::from([0, 1, 2]);

    assert_eq!(store.delete_selected(ORDERS, &selection), 2);
    let list = store.mappings(ORDERS);
    assert_eq!(list.len(), 1);
    assert!(list[0].is_audit);
    assert_eq!(list[0].target, audit);
}

#[test]
fn duplicate_selected_appends_derived_copies_with_same_source() {
    let mut store = derived_store();
    store.add_audit_column(ORDERS);
    assert_eq!(store.duplicate_selected(ORDERS, &Selection::from([0, 2])), 1);

    let list = store.mappings(ORDERS);
    assert_eq!(list.len(), 4);
    let copy = &list[3];
    assert_eq!(copy.target, "id_copy");
    assert_eq!(copy.source.as_deref(), Some("id"));
    assert!(copy.derived);
    assert!(!copy.is_audit);
}

#[test]
fn audit_columns_have_no_source_and_unique_targets() {
    let mut store = MappingStore::new();
    let first = store.add_audit_column(ORDERS);
    let second = store.add_audit_column(ORDERS);
    assert_ne!(first, second);
    for mapping in store.mappings(ORDERS) {
        assert!(mapping.is_audit);
        assert!(mapping.derived);
        assert_eq!(mapping.source, None);
        assert_eq!(mapping.transformation, "direct");
    }
    assert!(store.update_at(ORDERS, 0, FieldEdit::Target("loaded_at".into())));
    assert!(store.remove_audit_column(ORDERS, "loaded_at"));
    assert_eq!(store.mappings(ORDERS).len(), 1);
}

#[test]
fn import_replacement_keeps_audit_columns() {
    let mut store = derived_store();
    let audit = store.add_audit_column(ORDERS);
    let imported = vec![ColumnMapping::direct("customer_id")];

    store.replace_from_import(ORDERS, imported);
    let list = store.mappings(ORDERS);
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].source.as_deref(), Some("customer_id"));
    assert_eq!(list[1].target, audit);
}

#[test]
fn store_serializes_as_table_keyed_object() {
    let store = derived_store();
    let encoded = serde_json::to_value(&store).expect("serialize store");
    assert_eq!(encoded[ORDERS][1]["source"], json!("updated_at"));

    let decoded: MappingStore = serde_json::from_value(encoded).expect("deserialize store");
    assert_eq!(decoded.mappings(ORDERS), store.mappings(ORDERS));
    assert!(!decoded.was_attempted(ORDERS));
}

#[derive(Debug, Clone)]
enum Edit {
    Add(String),
    Update(String, String),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    let name = "[a-d]{1,2}";
    prop_oneof![
        name.prop_map(Edit::Add),
        (name, "[a-z]{1,6}")
            .prop_map(|(source, transformation)| Edit::Update(source, transformation)),
    ]
}

proptest! {
    #[test]
    fn adds_and_updates_never_duplicate_a_source(edits in proptest::collection::vec(edit_strategy(), 0..40)) {
        let mut store = MappingStore::new();
        for edit in edits {
            match edit {
                Edit::Add(name) => {
                    store.add_mapping(ORDERS, &SourceColumn::new(name, "text"));
                }
                Edit::Update(source, transformation) => {
                    store.update_field(ORDERS, &source, FieldEdit::Transformation(transformation));
                }
            }
        }
        let mut sources = store
            .mappings(ORDERS)
            .iter()
            .filter(|mapping| !mapping.is_audit)
            .filter_map(|mapping| mapping.source.clone())
            .collect::<Vec<_>>();
        let total = sources.len();
        sources.sort();
        sources.dedup();
        prop_assert_eq!(sources.len(), total);
    }
}
