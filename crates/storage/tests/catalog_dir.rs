use std::fs;

use quiz_core::model::{FallbackPolicy, ModuleId};
use storage::{Catalog, CatalogError};

const EXTRA: &str = r#"
id = "SafeCrossing"
title = "Safe Crossing"
fallback = "proportional"

[rewards]
total_coins = 6
xp = 2

[[stages]]
id = 1
prompt = "The light turns green but a car is still moving. What now?"
reward = 3

[[stages.options]]
id = "wait"
label = "Wait until the car stops"
reflection = "A green light doesn't stop a car. Check first."
correct = true

[[stages.options]]
id = "go"
label = "Walk, it's green"
correct = false

[[stages]]
id = 2
prompt = "Where is it safest to cross?"
reward = 3

[[stages.options]]
id = "crossing"
label = "At a marked crossing"
correct = true

[[stages.options]]
id = "between-cars"
label = "Between parked cars"
correct = false
"#;

#[test]
fn load_dir_adds_valid_and_skips_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("safe_crossing.toml"), EXTRA).unwrap();
    fs::write(dir.path().join("broken.toml"), "id = \"Broken\"\ntitle = ").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut catalog = Catalog::builtin().unwrap();
    let added = catalog.load_dir(dir.path()).unwrap();

    assert_eq!(added, 1);
    assert_eq!(catalog.len(), 4);
    let module = catalog.get(&ModuleId::from("SafeCrossing")).unwrap();
    assert_eq!(module.total_stages(), 2);
    assert_eq!(module.rewards().fallback, FallbackPolicy::Proportional);
    assert_eq!(module.stage(0).unwrap().options()[1].reflection(), "");
}

#[test]
fn load_dir_does_not_replace_builtin_ids() {
    let dir = tempfile::tempdir().unwrap();
    let shadow = EXTRA.replace("SafeCrossing", "BudgetingBasics");
    fs::write(dir.path().join("shadow.toml"), shadow).unwrap();

    let mut catalog = Catalog::builtin().unwrap();
    assert_eq!(catalog.load_dir(dir.path()).unwrap(), 0);
    let budgeting = catalog.get(&ModuleId::from("BudgetingBasics")).unwrap();
    assert_eq!(budgeting.title(), "Budgeting Basics");
}

#[test]
fn load_dir_skips_modules_with_shuffled_stage_ids() {
    let dir = tempfile::tempdir().unwrap();
    let shuffled = EXTRA
        .replace("SafeCrossing", "ShuffledCrossing")
        .replace("id = 1\n", "id = 7\n");
    fs::write(dir.path().join("shuffled.toml"), shuffled).unwrap();

    let mut catalog = Catalog::builtin().unwrap();
    assert_eq!(catalog.load_dir(dir.path()).unwrap(), 0);
    assert!(catalog.get(&ModuleId::from("ShuffledCrossing")).is_none());
}

#[test]
fn load_dir_reports_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let err = Catalog::new().load_dir(&missing).unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }));
}
