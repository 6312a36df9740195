use std::fs;

use rstest::rstest;
use serde_json::json;
use tempfile::tempdir;
use trak_config::profiles::{HEADERS, ProfileStore, TestProfile};

fn profile(name: &str, path_length_mm: i32) -> TestProfile {
    let curves = json!({ "curve1": 40, "curve2": 80 });
    TestProfile {
        name: name.into(),
        path_length_mm,
        threshold_force_mn: 4000.0,
        temperature_c: 37.5,
        retraction_length_mm: 20.0,
        number_of_curves: 2,
        curve_distances: curves.as_object().cloned().unwrap_or_default(),
    }
}

#[test]
fn missing_file_is_created_with_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("SCTTM.csv");
    let store = ProfileStore::new(&path);
    assert!(store.load().unwrap().is_empty());
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.trim_end(), HEADERS.join(","));
}

#[test]
fn reads_files_written_by_the_operator_ui() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("SCTTM.csv");
    fs::write(
        &path,
        "configName,pathlength,thresholdForce,temperature,retractionLength,numberOfCurves,curveDistances\n\
         Tortuous A,120,4000,37,20,2,\"{\"\"curve1\"\":40,\"\"curve2\"\":80}\"\n\
         Straight,300,2500,25.5,10,0,\"{}\"\n",
    )
    .unwrap();
    let all = ProfileStore::new(&path).load().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "Tortuous A");
    assert_eq!(all[0].curve_distances["curve2"], json!(80));
    assert_eq!(all[1].temperature_c, 25.5);
    assert!(all[1].curve_distances.is_empty());
}

#[test]
fn upsert_replaces_by_name_and_delete_removes() {
    let dir = tempdir().unwrap();
    let store = ProfileStore::new(dir.path().join("p.csv"));
    store.upsert(profile("a", 100)).unwrap();
    store.upsert(profile("b", 200)).unwrap();
    store.upsert(profile("a", 150)).unwrap();

    let all = store.load().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], profile("a", 150));

    assert!(store.delete("a").unwrap());
    assert!(!store.delete("a").unwrap());
    assert_eq!(store.load().unwrap(), vec![profile("b", 200)]);
    assert_eq!(store.find("b").unwrap(), Some(profile("b", 200)));
}

#[test]
fn names_with_commas_survive() {
    let dir = tempdir().unwrap();
    let store = ProfileStore::new(dir.path().join("p.csv"));
    store.upsert(profile("loop, tight", 90)).unwrap();
    assert_eq!(store.load().unwrap()[0].name, "loop, tight");
}

#[rstest]
#[case::bad_header("name,pathlength\nx,1\n", "headers")]
#[case::bad_json(
    "configName,pathlength,thresholdForce,temperature,retractionLength,numberOfCurves,curveDistances\nx,1,2,3,4,0,\"{oops\"\n",
    "row 2"
)]
#[case::bad_number(
    "configName,pathlength,thresholdForce,temperature,retractionLength,numberOfCurves,curveDistances\nx,long,2,3,4,0,{}\n",
    "row 2"
)]
fn malformed_files_are_rejected(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("p.csv");
    fs::write(&path, body).unwrap();
    let err = ProfileStore::new(&path).load().unwrap_err();
    assert!(format!("{err}").contains(needle), "{err}");
}

#[test]
fn empty_names_are_refused() {
    let dir = tempdir().unwrap();
    let store = ProfileStore::new(dir.path().join("p.csv"));
    assert!(store.upsert(profile("  ", 1)).is_err());
}
