use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

#[test]
fn build_then_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("taxonomy.tsv");
    fs::write(
        &input,
        "GB_ACC001\tBacteria;Proteobacteria;Gammaproteobacteria\nXX\td__Loose;p__Dangling\n",
    )
    .unwrap();
    let db = dir.path().join("db");

    Command::cargo_bin("flex_taxo")
        .unwrap()
        .args(["build", "-i"])
        .arg(&input)
        .arg("--db")
        .arg(&db)
        .assert()
        .success();

    for file in ["nodes.dmp", "names.dmp", "genome2taxid.map", "build_summary.json"] {
        assert!(db.join(file).exists(), "{} missing", file);
    }
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(db.join("build_summary.json")).unwrap()).unwrap();
    assert_eq!(summary["added"], 2);
    assert_eq!(summary["orphans"], 1);
    assert_eq!(
        fs::read_to_string(db.join("genome2taxid.map")).unwrap(),
        "ACC001\t10\tgenbank\nXX\t12\t\n"
    );

    Command::cargo_bin("flex_taxo")
        .unwrap()
        .arg("inspect")
        .arg("--db")
        .arg(&db)
        .arg("10")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "no rank:root(1) > no rank:cellular organisms(2) > superkingdom:Bacteria(3) > no rank:Proteobacteria(9) > no rank:Gammaproteobacteria(10)",
        ));
}

#[test]
fn build_rejects_bad_dump_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("taxonomy.tsv");
    fs::write(&input, "g1\td__Bacteria\n").unwrap();

    Command::cargo_bin("flex_taxo")
        .unwrap()
        .args(["build", "--dump-prefix", "nodes-only", "-i"])
        .arg(&input)
        .arg("--db")
        .arg(dir.path().join("db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("names,nodes"));
}

#[test]
fn rebuild_replaces_genome_map() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("taxonomy.tsv");
    let db = dir.path().join("db");
    let build = |rows: &str| {
        fs::write(&input, rows).unwrap();
        Command::cargo_bin("flex_taxo")
            .unwrap()
            .args(["build", "-i"])
            .arg(&input)
            .arg("--db")
            .arg(&db)
            .assert()
            .success();
    };

    build("G1\td__Bacteria;p__Firmicutes\n");
    assert_eq!(
        fs::read_to_string(db.join("genome2taxid.map")).unwrap(),
        "G1\t9\t\n"
    );

    build("G0\td__Bacteria;p__Proteobacteria\nG1\td__Bacteria;p__Firmicutes\n");
    assert_eq!(
        fs::read_to_string(db.join("genome2taxid.map")).unwrap(),
        "G0\t9\t\nG1\t10\t\n"
    );
    let names = fs::read_to_string(db.join("names.dmp")).unwrap();
    assert!(names.contains("10\t|\tFirmicutes\t|"));
    assert!(names.contains("9\t|\tProteobacteria\t|"));
}
