//! Tests for the exploration queries over a database loaded from exported CSVs.
//!
//! The pipeline itself never creates tables; these tests stand in for the
//! manual load step by importing the five CSV files into a fresh SQLite
//! database, then reopen it read-only through `report::open_database()`.

use osmwrangle::config::{NODES_PATH, NODE_TAGS_PATH, WAYS_PATH, WAY_NODES_PATH, WAY_TAGS_PATH};
use osmwrangle::report::{self, find_query, run_canned, run_query};
use osmwrangle::rules::CleaningRules;
use osmwrangle::writer::{export, ExportOptions};
use rusqlite::Connection;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCHEMA: &str = "
CREATE TABLE nodes (id INTEGER PRIMARY KEY NOT NULL, lat REAL, lon REAL, user TEXT,
                    uid INTEGER, version INTEGER, changeset INTEGER, timestamp TEXT);
CREATE TABLE nodes_tags (id INTEGER, key TEXT, value TEXT, type TEXT);
CREATE TABLE ways (id INTEGER PRIMARY KEY NOT NULL, user TEXT, uid INTEGER,
                   version TEXT, changeset INTEGER, timestamp TEXT);
CREATE TABLE ways_tags (id INTEGER NOT NULL, key TEXT NOT NULL, value TEXT NOT NULL, type TEXT);
CREATE TABLE ways_nodes (id INTEGER NOT NULL, node_id INTEGER NOT NULL, position INTEGER NOT NULL);
";

fn osm_xml() -> String {
    let mut xml = String::from("<osm>\n");
    // 4 nodes by alice, 2 by bob, 1 by carol
    let users = [
        ("alice", 1),
        ("alice", 1),
        ("alice", 1),
        ("alice", 1),
        ("bob", 2),
        ("bob", 2),
        ("carol", 3),
    ];
    let amenities = ["cafe", "bar", "bar", "restaurant", "cafe", "bar", ""];
    for (i, ((user, uid), amenity)) in users.iter().zip(amenities).enumerate() {
        xml.push_str(&format!(
            r#"  <node id="{}" lat="29.9" lon="-90.0" version="1" timestamp="t" changeset="1" uid="{}" user="{}">"#,
            i + 1,
            uid,
            user
        ));
        if !amenity.is_empty() {
            xml.push_str(&format!(r#"<tag k="amenity" v="{}"/>"#, amenity));
        }
        xml.push_str("</node>\n");
    }
    xml.push_str(
        r#"  <way id="50" version="1" timestamp="t" changeset="1" uid="4" user="dave"><nd ref="1"/><nd ref="2"/></way>
</osm>"#,
    );
    xml
}

fn load_table(conn: &Connection, dir: &Path, file: &str, table: &str) {
    let mut reader = csv::Reader::from_path(dir.join(file)).unwrap();
    let width = reader.headers().unwrap().len();
    let placeholders = vec!["?"; width].join(", ");
    let sql = format!("INSERT INTO {} VALUES ({})", table, placeholders);
    let mut stmt = conn.prepare(&sql).unwrap();
    for record in reader.records() {
        let record = record.unwrap();
        stmt.execute(rusqlite::params_from_iter(record.iter())).unwrap();
    }
}

/// Exports the fixture and loads it into `osm.db`, returning the temp dir and database path.
fn build_database() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sample.osm");
    std::fs::File::create(&input)
        .unwrap()
        .write_all(osm_xml().as_bytes())
        .unwrap();

    let csv_dir = dir.path().join("csv");
    export(
        &input,
        &csv_dir,
        &CleaningRules::default(),
        ExportOptions {
            validate: true,
            ..ExportOptions::default()
        },
    )
    .unwrap();

    let db_path = dir.path().join("osm.db");
    let conn = Connection::open(&db_path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    for (file, table) in [
        (NODES_PATH, "nodes"),
        (NODE_TAGS_PATH, "nodes_tags"),
        (WAYS_PATH, "ways"),
        (WAY_NODES_PATH, "ways_nodes"),
        (WAY_TAGS_PATH, "ways_tags"),
    ] {
        load_table(&conn, &csv_dir, file, table);
    }
    (dir, db_path)
}

fn scalar(conn: &Connection, name: &str, user: &str) -> Value {
    let result = run_canned(conn, find_query(name).unwrap(), user).unwrap();
    result.rows[0][0].clone()
}

#[test]
fn counts_over_exported_tables() {
    let (_dir, db) = build_database();
    let conn = report::open_database(&db).unwrap();

    assert_eq!(scalar(&conn, "nodes", ""), Value::from(7));
    assert_eq!(scalar(&conn, "ways", ""), Value::from(1));
    assert_eq!(scalar(&conn, "unique-users", ""), Value::from(4));
    assert_eq!(scalar(&conn, "cafes", ""), Value::from(2));
    assert_eq!(scalar(&conn, "bars", ""), Value::from(3));
    assert_eq!(scalar(&conn, "contributions", ""), Value::from(8));
    assert_eq!(scalar(&conn, "user-contributions", "alice"), Value::from(4));
    assert_eq!(scalar(&conn, "user-contributions", "nobody"), Value::from(0));
    assert_eq!(scalar(&conn, "one-time", ""), Value::from(2));
    assert_eq!(scalar(&conn, "top10-sum", ""), Value::from(8));
}

#[test]
fn grouped_queries() {
    let (_dir, db) = build_database();
    let conn = report::open_database(&db).unwrap();

    let top = run_canned(&conn, find_query("top20").unwrap(), "").unwrap();
    assert_eq!(top.rows[0], vec![Value::from("alice"), Value::from(4)]);
    assert_eq!(top.rows[1], vec![Value::from("bob"), Value::from(2)]);

    let amenities = run_canned(&conn, find_query("top-amenities").unwrap(), "").unwrap();
    assert_eq!(amenities.columns, vec!["value", "num"]);
    assert_eq!(amenities.rows[0], vec![Value::from("bar"), Value::from(3)]);
    assert_eq!(amenities.rows[1], vec![Value::from("cafe"), Value::from(2)]);

    let cafes = run_canned(&conn, find_query("cafe-contributors").unwrap(), "").unwrap();
    let mut users: Vec<_> = cafes.rows.iter().map(|r| r[0].clone()).collect();
    users.sort_by_key(|v| v.to_string());
    assert_eq!(users, vec![Value::from("alice"), Value::from("bob")]);
}

#[test]
fn way_nodes_positions_loaded() {
    let (_dir, db) = build_database();
    let conn = report::open_database(&db).unwrap();
    let result = run_query(
        &conn,
        "SELECT node_id, position FROM ways_nodes WHERE id = 50 ORDER BY position;",
        &[],
    )
    .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::from(1), Value::from(0)],
            vec![Value::from(2), Value::from(1)],
        ]
    );
}

#[test]
fn reporter_cannot_modify_tables() {
    let (_dir, db) = build_database();
    let conn = report::open_database(&db).unwrap();

    assert!(run_query(&conn, "DROP TABLE nodes;", &[]).is_err());
    assert!(run_query(&conn, "UPDATE nodes SET user = 'x';", &[]).is_err());
    assert_eq!(scalar(&conn, "nodes", ""), Value::from(7));
}

#[test]
fn render_canned_result() {
    let (_dir, db) = build_database();
    let conn = report::open_database(&db).unwrap();
    let result = run_canned(&conn, find_query("nodes").unwrap(), "").unwrap();
    let text = report::render_table(&result);
    assert_eq!(text, "count(*)\n--------\n7");
}
