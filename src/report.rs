use anyhow::{bail, Context, Result};
use rusqlite::types::{ToSql, ValueRef};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Database opened when `--db` is not given.
pub const DEFAULT_DATABASE: &str = "osm.db";

/// Default contributor for the per-user query.
pub const DEFAULT_USER: &str = "Matt Toups";

/// File name fragments skipped when listing data file sizes
const SIZE_SKIP_PATTERNS: &[&str] = &[".ipynb", ".py", ".DS_Store", ".jpg", ".png"];

#[derive(Debug, Clone, Copy)]
pub struct CannedQuery {
    pub name: &'static str,
    pub title: &'static str,
    pub sql: &'static str,
    /// Whether `?1` is bound to a contributor name
    pub takes_user: bool,
}

const fn canned(name: &'static str, title: &'static str, sql: &'static str) -> CannedQuery {
    CannedQuery {
        name,
        title,
        sql,
        takes_user: false,
    }
}

pub const CANNED_QUERIES: &[CannedQuery] = &[
    canned("nodes", "Number of nodes", "SELECT count(*) FROM nodes;"),
    canned("ways", "Number of ways", "SELECT count(*) FROM ways;"),
    canned(
        "unique-users",
        "Number of unique users",
        "SELECT count(distinct(u.uid)) FROM (SELECT uid FROM nodes UNION ALL SELECT uid FROM ways) u;",
    ),
    canned(
        "cafes",
        "Number of cafes",
        "SELECT count(*) FROM nodes_tags WHERE value='cafe';",
    ),
    canned(
        "cafe-contributors",
        "Who contributed the cafes",
        "SELECT nodes.user FROM nodes INNER JOIN nodes_tags ON nodes.id=nodes_tags.id WHERE nodes_tags.value='cafe';",
    ),
    CannedQuery {
        name: "user-contributions",
        title: "Contributions by one user",
        sql: "SELECT count(*) FROM (SELECT user FROM nodes UNION ALL SELECT user FROM ways) u WHERE user=?1;",
        takes_user: true,
    },
    canned(
        "contributions",
        "Sum of contributions",
        "SELECT count(*) FROM (SELECT user FROM nodes UNION ALL SELECT user FROM ways) u;",
    ),
    canned(
        "top10-sum",
        "Sum of top 10 contributors' contributions",
        "SELECT sum(num) FROM (SELECT u.user, count(*) as num FROM (SELECT user FROM nodes UNION ALL SELECT user FROM ways) u GROUP BY u.user ORDER BY num DESC LIMIT 10) e;",
    ),
    canned(
        "top20",
        "Top 20 contributors",
        "SELECT u.user, count(*) as num FROM (SELECT user FROM nodes UNION ALL SELECT user FROM ways) u GROUP BY u.user ORDER BY num DESC LIMIT 20;",
    ),
    canned(
        "one-time",
        "Contributors with a single contribution",
        "SELECT count(*) FROM (SELECT u.user, count(*) as num FROM (SELECT user FROM nodes UNION ALL SELECT user FROM ways) u GROUP BY u.user HAVING num=1) i;",
    ),
    canned(
        "top-amenities",
        "Top 5 amenities",
        "SELECT value, count(*) as num FROM nodes_tags WHERE key='amenity' GROUP BY value ORDER BY num DESC LIMIT 5;",
    ),
    canned(
        "bars",
        "Number of bars",
        "SELECT count(*) FROM nodes_tags WHERE key='amenity' AND value='bar';",
    ),
];

pub fn find_query(name: &str) -> Option<&'static CannedQuery> {
    CANNED_QUERIES.iter().find(|q| q.name == name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Opens the loaded tables without write access.
pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open database: {:?}", path))?;
    info!(path = ?path, "Opened database read-only");
    Ok(conn)
}

/// Runs a single read-only statement and collects every row.
pub fn run_query(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<QueryResult> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("Failed to prepare query: {sql}"))?;
    if !stmt.readonly() {
        bail!("Refusing to run a statement that modifies the database: {sql}");
    }

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let width = columns.len();

    let mut rows = stmt
        .query(params)
        .with_context(|| format!("Failed to execute query: {sql}"))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(to_json(row.get_ref(i)?));
        }
        out.push(values);
    }

    debug!(rows = out.len(), sql, "Query complete");
    Ok(QueryResult { columns, rows: out })
}

pub fn run_canned(conn: &Connection, query: &CannedQuery, user: &str) -> Result<QueryResult> {
    if query.takes_user {
        run_query(conn, query.sql, &[&user as &dyn ToSql])
    } else {
        run_query(conn, query.sql, &[])
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

/// Renders a result as a left-aligned text table with a header rule.
pub fn render_table(result: &QueryResult) -> String {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(cell).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (w, c) in widths.iter_mut().zip(row) {
            *w = (*w).max(c.chars().count());
        }
    }

    let format_line = |fields: &[String]| -> String {
        fields
            .iter()
            .zip(&widths)
            .map(|(f, w)| format!("{:<width$}", f, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(result.columns.as_slice())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(cells.iter().map(|row| format_line(row.as_slice())));
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSize {
    pub name: String,
    pub megabytes: f64,
}

/// Sizes of the data files under `dir`, recursively, skipping notebooks, scripts and images.
pub fn file_sizes<P: AsRef<Path>>(dir: P) -> Result<Vec<FileSize>> {
    let mut sizes = Vec::new();
    collect_sizes(dir.as_ref(), &mut sizes)?;
    sizes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sizes)
}

fn collect_sizes(dir: &Path, out: &mut Vec<FileSize>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {:?}", dir))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            collect_sizes(&path, out)?;
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if SIZE_SKIP_PATTERNS.iter().any(|p| name.contains(p)) {
            continue;
        }
        out.push(FileSize {
            name,
            megabytes: meta.len() as f64 / (1024.0 * 1024.0),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE nodes (id INTEGER, lat REAL, lon REAL, user TEXT, uid INTEGER,
                                 version TEXT, changeset INTEGER, timestamp TEXT);
             CREATE TABLE ways (id INTEGER, user TEXT, uid INTEGER, version TEXT,
                                changeset INTEGER, timestamp TEXT);
             CREATE TABLE nodes_tags (id INTEGER, key TEXT, value TEXT, type TEXT);
             INSERT INTO nodes VALUES (1, 29.9, -90.0, 'alice', 10, '1', 1, 't');
             INSERT INTO nodes VALUES (2, 29.9, -90.1, 'alice', 10, '1', 1, 't');
             INSERT INTO nodes VALUES (3, 29.8, -90.2, 'bob', 11, '1', 1, 't');
             INSERT INTO ways VALUES (7, 'carol', 12, '1', 1, 't');
             INSERT INTO nodes_tags VALUES (1, 'amenity', 'cafe', 'regular');
             INSERT INTO nodes_tags VALUES (2, 'amenity', 'bar', 'regular');
             INSERT INTO nodes_tags VALUES (3, 'amenity', 'bar', 'regular');",
        )
        .unwrap();
        conn
    }

    fn scalar(conn: &Connection, name: &str) -> Value {
        let q = find_query(name).unwrap();
        run_canned(conn, q, "alice").unwrap().rows[0][0].clone()
    }

    #[test]
    fn canned_names_unique() {
        let mut names: Vec<_> = CANNED_QUERIES.iter().map(|q| q.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CANNED_QUERIES.len());
    }

    #[test]
    fn canned_counts() {
        let conn = memory_db();
        assert_eq!(scalar(&conn, "nodes"), Value::from(3));
        assert_eq!(scalar(&conn, "ways"), Value::from(1));
        assert_eq!(scalar(&conn, "unique-users"), Value::from(3));
        assert_eq!(scalar(&conn, "cafes"), Value::from(1));
        assert_eq!(scalar(&conn, "user-contributions"), Value::from(2));
        assert_eq!(scalar(&conn, "contributions"), Value::from(4));
        assert_eq!(scalar(&conn, "one-time"), Value::from(2));
        assert_eq!(scalar(&conn, "bars"), Value::from(2));
    }

    #[test]
    fn top_contributors_ordered() {
        let conn = memory_db();
        let result = run_canned(&conn, find_query("top20").unwrap(), DEFAULT_USER).unwrap();
        assert_eq!(result.columns, vec!["user", "num"]);
        assert_eq!(result.rows[0], vec![Value::from("alice"), Value::from(2)]);
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn cafe_contributors_join() {
        let conn = memory_db();
        let result =
            run_canned(&conn, find_query("cafe-contributors").unwrap(), DEFAULT_USER).unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("alice")]]);
    }

    #[test]
    fn write_statements_refused() {
        let conn = memory_db();
        let err = run_query(&conn, "DELETE FROM nodes;", &[]).unwrap_err();
        assert!(err.to_string().contains("Refusing"));
        assert_eq!(scalar(&conn, "nodes"), Value::from(3));
    }

    #[test]
    fn render_aligns_columns() {
        let result = QueryResult {
            columns: vec!["value".to_string(), "num".to_string()],
            rows: vec![
                vec![Value::from("restaurant"), Value::from(120)],
                vec![Value::from("bar"), Value::Null],
            ],
        };
        let text = render_table(&result);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "value       num");
        assert_eq!(lines[1], "----------  ----");
        assert_eq!(lines[2], "restaurant  120");
        assert_eq!(lines[3], "bar         NULL");
    }

    #[test]
    fn database_is_read_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("osm.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE nodes (id INTEGER);")
            .unwrap();

        let conn = open_database(&path).unwrap();
        assert!(conn.execute("INSERT INTO nodes VALUES (1)", []).is_err());
    }

    #[test]
    fn missing_database_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(open_database(dir.path().join("nope.db")).is_err());
    }

    #[test]
    fn file_sizes_skip_scripts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("nodes.csv"), vec![b'x'; 1024 * 1024]).unwrap();
        fs::write(dir.path().join("wrangle.py"), "print()").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("sample.osm"), "<osm/>").unwrap();

        let sizes = file_sizes(dir.path()).unwrap();
        let names: Vec<_> = sizes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["nodes.csv", "sample.osm"]);
        assert!((sizes[0].megabytes - 1.0).abs() < f64::EPSILON);
    }
}
