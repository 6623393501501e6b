//! Scalar functions registered on every catalog connection.

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;

use crsdb_core::extent::{bbox_intersects, pseudo_area_from_swne};

/// Registers `pseudo_area_from_swne` and `intersects_bbox`.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("pseudo_area_from_swne", 4, flags, |ctx| {
        let mut v = [0.0; 4];
        for (idx, slot) in v.iter_mut().enumerate() {
            match ctx.get::<Option<f64>>(idx)? {
                Some(x) => *slot = x,
                None => return Ok(None),
            }
        }
        Ok(Some(pseudo_area_from_swne(v[0], v[1], v[2], v[3])))
    })?;

    // Boxes with a NULL coordinate are unknown extents and intersect.
    conn.create_scalar_function("intersects_bbox", 8, flags, |ctx| {
        let mut v = [0.0; 8];
        for (idx, slot) in v.iter_mut().enumerate() {
            match ctx.get::<Option<f64>>(idx)? {
                Some(x) => *slot = x,
                None => return Ok(true),
            }
        }
        Ok(bbox_intersects(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        conn
    }

    #[test]
    fn pseudo_area() {
        let conn = conn();
        let area: f64 = conn
            .query_row("SELECT pseudo_area_from_swne(-90, -180, 90, 180)", [], |r| r.get(0))
            .unwrap();
        assert!((area - 4.0 * std::f64::consts::PI).abs() < 1e-12);

        let null: Option<f64> = conn
            .query_row("SELECT pseudo_area_from_swne(NULL, 0, 1, 1)", [], |r| r.get(0))
            .unwrap();
        assert_eq!(None, null);
    }

    #[test]
    fn intersects() {
        let conn = conn();
        let query = |sql: &str| -> bool { conn.query_row(sql, [], |r| r.get(0)).unwrap() };

        assert!(query("SELECT intersects_bbox(0, 0, 10, 10, 5, 5, 15, 15)"));
        assert!(!query("SELECT intersects_bbox(0, 0, 10, 10, 20, 20, 30, 30)"));
        assert!(query("SELECT intersects_bbox(-10, 170, 10, -170, -5, -175, 5, -160)"));
        assert!(query("SELECT intersects_bbox(NULL, 0, 10, 10, 20, 20, 30, 30)"));
    }
}
