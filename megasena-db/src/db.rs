use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;

use crate::models::{Draw, DEFAULT_DRAW_SIZE};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    contest  INTEGER PRIMARY KEY,
    date     TEXT NOT NULL,
    d1       INTEGER NOT NULL,
    d2       INTEGER NOT NULL,
    d3       INTEGER NOT NULL,
    d4       INTEGER NOT NULL,
    d5       INTEGER NOT NULL,
    d6       INTEGER NOT NULL
);
";

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

/// Insère un tirage ; renvoie `false` si le concours existe déjà.
pub fn insert_draw(conn: &Connection, draw: &Draw) -> Result<bool> {
    if draw.numbers.len() != DEFAULT_DRAW_SIZE {
        bail!(
            "Concours {} : {} dezenas attendues, {} obtenues",
            draw.contest,
            DEFAULT_DRAW_SIZE,
            draw.numbers.len()
        );
    }
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (contest, date, d1, d2, d3, d4, d5, d6)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            draw.contest,
            draw.date,
            draw.numbers[0],
            draw.numbers[1],
            draw.numbers[2],
            draw.numbers[3],
            draw.numbers[4],
            draw.numbers[5],
        ],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

/// Derniers tirages, du plus récent au plus ancien.
pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<Draw>> {
    let mut stmt = conn.prepare(
        "SELECT contest, date, d1, d2, d3, d4, d5, d6
         FROM draws ORDER BY contest DESC LIMIT ?1"
    )?;
    let draws = stmt.query_map([limit], |row| {
        Ok(Draw {
            contest: row.get(0)?,
            date: row.get(1)?,
            numbers: vec![
                row.get::<_, u8>(2)?,
                row.get::<_, u8>(3)?,
                row.get::<_, u8>(4)?,
                row.get::<_, u8>(5)?,
                row.get::<_, u8>(6)?,
                row.get::<_, u8>(7)?,
            ],
        })
    })?.collect::<Result<Vec<_>, _>>()?;
    Ok(draws)
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

pub fn latest_contest(conn: &Connection) -> Result<Option<u32>> {
    let contest: Option<u32> = conn.query_row("SELECT MAX(contest) FROM draws", [], |row| row.get(0))?;
    Ok(contest)
}
