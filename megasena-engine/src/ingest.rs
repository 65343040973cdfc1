use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use megasena_db::db::insert_draw;
use megasena_db::models::Draw;
use megasena_db::rusqlite::Connection;

use crate::fetch::normalize_date;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl ImportResult {
    fn record_insert(&mut self, outcome: Result<bool>, label: &str) {
        match outcome {
            Ok(true) => self.inserted += 1,
            Ok(false) => self.skipped += 1,
            Err(e) => {
                log::warn!("Erreur insertion {} : {:#}", label, e);
                self.errors += 1;
            }
        }
    }
}

/// Ligne `concurso,data,d1,...,d6`.
fn parse_record(record: &csv::StringRecord, draw_size: usize) -> Result<Draw> {
    let get = |idx: usize| -> Result<String> {
        record
            .get(idx)
            .map(|s| s.trim().to_string())
            .with_context(|| format!("Champ manquant à l'index {}", idx))
    };

    let contest_raw = get(0)?;
    let contest: u32 = contest_raw
        .parse()
        .with_context(|| format!("Concurso invalide : '{}'", contest_raw))?;
    let date = normalize_date(&get(1)?);

    let numbers = (0..draw_size)
        .map(|i| {
            let s = get(2 + i)?;
            s.parse::<u8>()
                .with_context(|| format!("Impossible de parser '{}' (index {})", s, 2 + i))
        })
        .collect::<Result<Vec<u8>>>()?;

    Draw::new(contest, date, &numbers, draw_size)
        .with_context(|| format!("Concurso {} rejeté", contest))
}

/// Importe un historique CSV dans la base, en une transaction.
pub fn import_csv(conn: &Connection, path: &Path, draw_size: usize) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;

    let tx = conn
        .unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();

    for record_result in reader.records() {
        result.total_records += 1;
        let line = result.total_records;
        match record_result {
            Ok(record) => match parse_record(&record, draw_size) {
                Ok(draw) => result.record_insert(insert_draw(&tx, &draw), &format!("ligne {}", line)),
                Err(e) => {
                    log::warn!("Erreur parsing ligne {} : {:#}", line, e);
                    result.errors += 1;
                }
            },
            Err(e) => {
                log::warn!("Erreur lecture ligne {} : {}", line, e);
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    Ok(result)
}

/// Enregistre des tirages déjà validés (historique téléchargé).
pub fn store_draws(conn: &Connection, draws: &[Draw]) -> Result<ImportResult> {
    let pb = ProgressBar::new(draws.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let tx = conn
        .unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();
    for draw in draws {
        result.total_records += 1;
        result.record_insert(insert_draw(&tx, draw), &format!("concurso {}", draw.contest));
        pb.inc(1);
    }

    tx.commit().context("Échec du commit")?;
    pb.finish_and_clear();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use megasena_db::db::{count_draws, fetch_last_draws, migrate};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_import_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("megasena.csv");
        std::fs::write(
            &path,
            "concurso,data,d1,d2,d3,d4,d5,d6\n\
             1,11/03/1996,4,5,30,33,41,52\n\
             2,18/03/1996,9,37,39,41,43,49\n\
             2,18/03/1996,9,37,39,41,43,49\n\
             3,25/03/1996,10,11,29,30,36,61\n\
             x,25/03/1996,1,2,3,4,5,6\n",
        )
        .unwrap();

        let conn = memory_db();
        let result = import_csv(&conn, &path, 6).unwrap();
        assert_eq!(result.total_records, 5);
        assert_eq!(result.inserted, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors, 2);
        assert_eq!(count_draws(&conn).unwrap(), 2);

        let last = fetch_last_draws(&conn, 1).unwrap();
        assert_eq!(last[0].contest, 2);
        assert_eq!(last[0].date, "1996-03-18");
    }

    #[test]
    fn test_import_csv_short_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("megasena.csv");
        std::fs::write(&path, "concurso,data,d1,d2,d3,d4,d5,d6\n1,1996-03-11,4,5,30\n").unwrap();

        let conn = memory_db();
        let result = import_csv(&conn, &path, 6).unwrap();
        assert_eq!(result.errors, 1);
        assert_eq!(count_draws(&conn).unwrap(), 0);
    }

    #[test]
    fn test_import_missing_file() {
        let conn = memory_db();
        assert!(import_csv(&conn, Path::new("/nonexistent/megasena.csv"), 6).is_err());
    }

    #[test]
    fn test_store_draws_is_idempotent() {
        let conn = memory_db();
        let draws = vec![
            Draw::new(1, "1996-03-11", &[4, 5, 30, 33, 41, 52], 6).unwrap(),
            Draw::new(2, "1996-03-18", &[9, 37, 39, 41, 43, 49], 6).unwrap(),
        ];
        let first = store_draws(&conn, &draws).unwrap();
        assert_eq!(first.inserted, 2);

        let second = store_draws(&conn, &draws).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(count_draws(&conn).unwrap(), 2);
    }
}
