use std::path::Path;

use anyhow::{bail, Context, Result};

use megasena_db::models::{Draw, POOL_SIZE};

use crate::sampler::WEIGHT_EPSILON;

/// Poids normalisés des 60 dezenas (somme = 1, tous strictement positifs).
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyVector {
    weights: Vec<f64>,
}

impl FrequencyVector {
    pub fn uniform() -> Self {
        Self {
            weights: vec![1.0 / POOL_SIZE as f64; POOL_SIZE],
        }
    }

    /// Normalise des scores bruts. Les valeurs nulles, négatives ou non finies
    /// sont ramenées à `WEIGHT_EPSILON` pour que chaque dezena reste tirable.
    pub fn from_scores(scores: &[f64]) -> Result<Self> {
        if scores.len() != POOL_SIZE {
            bail!("{} scores attendus, {} reçus", POOL_SIZE, scores.len());
        }
        let floored: Vec<f64> = scores
            .iter()
            .map(|&s| if s.is_finite() && s > WEIGHT_EPSILON { s } else { WEIGHT_EPSILON })
            .collect();
        let total: f64 = floored.iter().sum();
        if !total.is_finite() {
            bail!("Somme des scores non finie");
        }
        Ok(Self {
            weights: floored.iter().map(|w| w / total).collect(),
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weight_of(&self, number: u8) -> Option<f64> {
        if number == 0 {
            return None;
        }
        self.weights.get((number - 1) as usize).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub number: u8,
    pub frequency: u32,
}

/// Compte les apparitions de chaque dezena sur les `window` tirages les plus récents.
/// `draws[0]` = tirage le plus récent.
pub fn compute_frequencies(draws: &[Draw], window: usize) -> Vec<FeatureRow> {
    let mut counts = vec![0u32; POOL_SIZE];
    for draw in draws.iter().take(window) {
        for &n in &draw.numbers {
            let idx = n as usize;
            if (1..=POOL_SIZE).contains(&idx) {
                counts[idx - 1] += 1;
            }
        }
    }

    (1..=POOL_SIZE as u8)
        .map(|n| FeatureRow {
            number: n,
            frequency: counts[(n - 1) as usize],
        })
        .collect()
}

pub fn write_features_csv(path: &Path, rows: &[FeatureRow], column: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Impossible d'écrire {:?}", path))?;
    writer.write_record(["dezena", column])?;
    for row in rows {
        writer.write_record([row.number.to_string(), row.frequency.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Charge le fichier de fréquences. Fichier absent ou colonne manquante :
/// repli sur des poids uniformes.
pub fn load_frequency_vector(path: &Path, column: &str) -> Result<FrequencyVector> {
    if !path.exists() {
        log::warn!("Fichier de fréquences {:?} absent, poids uniformes", path);
        return Ok(FrequencyVector::uniform());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;

    let headers = reader.headers()?.clone();
    let Some(value_idx) = headers.iter().position(|h| h == column) else {
        log::warn!("Colonne '{}' absente de {:?}, poids uniformes", column, path);
        return Ok(FrequencyVector::uniform());
    };
    let number_idx = headers.iter().position(|h| h == "dezena");

    let mut scores = vec![0.0f64; POOL_SIZE];
    let mut rows = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Ligne {} illisible dans {:?}", line + 2, path))?;
        let raw = record.get(value_idx).unwrap_or_default();
        let value: f64 = raw
            .parse()
            .with_context(|| format!("Valeur '{}' invalide (ligne {})", raw, line + 2))?;

        match number_idx {
            Some(idx) => {
                let raw_number = record.get(idx).unwrap_or_default();
                let number: i64 = raw_number
                    .parse()
                    .with_context(|| format!("Dezena '{}' invalide (ligne {})", raw_number, line + 2))?;
                if (1..=POOL_SIZE as i64).contains(&number) {
                    scores[(number - 1) as usize] = value;
                } else {
                    log::warn!("Dezena {} hors limites ignorée (ligne {})", number, line + 2);
                }
            }
            None => {
                if rows >= POOL_SIZE {
                    bail!("Plus de {} lignes sans colonne 'dezena' dans {:?}", POOL_SIZE, path);
                }
                scores[rows] = value;
            }
        }
        rows += 1;
    }

    if number_idx.is_none() && rows < POOL_SIZE {
        log::warn!("{} lignes sur {} dans {:?}, dezenas manquantes au plancher", rows, POOL_SIZE, path);
    }

    FrequencyVector::from_scores(&scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draws() -> Vec<Draw> {
        vec![
            Draw { contest: 3, date: "2024-01-03".into(), numbers: vec![1, 2, 3, 4, 5, 6] },
            Draw { contest: 2, date: "2024-01-02".into(), numbers: vec![1, 10, 20, 30, 40, 50] },
            Draw { contest: 1, date: "2024-01-01".into(), numbers: vec![1, 11, 21, 31, 41, 60] },
        ]
    }

    #[test]
    fn test_uniform_sums_to_one() {
        let v = FrequencyVector::uniform();
        let sum: f64 = v.weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(v.weights().len(), 60);
    }

    #[test]
    fn test_from_scores_floors_zero_and_negative() {
        let mut scores = vec![0.0; 60];
        scores[0] = 10.0;
        scores[1] = -3.0;
        scores[2] = f64::NAN;
        let v = FrequencyVector::from_scores(&scores).unwrap();
        let sum: f64 = v.weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "Sum = {}", sum);
        assert!(v.weights().iter().all(|&w| w > 0.0));
        assert!(v.weight_of(1).unwrap() > v.weight_of(2).unwrap());
        assert_eq!(v.weight_of(2), v.weight_of(3));
    }

    #[test]
    fn test_from_scores_wrong_length() {
        assert!(FrequencyVector::from_scores(&[1.0; 59]).is_err());
    }

    #[test]
    fn test_compute_frequencies_window() {
        let rows = compute_frequencies(&draws(), 2);
        assert_eq!(rows.len(), 60);
        assert_eq!(rows[0].frequency, 2); // dezena 1 dans les 2 plus récents
        assert_eq!(rows[59].frequency, 0); // 60 seulement dans le 3e
        let all = compute_frequencies(&draws(), 100);
        assert_eq!(all[59].frequency, 1);
        assert_eq!(all.iter().map(|r| r.frequency).sum::<u32>(), 18);
    }

    #[test]
    fn test_features_csv_roundtrip_preserves_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features/dezenas.csv");
        let rows = compute_frequencies(&draws(), 100);
        write_features_csv(&path, &rows, "freq_100").unwrap();

        let v = load_frequency_vector(&path, "freq_100").unwrap();
        assert!(v.weight_of(1).unwrap() > v.weight_of(2).unwrap());
        assert!(v.weight_of(2).unwrap() > v.weight_of(7).unwrap());
    }

    #[test]
    fn test_missing_file_falls_back_to_uniform() {
        let dir = tempfile::tempdir().unwrap();
        let v = load_frequency_vector(&dir.path().join("absent.csv"), "freq_100").unwrap();
        assert_eq!(v, FrequencyVector::uniform());
    }

    #[test]
    fn test_missing_column_falls_back_to_uniform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dezenas.csv");
        std::fs::write(&path, "dezena,other\n1,5\n2,7\n").unwrap();
        let v = load_frequency_vector(&path, "freq_100").unwrap();
        assert_eq!(v, FrequencyVector::uniform());
    }

    #[test]
    fn test_rows_without_number_column_are_positional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dezenas.csv");
        let mut content = String::from("freq_100\n");
        for i in 1..=60 {
            content.push_str(&format!("{}\n", if i == 60 { 50 } else { 1 }));
        }
        std::fs::write(&path, content).unwrap();
        let v = load_frequency_vector(&path, "freq_100").unwrap();
        assert!(v.weight_of(60).unwrap() > v.weight_of(1).unwrap());
    }

    #[test]
    fn test_unparsable_value_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dezenas.csv");
        std::fs::write(&path, "dezena,freq_100\n1,abc\n").unwrap();
        assert!(load_frequency_vector(&path, "freq_100").is_err());
    }
}
