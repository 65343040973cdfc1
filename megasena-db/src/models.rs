use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const GAME_TAG: &str = "megasena";
pub const MIN_NUMBER: u8 = 1;
pub const MAX_NUMBER: u8 = 60;
pub const POOL_SIZE: usize = MAX_NUMBER as usize;

pub const DEFAULT_TICKET_SIZE: usize = 9;
pub const DEFAULT_DRAW_SIZE: usize = 6;
pub const DEFAULT_PORTFOLIO_SIZE: usize = 5;

/// Tirage officiel : numéro de concours, date, dezenas triées.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    #[serde(alias = "concurso")]
    pub contest: u32,
    #[serde(alias = "data")]
    pub date: String,
    #[serde(alias = "dezenas")]
    pub numbers: Vec<u8>,
}

impl Draw {
    /// Construit un tirage validé (exactement `draw_size` dezenas distinctes dans 1..=60).
    pub fn new(contest: u32, date: impl Into<String>, numbers: &[u8], draw_size: usize) -> Result<Self> {
        let numbers = validate_numbers(numbers, draw_size)?;
        Ok(Self {
            contest,
            date: date.into(),
            numbers,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub numbers: Vec<u8>,
}

impl Ticket {
    pub fn new(id: impl Into<String>, numbers: &[u8], ticket_size: usize) -> Result<Self> {
        let numbers = validate_numbers(numbers, ticket_size)?;
        Ok(Self {
            id: id.into(),
            numbers,
        })
    }
}

/// Identifiant stable d'un jeu dans un portefeuille : J01, J02, ...
pub fn ticket_id(index: usize) -> String {
    format!("J{:02}", index + 1)
}

/// Nombre de dezenas communes entre deux combinaisons.
pub fn overlap(a: &[u8], b: &[u8]) -> usize {
    a.iter().filter(|x| b.contains(x)).count()
}

/// Vérifie une combinaison et la renvoie triée. Rien n'est filtré ni tronqué :
/// toute combinaison invalide est rejetée.
pub fn validate_numbers(numbers: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    if numbers.len() != expected_len {
        bail!(
            "Combinaison invalide : {} dezenas attendues, {} obtenues ({:?})",
            expected_len,
            numbers.len(),
            numbers
        );
    }
    for &n in numbers {
        if !(MIN_NUMBER..=MAX_NUMBER).contains(&n) {
            bail!("Dezena {} hors limites ({}-{})", n, MIN_NUMBER, MAX_NUMBER);
        }
    }
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            bail!("Dezena en double : {}", pair[0]);
        }
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_numbers_ok_and_sorted() {
        let nums = validate_numbers(&[60, 1, 33, 7, 12, 45], 6).unwrap();
        assert_eq!(nums, vec![1, 7, 12, 33, 45, 60]);
    }

    #[test]
    fn test_validate_numbers_out_of_range() {
        assert!(validate_numbers(&[0, 2, 3, 4, 5, 6], 6).is_err());
        assert!(validate_numbers(&[1, 2, 3, 4, 5, 61], 6).is_err());
    }

    #[test]
    fn test_validate_numbers_duplicate() {
        assert!(validate_numbers(&[1, 1, 3, 4, 5, 6], 6).is_err());
    }

    #[test]
    fn test_validate_numbers_wrong_length_is_rejected() {
        assert!(validate_numbers(&[1, 2, 3, 4, 5], 6).is_err());
        assert!(validate_numbers(&[1, 2, 3, 4, 5, 6, 7], 6).is_err());
    }

    #[test]
    fn test_ticket_id_format() {
        assert_eq!(ticket_id(0), "J01");
        assert_eq!(ticket_id(4), "J05");
        assert_eq!(ticket_id(14), "J15");
    }

    #[test]
    fn test_overlap() {
        assert_eq!(overlap(&[1, 2, 3, 4, 7, 8, 9, 10, 11], &[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(overlap(&[1, 2, 3], &[4, 5, 6]), 0);
    }

    #[test]
    fn test_draw_new_sorts() {
        let draw = Draw::new(2800, "2024-12-31", &[6, 5, 4, 3, 2, 1], 6).unwrap();
        assert_eq!(draw.numbers, vec![1, 2, 3, 4, 5, 6]);
        assert!(Draw::new(2800, "2024-12-31", &[1, 2, 3], 6).is_err());
    }

    #[test]
    fn test_draw_accepts_portuguese_field_names() {
        let json = r#"{"concurso": 2801, "data": "2025-01-02", "dezenas": [3, 14, 15, 26, 35, 59]}"#;
        let draw: Draw = serde_json::from_str(json).unwrap();
        assert_eq!(draw.contest, 2801);
        assert_eq!(draw.numbers.len(), 6);
    }
}
