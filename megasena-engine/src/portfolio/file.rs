use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};

use megasena_db::models::{validate_numbers, Ticket, GAME_TAG};

use super::Portfolio;
use crate::config::GameConfig;

/// Écart entre la taille déclarée (`n_games`) et le nombre réel de jeux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatch {
    /// `None` : champ absent ou illisible.
    pub declared: Option<usize>,
    pub actual: usize,
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.declared {
            Some(declared) => write!(
                f,
                "n_games déclaré = {}, mais {} jeux présents (taille réelle retenue)",
                declared, self.actual
            ),
            None => write!(
                f,
                "n_games absent ou invalide, {} jeux présents (taille réelle retenue)",
                self.actual
            ),
        }
    }
}

/// Portefeuille relu et validé, avec sa taille effective.
#[derive(Debug, Clone)]
pub struct LoadedPortfolio {
    pub portfolio: Portfolio,
    pub size: usize,
    pub warning: Option<SizeMismatch>,
}

/// Taille effective : toujours la longueur de la liste, jamais la valeur déclarée.
pub fn effective_size(portfolio: &Portfolio) -> (usize, Option<SizeMismatch>) {
    let actual = portfolio.tickets.len();
    let warning = (portfolio.declared_size != Some(actual)).then_some(SizeMismatch {
        declared: portfolio.declared_size,
        actual,
    });
    (actual, warning)
}

pub fn save_portfolio(portfolio: &Portfolio, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(portfolio)?;
    std::fs::write(path, json).with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(())
}

/// Valide chaque champ contre la configuration du jeu. Seul l'écart de taille
/// déclarée est toléré (renvoyé comme avertissement).
pub fn validate_portfolio(portfolio: Portfolio, game: &GameConfig) -> Result<LoadedPortfolio> {
    if !portfolio.game.eq_ignore_ascii_case(GAME_TAG) {
        bail!("Portefeuille pour le jeu '{}', '{}' attendu", portfolio.game, GAME_TAG);
    }
    if portfolio.ticket_size != game.ticket_size {
        bail!(
            "ticket_size = {}, {} attendu",
            portfolio.ticket_size,
            game.ticket_size
        );
    }
    if portfolio.draw_size != game.draw_size {
        bail!("draw_size = {}, {} attendu", portfolio.draw_size, game.draw_size);
    }
    if portfolio.tickets.is_empty() {
        bail!("Portefeuille sans aucun jeu");
    }

    let tickets = portfolio
        .tickets
        .iter()
        .map(|t| {
            let id = if t.id.trim().is_empty() { "J??".to_string() } else { t.id.trim().to_string() };
            let numbers = validate_numbers(&t.numbers, game.ticket_size)
                .with_context(|| format!("Jeu {} invalide", id))?;
            Ok(Ticket { id, numbers })
        })
        .collect::<Result<Vec<_>>>()?;

    let portfolio = Portfolio { tickets, ..portfolio };
    let (size, warning) = effective_size(&portfolio);

    Ok(LoadedPortfolio {
        portfolio,
        size,
        warning,
    })
}

pub fn load_portfolio(path: &Path, game: &GameConfig) -> Result<LoadedPortfolio> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Portefeuille introuvable : {:?}", path))?;
    let portfolio: Portfolio = serde_json::from_str(&json)
        .with_context(|| format!("JSON invalide dans {:?}", path))?;
    let loaded = validate_portfolio(portfolio, game)
        .with_context(|| format!("Portefeuille {:?} rejeté", path))?;
    if let Some(mismatch) = &loaded.warning {
        log::warn!("{:?} : {}", path, mismatch);
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_portfolio() -> Portfolio {
        Portfolio {
            game: "megasena".to_string(),
            ticket_size: 9,
            draw_size: 6,
            declared_size: Some(2),
            objective: "maximize_hit_rate_ge4".to_string(),
            seed: Some(20240101),
            tickets: vec![
                Ticket { id: "J01".to_string(), numbers: vec![1, 2, 3, 4, 7, 8, 9, 10, 11] },
                Ticket { id: "J02".to_string(), numbers: vec![12, 20, 21, 30, 33, 41, 50, 55, 60] },
            ],
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/jogos_gerados.json");
        let portfolio = sample_portfolio();
        save_portfolio(&portfolio, &path).unwrap();

        let loaded = load_portfolio(&path, &GameConfig::default()).unwrap();
        assert_eq!(loaded.portfolio, portfolio);
        assert_eq!(loaded.size, 2);
        assert!(loaded.warning.is_none());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(sample_portfolio()).unwrap();
        assert_eq!(json["n_games"], 2);
        assert_eq!(json["games"][0]["id"], "J01");
        assert_eq!(json["game"], "megasena");
    }

    #[test]
    fn test_declared_size_mismatch_only_warns() {
        let mut portfolio = sample_portfolio();
        portfolio.declared_size = Some(15);
        let loaded = validate_portfolio(portfolio, &GameConfig::default()).unwrap();
        assert_eq!(loaded.size, 2);
        assert_eq!(loaded.warning, Some(SizeMismatch { declared: Some(15), actual: 2 }));
    }

    #[test]
    fn test_missing_or_textual_n_games_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jogos_gerados.json");
        let games = r#"[{"id": "J01", "numbers": [1, 2, 3, 4, 7, 8, 9, 10, 11]}]"#;

        let without = format!(
            r#"{{"game": "megasena", "ticket_size": 9, "draw_size": 6, "objective": "x", "games": {}}}"#,
            games
        );
        std::fs::write(&path, without).unwrap();
        let loaded = load_portfolio(&path, &GameConfig::default()).unwrap();
        assert_eq!(loaded.size, 1);
        assert_eq!(loaded.portfolio.declared_size, None);
        assert_eq!(loaded.warning, Some(SizeMismatch { declared: None, actual: 1 }));

        let textual = format!(
            r#"{{"game": "megasena", "ticket_size": 9, "draw_size": 6, "n_games": "1", "objective": "x", "games": {}}}"#,
            games
        );
        std::fs::write(&path, textual).unwrap();
        let loaded = load_portfolio(&path, &GameConfig::default()).unwrap();
        assert_eq!(loaded.size, 1);
        assert!(loaded.warning.is_none());

        let garbage = format!(
            r#"{{"game": "megasena", "ticket_size": 9, "draw_size": 6, "n_games": [5], "objective": "x", "games": {}}}"#,
            games
        );
        std::fs::write(&path, garbage).unwrap();
        let loaded = load_portfolio(&path, &GameConfig::default()).unwrap();
        assert_eq!(loaded.size, 1);
        assert!(loaded.warning.is_some());
    }

    #[test]
    fn test_wrong_game_rejected() {
        let mut portfolio = sample_portfolio();
        portfolio.game = "lotofacil".to_string();
        assert!(validate_portfolio(portfolio, &GameConfig::default()).is_err());

        let mut portfolio = sample_portfolio();
        portfolio.game = "MegaSena".to_string();
        assert!(validate_portfolio(portfolio, &GameConfig::default()).is_ok());
    }

    #[test]
    fn test_size_fields_rejected() {
        let mut portfolio = sample_portfolio();
        portfolio.ticket_size = 6;
        assert!(validate_portfolio(portfolio, &GameConfig::default()).is_err());

        let mut portfolio = sample_portfolio();
        portfolio.draw_size = 5;
        assert!(validate_portfolio(portfolio, &GameConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_ticket_rejected() {
        let mut portfolio = sample_portfolio();
        portfolio.tickets[1].numbers = vec![1, 1, 2, 3, 4, 5, 6, 7, 8];
        let err = validate_portfolio(portfolio, &GameConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("J02"));

        let mut portfolio = sample_portfolio();
        portfolio.tickets[0].numbers.pop();
        assert!(validate_portfolio(portfolio, &GameConfig::default()).is_err());
    }

    #[test]
    fn test_empty_portfolio_rejected() {
        let mut portfolio = sample_portfolio();
        portfolio.tickets.clear();
        assert!(validate_portfolio(portfolio, &GameConfig::default()).is_err());
    }

    #[test]
    fn test_unsorted_ticket_is_normalized_and_blank_id_replaced() {
        let mut portfolio = sample_portfolio();
        portfolio.tickets[0].numbers = vec![11, 10, 9, 8, 7, 4, 3, 2, 1];
        portfolio.tickets[1].id = "  ".to_string();
        let loaded = validate_portfolio(portfolio, &GameConfig::default()).unwrap();
        assert_eq!(loaded.portfolio.tickets[0].numbers, vec![1, 2, 3, 4, 7, 8, 9, 10, 11]);
        assert_eq!(loaded.portfolio.tickets[1].id, "J??");
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_portfolio(&dir.path().join("absent.json"), &GameConfig::default()).is_err());
    }
}
