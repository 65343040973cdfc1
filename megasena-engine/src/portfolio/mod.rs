pub mod file;

use std::collections::HashSet;

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use megasena_db::models::{overlap, ticket_id, Ticket, GAME_TAG, POOL_SIZE};

use crate::config::{GameConfig, GenerationConfig};
use crate::features::FrequencyVector;
use crate::sampler::{uniform_sample, weighted_sample};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub game: String,
    pub ticket_size: usize,
    pub draw_size: usize,
    /// Taille déclarée ; la taille effective est toujours `tickets.len()`.
    /// Absente ou illisible : `None`, jamais une erreur de chargement.
    #[serde(
        rename = "n_games",
        default,
        deserialize_with = "lenient_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub declared_size: Option<usize>,
    pub objective: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(rename = "games")]
    pub tickets: Vec<Ticket>,
}

/// Entier ou chaîne numérique ; toute autre valeur est ignorée.
fn lenient_size<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let size = match &raw {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    if let (Some(value), None) = (&raw, size) {
        log::warn!("n_games illisible ({}), ignoré", value);
    }
    Ok(size)
}

/// Provenance des jeux retenus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub candidates: usize,
    /// Jeux retenus en respectant le plafond d'intersection.
    pub diverse: usize,
    /// Jeux distincts ajoutés sans contrôle d'intersection.
    pub relaxed: usize,
    /// Jeux tirés uniformément faute de candidats.
    pub synthesized: usize,
}

impl BuildReport {
    pub fn is_fully_diverse(&self) -> bool {
        self.relaxed == 0 && self.synthesized == 0
    }
}

/// Sélection gloutonne dans l'ordre de génération : un candidat est retenu si
/// son intersection avec chaque jeu déjà retenu est <= `max_intersection`.
fn select_diverse(candidates: &[Vec<u8>], count: usize, max_intersection: usize) -> Vec<Vec<u8>> {
    let mut selected: Vec<Vec<u8>> = Vec::with_capacity(count);

    for candidate in candidates {
        if selected.len() >= count {
            break;
        }
        let compatible = selected.iter().all(|s| overlap(candidate, s) <= max_intersection);
        if compatible {
            selected.push(candidate.clone());
        }
    }

    selected
}

/// Fallback : complète avec des candidats distincts, sans contrôle d'intersection.
fn fill_distinct(candidates: &[Vec<u8>], selected: &mut Vec<Vec<u8>>, count: usize) -> usize {
    let mut seen: HashSet<Vec<u8>> = selected.iter().cloned().collect();
    let mut added = 0;

    for candidate in candidates {
        if selected.len() >= count {
            break;
        }
        if seen.insert(candidate.clone()) {
            selected.push(candidate.clone());
            added += 1;
        }
    }

    added
}

/// Construit exactement `game.portfolio_size` jeux valides à partir des poids.
pub fn build_portfolio(
    frequencies: &FrequencyVector,
    game: &GameConfig,
    generation: &GenerationConfig,
    rng: &mut impl Rng,
) -> Result<(Portfolio, BuildReport)> {
    let count = game.portfolio_size;
    let mut report = BuildReport {
        candidates: generation.candidates,
        ..BuildReport::default()
    };

    let candidates = (0..generation.candidates)
        .map(|_| weighted_sample(frequencies.weights(), game.ticket_size, rng))
        .collect::<Result<Vec<_>>>()?;

    let mut selected = select_diverse(&candidates, count, generation.max_intersection);
    report.diverse = selected.len();

    if selected.len() < count {
        report.relaxed = fill_distinct(&candidates, &mut selected, count);
        log::warn!(
            "Plafond d'intersection {} non atteignable : {} jeux ajoutés sans contrôle",
            generation.max_intersection,
            report.relaxed
        );
    }

    while selected.len() < count {
        selected.push(uniform_sample(POOL_SIZE, game.ticket_size, rng)?);
        report.synthesized += 1;
    }
    if report.synthesized > 0 {
        log::warn!("Pool épuisé : {} jeux tirés uniformément", report.synthesized);
    }

    let tickets = selected
        .iter()
        .enumerate()
        .map(|(i, numbers)| {
            let id = ticket_id(i);
            Ticket::new(id.clone(), numbers, game.ticket_size)
                .with_context(|| format!("Jeu {} invalide", id))
        })
        .collect::<Result<Vec<_>>>()?;

    let portfolio = Portfolio {
        game: GAME_TAG.to_string(),
        ticket_size: game.ticket_size,
        draw_size: game.draw_size,
        declared_size: Some(tickets.len()),
        objective: generation.objective.clone(),
        seed: None,
        tickets,
    };

    Ok((portfolio, report))
}
