use std::collections::BTreeMap;

use serde::{de, Deserialize, Deserializer, Serialize};

use megasena_db::models::{overlap, Ticket};

use crate::config::ScoringPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketHits {
    pub id: String,
    pub numbers: Vec<u8>,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitSummary {
    pub max_hits: usize,
    #[serde(alias = "count_ge4")]
    pub count_ge_low: usize,
    #[serde(alias = "count_ge5")]
    pub count_ge_high: usize,
    #[serde(alias = "count_eq6")]
    pub count_full: usize,
    pub score: u64,
    /// nombre de points -> nombre de jeux
    #[serde(alias = "hist_hits_count", deserialize_with = "histogram_from_text_keys")]
    pub histogram: BTreeMap<usize, usize>,
}

/// Les clés JSON sont des chaînes ("4": 2) ; elles restent des chaînes une fois
/// le résumé aplati dans un enregistrement du journal.
fn histogram_from_text_keys<'de, D>(deserializer: D) -> Result<BTreeMap<usize, usize>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, usize>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, count)| {
            key.trim()
                .parse::<usize>()
                .map(|hits| (hits, count))
                .map_err(|_| de::Error::custom(format!("clé d'histogramme invalide : {:?}", key)))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    pub tickets: Vec<TicketHits>,
    pub summary: HitSummary,
}

/// Compare chaque jeu au tirage. Aucun aléa, aucun effet de bord.
///
/// Un jeu est « complet » quand ses points atteignent `min(taille du jeu, taille du tirage)`.
pub fn score_portfolio(drawn: &[u8], tickets: &[Ticket], policy: &ScoringPolicy) -> ScoreCard {
    let per_ticket: Vec<TicketHits> = tickets
        .iter()
        .map(|t| TicketHits {
            id: t.id.clone(),
            numbers: t.numbers.clone(),
            hits: overlap(&t.numbers, drawn),
        })
        .collect();

    let widest = tickets.iter().map(|t| t.numbers.len()).max().unwrap_or(0);
    let mut histogram: BTreeMap<usize, usize> = (0..=widest).map(|k| (k, 0)).collect();
    for t in &per_ticket {
        *histogram.entry(t.hits).or_insert(0) += 1;
    }

    let max_hits = per_ticket.iter().map(|t| t.hits).max().unwrap_or(0);
    let count_ge_low = per_ticket.iter().filter(|t| t.hits >= policy.low_threshold).count();
    let count_ge_high = per_ticket.iter().filter(|t| t.hits >= policy.high_threshold).count();
    let count_full = per_ticket
        .iter()
        .filter(|t| t.hits > 0 && t.hits == t.numbers.len().min(drawn.len()))
        .count();

    let w = &policy.weights;
    let score = count_ge_low as u64 * w.ge_low as u64
        + count_ge_high as u64 * w.ge_high as u64
        + count_full as u64 * w.full as u64;

    ScoreCard {
        tickets: per_ticket,
        summary: HitSummary {
            max_hits,
            count_ge_low,
            count_ge_high,
            count_full,
            score,
            histogram,
        },
    }
}
