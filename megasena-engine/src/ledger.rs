use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use megasena_db::models::{Draw, GAME_TAG};

use crate::scoring::{HitSummary, ScoreCard, TicketHits};

/// Instantané des N derniers événements du journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingMetrics {
    pub window: usize,
    pub events: usize,
    pub total_tickets: usize,
    pub avg_max_hits: f64,
    pub avg_score: f64,
    /// Σ count_ge_low / Σ portfolio_size (pondéré par la taille de chaque portefeuille).
    pub rate_ge_low: f64,
}

/// Une comparaison tirage/portefeuille. Écrite une seule fois, jamais modifiée.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringEvent {
    pub timestamp_utc: String,
    pub game: String,
    #[serde(alias = "concurso")]
    pub contest: u32,
    #[serde(alias = "data_sorteio")]
    pub draw_date: String,
    #[serde(alias = "dezenas_sorteadas")]
    pub drawn_numbers: Vec<u8>,
    pub ticket_size: usize,
    #[serde(alias = "n_games")]
    pub portfolio_size: usize,
    #[serde(flatten)]
    pub summary: HitSummary,
    #[serde(alias = "games")]
    pub tickets: Vec<TicketHits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling: Option<RollingMetrics>,
}

impl ScoringEvent {
    pub fn new(draw: &Draw, ticket_size: usize, portfolio_size: usize, card: ScoreCard) -> Self {
        Self {
            timestamp_utc: chrono::Utc::now().to_rfc3339(),
            game: GAME_TAG.to_string(),
            contest: draw.contest,
            draw_date: draw.date.clone(),
            drawn_numbers: draw.numbers.clone(),
            ticket_size,
            portfolio_size,
            summary: card.summary,
            tickets: card.tickets,
            rolling: None,
        }
    }
}

#[derive(Deserialize)]
struct LedgerKey {
    #[serde(alias = "concurso")]
    contest: u32,
}

/// Moyennes sur une fenêtre d'événements. `None` si aucun jeu n'y figure.
pub fn summarize_window(events: &[ScoringEvent], window: usize) -> Option<RollingMetrics> {
    let total_tickets: usize = events.iter().map(|e| e.portfolio_size).sum();
    if events.is_empty() || total_tickets == 0 {
        return None;
    }

    let n = events.len() as f64;
    let avg_max_hits = events.iter().map(|e| e.summary.max_hits as f64).sum::<f64>() / n;
    let avg_score = events.iter().map(|e| e.summary.score as f64).sum::<f64>() / n;
    let ge_low: usize = events.iter().map(|e| e.summary.count_ge_low).sum();

    Some(RollingMetrics {
        window,
        events: events.len(),
        total_tickets,
        avg_max_hits,
        avg_score,
        rate_ge_low: ge_low as f64 / total_tickets as f64,
    })
}

/// Journal JSONL en ajout seul, une ligne par concours.
/// Un seul écrivain à la fois ; aucun verrou de fichier.
#[derive(Debug, Clone)]
pub struct PerformanceLedger {
    path: PathBuf,
}

impl PerformanceLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Impossible de lire le journal {:?}", self.path))?;
        Ok(bytes
            .split(|&b| b == b'\n')
            .map(|line| String::from_utf8_lossy(line).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Vrai si un enregistrement lisible porte ce concours. Les lignes
    /// illisibles (fragment tronqué compris) ne comptent jamais.
    pub fn already_logged(&self, contest: u32) -> Result<bool> {
        Ok(self
            .read_lines()?
            .iter()
            .filter_map(|line| serde_json::from_str::<LedgerKey>(line).ok())
            .any(|key| key.contest == contest))
    }

    /// Ajoute exactement une ligne. Si le fichier se termine par un fragment
    /// sans saut de ligne, on le referme d'abord.
    pub fn append(&self, event: &ScoringEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Impossible d'ouvrir le journal {:?}", self.path))?;

        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                log::warn!("Journal {:?} terminé par une ligne tronquée", self.path);
                file.write_all(b"\n")?;
            }
        }

        let line = serde_json::to_string(event)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_data()?;
        Ok(())
    }

    /// Les `window` derniers enregistrements lisibles (au plus).
    pub fn recent_events(&self, window: usize) -> Result<Vec<ScoringEvent>> {
        let lines = self.read_lines()?;
        let start = lines.len().saturating_sub(window);
        Ok(lines[start..]
            .iter()
            .enumerate()
            .filter_map(|(i, line)| match serde_json::from_str::<ScoringEvent>(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!("Ligne {} du journal ignorée : {}", start + i + 1, e);
                    None
                }
            })
            .collect())
    }

    pub fn rolling_metrics(&self, window: usize) -> Result<Option<RollingMetrics>> {
        if window == 0 {
            return Ok(None);
        }
        Ok(summarize_window(&self.recent_events(window)?, window))
    }

    /// Fenêtre glissante incluant un événement pas encore écrit.
    pub fn rolling_metrics_with(&self, window: usize, pending: &ScoringEvent) -> Result<Option<RollingMetrics>> {
        if window == 0 {
            return Ok(None);
        }
        let mut events = self.recent_events(window - 1)?;
        events.push(pending.clone());
        Ok(summarize_window(&events, window))
    }
}
