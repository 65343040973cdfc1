use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use megasena_db::models::{
    DEFAULT_DRAW_SIZE, DEFAULT_PORTFOLIO_SIZE, DEFAULT_TICKET_SIZE, POOL_SIZE,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub ticket_size: usize,
    pub draw_size: usize,
    pub portfolio_size: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ticket_size: DEFAULT_TICKET_SIZE,
            draw_size: DEFAULT_DRAW_SIZE,
            portfolio_size: DEFAULT_PORTFOLIO_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Taille du pool de candidats tirés avant la sélection.
    pub candidates: usize,
    /// Intersection maximale autorisée entre deux jeux.
    pub max_intersection: usize,
    pub objective: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            candidates: 5000,
            max_intersection: 4,
            objective: "maximize_hit_rate_ge4".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub ge_low: u32,
    pub ge_high: u32,
    pub full: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            ge_low: 1,
            ge_high: 5,
            full: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub low_threshold: usize,
    pub high_threshold: usize,
    pub weights: ScoreWeights,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            low_threshold: 4,
            high_threshold: 5,
            weights: ScoreWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Nombre de tirages récents comptés.
    pub window: u32,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self { window: 100 }
    }
}

impl FeaturesConfig {
    pub fn column_name(&self) -> String {
        format!("freq_{}", self.window)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub rolling_window: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { rolling_window: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub database: PathBuf,
    pub features: PathBuf,
    pub portfolio: PathBuf,
    pub ledger: PathBuf,
    pub last_result: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("data/megasena.db"),
            features: PathBuf::from("data/features/dezenas.csv"),
            portfolio: PathBuf::from("out/jogos_gerados.json"),
            ledger: PathBuf::from("data/performance_log.jsonl"),
            last_result: PathBuf::from("data/last_result.json"),
        }
    }
}

impl PathsConfig {
    /// Tous les chemins relatifs sont résolus depuis `root`.
    pub fn rooted_at(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { root.join(p) };
        Self {
            database: join(&self.database),
            features: join(&self.features),
            portfolio: join(&self.portfolio),
            ledger: join(&self.ledger),
            last_result: join(&self.last_result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://loteriascaixa-api.herokuapp.com/api/megasena".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub game: GameConfig,
    pub generation: GenerationConfig,
    pub scoring: ScoringPolicy,
    pub features: FeaturesConfig,
    pub ledger: LedgerConfig,
    pub paths: PathsConfig,
    pub api: ApiConfig,
}

impl EngineConfig {
    /// Charge la configuration JSON si un chemin est fourni, sinon les valeurs par défaut.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let json = std::fs::read_to_string(p)
                    .with_context(|| format!("Impossible de lire {:?}", p))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("JSON invalide dans {:?}", p))?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.game;
        if g.ticket_size == 0 || g.ticket_size > POOL_SIZE {
            bail!("ticket_size doit être dans 1..={} (reçu {})", POOL_SIZE, g.ticket_size);
        }
        // la table `draws` a exactement d1..d6
        if g.draw_size != DEFAULT_DRAW_SIZE {
            bail!("draw_size doit valoir {} (reçu {})", DEFAULT_DRAW_SIZE, g.draw_size);
        }
        if g.portfolio_size == 0 {
            bail!("portfolio_size doit être > 0");
        }
        if self.scoring.low_threshold > self.scoring.high_threshold {
            bail!(
                "Seuil bas ({}) supérieur au seuil haut ({})",
                self.scoring.low_threshold,
                self.scoring.high_threshold
            );
        }
        if self.features.window == 0 {
            bail!("La fenêtre de fréquences doit être > 0");
        }
        if self.api.timeout_secs == 0 {
            bail!("timeout_secs doit être > 0");
        }
        Ok(())
    }
}
