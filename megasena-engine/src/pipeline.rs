use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;

use megasena_db::db::fetch_last_draws;
use megasena_db::models::validate_numbers;
use megasena_db::rusqlite::Connection;

use crate::config::EngineConfig;
use crate::features::{compute_frequencies, load_frequency_vector, write_features_csv, FeatureRow};
use crate::fetch::{write_cached_result, DrawSource};
use crate::ledger::{PerformanceLedger, ScoringEvent};
use crate::portfolio::file::{load_portfolio, save_portfolio};
use crate::portfolio::{build_portfolio, BuildReport, Portfolio};
use crate::scoring::{score_portfolio, ScoreCard};

/// Fréquences sur les `features.window` derniers tirages de la base, écrites en CSV.
pub fn run_features(conn: &Connection, config: &EngineConfig) -> Result<Vec<FeatureRow>> {
    let window = config.features.window;
    let draws = fetch_last_draws(conn, window)?;
    if (draws.len() as u32) < window {
        log::warn!("Seulement {} tirages disponibles (fenêtre {})", draws.len(), window);
    }
    let rows = compute_frequencies(&draws, window as usize);
    write_features_csv(&config.paths.features, &rows, &config.features.column_name())?;
    log::info!("Fréquences écrites dans {:?}", config.paths.features);
    Ok(rows)
}

/// Poids -> portefeuille -> fichier. Même graine, même portefeuille.
pub fn run_generate(config: &EngineConfig, seed: u64) -> Result<(Portfolio, BuildReport)> {
    let frequencies = load_frequency_vector(&config.paths.features, &config.features.column_name())?;
    let mut rng = StdRng::seed_from_u64(seed);
    let (mut portfolio, report) =
        build_portfolio(&frequencies, &config.game, &config.generation, &mut rng)?;
    portfolio.seed = Some(seed);

    save_portfolio(&portfolio, &config.paths.portfolio)?;
    log::info!(
        "{} jeux sauvegardés dans {:?} (graine {})",
        portfolio.tickets.len(),
        config.paths.portfolio,
        seed
    );
    Ok((portfolio, report))
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompareOutcome {
    AlreadyLogged { contest: u32 },
    Scored(Box<ScoringEvent>),
}

/// Récupère le dernier tirage, le met en cache, puis le note s'il n'est pas déjà au journal.
pub fn run_compare(source: &dyn DrawSource, config: &EngineConfig) -> Result<CompareOutcome> {
    let draw = source
        .latest_draw()
        .context("Impossible de récupérer le dernier résultat")?;

    write_cached_result(&config.paths.last_result, &draw)?;
    log::info!("Concours {} mis en cache dans {:?}", draw.contest, config.paths.last_result);

    let ledger = PerformanceLedger::new(&config.paths.ledger);
    if ledger.already_logged(draw.contest)? {
        log::info!("Concours {} déjà enregistré, rien à faire", draw.contest);
        return Ok(CompareOutcome::AlreadyLogged { contest: draw.contest });
    }

    let loaded = load_portfolio(&config.paths.portfolio, &config.game)?;
    let card = score_portfolio(&draw.numbers, &loaded.portfolio.tickets, &config.scoring);

    let mut event = ScoringEvent::new(&draw, loaded.portfolio.ticket_size, loaded.size, card);
    event.rolling = ledger.rolling_metrics_with(config.ledger.rolling_window, &event)?;
    ledger.append(&event)?;
    log::info!("Concours {} ajouté au journal {:?}", draw.contest, ledger.path());

    Ok(CompareOutcome::Scored(Box::new(event)))
}

/// Note le portefeuille courant contre un tirage saisi à la main. N'écrit rien.
pub fn score_manual(numbers: &[u8], config: &EngineConfig) -> Result<ScoreCard> {
    let drawn = validate_numbers(numbers, config.game.draw_size).context("Tirage saisi invalide")?;
    let loaded = load_portfolio(&config.paths.portfolio, &config.game)?;
    Ok(score_portfolio(&drawn, &loaded.portfolio.tickets, &config.scoring))
}
