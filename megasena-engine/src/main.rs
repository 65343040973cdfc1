use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use megasena_db::db::{count_draws, fetch_last_draws, latest_contest, migrate, open_db};
use megasena_db::rusqlite::Connection;
use megasena_engine::config::EngineConfig;
use megasena_engine::display::{
    display_draws, display_event, display_features, display_hits, display_import_summary,
    display_portfolio, display_rolling,
};
use megasena_engine::fetch::{read_cached_result, HttpDrawSource};
use megasena_engine::ingest::{import_csv, store_draws};
use megasena_engine::ledger::PerformanceLedger;
use megasena_engine::pipeline::{run_compare, run_features, run_generate, score_manual, CompareOutcome};
use megasena_engine::sampler::date_seed;

#[derive(Parser)]
#[command(name = "megasena", about = "Générateur de portefeuilles Mega-Sena et suivi des performances")]
struct Cli {
    /// Fichier de configuration JSON
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer l'historique depuis un CSV (concurso,data,d1..d6)
    Import {
        /// Chemin vers le fichier CSV
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Télécharger l'historique complet depuis l'API
    Ingest,

    /// Lister les derniers tirages
    History {
        /// Nombre de tirages à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Calculer les fréquences des dezenas
    Features {
        /// Fenêtre d'analyse (nombre de tirages)
        #[arg(short, long)]
        window: Option<u32>,

        /// Fichier CSV de sortie
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Générer un portefeuille de jeux
    Generate {
        /// Seed pour la reproductibilité (défaut : date du jour YYYYMMDD)
        #[arg(long)]
        seed: Option<u64>,

        /// Nombre de jeux
        #[arg(short = 'n', long)]
        portfolio_size: Option<usize>,

        /// Intersection maximale entre deux jeux
        #[arg(short, long)]
        max_intersection: Option<usize>,

        /// Taille du pool de candidats
        #[arg(long)]
        candidates: Option<usize>,
    },

    /// Comparer le portefeuille au dernier résultat et l'enregistrer au journal
    Compare,

    /// Noter le portefeuille contre un tirage saisi (défaut : dernier résultat en cache)
    Score {
        /// Dezenas tirées
        numbers: Vec<u8>,
    },

    /// Statistiques glissantes du journal
    Metrics {
        /// Nombre de concours récents
        #[arg(short, long)]
        window: Option<usize>,
    },

    /// Afficher la configuration effective
    Config,
}

fn apply_overrides(config: &mut EngineConfig, command: &Command) {
    match command {
        Command::Features { window, output } => {
            if let Some(w) = window {
                config.features.window = *w;
            }
            if let Some(o) = output {
                config.paths.features = o.clone();
            }
        }
        Command::Generate {
            portfolio_size,
            max_intersection,
            candidates,
            ..
        } => {
            if let Some(n) = portfolio_size {
                config.game.portfolio_size = *n;
            }
            if let Some(m) = max_intersection {
                config.generation.max_intersection = *m;
            }
            if let Some(c) = candidates {
                config.generation.candidates = *c;
            }
        }
        Command::Metrics { window: Some(w) } => config.ledger.rolling_window = *w,
        _ => {}
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli.command);
    config.validate().context("Configuration invalide")?;

    match cli.command {
        Command::Import { file } => cmd_import(&config, &file),
        Command::Ingest => cmd_ingest(&config),
        Command::History { last } => cmd_history(&config, last),
        Command::Features { .. } => cmd_features(&config),
        Command::Generate { seed, .. } => cmd_generate(&config, seed),
        Command::Compare => cmd_compare(&config),
        Command::Score { numbers } => cmd_score(&config, numbers),
        Command::Metrics { .. } => cmd_metrics(&config),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn open_store(config: &EngineConfig) -> Result<Connection> {
    let conn = open_db(&config.paths.database)?;
    migrate(&conn)?;
    Ok(conn)
}

fn cmd_import(config: &EngineConfig, file: &Path) -> Result<()> {
    let conn = open_store(config)?;
    let result = import_csv(&conn, file, config.game.draw_size)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_ingest(config: &EngineConfig) -> Result<()> {
    let source = HttpDrawSource::new(&config.api, config.game.draw_size)?;
    let draws = source.all_draws()?;
    println!("{} tirages téléchargés.", draws.len());

    let conn = open_store(config)?;
    let result = store_draws(&conn, &draws)?;
    display_import_summary(&result);

    let total = count_draws(&conn)?;
    match latest_contest(&conn)? {
        Some(contest) => println!("{} tirages en base (dernier concours : {}).", total, contest),
        None => println!("Base vide."),
    }
    Ok(())
}

fn cmd_history(config: &EngineConfig, last: u32) -> Result<()> {
    let conn = open_store(config)?;
    let draws = fetch_last_draws(&conn, last)?;
    display_draws(&draws);
    Ok(())
}

fn cmd_features(config: &EngineConfig) -> Result<()> {
    let conn = open_store(config)?;
    let rows = run_features(&conn, config)?;
    display_features(&rows, config.features.window);
    println!("Fichier écrit : {}", config.paths.features.display());
    Ok(())
}

fn cmd_generate(config: &EngineConfig, seed: Option<u64>) -> Result<()> {
    let seed = seed.unwrap_or_else(date_seed);
    let (portfolio, report) = run_generate(config, seed)?;
    display_portfolio(&portfolio, &report);
    println!("Fichier écrit : {}", config.paths.portfolio.display());
    Ok(())
}

fn cmd_compare(config: &EngineConfig) -> Result<()> {
    let source = HttpDrawSource::new(&config.api, config.game.draw_size)?;
    match run_compare(&source, config)? {
        CompareOutcome::AlreadyLogged { contest } => {
            println!("Concours {} déjà enregistré, rien à faire.", contest);
        }
        CompareOutcome::Scored(event) => display_event(&event, &config.scoring),
    }
    Ok(())
}

fn cmd_score(config: &EngineConfig, numbers: Vec<u8>) -> Result<()> {
    let drawn = if numbers.is_empty() {
        let cached = read_cached_result(&config.paths.last_result)?;
        println!("Dernier résultat en cache : concours {} ({})", cached.draw.contest, cached.draw.date);
        cached.draw.numbers
    } else {
        numbers
    };

    let card = score_manual(&drawn, config)?;
    display_hits(&card.tickets, &card.summary, &drawn, &config.scoring);
    Ok(())
}

fn cmd_metrics(config: &EngineConfig) -> Result<()> {
    let ledger = PerformanceLedger::new(&config.paths.ledger);
    let metrics = ledger.rolling_metrics(config.ledger.rolling_window)?;
    display_rolling(metrics.as_ref());
    Ok(())
}
