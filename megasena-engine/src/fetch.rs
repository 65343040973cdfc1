use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use megasena_db::models::Draw;

use crate::config::ApiConfig;

/// Champs possibles pour la liste des dezenas, par ordre de préférence.
const NUMBER_FIELDS: [&str; 3] = ["dezenas", "listaDezenas", "numeros"];

/// Source du dernier résultat officiel.
pub trait DrawSource {
    fn latest_draw(&self) -> Result<Draw>;
}

pub struct HttpDrawSource {
    client: reqwest::blocking::Client,
    base_url: String,
    draw_size: usize,
}

impl HttpDrawSource {
    pub fn new(api: &ApiConfig, draw_size: usize) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .context("Impossible de construire le client HTTP")?;
        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            draw_size,
        })
    }

    pub fn latest_url(&self) -> String {
        format!("{}/latest", self.base_url)
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {}", url))?
            .error_for_status()
            .with_context(|| format!("Réponse non-2xx de {}", url))?;
        resp.json().with_context(|| format!("JSON invalide depuis {}", url))
    }

    /// Historique complet. Les concours invalides sont ignorés avec un avertissement.
    pub fn all_draws(&self) -> Result<Vec<Draw>> {
        match self.get_json(&self.base_url)? {
            Value::Array(items) => Ok(parse_history(&items, self.draw_size)),
            other => bail!("Historique attendu sous forme de liste, reçu : {}", kind_of(&other)),
        }
    }
}

impl DrawSource for HttpDrawSource {
    fn latest_draw(&self) -> Result<Draw> {
        let url = self.latest_url();
        let payload = self.get_json(&url)?;
        parse_draw_payload(&payload, self.draw_size)
            .with_context(|| format!("Résultat invalide depuis {}", url))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "booléen",
        Value::Number(_) => "nombre",
        Value::String(_) => "chaîne",
        Value::Array(_) => "liste",
        Value::Object(_) => "objet",
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `DD/MM/YYYY` -> `YYYY-MM-DD` ; tout autre format est conservé tel quel.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    match NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Lit un résultat de l'API et le valide (exactement `draw_size` dezenas distinctes).
pub fn parse_draw_payload(payload: &Value, draw_size: usize) -> Result<Draw> {
    let contest_raw = payload.get("concurso").context("Champ 'concurso' absent")?;
    let contest = as_integer(contest_raw)
        .and_then(|c| u32::try_from(c).ok())
        .with_context(|| format!("Concurso invalide : {}", contest_raw))?;

    let date = normalize_date(payload.get("data").and_then(Value::as_str).unwrap_or_default());

    let numbers_raw = NUMBER_FIELDS
        .iter()
        .filter_map(|field| payload.get(*field).and_then(Value::as_array))
        .find(|list| !list.is_empty())
        .with_context(|| format!("Concurso {} : aucune liste de dezenas ({:?})", contest, NUMBER_FIELDS))?;

    let numbers = numbers_raw
        .iter()
        .map(|v| {
            as_integer(v)
                .and_then(|n| u8::try_from(n).ok())
                .with_context(|| format!("Concurso {} : dezena invalide {}", contest, v))
        })
        .collect::<Result<Vec<u8>>>()?;

    Draw::new(contest, date, &numbers, draw_size)
        .with_context(|| format!("Concurso {} rejeté", contest))
}

pub fn parse_history(items: &[Value], draw_size: usize) -> Vec<Draw> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match parse_draw_payload(item, draw_size) {
            Ok(draw) => Some(draw),
            Err(e) => {
                log::warn!("Entrée {} de l'historique ignorée : {:#}", i, e);
                None
            }
        })
        .collect()
}

/// Dernier résultat officiel connu, réécrit à chaque exécution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    #[serde(flatten)]
    pub draw: Draw,
    pub fetched_at_utc: String,
}

pub fn write_cached_result(path: &Path, draw: &Draw) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let cached = CachedResult {
        draw: draw.clone(),
        fetched_at_utc: chrono::Utc::now().to_rfc3339(),
    };
    let json = serde_json::to_string_pretty(&cached)?;
    std::fs::write(path, json).with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(())
}

pub fn read_cached_result(path: &Path) -> Result<CachedResult> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Aucun résultat en cache : {:?}", path))?;
    let cached = serde_json::from_str(&json)
        .with_context(|| format!("JSON invalide dans {:?}", path))?;
    Ok(cached)
}
