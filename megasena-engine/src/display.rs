use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL, Cell, Color};

use megasena_db::models::Draw;

use crate::config::ScoringPolicy;
use crate::features::FeatureRow;
use crate::ingest::ImportResult;
use crate::ledger::{RollingMetrics, ScoringEvent};
use crate::portfolio::{BuildReport, Portfolio};
use crate::scoring::{HitSummary, TicketHits};

pub fn format_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:02}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Concours", "Date", "Dezenas"]);

    for draw in draws {
        table.add_row(vec![
            draw.contest.to_string(),
            draw.date.clone(),
            format_numbers(&draw.numbers),
        ]);
    }

    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {}", result.errors);
    }
}

pub fn display_features(rows: &[FeatureRow], window: u32) {
    println!("\nFréquences sur les {} derniers tirages\n", window);

    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.number.cmp(&b.number)));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Rang", "Dezena", "Fréquence"]);

    for (i, row) in sorted.iter().take(15).enumerate() {
        table.add_row(vec![
            format!("{}", i + 1),
            format!("{:02}", row.number),
            row.frequency.to_string(),
        ]);
    }

    println!("{table}");
}

pub fn display_portfolio(portfolio: &Portfolio, report: &BuildReport) {
    println!(
        "\nPortefeuille {} : {} jeux de {} dezenas (objectif {})",
        portfolio.game,
        portfolio.tickets.len(),
        portfolio.ticket_size,
        portfolio.objective
    );
    if let Some(seed) = portfolio.seed {
        println!("Graine : {}", seed);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Jeu", "Dezenas"]);

    for ticket in &portfolio.tickets {
        table.add_row(vec![
            Cell::new(&ticket.id),
            Cell::new(format_numbers(&ticket.numbers)).fg(Color::Green),
        ]);
    }

    println!("{table}");

    println!(
        "Candidats : {} | diversifiés : {} | sans plafond : {} | uniformes : {}",
        report.candidates, report.diverse, report.relaxed, report.synthesized
    );
    if !report.is_fully_diverse() {
        println!("⚠ Plafond d'intersection non respecté pour une partie des jeux.");
    }
}

pub fn display_hits(tickets: &[TicketHits], summary: &HitSummary, drawn: &[u8], policy: &ScoringPolicy) {
    println!("\nTirage : {}", format_numbers(drawn));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Jeu", "Dezenas", "Points"]);

    for t in tickets {
        let color = if t.hits >= policy.high_threshold {
            Color::Green
        } else if t.hits >= policy.low_threshold {
            Color::Yellow
        } else {
            Color::White
        };
        let marked = t
            .numbers
            .iter()
            .map(|n| if drawn.contains(n) { format!("[{:02}]", n) } else { format!("{:02}", n) })
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            Cell::new(&t.id),
            Cell::new(marked),
            Cell::new(t.hits).fg(color),
        ]);
    }

    println!("{table}");

    println!(
        "Max : {} | ≥{} : {} | ≥{} : {} | complets : {} | score : {}",
        summary.max_hits,
        policy.low_threshold,
        summary.count_ge_low,
        policy.high_threshold,
        summary.count_ge_high,
        summary.count_full,
        summary.score
    );
    let hist = summary
        .histogram
        .iter()
        .map(|(hits, count)| format!("{}:{}", hits, count))
        .collect::<Vec<_>>()
        .join("  ");
    println!("Histogramme (points:jeux) : {}", hist);
}

pub fn display_event(event: &ScoringEvent, policy: &ScoringPolicy) {
    println!("\nConcours {} ({})", event.contest, event.draw_date);
    display_hits(&event.tickets, &event.summary, &event.drawn_numbers, policy);
    display_rolling(event.rolling.as_ref());
}

pub fn display_rolling(metrics: Option<&RollingMetrics>) {
    let Some(m) = metrics else {
        println!("Aucune statistique glissante (journal vide).");
        return;
    };

    println!("\nStatistiques glissantes ({} derniers concours, {} lus)\n", m.window, m.events);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Métrique", "Valeur"]);

    table.add_row(vec!["Jeux comptés".to_string(), m.total_tickets.to_string()]);
    table.add_row(vec!["Moyenne max points".to_string(), format!("{:.2}", m.avg_max_hits)]);
    table.add_row(vec!["Score moyen".to_string(), format!("{:.2}", m.avg_score)]);
    table.add_row(vec!["Taux ≥ seuil bas".to_string(), format!("{:.2}%", m.rate_ge_low * 100.0)]);

    println!("{table}");
}
