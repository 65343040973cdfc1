use anyhow::{bail, Result};
use chrono::Datelike;
use rand::{Rng, RngExt};

use megasena_db::models::MAX_NUMBER;

/// Plancher appliqué aux poids nuls, négatifs ou non finis.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Génère un seed déterministe basé sur la date du jour (YYYYMMDD).
pub fn date_seed() -> u64 {
    let today = chrono::Local::now().date_naive();
    let y = today.year() as u64;
    let m = today.month() as u64;
    let d = today.day() as u64;
    y * 10_000 + m * 100 + d
}

/// Échantillonnage pondéré sans remise (course exponentielle, Efraimidis–Spirakis).
///
/// `weights[i]` est le poids de la dezena `i + 1`. Pour chaque dezena on tire
/// `u` uniforme dans (0, 1] et on calcule la clé `-ln(u) / w` ; les `k` plus
/// petites clés forment la combinaison. Aucune renormalisation entre deux
/// tirages n'est nécessaire.
///
/// Renvoie `k` dezenas distinctes, triées.
pub fn weighted_sample(weights: &[f64], k: usize, rng: &mut impl Rng) -> Result<Vec<u8>> {
    if weights.len() > MAX_NUMBER as usize {
        bail!("Univers de {} dezenas (max {})", weights.len(), MAX_NUMBER);
    }
    if k > weights.len() {
        bail!("Impossible de tirer {} dezenas parmi {}", k, weights.len());
    }

    let mut keys: Vec<(f64, u8)> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let w = if w.is_finite() && w > WEIGHT_EPSILON { w } else { WEIGHT_EPSILON };
            // 1 - [0, 1) = (0, 1] : ln(u) reste fini
            let u = 1.0 - rng.random::<f64>();
            (-u.ln() / w, (i + 1) as u8)
        })
        .collect();

    keys.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut selected: Vec<u8> = keys.iter().take(k).map(|&(_, n)| n).collect();
    selected.sort_unstable();
    Ok(selected)
}

/// Tirage uniforme de `k` dezenas parmi 1..=`pool_size` (Fisher–Yates partiel).
pub fn uniform_sample(pool_size: usize, k: usize, rng: &mut impl Rng) -> Result<Vec<u8>> {
    if pool_size > MAX_NUMBER as usize {
        bail!("Univers de {} dezenas (max {})", pool_size, MAX_NUMBER);
    }
    if k > pool_size {
        bail!("Impossible de tirer {} dezenas parmi {}", k, pool_size);
    }

    let mut pool: Vec<u8> = (1..=pool_size as u8).collect();
    for i in 0..k {
        let j = rng.random_range(i..pool_size);
        pool.swap(i, j);
    }

    let mut selected = pool[..k].to_vec();
    selected.sort_unstable();
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn is_valid(nums: &[u8], k: usize) -> bool {
        nums.len() == k
            && nums.iter().all(|&n| (1..=60).contains(&n))
            && nums.windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn test_date_seed_format() {
        let seed = date_seed();
        assert!(seed >= 20_000_000, "seed trop petit: {seed}");
        assert!(seed <= 99_991_231, "seed trop grand: {seed}");
        assert_eq!(seed.to_string().len(), 8);
    }

    #[test]
    fn test_weighted_sample_valid_output() {
        let mut rng = StdRng::seed_from_u64(42);
        let weights: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        for _ in 0..500 {
            let nums = weighted_sample(&weights, 9, &mut rng).unwrap();
            assert!(is_valid(&nums, 9), "combinaison invalide: {:?}", nums);
        }
    }

    #[test]
    fn test_weighted_sample_full_universe() {
        let mut rng = StdRng::seed_from_u64(1);
        let weights = vec![1.0 / 60.0; 60];
        let nums = weighted_sample(&weights, 60, &mut rng).unwrap();
        assert_eq!(nums, (1..=60).collect::<Vec<u8>>());
    }

    #[test]
    fn test_weighted_sample_too_many() {
        let mut rng = StdRng::seed_from_u64(1);
        let weights = vec![1.0; 10];
        assert!(weighted_sample(&weights, 11, &mut rng).is_err());
    }

    #[test]
    fn test_zero_weight_selected_less_often() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut weights = vec![1.0; 60];
        // dezenas 1..=10 à poids nul
        for w in weights.iter_mut().take(10) {
            *w = 0.0;
        }
        let mut counts = [0u32; 60];
        for _ in 0..2000 {
            for n in weighted_sample(&weights, 9, &mut rng).unwrap() {
                counts[(n - 1) as usize] += 1;
            }
        }
        let max_zero = counts[..10].iter().copied().max().unwrap();
        let min_positive = counts[10..].iter().copied().min().unwrap();
        assert!(
            max_zero < min_positive,
            "poids nul tiré {} fois, poids positif min {} fois",
            max_zero,
            min_positive
        );
    }

    #[test]
    fn test_heavier_weight_selected_more_often() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut weights = vec![1.0; 60];
        weights[0] = 5.0;
        let mut hits_heavy = 0;
        let mut hits_light = 0;
        for _ in 0..3000 {
            let nums = weighted_sample(&weights, 6, &mut rng).unwrap();
            if nums.contains(&1) {
                hits_heavy += 1;
            }
            if nums.contains(&2) {
                hits_light += 1;
            }
        }
        assert!(hits_heavy > hits_light, "{} vs {}", hits_heavy, hits_light);
    }

    #[test]
    fn test_non_finite_weights_do_not_panic() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut weights = vec![1.0; 60];
        weights[5] = f64::NAN;
        weights[6] = f64::INFINITY;
        weights[7] = -2.0;
        let nums = weighted_sample(&weights, 9, &mut rng).unwrap();
        assert!(is_valid(&nums, 9));
    }

    #[test]
    fn test_weighted_sample_seed_determinism() {
        let weights: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let a = weighted_sample(&weights, 9, &mut StdRng::seed_from_u64(123)).unwrap();
        let b = weighted_sample(&weights, 9, &mut StdRng::seed_from_u64(123)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_uniform_sample_valid_output() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let nums = uniform_sample(60, 9, &mut rng).unwrap();
            assert!(is_valid(&nums, 9));
        }
        assert!(uniform_sample(60, 61, &mut rng).is_err());
    }
}
