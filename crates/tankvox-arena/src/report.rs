use std::path::Path;

use crate::runner::ArenaResult;

/// Results of every scene from one run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Baseline {
    pub timestamp: String,
    pub results: Vec<ArenaResult>,
}

/// Load a baseline from a JSON file. Returns None if the file doesn't exist.
pub fn load_baseline(path: &Path) -> Option<Baseline> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save a baseline to a JSON file.
pub fn save_baseline(path: &Path, baseline: &Baseline) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(baseline).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Compare current results against a baseline. Returns a list of regressions
/// (scene name, percent change) where the threshold is exceeded.
pub fn compare(
    current: &[ArenaResult],
    baseline: &Baseline,
    threshold_pct: f64,
) -> Vec<(String, f64)> {
    let mut regressions = Vec::new();

    for result in current {
        let Some(base) = baseline
            .results
            .iter()
            .find(|b| b.scene_name == result.scene_name)
        else {
            continue;
        };
        if base.timings.mean_ms <= 0.0 {
            continue;
        }
        let pct_change =
            (result.timings.mean_ms - base.timings.mean_ms) / base.timings.mean_ms * 100.0;
        if pct_change > threshold_pct {
            regressions.push((result.scene_name.clone(), pct_change));
        }
    }

    regressions
}

/// Format results as a markdown summary table.
pub fn format_markdown(results: &[ArenaResult]) -> String {
    let mut out = String::new();
    out.push_str("| Scene | Voxels | Colliders | Enemies (lost) | Shots | Voxels destroyed | Mean (ms) | P95 (ms) | P99 (ms) | World (ms) | AI (ms) | Physics (ms) |\n");
    out.push_str("|-------|--------|-----------|----------------|-------|------------------|-----------|----------|----------|------------|---------|--------------|\n");

    for r in results {
        out.push_str(&format!(
            "| {} | {} | {} | {} ({}) | {} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
            r.scene_name,
            r.voxels,
            r.colliders,
            r.enemies,
            r.enemies_destroyed,
            r.shots_fired,
            r.voxels_destroyed,
            r.timings.mean_ms,
            r.timings.p95_ms,
            r.timings.p99_ms,
            r.phases.world.mean_ms,
            r.phases.ai.mean_ms,
            r.phases.physics.mean_ms,
        ));
    }

    out
}

/// Format a comparison report showing regressions.
pub fn format_comparison(regressions: &[(String, f64)], threshold_pct: f64) -> String {
    if regressions.is_empty() {
        return format!(
            "All scenes within {:.0}% threshold. No regressions detected.\n",
            threshold_pct
        );
    }

    let mut out = String::new();
    out.push_str(&format!(
        "REGRESSIONS DETECTED (>{:.0}% threshold):\n",
        threshold_pct
    ));
    for (scene, pct) in regressions {
        out.push_str(&format!("  - {}: +{:.1}%\n", scene, pct));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{PhaseTimings, TimingSeries};

    fn result(name: &str, mean_ms: f64) -> ArenaResult {
        ArenaResult {
            scene_name: name.to_string(),
            voxels: 100,
            chunks: 1,
            colliders: 4,
            enemies: 2,
            enemies_destroyed: 0,
            shots_fired: 3,
            impacts: 1,
            voxels_destroyed: 5,
            chunks_rebuilt: 2,
            player_health: 90.0,
            tick_count: 10,
            timings: TimingSeries {
                mean_ms,
                ..TimingSeries::default()
            },
            phases: PhaseTimings::default(),
        }
    }

    #[test]
    fn test_compare_flags_only_slower_scenes() {
        let baseline = Baseline {
            timestamp: "t".to_string(),
            results: vec![result("open", 1.0), result("town", 2.0), result("zero", 0.0)],
        };
        let current = [result("open", 1.05), result("town", 3.0), result("zero", 1.0), result("new", 9.0)];
        let regressions = compare(&current, &baseline, 10.0);
        assert_eq!(regressions.len(), 1);
        assert_eq!(regressions[0].0, "town");
        assert!((regressions[0].1 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("arena-report-{}", std::process::id()));
        let path = dir.join("baseline.json");
        let baseline = Baseline {
            timestamp: "run-1".to_string(),
            results: vec![result("open", 1.5)],
        };
        save_baseline(&path, &baseline).unwrap();
        let loaded = load_baseline(&path).unwrap();
        assert_eq!(loaded.results[0].scene_name, "open");
        assert_eq!(loaded.results[0].timings.mean_ms, 1.5);
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(load_baseline(&path).is_none());
    }

    #[test]
    fn test_markdown_has_a_row_per_scene() {
        let table = format_markdown(&[result("open", 1.0), result("town", 2.0)]);
        assert_eq!(table.lines().count(), 4);
        assert!(table.contains("| town |"));
        assert!(format_comparison(&[], 10.0).contains("No regressions"));
    }
}
