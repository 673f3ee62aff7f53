//! Property tests for run-log rotation and engine argument building.

use std::fs;
use std::io::Read;

use dupvault::config::model::StorageOperation;
use dupvault::rotate::rotate;
use dupvault::util::paths::{generation_path, is_safe_name};
use flate2::read::GzDecoder;
use proptest::prelude::*;
use tempfile::TempDir;

fn gunzip(path: &std::path::Path) -> String {
    let mut text = String::new();
    GzDecoder::new(fs::File::open(path).expect("open generation"))
        .read_to_string(&mut text)
        .expect("gunzip");
    text
}

// =============================================================================
// Rotation
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Generation i always holds the log of the run i rotations ago,
    /// and nothing beyond depth - 1 survives.
    #[test]
    fn generations_hold_previous_runs_in_order(depth in 1usize..6, runs in 1usize..9) {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("job.log");

        for run in 1..=runs {
            fs::write(&root, format!("run {}\n", run)).expect("write log");
            rotate(&root, depth).expect("rotate");
            prop_assert!(!root.exists());
        }

        let kept = runs.min(depth.saturating_sub(1));
        for index in 1..=kept {
            let expected = format!("run {}\n", runs + 1 - index);
            prop_assert_eq!(gunzip(&generation_path(&root, index)), expected);
        }
        for index in (kept + 1)..=(depth + 1) {
            prop_assert!(!generation_path(&root, index).exists());
        }
    }

    /// Rotating with no active log never creates or drops generations.
    #[test]
    fn rotating_without_a_log_only_shifts(depth in 2usize..6) {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("job.log");
        fs::write(&root, "only run\n").expect("write log");
        rotate(&root, depth).expect("rotate");
        rotate(&root, depth).expect("rotate again");

        let survivors = (1..=depth)
            .filter(|index| generation_path(&root, *index).exists())
            .count();
        prop_assert_eq!(survivors, 1);
    }
}

// =============================================================================
// Engine arguments
// =============================================================================

proptest! {
    /// The keep policy is split on whitespace and appended verbatim.
    #[test]
    fn prune_keep_policy_tokens(tokens in prop::collection::vec("-keep [0-9]{1,3}:[0-9]{1,3}", 0..5), pad in "[ \t]{1,3}") {
        let keep = tokens.join(&pad);
        let op = StorageOperation::Prune { storage: "b2".to_string(), keep: keep.clone() };
        let args = op.args();

        prop_assert_eq!(&args[..4], &["prune", "-all", "-storage", "b2"]);
        let tail: Vec<&str> = args[4..].iter().map(String::as_str).collect();
        let expected: Vec<&str> = keep.split_whitespace().collect();
        prop_assert_eq!(tail, expected);
    }

    /// Names that pass the filter can never escape their directory.
    #[test]
    fn safe_names_have_no_separators(name in "\\PC{0,16}") {
        if is_safe_name(&name) {
            prop_assert!(!name.contains('/'));
            prop_assert!(name != "." && name != "..");
            prop_assert!(!name.is_empty());
        }
    }
}
