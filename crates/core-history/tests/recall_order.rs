//! Recall ordering holds for any sequence of recorded commands.

use core_history::{HistoryStore, Recall};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn older_reverses_then_newer_replays(cmds in proptest::collection::vec("[a-z][a-z0-9 ]{0,10}[a-z0-9]", 1..12)) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::open(dir.path().join("history.txt")).unwrap();
        for c in &cmds {
            store.record(c).unwrap();
        }

        let older: Vec<String> = (0..cmds.len()).filter_map(|_| store.recall_older()).collect();
        let mut reversed = cmds.clone();
        reversed.reverse();
        prop_assert_eq!(older, reversed);
        prop_assert_eq!(store.recall_older(), None);

        for c in &cmds {
            prop_assert_eq!(store.recall_newer(), Recall::Entry(c.clone()));
        }
        prop_assert_eq!(store.recall_newer(), Recall::Blank);
    }

    #[test]
    fn reopened_store_sees_same_entries(cmds in proptest::collection::vec("[a-z]{1,8}", 0..8)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");
        {
            let mut store = HistoryStore::open(&path).unwrap();
            for c in &cmds {
                store.record(c).unwrap();
            }
        }
        let store = HistoryStore::open(&path).unwrap();
        prop_assert_eq!(store.entries(), cmds.as_slice());
        prop_assert_eq!(store.index(), cmds.len() as isize - 1);
    }
}
