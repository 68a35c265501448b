use std::borrow::Cow;

use crate::patterns::PatternSpec;
use crate::record::*;

/// Matches records against a fixed set of patterns.
///
/// Hits are leftmost-first and non-overlapping per pattern: after a hit, the search resumes at
/// its end offset. Residues are compared in upper case.
pub struct Scanner {
    patterns: Vec<PatternSpec>,
    with_description: bool,
}

impl Scanner {
    pub fn new(patterns: impl IntoIterator<Item = PatternSpec>) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
            with_description: false,
        }
    }

    /// Copy each record's description into its matches.
    pub fn with_description(mut self, with_description: bool) -> Self {
        self.with_description = with_description;
        self
    }

    pub fn patterns(&self) -> &[PatternSpec] {
        &self.patterns
    }

    /// All matches of every pattern, grouped by pattern in table order.
    pub fn scan(&self, record: &SequenceRecord) -> Vec<Match> {
        let mut res = Vec::new();
        self.scan_each(record, |_, m| res.push(m));
        res
    }

    /// Call `on_match` for each hit as it is found, along with the pattern that produced it.
    pub fn scan_each(&self, record: &SequenceRecord, mut on_match: impl FnMut(&PatternSpec, Match)) {
        let residues = normalize(record.residues());
        let description = self
            .with_description
            .then(|| record.description().to_owned());

        for pattern in &self.patterns {
            for m in pattern.regex().find_iter(&residues) {
                on_match(
                    pattern,
                    Match {
                        record_id: record.id().to_owned(),
                        pattern_name: pattern.name().to_owned(),
                        start_offset: m.start(),
                        end_offset: m.end(),
                        matched_text: String::from_utf8_lossy(m.as_bytes()).into_owned(),
                        description: description.clone(),
                    },
                );
            }
        }
    }
}

/// Upper-case residues, borrowing when they already are.
pub fn normalize(residues: &[u8]) -> Cow<'_, [u8]> {
    if residues.iter().any(|c| c.is_ascii_lowercase()) {
        Cow::Owned(residues.to_ascii_uppercase())
    } else {
        Cow::Borrowed(residues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{LrrClass, PatternTable};

    const TPLRR_MOTIF: &str = "CGGLGGIGLGGGLGGIGGGAF";

    fn tplrr() -> Scanner {
        Scanner::new([PatternTable::builtin().lookup("TpLRR").unwrap().clone()])
    }

    #[test]
    fn planted_motif_is_found_at_its_offset() {
        let seq = format!("MKKEE{TPLRR_MOTIF}KKDDE");
        let matches = tplrr().scan(&SequenceRecord::new("P1", "desc", seq));

        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.pattern_name, "TpLRR");
        assert_eq!(m.start_offset, 5);
        assert_eq!(m.end_offset, 26);
        assert_eq!(m.matched_text, TPLRR_MOTIF);
        assert_eq!(m.len(), LrrClass::TpLrr.repeat_length());
        assert_eq!(m.description, None);
    }

    #[test]
    fn lowercase_residues_are_normalized() {
        let seq = format!("mkkee{}kk", TPLRR_MOTIF.to_ascii_lowercase());
        let matches = tplrr()
            .with_description(true)
            .scan(&SequenceRecord::new("P1", "Leucine-rich repeat", seq));

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start_offset, 5);
        assert_eq!(matches[0].matched_text, TPLRR_MOTIF);
        assert_eq!(matches[0].description.as_deref(), Some("Leucine-rich repeat"));
    }

    #[test]
    fn matches_do_not_overlap() {
        let p = PatternSpec::new("AA", "AA", 2, "").unwrap();
        let matches = Scanner::new([p]).scan(&SequenceRecord::new("P1", "", "AAA"));

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start_offset, 0);

        let tandem = TPLRR_MOTIF.repeat(2);
        let starts = tplrr()
            .scan(&SequenceRecord::new("P2", "", tandem))
            .iter()
            .map(|m| m.start_offset)
            .collect::<Vec<_>>();
        assert_eq!(starts, [0, 21]);
    }

    #[test]
    fn no_match_contributes_nothing() {
        let scanner = Scanner::new(PatternTable::builtin().all().iter().cloned());
        assert!(scanner
            .scan(&SequenceRecord::new("P1", "", "MKVAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"))
            .is_empty());
    }

    #[test]
    fn each_pattern_reports_under_its_own_name() {
        let table = PatternTable::builtin();
        let scanner = Scanner::new(table.select(&["TpLRR", "TpLRR-revised", "Bacterial"]).unwrap());
        let seq = format!("{TPLRR_MOTIF}AAPGGLGGLGVGGNGLGGLPGL");
        let names = scanner
            .scan(&SequenceRecord::new("P1", "", seq))
            .into_iter()
            .map(|m| (m.pattern_name, m.start_offset))
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            [
                ("TpLRR".to_owned(), 0),
                ("TpLRR-revised".to_owned(), 0),
                ("Bacterial".to_owned(), 23),
            ]
        );
    }

    #[test]
    fn revised_tplrr_accepts_substitutions() {
        let seq = "NGGVGGLGIGGGVGGLGGGAF";
        assert!(tplrr().scan(&SequenceRecord::new("P1", "", seq)).is_empty());

        let revised = Scanner::new([PatternTable::builtin()
            .lookup("TpLRR-revised")
            .unwrap()
            .clone()]);
        assert_eq!(revised.scan(&SequenceRecord::new("P1", "", seq)).len(), 1);
    }
}
