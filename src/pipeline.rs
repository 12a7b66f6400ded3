use indicatif::{ProgressBar, ProgressStyle};

use crate::parser::{segment_with, Block};
use crate::scoring::{EmbedError, Embedder, ScoredRecord, Scorer};

pub struct PipelineOutcome {
    pub blocks_seen: usize,
    pub records: Vec<ScoredRecord>,
}

/// Segment `text` and keep, in document order, the blocks scoring at least `threshold`.
///
/// Headings and fields are recognised with the scorer's pattern set.
pub fn process_document<E: Embedder>(
    text: &str,
    scorer: &Scorer<E>,
    threshold: f64,
) -> Result<PipelineOutcome, EmbedError> {
    let blocks = segment_with(text, scorer.patterns());
    if blocks.is_empty() {
        tracing::warn!("no function headings found in document");
    } else {
        tracing::info!(blocks = blocks.len(), "segmented document");
    }

    let records = classify_blocks(&blocks, scorer, threshold)?;
    tracing::info!(
        retained = records.len(),
        blocks = blocks.len(),
        threshold,
        "classified blocks"
    );

    Ok(PipelineOutcome {
        blocks_seen: blocks.len(),
        records,
    })
}

fn classify_blocks<E: Embedder>(
    blocks: &[Block],
    scorer: &Scorer<E>,
    threshold: f64,
) -> Result<Vec<ScoredRecord>, EmbedError> {
    let pb = progress_bar(blocks.len());
    let mut records = Vec::new();
    for block in blocks {
        if let Some(record) = scorer.classify(block, threshold)? {
            records.push(record);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(records)
}

pub fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lines::testing::section_dialect;
    use crate::scoring::testing::KeywordEmbedder;
    use crate::scoring::DEFAULT_THRESHOLD;

    fn scorer() -> Scorer<KeywordEmbedder> {
        Scorer::adas(KeywordEmbedder::adas())
    }

    #[test]
    fn empty_document_yields_no_rows() {
        let outcome = process_document("", &scorer(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(outcome.blocks_seen, 0);
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn fixture_keeps_driver_assistance_functions() {
        let text = std::fs::read_to_string("tests/fixtures/exterior_lighting.txt").unwrap();
        let outcome = process_document(&text, &scorer(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(outcome.blocks_seen, 5);

        let ids: Vec<&str> = outcome
            .records
            .iter()
            .map(|r| r.block.function_id.as_str())
            .collect();
        assert!(ids.contains(&"CF-LKA-v2"));
        assert!(ids.contains(&"CF-AEB-v1"));
        assert!(!ids.contains(&"CF-SEATTRIM-v1"));
        assert!(!ids.contains(&"cf-cabinlight-V1"));

        let lka = outcome
            .records
            .iter()
            .find(|r| r.block.function_id == "CF-LKA-v2")
            .unwrap();
        assert_eq!(lka.fields.domain, "ADAS");
        assert_eq!(lka.fields.owner_team, "DriverAssistTeam");
    }

    #[test]
    fn records_follow_document_order() {
        let text = std::fs::read_to_string("tests/fixtures/exterior_lighting.txt").unwrap();
        let outcome = process_document(&text, &scorer(), -1.0).unwrap();
        let ids: Vec<&str> = outcome
            .records
            .iter()
            .map(|r| r.block.function_id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["CF-EXTLIGHT-v1", "CF-SEATTRIM-v1", "CF-LKA-v2", "CF-AEB-v1", "cf-cabinlight-V1"]
        );
    }

    #[test]
    fn alternate_dialect_end_to_end() {
        let text = "§7 Wiper Control [WIP-7]\nCode: WIP07\nArea: ADAS\nTeam: BodyTeam\nRain sensing camera detection with warning indicator.\n§8 Seat Trim [SEAT-8]\nCode: SEAT08\nSeat fabric options.";

        let outcome = process_document(text, &scorer(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(outcome.blocks_seen, 0);

        let scorer = scorer().with_patterns(section_dialect());
        let outcome = process_document(text, &scorer, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(outcome.blocks_seen, 2);
        assert_eq!(outcome.records.len(), 1);

        let row = outcome.records[0].to_row();
        assert_eq!(row.title, "Wiper Control");
        assert_eq!(row.function_id, "WIP-7");
        assert_eq!(row.function_code, "WIP07");
        assert_eq!(row.domain, "ADAS");
        assert_eq!(row.owner_team, "BodyTeam");
    }
}
