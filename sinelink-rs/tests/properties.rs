/// Randomized checks of the invariants the pipeline leans on.
use proptest::prelude::*;
use sinelink_rs::aggregate::{bin, CorpusSummary};
use sinelink_rs::dialect::{ContigRule, Dialect, IdCanon};
use sinelink_rs::expression::SineGeneLink;
use sinelink_rs::homology::{reciprocal_best_hits, BestHitPair, HitDirection};
use sinelink_rs::resolver::{closest, overlap_test, overlaps};
use sinelink_rs::{Direction, Flag, GenomicInterval, Organism, Strand};
use std::collections::{BTreeMap, BTreeSet};

// ── strategies ───────────────────────────────────────────────────────────────

fn interval_strategy() -> impl Strategy<Value = (&'static str, u64, u64, bool)> {
    (
        prop::sample::select(vec!["chr1", "chr2"]),
        0u64..5_000,
        1u64..400,
        any::<bool>(),
    )
        .prop_map(|(contig, start, len, forward)| (contig, start, start + len, forward))
}

fn to_intervals(raw: Vec<(&'static str, u64, u64, bool)>, locus_ids: bool) -> Vec<GenomicInterval> {
    raw.into_iter()
        .enumerate()
        .map(|(i, (contig, start, end, forward))| {
            let contig = contig.to_string();
            let feature_id = if locus_ids {
                format!("{contig}:{start}-{end}")
            } else {
                format!("g{i}")
            };
            GenomicInterval {
                contig,
                start,
                end,
                strand: if forward { Strand::Forward } else { Strand::Reverse },
                feature_id,
                source_organism: Organism::A,
            }
        })
        .collect()
}

fn gap(a: &GenomicInterval, b: &GenomicInterval) -> u64 {
    if a.end <= b.start {
        b.start - a.end
    } else if b.end <= a.start {
        a.start - b.end
    } else {
        0
    }
}

// ── properties ───────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn canonical_id_is_idempotent(raw in "[a-z:\\-]{0,6}[A-Za-z0-9_]{1,12}(\\.[0-9]{1,3}){0,3}") {
        for dialect in [Dialect::ensembl_gff3(), Dialect::refseq_gff3(), Dialect::gencode_gtf()] {
            let canon = dialect.id_canon().unwrap();
            let once = canon.canonical_id(&raw);
            prop_assert_eq!(canon.canonical_id(&once), once);
        }
        let bare = IdCanon::default();
        prop_assert_eq!(bare.canonical_id(&raw), raw.trim());
    }

    #[test]
    fn contig_rules_are_idempotent(name in "[A-Za-z_]{1,8}(\\.[0-9]{1,2})?") {
        let rules = [
            ContigRule::Keep,
            ContigRule::StripVersion,
            ContigRule::AddPrefix("chr".to_string()),
            ContigRule::StripPrefix("chr".to_string()),
            ContigRule::AppendSuffix(".1".to_string()),
        ];
        for rule in rules {
            let once = rule.apply(&name).unwrap();
            prop_assert_eq!(rule.apply(&once).unwrap(), once);
        }
    }

    #[test]
    fn overlap_test_is_symmetric(a in interval_strategy(), b in interval_strategy()) {
        let ivs = to_intervals(vec![a, b], false);
        prop_assert_eq!(overlap_test(&ivs[0], &ivs[1]), overlap_test(&ivs[1], &ivs[0]));
    }

    #[test]
    fn overlaps_match_brute_force(
        queries in prop::collection::vec(interval_strategy(), 0..30),
        refs in prop::collection::vec(interval_strategy(), 0..30),
    ) {
        let mut queries = to_intervals(queries, true);
        let mut seen = BTreeSet::new();
        queries.retain(|q| seen.insert(q.feature_id.clone()));
        let refs = to_intervals(refs, false);

        let out = overlaps(&queries, &refs).value;
        for q in &queries {
            let mut expected: Vec<&GenomicInterval> = refs.iter().filter(|r| r.overlaps(q)).collect();
            expected.sort_by(|a, b| a.sort_cmp(b));
            let expected: Vec<String> = expected.iter().map(|r| r.feature_id.clone()).collect();
            match out.get(&q.feature_id) {
                Some(found) => prop_assert_eq!(found, &expected),
                None => prop_assert!(expected.is_empty()),
            }
        }
    }

    #[test]
    fn closest_distance_is_the_minimum_gap(
        queries in prop::collection::vec(interval_strategy(), 1..30),
        refs in prop::collection::vec(interval_strategy(), 1..30),
    ) {
        let mut queries = to_intervals(queries, true);
        let mut seen = BTreeSet::new();
        queries.retain(|q| seen.insert(q.feature_id.clone()));
        let refs = to_intervals(refs, false);

        let out = closest(&queries, &refs).value;
        for q in &queries {
            let best = refs.iter().filter(|r| r.contig == q.contig).map(|r| gap(q, r)).min();
            match (best, out.get(&q.feature_id)) {
                (Some(best), Some(hit)) => {
                    prop_assert_eq!(hit.signed_distance.unsigned_abs(), best);
                    let r = refs.iter().find(|r| r.feature_id == hit.ref_id).unwrap();
                    prop_assert_eq!(gap(q, r), best);
                }
                (None, None) => {}
                (best, hit) => prop_assert!(false, "brute force {:?} vs resolver {:?}", best, hit),
            }
        }
    }

    #[test]
    fn rbh_members_are_unique(
        forward in prop::collection::vec((0u8..8, 0u8..8, 0u32..100), 0..40),
        backward in prop::collection::vec((0u8..8, 0u8..8, 0u32..100), 0..40),
    ) {
        let mk = |rows: &[(u8, u8, u32)], dir: HitDirection, qp: &str, tp: &str| -> Vec<BestHitPair> {
            rows.iter()
                .map(|(q, t, s)| BestHitPair {
                    query_id: format!("{qp}{q}"),
                    target_id: format!("{tp}{t}"),
                    score: f64::from(*s),
                    evalue: 0.0,
                    direction: dir,
                })
                .collect()
        };
        let fwd = mk(&forward, HitDirection::AtoB, "g", "h");
        let bwd = mk(&backward, HitDirection::BtoA, "h", "g");
        let pairs = reciprocal_best_hits(&fwd, &bwd);

        let a: BTreeSet<&str> = pairs.iter().map(|p| p.gene_a.as_str()).collect();
        let b: BTreeSet<&str> = pairs.iter().map(|p| p.gene_b.as_str()).collect();
        prop_assert_eq!(a.len(), pairs.len());
        prop_assert_eq!(b.len(), pairs.len());

        let mut swapped: Vec<(String, String)> = reciprocal_best_hits(&bwd, &fwd)
            .into_iter()
            .map(|p| (p.gene_b, p.gene_a))
            .collect();
        swapped.sort();
        let straight: Vec<(String, String)> = pairs.into_iter().map(|p| (p.gene_a, p.gene_b)).collect();
        prop_assert_eq!(straight, swapped);
    }

    #[test]
    fn bins_conserve_links(
        distances in prop::collection::vec((0u64..20_000, any::<bool>(), any::<bool>()), 0..200),
        width in 1u64..3_000,
        max in 1u64..20_000,
    ) {
        let links: Vec<SineGeneLink> = distances
            .iter()
            .map(|&(d, up, t)| SineGeneLink {
                sine_locus: String::new(),
                gene_id: String::new(),
                distance: d,
                direction: if up { Direction::Upstream } else { Direction::Downstream },
                sine_transcribed: t,
                gene_expressed: Flag::NA,
            })
            .collect();
        let bins = bin(&links, width, max).unwrap();
        for direction in [Direction::Upstream, Direction::Downstream] {
            let binned: u64 = bins
                .iter()
                .filter(|b| b.direction == direction)
                .map(|b| b.total_count)
                .sum();
            let in_window = links
                .iter()
                .filter(|l| l.direction == direction && l.distance < max)
                .count() as u64;
            prop_assert_eq!(binned, in_window);
        }
        for b in &bins {
            prop_assert_eq!(b.lower % width, 0);
            prop_assert_eq!(b.upper, b.lower + width);
            prop_assert!(b.expressed_count <= b.total_count);
        }
    }

    #[test]
    fn coexpression_is_bounded(
        flags in prop::collection::vec((any::<bool>(), prop::sample::select(vec![Flag::Yes, Flag::No, Flag::NA])), 0..100),
    ) {
        let links: Vec<SineGeneLink> = flags
            .iter()
            .enumerate()
            .map(|(i, &(t, e))| SineGeneLink {
                sine_locus: format!("chr1:{i}-{}", i + 1),
                gene_id: format!("g{}", i % 7),
                distance: i as u64 * 10,
                direction: Direction::Downstream,
                sine_transcribed: t,
                gene_expressed: e,
            })
            .collect();
        let s = CorpusSummary::compute(&[], &BTreeMap::new(), &links, 7, 1000);
        prop_assert!(s.both_expressed <= s.linked_loci);
        prop_assert!((0.0..=1.0).contains(&s.coexpression_rate));
        if links.iter().all(|l| !l.gene_expressed.is_yes()) {
            prop_assert_eq!(s.both_expressed, 0);
        }
    }
}
