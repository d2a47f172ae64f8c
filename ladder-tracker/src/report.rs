//! Plain-text rendering of scan, lookup and race results

use crate::scan::{LookupOrigin, LookupOutcome};
use ladder_common::{Neighbor, RaceStandings, RankedEntry, Standing};
use std::fmt::Write;

/// Standings table, one block per category
///
/// Expects the display order produced by the tally (category ascending).
pub fn format_standings(standings: &[Standing]) -> String {
    if standings.is_empty() {
        return "No characters found.\n".to_string();
    }

    let mut out = String::new();
    let mut current_category: Option<&str> = None;

    for standing in standings {
        let entry = &standing.entry;
        if current_category != Some(entry.category.as_str()) {
            if current_category.is_some() {
                out.push_str(&"-".repeat(60));
                out.push('\n');
            }
            current_category = Some(entry.category.as_str());
        }

        let _ = writeln!(
            out,
            "{:<14} {:>3}  {:<24} {}/{}{}",
            entry.category,
            entry.level,
            entry.name,
            standing.category_rank,
            entry.global_rank,
            status_suffix(entry)
        );
    }

    out
}

/// One-line summary of a lookup outcome
pub fn format_lookup(name: &str, outcome: &LookupOutcome) -> String {
    match outcome {
        LookupOutcome::Found { context, origin } => {
            let entry = &context.entry;
            let source = match origin {
                LookupOrigin::Cached => "cached data",
                LookupOrigin::Remote => "ladder search",
            };
            format!(
                "{} (level {} {}{}): global rank {}, {} rank {} [{}]",
                entry.name,
                entry.level,
                entry.category,
                status_suffix(entry),
                context.global_rank,
                entry.category,
                context.category_rank_at_discovery,
                source
            )
        }
        LookupOutcome::NotFound { scanned, reason } => {
            format!(
                "{} not found after scanning {} entries ({})",
                name,
                group_digits(*scanned as i64),
                reason
            )
        }
    }
}

/// Race view: tracked character with its overall and category neighbors
pub fn format_race(standings: &RaceStandings) -> String {
    let tracked = &standings.tracked;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} - level {} {} - rank {}{}",
        tracked.name,
        tracked.level,
        tracked.category,
        tracked.global_rank,
        if standings.tracked_stale { " (not in window, cached)" } else { "" }
    );

    let _ = writeln!(out, "  Overall");
    write_neighbor(&mut out, "ahead", standings.global.ahead.as_ref());
    write_neighbor(&mut out, "behind", standings.global.behind.as_ref());
    let _ = writeln!(out, "  {}", tracked.category);
    write_neighbor(&mut out, "ahead", standings.category.ahead.as_ref());
    write_neighbor(&mut out, "behind", standings.category.behind.as_ref());

    out
}

fn write_neighbor(out: &mut String, label: &str, neighbor: Option<&Neighbor>) {
    match neighbor {
        Some(n) => {
            let _ = writeln!(
                out,
                "    {:<6} #{:<6} {:<24} lvl {:>3}  XP {}{}",
                label,
                n.entry.global_rank,
                n.entry.name,
                n.entry.level,
                signed_delta(n.experience_delta),
                if n.stale { " (cached)" } else { "" }
            );
        }
        None => {
            let _ = writeln!(out, "    {:<6} -", label);
        }
    }
}

fn status_suffix(entry: &RankedEntry) -> &'static str {
    match (entry.is_dead, entry.is_retired) {
        (true, _) => " [dead]",
        (false, true) => " [retired]",
        _ => "",
    }
}

/// Experience difference with an explicit sign for gains
pub fn signed_delta(delta: i64) -> String {
    if delta > 0 {
        format!("+{}", group_digits(delta))
    } else {
        group_digits(delta)
    }
}

fn group_digits(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::StopReason;
    use ladder_common::{FoundEntryContext, NeighborPair};

    fn entry(rank: u32, name: &str, category: &str) -> RankedEntry {
        RankedEntry {
            global_rank: rank,
            name: name.to_string(),
            level: 92,
            category: category.to_string(),
            experience: 1_000,
            is_dead: false,
            is_retired: false,
        }
    }

    #[test]
    fn test_signed_delta() {
        assert_eq!(signed_delta(1_234_567), "+1,234,567");
        assert_eq!(signed_delta(-999), "-999");
        assert_eq!(signed_delta(-1_000), "-1,000");
        assert_eq!(signed_delta(0), "0");
    }

    #[test]
    fn test_standings_separate_categories() {
        let standings = vec![
            Standing { entry: entry(3, "a", "Assassin"), category_rank: 1 },
            Standing { entry: entry(9, "b", "Slayer"), category_rank: 2 },
        ];
        let text = format_standings(&standings);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("1/3"));
        assert!(lines[1].starts_with('-'));
        assert!(lines[2].contains("2/9"));
    }

    #[test]
    fn test_empty_standings() {
        assert_eq!(format_standings(&[]), "No characters found.\n");
    }

    #[test]
    fn test_lookup_found_mentions_origin() {
        let mut dead = entry(42, "Target", "Witch");
        dead.is_dead = true;
        let outcome = LookupOutcome::Found {
            context: FoundEntryContext {
                entry: dead,
                category_rank_at_discovery: 5,
                global_rank: 42,
            },
            origin: LookupOrigin::Cached,
        };
        let text = format_lookup("Target", &outcome);
        assert!(text.contains("global rank 42"));
        assert!(text.contains("Witch rank 5"));
        assert!(text.contains("[dead]"));
        assert!(text.contains("cached data"));
    }

    #[test]
    fn test_lookup_not_found() {
        let outcome = LookupOutcome::NotFound {
            scanned: 15_000,
            reason: StopReason::DepthCeiling,
        };
        assert_eq!(
            format_lookup("Nobody", &outcome),
            "Nobody not found after scanning 15,000 entries (depth ceiling reached)"
        );
    }

    #[test]
    fn test_race_marks_stale_neighbors() {
        let standings = RaceStandings {
            tracked: entry(10, "me", "Witch"),
            global: NeighborPair {
                ahead: Some(Neighbor {
                    entry: entry(9, "rival", "Witch"),
                    experience_delta: 2_500,
                    stale: true,
                }),
                behind: None,
            },
            category: NeighborPair::default(),
            tracked_stale: false,
        };
        let text = format_race(&standings);
        assert!(text.contains("+2,500 (cached)"));
        assert!(text.contains("behind -"));
    }
}
