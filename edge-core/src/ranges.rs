/// Range table: IPv4 address -> country code.
///
/// Ranges are kept in registration order (the order the store returned
/// them). Lookup does not scan them: construction compiles the ranges into
/// disjoint sorted segments, each owned by the earliest-registered range
/// covering it, so a binary search gives the same answer a first-match
/// linear scan would.
use edge_proto::addr::to_dotted_quad;
use edge_proto::records::IpRange;
use serde::Serialize;
use std::collections::BTreeSet;

/// A range plus the key it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry {
    pub id: String,
    pub range: IpRange,
}

/// Row of the range listing served to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeListing {
    pub id: String,
    pub ip_inicio: String,
    pub ip_fin: String,
    pub codigo_pais: String,
    pub nombre_pais: String,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: u32,
    end: u32,
    /// Index into `entries`.
    owner: usize,
}

#[derive(Debug, Default)]
pub struct RangeTable {
    entries: Vec<RangeEntry>,
    segments: Vec<Segment>,
}

impl RangeTable {
    /// Build from entries in registration order. Entries with `start > end`
    /// are dropped.
    pub fn new(entries: Vec<RangeEntry>) -> Self {
        let entries: Vec<RangeEntry> = entries
            .into_iter()
            .filter(|e| {
                if e.range.start > e.range.end {
                    tracing::warn!(
                        id = %e.id,
                        start = e.range.start,
                        end = e.range.end,
                        "Skipping inverted IP range"
                    );
                    false
                } else {
                    true
                }
            })
            .collect();
        let segments = compile_segments(&entries);
        Self { entries, segments }
    }

    /// Build from bare ranges; ids are their positions.
    pub fn from_ranges(ranges: impl IntoIterator<Item = IpRange>) -> Self {
        Self::new(
            ranges
                .into_iter()
                .enumerate()
                .map(|(i, range)| RangeEntry {
                    id: i.to_string(),
                    range,
                })
                .collect(),
        )
    }

    /// The earliest-registered range containing `ip`, bounds inclusive.
    pub fn lookup(&self, ip: u32) -> Option<&RangeEntry> {
        let idx = self.segments.partition_point(|s| s.start <= ip);
        let segment = self.segments.get(idx.checked_sub(1)?)?;
        (segment.end >= ip).then(|| &self.entries[segment.owner])
    }

    pub fn resolve_country(&self, ip: u32) -> Option<&str> {
        self.lookup(ip).map(|e| e.range.country.as_str())
    }

    pub fn entries(&self) -> &[RangeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn listing(&self) -> Vec<RangeListing> {
        self.entries
            .iter()
            .map(|e| RangeListing {
                id: e.id.clone(),
                ip_inicio: to_dotted_quad(e.range.start),
                ip_fin: to_dotted_quad(e.range.end),
                codigo_pais: e.range.country.clone(),
                nombre_pais: country_name(&e.range.country).to_string(),
            })
            .collect()
    }
}

/// Sweep over range boundaries. Between two consecutive boundaries the set
/// of covering ranges is constant, so each elementary interval gets the
/// smallest covering index. Adjacent intervals with the same owner merge.
fn compile_segments(entries: &[RangeEntry]) -> Vec<Segment> {
    // u64 so that `end + 1` cannot overflow at 255.255.255.255.
    let mut opens: Vec<(u64, usize)> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (u64::from(e.range.start), i))
        .collect();
    let mut closes: Vec<(u64, usize)> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (u64::from(e.range.end) + 1, i))
        .collect();
    opens.sort_unstable();
    closes.sort_unstable();

    let mut bounds: Vec<u64> = opens.iter().chain(closes.iter()).map(|&(b, _)| b).collect();
    bounds.sort_unstable();
    bounds.dedup();

    let mut segments: Vec<Segment> = Vec::new();
    let mut active = BTreeSet::new();
    let (mut next_open, mut next_close) = (0, 0);

    for window in bounds.windows(2) {
        let (lo, hi) = (window[0], window[1]);
        while next_close < closes.len() && closes[next_close].0 <= lo {
            active.remove(&closes[next_close].1);
            next_close += 1;
        }
        while next_open < opens.len() && opens[next_open].0 <= lo {
            active.insert(opens[next_open].1);
            next_open += 1;
        }

        let Some(&owner) = active.first() else {
            continue;
        };
        // lo < hi <= 2^32, so both fit.
        let (start, end) = (lo as u32, (hi - 1) as u32);
        match segments.last_mut() {
            Some(last) if last.owner == owner && u64::from(last.end) + 1 == lo => last.end = end,
            _ => segments.push(Segment { start, end, owner }),
        }
    }

    segments
}

/// Display name for a country code, or the code itself when unknown.
pub fn country_name(code: &str) -> &str {
    match code {
        "CR" => "Costa Rica",
        "US" => "Estados Unidos",
        "ES" => "España",
        "BR" => "Brasil",
        "DE" => "Alemania",
        "JP" => "Japón",
        other => other,
    }
}
