//! 自动采集的路线对生成
//!
//! - `Smart`: 每个起点在距离范围内取最短、中位、最长三个终点
//! - `Exhaustive`: 距离范围内的所有有序点对

use contracts::{AutoConfig, Location, RouteStrategy};
use serde::Serialize;
use simulator::distance;

/// Candidate route between two spawn points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoutePair {
    pub start: usize,
    pub end: usize,
    /// Straight-line distance (m)
    pub distance_m: f64,
}

/// Generate candidate routes from the map's spawn points.
///
/// Output is ordered by start index, then by distance; `max_routes` truncates.
pub fn generate_route_pairs(points: &[Location], config: &AutoConfig) -> Vec<RoutePair> {
    let mut pairs = Vec::new();

    for (start, from) in points.iter().enumerate() {
        let mut candidates: Vec<RoutePair> = points
            .iter()
            .enumerate()
            .filter(|(end, _)| *end != start)
            .map(|(end, to)| RoutePair {
                start,
                end,
                distance_m: distance(from, to),
            })
            .filter(|p| p.distance_m >= config.min_distance_m && p.distance_m <= config.max_distance_m)
            .collect();
        if candidates.is_empty() {
            continue;
        }
        candidates.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m).then(a.end.cmp(&b.end)));

        match config.strategy {
            RouteStrategy::Exhaustive => pairs.extend(candidates),
            RouteStrategy::Smart => {
                let last = candidates.len() - 1;
                let mut picks = vec![0, last / 2, last];
                picks.dedup();
                pairs.extend(picks.into_iter().map(|i| candidates[i]));
            }
        }
    }

    if let Some(max) = config.max_routes {
        pairs.truncate(max);
    }
    pairs
}
