//! Chronological range scan over the Forest timeline.

use super::{CompiledFilter, PlaceCount, QueryRecord, QueryRequest, QueryResult, TimeCursor, TimeOrder};
use crate::error::Result;
use crate::tree::{Forest, NodeId, TimeKey};

pub(crate) fn scan_timeline(
    forest: &Forest,
    places: &[NodeId],
    req: &QueryRequest,
    filter: &CompiledFilter,
) -> Result<QueryResult> {
    let order = req.order.unwrap_or(TimeOrder::Newest);
    let cursor: Option<TimeCursor> = req.start.as_deref().map(str::parse).transpose()?;
    let timeline = forest.timeline();

    // The timeline is ascending by (mtime, uuid); the cursor marks the key
    // at (or just past, for an exclusive cursor) which scanning resumes.
    let candidates: Box<dyn Iterator<Item = &TimeKey> + '_> = match order {
        TimeOrder::Oldest => {
            let start = match &cursor {
                None => 0,
                Some(c) => {
                    let key = TimeKey { mtime: c.mtime, uuid: c.uuid };
                    if req.start_exclusive {
                        timeline.partition_point(|k| *k <= key)
                    } else {
                        timeline.partition_point(|k| *k < key)
                    }
                }
            };
            Box::new(timeline[start..].iter())
        }
        TimeOrder::Newest => {
            let end = match &cursor {
                None => timeline.len(),
                Some(c) => {
                    let key = TimeKey { mtime: c.mtime, uuid: c.uuid };
                    if req.start_exclusive {
                        timeline.partition_point(|k| *k < key)
                    } else {
                        timeline.partition_point(|k| *k <= key)
                    }
                }
            };
            Box::new(timeline[..end].iter().rev())
        }
    };

    let limit = req.count.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    let mut total = 0usize;
    let mut per_place = vec![0usize; places.len()];

    for key in candidates {
        let Some(id) = forest.node_by_uuid(key.uuid) else {
            continue;
        };
        let Some(node) = forest.node(id) else { continue };
        let Some(file) = node.as_file() else { continue };
        if !filter.matches_file(&node.name, &file.tags) {
            continue;
        }
        let Some(place) = forest.matched_place(id, places) else {
            continue;
        };
        if req.count_only {
            total += 1;
            per_place[place] += 1;
            continue;
        }
        let namepath = forest
            .namepath_below(id, places[place])
            .unwrap_or_else(|| vec![node.name.clone()]);
        records.push(QueryRecord {
            place,
            uuid: node.uuid,
            kind: crate::types::EntryKind::File,
            namepath,
            size: file.size,
            mtime: file.mtime,
            hash: file.hash.clone(),
            tags: file.tags.clone(),
            media: file.media.clone(),
        });
        if records.len() >= limit {
            break;
        }
    }

    if req.count_only {
        if req.group_by_place {
            Ok(QueryResult::PlaceCounts(
                per_place
                    .into_iter()
                    .enumerate()
                    .map(|(place, count)| PlaceCount { place, count })
                    .collect(),
            ))
        } else {
            Ok(QueryResult::Count(total))
        }
    } else {
        Ok(QueryResult::Records(records))
    }
}
