//! Hierarchical query: depth-first walk over each permitted place.

use super::{CompiledFilter, PlaceCount, QueryRecord, QueryRequest, QueryResult, TreeCursor};
use crate::error::Result;
use crate::tree::{Forest, NodeId, TreePosition, Walk};

pub(crate) fn walk_places(
    forest: &Forest,
    places: &[NodeId],
    req: &QueryRequest,
    filter: &CompiledFilter,
) -> Result<QueryResult> {
    let cursor: Option<TreeCursor> = req.last.as_deref().map(str::parse).transpose()?;
    let start_place = cursor.as_ref().map(|c| c.place).unwrap_or(0);
    let files_only = req.files_only || filter.files_only_implied();
    let limit = req.count.unwrap_or(usize::MAX);

    let mut records = Vec::new();
    let mut total = 0usize;
    let mut per_place = vec![0usize; places.len()];

    for (place, &place_id) in places.iter().enumerate().skip(start_place) {
        let resume = cursor
            .as_ref()
            .filter(|c| c.place == place)
            .map(|c| TreePosition {
                kind: c.kind,
                path: c.path.clone(),
            });
        let stopped = forest.iterate(place_id, resume.as_ref(), &mut |id, path| {
            let Some(node) = forest.node(id) else {
                return Walk::Continue;
            };
            let matched = match node.as_file() {
                Some(file) => filter.matches_file(&node.name, &file.tags),
                None => !files_only && filter.matches_dir(&node.name),
            };
            if !matched {
                return Walk::Continue;
            }
            if req.count_only {
                total += 1;
                per_place[place] += 1;
                return Walk::Continue;
            }
            let (size, mtime, hash, tags, media) = match node.as_file() {
                Some(file) => (
                    file.size,
                    file.mtime,
                    file.hash.clone(),
                    file.tags.clone(),
                    file.media.clone(),
                ),
                None => (0, node.mtime(), None, Vec::new(), None),
            };
            records.push(QueryRecord {
                place,
                uuid: node.uuid,
                kind: node.entry_kind(),
                namepath: path.to_vec(),
                size,
                mtime,
                hash,
                tags,
                media,
            });
            if records.len() >= limit {
                Walk::Stop
            } else {
                Walk::Continue
            }
        });
        if stopped {
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
