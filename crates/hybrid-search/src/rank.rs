//! Result ranking and deduplication
//!
//! Flattens top-level and nested hits into one candidate list, walks it by
//! score descending keeping the first occurrence of each document id,
//! enforces the per-video cap and the global cap, and decorates survivors
//! with video metadata when the document lacks it.

use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use videoseek_common::VideoId;
use videoseek_search_index::SearchResponse;
use videoseek_video_store::VideoMeta;

/// Name of the inner-hits group produced by grouped queries
const INNER_HITS_GROUP: &str = "top_segments";

/// Ranking limits
#[derive(Debug, Clone)]
pub struct RankConfig {
    /// Maximum results any single video may contribute
    pub max_per_video: usize,
    /// Maximum total results returned
    pub max_total: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            max_per_video: env_usize("MAX_SEGMENTS_PER_VIDEO", 10),
            max_total: env_usize("MAX_TOTAL_SEARCH_RESULTS", 50),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&v| v >= 1)
        .unwrap_or(default)
}

/// One flattened candidate hit
#[derive(Debug, Clone)]
pub struct Candidate {
    pub doc_id: String,
    pub score: f64,
    pub source: Value,
}

/// A ranked, deduplicated search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub video_id: VideoId,
    pub chunk_type: String,
    pub start_seconds: Option<f64>,
    pub upload_timestamp: Option<String>,
    pub relevance: f64,
}

/// Flatten top-level hits and nested inner hits into one candidate list.
#[must_use]
pub fn collect_candidates(response: &SearchResponse) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for hit in &response.hits.hits {
        if !hit.source.is_null() {
            candidates.push(Candidate {
                doc_id: hit.id.clone(),
                score: hit.score.unwrap_or(0.0),
                source: hit.source.clone(),
            });
        }
        if let Some(inner) = hit.inner_hits.get(INNER_HITS_GROUP) {
            for inner_hit in &inner.hits.hits {
                if !inner_hit.source.is_null() {
                    candidates.push(Candidate {
                        doc_id: inner_hit.id.clone(),
                        score: inner_hit.score.unwrap_or(0.0),
                        source: inner_hit.source.clone(),
                    });
                }
            }
        }
    }
    candidates
}

/// Video ids referenced by the candidates, for metadata resolution.
#[must_use]
pub fn candidate_video_ids(candidates: &[Candidate]) -> Vec<VideoId> {
    let mut ids: Vec<VideoId> = candidates
        .iter()
        .filter_map(|candidate| candidate.source.get("video_id").and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Rank candidates into the final capped, deduplicated result list.
#[must_use]
pub fn rank(
    mut candidates: Vec<Candidate>,
    video_meta: &HashMap<VideoId, VideoMeta>,
    config: &RankConfig,
) -> Vec<SearchResult> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut per_video: HashMap<VideoId, usize> = HashMap::new();
    let mut results = Vec::new();

    for candidate in candidates {
        if results.len() >= config.max_total.max(1) {
            break;
        }
        // First occurrence wins: the list is score-sorted, so this is the
        // highest-scoring instance of the document.
        if !seen_ids.insert(candidate.doc_id.clone()) {
            continue;
        }

        let Some(video_id) = candidate.source.get("video_id").and_then(Value::as_i64) else {
            continue;
        };

        let count = per_video.entry(video_id).or_insert(0);
        if *count >= config.max_per_video.max(1) {
            continue;
        }
        *count += 1;

        let meta = video_meta.get(&video_id);
        let title = candidate
            .source
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .or_else(|| meta.map(|m| m.title.clone()))
            .unwrap_or_default();
        let upload_timestamp = candidate
            .source
            .get("upload_timestamp")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| meta.map(|m| m.created_at.to_rfc3339()));

        results.push(SearchResult {
            title,
            video_id,
            chunk_type: candidate
                .source
                .get("chunk_type")
                .and_then(Value::as_str)
                .unwrap_or("video")
                .to_string(),
            start_seconds: candidate.source.get("start_seconds").and_then(Value::as_f64),
            upload_timestamp,
            relevance: candidate.score,
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(doc_id: &str, score: f64, video_id: VideoId) -> Candidate {
        Candidate {
            doc_id: doc_id.to_string(),
            score,
            source: json!({
                "video_id": video_id,
                "title": format!("Video {video_id}"),
                "chunk_type": "text_segment",
                "start_seconds": 1.0,
                "upload_timestamp": "2024-05-01T12:00:00Z",
            }),
        }
    }

    fn config(max_per_video: usize, max_total: usize) -> RankConfig {
        RankConfig {
            max_per_video,
            max_total,
        }
    }

    #[test]
    fn test_duplicate_ids_keep_highest_score() {
        let candidates = vec![
            candidate("a", 0.4, 1),
            candidate("a", 0.9, 1),
            candidate("b", 0.5, 1),
        ];
        let results = rank(candidates, &HashMap::new(), &config(10, 50));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].relevance, 0.9);
        assert_eq!(results[1].relevance, 0.5);
    }

    #[test]
    fn test_per_video_cap() {
        let candidates: Vec<Candidate> = (0..20)
            .map(|i| candidate(&format!("v1-{i}"), 1.0 - i as f64 * 0.01, 1))
            .chain((0..3).map(|i| candidate(&format!("v2-{i}"), 0.5 - i as f64 * 0.01, 2)))
            .collect();
        let results = rank(candidates, &HashMap::new(), &config(10, 50));
        let video1_count = results.iter().filter(|r| r.video_id == 1).count();
        assert_eq!(video1_count, 10);
        assert_eq!(results.iter().filter(|r| r.video_id == 2).count(), 3);
    }

    #[test]
    fn test_global_cap_and_score_order() {
        let candidates: Vec<Candidate> = (0..100)
            .map(|i| candidate(&format!("v{i}-0"), i as f64, i as VideoId))
            .collect();
        let results = rank(candidates, &HashMap::new(), &config(10, 50));
        assert_eq!(results.len(), 50);
        for pair in results.windows(2) {
            assert!(pair[0].relevance >= pair[1].relevance);
        }
        assert_eq!(results[0].relevance, 99.0);
    }

    #[test]
    fn test_metadata_resolution_fills_missing_title() {
        let mut source = json!({"video_id": 3, "chunk_type": "keyframe"});
        source["title"] = json!("");
        let candidates = vec![Candidate {
            doc_id: "3-keyframe-0".into(),
            score: 1.0,
            source,
        }];
        let mut meta = HashMap::new();
        meta.insert(
            3,
            VideoMeta {
                title: "Resolved title".into(),
                created_at: chrono::Utc::now(),
            },
        );
        let results = rank(candidates, &meta, &config(10, 50));
        assert_eq!(results[0].title, "Resolved title");
        assert!(results[0].upload_timestamp.is_some());
    }

    #[test]
    fn test_candidates_without_video_id_are_dropped() {
        let candidates = vec![Candidate {
            doc_id: "orphan".into(),
            score: 2.0,
            source: json!({"title": "No video"}),
        }];
        let results = rank(candidates, &HashMap::new(), &config(10, 50));
        assert!(results.is_empty());
    }

    #[test]
    fn test_collect_candidates_flattens_inner_hits() {
        let response: SearchResponse = serde_json::from_value(json!({
            "hits": {"hits": [{
                "_id": "5",
                "_score": 2.0,
                "_source": {"video_id": 5},
                "inner_hits": {
                    "top_segments": {"hits": {"hits": [
                        {"_id": "5-segment-0-0", "_score": 1.5, "_source": {"video_id": 5}},
                        {"_id": "5-segment-0-1", "_score": 1.0, "_source": {"video_id": 5}}
                    ]}}
                }
            }]}
        }))
        .unwrap();
        let candidates = collect_candidates(&response);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidate_video_ids(&candidates), vec![5]);
    }
}
