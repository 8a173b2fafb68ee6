//! End-to-end ranking flow over a raw engine response

use std::collections::HashMap;
use videoseek_hybrid_search::rank::{candidate_video_ids, collect_candidates};
use videoseek_hybrid_search::{rank, RankConfig};
use videoseek_search_index::SearchResponse;

fn response_fixture() -> SearchResponse {
    // Two videos; video 1 appears both as a parent hit with nested segment
    // hits and as duplicated top-level chunks with diverging scores.
    serde_json::from_value(serde_json::json!({
        "hits": {"hits": [
            {
                "_id": "1",
                "_score": 3.0,
                "_source": {
                    "video_id": 1,
                    "title": "Solar power basics",
                    "chunk_type": "video",
                    "upload_timestamp": "2024-04-01T08:00:00Z"
                },
                "inner_hits": {"top_segments": {"hits": {"hits": [
                    {
                        "_id": "1-segment-0-0",
                        "_score": 2.5,
                        "_source": {
                            "video_id": 1,
                            "title": "Solar power basics",
                            "chunk_type": "text_segment",
                            "start_seconds": 12.0
                        }
                    },
                    {
                        "_id": "1-segment-0-1",
                        "_score": 2.0,
                        "_source": {
                            "video_id": 1,
                            "title": "Solar power basics",
                            "chunk_type": "text_segment",
                            "start_seconds": 60.0
                        }
                    }
                ]}}}
            },
            {
                "_id": "1-segment-0-0",
                "_score": 1.0,
                "_source": {
                    "video_id": 1,
                    "title": "Solar power basics",
                    "chunk_type": "text_segment",
                    "start_seconds": 12.0
                }
            },
            {
                "_id": "2-keyframe-4000",
                "_score": 2.8,
                "_source": {
                    "video_id": 2,
                    "title": "Wind turbines",
                    "chunk_type": "keyframe",
                    "start_seconds": 4.0,
                    "upload_timestamp": "2024-05-01T08:00:00Z"
                }
            }
        ]}
    }))
    .unwrap()
}

#[test]
fn test_flatten_dedup_and_rank() {
    let response = response_fixture();
    let candidates = collect_candidates(&response);
    // One parent, two nested segments, one duplicated segment, one keyframe.
    assert_eq!(candidates.len(), 5);
    assert_eq!(candidate_video_ids(&candidates), vec![1, 2]);

    let config = RankConfig {
        max_per_video: 10,
        max_total: 50,
    };
    let results = rank(candidates, &HashMap::new(), &config);

    // Duplicate "1-segment-0-0" collapsed to its higher-scoring instance.
    assert_eq!(results.len(), 4);
    let duplicated: Vec<_> = results
        .iter()
        .filter(|r| r.chunk_type == "text_segment" && r.start_seconds == Some(12.0))
        .collect();
    assert_eq!(duplicated.len(), 1);
    assert_eq!(duplicated[0].relevance, 2.5);

    // Score-descending order across videos.
    let scores: Vec<f64> = results.iter().map(|r| r.relevance).collect();
    assert_eq!(scores, vec![3.0, 2.8, 2.5, 2.0]);
}

#[test]
fn test_per_video_cap_applies_across_nested_hits() {
    let response = response_fixture();
    let candidates = collect_candidates(&response);
    let config = RankConfig {
        max_per_video: 1,
        max_total: 50,
    };
    let results = rank(candidates, &HashMap::new(), &config);

    assert_eq!(results.iter().filter(|r| r.video_id == 1).count(), 1);
    assert_eq!(results.iter().filter(|r| r.video_id == 2).count(), 1);
    // The surviving entry per video is its highest-scoring document.
    assert_eq!(
        results.iter().find(|r| r.video_id == 1).unwrap().relevance,
        3.0
    );
}
