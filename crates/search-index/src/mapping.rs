//! Declarative index schema
//!
//! One logical index holds the parent video documents and their content
//! chunks, joined through the `video_relation` field. Vector dimensions are
//! fixed by configuration and must match the embedding model's output
//! exactly; a mismatch surfaces as a document validation error, not a
//! runtime-recoverable condition.

use serde_json::{json, Value};

/// Build the index settings and mappings body.
#[must_use]
pub fn index_body(text_dims: usize, image_dims: usize) -> Value {
    json!({
        "settings": {
            "index": {
                "number_of_shards": 1,
                "number_of_replicas": 1,
                "knn": true,
                "knn.algo_param.ef_search": 100,
            }
        },
        "mappings": {
            "properties": {
                "video_id": {"type": "long"},
                "title": {
                    "type": "text",
                    "fields": {
                        "keyword": {
                            "type": "keyword",
                            "ignore_above": 256,
                        }
                    },
                },
                "description": {"type": "text"},
                "source_url": {"type": "keyword"},
                "category_id": {"type": "long"},
                "category_name": {"type": "keyword"},
                "upload_timestamp": {"type": "date"},
                "duration_seconds": {"type": "float"},
                "video_relation": {
                    "type": "join",
                    "relations": {"video": "content_chunk"},
                },
                "chunk_type": {"type": "keyword"},
                "start_seconds": {"type": "float"},
                "end_seconds": {"type": "float"},
                "text_content": {"type": "text"},
                "text_embedding": knn_vector(text_dims),
                "keyframe_path": {"type": "keyword"},
                "image_embedding": knn_vector(image_dims),
            }
        },
    })
}

fn knn_vector(dimension: usize) -> Value {
    json!({
        "type": "knn_vector",
        "dimension": dimension,
        "method": {
            "name": "hnsw",
            "space_type": "cosinesimil",
            "engine": "nmslib",
            "parameters": {
                "ef_construction": 128,
                "m": 24,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_dimensions_are_declared() {
        let body = index_body(1024, 512);
        let properties = &body["mappings"]["properties"];
        assert_eq!(properties["text_embedding"]["dimension"], 1024);
        assert_eq!(properties["image_embedding"]["dimension"], 512);
        assert_eq!(
            properties["text_embedding"]["method"]["space_type"],
            "cosinesimil"
        );
    }

    #[test]
    fn test_join_relation_declared() {
        let body = index_body(1024, 512);
        assert_eq!(
            body["mappings"]["properties"]["video_relation"]["relations"]["video"],
            "content_chunk"
        );
    }

    #[test]
    fn test_knn_enabled() {
        let body = index_body(1024, 512);
        assert_eq!(body["settings"]["index"]["knn"], true);
    }
}
