//! Hybrid query compiler
//!
//! Builds one engine query combining up to three ranked sub-queries (fuzzy
//! lexical match, text-vector knn, image-vector knn), each carrying the same
//! category filter. With nothing to rank, a filtered match-all stands in.
//! The engine is asked for double the final result count to leave headroom
//! for deduplication and per-video grouping.

use serde_json::{json, Value};
use videoseek_common::CategoryId;

use crate::access::CategoryAccess;

/// Inputs to the query compiler
#[derive(Debug, Clone)]
pub struct QueryInputs<'a> {
    pub access: &'a CategoryAccess,
    pub requested_category: Option<CategoryId>,
    pub search_text: &'a str,
    pub text_embedding: Option<&'a [f32]>,
    pub image_embedding: Option<&'a [f32]>,
    /// Final result cap; the engine is asked for twice this
    pub result_cap: usize,
}

/// Compose the engine query body.
#[must_use]
pub fn build_hybrid_query(inputs: &QueryInputs<'_>) -> Value {
    let max_results = inputs.result_cap.max(1) * 2;

    let filters = category_filters(inputs.access, inputs.requested_category);
    // knn clauses need a query object, so the filters ride in a bool query.
    let sub_query_filter = if filters.is_empty() {
        None
    } else {
        Some(json!({"bool": {"filter": filters}}))
    };

    let mut clauses: Vec<Value> = Vec::new();
    let cleaned_text = inputs.search_text.trim();

    if !cleaned_text.is_empty() {
        let text_query = json!({
            "match": {
                "text_content": {
                    "query": cleaned_text,
                    "operator": "and",
                    "fuzziness": "AUTO",
                }
            }
        });
        if filters.is_empty() {
            clauses.push(text_query);
        } else {
            clauses.push(json!({"bool": {"must": [text_query], "filter": filters}}));
        }
    }

    if let Some(vector) = inputs.text_embedding {
        clauses.push(knn_clause(
            "text_embedding",
            vector,
            max_results,
            sub_query_filter.as_ref(),
        ));
    }
    if let Some(vector) = inputs.image_embedding {
        clauses.push(knn_clause(
            "image_embedding",
            vector,
            max_results,
            sub_query_filter.as_ref(),
        ));
    }

    let query = if clauses.is_empty() {
        // Nothing to rank: plain filtered retrieval.
        json!({"bool": {"filter": filters, "must": [{"match_all": {}}]}})
    } else {
        json!({"hybrid": {"queries": clauses}})
    };

    json!({
        "size": max_results,
        "query": query,
        "sort": [{"_score": {"order": "desc"}}],
        "_source": [
            "title",
            "video_id",
            "chunk_type",
            "start_seconds",
            "upload_timestamp",
        ],
    })
}

fn category_filters(access: &CategoryAccess, requested: Option<CategoryId>) -> Vec<Value> {
    if let Some(category) = requested {
        return vec![json!({"term": {"category_id": category}})];
    }
    match access.allowed_ids() {
        Some(ids) => vec![json!({"terms": {"category_id": ids}})],
        None => Vec::new(),
    }
}

fn knn_clause(field: &str, vector: &[f32], max_results: usize, filter: Option<&Value>) -> Value {
    let mut clause = json!({
        "field": field,
        "query_vector": vector,
        "k": max_results,
        "num_candidates": (max_results * 4).max(100),
    });
    if let Some(filter) = filter {
        clause["filter"] = filter.clone();
    }
    json!({"knn": clause})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs<'a>(
        access: &'a CategoryAccess,
        text: &'a str,
        text_embedding: Option<&'a [f32]>,
        image_embedding: Option<&'a [f32]>,
    ) -> QueryInputs<'a> {
        QueryInputs {
            access,
            requested_category: None,
            search_text: text,
            text_embedding,
            image_embedding,
            result_cap: 50,
        }
    }

    #[test]
    fn test_requests_double_headroom_sorted_by_score() {
        let access = CategoryAccess::Unrestricted;
        let body = build_hybrid_query(&inputs(&access, "hello", None, None));
        assert_eq!(body["size"], 100);
        assert_eq!(body["sort"][0]["_score"]["order"], "desc");
        assert_eq!(body["_source"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_text_only_unrestricted_is_bare_match() {
        let access = CategoryAccess::Unrestricted;
        let body = build_hybrid_query(&inputs(&access, "solar panels", None, None));
        let queries = body["query"]["hybrid"]["queries"].as_array().unwrap();
        assert_eq!(queries.len(), 1);
        let match_clause = &queries[0]["match"]["text_content"];
        assert_eq!(match_clause["query"], "solar panels");
        assert_eq!(match_clause["fuzziness"], "AUTO");
    }

    #[test]
    fn test_all_three_clauses_present() {
        let access = CategoryAccess::Unrestricted;
        let text_vec = vec![0.1f32; 4];
        let image_vec = vec![0.2f32; 4];
        let body = build_hybrid_query(&inputs(
            &access,
            "solar",
            Some(&text_vec),
            Some(&image_vec),
        ));
        let queries = body["query"]["hybrid"]["queries"].as_array().unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[1]["knn"]["field"], "text_embedding");
        assert_eq!(queries[2]["knn"]["field"], "image_embedding");
        assert_eq!(queries[1]["knn"]["num_candidates"], 400);
    }

    #[test]
    fn test_restricted_set_filters_every_clause() {
        let access = CategoryAccess::Restricted(vec![1, 2]);
        let text_vec = vec![0.1f32; 4];
        let body = build_hybrid_query(&inputs(&access, "solar", Some(&text_vec), None));
        let queries = body["query"]["hybrid"]["queries"].as_array().unwrap();
        assert_eq!(
            queries[0]["bool"]["filter"][0]["terms"]["category_id"],
            json!([1, 2])
        );
        assert_eq!(
            queries[1]["knn"]["filter"]["bool"]["filter"][0]["terms"]["category_id"],
            json!([1, 2])
        );
    }

    #[test]
    fn test_requested_category_becomes_term_filter() {
        let access = CategoryAccess::Restricted(vec![1, 2]);
        let mut query_inputs = inputs(&access, "solar", None, None);
        query_inputs.requested_category = Some(2);
        let body = build_hybrid_query(&query_inputs);
        let queries = body["query"]["hybrid"]["queries"].as_array().unwrap();
        assert_eq!(
            queries[0]["bool"]["filter"][0]["term"]["category_id"],
            json!(2)
        );
    }

    #[test]
    fn test_no_inputs_falls_back_to_filtered_match_all() {
        let access = CategoryAccess::Restricted(vec![7]);
        let body = build_hybrid_query(&inputs(&access, "  ", None, None));
        assert!(body["query"]["hybrid"].is_null());
        assert_eq!(
            body["query"]["bool"]["filter"][0]["terms"]["category_id"],
            json!([7])
        );
        assert_eq!(body["query"]["bool"]["must"][0], json!({"match_all": {}}));
    }
}
