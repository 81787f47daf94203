//! Offset vs. scroll pagination decisions. Stateless: page numbers and scroll
//! ids always arrive with the request.

use crate::models::{Pagination, SearchRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePlan {
    Offset { from: u64, size: u32 },
    ScrollStart { ttl: String, size: u32 },
    ScrollContinue { ttl: String, scroll_id: String },
    /// Needs a zero-size count probe before choosing between offset and scroll.
    Probe { trigger: u64 },
}

impl PagePlan {
    pub fn is_scrolling(&self) -> bool {
        matches!(self, PagePlan::ScrollStart { .. } | PagePlan::ScrollContinue { .. })
    }

    /// URL query parameters owned by pagination. Continuations carry theirs in
    /// the body.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        match self {
            PagePlan::Offset { from, size } => {
                vec![("from", from.to_string()), ("size", size.to_string())]
            }
            PagePlan::ScrollStart { ttl, size } => {
                vec![("scroll", ttl.clone()), ("size", size.to_string())]
            }
            PagePlan::ScrollContinue { .. } => Vec::new(),
            PagePlan::Probe { .. } => vec![("size", "0".to_string())],
        }
    }
}

pub fn plan(request: &SearchRequest) -> PagePlan {
    if let Some(scroll_id) = &request.scroll_id {
        return PagePlan::ScrollContinue {
            ttl: request.scroll_ttl.clone(),
            scroll_id: scroll_id.clone(),
        };
    }

    if request.scroll && !request.requests_aggregations() {
        if request.scroll_trigger == 0 {
            return PagePlan::ScrollStart {
                ttl: request.scroll_ttl.clone(),
                size: request.per_page,
            };
        }
        return PagePlan::Probe {
            trigger: request.scroll_trigger,
        };
    }

    offset_plan(request)
}

/// Turns a probe outcome into the plan for the primary call. A failed probe
/// (`None`) falls back to offset pagination.
pub fn resolve_probe(request: &SearchRequest, probed_total: Option<u64>) -> PagePlan {
    match probed_total {
        Some(total) if total >= request.scroll_trigger => PagePlan::ScrollStart {
            ttl: request.scroll_ttl.clone(),
            size: request.per_page,
        },
        _ => offset_plan(request),
    }
}

fn offset_plan(request: &SearchRequest) -> PagePlan {
    PagePlan::Offset {
        from: u64::from(request.page.saturating_sub(1)) * u64::from(request.per_page),
        size: request.per_page,
    }
}

pub fn page_count(total: u64, per_page: u32) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(u64::from(per_page))
}

/// `cursor` is set only while scrolling: the scroll id when more results
/// remain, `""` once a page comes back empty. A non-empty page without a
/// scroll id gets no cursor.
pub fn compute_pagination(
    total: u64,
    count: u64,
    per_page: u32,
    page: u32,
    scrolling: bool,
    scroll_id: Option<&str>,
) -> Pagination {
    let cursor = if !scrolling {
        None
    } else if count == 0 {
        Some(String::new())
    } else if total > u64::from(per_page) {
        scroll_id
            .filter(|scroll_id| !scroll_id.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    Pagination {
        total,
        count,
        per_page,
        page,
        pages: page_count(total, per_page),
        cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn request() -> SearchRequest {
        SearchRequest {
            body: json!({"query": {"match_all": {}}}),
            path: "_search".to_string(),
            page: 1,
            per_page: 20,
            scroll: false,
            scroll_id: None,
            scroll_ttl: "2m".to_string(),
            scroll_trigger: 10_000,
            params: BTreeMap::new(),
        }
    }

    #[test]
    fn offset_plan_uses_page_and_size() {
        let request = SearchRequest {
            page: 3,
            ..request()
        };
        assert_eq!(plan(&request), PagePlan::Offset { from: 40, size: 20 });
        assert_eq!(
            plan(&request).query_params(),
            vec![("from", "40".to_string()), ("size", "20".to_string())]
        );
    }

    #[test]
    fn first_scroll_page_plans_a_probe() {
        let request = SearchRequest {
            scroll: true,
            ..request()
        };
        assert_eq!(plan(&request), PagePlan::Probe { trigger: 10_000 });
        assert_eq!(
            plan(&request).query_params(),
            vec![("size", "0".to_string())]
        );
    }

    #[test]
    fn small_totals_downgrade_to_offset() {
        let request = SearchRequest {
            scroll: true,
            ..request()
        };
        let resolved = resolve_probe(&request, Some(500));
        assert_eq!(resolved, PagePlan::Offset { from: 0, size: 20 });
        assert!(!resolved.is_scrolling());
    }

    #[test]
    fn large_totals_scroll() {
        let request = SearchRequest {
            scroll: true,
            ..request()
        };
        let resolved = resolve_probe(&request, Some(50_000));
        assert_eq!(
            resolved,
            PagePlan::ScrollStart {
                ttl: "2m".to_string(),
                size: 20
            }
        );
        assert_eq!(
            resolved.query_params(),
            vec![("scroll", "2m".to_string()), ("size", "20".to_string())]
        );
    }

    #[test]
    fn failed_probe_fails_open_to_offset() {
        let request = SearchRequest {
            scroll: true,
            ..request()
        };
        assert!(matches!(resolve_probe(&request, None), PagePlan::Offset { .. }));
    }

    #[test]
    fn aggregations_never_scroll() {
        let request = SearchRequest {
            scroll: true,
            body: json!({"aggregations": {"types": {"terms": {"field": "placetype"}}}}),
            ..request()
        };
        assert!(matches!(plan(&request), PagePlan::Offset { .. }));
    }

    #[test]
    fn scroll_id_means_continuation() {
        let request = SearchRequest {
            scroll: true,
            scroll_id: Some("c2Nyb2xs".to_string()),
            ..request()
        };
        let planned = plan(&request);
        assert_eq!(
            planned,
            PagePlan::ScrollContinue {
                ttl: "2m".to_string(),
                scroll_id: "c2Nyb2xs".to_string()
            }
        );
        assert!(planned.query_params().is_empty());
    }

    #[test]
    fn zero_trigger_scrolls_without_probe() {
        let request = SearchRequest {
            scroll: true,
            scroll_trigger: 0,
            ..request()
        };
        assert!(matches!(plan(&request), PagePlan::ScrollStart { .. }));
    }

    #[test]
    fn pages_round_up() {
        assert_eq!(page_count(101, 20), 6);
        assert_eq!(page_count(100, 20), 5);
        assert_eq!(page_count(0, 20), 0);
    }

    #[test]
    fn cursor_only_while_scrolling_with_more_results() {
        let offset = compute_pagination(101, 20, 20, 1, false, None);
        assert_eq!(offset.cursor, None);
        assert_eq!(offset.pages, 6);

        let scrolling = compute_pagination(101, 20, 20, 1, true, Some("abc"));
        assert_eq!(scrolling.cursor.as_deref(), Some("abc"));
        assert!(scrolling.has_more());

        let drained = compute_pagination(101, 0, 20, 7, true, Some("abc"));
        assert_eq!(drained.cursor.as_deref(), Some(""));
        assert!(!drained.has_more());

        let single_page = compute_pagination(5, 5, 20, 1, true, Some("abc"));
        assert_eq!(single_page.cursor, None);
    }

    #[test]
    fn missing_scroll_id_is_not_an_exhausted_cursor() {
        let pagination = compute_pagination(25, 10, 10, 1, true, None);
        assert_eq!(pagination.cursor, None);
        assert_eq!(pagination.pages, 3);

        let blank = compute_pagination(25, 10, 10, 1, true, Some(""));
        assert_eq!(blank.cursor, None);
    }
}
