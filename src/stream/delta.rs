// Delta extractor
//
// Pulls the incremental text out of an OpenAI-style chunk payload:
// `choices[0].delta.content`. Role-only and finish-reason-only chunks carry
// no content and yield "".

/// Text fragment carried by `payload`, or `""` when the shape has none.
pub fn extract_delta(payload: &serde_json::Value) -> &str {
    payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
}
