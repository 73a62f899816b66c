//! Protocol layer tests — header normalization, responses, registry replies, host frames.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bridge_protocol::host::*;
    use bridge_protocol::registry::*;
    use bridge_protocol::*;
    use serde_json::json;

    // ─────────────────────────────────────────────────────────────────────
    // Header normalization
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn single_element_list_yields_that_element() {
        let value: HeaderValue = serde_json::from_value(json!(["v1"])).unwrap();
        assert_eq!(value.normalize(), "v1");
    }

    #[test]
    fn two_element_list_yields_second_element() {
        let value: HeaderValue = serde_json::from_value(json!(["v1", "v2"])).unwrap();
        assert_eq!(value.normalize(), "v2");
    }

    #[test]
    fn three_element_list_still_yields_second_element() {
        let value = HeaderValue::Many(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(value.normalize(), "b");
    }

    #[test]
    fn empty_list_yields_empty_string() {
        assert_eq!(HeaderValue::Many(vec![]).normalize(), "");
    }

    #[test]
    fn plain_string_is_unchanged() {
        let value: HeaderValue = serde_json::from_value(json!("text/html")).unwrap();
        assert_eq!(value, HeaderValue::One("text/html".into()));
        assert_eq!(value.normalize(), "text/html");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = HeaderValue::Many(vec!["v1".into(), "v2".into()]).normalize();
        let twice = HeaderValue::from(once.clone()).normalize();
        assert_eq!(once, twice);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Request decoding
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn request_event_is_decoded_and_normalized() {
        let raw = RawRequest::from_event(json!({
            "id": "req-1",
            "method": "GET",
            "url": "/ping",
            "headers": { "Accept": ["*/*"], "X-Multi": ["a", "b"], "Host": "localhost" },
            "body": ""
        }))
        .unwrap();
        let req = raw.normalize();
        assert_eq!(req.id, "req-1");
        assert_eq!(req.method, "GET");
        assert_eq!(req.headers["Accept"], "*/*");
        assert_eq!(req.headers["X-Multi"], "b");
        assert_eq!(req.headers["Host"], "localhost");
    }

    #[test]
    fn request_event_wrapped_in_argument_list() {
        let raw = RawRequest::from_event(json!([{
            "id": "req-2",
            "method": "POST",
            "url": "/",
            "headers": {},
            "body": "hi"
        }]))
        .unwrap();
        assert_eq!(raw.id, "req-2");
        assert_eq!(raw.body, "hi");
    }

    #[test]
    fn request_without_id_is_rejected() {
        let err = RawRequest::from_event(json!({ "method": "GET" })).unwrap_err();
        assert!(matches!(err, BridgeError::Decode(_)));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let req = Request {
            id: "r".into(),
            method: "GET".into(),
            url: "/".into(),
            headers,
            body: String::new(),
        };
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("x-missing"), None);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Responses
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn response_mode_defaults_to_text() {
        let resp: Response = serde_json::from_value(json!({
            "status": 204,
            "headers": {},
            "body": ""
        }))
        .unwrap();
        assert_eq!(resp.mode(), ResponseMode::Text);
    }

    #[test]
    fn response_serializes_options_mode() {
        let resp = Response::ok("AAEC").with_mode(ResponseMode::Binary);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], 200);
        assert_eq!(json["body"], "AAEC");
        assert_eq!(json["options"]["mode"], "Binary");
    }

    #[test]
    fn failure_maps_to_plain_text_500() {
        let resp = Response::from_handler_result(Err(HandlerError::new("boom")));
        assert_eq!(resp.status, 500);
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.headers["Content-Type"], "text/plain; charset=utf-8");
        assert_eq!(resp.body, "boom");
        assert_eq!(resp.mode(), ResponseMode::Text);
    }

    #[test]
    fn success_passes_through_unchanged() {
        let ok = Response::ok("fine").with_header("X-A", "1");
        assert_eq!(Response::from_handler_result(Ok(ok.clone())), ok);
    }

    #[test]
    fn failure_value_is_stringified() {
        assert_eq!(HandlerError::from_value(json!("plain")).message, "plain");
        assert_eq!(
            HandlerError::from_value(json!({ "code": 7 })).message,
            r#"{"code":7}"#
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registry replies
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn reply_accepts_flag_or_ok() {
        let a: RegistryReply = serde_json::from_value(json!({ "flag": true, "data": "Success" })).unwrap();
        let b: RegistryReply = serde_json::from_value(json!({ "ok": false, "data": "port in use" })).unwrap();
        assert!(a.flag);
        assert!(!b.flag);
    }

    #[test]
    fn failed_reply_carries_payload() {
        let err = RegistryReply::failure("port in use").into_result().unwrap_err();
        assert_eq!(err.data, json!("port in use"));
        assert_eq!(err.message(), "port in use");
        assert_eq!(err.to_string(), "registry error: port in use");
    }

    #[test]
    fn server_id_list_parsing() {
        assert_eq!(parse_server_ids("a|b|c|"), vec!["a", "b", "c"]);
        assert_eq!(parse_server_ids(""), Vec::<String>::new());
        assert_eq!(parse_server_ids("|x||y"), vec!["x", "y"]);
        assert_eq!(parse_server_ids("c|a|b"), vec!["c", "a", "b"]);
    }

    #[test]
    fn server_id_join_matches_parse() {
        assert_eq!(join_server_ids(["a", "b"]), "a|b");
        assert_eq!(join_server_ids(Vec::<String>::new()), "");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Host frames
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn call_frame_wire_shape() {
        let frame = HostFrame::call(3, Methods::START_SERVER, vec![json!("127.0.0.1:8080"), json!("api")]);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, json!({
            "type": "call",
            "id": 3,
            "method": "StartServer",
            "params": ["127.0.0.1:8080", "api"]
        }));
    }

    #[test]
    fn reply_frame_from_line() {
        let frame = HostFrame::from_line(
            "{\"type\":\"reply\",\"id\":9,\"result\":{\"flag\":true,\"data\":\"a|b\"}}\n",
        )
        .unwrap();
        assert_eq!(frame, HostFrame::reply(9, RegistryReply::success("a|b")));
    }

    #[test]
    fn event_line_is_newline_terminated() {
        let line = HostFrame::event("req-1", json!({ "status": 200 })).to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }
}
