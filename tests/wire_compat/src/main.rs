fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use lansend_protocol::messages::{
        ChunkAck, ChunkQuery, CompleteUploadResponse, InitUploadRequest, InitUploadResponse,
        UploadFileResponse, UploadIdRequest, VerifyPasswordResponse,
    };
    use lansend_protocol::{ErrorReply, ServerErrorKind, ServerReply};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// The server may send sizes as `10485760.0`; serde emits `10485760`.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    serde_json::json!(f)
                } else {
                    v.clone()
                }
            }
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent, float-normalized comparison).
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  server: {fixture}\n  client: {reserialized}"
        );
    }

    // --- Request payloads ---

    #[test]
    fn fixture_init_upload_request() {
        roundtrip_test::<InitUploadRequest>("init_upload_request.json");
    }

    #[test]
    fn fixture_chunk_query() {
        roundtrip_test::<ChunkQuery>("chunk_query.json");
    }

    #[test]
    fn fixture_upload_id_request() {
        roundtrip_test::<UploadIdRequest>("upload_id_request.json");
    }

    // --- Response payloads ---

    #[test]
    fn fixture_init_upload_response() {
        roundtrip_test::<InitUploadResponse>("init_upload_response.json");
    }

    #[test]
    fn fixture_chunk_ack() {
        roundtrip_test::<ChunkAck>("chunk_ack.json");
    }

    #[test]
    fn fixture_complete_upload_response() {
        roundtrip_test::<CompleteUploadResponse>("complete_upload_response.json");
    }

    #[test]
    fn fixture_upload_file_response() {
        roundtrip_test::<UploadFileResponse>("upload_file_response.json");
    }

    #[test]
    fn fixture_verify_password_response() {
        roundtrip_test::<VerifyPasswordResponse>("verify_password_response.json");
    }

    #[test]
    fn fixture_error_reply() {
        roundtrip_test::<ErrorReply>("error_reply.json");
    }

    // --- Older servers and envelope handling ---

    #[test]
    fn legacy_complete_response_without_renamed() {
        let json = load_fixture("complete_upload_response_legacy.json");
        let resp: CompleteUploadResponse = serde_json::from_value(json).unwrap();
        assert_eq!(resp.filename, "movie.mkv");
        assert!(!resp.renamed, "missing renamed should default to false");
        assert_eq!(resp.size, Some(10485760));
    }

    #[test]
    fn init_request_without_password_omits_field() {
        let mut json = load_fixture("init_upload_request.json");
        json.as_object_mut().unwrap().remove("password");
        let req: InitUploadRequest = serde_json::from_value(json.clone()).unwrap();
        assert!(req.password.is_none());
        assert_eq!(
            normalize_value(&serde_json::to_value(&req).unwrap()),
            normalize_value(&json)
        );
    }

    #[test]
    fn error_fixture_wins_over_success_envelope() {
        let json = load_fixture("error_reply.json");
        let reply: ServerReply<InitUploadResponse> = serde_json::from_value(json).unwrap();
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.kind(), ServerErrorKind::WrongPassword);
    }

    #[test]
    fn success_fixture_decodes_through_envelope() {
        let json = load_fixture("complete_upload_response.json");
        let reply: ServerReply<CompleteUploadResponse> = serde_json::from_value(json).unwrap();
        let resp = reply.into_result().unwrap();
        assert!(resp.renamed);
        assert_eq!(resp.filename, "movie (1).mkv");
    }

    #[test]
    fn chunk_ack_envelope_accepts_empty_object() {
        let json = load_fixture("chunk_ack.json");
        let reply: ServerReply<ChunkAck> = serde_json::from_value(json).unwrap();
        assert_eq!(reply.into_result().unwrap(), ChunkAck {});
    }
}
