//! Stream ingestion tests
//!
//! Byte streams are built from `futures::stream::iter`, so fragmentation is
//! fully under test control.

#[cfg(test)]
mod tests {
    use crate::error::{GenerationError, ProtocolError};
    use crate::fileset::FileSet;
    use crate::ingest::{Progress, StreamIngestor};
    use crate::protocol::{ProtocolMode, WireVariant};
    use crate::session::SessionTracker;
    use futures::{stream, StreamExt};
    use std::convert::Infallible;
    use std::time::Duration;

    fn chunk_line(file: &str, code: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "code": code, "file": file })
        )
    }

    fn byte_stream(parts: Vec<Vec<u8>>) -> impl futures::Stream<Item = Result<Vec<u8>, Infallible>> {
        stream::iter(parts.into_iter().map(Ok))
    }

    /// Split `text` into pieces of `size` bytes, ignoring char boundaries.
    fn fragment(text: &str, size: usize) -> Vec<Vec<u8>> {
        text.as_bytes().chunks(size).map(|c| c.to_vec()).collect()
    }

    fn contents(files: &FileSet) -> Vec<(String, String)> {
        files
            .iter()
            .map(|f| (f.path().to_string(), f.content().to_string()))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // INCREMENTAL MODE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_deltas_concatenate_in_order() {
        let body = format!(
            "{}{}",
            chunk_line("App.tsx", "export default "),
            chunk_line("App.tsx", "function App(){}")
        );
        let mut files = FileSet::new();
        let mut published = Vec::new();

        let outcome = StreamIngestor::new(ProtocolMode::Incremental)
            .run(byte_stream(vec![body.into_bytes()]), &mut files, |f| {
                published.push(contents(f))
            })
            .await
            .unwrap();

        assert_eq!(outcome.variant, WireVariant::Incremental);
        assert_eq!(outcome.frames_applied, 2);
        assert_eq!(
            files.get("App.tsx").map(|f| f.content()),
            Some("export default function App(){}")
        );
        // One publication per applied chunk
        assert_eq!(published.len(), 2);
        assert_eq!(published[0][0].1, "export default ");
    }

    #[tokio::test]
    async fn test_fragmentation_does_not_change_result() {
        let mut body = String::new();
        body.push_str(&chunk_line("src/App.tsx", "import Card from './Card';\n"));
        body.push_str(&chunk_line("src/Card.tsx", "export default () => <p>é ✓ 漢</p>;"));
        body.push_str("data: keep-alive\n");
        body.push_str(&chunk_line("src/App.tsx", "export default function App() {}\n"));

        let mut whole = FileSet::new();
        StreamIngestor::new(ProtocolMode::Incremental)
            .run(byte_stream(vec![body.clone().into_bytes()]), &mut whole, |_| {})
            .await
            .unwrap();

        for size in [1, 2, 3, 7, 64] {
            let mut split = FileSet::new();
            StreamIngestor::new(ProtocolMode::Incremental)
                .run(byte_stream(fragment(&body, size)), &mut split, |_| {})
                .await
                .unwrap();
            assert_eq!(contents(&split), contents(&whole), "fragment size {}", size);
        }
        assert_eq!(whole.len(), 2);
    }

    #[tokio::test]
    async fn test_last_line_without_newline_is_flushed() {
        let body = "data: {\"code\": \"x\", \"file\": \"a.js\"}";
        let mut files = FileSet::new();
        StreamIngestor::new(ProtocolMode::Incremental)
            .run(byte_stream(vec![body.as_bytes().to_vec()]), &mut files, |_| {})
            .await
            .unwrap();
        assert_eq!(files.get("a.js").map(|f| f.content()), Some("x"));
    }

    #[tokio::test]
    async fn test_malformed_chunk_aborts_and_keeps_published_state() {
        let body = format!(
            "{}data: {{\"code\": \"oops\n{}",
            chunk_line("a.ts", "const a = 1;"),
            chunk_line("a.ts", "never applied")
        );
        let mut files = FileSet::new();
        let mut publications = 0;

        let err = StreamIngestor::new(ProtocolMode::Incremental)
            .run(byte_stream(vec![body.into_bytes()]), &mut files, |_| publications += 1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::Protocol(ProtocolError::MalformedChunk { .. })
        ));
        assert!(err.is_protocol());
        assert_eq!(publications, 1);
        assert_eq!(files.get("a.ts").map(|f| f.content()), Some("const a = 1;"));
    }

    #[tokio::test]
    async fn test_non_data_lines_ignored() {
        let body = format!(
            ": comment\nevent: message\n\n{}id: 4\n",
            chunk_line("a.js", "1")
        );
        let mut files = FileSet::new();
        let outcome = StreamIngestor::new(ProtocolMode::Incremental)
            .run(byte_stream(vec![body.into_bytes()]), &mut files, |_| {})
            .await
            .unwrap();
        assert_eq!(outcome.frames_applied, 1);
    }

    #[tokio::test]
    async fn test_empty_incremental_stream_completes() {
        let mut files = FileSet::new();
        let outcome = StreamIngestor::new(ProtocolMode::Incremental)
            .run(byte_stream(vec![]), &mut files, |_| {})
            .await
            .unwrap();
        assert_eq!(outcome.frames_applied, 0);
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_payload_on_incremental_stream_is_mismatch() {
        let body = "data: {\"final\": {\"description\": \"d\", \"code\": \"{}\"}}\n";
        let mut files = FileSet::new();
        let err = StreamIngestor::new(ProtocolMode::Incremental)
            .run(byte_stream(vec![body.as_bytes().to_vec()]), &mut files, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Protocol(ProtocolError::ModeMismatch { .. })
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // SNAPSHOT MODE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_snapshot_replaces_file_set() {
        let body = concat!(
            "data: keep-alive\n",
            "data: Generating components...\n",
            "data: {\"status\": \"thinking\"}\n",
            "data: {\"final\": {\"description\": \"Two files\", \"code\": \"{\\\"a.ts\\\":\\\"x\\\",\\\"b.ts\\\":\\\"y\\\"}\"}}\n",
            "data: {\"final\": {\"description\": \"ignored\", \"code\": \"{}\"}}\n",
        );
        let mut files = FileSet::from_entries(vec![("stale.js", "old")]);
        let mut publications = 0;

        let outcome = StreamIngestor::new(ProtocolMode::Snapshot)
            .run(byte_stream(fragment(body, 5)), &mut files, |_| publications += 1)
            .await
            .unwrap();

        assert_eq!(outcome.variant, WireVariant::Snapshot);
        assert_eq!(outcome.description.as_deref(), Some("Two files"));
        assert_eq!(publications, 1);
        assert_eq!(
            contents(&files),
            vec![
                ("a.ts".to_string(), "x".to_string()),
                ("b.ts".to_string(), "y".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_snapshot_non_string_values_pretty_printed() {
        let body = "data: {\"final\": {\"description\": \"\", \"code\": {\"package.json\": {\"name\": \"demo\"}}}}\n";
        let mut files = FileSet::new();
        StreamIngestor::new(ProtocolMode::Snapshot)
            .run(byte_stream(vec![body.as_bytes().to_vec()]), &mut files, |_| {})
            .await
            .unwrap();
        assert_eq!(
            files.get("package.json").map(|f| f.content()),
            Some("{\n  \"name\": \"demo\"\n}")
        );
    }

    #[tokio::test]
    async fn test_snapshot_stream_without_final_payload_fails() {
        let body = "data: working...\ndata: still working\n";
        let mut files = FileSet::new();
        let err = StreamIngestor::new(ProtocolMode::Snapshot)
            .run(byte_stream(vec![body.as_bytes().to_vec()]), &mut files, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Protocol(ProtocolError::MissingFinalPayload)
        ));
    }

    #[tokio::test]
    async fn test_invalid_file_map_is_protocol_error() {
        let body = "data: {\"final\": {\"description\": \"\", \"code\": \"[1, 2]\"}}\n";
        let mut files = FileSet::new();
        let err = StreamIngestor::new(ProtocolMode::Snapshot)
            .run(byte_stream(vec![body.as_bytes().to_vec()]), &mut files, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Protocol(ProtocolError::InvalidFileMap(_))
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // AUTO MODE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_auto_locks_onto_first_payload() {
        let body = format!(
            "data: hello\n{}{}",
            chunk_line("a.js", "1"),
            "data: {\"final\": {\"description\": \"\", \"code\": \"{}\"}}\n"
        );
        let mut files = FileSet::new();
        let err = StreamIngestor::new(ProtocolMode::Auto)
            .run(byte_stream(vec![body.into_bytes()]), &mut files, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Protocol(ProtocolError::ModeMismatch {
                expected: "incremental",
                ..
            })
        ));
        assert_eq!(files.get("a.js").map(|f| f.content()), Some("1"));
    }

    #[tokio::test]
    async fn test_auto_resolves_snapshot() {
        let body = "data: {\"final\": {\"description\": \"d\", \"code\": \"{\\\"x.js\\\": \\\"1\\\"}\"}}\n";
        let mut files = FileSet::new();
        let outcome = StreamIngestor::new(ProtocolMode::Auto)
            .run(byte_stream(vec![body.as_bytes().to_vec()]), &mut files, |_| {})
            .await
            .unwrap();
        assert_eq!(outcome.variant, WireVariant::Snapshot);
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_malformed_first_payload_aborts() {
        let body = format!("data: {{\"file\": \"a.js\", \"code\": \n{}", chunk_line("a.js", "1"));
        let mut files = FileSet::new();
        let err = StreamIngestor::new(ProtocolMode::Auto)
            .run(byte_stream(vec![body.into_bytes()]), &mut files, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Protocol(ProtocolError::MalformedChunk { .. })
        ));
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_auto_without_payload_fails() {
        let mut files = FileSet::new();
        let err = StreamIngestor::new(ProtocolMode::Auto)
            .run(byte_stream(vec![b"data: hi\n".to_vec()]), &mut files, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Protocol(ProtocolError::MissingFinalPayload)
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CANCELLATION AND FAILURES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_superseded_session_discards_late_chunks() {
        let tracker = SessionTracker::new();
        let token = tracker.begin();
        let mut ingestor = StreamIngestor::new(ProtocolMode::Incremental).with_session(token);
        let mut files = FileSet::new();
        let mut on_update = |_: &FileSet| {};

        let first = chunk_line("a.js", "1");
        assert_eq!(
            ingestor
                .feed(first.as_bytes(), &mut files, &mut on_update)
                .unwrap(),
            Progress::Continue
        );

        // A new request starts; the old stream must not touch the FileSet
        let _next = tracker.begin();
        let late = chunk_line("a.js", "2");
        let err = ingestor
            .feed(late.as_bytes(), &mut files, &mut on_update)
            .unwrap_err();
        assert!(matches!(err, GenerationError::Superseded));
        assert_eq!(files.get("a.js").map(|f| f.content()), Some("1"));
    }

    #[tokio::test]
    async fn test_stalled_stream_released_when_superseded() {
        let tracker = SessionTracker::new();
        let token = tracker.begin();
        let body = byte_stream(vec![chunk_line("a.js", "1").into_bytes()])
            .chain(stream::pending());
        let mut files = FileSet::new();
        let mut updates = 0;

        let ingest = StreamIngestor::new(ProtocolMode::Incremental)
            .with_session(token)
            .run(body, &mut files, |_| updates += 1);
        let next_request = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tracker.begin()
        };
        let (result, _next) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(ingest, next_request)
        })
        .await
        .expect("ingestion should stop once superseded");

        assert!(matches!(result, Err(GenerationError::Superseded)));
        assert_eq!(updates, 1);
        assert_eq!(files.get("a.js").map(|f| f.content()), Some("1"));
    }

    #[tokio::test]
    async fn test_read_failure_is_network_error() {
        let parts: Vec<Result<Vec<u8>, String>> = vec![
            Ok(chunk_line("a.js", "1").into_bytes()),
            Err("connection reset".to_string()),
        ];
        let mut files = FileSet::new();
        let err = StreamIngestor::new(ProtocolMode::Incremental)
            .run(stream::iter(parts), &mut files, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Network(ref m) if m == "connection reset"));
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_path_rejected() {
        let body = chunk_line("", "x");
        let mut files = FileSet::new();
        let err = StreamIngestor::new(ProtocolMode::Incremental)
            .run(byte_stream(vec![body.into_bytes()]), &mut files, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Protocol(ProtocolError::UnrecognizedPayload(_))
        ));
    }
}
