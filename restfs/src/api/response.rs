use std::io;
use std::time::SystemTime;

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, HeaderName, LAST_MODIFIED,
    LOCATION,
};
use axum::response::{AppendHeaders, IntoResponse, Response};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, future, stream};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use crate::error::{VfsError, VfsResult};
use crate::service::vfs::{DeleteOutcome, FileRead, ReadOutcome, VfsRequest, WriteOutcome};
use crate::storage::listing::EntryStream;

const LISTING_CONTENT_TYPE: &str = "application/json";

pub async fn read_response(outcome: ReadOutcome, head: bool) -> VfsResult<Response> {
    match outcome {
        ReadOutcome::Redirect(location) => Ok(redirect(location)),
        ReadOutcome::NotModified(etag) => {
            Ok((StatusCode::NOT_MODIFIED, [(ETAG, etag.to_string())]).into_response())
        }
        ReadOutcome::File(read) => Ok(file_response(read, head)),
        ReadOutcome::Directory(entries) => listing_response(entries, head).await,
    }
}

pub fn write_response(outcome: WriteOutcome, request: &VfsRequest) -> Response {
    match outcome {
        WriteOutcome::Redirect(location) => redirect(location),
        WriteOutcome::Created(etag) => (
            StatusCode::CREATED,
            [(ETAG, etag.to_string()), (LOCATION, request.path.clone())],
        )
            .into_response(),
        WriteOutcome::Replaced(etag) => (StatusCode::OK, [(ETAG, etag.to_string())]).into_response(),
    }
}

pub fn delete_response(outcome: DeleteOutcome) -> Response {
    match outcome {
        DeleteOutcome::Redirect(location) => redirect(location),
        DeleteOutcome::Deleted => StatusCode::OK.into_response(),
    }
}

fn redirect(location: String) -> Response {
    (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response()
}

/// Formats a timestamp as an HTTP date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn file_response(read: FileRead, head: bool) -> Response {
    let total = read.snapshot.len();
    let mut headers: Vec<(HeaderName, String)> = vec![
        (CONTENT_TYPE, read.media_type.clone()),
        (ETAG, read.etag.to_string()),
        (ACCEPT_RANGES, "bytes".to_string()),
    ];
    if let Some(modified) = read.snapshot.modified() {
        headers.push((LAST_MODIFIED, http_date(modified)));
    }

    let (status, length, body) = match read.range {
        Some(range) => {
            headers.push((CONTENT_RANGE, range.content_range(total)));
            let body = if head {
                Body::empty()
            } else {
                Body::from_stream(ReaderStream::new(read.lease.take(range.byte_count())))
            };
            (StatusCode::PARTIAL_CONTENT, range.byte_count(), body)
        }
        None => {
            let body = if head {
                Body::empty()
            } else {
                Body::from_stream(ReaderStream::new(read.lease))
            };
            (StatusCode::OK, total, body)
        }
    };
    headers.push((CONTENT_LENGTH, length.to_string()));

    (status, AppendHeaders(headers), body).into_response()
}

/// Serializes a listing as a JSON array while the directory is enumerated.
///
/// The first row is read before the response is committed, so a failure to
/// enumerate at all still produces a regular error response. Later failures
/// abort the body stream.
async fn listing_response(mut entries: EntryStream, head: bool) -> VfsResult<Response> {
    let first = entries.next().await.transpose()?;
    if head {
        return Ok((StatusCode::OK, [(CONTENT_TYPE, LISTING_CONTENT_TYPE)]).into_response());
    }

    let rows = stream::iter(first.map(Ok))
        .chain(entries)
        .enumerate()
        .map(|(index, row)| {
            let row = row?;
            let mut chunk = if index == 0 { Vec::new() } else { vec![b','] };
            serde_json::to_writer(&mut chunk, &row)
                .map_err(|err| VfsError::Unexpected(io::Error::other(err)))?;
            Ok::<_, VfsError>(Bytes::from(chunk))
        })
        .inspect_err(|err| tracing::error!("directory listing aborted: {err}"));

    // Nothing follows an error, in particular not the closing bracket.
    let body = stream::once(async { Ok(Bytes::from_static(b"[")) })
        .chain(rows)
        .chain(stream::once(async { Ok(Bytes::from_static(b"]")) }))
        .scan(false, |failed, chunk| {
            let next = if *failed {
                None
            } else {
                *failed = chunk.is_err();
                Some(chunk)
            };
            future::ready(next)
        });

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, LISTING_CONTENT_TYPE)],
        Body::from_stream(body),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::listing::VfsEntry;
    use http_body_util::BodyExt;
    use std::time::{Duration, UNIX_EPOCH};

    fn entry(name: &str) -> VfsEntry {
        VfsEntry {
            name: name.to_string(),
            modified_at: DateTime::<Utc>::from(UNIX_EPOCH),
            mime_type: "text/plain".to_string(),
            size: 1,
            href: format!("http://localhost/{name}"),
        }
    }

    fn listing(rows: Vec<VfsResult<VfsEntry>>) -> EntryStream {
        stream::iter(rows).boxed()
    }

    /// Reads every body frame. Returns the bytes seen and whether the body
    /// reported an error.
    async fn drain(response: Response) -> (Vec<u8>, bool) {
        let mut body = response.into_body();
        let mut seen = Vec::new();
        let mut failed = false;
        while let Some(frame) = body.frame().await {
            match frame {
                Ok(frame) => {
                    if let Ok(data) = frame.into_data() {
                        seen.extend_from_slice(&data);
                    }
                }
                Err(_) => failed = true,
            }
        }
        (seen, failed)
    }

    #[tokio::test]
    async fn test_listing_streams_json_array() {
        let rows = listing(vec![Ok(entry("a.txt")), Ok(entry("b.txt"))]);
        let response = read_response(ReadOutcome::Directory(rows), false)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (bytes, failed) = drain(response).await;
        assert!(!failed);
        let rows: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(rows[0]["name"], "a.txt");
        assert_eq!(rows[1]["name"], "b.txt");
    }

    #[tokio::test]
    async fn test_listing_failing_on_first_row_is_an_error_response() {
        for err in [
            VfsError::NotFound("docs".into()),
            VfsError::Unexpected(io::Error::other("disk")),
        ] {
            let expected = err.status_code();
            let outcome = ReadOutcome::Directory(listing(vec![Err(err), Ok(entry("a.txt"))]));
            match read_response(outcome, false).await {
                Err(err) => {
                    let response = err.into_response();
                    assert_eq!(response.status(), expected);
                    assert_ne!(response.status(), StatusCode::OK);
                }
                Ok(response) => panic!("listing committed with {}", response.status()),
            }
        }
    }

    #[tokio::test]
    async fn test_listing_failing_later_aborts_the_body() {
        let rows = listing(vec![
            Ok(entry("a.txt")),
            Err(VfsError::Unexpected(io::Error::other("disk"))),
            Ok(entry("c.txt")),
        ]);
        let response = read_response(ReadOutcome::Directory(rows), false)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (bytes, failed) = drain(response).await;
        assert!(failed);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("[{"), "{text}");
        assert!(text.contains("a.txt"));
        assert!(!text.contains("c.txt"));
        assert!(!text.ends_with(']'), "{text}");
    }

    #[tokio::test]
    async fn test_head_listing_has_no_body() {
        let rows = listing(vec![Ok(entry("a.txt"))]);
        let response = read_response(ReadOutcome::Directory(rows), true)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], LISTING_CONTENT_TYPE);
        assert_eq!(drain(response).await, (Vec::new(), false));
    }

    #[test]
    fn test_http_date_format() {
        let time = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_redirect_sets_location() {
        let response = redirect("/docs/".to_string());
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[LOCATION], "/docs/");
    }

    #[test]
    fn test_created_response_points_at_resource() {
        let request = VfsRequest::new("/notes/a.txt");
        let outcome = WriteOutcome::Created(crate::service::conditional::EntityTag::from_snapshot(
            &crate::storage::FileSnapshot::from_metadata(
                &std::fs::metadata(env!("CARGO_MANIFEST_DIR")).unwrap(),
            ),
        ));
        let response = write_response(outcome, &request);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[LOCATION], "/notes/a.txt");
        assert!(response.headers().contains_key(ETAG));
    }
}
