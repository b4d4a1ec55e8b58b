//! Multipart video feed
//!
//! One long-lived pull connection per viewer: the handler follows the
//! latest-frame cell and writes one multipart part per observed frame until
//! the client disconnects. Each connection follows the cell independently,
//! so a slow viewer skips frames (last-value-wins) without affecting others.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use futures_util::stream;

use crate::capture::video::FrameReceiver;
use crate::constants::MULTIPART_BOUNDARY;
use crate::server::AppState;

pub async fn video_feed(State(state): State<Arc<AppState>>) -> Response {
    let mut rx: FrameReceiver = state.frames.clone();
    // Frames published before this connection are not delivered
    rx.mark_unchanged();

    let parts = stream::unfold((rx, 0u64), |(mut rx, last_seq)| async move {
        loop {
            // Sender gone means video capture has terminated; end the body
            if rx.changed().await.is_err() {
                return None;
            }
            let frame = rx.borrow_and_update().clone();
            if let Some(frame) = frame {
                if frame.seq > last_seq {
                    let seq = frame.seq;
                    return Some((Ok::<_, Infallible>(multipart_part(&frame.jpeg)), (rx, seq)));
                }
            }
        }
    });

    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={MULTIPART_BOUNDARY}"),
        )],
        Body::from_stream(parts),
    )
        .into_response()
}

/// Wrap one JPEG frame as a multipart part.
pub fn multipart_part(jpeg: &Bytes) -> Bytes {
    let mut part = BytesMut::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    part.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}
