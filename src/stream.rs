//! JSON arrays produced one element at a time.

use axum::body::{Body, Bytes};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::pin::Pin;

use crate::error::{ImsError, ImsResult};

const OPEN: &[u8] = b"[";
const CLOSE: &[u8] = b"]";
const SEPARATOR: u8 = b',';

enum Phase {
    Open,
    Elements { index: usize },
    Done,
}

struct ArrayState<S, F> {
    items: Pin<Box<S>>,
    serialize: F,
    phase: Phase,
}

/// Stream `items` as a JSON array, serializing each with `serialize`.
///
/// The source is pulled lazily and only once. The first serialization
/// failure is logged and emitted as an error chunk, after which the stream
/// ends without pulling the source again: the consumer sees a truncated
/// body. Dropping the returned stream drops the source.
pub fn json_array_stream<S, T, F>(items: S, serialize: F) -> impl Stream<Item = ImsResult<Bytes>>
where
    S: Stream<Item = T>,
    F: FnMut(&T) -> ImsResult<Vec<u8>>,
{
    let state = ArrayState {
        items: Box::pin(items),
        serialize,
        phase: Phase::Open,
    };

    stream::unfold(state, |mut state| async move {
        let chunk = match state.phase {
            Phase::Open => {
                state.phase = Phase::Elements { index: 0 };
                Ok(Bytes::from_static(OPEN))
            }
            Phase::Elements { index } => match state.items.next().await {
                None => {
                    state.phase = Phase::Done;
                    Ok(Bytes::from_static(CLOSE))
                }
                Some(item) => match (state.serialize)(&item) {
                    Ok(encoded) => {
                        let mut chunk = Vec::with_capacity(encoded.len() + 1);
                        if index > 0 {
                            chunk.push(SEPARATOR);
                        }
                        chunk.extend_from_slice(&encoded);
                        state.phase = Phase::Elements { index: index + 1 };
                        Ok(Bytes::from(chunk))
                    }
                    Err(err) => {
                        tracing::error!(error = %err, index, "aborting JSON array stream");
                        state.phase = Phase::Done;
                        Err(err)
                    }
                },
            },
            Phase::Done => return None,
        };
        Some((chunk, state))
    })
}

/// Serialize one value as compact JSON.
pub fn to_json_bytes<T: Serialize>(item: &T) -> ImsResult<Vec<u8>> {
    serde_json::to_vec(item).map_err(ImsError::from)
}

/// An HTTP body streaming `items` as a JSON array.
pub fn json_array_body<T>(items: Vec<T>) -> Body
where
    T: Serialize + Send + 'static,
{
    Body::from_stream(json_array_stream(stream::iter(items), to_json_bytes))
}

/// Quoted entity tag for a result set, from the parts that identify it
/// (e.g. `number:version` per entity).
pub fn result_set_etag<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref());
        hasher.update([0u8]);
    }
    format!("\"{:x}\"", hasher.finalize())
}
