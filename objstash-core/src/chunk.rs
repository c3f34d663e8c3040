//! Chunked views over whole objects.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::{ObjectStoreError, Result};

/// A lazily consumed sequence of byte chunks.
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// Split `data` into chunks of exactly `chunk_size` bytes, the last one
/// holding the remainder.
///
/// An empty payload yields a single empty chunk. Chunks share the
/// allocation of `data`.
pub fn chunk_bytes(data: Bytes, chunk_size: usize) -> Result<Vec<Bytes>> {
    validate_chunk_size(chunk_size)?;
    if data.is_empty() {
        return Ok(vec![data]);
    }

    let mut chunks = Vec::with_capacity(data.len().div_ceil(chunk_size));
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + chunk_size).min(data.len());
        chunks.push(data.slice(offset..end));
        offset = end;
    }
    Ok(chunks)
}

/// Wrap already-buffered chunks as a [`ChunkStream`].
pub fn chunk_stream(data: Bytes, chunk_size: usize) -> Result<ChunkStream> {
    let chunks = chunk_bytes(data, chunk_size)?;
    Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
}

/// Build a [`ChunkStream`] from in-memory chunks, in order.
pub fn stream_from_chunks<I>(chunks: I) -> ChunkStream
where
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: Send + 'static,
{
    stream::iter(chunks.into_iter().map(Ok)).boxed()
}

/// Drain a [`ChunkStream`] into one contiguous buffer, in arrival order.
/// The first error from the stream aborts the drain.
pub async fn concat_chunks(chunks: ChunkStream) -> Result<Bytes> {
    let buffer = chunks
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok::<_, ObjectStoreError>(acc)
        })
        .await?;
    Ok(buffer.freeze())
}

/// Re-slice an arbitrary chunk sequence into chunks of exactly
/// `chunk_size` bytes, the last one holding the remainder.
///
/// Only one chunk's worth of data is buffered at a time. An empty input
/// yields a single empty chunk. An input error is passed through once and
/// ends the stream.
pub fn rechunk(input: ChunkStream, chunk_size: usize) -> Result<ChunkStream> {
    validate_chunk_size(chunk_size)?;

    struct State {
        input: ChunkStream,
        buffer: BytesMut,
        emitted: bool,
        done: bool,
    }

    let state = State {
        input,
        buffer: BytesMut::new(),
        emitted: false,
        done: false,
    };

    let chunks = stream::unfold(state, move |mut st| async move {
        loop {
            if st.buffer.len() >= chunk_size {
                let chunk = st.buffer.split_to(chunk_size).freeze();
                st.emitted = true;
                return Some((Ok(chunk), st));
            }
            if st.done {
                if st.buffer.is_empty() && st.emitted {
                    return None;
                }
                let chunk = st.buffer.split().freeze();
                st.emitted = true;
                return Some((Ok(chunk), st));
            }
            match st.input.next().await {
                Some(Ok(bytes)) => st.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    st.buffer.clear();
                    st.emitted = true;
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => st.done = true,
            }
        }
    });
    Ok(chunks.boxed())
}

pub(crate) fn validate_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(ObjectStoreError::InvalidArgument(
            "chunk size must be at least 1 byte".to_string(),
        ));
    }
    Ok(())
}
