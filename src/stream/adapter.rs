//! Stream adapters around [`Interceptor`].
//!
//! Both adapters are pull-driven: upstream is read only when the consumer
//! asks for the next item, so dropping the returned stream stops all reads
//! and data source calls.

use super::{Interceptor, Utf8Decoder};
use crate::error::StreamError;
use futures_util::stream::{self, Stream, StreamExt};
use std::borrow::BorrowMut;
use std::fmt::Display;
use std::pin::Pin;

struct Pump<S, I> {
    upstream: Pin<Box<S>>,
    interceptor: I,
    done: bool,
}

/// Wraps a text stream, replacing markers with resolved content.
///
/// Empty outputs are skipped. An upstream error is forwarded once as
/// [`StreamError::Upstream`] and ends the stream; held text is discarded.
///
/// The interceptor may be passed by value, or as `&mut` to read its
/// [`stats`](Interceptor::stats) once the stream is dropped.
///
/// # Examples
///
/// ```
/// use futures_util::StreamExt;
/// use marksplice::source::MemorySource;
/// use marksplice::stream::{Interceptor, intercept};
/// use std::sync::Arc;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let source = MemorySource::new().with_table("Snapchat", Vec::new());
/// let chunks = ["Snapchat has {{COU", "NT:Snapchat}} posts"];
/// let upstream = futures_util::stream::iter(chunks.map(|c| Ok::<_, String>(c.to_string())));
///
/// let output: Vec<_> = intercept(upstream, Interceptor::new(Arc::new(source)))
///     .collect()
///     .await;
/// let text: String = output.into_iter().map(Result::unwrap).collect();
/// assert_eq!(text, "Snapchat has 0 posts");
/// # });
/// ```
pub fn intercept<S, E, I>(
    upstream: S,
    interceptor: I,
) -> impl Stream<Item = Result<String, StreamError>> + Send
where
    S: Stream<Item = Result<String, E>> + Send,
    E: Display + Send,
    I: BorrowMut<Interceptor> + Send,
{
    let pump = Pump {
        upstream: Box::pin(upstream),
        interceptor,
        done: false,
    };

    stream::unfold(pump, |mut pump| async move {
        if pump.done {
            return None;
        }
        loop {
            match pump.upstream.next().await {
                Some(Ok(chunk)) => match pump.interceptor.borrow_mut().push(&chunk).await {
                    Ok(out) if out.is_empty() => {}
                    Ok(out) => return Some((Ok(out), pump)),
                    Err(e) => {
                        pump.done = true;
                        return Some((Err(e), pump));
                    }
                },
                Some(Err(e)) => {
                    pump.interceptor.borrow_mut().abort();
                    pump.done = true;
                    return Some((Err(StreamError::Upstream(e.to_string())), pump));
                }
                None => {
                    pump.done = true;
                    return match pump.interceptor.borrow_mut().finish().await {
                        Ok(out) if out.is_empty() => None,
                        Ok(out) => Some((Ok(out), pump)),
                        Err(e) => Some((Err(e), pump)),
                    };
                }
            }
        }
    })
}

/// Like [`intercept`], for upstreams that deliver raw UTF-8 bytes.
///
/// Characters split across chunks are reassembled before interception;
/// invalid sequences become U+FFFD.
pub fn intercept_bytes<S, B, E, I>(
    upstream: S,
    interceptor: I,
) -> impl Stream<Item = Result<String, StreamError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
    I: BorrowMut<Interceptor> + Send,
{
    let decoded = stream::unfold(
        (Box::pin(upstream), Utf8Decoder::new(), false),
        |(mut upstream, mut decoder, done)| async move {
            if done {
                return None;
            }
            match upstream.next().await {
                Some(Ok(bytes)) => {
                    let text = decoder.decode(bytes.as_ref());
                    Some((Ok(text), (upstream, decoder, false)))
                }
                Some(Err(e)) => Some((Err(e), (upstream, decoder, true))),
                None => {
                    let rest = decoder.finish();
                    if rest.is_empty() {
                        None
                    } else {
                        Some((Ok(rest), (upstream, decoder, true)))
                    }
                }
            }
        },
    );
    intercept(decoded, interceptor)
}
