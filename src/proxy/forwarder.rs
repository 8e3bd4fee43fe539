//! Data forwarding module
//!
//! A pump copies one direction of a session. Each session runs two pumps,
//! and each leg is read by exactly one of them and written by the other, so
//! the halves need no further coordination.

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::message::{Leg, RegistryHandle};

/// Size of the per-pump copy buffer
pub const BUFFER_SIZE: usize = 0xffff;

/// Copy bytes from `source` to `dest` until either side fails
///
/// The pump stops on end-of-stream, on any read or write error without
/// retrying, or when its source leg is closed. It then reports the source
/// leg to the bookkeeping loop, closes it and shuts down its write half.
/// Closing the destination leg does not stop the pump: a client that
/// half-closes still receives the rest of the response.
///
/// # Returns
///
/// The number of bytes forwarded.
pub async fn pump<R, W>(
    mut reader: R,
    source: Leg,
    mut writer: W,
    dest: Leg,
    registry: RegistryHandle,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let n = tokio::select! {
            _ = source.closed() => break,
            result = reader.read(&mut buffer) => match result {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            },
        };

        let written = tokio::select! {
            _ = source.closed() => break,
            result = writer.write_all(&buffer[..n]) => result,
        };
        if written.is_err() {
            break;
        }
        total_bytes += n as u64;
    }

    debug!("{} -> {} transferred {} bytes total", source, dest, total_bytes);

    let _ = registry.deregister(source.id()).await;
    source.close();
    drop(reader);

    // Propagate end-of-stream; the destination stays open for reading
    let _ = writer.shutdown().await;

    total_bytes
}
