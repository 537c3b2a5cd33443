//! A Model Context Protocol server speaking JSON-RPC over stdio.

use std::io;

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

use crate::prelude::*;

use self::{
    dispatch::RpcDispatcher,
    framing::{FrameReader, FrameWriter},
};

pub mod dispatch;
pub mod framing;
pub mod tools;

/// Is this error a failure of the underlying stream?
fn is_io_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>().is_some()
}

/// Serve requests from `input`, writing responses to `output`, until the
/// input ends.
///
/// Each request is handled to completion before the next one is read.
/// Malformed frames are logged and skipped, but stream failures end the
/// server with an error.
pub async fn run_server<R, W>(dispatcher: &RpcDispatcher, input: R, output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = FrameReader::new(input);
    let mut writer = FrameWriter::new(output);
    loop {
        let frame = match reader.read_message().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Client closed input, shutting down");
                return Ok(());
            }
            Err(err) if is_io_error(&err) => {
                return Err(err.context("lost connection to client"));
            }
            Err(err) => {
                error!("Skipping bad message: {err:#}");
                continue;
            }
        };

        match dispatcher.dispatch(&frame).await {
            Ok(Some(response)) => writer
                .write_message(&response)
                .await
                .context("failed to send response")?,
            Ok(None) => {}
            Err(err) => error!("Failed to handle message: {err:#}"),
        }
    }
}

/// Serve requests on standard input and output.
pub async fn serve_stdio(dispatcher: &RpcDispatcher) -> Result<()> {
    info!("Serving MCP requests on stdio");
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    run_server(dispatcher, stdin, stdout).await
}
