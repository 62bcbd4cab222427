// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP listener adapter.
//!
//! One pipeline per accepted connection. Socket reads become `Data`
//! events (EOF is `StreamEnd(NoError)`, a read failure is
//! `StreamEnd(ReadError)`); pipeline output serializes back to the
//! socket, and `StreamEnd` closes it. The worker runs on its own task; a
//! closed tap pauses the connection's reader.

use crate::AdapterError;
use bytes::Bytes;
use sluice_core::{Data, ErrorKind, Event};
use sluice_engine::{EventSink, Module, OutputTarget, SinkOps, TapState, Worker};
use smol_str::SmolStr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

/// Accepts connections and feeds each through a named layout.
pub struct Listener {
    address: String,
    module: Arc<Module>,
    pipeline: SmolStr,
}

enum WorkerMsg {
    Open {
        id: u64,
        out: mpsc::UnboundedSender<Event>,
        tap: watch::Sender<bool>,
    },
    Event {
        id: u64,
        event: Event,
    },
}

/// Forwards pipeline output to the connection's write task.
struct ConnSink {
    out: mpsc::UnboundedSender<Event>,
}

impl EventSink for ConnSink {
    fn on_event(&mut self, event: Event, _ops: &mut SinkOps<'_>) {
        let _ = self.out.send(event);
    }
}

impl Listener {
    pub fn new(address: impl Into<String>, module: Arc<Module>, pipeline: &str) -> Self {
        Self { address: address.into(), module, pipeline: pipeline.into() }
    }

    /// Bind and serve until the task is dropped.
    pub async fn serve(self) -> Result<(), AdapterError> {
        let listener = TcpListener::bind(&self.address).await?;
        self.run(listener).await
    }

    /// Serve on an already-bound listener (lets tests use an ephemeral port).
    pub async fn run(self, listener: TcpListener) -> Result<(), AdapterError> {
        // Fail fast on an unknown layout name before accepting anything.
        self.module
            .layout_id(&self.pipeline)
            .ok_or(sluice_engine::LayoutError::UnknownLayout(self.pipeline.clone()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let module = self.module.clone();
        let pipeline = self.pipeline.clone();
        tokio::spawn(worker_loop(module, pipeline, rx));

        let mut next_id = 0u64;
        loop {
            let (socket, peer) = listener.accept().await?;
            let id = next_id;
            next_id += 1;
            tracing::debug!(%peer, conn = id, "accepted");
            tokio::spawn(serve_conn(id, socket, tx.clone()));
        }
    }
}

/// Owns the worker: applies connection events, pumps timers.
async fn worker_loop(
    module: Arc<Module>,
    pipeline: SmolStr,
    mut rx: mpsc::UnboundedReceiver<WorkerMsg>,
) {
    let mut worker = Worker::new();
    let mut conns = std::collections::HashMap::new();

    loop {
        let msg = match worker.next_deadline() {
            Some(deadline) => {
                tokio::select! {
                    msg = rx.recv() => msg,
                    _ = tokio::time::sleep_until(deadline.into()) => {
                        worker.poll_timers();
                        // Timer-driven tap reopenings must reach the readers.
                        for (handle, tap) in conns.values() {
                            let _ = tap.send(worker.tap(*handle) == TapState::Open);
                        }
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };
        let Some(msg) = msg else {
            break; // listener gone
        };
        match msg {
            WorkerMsg::Open { id, out, tap } => {
                let sink = worker.add_sink(Box::new(ConnSink { out }));
                match worker.spawn_named(&module, &pipeline, OutputTarget::Sink(sink)) {
                    Ok(handle) => {
                        worker.start(handle, &[]);
                        conns.insert(id, (handle, tap));
                    }
                    Err(error) => {
                        tracing::error!(conn = id, %error, "failed to spawn pipeline");
                    }
                }
            }
            WorkerMsg::Event { id, event } => {
                let terminal = event.is_stream_end();
                if let Some((handle, tap)) = conns.get(&id) {
                    let handle = *handle;
                    worker.input(handle, event);
                    let _ = tap.send(worker.tap(handle) == TapState::Open);
                    if terminal {
                        worker.release(handle);
                        conns.remove(&id);
                    }
                }
            }
        }
    }
}

/// Per-connection read and write pumps.
async fn serve_conn(id: u64, socket: TcpStream, tx: mpsc::UnboundedSender<WorkerMsg>) {
    let (mut reader, mut writer) = socket.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Event>();
    let (tap_tx, mut tap_rx) = watch::channel(true);
    if tx.send(WorkerMsg::Open { id, out: out_tx, tap: tap_tx }).is_err() {
        return;
    }

    let write_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            match event {
                Event::Data(data) => {
                    for chunk in data.chunks() {
                        if writer.write_all(chunk).await.is_err() {
                            return;
                        }
                    }
                }
                Event::StreamEnd(_) => {
                    let _ = writer.shutdown().await;
                    return;
                }
                _ => {} // message boundaries are not wire-visible here
            }
        }
    });

    let mut buf = vec![0u8; 16 * 1024];
    loop {
        // Honor backpressure: wait while the pipeline's tap is closed.
        while !*tap_rx.borrow() {
            if tap_rx.changed().await.is_err() {
                break;
            }
        }
        match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = tx.send(WorkerMsg::Event { id, event: Event::stream_end(ErrorKind::NoError) });
                break;
            }
            Ok(n) => {
                let data = Data::from(Bytes::copy_from_slice(&buf[..n]));
                if tx.send(WorkerMsg::Event { id, event: Event::Data(data) }).is_err() {
                    break;
                }
            }
            Err(error) => {
                tracing::debug!(conn = id, %error, "read failed");
                let _ =
                    tx.send(WorkerMsg::Event { id, event: Event::stream_end(ErrorKind::ReadError) });
                break;
            }
        }
    }
    let _ = write_task.await;
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
