use crate::error::TraceError;
use crate::platform::{HostResolver, KeepAwake};
use crate::probe::ProbeRunner;
use crate::tracer::Tracer;
use pingroute_model::{HopRecord, TraceResult};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub enum TraceEvent {
    Hop(HopRecord),
    Done(Result<TraceResult, TraceError>),
}

/// Runs `tracer` on its own thread, sending each hop as it completes and then
/// exactly one `Done`.
pub fn spawn_trace<R, H, K>(tracer: Tracer<R, H, K>, sender: Sender<TraceEvent>) -> JoinHandle<()>
where
    R: ProbeRunner + Send + 'static,
    H: HostResolver + Send + 'static,
    K: KeepAwake + Send + 'static,
{
    thread::spawn(move || {
        let tx_hop = sender.clone();
        let outcome = tracer.run_with_progress(|hop| {
            let _ = tx_hop.send(TraceEvent::Hop(hop.clone()));
        });
        let _ = sender.send(TraceEvent::Done(outcome));
    })
}

pub fn stream_trace<R, H, K>(tracer: Tracer<R, H, K>) -> mpsc::Receiver<TraceEvent>
where
    R: ProbeRunner + Send + 'static,
    H: HostResolver + Send + 'static,
    K: KeepAwake + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    spawn_trace(tracer, tx);
    rx
}
